//! Verdicts from test-reporter summary lines.

use testrun_core::{Outcome, Verdict};

use crate::ports::OutcomeAnalyzer;

/// Reads the `N passing` / `N failing` / `N pending` summary that mocha-style
/// reporters print.
///
/// A run fails if any test failed, or if no test passed at all (nothing ran,
/// or the reporter crashed before summarising). Counts from several summary
/// blocks are added together.
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryAnalyzer;

#[derive(Debug, Default, PartialEq, Eq)]
struct Counts {
    passing: u64,
    failing: u64,
    pending: u64,
}

impl OutcomeAnalyzer for SummaryAnalyzer {
    fn analyze(&self, output: &str) -> Verdict {
        let counts = count_summary(&strip_ansi(output));

        let status = if counts.failing == 0 && counts.passing > 0 {
            Outcome::Success
        } else {
            Outcome::Failed
        };

        Verdict::new(status)
            .with_metadata("passing", counts.passing)
            .with_metadata("failing", counts.failing)
            .with_metadata("pending", counts.pending)
    }
}

fn count_summary(text: &str) -> Counts {
    let mut counts = Counts::default();
    for line in text.lines() {
        let mut words = line.split_whitespace();
        let (Some(number), Some(label)) = (words.next(), words.next()) else {
            continue;
        };
        let Ok(n) = number.parse::<u64>() else {
            continue;
        };
        match label {
            "passing" => counts.passing += n,
            "failing" => counts.failing += n,
            "pending" => counts.pending += n,
            _ => {}
        }
    }
    counts
}

/// Remove ANSI escape sequences (colour output is on by default).
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\u{1b}' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            // CSI: parameters and intermediates, then one final byte in @..~
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        } else {
            chars.next();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passing_run() {
        let output = "  login\n    ✓ accepts valid user\n\n  3 passing (2s)\n  1 pending\n";
        let verdict = SummaryAnalyzer.analyze(output);

        assert_eq!(verdict.status, Outcome::Success);
        assert_eq!(verdict.metadata["passing"], 3);
        assert_eq!(verdict.metadata["pending"], 1);
        assert_eq!(verdict.metadata["failing"], 0);
    }

    #[test]
    fn test_failing_run() {
        let verdict = SummaryAnalyzer.analyze("  5 passing (1s)\n  2 failing\n");
        assert_eq!(verdict.status, Outcome::Failed);
        assert_eq!(verdict.metadata["failing"], 2);
    }

    #[test]
    fn test_no_summary_is_failure() {
        let verdict = SummaryAnalyzer.analyze("Error: Cannot find module 'mocha'\n");
        assert_eq!(verdict.status, Outcome::Failed);
        assert_eq!(verdict.metadata["passing"], 0);
    }

    #[test]
    fn test_coloured_summary() {
        let output = "\u{1b}[92m \u{1b}[0m\u{1b}[32m 4 passing\u{1b}[0m\u{1b}[90m (12ms)\u{1b}[0m\n";
        let verdict = SummaryAnalyzer.analyze(output);
        assert_eq!(verdict.status, Outcome::Success);
        assert_eq!(verdict.metadata["passing"], 4);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\u{1b}[1;31mred\u{1b}[0m plain"), "red plain");
        assert_eq!(strip_ansi("no codes"), "no codes");
    }
}
