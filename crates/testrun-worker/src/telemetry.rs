//! Host telemetry snapshots.

use serde::Serialize;
use serde_json::Value;
use testrun_core::WorkerId;
use tracing::debug;

use crate::ports::Telemetry;

/// Point-in-time view of the host running the worker.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    pub worker_id: String,
    pub hostname: String,
    pub platform: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
    pub pid: u32,
    /// 1, 5 and 15 minute load averages, where the OS exposes them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_average: Option<[f64; 3]>,
    pub timestamp: String,
}

/// Reads telemetry from the local host on every call.
#[derive(Debug, Clone)]
pub struct HostTelemetry {
    worker_id: WorkerId,
    hostname: String,
}

impl HostTelemetry {
    pub fn new(worker_id: WorkerId) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
        Self {
            worker_id,
            hostname,
        }
    }

    pub fn capture(&self) -> HostSnapshot {
        HostSnapshot {
            worker_id: self.worker_id.to_string(),
            hostname: self.hostname.clone(),
            platform: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            cpus: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            pid: std::process::id(),
            load_average: read_load_average(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl Telemetry for HostTelemetry {
    fn snapshot(&self) -> Value {
        serde_json::to_value(self.capture()).unwrap_or_else(|e| {
            debug!(error = %e, "Failed to encode host snapshot");
            Value::Null
        })
    }
}

fn read_load_average() -> Option<[f64; 3]> {
    let raw = std::fs::read_to_string("/proc/loadavg").ok()?;
    parse_load_average(&raw)
}

fn parse_load_average(raw: &str) -> Option<[f64; 3]> {
    let mut fields = raw.split_whitespace().map(|f| f.parse::<f64>().ok());
    Some([fields.next()??, fields.next()??, fields.next()??])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_fields() {
        let telemetry = HostTelemetry::new(WorkerId::new("worker-1"));
        let value = telemetry.snapshot();

        assert_eq!(value["workerId"], "worker-1");
        assert_eq!(value["platform"], std::env::consts::OS);
        assert!(value["cpus"].as_u64().unwrap() >= 1);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_parse_load_average() {
        assert_eq!(
            parse_load_average("0.52 0.58 0.59 1/467 12345\n"),
            Some([0.52, 0.58, 0.59])
        );
        assert_eq!(parse_load_average("garbage"), None);
        assert_eq!(parse_load_average(""), None);
    }
}
