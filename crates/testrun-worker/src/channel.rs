//! Result channels carrying status messages to the dispatcher.

use std::io::{self, Write};
use std::sync::Mutex;

use async_trait::async_trait;
use testrun_core::StatusMessage;
use tokio::sync::mpsc;

use crate::error::ChannelError;
use crate::ports::ResultChannel;

/// Hands messages to an in-process queue, e.g. a transport task.
#[derive(Debug, Clone)]
pub struct MpscResultChannel {
    tx: mpsc::Sender<StatusMessage>,
}

impl MpscResultChannel {
    /// Create a channel and the receiver the transport drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<StatusMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResultChannel for MpscResultChannel {
    async fn send(&self, message: StatusMessage) -> Result<(), ChannelError> {
        self.tx.send(message).await.map_err(|_| ChannelError::Closed)
    }
}

/// Writes each message as one JSON line.
pub struct JsonLinesChannel<W> {
    out: Mutex<W>,
}

impl JsonLinesChannel<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> JsonLinesChannel<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl<W: Write + Send> ResultChannel for JsonLinesChannel<W> {
    async fn send(&self, message: StatusMessage) -> Result<(), ChannelError> {
        let json = message.to_json()?;
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}", json)?;
        out.flush()?;
        Ok(())
    }
}
