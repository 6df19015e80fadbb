//! Sample senders.

use std::fs::OpenOptions;
use std::io::{self, Write};

use async_trait::async_trait;
use kubesight_engine::{MetricSender, SendError};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SenderConfig;
use crate::error::Result;

/// Create the sender selected by configuration.
pub fn build_sender(config: &SenderConfig) -> Result<Box<dyn MetricSender>> {
    Ok(match config {
        SenderConfig::Log => Box::new(LogSender::default()),
        SenderConfig::JsonLines { path: Some(path) } => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Box::new(JsonLinesSender::new(file))
        }
        SenderConfig::JsonLines { path: None } => Box::new(JsonLinesSender::new(io::stdout())),
    })
}

/// Logs every gauge at info level.
#[derive(Debug, Default)]
pub struct LogSender {
    pending: Mutex<usize>,
}

#[async_trait]
impl MetricSender for LogSender {
    async fn gauge(&self, name: &str, value: f64, tags: &[String]) -> std::result::Result<(), SendError> {
        info!(metric = %name, value, tags = %tags.join(","), "gauge");
        *self.pending.lock() += 1;
        Ok(())
    }

    async fn commit(&self) -> std::result::Result<(), SendError> {
        let count = std::mem::take(&mut *self.pending.lock());
        debug!(samples = count, "Committed");
        Ok(())
    }
}

#[derive(Serialize)]
struct GaugeLine<'a> {
    metric: &'a str,
    value: f64,
    tags: &'a [String],
}

/// Buffers gauges as JSON lines and writes them on commit.
pub struct JsonLinesSender<W> {
    buffer: Mutex<Vec<u8>>,
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSender<W> {
    pub fn new(writer: W) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            writer: Mutex::new(writer),
        }
    }

    /// Consume the sender and return its writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> MetricSender for JsonLinesSender<W> {
    async fn gauge(&self, name: &str, value: f64, tags: &[String]) -> std::result::Result<(), SendError> {
        if !value.is_finite() {
            return Err(SendError::Rejected(format!("{} has non-finite value {}", name, value)));
        }
        let line = serde_json::to_vec(&GaugeLine {
            metric: name,
            value,
            tags,
        })?;

        let mut buffer = self.buffer.lock();
        buffer.extend_from_slice(&line);
        buffer.push(b'\n');
        Ok(())
    }

    async fn commit(&self) -> std::result::Result<(), SendError> {
        let pending = std::mem::take(&mut *self.buffer.lock());
        let mut writer = self.writer.lock();
        writer.write_all(&pending)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_lines_written_on_commit() {
        let sender = JsonLinesSender::new(Vec::new());
        sender
            .gauge("kube_pod_info", 1.0, &["pod:web-0".to_string()])
            .await
            .unwrap();
        sender.gauge("kube_node_info", 1.0, &[]).await.unwrap();
        sender.commit().await.unwrap();

        let output = String::from_utf8(sender.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["metric"], "kube_pod_info");
        assert_eq!(lines[0]["tags"][0], "pod:web-0");
        assert_eq!(lines[1]["value"], 1.0);
    }

    #[tokio::test]
    async fn test_nothing_written_before_commit() {
        let sender = JsonLinesSender::new(Vec::new());
        sender.gauge("a", 1.0, &[]).await.unwrap();
        assert!(sender.into_inner().is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_values_rejected() {
        let sender = JsonLinesSender::new(Vec::new());
        assert!(matches!(
            sender.gauge("a", f64::NAN, &[]).await,
            Err(SendError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_log_sender_counts_pending() {
        let sender = LogSender::default();
        sender.gauge("a", 1.0, &[]).await.unwrap();
        sender.gauge("b", 2.0, &[]).await.unwrap();
        assert_eq!(*sender.pending.lock(), 2);
        sender.commit().await.unwrap();
        assert_eq!(*sender.pending.lock(), 0);
    }
}
