//! User-facing notifications (toasts) raised by session operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// How long a notification stays visible by default.
pub const DEFAULT_LIFE_MS: u64 = 5000;

/// Detail shown when the server gives no explanation.
pub const DEFAULT_ERROR_DETAIL: &str =
    "Something went wrong. If this continues, please contact support.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Notification {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    /// Display duration in milliseconds
    pub life: u64,
}

impl Notification {
    pub fn success(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            summary: summary.into(),
            detail: detail.into(),
            life: DEFAULT_LIFE_MS,
        }
    }

    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            life: DEFAULT_LIFE_MS,
        }
    }

    pub fn life(&self) -> Duration {
        Duration::from_millis(self.life)
    }
}

/// Anything that can show a notification to the user.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. Used when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Success => info!(summary = %n.summary, detail = %n.detail, "Notification"),
            Severity::Error => error!(summary = %n.summary, detail = %n.detail, "Notification"),
        }
    }
}

/// Forwards notifications over a channel to whatever renders them.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            warn!("Notification receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_default_life() {
        let ok = Notification::success("Success", "Logged in");
        assert_eq!(ok.severity, Severity::Success);
        assert_eq!(ok.life(), Duration::from_millis(5000));

        let err = Notification::error("401", "Invalid credentials");
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.detail, "Invalid credentials");
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(Notification::error("Error", DEFAULT_ERROR_DETAIL))
            .expect("serializable");
        assert_eq!(value["severity"], "error");
        assert_eq!(value["life"], 5000);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::channel();
        sink.notify(Notification::success("a", "1"));
        sink.notify(Notification::error("b", "2"));

        assert_eq!(rx.recv().await.map(|n| n.summary), Some("a".to_string()));
        assert_eq!(rx.recv().await.map(|n| n.summary), Some("b".to_string()));
    }
}
