//! Audit (docket) events and sinks.
//!
//! # Responsibility
//! - Describe one operation attempt or failure as an `AuditEvent` value.
//! - Hand events to a fire-and-forget `AuditSink`.
//!
//! # Invariants
//! - Every event is built fresh for one call; nothing is shared between calls.
//! - `AuditSink::post` has no failure channel; a sink that cannot deliver drops the event.

use crate::config::AuditConfig;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }
}

/// One audit record describing an operation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub application: String,
    pub source: String,
    /// Operation event name such as `branch_save`.
    pub name: String,
    pub created_by: String,
    pub ip_address: String,
    pub status: AuditStatus,
    pub event_date_time: DateTime<Utc>,
    /// JSON-serialized summary of the operation's key input.
    #[serde(rename = "keyDataAsJSON")]
    pub key_data_as_json: String,
    /// Human-readable note.
    pub details: String,
    pub level: String,
}

impl AuditEvent {
    /// Builds a `Success` event stamped with the configured fixed fields and the current time.
    pub fn new(
        config: &AuditConfig,
        name: impl Into<String>,
        key_data_as_json: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            application: config.application.clone(),
            source: config.source.clone(),
            name: name.into(),
            created_by: config.created_by.clone(),
            ip_address: config.ip_address.clone(),
            status: AuditStatus::Success,
            event_date_time: Utc::now(),
            key_data_as_json: key_data_as_json.into(),
            details: details.into(),
            level: config.level.clone(),
        }
    }

    pub fn with_status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }
}

/// Fire-and-forget receiver of audit events.
pub trait AuditSink: Send + Sync {
    /// Accepts one event. Must not block on delivery and must not panic.
    fn post(&self, event: AuditEvent);
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn post(&self, event: AuditEvent) {
        (**self).post(event);
    }
}

/// Writes each event as one `info` log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn post(&self, event: AuditEvent) {
        info!(
            "event=audit module=audit status={} name={} source={} application={} created_by={} details={:?} key_data={}",
            event.status.as_str(),
            event.name,
            event.source,
            event.application,
            event.created_by,
            event.details,
            event.key_data_as_json
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn post(&self, _event: AuditEvent) {}
}

/// Forwards events to an unbounded channel, e.g. for a background shipper.
///
/// Events posted after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelAuditSink {
    sender: UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, UnboundedReceiver<AuditEvent>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl AuditSink for ChannelAuditSink {
    fn post(&self, event: AuditEvent) {
        let _ = self.sender.send(event);
    }
}
