/// Structured audit events
///
/// Every security-relevant decision in the pipeline emits one JSON event
/// line through the `log` facade: rejections, run lifecycle, limit kills,
/// cleanup failures. Events carry the execution id so one request can be
/// correlated across its stages.
use crate::config::types::ExecutionStatus;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Audit event severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    High,
    Medium,
    Low,
}

/// Types of events we track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ExecutionStart,
    ExecutionEnd,
    FilterRejection,
    LimitViolation,
    EnvironmentFailure,
    CleanupFailure,
}

impl AuditEventType {
    fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::ExecutionStart | AuditEventType::ExecutionEnd => AuditSeverity::Low,
            AuditEventType::FilterRejection | AuditEventType::LimitViolation => {
                AuditSeverity::Medium
            }
            AuditEventType::EnvironmentFailure | AuditEventType::CleanupFailure => {
                AuditSeverity::High
            }
        }
    }
}

/// One audit event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    /// Caller-visible execution identifier for correlation
    pub execution_id: String,
    pub details: String,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, execution_id: &str, details: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            severity: event_type.default_severity(),
            event_type,
            execution_id: execution_id.to_string(),
            details: details.into(),
        }
    }

    /// Emit through the log facade as a single JSON line.
    pub fn emit(&self) {
        let line = serde_json::to_string(self)
            .unwrap_or_else(|e| format!("{{\"audit_serialize_error\":\"{}\"}}", e));
        match self.severity {
            AuditSeverity::High | AuditSeverity::Medium => warn!(target: "execbox::audit", "{}", line),
            AuditSeverity::Low => info!(target: "execbox::audit", "{}", line),
        }
    }
}

/// Convenience constructors for pipeline call sites.
pub mod events {
    use super::*;

    pub fn execution_start(execution_id: &str) {
        AuditEvent::new(AuditEventType::ExecutionStart, execution_id, "run started").emit();
    }

    pub fn execution_end(execution_id: &str, status: ExecutionStatus, wall_time: f64) {
        AuditEvent::new(
            AuditEventType::ExecutionEnd,
            execution_id,
            format!("status={} wall_time={:.3}s", status, wall_time),
        )
        .emit();
    }

    pub fn filter_rejection(execution_id: &str, pattern: &str, reason: &str) {
        AuditEvent::new(
            AuditEventType::FilterRejection,
            execution_id,
            format!("pattern='{}' reason='{}'", pattern, reason),
        )
        .emit();
    }

    pub fn limit_violation(execution_id: &str, status: ExecutionStatus) {
        AuditEvent::new(
            AuditEventType::LimitViolation,
            execution_id,
            format!("terminated: {}", status),
        )
        .emit();
    }

    pub fn environment_failure(execution_id: &str, error: &str) {
        AuditEvent::new(AuditEventType::EnvironmentFailure, execution_id, error).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_stable_field_names() {
        let event = AuditEvent::new(AuditEventType::FilterRejection, "abcd1234", "pattern='eval('");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"filter_rejection\""));
        assert!(json.contains("\"execution_id\":\"abcd1234\""));
        assert!(json.contains("\"severity\":\"medium\""));
    }

    #[test]
    fn severity_tracks_event_type() {
        assert_eq!(
            AuditEventType::ExecutionStart.default_severity(),
            AuditSeverity::Low
        );
        assert_eq!(
            AuditEventType::CleanupFailure.default_severity(),
            AuditSeverity::High
        );
    }
}
