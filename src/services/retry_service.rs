//! Retry manager.
//!
//! Tracks failed attempts per task and decides between automatic retry and
//! escalation to audit. Operates on task values; persisting the outcome is
//! the caller's job, so the protocol stays testable without a store.

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{RetryAttempt, Task, TaskStatus};

/// Outcome of recording a failure, mirrored to the caller so it can route
/// the task without re-deriving state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FailureReport {
    pub status: TaskStatus,
    pub retry_count: u32,
    pub needs_audit: bool,
}

/// Decides retry eligibility and performs the failure bookkeeping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryManager;

impl RetryManager {
    pub fn new() -> Self {
        Self
    }

    /// Record a failed attempt: append to the retry history, bump the
    /// counter, and move the task to `Failed`.
    pub fn record_failure(
        &self,
        task: &mut Task,
        error: impl Into<String>,
        agent_id: Option<Uuid>,
    ) -> DomainResult<FailureReport> {
        let error = error.into();
        task.transition_to(TaskStatus::Failed)?;

        task.retry_history.push(RetryAttempt {
            attempt: task.retry_count + 1,
            error: error.clone(),
            timestamp: Utc::now(),
            agent_id,
        });
        task.retry_count += 1;
        task.error = Some(error);

        let report = FailureReport {
            status: task.status,
            retry_count: task.retry_count,
            needs_audit: self.needs_audit(task),
        };
        debug!(
            task_id = %task.id,
            retry_count = task.retry_count,
            needs_audit = report.needs_audit,
            "recorded task failure"
        );
        Ok(report)
    }

    /// Whether the task is eligible for an automatic retry.
    pub fn needs_retry(&self, task: &Task) -> bool {
        task.status == TaskStatus::Failed
            && task.retry_count < task.max_retries
            && task.auditor_review_id.is_none()
    }

    /// Whether the task has exhausted its retries and must go to audit.
    pub fn needs_audit(&self, task: &Task) -> bool {
        task.status == TaskStatus::Failed
            && task.retry_count >= task.max_retries
            && task.auditor_review_id.is_none()
    }

    /// Return a failed task to the queue for another attempt.
    ///
    /// Rejected with `MaxRetriesExceeded { needs_audit: true }` once the
    /// retry budget is spent, including while the audit is already open.
    pub fn retry(&self, task: &mut Task) -> DomainResult<()> {
        if self.needs_retry(task) {
            return task.transition_to(TaskStatus::Pending);
        }
        if self.needs_audit(task) || task.status == TaskStatus::UnderAudit {
            return Err(DomainError::MaxRetriesExceeded {
                task_id: task.id,
                retry_count: task.retry_count,
                max_retries: task.max_retries,
                needs_audit: true,
            });
        }
        Err(DomainError::InvalidStateTransition {
            from: task.status.as_str().to_string(),
            to: TaskStatus::Pending.as_str().to_string(),
            reason: "task is not in a retryable state".to_string(),
        })
    }

    /// Park the task under audit, linking the open audit-review task.
    ///
    /// The audit-review task itself is created by the coordinator before
    /// this is called, so the link never dangles.
    pub fn request_audit(&self, task: &mut Task, audit_task_id: Uuid) -> DomainResult<()> {
        if !self.needs_audit(task) {
            return Err(DomainError::InvalidStateTransition {
                from: task.status.as_str().to_string(),
                to: TaskStatus::UnderAudit.as_str().to_string(),
                reason: "task does not qualify for audit".to_string(),
            });
        }
        task.transition_to(TaskStatus::UnderAudit)?;
        task.auditor_review_id = Some(audit_task_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_progress_task() -> Task {
        let mut task = Task::new(Uuid::new_v4(), "Retry test", "A task that will fail");
        task.transition_to(TaskStatus::InProgress).unwrap();
        task
    }

    fn fail_once(manager: &RetryManager, task: &mut Task, msg: &str) -> FailureReport {
        let report = manager
            .record_failure(task, msg, Some(Uuid::new_v4()))
            .unwrap();
        report
    }

    #[test]
    fn test_failure_history_accumulates_in_order() {
        let manager = RetryManager::new();
        let mut task = in_progress_task();

        for n in 1..=3u32 {
            fail_once(&manager, &mut task, &format!("boom {n}"));
            assert_eq!(task.retry_count, n);
            assert_eq!(task.retry_history.len(), n as usize);
            assert_eq!(task.retry_history.last().unwrap().attempt, n);
            if n < 3 {
                manager.retry(&mut task).unwrap();
                task.transition_to(TaskStatus::InProgress).unwrap();
            }
        }

        let attempts: Vec<u32> = task.retry_history.iter().map(|a| a.attempt).collect();
        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(task.error.as_deref(), Some("boom 3"));
    }

    #[test]
    fn test_needs_audit_only_after_budget_spent() {
        let manager = RetryManager::new();
        let mut task = in_progress_task();

        let report = fail_once(&manager, &mut task, "first");
        assert!(!report.needs_audit);
        assert!(manager.needs_retry(&task));

        manager.retry(&mut task).unwrap();
        task.transition_to(TaskStatus::InProgress).unwrap();
        let report = fail_once(&manager, &mut task, "second");
        assert!(!report.needs_audit);

        manager.retry(&mut task).unwrap();
        task.transition_to(TaskStatus::InProgress).unwrap();
        let report = fail_once(&manager, &mut task, "third");
        assert!(report.needs_audit);
        assert!(!manager.needs_retry(&task));
        assert!(manager.needs_audit(&task));
    }

    #[test]
    fn test_retry_rejected_after_exhaustion() {
        let manager = RetryManager::new();
        let mut task = in_progress_task();
        task.max_retries = 1;

        fail_once(&manager, &mut task, "only failure");
        let err = manager.retry(&mut task).unwrap_err();
        assert!(err.needs_audit());
        assert_eq!(task.status, TaskStatus::Failed);
    }

    #[test]
    fn test_retry_rejected_for_non_failed_task() {
        let manager = RetryManager::new();
        let mut task = Task::new(Uuid::new_v4(), "Pending", "Not failed yet");
        assert!(matches!(
            manager.retry(&mut task),
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_request_audit_sets_review_ref() {
        let manager = RetryManager::new();
        let mut task = in_progress_task();
        task.max_retries = 1;
        fail_once(&manager, &mut task, "fatal");

        let audit_id = Uuid::new_v4();
        manager.request_audit(&mut task, audit_id).unwrap();

        assert_eq!(task.status, TaskStatus::UnderAudit);
        assert_eq!(task.auditor_review_id, Some(audit_id));
        assert!(!task.is_dispatchable());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn test_request_audit_rejected_with_retries_left() {
        let manager = RetryManager::new();
        let mut task = in_progress_task();
        fail_once(&manager, &mut task, "first of three");

        assert!(manager.request_audit(&mut task, Uuid::new_v4()).is_err());
        assert!(task.auditor_review_id.is_none());
    }
}
