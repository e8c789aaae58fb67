//! In-memory execution history.
//!
//! Every `execute_workflow` call appends one [`ExecutionRecord`]. A record
//! is created as `running` and finalised exactly once. The engine holds a
//! [`RunningExecution`] guard while it runs, so a dropped execution future
//! still leaves a `failed` record behind.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::executor::ExecutionState;
use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: Uuid,
    pub workflow_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub input: Value,
    /// Host metadata from the orchestration context.
    pub context: Map<String, Value>,
    pub status: ExecutionStatus,
    pub results: Map<String, Value>,
    pub errors: BTreeMap<String, String>,
    pub skipped: Vec<String>,
    /// The error returned to the caller, for failed executions.
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub(crate) fn running(
        id: Uuid,
        workflow_name: &str,
        input: Value,
        context: Map<String, Value>,
    ) -> Self {
        Self {
            id,
            workflow_name: workflow_name.to_string(),
            start_time: Utc::now(),
            end_time: None,
            input,
            context,
            status: ExecutionStatus::Running,
            results: Map::new(),
            errors: BTreeMap::new(),
            skipped: Vec::new(),
            error: None,
        }
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn is_finished(&self) -> bool {
        self.status != ExecutionStatus::Running
    }
}

/// Append-only list of execution records.
#[derive(Debug, Default)]
pub struct ExecutionHistory {
    records: Mutex<Vec<ExecutionRecord>>,
    /// When set, the oldest finished records are evicted beyond this size.
    limit: Option<usize>,
}

impl ExecutionHistory {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            limit,
        }
    }

    pub(crate) fn begin(&self, record: ExecutionRecord) {
        let mut records = self.records.lock();
        records.push(record);

        if let Some(limit) = self.limit {
            while records.len() > limit {
                match records.iter().position(ExecutionRecord::is_finished) {
                    Some(oldest) => {
                        records.remove(oldest);
                    }
                    None => break,
                }
            }
        }
    }

    /// Finalise a running record. Records that already left `running` are
    /// never touched again.
    pub(crate) fn finish(
        &self,
        id: Uuid,
        status: ExecutionStatus,
        state: ExecutionState,
        error: Option<String>,
    ) {
        let mut records = self.records.lock();
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return;
        };
        if record.is_finished() {
            return;
        }
        record.status = status;
        record.end_time = Some(Utc::now());
        record.results = state.results;
        record.errors = state.errors;
        record.skipped = state.skipped;
        record.error = error;
    }

    /// Append `record` and return the guard that finalises it.
    pub(crate) fn start(&self, record: ExecutionRecord) -> RunningExecution<'_> {
        let id = record.id;
        self.begin(record);
        RunningExecution {
            history: self,
            id,
            finished: false,
        }
    }

    pub fn all(&self) -> Vec<ExecutionRecord> {
        self.records.lock().clone()
    }

    /// The `n` most recent records, newest last.
    pub fn recent(&self, n: usize) -> Vec<ExecutionRecord> {
        let records = self.records.lock();
        records[records.len().saturating_sub(n)..].to_vec()
    }

    pub fn get(&self, id: Uuid) -> Option<ExecutionRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

/// A `running` record owned by one in-flight execution.
///
/// Dropped without [`RunningExecution::finish`] (the caller abandoned the
/// future), the record is finalised as failed with
/// [`EngineError::Cancelled`].
#[must_use]
pub(crate) struct RunningExecution<'a> {
    history: &'a ExecutionHistory,
    id: Uuid,
    finished: bool,
}

impl RunningExecution<'_> {
    pub(crate) fn finish(
        mut self,
        status: ExecutionStatus,
        state: ExecutionState,
        error: Option<String>,
    ) {
        self.finished = true;
        self.history.finish(self.id, status, state, error);
    }
}

impl Drop for RunningExecution<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.history.finish(
                self.id,
                ExecutionStatus::Failed,
                ExecutionState::default(),
                Some(EngineError::Cancelled.to_string()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str) -> ExecutionRecord {
        ExecutionRecord::running(Uuid::new_v4(), name, json!({}), Map::new())
    }

    #[test]
    fn finish_applies_exactly_once() {
        let history = ExecutionHistory::default();
        let rec = record("wf");
        let id = rec.id;
        history.begin(rec);

        let mut state = ExecutionState::default();
        state.results.insert("a".into(), json!(1));
        history.finish(id, ExecutionStatus::Completed, state, None);

        let mut other = ExecutionState::default();
        other.errors.insert("a".into(), "late".into());
        history.finish(id, ExecutionStatus::Failed, other, Some("late".into()));

        let stored = history.get(id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(stored.results["a"], json!(1));
        assert!(stored.errors.is_empty());
        assert!(stored.duration().is_some());
    }

    #[test]
    fn limit_evicts_oldest_finished_records() {
        let history = ExecutionHistory::new(Some(2));

        let running = record("slow");
        let running_id = running.id;
        history.begin(running);

        let done = record("fast");
        let done_id = done.id;
        history.begin(done);
        history.finish(done_id, ExecutionStatus::Completed, ExecutionState::default(), None);

        let newest = record("next");
        let newest_id = newest.id;
        history.begin(newest);

        let ids: Vec<Uuid> = history.all().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![running_id, newest_id]);
    }

    #[test]
    fn dropped_guard_fails_the_record() {
        let history = ExecutionHistory::default();
        let rec = record("abandoned");
        let id = rec.id;
        drop(history.start(rec));

        let stored = history.get(id).unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("workflow execution cancelled"));
        assert!(stored.end_time.is_some());
    }

    #[test]
    fn finished_guard_keeps_its_outcome() {
        let history = ExecutionHistory::default();
        let rec = record("wf");
        let id = rec.id;
        history
            .start(rec)
            .finish(ExecutionStatus::Completed, ExecutionState::default(), None);

        assert_eq!(history.get(id).unwrap().status, ExecutionStatus::Completed);
    }

    #[test]
    fn recent_returns_tail() {
        let history = ExecutionHistory::default();
        for name in ["a", "b", "c"] {
            history.begin(record(name));
        }
        let names: Vec<String> = history.recent(2).into_iter().map(|r| r.workflow_name).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(history.recent(10).len(), 3);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(serde_json::to_value(ExecutionStatus::Completed).unwrap(), json!("completed"));
    }
}
