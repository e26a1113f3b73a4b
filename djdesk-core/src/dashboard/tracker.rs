// djdesk-core/src/dashboard/tracker.rs
use std::collections::HashMap;

use djdesk_common::model::{EntryId, TaskEntry};

pub const TERMINAL_STATUSES: &[&str] = &["succeeded", "failed"];

/// A task that moved into a terminal status since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNotification {
    pub id: EntryId,
    pub label: String,
    pub status: String,
}

impl TaskNotification {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Remembers the last status seen for each task id. Tasks seen for the first
/// time never notify, so history that was already finished when polling
/// started stays quiet.
#[derive(Debug, Default)]
pub struct TaskTransitionTracker {
    last_seen: HashMap<EntryId, String>,
}

impl TaskTransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, tasks: &[TaskEntry]) -> Vec<TaskNotification> {
        let mut fired = Vec::new();
        for task in tasks {
            let previous = self.last_seen.insert(task.id.clone(), task.status.clone());
            let changed = previous.as_deref().is_some_and(|prev| prev != task.status);
            if changed && TERMINAL_STATUSES.contains(&task.status.as_str()) {
                fired.push(TaskNotification {
                    id: task.id.clone(),
                    label: task.label.clone(),
                    status: task.status.clone(),
                });
            }
        }
        fired
    }

    pub fn last_status(&self, id: &EntryId) -> Option<&str> {
        self.last_seen.get(id).map(String::as_str)
    }
}
