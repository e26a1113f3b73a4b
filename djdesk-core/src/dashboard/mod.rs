// djdesk-core/src/dashboard/mod.rs
//! Periodic status polling for a workspace dashboard.
//!
//! Polls run one after another on a fixed interval. A slow fetch delays the
//! next tick rather than overlapping with it; ticks missed meanwhile are
//! skipped.

pub mod tracker;

use std::future::Future;
use std::time::Duration;

use djdesk_common::error::Result;
use djdesk_common::StatusSnapshot;
use djdesk_net::InspectorClient;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub use tracker::{TaskNotification, TaskTransitionTracker};

pub const POLL_INTERVAL: Duration = Duration::from_millis(6000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Online,
    Offline,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Connection(ConnectionState),
    /// A fresh snapshot; consumers replace everything they show with it.
    Snapshot(Box<StatusSnapshot>),
    TaskFinished(TaskNotification),
}

/// Somewhere status snapshots come from.
pub trait StatusSource {
    fn fetch(&self) -> impl Future<Output = Result<StatusSnapshot>> + Send;
}

/// The inspector's status endpoint for one workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceStatus {
    client: InspectorClient,
    workspace: String,
}

impl WorkspaceStatus {
    pub fn new(client: InspectorClient, workspace: impl Into<String>) -> Self {
        Self {
            client,
            workspace: workspace.into(),
        }
    }
}

impl StatusSource for WorkspaceStatus {
    async fn fetch(&self) -> Result<StatusSnapshot> {
        self.client.fetch_status(&self.workspace).await
    }
}

#[derive(Debug)]
pub struct DashboardPoller<S> {
    source: S,
    interval: Duration,
    tracker: TaskTransitionTracker,
    connection: Option<ConnectionState>,
}

impl<S: StatusSource> DashboardPoller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            interval: POLL_INTERVAL,
            tracker: TaskTransitionTracker::new(),
            connection: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn connection(&self) -> Option<ConnectionState> {
        self.connection
    }

    /// One fetch. Connection changes are reported only when the state flips.
    pub async fn poll_once(&mut self) -> Vec<DashboardEvent> {
        let mut events = Vec::new();
        match self.source.fetch().await {
            Ok(snapshot) => {
                self.set_connection(ConnectionState::Online, &mut events);
                let finished = self.tracker.observe(&snapshot.tasks);
                events.push(DashboardEvent::Snapshot(Box::new(snapshot)));
                events.extend(finished.into_iter().map(DashboardEvent::TaskFinished));
            }
            Err(e) => {
                warn!("Status poll failed: {}", e);
                self.set_connection(ConnectionState::Offline, &mut events);
            }
        }
        events
    }

    fn set_connection(&mut self, state: ConnectionState, events: &mut Vec<DashboardEvent>) {
        if self.connection != Some(state) {
            debug!("Dashboard connection is now {:?}", state);
            self.connection = Some(state);
            events.push(DashboardEvent::Connection(state));
        }
    }

    /// Polls immediately and then every interval until the receiver is
    /// dropped.
    pub async fn run(mut self, tx: mpsc::Sender<DashboardEvent>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                debug!("Dashboard consumer gone; stopping poller");
                return;
            }
            for event in self.poll_once().await {
                if tx.send(event).await.is_err() {
                    debug!("Dashboard consumer gone; stopping poller");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use djdesk_common::error::DjdeskError;
    use djdesk_common::model::{EntryId, TaskEntry};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedSource {
        replies: Mutex<VecDeque<Result<StatusSnapshot>>>,
    }

    impl ScriptedSource {
        fn new(replies: Vec<Result<StatusSnapshot>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    impl StatusSource for ScriptedSource {
        async fn fetch(&self) -> Result<StatusSnapshot> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(DjdeskError::HttpError("exhausted".to_string())))
        }
    }

    fn snapshot_with(status: &str) -> StatusSnapshot {
        StatusSnapshot {
            tasks: vec![TaskEntry {
                id: EntryId::Number(1),
                label: "Run checks".to_string(),
                status: status.to_string(),
                progress: None,
            }],
            ..StatusSnapshot::default()
        }
    }

    fn offline() -> Result<StatusSnapshot> {
        Err(DjdeskError::HttpError("connection refused".to_string()))
    }

    #[tokio::test]
    async fn failure_goes_offline_and_recovery_notifies() {
        let mut poller = DashboardPoller::new(ScriptedSource::new(vec![
            Ok(snapshot_with("running")),
            offline(),
            offline(),
            Ok(snapshot_with("succeeded")),
        ]));

        let first = poller.poll_once().await;
        assert_eq!(first[0], DashboardEvent::Connection(ConnectionState::Online));
        assert!(matches!(first[1], DashboardEvent::Snapshot(_)));
        assert_eq!(first.len(), 2);

        assert_eq!(
            poller.poll_once().await,
            vec![DashboardEvent::Connection(ConnectionState::Offline)]
        );
        assert!(poller.poll_once().await.is_empty());
        assert_eq!(poller.connection(), Some(ConnectionState::Offline));

        let recovered = poller.poll_once().await;
        assert_eq!(recovered.len(), 3);
        assert_eq!(recovered[0], DashboardEvent::Connection(ConnectionState::Online));
        match &recovered[2] {
            DashboardEvent::TaskFinished(note) => {
                assert_eq!(note.label, "Run checks");
                assert!(note.succeeded());
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn run_keeps_polling_through_failures_until_consumer_leaves() {
        let poller = DashboardPoller::new(ScriptedSource::new(vec![
            offline(),
            Ok(snapshot_with("running")),
        ]))
        .with_interval(Duration::from_millis(10));
        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(poller.run(tx));

        assert_eq!(
            rx.recv().await.unwrap(),
            DashboardEvent::Connection(ConnectionState::Offline)
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            DashboardEvent::Connection(ConnectionState::Online)
        );
        assert!(matches!(rx.recv().await.unwrap(), DashboardEvent::Snapshot(_)));
        // Exhausted source flips back offline on the next tick.
        assert_eq!(
            rx.recv().await.unwrap(),
            DashboardEvent::Connection(ConnectionState::Offline)
        );
        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
