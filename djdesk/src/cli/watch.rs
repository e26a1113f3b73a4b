// djdesk/src/cli/watch.rs
use std::fmt::Write as _;

use clap::Args;
use colored::Colorize;
use djdesk_common::error::Result;
use djdesk_common::model::StatusSnapshot;
use djdesk_common::Config;
use djdesk_core::dashboard::{ConnectionState, DashboardEvent, DashboardPoller, WorkspaceStatus};
use djdesk_net::InspectorClient;
use tokio::sync::mpsc;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/";

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Workspace slug to follow
    #[arg(long)]
    pub workspace: String,

    /// Address of the running djdesk server
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

impl WatchArgs {
    pub async fn run(&self, _config: &Config) -> Result<()> {
        let client = InspectorClient::new(&self.base_url)?;
        debug!("Watching {}", client.status_url(&self.workspace)?);
        let poller = DashboardPoller::new(WorkspaceStatus::new(client, &self.workspace));
        let (tx, mut rx) = mpsc::channel(32);
        let polling = tokio::spawn(poller.run(tx));

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => show(&event),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        polling.abort();
        Ok(())
    }
}

fn show(event: &DashboardEvent) {
    match event {
        DashboardEvent::Connection(ConnectionState::Online) => {
            println!("{}", "● online".green());
        }
        DashboardEvent::Connection(ConnectionState::Offline) => {
            println!("{}", "● offline (retrying)".red());
        }
        DashboardEvent::Snapshot(snapshot) => {
            print!("{}", render_snapshot(snapshot));
        }
        DashboardEvent::TaskFinished(note) => {
            let verdict = if note.succeeded() {
                "succeeded".green().bold()
            } else {
                "failed".red().bold()
            };
            println!("{} Task \"{}\" {}", "»".bold(), note.label, verdict);
        }
    }
}

/// Renders every section from scratch; nothing carries over from the
/// previous snapshot.
pub fn render_snapshot(snapshot: &StatusSnapshot) -> String {
    let mut out = String::new();
    let title = snapshot.workspace.as_deref().unwrap_or("workspace");
    let _ = writeln!(out, "\n{}", format!("== {title} ==").bold());

    section(&mut out, "Scans", snapshot.scans.is_empty(), "No scans yet.");
    for scan in &snapshot.scans {
        let label = if scan.kind_label.is_empty() { &scan.kind } else { &scan.kind_label };
        let _ = writeln!(
            out,
            "  {:<24} {:<10} {}{}",
            label,
            scan.status,
            scan.summary,
            progress_suffix(scan.progress)
        );
    }

    section(&mut out, "Insights", snapshot.insights.is_empty(), "No insights available.");
    for insight in &snapshot.insights {
        let value = match &insight.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "  {:<24} {} {}", insight.title, value, insight.delta);
    }

    section(&mut out, "Activity", snapshot.activity.is_empty(), "No recent activity.");
    for event in &snapshot.activity {
        let _ = writeln!(out, "  {} [{}] {}", event.timestamp, event.kind, event.message);
    }

    section(&mut out, "Logs", snapshot.log_excerpt.is_empty(), "No log lines.");
    for line in &snapshot.log_excerpt {
        let level = line.level.as_deref().unwrap_or("info");
        let _ = writeln!(out, "  {} {:<7} {}", line.timestamp, level, line.message);
    }

    section(&mut out, "Tasks", snapshot.tasks.is_empty(), "No task history yet.");
    for task in &snapshot.tasks {
        let _ = writeln!(
            out,
            "  #{:<5} {:<28} {}{}",
            task.id,
            task.label,
            task.status,
            progress_suffix(task.progress)
        );
    }

    let graph = snapshot.schema.as_ref();
    let empty_graph = graph.is_none_or(|g| g.nodes.is_empty());
    section(&mut out, "Schema", empty_graph, "No models discovered.");
    if let Some(graph) = graph {
        for node in &graph.nodes {
            let pending = match node.pending_migrations {
                Some(n) if n > 0 => format!(" ({n} pending)"),
                _ => String::new(),
            };
            let _ = writeln!(out, "  {} [{} fields]{}", node.name, node.fields.len(), pending);
        }
        for edge in &graph.connections {
            let _ = writeln!(out, "  {} -> {}", edge.source, edge.target);
        }
    }
    out
}

fn section(out: &mut String, title: &str, empty: bool, placeholder: &str) {
    let _ = writeln!(out, "{}", title.underline());
    if empty {
        let _ = writeln!(out, "  {}", placeholder.dimmed());
    }
}

fn progress_suffix(progress: Option<u32>) -> String {
    progress.map(|p| format!(" {p}%")).unwrap_or_default()
}
