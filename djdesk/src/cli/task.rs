// djdesk/src/cli/task.rs
use clap::Args;
use colored::Colorize;
use djdesk_common::error::{DjdeskError, Result};
use djdesk_common::Config;
use djdesk_net::{InspectorClient, TaskRequest, TaskSubmission};

use super::watch::{render_snapshot, DEFAULT_BASE_URL};

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[arg(long)]
    pub workspace: String,

    /// Task preset to run
    #[arg(long)]
    pub preset: String,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

impl TaskArgs {
    pub async fn run(&self, _config: &Config) -> Result<()> {
        let client = InspectorClient::new(&self.base_url)?;
        let request = TaskRequest {
            workspace: self.workspace.clone(),
            preset: self.preset.clone(),
            notes: self.notes.clone(),
        };

        match client.submit_task(&request).await? {
            TaskSubmission::Accepted(snapshot) => {
                match &snapshot.task_run {
                    Some(run) => println!(
                        "{} task run #{} ({})",
                        "Queued".green().bold(),
                        run.id,
                        run.status
                    ),
                    None => println!("{} {}", "Queued".green().bold(), self.preset),
                }
                print!("{}", render_snapshot(&snapshot));
                Ok(())
            }
            TaskSubmission::Rejected(errors) => {
                for (field, messages) in &errors {
                    for message in messages {
                        eprintln!("  {}: {}", field.yellow(), message);
                    }
                }
                Err(DjdeskError::ValidationError(format!(
                    "task '{}' was rejected by the server",
                    self.preset
                )))
            }
        }
    }
}
