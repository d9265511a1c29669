use std::path::PathBuf;

use clap::ArgGroup;
use reqtrace::{Edit, Priority, RequirementId, Status};
use tracing::instrument;

use super::parse_id;

#[derive(Debug, clap::Parser)]
#[command(group(
    ArgGroup::new("edit")
        .required(true)
        .multiple(true)
        .args(["priority", "status", "add_tag", "remove_tag"])
))]
pub struct Command {
    /// The requirements to change
    #[clap(value_parser = parse_id, value_delimiter = ',', required = true)]
    ids: Vec<RequirementId>,

    /// New priority (critical, high, medium, low)
    #[arg(long, short, conflicts_with_all = ["status", "add_tag", "remove_tag"])]
    priority: Option<Priority>,

    /// New status (draft, approved, implemented, released)
    #[arg(long, short, conflicts_with_all = ["add_tag", "remove_tag"])]
    status: Option<Status>,

    /// Tags to add
    #[arg(long, value_delimiter = ',')]
    add_tag: Vec<String>,

    /// Tags to remove
    #[arg(long, value_delimiter = ',')]
    remove_tag: Vec<String>,
}

impl Command {
    fn edit(&self) -> Edit {
        if let Some(priority) = self.priority {
            Edit::Priority(priority)
        } else if let Some(status) = self.status {
            Edit::Status(status)
        } else {
            Edit::Tags {
                add: self.add_tag.clone(),
                remove: self.remove_tag.clone(),
            }
        }
    }

    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();

        let unknown: Vec<String> = self
            .ids
            .iter()
            .filter(|id| project.store().get(id).is_none())
            .map(|id| id.display(digits).to_string())
            .collect();
        if !unknown.is_empty() {
            tracing::warn!("Skipping unknown requirements: {}", unknown.join(", "));
        }

        let modified = project.store_mut().bulk(&self.ids, &self.edit())?;
        project.flush()?;

        println!("Modified {modified} of {} requirements", self.ids.len());
        Ok(())
    }
}
