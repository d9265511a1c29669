use std::path::PathBuf;

use dialoguer::Confirm;
use reqtrace::RequirementId;
use tracing::instrument;

use super::{parse_id, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement to archive
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// Why the requirement is being retired
    #[arg(long)]
    reason: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();

        let Some(requirement) = project.store().get(&self.id) else {
            anyhow::bail!("Requirement {} not found", self.id.display(digits));
        };

        if !self.yes {
            let proceed = Confirm::new()
                .with_prompt(format!(
                    "Archive {}: {}?",
                    self.id.display(digits),
                    requirement.description()
                ))
                .default(false)
                .interact()?;
            if !proceed {
                println!("Cancelled");
                return Ok(());
            }
        }

        project
            .store_mut()
            .archive(&self.id, self.reason.as_deref())?;
        project.flush()?;

        println!(
            "{}",
            format!("Archived {}", self.id.display(digits)).success()
        );
        Ok(())
    }
}
