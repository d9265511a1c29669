use std::path::PathBuf;

use reqtrace::RequirementId;
use tracing::instrument;

use super::{parse_id, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The archived requirement to restore
    #[clap(value_parser = parse_id)]
    pub(super) id: RequirementId,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();

        project.store_mut().restore(&self.id)?;
        project.flush()?;

        println!(
            "{}",
            format!("Restored {}", self.id.display(digits)).success()
        );
        Ok(())
    }
}
