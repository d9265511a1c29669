use std::path::PathBuf;

use reqtrace::RequirementId;
use tracing::instrument;

use super::parse_id;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement owning the link
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// The test file
    file: PathBuf,

    /// The test's name as written in the source
    identifier: String,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();
        let file = super::absolute(&self.file)?;

        if project.relink(&self.id, &file, &self.identifier)? {
            project.flush()?;
            println!(
                "Refreshed '{}' on {}; confirm it again to verify the requirement",
                self.identifier,
                self.id.display(digits)
            );
        } else {
            println!("'{}' is unchanged", self.identifier);
        }

        Ok(())
    }
}
