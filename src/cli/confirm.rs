use std::path::PathBuf;

use reqtrace::RequirementId;
use tracing::instrument;

use super::{parse_id, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement owning the link
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// The test file
    file: PathBuf,

    /// The test's name as written in the source
    identifier: String,

    /// The assessment: how the test demonstrates the requirement
    #[arg(long)]
    verdict: String,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();
        let file = super::absolute(&self.file)?;

        let test = project.confirm(&self.id, &file, &self.identifier, &self.verdict)?;
        project.flush()?;

        println!(
            "Confirmed '{}' for {} [{}]",
            test.identifier,
            self.id.display(digits),
            test.hash.short()
        );

        let linked = project
            .store()
            .get(&self.id)
            .and_then(|r| r.link(&test.file, &test.identifier))
            .map(|link| link.hash() != &test.hash);
        if linked == Some(true) {
            println!(
                "{}",
                "The test changed since it was linked; run `reqtrace relink` to accept the new \
                 body."
                    .warning()
            );
        }

        Ok(())
    }
}
