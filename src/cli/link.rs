use std::path::PathBuf;

use reqtrace::RequirementId;
use tracing::instrument;

use super::{parse_id, terminal::Colorize};

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement to link
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// The test file
    file: PathBuf,

    /// The test's name as written in the source
    identifier: String,

    /// The framework that runs the test (defaults to the configured runner)
    #[arg(long)]
    runner: Option<String>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();
        let file = super::absolute(&self.file)?;

        let test = project.link(&self.id, &file, &self.identifier, self.runner.as_deref())?;
        project.flush()?;

        println!(
            "Linked {} to '{}' in {} [{}]",
            self.id.display(digits),
            test.identifier,
            test.file,
            test.hash.short()
        );
        if test.degraded {
            println!(
                "{}",
                "The end of this test could not be found cleanly; its fingerprint may change \
                 when unrelated code does."
                    .warning()
            );
        }

        Ok(())
    }
}
