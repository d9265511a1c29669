use std::path::PathBuf;

use reqtrace::{Config, Project};
use tracing::instrument;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// Prefix for requirement IDs (uppercase letters)
    #[arg(long, default_value = "REQ")]
    prefix: String,

    /// Minimum number of digits in displayed IDs
    #[arg(long, default_value_t = 3)]
    digits: usize,

    /// Runner recorded on links when none is given
    #[arg(long)]
    runner: Option<String>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut config = Config::default();
        config.set_prefix(self.prefix.to_uppercase())?;
        config.set_digits(self.digits);
        if let Some(runner) = self.runner {
            config.default_runner = runner;
        }

        let project = Project::init(root, config)?;

        println!(
            "Initialized requirement store in {}",
            project.root().display()
        );
        println!("  Created: .req/requirements.yaml");
        println!("  Created: .req/archive.yaml");
        println!();
        println!("Next steps:");
        println!("  reqtrace add \"Your first requirement\"");
        println!("  reqtrace tests");

        Ok(())
    }
}
