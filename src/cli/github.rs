use std::path::PathBuf;

use reqtrace::{GithubIssue, RequirementId};
use tracing::instrument;

use super::parse_id;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Record the GitHub issue tracking a requirement
    Link(Link),

    /// Forget a requirement's GitHub issue
    Unlink(Unlink),
}

impl Command {
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        match self {
            Self::Link(command) => command.run(root, actor),
            Self::Unlink(command) => command.run(root, actor),
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct Link {
    /// The requirement
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// The issue number
    number: u64,

    /// The issue title
    #[arg(long, default_value = "")]
    title: String,

    /// The issue state as reported by GitHub
    #[arg(long, default_value = "open")]
    state: String,
}

impl Link {
    #[instrument]
    fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();

        let issue = GithubIssue {
            number: self.number,
            state: self.state,
            title: self.title,
        };
        if project.store_mut().link_github(&self.id, issue)? {
            project.flush()?;
            println!("Linked {} to issue #{}", self.id.display(digits), self.number);
        } else {
            println!("{} is already linked to issue #{}", self.id.display(digits), self.number);
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Unlink {
    /// The requirement
    #[clap(value_parser = parse_id)]
    id: RequirementId,
}

impl Unlink {
    #[instrument]
    fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();

        if project.store_mut().unlink_github(&self.id)? {
            project.flush()?;
            println!("Removed the GitHub issue from {}", self.id.display(digits));
        } else {
            println!("{} has no GitHub issue", self.id.display(digits));
        }
        Ok(())
    }
}
