use std::{
    env,
    path::{Path, PathBuf},
};

mod add;
mod archive;
mod bulk;
mod confirm;
mod github;
mod init;
mod link;
mod relink;
mod restore;
mod set;
mod show;
mod status;
mod terminal;
mod test_list;
mod unlink;

use clap::ArgAction;
use reqtrace::{Project, RequirementId};
use status::Status;

/// Parse a requirement ID, normalizing to uppercase.
///
/// This is a CLI boundary function that accepts lowercase input
/// and normalizes it before parsing.
fn parse_id(s: &str) -> Result<RequirementId, String> {
    s.trim().to_uppercase().parse().map_err(|e| format!("{e}"))
}

/// Resolve a path given on the command line against the working directory.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

/// Open the project at `root`, recording changes as made by `actor`.
fn open(root: PathBuf, actor: Option<String>) -> anyhow::Result<Project> {
    let mut project = Project::open(root)?;
    project.set_actor(actor);
    Ok(project)
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The project root. Defaults to the nearest directory containing a
    /// `.req` store, or the current directory.
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Who to record as making changes
    #[arg(long, global = true, env = "REQTRACE_USER")]
    by: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let root = match self.root {
            Some(root) => root,
            None => {
                let cwd = env::current_dir()?;
                Project::find(&cwd).unwrap_or(cwd)
            }
        };
        let actor = self.by.or_else(|| env::var("USER").ok());

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(root, actor)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show the verification status of every requirement (default)
    Status(Status),

    /// Create an empty requirement store
    Init(init::Command),

    /// Add a requirement
    Add(add::Command),

    /// Link a test to a requirement
    ///
    /// The test body is fingerprinted now; later edits make the link stale.
    Link(link::Command),

    /// Refresh the stored fingerprint of a linked test
    Relink(relink::Command),

    /// Remove a link between a requirement and a test
    Unlink(unlink::Command),

    /// Record an assessment of a linked test
    Confirm(confirm::Command),

    /// Change fields of a requirement
    Set(set::Command),

    /// Change a field of many requirements at once
    Bulk(bulk::Command),

    /// Move a requirement to the archive
    Archive(archive::Command),

    /// Move a requirement back out of the archive
    Restore(restore::Command),

    /// Associate GitHub issues with requirements
    #[command(subcommand)]
    Github(github::Command),

    /// Show one requirement in detail
    Show(show::Command),

    /// List the tests found in the project
    Tests(test_list::Command),
}

impl Command {
    fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root)?,
            Self::Init(command) => command.run(root)?,
            Self::Add(command) => command.run(root, actor)?,
            Self::Link(command) => command.run(root, actor)?,
            Self::Relink(command) => command.run(root, actor)?,
            Self::Unlink(command) => command.run(root, actor)?,
            Self::Confirm(command) => command.run(root, actor)?,
            Self::Set(command) => command.run(root, actor)?,
            Self::Bulk(command) => command.run(root, actor)?,
            Self::Archive(command) => command.run(root, actor)?,
            Self::Restore(command) => command.run(root, actor)?,
            Self::Github(command) => command.run(root, actor)?,
            Self::Show(command) => command.run(root)?,
            Self::Tests(command) => command.run(root)?,
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}
