use std::path::PathBuf;

use reqtrace::{NewRequirement, Priority, Source, SourceType, Status};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement text
    description: String,

    /// Where the requirement came from (doc, ai, slack, jira, manual)
    #[arg(long, default_value = "manual")]
    source: SourceType,

    /// A pointer into the source (URL, ticket key, document section)
    #[arg(long, default_value = "")]
    reference: String,

    /// Priority (critical, high, medium, low)
    #[arg(long, short, default_value = "medium")]
    priority: Priority,

    /// Status (draft, approved, implemented, released)
    #[arg(long, short, default_value = "draft")]
    status: Status,

    /// Tags to apply
    #[arg(long = "tag", short, value_delimiter = ',')]
    tags: Vec<String>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();

        let id = project.store_mut().add(NewRequirement {
            description: self.description,
            source: Source::new(self.source, self.reference),
            priority: self.priority,
            status: self.status,
            tags: self.tags.into_iter().collect(),
        })?;
        project.flush()?;

        println!(
            "{}",
            format!("Added requirement {}", id.display(digits)).success()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reqtrace::{Config, Project};
    use tempfile::tempdir;

    use super::*;

    fn command(description: &str) -> Command {
        Command {
            description: description.to_string(),
            source: SourceType::Jira,
            reference: "PRJ-12".to_string(),
            priority: Priority::High,
            status: Status::Approved,
            tags: vec!["api".to_string()],
        }
    }

    #[test]
    fn add_persists_the_requirement() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        Project::init(root.clone(), Config::default()).unwrap();

        command("Export to CSV")
            .run(root.clone(), Some("bob".to_string()))
            .unwrap();

        let project = Project::open(root).unwrap();
        let (id, requirement) = project.store().requirements().next().unwrap();
        assert_eq!(id.to_string(), "REQ-001");
        assert_eq!(requirement.description(), "Export to CSV");
        assert_eq!(requirement.priority(), Priority::High);
        assert_eq!(requirement.source().reference, "PRJ-12");
        assert!(requirement.tags().contains("api"));
        assert_eq!(requirement.history()[0].by.as_deref(), Some("bob"));
    }

    #[test]
    fn blank_description_is_rejected() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        Project::init(root.clone(), Config::default()).unwrap();

        assert!(command("  ").run(root.clone(), None).is_err());
        let project = Project::open(root).unwrap();
        assert_eq!(project.store().requirements().count(), 0);
    }
}
