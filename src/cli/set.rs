use std::path::PathBuf;

use reqtrace::{Priority, RequirementId, Source, SourceType, Status};
use tracing::instrument;

use super::parse_id;

#[derive(Debug, clap::Parser)]
pub struct Command {
    /// The requirement to change
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// New description
    #[arg(long, short)]
    description: Option<String>,

    /// New priority (critical, high, medium, low)
    #[arg(long, short)]
    priority: Option<Priority>,

    /// New status (draft, approved, implemented, released)
    #[arg(long, short)]
    status: Option<Status>,

    /// New source type (doc, ai, slack, jira, manual)
    #[arg(long)]
    source: Option<SourceType>,

    /// New source reference (keeps the source type unless --source is given)
    #[arg(long)]
    reference: Option<String>,

    /// Tags to add
    #[arg(long, value_delimiter = ',')]
    add_tag: Vec<String>,

    /// Tags to remove
    #[arg(long, value_delimiter = ',')]
    remove_tag: Vec<String>,
}

impl Command {
    #[instrument]
    pub fn run(self, root: PathBuf, actor: Option<String>) -> anyhow::Result<()> {
        let mut project = super::open(root, actor)?;
        let digits = project.store().config().digits();
        let id = &self.id;
        let store = project.store_mut();

        let current = store
            .get(id)
            .ok_or_else(|| reqtrace::StoreError::NotFound(id.clone()))?
            .source()
            .clone();

        let mut changed = Vec::new();
        if let Some(description) = &self.description {
            if store.set_description(id, description)? {
                changed.push("description");
            }
        }
        if let Some(priority) = self.priority {
            if store.set_priority(id, priority)? {
                changed.push("priority");
            }
        }
        if let Some(status) = self.status {
            if store.set_status(id, status)? {
                changed.push("status");
            }
        }
        if self.source.is_some() || self.reference.is_some() {
            let source = Source::new(
                self.source.unwrap_or(current.kind),
                self.reference.unwrap_or(current.reference),
            );
            if store.set_source(id, source)? {
                changed.push("source");
            }
        }
        if (!self.add_tag.is_empty() || !self.remove_tag.is_empty())
            && store.edit_tags(id, &self.add_tag, &self.remove_tag)?
        {
            changed.push("tags");
        }

        if changed.is_empty() {
            println!("{} is unchanged", id.display(digits));
            return Ok(());
        }

        project.flush()?;
        println!("Updated {} of {}", changed.join(", "), id.display(digits));
        Ok(())
    }
}
