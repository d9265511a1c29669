use std::path::PathBuf;

use clap::Parser;
use reqtrace::{Project, Report, Requirement, RequirementId, storage::scan};
use tracing::instrument;

use super::{OutputFormat, parse_id, terminal::{self, Colorize}};

#[derive(Debug, Parser)]
#[command(about = "Display detailed information about a requirement")]
pub struct Command {
    /// The requirement to display (active or archived)
    #[clap(value_parser = parse_id)]
    id: RequirementId,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Command {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let project = Project::open(root)?;
        let digits = project.store().config().digits();

        let (requirement, archived) = if let Some(requirement) = project.store().get(&self.id) {
            (requirement, false)
        } else if let Some(requirement) = project.store().get_archived(&self.id) {
            (requirement, true)
        } else {
            anyhow::bail!("Requirement {} not found", self.id.display(digits));
        };

        // Archived requirements are not checked against the files on disk.
        let report = if archived {
            Report::new(&self.id, requirement, None)
        } else {
            let files: Vec<PathBuf> = requirement
                .tests()
                .iter()
                .map(|link| PathBuf::from(link.file()))
                .collect();
            let scan = scan::scan(project.root(), &files)?;
            Report::new(&self.id, requirement, Some(&scan.live))
        };

        match self.output {
            OutputFormat::Table => Self::output_pretty(requirement, &report, archived, digits),
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": self.id,
                    "archived": archived,
                    "requirement": requirement,
                    "verification": report,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
        }

        Ok(())
    }

    fn output_pretty(requirement: &Requirement, report: &Report, archived: bool, digits: usize) {
        let marker = if archived { " (archived)".dim() } else { String::new() };
        println!("# {}{marker}", report.id.display(digits));
        println!("{}\n", requirement.description());

        println!("{}", "Metadata".dim());
        println!("  Status:    {}", requirement.status());
        println!("  Priority:  {}", requirement.priority());
        println!("  Source:    {}", requirement.source());
        println!("  Created:   {}", requirement.created());
        if let Some(issue) = requirement.github_issue() {
            println!("  GitHub:    #{} {} ({})", issue.number, issue.title, issue.state);
        }

        if !requirement.tags().is_empty() {
            println!("\n{}", "Tags".dim());
            for tag in requirement.tags() {
                println!("  • {tag}");
            }
        }

        println!(
            "\n{} {}",
            "Verification".dim(),
            terminal::status(report.status, 0)
        );
        for (link, condition) in requirement.tests().iter().zip(&report.links) {
            println!(
                "  • {} :: {} [{}] {}",
                link.file(),
                link.identifier(),
                link.hash().short(),
                condition.condition.to_string().dim()
            );
            if let Some(confirmation) = link.confirmation() {
                println!("      {}", format!("“{}”", confirmation.verdict).dim());
            }
        }
        if let Some(snapshot) = requirement.last_verified() {
            let note = if snapshot.is_current(requirement) {
                String::new()
            } else {
                " (out of date)".warning()
            };
            println!("  Last recorded: {} at {}{note}", snapshot.status, snapshot.at);
        }

        println!("\n{}", "History".dim());
        for entry in requirement.history() {
            let by = entry
                .by
                .as_deref()
                .map(|by| format!(" by {by}"))
                .unwrap_or_default();
            println!(
                "  {} {:<16} {}{}",
                entry.timestamp.format("%Y-%m-%d %H:%M"),
                entry.kind.to_string(),
                entry.detail,
                by.dim()
            );
        }
    }
}
