use std::path::PathBuf;

use clap::Parser;
use reqtrace::Project;
use tracing::instrument;

use super::{OutputFormat, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "List the tests found in the project and the requirements they cover")]
pub struct Command {
    /// Only show tests not linked to any requirement
    #[arg(long)]
    unlinked: bool,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl Command {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let project = Project::open(root)?;
        let digits = project.store().config().digits();

        let tests = project.discover()?;
        let rows: Vec<_> = tests
            .iter()
            .map(|test| {
                let ids: Vec<String> = project
                    .linked_to(test)
                    .map(|id| id.display(digits).to_string())
                    .collect();
                (test, ids)
            })
            .filter(|(_, ids)| !self.unlinked || ids.is_empty())
            .collect();

        match self.output {
            OutputFormat::Json => {
                use serde_json::json;

                let output: Vec<_> = rows
                    .iter()
                    .map(|(test, ids)| {
                        json!({
                            "file": test.file,
                            "line": test.line,
                            "identifier": test.identifier,
                            "strategy": test.strategy,
                            "hash": test.hash,
                            "degraded": test.degraded,
                            "requirements": ids,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if rows.is_empty() {
                    println!("No tests found.");
                    return Ok(());
                }
                for (test, ids) in &rows {
                    let linked = if ids.is_empty() {
                        "unlinked".dim()
                    } else {
                        ids.join(", ").success()
                    };
                    let degraded = if test.degraded {
                        format!(" {}", "(degraded)".warning())
                    } else {
                        String::new()
                    };
                    println!(
                        "{}:{}  {}  {linked}{degraded}",
                        test.file, test.line, test.identifier
                    );
                }
            }
        }

        Ok(())
    }
}
