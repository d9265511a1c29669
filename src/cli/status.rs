use std::{collections::BTreeMap, path::PathBuf, process, time::Duration};

use clap::Parser;
use indicatif::ProgressBar;
use reqtrace::{Project, Report, VerificationStatus};
use tracing::instrument;

use super::{
    OutputFormat,
    terminal::{self, Colorize, is_narrow},
};

#[derive(Debug, Parser, Default)]
#[command(about = "Show the verification status of every requirement")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Cache the computed status on each requirement
    #[arg(long)]
    record: bool,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut project = Project::open(root)?;
        let digits = project.store().config().digits();

        let spinner = ProgressBar::new_spinner();
        spinner.set_message(format!(
            "Scanning {} test files",
            project.linked_files().len()
        ));
        spinner.enable_steady_tick(Duration::from_millis(100));
        let reports = project.check(self.record);
        spinner.finish_and_clear();
        let reports = reports?;

        if self.record && project.flush()? {
            tracing::info!("Recorded verification snapshots");
        }

        if reports.is_empty() {
            println!("No requirements found yet. Create one with 'reqtrace add'.");
            return Ok(());
        }

        let mut counts: BTreeMap<VerificationStatus, usize> = BTreeMap::new();
        for report in &reports {
            *counts.entry(report.status).or_insert(0) += 1;
        }

        match self.output {
            OutputFormat::Json => Self::output_json(&reports, &counts)?,
            OutputFormat::Table => {
                if self.quiet {
                    Self::output_quiet(&counts);
                } else {
                    Self::output_table(&reports, &counts, digits);
                }
            }
        }

        // Exit with a non-zero code when some requirement needs attention.
        if counts.contains_key(&VerificationStatus::Stale) {
            process::exit(2);
        }

        Ok(())
    }

    fn output_json(
        reports: &[Report],
        counts: &BTreeMap<VerificationStatus, usize>,
    ) -> anyhow::Result<()> {
        use serde_json::json;

        let summary: BTreeMap<String, usize> = counts
            .iter()
            .map(|(status, count)| (status.to_string(), *count))
            .collect();

        let output = json!({
            "requirements": reports,
            "summary": summary,
            "total": reports.len(),
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_quiet(counts: &BTreeMap<VerificationStatus, usize>) {
        let parts: Vec<String> = counts
            .iter()
            .map(|(status, count)| format!("{status}={count}"))
            .collect();
        println!("{}", parts.join(" "));
    }

    fn output_table(
        reports: &[Report],
        counts: &BTreeMap<VerificationStatus, usize>,
        digits: usize,
    ) {
        let narrow = is_narrow();
        let width = terminal::terminal_width().map_or(100, usize::from);
        let description_width = width.saturating_sub(digits + 30).max(20);

        if !narrow {
            let header = format!(
                "{:<id$}  {:<10}  {:>5}  DESCRIPTION",
                "ID",
                "STATUS",
                "TESTS",
                id = digits + 4
            );
            println!("{}", header.dim());
        }

        for report in reports {
            let id = report.id.display(digits).to_string();
            if narrow {
                println!("{id} {}", terminal::status(report.status, 0));
            } else {
                println!(
                    "{:<width$}  {}  {:>5}  {}",
                    id,
                    terminal::status(report.status, 10),
                    report.links.len(),
                    terminal::truncate(&report.description, description_width),
                    width = digits + 4
                );
            }

            for link in report.links.iter().filter(|l| l.condition.is_stale()) {
                println!(
                    "    {} {} :: {} ({})",
                    "↳".dim(),
                    link.file,
                    link.identifier,
                    link.condition.to_string().warning()
                );
            }
        }

        let summary: Vec<String> = counts
            .iter()
            .map(|(status, count)| format!("{count} {status}"))
            .collect();
        println!();
        println!("{} requirements: {}", reports.len(), summary.join(", "));
    }
}
