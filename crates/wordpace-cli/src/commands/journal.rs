use std::path::Path;

use clap::Subcommand;
use wordpace_core::{journal, ParticipantId};

use super::load_config;

#[derive(Subcommand)]
pub enum JournalAction {
    /// Show what a restart would resume from, without running anything
    Inspect {
        /// Participant id
        participant: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: JournalAction, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        JournalAction::Inspect { participant, json } => {
            let config = load_config(path)?;
            let participant = ParticipantId::parse(&participant)?;
            let scan = journal::inspect(&config, &participant)?;

            if json {
                let value = match &scan {
                    Some(scan) => serde_json::json!({
                        "participant": participant.as_str(),
                        "path": scan.path.display().to_string(),
                        "header_found": scan.header_found,
                        "resume_point": scan.resume_point,
                        "completed_rows": scan.completed_rows,
                        "skipped": scan.skipped.iter().map(|s| serde_json::json!({
                            "line": s.line,
                            "value": s.value,
                        })).collect::<Vec<_>>(),
                    }),
                    None => serde_json::json!({
                        "participant": participant.as_str(),
                        "resume_point": 0,
                    }),
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            match scan {
                None => println!("No prior session data for {participant}"),
                Some(scan) => {
                    println!("Artifact:       {}", scan.path.display());
                    println!("Header found:   {}", scan.header_found);
                    println!("Completed rows: {}", scan.completed_rows);
                    println!("Resume point:   {}", scan.resume_point);
                    for skipped in &scan.skipped {
                        println!("  skipped line {}: {:?}", skipped.line, skipped.value);
                    }
                }
            }
        }
    }
    Ok(())
}
