use std::path::Path;

use clap::Subcommand;
use wordpace_core::{ParticipantId, StimulusSequencer, TrialList};

use super::load_config;

#[derive(Subcommand)]
pub enum SequenceAction {
    /// Create the participant's trial order (no-op if it already exists)
    Generate {
        /// Participant id
        participant: String,
    },
    /// Print a participant's persisted trial order
    Show {
        /// Participant id
        participant: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SequenceAction, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(path)?;
    let sequencer = StimulusSequencer::from_config(&config);

    match action {
        SequenceAction::Generate { participant } => {
            let participant = ParticipantId::parse(&participant)?;
            let existed = sequencer.order_path(&participant).exists();
            let trials = sequencer.load_or_create(&participant, &config.paths.catalog)?;
            let questions = trials.trials().iter().filter(|t| t.is_question()).count();
            let verb = if existed { "Loaded" } else { "Created" };
            println!(
                "{verb} order for {participant}: {} trials ({questions} questions)",
                trials.len()
            );
            println!("{}", sequencer.order_path(&participant).display());
        }
        SequenceAction::Show { participant, json } => {
            let participant = ParticipantId::parse(&participant)?;
            let order_path = sequencer.order_path(&participant);
            if !order_path.exists() {
                return Err(format!("no trial order for {participant}").into());
            }
            let trials = TrialList::load(&order_path)?;

            if json {
                println!("{}", serde_json::to_string_pretty(trials.trials())?);
            } else {
                for trial in trials.trials() {
                    println!(
                        "{:>4}  {:<12} {:<10} {:>3}  {}",
                        trial.trial_num, trial.id, trial.condition, trial.condition_code, trial.sentence
                    );
                }
            }
        }
    }
    Ok(())
}
