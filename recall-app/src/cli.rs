use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use recall_experiment::{ExperimentConfig, GroupAssignment, PhaseBudgets};

use crate::logging::LogFormat;

/// Timed graph-recall experiment, run from a terminal.
#[derive(Parser, Debug)]
#[command(name = "recall", version, about)]
pub struct Cli {
    /// Stimulus table: a CSV file with a header row.
    #[arg(long, env = "STIMULUS_CSV", default_value = "data/stimuli.csv")]
    pub stimuli: PathBuf,

    #[arg(long, env = "IMAGES_DIR", default_value = "images")]
    pub images_dir: PathBuf,

    #[arg(long, env = "RESULTS_DIR", default_value = "results")]
    pub results_dir: PathBuf,

    /// Group 1, 2, 3, or `random`.
    #[arg(short, long, default_value = "random")]
    pub group: GroupAssignment,

    /// Participant name written next to every record.
    #[arg(long)]
    pub name: Option<String>,

    /// Seconds the graph stays up.
    #[arg(long, env = "DUR_GRAPH", default_value_t = 30)]
    pub dur_graph: u64,

    #[arg(long, env = "DUR_CONTEXT", default_value_t = 30)]
    pub dur_context: u64,

    #[arg(long, env = "DUR_BLACK", default_value_t = 30)]
    pub dur_black: u64,

    /// Seconds allowed per question.
    #[arg(long, env = "DUR_ANSWER_MAX", default_value_t = 120)]
    pub dur_answer: u64,

    #[arg(long, env = "DUR_CONFIDENCE", default_value_t = 120)]
    pub dur_confidence: u64,

    #[arg(long, env = "MAX_GRAPHS", default_value_t = 12)]
    pub max_graphs: usize,

    /// Shuffle the graphs after capping.
    #[arg(
        long,
        env = "RANDOMIZE_ORDER",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub randomize: bool,

    /// Code that unlocks the admin commands. Unset disables them.
    #[arg(long, env = "ADMIN_CODE", hide_env_values = true)]
    pub admin_code: Option<String>,

    #[arg(long, default_value_t = 1000)]
    pub tick_ms: u64,

    /// Seed for group assignment and shuffling.
    #[arg(long, env = "RECALL_SEED")]
    pub seed: Option<u64>,

    /// Do not clear the terminal between screens.
    #[arg(long)]
    pub no_clear: bool,

    /// Print the effective settings as JSON and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value = "human")]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn experiment_config(&self) -> ExperimentConfig {
        ExperimentConfig {
            budgets: PhaseBudgets {
                stimulus_secs: self.dur_graph,
                context_secs: self.dur_context,
                blackout_secs: self.dur_black,
                answer_secs: self.dur_answer,
                confidence_secs: self.dur_confidence,
            },
            max_trials: self.max_graphs,
            shuffle: self.randomize,
            tick_interval_ms: self.tick_ms,
            admin_code: self.admin_code.clone(),
            images_dir: self.images_dir.clone(),
        }
    }

    pub fn results_file(&self) -> PathBuf {
        self.results_dir.join("results_local.csv")
    }

    pub fn fallback_file(&self) -> PathBuf {
        self.results_dir.join("results_fallback.jsonl")
    }
}
