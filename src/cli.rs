use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory for per-prompt output folders and the runtime log
    #[arg(short, long)]
    pub output_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for every prompt in a manifest, or for one
    /// prompt read interactively when no manifest is given
    Run {
        /// JSON manifest file: {"prompts": [{"id": ..., "text": ...}, ...]}
        manifest: Option<PathBuf>,
    },

    /// Translate one prompt into every target language
    Translate {
        /// Prompt text (source language)
        #[arg(short, long)]
        text: String,

        /// Output folder for translated_prompts.json
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Query the model for each translated prompt in a folder
    Query {
        /// Folder containing translated_prompts.json
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Parse raw model output with the syntax-aware parser
    Parse {
        /// Folder containing llm_output.json
        #[arg(short, long)]
        dir: PathBuf,
    },

    /// Aggregate parsed results, write the report and render charts
    Analyze {
        /// Folder containing llm_parsed.json
        #[arg(short, long)]
        dir: PathBuf,
    },
}
