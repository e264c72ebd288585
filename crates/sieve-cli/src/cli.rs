//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use sieve_runtime::OutputMode;
use std::path::PathBuf;

/// Sieve - validate structured output from language models
#[derive(Parser)]
#[command(name = "sieve")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Runtime configuration file (YAML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the built-in schemas
    Schemas,

    /// Print the JSON Schema for a built-in schema or descriptor file
    Schema {
        /// Schema name or descriptor path
        name: String,

        /// Export in strict structured-output form
        #[arg(long)]
        strict: bool,
    },

    /// Validate raw model output against a schema
    Validate(ValidateArgs),

    /// Request structured output from a model and validate it
    Generate {
        #[command(subcommand)]
        task: GenerateTask,

        #[command(flatten)]
        options: GenerateOptions,
    },
}

#[derive(Args)]
#[command(group(
    clap::ArgGroup::new("source")
        .required(true)
        .args(["schema", "schema_file"]),
))]
pub struct ValidateArgs {
    /// Built-in schema name
    #[arg(short, long)]
    pub schema: Option<String>,

    /// Descriptor file (YAML or JSON)
    #[arg(long)]
    pub schema_file: Option<PathBuf>,

    /// File with the raw output; reads stdin when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Keep output that fails validation and report violations as warnings
    #[arg(long)]
    pub degrade: bool,

    /// Print a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum GenerateTask {
    /// Weather alert for a situation
    Weather {
        #[arg(default_value = "a severe thunderstorm in Chicago")]
        situation: String,
    },

    /// Analysis of a programming concept
    Tech {
        #[arg(default_value = "Async/Await in Python")]
        concept: String,
    },

    /// Exam study notes from a text file
    Notes {
        /// Source material
        #[arg(short, long)]
        source: PathBuf,

        /// Where to write the validated notes
        #[arg(short, long, default_value = "exam_notes.json")]
        out: PathBuf,
    },
}

#[derive(Args)]
pub struct GenerateOptions {
    /// Override the configured output mode
    #[arg(short, long, global = true)]
    pub mode: Option<ModeArg>,

    /// Send the task in both modes and compare the replies
    #[arg(long, global = true)]
    pub compare: bool,

    /// Keep replies that fail validation
    #[arg(long, global = true)]
    pub degrade: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    JsonObject,
    JsonSchema,
}

impl From<ModeArg> for OutputMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::JsonObject => OutputMode::JsonObject,
            ModeArg::JsonSchema => OutputMode::JsonSchema,
        }
    }
}
