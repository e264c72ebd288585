//! `sieve generate`: ask a model for structured output.

use anyhow::Context;
use sieve_core::{DegradePolicy, NoteCollection, Outcome, StructuredRecord};
use sieve_runtime::{
    OpenAiProvider, RuntimeConfig, StructuredClient, StructuredReply, StructuredTask,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use super::pretty;
use super::validate::{EXIT_INVALID, EXIT_NOT_JSON};
use crate::cli::{GenerateOptions, GenerateTask};

pub async fn run(
    task: GenerateTask,
    options: GenerateOptions,
    config: RuntimeConfig,
) -> anyhow::Result<ExitCode> {
    let config = apply_options(config, &options);
    let provider = Arc::new(OpenAiProvider::from_config(&config)?);
    let client = StructuredClient::new(provider, config);

    let (structured, notes_out) = match task {
        GenerateTask::Weather { situation } => (StructuredTask::weather_alert(&situation), None),
        GenerateTask::Tech { concept } => (StructuredTask::tech_analysis(&concept), None),
        GenerateTask::Notes { source, out } => {
            let content = std::fs::read_to_string(&source)
                .with_context(|| format!("failed to read {}", source.display()))?;
            (StructuredTask::study_notes(&content), Some(out))
        }
    };

    if options.compare {
        let comparison = client.compare_modes(&structured).await?;
        for summary in comparison.summaries() {
            println!("{}", summary);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let reply = client.request(&structured).await?;
    match notes_out {
        Some(out) if reply.outcome.is_validated() => {
            let notes: NoteCollection = reply.into_typed()?;
            write_notes(&notes, &out)?;
            print!("{}", render_notes(&notes));
        }
        Some(out) => {
            print_reply(&reply);
            tracing::warn!(path = %out.display(), "Notes did not validate; nothing written");
            return Ok(ExitCode::from(unsaved_notes_exit(&reply.outcome)));
        }
        None => print_reply(&reply),
    }
    Ok(ExitCode::SUCCESS)
}

/// Exit status when notes were kept but not saved, following `sieve validate`.
fn unsaved_notes_exit(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Validated(_) => 0,
        Outcome::Degraded { .. } => EXIT_INVALID,
        Outcome::Unstructured { .. } => EXIT_NOT_JSON,
    }
}

fn apply_options(mut config: RuntimeConfig, options: &GenerateOptions) -> RuntimeConfig {
    if let Some(mode) = options.mode {
        config.mode = mode.into();
    }
    if options.degrade {
        config.policy = DegradePolicy::Degrade;
    }
    config
}

fn print_reply(reply: &StructuredReply) {
    match &reply.outcome {
        Outcome::Validated(record) => println!("{}", pretty(&record.to_json())),
        Outcome::Degraded { data, error } => {
            for violation in &error.violations {
                eprintln!("warning: {}", violation);
            }
            println!("{}", pretty(data));
        }
        Outcome::Unstructured { raw, error } => {
            eprintln!("warning: {}", error);
            println!("{}", raw);
        }
    }
}

fn write_notes(notes: &NoteCollection, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(notes)?;
    std::fs::write(path, json + "\n").with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        notes = notes.notes.len(),
        schema = %NoteCollection::schema().name,
        "Saved study notes"
    );
    Ok(())
}

fn render_notes(notes: &NoteCollection) -> String {
    let rule = "-".repeat(40);
    let mut out = format!("Generated Exam Notes\n{}\n", "=".repeat(40));
    for note in &notes.notes {
        out.push_str(&format!("\n{}. {}\n{}\n{}\n", note.id, note.heading, rule, note.summary));
        if let Some(page) = note.page_ref {
            out.push_str(&format!("[Page: {}]\n", page));
        }
    }
    out
}
