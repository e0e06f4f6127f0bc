//! TOML question bank parser.
//!
//! Loads question banks from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{AnswerOption, Question, QuestionBank};

/// Intermediate TOML structure for parsing bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    subject: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    #[serde(default)]
    topic: String,
    prompt: String,
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default = "default_points")]
    points: u32,
    #[serde(default)]
    options: Vec<TomlOption>,
}

#[derive(Debug, Deserialize)]
struct TomlOption {
    label: String,
    text: String,
}

fn default_points() -> u32 {
    1
}

/// Parse a single TOML file into a `QuestionBank`.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question bank: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse a TOML string into a `QuestionBank`.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let subject = parsed.bank.subject.trim().to_string();
    if subject.is_empty() {
        anyhow::bail!("bank subject is empty: {}", source_path.display());
    }

    let questions = parsed
        .questions
        .into_iter()
        .map(|q| Question {
            id: q.id,
            position: 0,
            prompt: q.prompt,
            options: q
                .options
                .into_iter()
                .map(|o| AnswerOption::new(o.label, o.text))
                .collect(),
            answer: q.answer,
            explanation: q.explanation,
            topic: q.topic,
            points: q.points,
        })
        .collect();

    Ok(QuestionBank {
        name: parsed.bank.name.unwrap_or_else(|| subject.clone()),
        subject,
        description: parsed.bank.description,
        questions,
    })
}

/// Recursively load all `.toml` bank files from a directory.
///
/// Files that fail to parse are skipped with a warning. Banks are returned
/// sorted by subject so selection is stable across platforms.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = collect_banks(dir)?;
    banks.sort_by(|a, b| a.subject.cmp(&b.subject));
    Ok(banks)
}

fn collect_banks(dir: &Path) -> Result<Vec<QuestionBank>> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut banks = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            banks.extend(collect_banks(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// A warning from bank validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn question(id: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a bank for common authoring mistakes.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if bank.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "bank has no questions".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for q in &bank.questions {
        if !seen_ids.insert(q.id.as_str()) {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("duplicate question ID: {}", q.id),
            ));
        }

        if q.prompt.trim().is_empty() {
            warnings.push(ValidationWarning::question(&q.id, "prompt is empty"));
        }

        if q.options.len() < 2 {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("only {} option(s); at least two expected", q.options.len()),
            ));
        }

        let mut labels = HashSet::new();
        for option in &q.options {
            if !labels.insert(option.label.as_str()) {
                warnings.push(ValidationWarning::question(
                    &q.id,
                    format!("duplicate option label: {}", option.label),
                ));
            }
        }

        if !q.has_option(&q.answer) {
            warnings.push(ValidationWarning::question(
                &q.id,
                format!("answer '{}' is not one of the options", q.answer),
            ));
        }

        if q.explanation.trim().is_empty() {
            warnings.push(ValidationWarning::question(
                &q.id,
                "no explanation; review will show the answer only",
            ));
        }
    }

    warnings
}
