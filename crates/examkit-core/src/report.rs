//! Attempt records: the persisted form of a submitted session.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::format_remaining;
use crate::model::TestType;
use crate::scoring::{ExamResult, ReviewItem};

/// A submitted session: its result plus the review dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Session identifier; stable across persistence retries.
    pub id: Uuid,
    pub subject: String,
    pub test_type: TestType,
    pub result: ExamResult,
    pub review: Vec<ReviewItem>,
}

impl AttemptRecord {
    /// Save the record as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize attempt")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write attempt to {}", path.display()))?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read attempt from {}", path.display()))?;
        let record: AttemptRecord =
            serde_json::from_str(&content).context("failed to parse attempt JSON")?;
        Ok(record)
    }

    /// File name used by directory-backed stores.
    pub fn file_name(&self) -> String {
        format!(
            "attempt-{}-{}.json",
            self.result.created_at.format("%Y-%m-%dT%H%M%S"),
            self.id
        )
    }

    /// Review rows the student got wrong or skipped.
    pub fn missed(&self) -> impl Iterator<Item = &ReviewItem> {
        self.review.iter().filter(|r| !r.is_correct)
    }

    /// Format the record as markdown.
    pub fn to_markdown(&self) -> String {
        let r = &self.result;
        let mut md = String::new();

        md.push_str(&format!(
            "## {} ({} test)\n\n**Score:** {}/{} ({}%) | **Points:** {}/{} | **Time:** {}\n\n",
            self.subject,
            self.test_type,
            r.correct_count,
            r.total_questions,
            r.percentage,
            r.points_earned,
            r.points_possible,
            format_remaining(r.time_taken_secs),
        ));

        if !r.per_topic.is_empty() {
            md.push_str("### Topics\n\n");
            md.push_str("| Topic | Correct | Total | Score |\n");
            md.push_str("|-------|---------|-------|-------|\n");
            for t in &r.per_topic {
                md.push_str(&format!(
                    "| {} | {} | {} | {}% |\n",
                    t.topic, t.correct, t.total, t.percentage
                ));
            }
            md.push('\n');
        }

        let missed: Vec<&ReviewItem> = self.missed().collect();
        if !missed.is_empty() {
            md.push_str("### Review\n\n");
            for item in missed {
                md.push_str(&format!(
                    "- **Q{}** {} (yours: {}, correct: {}){}\n",
                    item.position,
                    item.prompt,
                    item.selected.as_deref().unwrap_or("-"),
                    item.correct_answer,
                    if item.explanation.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", item.explanation)
                    }
                ));
            }
        }

        md
    }
}
