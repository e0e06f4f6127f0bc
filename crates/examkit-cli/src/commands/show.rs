//! The `examkit show` command, plus the summary tables shared with `take`.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examkit_core::clock::format_remaining;
use examkit_core::report::AttemptRecord;
use examkit_core::scoring::SubmitTrigger;
use examkit_report::html::{generate_html, write_html_report};

pub fn execute(result_path: PathBuf, format: String, output: Option<PathBuf>) -> Result<()> {
    let record = AttemptRecord::load_json(&result_path)?;

    if format == "html" {
        if let Some(path) = &output {
            write_html_report(&record, path)?;
            eprintln!("HTML report: {}", path.display());
        } else {
            println!("{}", generate_html(&record));
        }
        return Ok(());
    }

    let rendered = match format.as_str() {
        "text" => render_text(&record),
        "json" => serde_json::to_string_pretty(&record)?,
        "markdown" | "md" => record.to_markdown(),
        other => anyhow::bail!("unknown format '{other}' (expected text, json, markdown, html)"),
    };

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, rendered)?;
            eprintln!("Written to: {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

/// Plain-text rendering: summary, topics, and missed questions.
pub fn render_text(record: &AttemptRecord) -> String {
    let mut out = format!(
        "{} ({} test)\n{}\n",
        record.subject,
        record.test_type,
        summary_table(record)
    );

    if !record.result.per_topic.is_empty() {
        out.push_str(&format!("\n{}\n", topic_table(record)));
    }

    let missed: Vec<_> = record.missed().collect();
    if !missed.is_empty() {
        out.push_str("\nReview:\n");
        for item in missed {
            out.push_str(&format!(
                "  Q{} {}\n    yours: {}  correct: {}\n",
                item.position,
                item.prompt,
                item.selected.as_deref().unwrap_or("-"),
                item.correct_answer
            ));
            if !item.explanation.is_empty() {
                out.push_str(&format!("    {}\n", item.explanation));
            }
        }
    }

    out
}

pub fn summary_table(record: &AttemptRecord) -> Table {
    let r = &record.result;
    let mut table = Table::new();
    table.set_header(vec!["Score", "Correct", "Answered", "Points", "Time", "Ended"]);
    table.add_row(vec![
        Cell::new(format!("{}%", r.percentage)),
        Cell::new(format!("{}/{}", r.correct_count, r.total_questions)),
        Cell::new(r.answered_count),
        Cell::new(format!("{}/{}", r.points_earned, r.points_possible)),
        Cell::new(format_remaining(r.time_taken_secs)),
        Cell::new(match r.trigger {
            SubmitTrigger::Manual => "submitted",
            SubmitTrigger::Expired => "time expired",
        }),
    ]);
    table
}

pub fn topic_table(record: &AttemptRecord) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Topic", "Correct", "Total", "Score"]);
    for t in &record.result.per_topic {
        table.add_row(vec![
            Cell::new(&t.topic),
            Cell::new(t.correct),
            Cell::new(t.total),
            Cell::new(format!("{}%", t.percentage)),
        ]);
    }
    table
}
