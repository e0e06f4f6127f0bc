//! HTML report generator.
//!
//! Produces a self-contained HTML review page with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use examkit_core::clock::format_remaining;
use examkit_core::report::AttemptRecord;
use examkit_core::scoring::{SubmitTrigger, TopicScore};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML review page for a submitted attempt.
pub fn generate_html(record: &AttemptRecord) -> String {
    let r = &record.result;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>examkit: {} ({} test)</title>\n",
        html_escape(&record.subject),
        record.test_type
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    let ended = match r.trigger {
        SubmitTrigger::Manual => "submitted",
        SubmitTrigger::Expired => "time expired",
    };
    html.push_str("<header>\n");
    html.push_str(&format!("<h1>{}</h1>\n", html_escape(&record.subject)));
    html.push_str(&format!(
        "<p class=\"meta\">{} test | {} questions | {} | {}</p>\n",
        record.test_type,
        r.total_questions,
        ended,
        r.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Score dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str(&format!(
        "<p class=\"score {}\">{}%</p>\n",
        grade_class(r.percentage),
        r.percentage
    ));
    html.push_str("<table class=\"summary\">\n<tbody>\n");
    html.push_str(&format!(
        "<tr><th>Correct</th><td>{}/{}</td></tr>\n",
        r.correct_count, r.total_questions
    ));
    html.push_str(&format!(
        "<tr><th>Answered</th><td>{}</td></tr>\n",
        r.answered_count
    ));
    html.push_str(&format!(
        "<tr><th>Points</th><td>{}/{}</td></tr>\n",
        r.points_earned, r.points_possible
    ));
    html.push_str(&format!(
        "<tr><th>Time taken</th><td>{}</td></tr>\n",
        format_remaining(r.time_taken_secs)
    ));
    html.push_str("</tbody></table>\n");

    if !r.per_topic.is_empty() {
        html.push_str("<h2>Topics</h2>\n");
        html.push_str(&generate_bar_chart(&r.per_topic));
    }
    html.push_str("</section>\n");

    // Review
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Review</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"review\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">#</th><th onclick=\"sortTable(1)\">Topic</th><th>Question</th><th onclick=\"sortTable(3)\">Yours</th><th>Correct</th><th onclick=\"sortTable(5)\">Result</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for item in &record.review {
        let (class, verdict) = match (&item.selected, item.is_correct) {
            (_, true) => ("pass", "correct"),
            (Some(_), false) => ("fail", "wrong"),
            (None, false) => ("skip", "unanswered"),
        };
        let flag = if item.flagged { " &#9873;" } else { "" };

        let mut cell = format!("{}{}", html_escape(&item.prompt), flag);
        cell.push_str("<ul class=\"options\">");
        for option in &item.options {
            let marker = if option.label == item.correct_answer {
                " class=\"answer\""
            } else {
                ""
            };
            cell.push_str(&format!(
                "<li{}><b>{}</b> {}</li>",
                marker,
                html_escape(&option.label),
                html_escape(&option.text)
            ));
        }
        cell.push_str("</ul>");
        if !item.explanation.is_empty() {
            cell.push_str(&format!(
                "<details><summary>Explanation</summary>{}</details>",
                html_escape(&item.explanation)
            ));
        }

        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            class,
            item.position,
            html_escape(&item.topic),
            cell,
            html_escape(item.selected.as_deref().unwrap_or("-")),
            html_escape(&item.correct_answer),
            verdict
        ));
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(record)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(record: &AttemptRecord, path: &Path) -> Result<()> {
    let html = generate_html(record);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn grade_class(percentage: u32) -> &'static str {
    if percentage >= 70 {
        "pass"
    } else if percentage >= 50 {
        "warn"
    } else {
        "fail"
    }
}

fn generate_bar_chart(topics: &[TopicScore]) -> String {
    let bar_height = 30;
    let max_width = 400;
    let padding = 10;
    let label_width = 200;

    let total_height = topics.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 100,
        total_height
    );

    for (i, topic) in topics.iter().enumerate() {
        let y = i * (bar_height + padding) + padding;
        let width = topic.percentage as usize * max_width / 100;

        let color = if topic.percentage >= 70 {
            "#22c55e"
        } else if topic.percentage >= 50 {
            "#eab308"
        } else {
            "#ef4444"
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&topic.topic)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}% ({}/{})</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            topic.percentage,
            topic.correct,
            topic.total
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; --skip: #fef9c3; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; --skip: #713f12; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
.score { font-size: 3rem; font-weight: bold; margin: 1rem 0; }
.score.pass { color: #22c55e; }
.score.warn { color: #eab308; }
.score.fail { color: #ef4444; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
table.summary { width: auto; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; vertical-align: top; }
th { background: var(--border); cursor: pointer; }
tr.pass { background: var(--pass); }
tr.fail { background: var(--fail); }
tr.skip { background: var(--skip); }
ul.options { list-style: none; padding-left: 0; margin: 0.5rem 0; }
li.answer { text-decoration: underline; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 0.5rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('review');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, { numeric: true }) : vb.localeCompare(va, undefined, { numeric: true });
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use examkit_core::model::{
        AnswerOption, Question, QuestionSet, SessionConfig, TestSelection, TestType,
    };
    use examkit_core::ExamSession;

    fn question(id: &str, topic: &str, prompt: &str) -> Question {
        Question {
            id: id.into(),
            position: 0,
            prompt: prompt.into(),
            options: vec![
                AnswerOption::new("A", "first"),
                AnswerOption::new("B", "second"),
            ],
            answer: "A".into(),
            explanation: "Because A.".into(),
            topic: topic.into(),
            points: 1,
        }
    }

    fn make_record() -> AttemptRecord {
        let set = QuestionSet::new(
            "chemistry",
            vec![
                question("c1", "acids", "Is <HCl> an acid?"),
                question("c2", "bases", "Is NaOH a base?"),
                question("c3", "bases", "Is KOH a base?"),
            ],
        )
        .unwrap();
        let selection = TestSelection::new(
            "chemistry",
            SessionConfig {
                question_count: 3,
                duration_secs: 600,
                test_type: TestType::Subject,
            },
        );
        let mut session = ExamSession::start(selection, set).unwrap();
        session.select_answer(1, "A").unwrap();
        session.select_answer(2, "B").unwrap();
        session.toggle_flag(2).unwrap();
        session.confirm_submit().unwrap()
    }

    #[test]
    fn html_report_contains_required_elements() {
        let html = generate_html(&make_record());

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("<h1>chemistry</h1>"));
        assert!(html.contains("subject test | 3 questions | submitted"));
        assert!(html.contains("<p class=\"score fail\">33%</p>"));
        assert!(html.contains("<td>1/3</td>"));
        assert!(html.contains("acids"));
        assert!(html.contains("100% (1/1)"));
        assert!(html.contains("0% (0/2)"));
    }

    #[test]
    fn review_rows_are_classified_and_escaped() {
        let html = generate_html(&make_record());

        assert!(html.contains("<tr class=\"pass\"><td>1</td>"));
        assert!(html.contains("<tr class=\"fail\"><td>2</td>"));
        assert!(html.contains("<tr class=\"skip\"><td>3</td>"));
        assert!(html.contains("Is &lt;HCl&gt; an acid?"));
        assert!(!html.contains("<HCl>"));
        assert!(html.contains("&#9873;"));
        assert!(html.contains("Because A."));
    }

    #[test]
    fn html_report_write_to_file() {
        let record = make_record();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("attempt.html");

        write_html_report(&record, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
