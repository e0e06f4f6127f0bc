//! The `examkit take` command: an interactive timed session in the terminal.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use examkit_core::clock::{format_remaining, Urgency};
use examkit_core::engine::{ExamEngine, SessionHandle, SessionObserver};
use examkit_core::error::{EngineError, SessionError};
use examkit_core::model::{TestSelection, TestType};
use examkit_core::report::AttemptRecord;
use examkit_core::session::ExamSession;
use examkit_core::state::Phase;
use examkit_providers::config::load_config_from;
use examkit_providers::{create_content_provider, create_result_store};
use examkit_report::html::write_html_report;

use super::show::{summary_table, topic_table};

const HELP: &str = "Commands: a <label> answer | n next | p previous | g <n> go to | f flag | grid | submit | retry | quit";

/// Session events forwarded from the ticker task.
enum SessionEvent {
    Tick { remaining_secs: u32, urgency: Urgency },
    Expired,
    Submitted(Box<AttemptRecord>),
    SubmitFailed(String),
}

struct ChannelObserver {
    tx: UnboundedSender<SessionEvent>,
}

impl SessionObserver for ChannelObserver {
    fn on_tick(&self, remaining_secs: u32, urgency: Urgency) {
        let _ = self.tx.send(SessionEvent::Tick {
            remaining_secs,
            urgency,
        });
    }

    fn on_expired(&self) {
        let _ = self.tx.send(SessionEvent::Expired);
    }

    fn on_submitted(&self, record: &AttemptRecord) {
        let _ = self.tx.send(SessionEvent::Submitted(Box::new(record.clone())));
    }

    fn on_submit_error(&self, error: &EngineError) {
        let _ = self.tx.send(SessionEvent::SubmitFailed(error.to_string()));
    }
}

/// What the input loop should do after a command.
enum Flow {
    Continue,
    Submitted(Box<AttemptRecord>),
    Quit,
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    subject: String,
    test_type: String,
    config_path: Option<PathBuf>,
    duration: Option<u32>,
    questions: Option<usize>,
    format: String,
    output: PathBuf,
) -> Result<()> {
    let test_type: TestType = test_type.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let formats: Vec<&str> = if format == "all" {
        vec!["json", "html"]
    } else {
        format.split(',').map(str::trim).collect()
    };
    if let Some(bad) = formats.iter().find(|f| !matches!(**f, "json" | "html")) {
        anyhow::bail!("unknown format '{bad}' (expected json, html, all)");
    }

    let config = load_config_from(config_path.as_deref())?;
    let mut session_config = config.session_config(test_type);
    if let Some(d) = duration {
        session_config.duration_secs = d;
    }
    if let Some(q) = questions {
        session_config.question_count = q;
    }

    let content = create_content_provider(&config.content)?;
    let store = create_result_store(&config.results)?;
    let engine = ExamEngine::new(content, store, config.engine_config());

    let (tx, mut events) = mpsc::unbounded_channel();
    let handle = engine
        .start(
            TestSelection::new(subject, session_config),
            Arc::new(ChannelObserver { tx }),
        )
        .await?;

    let (total, remaining) = handle
        .with_session(|s| (s.total_questions(), s.remaining_secs()))
        .await;
    println!(
        "examkit v{}: {} {} test: {} questions, {}",
        env!("CARGO_PKG_VERSION"),
        handle.with_session(|s| s.selection().subject.clone()).await,
        test_type,
        total,
        format_remaining(remaining)
    );
    println!("{HELP}\n");
    print_question(&handle).await;

    let record = match run_loop(&handle, &mut events, spawn_stdin_reader()).await? {
        Some(record) => record,
        None => {
            println!("Session abandoned; nothing was submitted.");
            return Ok(());
        }
    };

    println!("\n{}", summary_table(&record));
    if !record.result.per_topic.is_empty() {
        println!("{}", topic_table(&record));
    }

    std::fs::create_dir_all(&output)?;
    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = output.join(record.file_name());
                record.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "html" => {
                let path = output.join(record.file_name()).with_extension("html");
                write_html_report(&record, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            _ => {}
        }
    }

    Ok(())
}

/// Read stdin on a plain thread so a pending read never blocks shutdown.
fn spawn_stdin_reader() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

async fn run_loop(
    handle: &SessionHandle,
    events: &mut UnboundedReceiver<SessionEvent>,
    mut input: UnboundedReceiver<String>,
) -> Result<Option<AttemptRecord>> {
    let mut input_open = true;
    let mut confirming = false;
    let mut last_urgency = Urgency::Normal;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Tick { remaining_secs, urgency }) => {
                    if urgency != last_urgency {
                        last_urgency = urgency;
                        match urgency {
                            Urgency::Normal => {}
                            Urgency::Warning => println!("[warning] {} remaining", format_remaining(remaining_secs)),
                            Urgency::Critical => println!("[critical] {} remaining", format_remaining(remaining_secs)),
                        }
                    }
                }
                Some(SessionEvent::Expired) => println!("\nTime is up. Submitting your answers..."),
                Some(SessionEvent::Submitted(record)) => return Ok(Some(*record)),
                Some(SessionEvent::SubmitFailed(message)) => {
                    eprintln!("Submission failed: {message}");
                    if !input_open {
                        anyhow::bail!("submission failed and no input is available to retry");
                    }
                    println!("Type 'retry' to try again.");
                }
                None => return Ok(None),
            },
            line = input.recv(), if input_open => match line {
                Some(line) => match handle_line(handle, line.trim(), &mut confirming).await? {
                    Flow::Continue => {}
                    Flow::Submitted(record) => return Ok(Some(*record)),
                    Flow::Quit => return Ok(None),
                },
                None => {
                    input_open = false;
                    match handle.phase().await {
                        Phase::InProgress => println!("Input closed; waiting for time to expire."),
                        Phase::Submitting => anyhow::bail!("input closed before the submission was stored"),
                        Phase::Completed => {}
                    }
                }
            },
        }
    }
}

async fn handle_line(handle: &SessionHandle, line: &str, confirming: &mut bool) -> Result<Flow> {
    if *confirming {
        *confirming = false;
        if matches!(line, "y" | "yes") {
            return submit(handle, false).await;
        }
        println!("Submission cancelled.");
        return Ok(Flow::Continue);
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let arg = parts.next();

    let outcome: Result<(), SessionError> = match (command, arg) {
        ("", _) => Ok(()),
        ("a", Some(label)) => {
            handle
                .with_session(|s| {
                    let position = s.current_position();
                    let label = resolve_label(s, label);
                    s.select_answer(position, &label)
                })
                .await
        }
        ("n", _) => handle.with_session(|s| s.next().map(drop)).await,
        ("p", _) => handle.with_session(|s| s.previous().map(drop)).await,
        ("g", Some(n)) => match n.parse::<usize>() {
            Ok(position) => handle.with_session(|s| s.go_to(position).map(drop)).await,
            Err(_) => {
                println!("Not a question number: {n}");
                return Ok(Flow::Continue);
            }
        },
        ("f", _) => {
            handle
                .with_session(|s| {
                    let flagged = s.toggle_flag(s.current_position())?;
                    println!("{}", if flagged { "Flagged." } else { "Unflagged." });
                    Ok(())
                })
                .await
        }
        ("grid", _) => {
            handle.with_session(|s| print_grid(s)).await;
            return Ok(Flow::Continue);
        }
        ("submit", _) => match handle.with_session(|s| s.request_submit()).await {
            Ok(summary) => {
                println!(
                    "{} answered, {} unanswered, {} flagged. Submit now? (y/n)",
                    summary.answered, summary.unanswered, summary.flagged
                );
                *confirming = true;
                return Ok(Flow::Continue);
            }
            Err(e) => Err(e),
        },
        ("retry", _) => return submit(handle, true).await,
        ("quit" | "q", _) => return Ok(Flow::Quit),
        ("help" | "h" | "?", _) => {
            println!("{HELP}");
            return Ok(Flow::Continue);
        }
        _ => {
            println!("Unknown command: {line}\n{HELP}");
            return Ok(Flow::Continue);
        }
    };

    match outcome {
        Ok(()) => print_question(handle).await,
        Err(e) if e.is_closed() => println!("The session is closed ({e})."),
        Err(e) => println!("{e}"),
    }
    Ok(Flow::Continue)
}

async fn submit(handle: &SessionHandle, retry: bool) -> Result<Flow> {
    let result = if retry {
        handle.retry_submit().await
    } else {
        handle.submit().await
    };

    match result {
        Ok(record) => Ok(Flow::Submitted(Box::new(record))),
        Err(e) if e.is_retryable() => {
            eprintln!("{e}");
            println!("Type 'retry' to try again.");
            Ok(Flow::Continue)
        }
        Err(EngineError::Session(e)) => {
            println!("{e}");
            Ok(Flow::Continue)
        }
        Err(e) => Err(e.into()),
    }
}

async fn print_question(handle: &SessionHandle) {
    handle
        .with_session(|s| {
            let Some(q) = s.current_question() else {
                return;
            };
            let state = s.state();
            let selected = state.answers().get(q.position);
            let flag = if state.flags().contains(q.position) {
                "  [flagged]"
            } else {
                ""
            };

            println!(
                "\nQuestion {}/{}{}  ({} left)",
                q.position,
                s.total_questions(),
                flag,
                format_remaining(s.remaining_secs())
            );
            println!("{}", q.prompt);
            for option in q.options {
                let mark = if selected == Some(option.label.as_str()) {
                    "(x)"
                } else {
                    "( )"
                };
                println!("  {mark} {}) {}", option.label, option.text);
            }
        })
        .await;
}

/// Map typed input onto one of the current question's labels, preferring an
/// exact match over a case-insensitive one. Unknown input is passed through
/// so the session reports it.
fn resolve_label(session: &ExamSession, input: &str) -> String {
    let Some(question) = session.current_question() else {
        return input.to_string();
    };
    question
        .options
        .iter()
        .find(|o| o.label == input)
        .or_else(|| {
            question
                .options
                .iter()
                .find(|o| o.label.eq_ignore_ascii_case(input))
        })
        .map_or_else(|| input.to_string(), |o| o.label.clone())
}

fn print_grid(session: &ExamSession) {
    let cells: Vec<String> = session
        .navigator()
        .iter()
        .enumerate()
        .map(|(i, status)| format!("{:>3}{}", i + 1, status.marker()))
        .collect();
    for row in cells.chunks(10) {
        println!("{}", row.join(" "));
    }
    let progress = session.progress();
    println!(
        "> current  ? flagged  * answered  . unanswered  ({}/{} answered)",
        progress.answered, progress.total
    );
}
