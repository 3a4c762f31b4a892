//! Line-driven front-end over [`SessionAccrualTracker`].
//!
//! ```text
//! start
//! activity <title> | <description> | <file>[, <file>..] [| <observations>]
//! close
//! history
//! day YYYY-MM-DD
//! progress
//! status
//! quit
//! ```

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::TrackerError,
    log_debug,
    models::{Activity, EvidenceUpload, ServiceRecord},
    tracker::{format_hours, SessionAccrualTracker, SessionStatus},
};

const ENABLE_LOGS: bool = true;

const ACTIVITY_USAGE: &str =
    "activity <title> | <description> | <file>[, <file>..] [| <observations>]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInput {
    pub title: String,
    pub description: String,
    pub files: Vec<PathBuf>,
    pub observations: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Activity(ActivityInput),
    Close,
    History,
    Day(NaiveDate),
    Progress,
    Status,
    Help,
    Quit,
}

/// `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "close" | "end" => Command::Close,
        "history" => Command::History,
        "progress" => Command::Progress,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "day" => NaiveDate::parse_from_str(rest, "%Y-%m-%d")
            .map(Command::Day)
            .map_err(|_| format!("expected a date as YYYY-MM-DD, got {rest:?}"))?,
        "activity" => Command::Activity(parse_activity(rest)?),
        other => return Err(format!("unknown command {other:?}; try `help`")),
    };
    Ok(Some(command))
}

fn parse_activity(rest: &str) -> Result<ActivityInput, String> {
    let fields: Vec<&str> = rest.split('|').map(str::trim).collect();
    if fields.len() < 3 {
        return Err(format!("usage: {ACTIVITY_USAGE}"));
    }

    let files = fields[2]
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(PathBuf::from)
        .collect();
    let observations = fields
        .get(3..)
        .map(|extra| extra.join(" | "))
        .filter(|o| !o.trim().is_empty());

    Ok(ActivityInput {
        title: fields[0].to_string(),
        description: fields[1].to_string(),
        files,
        observations,
    })
}

/// Reads commands until `quit` or end of input. Tracker failures are
/// reported on `output` and never end the loop.
pub async fn run_console<R, W>(
    tracker: &SessionAccrualTracker,
    input: R,
    mut output: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                say(&mut output, format!("error: {message}")).await?;
                continue;
            }
        };

        log_debug!("Console command: {:?}", command);
        if command == Command::Quit {
            break;
        }

        let reply = match execute(tracker, command).await {
            Ok(reply) => reply,
            Err(err) => describe_error(&err),
        };
        say(&mut output, reply).await?;
    }

    output.flush().await?;
    Ok(())
}

async fn execute(tracker: &SessionAccrualTracker, command: Command) -> Result<String> {
    let reply = match command {
        Command::Start => {
            let snapshot = tracker.start().await?;
            format!(
                "session open since {}",
                snapshot.entry_time.unwrap_or_default()
            )
        }
        Command::Activity(input) => {
            let mut activity = Activity::new(input.title, input.description);
            if let Some(observations) = input.observations {
                activity = activity.with_observations(observations);
            }
            for path in &input.files {
                activity = activity.with_evidence(EvidenceUpload::from_path(path).await?);
            }
            let snapshot = tracker.add_activity(activity).await?;
            format!(
                "activity {} registered ({} evidence file(s) so far)",
                snapshot.activity_titles.len(),
                snapshot.evidence_count
            )
        }
        Command::Close => {
            let record = tracker.close().await?;
            format!("record saved: {}", describe_record(&record))
        }
        Command::History => {
            let records = tracker.history_newest_first().await;
            if records.is_empty() {
                "no records".to_string()
            } else {
                records
                    .iter()
                    .map(describe_record)
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Command::Day(date) => match tracker.record_for_day(&date).await {
            Some(record) => {
                let mut lines = vec![describe_record(&record)];
                if !record.activity_description.is_empty() {
                    lines.push(record.activity_description.clone());
                }
                if !record.observations.is_empty() {
                    lines.push(format!("observations: {}", record.observations));
                }
                for file in &record.evidence_files {
                    let line = format!("evidence: {} {}", file.name, file.url);
                    lines.push(line.trim_end().to_string());
                }
                lines.join("\n")
            }
            None => format!("no record for {date}"),
        },
        Command::Progress => {
            let progress = tracker.progress().await;
            let summary = format!(
                "total: {}; started: {}; completed: {}",
                progress.describe_total(),
                show_date(progress.service_start_date),
                show_date(progress.service_completion_date),
            );
            if progress.is_complete() {
                format!("{summary}; service hours complete")
            } else {
                format!(
                    "{summary}; remaining: {} ({:.1}% done)",
                    format_hours(progress.remaining_hours()),
                    progress.percent_complete()
                )
            }
        }
        Command::Status => {
            let snapshot = tracker.snapshot().await;
            match snapshot.status {
                SessionStatus::Open => format!(
                    "open since {} with {} activit{}",
                    snapshot.entry_time.unwrap_or_default(),
                    snapshot.activity_titles.len(),
                    if snapshot.activity_titles.len() == 1 { "y" } else { "ies" }
                ),
                SessionStatus::Idle | SessionStatus::Closed => "idle".to_string(),
            }
        }
        Command::Help => format!(
            "commands: start, {ACTIVITY_USAGE}, close, history, day YYYY-MM-DD, progress, \
             status, quit"
        ),
        Command::Quit => String::new(),
    };
    Ok(reply)
}

fn describe_record(record: &ServiceRecord) -> String {
    let mut line = format!(
        "{} {}-{} {}",
        record.date,
        record.entry_time,
        record.exit_time,
        format_hours(record.hours_worked)
    );
    if !record.activity_title.is_empty() {
        line.push_str(" - ");
        line.push_str(&record.activity_title);
    }
    line
}

/// Failures worth repeating unchanged say so.
fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TrackerError>() {
        Some(tracker_err) if tracker_err.is_retryable() => {
            format!("error: {err} (try again)")
        }
        _ => format!("error: {err}"),
    }
}

fn show_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

async fn say<W: AsyncWrite + Unpin>(output: &mut W, line: String) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await
}
