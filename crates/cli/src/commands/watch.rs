// `tripline watch`: stream a day's comments.
//
// Prints the current list, then one line per change until Ctrl-C. While
// the push channel is degraded, pressing Enter asks for a reconnect.

use std::collections::HashSet;

use clap::Args;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tripline_common::types::{Comment, CommentId};
use tripline_sync::{ErrorCode, SessionStatus, SyncMode};

use super::{GlobalArgs, RoomArgs, Session};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    room: RoomArgs,
    /// Print the current comments and exit.
    #[arg(long)]
    once: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WatchEvent {
    Comment { comment: Comment },
    Removed { comment_id: CommentId },
    Status { mode: &'static str },
    PushError { message: String },
}

pub fn run(global: &GlobalArgs, args: WatchArgs) -> anyhow::Result<()> {
    let format = global.format();
    super::block_on(async {
        let session = global.open(&args.room).await?;
        let result = stream(&session, format, args.once).await;
        session.stop();
        result
    })?
}

async fn stream(session: &Session, format: OutputFormat, once: bool) -> anyhow::Result<()> {
    let mut feed = Feed::default();
    let mut comments = session.subscribe();
    let mut status = session.watch_status();

    let snapshot = comments.borrow_and_update().clone();
    emit(format, feed.update(&snapshot))?;
    if once {
        return Ok(());
    }

    let mut last = status.borrow_and_update().clone();
    emit(format, vec![WatchEvent::Status { mode: mode_label(last.mode) }])?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = comments.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = comments.borrow_and_update().clone();
                emit(format, feed.update(&snapshot))?;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = status.borrow_and_update().clone();
                emit(format, status_events(&last, &next))?;
                if next.mode == SyncMode::Degraded && last.mode != SyncMode::Degraded {
                    output::print_warning(
                        format,
                        ErrorCode::TransportUnavailable.as_str(),
                        "live updates are unavailable; press Enter to reconnect",
                    );
                }
                if next.mode == SyncMode::Closed {
                    break;
                }
                last = next;
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) if last.mode == SyncMode::Degraded => session.reconnect(),
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => stdin_open = false,
            },
        }
    }
    Ok(())
}

fn emit(format: OutputFormat, events: Vec<WatchEvent>) -> std::io::Result<()> {
    for event in &events {
        output::print_output(format, event, format_human)?;
    }
    Ok(())
}

/// Turns successive comment snapshots into add/remove events.
#[derive(Debug, Default)]
struct Feed {
    seen: Vec<CommentId>,
}

impl Feed {
    fn update(&mut self, comments: &[Comment]) -> Vec<WatchEvent> {
        let current: HashSet<&CommentId> = comments.iter().map(|c| &c.id).collect();
        let previous: HashSet<&CommentId> = self.seen.iter().collect();

        let mut events: Vec<WatchEvent> = self
            .seen
            .iter()
            .filter(|id| !current.contains(id))
            .map(|id| WatchEvent::Removed { comment_id: id.clone() })
            .collect();
        events.extend(
            comments
                .iter()
                .filter(|c| !previous.contains(&c.id))
                .map(|c| WatchEvent::Comment { comment: c.clone() }),
        );

        self.seen = comments.iter().map(|c| c.id.clone()).collect();
        events
    }
}

fn status_events(last: &SessionStatus, next: &SessionStatus) -> Vec<WatchEvent> {
    let mut events = Vec::new();
    if next.mode != last.mode {
        events.push(WatchEvent::Status { mode: mode_label(next.mode) });
    }
    if next.last_push_error != last.last_push_error {
        if let Some(message) = &next.last_push_error {
            events.push(WatchEvent::PushError { message: message.clone() });
        }
    }
    events
}

fn mode_label(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Connecting => "connecting",
        SyncMode::Live => "live",
        SyncMode::Reconnecting => "reconnecting",
        SyncMode::Degraded => "degraded",
        SyncMode::Closed => "closed",
    }
}

fn format_human(event: &WatchEvent) -> String {
    match event {
        WatchEvent::Comment { comment } => format!(
            "[{}] {}: {}  ({})",
            comment.created_at.format("%Y-%m-%d %H:%M"),
            comment.author_name,
            comment.text,
            comment.id
        ),
        WatchEvent::Removed { comment_id } => format!("- removed {comment_id}"),
        WatchEvent::Status { mode } => format!("-- {mode} --"),
        WatchEvent::PushError { message } => format!("! server: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tripline_common::types::UserId;

    use super::*;

    fn comment(id: &str, text: &str) -> Comment {
        Comment {
            id: CommentId::from(id),
            author_id: UserId::from("ana"),
            author_name: "Ana".into(),
            text: text.into(),
            created_at: Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn first_snapshot_lists_everything() {
        let mut feed = Feed::default();
        let events = feed.update(&[comment("c1", "a"), comment("c2", "b")]);
        assert_eq!(
            events,
            vec![
                WatchEvent::Comment { comment: comment("c1", "a") },
                WatchEvent::Comment { comment: comment("c2", "b") },
            ]
        );
    }

    #[test]
    fn later_snapshots_report_only_changes() {
        let mut feed = Feed::default();
        feed.update(&[comment("c1", "a"), comment("c2", "b")]);

        let events = feed.update(&[comment("c2", "b"), comment("c3", "c")]);
        assert_eq!(
            events,
            vec![
                WatchEvent::Removed { comment_id: CommentId::from("c1") },
                WatchEvent::Comment { comment: comment("c3", "c") },
            ]
        );
        assert!(feed.update(&[comment("c2", "b"), comment("c3", "c")]).is_empty());
    }

    #[test]
    fn status_changes_and_push_errors_become_events() {
        let live = SessionStatus { mode: SyncMode::Live, ..SessionStatus::default() };
        let errored = SessionStatus { last_push_error: Some("Access denied".into()), ..live.clone() };
        assert_eq!(
            status_events(&live, &errored),
            vec![WatchEvent::PushError { message: "Access denied".into() }]
        );

        let degraded = SessionStatus { mode: SyncMode::Degraded, ..errored.clone() };
        assert_eq!(status_events(&errored, &degraded), vec![WatchEvent::Status { mode: "degraded" }]);
    }

    #[test]
    fn human_format_shows_author_and_time() {
        let line = format_human(&WatchEvent::Comment { comment: comment("c1", "tram 28 at noon") });
        assert_eq!(line, "[2026-05-01 09:30] Ana: tram 28 at noon  (c1)");
        assert_eq!(format_human(&WatchEvent::Status { mode: "live" }), "-- live --");
    }

    #[test]
    fn json_events_are_tagged() {
        let value = serde_json::to_value(WatchEvent::Removed { comment_id: CommentId::from("c9") })
            .unwrap();
        assert_eq!(value, serde_json::json!({ "event": "removed", "comment_id": "c9" }));
    }
}
