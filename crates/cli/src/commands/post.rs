// `tripline post`: add a comment to a day.

use std::collections::HashSet;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tripline_common::types::{Comment, CommentId};
use tripline_sync::SubmitOutcome;

use super::{GlobalArgs, RoomArgs, Session};
use crate::output;

/// How long to wait for the push broadcast of our own comment.
const ECHO_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Args)]
pub struct PostArgs {
    #[command(flatten)]
    room: RoomArgs,
    /// Comment text.
    text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostResult {
    /// `push` or `pull`: which path carried the write.
    pub delivery: &'static str,
    /// Missing when the push broadcast did not come back in time.
    pub comment: Option<Comment>,
}

pub fn run(global: &GlobalArgs, args: PostArgs) -> anyhow::Result<()> {
    let format = global.format();
    let result = super::block_on(async {
        let session = global.open(&args.room).await?;
        let result = post(&session, &args.text).await;
        session.stop();
        result
    })??;
    output::print_output(format, &result, format_human)?;
    Ok(())
}

async fn post(session: &Session, text: &str) -> anyhow::Result<PostResult> {
    let known: HashSet<CommentId> = session.comments().iter().map(|c| c.id.clone()).collect();
    let mut comments = session.subscribe();

    match session.submit(text).await? {
        SubmitOutcome::Stored(comment) => Ok(PostResult { delivery: "pull", comment: Some(comment) }),
        SubmitOutcome::Broadcast => {
            let author = session.user_id().clone();
            let text = text.trim();
            let echo = tokio::time::timeout(
                ECHO_TIMEOUT,
                comments.wait_for(|list| {
                    list.iter().any(|c| !known.contains(&c.id) && c.author_id == author && c.text == text)
                }),
            )
            .await;
            let comment = match echo {
                Ok(Ok(list)) => list
                    .iter()
                    .find(|c| !known.contains(&c.id) && c.author_id == author && c.text == text)
                    .cloned(),
                _ => None,
            };
            Ok(PostResult { delivery: "push", comment })
        }
    }
}

fn format_human(result: &PostResult) -> String {
    match &result.comment {
        Some(comment) => format!("Posted {} via {}.", comment.id, result.delivery),
        None => format!("Sent via {}; the broadcast has not arrived yet.", result.delivery),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tripline_common::types::UserId;

    use super::*;

    #[test]
    fn human_format_names_the_comment() {
        let result = PostResult {
            delivery: "pull",
            comment: Some(Comment {
                id: CommentId::from("c42"),
                author_id: UserId::from("ana"),
                author_name: "Ana".into(),
                text: "hi".into(),
                created_at: Utc::now(),
            }),
        };
        assert_eq!(format_human(&result), "Posted c42 via pull.");
    }

    #[test]
    fn human_format_without_echo() {
        let result = PostResult { delivery: "push", comment: None };
        assert!(format_human(&result).contains("has not arrived"));
    }
}
