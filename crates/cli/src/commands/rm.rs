// `tripline rm`: delete a comment from a day.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tripline_common::types::CommentId;

use super::{GlobalArgs, RoomArgs};
use crate::output;

#[derive(Debug, Args)]
pub struct RmArgs {
    #[command(flatten)]
    room: RoomArgs,
    /// Id of the comment to delete.
    comment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmResult {
    pub removed: CommentId,
}

pub fn run(global: &GlobalArgs, args: RmArgs) -> anyhow::Result<()> {
    let format = global.format();
    let comment_id = CommentId::parse(args.comment_id.as_str())?;
    super::block_on(async {
        let session = global.open(&args.room).await?;
        let result = session.remove(&comment_id).await;
        session.stop();
        result.with_context(|| format!("failed to delete {comment_id}"))
    })??;
    output::print_output(format, &RmResult { removed: comment_id }, |r| {
        format!("Removed {}.", r.removed)
    })?;
    Ok(())
}
