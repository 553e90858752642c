// Wire protocols: push-channel frames and the pull API envelope.

pub mod push;
pub mod rest;
