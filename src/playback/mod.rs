mod bridge;
mod controller;
mod session;
mod tracker;

pub(crate) use bridge::{
    MetaItem, PlayerBridge, PlayerState, PollPolicy, SeriesInfo, wait_for_player_state,
};
pub(crate) use controller::{JobResult, Notice, PlaybackController, run_job};
pub(crate) use tracker::{HighlightSpan, PlayerSurface};
