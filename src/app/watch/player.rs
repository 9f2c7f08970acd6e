use std::time::Duration;

use crate::cli::WatchArgs;
use crate::playback::{
    HighlightSpan, MetaItem, PlayerBridge, PlayerState, PlayerSurface, SeriesInfo,
};

const SEEK_STEP_SECS: f64 = 5.0;

/// A host player without video: a clock, a duration and the elements the
/// client is allowed to add to it.
#[derive(Debug)]
pub(super) struct SimulatedPlayer {
    state: PlayerState,
    time: f64,
    duration: f64,
    paused: bool,
    skip_action: Option<f64>,
    upgrade_prompt: bool,
    highlight: Option<HighlightSpan>,
}

impl SimulatedPlayer {
    pub(super) fn from_args(args: &WatchArgs) -> Self {
        let series_info = (args.season.is_some() || args.episode.is_some()).then_some(SeriesInfo {
            season: args.season,
            episode: args.episode,
        });
        Self {
            state: PlayerState {
                meta: Some(MetaItem {
                    id: args.content_id.trim().to_string(),
                    name: args.name.clone(),
                }),
                series_info,
                stream_url: args.stream_url.clone(),
            },
            time: 0.0,
            duration: args.duration.max(1.0),
            paused: false,
            skip_action: None,
            upgrade_prompt: false,
            highlight: None,
        }
    }

    /// Moves the clock forward; playback stops at the end.
    pub(super) fn advance(&mut self, elapsed: Duration) {
        if self.paused {
            return;
        }
        self.time = (self.time + elapsed.as_secs_f64()).min(self.duration);
        if self.time >= self.duration {
            self.paused = true;
        }
    }

    pub(super) fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub(super) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(super) fn seek_by(&mut self, forward: bool) {
        let delta = if forward { SEEK_STEP_SECS } else { -SEEK_STEP_SECS };
        self.seek(self.time + delta);
    }

    /// Digit keys jump to tenths of the video, like most web players.
    pub(super) fn seek_to_tenth(&mut self, digit: u32) {
        self.seek(self.duration * f64::from(digit.min(9)) / 10.0);
    }

    pub(super) fn progress_ratio(&self) -> f64 {
        (self.time / self.duration).clamp(0.0, 1.0)
    }

    pub(super) fn skip_action(&self) -> Option<f64> {
        self.skip_action
    }

    pub(super) fn upgrade_prompt(&self) -> bool {
        self.upgrade_prompt
    }

    pub(super) fn highlight(&self) -> Option<HighlightSpan> {
        self.highlight
    }
}

impl PlayerBridge for SimulatedPlayer {
    fn player_state(&mut self) -> Option<PlayerState> {
        Some(self.state.clone())
    }
}

impl PlayerSurface for SimulatedPlayer {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration)
    }

    fn seek(&mut self, to: f64) {
        self.time = to.clamp(0.0, self.duration);
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn has_skip_action(&self) -> bool {
        self.skip_action.is_some()
    }

    fn show_skip_action(&mut self, target: f64) {
        self.skip_action = Some(target);
    }

    fn remove_skip_action(&mut self) {
        self.skip_action = None;
    }

    fn has_upgrade_prompt(&self) -> bool {
        self.upgrade_prompt
    }

    fn show_upgrade_prompt(&mut self) {
        self.upgrade_prompt = true;
    }

    fn set_highlight(&mut self, span: Option<HighlightSpan>) {
        self.highlight = span;
    }
}
