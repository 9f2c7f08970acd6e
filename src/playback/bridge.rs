use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

pub(crate) const PLAYER_STATE_POLL_INTERVAL: Duration = Duration::from_millis(300);
pub(crate) const PLAYER_STATE_MAX_POLLS: usize = 200;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct MetaItem {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) struct SeriesInfo {
    #[serde(default)]
    pub(crate) season: Option<u32>,
    #[serde(default)]
    pub(crate) episode: Option<u32>,
}

/// Snapshot of what the host application reports about its player. The
/// metadata is absent until the host has loaded it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlayerState {
    #[serde(default)]
    pub(crate) meta: Option<MetaItem>,
    #[serde(default)]
    pub(crate) series_info: Option<SeriesInfo>,
    #[serde(default)]
    pub(crate) stream_url: Option<String>,
}

/// Metadata of a loaded player, from which session identity is derived.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlayerMetadata {
    pub(crate) meta: MetaItem,
    pub(crate) series_info: Option<SeriesInfo>,
    pub(crate) stream_url: Option<String>,
}

impl PlayerState {
    pub(crate) fn into_metadata(self) -> Option<PlayerMetadata> {
        let meta = self.meta?;
        Some(PlayerMetadata {
            meta,
            series_info: self.series_info,
            stream_url: self.stream_url,
        })
    }
}

impl PlayerMetadata {
    pub(crate) fn episode_id(&self) -> String {
        let episode = self
            .series_info
            .and_then(|info| info.episode)
            .unwrap_or(0);
        format!("{}:{episode}", self.meta.id)
    }

    pub(crate) fn display_title(&self) -> String {
        let name = self
            .meta
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or("Unknown Title");
        match self.series_info {
            Some(SeriesInfo {
                season: Some(season),
                episode: Some(episode),
            }) => format!("{name} S{season:02}E{episode:02}"),
            _ => name.to_string(),
        }
    }
}

/// Privileged read access to the host application's player state.
pub(crate) trait PlayerBridge {
    fn player_state(&mut self) -> Option<PlayerState>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollPolicy {
    pub(crate) interval: Duration,
    pub(crate) max_polls: Option<usize>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: PLAYER_STATE_POLL_INTERVAL,
            max_polls: Some(PLAYER_STATE_MAX_POLLS),
        }
    }
}

/// Polls the bridge until player metadata is available, sleeping between
/// polls. Gives up after `max_polls` when a bound is set.
pub(crate) fn wait_for_player_state(
    bridge: &mut dyn PlayerBridge,
    policy: PollPolicy,
    mut sleep: impl FnMut(Duration),
) -> Option<PlayerMetadata> {
    let mut polls = 0;
    loop {
        polls += 1;
        if let Some(metadata) = bridge.player_state().and_then(PlayerState::into_metadata) {
            return Some(metadata);
        }
        if policy.max_polls.is_some_and(|max| polls >= max) {
            debug!(polls, "player state never became available");
            return None;
        }
        sleep(policy.interval);
    }
}
