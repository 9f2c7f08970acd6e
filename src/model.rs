use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical skip range for one episode, as stored and served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SkipRange {
    pub(crate) episode_id: String,
    pub(crate) start: f64,
    pub(crate) end: f64,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) offsets: BTreeMap<String, f64>,
    #[serde(default)]
    pub(crate) created_at: String,
    #[serde(default)]
    pub(crate) updated_at: String,
}

impl SkipRange {
    pub(crate) fn offset_for(&self, file_id: Option<&str>) -> f64 {
        file_id
            .and_then(|id| self.offsets.get(id))
            .copied()
            .unwrap_or(0.0)
    }
}

/// A range as returned by `GET /ranges/{episodeId}`: the stored record plus
/// the offset resolved for the requested file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FetchedRange {
    #[serde(flatten)]
    pub(crate) range: SkipRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) offset: Option<f64>,
}

/// Body of `POST /ranges`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveRequest {
    pub(crate) episode_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) file_id: Option<String>,
    pub(crate) start: f64,
    pub(crate) end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) title: Option<String>,
}

impl SaveRequest {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.episode_id.trim().is_empty() {
            return Err("episodeId is required".to_string());
        }
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err("start and end must be finite numbers".to_string());
        }
        if self.start < 0.0 {
            return Err("start must not be negative".to_string());
        }
        if self.end <= self.start {
            return Err("end must be greater than start".to_string());
        }
        if let Some(offset) = self.offset
            && !offset.is_finite()
        {
            return Err("offset must be a finite number".to_string());
        }
        Ok(())
    }
}

/// The range the client acts on for the file currently playing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActiveRange {
    pub(crate) start: f64,
    pub(crate) end: f64,
    pub(crate) offset: f64,
    pub(crate) title: Option<String>,
}

impl ActiveRange {
    pub(crate) fn from_fetched(fetched: &FetchedRange, file_id: Option<&str>) -> Self {
        let offset = fetched
            .offset
            .unwrap_or_else(|| fetched.range.offset_for(file_id));
        Self {
            start: fetched.range.start,
            end: fetched.range.end,
            offset,
            title: fetched.range.title.clone(),
        }
    }

    pub(crate) fn window_start(&self) -> f64 {
        self.start + self.offset
    }

    pub(crate) fn skip_target(&self) -> f64 {
        self.end + self.offset
    }

    pub(crate) fn contains(&self, time: f64) -> bool {
        time >= self.window_start() && time < self.skip_target()
    }

    /// `start == 0 && end == 0` marks an episode nobody has timed yet.
    pub(crate) fn is_unset(&self) -> bool {
        self.start == 0.0 && self.end == 0.0
    }
}

/// What a playback session has learned about the stored range.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum KnownRange {
    /// No fetch has answered yet, or the last one failed.
    #[default]
    Unknown,
    /// The service confirmed the episode has no range.
    Empty,
    Found(ActiveRange),
}

impl KnownRange {
    pub(crate) fn range(&self) -> Option<&ActiveRange> {
        match self {
            Self::Found(range) => Some(range),
            Self::Unknown | Self::Empty => None,
        }
    }

    /// The offset to send with a range save; `None` leaves the stored one alone.
    pub(crate) fn save_offset(&self) -> Option<f64> {
        match self {
            Self::Found(range) => Some(range.offset),
            Self::Empty => Some(0.0),
            Self::Unknown => None,
        }
    }
}
