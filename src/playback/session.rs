use crate::client::SessionKey;
use crate::editor::Draft;
use crate::model::KnownRange;

use super::bridge::PlayerMetadata;

pub(crate) const UNKNOWN_FILE_ID: &str = "unknown";

/// 32-bit rolling hash of the stream URL (`h = h * 31 + unit` over UTF-16
/// units), printed as its absolute value. Only tells sources apart.
pub(crate) fn file_id_for_stream(stream_url: Option<&str>) -> String {
    let Some(url) = stream_url.filter(|url| !url.is_empty()) else {
        return UNKNOWN_FILE_ID.to_string();
    };
    let mut hash: i32 = 0;
    for unit in url.encode_utf16() {
        hash = hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(i32::from(unit));
    }
    hash.unsigned_abs().to_string()
}

/// Everything the client knows about the video currently playing.
#[derive(Debug, Clone)]
pub(crate) struct PlaybackSession {
    pub(crate) key: SessionKey,
    pub(crate) title: String,
    pub(crate) known: KnownRange,
    pub(crate) draft: Option<Draft>,
}

impl PlaybackSession {
    pub(crate) fn from_metadata(metadata: &PlayerMetadata) -> Self {
        Self {
            key: SessionKey {
                episode_id: metadata.episode_id(),
                file_id: file_id_for_stream(metadata.stream_url.as_deref()),
            },
            title: metadata.display_title(),
            known: KnownRange::Unknown,
            draft: None,
        }
    }

    pub(crate) fn episode_id(&self) -> &str {
        &self.key.episode_id
    }

    pub(crate) fn file_id(&self) -> &str {
        &self.key.file_id
    }
}
