use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

const DRAFT_KEY_PREFIX: &str = "skipintro:";

/// Unsaved editor text for one episode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Draft {
    pub(crate) start: String,
    pub(crate) end: String,
}

pub(crate) trait DraftStore {
    fn load(&self, episode_id: &str) -> Option<Draft>;
    fn save(&mut self, episode_id: &str, draft: &Draft);
    fn clear(&mut self, episode_id: &str);
}

fn draft_key(episode_id: &str) -> String {
    format!("{DRAFT_KEY_PREFIX}{episode_id}")
}

/// Drafts kept in a JSON object on disk, keyed `skipintro:<episodeId>`.
#[derive(Debug)]
pub(crate) struct JsonDraftStore {
    path: PathBuf,
    drafts: BTreeMap<String, Draft>,
}

impl JsonDraftStore {
    pub(crate) fn open(path: PathBuf) -> Result<Self> {
        let drafts = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(drafts) => drafts,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "ignoring unreadable drafts file");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read drafts at {}", path.display()));
            }
        };
        Ok(Self { path, drafts })
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create drafts directory {}", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(&self.drafts).context("failed to encode drafts")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write drafts at {}", self.path.display()))
    }

    fn flush_or_warn(&self) {
        if let Err(err) = self.flush() {
            warn!(error = %err, "draft not persisted");
        }
    }
}

impl DraftStore for JsonDraftStore {
    fn load(&self, episode_id: &str) -> Option<Draft> {
        self.drafts.get(&draft_key(episode_id)).cloned()
    }

    fn save(&mut self, episode_id: &str, draft: &Draft) {
        self.drafts.insert(draft_key(episode_id), draft.clone());
        self.flush_or_warn();
    }

    fn clear(&mut self, episode_id: &str) {
        if self.drafts.remove(&draft_key(episode_id)).is_some() {
            self.flush_or_warn();
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemoryDraftStore {
    drafts: BTreeMap<String, Draft>,
}

impl DraftStore for MemoryDraftStore {
    fn load(&self, episode_id: &str) -> Option<Draft> {
        self.drafts.get(&draft_key(episode_id)).cloned()
    }

    fn save(&mut self, episode_id: &str, draft: &Draft) {
        self.drafts.insert(draft_key(episode_id), draft.clone());
    }

    fn clear(&mut self, episode_id: &str) {
        self.drafts.remove(&draft_key(episode_id));
    }
}
