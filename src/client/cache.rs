use tracing::debug;

use super::RangeFetch;

/// Identity of what is playing: an episode played from one particular file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SessionKey {
    pub(crate) episode_id: String,
    pub(crate) file_id: String,
}

/// Handed out when a fetch starts; a result is only accepted if its ticket
/// is still the newest one for the current key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FetchTicket {
    pub(crate) key: SessionKey,
    pub(crate) generation: u64,
}

/// Single-slot cache for the range of the active episode/file pair.
#[derive(Debug, Default)]
pub(crate) struct RangeCache {
    key: Option<SessionKey>,
    value: Option<RangeFetch>,
    generation: u64,
}

impl RangeCache {
    pub(crate) fn lookup(&self, key: &SessionKey) -> Option<&RangeFetch> {
        if self.key.as_ref() == Some(key) {
            self.value.as_ref()
        } else {
            None
        }
    }

    /// Starts a fetch for `key`. A different key drops whatever was cached.
    pub(crate) fn begin(&mut self, key: &SessionKey) -> FetchTicket {
        if self.key.as_ref() != Some(key) {
            self.key = Some(key.clone());
            self.value = None;
        }
        self.generation += 1;
        FetchTicket {
            key: key.clone(),
            generation: self.generation,
        }
    }

    /// Stores `value` if the ticket is still current; returns whether it was.
    pub(crate) fn complete(&mut self, ticket: &FetchTicket, value: RangeFetch) -> bool {
        if !self.is_current(ticket) {
            debug!(
                episode_id = %ticket.key.episode_id,
                generation = ticket.generation,
                "discarding stale range fetch"
            );
            return false;
        }
        self.value = Some(value);
        true
    }

    pub(crate) fn is_current(&self, ticket: &FetchTicket) -> bool {
        self.key.as_ref() == Some(&ticket.key) && self.generation == ticket.generation
    }

    /// Forgets the cached value; in-flight tickets become stale.
    pub(crate) fn invalidate(&mut self) {
        self.value = None;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActiveRange;

    fn key(episode: &str, file: &str) -> SessionKey {
        SessionKey {
            episode_id: episode.to_string(),
            file_id: file.to_string(),
        }
    }

    fn found(start: f64, end: f64) -> RangeFetch {
        RangeFetch::Found(ActiveRange {
            start,
            end,
            offset: 0.0,
            title: None,
        })
    }

    #[test]
    fn completed_fetch_is_served_for_same_key_only() {
        let mut cache = RangeCache::default();
        let ticket = cache.begin(&key("a:1", "f1"));
        assert!(cache.complete(&ticket, found(1.0, 2.0)));

        assert_eq!(cache.lookup(&key("a:1", "f1")), Some(&found(1.0, 2.0)));
        assert_eq!(cache.lookup(&key("a:1", "f2")), None);
    }

    #[test]
    fn new_key_invalidates_cache_and_older_tickets() {
        let mut cache = RangeCache::default();
        let first = cache.begin(&key("a:1", "f1"));
        let second = cache.begin(&key("b:2", "f1"));

        assert!(!cache.complete(&first, found(1.0, 2.0)));
        assert_eq!(cache.lookup(&key("a:1", "f1")), None);
        assert!(cache.complete(&second, RangeFetch::Empty));
        assert_eq!(cache.lookup(&key("b:2", "f1")), Some(&RangeFetch::Empty));
    }

    #[test]
    fn refetch_for_same_key_supersedes_earlier_ticket() {
        let mut cache = RangeCache::default();
        let early = cache.begin(&key("a:1", "f1"));
        let late = cache.begin(&key("a:1", "f1"));

        assert!(!cache.is_current(&early));
        assert!(cache.complete(&late, found(5.0, 9.0)));
    }

    #[test]
    fn invalidate_clears_value_and_stales_in_flight_fetch() {
        let mut cache = RangeCache::default();
        let ticket = cache.begin(&key("a:1", "f1"));
        assert!(cache.complete(&ticket, found(1.0, 2.0)));
        let in_flight = cache.begin(&key("a:1", "f1"));

        cache.invalidate();

        assert_eq!(cache.lookup(&key("a:1", "f1")), None);
        assert!(!cache.complete(&in_flight, found(3.0, 4.0)));
    }
}
