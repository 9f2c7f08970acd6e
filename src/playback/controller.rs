use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::client::{FetchTicket, RangeCache, RangeFetch, RangeService, SessionKey, SyncError};
use crate::editor::{CloseReason, DraftStore, Editor, Focus, KeyTarget, OffsetPopup, SaveDecision};
use crate::model::{ActiveRange, KnownRange, SaveRequest, SkipRange};
use crate::version::{GateOutcome, VersionGate};

use super::bridge::PlayerMetadata;
use super::session::PlaybackSession;
use super::tracker::{PlaybackTracker, PlayerSurface, Zone};

pub(crate) const REFETCH_DELAY: Duration = Duration::from_millis(3000);
const OFFSET_WITHOUT_RANGE: &str = "Save a skip range before setting an offset.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveKind {
    Range,
    Offset,
}

/// Network work the controller wants done. Executed off the UI loop with
/// [`run_job`]; the result goes back through
/// [`PlaybackController::handle_result`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Job {
    ProbeVersion {
        generation: u64,
    },
    Fetch {
        ticket: FetchTicket,
        title: String,
    },
    Save {
        key: SessionKey,
        kind: SaveKind,
        request: SaveRequest,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobResult {
    Version {
        generation: u64,
        remote: Option<String>,
    },
    Fetched {
        ticket: FetchTicket,
        outcome: Result<RangeFetch, SyncError>,
    },
    Saved {
        key: SessionKey,
        kind: SaveKind,
        outcome: Result<SkipRange, SyncError>,
    },
}

pub(crate) fn run_job(service: &dyn RangeService, job: Job) -> JobResult {
    match job {
        Job::ProbeVersion { generation } => JobResult::Version {
            generation,
            remote: service.plugin_version(),
        },
        Job::Fetch { ticket, title } => {
            let outcome = service.fetch_range(
                &ticket.key.episode_id,
                Some(&ticket.key.file_id),
                Some(&title),
            );
            JobResult::Fetched { ticket, outcome }
        }
        Job::Save { key, kind, request } => JobResult::Saved {
            outcome: service.save_range(&request),
            key,
            kind,
        },
    }
}

/// Things the front end should tell the user about.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notice {
    UpdateAvailable { local: String, remote: String },
    UpdateRequired { local: String, remote: String },
    Saved,
    Invalid(String),
    SaveFailed(String),
}

/// Drives one watch session: detects video changes, gates on the plugin
/// version, keeps the cached range current and routes player and editor
/// events. It performs no IO itself.
pub(crate) struct PlaybackController {
    gate: VersionGate,
    cache: RangeCache,
    tracker: PlaybackTracker,
    editor: Editor,
    offset_popup: OffsetPopup,
    drafts: Box<dyn DraftStore>,
    session: Option<PlaybackSession>,
    generation: u64,
    version_checked: bool,
    refetch_at: Option<Instant>,
    jobs: Vec<Job>,
    notices: Vec<Notice>,
}

impl PlaybackController {
    pub(crate) fn new(local_version: impl Into<String>, drafts: Box<dyn DraftStore>) -> Self {
        Self {
            gate: VersionGate::new(local_version),
            cache: RangeCache::default(),
            tracker: PlaybackTracker::default(),
            editor: Editor::default(),
            offset_popup: OffsetPopup::default(),
            drafts,
            session: None,
            generation: 0,
            version_checked: false,
            refetch_at: None,
            jobs: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub(crate) fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub(crate) fn active_range(&self) -> Option<&ActiveRange> {
        self.tracker.range()
    }

    pub(crate) fn update_required(&self) -> bool {
        self.tracker.upgrade_required()
    }

    pub(crate) fn editor(&self) -> &Editor {
        &self.editor
    }

    /// Text editing and focus changes have no side effects beyond the form.
    pub(crate) fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub(crate) fn offset_popup(&self) -> &OffsetPopup {
        &self.offset_popup
    }

    pub(crate) fn offset_popup_mut(&mut self) -> &mut OffsetPopup {
        &mut self.offset_popup
    }

    pub(crate) fn take_jobs(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    pub(crate) fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Called whenever the bridge reports player metadata. A new episode or
    /// file starts a new session; the same pair again is ignored.
    pub(crate) fn on_video_detected(
        &mut self,
        metadata: &PlayerMetadata,
        surface: &mut dyn PlayerSurface,
    ) -> bool {
        let next = PlaybackSession::from_metadata(metadata);
        if self.session.as_ref().is_some_and(|session| session.key == next.key) {
            return false;
        }

        self.close_editor(CloseReason::Toggle);
        self.offset_popup.close();
        info!(
            episode_id = %next.key.episode_id,
            file_id = %next.key.file_id,
            title = %next.title,
            "new video detected"
        );

        let mut session = next;
        session.draft = self.drafts.load(session.episode_id());
        self.session = Some(session);
        self.generation += 1;
        self.refetch_at = None;
        self.tracker.set_range(None, surface);

        if self.version_checked {
            self.start_fetch(surface);
        } else {
            self.jobs.push(Job::ProbeVersion {
                generation: self.generation,
            });
        }
        true
    }

    pub(crate) fn handle_result(
        &mut self,
        result: JobResult,
        surface: &mut dyn PlayerSurface,
        now: Instant,
    ) {
        match result {
            JobResult::Version { generation, remote } => {
                self.on_version(generation, remote.as_deref(), surface)
            }
            JobResult::Fetched { ticket, outcome } => self.on_fetched(ticket, outcome, surface),
            JobResult::Saved { key, kind, outcome } => self.on_saved(key, kind, outcome, now),
        }
    }

    fn on_version(&mut self, generation: u64, remote: Option<&str>, surface: &mut dyn PlayerSurface) {
        if generation != self.generation {
            debug!(generation, "discarding stale version probe");
            return;
        }
        self.version_checked = true;
        match self.gate.evaluate(remote) {
            GateOutcome::Proceed => {}
            GateOutcome::Remind { remote } => self.notices.push(Notice::UpdateAvailable {
                local: self.gate.local().to_string(),
                remote,
            }),
            GateOutcome::Block { remote } => {
                surface.pause();
                self.tracker.require_upgrade(surface);
                self.close_editor(CloseReason::Toggle);
                self.notices.push(Notice::UpdateRequired {
                    local: self.gate.local().to_string(),
                    remote,
                });
                return;
            }
        }
        self.start_fetch(surface);
    }

    fn start_fetch(&mut self, surface: &mut dyn PlayerSurface) {
        if self.tracker.upgrade_required() {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if let Some(cached) = self.cache.lookup(&session.key) {
            let known = cached.known();
            self.apply_range(known, surface);
            return;
        }
        let ticket = self.cache.begin(&session.key);
        self.jobs.push(Job::Fetch {
            ticket,
            title: session.title.clone(),
        });
    }

    fn on_fetched(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<RangeFetch, SyncError>,
        surface: &mut dyn PlayerSurface,
    ) {
        match outcome {
            Ok(fetch) => {
                let known = fetch.known();
                if self.cache.complete(&ticket, fetch) {
                    self.apply_range(known, surface);
                }
            }
            Err(err) => {
                if !self.cache.is_current(&ticket) {
                    return;
                }
                warn!(
                    episode_id = %ticket.key.episode_id,
                    error = %err,
                    "no skip range available for this session"
                );
                self.apply_range(KnownRange::Unknown, surface);
            }
        }
    }

    fn apply_range(&mut self, known: KnownRange, surface: &mut dyn PlayerSurface) {
        self.tracker.set_range(known.range().cloned(), surface);
        if let Some(session) = &mut self.session {
            session.known = known;
        }
    }

    fn on_saved(
        &mut self,
        key: SessionKey,
        kind: SaveKind,
        outcome: Result<SkipRange, SyncError>,
        now: Instant,
    ) {
        let current = self
            .session
            .as_ref()
            .is_some_and(|session| session.key == key);
        match outcome {
            Ok(_) => {
                if kind == SaveKind::Range {
                    self.drafts.clear(&key.episode_id);
                }
                if !current {
                    return;
                }
                if let Some(session) = &mut self.session {
                    session.draft = None;
                }
                match kind {
                    SaveKind::Range => self.editor.save_succeeded(),
                    SaveKind::Offset => self.offset_popup.save_finished(),
                }
                self.cache.invalidate();
                self.refetch_at = Some(now + REFETCH_DELAY);
                self.notices.push(Notice::Saved);
            }
            Err(err) => {
                warn!(episode_id = %key.episode_id, error = %err, "save did not go through");
                if !current {
                    return;
                }
                let message = err.to_string();
                match kind {
                    SaveKind::Range => self.editor.save_failed(&message),
                    SaveKind::Offset => self.offset_popup.save_finished(),
                }
                self.notices.push(Notice::SaveFailed(message));
            }
        }
    }

    /// Runs a due refetch. Call on every loop iteration.
    pub(crate) fn tick(&mut self, now: Instant, surface: &mut dyn PlayerSurface) {
        if let Some(due) = self.refetch_at
            && now >= due
        {
            self.refetch_at = None;
            debug!("refetching skip range after save");
            self.start_fetch(surface);
        }
    }

    pub(crate) fn on_time_update(&self, surface: &mut dyn PlayerSurface) -> Zone {
        self.tracker.on_time_update(surface)
    }

    pub(crate) fn on_seeked(&self, surface: &mut dyn PlayerSurface) -> Zone {
        self.tracker.on_seeked(surface)
    }

    pub(crate) fn skip(&self, surface: &mut dyn PlayerSurface) -> bool {
        self.tracker.invoke_skip(surface)
    }

    pub(crate) fn should_suppress_key(&self, key: char, target: KeyTarget) -> bool {
        self.editor.should_suppress_key(key, target)
    }

    /// The setup toggle: opens the editor, or closes it keeping a draft.
    pub(crate) fn toggle_editor(&mut self) {
        if self.editor.is_open() {
            self.close_editor(CloseReason::Toggle);
            return;
        }
        if self.tracker.upgrade_required() {
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        self.editor
            .open(session.draft.as_ref(), session.known.range());
    }

    /// Closes the editor (and its offset popup); typed values become the
    /// episode's draft.
    pub(crate) fn close_editor(&mut self, reason: CloseReason) {
        self.offset_popup.close();
        let Some(draft) = self.editor.close(reason) else {
            return;
        };
        if let Some(session) = &mut self.session {
            self.drafts.save(&session.key.episode_id, &draft);
            session.draft = Some(draft);
        }
    }

    /// The "now" button of whichever editor field has focus.
    pub(crate) fn editor_now(&mut self, surface: &dyn PlayerSurface) {
        if let Some(Focus::Field(field)) = self.editor.focus() {
            self.editor.set_now(field, surface.current_time());
        }
    }

    /// Enter in the editor: the offset button opens the offset popup,
    /// anything else asks to save.
    pub(crate) fn editor_activate(&mut self) {
        match self.editor.focus() {
            Some(Focus::OffsetButton) => self.open_offset_popup(),
            Some(_) => self.request_save(),
            None => {}
        }
    }

    pub(crate) fn request_save(&mut self) {
        let known = self
            .session
            .as_ref()
            .map(|session| session.known.clone())
            .unwrap_or_default();
        match self.editor.request_save(&known) {
            SaveDecision::Ignored | SaveDecision::NeedsConfirmation(_) => {}
            SaveDecision::Unchanged => debug!("skip range unchanged, nothing to save"),
            SaveDecision::Invalid(message) => self.notices.push(Notice::Invalid(message)),
            SaveDecision::Submit(pending) => self.submit_range(pending.start, pending.end),
        }
    }

    pub(crate) fn confirm_save(&mut self) {
        if let Some(pending) = self.editor.confirm() {
            self.submit_range(pending.start, pending.end);
        }
    }

    pub(crate) fn cancel_save(&mut self) {
        self.editor.cancel_confirmation();
    }

    fn submit_range(&mut self, start: f64, end: f64) {
        let Some(session) = &self.session else {
            return;
        };
        let offset = session.known.save_offset();
        self.queue_save(SaveKind::Range, start, end, offset);
    }

    pub(crate) fn open_offset_popup(&mut self) {
        let offset = self
            .session
            .as_ref()
            .and_then(|session| session.known.range())
            .map_or(0.0, |range| range.offset);
        self.offset_popup.open(offset);
    }

    pub(crate) fn offset_now(&mut self, surface: &dyn PlayerSurface) {
        let start = self
            .session
            .as_ref()
            .and_then(|session| session.known.range())
            .map_or(0.0, |range| range.start);
        self.offset_popup.set_now(surface.current_time(), start);
    }

    /// Saves only this file's offset, leaving start and end as stored.
    pub(crate) fn submit_offset(&mut self) {
        let range = self
            .session
            .as_ref()
            .and_then(|session| session.known.range().cloned())
            .filter(|range| !range.is_unset());
        let Some(range) = range else {
            self.offset_popup.close();
            self.notices
                .push(Notice::Invalid(OFFSET_WITHOUT_RANGE.to_string()));
            return;
        };
        if let Some(offset) = self.offset_popup.submit() {
            self.queue_save(SaveKind::Offset, range.start, range.end, Some(offset));
        }
    }

    fn queue_save(&mut self, kind: SaveKind, start: f64, end: f64, offset: Option<f64>) {
        let Some(session) = &self.session else {
            return;
        };
        let request = SaveRequest {
            episode_id: session.key.episode_id.clone(),
            file_id: Some(session.key.file_id.clone()),
            start,
            end,
            offset,
            title: Some(session.title.clone()),
        };
        info!(
            episode_id = %request.episode_id,
            file_id = %session.key.file_id,
            start,
            end,
            ?offset,
            ?kind,
            "submitting skip range"
        );
        self.jobs.push(Job::Save {
            key: session.key.clone(),
            kind,
            request,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use super::*;
    use crate::editor::{Draft, EditorState, Field, MemoryDraftStore};
    use crate::playback::bridge::{MetaItem, SeriesInfo};
    use crate::playback::tracker::fake::FakeSurface;

    fn metadata(id: &str, episode: u32, stream: &str) -> PlayerMetadata {
        PlayerMetadata {
            meta: MetaItem {
                id: id.to_string(),
                name: Some("Show".to_string()),
            },
            series_info: Some(SeriesInfo {
                season: Some(1),
                episode: Some(episode),
            }),
            stream_url: Some(stream.to_string()),
        }
    }

    fn range(start: f64, end: f64, offset: f64) -> ActiveRange {
        ActiveRange {
            start,
            end,
            offset,
            title: None,
        }
    }

    fn controller() -> PlaybackController {
        PlaybackController::new("1.1.0", Box::new(MemoryDraftStore::default()))
    }

    /// Service that answers from a fixed table and records saves.
    #[derive(Default)]
    struct ScriptedService {
        version: Option<String>,
        ranges: BTreeMap<String, ActiveRange>,
        saves: RefCell<Vec<SaveRequest>>,
        reject_saves: bool,
        fail_fetches: bool,
    }

    impl RangeService for ScriptedService {
        fn fetch_range(
            &self,
            episode_id: &str,
            _file_id: Option<&str>,
            _title: Option<&str>,
        ) -> Result<RangeFetch, SyncError> {
            if self.fail_fetches {
                return Err(SyncError::Transient {
                    attempts: 3,
                    detail: "HTTP status 502".to_string(),
                });
            }
            Ok(self
                .ranges
                .get(episode_id)
                .cloned()
                .map_or(RangeFetch::Empty, RangeFetch::Found))
        }

        fn save_range(&self, request: &SaveRequest) -> Result<SkipRange, SyncError> {
            self.saves.borrow_mut().push(request.clone());
            if self.reject_saves {
                return Err(SyncError::Persistence("HTTP status 500".to_string()));
            }
            Ok(SkipRange {
                episode_id: request.episode_id.clone(),
                start: request.start,
                end: request.end,
                title: request.title.clone(),
                offsets: BTreeMap::new(),
                created_at: String::new(),
                updated_at: String::new(),
            })
        }

        fn plugin_version(&self) -> Option<String> {
            self.version.clone()
        }
    }

    fn drain(
        controller: &mut PlaybackController,
        service: &ScriptedService,
        surface: &mut FakeSurface,
        now: Instant,
    ) {
        loop {
            let jobs = controller.take_jobs();
            if jobs.is_empty() {
                return;
            }
            for job in jobs {
                let result = run_job(service, job);
                controller.handle_result(result, surface, now);
            }
        }
    }

    #[test]
    fn detection_probes_version_then_fetches_and_tracks() {
        let service = ScriptedService {
            version: Some("1.1.0".to_string()),
            ranges: BTreeMap::from([("tt1:2".to_string(), range(30.0, 90.0, 0.0))]),
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface {
            time: 40.0,
            ..FakeSurface::default()
        };
        let mut controller = controller();

        assert!(controller.on_video_detected(&metadata("tt1", 2, "u1"), &mut surface));
        assert!(matches!(
            controller.take_jobs().as_slice(),
            [Job::ProbeVersion { .. }]
        ));
        controller.handle_result(
            JobResult::Version {
                generation: 1,
                remote: Some("1.1.0".to_string()),
            },
            &mut surface,
            Instant::now(),
        );
        drain(&mut controller, &service, &mut surface, Instant::now());

        assert_eq!(controller.active_range(), Some(&range(30.0, 90.0, 0.0)));
        assert_eq!(surface.skip_action, Some(90.0));
    }

    #[test]
    fn same_video_reported_twice_is_one_session() {
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        assert!(controller.on_video_detected(&metadata("tt1", 2, "u1"), &mut surface));
        assert!(!controller.on_video_detected(&metadata("tt1", 2, "u1"), &mut surface));
        assert_eq!(controller.take_jobs().len(), 1);
    }

    #[test]
    fn stale_fetch_result_is_discarded_after_episode_change() {
        let service = ScriptedService {
            ranges: BTreeMap::from([
                ("tt1:1".to_string(), range(10.0, 20.0, 0.0)),
                ("tt1:2".to_string(), range(30.0, 90.0, 0.0)),
            ]),
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();

        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);
        controller.on_video_detected(&metadata("tt1", 2, "u2"), &mut surface);
        let episode_two_jobs = controller.take_jobs();

        // A late answer for episode 1 arrives after the switch.
        let old_ticket = FetchTicket {
            key: SessionKey {
                episode_id: "tt1:1".to_string(),
                file_id: crate::playback::session::file_id_for_stream(Some("u1")),
            },
            generation: 1,
        };
        controller.handle_result(
            JobResult::Fetched {
                ticket: old_ticket,
                outcome: Ok(RangeFetch::Found(range(10.0, 20.0, 0.0))),
            },
            &mut surface,
            now,
        );
        assert_eq!(controller.active_range(), None);

        for job in episode_two_jobs {
            controller.handle_result(run_job(&service, job), &mut surface, now);
        }
        assert_eq!(controller.active_range(), Some(&range(30.0, 90.0, 0.0)));
    }

    #[test]
    fn breaking_version_pauses_and_blocks_fetching() {
        let mut surface = FakeSurface {
            time: 40.0,
            ..FakeSurface::default()
        };
        let mut controller = controller();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        controller.take_jobs();

        controller.handle_result(
            JobResult::Version {
                generation: 1,
                remote: Some("2.0.0".to_string()),
            },
            &mut surface,
            Instant::now(),
        );

        assert!(surface.paused);
        assert!(surface.upgrade_prompt);
        assert!(controller.update_required());
        assert!(controller.take_jobs().is_empty());
        assert!(matches!(
            controller.take_notices().as_slice(),
            [Notice::UpdateRequired { .. }]
        ));
        controller.toggle_editor();
        assert!(!controller.editor().is_open());
    }

    #[test]
    fn reminder_is_raised_once_and_does_not_block() {
        let service = ScriptedService {
            version: Some("1.2.0".to_string()),
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();

        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);
        assert!(matches!(
            controller.take_notices().as_slice(),
            [Notice::UpdateAvailable { .. }]
        ));

        controller.on_video_detected(&metadata("tt1", 2, "u1"), &mut surface);
        let jobs = controller.take_jobs();
        assert!(matches!(jobs.as_slice(), [Job::Fetch { .. }]));
        assert!(controller.take_notices().is_empty());
    }

    #[test]
    fn first_save_submits_then_refetches_after_delay() {
        let mut service = ScriptedService::default();
        let mut surface = FakeSurface {
            time: 45.0,
            ..FakeSurface::default()
        };
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt9", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);

        controller.toggle_editor();
        controller.editor_mut().set_now(Field::Start, 30.0);
        controller.editor_mut().set_now(Field::End, 90.0);
        controller.request_save();
        let jobs = controller.take_jobs();
        let [Job::Save { request, .. }] = jobs.as_slice() else {
            panic!("expected one save, got {jobs:?}");
        };
        assert_eq!((request.start, request.end), (30.0, 90.0));
        assert_eq!(request.offset, Some(0.0));
        assert_eq!(request.title.as_deref(), Some("Show S01E01"));

        for job in jobs {
            controller.handle_result(run_job(&service, job), &mut surface, now);
        }
        assert!(!controller.editor().is_open());
        assert_eq!(controller.take_notices(), vec![Notice::Saved]);

        service
            .ranges
            .insert("tt9:1".to_string(), range(30.0, 90.0, 0.0));
        controller.tick(now + Duration::from_millis(2999), &mut surface);
        assert!(controller.take_jobs().is_empty());
        controller.tick(now + REFETCH_DELAY, &mut surface);
        drain(&mut controller, &service, &mut surface, now);
        assert_eq!(controller.active_range(), Some(&range(30.0, 90.0, 0.0)));
        assert_eq!(surface.skip_action, Some(90.0));
    }

    #[test]
    fn editing_existing_range_needs_confirmation() {
        let service = ScriptedService {
            ranges: BTreeMap::from([("tt1:1".to_string(), range(30.0, 90.0, 0.0))]),
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);

        controller.toggle_editor();
        controller.editor_mut().set_now(Field::Start, 35.0);
        controller.request_save();
        assert!(matches!(
            controller.editor().state(),
            EditorState::Confirming(..)
        ));
        assert!(controller.take_jobs().is_empty());

        controller.cancel_save();
        assert!(controller.take_jobs().is_empty());
        controller.request_save();
        controller.confirm_save();
        assert!(matches!(
            controller.take_jobs().as_slice(),
            [Job::Save {
                kind: SaveKind::Range,
                ..
            }]
        ));
    }

    #[test]
    fn save_after_failed_fetch_asks_first_and_leaves_offset_alone() {
        let service = ScriptedService {
            version: Some("1.1.0".to_string()),
            fail_fetches: true,
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);
        assert_eq!(
            controller.session().map(|session| &session.known),
            Some(&KnownRange::Unknown)
        );

        controller.toggle_editor();
        controller.editor_mut().set_now(Field::Start, 5.0);
        controller.editor_mut().set_now(Field::End, 10.0);
        controller.request_save();
        assert!(matches!(
            controller.editor().state(),
            EditorState::Confirming(..)
        ));
        assert!(controller.take_jobs().is_empty());

        controller.confirm_save();
        let jobs = controller.take_jobs();
        let [Job::Save { request, .. }] = jobs.as_slice() else {
            panic!("expected one save, got {jobs:?}");
        };
        assert_eq!((request.start, request.end), (5.0, 10.0));
        assert_eq!(request.offset, None);
        let session = controller.session().expect("session");
        assert_eq!(request.file_id.as_deref(), Some(session.file_id()));
    }

    #[test]
    fn failed_save_keeps_editor_open_and_draft() {
        let service = ScriptedService {
            reject_saves: true,
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);

        controller.toggle_editor();
        controller.editor_mut().set_now(Field::End, 20.0);
        controller.request_save();
        drain(&mut controller, &service, &mut surface, now);

        assert!(matches!(controller.editor().state(), EditorState::Open(_)));
        assert!(matches!(
            controller.take_notices().as_slice(),
            [Notice::SaveFailed(_)]
        ));
    }

    #[test]
    fn closing_editor_persists_draft_for_next_open() {
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);

        controller.toggle_editor();
        controller.editor_mut().set_now(Field::Start, 12.0);
        controller.close_editor(CloseReason::Escape);
        assert_eq!(
            controller.session().and_then(|session| session.draft.clone()),
            Some(Draft {
                start: "00:12".to_string(),
                end: String::new()
            })
        );

        controller.toggle_editor();
        let form = controller.editor().form().expect("open");
        assert_eq!(form.start, "00:12");
    }

    #[test]
    fn offset_save_keeps_range_and_sends_distance_from_start() {
        let service = ScriptedService {
            ranges: BTreeMap::from([("tt1:1".to_string(), range(30.0, 90.0, 0.0))]),
            ..ScriptedService::default()
        };
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);

        controller.toggle_editor();
        controller.open_offset_popup();
        surface.time = 37.6;
        controller.offset_now(&surface);
        controller.submit_offset();
        drain(&mut controller, &service, &mut surface, now);

        let saves = service.saves.borrow();
        assert_eq!(saves.len(), 1);
        assert_eq!((saves[0].start, saves[0].end), (30.0, 90.0));
        assert_eq!(saves[0].offset, Some(7.0));
        assert!(!controller.offset_popup().is_open());
    }

    #[test]
    fn offset_without_a_range_is_rejected_locally() {
        let service = ScriptedService::default();
        let mut surface = FakeSurface::default();
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &service, &mut surface, now);

        controller.open_offset_popup();
        controller.submit_offset();

        assert!(controller.take_jobs().is_empty());
        assert!(matches!(
            controller.take_notices().as_slice(),
            [Notice::Invalid(_)]
        ));
    }

    #[test]
    fn transient_failure_leaves_session_without_range() {
        let mut surface = FakeSurface {
            time: 40.0,
            ..FakeSurface::default()
        };
        let mut controller = controller();
        let now = Instant::now();
        controller.on_video_detected(&metadata("tt1", 1, "u1"), &mut surface);
        drain(&mut controller, &ScriptedService::default(), &mut surface, now);
        controller.tick(now, &mut surface);

        let ticket = FetchTicket {
            key: controller.session().expect("session").key.clone(),
            generation: 1,
        };
        controller.handle_result(
            JobResult::Fetched {
                ticket,
                outcome: Err(SyncError::Transient {
                    attempts: 3,
                    detail: "HTTP status 502".to_string(),
                }),
            },
            &mut surface,
            now,
        );
        assert_eq!(controller.active_range(), None);
        assert!(surface.skip_action.is_none());
    }
}
