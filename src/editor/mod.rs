//! In-player editor for the skip range and the per-file offset.
//!
//! The editor popup moves `Closed -> Open -> (Confirming) -> Saving -> Closed`.
//! Closing without saving keeps what was typed as a draft; saving an
//! already-established range needs an explicit confirmation because the
//! range is shared by everyone watching that episode.

mod draft;

use tracing::debug;

use crate::model::{ActiveRange, KnownRange};
use crate::timecode::{format_timecode, parse_timecode};

pub(crate) use draft::{Draft, DraftStore, JsonDraftStore, MemoryDraftStore};

pub(crate) const START_PLACEHOLDER: &str = "00:00";
pub(crate) const END_PLACEHOLDER: &str = "00:30";
pub(crate) const INVALID_RANGE_MESSAGE: &str = "End time must be greater than start time.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Field(Field),
    SaveButton,
    OffsetButton,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Self::Field(Field::Start) => Self::Field(Field::End),
            Self::Field(Field::End) => Self::SaveButton,
            Self::SaveButton => Self::OffsetButton,
            Self::OffsetButton => Self::Field(Field::Start),
        }
    }

    pub(crate) fn is_text_field(self) -> bool {
        matches!(self, Self::Field(_))
    }
}

/// Where a key press lands in the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyTarget {
    TextField,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EditorForm {
    pub(crate) start: String,
    pub(crate) end: String,
    pub(crate) focus: Focus,
    pub(crate) error: Option<String>,
}

impl EditorForm {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Start => &mut self.start,
            Field::End => &mut self.end,
        }
    }

    pub(crate) fn draft(&self) -> Draft {
        Draft {
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PendingSave {
    pub(crate) start: f64,
    pub(crate) end: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum EditorState {
    #[default]
    Closed,
    Open(EditorForm),
    Confirming(EditorForm, PendingSave),
    Saving(EditorForm, PendingSave),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    Escape,
    ClickOutside,
    Toggle,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SaveDecision {
    /// Nothing to do: the editor is not accepting a save right now.
    Ignored,
    /// Rejected locally; the popup stays open with an error.
    Invalid(String),
    /// Same values as the stored range; the popup closed without a request.
    Unchanged,
    /// Editing an established range; waiting for `confirm` or `cancel`.
    NeedsConfirmation(PendingSave),
    /// Send these values now.
    Submit(PendingSave),
}

#[derive(Debug, Default)]
pub(crate) struct Editor {
    state: EditorState,
}

impl Editor {
    pub(crate) fn state(&self) -> &EditorState {
        &self.state
    }

    pub(crate) fn is_open(&self) -> bool {
        !matches!(self.state, EditorState::Closed)
    }

    pub(crate) fn form(&self) -> Option<&EditorForm> {
        match &self.state {
            EditorState::Closed => None,
            EditorState::Open(form)
            | EditorState::Confirming(form, _)
            | EditorState::Saving(form, _) => Some(form),
        }
    }

    fn form_mut(&mut self) -> Option<&mut EditorForm> {
        match &mut self.state {
            EditorState::Open(form) => Some(form),
            _ => None,
        }
    }

    /// Opens the popup if none is open. Fields come from the draft first,
    /// then from the stored range.
    pub(crate) fn open(&mut self, draft: Option<&Draft>, existing: Option<&ActiveRange>) -> bool {
        if self.is_open() {
            return false;
        }
        let (start, end) = match (draft, existing) {
            (Some(draft), _) => (draft.start.clone(), draft.end.clone()),
            (None, Some(range)) => (format_timecode(range.start), format_timecode(range.end)),
            (None, None) => (String::new(), String::new()),
        };
        self.state = EditorState::Open(EditorForm {
            start,
            end,
            focus: Focus::Field(Field::Start),
            error: None,
        });
        true
    }

    /// Closes the popup and hands back what was typed so it can be kept as
    /// a draft. Nothing is submitted.
    pub(crate) fn close(&mut self, reason: CloseReason) -> Option<Draft> {
        let draft = self.form().map(EditorForm::draft);
        if draft.is_some() {
            debug!(?reason, "closing skip range editor");
        }
        self.state = EditorState::Closed;
        draft
    }

    /// The capture-phase guard: while open, digit keys that are not typed
    /// into a text field never reach the host player.
    pub(crate) fn should_suppress_key(&self, key: char, target: KeyTarget) -> bool {
        self.is_open() && key.is_ascii_digit() && target == KeyTarget::Other
    }

    pub(crate) fn focus(&self) -> Option<Focus> {
        self.form().map(|form| form.focus)
    }

    pub(crate) fn focus_next(&mut self) {
        if let Some(form) = self.form_mut() {
            form.focus = form.focus.next();
        }
    }

    pub(crate) fn type_char(&mut self, ch: char) {
        let Some(form) = self.form_mut() else {
            return;
        };
        let Focus::Field(field) = form.focus else {
            return;
        };
        if ch.is_ascii_digit() || ch == ':' || ch == '.' {
            form.field_mut(field).push(ch);
            form.error = None;
        }
    }

    pub(crate) fn backspace(&mut self) {
        if let Some(form) = self.form_mut()
            && let Focus::Field(field) = form.focus
        {
            form.field_mut(field).pop();
        }
    }

    /// The "now" affordance: writes the playback position into a field.
    pub(crate) fn set_now(&mut self, field: Field, current_time: f64) {
        if let Some(form) = self.form_mut() {
            *form.field_mut(field) = format_timecode(current_time);
            form.error = None;
        }
    }

    /// Only a confirmed-empty or unset range submits without confirmation.
    pub(crate) fn request_save(&mut self, existing: &KnownRange) -> SaveDecision {
        let EditorState::Open(form) = &mut self.state else {
            return SaveDecision::Ignored;
        };
        let pending = PendingSave {
            start: parse_timecode(&form.start),
            end: parse_timecode(&form.end),
        };
        if pending.end <= pending.start {
            form.error = Some(INVALID_RANGE_MESSAGE.to_string());
            return SaveDecision::Invalid(INVALID_RANGE_MESSAGE.to_string());
        }
        form.error = None;

        match existing {
            KnownRange::Found(range)
                if range.start == pending.start && range.end == pending.end =>
            {
                self.state = EditorState::Closed;
                SaveDecision::Unchanged
            }
            KnownRange::Found(range) if range.is_unset() => {
                self.state = EditorState::Saving(form.clone(), pending);
                SaveDecision::Submit(pending)
            }
            KnownRange::Empty => {
                self.state = EditorState::Saving(form.clone(), pending);
                SaveDecision::Submit(pending)
            }
            KnownRange::Found(_) | KnownRange::Unknown => {
                self.state = EditorState::Confirming(form.clone(), pending);
                SaveDecision::NeedsConfirmation(pending)
            }
        }
    }

    pub(crate) fn confirm(&mut self) -> Option<PendingSave> {
        let EditorState::Confirming(form, pending) = &self.state else {
            return None;
        };
        let pending = *pending;
        self.state = EditorState::Saving(form.clone(), pending);
        Some(pending)
    }

    pub(crate) fn cancel_confirmation(&mut self) {
        if let EditorState::Confirming(form, _) = &self.state {
            self.state = EditorState::Open(form.clone());
        }
    }

    pub(crate) fn save_succeeded(&mut self) {
        if matches!(self.state, EditorState::Saving(..)) {
            self.state = EditorState::Closed;
        }
    }

    pub(crate) fn save_failed(&mut self, message: &str) {
        if let EditorState::Saving(form, _) = &self.state {
            let mut form = form.clone();
            form.error = Some(message.to_string());
            self.state = EditorState::Open(form);
        }
    }
}

/// The secondary popup that edits only this file's offset.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) enum OffsetPopup {
    #[default]
    Closed,
    Open {
        text: String,
    },
    Saving,
}

impl OffsetPopup {
    pub(crate) fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            Self::Open { text } => Some(text),
            _ => None,
        }
    }

    pub(crate) fn open(&mut self, current_offset: f64) -> bool {
        if self.is_open() {
            return false;
        }
        *self = Self::Open {
            text: format_offset(current_offset),
        };
        true
    }

    pub(crate) fn close(&mut self) {
        *self = Self::Closed;
    }

    pub(crate) fn type_char(&mut self, ch: char) {
        if let Self::Open { text } = self
            && (ch.is_ascii_digit() || ch == '.' || (ch == '-' && text.is_empty()))
        {
            text.push(ch);
        }
    }

    pub(crate) fn backspace(&mut self) {
        if let Self::Open { text } = self {
            text.pop();
        }
    }

    /// "Now" for the offset: how far playback is past the canonical start.
    pub(crate) fn set_now(&mut self, current_time: f64, range_start: f64) {
        if let Self::Open { text } = self {
            *text = format_offset((current_time - range_start).floor());
        }
    }

    /// Parses the typed offset (unparsable input counts as 0) and moves to
    /// `Saving`.
    pub(crate) fn submit(&mut self) -> Option<f64> {
        let Self::Open { text } = self else {
            return None;
        };
        let offset = text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0);
        *self = Self::Saving;
        Some(offset)
    }

    pub(crate) fn save_finished(&mut self) {
        if matches!(self, Self::Saving) {
            *self = Self::Closed;
        }
    }
}

fn format_offset(offset: f64) -> String {
    if offset.fract() == 0.0 {
        format!("{offset:.0}")
    } else {
        offset.to_string()
    }
}
