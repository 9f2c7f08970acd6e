use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use crossterm::event::KeyCode;
use ratatui::layout::{Position, Rect};

use crate::client::RangeClient;
use crate::editor::{CloseReason, EditorState, KeyTarget, OffsetPopup};
use crate::playback::{JobResult, Notice, PlaybackController, run_job};

use super::player::SimulatedPlayer;
use super::render::{editor_popup_rect, offset_popup_rect, watch_layout};
use super::{PendingNotice, WatchState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    Quit,
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

/// Runs each queued job on its own thread; results come back on `tx`.
pub(super) fn dispatch_jobs(
    controller: &mut PlaybackController,
    client: &RangeClient,
    tx: &mpsc::Sender<JobResult>,
) {
    for job in controller.take_jobs() {
        let client = client.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let _ = tx.send(run_job(&client, job));
        });
    }
}

pub(super) fn drain_job_results(
    rx: &mpsc::Receiver<JobResult>,
    controller: &mut PlaybackController,
    player: &mut SimulatedPlayer,
) {
    while let Ok(result) = rx.try_recv() {
        controller.handle_result(result, player, Instant::now());
    }
}

pub(super) fn apply_notices(controller: &mut PlaybackController, state: &mut WatchState) {
    for notice in controller.take_notices() {
        match notice {
            Notice::UpdateAvailable { local, remote } => {
                state.status = status_info(&format!("Update available: {local} -> {remote}."));
                state.notice = Some(PendingNotice::Reminder {
                    message: format!(
                        "A new skipintro version is available.\n\nInstalled {local}, server expects {remote}.\n\nPress any key to continue."
                    ),
                });
            }
            Notice::UpdateRequired { local, remote } => {
                state.status = status_error(&format!("Update required: {local} -> {remote}."));
                state.notice = Some(PendingNotice::UpdateRequired {
                    message: format!(
                        "This version of skipintro ({local}) no longer works with the server ({remote}).\n\nPlease update.\n\nPress any key to leave."
                    ),
                });
            }
            Notice::Saved => {
                state.status = status_info("Skip range saved. Refreshing shortly.");
            }
            Notice::Invalid(message) => state.status = status_error(&message),
            Notice::SaveFailed(message) => state.status = status_error(&message),
        }
    }
}

pub(super) fn handle_key(
    code: KeyCode,
    controller: &mut PlaybackController,
    player: &mut SimulatedPlayer,
    state: &mut WatchState,
) -> Flow {
    if let Some(notice) = state.notice.take() {
        return match notice {
            PendingNotice::UpdateRequired { .. } => Flow::Quit,
            PendingNotice::Reminder { .. } => Flow::Continue,
        };
    }

    if matches!(controller.editor().state(), EditorState::Confirming(..)) {
        match code {
            KeyCode::Char('y') | KeyCode::Enter => controller.confirm_save(),
            KeyCode::Char('n') | KeyCode::Esc => controller.cancel_save(),
            _ => {}
        }
        return Flow::Continue;
    }

    if matches!(controller.offset_popup(), OffsetPopup::Open { .. }) {
        match code {
            KeyCode::Esc => controller.offset_popup_mut().close(),
            KeyCode::Enter => controller.submit_offset(),
            KeyCode::Backspace => controller.offset_popup_mut().backspace(),
            KeyCode::Char('n') => controller.offset_now(player),
            KeyCode::Char(ch) => controller.offset_popup_mut().type_char(ch),
            _ => {}
        }
        return Flow::Continue;
    }

    if controller.editor().is_open() {
        return handle_editor_key(code, controller, player, state);
    }
    handle_player_key(code, controller, player, state)
}

/// Keys that reach the host player.
fn handle_player_key(
    code: KeyCode,
    controller: &mut PlaybackController,
    player: &mut SimulatedPlayer,
    state: &mut WatchState,
) -> Flow {
    match code {
        KeyCode::Char('q') => return Flow::Quit,
        KeyCode::Char(' ') => player.toggle_pause(),
        KeyCode::Left | KeyCode::Right => {
            player.seek_by(code == KeyCode::Right);
            controller.on_seeked(player);
        }
        KeyCode::Char(ch) if ch.is_ascii_digit() => {
            player.seek_to_tenth(ch.to_digit(10).unwrap_or(0));
            controller.on_seeked(player);
        }
        KeyCode::Char('s') => {
            if controller.skip(player) {
                state.status = status_info("Intro skipped.");
            }
        }
        KeyCode::Char('e') => controller.toggle_editor(),
        _ => {}
    }
    Flow::Continue
}

fn handle_editor_key(
    code: KeyCode,
    controller: &mut PlaybackController,
    player: &mut SimulatedPlayer,
    state: &mut WatchState,
) -> Flow {
    if matches!(controller.editor().state(), EditorState::Saving(..)) {
        return Flow::Continue;
    }
    let on_text_field = controller
        .editor()
        .focus()
        .is_some_and(|focus| focus.is_text_field());

    match code {
        KeyCode::Esc => controller.close_editor(CloseReason::Escape),
        KeyCode::Tab => controller.editor_mut().focus_next(),
        KeyCode::Enter => controller.editor_activate(),
        KeyCode::Backspace => controller.editor_mut().backspace(),
        KeyCode::Left | KeyCode::Right => {
            player.seek_by(code == KeyCode::Right);
            controller.on_seeked(player);
        }
        KeyCode::Char('e') => controller.toggle_editor(),
        KeyCode::Char('n') if on_text_field => controller.editor_now(player),
        KeyCode::Char(ch) => {
            let target = if on_text_field {
                KeyTarget::TextField
            } else {
                KeyTarget::Other
            };
            if controller.should_suppress_key(ch, target) {
                return Flow::Continue;
            }
            if on_text_field {
                controller.editor_mut().type_char(ch);
            } else {
                // Unguarded keys on a button reach the player.
                return handle_player_key(code, controller, player, state);
            }
        }
        _ => {}
    }
    Flow::Continue
}

/// Left clicks: outside an open popup closes it, the skip button skips.
pub(super) fn handle_click(
    column: u16,
    row: u16,
    area: Rect,
    controller: &mut PlaybackController,
    player: &mut SimulatedPlayer,
    state: &mut WatchState,
) {
    let at = Position::new(column, row);
    if controller.offset_popup().is_open() {
        if !offset_popup_rect(area).contains(at) {
            controller.offset_popup_mut().close();
        }
        return;
    }
    if controller.editor().is_open() {
        if !editor_popup_rect(area).contains(at) {
            controller.close_editor(CloseReason::ClickOutside);
        }
        return;
    }
    if watch_layout(area).skip.contains(at) && controller.skip(player) {
        state.status = status_info("Intro skipped.");
    }
}
