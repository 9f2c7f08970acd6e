mod actions;
mod player;
mod render;
mod session;


use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use tracing::{info, warn};

use crate::cli::WatchArgs;
use crate::client::RangeClient;
use crate::config::resolve_plugin_version;
use crate::editor::{CloseReason, DraftStore, JsonDraftStore, MemoryDraftStore};
use crate::paths::drafts_file_path;
use crate::playback::{JobResult, PlaybackController, PollPolicy, wait_for_player_state};

use self::actions::{
    Flow, apply_notices, dispatch_jobs, drain_job_results, handle_click, handle_key, status_info,
};
use self::player::SimulatedPlayer;
use self::render::draw_watch;
use self::session::TuiSession;

const FRAME_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub(super) enum PendingNotice {
    Reminder { message: String },
    UpdateRequired { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct WatchState {
    pub(super) status: String,
    pub(super) notice: Option<PendingNotice>,
}

impl Default for WatchState {
    fn default() -> Self {
        Self {
            status: status_info("Looking up skip range..."),
            notice: None,
        }
    }
}

fn open_drafts() -> Box<dyn DraftStore> {
    match drafts_file_path().and_then(JsonDraftStore::open) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(error = %err, "drafts will not survive this session");
            Box::new(MemoryDraftStore::default())
        }
    }
}

pub(crate) fn run_watch(client: &RangeClient, args: &WatchArgs) -> Result<()> {
    let mut player = SimulatedPlayer::from_args(args);
    let Some(metadata) = wait_for_player_state(&mut player, PollPolicy::default(), thread::sleep)
    else {
        bail!("player never reported what is playing");
    };
    if metadata.meta.id.is_empty() {
        bail!("content id must not be empty");
    }

    let mut controller = PlaybackController::new(resolve_plugin_version(), open_drafts());
    controller.on_video_detected(&metadata, &mut player);
    info!(server = client.base_url(), "watch session started");

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let (tx, rx) = mpsc::channel::<JobResult>();
    let mut state = WatchState::default();
    let mut area = Rect::default();
    let mut last_tick = Instant::now();

    loop {
        let now = Instant::now();
        player.advance(now.saturating_duration_since(last_tick));
        last_tick = now;

        drain_job_results(&rx, &mut controller, &mut player);
        controller.tick(now, &mut player);
        controller.on_time_update(&mut player);
        dispatch_jobs(&mut controller, client, &tx);
        apply_notices(&mut controller, &mut state);

        terminal.draw(|frame| {
            area = frame.area();
            draw_watch(frame, &controller, &player, &state);
        })?;

        if !event::poll(FRAME_INTERVAL)? {
            continue;
        }
        let flow = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                handle_key(key.code, &mut controller, &mut player, &mut state)
            }
            Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                handle_click(
                    mouse.column,
                    mouse.row,
                    area,
                    &mut controller,
                    &mut player,
                    &mut state,
                );
                Flow::Continue
            }
            _ => Flow::Continue,
        };
        if flow == Flow::Quit {
            break;
        }
    }

    controller.close_editor(CloseReason::Toggle);
    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}
