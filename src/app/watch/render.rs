use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap};

use crate::editor::{
    END_PLACEHOLDER, EditorForm, EditorState, Field, Focus, OffsetPopup, START_PLACEHOLDER,
};
use crate::playback::{HighlightSpan, PlaybackController, PlayerSurface};
use crate::timecode::format_timecode;

use super::player::SimulatedPlayer;
use super::{PendingNotice, WatchState};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const HIGHLIGHT: Color = Color::Rgb(255, 196, 92);

pub(super) struct WatchLayout {
    pub(super) header: Rect,
    pub(super) player: Rect,
    pub(super) skip: Rect,
    pub(super) controls: Rect,
    pub(super) status: Rect,
}

pub(super) fn watch_layout(area: Rect) -> WatchLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);
    WatchLayout {
        header: chunks[0],
        player: chunks[1],
        skip: centered_fixed_rect(32, 3, chunks[2]),
        controls: chunks[3],
        status: chunks[4],
    }
}

pub(super) fn editor_popup_rect(area: Rect) -> Rect {
    centered_fixed_rect(56, 14, area)
}

pub(super) fn offset_popup_rect(area: Rect) -> Rect {
    centered_fixed_rect(44, 9, area)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TimelineCell {
    Played,
    Remaining,
    Highlight,
    Playhead,
}

/// One cell per column; a cell belongs to the skip window when its centre
/// falls inside the highlight span.
pub(super) fn timeline_cells(
    width: usize,
    progress: f64,
    highlight: Option<HighlightSpan>,
) -> Vec<TimelineCell> {
    if width == 0 {
        return Vec::new();
    }
    let playhead = (progress.clamp(0.0, 1.0) * (width - 1) as f64).round() as usize;
    (0..width)
        .map(|idx| {
            let centre_pct = (idx as f64 + 0.5) / width as f64 * 100.0;
            let in_window = highlight.is_some_and(|span| {
                centre_pct >= span.left_pct && centre_pct < span.left_pct + span.width_pct
            });
            if idx == playhead {
                TimelineCell::Playhead
            } else if in_window {
                TimelineCell::Highlight
            } else if idx < playhead {
                TimelineCell::Played
            } else {
                TimelineCell::Remaining
            }
        })
        .collect()
}

pub(super) fn draw_watch(
    frame: &mut Frame,
    controller: &PlaybackController,
    player: &SimulatedPlayer,
    state: &WatchState,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());
    let layout = watch_layout(frame.area());

    let (title, episode_id, file_id) = match controller.session() {
        Some(session) => (
            session.title.as_str(),
            session.episode_id(),
            session.file_id(),
        ),
        None => ("-", "-", "-"),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "SKIPINTRO",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(title.to_string(), Style::default().fg(Color::White)),
        Span::raw("   "),
        Span::styled(episode_id.to_string(), Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(format!("file {file_id}"), Style::default().fg(MUTED)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Now Playing"));
    frame.render_widget(header, layout.header);

    draw_player(frame, layout.player, controller, player);
    draw_skip_row(frame, layout.skip, player);

    let controls = Paragraph::new(controls_line(controller))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, layout.controls);

    let status = Paragraph::new(state.status.clone())
        .style(status_style(&state.status))
        .block(panel_block("Status"));
    frame.render_widget(status, layout.status);

    match controller.editor().state() {
        EditorState::Closed => {}
        EditorState::Confirming(..) => draw_confirm(frame),
        EditorState::Open(form) => draw_editor(frame, form, false),
        EditorState::Saving(form, _) => draw_editor(frame, form, true),
    }
    if controller.offset_popup().is_open() {
        draw_offset_popup(frame, controller.offset_popup());
    }

    if let Some(notice) = &state.notice {
        let (title, message) = match notice {
            PendingNotice::Reminder { message } => ("Update Available", message),
            PendingNotice::UpdateRequired { message } => ("Update Required", message),
        };
        let popup_area = popup_rect_for_text(frame.area(), message);
        render_popup_shadow(frame, popup_area);
        frame.render_widget(Clear, popup_area);
        let popup = Paragraph::new(message.clone())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(modal_block(title));
        frame.render_widget(popup, popup_area);
    }
}

fn draw_player(
    frame: &mut Frame,
    area: Rect,
    controller: &PlaybackController,
    player: &SimulatedPlayer,
) {
    let block = panel_block("Player");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let clock = format!(
        "{} {} / {}",
        if player.is_paused() { "⏸" } else { "▶" },
        format_timecode(player.current_time()),
        format_timecode(player.duration().unwrap_or_default())
    );
    let range_text = match controller.active_range() {
        Some(range) if range.offset != 0.0 => format!(
            "Skip window {} -> {} (offset {}s)",
            format_timecode(range.window_start()),
            format_timecode(range.skip_target()),
            range.offset
        ),
        Some(range) => format!(
            "Skip window {} -> {}",
            format_timecode(range.start),
            format_timecode(range.end)
        ),
        None if controller.update_required() => "Skipping disabled until update".to_string(),
        None => "No skip range for this episode".to_string(),
    };

    let width = usize::from(inner.width.saturating_sub(2));
    let timeline: Vec<Span> = timeline_cells(width, player.progress_ratio(), player.highlight())
        .into_iter()
        .map(|cell| match cell {
            TimelineCell::Playhead => Span::styled("●", Style::default().fg(Color::White)),
            TimelineCell::Highlight => Span::styled("━", Style::default().fg(HIGHLIGHT)),
            TimelineCell::Played => Span::styled("━", Style::default().fg(ACCENT)),
            TimelineCell::Remaining => Span::styled("─", Style::default().fg(MUTED)),
        })
        .collect();

    let lines = vec![
        Line::from(Span::styled(clock, Style::default().add_modifier(Modifier::BOLD))),
        Line::default(),
        Line::from(timeline),
        Line::default(),
        Line::from(Span::styled(range_text, Style::default().fg(MUTED))),
    ];
    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().padding(Padding::horizontal(1)));
    frame.render_widget(body, inner);
}

fn draw_skip_row(frame: &mut Frame, area: Rect, player: &SimulatedPlayer) {
    if player.upgrade_prompt() {
        let prompt = Paragraph::new("Update required")
            .alignment(Alignment::Center)
            .style(
                Style::default()
                    .fg(Color::Rgb(255, 145, 120))
                    .add_modifier(Modifier::BOLD),
            )
            .block(modal_block_plain());
        frame.render_widget(prompt, area);
    } else if let Some(target) = player.skip_action() {
        let button = Paragraph::new(format!("Skip Intro  ▸ {}", format_timecode(target)))
            .alignment(Alignment::Center)
            .style(pill_active())
            .block(modal_block_plain());
        frame.render_widget(button, area);
    }
}

fn controls_line(controller: &PlaybackController) -> Line<'static> {
    let text = if controller.editor().is_open() {
        "Tab focus  n now  Enter save/offset  Esc close  ←/→ seek"
    } else {
        "space pause  ←/→ seek 5s  0-9 jump  s skip  e edit range  q quit"
    };
    Line::from(Span::styled(text, Style::default().fg(MUTED)))
}

fn draw_editor(frame: &mut Frame, form: &EditorForm, saving: bool) {
    let area = editor_popup_rect(frame.area());
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);

    let mut lines = vec![
        field_line("Start", &form.start, START_PLACEHOLDER, form.focus == Focus::Field(Field::Start)),
        field_line("End  ", &form.end, END_PLACEHOLDER, form.focus == Focus::Field(Field::End)),
        Line::default(),
        Line::from(vec![
            Span::styled(" Save ", button_style(form.focus == Focus::SaveButton)),
            Span::raw("  "),
            Span::styled(" Offset ", button_style(form.focus == Focus::OffsetButton)),
        ]),
        Line::default(),
    ];
    if saving {
        lines.push(Line::from(Span::styled("Saving...", Style::default().fg(MUTED))));
    } else if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Rgb(255, 145, 120)),
        )));
    }

    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(modal_block("Skip Range"));
    frame.render_widget(popup, area);
}

fn field_line(label: &'static str, value: &str, placeholder: &'static str, focused: bool) -> Line<'static> {
    let (text, style) = if value.is_empty() {
        (placeholder.to_string(), Style::default().fg(Color::Rgb(90, 100, 115)))
    } else {
        (value.to_string(), Style::default().fg(Color::White))
    };
    let style = if focused {
        style.bg(Color::Rgb(40, 52, 72)).add_modifier(Modifier::BOLD)
    } else {
        style
    };
    Line::from(vec![
        Span::styled(format!("{label}  "), Style::default().fg(MUTED)),
        Span::styled(format!(" {text:<10}"), style),
        Span::styled(if focused { "  n = now" } else { "" }, Style::default().fg(MUTED)),
    ])
}

fn draw_confirm(frame: &mut Frame) {
    let text = "Editing the intro will change it for everyone else.\nIf there's a delay, adjust the offset instead.\n\n[y / Enter] Save   [n / Esc] Cancel";
    let area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);
    let popup = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block("Are you sure?"));
    frame.render_widget(popup, area);
}

fn draw_offset_popup(frame: &mut Frame, popup: &OffsetPopup) {
    let area = offset_popup_rect(frame.area());
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);
    let value = popup.text().unwrap_or("...");
    let lines = vec![
        Line::from(vec![
            Span::styled("Offset (s)  ", Style::default().fg(MUTED)),
            Span::styled(
                format!(" {value:<8}"),
                Style::default()
                    .fg(Color::White)
                    .bg(Color::Rgb(40, 52, 72))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "n now  Enter save  Esc close",
            Style::default().fg(MUTED),
        )),
    ];
    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(modal_block("Offset"));
    frame.render_widget(widget, area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    modal_block_plain()
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn modal_block_plain() -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
}

fn pill_active() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn button_style(focused: bool) -> Style {
    if focused { pill_active() } else { pill_inactive() }
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 48.min(available_width);
    let max_width = 72.min(available_width);
    let width = max_line_width.saturating_add(12).clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 10.min(available_height);
    let max_height = 18.min(available_height);
    let height = line_count.saturating_add(6).clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
