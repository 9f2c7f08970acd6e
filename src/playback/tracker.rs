use tracing::{debug, info};

use crate::model::ActiveRange;

/// The host player as the tracker sees it. Skip and upgrade elements are
/// looked up by existence on every evaluation.
pub(crate) trait PlayerSurface {
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn seek(&mut self, to: f64);
    fn pause(&mut self);

    fn has_skip_action(&self) -> bool;
    fn show_skip_action(&mut self, target: f64);
    fn remove_skip_action(&mut self);

    fn has_upgrade_prompt(&self) -> bool;
    fn show_upgrade_prompt(&mut self);

    fn set_highlight(&mut self, span: Option<HighlightSpan>);
}

/// Position of the skip window on the timeline, in percent of duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HighlightSpan {
    pub(crate) left_pct: f64,
    pub(crate) width_pct: f64,
}

pub(crate) fn highlight_span(range: &ActiveRange, duration: Option<f64>) -> Option<HighlightSpan> {
    let duration = duration.filter(|value| value.is_finite() && *value > 0.0)?;
    Some(HighlightSpan {
        left_pct: range.window_start() / duration * 100.0,
        width_pct: (range.end - range.start) / duration * 100.0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Zone {
    Outside,
    Inside,
}

#[derive(Debug, Default)]
pub(crate) struct PlaybackTracker {
    range: Option<ActiveRange>,
    upgrade_required: bool,
}

impl PlaybackTracker {
    pub(crate) fn range(&self) -> Option<&ActiveRange> {
        self.range.as_ref()
    }

    /// Installs a new range (or none) and re-derives the UI from it.
    pub(crate) fn set_range(&mut self, range: Option<ActiveRange>, surface: &mut dyn PlayerSurface) {
        let duration = surface.duration();
        self.range = range;
        surface.set_highlight(
            self.range
                .as_ref()
                .and_then(|range| highlight_span(range, duration)),
        );
        self.evaluate(surface);
    }

    pub(crate) fn require_upgrade(&mut self, surface: &mut dyn PlayerSurface) {
        self.upgrade_required = true;
        if surface.has_skip_action() {
            surface.remove_skip_action();
        }
        if !surface.has_upgrade_prompt() {
            surface.show_upgrade_prompt();
        }
    }

    pub(crate) fn upgrade_required(&self) -> bool {
        self.upgrade_required
    }

    pub(crate) fn zone_at(&self, time: f64) -> Zone {
        match &self.range {
            Some(range) if range.contains(time) => Zone::Inside,
            _ => Zone::Outside,
        }
    }

    pub(crate) fn on_time_update(&self, surface: &mut dyn PlayerSurface) -> Zone {
        self.evaluate(surface)
    }

    pub(crate) fn on_seeked(&self, surface: &mut dyn PlayerSurface) -> Zone {
        debug!(time = surface.current_time(), "seek, re-evaluating skip window");
        self.evaluate(surface)
    }

    fn evaluate(&self, surface: &mut dyn PlayerSurface) -> Zone {
        let zone = self.zone_at(surface.current_time());
        match zone {
            Zone::Inside if self.upgrade_required => {
                if !surface.has_upgrade_prompt() {
                    surface.show_upgrade_prompt();
                }
            }
            Zone::Inside => {
                if !surface.has_skip_action()
                    && let Some(range) = &self.range
                {
                    surface.show_skip_action(range.skip_target());
                }
            }
            Zone::Outside => {
                if surface.has_skip_action() {
                    surface.remove_skip_action();
                }
            }
        }
        zone
    }

    /// Jumps past the window and drops the skip action. Returns whether a
    /// skip happened.
    pub(crate) fn invoke_skip(&self, surface: &mut dyn PlayerSurface) -> bool {
        if !surface.has_skip_action() {
            return false;
        }
        let Some(range) = &self.range else {
            surface.remove_skip_action();
            return false;
        };
        let target = range.skip_target();
        surface.seek(target);
        surface.remove_skip_action();
        info!(target, "skipping intro");
        true
    }
}
