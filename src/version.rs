use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VersionVerdict {
    Ok,
    Reminder,
    Breaking,
}

/// Compares dotted versions segment by segment as text: major decides
/// breaking, minor or patch decide a reminder. Missing input fails open.
pub(crate) fn check_version(local: Option<&str>, remote: Option<&str>) -> VersionVerdict {
    let (Some(local), Some(remote)) = (non_empty(local), non_empty(remote)) else {
        return VersionVerdict::Ok;
    };

    let mut local_parts = local.split('.');
    let mut remote_parts = remote.split('.');
    if local_parts.next() != remote_parts.next() {
        return VersionVerdict::Breaking;
    }
    for _ in 0..2 {
        if local_parts.next() != remote_parts.next() {
            return VersionVerdict::Reminder;
        }
    }
    VersionVerdict::Ok
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum GateOutcome {
    Proceed,
    Remind { remote: String },
    Block { remote: String },
}

/// Version check for one watch session; the reminder is offered at most
/// once per gate.
#[derive(Debug)]
pub(crate) struct VersionGate {
    local: String,
    reminder_shown: bool,
}

impl VersionGate {
    pub(crate) fn new(local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            reminder_shown: false,
        }
    }

    pub(crate) fn local(&self) -> &str {
        &self.local
    }

    pub(crate) fn evaluate(&mut self, remote: Option<&str>) -> GateOutcome {
        info!(local = %self.local, remote = ?remote, "checking plugin versions");
        match check_version(Some(&self.local), remote) {
            VersionVerdict::Ok => GateOutcome::Proceed,
            VersionVerdict::Breaking => {
                let remote = remote.unwrap_or_default().to_string();
                warn!(local = %self.local, %remote, "plugin update required");
                GateOutcome::Block { remote }
            }
            VersionVerdict::Reminder if self.reminder_shown => GateOutcome::Proceed,
            VersionVerdict::Reminder => {
                self.reminder_shown = true;
                GateOutcome::Remind {
                    remote: remote.unwrap_or_default().to_string(),
                }
            }
        }
    }
}
