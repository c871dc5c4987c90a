//! Decides which detected labels are worth speaking.
//!
//! Two policies are supported:
//! - `SetDifference`: speak labels that were not part of the previous
//!   announcement. History is replaced by the full label set of the frame
//!   that triggered speech.
//! - `Cooldown`: speak the frame's label list when it differs from the last
//!   utterance, or when `delay` has passed since it.
//!
//! The debouncer is driven from a single frame context and takes `&mut self`;
//! it does no locking of its own.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::detect::DetectionSet;

/// Reference minimum gap between identical utterances.
pub const SPEAK_DELAY: Duration = Duration::from_millis(2000);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebouncePolicy {
    #[default]
    SetDifference,
    Cooldown { delay: Duration },
}

/// What was announced last. Owned by `AnnouncementDebouncer`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnouncementState {
    last_labels: BTreeSet<String>,
    last_text: Option<String>,
    last_at: Option<Instant>,
}

impl AnnouncementState {
    pub fn last_labels(&self) -> &BTreeSet<String> {
        &self.last_labels
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    pub fn last_at(&self) -> Option<Instant> {
        self.last_at
    }

    fn record(&mut self, labels: BTreeSet<String>, text: String, now: Instant) {
        self.last_labels = labels;
        self.last_text = Some(text);
        self.last_at = Some(now);
    }
}

#[derive(Debug, Default)]
pub struct AnnouncementDebouncer {
    policy: DebouncePolicy,
    state: AnnouncementState,
}

impl AnnouncementDebouncer {
    pub fn new(policy: DebouncePolicy) -> Self {
        Self {
            policy,
            state: AnnouncementState::default(),
        }
    }

    pub fn policy(&self) -> DebouncePolicy {
        self.policy
    }

    pub fn state(&self) -> &AnnouncementState {
        &self.state
    }

    /// Labels to speak for this frame; empty when nothing should be said.
    pub fn decide(&mut self, detections: &DetectionSet, now: Instant) -> BTreeSet<String> {
        let current = detections.labels();
        if current.is_empty() {
            return BTreeSet::new();
        }

        match self.policy {
            DebouncePolicy::SetDifference => {
                let fresh: BTreeSet<String> =
                    current.difference(&self.state.last_labels).cloned().collect();
                if !fresh.is_empty() {
                    let text = join_labels(&current);
                    self.state.record(current, text, now);
                }
                fresh
            }
            DebouncePolicy::Cooldown { delay } => {
                let text = join_labels(&current);
                let changed = self
                    .state
                    .last_text
                    .as_deref()
                    .map_or(true, |last| !last.eq_ignore_ascii_case(&text));
                let expired = self
                    .state
                    .last_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= delay);
                if changed || expired {
                    self.state.record(current.clone(), text, now);
                    current
                } else {
                    BTreeSet::new()
                }
            }
        }
    }

    /// Forget everything announced so far.
    pub fn reset_history(&mut self) {
        self.state = AnnouncementState::default();
    }
}

fn join_labels(labels: &BTreeSet<String>) -> String {
    labels
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
