//! Engine configuration.
//!
//! Tunable timings and thresholds with serde support so hosts can overlay
//! values from wherever they keep settings. The engine itself never touches
//! disk; defaults come from [`constants`](crate::constants).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{overlay, proximity, timing};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pointer-move handling runs at most once per this window.
    #[serde(default = "default_pointer_throttle_ms")]
    pub pointer_throttle_ms: u64,

    /// Quiet period before a mutation batch is rescanned.
    #[serde(default = "default_mutation_debounce_ms")]
    pub mutation_debounce_ms: u64,

    /// Grace period before the overlay hides.
    #[serde(default = "default_hide_grace_ms")]
    pub hide_grace_ms: u64,

    /// Time-to-live of the cached proximity candidate set.
    #[serde(default = "default_candidate_ttl_ms")]
    pub candidate_ttl_ms: u64,

    /// Highlight distance threshold in pixels (exclusive).
    #[serde(default = "default_proximity_threshold")]
    pub proximity_threshold: f64,

    /// Distance over which the gradient decays to zero.
    #[serde(default = "default_falloff_range")]
    pub falloff_range: f64,

    /// Elements narrower than this get the abbreviated tooltip glyph.
    #[serde(default = "default_compact_width")]
    pub compact_width: f64,

    /// Minimum distance kept between the tooltip and the viewport edges.
    #[serde(default = "default_viewport_padding")]
    pub viewport_padding: f64,

    /// Whether the text cleaner rewrites encoded fragments to their visible form.
    #[serde(default = "default_clean_text")]
    pub clean_text: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pointer_throttle_ms: default_pointer_throttle_ms(),
            mutation_debounce_ms: default_mutation_debounce_ms(),
            hide_grace_ms: default_hide_grace_ms(),
            candidate_ttl_ms: default_candidate_ttl_ms(),
            proximity_threshold: default_proximity_threshold(),
            falloff_range: default_falloff_range(),
            compact_width: default_compact_width(),
            viewport_padding: default_viewport_padding(),
            clean_text: default_clean_text(),
        }
    }
}

impl EngineConfig {
    pub fn pointer_throttle(&self) -> Duration {
        Duration::from_millis(self.pointer_throttle_ms)
    }

    pub fn mutation_debounce(&self) -> Duration {
        Duration::from_millis(self.mutation_debounce_ms)
    }

    pub fn hide_grace(&self) -> Duration {
        Duration::from_millis(self.hide_grace_ms)
    }

    pub fn candidate_ttl(&self) -> Duration {
        Duration::from_millis(self.candidate_ttl_ms)
    }
}

fn default_pointer_throttle_ms() -> u64 {
    timing::POINTER_THROTTLE_MS
}

fn default_mutation_debounce_ms() -> u64 {
    timing::MUTATION_DEBOUNCE_MS
}

fn default_hide_grace_ms() -> u64 {
    timing::HIDE_GRACE_MS
}

fn default_candidate_ttl_ms() -> u64 {
    timing::CANDIDATE_TTL_MS
}

fn default_proximity_threshold() -> f64 {
    proximity::THRESHOLD
}

fn default_falloff_range() -> f64 {
    proximity::FALLOFF_RANGE
}

fn default_compact_width() -> f64 {
    overlay::COMPACT_WIDTH
}

fn default_viewport_padding() -> f64 {
    overlay::VIEWPORT_PADDING
}

fn default_clean_text() -> bool {
    true
}
