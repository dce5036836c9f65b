//! Engine-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the engine, providing a single source of truth for constant values.

/// Attribute names written onto tagged elements
pub mod attrs {
    /// Presence flag marking an element as carrying decodable provenance
    pub const ENCODED: &str = "data-lens-encoded";

    /// Link back to the originating content record
    pub const HREF: &str = "data-lens-href";

    /// Human-readable origin of the content record
    pub const ORIGIN: &str = "data-lens-origin";

    /// Host-markup convention designating the preferred tagging ancestor
    pub const EDIT_TARGET: &str = "data-lens-edit-target";
}

/// Class names applied by the engine
pub mod classes {
    /// Decaying highlight applied to tagged elements near the pointer
    pub const PROXIMITY: &str = "lens-proximity-highlight";

    /// Marks the element currently backing the overlay
    pub const ACTIVE: &str = "lens-overlay-active";

    /// The bounding-box highlight surface
    pub const OVERLAY: &str = "lens-overlay";

    /// The informational tooltip surface
    pub const TOOLTIP: &str = "lens-tooltip";
}

/// Style properties written for the proximity effect
pub mod style_props {
    /// Pointer x offset relative to the highlighted element
    pub const CURSOR_X: &str = "--cursor-x";

    /// Pointer y offset relative to the highlighted element
    pub const CURSOR_Y: &str = "--cursor-y";

    /// Diameter of the proximity gradient
    pub const GRADIENT_SIZE: &str = "--gradient-size";
}

/// Default timing windows, in milliseconds
pub mod timing {
    /// Pointer-move handling runs at most once per window (one animation frame)
    pub const POINTER_THROTTLE_MS: u64 = 16;

    /// Quiet period before a batch of tree mutations is rescanned
    pub const MUTATION_DEBOUNCE_MS: u64 = 100;

    /// Grace period before the overlay hides, so the pointer can reach the tooltip
    pub const HIDE_GRACE_MS: u64 = 100;

    /// Time-to-live of the cached proximity candidate set
    pub const CANDIDATE_TTL_MS: u64 = 500;
}

/// Proximity highlight geometry
pub mod proximity {
    /// Elements with a nearest edge closer than this are highlighted (exclusive)
    pub const THRESHOLD: f64 = 150.0;

    /// Distance over which the gradient decays to zero
    pub const FALLOFF_RANGE: f64 = 400.0;

    /// Minimum base gradient diameter
    pub const MIN_GRADIENT: f64 = 150.0;

    /// Base gradient scales with the element's larger dimension by this factor
    pub const SIZE_FACTOR: f64 = 1.1;
}

/// Overlay and tooltip placement
pub mod overlay {
    /// Overlay extends this far left of the element box
    pub const INSET_LEFT: f64 = 4.0;

    /// Overlay extends this far above the element box
    pub const INSET_TOP: f64 = 2.0;

    /// Total extra overlay width (both sides)
    pub const EXPAND_WIDTH: f64 = 8.0;

    /// Total extra overlay height (both sides)
    pub const EXPAND_HEIGHT: f64 = 4.0;

    /// Elements narrower than this get the abbreviated tooltip glyph
    pub const COMPACT_WIDTH: f64 = 80.0;

    /// Glyph shown instead of the origin label on narrow elements
    pub const COMPACT_GLYPH: &str = "\u{2197}";

    /// Gap between the element box and the tooltip
    pub const TOOLTIP_GAP: f64 = 2.0;

    /// Horizontal overshoot of the tooltip past the element's right edge
    pub const TOOLTIP_SHIFT: f64 = 4.0;

    /// Minimum distance kept between the tooltip and the viewport edges
    pub const VIEWPORT_PADDING: f64 = 4.0;

    /// Rendered tooltip box height (fixed by the injected stylesheet)
    pub const TOOLTIP_HEIGHT: f64 = 24.0;

    /// Horizontal padding inside the tooltip box, both sides combined
    pub const TOOLTIP_PADDING_X: f64 = 16.0;

    /// Approximate advance width of one tooltip character
    pub const TOOLTIP_CHAR_WIDTH: f64 = 7.0;

    /// Minimum tooltip box width when showing the full origin label
    pub const TOOLTIP_MIN_WIDTH: f64 = 80.0;
}

/// Tree-walking rules
pub mod scan {
    /// Containers whose text content is never scanned for provenance
    pub const SKIPPED_CONTAINERS: &[&str] = &["script", "style", "noscript"];
}
