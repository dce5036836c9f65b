//! Overlay Presenter: renders exactly one bounding-box highlight and one
//! tooltip, anchored to the hovered tagged element.
//!
//! The "active element" is a single owned value with explicit transitions.
//! Hiding goes through a short cancelable grace period so the pointer can
//! travel from the element onto the tooltip; the scroll path hides
//! immediately since a stale-positioned overlay is worse than a flicker.

use anyhow::{Context as _, Result};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use indextree::NodeId;

use crate::constants::{attrs, classes, overlay};
use crate::dom::{Document, Rect, Viewport};
use crate::sched::Delay;

/// Computed placement of the presentation surfaces, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayGeometry {
    pub overlay: Rect,
    pub tooltip: Option<Rect>,
}

/// The compound active-element singleton. Exactly one element backs the
/// overlay at any time; `Leaving` means the hide grace period is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Active {
    #[default]
    Idle,
    Shown(NodeId),
    Leaving(NodeId),
}

impl Active {
    fn element(self) -> Option<NodeId> {
        match self {
            Self::Idle => None,
            Self::Shown(id) | Self::Leaving(id) => Some(id),
        }
    }
}

#[derive(Debug)]
struct Surfaces {
    overlay: NodeId,
    tooltip: NodeId,
    tooltip_text: NodeId,
}

#[derive(Debug)]
pub struct OverlayPresenter {
    compact_width: f64,
    viewport_padding: f64,
    hide_grace: Duration,
    surfaces: Option<Surfaces>,
    active: Active,
    hide_timer: Delay,
    geometry: Option<OverlayGeometry>,
    href: Option<String>,
}

impl OverlayPresenter {
    pub fn new(compact_width: f64, viewport_padding: f64, hide_grace: Duration) -> Self {
        Self {
            compact_width,
            viewport_padding,
            hide_grace,
            surfaces: None,
            active: Active::Idle,
            hide_timer: Delay::default(),
            geometry: None,
            href: None,
        }
    }

    /// Appends the hidden presentation surfaces to the tree. Idempotent.
    pub fn create(&mut self, doc: &mut Document) {
        if let Some(surfaces) = &self.surfaces {
            if doc.alive(surfaces.overlay) && doc.alive(surfaces.tooltip) {
                return;
            }
        }
        let overlay_node = doc.create_element(doc.root(), "div");
        if let Some(data) = doc.element_mut(overlay_node) {
            data.add_class(classes::OVERLAY);
            data.set_style_property("display", "none");
        }
        let tooltip_node = doc.create_element(doc.root(), "div");
        if let Some(data) = doc.element_mut(tooltip_node) {
            data.add_class(classes::TOOLTIP);
            data.set_style_property("display", "none");
        }
        let tooltip_text = doc.create_text(tooltip_node, "");
        self.surfaces = Some(Surfaces { overlay: overlay_node, tooltip: tooltip_node, tooltip_text });
        debug!("created overlay and tooltip surfaces");
    }

    /// Activates `element`: cancels any pending hide, deactivates a previous
    /// element, and positions the overlay box and the clamped tooltip.
    pub fn show(&mut self, doc: &mut Document, element: NodeId, _now: Instant) -> Result<()> {
        self.hide_timer.cancel();
        if let Some(prev) = self.active.element() {
            if prev != element {
                if let Some(data) = doc.element_mut(prev) {
                    data.remove_class(classes::ACTIVE);
                }
            }
        }

        let surfaces = self.surfaces.as_ref().context("overlay surfaces not created")?;
        if !doc.alive(surfaces.overlay) || !doc.alive(surfaces.tooltip) {
            anyhow::bail!("overlay surfaces were removed from the tree");
        }
        let (overlay_node, tooltip_node, tooltip_text) =
            (surfaces.overlay, surfaces.tooltip, surfaces.tooltip_text);

        let (rect, href, origin) = {
            let data = doc.element(element).context("active element left the tree")?;
            (
                data.rect,
                data.attr(attrs::HREF).map(str::to_string),
                data.attr(attrs::ORIGIN).map(str::to_string),
            )
        };
        let viewport = doc.viewport();

        // Overlay box: element rect with a small visual inset, page coordinates
        let overlay_box = Rect::new(
            rect.left() + viewport.scroll_x - overlay::INSET_LEFT,
            rect.top() + viewport.scroll_y - overlay::INSET_TOP,
            rect.width + overlay::EXPAND_WIDTH,
            rect.height + overlay::EXPAND_HEIGHT,
        );
        if let Some(data) = doc.element_mut(overlay_node) {
            data.set_style_property("display", "block");
            data.set_style_property("top", &format!("{:.0}px", overlay_box.top()));
            data.set_style_property("left", &format!("{:.0}px", overlay_box.left()));
            data.set_style_property("width", &format!("{:.0}px", overlay_box.width));
            data.set_style_property("height", &format!("{:.0}px", overlay_box.height));
        }

        let tooltip_box = match (href, origin) {
            (Some(href), Some(origin)) => {
                let compact = rect.width < self.compact_width;
                let label = if compact {
                    overlay::COMPACT_GLYPH.to_string()
                } else {
                    format!("{origin} {}", overlay::COMPACT_GLYPH)
                };
                let size = tooltip_size(&label, compact);
                let placed = self.place_tooltip(&rect, size, &viewport);

                doc.set_text(tooltip_text, &label);
                if let Some(data) = doc.element_mut(tooltip_node) {
                    data.set_style_property("display", "block");
                    data.set_style_property("top", &format!("{:.0}px", placed.top()));
                    data.set_style_property("left", &format!("{:.0}px", placed.left()));
                }
                self.href = Some(href);
                Some(placed)
            }
            _ => {
                // Tagged element without the attribute pair: box only
                warn!("active element is missing provenance attributes");
                if let Some(data) = doc.element_mut(tooltip_node) {
                    data.set_style_property("display", "none");
                }
                self.href = None;
                None
            }
        };

        self.geometry = Some(OverlayGeometry { overlay: overlay_box, tooltip: tooltip_box });
        if let Some(data) = doc.element_mut(element) {
            data.add_class(classes::ACTIVE);
        }
        self.active = Active::Shown(element);
        Ok(())
    }

    /// Tooltip placement: above-right of the element, flipped below when
    /// there is no room above, clamped inside the viewport.
    fn place_tooltip(&self, rect: &Rect, (width, height): (f64, f64), viewport: &Viewport) -> Rect {
        let padding = self.viewport_padding;
        let mut top = rect.top() + viewport.scroll_y - height - overlay::TOOLTIP_GAP;
        let mut left = rect.right() + viewport.scroll_x + overlay::TOOLTIP_SHIFT - width;

        let min_top = viewport.scroll_y + padding;
        let max_top = viewport.scroll_y + viewport.height - height - padding;
        let min_left = viewport.scroll_x + padding;
        let max_left = viewport.scroll_x + viewport.width - width - padding;

        if top < min_top {
            top = rect.bottom() + viewport.scroll_y + overlay::TOOLTIP_GAP;
        }
        top = top.clamp(min_top, max_top.max(min_top));
        left = left.clamp(min_left, max_left.max(min_left));
        Rect::new(left, top, width, height)
    }

    /// Debounced hide: schedules removal after the grace period so moving
    /// onto the tooltip itself is tolerated.
    pub fn schedule_hide(&mut self, now: Instant) {
        match self.active {
            Active::Shown(element) | Active::Leaving(element) => {
                self.active = Active::Leaving(element);
                self.hide_timer.schedule(now + self.hide_grace);
            }
            Active::Idle => {}
        }
    }

    /// Cancels a pending hide (the pointer reached the tooltip).
    pub fn cancel_hide(&mut self) {
        if let Active::Leaving(element) = self.active {
            self.active = Active::Shown(element);
        }
        self.hide_timer.cancel();
    }

    /// Immediate hide, used on scroll.
    pub fn hide_now(&mut self, doc: &mut Document) {
        self.hide_timer.cancel();
        if let Some(element) = self.active.element() {
            if let Some(data) = doc.element_mut(element) {
                data.remove_class(classes::ACTIVE);
            }
        }
        if let Some(surfaces) = &self.surfaces {
            let (overlay_node, tooltip_node) = (surfaces.overlay, surfaces.tooltip);
            if let Some(data) = doc.element_mut(overlay_node) {
                data.set_style_property("display", "none");
            }
            if let Some(data) = doc.element_mut(tooltip_node) {
                data.set_style_property("display", "none");
            }
        }
        self.active = Active::Idle;
        self.geometry = None;
        self.href = None;
    }

    /// Fires the hide grace period when due.
    pub fn tick(&mut self, doc: &mut Document, now: Instant) {
        if self.hide_timer.fire(now) {
            self.hide_now(doc);
            debug!("hid overlay and tooltip after grace period");
        }
    }

    /// The provenance link when the page point lies inside the visible
    /// tooltip. `x`/`y` are viewport coordinates.
    pub fn link_at(&self, doc: &Document, x: f64, y: f64) -> Option<&str> {
        if !self.tooltip_contains(doc, x, y) {
            return None;
        }
        self.href.as_deref()
    }

    /// Whether the point (viewport coordinates) lies inside the visible tooltip.
    pub fn tooltip_contains(&self, doc: &Document, x: f64, y: f64) -> bool {
        let Some(tooltip) = self.geometry.as_ref().and_then(|g| g.tooltip) else {
            return false;
        };
        let viewport = doc.viewport();
        tooltip.contains(x + viewport.scroll_x, y + viewport.scroll_y)
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.active.element()
    }

    pub fn geometry(&self) -> Option<&OverlayGeometry> {
        self.geometry.as_ref()
    }

    /// Current tooltip label, for hosts that render the surfaces themselves.
    pub fn tooltip_label<'doc>(&self, doc: &'doc Document) -> Option<&'doc str> {
        let surfaces = self.surfaces.as_ref()?;
        doc.text(surfaces.tooltip_text)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.hide_timer.deadline()
    }

    /// Removes the presentation surfaces entirely. Idempotent and safe after
    /// partial initialization.
    pub fn teardown(&mut self, doc: &mut Document) {
        self.hide_timer.cancel();
        if let Some(element) = self.active.element() {
            if let Some(data) = doc.element_mut(element) {
                data.remove_class(classes::ACTIVE);
            }
        }
        if let Some(surfaces) = self.surfaces.take() {
            doc.remove(surfaces.overlay);
            doc.remove(surfaces.tooltip);
            debug!("removed overlay and tooltip surfaces");
        }
        self.active = Active::Idle;
        self.geometry = None;
        self.href = None;
    }
}

/// Approximate rendered size of the tooltip box.
fn tooltip_size(label: &str, compact: bool) -> (f64, f64) {
    let mut width =
        label.chars().count() as f64 * overlay::TOOLTIP_CHAR_WIDTH + overlay::TOOLTIP_PADDING_X;
    if !compact {
        width = width.max(overlay::TOOLTIP_MIN_WIDTH);
    }
    (width, overlay::TOOLTIP_HEIGHT)
}
