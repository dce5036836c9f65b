//! Proximity Highlighter: gives tagged elements within a soft threshold of
//! the pointer a visual affordance whose intensity decays with distance.
//!
//! The candidate set is cached with a short TTL so the tree is not re-queried
//! on every pointer tick; bounding boxes are read fresh each tick since the
//! page can re-layout between renders.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::debug;

use indextree::NodeId;

use crate::constants::{classes, proximity, style_props};
use crate::dom::Document;
use crate::visibility::VisibilityTracker;

#[derive(Debug)]
pub struct ProximityHighlighter {
    threshold: f64,
    falloff_range: f64,
    candidate_ttl: Duration,
    highlighted: HashSet<NodeId>,
    candidates: Option<(Instant, Vec<NodeId>)>,
}

impl ProximityHighlighter {
    pub fn new(threshold: f64, falloff_range: f64, candidate_ttl: Duration) -> Self {
        Self {
            threshold,
            falloff_range,
            candidate_ttl,
            highlighted: HashSet::new(),
            candidates: None,
        }
    }

    /// Recomputes highlight state for the current pointer position.
    pub fn update_for_pointer(
        &mut self,
        doc: &mut Document,
        tracker: &VisibilityTracker,
        x: f64,
        y: f64,
        now: Instant,
    ) {
        let candidates = self.candidates_for(tracker, now);
        let previous = std::mem::take(&mut self.highlighted);
        let mut highlighted = HashSet::new();
        for id in candidates {
            let Some(rect) = doc.element(id).map(|el| el.rect) else {
                continue;
            };
            // Shortest distance from the pointer to any of the four edges
            let distance = (x - rect.left())
                .abs()
                .min((x - rect.right()).abs())
                .min((y - rect.top()).abs())
                .min((y - rect.bottom()).abs());

            if distance < self.threshold {
                let Some(element) = doc.element_mut(id) else { continue };
                let relative_x = x - rect.left();
                let relative_y = y - rect.top();
                let base = proximity::MIN_GRADIENT
                    .max(rect.width.max(rect.height) * proximity::SIZE_FACTOR);
                let scale = ((self.falloff_range - distance) / self.falloff_range).clamp(0.0, 1.0);
                let gradient = base * scale;

                element.set_style_property(style_props::CURSOR_X, &format!("{relative_x:.0}px"));
                element.set_style_property(style_props::CURSOR_Y, &format!("{relative_y:.0}px"));
                element.set_style_property(style_props::GRADIENT_SIZE, &format!("{gradient:.0}px"));
                element.add_class(classes::PROXIMITY);
                highlighted.insert(id);
            } else {
                Self::unmark(doc, id);
            }
        }
        // Elements that dropped out of the candidate set since the last tick
        // lose their mark too
        for id in previous {
            if !highlighted.contains(&id) {
                Self::unmark(doc, id);
            }
        }
        if !highlighted.is_empty() {
            debug!(count = highlighted.len(), "highlighted elements near pointer");
        }
        self.highlighted = highlighted;
    }

    /// Unmarks every highlighted element and drops the derived style
    /// properties. Used on scroll and on teardown, since cached geometry is
    /// invalidated by scrolling.
    pub fn clear_all(&mut self, doc: &mut Document) {
        let cleared = self.highlighted.len();
        for id in self.highlighted.drain() {
            Self::unmark(doc, id);
        }
        self.candidates = None;
        if cleared > 0 {
            debug!(cleared, "cleared proximity highlights");
        }
    }

    fn unmark(doc: &mut Document, id: NodeId) {
        if let Some(element) = doc.element_mut(id) {
            element.remove_class(classes::PROXIMITY);
            element.remove_style_property(style_props::CURSOR_X);
            element.remove_style_property(style_props::CURSOR_Y);
            element.remove_style_property(style_props::GRADIENT_SIZE);
        }
    }

    /// Drops the cached candidate set so the next tick re-queries the tracker.
    pub fn invalidate_candidates(&mut self) {
        self.candidates = None;
    }

    fn candidates_for(&mut self, tracker: &VisibilityTracker, now: Instant) -> Vec<NodeId> {
        if let Some((cached_at, cached)) = &self.candidates {
            if now.duration_since(*cached_at) < self.candidate_ttl {
                return cached.clone();
            }
        }
        let fresh = tracker.visible_candidates().to_vec();
        self.candidates = Some((now, fresh.clone()));
        fresh
    }
}
