//! Visibility Tracker: narrows the working set to tagged elements currently
//! intersecting the viewport, bounding the per-pointer-move cost.
//!
//! When the host platform cannot report intersections the tracker degrades to
//! the full tagged set. Slower, but correct.

use indextree::NodeId;
use tracing::{debug, warn};

use crate::dom::Document;

#[derive(Debug, Default)]
pub struct VisibilityTracker {
    watched: Vec<NodeId>,
    visible: Vec<NodeId>,
    degraded: bool,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-subscribes the intersection watcher over the current tagged set.
    /// Call after every registry change.
    pub fn refresh(&mut self, doc: &Document, tagged: &[NodeId]) {
        self.watched = tagged.to_vec();
        if !doc.intersection_supported {
            if !self.degraded {
                warn!("intersection tracking unavailable, falling back to the full tagged set");
                self.degraded = true;
            }
            self.visible = self.watched.clone();
            return;
        }
        self.degraded = false;
        let view = doc.viewport().rect();
        self.visible = self
            .watched
            .iter()
            .copied()
            .filter(|&id| {
                doc.element(id)
                    .is_some_and(|el| !el.is_hidden() && el.rect.intersects(&view))
            })
            .collect();
        debug!(watched = self.watched.len(), visible = self.visible.len(), "visibility refreshed");
    }

    /// The subset of the tagged set worth per-frame work.
    pub fn visible_candidates(&self) -> &[NodeId] {
        &self.visible
    }

    /// Disconnects the watcher and clears tracked state. Idempotent.
    pub fn stop(&mut self) {
        self.watched.clear();
        self.visible.clear();
        self.degraded = false;
    }
}
