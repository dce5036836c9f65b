//! Scan Controller: the orchestrator and state machine wiring pointer, scroll
//! and mutation handling to the registry, tracker, highlighter and presenter,
//! keyed off the host's `edit_mode` boolean.
//!
//! The host owns the event loop: it forwards input through
//! [`ScanEngine::handle_event`], pumps [`ScanEngine::tick`] when the deadline
//! reported by [`ScanEngine::next_deadline`] comes due, and flips edit mode
//! through [`ScanEngine::set_edit_mode`]. No internal failure crosses these
//! entry points; everything is absorbed and logged per the error policy.

use std::time::Instant;
use tracing::{debug, error, info};

use indextree::NodeId;

use crate::clean::TextCleaner;
use crate::config::EngineConfig;
use crate::constants::attrs;
use crate::decode::ProvenanceDecoder;
use crate::dom::{Document, Mutation};
use crate::overlay::OverlayPresenter;
use crate::proximity::ProximityHighlighter;
use crate::registry::ElementRegistry;
use crate::sched::{earliest, Delay, Throttle};
use crate::visibility::VisibilityTracker;

/// Side effects the engine cannot perform itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEffect {
    /// Open the provenance link in a new browsing context, without leaking a
    /// referrer to it.
    OpenProvenance { href: String },
}

/// Input events forwarded by the host. Coordinates are viewport-relative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMove { x: f64, y: f64 },
    PointerDown { x: f64, y: f64 },
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Inactive,
    Active,
}

pub struct ScanEngine {
    config: EngineConfig,
    decoder: Box<dyn ProvenanceDecoder>,
    phase: Phase,
    registry: ElementRegistry,
    tracker: VisibilityTracker,
    highlighter: ProximityHighlighter,
    overlay: OverlayPresenter,
    cleaner: TextCleaner,
    pointer: Throttle<(f64, f64)>,
    initial_scan: Delay,
}

impl ScanEngine {
    pub fn new(config: EngineConfig, decoder: Box<dyn ProvenanceDecoder>) -> Self {
        let registry = ElementRegistry::new(config.mutation_debounce());
        let highlighter = ProximityHighlighter::new(
            config.proximity_threshold,
            config.falloff_range,
            config.candidate_ttl(),
        );
        let overlay = OverlayPresenter::new(
            config.compact_width,
            config.viewport_padding,
            config.hide_grace(),
        );
        let pointer = Throttle::new(config.pointer_throttle());
        Self {
            config,
            decoder,
            phase: Phase::Inactive,
            registry,
            tracker: VisibilityTracker::new(),
            highlighter,
            overlay,
            cleaner: TextCleaner::new(),
            pointer,
            initial_scan: Delay::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Reacts to the edit-mode boolean. Re-entrant transitions are no-ops.
    pub fn set_edit_mode(&mut self, doc: &mut Document, enabled: bool, now: Instant) {
        match (self.phase, enabled) {
            (Phase::Inactive, true) => self.activate(doc, now),
            (Phase::Active, false) => self.deactivate(doc),
            _ => debug!(enabled, "edit mode unchanged, nothing to do"),
        }
    }

    fn activate(&mut self, doc: &mut Document, now: Instant) {
        info!("edit mode on, activating scan engine");
        self.overlay.create(doc);
        // Pre-activation journal entries (and our own surface inserts) are
        // covered by the initial full scan
        doc.take_mutations();
        self.registry.start_observing();
        // The first full scan is deferred so activation never blocks input
        self.initial_scan.schedule(now);
        self.phase = Phase::Active;
    }

    /// Reverse of activation: cancel every pending task before detaching, so
    /// no stale callback can fire after teardown, then strip all presentation
    /// state and put the encoded originals back. Safe to run redundantly and
    /// after partial activation.
    fn deactivate(&mut self, doc: &mut Document) {
        info!("edit mode off, deactivating scan engine");
        self.pointer.cancel();
        self.initial_scan.cancel();
        self.registry.stop_observing();
        self.tracker.stop();
        self.highlighter.clear_all(doc);
        self.overlay.teardown(doc);
        self.cleaner.restore_all(doc);
        self.registry.cleanup(doc);
        // Teardown's own journal entries are of no further interest
        doc.take_mutations();
        self.phase = Phase::Inactive;
    }

    /// Forwards one input event. Returns a side effect for the host to carry
    /// out, if any.
    pub fn handle_event(
        &mut self,
        doc: &mut Document,
        event: InputEvent,
        now: Instant,
    ) -> Option<EngineEffect> {
        if self.phase == Phase::Inactive {
            return None;
        }
        self.ingest(doc, now);
        match event {
            InputEvent::PointerMove { x, y } => {
                if let Some((x, y)) = self.pointer.accept(now, (x, y)) {
                    self.pointer_update(doc, x, y, now);
                }
                None
            }
            InputEvent::Scroll => {
                // Scrolling invalidates every cached bounding box
                self.highlighter.clear_all(doc);
                self.overlay.hide_now(doc);
                None
            }
            InputEvent::PointerDown { x, y } => self
                .overlay
                .link_at(doc, x, y)
                .map(|href| EngineEffect::OpenProvenance { href: href.to_string() }),
        }
    }

    /// Runs every task that has come due: the deferred initial scan, the
    /// debounced mutation batch, the trailing pointer position and the
    /// overlay hide grace period.
    pub fn tick(&mut self, doc: &mut Document, now: Instant) {
        if self.phase == Phase::Inactive {
            return;
        }
        self.ingest(doc, now);

        if self.initial_scan.fire(now) {
            self.registry.scan_all(doc, self.decoder.as_ref());
            if self.config.clean_text {
                self.cleaner.clean_all(doc, self.decoder.as_ref());
            }
            self.after_registry_change(doc);
        }

        if let Some(batch) = self.registry.process_due(doc, self.decoder.as_ref(), now) {
            if self.config.clean_text {
                self.cleaner.process_nodes(doc, &batch, self.decoder.as_ref());
            }
            self.cleaner.purge_removed(doc);
            self.after_registry_change(doc);
        }

        if let Some((x, y)) = self.pointer.fire(now) {
            self.pointer_update(doc, x, y, now);
        }

        self.overlay.tick(doc, now);
    }

    /// Earliest pending deadline, for the host to schedule the next tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest(
            earliest(self.initial_scan.deadline(), self.registry.deadline()),
            earliest(self.pointer.deadline(), self.overlay.deadline()),
        )
    }

    /// Snapshot of the currently tagged elements.
    pub fn tagged_elements(&mut self, doc: &Document) -> Vec<NodeId> {
        self.registry.tagged_elements(doc)
    }

    /// The element currently backing the overlay, if any.
    pub fn active_element(&self) -> Option<NodeId> {
        self.overlay.active_element()
    }

    /// Drains the document journal into the debounced subscription.
    fn ingest(&mut self, doc: &mut Document, now: Instant) {
        let mutations = doc.take_mutations();
        if mutations.is_empty() {
            return;
        }
        if mutations.iter().any(|m| matches!(m, Mutation::Removed(_))) {
            self.cleaner.purge_removed(doc);
        }
        self.registry.notify(&mutations, now);
    }

    /// Scans and rewrites settle here; our own journal entries are dropped so
    /// the tagging pipeline does not feed itself.
    fn after_registry_change(&mut self, doc: &mut Document) {
        doc.take_mutations();
        let tagged = self.registry.tagged_elements(doc);
        self.tracker.refresh(doc, &tagged);
        self.highlighter.invalidate_candidates();
    }

    fn pointer_update(&mut self, doc: &mut Document, x: f64, y: f64, now: Instant) {
        // Hovering the tooltip itself keeps it alive
        if self.overlay.tooltip_contains(doc, x, y) {
            self.overlay.cancel_hide();
            return;
        }
        self.highlighter.update_for_pointer(doc, &self.tracker, x, y, now);

        let hovered = doc
            .element_at(x, y)
            .and_then(|hit| doc.closest(hit, |el| el.has_attr(attrs::ENCODED)));
        match hovered {
            Some(element) => {
                if let Err(err) = self.overlay.show(doc, element, now) {
                    error!(error = %err, "failed to present overlay");
                }
            }
            None => self.overlay.schedule_hide(now),
        }
    }
}
