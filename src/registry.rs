//! Element Registry: discovers and keeps current the set of rendered elements
//! carrying decodable provenance.
//!
//! Tagging writes the attribute triple (`data-lens-encoded`, `data-lens-href`,
//! `data-lens-origin`) onto the nearest meaningful ancestor of the decodable
//! text fragment: an ancestor carrying `data-lens-edit-target` when one
//! exists (the host-markup convention for text hidden inside zero-size
//! descendants), otherwise the immediate container. The registry owns the
//! tagged set; other components read snapshots through accessors and never
//! hold node ids across mutation batches.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use indextree::NodeId;

use crate::constants::{attrs, scan};
use crate::decode::{decode_or_log, ProvenanceDecoder, ProvenanceRecord};
use crate::dom::{Document, Mutation};
use crate::sched::Debounce;

/// Writes the attribute triple onto `element`, idempotently.
/// Returns true when the element was newly tagged.
pub(crate) fn tag_element(doc: &mut Document, element: NodeId, record: &ProvenanceRecord) -> bool {
    let Some(data) = doc.element_mut(element) else {
        return false;
    };
    if data.has_attr(attrs::ENCODED) {
        return false;
    }
    data.set_attr(attrs::ENCODED, "");
    data.set_attr(attrs::HREF, &record.href);
    data.set_attr(attrs::ORIGIN, &record.origin);
    debug!(href = %record.href, origin = %record.origin, "encoded element found");
    true
}

fn untag_element(doc: &mut Document, element: NodeId) {
    if let Some(data) = doc.element_mut(element) {
        data.remove_attr(attrs::ENCODED);
        data.remove_attr(attrs::HREF);
        data.remove_attr(attrs::ORIGIN);
    }
}

/// The element that should carry the tag for a given text node.
pub(crate) fn target_for(doc: &Document, text_node: NodeId) -> Option<NodeId> {
    doc.closest(text_node, |el| el.has_attr(attrs::EDIT_TARGET))
        .or_else(|| doc.parent_element(text_node))
}

pub(crate) fn in_skipped_container(doc: &Document, text_node: NodeId) -> bool {
    doc.closest(text_node, |el| scan::SKIPPED_CONTAINERS.contains(&el.tag.as_str()))
        .is_some()
}

/// Explicit subscription to tree mutations with a start/stop contract.
/// Notifications are debounced into one incremental rescan per quiet period.
#[derive(Debug)]
struct MutationSubscription {
    connected: bool,
    debounce: Debounce,
    pending: Vec<Mutation>,
}

impl MutationSubscription {
    fn new(quiet: Duration) -> Self {
        Self { connected: false, debounce: Debounce::new(quiet), pending: Vec::new() }
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.debounce.cancel();
        self.pending.clear();
    }
}

#[derive(Debug)]
pub struct ElementRegistry {
    /// Cached tagged set, recomputed only when invalidated by a scan.
    tagged: Option<Vec<NodeId>>,
    subscription: MutationSubscription,
}

impl ElementRegistry {
    pub fn new(debounce_quiet: Duration) -> Self {
        Self { tagged: None, subscription: MutationSubscription::new(debounce_quiet) }
    }

    /// Full scan: walks every text node under the root, skipping
    /// script/style/noscript regions and whitespace-only fragments.
    /// Returns the number of newly tagged elements.
    pub fn scan_all(&mut self, doc: &mut Document, decoder: &dyn ProvenanceDecoder) -> usize {
        let mut newly_tagged = 0;
        for text_node in doc.text_nodes(doc.root()) {
            if self.scan_text(doc, text_node, decoder) {
                newly_tagged += 1;
            }
        }
        self.tagged = None;
        info!(tagged = newly_tagged, "document scan complete");
        newly_tagged
    }

    /// Incremental scan of one added node (text or element subtree).
    pub fn scan_node(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        decoder: &dyn ProvenanceDecoder,
    ) -> usize {
        let mut newly_tagged = 0;
        if doc.is_text(node) {
            if self.scan_text(doc, node, decoder) {
                newly_tagged += 1;
            }
        } else {
            for text_node in doc.text_nodes(node) {
                if self.scan_text(doc, text_node, decoder) {
                    newly_tagged += 1;
                }
            }
        }
        newly_tagged
    }

    /// Evaluates one text node. A fragment whose decoded form changed since
    /// the last scan gets its stale tag replaced with the new record; a
    /// fragment that no longer decodes leaves any existing tag alone (it may
    /// simply have been rewritten to its cleaned form).
    fn scan_text(
        &mut self,
        doc: &mut Document,
        text_node: NodeId,
        decoder: &dyn ProvenanceDecoder,
    ) -> bool {
        let Some(text) = doc.text(text_node) else {
            return false;
        };
        if text.trim().is_empty() || in_skipped_container(doc, text_node) {
            return false;
        }
        let Some(record) = decode_or_log(decoder, text) else {
            return false;
        };
        let Some(target) = target_for(doc, text_node) else {
            return false;
        };
        let stale = doc.element(target).is_some_and(|el| {
            el.has_attr(attrs::ENCODED) && el.attr(attrs::HREF) != Some(record.href.as_str())
        });
        if stale {
            untag_element(doc, target);
        }
        if tag_element(doc, target, &record) {
            self.tagged = None;
            true
        } else {
            false
        }
    }

    /// Snapshot of the current tagged set, cached between scans.
    pub fn tagged_elements(&mut self, doc: &Document) -> Vec<NodeId> {
        if let Some(cached) = &mut self.tagged {
            cached.retain(|&id| doc.alive(id));
            return cached.clone();
        }
        let tagged: Vec<NodeId> = doc
            .elements(doc.root())
            .into_iter()
            .filter(|&id| doc.element(id).is_some_and(|el| el.has_attr(attrs::ENCODED)))
            .collect();
        self.tagged = Some(tagged.clone());
        tagged
    }

    pub fn invalidate(&mut self) {
        self.tagged = None;
    }

    // --- mutation subscription ---

    pub fn start_observing(&mut self) {
        self.subscription.connected = true;
        debug!("mutation subscription connected");
    }

    pub fn stop_observing(&mut self) {
        self.subscription.disconnect();
    }

    pub fn is_observing(&self) -> bool {
        self.subscription.connected
    }

    /// Feeds a batch of journal entries into the debounced subscription.
    pub fn notify(&mut self, mutations: &[Mutation], now: Instant) {
        if !self.subscription.connected || mutations.is_empty() {
            return;
        }
        for mutation in mutations {
            match mutation {
                Mutation::Added(_) | Mutation::TextChanged(_) => {
                    self.subscription.pending.push(*mutation);
                }
                Mutation::Removed(_) => {
                    // Tagged nodes may have left the tree
                    self.tagged = None;
                }
            }
        }
        self.subscription.debounce.poke(now);
    }

    /// Runs the debounced incremental rescan once its quiet period elapses.
    /// Returns the deduplicated set of nodes it inspected, or `None` when
    /// nothing was due.
    pub fn process_due(
        &mut self,
        doc: &mut Document,
        decoder: &dyn ProvenanceDecoder,
        now: Instant,
    ) -> Option<Vec<NodeId>> {
        if !self.subscription.connected || !self.subscription.debounce.fire(now) {
            return None;
        }
        let pending = std::mem::take(&mut self.subscription.pending);
        let mut seen = HashSet::new();
        let mut inspected = Vec::new();
        for mutation in pending {
            let node = mutation.node();
            if !seen.insert(node) || !doc.alive(node) {
                continue;
            }
            inspected.push(node);
            // Added and changed nodes go through the same re-evaluation, so a
            // node appearing under both kinds in one batch is still retagged
            match mutation {
                Mutation::Added(_) | Mutation::TextChanged(_) => {
                    self.scan_node(doc, node, decoder);
                }
                Mutation::Removed(_) => {}
            }
        }
        self.tagged = None;
        debug!(nodes = inspected.len(), "processed mutation batch");
        Some(inspected)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.subscription.debounce.deadline()
    }

    /// Strips every injected attribute triple and disconnects the
    /// subscription. Safe to call repeatedly and after partial initialization.
    pub fn cleanup(&mut self, doc: &mut Document) {
        self.stop_observing();
        let mut stripped = 0;
        for element in doc.elements(doc.root()) {
            if doc.element(element).is_some_and(|el| el.has_attr(attrs::ENCODED)) {
                untag_element(doc, element);
                stripped += 1;
            }
        }
        self.tagged = None;
        info!(stripped, "cleaned up tagged elements");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::PayloadDecoder;
    use crate::dom::Viewport;
    use std::time::Duration;

    fn payload(origin: &str, href: &str) -> String {
        format!(r#"{{"origin":"{origin}","href":"{href}"}}"#)
    }

    fn doc() -> Document {
        Document::new(Viewport::new(1024.0, 768.0))
    }

    fn registry() -> ElementRegistry {
        ElementRegistry::new(Duration::from_millis(100))
    }

    #[test]
    fn test_scan_tags_immediate_parent() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        doc.create_text(para, &format!("Hello{}", payload("cms", "https://x")));

        let mut registry = registry();
        assert_eq!(registry.scan_all(&mut doc, &PayloadDecoder), 1);
        let el = doc.element(para).unwrap();
        assert!(el.has_attr(attrs::ENCODED));
        assert_eq!(el.attr(attrs::HREF), Some("https://x"));
        assert_eq!(el.attr(attrs::ORIGIN), Some("cms"));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        doc.create_text(para, &format!("Hi{}", payload("o", "https://a")));

        let mut registry = registry();
        assert_eq!(registry.scan_all(&mut doc, &PayloadDecoder), 1);
        let first = registry.tagged_elements(&doc);
        assert_eq!(registry.scan_all(&mut doc, &PayloadDecoder), 0);
        assert_eq!(registry.tagged_elements(&doc), first);
    }

    #[test]
    fn test_scan_prefers_edit_target_ancestor() {
        let mut doc = doc();
        let card = doc.create_element(doc.root(), "div");
        doc.element_mut(card).unwrap().set_attr(attrs::EDIT_TARGET, "");
        let span = doc.create_element(card, "span");
        doc.create_text(span, &format!("Title{}", payload("o", "https://a")));

        let mut registry = registry();
        registry.scan_all(&mut doc, &PayloadDecoder);
        assert!(doc.element(card).unwrap().has_attr(attrs::ENCODED));
        assert!(!doc.element(span).unwrap().has_attr(attrs::ENCODED));
    }

    #[test]
    fn test_scan_reaches_text_in_hidden_descendant() {
        // The edit-target convention: decodable text sits inside a hidden,
        // zero-size child but the marked ancestor gets the tag.
        let mut doc = doc();
        let card = doc.create_element(doc.root(), "div");
        doc.element_mut(card).unwrap().set_attr(attrs::EDIT_TARGET, "");
        let hidden = doc.create_element(card, "span");
        doc.element_mut(hidden).unwrap().display_none = true;
        doc.create_text(hidden, &payload("o", "https://a"));

        let mut registry = registry();
        assert_eq!(registry.scan_all(&mut doc, &PayloadDecoder), 1);
        assert!(doc.element(card).unwrap().has_attr(attrs::ENCODED));
    }

    #[test]
    fn test_scan_skips_script_style_and_whitespace() {
        let mut doc = doc();
        let script = doc.create_element(doc.root(), "script");
        doc.create_text(script, &payload("o", "https://a"));
        let style = doc.create_element(doc.root(), "style");
        doc.create_text(style, &payload("o", "https://b"));
        let para = doc.create_element(doc.root(), "p");
        doc.create_text(para, "   \n\t ");

        let mut registry = registry();
        assert_eq!(registry.scan_all(&mut doc, &PayloadDecoder), 0);
        assert!(registry.tagged_elements(&doc).is_empty());
    }

    #[test]
    fn test_plain_text_yields_no_tag() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        doc.create_text(para, "no payload here");

        let mut registry = registry();
        assert_eq!(registry.scan_all(&mut doc, &PayloadDecoder), 0);
    }

    #[test]
    fn test_debounced_batch_processes_once() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        let text = doc.create_text(para, "plain");
        doc.take_mutations();

        let mut registry = registry();
        registry.start_observing();

        let t0 = Instant::now();
        // Ten notifications for the same node within 10 ms
        for i in 0..10 {
            doc.set_text(text, &format!("v{i}{}", payload("o", "https://a")));
            let mutations = doc.take_mutations();
            registry.notify(&mutations, t0 + Duration::from_millis(i));
        }
        // Still inside the quiet period
        assert!(registry.process_due(&mut doc, &PayloadDecoder, t0 + Duration::from_millis(50)).is_none());
        // One batch, one node after dedup
        let batch = registry
            .process_due(&mut doc, &PayloadDecoder, t0 + Duration::from_millis(110))
            .unwrap();
        assert_eq!(batch, vec![text]);
        assert!(doc.element(para).unwrap().has_attr(attrs::ENCODED));
        // Nothing further pending
        assert!(registry.process_due(&mut doc, &PayloadDecoder, t0 + Duration::from_millis(500)).is_none());
    }

    #[test]
    fn test_changed_decoded_form_is_retagged() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        let text = doc.create_text(para, &format!("a{}", payload("o", "https://old")));

        let mut registry = registry();
        registry.scan_all(&mut doc, &PayloadDecoder);
        assert_eq!(doc.element(para).unwrap().attr(attrs::HREF), Some("https://old"));

        registry.start_observing();
        let t0 = Instant::now();
        doc.set_text(text, &format!("a{}", payload("o", "https://new")));
        let mutations = doc.take_mutations();
        registry.notify(&mutations, t0);
        registry.process_due(&mut doc, &PayloadDecoder, t0 + Duration::from_millis(150));
        assert_eq!(doc.element(para).unwrap().attr(attrs::HREF), Some("https://new"));
    }

    #[test]
    fn test_replaced_text_node_updates_stale_tag() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        let old = doc.create_text(para, &format!("a{}", payload("o", "https://old")));

        let mut registry = registry();
        registry.scan_all(&mut doc, &PayloadDecoder);
        doc.take_mutations();
        registry.start_observing();

        // Host swaps the text node wholesale, so the batch only carries
        // Removed plus Added for the replacement
        let t0 = Instant::now();
        doc.remove(old);
        doc.create_text(para, &format!("a{}", payload("o", "https://new")));
        let mutations = doc.take_mutations();
        registry.notify(&mutations, t0);
        registry.process_due(&mut doc, &PayloadDecoder, t0 + Duration::from_millis(150));
        assert_eq!(doc.element(para).unwrap().attr(attrs::HREF), Some("https://new"));
    }

    #[test]
    fn test_cleanup_strips_all_tags_and_is_reentrant() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        doc.create_text(para, &format!("x{}", payload("o", "https://a")));

        let mut registry = registry();
        registry.scan_all(&mut doc, &PayloadDecoder);
        registry.start_observing();
        registry.cleanup(&mut doc);
        let el = doc.element(para).unwrap();
        assert!(!el.has_attr(attrs::ENCODED));
        assert!(!el.has_attr(attrs::HREF));
        assert!(!el.has_attr(attrs::ORIGIN));
        assert!(!registry.is_observing());
        // Safe to call again, and before any scan ever ran
        registry.cleanup(&mut doc);
        ElementRegistry::new(Duration::from_millis(100)).cleanup(&mut doc);
    }

    #[test]
    fn test_tagged_cache_drops_removed_nodes() {
        let mut doc = doc();
        let para = doc.create_element(doc.root(), "p");
        doc.create_text(para, &format!("x{}", payload("o", "https://a")));

        let mut registry = registry();
        registry.scan_all(&mut doc, &PayloadDecoder);
        assert_eq!(registry.tagged_elements(&doc), vec![para]);
        doc.remove(para);
        assert!(registry.tagged_elements(&doc).is_empty());
    }
}
