//! Text cleaner: rewrites encoded text nodes to their visible form while
//! remembering the original, so a host re-render that restores the encoded
//! text is recognized and re-cleaned on the next mutation batch.
//!
//! The side table is non-owning: entries are purged as their nodes leave the
//! tree, so an indefinitely re-rendering page cannot grow it without bound.
//! Invariant: a cleaned node's content is always either its original or its
//! cleaned form, never a third state.

use std::collections::HashMap;
use tracing::{debug, warn};

use indextree::NodeId;

use crate::decode::{decode_or_log, ProvenanceDecoder};
use crate::dom::Document;
use crate::registry::{in_skipped_container, tag_element, target_for};

/// The two legal contents of a cleaned text node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedTextRecord {
    pub original: String,
    pub cleaned: String,
}

#[derive(Debug, Default)]
pub struct TextCleaner {
    records: HashMap<NodeId, CleanedTextRecord>,
}

impl TextCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cleans every text node under the root. Returns the number rewritten.
    pub fn clean_all(&mut self, doc: &mut Document, decoder: &dyn ProvenanceDecoder) -> usize {
        let mut cleaned = 0;
        for text_node in doc.text_nodes(doc.root()) {
            if self.clean_text(doc, text_node, decoder) {
                cleaned += 1;
            }
        }
        if cleaned > 0 {
            debug!(cleaned, "rewrote encoded text nodes to their visible form");
        }
        cleaned
    }

    /// Cleans the text nodes touched by a mutation batch.
    pub fn process_nodes(
        &mut self,
        doc: &mut Document,
        nodes: &[NodeId],
        decoder: &dyn ProvenanceDecoder,
    ) -> usize {
        let mut cleaned = 0;
        for &node in nodes {
            if doc.is_text(node) {
                if self.clean_text(doc, node, decoder) {
                    cleaned += 1;
                }
            } else if doc.element(node).is_some() {
                for text_node in doc.text_nodes(node) {
                    if self.clean_text(doc, text_node, decoder) {
                        cleaned += 1;
                    }
                }
            }
        }
        cleaned
    }

    fn clean_text(
        &mut self,
        doc: &mut Document,
        text_node: NodeId,
        decoder: &dyn ProvenanceDecoder,
    ) -> bool {
        let Some(text) = doc.text(text_node).map(str::to_string) else {
            return false;
        };
        if text.trim().is_empty() || in_skipped_container(doc, text_node) {
            return false;
        }
        // Already in its cleaned form
        if self.records.get(&text_node).is_some_and(|rec| rec.cleaned == text) {
            return false;
        }
        let cleaned = match decoder.cleaned(&text) {
            Ok(Some(cleaned)) if cleaned != text => cleaned,
            Ok(_) => return false,
            Err(err) => {
                warn!(error = %err, "decoder failed while splitting text, leaving node untouched");
                return false;
            }
        };
        let Some(record) = decode_or_log(decoder, &text) else {
            return false;
        };

        self.records.insert(
            text_node,
            CleanedTextRecord { original: text, cleaned: cleaned.clone() },
        );
        doc.set_text(text_node, &cleaned);
        if let Some(target) = target_for(doc, text_node) {
            tag_element(doc, target, &record);
        }
        true
    }

    /// Rewrites every recorded node back to its original encoded text and
    /// drops the side table. A node the host has rewritten to something other
    /// than the cleaned form is left alone. Returns the number restored.
    pub fn restore_all(&mut self, doc: &mut Document) -> usize {
        let mut restored = 0;
        for (node, record) in self.records.drain() {
            if !doc.alive(node) {
                continue;
            }
            if doc.text(node) == Some(record.cleaned.as_str()) {
                doc.set_text(node, &record.original);
                restored += 1;
            }
        }
        if restored > 0 {
            debug!(restored, "restored encoded originals");
        }
        restored
    }

    /// Drops entries whose nodes have left the tree.
    pub fn purge_removed(&mut self, doc: &Document) {
        self.records.retain(|&id, _| doc.alive(id));
    }

    pub fn record(&self, text_node: NodeId) -> Option<&CleanedTextRecord> {
        self.records.get(&text_node)
    }
}
