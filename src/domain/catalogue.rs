//! Fingerprint Catalogue
//!
//! Deduplicates frozen call fingerprints by combined hash and counts
//! occurrences. Grows monotonically for the duration of one trace run.

use std::collections::HashMap;

use crate::domain::fingerprint::CallFingerprint;
use crate::domain::hashing::TraceHash;

/// One deduplicated call shape and how many calls produced it.
#[derive(Debug)]
pub struct CatalogueEntry {
    pub fingerprint: CallFingerprint,
    pub count: u64,
}

#[derive(Debug, Default)]
pub struct FingerprintCatalogue {
    entries: HashMap<TraceHash, CatalogueEntry>,
}

impl FingerprintCatalogue {
    pub fn new() -> Self {
        FingerprintCatalogue::default()
    }

    /// Record one frozen fingerprint, returning its hash.
    ///
    /// On a hash match the count is incremented and the new instance is
    /// discarded: the first-seen instance stays canonical, since equal-hash
    /// fingerprints are structurally interchangeable by construction. A true
    /// collision between different shapes would silently merge them; that is a
    /// known, accepted limitation.
    pub fn record(&mut self, fingerprint: CallFingerprint) -> TraceHash {
        let hash = fingerprint.combined_hash();
        self.entries
            .entry(hash)
            .and_modify(|entry| entry.count += 1)
            .or_insert(CatalogueEntry {
                fingerprint,
                count: 1,
            });
        hash
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, hash: TraceHash) -> Option<&CatalogueEntry> {
        self.entries.get(&hash)
    }

    /// Entries in first-seen order, for deterministic export.
    pub fn sorted_entries(&self) -> Vec<&CatalogueEntry> {
        let mut entries: Vec<&CatalogueEntry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.fingerprint.sequence_id());
        entries
    }

    /// Highest formal parameter position seen across all retained fingerprints.
    /// Drives the dynamically generated export header.
    pub fn max_parameter_position(&self) -> i32 {
        self.entries
            .values()
            .filter_map(|entry| entry.fingerprint.max_position())
            .max()
            .unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fingerprint::{Dispatch, FunctionId, RETURN_SLOT};
    use crate::domain::shape::ValueShape;

    fn fingerprint(name: &str, seq: u64, arg_kind: &str) -> CallFingerprint {
        let mut fp = CallFingerprint::new(
            "base",
            name,
            FunctionId::from_definition("base", name),
            Dispatch::None,
            seq,
        );
        fp.set_slot(0, ValueShape::of_kind(arg_kind));
        fp.set_slot(RETURN_SLOT, ValueShape::of_kind("double"));
        fp
    }

    #[test]
    fn recording_same_shape_increments_count_only() {
        let mut catalogue = FingerprintCatalogue::new();
        let h1 = catalogue.record(fingerprint("f", 0, "double"));
        let h2 = catalogue.record(fingerprint("f", 1, "double"));
        let h3 = catalogue.record(fingerprint("f", 2, "double"));

        assert_eq!(h1, h2);
        assert_eq!(h2, h3);
        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue.get(h1).unwrap().count, 3);
        // The canonical instance is the first one recorded.
        assert_eq!(catalogue.get(h1).unwrap().fingerprint.sequence_id(), 0);
    }

    #[test]
    fn different_shapes_get_distinct_entries() {
        let mut catalogue = FingerprintCatalogue::new();
        catalogue.record(fingerprint("f", 0, "double"));
        catalogue.record(fingerprint("f", 1, "character"));
        assert_eq!(catalogue.len(), 2);
    }

    #[test]
    fn sorted_entries_follow_first_seen_order() {
        let mut catalogue = FingerprintCatalogue::new();
        catalogue.record(fingerprint("g", 5, "double"));
        catalogue.record(fingerprint("f", 7, "character"));
        let names: Vec<&str> = catalogue
            .sorted_entries()
            .iter()
            .map(|e| e.fingerprint.function_name())
            .collect();
        assert_eq!(names, ["g", "f"]);
    }

    #[test]
    fn max_parameter_position_spans_all_entries() {
        let mut catalogue = FingerprintCatalogue::new();
        assert_eq!(catalogue.max_parameter_position(), -1);
        catalogue.record(fingerprint("f", 0, "double"));
        let mut wide = fingerprint("g", 1, "double");
        wide.set_slot(4, ValueShape::of_kind("list"));
        catalogue.record(wide);
        assert_eq!(catalogue.max_parameter_position(), 4);
    }
}
