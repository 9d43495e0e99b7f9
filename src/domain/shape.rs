//! Value Shapes
//!
//! Structural description of one observed value: top-level kind, tag
//! annotations, class names, and attribute names. Immutable once built; the
//! engine never touches the value itself.

use crate::domain::hashing::{combine_commutative, hash_str, TraceHash};

/// Kind recorded for a missing-argument sentinel.
pub const MISSING_KIND: &str = "missing";
/// Kind recorded when a call is abandoned through a non-local exit.
pub const JUMP_KIND: &str = "jump";
/// Kind recorded under a variadic formal parameter.
pub const DOTS_KIND: &str = "...";

/// Structural shape of a single observed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueShape {
    kind: String,
    tags: Vec<String>,
    classes: Vec<String>,
    attr_names: Vec<String>,
}

impl ValueShape {
    /// Build a shape from host-reported observation data.
    ///
    /// A kind of the form `base@tag` folds the suffix into the tag list, so
    /// hosts can smuggle one annotation through the kind string.
    pub fn new(
        kind: &str,
        mut tags: Vec<String>,
        classes: Vec<String>,
        attr_names: Vec<String>,
    ) -> Self {
        let kind = match kind.split_once('@') {
            Some((base, tag)) => {
                tags.push(tag.to_string());
                base.to_string()
            }
            None => kind.to_string(),
        };
        ValueShape {
            kind,
            tags,
            classes,
            attr_names,
        }
    }

    /// Bare shape with only a kind, used for the sentinels below.
    pub fn of_kind(kind: &str) -> Self {
        ValueShape::new(kind, Vec::new(), Vec::new(), Vec::new())
    }

    pub fn missing() -> Self {
        ValueShape::of_kind(MISSING_KIND)
    }

    pub fn jump() -> Self {
        ValueShape::of_kind(JUMP_KIND)
    }

    pub fn dots() -> Self {
        ValueShape::of_kind(DOTS_KIND)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn attr_names(&self) -> &[String] {
        &self.attr_names
    }

    /// Order-insensitive structural hash.
    ///
    /// Attribute and class lists arrive in whatever order the host discovered
    /// them, so everything past the kind is folded in commutatively. Structurally
    /// equal shapes always hash equal; collisions between different shapes are
    /// tolerated (the hash is an equality proxy, not a guarantee).
    pub fn structural_hash(&self) -> TraceHash {
        let mut hash = hash_str(&self.kind);
        for attr in &self.attr_names {
            hash = combine_commutative(hash, hash_str(attr));
        }
        for class in &self.classes {
            hash = combine_commutative(hash, hash_str(class));
        }
        for tag in &self.tags {
            hash = combine_commutative(hash, hash_str(tag));
        }
        hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn permuted_lists_hash_identically() {
        let a = ValueShape::new(
            "double",
            strings(&["t1", "t2"]),
            strings(&["data.frame", "tbl"]),
            strings(&["names", "row.names", "class"]),
        );
        let b = ValueShape::new(
            "double",
            strings(&["t2", "t1"]),
            strings(&["tbl", "data.frame"]),
            strings(&["class", "names", "row.names"]),
        );
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn different_kinds_hash_differently() {
        assert_ne!(
            ValueShape::of_kind("double").structural_hash(),
            ValueShape::of_kind("integer").structural_hash()
        );
    }

    #[test]
    fn at_suffix_becomes_a_tag() {
        let shape = ValueShape::new("closure@builtin", vec![], vec![], vec![]);
        assert_eq!(shape.kind(), "closure");
        assert_eq!(shape.tags(), ["builtin".to_string()]);

        // The folded form hashes the same as the explicit form.
        let explicit =
            ValueShape::new("closure", strings(&["builtin"]), vec![], vec![]);
        assert_eq!(shape.structural_hash(), explicit.structural_hash());
    }

    #[test]
    fn missing_sentinel_has_fixed_kind() {
        assert_eq!(ValueShape::missing().kind(), MISSING_KIND);
    }
}
