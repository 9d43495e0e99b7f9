//! Call Fingerprints
//!
//! A per-call record of argument and return shapes keyed by formal parameter
//! position, combined with call identity into a structural hash. Two
//! fingerprints are considered equal when their combined hashes match; there is
//! no fallback structural comparison on collision. That conflation is
//! deliberate and documented — see the catalogue.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::hashing::{
    combine_commutative, hash_position, hash_str, TraceHash,
};
use crate::domain::shape::ValueShape;

/// Slot position reserved for the return value.
pub const RETURN_SLOT: i32 = -1;

/// Which method-resolution protocol selected the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dispatch {
    #[default]
    None,
    S3,
    S4,
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::None => write!(f, "None"),
            Dispatch::S3 => write!(f, "S3"),
            Dispatch::S4 => write!(f, "S4"),
        }
    }
}

/// Content hash of a function's definition and package, interned for the run.
///
/// Structurally identical functions (a re-sourced closure, say) share one id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FunctionId(String);

impl FunctionId {
    pub fn from_definition(package: &str, definition: &str) -> Self {
        let mut input = String::with_capacity(package.len() + definition.len() + 1);
        input.push_str(package);
        input.push('\n');
        input.push_str(definition);
        FunctionId(format!("{:016x}", hash_str(&input)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Evolving, then frozen, structural record of one call.
///
/// Mutable while the call is on the stack: slots are written as arguments are
/// forced and finally when the return value is known. After call exit only the
/// hash and slots are read. The `sequence_id` is assigned by the coordinator
/// and used for stable export ordering, never for equality.
#[derive(Debug, Clone)]
pub struct CallFingerprint {
    package: String,
    function_name: String,
    function_id: FunctionId,
    dispatch: Dispatch,
    has_dots: bool,
    slots: HashMap<i32, ValueShape>,
    sequence_id: u64,
}

impl CallFingerprint {
    pub fn new(
        package: &str,
        function_name: &str,
        function_id: FunctionId,
        dispatch: Dispatch,
        sequence_id: u64,
    ) -> Self {
        CallFingerprint {
            package: package.to_string(),
            function_name: function_name.to_string(),
            function_id,
            dispatch,
            has_dots: false,
            slots: HashMap::new(),
            sequence_id,
        }
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    pub fn dispatch(&self) -> Dispatch {
        self.dispatch
    }

    pub fn has_dots(&self) -> bool {
        self.has_dots
    }

    pub fn set_has_dots(&mut self, has_dots: bool) {
        self.has_dots = has_dots;
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Insert or overwrite a slot; the last writer for a position wins.
    ///
    /// An initial guess recorded at call entry is routinely replaced by the
    /// real shape once the backing thunk is forced.
    pub fn set_slot(&mut self, position: i32, shape: ValueShape) {
        self.slots.insert(position, shape);
    }

    pub fn slot(&self, position: i32) -> Option<&ValueShape> {
        self.slots.get(&position)
    }

    /// Highest formal parameter position holding a shape, ignoring the return
    /// slot. `None` when only the return slot (or nothing) is present.
    pub fn max_position(&self) -> Option<i32> {
        self.slots.keys().copied().filter(|p| *p >= 0).max()
    }

    /// Hash over identity fields and all slots.
    ///
    /// Slot-filling order depends on argument evaluation order, so the slot
    /// contribution is commutative over `(position, shape-hash)` pairs.
    /// Computed fresh on every use; only stable once the call has exited.
    pub fn combined_hash(&self) -> TraceHash {
        let mut hash = self.identity_hash();
        for (position, shape) in &self.slots {
            hash = combine_commutative(
                hash,
                hash_position(*position) ^ shape.structural_hash(),
            );
        }
        hash
    }

    /// Hash over the slots alone, excluding call identity.
    ///
    /// Lets downstream analysis spot identical argument-shape patterns across
    /// different call identities.
    pub fn slots_hash(&self) -> TraceHash {
        let mut hash = hash_str("slots");
        for (position, shape) in &self.slots {
            hash = combine_commutative(
                hash,
                hash_position(*position) ^ shape.structural_hash(),
            );
        }
        hash
    }

    fn identity_hash(&self) -> TraceHash {
        let mut hash = (hash_str(&self.function_name)
            ^ (hash_str(&self.package) << 1))
            >> 1;
        hash ^= (hash_str(self.function_id.as_str()) << 1) >> 1;
        hash ^= hash_str(&self.dispatch.to_string());
        if self.has_dots {
            hash = hash.rotate_left(1);
        }
        hash
    }
}
