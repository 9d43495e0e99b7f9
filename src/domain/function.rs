//! Function Records
//!
//! Functions are interned by content hash of package + definition, so byte-
//! identical closures share one record. The id-keyed cache lives until
//! teardown; the host-handle map shrinks as the host reclaims function objects.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::FunctionId;

/// Host object handle for a function, reusable by the host after reclaim.
pub type FunctionHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Closure,
    Builtin,
    Special,
}

/// Running per-function statistics, fed on every call finalization.
#[derive(Debug, Default, Clone)]
pub struct CallSummary {
    pub calls: u64,
    pub jumped: u64,
    pub return_kinds: BTreeMap<String, u64>,
}

impl CallSummary {
    pub fn add_call(&mut self, jumped: bool, return_kind: Option<&str>) {
        self.calls += 1;
        if jumped {
            self.jumped += 1;
        }
        if let Some(kind) = return_kind {
            *self.return_kinds.entry(kind.to_string()).or_default() += 1;
        }
    }
}

#[derive(Debug)]
pub struct FunctionRecord {
    id: FunctionId,
    name: String,
    package: String,
    kind: FunctionKind,
    is_curly_bracket: bool,
    is_return: bool,
    formal_parameter_count: usize,
    summary: CallSummary,
}

impl FunctionRecord {
    pub fn id(&self) -> &FunctionId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn kind(&self) -> FunctionKind {
        self.kind
    }

    pub fn is_closure(&self) -> bool {
        self.kind == FunctionKind::Closure
    }

    /// The `{` pseudo-function. Skipped when inferring creation scopes.
    pub fn is_curly_bracket(&self) -> bool {
        self.is_curly_bracket
    }

    /// A special implementing non-local return.
    pub fn is_return(&self) -> bool {
        self.is_return
    }

    pub fn formal_parameter_count(&self) -> usize {
        self.formal_parameter_count
    }

    pub fn summary(&self) -> &CallSummary {
        &self.summary
    }

    pub fn summary_mut(&mut self) -> &mut CallSummary {
        &mut self.summary
    }
}

#[derive(Debug, Default)]
pub struct FunctionCache {
    by_handle: HashMap<FunctionHandle, FunctionId>,
    records: HashMap<FunctionId, FunctionRecord>,
}

impl FunctionCache {
    pub fn new() -> Self {
        FunctionCache::default()
    }

    /// Intern a function sighted at a call entry, returning its content id.
    /// A handle already seen skips the content hash entirely.
    #[allow(clippy::too_many_arguments)]
    pub fn intern(
        &mut self,
        handle: FunctionHandle,
        name: &str,
        package: &str,
        definition: &str,
        kind: FunctionKind,
        formal_parameter_count: usize,
    ) -> FunctionId {
        if let Some(id) = self.by_handle.get(&handle) {
            return id.clone();
        }
        let id = FunctionId::from_definition(package, definition);
        self.records.entry(id.clone()).or_insert_with(|| FunctionRecord {
            id: id.clone(),
            name: name.to_string(),
            package: package.to_string(),
            kind,
            is_curly_bracket: name == "{",
            is_return: kind == FunctionKind::Special && name == "return",
            formal_parameter_count,
            summary: CallSummary::default(),
        });
        self.by_handle.insert(handle, id.clone());
        id
    }

    pub fn get(&self, id: &FunctionId) -> Option<&FunctionRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &FunctionId) -> Option<&mut FunctionRecord> {
        self.records.get_mut(id)
    }

    /// The host reclaimed a function object. Only the handle mapping goes; the
    /// interned record stays until teardown so later fingerprints and summaries
    /// keep resolving.
    pub fn forget_handle(&mut self, handle: FunctionHandle) {
        self.by_handle.remove(&handle);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn clear(&mut self) {
        self.by_handle.clear();
        self.records.clear();
    }
}
