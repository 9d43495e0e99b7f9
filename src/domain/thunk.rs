//! Thunks and the Thunk Arena
//!
//! A thunk is a deferred argument expression (a promise) or an eagerly bound
//! value wrapped for uniform lifetime bookkeeping. A thunk can be held
//! simultaneously by the global promise lookup table (the `active` flag) and by
//! one or more call arguments (the argument back-references). It leaves the
//! arena only when neither holder remains; this is the central lifetime-safety
//! invariant of the engine. After removal, lookups return `None` rather than
//! reaching freed state.

use std::collections::HashMap;

use crate::domain::call::{CallId, EnvId};
use crate::domain::depgraph::ValueId;
use crate::domain::fingerprint::FunctionId;

pub type ThunkId = u64;

/// Host-assigned identity of a promise object.
pub type PromiseRef = u64;

/// Back-reference from a thunk to one call argument consuming it. A single
/// thunk can back several `...`-expanded arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRef {
    pub call: CallId,
    pub function_id: FunctionId,
    pub formal_position: i32,
    pub dots: bool,
}

/// Where a thunk was created: inside some traced function, or at top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationScope {
    TopLevel,
    Function(FunctionId),
}

#[derive(Debug)]
pub struct Thunk {
    id: ThunkId,
    is_promise: bool,
    forced: bool,
    /// Held by the global promise lookup table.
    active: bool,
    environment: EnvId,
    creation_scope: CreationScope,
    value: Option<ValueId>,
    value_kind: Option<String>,
    non_local_return: bool,
    arguments: Vec<ArgumentRef>,
    destruction_gc_cycle: Option<u64>,
}

impl Thunk {
    fn new(
        id: ThunkId,
        is_promise: bool,
        environment: EnvId,
        creation_scope: CreationScope,
    ) -> Self {
        Thunk {
            id,
            is_promise,
            forced: false,
            active: false,
            environment,
            creation_scope,
            value: None,
            value_kind: None,
            non_local_return: false,
            arguments: Vec::new(),
            destruction_gc_cycle: None,
        }
    }

    pub fn id(&self) -> ThunkId {
        self.id
    }

    pub fn is_promise(&self) -> bool {
        self.is_promise
    }

    pub fn is_forced(&self) -> bool {
        self.forced
    }

    pub fn force(&mut self) {
        self.forced = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Held by a call while any argument back-reference remains.
    pub fn is_argument(&self) -> bool {
        !self.arguments.is_empty()
    }

    pub fn environment(&self) -> EnvId {
        self.environment
    }

    pub fn creation_scope(&self) -> &CreationScope {
        &self.creation_scope
    }

    pub fn value(&self) -> Option<ValueId> {
        self.value
    }

    pub fn set_value(&mut self, value: Option<ValueId>) {
        self.value = value;
    }

    pub fn value_kind(&self) -> Option<&str> {
        self.value_kind.as_deref()
    }

    pub fn set_value_kind(&mut self, kind: &str) {
        self.value_kind = Some(kind.to_string());
    }

    pub fn non_local_return(&self) -> bool {
        self.non_local_return
    }

    pub fn set_non_local_return(&mut self) {
        self.non_local_return = true;
    }

    pub fn add_argument(&mut self, argument: ArgumentRef) {
        self.arguments.push(argument);
    }

    pub fn arguments(&self) -> &[ArgumentRef] {
        &self.arguments
    }

    pub fn destruction_gc_cycle(&self) -> Option<u64> {
        self.destruction_gc_cycle
    }
}

/// Owns every thunk, keyed by stable id. Both the promise lookup table (here)
/// and each call's argument list store ids, never references, so the
/// "free only when neither owner needs it" contract has no aliasing to fight.
#[derive(Debug, Default)]
pub struct ThunkArena {
    slots: HashMap<ThunkId, Thunk>,
    by_promise: HashMap<PromiseRef, ThunkId>,
    next_id: ThunkId,
}

impl ThunkArena {
    pub fn new() -> Self {
        ThunkArena::default()
    }

    /// Register a promise thunk under its host promise reference, or return
    /// the one already tracked. Newly created thunks carry the `active` flag:
    /// as long as it is set, a call holding the thunk will not free it.
    pub fn intern_promise(
        &mut self,
        promise: PromiseRef,
        environment: EnvId,
        creation_scope: CreationScope,
    ) -> ThunkId {
        if let Some(id) = self.by_promise.get(&promise) {
            return *id;
        }
        let id = self.allocate();
        let mut thunk = Thunk::new(id, true, environment, creation_scope);
        thunk.active = true;
        self.slots.insert(id, thunk);
        self.by_promise.insert(promise, id);
        id
    }

    /// Wrap an eagerly bound (non-promise) value. Never enters the promise
    /// table, so it is freed as soon as its last argument reference drops.
    pub fn create_eager(
        &mut self,
        environment: EnvId,
        creation_scope: CreationScope,
    ) -> ThunkId {
        let id = self.allocate();
        let mut thunk = Thunk::new(id, false, environment, creation_scope);
        thunk.forced = true;
        self.slots.insert(id, thunk);
        id
    }

    pub fn lookup_promise(&self, promise: PromiseRef) -> Option<ThunkId> {
        self.by_promise.get(&promise).copied()
    }

    pub fn get(&self, id: ThunkId) -> Option<&Thunk> {
        self.slots.get(&id)
    }

    pub fn get_mut(&mut self, id: ThunkId) -> Option<&mut Thunk> {
        self.slots.get_mut(&id)
    }

    /// The promise table gives up its hold (host reclaim or teardown sweep).
    /// The thunk is freed now only if no call still references it; otherwise
    /// the owning call frees it when the call is destroyed.
    pub fn release_from_table(&mut self, promise: PromiseRef, gc_cycle: u64) {
        let Some(id) = self.by_promise.remove(&promise) else {
            return;
        };
        if let Some(thunk) = self.slots.get_mut(&id) {
            thunk.active = false;
            thunk.destruction_gc_cycle = Some(gc_cycle);
            if !thunk.is_argument() {
                self.slots.remove(&id);
            }
        }
    }

    /// A call being destroyed gives up its hold on one thunk. Frees the thunk
    /// if the promise table no longer holds it either.
    pub fn release_from_call(&mut self, id: ThunkId, call: CallId) {
        if let Some(thunk) = self.slots.get_mut(&id) {
            thunk.arguments.retain(|arg| arg.call != call);
            if !thunk.active && !thunk.is_argument() {
                self.slots.remove(&id);
            }
        }
    }

    /// Promise references still tracked, for the synthetic reclaim sweep at
    /// process exit.
    pub fn tracked_promises(&self) -> Vec<PromiseRef> {
        self.by_promise.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn allocate(&mut self) -> ThunkId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg_ref(call: CallId) -> ArgumentRef {
        ArgumentRef {
            call,
            function_id: FunctionId::from_definition("pkg", "f"),
            formal_position: 0,
            dots: false,
        }
    }

    #[test]
    fn held_by_both_owners_survives_either_release() {
        let mut arena = ThunkArena::new();
        let id = arena.intern_promise(100, 1, CreationScope::TopLevel);
        arena.get_mut(id).unwrap().add_argument(arg_ref(7));

        // Table lets go first: still held by the call.
        arena.release_from_table(100, 1);
        assert!(arena.get(id).is_some());
        assert!(!arena.get(id).unwrap().is_active());

        // Call lets go: now it is freed.
        arena.release_from_call(id, 7);
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn release_order_is_symmetric() {
        let mut arena = ThunkArena::new();
        let id = arena.intern_promise(200, 1, CreationScope::TopLevel);
        arena.get_mut(id).unwrap().add_argument(arg_ref(8));

        arena.release_from_call(id, 8);
        assert!(arena.get(id).is_some(), "table still holds the thunk");

        arena.release_from_table(200, 2);
        assert!(arena.get(id).is_none());
        assert!(arena.lookup_promise(200).is_none());
    }

    #[test]
    fn freed_thunk_reads_fail_cleanly() {
        let mut arena = ThunkArena::new();
        let id = arena.intern_promise(300, 1, CreationScope::TopLevel);
        arena.release_from_table(300, 1);
        assert!(arena.get(id).is_none());
        assert!(arena.get_mut(id).is_none());
    }

    #[test]
    fn eager_thunks_are_freed_with_their_call() {
        let mut arena = ThunkArena::new();
        let id = arena.create_eager(1, CreationScope::TopLevel);
        arena.get_mut(id).unwrap().add_argument(arg_ref(9));
        assert!(!arena.get(id).unwrap().is_active());

        arena.release_from_call(id, 9);
        assert!(arena.get(id).is_none());
    }

    #[test]
    fn interning_the_same_promise_reuses_the_thunk() {
        let mut arena = ThunkArena::new();
        let a = arena.intern_promise(400, 1, CreationScope::TopLevel);
        let b = arena.intern_promise(400, 1, CreationScope::TopLevel);
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn dots_expansion_keeps_one_thunk_for_many_arguments() {
        let mut arena = ThunkArena::new();
        let id = arena.intern_promise(500, 1, CreationScope::TopLevel);
        let thunk = arena.get_mut(id).unwrap();
        thunk.add_argument(arg_ref(1));
        thunk.add_argument(arg_ref(1));
        assert_eq!(thunk.arguments().len(), 2);

        // Releasing the call drops every reference it held.
        arena.release_from_table(500, 1);
        arena.release_from_call(id, 1);
        assert!(arena.get(id).is_none());
    }
}
