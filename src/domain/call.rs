//! Call Records
//!
//! One `Call` per active invocation, alive from the entry event until exit or
//! unwind. Owns its fingerprint; argument thunks are owned by the arena and
//! referenced by id.

use crate::domain::fingerprint::{CallFingerprint, Dispatch, FunctionId};
use crate::domain::thunk::ThunkId;

pub type CallId = u64;

/// Host-assigned identity of an evaluation environment.
pub type EnvId = u64;

/// One actual argument bound to a formal parameter of a call.
#[derive(Debug, Clone)]
pub struct Argument {
    pub thunk: ThunkId,
    pub formal_position: i32,
    pub actual_position: i32,
    /// Promise bindings are defaults when their environment matches the call's
    /// own environment; non-promise bindings always count as defaults.
    pub default_argument: bool,
    pub dots: bool,
}

#[derive(Debug)]
pub struct Call {
    id: CallId,
    function_id: FunctionId,
    function_name: String,
    environment: EnvId,
    arguments: Vec<Argument>,
    fingerprint: CallFingerprint,
    return_kind: Option<String>,
    /// Evaluation-order classification reported by the host for non-closures.
    force_order: Option<i32>,
    jumped: bool,
}

impl Call {
    pub fn new(
        id: CallId,
        function_id: FunctionId,
        function_name: &str,
        environment: EnvId,
        fingerprint: CallFingerprint,
    ) -> Self {
        Call {
            id,
            function_id,
            function_name: function_name.to_string(),
            environment,
            arguments: Vec::new(),
            fingerprint,
            return_kind: None,
            force_order: None,
            jumped: false,
        }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn environment(&self) -> EnvId {
        self.environment
    }

    pub fn dispatch(&self) -> Dispatch {
        self.fingerprint.dispatch()
    }

    pub fn add_argument(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn fingerprint(&self) -> &CallFingerprint {
        &self.fingerprint
    }

    pub fn fingerprint_mut(&mut self) -> &mut CallFingerprint {
        &mut self.fingerprint
    }

    /// Freeze: hand the fingerprint out for deduplication. The call record is
    /// destroyed right after, so nothing observes the moved-out state.
    pub fn into_fingerprint(self) -> CallFingerprint {
        self.fingerprint
    }

    pub fn return_kind(&self) -> Option<&str> {
        self.return_kind.as_deref()
    }

    pub fn set_return_kind(&mut self, kind: &str) {
        self.return_kind = Some(kind.to_string());
    }

    pub fn force_order(&self) -> Option<i32> {
        self.force_order
    }

    pub fn set_force_order(&mut self, order: i32) {
        self.force_order = Some(order);
    }

    pub fn jumped(&self) -> bool {
        self.jumped
    }

    pub fn set_jumped(&mut self) {
        self.jumped = true;
    }
}
