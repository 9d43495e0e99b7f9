//! Instrumentation Events
//!
//! The boundary with the external instrumentation layer, as data. The layer
//! has already applied its accessor functions (type-of, class names, attribute
//! names, is-promise, expression) to the host objects; the engine only ever
//! sees these snapshots and never interprets host handles.

use serde::{Deserialize, Serialize};

use crate::domain::fingerprint::Dispatch;
use crate::domain::function::FunctionKind;
use crate::domain::shape::ValueShape;

/// Structural observation of one concrete value, plus its host identity (used
/// by the dependency graph; absent for values the host does not track).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSnapshot {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attr_names: Vec<String>,
    #[serde(default)]
    pub value_id: Option<u64>,
}

impl ValueSnapshot {
    pub fn shape(&self) -> ValueShape {
        ValueShape::new(
            &self.kind,
            self.tags.clone(),
            self.classes.clone(),
            self.attr_names.clone(),
        )
    }
}

/// The function object behind a call, as reported at call entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub handle: u64,
    pub name: String,
    pub package: String,
    pub definition: String,
    pub kind: FunctionKind,
    #[serde(default)]
    pub formal_parameter_count: usize,
}

/// How one actual argument is bound at call entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingKind {
    /// A lazily bound argument. `value` is present when the promise was
    /// already forced before this call saw it (S3 dispatch does this);
    /// `expression` is the shape of the unevaluated expression.
    Promise {
        promise_id: u64,
        environment: u64,
        #[serde(default)]
        value: Option<ValueSnapshot>,
        #[serde(default)]
        expression: Option<ValueSnapshot>,
    },
    /// An eagerly bound concrete value.
    Value { value: ValueSnapshot },
    /// No binding at all.
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentBinding {
    #[serde(default)]
    pub name: Option<String>,
    pub formal_position: i32,
    pub actual_position: i32,
    #[serde(default)]
    pub dots: bool,
    pub binding: BindingKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEntryEvent {
    pub function: FunctionDecl,
    #[serde(default)]
    pub dispatch: Dispatch,
    pub environment: u64,
    #[serde(default)]
    pub arguments: Vec<ArgumentBinding>,
    /// Argument evaluation order classification for non-closures.
    #[serde(default)]
    pub eval_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallExitEvent {
    #[serde(default)]
    pub return_value: Option<ValueSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceExitEvent {
    pub promise_id: u64,
    pub value: ValueSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JumpEvent {
    /// Host frame the control transfer lands on.
    pub target_frame: u64,
    /// Environment receiving the jump; used to spot non-local-returning thunks.
    pub environment: u64,
    #[serde(default)]
    pub return_value: Option<ValueSnapshot>,
}

/// What the host reclaimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "object", rename_all = "snake_case")]
pub enum ReclaimEvent {
    Promise { promise_id: u64 },
    Function { handle: u64 },
    Value { value_id: u64 },
}

/// One instrumentation event, delivered synchronously and in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    CallEntry(CallEntryEvent),
    CallExit(CallExitEvent),
    ForceEntry { promise_id: u64 },
    ForceExit(ForceExitEvent),
    FrameEntry { frame_id: u64 },
    FrameExit { frame_id: u64 },
    Jump(JumpEvent),
    Gc,
    Reclaim(ReclaimEvent),
    ProcessExit { error_code: i32 },
}

impl TraceEvent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TraceEvent::CallEntry(_) => "call_entry",
            TraceEvent::CallExit(_) => "call_exit",
            TraceEvent::ForceEntry { .. } => "force_entry",
            TraceEvent::ForceExit(_) => "force_exit",
            TraceEvent::FrameEntry { .. } => "frame_entry",
            TraceEvent::FrameExit { .. } => "frame_exit",
            TraceEvent::Jump(_) => "jump",
            TraceEvent::Gc => "gc",
            TraceEvent::Reclaim(_) => "reclaim",
            TraceEvent::ProcessExit { .. } => "process_exit",
        }
    }
}
