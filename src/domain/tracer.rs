//! Tracer State
//!
//! The lifecycle coordinator: owns the calls, the thunk arena, the interned
//! function cache, the fingerprint catalogue, and the dependency graph, and
//! exposes the event-handling surface the instrumentation layer drives.
//!
//! Event processing is strictly sequential: one event at a time, no
//! reentrancy, exactly one current execution point mirrored by the top of the
//! context stack. Consistency mismatches in the event stream are logged
//! warnings, never aborts; the instrumentation layer may legitimately skip
//! event pairs under some host control-flow shortcuts, and a partial trace is
//! still worth exporting.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use crate::domain::call::{Argument, Call, CallId};
use crate::domain::catalogue::FingerprintCatalogue;
use crate::domain::context::{ContextKind, ExecutionContextStack};
use crate::domain::depgraph::{DependencyGraph, DependencyNode, ValueId};
use crate::domain::event::{
    ArgumentBinding, BindingKind, CallEntryEvent, CallExitEvent, ForceExitEvent,
    JumpEvent, ReclaimEvent, TraceEvent, ValueSnapshot,
};
use crate::domain::fingerprint::{CallFingerprint, RETURN_SLOT};
use crate::domain::function::{FunctionCache, FunctionKind};
use crate::domain::shape::{ValueShape, JUMP_KIND, MISSING_KIND};
use crate::domain::thunk::{ArgumentRef, CreationScope, ThunkArena};

/// Expression kinds that stand for "nothing was passed yet" when a promise is
/// still unforced at call entry.
const SYMBOL_KIND: &str = "symbol";
const LANGUAGE_KIND: &str = "language";

/// Settings for one trace run.
#[derive(Debug, Clone)]
pub struct TracerConfig {
    pub output_dir: PathBuf,
    pub package_under_analysis: String,
    pub analyzed_file_name: String,
    pub verbose: bool,
    pub truncate: bool,
    pub binary: bool,
    pub compression_level: i32,
}

impl Default for TracerConfig {
    fn default() -> Self {
        TracerConfig {
            output_dir: PathBuf::from("trace_output"),
            package_under_analysis: String::new(),
            analyzed_file_name: "run".to_string(),
            verbose: false,
            truncate: false,
            binary: false,
            compression_level: 0,
        }
    }
}

pub struct TracerState {
    config: TracerConfig,
    stack: ExecutionContextStack,
    calls: HashMap<CallId, Call>,
    thunks: ThunkArena,
    functions: FunctionCache,
    catalogue: FingerprintCatalogue,
    dependencies: DependencyGraph,
    call_id_counter: CallId,
    sequence_counter: u64,
    gc_cycle: u64,
    timestamp: u64,
    event_counts: BTreeMap<&'static str, u64>,
    events_processed: u64,
    warnings: u64,
    resume_instant: Instant,
    exit_code: Option<i32>,
}

impl TracerState {
    pub fn new(config: TracerConfig) -> Self {
        TracerState {
            config,
            stack: ExecutionContextStack::new(),
            calls: HashMap::new(),
            thunks: ThunkArena::new(),
            functions: FunctionCache::new(),
            catalogue: FingerprintCatalogue::new(),
            dependencies: DependencyGraph::new(),
            call_id_counter: 0,
            sequence_counter: 0,
            gc_cycle: 0,
            timestamp: 0,
            event_counts: BTreeMap::new(),
            events_processed: 0,
            warnings: 0,
            resume_instant: Instant::now(),
            exit_code: None,
        }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &FingerprintCatalogue {
        &self.catalogue
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.dependencies
    }

    pub fn functions_interned(&self) -> usize {
        self.functions.len()
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn event_counts(&self) -> &BTreeMap<&'static str, u64> {
        &self.event_counts
    }

    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    /// Error code recorded by the process-exit event, once seen.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Single dispatch point for the event stream.
    pub fn handle(&mut self, event: &TraceEvent) {
        match event {
            TraceEvent::CallEntry(e) => self.on_call_entry(e),
            TraceEvent::CallExit(e) => self.on_call_exit(e),
            TraceEvent::ForceEntry { promise_id } => self.on_force_entry(*promise_id),
            TraceEvent::ForceExit(e) => self.on_force_exit(e),
            TraceEvent::FrameEntry { frame_id } => self.on_frame_entry(*frame_id),
            TraceEvent::FrameExit { frame_id } => self.on_frame_exit(*frame_id),
            TraceEvent::Jump(e) => self.on_jump(e),
            TraceEvent::Gc => self.on_gc(),
            TraceEvent::Reclaim(e) => self.on_reclaim(e),
            TraceEvent::ProcessExit { error_code } => self.on_process_exit(*error_code),
        }
    }

    pub fn on_call_entry(&mut self, event: &CallEntryEvent) {
        self.enter_probe("call_entry");

        let function_id = self.functions.intern(
            event.function.handle,
            &event.function.name,
            &event.function.package,
            &event.function.definition,
            event.function.kind,
            event.function.formal_parameter_count,
        );

        self.call_id_counter += 1;
        let call_id = self.call_id_counter;
        let sequence = self.sequence_counter;
        self.sequence_counter += 1;

        let fingerprint = CallFingerprint::new(
            &event.function.package,
            &event.function.name,
            function_id.clone(),
            event.dispatch,
            sequence,
        );
        let mut call = Call::new(
            call_id,
            function_id,
            &event.function.name,
            event.environment,
            fingerprint,
        );

        match event.function.kind {
            FunctionKind::Closure => self.bind_closure_arguments(&mut call, event),
            FunctionKind::Builtin | FunctionKind::Special => {
                if let Some(order) = event.eval_order {
                    call.set_force_order(order);
                }
                self.bind_eager_arguments(&mut call, event);
            }
        }

        self.calls.insert(call_id, call);
        self.stack.push(ContextKind::Call(call_id));
        self.exit_probe();
    }

    pub fn on_call_exit(&mut self, event: &CallExitEvent) {
        self.enter_probe("call_exit");

        let Some(context) = self.stack.pop() else {
            self.warn("call exit with empty context stack");
            self.exit_probe();
            return;
        };
        let Some(call_id) = context.call_id() else {
            self.warn("expected a call context on exit");
            self.stack.restore(context);
            self.exit_probe();
            return;
        };
        let Some(mut call) = self.calls.remove(&call_id) else {
            self.warn("call context refers to an unknown call");
            self.exit_probe();
            return;
        };

        let mut return_value_id = None;
        if let Some(ret) = &event.return_value {
            call.set_return_kind(&ret.kind);
            call.fingerprint_mut().set_slot(RETURN_SLOT, ret.shape());
            return_value_id = ret.value_id;
        }
        self.finalize_call(call, return_value_id);
        self.exit_probe();
    }

    pub fn on_force_entry(&mut self, promise_id: u64) {
        self.enter_probe("force_entry");
        let scope = self.infer_creation_scope();
        // Forcing a promise never seen at any call entry is legal: the host
        // creates promises outside traced calls too. Environment unknown here.
        let thunk_id = self.thunks.intern_promise(promise_id, 0, scope);
        if let Some(thunk) = self.thunks.get_mut(thunk_id) {
            thunk.force();
        }
        self.stack.push(ContextKind::Force(thunk_id));
        self.exit_probe();
    }

    pub fn on_force_exit(&mut self, event: &ForceExitEvent) {
        self.enter_probe("force_exit");

        let Some(context) = self.stack.pop() else {
            self.warn("force exit with empty context stack");
            self.exit_probe();
            return;
        };
        let Some(thunk_id) = context.thunk_id() else {
            self.warn("expected a thunk context on force exit");
            self.stack.restore(context);
            self.exit_probe();
            return;
        };

        let consumers: Vec<ArgumentRef> = match self.thunks.get_mut(thunk_id) {
            Some(thunk) => {
                thunk.set_value_kind(&event.value.kind);
                thunk.set_value(event.value.value_id);
                thunk.arguments().to_vec()
            }
            None => {
                self.warn("forced thunk is no longer tracked");
                Vec::new()
            }
        };

        let shape = event.value.shape();
        for consumer in consumers {
            // Vararg-backed thunks never write slots; the formal position was
            // already recorded as the `...` sentinel at call entry.
            if consumer.dots {
                continue;
            }
            // The consuming call may have exited before the force completed;
            // its fingerprint is frozen then and only the graph still listens.
            if let Some(call) = self.calls.get_mut(&consumer.call) {
                call.fingerprint_mut()
                    .set_slot(consumer.formal_position, shape.clone());
            }
            if let Some(value_id) = event.value.value_id {
                self.dependencies.record_argument(
                    value_id,
                    DependencyNode::new(
                        consumer.function_id.clone(),
                        consumer.formal_position,
                    ),
                );
            }
        }
        self.exit_probe();
    }

    pub fn on_frame_entry(&mut self, frame_id: u64) {
        self.enter_probe("frame_entry");
        self.stack.push(ContextKind::HostFrame(frame_id));
        self.exit_probe();
    }

    pub fn on_frame_exit(&mut self, frame_id: u64) {
        self.enter_probe("frame_exit");
        match self.stack.pop() {
            Some(context) if context.kind() == ContextKind::HostFrame(frame_id) => {}
            Some(context) => {
                self.warn("nonmatching host frame on stack");
                self.stack.restore(context);
            }
            None => self.warn("frame exit with empty context stack"),
        }
        self.exit_probe();
    }

    /// Non-local exit: close out every context above and including the target
    /// frame. Abandoned calls are still fingerprinted and catalogued — an
    /// abrupt exit must not drop calls from the trace. The bottom-most
    /// unwound call receives the jump's actual value; calls above it get the
    /// jump sentinel as their return shape.
    pub fn on_jump(&mut self, event: &JumpEvent) {
        self.enter_probe("jump");

        let popped = self.stack.unwind(event.target_frame);
        let target_found = popped
            .last()
            .map(|c| c.kind() == ContextKind::HostFrame(event.target_frame))
            .unwrap_or(false);
        if !target_found {
            self.warn("jump target frame not found on stack");
        }

        // Only one context can be responsible for a non-local return: the
        // first popped context being a call to the `return` special means the
        // jump was initiated by `return` inside a forced promise.
        let returned = popped
            .first()
            .and_then(|c| c.call_id())
            .and_then(|id| self.calls.get(&id))
            .and_then(|call| self.functions.get(call.function_id()))
            .map(|function| function.is_return())
            .unwrap_or(false);

        let last_call = popped.iter().rposition(|c| c.call_id().is_some());

        for (index, context) in popped.iter().enumerate() {
            match context.kind() {
                ContextKind::Call(call_id) => {
                    let Some(mut call) = self.calls.remove(&call_id) else {
                        self.warn("unwound call context refers to an unknown call");
                        continue;
                    };
                    call.set_jumped();

                    let receives_value = Some(index) == last_call;
                    let mut return_value_id = None;
                    match (&event.return_value, receives_value) {
                        (Some(ret), true) => {
                            call.set_return_kind(&ret.kind);
                            call.fingerprint_mut().set_slot(RETURN_SLOT, ret.shape());
                            return_value_id = ret.value_id;
                        }
                        _ => {
                            call.set_return_kind(JUMP_KIND);
                            call.fingerprint_mut()
                                .set_slot(RETURN_SLOT, ValueShape::jump());
                        }
                    }
                    self.finalize_call(call, return_value_id);
                }
                ContextKind::Force(thunk_id) => {
                    if let Some(thunk) = self.thunks.get_mut(thunk_id) {
                        thunk.set_value_kind(JUMP_KIND);
                        if returned
                            && thunk.is_argument()
                            && thunk.environment() == event.environment
                        {
                            thunk.set_non_local_return();
                        }
                    }
                }
                ContextKind::HostFrame(_) => {}
            }
        }
        self.exit_probe();
    }

    pub fn on_gc(&mut self) {
        self.enter_probe("gc");
        self.gc_cycle += 1;
        self.exit_probe();
    }

    pub fn on_reclaim(&mut self, event: &ReclaimEvent) {
        self.enter_probe("reclaim");
        match event {
            ReclaimEvent::Promise { promise_id } => {
                self.thunks.release_from_table(*promise_id, self.gc_cycle);
            }
            ReclaimEvent::Function { handle } => {
                self.functions.forget_handle(*handle);
            }
            ReclaimEvent::Value { value_id } => {
                self.dependencies.forget(*value_id);
            }
        }
        self.exit_probe();
    }

    /// Teardown: a synthetic reclaim sweep resolves the dual-ownership
    /// invariant for everything still alive, then the run is marked finished.
    /// A non-empty stack is an error, reported but never blocking export.
    pub fn on_process_exit(&mut self, error_code: i32) {
        self.enter_probe("process_exit");

        self.gc_cycle += 1;
        for promise in self.thunks.tracked_promises() {
            self.thunks.release_from_table(promise, self.gc_cycle);
        }
        self.functions.clear();

        if !self.stack.is_empty() {
            eprintln!(
                "[ERROR] context stack not empty on tracer exit ({} contexts remain)",
                self.stack.len()
            );
        }
        self.exit_code = Some(error_code);
        // No exit_probe: the tracer is finished and the timer stays paused.
    }

    fn bind_closure_arguments(&mut self, call: &mut Call, event: &CallEntryEvent) {
        for binding in &event.arguments {
            let scope = self.infer_creation_scope();
            let (thunk_id, default_argument) = match &binding.binding {
                BindingKind::Promise {
                    promise_id,
                    environment,
                    ..
                } => {
                    let id = self.thunks.intern_promise(*promise_id, *environment, scope);
                    (id, *environment == call.environment())
                }
                BindingKind::Value { value } => {
                    let id = self.thunks.create_eager(call.environment(), scope);
                    if let Some(thunk) = self.thunks.get_mut(id) {
                        thunk.set_value(value.value_id);
                        thunk.set_value_kind(&value.kind);
                    }
                    (id, true)
                }
                BindingKind::Missing => {
                    let id = self.thunks.create_eager(call.environment(), scope);
                    if let Some(thunk) = self.thunks.get_mut(id) {
                        thunk.set_value_kind(MISSING_KIND);
                    }
                    (id, true)
                }
            };

            if let Some(thunk) = self.thunks.get_mut(thunk_id) {
                thunk.add_argument(ArgumentRef {
                    call: call.id(),
                    function_id: call.function_id().clone(),
                    formal_position: binding.formal_position,
                    dots: binding.dots,
                });
            }
            call.add_argument(Argument {
                thunk: thunk_id,
                formal_position: binding.formal_position,
                actual_position: binding.actual_position,
                default_argument,
                dots: binding.dots,
            });

            self.record_initial_slot(call, binding);
        }
    }

    /// Builtin and special arguments are eager: their shapes are final at
    /// entry and recorded positionally, with no thunks involved.
    fn bind_eager_arguments(&mut self, call: &mut Call, event: &CallEntryEvent) {
        for binding in &event.arguments {
            match &binding.binding {
                BindingKind::Value { value } => {
                    call.fingerprint_mut()
                        .set_slot(binding.formal_position, value.shape());
                    self.record_argument_flow(call, binding.formal_position, value);
                }
                BindingKind::Missing => {
                    call.fingerprint_mut()
                        .set_slot(binding.formal_position, ValueShape::missing());
                }
                BindingKind::Promise { value, .. } => {
                    // Rare, but a pre-existing promise can reach a builtin.
                    let shape = match value {
                        Some(v) => v.shape(),
                        None => ValueShape::missing(),
                    };
                    call.fingerprint_mut().set_slot(binding.formal_position, shape);
                    if let Some(v) = value {
                        self.record_argument_flow(call, binding.formal_position, v);
                    }
                }
            }
        }
    }

    /// Initial shape guess for a closure slot, before any force event. A
    /// later force overwrites it (last writer wins on the slot).
    fn record_initial_slot(&mut self, call: &mut Call, binding: &ArgumentBinding) {
        if binding.dots {
            call.fingerprint_mut().set_has_dots(true);
            call.fingerprint_mut()
                .set_slot(binding.formal_position, ValueShape::dots());
            return;
        }
        match &binding.binding {
            BindingKind::Promise {
                value: Some(value), ..
            } => {
                // Forced before we saw it (S3 dispatch pre-evaluates): this is
                // the real shape and the only sighting a force event won't give.
                call.fingerprint_mut()
                    .set_slot(binding.formal_position, value.shape());
                self.record_argument_flow(call, binding.formal_position, value);
            }
            BindingKind::Promise {
                value: None,
                expression,
                ..
            } => {
                let shape = match expression {
                    // A bare symbol or call expression tells us nothing yet.
                    Some(expr) if expr.kind == SYMBOL_KIND || expr.kind == LANGUAGE_KIND => {
                        ValueShape::missing()
                    }
                    // A literal expression already has its final shape.
                    Some(expr) => expr.shape(),
                    None => ValueShape::missing(),
                };
                call.fingerprint_mut().set_slot(binding.formal_position, shape);
            }
            BindingKind::Value { value } => {
                call.fingerprint_mut()
                    .set_slot(binding.formal_position, value.shape());
                self.record_argument_flow(call, binding.formal_position, value);
            }
            BindingKind::Missing => {
                call.fingerprint_mut()
                    .set_slot(binding.formal_position, ValueShape::missing());
            }
        }
    }

    fn record_argument_flow(&mut self, call: &Call, position: i32, value: &ValueSnapshot) {
        if let Some(value_id) = value.value_id {
            self.dependencies.record_argument(
                value_id,
                DependencyNode::new(call.function_id().clone(), position),
            );
        }
    }

    /// Freeze the fingerprint, deduplicate it, feed the function summary, and
    /// release every thunk hold this call had.
    fn finalize_call(&mut self, call: Call, return_value_id: Option<ValueId>) {
        let call_id = call.id();
        let function_id = call.function_id().clone();
        let jumped = call.jumped();
        let return_kind = call.return_kind().map(str::to_string);

        for argument in call.arguments().to_vec() {
            self.thunks.release_from_call(argument.thunk, call_id);
        }

        let hash = self.catalogue.record(call.into_fingerprint());
        if let Some(value_id) = return_value_id {
            self.dependencies
                .record_return(value_id, function_id.clone(), hash);
        }
        if let Some(function) = self.functions.get_mut(&function_id) {
            function
                .summary_mut()
                .add_call(jumped, return_kind.as_deref());
        }
    }

    /// Creation scope of a new thunk: the nearest enclosing call whose
    /// function is not `{`, else top level.
    fn infer_creation_scope(&self) -> CreationScope {
        for context in self.stack.iter_top_down() {
            let Some(call_id) = context.call_id() else {
                continue;
            };
            let Some(call) = self.calls.get(&call_id) else {
                continue;
            };
            match self.functions.get(call.function_id()) {
                Some(function) if function.is_curly_bracket() => continue,
                _ => return CreationScope::Function(call.function_id().clone()),
            }
        }
        CreationScope::TopLevel
    }

    /// Pause the execution timer, charging host time since the last resume to
    /// the context currently on top, and count the event.
    fn enter_probe(&mut self, kind: &'static str) {
        let elapsed = self.resume_instant.elapsed().as_nanos() as u64;
        if let Some(top) = self.stack.top_mut() {
            top.add_execution_time(elapsed);
        }
        self.timestamp += 1;
        self.events_processed += 1;
        *self.event_counts.entry(kind).or_default() += 1;
        if self.config.verbose {
            println!("[thunktrace] event {} #{}", kind, self.timestamp);
        }
    }

    fn exit_probe(&mut self) {
        self.resume_instant = Instant::now();
    }

    fn warn(&mut self, message: &str) {
        self.warnings += 1;
        eprintln!("[WARN] {}", message);
    }
}
