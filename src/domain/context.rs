//! Execution Context Stack
//!
//! Mirrors the host's single current execution point: one context per active
//! call, thunk force, or host frame, with per-context execution-time
//! accounting and an explicit unwind path for non-local exits.

use crate::domain::call::CallId;
use crate::domain::thunk::ThunkId;

/// Host-assigned identity of a native stack frame.
pub type FrameId = u64;

/// What kind of activity a stack entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Call(CallId),
    Force(ThunkId),
    HostFrame(FrameId),
}

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    kind: ContextKind,
    execution_time_ns: u64,
}

impl ExecutionContext {
    pub fn new(kind: ContextKind) -> Self {
        ExecutionContext {
            kind,
            execution_time_ns: 0,
        }
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn call_id(&self) -> Option<CallId> {
        match self.kind {
            ContextKind::Call(id) => Some(id),
            _ => None,
        }
    }

    pub fn thunk_id(&self) -> Option<ThunkId> {
        match self.kind {
            ContextKind::Force(id) => Some(id),
            _ => None,
        }
    }

    pub fn execution_time_ns(&self) -> u64 {
        self.execution_time_ns
    }

    pub fn add_execution_time(&mut self, nanos: u64) {
        self.execution_time_ns += nanos;
    }
}

/// Stack of active contexts. Pushed on entry events, popped on matching exit
/// events; `unwind` is the only sanctioned out-of-order close path.
#[derive(Debug, Default)]
pub struct ExecutionContextStack {
    contexts: Vec<ExecutionContext>,
}

impl ExecutionContextStack {
    pub fn new() -> Self {
        ExecutionContextStack::default()
    }

    pub fn push(&mut self, kind: ContextKind) {
        self.contexts.push(ExecutionContext::new(kind));
    }

    /// Pop the top context, rolling its accumulated execution time up into the
    /// context below it (the caller).
    pub fn pop(&mut self) -> Option<ExecutionContext> {
        let popped = self.contexts.pop()?;
        if let Some(top) = self.contexts.last_mut() {
            top.add_execution_time(popped.execution_time_ns());
        }
        Some(popped)
    }

    /// Push a context back after a mismatched pop. Does not re-roll time.
    pub fn restore(&mut self, context: ExecutionContext) {
        self.contexts.push(context);
    }

    pub fn top_mut(&mut self) -> Option<&mut ExecutionContext> {
        self.contexts.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Walk from the top towards the bottom.
    pub fn iter_top_down(&self) -> impl Iterator<Item = &ExecutionContext> {
        self.contexts.iter().rev()
    }

    /// Pop every context above and including the host frame `target`, in
    /// top-to-bottom order, so each can be finalized in turn.
    ///
    /// If the target frame is not on the stack the whole stack is drained;
    /// the caller detects that by checking the last popped context. An abrupt
    /// exit must never silently drop contexts.
    pub fn unwind(&mut self, target: FrameId) -> Vec<ExecutionContext> {
        let mut popped = Vec::new();
        while let Some(context) = self.pop() {
            let done = context.kind() == ContextKind::HostFrame(target);
            popped.push(context);
            if done {
                break;
            }
        }
        popped
    }
}
