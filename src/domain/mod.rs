// Core tracing model: no I/O, no host handles, only data and invariants.

pub mod call;
pub mod catalogue;
pub mod context;
pub mod depgraph;
pub mod event;
pub mod fingerprint;
pub mod function;
pub mod hashing;
pub mod shape;
pub mod thunk;
pub mod tracer;
