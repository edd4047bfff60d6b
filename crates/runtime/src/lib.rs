//! Transport-agnostic orchestration for the external operations of
//! SPEC_FULL.md §6 (`generate`, `solve`, `list_runs`, `get_run_entries`,
//! `get_run_conflicts`, the fixed-entry/special-allotment lock operations).
//! No HTTP routing lives here; a future transport would call [`Engine`]
//! directly, the same way the teacher's `jobs::InMemJobs` was meant to sit
//! behind a router rather than contain one.

mod engine;
mod store;

pub use engine::{Engine, EngineError, GenerateRequest, SolveRequest};
pub use store::{Catalog, RunState};
