//! Year-by-year simulation engine for Montreal/Kigali refrigerant policy
//! scenarios.
//!
//! The crate owns the hard part of the simulation: the per-(application,
//! substance) stream store, the unit converter, the cross-stream
//! recalculation graph, and the operation semantics a DSL
//! interpreter drives the engine with. The DSL parser/AST itself, and any
//! GUI/editor surface, are external collaborators this crate does not
//! implement — see `operation::ProgramDefinition` for the seam.

// === Public Modules (The Canonical Paths) ===
pub mod config;
pub mod engine;
pub mod error;
pub mod facade;
pub mod number;
pub mod operation;
pub mod recalc;
pub mod result;
pub mod scope;
pub mod state;
pub mod streams;
pub mod units;
pub mod variables;
pub mod year_matcher;

// === Facades (Re-exporting internals) ===
pub use crate::engine::Engine;
pub use crate::error::{EngineError, SimResult};
pub use crate::number::EngineNumber;
pub use crate::operation::{Operation, Policy, ProgramDefinition, SimulationSpec, Verb};
pub use crate::result::EngineResult;
pub use crate::scope::{Scope, UseKey};
pub use crate::year_matcher::YearMatcher;

// === Convenience ===
pub mod sorted_vec_map;
