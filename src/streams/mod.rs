//! Stream storage and the keeper that owns it: per-(application, substance)
//! streams, parameterization, and the unit-aware mutation semantics of
//! .

pub mod keeper;
pub mod name;
pub mod parameterization;
pub mod storage;

pub use keeper::{pooled_initial_charge, StreamKeeper, SubstanceRecord, CHECK_POSITIVE_STREAMS};
pub use name::{SalesSubstream, StreamName};
pub use parameterization::{StreamParameterization, UnitsHint};
pub use storage::Streams;
