use thiserror::Error;

/// Result alias for fallible engine operations.
///
/// Named `SimResult` (rather than `EngineResult`, which is the per-year result
/// row type defined in [`crate::result`]) to avoid colliding with that type.
pub type SimResult<T> = Result<T, EngineError>;

/// Top-level error for the simulation engine.
///
/// One umbrella enum with `#[error(transparent)]` leaves, each leaf a
/// `thiserror::Error` grouping errors that arise from one subsystem.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Variable(#[from] VariableError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors raised by the stream keeper and stream-store invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    #[error("unknown stream '{stream}' for {application}/{substance}")]
    UnknownStream { application: String, substance: String, stream: String },

    #[error("unknown substance {application}/{substance}: no definitions registered")]
    UnknownSubstance { application: String, substance: String },

    #[error(
        "cannot set '{stream}' for {application}/{substance} in equipment units: initial charge is zero"
    )]
    ZeroInitialCharge { application: String, substance: String, stream: String },

    #[error(
        "cannot combine 'sales' for {application}/{substance}: no manufacture/import/export stream is enabled"
    )]
    NoSalesChannelEnabled { application: String, substance: String },

    #[error(
        "NaN encountered writing {application}/{substance}/{stream}: {detail}"
    )]
    NaNEncountered { application: String, substance: String, stream: String, detail: String },

    #[error(
        "write to {application}/{substance}/{stream} would go negative ({attempted}) and CHECK_POSITIVE_STREAMS is enabled"
    )]
    NegativeStreamValue { application: String, substance: String, stream: String, attempted: String },
}

/// Errors raised by unit conversion.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum UnitError {
    #[error("bad units '{units}': {reason}")]
    BadUnits { units: String, reason: String },

    #[error(
        "missing conversion context: converting '{from}' to '{to}' requires '{needed}', which was neither overridden nor available from the current state"
    )]
    MissingConversionContext { from: String, to: String, needed: String },

    #[error("unit mismatch aggregating '{lhs}' with '{rhs}'")]
    UnitMismatch { lhs: String, rhs: String },

    #[error("'{units}' is not a valid unit for an equals(...) intensity operation")]
    BadEqualsUnits { units: String },
}

/// Errors raised establishing or navigating scope.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("operation requires a fully-specified (application, substance) scope, got {0:?}")]
    NoAppOrSubstance(String),
}

/// Errors raised by the variable manager.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VariableError {
    #[error("'{0}' is a protected name and cannot be defined, set, or shadowed")]
    ProtectedName(String),

    #[error("variable '{0}' is already defined at this scope level")]
    AlreadyDefined(String),

    #[error("variable '{0}' is not defined in any enclosing scope")]
    Undefined(String),
}

/// Errors raised by the scenario driver / year cursor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("incrementYear called after the simulation already reached its end year {end_year}")]
    SimulationAlreadyComplete { end_year: i64 },

    #[error("policy '{0}' referenced by a simulation was never defined")]
    UnknownPolicy(String),

    #[error("simulation '{name}' has an empty or inverted year range [{start}, {end}]")]
    InvalidYearRange { name: String, start: i64, end: i64 },
}

/// Parsing concerns for the one boundary this crate owns: deserializing a
/// structured program file. The DSL parser/AST itself is an external
/// collaborator and is not implemented here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("failed to parse program file: {0}")]
    Malformed(String),
}

/// A clamp-to-zero event. Not part of [`EngineError`] — this is logged via
/// `tracing::warn!` at the write site (see [`crate::streams::keeper`]) rather
/// than propagated, .
#[derive(Debug, Clone, PartialEq)]
pub struct NegativeClampWarning {
    pub application: String,
    pub substance: String,
    pub stream: String,
    pub attempted: String,
}
