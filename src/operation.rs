//! The engine's operation seam. the DSL
//! parser/interpreter is an external collaborator: it is treated as a
//! producer of [`Operation`] values that this crate consumes. There is no
//! hidden mutable cursor — every operation carries the scope it applies to.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ScopeError, SimResult, SimulationError};
use crate::number::EngineNumber;
use crate::scope::Scope;
use crate::year_matcher::YearMatcher;

/// Where a `cap`/`floor`/`recycle` displacement lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplaceTarget {
    /// Another stream of the *same* substance.
    Stream(String),
    /// The same stream, but of a different substance (same application).
    Substance(String),
}

/// The lifecycle stage a `recycle` applies to, when specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecycleStage {
    Eol,
    Recharge,
}

/// One verb from , with its arguments. Carried inside an
/// [`Operation`] alongside the scope and year range it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Verb {
    Set { stream: String, value: EngineNumber },
    Change { stream: String, delta: EngineNumber },
    Cap { stream: String, max: EngineNumber, displace_target: Option<DisplaceTarget> },
    Floor { stream: String, min: EngineNumber, displace_target: Option<DisplaceTarget> },
    Replace { amount: EngineNumber, stream: String, destination_substance: String },
    Recharge { population_percent: Decimal, intensity: EngineNumber },
    Retire { percent: Decimal },
    Recycle {
        recovery_percent: Decimal,
        yield_percent: Decimal,
        displacement_target: Option<DisplaceTarget>,
        stage: Option<RecycleStage>,
    },
    Equals { intensity: EngineNumber },
    InitialCharge { value: EngineNumber, stream: String },
    Enable { stream: String },
    DefineVariable { name: String, value: EngineNumber },
    SetVariable { name: String, value: EngineNumber },
}

/// One engine call: a verb, the scope it targets, and the year range it's
/// restricted to (unconditional if [`YearMatcher::unbounded`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub scope: Scope,
    pub years: YearMatcher,
    pub verb: Verb,
}

impl Operation {
    pub fn new(scope: Scope, years: YearMatcher, verb: Verb) -> Self {
        Self { scope, years, verb }
    }
}

/// A named sequence of operations applied to applications and substances.
pub type Policy = Vec<Operation>;

/// One entry in a `ProgramDefinition`'s `simulations` stanza.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSpec {
    pub name: String,
    pub start_year: i64,
    pub end_year: i64,
    pub policies: Vec<String>,
    pub trials: u32,
}

/// A fully-parsed structured program: the exact shape the facade walks.
/// This is what an external DSL interpreter would construct from an AST
/// and hand to this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDefinition {
    pub default: Policy,
    pub policies: HashMap<String, Policy>,
    pub simulations: Vec<SimulationSpec>,
}

impl ProgramDefinition {
    /// Structural validation performed by the `validate` CLI subcommand
    ///: every operation's scope is fully specified,
    /// every simulation's year range is non-inverted, and every policy name
    /// a simulation references is actually defined.
    pub fn validate(&self) -> SimResult<()> {
        Self::validate_policy(&self.default)?;
        for policy in self.policies.values() {
            Self::validate_policy(policy)?;
        }
        for sim in &self.simulations {
            if sim.end_year < sim.start_year {
                return Err(SimulationError::InvalidYearRange {
                    name: sim.name.clone(),
                    start: sim.start_year,
                    end: sim.end_year,
                }
                .into());
            }
            for policy_name in &sim.policies {
                if !self.policies.contains_key(policy_name) {
                    return Err(SimulationError::UnknownPolicy(policy_name.clone()).into());
                }
            }
        }
        Ok(())
    }

    /// Variable operations may target any scope level, but every stream
    /// operation needs a fully-specified (application, substance) scope or
    /// the engine will reject it at runtime — caught here instead.
    fn validate_policy(policy: &Policy) -> SimResult<()> {
        for op in policy {
            let needs_substance = !matches!(op.verb, Verb::DefineVariable { .. } | Verb::SetVariable { .. });
            if needs_substance && !op.scope.is_fully_specified() {
                return Err(ScopeError::NoAppOrSubstance(format!("{:?}", op.scope)).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn scoped_op() -> Operation {
        let scope = Scope::with_stanza("default").with_application("refrig").with_substance("HFC-134a");
        Operation::new(
            scope,
            YearMatcher::unbounded(),
            Verb::Set { stream: "manufacture".to_string(), value: EngineNumber::new(dec!(1), "mt") },
        )
    }

    #[test]
    fn validate_accepts_well_formed_program() {
        let mut program = ProgramDefinition::default();
        program.default.push(scoped_op());
        program.policies.insert("noop".to_string(), vec![scoped_op()]);
        program.simulations.push(SimulationSpec {
            name: "BAU".to_string(),
            start_year: 2025,
            end_year: 2030,
            policies: vec!["noop".to_string()],
            trials: 1,
        });
        assert!(program.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unspecified_scope_on_stream_operation() {
        let mut program = ProgramDefinition::default();
        let bad_scope = Scope::with_stanza("default").with_application("refrig");
        program.default.push(Operation::new(
            bad_scope,
            YearMatcher::unbounded(),
            Verb::Set { stream: "manufacture".to_string(), value: EngineNumber::new(dec!(1), "mt") },
        ));
        assert!(program.validate().is_err());
    }

    #[test]
    fn validate_rejects_dangling_policy_reference() {
        let mut program = ProgramDefinition::default();
        program.simulations.push(SimulationSpec {
            name: "BAU".to_string(),
            start_year: 2025,
            end_year: 2030,
            policies: vec!["missing".to_string()],
            trials: 1,
        });
        assert!(program.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_year_range() {
        let mut program = ProgramDefinition::default();
        program.simulations.push(SimulationSpec {
            name: "BAU".to_string(),
            start_year: 2030,
            end_year: 2025,
            policies: Vec::new(),
            trials: 1,
        });
        assert!(program.validate().is_err());
    }

    #[test]
    fn variable_operations_do_not_require_full_scope() {
        let mut program = ProgramDefinition::default();
        program.default.push(Operation::new(
            Scope::with_stanza("default"),
            YearMatcher::unbounded(),
            Verb::DefineVariable { name: "x".to_string(), value: EngineNumber::new(dec!(1), "kg") },
        ));
        assert!(program.validate().is_ok());
    }
}
