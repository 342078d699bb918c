//! Facade (scenario driver): walks a parsed program, running the default
//! policy plus each named scenario policy, per trial, per year. Independent
//! trials share no mutable state (each gets its own [`Engine`]), so they fan
//! out across a `rayon` thread pool the way agent evaluation fans out
//! elsewhere in this codebase.

use rayon::prelude::*;

use crate::engine::Engine;
use crate::error::{SimResult, SimulationError};
use crate::operation::{Policy, ProgramDefinition};
use crate::result::EngineResult;

/// Runs every trial of `scenario_name` (as found in `program.simulations`)
/// and returns all result rows, year-major within each trial. Trials run
/// concurrently; trial N's rows are not ordered relative to trial M's.
pub fn run_scenario(program: &ProgramDefinition, scenario_name: &str) -> SimResult<Vec<EngineResult>> {
    let spec = program
        .simulations
        .iter()
        .find(|s| s.name == scenario_name)
        .ok_or_else(|| SimulationError::UnknownPolicy(scenario_name.to_string()))?;

    if spec.end_year < spec.start_year {
        return Err(SimulationError::InvalidYearRange {
            name: spec.name.clone(),
            start: spec.start_year,
            end: spec.end_year,
        }
        .into());
    }

    let policies: Vec<&Policy> = spec
        .policies
        .iter()
        .map(|name| {
            program
                .policies
                .get(name)
                .ok_or_else(|| SimulationError::UnknownPolicy(name.clone()).into())
        })
        .collect::<SimResult<_>>()?;

    tracing::info!(
        scenario = %spec.name,
        trials = spec.trials,
        start_year = spec.start_year,
        end_year = spec.end_year,
        "starting scenario"
    );

    let per_trial: Vec<SimResult<Vec<EngineResult>>> = (1..=spec.trials)
        .into_par_iter()
        .map(|trial| run_trial(&program.default, &policies, &spec.name, spec.start_year, spec.end_year, trial))
        .collect();

    let mut all = Vec::new();
    for trial_result in per_trial {
        all.extend(trial_result?);
    }
    Ok(all)
}

#[tracing::instrument(skip(default, policies, start_year, end_year), fields(scenario = %scenario_name))]
fn run_trial(
    default: &Policy,
    policies: &[&Policy],
    scenario_name: &str,
    start_year: i64,
    end_year: i64,
    trial: u32,
) -> SimResult<Vec<EngineResult>> {
    let mut engine = Engine::new(start_year, end_year);
    let mut results = Vec::new();

    while !engine.is_complete() {
        engine.run_policy(default)?;
        for policy in policies {
            engine.run_policy(policy)?;
        }
        results.extend(engine.get_results(scenario_name, trial)?);
        tracing::debug!(year = engine.current_year(), rows = results.len(), "year captured");
        engine.increment_year()?;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::EngineNumber;
    use crate::operation::{Operation, SimulationSpec, Verb};
    use crate::scope::Scope;
    use crate::year_matcher::YearMatcher;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn scope() -> Scope {
        Scope::with_stanza("default").with_application("refrig").with_substance("HFC-134a")
    }

    fn op(verb: Verb) -> Operation {
        Operation::new(scope(), YearMatcher::unbounded(), verb)
    }

    fn sample_program() -> ProgramDefinition {
        ProgramDefinition {
            default: vec![
                op(Verb::Equals { intensity: EngineNumber::new(dec!(1430), "tCO2e / kg") }),
                op(Verb::InitialCharge {
                    value: EngineNumber::new(dec!(0.15), "kg / unit"),
                    stream: "sales".to_string(),
                }),
                op(Verb::Set { stream: "manufacture".to_string(), value: EngineNumber::new(dec!(1000), "mt") }),
            ],
            policies: HashMap::new(),
            simulations: vec![SimulationSpec {
                name: "BAU".to_string(),
                start_year: 2025,
                end_year: 2027,
                policies: Vec::new(),
                trials: 2,
            }],
        }
    }

    #[test]
    fn run_scenario_emits_one_row_per_year_per_trial() {
        let program = sample_program();
        let results = run_scenario(&program, "BAU").unwrap();
        assert_eq!(results.len(), 3 * 2);
        assert!(results.iter().all(|r| r.scenario_name == "BAU"));
    }

    #[test]
    fn unknown_scenario_name_errors() {
        let program = sample_program();
        assert!(run_scenario(&program, "nonexistent").is_err());
    }
}
