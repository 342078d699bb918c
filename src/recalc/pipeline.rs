//! Maps a stream that was just written to the ordered list of strategies
//! that must run afterward.
//!
//! The engine executes a pipeline by iterating this list once; it never
//! re-enters `StreamKeeper::set_stream` to recompute a dependency, which is
//! what keeps the propagation acyclic.

use crate::recalc::strategies::{PipelineTrigger, Strategy};

/// Controls whether the (normally idempotent) tail propagation in each row
/// of the trigger table also runs. With optimization on (the default), a
/// propagation that would just recompute the stream that triggered the
/// pipeline is skipped.
pub const OPTIMIZE_RECALCS: bool = true;

pub fn build_pipeline(trigger: PipelineTrigger) -> Vec<Strategy> {
    match trigger {
        PipelineTrigger::Sales => {
            let mut steps = vec![Strategy::PopulationChange, Strategy::Consumption];
            if !OPTIMIZE_RECALCS {
                steps.push(Strategy::Sales);
            }
            steps
        }
        PipelineTrigger::Consumption => {
            let mut steps = vec![Strategy::Sales, Strategy::PopulationChange];
            if !OPTIMIZE_RECALCS {
                steps.push(Strategy::Consumption);
            }
            steps
        }
        PipelineTrigger::Equipment => {
            let mut steps = vec![Strategy::Sales, Strategy::Consumption];
            if !OPTIMIZE_RECALCS {
                steps.push(Strategy::PopulationChange);
            }
            steps
        }
        PipelineTrigger::PriorEquipment => vec![Strategy::Retire],
        PipelineTrigger::EqualsGhg => {
            vec![Strategy::RechargeEmissions, Strategy::EolEmissions, Strategy::Consumption]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sales_trigger_recomputes_population_then_consumption() {
        assert_eq!(
            build_pipeline(PipelineTrigger::Sales),
            vec![Strategy::PopulationChange, Strategy::Consumption]
        );
    }

    #[test]
    fn equals_ghg_trigger_chains_emissions_then_consumption() {
        assert_eq!(
            build_pipeline(PipelineTrigger::EqualsGhg),
            vec![Strategy::RechargeEmissions, Strategy::EolEmissions, Strategy::Consumption]
        );
    }
}
