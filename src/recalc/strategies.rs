//! Recalc strategies: the small set of pure recomputations the engine
//! composes into a pipeline after any `set` that touches a sales,
//! consumption, equipment, or priorEquipment stream. See .

use rust_decimal::Decimal;

use crate::error::SimResult;
use crate::scope::UseKey;
use crate::streams::{pooled_initial_charge, SalesSubstream, StreamKeeper, StreamName, UnitsHint};

/// Which stream `set` originally kicked off the pipeline this context is
/// driving. `Sales` covers the three sales substreams and the virtual
/// `sales` stream — they all recompute population the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineTrigger {
    Sales,
    Consumption,
    Equipment,
    PriorEquipment,
    EqualsGhg,
}

/// Per-pipeline-run context: which substance, what triggered it, and (for
/// `Sales`-origin runs) whether the triggering `set` carried equipment
/// units — needed by `PopulationChange` to decide how much recharge mass
/// has already been folded into the written stream value.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub key: UseKey,
    pub origin: PipelineTrigger,
    pub units_hint: UnitsHint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PopulationChange,
    Sales,
    Consumption,
    RechargeEmissions,
    EolEmissions,
    Retire,
}

impl Strategy {
    pub fn execute(self, ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
        match self {
            Strategy::PopulationChange => population_change(ctx, keeper),
            Strategy::Sales => sales(ctx, keeper),
            Strategy::Consumption => consumption(ctx, keeper),
            Strategy::RechargeEmissions => recharge_emissions(ctx, keeper),
            Strategy::EolEmissions => eol_emissions(ctx, keeper),
            Strategy::Retire => retire(ctx, keeper),
        }
    }
}

/// `equipment = priorEquipment - retired + newEquipment`, computed fresh
/// from the currently-stored `newEquipment` and the current retirement
/// rate. Both `PopulationChange` and `Retire` route through this so
/// property 2 holds no matter which strategy last ran.
fn recompute_equipment(key: &UseKey, keeper: &mut StreamKeeper) -> SimResult<()> {
    let prior = keeper.get_stream(key, StreamName::PriorEquipment)?.value;
    let new_equipment = keeper.get_stream(key, StreamName::NewEquipment)?.value;
    let retirement_rate = keeper.parameterization(key)?.retirement_rate;
    let retired = prior * retirement_rate / Decimal::from(100);
    let equipment = prior - retired + new_equipment;
    keeper.set_raw(
        key,
        StreamName::Equipment,
        crate::number::EngineNumber::new(equipment, "units"),
    )
}

/// Mass of recharge material already accounted for this `set`: the exact
/// companion tracked by the triggering equipment-unit `set` if one exists,
/// otherwise the mass implied by the current recharge rate/intensity
/// against the prior fleet ("useExplicitRecharge"
/// note — resolved explicitly rather than as a hidden global flag; see
/// DESIGN.md).
fn recharge_mass(key: &UseKey, ctx: &PipelineContext, keeper: &StreamKeeper) -> SimResult<Decimal> {
    let param = keeper.parameterization(key)?;
    if ctx.units_hint == UnitsHint::Equipment {
        if let Some(companion) = param.implicit_recharge {
            return Ok(companion.value);
        }
    }
    let prior = keeper.get_stream(key, StreamName::PriorEquipment)?.value;
    Ok(prior * param.recharge_population / Decimal::from(100) * param.recharge_intensity.value)
}

fn pooled_charge(key: &UseKey, keeper: &StreamKeeper) -> SimResult<Decimal> {
    let streams_manufacture = keeper.get_stream(key, StreamName::Manufacture)?.value;
    let streams_import = keeper.get_stream(key, StreamName::Import)?.value;
    let param = keeper.parameterization(key)?;
    Ok(pooled_initial_charge(
        streams_manufacture,
        param.initial_charge_manufacture.value,
        streams_import,
        param.initial_charge_import.value,
    ))
}

/// New material available for new equipment is the manufacture+import kg
/// minus whatever of it is earmarked for recharging the existing fleet;
/// dividing by the pooled initial charge yields new units.
fn population_change(ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
    let key = &ctx.key;
    let manufacture = keeper.get_stream(key, StreamName::Manufacture)?.value;
    let import = keeper.get_stream(key, StreamName::Import)?.value;
    let recharge = recharge_mass(key, ctx, keeper)?;
    let new_material = (manufacture + import - recharge).max(Decimal::ZERO);
    let charge = pooled_charge(key, keeper)?;
    let new_units = if charge.is_zero() { Decimal::ZERO } else { new_material / charge };
    keeper.set_raw(key, StreamName::NewEquipment, crate::number::EngineNumber::new(new_units, "units"))?;
    recompute_equipment(key, keeper)
}

fn retire(ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
    recompute_equipment(&ctx.key, keeper)
}

/// Back-solves the sales mass required to reach an equipment or consumption
/// target and splits it across enabled substreams by the current
/// distribution.
fn sales(ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
    let key = &ctx.key;
    let total_kg = match ctx.origin {
        PipelineTrigger::Equipment => {
            let target_units = keeper.get_stream(key, StreamName::Equipment)?.value;
            let prior = keeper.get_stream(key, StreamName::PriorEquipment)?.value;
            let retirement_rate = keeper.parameterization(key)?.retirement_rate;
            let retired = prior * retirement_rate / Decimal::from(100);
            let new_units = (target_units - (prior - retired)).max(Decimal::ZERO);
            let charge = pooled_charge(key, keeper)?;
            let recharge = recharge_mass(key, ctx, keeper)?;
            keeper.set_raw(
                key,
                StreamName::NewEquipment,
                crate::number::EngineNumber::new(new_units, "units"),
            )?;
            new_units * charge + recharge
        }
        PipelineTrigger::Consumption => {
            let target = keeper.get_stream(key, StreamName::Consumption)?.value;
            let ghg = keeper.parameterization(key)?.ghg_intensity.value;
            if ghg.is_zero() { Decimal::ZERO } else { target / ghg }
        }
        _ => return Ok(()),
    };

    let (pm, pi, pe) = keeper.get_distribution(key, true)?;
    let hundred = Decimal::from(100);
    if SalesSubstream::ALL.iter().any(|s| keeper.parameterization(key).unwrap().enabled_streams.contains(s))
    {
        keeper.set_raw(
            key,
            StreamName::Manufacture,
            crate::number::EngineNumber::new(total_kg * pm / hundred, "kg"),
        )?;
        keeper.set_raw(
            key,
            StreamName::Import,
            crate::number::EngineNumber::new(total_kg * pi / hundred, "kg"),
        )?;
        keeper.set_raw(
            key,
            StreamName::Export,
            crate::number::EngineNumber::new(total_kg * pe / hundred, "kg"),
        )?;
    }
    Ok(())
}

fn consumption(ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
    let key = &ctx.key;
    let manufacture = keeper.get_stream(key, StreamName::Manufacture)?.value;
    let import = keeper.get_stream(key, StreamName::Import)?.value;
    let param = keeper.parameterization(key)?;
    let ghg = param.ghg_intensity.value;
    let energy_intensity = param.energy_intensity.value;
    keeper.set_raw(
        key,
        StreamName::Consumption,
        crate::number::EngineNumber::new((manufacture + import) * ghg, "tCO2e"),
    )?;
    keeper.set_raw(
        key,
        StreamName::Energy,
        crate::number::EngineNumber::new((manufacture + import) * energy_intensity, "kwh"),
    )
}

fn recharge_emissions(ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
    let key = &ctx.key;
    let param = keeper.parameterization(key)?;
    let prior = keeper.get_stream(key, StreamName::PriorEquipment)?.value;
    let recharge_kg = prior * param.recharge_population / Decimal::from(100) * param.recharge_intensity.value;
    let ghg = param.ghg_intensity.value;
    keeper.set_raw(
        key,
        StreamName::RechargeEmissions,
        crate::number::EngineNumber::new(recharge_kg * ghg, "tCO2e"),
    )
}

fn eol_emissions(ctx: &PipelineContext, keeper: &mut StreamKeeper) -> SimResult<()> {
    let key = &ctx.key;
    let param = keeper.parameterization(key)?;
    let prior = keeper.get_stream(key, StreamName::PriorEquipment)?.value;
    let retired = prior * param.retirement_rate / Decimal::from(100);
    let ghg = param.ghg_intensity.value;
    let charge = pooled_charge(key, keeper)?;
    keeper.set_raw(
        key,
        StreamName::EolEmissions,
        crate::number::EngineNumber::new(retired * charge * ghg, "tCO2e"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::EngineNumber;
    use rust_decimal_macros::dec;

    fn key() -> UseKey {
        UseKey::new("refrig", "HFC-134a")
    }

    #[test]
    fn population_change_divides_new_material_by_pooled_charge() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.parameterization_mut(&key()).unwrap().initial_charge_manufacture =
            EngineNumber::new(dec!(0.15), "kg / unit");
        keeper.set_raw(&key(), StreamName::Manufacture, EngineNumber::new(dec!(1_000_000), "kg")).unwrap();
        let ctx = PipelineContext { key: key(), origin: PipelineTrigger::Sales, units_hint: UnitsHint::Mass };
        population_change(&ctx, &mut keeper).unwrap();
        let equipment = keeper.get_stream(&key(), StreamName::Equipment).unwrap();
        assert_eq!(equipment.value, dec!(1_000_000) / dec!(0.15));
    }

    #[test]
    fn retire_recomputes_equipment_from_prior_and_retirement_rate() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.set_raw(&key(), StreamName::PriorEquipment, EngineNumber::new(dec!(6_666_666), "units")).unwrap();
        keeper.parameterization_mut(&key()).unwrap().retirement_rate = dec!(5);
        let ctx =
            PipelineContext { key: key(), origin: PipelineTrigger::PriorEquipment, units_hint: UnitsHint::Mass };
        retire(&ctx, &mut keeper).unwrap();
        let equipment = keeper.get_stream(&key(), StreamName::Equipment).unwrap();
        assert_eq!(equipment.value, dec!(6_666_666) * dec!(0.95));
    }

    #[test]
    fn consumption_strategy_multiplies_by_ghg_intensity() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.set_raw(&key(), StreamName::Manufacture, EngineNumber::new(dec!(1_000_000), "kg")).unwrap();
        keeper.parameterization_mut(&key()).unwrap().ghg_intensity = EngineNumber::new(dec!(1430), "tCO2e / kg");
        let ctx = PipelineContext { key: key(), origin: PipelineTrigger::Sales, units_hint: UnitsHint::Mass };
        consumption(&ctx, &mut keeper).unwrap();
        let consumption = keeper.get_stream(&key(), StreamName::Consumption).unwrap();
        assert_eq!(consumption.value, dec!(1_430_000_000));
    }
}
