//! The engine: orchestrates scope, the year cursor, the stream keeper, and
//! the variable manager, and implements operation semantics for substance
//! streams. This is the crate's largest component, reflecting how central
//! stream mutation and recalculation are to the overall simulation.

use rust_decimal::Decimal;

use crate::error::{ScopeError, SimResult, SimulationError, UnitError, VariableError};
use crate::number::EngineNumber;
use crate::operation::{DisplaceTarget, Operation, Policy, RecycleStage, Verb};
use crate::recalc::{PipelineContext, PipelineTrigger};
use crate::result::EngineResult;
use crate::scope::{ContextLevel, Scope, UseKey};
use crate::state::OverridableStateGetter;
use crate::streams::{SalesSubstream, StreamKeeper, StreamName, UnitsHint};
use crate::units;
use crate::variables::VariableManager;

/// Names synthesized on read rather than stored in the variable manager.
fn synthesized_variable(engine: &Engine, name: &str) -> Option<EngineNumber> {
    match name {
        "yearsElapsed" => Some(EngineNumber::new(
            Decimal::from(engine.current_year - engine.start_year),
            "years",
        )),
        "yearAbsolute" => Some(EngineNumber::new(Decimal::from(engine.current_year), "yearAbsolute")),
        _ => None,
    }
}

/// Single-threaded simulation engine for one trial over `[start_year,
/// end_year]`. Owns the stream keeper and the variable manager outright —
/// nothing here is shared across simulations.
#[derive(Debug, Clone)]
pub struct Engine {
    start_year: i64,
    end_year: i64,
    current_year: i64,
    keeper: StreamKeeper,
    variables: VariableManager,
}

impl Engine {
    pub fn new(start_year: i64, end_year: i64) -> Self {
        Self {
            start_year,
            end_year,
            current_year: start_year,
            keeper: StreamKeeper::new(),
            variables: VariableManager::new(),
        }
    }

    pub fn current_year(&self) -> i64 {
        self.current_year
    }

    pub fn is_complete(&self) -> bool {
        self.current_year > self.end_year
    }

    /// Applies every operation in `policy` in order, skipping any whose
    /// `years` doesn't cover the current year.
    pub fn run_policy(&mut self, policy: &Policy) -> SimResult<()> {
        for op in policy {
            self.apply(op)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, op: &Operation) -> SimResult<()> {
        if !op.years.in_range(self.current_year) {
            return Ok(());
        }
        match &op.verb {
            Verb::Set { stream, value } => self.op_set(&op.scope, stream, value),
            Verb::Change { stream, delta } => self.op_change(&op.scope, stream, delta),
            Verb::Cap { stream, max, displace_target } => {
                self.op_cap_or_floor(&op.scope, stream, max, displace_target.as_ref(), true)
            }
            Verb::Floor { stream, min, displace_target } => {
                self.op_cap_or_floor(&op.scope, stream, min, displace_target.as_ref(), false)
            }
            Verb::Replace { amount, stream, destination_substance } => {
                self.op_replace(&op.scope, amount, stream, destination_substance)
            }
            Verb::Recharge { population_percent, intensity } => {
                self.op_recharge(&op.scope, *population_percent, intensity)
            }
            Verb::Retire { percent } => self.op_retire(&op.scope, *percent),
            Verb::Recycle { recovery_percent, yield_percent, displacement_target, stage } => self
                .op_recycle(
                    &op.scope,
                    *recovery_percent,
                    *yield_percent,
                    displacement_target.as_ref(),
                    *stage,
                ),
            Verb::Equals { intensity } => self.op_equals(&op.scope, intensity),
            Verb::InitialCharge { value, stream } => self.op_initial_charge(&op.scope, value, stream),
            Verb::Enable { stream } => self.op_enable(&op.scope, stream),
            Verb::DefineVariable { name, value } => {
                self.variables.define(op.scope.level(), name, *value)
            }
            Verb::SetVariable { name, value } => self.variables.set(op.scope.level(), name, *value),
        }
    }

    /// `getVariable`: not itself an [`Operation`] (it produces a value for
    /// the caller rather than mutating engine state), but exposed the same
    /// way so an external interpreter can evaluate expressions.
    pub fn get_variable(&self, scope: &Scope, name: &str) -> SimResult<EngineNumber> {
        if let Some(v) = synthesized_variable(self, name) {
            return Ok(v);
        }
        self.variables.get(scope.level(), name).map(|v| *v)
    }

    pub fn define_variable(&mut self, scope: &Scope, name: &str, value: EngineNumber) -> SimResult<()> {
        self.variables.define(scope.level(), name, value)
    }

    pub fn set_variable(&mut self, scope: &Scope, name: &str, value: EngineNumber) -> SimResult<()> {
        self.variables.set(scope.level(), name, value)
    }

    /// Notifies the engine that the caller (the DSL interpreter walking an
    /// AST) is entering `scope` — a new stanza, application, or substance
    /// block. Per spec.md §3's scope invariant, clears any variables defined
    /// at or below the entered level so they don't leak from a sibling
    /// block; variables at shallower levels are untouched. Not itself tied
    /// to any `Verb`, since nothing about a single operation's scope implies
    /// "we just started a new block" as opposed to "this operation, like
    /// the last ten, happens to target the same scope".
    pub fn enter_scope(&mut self, scope: &Scope) {
        self.variables.reset_at_and_below(scope.level());
    }

    /// `incrementYear`: rolls `equipment` into `priorEquipment` for every
    /// registered substance and resets per-year parameterization, then
    /// advances the cursor. Rates and intensities reset to zero on rollover
    ///; the next year's policy operations (`retire`,
    /// `recharge`, `equals`, ...) are expected to re-apply them before
    /// anything reads `equipment` again.
    pub fn increment_year(&mut self) -> SimResult<()> {
        if self.is_complete() {
            return Err(SimulationError::SimulationAlreadyComplete { end_year: self.end_year }.into());
        }
        self.keeper.increment_year();
        self.current_year += 1;
        Ok(())
    }

    /// Collects one [`EngineResult`] row per registered (application,
    /// substance) for the current year.
    pub fn get_results(&self, scenario: &str, trial: u32) -> SimResult<Vec<EngineResult>> {
        let keys: Vec<UseKey> = self.keeper.registered_keys().cloned().collect();
        keys.iter()
            .map(|key| EngineResult::capture(&self.keeper, key, scenario, trial, self.current_year))
            .collect()
    }

    fn require_scope(&mut self, scope: &Scope) -> SimResult<UseKey> {
        if !scope.is_fully_specified() {
            return Err(ScopeError::NoAppOrSubstance(format!("{scope:?}")).into());
        }
        let key = scope.use_key();
        self.keeper.ensure_substance(&key);
        Ok(key)
    }

    fn pipeline_trigger_for(name: StreamName) -> Option<PipelineTrigger> {
        match name {
            StreamName::Manufacture | StreamName::Import | StreamName::Recycle | StreamName::Sales => {
                Some(PipelineTrigger::Sales)
            }
            StreamName::Consumption => Some(PipelineTrigger::Consumption),
            StreamName::Equipment => Some(PipelineTrigger::Equipment),
            _ => None,
        }
    }

    /// Runs the recalc pipeline for whatever stream was just written, if
    /// that stream is one of the table's trigger streams.
    fn dispatch_pipeline(&mut self, key: &UseKey, name: StreamName, units_hint: UnitsHint) -> SimResult<()> {
        let Some(trigger) = Self::pipeline_trigger_for(name) else { return Ok(()) };
        let ctx = PipelineContext { key: key.clone(), origin: trigger, units_hint };
        for strategy in crate::recalc::build_pipeline(trigger) {
            strategy.execute(&ctx, &mut self.keeper)?;
        }
        Ok(())
    }

    /// `set(stream, value, yearMatcher)`. Sales substreams set in equipment
    /// units add the current recharge volume on top and remember it as the
    /// "implicit recharge" companion; sales substreams set in any other unit
    /// clear that companion.
    fn op_set(&mut self, scope: &Scope, stream: &str, value: &EngineNumber) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let name = Self::parse_stream(&key, stream)?;

        let units_hint = if value.is_equipment_units() { UnitsHint::Equipment } else { UnitsHint::Mass };

        if let Some(substream) = name.as_sales_substream() {
            if !value.is_percent() {
                self.keeper.parameterization_mut(&key)?.last_specified_units = units_hint;
            }
            if value.is_equipment_units() {
                let charge = self.substream_charge(&key, substream)?;
                let new_kg = value.value * charge.value;
                let recharge_kg = self.current_recharge_mass(&key)?;
                let total = EngineNumber::new(new_kg + recharge_kg, "kg");
                self.keeper.parameterization_mut(&key)?.implicit_recharge =
                    Some(EngineNumber::new(recharge_kg, "kg"));
                self.keeper.set_raw(&key, name, total)?;
            } else {
                self.keeper.parameterization_mut(&key)?.implicit_recharge = None;
                self.keeper.set_stream(&key, stream, value)?;
            }
        } else {
            self.keeper.set_stream(&key, stream, value)?;
        }

        self.dispatch_pipeline(&key, name, units_hint)
    }

    /// `change(stream, delta, yearMatcher)`: reads the current value,
    /// converts `delta` into the stream's current units (percent deltas are
    /// relative to the current value), adds, and re-dispatches through
    /// `set` so the same recharge/pipeline composition applies.
    fn op_change(&mut self, scope: &Scope, stream: &str, delta: &EngineNumber) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let name = Self::parse_stream(&key, stream)?;
        let current = self.keeper.get_stream(&key, name)?;

        let delta_in_current_units = if delta.is_percent() {
            EngineNumber::new(current.value * delta.value / Decimal::from(100), current.units_str())
        } else {
            let snapshot = self.keeper.context_snapshot(&key)?;
            let getter = OverridableStateGetter::new(&snapshot);
            units::convert(delta, current.units_str(), &getter)?
        };

        let new_total = EngineNumber::new(current.value + delta_in_current_units.value, current.units_str());
        self.op_set(scope, stream, &new_total)?;

        if !delta.is_percent() {
            let hint = if delta.is_equipment_units() { UnitsHint::Equipment } else { UnitsHint::Mass };
            self.keeper.parameterization_mut(&key)?.last_specified_units = hint;
        }
        Ok(())
    }

    /// Shared implementation for `cap` and `floor`: `is_cap == true` clamps
    /// from above and donates the excess to `displace_target`; `is_cap ==
    /// false` clamps from below and pulls the shortfall from
    /// `displace_target`.
    fn op_cap_or_floor(
        &mut self,
        scope: &Scope,
        stream: &str,
        bound: &EngineNumber,
        displace_target: Option<&DisplaceTarget>,
        is_cap: bool,
    ) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let name = Self::parse_stream(&key, stream)?;
        let current = self.keeper.get_stream(&key, name)?;

        let bound_in_base = self.resolve_stream_bound(&key, name, bound)?;

        let (hits, moved) = if is_cap {
            if current.value > bound_in_base {
                (true, current.value - bound_in_base)
            } else {
                (false, Decimal::ZERO)
            }
        } else if current.value < bound_in_base {
            (true, bound_in_base - current.value)
        } else {
            (false, Decimal::ZERO)
        };
        if !hits {
            return Ok(());
        }

        // Equipment-equivalent of the moved mass, at the *source's* charge.
        // Used only when displacing to a different substance, which must
        // reconvert it at the destination's own charge.
        let equipment_count = if bound.is_equipment_units() {
            match name.as_sales_substream() {
                Some(substream) => {
                    let charge = self.substream_charge(&key, substream)?;
                    (!charge.value.is_zero()).then(|| moved / charge.value)
                }
                None => None,
            }
        } else {
            None
        };

        let new_value = EngineNumber::new(bound_in_base, name.base_unit());
        let units_hint = if bound.is_equipment_units() { UnitsHint::Equipment } else { UnitsHint::Mass };
        self.keeper.set_raw(&key, name, new_value)?;
        self.dispatch_pipeline(&key, name, units_hint)?;

        if let Some(target) = displace_target {
            let moved_number = EngineNumber::new(moved, name.base_unit());
            // `cap` donates the removed mass; `floor` pulls it from the target.
            self.apply_displacement(&key, name, target, moved_number, equipment_count, !is_cap)?;
        }
        Ok(())
    }

    /// Resolves a cap/floor bound into the stream's base unit: percent
    /// bounds are relative to the stream's current value; equipment-unit
    /// bounds add the current recharge volume on top before comparison
    ///.
    fn resolve_stream_bound(&self, key: &UseKey, name: StreamName, bound: &EngineNumber) -> SimResult<Decimal> {
        if bound.is_percent() {
            let current = self.keeper.get_stream(key, name)?;
            return Ok(current.value * bound.value / Decimal::from(100));
        }
        if bound.is_equipment_units() {
            if let Some(substream) = name.as_sales_substream() {
                let charge = self.substream_charge(key, substream)?;
                let recharge_kg = self.current_recharge_mass(key)?;
                return Ok(bound.value * charge.value + recharge_kg);
            }
        }
        let snapshot = self.keeper.context_snapshot(key)?;
        let getter = OverridableStateGetter::new(&snapshot);
        Ok(units::convert(bound, name.base_unit(), &getter)?.value)
    }

    /// `replace(amount, stream, destinationSubstance, yearMatcher)`: moves
    /// `amount` of `stream` from the current substance to the same stream of
    /// `destinationSubstance`. Equipment-unit amounts convert via each
    /// substance's own initial charge.
    fn op_replace(
        &mut self,
        scope: &Scope,
        amount: &EngineNumber,
        stream: &str,
        destination_substance: &str,
    ) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let name = Self::parse_stream(&key, stream)?;

        let removed_base = self.resolve_stream_bound(&key, name, amount)?;
        let current = self.keeper.get_stream(&key, name)?;
        let new_source = EngineNumber::new((current.value - removed_base).max(Decimal::ZERO), name.base_unit());
        let units_hint = if amount.is_equipment_units() { UnitsHint::Equipment } else { UnitsHint::Mass };
        self.keeper.set_raw(&key, name, new_source)?;
        self.dispatch_pipeline(&key, name, units_hint)?;

        let equipment_count = amount.is_equipment_units().then_some(amount.value);
        let target = DisplaceTarget::Substance(destination_substance.to_string());
        self.apply_displacement(
            &key,
            name,
            &target,
            EngineNumber::new(removed_base, name.base_unit()),
            equipment_count,
            false,
        )
    }

    /// Adds (or, when `subtract` is true, removes) `moved_mass` — already
    /// expressed in `stream`'s base unit, at the *source* substance's charge
    /// — to the displacement target, then re-dispatches the recalc pipeline
    /// for whichever (key, stream) ended up written.
    ///
    /// `equipment_count`, when present, is the equipment-equivalent of
    /// `moved_mass` at the source's charge. A [`DisplaceTarget::Substance`]
    /// reconverts it at the *destination's* own charge rather than reusing
    /// `moved_mass` directly, per spec.md §4.3's callout that an
    /// equipment-denominated displacement across substances must use the
    /// destination's initial charge.
    fn apply_displacement(
        &mut self,
        source_key: &UseKey,
        stream: StreamName,
        target: &DisplaceTarget,
        moved_mass: EngineNumber,
        equipment_count: Option<Decimal>,
        subtract: bool,
    ) -> SimResult<()> {
        match target {
            DisplaceTarget::Stream(target_stream) => {
                let target_name = Self::parse_stream(source_key, target_stream)?;
                let snapshot = self.keeper.context_snapshot(source_key)?;
                let getter = OverridableStateGetter::new(&snapshot);
                let converted = units::convert(&moved_mass, target_name.base_unit(), &getter)?;
                let delta = if subtract { -converted.value } else { converted.value };
                self.keeper.add_to_stream(source_key, target_name, delta)?;
                self.dispatch_pipeline(source_key, target_name, UnitsHint::Mass)
            }
            DisplaceTarget::Substance(dest_substance) => {
                let dest_key = UseKey::new(source_key.application.clone(), dest_substance.clone());
                self.keeper.ensure_substance(&dest_key);
                let dest_mass = match (equipment_count, stream.as_sales_substream()) {
                    (Some(units), Some(substream)) => {
                        let dest_charge = self.substream_charge(&dest_key, substream)?;
                        units * dest_charge.value
                    }
                    _ => moved_mass.value,
                };
                let delta = if subtract { -dest_mass } else { dest_mass };
                self.keeper.add_to_stream(&dest_key, stream, delta)?;
                self.dispatch_pipeline(&dest_key, stream, UnitsHint::Mass)
            }
        }
    }

    /// `recharge(populationPercent, intensityKgPerUnit, yearMatcher)`: stores
    /// the recharge parameters and re-triggers the sales pipeline so the
    /// consumption/population figures pick up the new recharge load.
    fn op_recharge(&mut self, scope: &Scope, population_percent: Decimal, intensity: &EngineNumber) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let snapshot = self.keeper.context_snapshot(&key)?;
        let getter = OverridableStateGetter::new(&snapshot);
        let intensity_kg_per_unit = units::convert(intensity, "kg / unit", &getter)?;
        {
            let param = self.keeper.parameterization_mut(&key)?;
            param.recharge_population = population_percent;
            param.recharge_intensity = intensity_kg_per_unit;
        }
        let hint = self.keeper.parameterization(&key)?.last_specified_units;
        self.dispatch_pipeline(&key, StreamName::Manufacture, hint)
    }

    /// `retire(percent, yearMatcher)`: stores the retirement rate and
    /// re-derives `equipment` for the current year.
    fn op_retire(&mut self, scope: &Scope, percent: Decimal) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        self.keeper.parameterization_mut(&key)?.retirement_rate = percent;
        let ctx = PipelineContext { key: key.clone(), origin: PipelineTrigger::PriorEquipment, units_hint: UnitsHint::Mass };
        crate::recalc::Strategy::Retire.execute(&ctx, &mut self.keeper)
    }

    /// `recycle(recoveryPercent, yieldPercent, yearMatcher, displacementTarget?, stage?)`.
    /// Stores recovery/yield, recomputes the recovered kg and folds it into
    /// `recycle`, then (open question (b)) only
    /// `recycle` itself grows when no displacement target is given; with one,
    /// the recovered mass is also displaced.
    fn op_recycle(
        &mut self,
        scope: &Scope,
        recovery_percent: Decimal,
        yield_percent: Decimal,
        displacement_target: Option<&DisplaceTarget>,
        _stage: Option<RecycleStage>,
    ) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        {
            let param = self.keeper.parameterization_mut(&key)?;
            param.recovery_rate = recovery_percent;
            param.yield_rate = yield_percent;
        }

        let retired = {
            let prior = self.keeper.get_stream(&key, StreamName::PriorEquipment)?.value;
            let retirement_rate = self.keeper.parameterization(&key)?.retirement_rate;
            let charge = self.pooled_charge(&key)?;
            prior * retirement_rate / Decimal::from(100) * charge
        };
        let recovered_kg = retired * recovery_percent / Decimal::from(100) * yield_percent / Decimal::from(100);

        self.keeper.add_to_stream(&key, StreamName::Recycle, recovered_kg)?;
        self.dispatch_pipeline(&key, StreamName::Sales, UnitsHint::Mass)?;

        if let Some(target) = displacement_target {
            self.apply_displacement(
                &key,
                StreamName::Recycle,
                target,
                EngineNumber::new(recovered_kg, "kg"),
                None,
                false,
            )?;
        }
        Ok(())
    }

    /// `equals(intensity, yearMatcher)`: sets GHG or energy intensity
    /// depending on the unit family, then (for GHG) re-triggers the
    /// recharge/EOL emissions chain.
    fn op_equals(&mut self, scope: &Scope, intensity: &EngineNumber) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let units = intensity.units_str();
        if units.starts_with("tCO2e") {
            self.keeper.parameterization_mut(&key)?.ghg_intensity = *intensity;
            let ctx = PipelineContext { key: key.clone(), origin: PipelineTrigger::EqualsGhg, units_hint: UnitsHint::Mass };
            for strategy in crate::recalc::build_pipeline(PipelineTrigger::EqualsGhg) {
                strategy.execute(&ctx, &mut self.keeper)?;
            }
            Ok(())
        } else if units.starts_with("kwh") {
            self.keeper.parameterization_mut(&key)?.energy_intensity = *intensity;
            Ok(())
        } else {
            Err(UnitError::BadEqualsUnits { units: units.to_string() }.into())
        }
    }

    /// `initialCharge(value, stream, yearMatcher)`: sets per-substream
    /// initial charge (`sales` sets both manufacture and import), then
    /// re-derives population.
    fn op_initial_charge(&mut self, scope: &Scope, value: &EngineNumber, stream: &str) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let charge_in_base = {
            let snapshot = self.keeper.context_snapshot(&key)?;
            let getter = OverridableStateGetter::new(&snapshot);
            units::convert(value, "kg / unit", &getter)?
        };
        if stream == "sales" {
            let param = self.keeper.parameterization_mut(&key)?;
            param.initial_charge_manufacture = charge_in_base;
            param.initial_charge_import = charge_in_base;
        } else {
            let name = Self::parse_stream(&key, stream)?;
            let substream = name.as_sales_substream().ok_or_else(|| {
                crate::error::StreamError::UnknownStream {
                    application: key.application.clone(),
                    substance: key.substance.clone(),
                    stream: stream.to_string(),
                }
            })?;
            self.keeper.parameterization_mut(&key)?.set_initial_charge_for(substream, charge_in_base);
        }
        let hint = self.keeper.parameterization(&key)?.last_specified_units;
        self.dispatch_pipeline(&key, StreamName::Manufacture, hint)
    }

    /// `enable(stream, yearMatcher)`.
    fn op_enable(&mut self, scope: &Scope, stream: &str) -> SimResult<()> {
        let key = self.require_scope(scope)?;
        let name = Self::parse_stream(&key, stream)?;
        let substream = name.as_sales_substream().ok_or_else(|| {
            crate::error::StreamError::UnknownStream {
                application: key.application.clone(),
                substance: key.substance.clone(),
                stream: stream.to_string(),
            }
        })?;
        self.keeper.enable_stream(&key, substream)
    }

    fn parse_stream(key: &UseKey, stream: &str) -> SimResult<StreamName> {
        stream.parse().map_err(|_| {
            crate::error::StreamError::UnknownStream {
                application: key.application.clone(),
                substance: key.substance.clone(),
                stream: stream.to_string(),
            }
            .into()
        })
    }

    fn substream_charge(&self, key: &UseKey, substream: SalesSubstream) -> SimResult<EngineNumber> {
        self.keeper.initial_charge(key, substream)?.ok_or_else(|| {
            crate::error::StreamError::ZeroInitialCharge {
                application: key.application.clone(),
                substance: key.substance.clone(),
                stream: substream.to_string(),
            }
            .into()
        })
    }

    fn current_recharge_mass(&self, key: &UseKey) -> SimResult<Decimal> {
        let prior = self.keeper.get_stream(key, StreamName::PriorEquipment)?.value;
        let param = self.keeper.parameterization(key)?;
        Ok(prior * param.recharge_population / Decimal::from(100) * param.recharge_intensity.value)
    }

    fn pooled_charge(&self, key: &UseKey) -> SimResult<Decimal> {
        let manufacture = self.keeper.get_stream(key, StreamName::Manufacture)?.value;
        let import = self.keeper.get_stream(key, StreamName::Import)?.value;
        let param = self.keeper.parameterization(key)?;
        Ok(crate::streams::pooled_initial_charge(
            manufacture,
            param.initial_charge_manufacture.value,
            import,
            param.initial_charge_import.value,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Verb;
    use crate::year_matcher::YearMatcher;
    use rust_decimal_macros::dec;

    fn scope() -> Scope {
        Scope::with_stanza("default").with_application("refrig").with_substance("HFC-134a")
    }

    fn op(verb: Verb) -> Operation {
        Operation::new(scope(), YearMatcher::unbounded(), verb)
    }

    /// S1 from : baseline, no policy.
    #[test]
    fn s1_baseline_manufacture_set_drives_population_and_consumption() {
        let mut engine = Engine::new(2025, 2030);
        engine.apply(&op(Verb::Equals { intensity: EngineNumber::new(dec!(1430), "tCO2e / kg") })).unwrap();
        engine
            .apply(&op(Verb::InitialCharge {
                value: EngineNumber::new(dec!(0.15), "kg / unit"),
                stream: "sales".to_string(),
            }))
            .unwrap();
        engine
            .apply(&op(Verb::Recharge {
                population_percent: dec!(10),
                intensity: EngineNumber::new(dec!(0.15), "kg / unit"),
            }))
            .unwrap();
        engine.apply(&op(Verb::Retire { percent: dec!(5) })).unwrap();
        engine
            .apply(&op(Verb::Set { stream: "manufacture".to_string(), value: EngineNumber::new(dec!(1000), "mt") }))
            .unwrap();

        let key = UseKey::new("refrig", "HFC-134a");
        let manufacture = engine.keeper.get_stream(&key, StreamName::Manufacture).unwrap();
        assert_eq!(manufacture.value, dec!(1_000_000));

        let consumption = engine.keeper.get_stream(&key, StreamName::Consumption).unwrap();
        assert_eq!(consumption.value, dec!(1_430_000_000));

        let equipment = engine.keeper.get_stream(&key, StreamName::Equipment).unwrap();
        assert_eq!(equipment.value, dec!(1_000_000) / dec!(0.15));

        let recharge_emissions = engine.keeper.get_stream(&key, StreamName::RechargeEmissions).unwrap();
        assert_eq!(recharge_emissions.value, Decimal::ZERO);
    }

    #[test]
    fn increment_year_past_end_fails() {
        let mut engine = Engine::new(2025, 2025);
        engine.increment_year().unwrap();
        assert!(engine.is_complete());
        assert!(engine.increment_year().is_err());
    }

    #[test]
    fn set_without_scope_fails() {
        let mut engine = Engine::new(2025, 2025);
        let bad_scope = Scope::with_stanza("default").with_application("refrig");
        let result = engine.apply(&Operation::new(
            bad_scope,
            YearMatcher::unbounded(),
            Verb::Set { stream: "manufacture".to_string(), value: EngineNumber::new(dec!(1), "kg") },
        ));
        assert!(result.is_err());
    }

    #[test]
    fn cap_with_displacement_moves_mass_to_destination_substance() {
        let mut engine = Engine::new(2025, 2025);
        engine
            .apply(&op(Verb::Set { stream: "manufacture".to_string(), value: EngineNumber::new(dec!(1000), "mt") }))
            .unwrap();
        engine
            .apply(&op(Verb::Cap {
                stream: "manufacture".to_string(),
                max: EngineNumber::new(dec!(500), "mt"),
                displace_target: Some(DisplaceTarget::Substance("R-32".to_string())),
            }))
            .unwrap();

        let source_key = UseKey::new("refrig", "HFC-134a");
        let manufacture = engine.keeper.get_stream(&source_key, StreamName::Manufacture).unwrap();
        assert_eq!(manufacture.value, dec!(500_000));

        let dest_key = UseKey::new("refrig", "R-32");
        let dest_manufacture = engine.keeper.get_stream(&dest_key, StreamName::Manufacture).unwrap();
        assert_eq!(dest_manufacture.value, dec!(500_000));
    }

    #[test]
    fn enter_scope_clears_variables_at_and_below_that_level() {
        let mut engine = Engine::new(2025, 2025);
        let stanza = Scope::with_stanza("default");
        let app = stanza.with_application("refrig");
        engine.define_variable(&stanza, "g", EngineNumber::new(dec!(1), "kg")).unwrap();
        engine.define_variable(&app, "a", EngineNumber::new(dec!(2), "kg")).unwrap();

        engine.enter_scope(&app.with_application("foam"));

        assert!(engine.get_variable(&stanza, "g").is_ok());
        assert!(engine.get_variable(&app, "a").is_err());
    }

    #[test]
    fn protected_variable_name_rejected() {
        let mut engine = Engine::new(2025, 2025);
        let err = engine.define_variable(&scope(), "yearsElapsed", EngineNumber::new(dec!(1), "years"));
        assert!(matches!(err, Err(crate::error::EngineError::Variable(VariableError::ProtectedName(_)))));
    }
}
