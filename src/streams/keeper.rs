//! Stream keeper: the central per-(application, substance) store of streams
//! and parameterization, and the only place that mutates a stream's raw
//! value.

use rust_decimal::Decimal;

use crate::error::{SimResult, StreamError};
use crate::number::EngineNumber;
use crate::scope::UseKey;
use crate::sorted_vec_map::SortedVecMap;
use crate::state::StateSnapshot;
use crate::streams::name::{SalesSubstream, StreamName};
use crate::streams::parameterization::{StreamParameterization, UnitsHint};
use crate::streams::storage::Streams;
use crate::units;

/// Per-(application, substance) storage: raw stream values plus the
/// parameterization that governs how they're interpreted.
#[derive(Debug, Clone, Default)]
pub struct SubstanceRecord {
    pub streams: Streams,
    pub parameterization: StreamParameterization,
}

/// Computes pooled kg/unit when material is split across the manufacture
/// and import substreams. s pooled initial charge
/// rule: weighted by kg-in-each-substream. If the total is zero, falls back
/// to whichever substream has a nonzero charge (zero if neither does).
pub fn pooled_initial_charge(
    manufacture_kg: Decimal,
    manufacture_charge: Decimal,
    import_kg: Decimal,
    import_charge: Decimal,
) -> Decimal {
    let total = manufacture_kg + import_kg;
    if total.is_zero() {
        if !manufacture_charge.is_zero() {
            manufacture_charge
        } else {
            import_charge
        }
    } else {
        (manufacture_charge * manufacture_kg + import_charge * import_kg) / total
    }
}

/// `false` means negative stream writes clamp to zero with a logged
/// warning (the default); `true` makes them a hard error. A module-level
/// toggle in the same style as `crate::recalc::OPTIMIZE_RECALCS`.
pub const CHECK_POSITIVE_STREAMS: bool = false;

#[derive(Debug, Clone, Default)]
pub struct StreamKeeper {
    records: SortedVecMap<UseKey, SubstanceRecord>,
}

impl StreamKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent initialization: all streams to zero, parameterization to
    /// defaults, if not already registered.
    pub fn ensure_substance(&mut self, key: &UseKey) {
        self.records.entry(key.clone()).or_default();
    }

    pub fn has_substance(&self, key: &UseKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn registered_keys(&self) -> impl Iterator<Item = &UseKey> {
        self.records.keys()
    }

    fn record(&self, key: &UseKey) -> SimResult<&SubstanceRecord> {
        self.records.get(key).ok_or_else(|| {
            StreamError::UnknownSubstance {
                application: key.application.clone(),
                substance: key.substance.clone(),
            }
            .into()
        })
    }

    fn record_mut(&mut self, key: &UseKey) -> SimResult<&mut SubstanceRecord> {
        let application = key.application.clone();
        let substance = key.substance.clone();
        self.records
            .get_mut(key)
            .ok_or_else(|| StreamError::UnknownSubstance { application, substance }.into())
    }

    pub fn is_known_stream(name: &str) -> bool {
        name == "sales" || name.parse::<StreamName>().is_ok()
    }

    pub fn get_stream(&self, key: &UseKey, name: StreamName) -> SimResult<EngineNumber> {
        Ok(self.record(key)?.streams.get(name))
    }

    pub fn parameterization(&self, key: &UseKey) -> SimResult<&StreamParameterization> {
        Ok(&self.record(key)?.parameterization)
    }

    pub fn parameterization_mut(&mut self, key: &UseKey) -> SimResult<&mut StreamParameterization> {
        Ok(&mut self.record_mut(key)?.parameterization)
    }

    pub fn initial_charge(&self, key: &UseKey, substream: SalesSubstream) -> SimResult<Option<EngineNumber>> {
        Ok(self.record(key)?.parameterization.initial_charge_for(substream))
    }

    /// A snapshot of the scalars a unit conversion against this substance's
    /// *current* state might need: population is the current equipment
    /// count, volume is the current `sales` total, consumption is the
    /// current consumption stream, and the amortized unit volume is the
    /// pooled manufacture/import initial charge.
    pub fn context_snapshot(&self, key: &UseKey) -> SimResult<StateSnapshot> {
        let rec = self.record(key)?;
        let pooled = pooled_initial_charge(
            rec.streams.manufacture.value,
            rec.parameterization.initial_charge_manufacture.value,
            rec.streams.import.value,
            rec.parameterization.initial_charge_import.value,
        );
        Ok(StateSnapshot {
            population: Some(rec.streams.equipment),
            volume: Some(rec.streams.sales()),
            consumption: Some(rec.streams.consumption),
            amortized_unit_volume: Some(EngineNumber::new(pooled, "kg / unit")),
            ghg_intensity: Some(rec.parameterization.ghg_intensity),
            energy_intensity: Some(rec.parameterization.energy_intensity),
            years_elapsed: None,
            year_absolute: None,
        })
    }

    /// `getDistribution`: percent of the combined sales total each enabled
    /// substream carries. Restricted to enabled substreams; splits evenly
    /// across them if none has a nonzero value; fails if none are enabled.
    pub fn get_distribution(
        &self,
        key: &UseKey,
        include_export: bool,
    ) -> SimResult<(Decimal, Decimal, Decimal)> {
        let rec = self.record(key)?;
        let enabled = &rec.parameterization.enabled_streams;
        let is_enabled = |s: SalesSubstream| {
            enabled.contains(&s) && (s != SalesSubstream::Export || include_export)
        };
        let active: Vec<SalesSubstream> =
            SalesSubstream::ALL.into_iter().filter(|&s| is_enabled(s)).collect();
        if active.is_empty() {
            return Err(StreamError::NoSalesChannelEnabled {
                application: key.application.clone(),
                substance: key.substance.clone(),
            }
            .into());
        }
        let kg_of = |s: SalesSubstream| match s {
            SalesSubstream::Manufacture => rec.streams.manufacture.value,
            SalesSubstream::Import => rec.streams.import.value,
            SalesSubstream::Export => rec.streams.export.value,
        };
        let total: Decimal = active.iter().map(|&s| kg_of(s)).sum();
        let hundred = Decimal::from(100);
        let mut out = (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        if total.is_zero() {
            let share = hundred / Decimal::from(active.len() as i64);
            for &s in &active {
                assign(&mut out, s, share);
            }
        } else {
            for &s in &active {
                assign(&mut out, s, kg_of(s) / total * hundred);
            }
        }
        Ok(out)
    }

    /// Low-level dispatch: converts `value` into the stream's base unit
    /// (splitting `sales` across enabled substreams, or using a substream's
    /// own initial charge when `value` is in equipment units) and stores it.
    /// Does not apply the recharge-on-top composition or recalc-pipeline
    /// dispatch — those are engine-level concerns.
    pub fn set_stream(&mut self, key: &UseKey, stream: &str, value: &EngineNumber) -> SimResult<()> {
        if stream == "sales" {
            return self.set_sales(key, value);
        }
        let name: StreamName = stream.parse().map_err(|_| StreamError::UnknownStream {
            application: key.application.clone(),
            substance: key.substance.clone(),
            stream: stream.to_string(),
        })?;
        if name.is_virtual() {
            return self.set_sales(key, value);
        }
        if let Some(substream) = as_sales_substream(name) {
            if value.is_equipment_units() {
                let charge = self.initial_charge(key, substream)?;
                let charge = match charge {
                    Some(c) if !c.value.is_zero() => c,
                    _ => {
                        return Err(StreamError::ZeroInitialCharge {
                            application: key.application.clone(),
                            substance: key.substance.clone(),
                            stream: stream.to_string(),
                        }
                        .into());
                    }
                };
                let kg = EngineNumber::new(value.value * charge.value, "kg");
                return self.write_checked(key, name, kg);
            }
        }
        let snapshot = self.context_snapshot(key)?;
        let getter = crate::state::OverridableStateGetter::new(&snapshot);
        let converted = units::convert(value, name.base_unit(), &getter)?;
        self.write_checked(key, name, converted)
    }

    fn set_sales(&mut self, key: &UseKey, value: &EngineNumber) -> SimResult<()> {
        let snapshot = self.context_snapshot(key)?;
        let getter = crate::state::OverridableStateGetter::new(&snapshot);
        let kg = units::convert(value, "kg", &getter)?;
        let (pm, pi, pe) = self.get_distribution(key, true)?;
        let hundred = Decimal::from(100);
        self.write_checked(key, StreamName::Manufacture, EngineNumber::new(kg.value * pm / hundred, "kg"))?;
        self.write_checked(key, StreamName::Import, EngineNumber::new(kg.value * pi / hundred, "kg"))?;
        self.write_checked(key, StreamName::Export, EngineNumber::new(kg.value * pe / hundred, "kg"))?;
        Ok(())
    }

    /// Adds `delta` (already in the stream's base unit) to the current
    /// value and stores the result, clamping at zero like any other write.
    /// Used by the recalc pipeline and by the engine's recharge-on-top
    /// composition.
    pub fn add_to_stream(&mut self, key: &UseKey, name: StreamName, delta: Decimal) -> SimResult<()> {
        let current = self.get_stream(key, name)?;
        self.write_checked(key, name, EngineNumber::new(current.value + delta, name.base_unit()))
    }

    pub fn set_raw(&mut self, key: &UseKey, name: StreamName, value: EngineNumber) -> SimResult<()> {
        self.write_checked(key, name, value)
    }

    fn write_checked(&mut self, key: &UseKey, name: StreamName, mut value: EngineNumber) -> SimResult<()> {
        if value.value.is_sign_negative() && !value.value.is_zero() {
            if CHECK_POSITIVE_STREAMS {
                return Err(StreamError::NegativeStreamValue {
                    application: key.application.clone(),
                    substance: key.substance.clone(),
                    stream: name.to_string(),
                    attempted: value.to_string(),
                }
                .into());
            }
            tracing::warn!(
                application = %key.application,
                substance = %key.substance,
                stream = %name,
                attempted = %value,
                "clamping negative stream write to zero"
            );
            value.value = Decimal::ZERO;
        }
        let enable = name.is_sales_substream() && !value.value.is_zero();
        let substream = as_sales_substream(name);
        let rec = self.record_mut(key)?;
        rec.streams.set(name, value);
        if enable {
            if let Some(s) = substream {
                rec.parameterization.enabled_streams.insert(s);
            }
        }
        Ok(())
    }

    /// Marks a substream as enabled without giving it a value, so
    /// `getDistribution` can allocate into it.
    pub fn enable_stream(&mut self, key: &UseKey, substream: SalesSubstream) -> SimResult<()> {
        self.record_mut(key)?.parameterization.enabled_streams.insert(substream);
        Ok(())
    }

    /// `incrementYear`: copies `equipment` into `priorEquipment` for every
    /// registered substance, then resets parameterization internals.
    pub fn increment_year(&mut self) {
        for rec in self.records.values_mut() {
            rec.streams.prior_equipment = rec.streams.equipment;
            rec.streams.new_equipment = EngineNumber::zero("units");
            rec.parameterization.reset_for_new_year();
        }
    }
}

fn as_sales_substream(name: StreamName) -> Option<SalesSubstream> {
    match name {
        StreamName::Manufacture => Some(SalesSubstream::Manufacture),
        StreamName::Import => Some(SalesSubstream::Import),
        StreamName::Export => Some(SalesSubstream::Export),
        _ => None,
    }
}

fn assign(out: &mut (Decimal, Decimal, Decimal), substream: SalesSubstream, share: Decimal) {
    match substream {
        SalesSubstream::Manufacture => out.0 = share,
        SalesSubstream::Import => out.1 = share,
        SalesSubstream::Export => out.2 = share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key() -> UseKey {
        UseKey::new("refrig", "HFC-134a")
    }

    #[test]
    fn ensure_substance_is_idempotent() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.ensure_substance(&key());
        assert!(keeper.has_substance(&key()));
    }

    #[test]
    fn unknown_substance_errors_on_access() {
        let keeper = StreamKeeper::new();
        assert!(keeper.get_stream(&key(), StreamName::Manufacture).is_err());
    }

    #[test]
    fn set_manufacture_in_kg_marks_it_enabled() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper
            .set_stream(&key(), "manufacture", &EngineNumber::new(dec!(1_000_000), "kg"))
            .unwrap();
        assert_eq!(keeper.get_stream(&key(), StreamName::Manufacture).unwrap().value, dec!(1_000_000));
        let dist = keeper.get_distribution(&key(), true).unwrap();
        assert_eq!(dist.0, dec!(100));
    }

    #[test]
    fn set_manufacture_in_mt_converts_to_kg() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.set_stream(&key(), "manufacture", &EngineNumber::new(dec!(1000), "mt")).unwrap();
        assert_eq!(keeper.get_stream(&key(), StreamName::Manufacture).unwrap().value, dec!(1_000_000));
    }

    #[test]
    fn set_manufacture_in_units_uses_initial_charge() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.parameterization_mut(&key()).unwrap().initial_charge_manufacture =
            EngineNumber::new(dec!(0.15), "kg / unit");
        keeper.set_stream(&key(), "manufacture", &EngineNumber::new(dec!(100), "units")).unwrap();
        assert_eq!(keeper.get_stream(&key(), StreamName::Manufacture).unwrap().value, dec!(15));
    }

    #[test]
    fn set_manufacture_in_units_without_charge_fails() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.parameterization_mut(&key()).unwrap().initial_charge_manufacture =
            EngineNumber::new(Decimal::ZERO, "kg / unit");
        assert!(keeper
            .set_stream(&key(), "manufacture", &EngineNumber::new(dec!(100), "units"))
            .is_err());
    }

    #[test]
    fn sales_with_no_enabled_channel_fails() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        assert!(keeper.set_stream(&key(), "sales", &EngineNumber::new(dec!(100), "kg")).is_err());
    }

    #[test]
    fn sales_splits_across_enabled_substreams_evenly_when_both_zero() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.enable_stream(&key(), SalesSubstream::Manufacture).unwrap();
        keeper.enable_stream(&key(), SalesSubstream::Import).unwrap();
        keeper.set_stream(&key(), "sales", &EngineNumber::new(dec!(1000), "kg")).unwrap();
        assert_eq!(keeper.get_stream(&key(), StreamName::Manufacture).unwrap().value, dec!(500));
        assert_eq!(keeper.get_stream(&key(), StreamName::Import).unwrap().value, dec!(500));
    }

    #[test]
    fn negative_write_clamps_to_zero() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.write_checked(&key(), StreamName::Manufacture, EngineNumber::new(dec!(-5), "kg")).unwrap();
        assert_eq!(keeper.get_stream(&key(), StreamName::Manufacture).unwrap().value, Decimal::ZERO);
    }

    #[test]
    fn increment_year_copies_equipment_to_prior() {
        let mut keeper = StreamKeeper::new();
        keeper.ensure_substance(&key());
        keeper.set_raw(&key(), StreamName::Equipment, EngineNumber::new(dec!(100), "units")).unwrap();
        keeper.increment_year();
        assert_eq!(keeper.get_stream(&key(), StreamName::PriorEquipment).unwrap().value, dec!(100));
    }
}
