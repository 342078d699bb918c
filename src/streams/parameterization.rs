//! Per-(application, substance) parameterization: intensities, initial
//! charges, rates, and the bookkeeping the engine needs to decide whether a
//! sales-stream `set` implicitly carries recharge volume along with it.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::number::EngineNumber;
use crate::streams::name::SalesSubstream;

/// Whether a sales-stream value was most recently specified in mass units or
/// equipment units. this replaces a hidden
/// "lastSpecifiedUnits" side channel: callers pass this explicitly on every
/// sales-stream `set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitsHint {
    Mass,
    Equipment,
}

impl Default for UnitsHint {
    fn default() -> Self {
        UnitsHint::Mass
    }
}

/// Rates and intensities the engine consults and the recalc pipeline
/// writes to. Defaults .
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamParameterization {
    pub ghg_intensity: EngineNumber,
    pub energy_intensity: EngineNumber,

    pub initial_charge_manufacture: EngineNumber,
    pub initial_charge_import: EngineNumber,
    pub initial_charge_export: Option<EngineNumber>,
    pub initial_charge_recycle: EngineNumber,

    /// Percent of fleet recharged per year.
    pub recharge_population: Decimal,
    /// Percent of retiring equipment's charge recovered for recycling.
    pub recovery_rate: Decimal,
    /// Percent of recovered material that survives reprocessing.
    pub yield_rate: Decimal,
    /// Percent of prior-year fleet retired per year.
    pub retirement_rate: Decimal,
    /// Percent of displaced/recycled mass actually redirected (vs. lost).
    pub displacement_rate: Decimal,
    /// kg of recharge material per unit recharged.
    pub recharge_intensity: EngineNumber,

    pub last_specified_units: UnitsHint,
    pub enabled_streams: BTreeSet<SalesSubstream>,
    pub sales_intent_freshly_set: bool,
    /// Companion kg added on top of an equipment-unit sales `set`, tracked so
    /// a later re-application (e.g. from `recharge`) can reconstruct intent.
    pub implicit_recharge: Option<EngineNumber>,
}

impl Default for StreamParameterization {
    fn default() -> Self {
        Self {
            ghg_intensity: EngineNumber::new(Decimal::ZERO, "tCO2e / kg"),
            energy_intensity: EngineNumber::new(Decimal::ZERO, "kwh / kg"),
            initial_charge_manufacture: EngineNumber::new(Decimal::ONE, "kg / unit"),
            initial_charge_import: EngineNumber::new(Decimal::ONE, "kg / unit"),
            initial_charge_export: None,
            initial_charge_recycle: EngineNumber::new(Decimal::ONE, "kg / unit"),
            recharge_population: Decimal::ZERO,
            recovery_rate: Decimal::ZERO,
            yield_rate: Decimal::ZERO,
            retirement_rate: Decimal::ZERO,
            displacement_rate: dec!(100),
            recharge_intensity: EngineNumber::new(Decimal::ZERO, "kg / unit"),
            last_specified_units: UnitsHint::default(),
            enabled_streams: BTreeSet::new(),
            sales_intent_freshly_set: false,
            implicit_recharge: None,
        }
    }
}

impl StreamParameterization {
    /// : intensities, initial charges, and rates reset to
    /// defaults on year increment (the caller — the default policy stanza —
    /// is expected to re-apply its configuration every year). Enabled
    /// streams and the last-specified-units hint are carried forward: they
    /// describe *which channel* the substance uses, not a per-year
    /// quantity, and the distribution/recalc machinery depends on them
    /// surviving a year with no operations at all.
    pub fn reset_for_new_year(&mut self) {
        let enabled = std::mem::take(&mut self.enabled_streams);
        let last_units = self.last_specified_units;
        *self = Self::default();
        self.enabled_streams = enabled;
        self.last_specified_units = last_units;
    }

    pub fn initial_charge_for(&self, substream: SalesSubstream) -> Option<EngineNumber> {
        match substream {
            SalesSubstream::Manufacture => Some(self.initial_charge_manufacture),
            SalesSubstream::Import => Some(self.initial_charge_import),
            SalesSubstream::Export => self.initial_charge_export,
        }
    }

    pub fn set_initial_charge_for(&mut self, substream: SalesSubstream, value: EngineNumber) {
        match substream {
            SalesSubstream::Manufacture => self.initial_charge_manufacture = value,
            SalesSubstream::Import => self.initial_charge_import = value,
            SalesSubstream::Export => self.initial_charge_export = Some(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let p = StreamParameterization::default();
        assert_eq!(p.ghg_intensity.value, Decimal::ZERO);
        assert_eq!(p.initial_charge_manufacture.value, Decimal::ONE);
        assert_eq!(p.displacement_rate, dec!(100));
    }

    #[test]
    fn reset_carries_forward_enabled_streams_and_units_hint() {
        let mut p = StreamParameterization::default();
        p.enabled_streams.insert(SalesSubstream::Manufacture);
        p.last_specified_units = UnitsHint::Equipment;
        p.retirement_rate = dec!(5);
        p.reset_for_new_year();
        assert!(p.enabled_streams.contains(&SalesSubstream::Manufacture));
        assert_eq!(p.last_specified_units, UnitsHint::Equipment);
        assert_eq!(p.retirement_rate, Decimal::ZERO);
    }
}
