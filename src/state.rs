//! Overridable state getter: the scalars a unit conversion may need
//! (population, volume, consumption, amortized unit volume, GHG/energy
//! intensity, years elapsed, absolute year), with a short-lived overlay an
//! operation can use to supply call-specific values.
//!
//! design notes, this replaces a duck-typed overlay with
//! a plain record of `Option<EngineNumber>` fields layered over a base
//! snapshot; the converter reads the overlay first, then the base.

use crate::error::{SimResult, UnitError};
use crate::number::EngineNumber;

/// One scalar a conversion might need context for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextScalar {
    Population,
    Volume,
    Consumption,
    AmortizedUnitVolume,
    GhgIntensity,
    EnergyIntensity,
    YearsElapsed,
    YearAbsolute,
}

impl ContextScalar {
    fn label(self) -> &'static str {
        match self {
            ContextScalar::Population => "population",
            ContextScalar::Volume => "volume",
            ContextScalar::Consumption => "consumption",
            ContextScalar::AmortizedUnitVolume => "amortized unit volume",
            ContextScalar::GhgIntensity => "GHG intensity",
            ContextScalar::EnergyIntensity => "energy intensity",
            ContextScalar::YearsElapsed => "years elapsed",
            ContextScalar::YearAbsolute => "absolute year",
        }
    }
}

/// A base snapshot of "current context" scalars, consulted by the unit
/// converter whenever no override is present. Absent fields mean the
/// scalar is not known in the current scope (e.g. no recharge intensity
/// has been set for this substance yet).
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    pub population: Option<EngineNumber>,
    pub volume: Option<EngineNumber>,
    pub consumption: Option<EngineNumber>,
    pub amortized_unit_volume: Option<EngineNumber>,
    pub ghg_intensity: Option<EngineNumber>,
    pub energy_intensity: Option<EngineNumber>,
    pub years_elapsed: Option<EngineNumber>,
    pub year_absolute: Option<EngineNumber>,
}

impl StateSnapshot {
    fn get(&self, scalar: ContextScalar) -> Option<&EngineNumber> {
        match scalar {
            ContextScalar::Population => self.population.as_ref(),
            ContextScalar::Volume => self.volume.as_ref(),
            ContextScalar::Consumption => self.consumption.as_ref(),
            ContextScalar::AmortizedUnitVolume => self.amortized_unit_volume.as_ref(),
            ContextScalar::GhgIntensity => self.ghg_intensity.as_ref(),
            ContextScalar::EnergyIntensity => self.energy_intensity.as_ref(),
            ContextScalar::YearsElapsed => self.years_elapsed.as_ref(),
            ContextScalar::YearAbsolute => self.year_absolute.as_ref(),
        }
    }
}

/// A base snapshot with a per-call overlay layered on top. Built fresh for
/// each unit conversion and dropped at the end of the call — it is never
/// stored on the engine.
#[derive(Debug, Clone)]
pub struct OverridableStateGetter<'a> {
    base: &'a StateSnapshot,
    overlay: StateSnapshot,
}

impl<'a> OverridableStateGetter<'a> {
    pub fn new(base: &'a StateSnapshot) -> Self {
        Self { base, overlay: StateSnapshot::default() }
    }

    pub fn with_population(mut self, value: EngineNumber) -> Self {
        self.overlay.population = Some(value);
        self
    }

    pub fn with_volume(mut self, value: EngineNumber) -> Self {
        self.overlay.volume = Some(value);
        self
    }

    pub fn with_consumption(mut self, value: EngineNumber) -> Self {
        self.overlay.consumption = Some(value);
        self
    }

    pub fn with_amortized_unit_volume(mut self, value: EngineNumber) -> Self {
        self.overlay.amortized_unit_volume = Some(value);
        self
    }

    pub fn with_ghg_intensity(mut self, value: EngineNumber) -> Self {
        self.overlay.ghg_intensity = Some(value);
        self
    }

    pub fn with_energy_intensity(mut self, value: EngineNumber) -> Self {
        self.overlay.energy_intensity = Some(value);
        self
    }

    pub fn with_years_elapsed(mut self, value: EngineNumber) -> Self {
        self.overlay.years_elapsed = Some(value);
        self
    }

    pub fn with_year_absolute(mut self, value: EngineNumber) -> Self {
        self.overlay.year_absolute = Some(value);
        self
    }

    /// Resolves `scalar`, preferring the overlay over the base snapshot.
    pub fn resolve(&self, scalar: ContextScalar) -> Option<&EngineNumber> {
        self.overlay.get(scalar).or_else(|| self.base.get(scalar))
    }

    /// Like [`Self::resolve`] but fails with `MissingConversionContext` when
    /// neither overlay nor base has the scalar, naming `from`/`to` for the
    /// error.
    pub fn require(&self, scalar: ContextScalar, from: &str, to: &str) -> SimResult<&EngineNumber> {
        self.resolve(scalar).ok_or_else(|| {
            UnitError::MissingConversionContext {
                from: from.to_string(),
                to: to.to_string(),
                needed: scalar.label().to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn overlay_shadows_base() {
        let base = StateSnapshot {
            population: Some(EngineNumber::new(dec!(10), "units")),
            ..Default::default()
        };
        let getter =
            OverridableStateGetter::new(&base).with_population(EngineNumber::new(dec!(99), "units"));
        assert_eq!(
            getter.resolve(ContextScalar::Population).unwrap().value,
            dec!(99)
        );
    }

    #[test]
    fn falls_back_to_base_when_not_overridden() {
        let base = StateSnapshot {
            volume: Some(EngineNumber::new(dec!(5), "kg")),
            ..Default::default()
        };
        let getter = OverridableStateGetter::new(&base);
        assert_eq!(getter.resolve(ContextScalar::Volume).unwrap().value, dec!(5));
    }

    #[test]
    fn missing_scalar_is_an_error() {
        let base = StateSnapshot::default();
        let getter = OverridableStateGetter::new(&base);
        let err = getter.require(ContextScalar::GhgIntensity, "kg", "tCO2e");
        assert!(err.is_err());
    }
}
