//! Unit converter: turns any [`EngineNumber`] into an equivalent value in a
//! target unit string, consulting an [`OverridableStateGetter`] whenever the
//! conversion crosses a physical dimension.

use rust_decimal::Decimal;

use crate::error::{SimResult, UnitError};
use crate::number::EngineNumber;
use crate::state::{ContextScalar, OverridableStateGetter};

/// A physical dimension a unit string can denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DimKind {
    Mass,
    Equipment,
    Ghg,
    Energy,
    Percent,
    Year,
    YearAbsolute,
}

#[derive(Debug, Clone, Copy)]
struct Atom {
    kind: DimKind,
    /// Scale of this unit relative to the dimension's canonical unit
    /// (kg for Mass, unit for Equipment, ...). E.g. `mt` has scale 1000.
    scale: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct UnitSpec {
    numerator: Atom,
    denominator: Option<Atom>,
}

fn parse_atom(token: &str) -> SimResult<Atom> {
    let kind_scale = match token {
        "kg" => (DimKind::Mass, Decimal::ONE),
        "mt" => (DimKind::Mass, Decimal::from(1000)),
        "unit" | "units" => (DimKind::Equipment, Decimal::ONE),
        "tCO2e" => (DimKind::Ghg, Decimal::ONE),
        "kwh" => (DimKind::Energy, Decimal::ONE),
        "%" | "percent" => (DimKind::Percent, Decimal::ONE),
        "years" | "year" => (DimKind::Year, Decimal::ONE),
        "yearAbsolute" => (DimKind::YearAbsolute, Decimal::ONE),
        other => {
            return Err(UnitError::BadUnits {
                units: other.to_string(),
                reason: "unrecognized unit token".to_string(),
            }
            .into());
        }
    };
    Ok(Atom { kind: kind_scale.0, scale: kind_scale.1 })
}

fn parse_unit(units: &str) -> SimResult<UnitSpec> {
    if let Some((num, den)) = units.split_once('/') {
        Ok(UnitSpec {
            numerator: parse_atom(num.trim())?,
            denominator: Some(parse_atom(den.trim())?),
        })
    } else {
        Ok(UnitSpec { numerator: parse_atom(units.trim())?, denominator: None })
    }
}

fn checked_div(units: &str, n: Decimal, d: Decimal) -> SimResult<Decimal> {
    n.checked_div(d).ok_or_else(|| {
        UnitError::BadUnits { units: units.to_string(), reason: "division by zero".to_string() }.into()
    })
}

/// Converts `value` into `target_units`, consulting `state` for any
/// cross-dimension context the conversion needs.
pub fn convert(
    value: &EngineNumber,
    target_units: &str,
    state: &OverridableStateGetter,
) -> SimResult<EngineNumber> {
    if value.units_str() == target_units {
        return Ok(*value);
    }

    let src = parse_unit(value.units_str())?;
    let tgt = parse_unit(target_units)?;

    let src_den_kind = src.denominator.map(|a| a.kind);
    let tgt_den_kind = tgt.denominator.map(|a| a.kind);

    if src.numerator.kind == tgt.numerator.kind && src_den_kind == tgt_den_kind {
        return same_dimension(value, &src, &tgt, target_units);
    }

    if src.denominator.is_some() || tgt.denominator.is_some() {
        return Err(UnitError::UnitMismatch {
            lhs: value.units_str().to_string(),
            rhs: target_units.to_string(),
        }
        .into());
    }

    cross_dimension(value, &src.numerator, &tgt.numerator, target_units, state)
}

/// Same physical dimension on both sides (and, for ratios, the same
/// denominator dimension too): pure rescaling, no context needed.
fn same_dimension(
    value: &EngineNumber,
    src: &UnitSpec,
    tgt: &UnitSpec,
    target_units: &str,
) -> SimResult<EngineNumber> {
    let mut v = value.value * src.numerator.scale;
    if let Some(den) = src.denominator {
        v = checked_div(value.units_str(), v, den.scale)?;
    }
    if let Some(den) = tgt.denominator {
        v *= den.scale;
    }
    v = checked_div(target_units, v, tgt.numerator.scale)?;
    Ok(EngineNumber::new(v, target_units))
}

/// Crosses a physical dimension using context pulled from `state`.
fn cross_dimension(
    value: &EngineNumber,
    src: &Atom,
    tgt: &Atom,
    target_units: &str,
    state: &OverridableStateGetter,
) -> SimResult<EngineNumber> {
    use DimKind::*;

    // "years"/"year"/"yearAbsolute" behave as synthesized constants: asking
    // to convert anything into them yields the simulation's current years
    // elapsed / absolute year, independent of the source magnitude.
    if tgt.kind == Year {
        let years = state.require(ContextScalar::YearsElapsed, value.units_str(), target_units)?;
        return Ok(EngineNumber::new(checked_div(target_units, years.value, tgt.scale)?, target_units));
    }
    if tgt.kind == YearAbsolute {
        let year = state.require(ContextScalar::YearAbsolute, value.units_str(), target_units)?;
        return Ok(EngineNumber::new(checked_div(target_units, year.value, tgt.scale)?, target_units));
    }
    if src.kind == Year || src.kind == YearAbsolute {
        return Err(UnitError::BadUnits {
            units: value.units_str().to_string(),
            reason: "a years/yearAbsolute value can only be read, not converted out of".to_string(),
        }
        .into());
    }

    let src_canonical = value.value * src.scale;

    let canonical_result = match (src.kind, tgt.kind) {
        (Mass, Equipment) => {
            let kg_per_unit =
                state.require(ContextScalar::AmortizedUnitVolume, "kg", "unit")?.value;
            checked_div("unit", src_canonical, kg_per_unit)?
        }
        (Equipment, Mass) => {
            let kg_per_unit =
                state.require(ContextScalar::AmortizedUnitVolume, "unit", "kg")?.value;
            src_canonical * kg_per_unit
        }
        (Mass, Ghg) => {
            let intensity = state.require(ContextScalar::GhgIntensity, "kg", "tCO2e")?.value;
            src_canonical * intensity
        }
        (Ghg, Mass) => {
            let intensity = state.require(ContextScalar::GhgIntensity, "tCO2e", "kg")?.value;
            checked_div("kg", src_canonical, intensity)?
        }
        (Mass, Energy) => {
            let intensity = state.require(ContextScalar::EnergyIntensity, "kg", "kwh")?.value;
            src_canonical * intensity
        }
        (Energy, Mass) => {
            let intensity = state.require(ContextScalar::EnergyIntensity, "kwh", "kg")?.value;
            checked_div("kg", src_canonical, intensity)?
        }
        (Equipment, Percent) => {
            let population = state.require(ContextScalar::Population, "unit", "%")?.value;
            checked_div("%", src_canonical, population)? * Decimal::from(100)
        }
        (Percent, Equipment) => {
            let population = state.require(ContextScalar::Population, "%", "unit")?.value;
            checked_div("unit", src_canonical, Decimal::from(100))? * population
        }
        (Mass, Percent) => {
            let basis = mass_percent_basis(state, "kg", "%")?;
            checked_div("%", src_canonical, basis)? * Decimal::from(100)
        }
        (Percent, Mass) => {
            let basis = mass_percent_basis(state, "%", "kg")?;
            checked_div("kg", src_canonical, Decimal::from(100))? * basis
        }
        _ => {
            return Err(UnitError::BadUnits {
                units: value.units_str().to_string(),
                reason: format!("no conversion path to '{target_units}'"),
            }
            .into());
        }
    };

    Ok(EngineNumber::new(checked_div(target_units, canonical_result, tgt.scale)?, target_units))
}

/// `kg ↔ %` uses volume as the 100% basis if present, else consumption.
fn mass_percent_basis(state: &OverridableStateGetter, from: &str, to: &str) -> SimResult<Decimal> {
    if let Some(v) = state.resolve(ContextScalar::Volume) {
        return Ok(v.value);
    }
    Ok(state.require(ContextScalar::Consumption, from, to)?.value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateSnapshot;
    use rust_decimal_macros::dec;

    #[test]
    fn identity_conversion_is_a_no_op() {
        let state = StateSnapshot::default();
        let getter = OverridableStateGetter::new(&state);
        let v = EngineNumber::new(dec!(5), "kg");
        assert_eq!(convert(&v, "kg", &getter).unwrap().value, dec!(5));
    }

    #[test]
    fn kg_to_mt_rescales() {
        let state = StateSnapshot::default();
        let getter = OverridableStateGetter::new(&state);
        let v = EngineNumber::new(dec!(1000), "kg");
        assert_eq!(convert(&v, "mt", &getter).unwrap().value, dec!(1));
    }

    #[test]
    fn kg_to_units_uses_amortized_unit_volume() {
        let state = StateSnapshot {
            amortized_unit_volume: Some(EngineNumber::new(dec!(0.15), "kg / unit")),
            ..Default::default()
        };
        let getter = OverridableStateGetter::new(&state);
        let v = EngineNumber::new(dec!(1_000_000), "kg");
        let out = convert(&v, "units", &getter).unwrap();
        assert_eq!(out.value, dec!(1_000_000) / dec!(0.15));
    }

    #[test]
    fn kg_to_tco2e_uses_ghg_intensity() {
        let state = StateSnapshot {
            ghg_intensity: Some(EngineNumber::new(dec!(1430), "tCO2e / kg")),
            ..Default::default()
        };
        let getter = OverridableStateGetter::new(&state);
        let v = EngineNumber::new(dec!(1_000_000), "kg");
        let out = convert(&v, "tCO2e", &getter).unwrap();
        assert_eq!(out.value, dec!(1_430_000_000));
    }

    #[test]
    fn missing_context_is_an_error() {
        let state = StateSnapshot::default();
        let getter = OverridableStateGetter::new(&state);
        let v = EngineNumber::new(dec!(1), "kg");
        assert!(convert(&v, "tCO2e", &getter).is_err());
    }

    /// Round-trip law from property 6.
    #[test]
    fn round_trip_through_units_and_back_to_kg() {
        let state = StateSnapshot {
            amortized_unit_volume: Some(EngineNumber::new(dec!(0.15), "kg / unit")),
            ..Default::default()
        };
        let getter = OverridableStateGetter::new(&state);
        let original = EngineNumber::new(dec!(1_000_000), "kg");
        let as_units = convert(&original, "units", &getter).unwrap();
        let back = convert(&as_units, "kg", &getter).unwrap();
        assert_eq!(back.value, original.value);
    }
}
