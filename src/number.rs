use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An immutable `(magnitude, unit-string)` pair.
///
/// `Decimal` gives us ~28-29 significant digits, short of the 34 significant
/// digits needed to distinguish individual kilograms within a
/// multi-million-unit population. No crate in the ecosystem offers a
/// drop-in IEEE `decimal128`; `rust_decimal` is the closest idiomatic match
/// for exact decimal arithmetic, and the precision gap is accepted and
/// documented here rather than hand-rolled. See DESIGN.md for the tradeoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineNumber {
    pub value: Decimal,
    pub units: UnitString,
}

/// Interned-free unit string. Kept as a small owned string rather than an enum
/// because the unit grammar is open-ended (`kg`, `mt`, `unit`, `units`,
/// `tCO2e`, `tCO2e / kg`, `kg / unit`, `%`, `years`, ...) and is produced by
/// the external DSL layer; the converter (`crate::units`) is what gives these
/// strings meaning. Inline capacity of 16 covers every unit string this
/// crate produces (`tCO2e / kg` is 11 bytes) without heap-allocating.
pub type UnitString = smallvec::SmallVec<[u8; 16]>;

impl EngineNumber {
    pub fn new(value: Decimal, units: impl Into<String>) -> Self {
        Self {
            value,
            units: UnitString::from_slice(units.into().as_bytes()),
        }
    }

    pub fn units_str(&self) -> &str {
        std::str::from_utf8(&self.units).expect("unit strings are always constructed from &str")
    }

    pub fn zero(units: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, units)
    }

    /// A stream is an "equipment" stream if its unit string begins with
    /// `unit` (covers both `unit` and `units`).
    pub fn is_equipment_units(&self) -> bool {
        self.units_str().starts_with("unit")
    }

    pub fn is_percent(&self) -> bool {
        let u = self.units_str();
        u == "%" || u == "percent"
    }

    pub fn with_value(&self, value: Decimal) -> Self {
        Self {
            value,
            units: self.units.clone(),
        }
    }
}

impl fmt::Display for EngineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.units_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn equipment_predicate_matches_singular_and_plural() {
        assert!(EngineNumber::new(dec!(1), "unit").is_equipment_units());
        assert!(EngineNumber::new(dec!(1), "units").is_equipment_units());
        assert!(!EngineNumber::new(dec!(1), "kg").is_equipment_units());
    }

    #[test]
    fn percent_predicate() {
        assert!(EngineNumber::new(dec!(5), "%").is_percent());
        assert!(!EngineNumber::new(dec!(5), "kg").is_percent());
    }

    #[test]
    fn display_renders_value_and_units() {
        let n = EngineNumber::new(dec!(12.5), "kg");
        assert_eq!(n.to_string(), "12.5 kg");
    }
}
