//! Stream names and the base unit each is stored in.

use strum::{Display, EnumString};

/// A stream name known to the engine. `Sales` is virtual — it is never
/// stored directly; reads synthesize it from `manufacture + import +
/// recycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum StreamName {
    #[strum(serialize = "manufacture")]
    Manufacture,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "export")]
    Export,
    #[strum(serialize = "recycle")]
    Recycle,
    #[strum(serialize = "sales")]
    Sales,
    #[strum(serialize = "equipment")]
    Equipment,
    #[strum(serialize = "priorEquipment")]
    PriorEquipment,
    #[strum(serialize = "newEquipment")]
    NewEquipment,
    #[strum(serialize = "consumption")]
    Consumption,
    #[strum(serialize = "rechargeEmissions")]
    RechargeEmissions,
    #[strum(serialize = "eolEmissions")]
    EolEmissions,
    #[strum(serialize = "energy")]
    Energy,
}

impl StreamName {
    /// Base unit this stream is stored in, s stream
    /// table. `Sales` has no storage slot of its own.
    pub fn base_unit(self) -> &'static str {
        match self {
            StreamName::Manufacture
            | StreamName::Import
            | StreamName::Export
            | StreamName::Recycle
            | StreamName::Sales => "kg",
            StreamName::Equipment | StreamName::PriorEquipment | StreamName::NewEquipment => "units",
            StreamName::Consumption | StreamName::RechargeEmissions | StreamName::EolEmissions => {
                "tCO2e"
            }
            StreamName::Energy => "kwh",
        }
    }

    pub fn is_sales_substream(self) -> bool {
        matches!(self, StreamName::Manufacture | StreamName::Import | StreamName::Export)
    }

    pub fn is_virtual(self) -> bool {
        matches!(self, StreamName::Sales)
    }

    pub fn as_sales_substream(self) -> Option<SalesSubstream> {
        match self {
            StreamName::Manufacture => Some(SalesSubstream::Manufacture),
            StreamName::Import => Some(SalesSubstream::Import),
            StreamName::Export => Some(SalesSubstream::Export),
            _ => None,
        }
    }
}

/// One of the three substreams that can be individually enabled and that
/// `getDistribution` allocates a combined `sales` value across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
pub enum SalesSubstream {
    #[strum(serialize = "manufacture")]
    Manufacture,
    #[strum(serialize = "import")]
    Import,
    #[strum(serialize = "export")]
    Export,
}

impl SalesSubstream {
    pub fn as_stream_name(self) -> StreamName {
        match self {
            SalesSubstream::Manufacture => StreamName::Manufacture,
            SalesSubstream::Import => StreamName::Import,
            SalesSubstream::Export => StreamName::Export,
        }
    }

    pub const ALL: [SalesSubstream; 3] =
        [SalesSubstream::Manufacture, SalesSubstream::Import, SalesSubstream::Export];
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn base_units_match_spec_table() {
        assert_eq!(StreamName::Manufacture.base_unit(), "kg");
        assert_eq!(StreamName::Equipment.base_unit(), "units");
        assert_eq!(StreamName::Consumption.base_unit(), "tCO2e");
        assert_eq!(StreamName::Energy.base_unit(), "kwh");
    }

    #[test]
    fn round_trips_through_strum() {
        assert_eq!(StreamName::from_str("manufacture").unwrap(), StreamName::Manufacture);
        assert_eq!(StreamName::RechargeEmissions.to_string(), "rechargeEmissions");
    }
}
