//! Raw per-(application, substance) stream storage: one `EngineNumber` slot
//! per stream name, each always held in that stream's base unit.

use serde::{Deserialize, Serialize};

use crate::number::EngineNumber;
use crate::streams::name::StreamName;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Streams {
    pub manufacture: EngineNumber,
    pub import: EngineNumber,
    pub export: EngineNumber,
    pub recycle: EngineNumber,
    pub equipment: EngineNumber,
    pub prior_equipment: EngineNumber,
    pub new_equipment: EngineNumber,
    pub consumption: EngineNumber,
    pub recharge_emissions: EngineNumber,
    pub eol_emissions: EngineNumber,
    pub energy: EngineNumber,
}

impl Default for Streams {
    fn default() -> Self {
        Self {
            manufacture: EngineNumber::zero("kg"),
            import: EngineNumber::zero("kg"),
            export: EngineNumber::zero("kg"),
            recycle: EngineNumber::zero("kg"),
            equipment: EngineNumber::zero("units"),
            prior_equipment: EngineNumber::zero("units"),
            new_equipment: EngineNumber::zero("units"),
            consumption: EngineNumber::zero("tCO2e"),
            recharge_emissions: EngineNumber::zero("tCO2e"),
            eol_emissions: EngineNumber::zero("tCO2e"),
            energy: EngineNumber::zero("kwh"),
        }
    }
}

impl Streams {
    /// `sales` is virtual: `manufacture + import + recycle` (always in kg,
    /// so a plain `Decimal` add is safe — no unit conversion needed).
    pub fn sales(&self) -> EngineNumber {
        EngineNumber::new(
            self.manufacture.value + self.import.value + self.recycle.value,
            "kg",
        )
    }

    pub fn get(&self, name: StreamName) -> EngineNumber {
        match name {
            StreamName::Manufacture => self.manufacture,
            StreamName::Import => self.import,
            StreamName::Export => self.export,
            StreamName::Recycle => self.recycle,
            StreamName::Sales => self.sales(),
            StreamName::Equipment => self.equipment,
            StreamName::PriorEquipment => self.prior_equipment,
            StreamName::NewEquipment => self.new_equipment,
            StreamName::Consumption => self.consumption,
            StreamName::RechargeEmissions => self.recharge_emissions,
            StreamName::EolEmissions => self.eol_emissions,
            StreamName::Energy => self.energy,
        }
    }

    /// Writes `value` (already validated as non-negative, non-NaN, and in
    /// the stream's base unit) to its slot. Panics on `Sales`, which has no
    /// slot — callers must split it into substreams first.
    pub fn set(&mut self, name: StreamName, value: EngineNumber) {
        match name {
            StreamName::Manufacture => self.manufacture = value,
            StreamName::Import => self.import = value,
            StreamName::Export => self.export = value,
            StreamName::Recycle => self.recycle = value,
            StreamName::Sales => unreachable!("sales is virtual and has no storage slot"),
            StreamName::Equipment => self.equipment = value,
            StreamName::PriorEquipment => self.prior_equipment = value,
            StreamName::NewEquipment => self.new_equipment = value,
            StreamName::Consumption => self.consumption = value,
            StreamName::RechargeEmissions => self.recharge_emissions = value,
            StreamName::EolEmissions => self.eol_emissions = value,
            StreamName::Energy => self.energy = value,
        }
    }

}
