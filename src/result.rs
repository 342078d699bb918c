//! Result rows and CSV serialization. One row per (scenario, trial, year,
//! application, substance), captured by reading streams straight out of the
//! keeper — the four consumption channels are derived here rather than
//! stored as separate stream slots.

use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SimResult;
use crate::number::EngineNumber;
use crate::scope::UseKey;
use crate::streams::{StreamKeeper, StreamName};

/// The kg/tCO2e attributable to the initial charge of newly imported or
/// exported equipment, plus import population, so a downstream consumer can
/// re-attribute trade consumption between importer and exporter. Absent an
/// explicit "new vs recharge" split for the import/export channels, the
/// entire import/export mass is treated as attributable to equipment
/// initial charge (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSupplement {
    pub import_initial_charge_value: EngineNumber,
    pub import_initial_charge_consumption: EngineNumber,
    pub import_population: EngineNumber,
    pub export_initial_charge_value: EngineNumber,
    pub export_initial_charge_consumption: EngineNumber,
}

/// One emitted row: a (scenario, trial, year, application, substance) and
/// its twelve measurements plus trade supplement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResult {
    pub scenario_name: String,
    pub trial_number: u32,
    pub year: i64,
    pub application: String,
    pub substance: String,

    pub manufacture: EngineNumber,
    pub import: EngineNumber,
    pub export: EngineNumber,
    pub recycle: EngineNumber,

    pub domestic_consumption: EngineNumber,
    pub import_consumption: EngineNumber,
    pub export_consumption: EngineNumber,
    pub recycle_consumption: EngineNumber,

    pub population: EngineNumber,
    pub population_new: EngineNumber,
    pub recharge_emissions: EngineNumber,
    pub eol_emissions: EngineNumber,
    pub energy_consumption: EngineNumber,

    pub trade_supplement: TradeSupplement,
}

impl EngineResult {
    /// Reads every stream for `key` out of `keeper` and derives the four
    /// consumption channels at
    /// capture time.
    pub fn capture(
        keeper: &StreamKeeper,
        key: &UseKey,
        scenario_name: &str,
        trial_number: u32,
        year: i64,
    ) -> SimResult<Self> {
        let manufacture = keeper.get_stream(key, StreamName::Manufacture)?;
        let import = keeper.get_stream(key, StreamName::Import)?;
        let export = keeper.get_stream(key, StreamName::Export)?;
        let recycle = keeper.get_stream(key, StreamName::Recycle)?;
        let population = keeper.get_stream(key, StreamName::Equipment)?;
        let population_new = keeper.get_stream(key, StreamName::NewEquipment)?;
        let recharge_emissions = keeper.get_stream(key, StreamName::RechargeEmissions)?;
        let eol_emissions = keeper.get_stream(key, StreamName::EolEmissions)?;
        let energy_consumption = keeper.get_stream(key, StreamName::Energy)?;

        let ghg_intensity = keeper.parameterization(key)?.ghg_intensity.value;
        let consumption_of = |mass: &EngineNumber| EngineNumber::new(mass.value * ghg_intensity, "tCO2e");

        let domestic_consumption = consumption_of(&manufacture);
        let import_consumption = consumption_of(&import);
        let export_consumption = consumption_of(&export);
        let recycle_consumption = consumption_of(&recycle);

        let import_charge = keeper.parameterization(key)?.initial_charge_import.value;
        let import_population = if import_charge.is_zero() {
            EngineNumber::zero("units")
        } else {
            EngineNumber::new(import.value / import_charge, "units")
        };

        let trade_supplement = TradeSupplement {
            import_initial_charge_value: import,
            import_initial_charge_consumption: import_consumption,
            import_population,
            export_initial_charge_value: export,
            export_initial_charge_consumption: export_consumption,
        };

        Ok(Self {
            scenario_name: scenario_name.to_string(),
            trial_number,
            year,
            application: key.application.clone(),
            substance: key.substance.clone(),
            manufacture,
            import,
            export,
            recycle,
            domestic_consumption,
            import_consumption,
            export_consumption,
            recycle_consumption,
            population,
            population_new,
            recharge_emissions,
            eol_emissions,
            energy_consumption,
            trade_supplement,
        })
    }

    /// CSV row values in the emitted column order. Export mass and
    /// `exportConsumption` are not part of that order — they're carried on
    /// the struct and in the trade supplement, but not emitted as
    /// raw CSV fields.
    pub fn csv_record(&self) -> [String; 20] {
        [
            self.scenario_name.clone(),
            self.trial_number.to_string(),
            self.year.to_string(),
            self.application.clone(),
            self.substance.clone(),
            self.manufacture.value.to_string(),
            self.import.value.to_string(),
            self.recycle.value.to_string(),
            self.domestic_consumption.value.to_string(),
            self.import_consumption.value.to_string(),
            self.recycle_consumption.value.to_string(),
            self.population.value.to_string(),
            self.population_new.value.to_string(),
            self.recharge_emissions.value.to_string(),
            self.eol_emissions.value.to_string(),
            self.energy_consumption.value.to_string(),
            self.trade_supplement.import_initial_charge_value.value.to_string(),
            self.trade_supplement.import_initial_charge_consumption.value.to_string(),
            self.trade_supplement.import_population.value.to_string(),
            self.trade_supplement.export_initial_charge_value.value.to_string(),
            self.trade_supplement.export_initial_charge_consumption.value.to_string(),
        ]
    }

    pub const CSV_HEADER: [&'static str; 20] = [
        "scenario",
        "trial",
        "year",
        "application",
        "substance",
        "manufacture",
        "import",
        "recycle",
        "domesticConsumption",
        "importConsumption",
        "recycleConsumption",
        "population",
        "populationNew",
        "rechargeEmissions",
        "eolEmissions",
        "energyConsumption",
        "importInitialChargeValue",
        "importInitialChargeConsumption",
        "importPopulation",
        "exportInitialChargeValue",
        "exportInitialChargeConsumption",
    ];
}

/// Writes `results` as CSV (header + one row per result) to `writer`, in
/// column order.
pub fn write_csv<W: std::io::Write>(writer: W, results: &[EngineResult]) -> SimResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(EngineResult::CSV_HEADER)
        .map_err(|e| crate::error::ParseError::Malformed(e.to_string()))?;
    for result in results {
        csv_writer
            .write_record(result.csv_record())
            .map_err(|e| crate::error::ParseError::Malformed(e.to_string()))?;
    }
    csv_writer
        .flush()
        .map_err(|e| crate::error::ParseError::Malformed(e.to_string()))?;
    Ok(())
}

/// A pure transform over a (importer, exporter) pair of rows for the *same*
/// scenario/trial/year: moves the exporter's initial-charge attribution out
/// of the importer's consumption/mass figures and onto the exporter's, per
/// . Returns `(importer', exporter')`. Fails if the rows
/// disagree on scenario/trial/year (unit-compatibility assertion).
pub fn attribute_to_exporter(
    importer: &EngineResult,
    exporter: &EngineResult,
) -> SimResult<(EngineResult, EngineResult)> {
    if importer.scenario_name != exporter.scenario_name
        || importer.trial_number != exporter.trial_number
        || importer.year != exporter.year
    {
        return Err(crate::error::ParseError::Malformed(format!(
            "cannot attribute trade between mismatched rows: {}/{}/{} vs {}/{}/{}",
            importer.scenario_name,
            importer.trial_number,
            importer.year,
            exporter.scenario_name,
            exporter.trial_number,
            exporter.year
        ))
        .into());
    }

    let mut importer = importer.clone();
    let supplement = importer.trade_supplement;
    importer.import = EngineNumber::new(
        (importer.import.value - supplement.import_initial_charge_value.value).max(Decimal::ZERO),
        importer.import.units_str(),
    );
    importer.import_consumption = EngineNumber::new(
        (importer.import_consumption.value - supplement.import_initial_charge_consumption.value)
            .max(Decimal::ZERO),
        importer.import_consumption.units_str(),
    );

    let mut exporter = exporter.clone();
    exporter.export = EngineNumber::new(
        exporter.export.value + supplement.export_initial_charge_value.value,
        exporter.export.units_str(),
    );
    exporter.export_consumption = EngineNumber::new(
        exporter.export_consumption.value + supplement.export_initial_charge_consumption.value,
        exporter.export_consumption.units_str(),
    );

    Ok((importer, exporter))
}

/// Applies [`attribute_to_exporter`] across an entire result set: groups rows
/// by (scenario, trial, year, application) — the axes trade partners must
/// agree on — and, within each group with exactly one net importer (nonzero
/// `import`) and one net exporter (nonzero `export`), re-attributes that
/// pair. Groups with zero or more than one of either side are ambiguous
/// about which substance trades with which and pass through unchanged.
///
/// This is the batch counterpart alludes to ("so
/// downstream consumers can re-attribute trade consumption between importer
/// and exporter") when a caller has a full result set rather than one
/// hand-picked pair.
pub fn attribute_all_trades(results: &[EngineResult]) -> SimResult<Vec<EngineResult>> {
    let groups = results
        .iter()
        .into_group_map_by(|r| (r.scenario_name.clone(), r.trial_number, r.year, r.application.clone()));

    let mut out: Vec<EngineResult> = Vec::with_capacity(results.len());
    for (_key, rows) in groups {
        let importers: Vec<&EngineResult> = rows.iter().filter(|r| !r.import.value.is_zero()).copied().collect();
        let exporters: Vec<&EngineResult> = rows.iter().filter(|r| !r.export.value.is_zero()).copied().collect();

        if importers.len() == 1 && exporters.len() == 1 {
            let (attributed_importer, attributed_exporter) = attribute_to_exporter(importers[0], exporters[0])?;
            let importer_substance = importers[0].substance.clone();
            let exporter_substance = exporters[0].substance.clone();
            for row in &rows {
                if row.substance == importer_substance {
                    out.push(attributed_importer.clone());
                } else if row.substance == exporter_substance {
                    out.push(attributed_exporter.clone());
                } else {
                    out.push((*row).clone());
                }
            }
        } else {
            out.extend(rows.into_iter().cloned());
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn keeper_with_substance() -> (StreamKeeper, UseKey) {
        let mut keeper = StreamKeeper::new();
        let key = UseKey::new("refrig", "HFC-134a");
        keeper.ensure_substance(&key);
        keeper.parameterization_mut(&key).unwrap().ghg_intensity = EngineNumber::new(dec!(1430), "tCO2e / kg");
        keeper.parameterization_mut(&key).unwrap().initial_charge_import =
            EngineNumber::new(dec!(0.15), "kg / unit");
        keeper.set_raw(&key, StreamName::Manufacture, EngineNumber::new(dec!(1_000_000), "kg")).unwrap();
        keeper.set_raw(&key, StreamName::Import, EngineNumber::new(dec!(100_000), "kg")).unwrap();
        (keeper, key)
    }

    #[test]
    fn capture_derives_consumption_channels_from_ghg_intensity() {
        let (keeper, key) = keeper_with_substance();
        let result = EngineResult::capture(&keeper, &key, "BAU", 1, 2025).unwrap();
        assert_eq!(result.domestic_consumption.value, dec!(1_000_000) * dec!(1430));
        assert_eq!(result.import_consumption.value, dec!(100_000) * dec!(1430));
    }

    #[test]
    fn csv_record_has_twenty_columns_in_header_order() {
        let (keeper, key) = keeper_with_substance();
        let result = EngineResult::capture(&keeper, &key, "BAU", 1, 2025).unwrap();
        let record = result.csv_record();
        assert_eq!(record.len(), EngineResult::CSV_HEADER.len());
        assert_eq!(record[0], "BAU");
        assert_eq!(record[5], "1000000");
    }

    #[test]
    fn attribute_to_exporter_moves_mass_and_consumption() {
        let (keeper, key) = keeper_with_substance();
        let importer = EngineResult::capture(&keeper, &key, "BAU", 1, 2025).unwrap();
        let mut exporter = importer.clone();
        exporter.substance = "R-32".to_string();
        exporter.export = EngineNumber::zero("kg");
        exporter.export_consumption = EngineNumber::zero("tCO2e");

        let (importer2, exporter2) = attribute_to_exporter(&importer, &exporter).unwrap();
        assert_eq!(importer2.import.value, Decimal::ZERO);
        assert_eq!(exporter2.export.value, importer.import.value);
    }

    #[test]
    fn attribute_all_trades_pairs_unique_importer_and_exporter_per_group() {
        let (keeper, key) = keeper_with_substance();
        let importer = EngineResult::capture(&keeper, &key, "BAU", 1, 2025).unwrap();
        let mut exporter = importer.clone();
        exporter.substance = "R-32".to_string();
        exporter.export = EngineNumber::zero("kg");
        exporter.export_consumption = EngineNumber::zero("tCO2e");

        let attributed = attribute_all_trades(&[importer.clone(), exporter.clone()]).unwrap();
        let attributed_importer = attributed.iter().find(|r| r.substance == importer.substance).unwrap();
        let attributed_exporter = attributed.iter().find(|r| r.substance == exporter.substance).unwrap();
        assert_eq!(attributed_importer.import.value, Decimal::ZERO);
        assert_eq!(attributed_exporter.export.value, importer.import.value);
    }

    #[test]
    fn attribute_all_trades_passes_through_ambiguous_groups() {
        let (keeper, key) = keeper_with_substance();
        let a = EngineResult::capture(&keeper, &key, "BAU", 1, 2025).unwrap();
        let mut b = a.clone();
        b.substance = "R-32".to_string();
        let mut c = a.clone();
        c.substance = "R-404a".to_string();

        let attributed = attribute_all_trades(&[a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(attributed.len(), 3);
        assert!(attributed.iter().any(|r| r.substance == a.substance && r.import.value == a.import.value));
    }

    #[test]
    fn attribute_to_exporter_rejects_mismatched_year() {
        let (keeper, key) = keeper_with_substance();
        let importer = EngineResult::capture(&keeper, &key, "BAU", 1, 2025).unwrap();
        let mut exporter = importer.clone();
        exporter.year = 2026;
        assert!(attribute_to_exporter(&importer, &exporter).is_err());
    }
}
