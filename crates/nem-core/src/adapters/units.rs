use crate::error::{NemError, Result};
use crate::types::Record;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Group label for DUIDs absent from the registry.
pub const UNKNOWN_GROUP: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Fuel {
    Coal,
    Gas,
    Liquid,
    Hydro,
    Wind,
    Solar,
    Biomass,
    Battery,
    Other,
}

impl Fuel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Fuel::Coal => "Coal",
            Fuel::Gas => "Gas",
            Fuel::Liquid => "Liquid",
            Fuel::Hydro => "Hydro",
            Fuel::Wind => "Wind",
            Fuel::Solar => "Solar",
            Fuel::Biomass => "Biomass",
            Fuel::Battery => "Battery",
            Fuel::Other => "Other",
        }
    }

    pub fn is_renewable(&self) -> bool {
        matches!(self, Fuel::Hydro | Fuel::Wind | Fuel::Solar | Fuel::Biomass)
    }

    /// Storage neither generates nor consumes on net; it is left out of
    /// penetration totals.
    pub fn is_storage(&self) -> bool {
        matches!(self, Fuel::Battery)
    }
}

impl fmt::Display for Fuel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fuel {
    type Err = NemError;

    /// Lenient: AEMO fuel descriptions vary, so anything unrecognised is
    /// `Other` rather than an error.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let fuel = if lower.contains("coal") {
            Fuel::Coal
        } else if lower.contains("gas") || lower.contains("ocgt") || lower.contains("ccgt") {
            Fuel::Gas
        } else if lower.contains("diesel") || lower.contains("liquid") || lower.contains("oil") {
            Fuel::Liquid
        } else if lower.contains("hydro") || lower == "water" {
            Fuel::Hydro
        } else if lower.contains("wind") {
            Fuel::Wind
        } else if lower.contains("solar") {
            Fuel::Solar
        } else if lower.contains("bio") || lower.contains("bagasse") {
            Fuel::Biomass
        } else if lower.contains("battery") || lower.contains("storage") {
            Fuel::Battery
        } else {
            Fuel::Other
        };
        Ok(fuel)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub fuel: Fuel,
    pub region: String,
}

#[derive(Debug, Deserialize)]
struct UnitRow {
    #[serde(alias = "duid", alias = "Duid")]
    #[serde(rename = "DUID")]
    duid: String,
    #[serde(alias = "fuel", alias = "Fuel", alias = "FUEL_TYPE", alias = "Fuel Source")]
    #[serde(rename = "FUEL")]
    fuel: String,
    #[serde(alias = "region", alias = "Region", alias = "REGIONID")]
    #[serde(rename = "REGION")]
    region: String,
}

/// DUID metadata used to group generation by fuel or region.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: HashMap<String, UnitInfo>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `DUID,FUEL,REGION` rows from a CSV file.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut registry = Self::new();
        for row in reader.deserialize::<UnitRow>() {
            let row = row?;
            if row.duid.is_empty() {
                continue;
            }
            registry.insert(row.duid, row.fuel.parse()?, row.region);
        }
        log::info!("loaded {} units from {}", registry.len(), path.display());
        Ok(registry)
    }

    pub fn insert(&mut self, duid: impl Into<String>, fuel: Fuel, region: impl Into<String>) {
        self.units.insert(
            duid.into(),
            UnitInfo {
                fuel,
                region: region.into(),
            },
        );
    }

    pub fn get(&self, duid: &str) -> Option<&UnitInfo> {
        self.units.get(duid)
    }

    pub fn fuel_label(&self, duid: &str) -> &str {
        self.get(duid).map(|u| u.fuel.as_str()).unwrap_or(UNKNOWN_GROUP)
    }

    pub fn region_label(&self, duid: &str) -> &str {
        self.get(duid).map(|u| u.region.as_str()).unwrap_or(UNKNOWN_GROUP)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Renewable share of generation at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PenetrationPoint {
    pub timestamp: NaiveDateTime,
    pub renewable_mw: f64,
    pub total_mw: f64,
    /// `renewable_mw / total_mw`, or `None` when nothing was generating.
    pub share: Option<f64>,
}

/// Per-timestamp renewable share from fuel-grouped records (entity is a
/// fuel label). Negative values and storage are ignored; unknown fuels
/// count towards the total only.
pub fn renewable_penetration(records: &[Record]) -> Vec<PenetrationPoint> {
    let mut by_ts: BTreeMap<NaiveDateTime, (f64, f64)> = BTreeMap::new();
    for record in records {
        if record.value <= 0.0 {
            continue;
        }
        let fuel = match record.entity.parse::<Fuel>() {
            Ok(f) if record.entity != UNKNOWN_GROUP => Some(f),
            _ => None,
        };
        if fuel.is_some_and(|f| f.is_storage()) {
            continue;
        }
        let slot = by_ts.entry(record.timestamp).or_insert((0.0, 0.0));
        if fuel.is_some_and(|f| f.is_renewable()) {
            slot.0 += record.value;
        }
        slot.1 += record.value;
    }

    by_ts
        .into_iter()
        .map(|(timestamp, (renewable_mw, total_mw))| PenetrationPoint {
            timestamp,
            renewable_mw,
            total_mw,
            share: (total_mw > 0.0).then(|| renewable_mw / total_mw),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    fn ts(min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, min, 0)
            .unwrap()
    }

    #[test]
    fn test_fuel_parsing_is_lenient() {
        assert_eq!("Black Coal".parse::<Fuel>().unwrap(), Fuel::Coal);
        assert_eq!("Natural Gas (OCGT)".parse::<Fuel>().unwrap(), Fuel::Gas);
        assert_eq!("Wind".parse::<Fuel>().unwrap(), Fuel::Wind);
        assert_eq!("Battery Storage".parse::<Fuel>().unwrap(), Fuel::Battery);
        assert_eq!("fusion".parse::<Fuel>().unwrap(), Fuel::Other);
        assert!(Fuel::Hydro.is_renewable());
        assert!(!Fuel::Battery.is_renewable());
    }

    #[test]
    fn test_registry_from_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("units.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "DUID,FUEL,REGION").unwrap();
        writeln!(f, "BW01, Black Coal ,NSW1").unwrap();
        writeln!(f, "MACARTH1,Wind,VIC1").unwrap();
        drop(f);

        let registry = UnitRegistry::from_csv(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.fuel_label("BW01"), "Coal");
        assert_eq!(registry.region_label("MACARTH1"), "VIC1");
        assert_eq!(registry.fuel_label("NOPE1"), UNKNOWN_GROUP);
    }

    #[test]
    fn test_penetration_excludes_battery_and_negatives() {
        let records = vec![
            Record::new(ts(5), "Coal", 600.0),
            Record::new(ts(5), "Wind", 300.0),
            Record::new(ts(5), "Solar", 100.0),
            Record::new(ts(5), "Battery", 50.0),
            Record::new(ts(5), "Hydro", -10.0),
            Record::new(ts(10), "Battery", 40.0),
        ];
        let points = renewable_penetration(&records);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].total_mw, 1000.0);
        assert_eq!(points[0].share, Some(0.4));
        assert_eq!(points[1].share, None);
    }
}
