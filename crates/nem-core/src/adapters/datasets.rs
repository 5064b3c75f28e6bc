use crate::error::{NemError, Result};
use crate::store::Frame;
use crate::types::{DataType, Record, Resolution};

/// Schema knowledge for one dataset family. Implementors only describe
/// their columns; normalisation is shared.
pub trait DatasetAdapter: Send + Sync {
    fn data_type(&self) -> DataType;

    /// Store table holding this dataset at `resolution`.
    fn table(&self, resolution: Resolution) -> &'static str;

    fn time_column(&self) -> &'static str {
        "SETTLEMENTDATE"
    }

    fn entity_column(&self) -> &'static str;

    fn value_column(&self) -> &'static str;

    /// Convert a raw frame into canonical records sorted by
    /// `(timestamp, entity)`. Rows with an empty value cell are skipped.
    fn normalise(&self, frame: &Frame) -> Result<Vec<Record>> {
        let dataset = frame.table();
        let expected = [self.time_column(), self.entity_column(), self.value_column()];
        let missing: Vec<String> = expected
            .iter()
            .filter(|c| frame.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(NemError::Schema {
                dataset: dataset.to_string(),
                missing,
                detail: format!("expected columns for {}", self.data_type()),
            });
        }

        // Presence checked above.
        let (Some(times), Some(entities), Some(values)) = (
            frame.column(self.time_column()),
            frame.column(self.entity_column()),
            frame.column(self.value_column()),
        ) else {
            return Err(NemError::schema(dataset, "column lookup failed"));
        };

        let mut records = Vec::with_capacity(frame.num_rows());
        for row in 0..frame.num_rows() {
            let raw_value = values[row].trim();
            if raw_value.is_empty() {
                continue;
            }
            let timestamp = crate::time::parse_market_timestamp(&times[row]).map_err(|_| {
                NemError::schema(
                    dataset,
                    format!(
                        "row {}: {} value {:?} is not a timestamp",
                        row + 1,
                        self.time_column(),
                        times[row]
                    ),
                )
            })?;
            let value: f64 = raw_value.parse().map_err(|_| {
                NemError::schema(
                    dataset,
                    format!(
                        "row {}: {} value {:?} is not numeric",
                        row + 1,
                        self.value_column(),
                        raw_value
                    ),
                )
            })?;
            records.push(Record::new(timestamp, entities[row].trim(), value));
        }

        records.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.entity.cmp(&b.entity))
        });
        Ok(records)
    }
}

/// Unit-level SCADA output.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationAdapter;

impl DatasetAdapter for GenerationAdapter {
    fn data_type(&self) -> DataType {
        DataType::Generation
    }

    fn table(&self, resolution: Resolution) -> &'static str {
        match resolution {
            Resolution::Fine => "scada_5min",
            Resolution::Coarse => "scada_30min",
        }
    }

    fn entity_column(&self) -> &'static str {
        "DUID"
    }

    fn value_column(&self) -> &'static str {
        "SCADAVALUE"
    }
}

/// Regional reference price.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceAdapter;

impl DatasetAdapter for PriceAdapter {
    fn data_type(&self) -> DataType {
        DataType::Price
    }

    fn table(&self, resolution: Resolution) -> &'static str {
        match resolution {
            Resolution::Fine => "prices_5min",
            Resolution::Coarse => "prices_30min",
        }
    }

    fn entity_column(&self) -> &'static str {
        "REGIONID"
    }

    fn value_column(&self) -> &'static str {
        "RRP"
    }
}

/// Metered interconnector flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmissionAdapter;

impl DatasetAdapter for TransmissionAdapter {
    fn data_type(&self) -> DataType {
        DataType::Transmission
    }

    fn table(&self, resolution: Resolution) -> &'static str {
        match resolution {
            Resolution::Fine => "transmission_5min",
            Resolution::Coarse => "transmission_30min",
        }
    }

    fn entity_column(&self) -> &'static str {
        "INTERCONNECTORID"
    }

    fn value_column(&self) -> &'static str {
        "METEREDMWFLOW"
    }
}

pub fn adapter_for(data_type: DataType) -> &'static dyn DatasetAdapter {
    match data_type {
        DataType::Generation => &GenerationAdapter,
        DataType::Price => &PriceAdapter,
        DataType::Transmission => &TransmissionAdapter,
    }
}
