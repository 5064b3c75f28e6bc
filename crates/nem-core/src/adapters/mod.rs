//! Dataset adapters: map one raw table schema onto canonical records.

mod datasets;
mod units;

pub use datasets::{
    adapter_for, DatasetAdapter, GenerationAdapter, PriceAdapter, TransmissionAdapter,
};
pub use units::{renewable_penetration, Fuel, PenetrationPoint, UnitInfo, UnitRegistry, UNKNOWN_GROUP};
