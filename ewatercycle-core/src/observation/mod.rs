//! Observation datasets used to evaluate model output.

pub mod grdc;

pub use grdc::{get_grdc_data, GrdcMetadata, GrdcQuery, GrdcTimeseries};
