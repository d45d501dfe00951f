pub mod bmi;
pub mod config;
#[cfg(test)]
mod example_models;
pub mod grid;
pub mod labeled;
pub mod model;
pub mod observation;
pub mod parameter_set;
pub mod python;
pub mod time;

pub mod errors;
