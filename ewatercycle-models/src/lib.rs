pub mod models;

pub use models::pcrglobwb::{PCRGlobWB, PCRGlobWBSetup};
