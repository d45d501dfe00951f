use std::path::PathBuf;
use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum EWCError {
    #[error("{0}")]
    Error(String),
    #[error("Supplied version {version} is not supported by this model. Available versions are {available}.")]
    UnsupportedVersion { version: String, available: String },
    #[error("Parameter set has wrong target model, expected {expected} got {got}")]
    WrongTargetModel { expected: String, got: String },
    #[error("Parameter set is not compatible with version {version} of model, parameter set only supports {supported}")]
    IncompatibleParameterSet { version: String, supported: String },
    #[error("Model has no BMI handle, call setup() before {0}()")]
    ModelNotSetUp(&'static str),
    #[error("Failure reported by the BMI handle: {0}")]
    Bmi(String),
    #[error("Provide the grdc path using `data_home` argument or using `grdc_location` in ewatercycle configuration file.")]
    GrdcPathNotProvided,
    #[error("The grdc directory {} does not exist!", .0.display())]
    GrdcDirectoryNotFound(PathBuf),
    #[error("The grdc file {} does not exist!", .0.display())]
    GrdcFileNotFound(PathBuf),
    #[error("Could not parse grdc file {}, line {line}: {reason}", .path.display())]
    GrdcParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Invalid time {value:?}, expected an ISO-8601 string such as 2000-01-01T00:00Z")]
    InvalidTime { value: String },
    #[error("Invalid time units {0:?}, expected '<unit> since <reference date>'")]
    InvalidTimeUnits(String),
    #[error("Unknown configuration key {0:?}")]
    UnknownConfigKey(String),
    #[error("Configuration key {0:?} is not set")]
    ConfigKeyNotSet(&'static str),
    #[error("Path {} is not inside the parameter set directory {}", .path.display(), .root.display())]
    OutsideParameterSetDir { path: PathBuf, root: PathBuf },
    #[error("Unknown parameter set {name:?}, available parameter sets are {available:?}")]
    UnknownParameterSet {
        name: String,
        available: Vec<String>,
    },
    #[error("Could not map coordinates on variable {variable}: {reason}")]
    CoordinateLookup { variable: String, reason: String },
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Could not read configuration: {0}")]
    ConfigDeserialize(#[from] toml::de::Error),
    #[error("Could not write configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

/// Convenience type for `Result<T, EWCError>`.
pub type EWCResult<T> = Result<T, EWCError>;
