//! The contract every wrapped hydrological model satisfies.
//!
//! A concrete model owns a [`ModelCore`] and implements the handful of required
//! methods of [`Model`]: how it is set up, which parameters it exposes, how values are
//! labelled and how coordinates map onto its grid. Lifecycle calls, value access and
//! time queries are provided by the trait and forwarded to the model's BMI handle.
//!
//! ```rust,ignore
//! let mut model = PCRGlobWB::new("setters", parameter_set, &config)?;
//! let (config_file, _work_dir) = model.setup(PCRGlobWBSetup::new(bmi))?;
//! model.initialize(&config_file.to_string_lossy())?;
//! while model.time()? < model.end_time()? {
//!     model.update()?;
//! }
//! let discharge = model.get_value_at_coords("discharge", &[51.85], &[6.10])?;
//! model.finalize()?;
//! ```

use crate::bmi::Bmi;
use crate::errors::{EWCError, EWCResult};
use crate::grid::GridSelection;
use crate::labeled::LabeledArray;
use crate::parameter_set::ParameterSet;
use crate::time::{format_iso_time, CfTimeUnits};
use chrono::NaiveDateTime;
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Value of a model specific setting, as reported by [`Model::parameters`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Text(String),
    Time(NaiveDateTime),
    Path(PathBuf),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{v}"),
            ParameterValue::Float(v) => write!(f, "{v}"),
            ParameterValue::Text(v) => write!(f, "{v}"),
            ParameterValue::Time(v) => write!(f, "{}", format_iso_time(v)),
            ParameterValue::Path(v) => write!(f, "{}", v.display()),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Int(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

impl From<NaiveDateTime> for ParameterValue {
    fn from(value: NaiveDateTime) -> Self {
        ParameterValue::Time(value)
    }
}

impl From<PathBuf> for ParameterValue {
    fn from(value: PathBuf) -> Self {
        ParameterValue::Path(value)
    }
}

/// How a parameter set relates to the requested model version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    /// The version is listed in the parameter set's supported versions
    Listed,
    /// The parameter set lists no versions, so compatibility is assumed
    Unlisted,
}

/// State shared by every model: version, parameter set and BMI handle.
///
/// Construction validates the version and parameter set before any BMI interaction.
pub struct ModelCore {
    version: String,
    parameter_set: Option<ParameterSet>,
    bmi: Option<Box<dyn Bmi>>,
}

impl ModelCore {
    /// Validate `version` and `parameter_set` against model `M`
    pub fn new<M: Model>(
        version: impl Into<String>,
        parameter_set: Option<ParameterSet>,
    ) -> EWCResult<Self> {
        let version = version.into();
        check_version(&version, M::available_versions())?;
        if let Some(parameter_set) = &parameter_set {
            check_parameter_set(&M::model_name(), &version, parameter_set)?;
        }
        Ok(Self {
            version,
            parameter_set,
            bmi: None,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn parameter_set(&self) -> Option<&ParameterSet> {
        self.parameter_set.as_ref()
    }

    /// Take ownership of a BMI handle, replacing any previous one
    pub fn attach_bmi(&mut self, bmi: Box<dyn Bmi>) {
        self.bmi = Some(bmi);
    }

    pub fn has_bmi(&self) -> bool {
        self.bmi.is_some()
    }

    /// The BMI handle, or a [`EWCError::ModelNotSetUp`] naming `operation`
    pub fn bmi(&self, operation: &'static str) -> EWCResult<&dyn Bmi> {
        self.bmi
            .as_deref()
            .ok_or(EWCError::ModelNotSetUp(operation))
    }

    pub fn bmi_mut(&mut self, operation: &'static str) -> EWCResult<&mut (dyn Bmi + 'static)> {
        self.bmi
            .as_deref_mut()
            .ok_or(EWCError::ModelNotSetUp(operation))
    }
}

impl fmt::Debug for ModelCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCore")
            .field("version", &self.version)
            .field("parameter_set", &self.parameter_set)
            .field("has_bmi", &self.has_bmi())
            .finish()
    }
}

/// Fail unless `version` is one of `available`
pub fn check_version(version: &str, available: &[&str]) -> EWCResult<()> {
    if available.contains(&version) {
        return Ok(());
    }
    let quoted: Vec<String> = available.iter().map(|v| format!("'{v}'")).collect();
    // tuple notation, a single version keeps its trailing comma
    let available = match quoted.as_slice() {
        [single] => format!("({single},)"),
        _ => format!("({})", quoted.join(", ")),
    };
    Err(EWCError::UnsupportedVersion {
        version: version.to_string(),
        available,
    })
}

/// Check a parameter set targets `model_name` and supports `version`.
///
/// A parameter set without any supported versions is accepted, but the assumption is
/// logged since the combination has never been verified.
pub fn check_parameter_set(
    model_name: &str,
    version: &str,
    parameter_set: &ParameterSet,
) -> EWCResult<Compatibility> {
    if !parameter_set
        .target_model()
        .eq_ignore_ascii_case(model_name)
    {
        return Err(EWCError::WrongTargetModel {
            expected: model_name.to_string(),
            got: parameter_set.target_model().to_string(),
        });
    }

    let supported = parameter_set.supported_model_versions();
    if supported.is_empty() {
        log::info!(
            "Model version {version} is not explicitly listed in the supported model versions of parameter set {}",
            parameter_set.name()
        );
        return Ok(Compatibility::Unlisted);
    }
    if !supported.contains(version) {
        let listed: Vec<&str> = supported.iter().map(String::as_str).collect();
        return Err(EWCError::IncompatibleParameterSet {
            version: version.to_string(),
            supported: format!("{{{}}}", listed.join(", ")),
        });
    }
    Ok(Compatibility::Listed)
}

/// Lower-cased type name without module path or generic arguments
fn lowered_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_lowercase()
}

/// A hydrological model wrapped around a BMI handle
pub trait Model {
    /// Per model settings passed to [`Model::setup`], including the BMI handle
    type Setup;

    /// Versions of the model this wrapper supports
    fn available_versions() -> &'static [&'static str];

    /// Name parameter sets use to target this model
    ///
    /// Defaults to the lower-cased type name, e.g. `pcrglobwb` for `PCRGlobWB`.
    fn model_name() -> String {
        lowered_type_name::<Self>()
    }

    fn core(&self) -> &ModelCore;

    fn core_mut(&mut self) -> &mut ModelCore;

    /// Prepare the model to run and attach its BMI handle.
    ///
    /// Returns the path of the config file to pass to [`Model::initialize`] and the
    /// directory the model writes its output to.
    fn setup(&mut self, setup: Self::Setup) -> EWCResult<(PathBuf, PathBuf)>;

    /// Model specific settings as ordered (name, value) pairs
    fn parameters(&self) -> Vec<(String, ParameterValue)>;

    /// Values of a variable with coordinates, time and units attached
    fn get_value_as_labeled(&self, name: &str) -> EWCResult<LabeledArray>;

    /// Map geographic points onto the grid of variable `name`
    fn coords_to_indices(&self, name: &str, lat: &[f64], lon: &[f64])
        -> EWCResult<GridSelection>;

    fn version(&self) -> &str {
        self.core().version()
    }

    fn parameter_set(&self) -> Option<&ParameterSet> {
        self.core().parameter_set()
    }

    fn initialize(&mut self, config_file: &str) -> EWCResult<()> {
        self.core_mut().bmi_mut("initialize")?.initialize(config_file)
    }

    fn update(&mut self) -> EWCResult<()> {
        self.core_mut().bmi_mut("update")?.update()
    }

    fn finalize(&mut self) -> EWCResult<()> {
        self.core_mut().bmi_mut("finalize")?.finalize()
    }

    fn get_value(&self, name: &str) -> EWCResult<ArrayD<f64>> {
        self.core().bmi("get_value")?.get_value(name)
    }

    /// Values of `name` at the grid cells nearest to each (lat, lon) pair
    fn get_value_at_coords(&self, name: &str, lat: &[f64], lon: &[f64]) -> EWCResult<Array1<f64>> {
        let bmi = self.core().bmi("get_value_at_coords")?;
        let selection = self.coords_to_indices(name, lat, lon)?;
        bmi.get_value_at_indices(name, &selection.indices)
    }

    fn set_value(&mut self, name: &str, value: ArrayViewD<f64>) -> EWCResult<()> {
        self.core_mut().bmi_mut("set_value")?.set_value(name, value)
    }

    /// Overwrite `name` at the grid cells nearest to each (lat, lon) pair
    fn set_value_at_coords(
        &mut self,
        name: &str,
        lat: &[f64],
        lon: &[f64],
        value: ArrayView1<f64>,
    ) -> EWCResult<()> {
        self.core().bmi("set_value_at_coords")?;
        let selection = self.coords_to_indices(name, lat, lon)?;
        self.core_mut()
            .bmi_mut("set_value_at_coords")?
            .set_value_at_indices(name, &selection.indices, value)
    }

    fn start_time(&self) -> EWCResult<f64> {
        self.core().bmi("start_time")?.get_start_time()
    }

    fn end_time(&self) -> EWCResult<f64> {
        self.core().bmi("end_time")?.get_end_time()
    }

    /// Current model time
    fn time(&self) -> EWCResult<f64> {
        self.core().bmi("time")?.get_current_time()
    }

    fn time_units(&self) -> EWCResult<String> {
        self.core().bmi("time_units")?.get_time_units()
    }

    fn time_step(&self) -> EWCResult<f64> {
        self.core().bmi("time_step")?.get_time_step()
    }

    fn output_var_names(&self) -> EWCResult<Vec<String>> {
        self.core().bmi("output_var_names")?.get_output_var_names()
    }

    fn input_var_names(&self) -> EWCResult<Vec<String>> {
        self.core().bmi("input_var_names")?.get_input_var_names()
    }

    fn var_units(&self, name: &str) -> EWCResult<String> {
        self.core().bmi("var_units")?.get_var_units(name)
    }

    /// Current model time as a datetime, using the CF time units of the model
    fn time_as_datetime(&self) -> EWCResult<NaiveDateTime> {
        CfTimeUnits::parse(&self.time_units()?)?.to_datetime(self.time()?)
    }

    fn time_as_isostr(&self) -> EWCResult<String> {
        Ok(format_iso_time(&self.time_as_datetime()?))
    }

    fn start_time_as_isostr(&self) -> EWCResult<String> {
        let start = CfTimeUnits::parse(&self.time_units()?)?.to_datetime(self.start_time()?)?;
        Ok(format_iso_time(&start))
    }

    fn end_time_as_isostr(&self) -> EWCResult<String> {
        let end = CfTimeUnits::parse(&self.time_units()?)?.to_datetime(self.end_time()?)?;
        Ok(format_iso_time(&end))
    }
}
