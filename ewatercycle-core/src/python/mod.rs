//! Python bindings for configuration, parameter sets and GRDC observations.

use crate::config::Config;
use crate::errors::EWCError;
use crate::observation::grdc::GrdcQuery;
use crate::parameter_set::ParameterSet;
use numpy::ToPyArray;
use pyo3::exceptions::{PyFileNotFoundError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use pythonize::pythonize;
use std::path::PathBuf;

impl From<EWCError> for PyErr {
    fn from(err: EWCError) -> PyErr {
        match err {
            EWCError::ModelNotSetUp(_) | EWCError::Bmi(_) => PyRuntimeError::new_err(err.to_string()),
            EWCError::UnknownConfigKey(_) | EWCError::UnknownParameterSet { .. } => {
                PyKeyError::new_err(err.to_string())
            }
            EWCError::Io(ref io) if io.kind() == std::io::ErrorKind::NotFound => {
                PyFileNotFoundError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Settings shared by parameter sets, models and observation loaders.
///
/// Supports item access for the path valued keys
/// (`grdc_location`, `output_dir`, `parameterset_dir`, `ewatercycle_config`).
#[pyclass(name = "Config", module = "ewatercycle.core")]
#[derive(Clone, Default)]
pub struct PyConfig(pub Config);

#[pymethods]
impl PyConfig {
    #[new]
    #[pyo3(signature = (path=None))]
    fn new(path: Option<PathBuf>) -> PyResult<Self> {
        let config = match path {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        Ok(Self(config))
    }

    /// Load the per-user configuration file, or the defaults if there is none
    #[staticmethod]
    fn from_user_config() -> PyResult<Self> {
        Ok(Self(Config::from_user_config()?))
    }

    fn __getitem__(&self, key: &str) -> PyResult<Option<PathBuf>> {
        Ok(self.0.get(key)?.map(PathBuf::from))
    }

    fn __setitem__(&mut self, key: &str, value: Option<PathBuf>) -> PyResult<()> {
        Ok(self.0.set(key, value)?)
    }

    /// Restore values from the `ewatercycle_config` file, or the defaults
    fn reload(&mut self) -> PyResult<()> {
        Ok(self.0.reload()?)
    }

    fn save(&self, path: PathBuf) -> PyResult<()> {
        Ok(self.0.save(path)?)
    }

    /// Names of the configured parameter sets that are available on disk
    #[pyo3(signature = (target_model=None))]
    fn available_parameter_sets(&self, target_model: Option<&str>) -> PyResult<Vec<String>> {
        Ok(crate::parameter_set::available_parameter_sets(
            &self.0,
            target_model,
        )?)
    }

    fn get_parameter_set(&self, name: &str) -> PyResult<PyParameterSet> {
        Ok(PyParameterSet(crate::parameter_set::get_parameter_set(
            &self.0, name,
        )?))
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// A named input dataset for a target model.
#[pyclass(name = "ParameterSet", module = "ewatercycle.core")]
#[derive(Clone)]
pub struct PyParameterSet(pub ParameterSet);

#[pymethods]
impl PyParameterSet {
    #[new]
    #[pyo3(signature = (name, directory, config, target_model, supported_model_versions=None, cfg=None))]
    fn new(
        name: String,
        directory: PathBuf,
        config: PathBuf,
        target_model: String,
        supported_model_versions: Option<Vec<String>>,
        cfg: Option<PyRef<'_, PyConfig>>,
    ) -> PyResult<Self> {
        let settings = match cfg {
            Some(cfg) => cfg.0.clone(),
            None => Config::from_user_config()?,
        };
        let parameter_set = ParameterSet::new(
            name,
            directory,
            config,
            target_model,
            supported_model_versions.unwrap_or_default(),
            &settings,
        )?;
        Ok(Self(parameter_set))
    }

    #[getter]
    fn name(&self) -> String {
        self.0.name().to_string()
    }

    #[getter]
    fn directory(&self) -> PathBuf {
        self.0.directory().to_path_buf()
    }

    #[getter]
    fn config(&self) -> PathBuf {
        self.0.config().to_path_buf()
    }

    #[getter]
    fn target_model(&self) -> String {
        self.0.target_model().to_string()
    }

    #[getter]
    fn supported_model_versions(&self) -> Vec<String> {
        self.0.supported_model_versions().iter().cloned().collect()
    }

    #[getter]
    fn is_available(&self) -> bool {
        self.0.is_available()
    }

    fn __eq__(&self, other: &PyParameterSet) -> bool {
        self.0 == other.0
    }

    fn __str__(&self) -> String {
        self.0.to_string()
    }

    fn __repr__(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// Load GRDC observations of a station.
///
/// Returns a dict with a ``time`` list of ISO dates and a numpy array under the value
/// column name, plus a metadata dict.
#[pyfunction]
#[pyo3(signature = (station_id, start_time, end_time, data_home=None, column=None, config=None))]
fn get_grdc_data<'py>(
    py: Python<'py>,
    station_id: &str,
    start_time: &str,
    end_time: &str,
    data_home: Option<PathBuf>,
    column: Option<&str>,
    config: Option<PyRef<'py, PyConfig>>,
) -> PyResult<(Bound<'py, PyDict>, PyObject)> {
    let settings = match config {
        Some(config) => config.0.clone(),
        None => Config::from_user_config()?,
    };
    let mut query = GrdcQuery::new(station_id, start_time, end_time);
    if let Some(data_home) = data_home {
        query = query.with_data_home(data_home);
    }
    if let Some(column) = column {
        query = query.with_column(column);
    }
    let (series, metadata) = query.load(&settings)?;

    let data = PyDict::new_bound(py);
    let time: Vec<String> = series.time().iter().map(|d| d.to_string()).collect();
    data.set_item("time", time)?;
    data.set_item(series.column(), series.values().to_pyarray_bound(py))?;

    let metadata = pythonize(py, &metadata)?.into_py(py);
    Ok((data, metadata))
}

#[pymodule]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyConfig>()?;
    m.add_class::<PyParameterSet>()?;
    m.add_function(wrap_pyfunction!(get_grdc_data, m)?)?;
    Ok(())
}
