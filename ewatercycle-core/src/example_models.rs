//! A minimal model and a recording BMI handle used throughout the tests.

use crate::bmi::Bmi;
use crate::errors::{EWCError, EWCResult};
use crate::grid::GridSelection;
use crate::labeled::{CoordinateValues, LabeledArray};
use crate::model::{Model, ModelCore, ParameterValue};
use crate::parameter_set::ParameterSet;
use ndarray::{array, Array1, ArrayD, ArrayView1, ArrayViewD};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

/// A call received by [`RecordingBmi`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BmiCall {
    Initialize(String),
    Update,
    Finalize,
    GetValueAtIndices(String, Vec<usize>),
    SetValue(String, Vec<f64>),
    SetValueAtIndices(String, Vec<usize>, Vec<f64>),
}

/// BMI test double returning canned values and recording mutating calls
#[derive(Debug, Default)]
pub(crate) struct RecordingBmi {
    pub calls: Rc<RefCell<Vec<BmiCall>>>,
    pub value: ArrayD<f64>,
    pub value_at_indices: Array1<f64>,
    pub start_time: f64,
    pub end_time: f64,
    pub current_time: f64,
    pub time_step: f64,
    pub time_units: String,
    pub output_var_names: Vec<String>,
    pub grid_lat: Array1<f64>,
    pub grid_lon: Array1<f64>,
    /// When set, every lifecycle call fails with this message
    pub fail_with: Option<String>,
}

impl RecordingBmi {
    /// Shared handle to the call log, usable after the BMI is moved into a model
    pub fn calls(&self) -> Rc<RefCell<Vec<BmiCall>>> {
        Rc::clone(&self.calls)
    }

    fn record(&self, call: BmiCall) -> EWCResult<()> {
        if let Some(msg) = &self.fail_with {
            return Err(EWCError::Bmi(msg.clone()));
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

impl Bmi for RecordingBmi {
    fn initialize(&mut self, config_file: &str) -> EWCResult<()> {
        self.record(BmiCall::Initialize(config_file.to_string()))
    }

    fn update(&mut self) -> EWCResult<()> {
        self.record(BmiCall::Update)
    }

    fn finalize(&mut self) -> EWCResult<()> {
        self.record(BmiCall::Finalize)
    }

    fn get_value(&self, _name: &str) -> EWCResult<ArrayD<f64>> {
        Ok(self.value.clone())
    }

    fn get_value_at_indices(&self, name: &str, indices: &[usize]) -> EWCResult<Array1<f64>> {
        self.record(BmiCall::GetValueAtIndices(
            name.to_string(),
            indices.to_vec(),
        ))?;
        Ok(self.value_at_indices.clone())
    }

    fn set_value(&mut self, name: &str, value: ArrayViewD<f64>) -> EWCResult<()> {
        self.record(BmiCall::SetValue(
            name.to_string(),
            value.iter().copied().collect(),
        ))
    }

    fn set_value_at_indices(
        &mut self,
        name: &str,
        indices: &[usize],
        value: ArrayView1<f64>,
    ) -> EWCResult<()> {
        self.record(BmiCall::SetValueAtIndices(
            name.to_string(),
            indices.to_vec(),
            value.to_vec(),
        ))
    }

    fn get_start_time(&self) -> EWCResult<f64> {
        Ok(self.start_time)
    }

    fn get_end_time(&self) -> EWCResult<f64> {
        Ok(self.end_time)
    }

    fn get_current_time(&self) -> EWCResult<f64> {
        Ok(self.current_time)
    }

    fn get_time_units(&self) -> EWCResult<String> {
        Ok(self.time_units.clone())
    }

    fn get_time_step(&self) -> EWCResult<f64> {
        Ok(self.time_step)
    }

    fn get_output_var_names(&self) -> EWCResult<Vec<String>> {
        Ok(self.output_var_names.clone())
    }

    fn get_input_var_names(&self) -> EWCResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn get_var_units(&self, _name: &str) -> EWCResult<String> {
        Ok("m3 s-1".to_string())
    }

    fn get_var_grid(&self, _name: &str) -> EWCResult<i32> {
        Ok(0)
    }

    fn get_grid_shape(&self, _grid: i32) -> EWCResult<Vec<usize>> {
        Ok(vec![self.grid_lat.len(), self.grid_lon.len()])
    }

    fn get_grid_x(&self, _grid: i32) -> EWCResult<Array1<f64>> {
        Ok(self.grid_lon.clone())
    }

    fn get_grid_y(&self, _grid: i32) -> EWCResult<Array1<f64>> {
        Ok(self.grid_lat.clone())
    }
}

#[derive(Default)]
pub(crate) struct MockedSetup {
    pub bmi: Option<Box<dyn Bmi>>,
}

impl MockedSetup {
    pub fn with_bmi(bmi: impl Bmi + 'static) -> Self {
        Self {
            bmi: Some(Box::new(bmi)),
        }
    }
}

/// Model with fixed answers for everything it has to provide itself
#[derive(Debug)]
pub(crate) struct MockedModel {
    core: ModelCore,
}

impl MockedModel {
    pub fn new(version: &str, parameter_set: Option<ParameterSet>) -> EWCResult<Self> {
        Ok(Self {
            core: ModelCore::new::<Self>(version, parameter_set)?,
        })
    }
}

impl Model for MockedModel {
    type Setup = MockedSetup;

    fn available_versions() -> &'static [&'static str] {
        &["0.4.2"]
    }

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn setup(&mut self, setup: MockedSetup) -> EWCResult<(PathBuf, PathBuf)> {
        if let Some(bmi) = setup.bmi {
            self.core.attach_bmi(bmi);
        }
        Ok((PathBuf::from("foobar.cfg"), PathBuf::from(".")))
    }

    fn parameters(&self) -> Vec<(String, ParameterValue)> {
        vec![("area".to_string(), ParameterValue::Int(42))]
    }

    fn get_value_as_labeled(&self, name: &str) -> EWCResult<LabeledArray> {
        Ok(LabeledArray::new(
            name,
            ["longitude", "latitude"],
            array![[1.0, 2.0], [3.0, 4.0]].into_dyn(),
        )?
        .with_coord(
            "latitude",
            Some("latitude"),
            CoordinateValues::Float(vec![42.25, 42.21]),
        )?
        .with_coord(
            "longitude",
            Some("longitude"),
            CoordinateValues::Float(vec![-99.83, -99.32]),
        )?
        .with_coord(
            "time",
            None,
            CoordinateValues::Text(vec!["2014-09-06".to_string()]),
        )?
        .with_attr("units", "degC"))
    }

    fn coords_to_indices(
        &self,
        _name: &str,
        _lat: &[f64],
        _lon: &[f64],
    ) -> EWCResult<GridSelection> {
        Ok(GridSelection {
            indices: vec![0],
            lon: vec![-99.83],
            lat: vec![42.25],
        })
    }
}
