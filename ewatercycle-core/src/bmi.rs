//! The Basic Model Interface as seen from the model wrappers.
//!
//! A [`Bmi`] handle is produced by an external collaborator (a container client,
//! a local library binding, a test double) and handed to a model during setup.
//! Implementations report failures as [`EWCError`](crate::errors::EWCError) values
//! and the model wrappers pass them through untouched.

use crate::errors::EWCResult;
use ndarray::{Array1, ArrayD, ArrayView1, ArrayViewD};

/// A live, stateful connection to a running BMI model
pub trait Bmi {
    /// Perform all tasks that take place before entering the model's time loop
    fn initialize(&mut self, config_file: &str) -> EWCResult<()>;
    /// Advance the model by a single time step
    fn update(&mut self) -> EWCResult<()>;
    /// Perform tear-down tasks for the model
    fn finalize(&mut self) -> EWCResult<()>;

    /// Copy of the values of a variable, shaped as the model stores them
    fn get_value(&self, name: &str) -> EWCResult<ArrayD<f64>>;
    /// Values of a variable at flat grid indices
    fn get_value_at_indices(&self, name: &str, indices: &[usize]) -> EWCResult<Array1<f64>>;
    fn set_value(&mut self, name: &str, value: ArrayViewD<f64>) -> EWCResult<()>;
    fn set_value_at_indices(
        &mut self,
        name: &str,
        indices: &[usize],
        value: ArrayView1<f64>,
    ) -> EWCResult<()>;

    fn get_start_time(&self) -> EWCResult<f64>;
    fn get_end_time(&self) -> EWCResult<f64>;
    fn get_current_time(&self) -> EWCResult<f64>;
    /// Time units, typically in CF form such as `days since 1970-01-01`
    fn get_time_units(&self) -> EWCResult<String>;
    fn get_time_step(&self) -> EWCResult<f64>;

    fn get_output_var_names(&self) -> EWCResult<Vec<String>>;
    fn get_input_var_names(&self) -> EWCResult<Vec<String>>;
    fn get_var_units(&self, name: &str) -> EWCResult<String>;

    /// Identifier of the grid a variable is defined on
    fn get_var_grid(&self, name: &str) -> EWCResult<i32>;
    /// Shape of a structured grid in (y, x) order
    fn get_grid_shape(&self, grid: i32) -> EWCResult<Vec<usize>>;
    /// Longitudes of the grid columns
    fn get_grid_x(&self, grid: i32) -> EWCResult<Array1<f64>>;
    /// Latitudes of the grid rows
    fn get_grid_y(&self, grid: i32) -> EWCResult<Array1<f64>>;
}
