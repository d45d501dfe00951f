//! Mapping geographic coordinates onto a model grid.
//!
//! Models on a regular latitude/longitude raster can build a [`RectilinearGrid`] from
//! their BMI handle and use it to implement
//! [`Model::coords_to_indices`](crate::model::Model::coords_to_indices).
//!
//! Snapping is nearest-neighbour per axis. When a point is exactly halfway between two
//! grid lines the lower index wins.

use crate::bmi::Bmi;
use crate::errors::{EWCError, EWCResult};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Grid cells selected for a set of requested points
///
/// The three vectors have one entry per requested point, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSelection {
    /// Flat indices into the variable
    pub indices: Vec<usize>,
    /// Longitudes of the selected cells
    pub lon: Vec<f64>,
    /// Latitudes of the selected cells
    pub lat: Vec<f64>,
}

/// A structured grid whose cells are the cartesian product of latitudes and longitudes.
///
/// Flat indices follow row-major (latitude, longitude) order.
#[derive(Debug, Clone, PartialEq)]
pub struct RectilinearGrid {
    lat: Array1<f64>,
    lon: Array1<f64>,
}

impl RectilinearGrid {
    pub fn new(lat: Array1<f64>, lon: Array1<f64>) -> EWCResult<Self> {
        if lat.is_empty() || lon.is_empty() {
            return Err(EWCError::DimensionMismatch(format!(
                "grid needs at least one latitude and longitude, got {} and {}",
                lat.len(),
                lon.len()
            )));
        }
        Ok(Self { lat, lon })
    }

    /// Build the grid a variable is defined on from the BMI grid queries
    pub fn from_bmi(bmi: &dyn Bmi, name: &str) -> EWCResult<Self> {
        let grid = bmi.get_var_grid(name)?;
        let shape = bmi.get_grid_shape(grid)?;
        let lat = bmi.get_grid_y(grid)?;
        let lon = bmi.get_grid_x(grid)?;
        if shape != [lat.len(), lon.len()] {
            return Err(EWCError::DimensionMismatch(format!(
                "grid {grid} of {name} has shape {shape:?} but {} latitudes and {} longitudes",
                lat.len(),
                lon.len()
            )));
        }
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> &Array1<f64> {
        &self.lat
    }

    pub fn lon(&self) -> &Array1<f64> {
        &self.lon
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.lat.len(), self.lon.len()]
    }

    /// Snap one point, returning (flat index, snapped latitude, snapped longitude)
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(usize, f64, f64)> {
        let row = nearest_index(&self.lat, lat)?;
        let col = nearest_index(&self.lon, lon)?;
        Some((row * self.lon.len() + col, self.lat[row], self.lon[col]))
    }

    /// Snap every (lat, lon) pair
    pub fn select(&self, name: &str, lat: &[f64], lon: &[f64]) -> EWCResult<GridSelection> {
        if lat.len() != lon.len() {
            return Err(EWCError::CoordinateLookup {
                variable: name.to_string(),
                reason: format!(
                    "got {} latitudes but {} longitudes",
                    lat.len(),
                    lon.len()
                ),
            });
        }

        let mut selection = GridSelection::default();
        for (&y, &x) in lat.iter().zip(lon) {
            let (index, snapped_lat, snapped_lon) =
                self.nearest(y, x)
                    .ok_or_else(|| EWCError::CoordinateLookup {
                        variable: name.to_string(),
                        reason: format!("({y}, {x}) is not a valid coordinate"),
                    })?;
            selection.indices.push(index);
            selection.lat.push(snapped_lat);
            selection.lon.push(snapped_lon);
        }
        Ok(selection)
    }
}

/// Position of the value closest to `target`, lowest index on ties.
///
/// Non-finite grid values are never selected.
fn nearest_index(values: &Array1<f64>, target: f64) -> Option<usize> {
    if !target.is_finite() {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let distance = (value - target).abs();
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((i, distance)),
        }
    }
    best.map(|(i, _)| i)
}
