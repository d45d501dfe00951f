//! N-dimensional arrays with named dimensions, coordinates and attributes.

use crate::errors::{EWCError, EWCResult};
use chrono::NaiveDateTime;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoordinateValues {
    Float(Vec<f64>),
    Time(Vec<NaiveDateTime>),
    Text(Vec<String>),
}

impl CoordinateValues {
    pub fn len(&self) -> usize {
        match self {
            CoordinateValues::Float(values) => values.len(),
            CoordinateValues::Time(values) => values.len(),
            CoordinateValues::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Labels along zero or one dimension of a [`LabeledArray`]
///
/// A coordinate without dimensions is a scalar label, such as the model time of a
/// snapshot, and holds exactly one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub name: String,
    pub dim: Option<String>,
    pub values: CoordinateValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledArray {
    name: String,
    dims: Vec<String>,
    data: ArrayD<f64>,
    coords: Vec<Coordinate>,
    attrs: BTreeMap<String, String>,
}

impl LabeledArray {
    /// Wrap `data`, naming each of its axes
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f64>,
    ) -> EWCResult<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != data.ndim() {
            return Err(EWCError::DimensionMismatch(format!(
                "{} dimension names for an array with {} axes",
                dims.len(),
                data.ndim()
            )));
        }
        Ok(Self {
            name: name.into(),
            dims,
            data,
            coords: Vec::new(),
            attrs: BTreeMap::new(),
        })
    }

    /// Attach a coordinate along `dim`, or a scalar coordinate when `dim` is `None`
    pub fn with_coord(
        mut self,
        name: impl Into<String>,
        dim: Option<&str>,
        values: CoordinateValues,
    ) -> EWCResult<Self> {
        let name = name.into();
        let expected = match dim {
            Some(dim) => {
                let axis = self.axis(dim).ok_or_else(|| {
                    EWCError::DimensionMismatch(format!(
                        "coordinate {name} refers to unknown dimension {dim}"
                    ))
                })?;
                self.data.shape()[axis]
            }
            None => 1,
        };
        if values.len() != expected {
            return Err(EWCError::DimensionMismatch(format!(
                "coordinate {name} has {} values, expected {expected}",
                values.len()
            )));
        }

        self.coords.retain(|coord| coord.name != name);
        self.coords.push(Coordinate {
            name,
            dim: dim.map(str::to_string),
            values,
        });
        Ok(self)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.iter().find(|coord| coord.name == name)
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    /// Position of a named dimension
    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}
