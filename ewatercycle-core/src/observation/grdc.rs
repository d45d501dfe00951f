//! Daily discharge observations from the Global Runoff Data Centre.
//!
//! Each station is a single `<station id>_Q_Day.Cmd.txt` file encoded as Windows-1252:
//!
//! ```text
//! # GRDC-No.:              42424242
//! # River:                 SOME RIVER
//! # Latitude (DD):       52.356154
//! # Catchment area (km²):      4242.0
//! # Unit of measure:                   m³/s
//! # DATA
//! YYYY-MM-DD;hh:mm; Value
//! 2000-01-01;--:--;    123.000
//! 2000-01-02;--:--;    -999.000
//! ```
//!
//! Header lines become [`GrdcHeader`] fields, data rows become a [`GrdcTimeseries`].
//! Rows holding the missing value sentinel are kept as NaN.

use crate::config::Config;
use crate::errors::{EWCError, EWCResult};
use crate::time::{format_iso_time, parse_iso_time};
use chrono::{NaiveDate, NaiveTime};
use encoding_rs::WINDOWS_1252;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Value GRDC uses for days without a measurement
pub const MISSING_VALUE: f64 = -999.0;

/// Column name used when the caller does not pick one
pub const DEFAULT_COLUMN: &str = "streamflow";

/// File name of the daily discharge file of a station
pub fn grdc_file_name(station_id: &str) -> String {
    format!("{station_id}_Q_Day.Cmd.txt")
}

/// Station description taken from the commented header of a GRDC file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrdcHeader {
    pub title: Option<String>,
    pub format: Option<String>,
    pub field_delimiter: Option<String>,
    pub file_generation_date: Option<String>,
    pub id_from_grdc: Option<i64>,
    pub river_name: Option<String>,
    pub station_name: Option<String>,
    pub country_code: Option<String>,
    pub grdc_latitude_in_arc_degree: Option<f64>,
    pub grdc_longitude_in_arc_degree: Option<f64>,
    pub grdc_catchment_area_in_km2: Option<f64>,
    pub altitude_masl: Option<f64>,
    #[serde(rename = "dataSetContent")]
    pub data_set_content: Option<String>,
    pub units: Option<String>,
    pub time_series: Option<String>,
    pub no_of_years: Option<i64>,
    pub last_update: Option<String>,
}

/// Header fields plus the statistics of the returned window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrdcMetadata {
    #[serde(flatten)]
    pub header: GrdcHeader,
    pub grdc_file_name: PathBuf,
    /// Number of days in the requested window
    #[serde(rename = "nrMeasurements")]
    pub nr_measurements: usize,
    /// Number of days in the requested window without a measurement
    #[serde(rename = "nrMissingData")]
    pub nr_missing_data: usize,
    #[serde(rename = "UserStartTime")]
    pub user_start_time: String,
    #[serde(rename = "UserEndTime")]
    pub user_end_time: String,
}

/// One value per day, indexed by date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrdcTimeseries {
    column: String,
    time: Vec<NaiveDate>,
    values: Array1<f64>,
}

impl GrdcTimeseries {
    pub fn new(column: impl Into<String>, time: Vec<NaiveDate>, values: Array1<f64>) -> Self {
        Self {
            column: column.into(),
            time,
            values,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn time(&self) -> &[NaiveDate] {
        &self.time
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.time
            .iter()
            .position(|d| *d == date)
            .map(|i| self.values[i])
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Same values under another column name
    pub fn rename(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }
}

/// A parsed station file
#[derive(Debug, Clone, PartialEq)]
pub struct GrdcFile {
    pub header: GrdcHeader,
    pub time: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

/// Request for the observations of one station within a time window
///
/// ```rust,ignore
/// let (data, metadata) = GrdcQuery::new("6335020", "2000-01-01T00:00Z", "2001-01-01T00:00Z")
///     .with_column("observation")
///     .load(&config)?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GrdcQuery {
    station_id: String,
    start_time: String,
    end_time: String,
    data_home: Option<PathBuf>,
    column: String,
}

impl GrdcQuery {
    pub fn new(
        station_id: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            data_home: None,
            column: DEFAULT_COLUMN.to_string(),
        }
    }

    /// Read from this directory instead of the configured `grdc_location`
    pub fn with_data_home(mut self, data_home: impl Into<PathBuf>) -> Self {
        self.data_home = Some(data_home.into());
        self
    }

    /// Name of the value column in the returned series
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Location of the station file, checking that it exists
    pub fn file_path(&self, config: &Config) -> EWCResult<PathBuf> {
        let directory = self
            .data_home
            .as_deref()
            .or(config.grdc_location.as_deref())
            .ok_or(EWCError::GrdcPathNotProvided)?;
        if !directory.is_dir() {
            return Err(EWCError::GrdcDirectoryNotFound(directory.to_path_buf()));
        }

        let path = directory.join(grdc_file_name(&self.station_id));
        if !path.is_file() {
            return Err(EWCError::GrdcFileNotFound(path));
        }
        Ok(path)
    }

    /// Read the station file and clip it to the requested window
    pub fn load(&self, config: &Config) -> EWCResult<(GrdcTimeseries, GrdcMetadata)> {
        let path = self.file_path(config)?;
        let start = parse_iso_time(&self.start_time)?;
        let end = parse_iso_time(&self.end_time)?;
        log::debug!("Reading GRDC observations from {}", path.display());

        let file = read_grdc_file(&path)?;
        let (time, values): (Vec<NaiveDate>, Vec<f64>) = file
            .time
            .into_iter()
            .zip(file.values)
            .filter(|(date, _)| {
                let at = date.and_time(NaiveTime::MIN);
                start <= at && at <= end
            })
            .unzip();
        let series = GrdcTimeseries::new(DEFAULT_COLUMN, time, Array1::from(values))
            .rename(self.column.as_str());

        let metadata = GrdcMetadata {
            header: file.header,
            grdc_file_name: path,
            nr_measurements: series.len(),
            nr_missing_data: series.missing_count(),
            user_start_time: format_iso_time(&start),
            user_end_time: format_iso_time(&end),
        };
        Ok((series, metadata))
    }
}

/// Load the observations of `station_id` between `start_time` and `end_time` (inclusive).
///
/// The station file is looked up in `data_home`, or in `grdc_location` of `config`
/// when `data_home` is `None`. The value column is named `column`, or `streamflow`.
pub fn get_grdc_data(
    station_id: &str,
    start_time: &str,
    end_time: &str,
    data_home: Option<&Path>,
    column: Option<&str>,
    config: &Config,
) -> EWCResult<(GrdcTimeseries, GrdcMetadata)> {
    let mut query = GrdcQuery::new(station_id, start_time, end_time);
    if let Some(data_home) = data_home {
        query = query.with_data_home(data_home);
    }
    if let Some(column) = column {
        query = query.with_column(column);
    }
    query.load(config)
}

/// Parse a complete station file
pub fn read_grdc_file(path: &Path) -> EWCResult<GrdcFile> {
    let bytes = std::fs::read(path)?;
    let (content, _) = WINDOWS_1252.decode_without_bom_handling(&bytes);
    parse_grdc(&content, path)
}

fn parse_grdc(content: &str, path: &Path) -> EWCResult<GrdcFile> {
    let mut header = GrdcHeader::default();
    let mut time = Vec::new();
    let mut values = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let line_no = i + 1;
        let parse_error = |reason: String| EWCError::GrdcParse {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        };

        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if let Some((key, value)) = comment.split_once(':') {
                apply_header_field(&mut header, key.trim(), value.trim()).map_err(parse_error)?;
            }
            continue;
        }
        if line.starts_with("YYYY-MM-DD") {
            continue;
        }

        let mut fields = line.split(';').map(str::trim);
        let (date, value) = match (fields.next(), fields.next(), fields.next()) {
            (Some(date), Some(_), Some(value)) => (date, value),
            _ => return Err(parse_error(format!("expected date;time;value, got {line:?}"))),
        };
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| parse_error(format!("invalid date {date:?}: {e}")))?;
        let value: f64 = value
            .parse()
            .map_err(|e| parse_error(format!("invalid value {value:?}: {e}")))?;

        time.push(date);
        values.push(if value == MISSING_VALUE { f64::NAN } else { value });
    }

    Ok(GrdcFile {
        header,
        time,
        values,
    })
}

fn apply_header_field(header: &mut GrdcHeader, key: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    let key = key.to_lowercase();
    let text = || Some(value.to_string());

    match key.as_str() {
        "title" => header.title = text(),
        "format" => header.format = text(),
        "field delimiter" => header.field_delimiter = text(),
        "file generation date" => header.file_generation_date = text(),
        "grdc-no." => header.id_from_grdc = Some(parse_number(&key, value)?),
        "river" => header.river_name = text(),
        "station" => header.station_name = text(),
        "country" => header.country_code = text(),
        "data set content" => header.data_set_content = text(),
        "unit of measure" => header.units = text(),
        "time series" => header.time_series = text(),
        "no. of years" => header.no_of_years = Some(parse_number(&key, value)?),
        "last update" => header.last_update = text(),
        k if k.starts_with("latitude") => {
            header.grdc_latitude_in_arc_degree = Some(parse_number(&key, value)?)
        }
        k if k.starts_with("longitude") => {
            header.grdc_longitude_in_arc_degree = Some(parse_number(&key, value)?)
        }
        k if k.starts_with("catchment area") => {
            header.grdc_catchment_area_in_km2 = Some(parse_number(&key, value)?)
        }
        k if k.starts_with("altitude") => {
            header.altitude_masl = Some(parse_number(&key, value)?)
        }
        _ => {}
    }
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{key} should be numeric, got {value:?}"))
}
