//! PCR-GLOBWB global hydrological model
//!
//! PCR-GLOBWB runs on a regular latitude/longitude raster and is configured with an
//! ini file. Setup copies the ini file of the parameter set into a fresh work directory,
//! pointing the model at the parameter set's input data and the work directory for
//! output, and optionally overriding the simulation period and number of spin-up years.

use chrono::{NaiveDate, Utc};
use ewatercycle_core::bmi::Bmi;
use ewatercycle_core::config::Config;
use ewatercycle_core::errors::{EWCError, EWCResult};
use ewatercycle_core::grid::{GridSelection, RectilinearGrid};
use ewatercycle_core::labeled::{CoordinateValues, LabeledArray};
use ewatercycle_core::model::{Model, ModelCore, ParameterValue};
use ewatercycle_core::parameter_set::ParameterSet;
use ewatercycle_core::time::parse_iso_time;
use ndarray::IxDyn;
use std::path::{Path, PathBuf};

/// Versions of PCR-GLOBWB with a BMI that supports setting values
pub const AVAILABLE_VERSIONS: [&str; 1] = ["setters"];

/// Name of the config file written into the work directory
pub const CONFIG_FILENAME: &str = "pcrglobwb_ewatercycle.ini";

const GLOBAL_OPTIONS: &str = "globalOptions";

/// Settings for [`PCRGlobWB::setup`]
pub struct PCRGlobWBSetup {
    bmi: Box<dyn Bmi>,
    start_time: Option<String>,
    end_time: Option<String>,
    max_spinups_in_years: Option<u32>,
    work_dir: Option<PathBuf>,
}

impl PCRGlobWBSetup {
    /// Setup attaching `bmi`, a handle to a running PCR-GLOBWB instance
    pub fn new(bmi: impl Bmi + 'static) -> Self {
        Self {
            bmi: Box::new(bmi),
            start_time: None,
            end_time: None,
            max_spinups_in_years: None,
            work_dir: None,
        }
    }

    /// Start of the simulation, e.g. `2000-01-01T00:00Z`
    pub fn with_start_time(mut self, start_time: impl Into<String>) -> Self {
        self.start_time = Some(start_time.into());
        self
    }

    /// End of the simulation, e.g. `2000-12-31T00:00Z`
    pub fn with_end_time(mut self, end_time: impl Into<String>) -> Self {
        self.end_time = Some(end_time.into());
        self
    }

    pub fn with_max_spinups_in_years(mut self, years: u32) -> Self {
        self.max_spinups_in_years = Some(years);
        self
    }

    /// Write the config here instead of a new directory below `output_dir`
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }
}

/// Simulation settings that can be overridden during setup
#[derive(Debug, Clone, PartialEq)]
struct RunSettings {
    start_time: Option<String>,
    end_time: Option<String>,
    max_spinups_in_years: Option<String>,
}

impl RunSettings {
    fn from_ini(text: &str) -> Self {
        Self {
            start_time: read_option(text, GLOBAL_OPTIONS, "startTime"),
            end_time: read_option(text, GLOBAL_OPTIONS, "endTime"),
            max_spinups_in_years: read_option(text, GLOBAL_OPTIONS, "maxSpinUpsInYears"),
        }
    }
}

#[derive(Debug)]
pub struct PCRGlobWB {
    core: ModelCore,
    output_dir: Option<PathBuf>,
    input_dir: PathBuf,
    config_template: PathBuf,
    settings: RunSettings,
}

impl PCRGlobWB {
    /// Create the model for a parameter set, reading the defaults from its ini file
    pub fn new(version: &str, parameter_set: ParameterSet, config: &Config) -> EWCResult<Self> {
        let input_dir = parameter_set.directory().to_path_buf();
        let config_template = parameter_set.config().to_path_buf();
        let core = ModelCore::new::<Self>(version, Some(parameter_set))?;
        let settings = RunSettings::from_ini(&std::fs::read_to_string(&config_template)?);
        Ok(Self {
            core,
            output_dir: config.output_dir.clone(),
            input_dir,
            config_template,
            settings,
        })
    }

    fn work_dir(&self, requested: Option<PathBuf>) -> EWCResult<PathBuf> {
        if let Some(work_dir) = requested {
            return Ok(work_dir);
        }
        let output_dir = self
            .output_dir
            .as_deref()
            .ok_or(EWCError::ConfigKeyNotSet("output_dir"))?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        Ok(output_dir.join(format!("pcrglobwb_{stamp}")))
    }
}

impl Model for PCRGlobWB {
    type Setup = PCRGlobWBSetup;

    fn available_versions() -> &'static [&'static str] {
        &AVAILABLE_VERSIONS
    }

    fn core(&self) -> &ModelCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ModelCore {
        &mut self.core
    }

    fn setup(&mut self, setup: PCRGlobWBSetup) -> EWCResult<(PathBuf, PathBuf)> {
        let mut settings = self.settings.clone();
        if let Some(start_time) = &setup.start_time {
            settings.start_time = Some(ini_date(start_time)?);
        }
        if let Some(end_time) = &setup.end_time {
            settings.end_time = Some(ini_date(end_time)?);
        }
        if let Some(years) = setup.max_spinups_in_years {
            settings.max_spinups_in_years = Some(years.to_string());
        }

        let work_dir = self.work_dir(setup.work_dir)?;
        std::fs::create_dir_all(&work_dir)?;

        let template = std::fs::read_to_string(&self.config_template)?;
        let mut overrides = vec![
            ("inputDir", path_str(&self.input_dir)),
            ("outputDir", path_str(&work_dir)),
        ];
        overrides.extend(
            [
                ("startTime", &settings.start_time),
                ("endTime", &settings.end_time),
                ("maxSpinUpsInYears", &settings.max_spinups_in_years),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.clone().map(|v| (key, v))),
        );
        let config_file = work_dir.join(CONFIG_FILENAME);
        std::fs::write(
            &config_file,
            apply_overrides(&template, GLOBAL_OPTIONS, &overrides),
        )?;
        log::debug!("Wrote PCR-GLOBWB config to {}", config_file.display());

        self.settings = settings;
        self.core.attach_bmi(setup.bmi);
        Ok((config_file, work_dir))
    }

    fn parameters(&self) -> Vec<(String, ParameterValue)> {
        [
            ("start_time", &self.settings.start_time),
            ("end_time", &self.settings.end_time),
            ("max_spinups_in_years", &self.settings.max_spinups_in_years),
        ]
        .into_iter()
        .filter_map(|(name, value)| {
            value
                .as_deref()
                .map(|v| (name.to_string(), ParameterValue::from(v)))
        })
        .collect()
    }

    fn get_value_as_labeled(&self, name: &str) -> EWCResult<LabeledArray> {
        let bmi = self.core.bmi("get_value_as_labeled")?;
        let grid = RectilinearGrid::from_bmi(bmi, name)?;
        let [n_lat, n_lon] = grid.shape();
        let data = bmi
            .get_value(name)?
            .into_shape(IxDyn(&[n_lat, n_lon]))
            .map_err(|e| {
                EWCError::DimensionMismatch(format!("{name} does not match its grid: {e}"))
            })?;

        Ok(LabeledArray::new(name, ["latitude", "longitude"], data)?
            .with_coord(
                "latitude",
                Some("latitude"),
                CoordinateValues::Float(grid.lat().to_vec()),
            )?
            .with_coord(
                "longitude",
                Some("longitude"),
                CoordinateValues::Float(grid.lon().to_vec()),
            )?
            .with_coord(
                "time",
                None,
                CoordinateValues::Time(vec![self.time_as_datetime()?]),
            )?
            .with_attr("units", bmi.get_var_units(name)?))
    }

    /// Nearest grid cell per point, lowest index on ties
    fn coords_to_indices(&self, name: &str, lat: &[f64], lon: &[f64]) -> EWCResult<GridSelection> {
        let bmi = self.core.bmi("coords_to_indices")?;
        RectilinearGrid::from_bmi(bmi, name)?.select(name, lat, lon)
    }
}

/// ISO time to the `YYYY-MM-DD` form PCR-GLOBWB expects
fn ini_date(value: &str) -> EWCResult<String> {
    let date: NaiveDate = parse_iso_time(value)?.date();
    Ok(date.format("%Y-%m-%d").to_string())
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn section_name(line: &str) -> Option<&str> {
    line.trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

fn split_option(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    trimmed
        .split_once('=')
        .map(|(key, value)| (key.trim(), value.trim()))
}

/// Value of `key` in `section`, if present
fn read_option(text: &str, section: &str, key: &str) -> Option<String> {
    let mut current = None;
    for line in text.lines() {
        if let Some(name) = section_name(line) {
            current = Some(name);
            continue;
        }
        if current == Some(section) {
            if let Some((k, v)) = split_option(line) {
                if k == key {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

/// Replace options of `section` in ini `text`.
///
/// Options missing from the section are appended to it; a missing section is added at
/// the end. Everything else is copied verbatim.
fn apply_overrides(text: &str, section: &str, overrides: &[(&str, String)]) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut pending: Vec<&(&str, String)> = overrides.iter().collect();
    let mut in_section = false;
    let mut seen_section = false;

    let flush = |out: &mut Vec<String>, pending: &mut Vec<&(&str, String)>| {
        for (key, value) in pending.drain(..) {
            out.push(format!("{key} = {value}"));
        }
    };

    for line in text.lines() {
        if let Some(name) = section_name(line) {
            if in_section {
                flush(&mut out, &mut pending);
            }
            in_section = name == section;
            seen_section |= in_section;
            out.push(line.to_string());
            continue;
        }
        if in_section {
            if let Some((key, _)) = split_option(line) {
                if let Some(pos) = pending.iter().position(|(k, _)| *k == key) {
                    let (k, v) = pending.remove(pos);
                    out.push(format!("{k} = {v}"));
                    continue;
                }
            }
        }
        out.push(line.to_string());
    }

    if !pending.is_empty() {
        if !seen_section {
            out.push(format!("[{section}]"));
        }
        flush(&mut out, &mut pending);
    }

    let mut result = out.join("\n");
    result.push('\n');
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, ArrayD, ArrayView1, ArrayViewD};
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const INI: &str = "[globalOptions]
outputDir = /tmp/out
inputDir = /tmp/in
startTime = 2001-01-01
endTime = 2010-12-31
maxSpinUpsInYears = 20

[meteoOptions]
precipitationNC = precipitation.nc
";

    type Writes = Rc<RefCell<Vec<(String, Vec<usize>, Vec<f64>)>>>;

    /// Two by three raster of discharge values
    #[derive(Default)]
    struct RasterBmi {
        writes: Writes,
    }

    impl Bmi for RasterBmi {
        fn initialize(&mut self, _config_file: &str) -> EWCResult<()> {
            Ok(())
        }
        fn update(&mut self) -> EWCResult<()> {
            Ok(())
        }
        fn finalize(&mut self) -> EWCResult<()> {
            Ok(())
        }
        fn get_value(&self, _name: &str) -> EWCResult<ArrayD<f64>> {
            Ok(array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0].into_dyn())
        }
        fn get_value_at_indices(&self, _name: &str, indices: &[usize]) -> EWCResult<Array1<f64>> {
            Ok(indices.iter().map(|&i| (i + 1) as f64).collect())
        }
        fn set_value(&mut self, _name: &str, _value: ArrayViewD<f64>) -> EWCResult<()> {
            Ok(())
        }
        fn set_value_at_indices(
            &mut self,
            name: &str,
            indices: &[usize],
            value: ArrayView1<f64>,
        ) -> EWCResult<()> {
            self.writes
                .borrow_mut()
                .push((name.to_string(), indices.to_vec(), value.to_vec()));
            Ok(())
        }
        fn get_start_time(&self) -> EWCResult<f64> {
            Ok(10957.0)
        }
        fn get_end_time(&self) -> EWCResult<f64> {
            Ok(11322.0)
        }
        fn get_current_time(&self) -> EWCResult<f64> {
            Ok(10958.0)
        }
        fn get_time_units(&self) -> EWCResult<String> {
            Ok("days since 1970-01-01".to_string())
        }
        fn get_time_step(&self) -> EWCResult<f64> {
            Ok(1.0)
        }
        fn get_output_var_names(&self) -> EWCResult<Vec<String>> {
            Ok(vec!["discharge".to_string()])
        }
        fn get_input_var_names(&self) -> EWCResult<Vec<String>> {
            Ok(vec!["precipitation".to_string()])
        }
        fn get_var_units(&self, _name: &str) -> EWCResult<String> {
            Ok("m3.s-1".to_string())
        }
        fn get_var_grid(&self, _name: &str) -> EWCResult<i32> {
            Ok(1)
        }
        fn get_grid_shape(&self, _grid: i32) -> EWCResult<Vec<usize>> {
            Ok(vec![2, 3])
        }
        fn get_grid_x(&self, _grid: i32) -> EWCResult<Array1<f64>> {
            Ok(array![5.25, 5.75, 6.25])
        }
        fn get_grid_y(&self, _grid: i32) -> EWCResult<Array1<f64>> {
            Ok(array![52.25, 51.75])
        }
    }

    struct Fixture {
        root: TempDir,
        config: Config,
        parameter_set: ParameterSet,
    }

    fn fixture(target_model: &str, versions: &[&str]) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let ps_dir = root.path().join("parameter-sets").join("rhine");
        std::fs::create_dir_all(&ps_dir).unwrap();
        std::fs::write(ps_dir.join("setup.ini"), INI).unwrap();

        let config = Config {
            parameterset_dir: Some(root.path().join("parameter-sets")),
            output_dir: Some(root.path().join("output")),
            ..Default::default()
        };
        let parameter_set = ParameterSet::new(
            "rhine",
            "rhine",
            "rhine/setup.ini",
            target_model,
            versions.iter().copied(),
            &config,
        )
        .unwrap();
        Fixture {
            root,
            config,
            parameter_set,
        }
    }

    fn model_after_setup(fixture: &Fixture, bmi: RasterBmi) -> PCRGlobWB {
        let mut model =
            PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config).unwrap();
        model.setup(PCRGlobWBSetup::new(bmi)).unwrap();
        model
    }

    #[test]
    fn model_name() {
        assert_eq!(PCRGlobWB::model_name(), "pcrglobwb");
    }

    #[test]
    fn rejects_other_versions_and_models() {
        let pcrglobwb = fixture("pcrglobwb", &["setters"]);
        assert!(matches!(
            PCRGlobWB::new("2.0", pcrglobwb.parameter_set.clone(), &pcrglobwb.config),
            Err(EWCError::UnsupportedVersion { .. })
        ));

        let wflow = fixture("wflow", &["setters"]);
        assert!(matches!(
            PCRGlobWB::new("setters", wflow.parameter_set.clone(), &wflow.config),
            Err(EWCError::WrongTargetModel { .. })
        ));
    }

    #[test]
    fn new_requires_readable_parameter_set_config() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        std::fs::remove_file(fixture.parameter_set.config()).unwrap();

        let result = PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config);

        assert!(matches!(result, Err(EWCError::Io(_))));
    }

    #[test]
    fn keeps_parameter_set() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let model =
            PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config).unwrap();

        assert_eq!(model.parameter_set(), Some(&fixture.parameter_set));
        assert_eq!(model.version(), "setters");
    }

    #[test]
    fn parameters_from_parameter_set() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let model =
            PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config).unwrap();

        assert_eq!(
            model.parameters(),
            vec![
                ("start_time".to_string(), ParameterValue::from("2001-01-01")),
                ("end_time".to_string(), ParameterValue::from("2010-12-31")),
                ("max_spinups_in_years".to_string(), ParameterValue::from("20")),
            ]
        );
    }

    #[test]
    fn setup_writes_overridden_config() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let work_dir = fixture.root.path().join("work");
        let mut model =
            PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config).unwrap();

        let (config_file, returned_dir) = model
            .setup(
                PCRGlobWBSetup::new(RasterBmi::default())
                    .with_start_time("2002-01-01T00:00Z")
                    .with_end_time("2002-12-31T00:00Z")
                    .with_max_spinups_in_years(0)
                    .with_work_dir(&work_dir),
            )
            .unwrap();

        assert_eq!(returned_dir, work_dir);
        assert_eq!(config_file, work_dir.join(CONFIG_FILENAME));

        let written = std::fs::read_to_string(&config_file).unwrap();
        assert_eq!(
            read_option(&written, GLOBAL_OPTIONS, "startTime").as_deref(),
            Some("2002-01-01")
        );
        assert_eq!(
            read_option(&written, GLOBAL_OPTIONS, "maxSpinUpsInYears").as_deref(),
            Some("0")
        );
        assert_eq!(
            read_option(&written, GLOBAL_OPTIONS, "outputDir"),
            Some(work_dir.to_string_lossy().into_owned())
        );
        assert_eq!(
            read_option(&written, GLOBAL_OPTIONS, "inputDir"),
            Some(fixture.parameter_set.directory().to_string_lossy().into_owned())
        );
        assert_eq!(
            read_option(&written, "meteoOptions", "precipitationNC").as_deref(),
            Some("precipitation.nc")
        );

        assert_eq!(
            model.parameters()[0],
            ("start_time".to_string(), ParameterValue::from("2002-01-01"))
        );
        assert!(model.core().has_bmi());
    }

    #[test]
    fn setup_defaults_to_output_dir() {
        let fixture = fixture("pcrglobwb", &[]);
        let mut model =
            PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config).unwrap();

        let (config_file, work_dir) = model.setup(PCRGlobWBSetup::new(RasterBmi::default())).unwrap();

        assert!(work_dir.starts_with(fixture.root.path().join("output")));
        assert!(config_file.is_file());
    }

    #[test]
    fn setup_rejects_invalid_time() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let mut model =
            PCRGlobWB::new("setters", fixture.parameter_set.clone(), &fixture.config).unwrap();

        let result = model.setup(PCRGlobWBSetup::new(RasterBmi::default()).with_start_time("soon"));

        assert!(matches!(result, Err(EWCError::InvalidTime { .. })));
        assert!(!model.core().has_bmi());
    }

    #[test]
    fn coords_to_indices_snaps_to_nearest_cell() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let model = model_after_setup(&fixture, RasterBmi::default());

        let selection = model
            .coords_to_indices("discharge", &[52.3, 51.8], &[5.3, 6.1])
            .unwrap();

        assert_eq!(selection.indices, vec![0, 5]);
        assert_eq!(selection.lat, vec![52.25, 51.75]);
        assert_eq!(selection.lon, vec![5.25, 6.25]);
    }

    #[test]
    fn get_and_set_value_at_coords() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let bmi = RasterBmi::default();
        let writes = Rc::clone(&bmi.writes);
        let mut model = model_after_setup(&fixture, bmi);

        let value = model
            .get_value_at_coords("discharge", &[51.8], &[5.8])
            .unwrap();
        assert_eq!(value, array![5.0]);

        model
            .set_value_at_coords("precipitation", &[51.8], &[5.8], array![0.5].view())
            .unwrap();
        assert_eq!(
            writes.borrow().as_slice(),
            [("precipitation".to_string(), vec![4], vec![0.5])]
        );
    }

    #[test]
    fn labeled_value_has_grid_coordinates() {
        let fixture = fixture("pcrglobwb", &["setters"]);
        let model = model_after_setup(&fixture, RasterBmi::default());

        let labeled = model.get_value_as_labeled("discharge").unwrap();

        assert_eq!(labeled.dims(), ["latitude", "longitude"]);
        assert_eq!(labeled.data().shape(), &[2, 3]);
        assert_eq!(
            labeled.data().iter().copied().collect::<Vec<_>>(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(
            labeled.coord("longitude").unwrap().values,
            CoordinateValues::Float(vec![5.25, 5.75, 6.25])
        );
        let expected_time = NaiveDate::from_ymd_opt(2000, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(
            labeled.coord("time").unwrap().values,
            CoordinateValues::Time(vec![expected_time])
        );
        assert_eq!(labeled.attrs()["units"], "m3.s-1");
    }

    #[test]
    fn overrides_append_missing_options_and_sections() {
        let text = "[other]\na = 1\n";
        let result = apply_overrides(text, GLOBAL_OPTIONS, &[("startTime", "2000-01-01".to_string())]);

        assert_eq!(result, "[other]\na = 1\n[globalOptions]\nstartTime = 2000-01-01\n");

        let text = "[globalOptions]\n# startTime = 1999-01-01\n[other]\n";
        let result = apply_overrides(text, GLOBAL_OPTIONS, &[("startTime", "2000-01-01".to_string())]);

        assert_eq!(
            result,
            "[globalOptions]\n# startTime = 1999-01-01\nstartTime = 2000-01-01\n[other]\n"
        );
    }
}
