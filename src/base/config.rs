use super::{BoundaryId, BoundaryIds, Field, FieldComponentMap, OperatingMode};
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Holds the raw (unvalidated) configuration keys
///
/// All keys are required; they are optional here only so that a missing key
/// can be reported by name when [Config::new] validates the input.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConfigInput {
    /// Component index of the solid potential
    pub solid_potential_component: Option<usize>,

    /// Component index of the liquid potential
    pub liquid_potential_component: Option<usize>,

    /// Component index of the temperature
    pub temperature_component: Option<usize>,

    /// Boundary identifier of the anode (grounded)
    pub anode_boundary_id: Option<BoundaryId>,

    /// Boundary identifier of the cathode
    pub cathode_boundary_id: Option<BoundaryId>,

    /// Operating mode (constant voltage or constant current)
    pub operating_mode: Option<OperatingMode>,

    /// Time step size Δt baked into the system matrix
    pub time_step: Option<f64>,
}

/// Holds the validated configuration of the electrochemical kernel
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Config {
    /// Maps the fields to components of the DOF space
    pub components: FieldComponentMap,

    /// Maps the anode and cathode tags to boundary identifiers
    pub boundaries: BoundaryIds,

    /// Operating mode (determines the treatment of the cathode)
    pub operating_mode: OperatingMode,

    /// Time step size Δt
    pub time_step: f64,
}

impl Config {
    /// Validates the input and allocates a new instance
    ///
    /// # Input
    ///
    /// * `input` -- the raw configuration keys
    /// * `n_components` -- the number of components of the DOF space
    pub fn new(input: &ConfigInput, n_components: usize) -> Result<Self, StrError> {
        let solid = input
            .solid_potential_component
            .ok_or("solid_potential_component is missing")?;
        let liquid = input
            .liquid_potential_component
            .ok_or("liquid_potential_component is missing")?;
        let temperature = input.temperature_component.ok_or("temperature_component is missing")?;
        let anode = input.anode_boundary_id.ok_or("anode_boundary_id is missing")?;
        let cathode = input.cathode_boundary_id.ok_or("cathode_boundary_id is missing")?;
        let operating_mode = input.operating_mode.ok_or("operating_mode is missing")?;
        let time_step = input.time_step.ok_or("time_step is missing")?;
        let components = FieldComponentMap::new(solid, liquid, temperature, n_components)?;
        if anode == cathode {
            return Err("anode_boundary_id and cathode_boundary_id must differ");
        }
        if !operating_mode.value().is_finite() {
            return Err("operating_mode value must be finite");
        }
        if !(time_step > 0.0) || !time_step.is_finite() {
            return Err("time_step must be > 0.0");
        }
        Ok(Config {
            components,
            boundaries: BoundaryIds { anode, cathode },
            operating_mode,
            time_step,
        })
    }

    /// Parses a JSON string and validates the configuration
    pub fn from_json(text: &str, n_components: usize) -> Result<Self, StrError> {
        let input: ConfigInput = serde_json::from_str(text).map_err(|_| "cannot parse configuration")?;
        Config::new(&input, n_components)
    }

    /// Reads a JSON file and validates the configuration
    ///
    /// # Input
    ///
    /// * `full_path` -- may be a String, &str, or Path
    /// * `n_components` -- the number of components of the DOF space
    pub fn read_json<P>(full_path: &P, n_components: usize) -> Result<Self, StrError>
    where
        P: AsRef<OsStr> + ?Sized,
    {
        let path = Path::new(full_path).to_path_buf();
        let file = File::open(path).map_err(|_| "cannot open configuration file")?;
        let buffered = BufReader::new(file);
        let input: ConfigInput = serde_json::from_reader(buffered).map_err(|_| "cannot parse configuration")?;
        Config::new(&input, n_components)
    }

    /// Returns the component index of a field
    #[inline]
    pub fn component(&self, field: Field) -> usize {
        self.components.component(field)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration data\n")?;
        write!(f, "==================\n")?;
        write!(f, "{}", self.components)?;
        write!(f, "anode_boundary_id = {}\n", self.boundaries.anode)?;
        write!(f, "cathode_boundary_id = {}\n", self.boundaries.cathode)?;
        write!(f, "operating_mode = {}\n", self.operating_mode)?;
        write!(f, "time_step = {:?}\n", self.time_step)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
