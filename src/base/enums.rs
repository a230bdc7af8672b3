use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines the identifier of a boundary (as tagged on the mesh edges)
pub type BoundaryId = usize;

/// Defines the physical fields carried by the multi-component DOF space
///
/// Note: The fixed numbering scheme assists in sorting the fields.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Field {
    /// Electric potential in the solid (electrode/collector) phase
    SolidPotential = 0,

    /// Electric potential in the liquid (electrolyte) phase
    LiquidPotential = 1,

    /// Temperature
    Temperature = 2,
}

impl Field {
    /// Returns the configuration key holding the component index of this field
    pub fn key(&self) -> &'static str {
        match self {
            Field::SolidPotential => "solid_potential_component",
            Field::LiquidPotential => "liquid_potential_component",
            Field::Temperature => "temperature_component",
        }
    }
}

/// Defines the two electrode terminals of the device
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum BoundaryTag {
    /// Grounded terminal (solid potential is always zero)
    Anode,

    /// Loaded terminal (prescribed voltage or current density)
    Cathode,
}

/// Defines how the cathode is loaded
///
/// The anode is always grounded. Under a constant voltage, the solid potential on the
/// cathode is prescribed (Dirichlet condition); under a constant current, the current
/// density enters the load vector as a flux (Neumann condition).
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub enum OperatingMode {
    /// Prescribed cathode potential (value)
    ConstantVoltage(f64),

    /// Prescribed cathode current density (value)
    ConstantCurrent(f64),
}

impl OperatingMode {
    /// Returns the value carried by the mode (voltage or current density)
    pub fn value(&self) -> f64 {
        match self {
            OperatingMode::ConstantVoltage(v) => *v,
            OperatingMode::ConstantCurrent(j) => *j,
        }
    }

    /// Returns true if the cathode receives an inhomogeneous Dirichlet condition
    pub fn inhomogeneous_bc(&self) -> bool {
        match self {
            OperatingMode::ConstantVoltage(..) => true,
            OperatingMode::ConstantCurrent(..) => false,
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::ConstantVoltage(v) => write!(f, "constant voltage = {:?}", v),
            OperatingMode::ConstantCurrent(j) => write!(f, "constant current density = {:?}", j),
        }
    }
}

/// Binds the boundary tags to the concrete boundary identifiers of the mesh
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct BoundaryIds {
    /// Identifier of the anode boundary
    pub anode: BoundaryId,

    /// Identifier of the cathode boundary
    pub cathode: BoundaryId,
}

impl BoundaryIds {
    /// Returns the boundary identifier bound to a tag
    pub fn id(&self, tag: BoundaryTag) -> BoundaryId {
        match tag {
            BoundaryTag::Anode => self.anode,
            BoundaryTag::Cathode => self.cathode,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
