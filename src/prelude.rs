//! Makes available common structures needed to assemble and post-process
//!
//! You may write `use ecsim::prelude::*` in your code and obtain
//! access to commonly used functionality.

pub use crate::base::{BoundaryIds, BoundaryTag, Coefficient, Config, ConfigInput, Field, FieldComponentMap};
pub use crate::base::{DofTopology, MaterialSampler, MaterialTable, OperatingMode, SampleMeshes};
pub use crate::fem::{AssemblyEngine, ConstraintSet, ElectrochemicalPhysics, OperatorBase, SparsityPattern};
pub use crate::fem::{Communicator, DistributedMatrix, DistributedVector, SerialComm, ThreadComm};
pub use crate::fem::{PostProcessor, Quantities, Quantity};
