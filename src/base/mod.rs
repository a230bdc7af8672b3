//! Implements the base structures for the electrochemical simulation

mod config;
mod dof_topology;
mod enums;
mod field_components;
mod material_sampler;
mod sample_meshes;
pub use crate::base::config::*;
pub use crate::base::dof_topology::*;
pub use crate::base::enums::*;
pub use crate::base::field_components::*;
pub use crate::base::material_sampler::*;
pub use crate::base::sample_meshes::*;
