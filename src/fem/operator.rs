use super::{Communicator, DistributedMatrix, DistributedVector, SparsityPattern};
use crate::base::DofTopology;
use crate::StrError;
use gemlab::mesh::CellAttribute;
use russell_lab::Vector;

/// Holds the discrete operators of a physics: stiffness (system) matrix, mass matrix, and load vector
///
/// The arrays are sized from a sparsity pattern and must be finalized before use.
pub struct OperatorBase {
    /// Holds the system matrix (mass + Δt · stiffness, with constraints eliminated)
    pub stiffness_matrix: DistributedMatrix,

    /// Holds the raw mass matrix (no constraints applied)
    pub mass_matrix: DistributedMatrix,

    /// Holds the right-hand side vector
    pub load_vector: DistributedVector,

    /// Holds the DOFs spanning a null-space candidate (see [OperatorBase::set_null_space])
    pub null_space_dof_indices: Vec<usize>,
}

impl OperatorBase {
    /// Allocates a new instance with zero values
    pub fn new(pattern: &SparsityPattern) -> Self {
        OperatorBase {
            stiffness_matrix: DistributedMatrix::new(pattern),
            mass_matrix: DistributedMatrix::new(pattern),
            load_vector: DistributedVector::new(pattern),
            null_space_dof_indices: Vec::new(),
        }
    }

    /// Combines the contributions of all ranks to the three arrays (collective)
    pub fn finalize(&mut self, comm: &dyn Communicator) -> Result<(), StrError> {
        self.stiffness_matrix.finalize(comm)?;
        self.mass_matrix.finalize(comm)?;
        self.load_vector.finalize(comm)
    }

    /// Selects the DOFs of a component touched only by cells of a given material
    ///
    /// A DOF incident to at least one cell with another attribute is excluded.
    /// The selected (sorted) DOFs are stored in `null_space_dof_indices` and returned.
    pub fn set_null_space(
        &mut self,
        topology: &DofTopology,
        component: usize,
        material_id: CellAttribute,
    ) -> Result<&[usize], StrError> {
        if component >= topology.n_components {
            return Err("component is out of range");
        }
        let cells = &topology.mesh.cells;
        self.null_space_dof_indices = (0..topology.mesh.points.len())
            .filter(|p| {
                let around = topology.point_cells(*p);
                !around.is_empty() && around.iter().all(|c| cells[*c].attribute == material_id)
            })
            .map(|p| topology.dof(p, component))
            .collect();
        Ok(&self.null_space_dof_indices)
    }

    /// Returns the (unnormalized) null-space basis vector: one on the selected DOFs and zero elsewhere
    pub fn null_space_vector(&self) -> Vector {
        let mut basis = Vector::new(self.load_vector.n_dofs());
        for dof in &self.null_space_dof_indices {
            basis[*dof] = 1.0;
        }
        basis
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
