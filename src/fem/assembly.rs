use super::{Communicator, ConstraintSet, DistributedMatrix, DistributedVector, OperatorBase, SparsityPattern};
use crate::base::{face_local_nodes, Coefficient, Config, DofTopology, Field, MaterialSampler, OperatingMode};
use crate::StrError;
use gemlab::integ;
use gemlab::mesh::CellId;
use gemlab::shapes::Scratchpad;
use rayon::prelude::*;
use russell_lab::{Matrix, Vector};
use russell_tensor::Tensor2;
use std::time::Instant;

/// Holds the local (cell) contributions of one cell
struct LocalSystem {
    /// Local-to-global map
    l2g: Vec<usize>,

    /// System matrix: mass + Δt · (diffusion + Faradaic coupling)
    kk: Matrix,

    /// Mass matrix (double-layer capacitance)
    mm: Matrix,

    /// Right-hand side (no volume source)
    ff: Vector,
}

/// Assembles the system matrix, mass matrix, and load vector of the coupled potential problem
///
/// The bilinear form acts on the (solid potential, liquid potential) pair:
///
/// ```text
/// mass:      c  (φs_i − φl_i)(φs_j − φl_j)
/// diffusion: σs ∇φs_i·∇φs_j + σl ∇φl_i·∇φl_j
/// Faradaic:  a  (φs_i − φl_i)(φs_j − φl_j)
/// system = mass + Δt (diffusion + Faradaic)
/// ```
///
/// Each rank assembles its own cells; the results are combined on finalize.
pub struct AssemblyEngine<'a> {
    /// Holds the DOF topology
    pub topology: &'a DofTopology<'a>,

    /// Holds the closed constraint set
    pub constraints: &'a ConstraintSet,

    /// Holds the sparsity pattern of this rank
    pub pattern: &'a SparsityPattern,

    /// Holds the configuration (components, boundaries, operating mode, time step)
    pub config: &'a Config,
}

impl<'a> AssemblyEngine<'a> {
    /// Allocates a new instance
    pub fn new(
        topology: &'a DofTopology<'a>,
        constraints: &'a ConstraintSet,
        pattern: &'a SparsityPattern,
        config: &'a Config,
    ) -> Result<Self, StrError> {
        config.components.check(topology.n_components)?;
        if !constraints.is_closed() {
            return Err("the constraint set must be closed before assembly");
        }
        if !pattern.is_compressed() || pattern.n_dofs() != topology.n_dofs() {
            return Err("the sparsity pattern does not match the DOF topology");
        }
        Ok(AssemblyEngine {
            topology,
            constraints,
            pattern,
            config,
        })
    }

    /// Assembles the system matrix, mass matrix, and load vector (collective)
    ///
    /// Under a constant current, the cathode current density enters the load vector
    /// as a flux: Δt · J · φs_i integrated over every cathode face.
    ///
    /// If the local work fails on any rank, all ranks return an error.
    pub fn assemble(&self, sampler: &dyn MaterialSampler, comm: &dyn Communicator) -> Result<OperatorBase, StrError> {
        let start = Instant::now();
        let cells = self.topology.owned_cells(self.pattern.partition.rank);
        let local = self.accumulate(&cells, sampler);
        let all_ok = comm.all_ok(local.is_ok())?;
        let mut operator = local?;
        if !all_ok {
            return Err("assembly has failed on another rank");
        }
        operator.finalize(comm)?;
        log::debug!(
            "assembly of rank {}: {} cells in {:?}",
            comm.rank(),
            cells.len(),
            start.elapsed()
        );
        Ok(operator)
    }

    /// Recomputes only the load vector (e.g., after the boundary data has changed) (collective)
    pub fn assemble_load(
        &self,
        sampler: &dyn MaterialSampler,
        comm: &dyn Communicator,
    ) -> Result<DistributedVector, StrError> {
        let start = Instant::now();
        let cells = self.topology.owned_cells(self.pattern.partition.rank);
        let local = self.accumulate_load(&cells, sampler);
        let all_ok = comm.all_ok(local.is_ok())?;
        let mut load = local?;
        if !all_ok {
            return Err("assembly has failed on another rank");
        }
        load.finalize(comm)?;
        log::debug!("load vector of rank {} in {:?}", comm.rank(), start.elapsed());
        Ok(load)
    }

    /// Accumulates the contributions of the given cells (no communication)
    fn accumulate(&self, cells: &[CellId], sampler: &dyn MaterialSampler) -> Result<OperatorBase, StrError> {
        let locals = self.local_systems(cells, sampler)?;
        let use_inhomogeneities = self.config.operating_mode.inhomogeneous_bc();
        let mut operator = OperatorBase::new(self.pattern);
        for local in &locals {
            self.constraints.distribute_local_to_global(
                &local.kk,
                &local.ff,
                &local.l2g,
                use_inhomogeneities,
                &mut operator.stiffness_matrix,
                &mut operator.load_vector,
            )?;
            let n = local.l2g.len();
            for i in 0..n {
                for j in 0..n {
                    operator.mass_matrix.add(local.l2g[i], local.l2g[j], local.mm.get(i, j))?;
                }
            }
        }
        self.add_cathode_flux(cells, &mut operator.load_vector)?;
        Ok(operator)
    }

    /// Accumulates the load vector of the given cells (no communication)
    fn accumulate_load(&self, cells: &[CellId], sampler: &dyn MaterialSampler) -> Result<DistributedVector, StrError> {
        let mut load = DistributedVector::new(self.pattern);
        if self.config.operating_mode.inhomogeneous_bc() {
            // the inhomogeneities require the local matrices
            let mut scratch = DistributedMatrix::new(self.pattern);
            for local in self.local_systems(cells, sampler)? {
                self.constraints.distribute_local_to_global(
                    &local.kk,
                    &local.ff,
                    &local.l2g,
                    true,
                    &mut scratch,
                    &mut load,
                )?;
            }
        }
        self.add_cathode_flux(cells, &mut load)?;
        Ok(load)
    }

    /// Computes the local systems of the given cells in parallel (in the order of the cells)
    fn local_systems(&self, cells: &[CellId], sampler: &dyn MaterialSampler) -> Result<Vec<LocalSystem>, StrError> {
        cells
            .par_iter()
            .map(|cell_id| self.local_system(*cell_id, sampler))
            .collect()
    }

    /// Computes the local system of a cell
    ///
    /// The scalar blocks ∫ N c N, ∫ N a N, ∫ B σs B, and ∫ B σl B are integrated
    /// node by node and then spread over the interleaved components.
    fn local_system(&self, cell_id: CellId, sampler: &dyn MaterialSampler) -> Result<LocalSystem, StrError> {
        let mesh = self.topology.mesh;
        let cell = &mesh.cells[cell_id];
        let mut pad = Scratchpad::new(mesh.ndim, cell.kind)?;
        mesh.set_pad(&mut pad, &cell.points);
        let ips = integ::default_points(cell.kind);
        let ngauss = ips.len();
        let capacitance = sampler.get_values(Coefficient::SpecificCapacitance, cell, ngauss)?;
        let sigma_s = sampler.get_values(Coefficient::SolidConductivity, cell, ngauss)?;
        let sigma_l = sampler.get_values(Coefficient::LiquidConductivity, cell, ngauss)?;
        let faradaic = sampler.get_values(Coefficient::FaradaicReactionCoefficient, cell, ngauss)?;
        for coefficients in [&capacitance, &sigma_s, &sigma_l, &faradaic] {
            if coefficients.len() != ngauss {
                return Err("the number of sampled values must equal the number of integration points");
            }
        }

        let nnode = cell.kind.nnode();
        let mut nn_c = Matrix::new(nnode, nnode);
        let mut nn_a = Matrix::new(nnode, nnode);
        let mut bb_s = Matrix::new(nnode, nnode);
        let mut bb_l = Matrix::new(nnode, nnode);
        let mut args = integ::CommonArgs::new(&mut pad, ips);
        integ::mat_01_nsn(&mut nn_c, &mut args, |p, _, _| Ok(capacitance[p]))?;
        integ::mat_01_nsn(&mut nn_a, &mut args, |p, _, _| Ok(faradaic[p]))?;
        integ::mat_03_btb(&mut bb_s, &mut args, |tt, p, _, _| {
            set_isotropic(tt, sigma_s[p]);
            Ok(())
        })?;
        integ::mat_03_btb(&mut bb_l, &mut args, |tt, p, _, _| {
            set_isotropic(tt, sigma_l[p]);
            Ok(())
        })?;

        let nc = self.topology.n_components;
        let s = self.config.component(Field::SolidPotential);
        let l = self.config.component(Field::LiquidPotential);
        let dt = self.config.time_step;
        let n = nnode * nc;
        let mut mm = Matrix::new(n, n);
        let mut kk = Matrix::new(n, n);
        for a in 0..nnode {
            for b in 0..nnode {
                let mass = nn_c.get(a, b);
                let far = nn_a.get(a, b);
                let (as_, al) = (a * nc + s, a * nc + l);
                let (bs, bl) = (b * nc + s, b * nc + l);

                // (φs − φl)(φs − φl) structure
                for (i, j, sign) in [(as_, bs, 1.0), (as_, bl, -1.0), (al, bs, -1.0), (al, bl, 1.0)] {
                    mm.add(i, j, sign * mass);
                    kk.add(i, j, sign * (mass + dt * far));
                }
                kk.add(as_, bs, dt * bb_s.get(a, b));
                kk.add(al, bl, dt * bb_l.get(a, b));
            }
        }
        Ok(LocalSystem {
            l2g: self.topology.local_to_global(cell_id),
            kk,
            mm,
            ff: Vector::new(n),
        })
    }

    /// Adds Δt · J · φs_i over the cathode faces of the given cells (constant current only)
    ///
    /// A cell with several cathode faces receives one contribution per face.
    fn add_cathode_flux(&self, cells: &[CellId], load: &mut DistributedVector) -> Result<(), StrError> {
        let current_density = match self.config.operating_mode {
            OperatingMode::ConstantCurrent(j) => j,
            OperatingMode::ConstantVoltage(..) => return Ok(()),
        };
        let mesh = self.topology.mesh;
        let cathode = self.config.boundaries.cathode;
        let nc = self.topology.n_components;
        let s = self.config.component(Field::SolidPotential);
        let dt = self.config.time_step;
        for cell_id in cells {
            let faces = self.topology.faces_with_id(*cell_id, cathode);
            if faces.is_empty() {
                continue;
            }
            let cell = &mesh.cells[*cell_id];
            let face_kind = cell.kind.edge_kind().ok_or("cell kind has no faces")?;
            let mut ff = Vector::new(cell.points.len() * nc);
            let mut ff_face = Vector::new(face_kind.nnode());
            for face in faces {
                let nodes = face_local_nodes(cell.kind, face);
                let points: Vec<_> = nodes.iter().map(|m| cell.points[*m]).collect();
                let mut pad = Scratchpad::new(mesh.ndim, face_kind)?;
                mesh.set_pad(&mut pad, &points);
                let mut args = integ::CommonArgs::new(&mut pad, integ::default_points(face_kind));
                integ::vec_01_ns(&mut ff_face, &mut args, |_, _| Ok(dt * current_density))?;
                for (i, m) in nodes.iter().enumerate() {
                    ff[m * nc + s] += ff_face[i];
                }
            }
            let l2g = self.topology.local_to_global(*cell_id);
            self.constraints.distribute_local_vector(&ff, &l2g, load)?;
        }
        Ok(())
    }
}

/// Sets an isotropic conductivity tensor: σ I
fn set_isotropic(tt: &mut Tensor2, sigma: f64) {
    tt.sym_set(0, 0, sigma);
    tt.sym_set(1, 1, sigma);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
