use super::{DistributedMatrix, DistributedVector};
use crate::base::{BoundaryIds, DofTopology, Field, FieldComponentMap, OperatingMode};
use crate::StrError;
use russell_lab::{Matrix, Vector};
use std::collections::BTreeMap;

/// Tolerance to drop negligible weights while closing the constraint set
const WEIGHT_TOL: f64 = 1e-15;

/// Holds an affine constraint: u[dof] = Σ weight · u[entry] + inhomogeneity
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintLine {
    /// The constrained DOF
    pub dof: usize,

    /// The (dof, weight) pairs of the dependency DOFs (empty for Dirichlet conditions)
    pub entries: Vec<(usize, f64)>,

    /// The constant part (prescribed value)
    pub inhomogeneity: f64,
}

/// Holds the affine constraints of the DOF space (hanging nodes and Dirichlet conditions)
///
/// The set must be closed with [ConstraintSet::close] before use; after closing,
/// no entry refers to a constrained DOF.
#[derive(Clone, Debug)]
pub struct ConstraintSet {
    lines: BTreeMap<usize, ConstraintLine>,
    closed: bool,
}

impl ConstraintSet {
    /// Allocates a new (empty and open) instance
    pub fn new() -> Self {
        ConstraintSet {
            lines: BTreeMap::new(),
            closed: false,
        }
    }

    /// Builds the closed constraint set of the electrochemical problem
    ///
    /// 1. hanging-node interpolation for every component of each hanging point
    /// 2. grounded anode: solid potential equal to zero
    /// 3. under a constant voltage: solid potential on the cathode equal to the voltage
    ///
    /// Hanging-node constraints take precedence over the boundary conditions.
    pub fn build(
        topology: &DofTopology,
        components: &FieldComponentMap,
        boundaries: &BoundaryIds,
        mode: OperatingMode,
    ) -> Result<Self, StrError> {
        components.check(topology.n_components)?;
        let mut constraints = ConstraintSet::new();
        for hanging in topology.hanging_points() {
            for c in 0..topology.n_components {
                let entries = hanging.parents.iter().map(|(p, w)| (topology.dof(*p, c), *w)).collect();
                constraints.add_line(topology.dof(hanging.point, c), entries, 0.0)?;
            }
        }
        let solid = components.component(Field::SolidPotential);
        for p in topology.points_with_id(boundaries.anode) {
            constraints.add_line(topology.dof(p, solid), Vec::new(), 0.0)?;
        }
        if let OperatingMode::ConstantVoltage(voltage) = mode {
            for p in topology.points_with_id(boundaries.cathode) {
                constraints.add_line(topology.dof(p, solid), Vec::new(), voltage)?;
            }
        }
        constraints.close()?;
        log::trace!(
            "constraint set with {} lines ({} hanging points)",
            constraints.len(),
            topology.hanging_points().len()
        );
        Ok(constraints)
    }

    /// Adds a constraint line; returns false (and ignores the line) if the DOF is already constrained
    pub fn add_line(&mut self, dof: usize, entries: Vec<(usize, f64)>, inhomogeneity: f64) -> Result<bool, StrError> {
        if self.closed {
            return Err("cannot add a line to a closed constraint set");
        }
        if self.lines.contains_key(&dof) {
            return Ok(false);
        }
        if entries.iter().any(|(d, _)| *d == dof) {
            return Err("a constraint line cannot depend on its own DOF");
        }
        self.lines.insert(
            dof,
            ConstraintLine {
                dof,
                entries,
                inhomogeneity,
            },
        );
        Ok(true)
    }

    /// Resolves the transitive chains of constraints (idempotent)
    pub fn close(&mut self) -> Result<(), StrError> {
        if self.closed {
            return Ok(());
        }
        let n_lines = self.lines.len();
        let dofs: Vec<_> = self.lines.keys().copied().collect();
        for _ in 0..(n_lines + 1) {
            let mut changed = false;
            for dof in &dofs {
                let line = &self.lines[dof];
                if line.entries.iter().all(|(d, _)| !self.lines.contains_key(d)) {
                    continue;
                }
                let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
                let mut inhomogeneity = line.inhomogeneity;
                for (d, w) in &line.entries {
                    match self.lines.get(d) {
                        Some(other) => {
                            for (dd, ww) in &other.entries {
                                *merged.entry(*dd).or_insert(0.0) += w * ww;
                            }
                            inhomogeneity += w * other.inhomogeneity;
                        }
                        None => *merged.entry(*d).or_insert(0.0) += w,
                    }
                }
                if merged.contains_key(dof) {
                    return Err("cyclic constraints cannot be closed");
                }
                if let Some(line) = self.lines.get_mut(dof) {
                    line.entries = merged.into_iter().filter(|(_, w)| f64::abs(*w) > WEIGHT_TOL).collect();
                    line.inhomogeneity = inhomogeneity;
                    changed = true;
                }
            }
            if !changed {
                self.closed = true;
                return Ok(());
            }
        }
        Err("cyclic constraints cannot be closed")
    }

    /// Returns true if the set has been closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the number of constrained DOFs
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true if there are no constraints
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Returns true if the DOF is constrained
    #[inline]
    pub fn is_constrained(&self, dof: usize) -> bool {
        self.lines.contains_key(&dof)
    }

    /// Returns the constraint line of a DOF, if constrained
    pub fn line(&self, dof: usize) -> Option<&ConstraintLine> {
        self.lines.get(&dof)
    }

    /// Returns the inhomogeneity of a DOF (zero if unconstrained)
    pub fn inhomogeneity(&self, dof: usize) -> f64 {
        self.lines.get(&dof).map_or(0.0, |line| line.inhomogeneity)
    }

    /// Returns an iterator over the constraint lines (sorted by DOF)
    pub fn lines(&self) -> impl Iterator<Item = &ConstraintLine> {
        self.lines.values()
    }

    /// Returns the (dof, weight) pairs receiving the contributions of a DOF
    ///
    /// An unconstrained DOF maps onto itself; a Dirichlet DOF maps onto nothing.
    pub fn targets(&self, dof: usize) -> Vec<(usize, f64)> {
        match self.lines.get(&dof) {
            Some(line) => line.entries.clone(),
            None => vec![(dof, 1.0)],
        }
    }

    /// Scatters a local matrix and vector into the global system, eliminating the constrained DOFs
    ///
    /// With `use_inhomogeneities`, the prescribed values move to the right-hand side.
    /// Each constrained row receives a positive diagonal entry (and the matching
    /// right-hand side), so that the solution of the finalized system returns the
    /// prescribed values on the Dirichlet DOFs.
    ///
    /// # Panics
    ///
    /// This function will panic if the dimensions of the local arrays do not match `local_to_global`
    pub fn distribute_local_to_global(
        &self,
        kk_local: &Matrix,
        ff_local: &Vector,
        local_to_global: &[usize],
        use_inhomogeneities: bool,
        kk_global: &mut DistributedMatrix,
        ff_global: &mut DistributedVector,
    ) -> Result<(), StrError> {
        assert!(self.closed, "the constraint set must be closed");
        let n = local_to_global.len();
        assert_eq!(kk_local.dims(), (n, n));
        assert_eq!(ff_local.dim(), n);
        let targets: Vec<_> = local_to_global.iter().map(|g| self.targets(*g)).collect();
        for i in 0..n {
            for (ri, wi) in &targets[i] {
                ff_global.add(*ri, wi * ff_local[i])?;
                for j in 0..n {
                    let kij = kk_local.get(i, j);
                    if kij == 0.0 {
                        continue;
                    }
                    for (cj, wj) in &targets[j] {
                        kk_global.add(*ri, *cj, wi * wj * kij)?;
                    }
                    if use_inhomogeneities {
                        let g = self.inhomogeneity(local_to_global[j]);
                        if g != 0.0 {
                            ff_global.add(*ri, -wi * kij * g)?;
                        }
                    }
                }
            }
        }
        let diag = constrained_diagonal(kk_local);
        for i in 0..n {
            let g = local_to_global[i];
            if let Some(line) = self.lines.get(&g) {
                let kii = f64::abs(kk_local.get(i, i));
                let d = if kii > 0.0 { kii } else { diag };
                kk_global.add(g, g, d)?;
                if use_inhomogeneities && line.inhomogeneity != 0.0 {
                    ff_global.add(g, d * line.inhomogeneity)?;
                }
            }
        }
        Ok(())
    }

    /// Scatters a local vector (e.g., a Neumann contribution) into the global vector, eliminating the constrained DOFs
    pub fn distribute_local_vector(
        &self,
        ff_local: &Vector,
        local_to_global: &[usize],
        ff_global: &mut DistributedVector,
    ) -> Result<(), StrError> {
        assert_eq!(ff_local.dim(), local_to_global.len());
        for (i, g) in local_to_global.iter().enumerate() {
            for (r, w) in self.targets(*g) {
                ff_global.add(r, w * ff_local[i])?;
            }
        }
        Ok(())
    }

    /// Sets the constrained entries of a (full) solution vector from the unconstrained ones
    pub fn distribute(&self, solution: &mut Vector) {
        for line in self.lines.values() {
            let value = line
                .entries
                .iter()
                .fold(line.inhomogeneity, |acc, (d, w)| acc + w * solution[*d]);
            solution[line.dof] = value;
        }
    }
}

/// Returns the mean absolute diagonal of a local matrix, or one if the diagonal is zero
fn constrained_diagonal(kk_local: &Matrix) -> f64 {
    let n = kk_local.dims().0;
    let sum: f64 = (0..n).map(|i| f64::abs(kk_local.get(i, i))).sum();
    if sum > 0.0 {
        sum / (n as f64)
    } else {
        1.0
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
