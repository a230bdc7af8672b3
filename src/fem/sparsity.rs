use super::ConstraintSet;
use crate::base::{DofPartition, DofTopology};
use crate::StrError;
use std::collections::BTreeMap;

/// Holds the nonzero (row, column) pairs of the global matrices as seen by one rank
///
/// The rows are those receiving contributions from the cells of this rank (including
/// rows owned by other ranks, which are shipped to their owners on finalize) and
/// all rows owned by this rank. The pattern is immutable once compressed.
#[derive(Clone, Debug)]
pub struct SparsityPattern {
    /// Holds the ownership of the DOFs
    pub partition: DofPartition,

    /// Holds the column indices of each row
    rows: BTreeMap<usize, Vec<usize>>,

    /// Indicates that the columns are sorted and unique
    compressed: bool,
}

impl SparsityPattern {
    /// Allocates a new (empty) dynamic pattern
    pub fn new(partition: DofPartition) -> Self {
        SparsityPattern {
            partition,
            rows: BTreeMap::new(),
            compressed: false,
        }
    }

    /// Allocates a compressed full pattern with all (i, j) pairs (single rank)
    pub fn dense(n_dofs: usize) -> Self {
        let mut pattern = SparsityPattern::new(DofPartition::serial(n_dofs));
        for i in 0..n_dofs {
            pattern.rows.insert(i, (0..n_dofs).collect());
        }
        pattern.compressed = true;
        pattern
    }

    /// Builds the compressed pattern of a rank from the cell couplings and the constraints
    ///
    /// Every pair of DOFs of a cell is registered twice: as is (for the raw mass matrix)
    /// and redirected to the DOFs it depends on (for the constrained system matrix).
    /// Constrained rows keep their diagonal entry. Dirichlet DOFs are registered as if
    /// they were free, thus the pattern holds for any set of Dirichlet conditions.
    pub fn build(
        topology: &DofTopology,
        constraints: &ConstraintSet,
        partition: &DofPartition,
    ) -> Result<Self, StrError> {
        if partition.n_dofs() != topology.n_dofs() {
            return Err("the partition does not match the DOF topology");
        }
        let mut pattern = SparsityPattern::new(partition.clone());
        for cell in &topology.mesh.cells {
            let mine = topology.cell_owner(cell.id) == partition.rank;
            let l2g = topology.local_to_global(cell.id);
            let targets: Vec<_> = l2g
                .iter()
                .map(|g| match constraints.targets(*g) {
                    t if t.is_empty() => vec![(*g, 1.0)],
                    t => t,
                })
                .collect();
            for (i, gi) in l2g.iter().enumerate() {
                for (j, gj) in l2g.iter().enumerate() {
                    if mine || partition.is_owned(*gi) {
                        pattern.add(*gi, *gj)?;
                    }
                    for (ri, _) in &targets[i] {
                        if mine || partition.is_owned(*ri) {
                            for (cj, _) in &targets[j] {
                                pattern.add(*ri, *cj)?;
                            }
                        }
                    }
                }
            }
        }
        pattern.compress();
        log::trace!(
            "sparsity pattern of rank {}: {} rows, {} nonzeros",
            partition.rank,
            pattern.rows.len(),
            pattern.nnz()
        );
        Ok(pattern)
    }

    /// Adds a (row, column) pair
    pub fn add(&mut self, row: usize, col: usize) -> Result<(), StrError> {
        if self.compressed {
            return Err("cannot add to a compressed sparsity pattern");
        }
        let n = self.partition.n_dofs();
        if row >= n || col >= n {
            return Err("sparsity pattern index is out-of-bounds");
        }
        self.rows.entry(row).or_default().push(col);
        Ok(())
    }

    /// Sorts and removes duplicate columns
    pub fn compress(&mut self) {
        for cols in self.rows.values_mut() {
            cols.sort_unstable();
            cols.dedup();
        }
        self.compressed = true;
    }

    /// Returns true if the pattern has been compressed
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Returns the total number of DOFs (matrix dimension)
    pub fn n_dofs(&self) -> usize {
        self.partition.n_dofs()
    }

    /// Returns the number of stored (row, column) pairs
    pub fn nnz(&self) -> usize {
        self.rows.values().map(|cols| cols.len()).sum()
    }

    /// Returns an iterator over the rows and their columns (sorted by row)
    pub fn rows(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.rows.iter().map(|(r, cols)| (*r, cols.as_slice()))
    }

    /// Returns the columns of a row (empty if the row is not stored)
    pub fn columns(&self, row: usize) -> &[usize] {
        match self.rows.get(&row) {
            Some(cols) => cols,
            None => &[],
        }
    }

    /// Returns true if the (row, column) pair is stored
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.columns(row).binary_search(&col).is_ok()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
