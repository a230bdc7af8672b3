use super::{Communicator, Packet, SparsityPattern};
use crate::base::DofPartition;
use crate::StrError;
use russell_lab::{Matrix, Vector};
use russell_sparse::{CooMatrix, Sym};
use std::collections::HashMap;

/// Implements a sparse matrix distributed over the ranks of a partitioned mesh
///
/// The values are accumulated locally (including rows owned by other ranks) and
/// then reduced by [DistributedMatrix::finalize], which ships the non-owned rows
/// to their owners. Entries can only be read after finalize.
///
/// The values are stored in the compressed rows of the sparsity pattern, thus
/// [DistributedMatrix::add] rejects any entry outside the pattern. The owned rows
/// are handed to `russell_sparse` by [DistributedMatrix::to_coo].
pub struct DistributedMatrix {
    partition: DofPartition,
    row_index: HashMap<usize, usize>,
    rows: Vec<usize>,
    row_ptr: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    finalized: bool,
}

/// Implements a dense vector distributed over the ranks of a partitioned mesh
///
/// Same "accumulate locally, then reduce" discipline as [DistributedMatrix].
pub struct DistributedVector {
    partition: DofPartition,
    values: Vec<f64>,
    finalized: bool,
}

impl DistributedMatrix {
    /// Allocates a new instance with zero values (CSR layout)
    ///
    /// # Panics
    ///
    /// This function will panic if the pattern has not been compressed
    pub fn new(pattern: &SparsityPattern) -> Self {
        assert!(pattern.is_compressed(), "the sparsity pattern must be compressed");
        let mut row_index = HashMap::new();
        let mut rows = Vec::new();
        let mut row_ptr = vec![0];
        let mut cols = Vec::with_capacity(pattern.nnz());
        for (row, columns) in pattern.rows() {
            row_index.insert(row, rows.len());
            rows.push(row);
            cols.extend_from_slice(columns);
            row_ptr.push(cols.len());
        }
        let nnz = cols.len();
        DistributedMatrix {
            partition: pattern.partition.clone(),
            row_index,
            rows,
            row_ptr,
            cols,
            values: vec![0.0; nnz],
            finalized: false,
        }
    }

    /// Returns the position of an entry in the CSR arrays
    fn position(&self, row: usize, col: usize) -> Option<usize> {
        let k = *self.row_index.get(&row)?;
        let (start, end) = (self.row_ptr[k], self.row_ptr[k + 1]);
        self.cols[start..end].binary_search(&col).ok().map(|p| start + p)
    }

    /// Returns the matrix dimension (total number of DOFs)
    pub fn n_dofs(&self) -> usize {
        self.partition.n_dofs()
    }

    /// Returns true if the matrix has been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Adds a value to an entry
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> Result<(), StrError> {
        if self.finalized {
            return Err("cannot add after finalize");
        }
        let p = self.position(row, col).ok_or("entry is not in the sparsity pattern")?;
        self.values[p] += value;
        Ok(())
    }

    /// Combines the contributions of all ranks (collective)
    pub fn finalize(&mut self, comm: &dyn Communicator) -> Result<(), StrError> {
        if self.finalized {
            return Err("cannot finalize twice");
        }
        if comm.size() != self.partition.n_rank {
            return Err("the communicator size does not match the partition");
        }
        let mut outgoing: Vec<Vec<Packet>> = vec![Vec::new(); comm.size()];
        for (k, row) in self.rows.iter().enumerate() {
            let owner = self.partition.owner(*row);
            if owner == self.partition.rank {
                continue;
            }
            for p in self.row_ptr[k]..self.row_ptr[k + 1] {
                if self.values[p] != 0.0 {
                    outgoing[owner].push((*row, self.cols[p], self.values[p]));
                    self.values[p] = 0.0;
                }
            }
        }
        for (row, col, value) in comm.exchange(outgoing)? {
            let p = self.position(row, col).ok_or("entry is not in the sparsity pattern")?;
            self.values[p] += value;
        }
        self.finalized = true;
        Ok(())
    }

    /// Returns an entry of an owned row (zero if not stored)
    pub fn get(&self, row: usize, col: usize) -> Result<f64, StrError> {
        if !self.finalized {
            return Err("cannot read before finalize");
        }
        if row >= self.n_dofs() || !self.partition.is_owned(row) {
            return Err("row is not owned by this rank");
        }
        Ok(self.position(row, col).map_or(0.0, |p| self.values[p]))
    }

    /// Returns the stored (row, column, value) triplets of the owned rows
    pub fn owned_triplets(&self) -> Result<Vec<Packet>, StrError> {
        if !self.finalized {
            return Err("cannot read before finalize");
        }
        let mut triplets = Vec::new();
        for (k, row) in self.rows.iter().enumerate() {
            if self.partition.is_owned(*row) {
                for p in self.row_ptr[k]..self.row_ptr[k + 1] {
                    triplets.push((*row, self.cols[p], self.values[p]));
                }
            }
        }
        Ok(triplets)
    }

    /// Returns a dense matrix with the owned rows (other rows are zero)
    pub fn to_dense(&self) -> Result<Matrix, StrError> {
        let n = self.n_dofs();
        let mut dense = Matrix::new(n, n);
        for (row, col, value) in self.owned_triplets()? {
            dense.set(row, col, value);
        }
        Ok(dense)
    }

    /// Returns a COO matrix with the owned rows, ready for a sparse solver
    pub fn to_coo(&self) -> Result<CooMatrix, StrError> {
        let triplets = self.owned_triplets()?;
        let n = self.n_dofs();
        let mut coo = CooMatrix::new(n, n, usize::max(1, triplets.len()), Sym::No)?;
        for (row, col, value) in triplets {
            coo.put(row, col, value)?;
        }
        Ok(coo)
    }
}

impl DistributedVector {
    /// Allocates a new instance with zero values
    pub fn new(pattern: &SparsityPattern) -> Self {
        DistributedVector {
            partition: pattern.partition.clone(),
            values: vec![0.0; pattern.n_dofs()],
            finalized: false,
        }
    }

    /// Returns the dimension (total number of DOFs)
    pub fn n_dofs(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the vector has been finalized
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Adds a value to an entry
    pub fn add(&mut self, index: usize, value: f64) -> Result<(), StrError> {
        if self.finalized {
            return Err("cannot add after finalize");
        }
        if index >= self.values.len() {
            return Err("vector index is out-of-bounds");
        }
        self.values[index] += value;
        Ok(())
    }

    /// Combines the contributions of all ranks (collective)
    pub fn finalize(&mut self, comm: &dyn Communicator) -> Result<(), StrError> {
        if self.finalized {
            return Err("cannot finalize twice");
        }
        if comm.size() != self.partition.n_rank {
            return Err("the communicator size does not match the partition");
        }
        let mut outgoing: Vec<Vec<Packet>> = vec![Vec::new(); comm.size()];
        for (index, value) in self.values.iter_mut().enumerate() {
            let owner = self.partition.owner(index);
            if owner != self.partition.rank && *value != 0.0 {
                outgoing[owner].push((index, 0, *value));
                *value = 0.0;
            }
        }
        for (index, _, value) in comm.exchange(outgoing)? {
            self.values[index] += value;
        }
        self.finalized = true;
        Ok(())
    }

    /// Returns an owned entry
    pub fn get(&self, index: usize) -> Result<f64, StrError> {
        if !self.finalized {
            return Err("cannot read before finalize");
        }
        if index >= self.values.len() || !self.partition.is_owned(index) {
            return Err("row is not owned by this rank");
        }
        Ok(self.values[index])
    }

    /// Returns the (index, value) pairs of the owned entries
    pub fn owned_entries(&self) -> Result<Vec<(usize, f64)>, StrError> {
        if !self.finalized {
            return Err("cannot read before finalize");
        }
        Ok(self
            .values
            .iter()
            .enumerate()
            .filter(|(i, _)| self.partition.is_owned(*i))
            .map(|(i, v)| (i, *v))
            .collect())
    }

    /// Returns a full vector with the owned entries (other entries are zero)
    pub fn to_vector(&self) -> Result<Vector, StrError> {
        let mut full = Vector::new(self.n_dofs());
        for (i, v) in self.owned_entries()? {
            full[i] = v;
        }
        Ok(full)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
