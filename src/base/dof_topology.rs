use super::BoundaryId;
use crate::StrError;
use gemlab::mesh::{CellId, EdgeKey, Features, Mesh, PointId};
use gemlab::shapes::GeoKind;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Tolerance for the geometric detection of hanging points
const HANGING_TOL: f64 = 1e-10;

/// Returns the local node indices of a face (edge in 2D) ordered for an outward normal
///
/// The two corner nodes come first, followed by the middle nodes (if any).
pub fn face_local_nodes(kind: GeoKind, face: usize) -> Vec<usize> {
    (0..kind.edge_nnode()).map(|i| kind.edge_node_id(face, i)).collect()
}

/// Returns the key of an edge (sorted pair of corner point ids)
#[inline]
fn edge_key(a: PointId, b: PointId) -> EdgeKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Holds a point lying strictly inside an edge of a neighboring (coarser) cell
#[derive(Clone, Debug, PartialEq)]
pub struct HangingPoint {
    /// The hanging point
    pub point: PointId,

    /// The end points of the coarse edge and the interpolation weights
    pub parents: Vec<(PointId, f64)>,
}

/// Holds the ownership of DOFs by the ranks of a partitioned mesh
///
/// A DOF is owned by the lowest rank among the owners of the cells touching its point.
#[derive(Clone, Debug, PartialEq)]
pub struct DofPartition {
    /// The rank of this process
    pub rank: usize,

    /// The number of ranks
    pub n_rank: usize,

    /// The owner rank of each DOF (n_dofs)
    owner: Vec<usize>,
}

impl DofPartition {
    /// Allocates a partition with all DOFs owned by rank 0
    pub fn serial(n_dofs: usize) -> Self {
        DofPartition {
            rank: 0,
            n_rank: 1,
            owner: vec![0; n_dofs],
        }
    }

    /// Returns the number of DOFs
    pub fn n_dofs(&self) -> usize {
        self.owner.len()
    }

    /// Returns the owner rank of a DOF
    ///
    /// # Panics
    ///
    /// This function will panic if the DOF is out-of-bounds
    #[inline]
    pub fn owner(&self, dof: usize) -> usize {
        self.owner[dof]
    }

    /// Returns true if this rank owns the DOF
    #[inline]
    pub fn is_owned(&self, dof: usize) -> bool {
        self.owner[dof] == self.rank
    }

    /// Returns all DOFs owned by this rank (sorted)
    pub fn owned_dofs(&self) -> Vec<usize> {
        (0..self.owner.len()).filter(|d| self.owner[*d] == self.rank).collect()
    }
}

/// Holds the topology of the multi-component DOF space over a (possibly non-conforming) mesh
///
/// Every point carries `n_components` DOFs numbered as `point * n_components + component`.
/// The local-to-global map of a cell is node-major and component-minor.
///
/// ```text
/// local DOF: m * n_components + c   →   global DOF: cell.points[m] * n_components + c
/// ```
pub struct DofTopology<'a> {
    /// Holds an access to the Mesh
    pub mesh: &'a Mesh,

    /// Number of vector components of the DOF space
    pub n_components: usize,

    /// Holds the hanging points of non-conforming interfaces (sorted by point id)
    hanging: Vec<HangingPoint>,

    /// Holds the cells sharing each point
    point_cells: Vec<Vec<CellId>>,

    /// Holds all boundary faces as (cell id, local face index)
    boundary_faces: Vec<(CellId, usize)>,

    /// Holds the boundary identifiers of the tagged boundary faces
    boundary_ids: HashMap<(CellId, usize), BoundaryId>,

    /// Holds the owner rank of each cell
    cell_owner: Vec<usize>,

    /// Number of ranks (partitions)
    n_rank: usize,
}

impl<'a> DofTopology<'a> {
    /// Allocates a new instance (all cells owned by rank 0)
    ///
    /// This function detects the hanging points of non-conforming interfaces
    /// (one level of refinement across an edge) and the boundary faces.
    pub fn new(mesh: &'a Mesh, n_components: usize) -> Result<Self, StrError> {
        if n_components == 0 {
            return Err("n_components must be ≥ 1");
        }
        if mesh.ndim != 2 {
            return Err("only 2D meshes are supported");
        }
        let npoint = mesh.points.len();
        let mut point_cells = vec![Vec::new(); npoint];
        for (index, cell) in mesh.cells.iter().enumerate() {
            if cell.id != index {
                return Err("cell ids must be equal to their positions in the mesh");
            }
            if cell.kind.ndim() != 2 {
                return Err("cell kind is not supported");
            }
            if cell.points.len() != cell.kind.nnode() {
                return Err("number of cell points does not match the cell kind");
            }
            for p in &cell.points {
                if *p >= npoint {
                    return Err("cell point id is out-of-bounds");
                }
                point_cells[*p].push(cell.id);
            }
        }

        // hanging points and the coarse edges they lie on
        let mut hanging_map: BTreeMap<PointId, HangingPoint> = BTreeMap::new();
        let mut covered_edges = HashSet::new();
        for cell in &mesh.cells {
            for e in 0..cell.kind.nedge() {
                let a = cell.points[cell.kind.edge_node_id(e, 0)];
                let b = cell.points[cell.kind.edge_node_id(e, 1)];
                let mut candidates = BTreeSet::new();
                for c in point_cells[a].iter().chain(point_cells[b].iter()) {
                    for p in &mesh.cells[*c].points {
                        if !cell.points.contains(p) {
                            candidates.insert(*p);
                        }
                    }
                }
                for p in candidates {
                    if let Some(t) = inside_segment(mesh, p, a, b) {
                        if cell.kind.edge_nnode() != 2 {
                            return Err("hanging points require cells with two-node edges");
                        }
                        covered_edges.insert(edge_key(a, b));
                        hanging_map.entry(p).or_insert(HangingPoint {
                            point: p,
                            parents: vec![(a, 1.0 - t), (b, t)],
                        });
                    }
                }
            }
        }

        // boundary faces: edges of a single cell, except those on a non-conforming interface
        let is_fine_sub_edge = |u: PointId, v: PointId| match hanging_map.get(&u) {
            Some(h) => h.parents.iter().any(|(q, _)| *q == v),
            None => false,
        };
        let features = Features::new(mesh, false);
        let mut boundary_faces: Vec<_> = features
            .all_2d_edges
            .iter()
            .filter(|(key, shares)| {
                let (a, b) = **key;
                shares.len() == 1 && !covered_edges.contains(*key) && !is_fine_sub_edge(a, b) && !is_fine_sub_edge(b, a)
            })
            .map(|(_, shares)| shares[0])
            .collect();
        boundary_faces.sort();

        let ncell = mesh.cells.len();
        Ok(DofTopology {
            mesh,
            n_components,
            hanging: hanging_map.into_values().collect(),
            point_cells,
            boundary_faces,
            boundary_ids: HashMap::new(),
            cell_owner: vec![0; ncell],
            n_rank: 1,
        })
    }

    /// Tags the boundary faces with boundary identifiers
    ///
    /// The function `f(xa, xb)` receives the coordinates of the end points of a
    /// boundary face and returns the boundary identifier, if any.
    pub fn tag_boundaries<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&[f64], &[f64]) -> Option<BoundaryId>,
    {
        for (cell_id, face) in &self.boundary_faces {
            if let Some((a, b)) = self.face_points(*cell_id, *face) {
                let xa = &self.mesh.points[a].coords;
                let xb = &self.mesh.points[b].coords;
                match f(xa, xb) {
                    Some(id) => self.boundary_ids.insert((*cell_id, *face), id),
                    None => self.boundary_ids.remove(&(*cell_id, *face)),
                };
            }
        }
        self
    }

    /// Tags a single boundary face
    pub fn set_boundary_id(&mut self, cell_id: CellId, face: usize, id: BoundaryId) -> Result<(), StrError> {
        if !self.boundary_faces.contains(&(cell_id, face)) {
            return Err("face is not on the boundary");
        }
        self.boundary_ids.insert((cell_id, face), id);
        Ok(())
    }

    /// Sets the owner rank of every cell (partitioning)
    pub fn set_owners(&mut self, owners: Vec<usize>) -> Result<(), StrError> {
        if owners.len() != self.mesh.cells.len() {
            return Err("the number of owners must equal the number of cells");
        }
        self.n_rank = owners.iter().max().map_or(1, |m| m + 1);
        self.cell_owner = owners;
        Ok(())
    }

    /// Returns the total number of DOFs
    pub fn n_dofs(&self) -> usize {
        self.mesh.points.len() * self.n_components
    }

    /// Returns the number of ranks (partitions)
    pub fn n_rank(&self) -> usize {
        self.n_rank
    }

    /// Returns the global DOF number of a (point, component) pair
    #[inline]
    pub fn dof(&self, point_id: PointId, component: usize) -> usize {
        point_id * self.n_components + component
    }

    /// Returns the local-to-global map of a cell
    pub fn local_to_global(&self, cell_id: CellId) -> Vec<usize> {
        let cell = &self.mesh.cells[cell_id];
        let mut l2g = Vec::with_capacity(cell.points.len() * self.n_components);
        for p in &cell.points {
            for c in 0..self.n_components {
                l2g.push(self.dof(*p, c));
            }
        }
        l2g
    }

    /// Returns the owner rank of a cell
    #[inline]
    pub fn cell_owner(&self, cell_id: CellId) -> usize {
        self.cell_owner[cell_id]
    }

    /// Returns the cells owned by a rank
    pub fn owned_cells(&self, rank: usize) -> Vec<CellId> {
        (0..self.cell_owner.len())
            .filter(|c| self.cell_owner[*c] == rank)
            .collect()
    }

    /// Returns the cells sharing a point
    pub fn point_cells(&self, point_id: PointId) -> &[CellId] {
        &self.point_cells[point_id]
    }

    /// Returns the hanging points of the non-conforming interfaces
    pub fn hanging_points(&self) -> &[HangingPoint] {
        &self.hanging
    }

    /// Returns all boundary faces as (cell id, local face index)
    pub fn boundary_faces(&self) -> &[(CellId, usize)] {
        &self.boundary_faces
    }

    /// Returns the boundary identifier of a face, if tagged
    pub fn boundary_id(&self, cell_id: CellId, face: usize) -> Option<BoundaryId> {
        self.boundary_ids.get(&(cell_id, face)).copied()
    }

    /// Returns the local faces of a cell tagged with a boundary identifier
    pub fn faces_with_id(&self, cell_id: CellId, id: BoundaryId) -> Vec<usize> {
        (0..self.mesh.cells[cell_id].kind.nedge()).filter(|f| self.boundary_id(cell_id, *f) == Some(id)).collect()
    }

    /// Returns the (sorted) points on the faces tagged with a boundary identifier
    ///
    /// The middle nodes of higher-order faces are included.
    pub fn points_with_id(&self, id: BoundaryId) -> Vec<PointId> {
        let mut points = BTreeSet::new();
        for ((cell_id, face), tag) in &self.boundary_ids {
            if *tag == id {
                let cell = &self.mesh.cells[*cell_id];
                for m in face_local_nodes(cell.kind, *face) {
                    points.insert(cell.points[m]);
                }
            }
        }
        points.into_iter().collect()
    }

    /// Returns the corner points of a local face
    fn face_points(&self, cell_id: CellId, face: usize) -> Option<(PointId, PointId)> {
        let cell = self.mesh.cells.get(cell_id)?;
        if face >= cell.kind.nedge() {
            return None;
        }
        let a = cell.points[cell.kind.edge_node_id(face, 0)];
        let b = cell.points[cell.kind.edge_node_id(face, 1)];
        Some((a, b))
    }

    /// Returns the DOF partition seen by a rank
    pub fn partition(&self, rank: usize) -> Result<DofPartition, StrError> {
        if rank >= self.n_rank {
            return Err("rank is out-of-bounds");
        }
        let mut owner = vec![0; self.n_dofs()];
        for p in 0..self.point_cells.len() {
            let rank_p = self.point_cells[p]
                .iter()
                .map(|c| self.cell_owner[*c])
                .min()
                .unwrap_or(0);
            for c in 0..self.n_components {
                owner[self.dof(p, c)] = rank_p;
            }
        }
        Ok(DofPartition {
            rank,
            n_rank: self.n_rank,
            owner,
        })
    }
}

/// Returns the parametric coordinate t ∈ (0, 1) if point p lies strictly inside segment a→b
fn inside_segment(mesh: &Mesh, p: PointId, a: PointId, b: PointId) -> Option<f64> {
    let xp = &mesh.points[p].coords;
    let xa = &mesh.points[a].coords;
    let xb = &mesh.points[b].coords;
    let (dx, dy) = (xb[0] - xa[0], xb[1] - xa[1]);
    let (ex, ey) = (xp[0] - xa[0], xp[1] - xa[1]);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return None;
    }
    let cross = dx * ey - dy * ex;
    if f64::abs(cross) > HANGING_TOL * len2 {
        return None;
    }
    let t = (dx * ex + dy * ey) / len2;
    if t > HANGING_TOL && t < 1.0 - HANGING_TOL {
        Some(t)
    } else {
        None
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
