use gemlab::mesh::{Cell, CellAttribute, Mesh, Point};
use gemlab::shapes::GeoKind;

/// Generates sample meshes for tests and examples
pub struct SampleMeshes {}

impl SampleMeshes {
    /// Returns a structured rectangle `[0, lx] × [0, ly]` with `nx × ny` Qua4 cells (attribute 1)
    ///
    /// Points are numbered row by row starting at the origin; cells likewise.
    pub fn rectangle(nx: usize, ny: usize, lx: f64, ly: f64) -> Mesh {
        SampleMeshes::rectangle_with(nx, ny, lx, ly, |_, _| 1)
    }

    /// Returns a structured rectangle with the cell attribute given by a function of the cell center
    ///
    /// ```text
    /// (nx+1)·ny ------ ... ------ (nx+1)·(ny+1)-1
    ///     |                              |
    ///   nx+1 ----- nx+2 ---- ... ----- 2nx+1
    ///     |  [0]  |  [1]  | ... | [nx-1] |
    ///     0 ------ 1 ------ ... ------- nx
    /// ```
    pub fn rectangle_with<F>(nx: usize, ny: usize, lx: f64, ly: f64, attribute: F) -> Mesh
    where
        F: Fn(f64, f64) -> CellAttribute,
    {
        let (dx, dy) = (lx / (nx as f64), ly / (ny as f64));
        let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..(ny + 1) {
            for i in 0..(nx + 1) {
                points.push(Point {
                    id: points.len(),
                    marker: 0,
                    coords: vec![(i as f64) * dx, (j as f64) * dy],
                });
            }
        }
        let mut cells = Vec::with_capacity(nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let p0 = j * (nx + 1) + i;
                let (xc, yc) = ((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy);
                cells.push(Cell {
                    id: cells.len(),
                    attribute: attribute(xc, yc),
                    kind: GeoKind::Qua4,
                    points: vec![p0, p0 + 1, p0 + nx + 2, p0 + nx + 1],
                });
            }
        }
        Mesh { ndim: 2, points, cells }
    }

    /// Returns a mesh with two Tri3 cells on the unit square
    #[rustfmt::skip]
    pub fn two_tri3() -> Mesh {
        //      y
        //      ^
        // 1.0  3------------2
        //      |`.      [1] |    [#] indicates id
        //      |  `.    (1) |    (#) indicates attribute
        //      |    `.      |
        //      |      `.    |
        //      | [0]    `.  |
        //      | (1)      `.|
        // 0.0  0------------1 -> x
        //     0.0          1.0
        Mesh {
            ndim: 2,
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![1.0, 1.0] },
                Point { id: 3, marker: 0, coords: vec![0.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, attribute: 1, kind: GeoKind::Tri3, points: vec![0, 1, 3] },
                Cell { id: 1, attribute: 1, kind: GeoKind::Tri3, points: vec![2, 3, 1] },
            ],
        }
    }

    /// Returns a non-conforming mesh with one hanging point (point 6)
    #[rustfmt::skip]
    pub fn non_conforming() -> Mesh {
        //      y
        //      ^
        // 1.0  3---------2---------7
        //      |         |   [2]   |    [#] indicates id
        //      |   [0]   |   (1)   |    (#) indicates attribute
        // 0.5  |   (1)   6---------5
        //      |         |   [1]   |
        //      |         |   (1)   |
        // 0.0  0---------1---------4 -> x
        //     0.0       1.0       2.0
        Mesh {
            ndim: 2,
            points: vec![
                Point { id: 0, marker: 0, coords: vec![0.0, 0.0] },
                Point { id: 1, marker: 0, coords: vec![1.0, 0.0] },
                Point { id: 2, marker: 0, coords: vec![1.0, 1.0] },
                Point { id: 3, marker: 0, coords: vec![0.0, 1.0] },
                Point { id: 4, marker: 0, coords: vec![2.0, 0.0] },
                Point { id: 5, marker: 0, coords: vec![2.0, 0.5] },
                Point { id: 6, marker: 0, coords: vec![1.0, 0.5] },
                Point { id: 7, marker: 0, coords: vec![2.0, 1.0] },
            ],
            cells: vec![
                Cell { id: 0, attribute: 1, kind: GeoKind::Qua4, points: vec![0, 1, 2, 3] },
                Cell { id: 1, attribute: 1, kind: GeoKind::Qua4, points: vec![1, 4, 5, 6] },
                Cell { id: 2, attribute: 1, kind: GeoKind::Qua4, points: vec![6, 5, 7, 2] },
            ],
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
