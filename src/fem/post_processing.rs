use super::Communicator;
use crate::base::{face_local_nodes, Coefficient, Config, DofTopology, Field, MaterialSampler};
use crate::StrError;
use gemlab::integ;
use gemlab::mesh::CellId;
use gemlab::shapes::Scratchpad;
use rayon::prelude::*;
use russell_lab::{Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines the keys of the post-processed quantities
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum Quantity {
    MaxTemperature,
    Voltage,
    Current,
    JouleHeating,
    SurfaceArea,
    Volume,
}

impl Quantity {
    /// All quantities in display order
    pub const ALL: [Quantity; 6] = [
        Quantity::MaxTemperature,
        Quantity::Voltage,
        Quantity::Current,
        Quantity::JouleHeating,
        Quantity::SurfaceArea,
        Quantity::Volume,
    ];

    /// Returns the string key
    pub fn key(&self) -> &'static str {
        match self {
            Quantity::MaxTemperature => "max_temperature",
            Quantity::Voltage => "voltage",
            Quantity::Current => "current",
            Quantity::JouleHeating => "joule_heating",
            Quantity::SurfaceArea => "surface_area",
            Quantity::Volume => "volume",
        }
    }

    /// Parses a string key
    pub fn from_key(key: &str) -> Result<Self, StrError> {
        Quantity::ALL
            .iter()
            .find(|q| q.key() == key)
            .copied()
            .ok_or("key not found")
    }
}

/// Holds the scalar engineering quantities extracted from a solution
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Quantities {
    /// Maximum temperature over the integration points
    pub max_temperature: f64,

    /// Area-weighted average of the solid potential over the cathode
    pub voltage: f64,

    /// Current through the cathode: ∫ σs ∇φs · n dA
    pub current: f64,

    /// Joule heating: ∫ (σs |∇φs|² + σl |∇φl|²) dV
    pub joule_heating: f64,

    /// Area of the cathode
    pub surface_area: f64,

    /// Volume of the domain
    pub volume: f64,
}

impl Quantities {
    /// Returns the reset state: zero sums and a negative-infinity maximum
    pub fn new() -> Self {
        Quantities {
            max_temperature: f64::NEG_INFINITY,
            voltage: 0.0,
            current: 0.0,
            joule_heating: 0.0,
            surface_area: 0.0,
            volume: 0.0,
        }
    }

    /// Returns the value of a quantity
    pub fn get(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::MaxTemperature => self.max_temperature,
            Quantity::Voltage => self.voltage,
            Quantity::Current => self.current,
            Quantity::JouleHeating => self.joule_heating,
            Quantity::SurfaceArea => self.surface_area,
            Quantity::Volume => self.volume,
        }
    }
}

impl fmt::Display for Quantities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for quantity in Quantity::ALL {
            write!(f, "{} = {:?}\n", quantity.key(), self.get(quantity))?;
        }
        Ok(())
    }
}

/// Holds the partial sums of one cell (or of several merged cells)
#[derive(Clone, Copy, Debug)]
struct Partial {
    joule_heating: f64,
    volume: f64,
    max_temperature: f64,
    current: f64,
    voltage_integral: f64,
    surface_area: f64,
}

impl Partial {
    fn new() -> Self {
        Partial {
            joule_heating: 0.0,
            volume: 0.0,
            max_temperature: f64::NEG_INFINITY,
            current: 0.0,
            voltage_integral: 0.0,
            surface_area: 0.0,
        }
    }

    fn merge(self, other: Partial) -> Partial {
        Partial {
            joule_heating: self.joule_heating + other.joule_heating,
            volume: self.volume + other.volume,
            max_temperature: f64::max(self.max_temperature, other.max_temperature),
            current: self.current + other.current,
            voltage_integral: self.voltage_integral + other.voltage_integral,
            surface_area: self.surface_area + other.surface_area,
        }
    }
}

/// Recomputes the scalar quantities from a solved field
pub struct PostProcessor<'a> {
    topology: &'a DofTopology<'a>,
    config: &'a Config,
    quantities: Quantities,
}

impl<'a> PostProcessor<'a> {
    /// Allocates a new instance (in the reset state)
    pub fn new(topology: &'a DofTopology<'a>, config: &'a Config) -> Result<Self, StrError> {
        config.components.check(topology.n_components)?;
        Ok(PostProcessor {
            topology,
            config,
            quantities: Quantities::new(),
        })
    }

    /// Sets the sums to zero and the maximum temperature to negative infinity
    pub fn reset(&mut self) {
        self.quantities = Quantities::new();
    }

    /// Computes all quantities from a full solution vector (collective)
    ///
    /// Each rank integrates over its own cells. If the integration fails on any rank,
    /// all ranks return an error and the quantities are left untouched. A zero cathode
    /// area still updates the other quantities, sets the voltage to NaN, and returns an error.
    pub fn compute(
        &mut self,
        solution: &Vector,
        sampler: &dyn MaterialSampler,
        comm: &dyn Communicator,
    ) -> Result<(), StrError> {
        if solution.dim() != self.topology.n_dofs() {
            return Err("the solution vector has the wrong dimension");
        }
        if comm.size() != self.topology.n_rank() {
            return Err("the communicator size does not match the partition");
        }
        let cells = self.topology.owned_cells(comm.rank());
        let partials: Result<Vec<_>, StrError> = cells
            .par_iter()
            .map(|cell_id| self.cell_partial(*cell_id, solution, sampler))
            .collect();
        let all_ok = comm.all_ok(partials.is_ok())?;
        let local = partials?.into_iter().fold(Partial::new(), Partial::merge);
        if !all_ok {
            return Err("post-processing has failed on another rank");
        }
        let sums = comm.sum(&[
            local.joule_heating,
            local.volume,
            local.current,
            local.voltage_integral,
            local.surface_area,
        ])?;
        let max = comm.max(&[local.max_temperature])?;
        let surface_area = sums[4];
        let voltage = if surface_area == 0.0 {
            f64::NAN
        } else {
            sums[3] / surface_area
        };
        self.quantities = Quantities {
            max_temperature: max[0],
            voltage,
            current: sums[2],
            joule_heating: sums[0],
            surface_area,
            volume: sums[1],
        };
        log::debug!("post-processing of rank {}: {} cells", comm.rank(), cells.len());
        if surface_area == 0.0 {
            return Err("cannot normalize the voltage because the cathode surface area is zero");
        }
        Ok(())
    }

    /// Returns a quantity by its key
    pub fn get(&self, key: &str) -> Result<f64, StrError> {
        Ok(self.quantities.get(Quantity::from_key(key)?))
    }

    /// Returns all quantities
    pub fn quantities(&self) -> &Quantities {
        &self.quantities
    }

    /// Computes the cell and cathode-face contributions of a cell
    fn cell_partial(&self, cell_id: CellId, solution: &Vector, sampler: &dyn MaterialSampler) -> Result<Partial, StrError> {
        let mesh = self.topology.mesh;
        let cell = &mesh.cells[cell_id];
        let component_values = |field: Field| -> Vec<f64> {
            let c = self.config.component(field);
            cell.points.iter().map(|p| solution[self.topology.dof(*p, c)]).collect()
        };
        let phi_s = component_values(Field::SolidPotential);
        let phi_l = component_values(Field::LiquidPotential);
        let temperature = component_values(Field::Temperature);

        // cell integration points
        let mut partial = Partial::new();
        let mut pad = Scratchpad::new(mesh.ndim, cell.kind)?;
        mesh.set_pad(&mut pad, &cell.points);
        let ips = integ::default_points(cell.kind);
        let sigma_s = sampler.get_values(Coefficient::SolidConductivity, cell, ips.len())?;
        let sigma_l = sampler.get_values(Coefficient::LiquidConductivity, cell, ips.len())?;
        if sigma_s.len() != ips.len() || sigma_l.len() != ips.len() {
            return Err("the number of sampled values must equal the number of integration points");
        }
        for p in 0..ips.len() {
            let iota = &ips[p];
            (pad.fn_interp)(&mut pad.interp, iota);
            let det_jac = pad.calc_gradient(iota)?;
            let jxw = det_jac * iota[3];
            let gs = gradient(&pad.gradient, &phi_s);
            let gl = gradient(&pad.gradient, &phi_l);
            let heat = sigma_s[p] * (gs[0] * gs[0] + gs[1] * gs[1]) + sigma_l[p] * (gl[0] * gl[0] + gl[1] * gl[1]);
            partial.joule_heating += heat * jxw;
            partial.volume += jxw;
            partial.max_temperature = f64::max(partial.max_temperature, interpolate(&pad.interp, &temperature));
        }

        // cathode faces
        let faces = self.topology.faces_with_id(cell_id, self.config.boundaries.cathode);
        if faces.is_empty() {
            return Ok(partial);
        }
        let face_kind = cell.kind.edge_kind().ok_or("cell kind has no faces")?;
        let face_ips = integ::default_points(face_kind);
        let sigma_s = sampler.get_values(Coefficient::SolidConductivity, cell, face_ips.len())?;
        if sigma_s.len() != face_ips.len() {
            return Err("the number of sampled values must equal the number of integration points");
        }
        let mut un = Vector::new(mesh.ndim);
        let mut ksi = vec![0.0; cell.kind.ndim()];
        for face in faces {
            let nodes = face_local_nodes(cell.kind, face);
            let points: Vec<_> = nodes.iter().map(|m| cell.points[*m]).collect();
            let mut face_pad = Scratchpad::new(mesh.ndim, face_kind)?;
            mesh.set_pad(&mut face_pad, &points);
            for p in 0..face_ips.len() {
                let iota = &face_ips[p];
                let mag_n = face_pad.calc_normal_vector(&mut un, iota)?;
                let jxw = mag_n * iota[3];

                // reference coordinates of the face point within the cell
                (face_pad.fn_interp)(&mut face_pad.interp, iota);
                ksi.fill(0.0);
                for (i, m) in nodes.iter().enumerate() {
                    let ref_m = cell.kind.reference_coords(*m);
                    for d in 0..ksi.len() {
                        ksi[d] += face_pad.interp[i] * ref_m[d];
                    }
                }
                (pad.fn_interp)(&mut pad.interp, &ksi);
                pad.calc_gradient(&ksi)?;
                let gs = gradient(&pad.gradient, &phi_s);
                partial.current += sigma_s[p] * (gs[0] * un[0] + gs[1] * un[1]) * jxw;
                partial.voltage_integral += interpolate(&pad.interp, &phi_s) * jxw;
                partial.surface_area += jxw;
            }
        }
        Ok(partial)
    }
}

/// Returns the gradient of a nodal field given the shape function gradients B (nnode, 2)
fn gradient(bb: &Matrix, values: &[f64]) -> [f64; 2] {
    let mut g = [0.0; 2];
    for m in 0..values.len() {
        g[0] += bb.get(m, 0) * values[m];
        g[1] += bb.get(m, 1) * values[m];
    }
    g
}

/// Interpolates a nodal field
fn interpolate(nn: &Vector, values: &[f64]) -> f64 {
    values.iter().enumerate().map(|(m, v)| nn[m] * v).sum()
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{PostProcessor, Quantities, Quantity};
    use crate::base::{Coefficient, Config, ConfigInput, DofTopology, MaterialTable, OperatingMode, SampleMeshes};
    use crate::fem::SerialComm;
    use russell_lab::{approx_eq, Vector};

    fn config() -> Config {
        let input = ConfigInput {
            solid_potential_component: Some(0),
            liquid_potential_component: Some(1),
            temperature_component: Some(2),
            anode_boundary_id: Some(1),
            cathode_boundary_id: Some(2),
            operating_mode: Some(OperatingMode::ConstantVoltage(1.0)),
            time_step: Some(0.1),
        };
        Config::new(&input, 3).unwrap()
    }

    fn materials() -> MaterialTable {
        let mut table = MaterialTable::new();
        table.set_all(
            1,
            &[
                (Coefficient::SolidConductivity, 2.0),
                (Coefficient::LiquidConductivity, 0.5),
            ],
        );
        table
    }

    #[test]
    fn quantity_keys_work() {
        for q in Quantity::ALL {
            assert_eq!(Quantity::from_key(q.key()), Ok(q));
        }
        assert_eq!(Quantity::from_key("xyz").err(), Some("key not found"));
        let q = Quantities::new();
        assert_eq!(q.get(Quantity::MaxTemperature), f64::NEG_INFINITY);
        assert_eq!(
            format!("{}", q),
            "max_temperature = -inf\n\
             voltage = 0.0\n\
             current = 0.0\n\
             joule_heating = 0.0\n\
             surface_area = 0.0\n\
             volume = 0.0\n"
        );
    }

    #[test]
    fn new_handles_errors() {
        let mesh = SampleMeshes::rectangle(1, 1, 1.0, 1.0);
        let topo = DofTopology::new(&mesh, 4).unwrap();
        let config = config();
        assert_eq!(
            PostProcessor::new(&topo, &config).err(),
            Some("number of components does not match the DOF topology")
        );
        let mut topo = DofTopology::new(&mesh, 3).unwrap();
        topo.set_owners(vec![1]).unwrap(); // two ranks
        let mut post = PostProcessor::new(&topo, &config).unwrap();
        let solution = Vector::new(topo.n_dofs());
        assert_eq!(
            post.compute(&solution, &materials(), &SerialComm::new()).err(),
            Some("the communicator size does not match the partition")
        );
    }

    #[test]
    fn compute_works() {
        // 2×1 rectangle; cathode on x = 2; φs = x, φl = y, T = 10 + x + 3y
        let mesh = SampleMeshes::rectangle(2, 1, 2.0, 1.0);
        let mut topo = DofTopology::new(&mesh, 3).unwrap();
        topo.tag_boundaries(|xa, xb| if xa[0] == 2.0 && xb[0] == 2.0 { Some(2) } else { None });
        let config = config();
        let mut post = PostProcessor::new(&topo, &config).unwrap();
        assert_eq!(post.get("max_temperature").unwrap(), f64::NEG_INFINITY);
        assert_eq!(post.get("voltage").unwrap(), 0.0);
        assert_eq!(post.get("temperature").err(), Some("key not found"));

        let mut solution = Vector::new(topo.n_dofs());
        for point in &mesh.points {
            let (x, y) = (point.coords[0], point.coords[1]);
            solution[topo.dof(point.id, 0)] = x;
            solution[topo.dof(point.id, 1)] = y;
            solution[topo.dof(point.id, 2)] = 10.0 + x + 3.0 * y;
        }
        assert_eq!(
            post.compute(&Vector::new(3), &materials(), &SerialComm::new()).err(),
            Some("the solution vector has the wrong dimension")
        );
        post.compute(&solution, &materials(), &SerialComm::new()).unwrap();
        let q = post.quantities();
        approx_eq(q.volume, 2.0, 1e-14);
        approx_eq(q.joule_heating, (2.0 + 0.5) * 2.0, 1e-14);
        approx_eq(q.surface_area, 1.0, 1e-14);
        approx_eq(q.voltage, 2.0, 1e-14);
        approx_eq(q.current, 2.0, 1e-14);
        // the maximum is sampled at the integration point closest to (2, 1)
        let a = 1.0 / f64::sqrt(3.0);
        let (xg, yg) = (1.5 + 0.5 * a, 0.5 + 0.5 * a);
        approx_eq(q.max_temperature, 10.0 + xg + 3.0 * yg, 1e-14);

        // a second pass does not accumulate
        post.compute(&solution, &materials(), &SerialComm::new()).unwrap();
        approx_eq(post.get("volume").unwrap(), 2.0, 1e-14);

        post.reset();
        assert_eq!(post.get("max_temperature").unwrap(), f64::NEG_INFINITY);
        assert_eq!(post.get("current").unwrap(), 0.0);
    }

    #[test]
    fn compute_captures_zero_area() {
        let mesh = SampleMeshes::rectangle(1, 1, 1.0, 1.0);
        let topo = DofTopology::new(&mesh, 3).unwrap(); // no tagged faces
        let config = config();
        let mut post = PostProcessor::new(&topo, &config).unwrap();
        let solution = Vector::new(topo.n_dofs());
        assert_eq!(
            post.compute(&solution, &materials(), &SerialComm::new()).err(),
            Some("cannot normalize the voltage because the cathode surface area is zero")
        );
        // the volume integrals are still available
        let q = post.quantities();
        assert!(q.voltage.is_nan());
        assert_eq!(q.surface_area, 0.0);
        assert_eq!(q.current, 0.0);
        approx_eq(q.volume, 1.0, 1e-15);
        assert_eq!(q.max_temperature, 0.0);
    }

    #[test]
    fn compute_handles_sampler_errors() {
        let mesh = SampleMeshes::rectangle(1, 1, 1.0, 1.0);
        let mut topo = DofTopology::new(&mesh, 3).unwrap();
        topo.tag_boundaries(|xa, xb| if xa[0] == 1.0 && xb[0] == 1.0 { Some(2) } else { None });
        let config = config();
        let mut post = PostProcessor::new(&topo, &config).unwrap();
        let solution = Vector::new(topo.n_dofs());
        assert_eq!(
            post.compute(&solution, &MaterialTable::new(), &SerialComm::new()).err(),
            Some("cannot find CellAttribute in MaterialTable")
        );
        assert_eq!(post.get("volume").unwrap(), 0.0);
    }
}
