#![allow(dead_code)]

use ecsim::prelude::*;
use ecsim::StrError;
use russell_lab::{solve_lin_sys, Vector};

/// Boundary identifier of the anode in the tests
pub const ANODE: usize = 1;

/// Boundary identifier of the cathode in the tests
pub const CATHODE: usize = 2;

/// Tags the edges on x = 0 as anode and the edges on x = lx as cathode
pub fn tag_electrodes(topology: &mut DofTopology, lx: f64) {
    topology.tag_boundaries(|xa, xb| {
        if f64::abs(xa[0]) < 1e-12 && f64::abs(xb[0]) < 1e-12 {
            Some(ANODE)
        } else if f64::abs(xa[0] - lx) < 1e-12 && f64::abs(xb[0] - lx) < 1e-12 {
            Some(CATHODE)
        } else {
            None
        }
    });
}

/// Returns the configuration with components (solid, liquid, temperature) = (0, 1, 2)
pub fn sample_config(mode: OperatingMode, time_step: f64) -> Config {
    let input = ConfigInput {
        solid_potential_component: Some(0),
        liquid_potential_component: Some(1),
        temperature_component: Some(2),
        anode_boundary_id: Some(ANODE),
        cathode_boundary_id: Some(CATHODE),
        operating_mode: Some(mode),
        time_step: Some(time_step),
    };
    Config::new(&input, 3).unwrap()
}

/// Returns uniform coefficients for material 1
pub fn uniform_materials(capacitance: f64, sigma_s: f64, sigma_l: f64, faradaic: f64) -> MaterialTable {
    let mut table = MaterialTable::new();
    table.set_all(
        1,
        &[
            (Coefficient::SpecificCapacitance, capacitance),
            (Coefficient::SolidConductivity, sigma_s),
            (Coefficient::LiquidConductivity, sigma_l),
            (Coefficient::FaradaicReactionCoefficient, faradaic),
        ],
    );
    table
}

/// Solves the finalized serial system with a dense solver
///
/// Empty rows (e.g., temperature DOFs, which are not assembled) are pinned to zero.
/// The constrained values are not distributed.
pub fn solve_dense(operator: &OperatorBase) -> Result<Vector, StrError> {
    let mut kk = operator.stiffness_matrix.to_dense()?;
    let mut x = operator.load_vector.to_vector()?;
    let n = x.dim();
    for i in 0..n {
        if (0..n).all(|j| kk.get(i, j) == 0.0) {
            kk.set(i, i, 1.0);
            x[i] = 0.0;
        }
    }
    solve_lin_sys(&mut x, &mut kk)?;
    Ok(x)
}
