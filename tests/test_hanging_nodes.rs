use ecsim::prelude::*;
use ecsim::StrError;
use russell_lab::approx_eq;

mod common;
use common::{sample_config, solve_dense, tag_electrodes, uniform_materials};

#[test]
fn test_hanging_nodes_follow_the_coarse_edge() -> Result<(), StrError> {
    //      3---------2---------7
    //      |         |   [2]   |     anode: x = 0
    //      |   [0]   6---------5     cathode: x = 2
    //      |         |   [1]   |
    //      0---------1---------4
    let mesh = SampleMeshes::non_conforming();
    let mut topology = DofTopology::new(&mesh, 3)?;
    tag_electrodes(&mut topology, 2.0);
    let config = sample_config(OperatingMode::ConstantVoltage(1.5), 0.2);
    let sampler = uniform_materials(1.0, 1.0, 0.5, 0.1);
    let comm = SerialComm::new();
    let physics = ElectrochemicalPhysics::new(&topology, config, &sampler, &comm)?;

    // every component of the hanging point is constrained to its parents
    for component in 0..3 {
        let line = physics.constraints.line(topology.dof(6, component)).ok_or("hanging DOF must be constrained")?;
        assert_eq!(
            line.entries,
            &[(topology.dof(1, component), 0.5), (topology.dof(2, component), 0.5)]
        );
        assert_eq!(line.inhomogeneity, 0.0);
    }

    let mut solution = solve_dense(&physics.operator)?;
    physics.constraints.distribute(&mut solution);

    // the hanging values interpolate the coarse edge
    for component in 0..3 {
        let a = solution[topology.dof(1, component)];
        let b = solution[topology.dof(2, component)];
        approx_eq(solution[topology.dof(6, component)], 0.5 * (a + b), 1e-14);
    }

    // electrodes
    let solid = config.component(Field::SolidPotential);
    for p in [0, 3] {
        assert_eq!(solution[topology.dof(p, solid)], 0.0);
    }
    for p in [4, 5, 7] {
        assert_eq!(solution[topology.dof(p, solid)], 1.5);
    }

    // the solid potential increases along the bottom row
    let bottom: Vec<_> = [0, 1, 4].iter().map(|p| solution[topology.dof(*p, solid)]).collect();
    assert!(bottom[0] < bottom[1] && bottom[1] < bottom[2]);

    let mut post = physics.post_processor()?;
    post.compute(&solution, &sampler, &comm)?;
    approx_eq(post.get("voltage")?, 1.5, 1e-14);
    approx_eq(post.get("surface_area")?, 1.0, 1e-14);
    approx_eq(post.get("volume")?, 2.0, 1e-14);
    Ok(())
}

#[test]
fn test_hanging_nodes_with_linear_solution() -> Result<(), StrError> {
    // the hanging constraint reproduces the exact linear profile
    let mesh = SampleMeshes::non_conforming();
    let mut topology = DofTopology::new(&mesh, 3)?;
    tag_electrodes(&mut topology, 2.0);
    let config = sample_config(OperatingMode::ConstantVoltage(2.0), 1.0);
    let sampler = uniform_materials(0.0, 4.0, 0.0, 0.0);
    let comm = SerialComm::new();
    let physics = ElectrochemicalPhysics::new(&topology, config, &sampler, &comm)?;
    let mut solution = solve_dense(&physics.operator)?;
    physics.constraints.distribute(&mut solution);
    let solid = config.component(Field::SolidPotential);
    for point in &mesh.points {
        approx_eq(solution[topology.dof(point.id, solid)], point.coords[0], 1e-13);
    }
    let mut post = physics.post_processor()?;
    post.compute(&solution, &sampler, &comm)?;
    approx_eq(post.quantities().current, 4.0, 1e-12);
    approx_eq(post.quantities().joule_heating, 4.0 * 2.0, 1e-12);
    Ok(())
}
