use ecsim::prelude::*;
use ecsim::StrError;
use gemlab::mesh::Mesh;
use russell_lab::{approx_eq, Vector};

mod common;
use common::{sample_config, solve_dense, tag_electrodes, uniform_materials};

/// Holds the owned entries computed by one rank
struct RankResults {
    stiffness: Vec<(usize, usize, f64)>,
    mass: Vec<(usize, usize, f64)>,
    load: Vec<(usize, f64)>,
    quantities: Quantities,
}

/// Assembles with two ranks (one thread each) and post-processes the given solution
fn run_two_ranks(
    mesh: &Mesh,
    lx: f64,
    owners: Vec<usize>,
    config: Config,
    sampler: &MaterialTable,
    solution: &Vector,
) -> Result<Vec<RankResults>, StrError> {
    let mut topology = DofTopology::new(mesh, 3)?;
    tag_electrodes(&mut topology, lx);
    topology.set_owners(owners)?;
    let comms = ThreadComm::group(2);
    let topology = &topology;
    let results: Vec<Result<RankResults, StrError>> = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                scope.spawn(move |_| -> Result<RankResults, StrError> {
                    let physics = ElectrochemicalPhysics::new(topology, config, sampler, &comm)?;
                    let mut post = physics.post_processor()?;
                    post.compute(solution, sampler, &comm)?;
                    Ok(RankResults {
                        stiffness: physics.operator.stiffness_matrix.owned_triplets()?,
                        mass: physics.operator.mass_matrix.owned_triplets()?,
                        load: physics.operator.load_vector.owned_entries()?,
                        quantities: *post.quantities(),
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();
    results.into_iter().collect()
}

/// Compares the two-rank results against a single-rank run
fn check_two_partitions(mesh: &Mesh, lx: f64, owners: Vec<usize>, mode: OperatingMode) -> Result<(), StrError> {
    let config = sample_config(mode, 0.25);
    let mut sampler = uniform_materials(1.0, 2.0, 0.5, 0.3);
    sampler.set_all(
        2,
        &[
            (Coefficient::SpecificCapacitance, 3.0),
            (Coefficient::LiquidConductivity, 0.8),
        ],
    );

    // single rank
    let mut serial_topology = DofTopology::new(mesh, 3)?;
    tag_electrodes(&mut serial_topology, lx);
    let comm = SerialComm::new();
    let serial = ElectrochemicalPhysics::new(&serial_topology, config, &sampler, &comm)?;
    let mut solution = solve_dense(&serial.operator)?;
    serial.constraints.distribute(&mut solution);
    let mut serial_post = serial.post_processor()?;
    serial_post.compute(&solution, &sampler, &comm)?;

    // two ranks
    let ranks = run_two_ranks(mesh, lx, owners, config, &sampler, &solution)?;
    let n_stiffness: usize = ranks.iter().map(|r| r.stiffness.len()).sum();
    let n_load: usize = ranks.iter().map(|r| r.load.len()).sum();
    assert_eq!(n_stiffness, serial.operator.stiffness_matrix.owned_triplets()?.len());
    assert_eq!(n_load, serial_topology.n_dofs());
    for rank in &ranks {
        for (i, j, value) in &rank.stiffness {
            approx_eq(*value, serial.operator.stiffness_matrix.get(*i, *j)?, 1e-13);
        }
        for (i, j, value) in &rank.mass {
            approx_eq(*value, serial.operator.mass_matrix.get(*i, *j)?, 1e-13);
        }
        for (i, value) in &rank.load {
            approx_eq(*value, serial.operator.load_vector.get(*i)?, 1e-13);
        }
        let (a, b) = (&rank.quantities, serial_post.quantities());
        approx_eq(a.voltage, b.voltage, 1e-13);
        approx_eq(a.current, b.current, 1e-13);
        approx_eq(a.joule_heating, b.joule_heating, 1e-13);
        approx_eq(a.surface_area, b.surface_area, 1e-13);
        approx_eq(a.volume, b.volume, 1e-13);
        assert_eq!(a.max_temperature, b.max_temperature);
    }
    Ok(())
}

#[test]
fn test_two_partitions_constant_voltage() -> Result<(), StrError> {
    // two materials; the interface and the partition boundary differ
    //  +-----+-----+-----+-----+
    //  |  0  |  0  |  1  |  1  |    owner rank
    //  +-----+-----+-----+-----+
    //  |  0  |  0  |  0  |  1  |
    //  +-----+-----+-----+-----+
    let mesh = SampleMeshes::rectangle_with(4, 2, 2.0, 1.0, |x, _| if x < 1.0 { 1 } else { 2 });
    let owners = vec![0, 0, 0, 1, 0, 0, 1, 1];
    check_two_partitions(&mesh, 2.0, owners, OperatingMode::ConstantVoltage(1.2))
}

#[test]
fn test_two_partitions_constant_current() -> Result<(), StrError> {
    let mesh = SampleMeshes::rectangle_with(4, 2, 2.0, 1.0, |x, _| if x < 1.0 { 1 } else { 2 });
    let owners = vec![1, 1, 0, 0, 1, 1, 0, 0];
    check_two_partitions(&mesh, 2.0, owners, OperatingMode::ConstantCurrent(0.7))
}

#[test]
fn test_two_partitions_hanging_nodes() -> Result<(), StrError> {
    //      3---------2---------7
    //      |         |   [2]   |     owners: 0, 1, 1
    //      |   [0]   6---------5
    //      |         |   [1]   |
    //      0---------1---------4
    let mesh = SampleMeshes::non_conforming();
    check_two_partitions(&mesh, 2.0, vec![0, 1, 1], OperatingMode::ConstantVoltage(2.0))?;
    check_two_partitions(&mesh, 2.0, vec![1, 0, 1], OperatingMode::ConstantCurrent(2.0))
}

/// Runs a task on two ranks (one thread each) and returns the result of each rank
fn on_two_ranks<F>(task: F) -> Vec<Result<(), StrError>>
where
    F: Fn(&ThreadComm) -> Result<(), StrError> + Sync,
{
    let comms = ThreadComm::group(2);
    let task = &task;
    crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| scope.spawn(move |_| task(&comm)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap()
}

#[test]
fn test_two_partitions_failure_on_one_rank() -> Result<(), StrError> {
    // material 2 is missing; only rank 1 owns cells with attribute 2
    //  +-----+-----+-----+-----+
    //  |  0  |  0  |  1  |  1  |    owner rank
    //  +-----+-----+-----+-----+
    //  |  0  |  0  |  1  |  1  |
    //  +-----+-----+-----+-----+
    let mesh = SampleMeshes::rectangle_with(4, 2, 2.0, 1.0, |x, _| if x < 1.0 { 1 } else { 2 });
    let mut topology = DofTopology::new(&mesh, 3)?;
    tag_electrodes(&mut topology, 2.0);
    topology.set_owners(vec![0, 0, 1, 1, 0, 0, 1, 1])?;
    let config = sample_config(OperatingMode::ConstantVoltage(1.0), 0.25);
    let partial = uniform_materials(1.0, 2.0, 0.5, 0.3);

    // assembly: both ranks return instead of waiting for each other
    let topology = &topology;
    let results = on_two_ranks(|comm| {
        ElectrochemicalPhysics::new(topology, config, &partial, comm)?;
        Ok(())
    });
    assert_eq!(results[0], Err("assembly has failed on another rank"));
    assert_eq!(results[1], Err("cannot find CellAttribute in MaterialTable"));

    // post-processing with a complete assembly but an incomplete sampler
    let mut complete = uniform_materials(1.0, 2.0, 0.5, 0.3);
    complete.set_all(2, &[(Coefficient::SolidConductivity, 1.0), (Coefficient::LiquidConductivity, 1.0)]);
    let solution = Vector::new(topology.n_dofs());
    let results = on_two_ranks(|comm| {
        let physics = ElectrochemicalPhysics::new(topology, config, &complete, comm)?;
        let mut post = physics.post_processor()?;
        let computed = post.compute(&solution, &partial, comm);
        assert_eq!(post.get("volume")?, 0.0);
        computed
    });
    assert_eq!(results[0], Err("post-processing has failed on another rank"));
    assert_eq!(results[1], Err("cannot find CellAttribute in MaterialTable"));
    Ok(())
}
