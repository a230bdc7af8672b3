use super::{AssemblyEngine, Communicator, ConstraintSet, OperatorBase, PostProcessor, SparsityPattern};
use crate::base::{Config, DofPartition, DofTopology, Field, MaterialSampler, OperatingMode};
use crate::StrError;
use gemlab::mesh::CellAttribute;
use std::time::Instant;

/// Implements the electrochemical (double-layer capacitor) physics of one rank
///
/// The setup runs: partition → constraints → sparsity → assembly. The material
/// sampler and the communicator are passed to each operation that needs them.
pub struct ElectrochemicalPhysics<'a> {
    /// Holds the DOF topology
    pub topology: &'a DofTopology<'a>,

    /// Holds the configuration
    pub config: Config,

    /// Holds the DOF ownership of this rank
    pub partition: DofPartition,

    /// Holds the closed constraint set
    pub constraints: ConstraintSet,

    /// Holds the sparsity pattern of this rank
    pub sparsity: SparsityPattern,

    /// Holds the assembled (and finalized) operators
    pub operator: OperatorBase,
}

impl<'a> ElectrochemicalPhysics<'a> {
    /// Sets up and assembles the system (collective)
    pub fn new(
        topology: &'a DofTopology<'a>,
        config: Config,
        sampler: &dyn MaterialSampler,
        comm: &dyn Communicator,
    ) -> Result<Self, StrError> {
        let start = Instant::now();
        if comm.size() != topology.n_rank() {
            return Err("the communicator size does not match the partition");
        }
        let partition = topology.partition(comm.rank())?;
        let constraints = ConstraintSet::build(topology, &config.components, &config.boundaries, config.operating_mode)?;
        let sparsity = SparsityPattern::build(topology, &constraints, &partition)?;
        log::debug!(
            "setup of rank {}: {} DOFs, {} constraints, {} nonzeros in {:?}",
            comm.rank(),
            topology.n_dofs(),
            constraints.len(),
            sparsity.nnz(),
            start.elapsed()
        );
        let operator = AssemblyEngine::new(topology, &constraints, &sparsity, &config)?.assemble(sampler, comm)?;
        Ok(ElectrochemicalPhysics {
            topology,
            config,
            partition,
            constraints,
            sparsity,
            operator,
        })
    }

    /// Switches the operating mode, then rebuilds the constraints and reassembles (collective)
    ///
    /// The sparsity pattern is reused since it covers every Dirichlet configuration.
    pub fn set_operating_mode(
        &mut self,
        mode: OperatingMode,
        sampler: &dyn MaterialSampler,
        comm: &dyn Communicator,
    ) -> Result<(), StrError> {
        if !mode.value().is_finite() {
            return Err("operating_mode value must be finite");
        }
        let mut config = self.config;
        config.operating_mode = mode;
        let constraints = ConstraintSet::build(self.topology, &config.components, &config.boundaries, mode)?;
        let operator = AssemblyEngine::new(self.topology, &constraints, &self.sparsity, &config)?.assemble(sampler, comm)?;
        log::debug!("rank {} switched to {}", comm.rank(), mode);
        self.config = config;
        self.constraints = constraints;
        self.operator = operator;
        Ok(())
    }

    /// Recomputes the load vector with the current boundary data (collective)
    pub fn update_load_vector(&mut self, sampler: &dyn MaterialSampler, comm: &dyn Communicator) -> Result<(), StrError> {
        let engine = AssemblyEngine::new(self.topology, &self.constraints, &self.sparsity, &self.config)?;
        self.operator.load_vector = engine.assemble_load(sampler, comm)?;
        Ok(())
    }

    /// Selects the null-space DOFs of a field over the cells of a material
    pub fn set_null_space(&mut self, field: Field, material_id: CellAttribute) -> Result<&[usize], StrError> {
        let component = self.config.component(field);
        self.operator.set_null_space(self.topology, component, material_id)
    }

    /// Allocates a post-processor for the solutions of this system
    pub fn post_processor(&self) -> Result<PostProcessor<'_>, StrError> {
        PostProcessor::new(self.topology, &self.config)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
