//! Electrochemical capacitor simulator
//!
//! This crate implements the finite element assembly and post-processing kernel
//! for the coupled solid-phase/liquid-phase electric potential problem of an
//! electrochemical double-layer capacitor. The pipeline is:
//!
//! ```text
//! DofTopology → ConstraintSet → SparsityPattern → AssemblyEngine → (external solver) → PostProcessor
//! ```
//!
//! The mesh, the linear solver, and the material-property models are external
//! collaborators; see [base::DofTopology] and [base::MaterialSampler].

/// Defines a type alias for the error type as a static string
pub type StrError = &'static str;

pub mod base;
pub mod fem;
pub mod prelude;
