//! Implements the finite element assembly and post-processing kernel

mod assembly;
mod communicator;
mod constraints;
mod distributed;
mod electrochemical;
mod operator;
mod post_processing;
mod sparsity;
pub use crate::fem::assembly::*;
pub use crate::fem::communicator::*;
pub use crate::fem::constraints::*;
pub use crate::fem::distributed::*;
pub use crate::fem::electrochemical::*;
pub use crate::fem::operator::*;
pub use crate::fem::post_processing::*;
pub use crate::fem::sparsity::*;
