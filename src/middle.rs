//! The middle-end: lowering the resolved AST to three-address code, then
//! partitioning it into a basic-block CFG and computing liveness.

pub mod cfg;
pub mod tac;

pub use cfg::Cfg;
pub use tac::{build, TacProgram};
