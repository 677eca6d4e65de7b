//! Finite-volume transport of an oil spill over a triangular mesh.

pub mod disc;
pub mod error;
pub mod initialization;
pub mod io;
pub mod solver;
