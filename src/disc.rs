pub mod cell;
pub mod cell_factory;
pub mod flow_field;
pub mod geometric;
pub mod mesh;
pub mod riemann_solver;
