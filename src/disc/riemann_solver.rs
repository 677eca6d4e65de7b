use nalgebra::Vector2;

/// Upwind (donor-cell) flux across one edge.
///
/// `outer_normal` points out of the current cell and is scaled to the edge
/// length. Outflow carries the current cell's concentration, inflow the
/// neighbor's.
pub fn upwind_flux(
    outer_normal: &Vector2<f64>,
    mean_flow: &Vector2<f64>,
    concentration: f64,
    concentration_neighbor: f64,
) -> f64 {
    let normal_velocity = mean_flow.dot(outer_normal);
    if normal_velocity > 0.0 {
        concentration * normal_velocity
    } else {
        concentration_neighbor * normal_velocity
    }
}
