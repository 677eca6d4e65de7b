use nalgebra::Vector2;

/// Location of the spill.
pub const SOURCE_POINT: [f64; 2] = [0.305, 0.45];
/// Width parameter of the initial Gaussian bump.
pub const SOURCE_SPREAD: f64 = 0.01;

/// Time-invariant velocity field v(x, y) = (y - 0.2x, -x).
pub fn velocity_field(point: &Vector2<f64>) -> Vector2<f64> {
    let (x, y) = (point[0], point[1]);
    Vector2::new(y - 0.2 * x, -x)
}

/// Initial concentration, 1 at the source and decaying as a Gaussian.
pub fn initial_concentration(point: &Vector2<f64>) -> f64 {
    let source = Vector2::from(SOURCE_POINT);
    (-(point - source).norm_squared() / SOURCE_SPREAD).exp()
}
