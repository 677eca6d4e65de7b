use nalgebra::Vector2;

pub trait Geometric2D {
    fn compute_centroid(x: &[f64; 3], y: &[f64; 3]) -> Vector2<f64> {
        Vector2::new(
            (x[0] + x[1] + x[2]) / 3.0,
            (y[0] + y[1] + y[2]) / 3.0,
        )
    }
    fn compute_element_area(x: &[f64; 3], y: &[f64; 3]) -> f64 {
        // shoelace over the three vertices, in node order
        0.5 * (x[0] * (y[1] - y[2]) + x[1] * (y[2] - y[0]) + x[2] * (y[0] - y[1])).abs()
    }
    /// Unit normal of the edge p0 -> p1, obtained by rotating the edge vector
    /// by +90 degrees. Returns `None` for a zero-length edge.
    fn compute_normal(p0: &Vector2<f64>, p1: &Vector2<f64>) -> Option<Vector2<f64>> {
        let edge = p1 - p0;
        let normal = Vector2::new(-edge[1], edge[0]);
        let normal_magnitude = normal.norm();
        if normal_magnitude == 0.0 {
            return None;
        }
        Some(normal / normal_magnitude)
    }
    /// Normal of the edge p0 -> p1 pointing away from `centroid`, scaled to
    /// the edge length.
    fn compute_scaled_outward_normal(
        p0: &Vector2<f64>,
        p1: &Vector2<f64>,
        centroid: &Vector2<f64>,
    ) -> Option<Vector2<f64>> {
        let mut normal = Self::compute_normal(p0, p1)?;
        let midpoint = 0.5 * (p0 + p1);
        let to_center = centroid - midpoint;
        if normal.dot(&to_center) > 0.0 {
            normal = -normal;
        }
        Some(normal * (p1 - p0).norm())
    }
}
