/// Cartesian position or direction in detector coordinates (cm).
///
/// Serializes as a three element sequence `[x, y, z]`.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Unit vector along `v`. A zero vector is returned unchanged.
pub fn unit(v: &Vector3) -> Vector3 {
    v.try_normalize(0.0).unwrap_or(*v)
}

/// Copy of `v` with the x coordinate moved by `shift`
pub fn shifted_x(v: &Vector3, shift: f64) -> Vector3 {
    Vector3::new(v.x + shift, v.y, v.z)
}
