use nalgebra as na;

/// Threshold below which an axis-angle vector is treated as a zero rotation.
const RODRIGUES_EPS: f32 = 1e-5;

/// Converts an axis-angle vector to a rotation matrix (Rodrigues' formula).
///
/// Angles below [`RODRIGUES_EPS`] return the identity so the axis
/// normalization never divides by zero.
pub fn rodrigues(v: &na::Vector3<f32>) -> na::Matrix3<f32> {
    let theta = v.norm();
    if theta < RODRIGUES_EPS {
        return na::Matrix3::identity();
    }
    let c = theta.cos();
    let s = theta.sin();
    let r = v / theta;
    let skew = na::Matrix3::new(0.0, -r.z, r.y, r.z, 0.0, -r.x, -r.y, r.x, 0.0);
    na::Matrix3::identity() * c + (r * r.transpose()) * (1.0 - c) + skew * s
}

/// Composes two row-major 3x4 affine transforms with implicit bottom row
/// `[0 0 0 1]`, storing the result in place: `b <- a * b`.
pub fn mul_affine(a: &[f32; 12], b: &mut [f32; 12]) {
    let mut out = [0.0f32; 12];
    for r in 0..3 {
        for c in 0..4 {
            let mut acc = a[4 * r] * b[c] + a[4 * r + 1] * b[4 + c] + a[4 * r + 2] * b[8 + c];
            if c == 3 {
                acc += a[4 * r + 3];
            }
            out[4 * r + c] = acc;
        }
    }
    *b = out;
}

/// Applies a row-major 3x4 affine transform to a point.
pub fn transform_point(t: &[f32; 12], p: [f32; 3]) -> [f32; 3] {
    [
        t[0] * p[0] + t[1] * p[1] + t[2] * p[2] + t[3],
        t[4] * p[0] + t[5] * p[1] + t[6] * p[2] + t[7],
        t[8] * p[0] + t[9] * p[1] + t[10] * p[2] + t[11],
    ]
}

/// Applies only the rotation part of a row-major 3x4 affine transform.
pub fn rotate_point(t: &[f32; 12], p: [f32; 3]) -> [f32; 3] {
    [
        t[0] * p[0] + t[1] * p[1] + t[2] * p[2],
        t[4] * p[0] + t[5] * p[1] + t[6] * p[2],
        t[8] * p[0] + t[9] * p[1] + t[10] * p[2],
    ]
}
