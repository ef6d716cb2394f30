//! Geometry transforms.
//!
//! Rotation-matrix to quaternion conversion for oriented bounding boxes,
//! and scene bounds computation over decoded point buffers. Both are
//! defensive by contract: scan pipelines hand us non-finite matrices and
//! corrupted vertices often enough that "substitute something sane" beats
//! "fail the scene".

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::util::BBox3f;

/// Coordinates beyond this magnitude are treated as corrupt when framing
/// a scene. Room-scale scans stay far below it; values like 4294.97
/// (2^32 / 1e6) indicate encoding damage.
pub const PLAUSIBLE_COORD_MAX: f32 = 100.0;

/// Convert a 3x3 rotation matrix to a unit quaternion `(x, y, z, w)`.
///
/// Trace-based: the trace branch when `m00 + m11 + m22 > 0`, otherwise the
/// branch of the largest diagonal element so the divisor stays well away
/// from zero. Any non-finite input element, or a non-finite result, yields
/// the identity quaternion.
pub fn quaternion_from_rotation_matrix(m: Mat3) -> Quat {
    // glam stores columns; the formulas below are in row-major m[row][col].
    let (m00, m01, m02) = (m.x_axis.x, m.y_axis.x, m.z_axis.x);
    let (m10, m11, m12) = (m.x_axis.y, m.y_axis.y, m.z_axis.y);
    let (m20, m21, m22) = (m.x_axis.z, m.y_axis.z, m.z_axis.z);

    let elements = [m00, m01, m02, m10, m11, m12, m20, m21, m22];
    if !elements.iter().all(|v| v.is_finite()) {
        return Quat::IDENTITY;
    }

    let trace = m00 + m11 + m22;
    let (x, y, z, w) = if trace > 0.0 {
        let s = 0.5 / (trace + 1.0).sqrt();
        (
            (m21 - m12) * s,
            (m02 - m20) * s,
            (m10 - m01) * s,
            0.25 / s,
        )
    } else if m00 > m11 && m00 > m22 {
        let s = 2.0 * (1.0 + m00 - m11 - m22).sqrt();
        (
            0.25 * s,
            (m01 + m10) / s,
            (m02 + m20) / s,
            (m21 - m12) / s,
        )
    } else if m11 > m22 {
        let s = 2.0 * (1.0 + m11 - m00 - m22).sqrt();
        (
            (m01 + m10) / s,
            0.25 * s,
            (m12 + m21) / s,
            (m02 - m20) / s,
        )
    } else {
        let s = 2.0 * (1.0 + m22 - m00 - m11).sqrt();
        (
            (m02 + m20) / s,
            (m12 + m21) / s,
            0.25 * s,
            (m10 - m01) / s,
        )
    };

    let q = Quat::from_xyzw(x, y, z, w);
    if q.is_finite() {
        q
    } else {
        Quat::IDENTITY
    }
}

/// Convert a row-major 9-element rotation matrix to a quaternion.
pub fn quaternion_from_rows(rows: &[f32; 9]) -> Quat {
    quaternion_from_rotation_matrix(Mat3::from_cols_array(rows).transpose())
}

/// Axis-aligned bounds of the plausible subset of a point buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub size: Vec3,
    /// How many points passed the plausibility filter.
    pub used_points: usize,
}

/// Compute scene bounds over flat xyz triples with the default
/// [`PLAUSIBLE_COORD_MAX`] limit.
pub fn compute_bounds(points: &[f32]) -> Option<SceneBounds> {
    compute_bounds_with_limit(points, PLAUSIBLE_COORD_MAX)
}

/// Compute scene bounds, excluding origin points (zeroed NaNs) and points
/// with any coordinate beyond `limit`. Returns `None` when no point
/// survives the filter.
pub fn compute_bounds_with_limit(points: &[f32], limit: f32) -> Option<SceneBounds> {
    let mut bbox = BBox3f::EMPTY;
    let mut used_points = 0usize;

    for p in points.chunks_exact(3) {
        let (x, y, z) = (p[0], p[1], p[2]);
        let plausible = x.is_finite()
            && y.is_finite()
            && z.is_finite()
            && !(x == 0.0 && y == 0.0 && z == 0.0)
            && x.abs() < limit
            && y.abs() < limit
            && z.abs() < limit;
        if plausible {
            bbox.expand_by_point(Vec3::new(x, y, z));
            used_points += 1;
        }
    }

    if used_points == 0 {
        return None;
    }
    Some(SceneBounds {
        min: bbox.min,
        max: bbox.max,
        center: bbox.center(),
        size: bbox.size(),
        used_points,
    })
}

/// Oriented bounding box: center, half-extents and a unit rotation.
///
/// The wire shape matches the scene-graph JSON: `center` and `half_dims`
/// as 3-arrays, `rotation` as `[x, y, z, w]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obb {
    pub center: Vec3,
    pub half_dims: Vec3,
    pub rotation: Quat,
}

impl Obb {
    /// Normalize the rotation in place; degenerate or non-finite
    /// quaternions become identity.
    pub fn sanitize_rotation(&mut self) {
        let q = self.rotation;
        if q.is_finite() && q.length_squared() > f32::EPSILON {
            self.rotation = q.normalize();
        } else {
            self.rotation = Quat::IDENTITY;
        }
    }

    /// Build an OBB from MultiScan OBB fields: a centroid, full axis
    /// lengths, and a row-major `normalizedAxes` matrix with either 9
    /// (3x3) or 16 (4x4) elements.
    pub fn from_multiscan(centroid: Vec3, axes_lengths: Vec3, normalized_axes: &[f32]) -> Obb {
        const IDENTITY_ROWS: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let rows: [f32; 9] = match normalized_axes.len() {
            9 => normalized_axes.try_into().unwrap_or(IDENTITY_ROWS),
            16 => [
                normalized_axes[0],
                normalized_axes[1],
                normalized_axes[2],
                normalized_axes[4],
                normalized_axes[5],
                normalized_axes[6],
                normalized_axes[8],
                normalized_axes[9],
                normalized_axes[10],
            ],
            _ => IDENTITY_ROWS,
        };
        Obb {
            center: centroid,
            half_dims: axes_lengths * 0.5,
            rotation: quaternion_from_rows(&rows),
        }
    }
}

impl Default for Obb {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            half_dims: Vec3::ONE,
            rotation: Quat::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matrix_to_identity_quat() {
        let q = quaternion_from_rotation_matrix(Mat3::IDENTITY);
        assert_eq!((q.x, q.y, q.z, q.w), (0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_non_finite_matrix_yields_identity() {
        let mut m = Mat3::IDENTITY;
        m.y_axis.y = f32::NAN;
        assert_eq!(quaternion_from_rotation_matrix(m), Quat::IDENTITY);

        let m = Mat3::from_cols_array(&[f32::INFINITY; 9]);
        assert_eq!(quaternion_from_rotation_matrix(m), Quat::IDENTITY);
    }

    #[test]
    fn test_rotation_z_90() {
        // Row-major rotation of 90 degrees about Z.
        let q = quaternion_from_rows(&[0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let expect = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        assert!((q.dot(expect).abs() - 1.0).abs() < 1e-5);
        assert!((q.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_negative_trace_branches() {
        // 180-degree rotations exercise each diagonal branch.
        for (axis, expect) in [
            (Vec3::X, Quat::from_rotation_x(std::f32::consts::PI)),
            (Vec3::Y, Quat::from_rotation_y(std::f32::consts::PI)),
            (Vec3::Z, Quat::from_rotation_z(std::f32::consts::PI)),
        ] {
            let m = Mat3::from_axis_angle(axis, std::f32::consts::PI);
            let q = quaternion_from_rotation_matrix(m);
            assert!(
                (q.dot(expect).abs() - 1.0).abs() < 1e-5,
                "axis {:?}: got {:?}",
                axis,
                q
            );
        }
    }

    #[test]
    fn test_compute_bounds_excludes_origin_and_outliers() {
        let points = [
            0.0, 0.0, 0.0, // zeroed NaN, excluded
            1.0, 2.0, 3.0, //
            -1.0, -2.0, -3.0, //
            4294.97, 0.0, 0.0, // encoding damage, excluded
        ];
        let b = compute_bounds(&points).unwrap();
        assert_eq!(b.used_points, 2);
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.center, Vec3::ZERO);
        assert_eq!(b.size, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_compute_bounds_all_excluded() {
        let points = [0.0, 0.0, 0.0, 500.0, 0.0, 0.0];
        assert!(compute_bounds(&points).is_none());
    }

    #[test]
    fn test_obb_sanitize_rotation() {
        let mut obb = Obb {
            rotation: Quat::from_xyzw(0.0, 0.0, 0.0, 2.0),
            ..Obb::default()
        };
        obb.sanitize_rotation();
        assert_eq!(obb.rotation, Quat::IDENTITY);

        let mut obb = Obb {
            rotation: Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0),
            ..Obb::default()
        };
        obb.sanitize_rotation();
        assert_eq!(obb.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_obb_from_multiscan_4x4() {
        let axes = [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let obb = Obb::from_multiscan(Vec3::new(1.0, 2.0, 3.0), Vec3::splat(2.0), &axes);
        assert_eq!(obb.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(obb.half_dims, Vec3::ONE);
        assert_eq!(obb.rotation, Quat::IDENTITY);
    }
}
