use std::ops::Mul;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{EPSILON, SLERP_THRESHOLD};
use crate::error::{GestureError, Result};
use crate::vec3::Vec3;

/// Unit quaternion representing a 3D rotation.
///
/// Always normalized. q and -q describe the same rotation; comparisons that
/// care about rotational equality go through `angular_distance`, which
/// handles the antipodal pair via abs(dot).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PartialEq for Quaternion {
    fn eq(&self, other: &Self) -> bool {
        (self.w - other.w).abs() < EPSILON
            && (self.x - other.x).abs() < EPSILON
            && (self.y - other.y).abs() < EPSILON
            && (self.z - other.z).abs() < EPSILON
    }
}

impl Quaternion {
    /// Create a new quaternion, automatically normalized.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }.normalize()
    }

    /// Identity rotation (w=1).
    pub fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    /// Rotation of `angle` radians about a unit `axis`.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let half = angle / 2.0;
        let s = half.sin();
        Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s)
    }

    /// Normalize to unit length. Returns identity if near-zero magnitude.
    pub fn normalize(self) -> Self {
        let norm = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if norm < EPSILON {
            return Self::identity();
        }
        Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    /// Inverse rotation. For unit quaternions the conjugate is the inverse.
    pub fn conjugate(self) -> Self {
        Self {
            w: self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }

    /// 4D dot product.
    pub fn dot(self, other: Self) -> f64 {
        self.w * other.w + self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Rotation angle between two orientations, in radians. Range: [0, π].
    pub fn angular_distance(self, other: Self) -> f64 {
        let d = self.dot(other).abs().clamp(0.0, 1.0);
        2.0 * d.acos()
    }

    /// Rotate a vector by this quaternion.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let t = qv.cross(v) * 2.0;
        v + t * self.w + qv.cross(t)
    }

    /// Spherical linear interpolation with antipodal flip and NLERP fallback.
    pub fn slerp(self, other: Self, t: f64) -> Self {
        if t <= 0.0 {
            return self;
        }
        if t >= 1.0 {
            return other;
        }

        let mut dot = self.dot(other);
        let o;

        // Take shorter arc
        if dot < 0.0 {
            o = Self {
                w: -other.w,
                x: -other.x,
                y: -other.y,
                z: -other.z,
            };
            dot = -dot;
        } else {
            o = other;
        }

        // Near-parallel: NLERP fallback
        if dot > SLERP_THRESHOLD {
            return Self {
                w: self.w + t * (o.w - self.w),
                x: self.x + t * (o.x - self.x),
                y: self.y + t * (o.y - self.y),
                z: self.z + t * (o.z - self.z),
            }
            .normalize();
        }

        let theta = dot.clamp(-1.0, 1.0).acos();
        let sin_theta = theta.sin();

        let s0 = ((1.0 - t) * theta).sin() / sin_theta;
        let s1 = (t * theta).sin() / sin_theta;

        Self {
            w: s0 * self.w + s1 * o.w,
            x: s0 * self.x + s1 * o.x,
            y: s0 * self.y + s1 * o.y,
            z: s0 * self.z + s1 * o.z,
        }
        .normalize()
    }

    /// Build a quaternion from three orthonormal direction vectors (the
    /// columns of a rotation matrix): a stroke's primary, secondary and
    /// minor spread axes. Uses the trace-based algorithm; the divisor is
    /// guarded so a degenerate basis reports numeric instability instead of
    /// producing NaN.
    pub fn from_axes(d0: Vec3, d1: Vec3, d2: Vec3) -> Result<Self> {
        let trace = d0.x + d1.y + d2.z;
        let (w, x, y, z);
        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            if s < EPSILON {
                return Err(GestureError::NumericInstability);
            }
            w = 0.25 * s;
            x = (d1.z - d2.y) / s;
            y = (d2.x - d0.z) / s;
            z = (d0.y - d1.x) / s;
        } else if d0.x > d1.y && d0.x > d2.z {
            let s = (1.0 + d0.x - d1.y - d2.z).sqrt() * 2.0;
            if s < EPSILON {
                return Err(GestureError::NumericInstability);
            }
            w = (d1.z - d2.y) / s;
            x = 0.25 * s;
            y = (d1.x + d0.y) / s;
            z = (d2.x + d0.z) / s;
        } else if d1.y > d2.z {
            let s = (1.0 + d1.y - d0.x - d2.z).sqrt() * 2.0;
            if s < EPSILON {
                return Err(GestureError::NumericInstability);
            }
            w = (d2.x - d0.z) / s;
            x = (d1.x + d0.y) / s;
            y = 0.25 * s;
            z = (d2.y + d1.z) / s;
        } else {
            let s = (1.0 + d2.z - d0.x - d1.y).sqrt() * 2.0;
            if s < EPSILON {
                return Err(GestureError::NumericInstability);
            }
            w = (d0.y - d1.x) / s;
            x = (d2.x + d0.z) / s;
            y = (d2.y + d1.z) / s;
            z = 0.25 * s;
        }
        Ok(Self::new(w, x, y, z))
    }

    /// The three orthonormal direction vectors (rotation matrix columns)
    /// described by this quaternion. Inverse of `from_axes`.
    pub fn to_axes(self) -> [Vec3; 3] {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        [
            Vec3::new(
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y + w * z),
                2.0 * (x * z - w * y),
            ),
            Vec3::new(
                2.0 * (x * y - w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z + w * x),
            ),
            Vec3::new(
                2.0 * (x * z + w * y),
                2.0 * (y * z - w * x),
                1.0 - 2.0 * (x * x + y * y),
            ),
        ]
    }

    /// Uniform random rotation using Shoemake's method.
    pub fn random(rng: &mut impl Rng) -> Self {
        let s1: f64 = rng.random();
        let t1 = std::f64::consts::TAU * rng.random::<f64>();
        let t2 = std::f64::consts::TAU * rng.random::<f64>();

        let r1 = (1.0 - s1).sqrt();
        let r2 = s1.sqrt();

        Self {
            w: r1 * t1.sin(),
            x: r1 * t1.cos(),
            y: r2 * t2.sin(),
            z: r2 * t2.cos(),
        }
        .normalize()
    }

    /// Convert to [w, x, y, z] array for serialization.
    pub fn to_array(self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Create from [w, x, y, z] array.
    pub fn from_array(arr: [f64; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }
}

impl std::ops::Neg for Quaternion {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            w: -self.w,
            x: -self.x,
            y: -self.y,
            z: -self.z,
        }
    }
}

/// Hamilton product (rotation composition; rhs applied first).
impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    fn assert_unit(q: Quaternion) {
        let norm = (q.w * q.w + q.x * q.x + q.y * q.y + q.z * q.z).sqrt();
        assert!(
            (norm - 1.0).abs() < 1e-10,
            "quaternion not unit: norm = {norm}"
        );
    }

    fn assert_approx_eq(a: Quaternion, b: Quaternion, tol: f64) {
        // Check both q and -q (antipodal equivalence for rotations)
        let direct = (a.w - b.w)
            .abs()
            .max((a.x - b.x).abs())
            .max((a.y - b.y).abs())
            .max((a.z - b.z).abs());
        let antipodal = (a.w + b.w)
            .abs()
            .max((a.x + b.x).abs())
            .max((a.y + b.y).abs())
            .max((a.z + b.z).abs());
        let min_diff = direct.min(antipodal);
        assert!(
            min_diff < tol,
            "quaternions not approx equal: {a:?} vs {b:?} (min_diff = {min_diff})"
        );
    }

    #[test]
    fn test_normalize() {
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        assert_unit(q);
        assert!((q.w - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_normalize_near_zero() {
        let q = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn test_identity_axes() {
        // The canonical basis must map to the identity rotation (0,0,0,1)
        // in (x,y,z,w) notation.
        let q = Quaternion::from_axes(
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        assert_eq!(q, Quaternion::identity());
    }

    #[test]
    fn test_axes_roundtrip() {
        let mut rng = rng();
        for _ in 0..50 {
            let q = Quaternion::random(&mut rng);
            let [d0, d1, d2] = q.to_axes();
            let q2 = Quaternion::from_axes(d0, d1, d2).unwrap();
            assert_approx_eq(q, q2, 1e-9);
        }
    }

    #[test]
    fn test_axes_roundtrip_negative_trace() {
        // 180° about z has trace -1 in the upper-left 2x2; exercises the
        // non-trace branches.
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), std::f64::consts::PI);
        let [d0, d1, d2] = q.to_axes();
        let q2 = Quaternion::from_axes(d0, d1, d2).unwrap();
        assert_approx_eq(q, q2, 1e-9);
    }

    #[test]
    fn test_rotate_vector() {
        // 90° about z maps x onto y.
        let q = Quaternion::from_axis_angle(
            Vec3::new(0.0, 0.0, 1.0),
            std::f64::consts::FRAC_PI_2,
        );
        let v = q.rotate(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(v, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_conjugate_undoes_rotation() {
        let mut rng = rng();
        let q = Quaternion::random(&mut rng);
        let v = Vec3::new(0.3, -0.7, 1.1);
        let back = q.conjugate().rotate(q.rotate(v));
        assert_eq!(back, v);
    }

    #[test]
    fn test_angular_distance_identity_and_antipodal() {
        let a = Quaternion::identity();
        assert!(a.angular_distance(a) < EPSILON);
        // -q is the same rotation
        assert!(a.angular_distance(-a) < EPSILON);
    }

    #[test]
    fn test_slerp_endpoints() {
        let mut rng = rng();
        let a = Quaternion::random(&mut rng);
        let b = Quaternion::random(&mut rng);

        assert_approx_eq(a.slerp(b, 0.0), a, 1e-10);
        assert_approx_eq(a.slerp(b, 1.0), b, 1e-10);
    }

    #[test]
    fn test_slerp_midpoint_equidistant() {
        let a = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let b = Quaternion::new(0.707, 0.707, 0.0, 0.0);
        let mid = a.slerp(b, 0.5);
        assert_unit(mid);

        let da = a.angular_distance(mid);
        let db = mid.angular_distance(b);
        assert!(
            (da - db).abs() < 0.01,
            "midpoint not equidistant: {da} vs {db}"
        );
    }

    #[test]
    fn test_slerp_near_parallel_nlerp_fallback() {
        let a = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let b = Quaternion::new(1.0, 0.0001, 0.0, 0.0);
        assert_unit(a.slerp(b, 0.5));
    }

    #[test]
    fn test_hamilton_product_identity() {
        let mut rng = rng();
        let q = Quaternion::random(&mut rng);
        let id = Quaternion::identity();

        assert_approx_eq(q * id, q, 1e-10);
        assert_approx_eq(id * q, q, 1e-10);
    }

    #[test]
    fn test_hamilton_product_associative() {
        let mut rng = rng();
        let a = Quaternion::random(&mut rng);
        let b = Quaternion::random(&mut rng);
        let c = Quaternion::random(&mut rng);

        assert_approx_eq((a * b) * c, a * (b * c), 1e-10);
    }

    #[test]
    fn test_random_unit() {
        let mut rng = rng();
        for _ in 0..100 {
            assert_unit(Quaternion::random(&mut rng));
        }
    }

    #[test]
    fn test_to_from_array_roundtrip() {
        let mut rng = rng();
        let q = Quaternion::random(&mut rng);
        assert_approx_eq(Quaternion::from_array(q.to_array()), q, 1e-10);
    }
}
