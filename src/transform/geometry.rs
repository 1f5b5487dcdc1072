//! Rotation Geometry
//!
//! Euler-angle handling for the Rotate/Rotate merge rule. Naive addition of
//! Euler triples produces gimbal-lock artifacts, so concurrent rotations
//! are composed through quaternions: convert each triple, multiply, convert
//! back.
//!
//! Angles are degrees throughout, applied in roll (x), pitch (y), yaw (z)
//! order.

use std::ops::Mul;

/// A rotation quaternion (w + xi + yj + zk)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// The identity rotation
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Build a quaternion from an Euler triple in degrees
    pub fn from_euler_deg(angles: [f64; 3]) -> Self {
        let roll = angles[0].to_radians();
        let pitch = angles[1].to_radians();
        let yaw = angles[2].to_radians();

        let (sr, cr) = (roll * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sy, cy) = (yaw * 0.5).sin_cos();

        Self {
            w: cr * cp * cy + sr * sp * sy,
            x: sr * cp * cy - cr * sp * sy,
            y: cr * sp * cy + sr * cp * sy,
            z: cr * cp * sy - sr * sp * cy,
        }
    }

    /// Convert back to an Euler triple in degrees
    pub fn to_euler_deg(self) -> [f64; 3] {
        let q = self.normalized();

        let roll = (2.0 * (q.w * q.x + q.y * q.z)).atan2(1.0 - 2.0 * (q.x * q.x + q.y * q.y));
        let pitch = (2.0 * (q.w * q.y - q.z * q.x)).clamp(-1.0, 1.0).asin();
        let yaw = (2.0 * (q.w * q.z + q.x * q.y)).atan2(1.0 - 2.0 * (q.y * q.y + q.z * q.z));

        [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()]
    }

    /// Unit-length copy of this quaternion
    pub fn normalized(self) -> Self {
        let norm = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if norm == 0.0 {
            return Self::IDENTITY;
        }
        Self {
            w: self.w / norm,
            x: self.x / norm,
            y: self.y / norm,
            z: self.z / norm,
        }
    }

    /// Rotation-equivalence within tolerance (q and -q are the same rotation)
    pub fn approx_eq(self, other: Quaternion, tolerance: f64) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        let direct = (a.w - b.w).abs() <= tolerance
            && (a.x - b.x).abs() <= tolerance
            && (a.y - b.y).abs() <= tolerance
            && (a.z - b.z).abs() <= tolerance;
        let negated = (a.w + b.w).abs() <= tolerance
            && (a.x + b.x).abs() <= tolerance
            && (a.y + b.y).abs() <= tolerance
            && (a.z + b.z).abs() <= tolerance;
        direct || negated
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    /// Hamilton product; `a * b` applies `b` first, then `a`
    fn mul(self, rhs: Quaternion) -> Quaternion {
        Quaternion {
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        }
    }
}

/// Compose two Euler rotations (degrees) via the quaternion product.
///
/// `second` is applied after `first`.
pub fn compose_euler_deg(first: [f64; 3], second: [f64; 3]) -> [f64; 3] {
    (Quaternion::from_euler_deg(second) * Quaternion::from_euler_deg(first)).to_euler_deg()
}
