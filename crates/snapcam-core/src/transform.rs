//! World transform of a device or any other scene object.

use glam::{Mat3, Mat4, Quat, Vec3};

const EPSILON: f32 = 1e-6;

/// Position, orientation and scale in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Local-to-world matrix.
    pub fn compute_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// Rotate in place so that local +Z points at `target`. Position and scale
    /// are untouched.
    ///
    /// Returns `false` and leaves the rotation unchanged when `target`
    /// coincides with the current position.
    pub fn look_at(&mut self, target: Vec3, up: Vec3) -> bool {
        let forward = target - self.translation;
        if forward.length_squared() < EPSILON {
            return false;
        }
        let z = forward.normalize();
        let x = up.cross(z);
        // Looking straight along `up` leaves the roll undefined; pick any.
        let x = if x.length_squared() < EPSILON {
            z.any_orthonormal_vector()
        } else {
            x.normalize()
        };
        let y = z.cross(x);
        self.rotation = Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize();
        true
    }
}
