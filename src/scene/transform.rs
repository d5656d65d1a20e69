//! Transform used for camera placement and drawable model matrices

use crate::backend::ObjectUniform;
use glam::{Mat3, Mat4, Quat, Vec3};

/// Position, rotation and scale of an object in 3D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Transform at `position` whose local -Z axis points at `target`.
    pub fn looking_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        // look_at_rh builds the inverse rotation; transpose it back into world space
        let view = Mat3::from_mat4(Mat4::look_at_rh(position, target, up));
        Self {
            rotation: Quat::from_mat3(&view.transpose()),
            ..Self::from_position(position)
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World-to-view matrix for a camera placed here; scale does not apply to cameras.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation.conjugate()) * Mat4::from_translation(-self.position)
    }

    pub fn normal_matrix_of(matrix: Mat4) -> Mat3 {
        Mat3::from_mat4(matrix).inverse().transpose()
    }

    /// Local -Z in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn object_uniform(&self) -> ObjectUniform {
        let model = self.matrix();
        ObjectUniform {
            model,
            normal_matrix: Mat4::from_mat3(Self::normal_matrix_of(model)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_matrix_moves_camera_to_origin() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        let origin = transform.view_matrix().transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!(origin.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let transform = Transform {
            scale: Vec3::new(2.0, 1.0, 1.0),
            ..Transform::default()
        };
        let uniform = transform.object_uniform();
        let normal = uniform.normal_matrix.transform_vector3(Vec3::X);
        assert!(normal.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-5));
    }

    #[test]
    fn look_at_faces_target() {
        let transform = Transform::looking_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        assert!(transform.forward().abs_diff_eq(-Vec3::Z, 1e-5));

        let in_view = transform.view_matrix().transform_point3(Vec3::ZERO);
        assert!(in_view.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }
}
