//! Projection and view state of a camera

use crate::backend::{CameraUniform, SkyboxUniform};
use crate::camera::config::{CameraConfig, ProjectionKind};
use crate::scene::Transform;
use glam::{Mat3, Mat4, Vec3, Vec4};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    /// Pixel-space projection: x in `[0, width]`, y in `[0, height]` growing downwards,
    /// depth in `[-1, 1]`.
    Orthographic { width: f32, height: f32 },
}

impl Projection {
    pub fn from_config(config: &CameraConfig, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1) as f32, height.max(1) as f32);
        match config.projection {
            ProjectionKind::Perspective => Projection::Perspective {
                fov_y: config.field_of_view,
                aspect: width / height,
                near: config.near,
                far: config.far,
            },
            ProjectionKind::Orthographic => Projection::Orthographic { width, height },
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic { width, height } => {
                Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
            }
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { .. } => -1.0,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { .. } => 1.0,
        }
    }

    pub fn aspect(&self) -> f32 {
        match self {
            Projection::Perspective { aspect, .. } => *aspect,
            Projection::Orthographic { width, height } => width / height,
        }
    }

    /// Adapt to a new output resolution.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        match self {
            Projection::Perspective { aspect, .. } => *aspect = w / h,
            Projection::Orthographic { width, height } => {
                *width = w;
                *height = h;
            }
        }
    }
}

/// Aspect ratio encoded in a projection matrix (`m11 / m00`).
pub fn matrix_aspect_ratio(matrix: &Mat4) -> f32 {
    (matrix.y_axis.y / matrix.x_axis.x).abs()
}

/// Matrices and parameters the passes, drawables and effects read from a camera.
#[derive(Debug, Clone)]
pub struct ViewState {
    projection: Mat4,
    view: Mat4,
    normal: Mat3,
    position: Vec3,
    near: f32,
    far: f32,
    resolution: (u32, u32),
    hdr: bool,
}

impl ViewState {
    pub(crate) fn new(projection: &Projection, resolution: (u32, u32), hdr: bool) -> Self {
        Self {
            projection: projection.matrix(),
            view: Mat4::IDENTITY,
            normal: Mat3::IDENTITY,
            position: Vec3::ZERO,
            near: projection.near(),
            far: projection.far(),
            resolution,
            hdr,
        }
    }

    pub(crate) fn set_projection(&mut self, projection: &Projection, resolution: (u32, u32)) {
        self.projection = projection.matrix();
        self.near = projection.near();
        self.far = projection.far();
        self.resolution = resolution;
    }

    pub(crate) fn set_view(&mut self, view: Mat4) {
        self.view = view;
        self.normal = Transform::normal_matrix_of(view);
    }

    pub(crate) fn set_normal(&mut self, normal: Mat3) {
        self.normal = normal;
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn normal(&self) -> Mat3 {
        self.normal
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn hdr(&self) -> bool {
        self.hdr
    }

    pub fn aspect_ratio(&self) -> f32 {
        matrix_aspect_ratio(&self.projection)
    }

    pub fn camera_uniform(&self) -> CameraUniform {
        let view_proj = self.projection * self.view;
        CameraUniform {
            view: self.view,
            proj: self.projection,
            view_proj,
            inv_view: self.view.inverse(),
            inv_proj: self.projection.inverse(),
            position: self.position.extend(1.0),
            near_far: Vec4::new(self.near, self.far, 0.0, 0.0),
        }
    }

    /// Skybox parameters: the view matrix without its translation.
    pub fn skybox_uniform(&self) -> SkyboxUniform {
        let view = Mat4::from_mat3(Mat3::from_mat4(self.view));
        SkyboxUniform {
            view,
            projection: self.projection,
            inv_view_projection: (self.projection * view).inverse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orthographic_aspect_is_exact() {
        let config = CameraConfig {
            projection: ProjectionKind::Orthographic,
            ..Default::default()
        };
        let projection = Projection::from_config(&config, 1920, 1080);
        let aspect = matrix_aspect_ratio(&projection.matrix());
        assert!((aspect - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn orthographic_maps_top_left_pixel_to_clip_corner() {
        let projection = Projection::Orthographic {
            width: 800.0,
            height: 600.0,
        };
        let corner = projection.matrix().project_point3(Vec3::ZERO);
        assert!(corner.truncate().abs_diff_eq(glam::Vec2::new(-1.0, 1.0), 1e-6));
    }

    #[test]
    fn perspective_follows_resolution() {
        let mut projection = Projection::from_config(&CameraConfig::default(), 800, 600);
        projection.set_resolution(1280, 720);
        let aspect = matrix_aspect_ratio(&projection.matrix());
        assert!((aspect - 1280.0 / 720.0).abs() < 1e-5);
    }

    #[test]
    fn skybox_view_drops_translation() {
        let mut state = ViewState::new(&Projection::Orthographic { width: 4.0, height: 4.0 }, (4, 4), false);
        state.set_view(Mat4::from_translation(Vec3::new(5.0, 6.0, 7.0)));
        assert_eq!(state.skybox_uniform().view, Mat4::IDENTITY);
    }
}
