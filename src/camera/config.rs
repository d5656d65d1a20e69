//! Camera configuration

/// Overall shading strategy of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPath {
    /// Shade each drawable directly into the scene color target
    #[default]
    Forward,
    /// Write geometry attributes first, shade them in a fullscreen pass
    Deferred,
}

/// What the camera does to its targets before drawing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearMode {
    /// Keep whatever the targets hold
    Nothing,
    /// Clear depth only
    Depth,
    /// Clear color and depth with the configured color
    #[default]
    Color,
    /// Clear everything, then draw the environment skybox if the scene has one
    Skybox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionKind {
    #[default]
    Perspective,
    /// Pixel-space projection with the origin at the top left
    Orthographic,
}

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub label: String,
    pub render_path: RenderPath,
    pub hdr: bool,
    pub clear_mode: ClearMode,
    pub clear_color: [f32; 4],
    pub projection: ProjectionKind,
    /// Vertical field of view in radians
    pub field_of_view: f32,
    pub near: f32,
    pub far: f32,
    /// Render view-space normals into the normals attachment after the forward pass
    pub normals_pass: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            label: "Camera".to_string(),
            render_path: RenderPath::Forward,
            hdr: false,
            clear_mode: ClearMode::Color,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            projection: ProjectionKind::Perspective,
            field_of_view: 75f32.to_radians(),
            near: 0.01,
            far: 100_000.0,
            normals_pass: false,
        }
    }
}

impl CameraConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_render_path(mut self, render_path: RenderPath) -> Self {
        self.render_path = render_path;
        self
    }

    pub fn with_hdr(mut self, hdr: bool) -> Self {
        self.hdr = hdr;
        self
    }

    pub fn with_clear_mode(mut self, clear_mode: ClearMode) -> Self {
        self.clear_mode = clear_mode;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_projection(mut self, projection: ProjectionKind) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_normals_pass(mut self, enabled: bool) -> Self {
        self.normals_pass = enabled;
        self
    }
}
