//! Output surfaces: the winit window and a headless stand-in

use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    error::{EventLoopError, OsError},
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window as WinitWindow, WindowBuilder},
};

/// What a camera needs to know about the surface it renders for.
pub trait OutputSurface {
    /// Current size in physical pixels
    fn resolution(&self) -> (u32, u32);

    /// Whether the surface changed size since the last frame
    fn was_resized(&self) -> bool;

    fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.resolution();
        width as f32 / height.max(1) as f32
    }
}

/// A winit window tracked as an [`OutputSurface`]
pub struct Window {
    handle: Arc<WinitWindow>,
    size: PhysicalSize<u32>,
    resized: bool,
    close_requested: bool,
}

impl Window {
    pub fn new(
        event_loop: &EventLoop<()>,
        title: &str,
        width: u32,
        height: u32,
    ) -> Result<Self, OsError> {
        let handle = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .build(event_loop)?;
        let size = handle.inner_size();
        log::debug!("Window '{}' opened at {}x{}", title, size.width, size.height);

        Ok(Self {
            handle: Arc::new(handle),
            size,
            resized: false,
            close_requested: false,
        })
    }

    /// Shared winit handle, as the wgpu surface needs it
    pub fn handle(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.handle)
    }

    fn observe(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.size = *size;
                self.resized = true;
            }
            WindowEvent::CloseRequested => self.close_requested = true,
            _ => {}
        }
    }
}

impl OutputSurface for Window {
    fn resolution(&self) -> (u32, u32) {
        (self.size.width, self.size.height)
    }

    fn was_resized(&self) -> bool {
        self.resized
    }
}

/// Drive the event loop, calling `frame` whenever the loop goes idle.
///
/// The resize flag stays raised for exactly one `frame` call.
pub fn run<F>(title: &str, width: u32, height: u32, mut frame: F) -> Result<(), EventLoopError>
where
    F: FnMut(&mut Window) + 'static,
{
    let event_loop = EventLoop::new()?;
    let mut window = Window::new(&event_loop, title, width, height).map_err(|err| {
        log::error!("Window creation failed: {}", err);
        EventLoopError::Os(err)
    })?;

    event_loop.run(move |event, target: &EventLoopWindowTarget<()>| {
        target.set_control_flow(ControlFlow::Poll);
        match event {
            Event::WindowEvent { event, .. } => {
                window.observe(&event);
                if window.close_requested {
                    target.exit();
                }
            }
            Event::AboutToWait => {
                frame(&mut window);
                window.resized = false;
                window.handle.request_redraw();
            }
            _ => {}
        }
    })
}

/// Surface without a window, for tests and offscreen tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessSurface {
    width: u32,
    height: u32,
    resized: bool,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            resized: false,
        }
    }

    /// Change size and raise the resize flag
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resized = true;
    }

    pub fn clear_resize_flag(&mut self) {
        self.resized = false;
    }
}

impl OutputSurface for HeadlessSurface {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn was_resized(&self) -> bool {
        self.resized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_surface_reports_resizes_until_cleared() {
        let mut surface = HeadlessSurface::new(800, 600);
        assert!(!surface.was_resized());
        assert!((surface.aspect_ratio() - 4.0 / 3.0).abs() < 1e-6);

        surface.resize(1920, 1080);
        assert!(surface.was_resized());
        assert_eq!(surface.resolution(), (1920, 1080));

        surface.clear_resize_flag();
        assert!(!surface.was_resized());
    }
}
