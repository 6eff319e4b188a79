use crate::config::Config;
use crate::star;
use anyhow::Result;
use renderer::Renderer;
use std::sync::Arc;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::{
    event_loop::{ActiveEventLoop, ControlFlow},
    window::{Window, WindowId},
};
mod renderer;

/// The window and everything drawn into it.
pub struct Engine {
    // Field order matters: the renderer's surface must go before the window.
    renderer: Renderer,
    window: Arc<Window>,
}

impl Engine {
    pub fn new(event_loop: &ActiveEventLoop, config: &Config) -> Result<Self> {
        let attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(LogicalSize::new(config.window_width, config.window_height));
        let window = Arc::new(event_loop.create_window(attributes)?);

        let mesh = star::generate_star(&config.star)?;
        tracing::info!(
            "Generated {}-point star ({} vertices).",
            config.star.point_count,
            mesh.vertex_count()
        );
        let renderer = Renderer::new(window.clone(), config, mesh)?;

        Ok(Self { renderer, window })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Redraws continuously while visible. A minimized window has nothing to
    /// present, so the loop sleeps until the next event instead.
    pub fn control_flow(&self) -> ControlFlow {
        control_flow(self.window.inner_size())
    }

    pub fn request_redraw(&self) {
        if !is_minimized(self.window.inner_size()) {
            self.window.request_redraw();
        }
    }

    pub fn resized(&mut self, size: PhysicalSize<u32>) {
        tracing::info!("width: {} height: {}", size.width, size.height);
        self.renderer.resized();
    }

    pub fn render(&mut self) -> Result<()> {
        self.renderer.render(&self.window)
    }
}

pub fn is_minimized(size: PhysicalSize<u32>) -> bool {
    size.width == 0 || size.height == 0
}

fn control_flow(size: PhysicalSize<u32>) -> ControlFlow {
    if is_minimized(size) {
        ControlFlow::Wait
    } else {
        ControlFlow::Poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_extent_counts_as_minimized() {
        assert!(is_minimized(PhysicalSize::new(0, 0)));
        assert!(is_minimized(PhysicalSize::new(800, 0)));
        assert!(is_minimized(PhysicalSize::new(0, 600)));
        assert!(!is_minimized(PhysicalSize::new(1, 1)));
    }

    #[test]
    fn minimized_window_waits_instead_of_polling() {
        assert_eq!(control_flow(PhysicalSize::new(0, 0)), ControlFlow::Wait);
        assert_eq!(control_flow(PhysicalSize::new(800, 600)), ControlFlow::Poll);
    }
}
