mod engine;
use crate::app::engine::Engine;
use crate::config::Config;
use anyhow::Result;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::WindowId,
};

pub struct App {
    config: Config,
    engine: Option<Engine>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            engine: None,
            error: None,
        }
    }

    /// Error that stopped the event loop, if any.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        self.engine = None;
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() {
            return;
        }
        match Engine::new(event_loop, &self.config) {
            Ok(engine) => self.engine = Some(engine),
            Err(error) => self.fail(event_loop, error.context("Failed to initialize")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        if window_id != engine.window_id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                engine.resized(size);
            }
            WindowEvent::RedrawRequested => {
                if let Err(error) = engine.render() {
                    self.fail(event_loop, error);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.engine.as_ref() {
            event_loop.set_control_flow(engine.control_flow());
            engine.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.engine = None;
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.engine = None;
    }
}
