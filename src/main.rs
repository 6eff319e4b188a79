use crate::app::App;
use crate::config::Config;
use anyhow::Result;
use winit::event_loop::{ControlFlow, EventLoop};

mod app;
mod config;
mod star;

fn run() -> Result<()> {
    let mut app = App::new(Config::default());
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    event_loop.run_app(&mut app)?;

    app.into_result()
}

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(error) = run() {
        tracing::error!("{:#}", error);
        std::process::exit(-1);
    }
}
