//! Window and event loop using winit

use std::sync::Arc;

use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    keyboard::PhysicalKey,
    window::WindowBuilder,
};

use crate::app::DemoApp;
use crate::backend::WgpuBackend;
use crate::demos::DemoKind;
use crate::error::{AppError, StartupError};
use crate::input::action_for_key;
use crate::resources::FileAssetLoader;
use crate::DemoConfig;

/// Open a window, start `kind` and render on every idle tick until quit.
///
/// Returns once the loop exits; every resource is released by then.
pub fn run(kind: DemoKind, config: DemoConfig) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    let title = config.title.clone().unwrap_or_else(|| kind.name().to_string());

    let window = WindowBuilder::new()
        .with_title(title)
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .with_resizable(false)
        .build(&event_loop)
        .map_err(|e| startup_failed(StartupError::Window(e.to_string())))?;
    let window = Arc::new(window);

    let backend = WgpuBackend::new(Arc::clone(&window), config.vsync)
        .map_err(|e| startup_failed(StartupError::Device(e)))?;
    let loader = FileAssetLoader::new(&config.asset_root);
    let mut app = DemoApp::startup(backend, kind, &loader, &config)?;

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    app.shutdown();
                    elwt.exit();
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state: ElementState::Pressed,
                            repeat: false,
                            ..
                        },
                    ..
                } => {
                    if let Some(action) = action_for_key(code) {
                        if !app.handle_action(action) {
                            elwt.exit();
                        }
                    }
                }
                WindowEvent::Resized(size) => {
                    if let Err(e) = app.resize(size.width, size.height) {
                        log::warn!("Resize failed: {}", e);
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                if app.is_running() {
                    if let Err(e) = app.frame() {
                        log::warn!("Frame skipped: {}", e);
                    }
                }
            }
            Event::LoopExiting => {
                app.shutdown();
            }
            _ => {}
        }
    })?;

    Ok(())
}

fn startup_failed(e: StartupError) -> StartupError {
    log::error!("Startup failed: {}", e);
    e
}
