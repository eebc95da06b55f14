use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use stim_core::stimulus::Stimulus;
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Fullscreen, Window, WindowId},
};

mod app;
mod cli;
mod commands;
mod config;
mod input;
mod paths;
mod session_log;
mod trigger;

use app::App;
use cli::{Cli, Command, RunArgs};
use config::Settings;
use input::Key;
use paths::AppPaths;

// ---------------------------------------------------------------------------
// Handler: winit ApplicationHandler for the presentation window
// ---------------------------------------------------------------------------

struct Handler {
    settings: Settings,
    stimulus: Option<Stimulus>,
    log_dir: PathBuf,
    autoplay: bool,
    window: Option<Arc<Window>>,
    app: Option<App>,
    /// First fatal error; reported once the event loop has returned.
    failure: Option<anyhow::Error>,
}

impl Handler {
    fn create(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let w = &self.settings.window;
        let mut window_attrs = Window::default_attributes()
            .with_title(w.title.clone())
            .with_inner_size(PhysicalSize::new(w.width, w.height))
            .with_position(PhysicalPosition::new(w.x_shift, w.y_shift))
            .with_decorations(w.decorations);
        if w.fullscreen {
            window_attrs = window_attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = Arc::new(event_loop.create_window(window_attrs).context("failed to create window")?);
        if w.fullscreen {
            window.set_cursor_visible(false);
        }
        log::info!("Window created ({}×{})", w.width, w.height);

        let mut app = App::new(
            Arc::clone(&window),
            self.settings.clone(),
            self.stimulus.take(),
            self.log_dir.clone(),
        )?;
        if self.autoplay {
            app.handle_action(input::InputAction::Play);
        }
        self.window = Some(window);
        self.app = Some(app);
        Ok(())
    }
}

/// Map a winit key to the input layer's own key type.
fn map_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Space => Some(Key::Space),
        KeyCode::KeyP => Some(Key::P),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyQ => Some(Key::Q),
        KeyCode::Escape => Some(Key::Escape),
        _ => None,
    }
}

impl ApplicationHandler for Handler {
    /// Called once on desktop when the event loop starts.
    /// Creates the window then initialises the wgpu surface.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }
        if let Err(e) = self.create(event_loop) {
            self.failure = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            // ----------------------------------------------------------------
            // Exit
            // ----------------------------------------------------------------
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                if let Some(app) = &mut self.app {
                    app.handle_action(input::InputAction::Quit);
                }
                event_loop.exit();
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
                let Some(app) = &mut self.app else { return };
                let Some(action) = map_key(code).and_then(|k| app.on_key_pressed(k)) else {
                    return;
                };
                if app.handle_action(action) {
                    log::info!("Quit requested, exiting");
                    event_loop.exit();
                }
            }

            // ----------------------------------------------------------------
            // Resize: reconfigure the wgpu surface
            // ----------------------------------------------------------------
            WindowEvent::Resized(new_size) => {
                if let Some(app) = &mut self.app {
                    app.resize(new_size.width, new_size.height);
                }
            }

            // ----------------------------------------------------------------
            // Redraw: advance playback and present
            // ----------------------------------------------------------------
            WindowEvent::RedrawRequested => {
                if let Some(app) = &mut self.app {
                    match app.render() {
                        Ok(()) => {}
                        // Surface lost / outdated: reconfigure and try again next frame.
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            if let Some(window) = &self.window {
                                let size = window.inner_size();
                                app.resize(size.width, size.height);
                            }
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("GPU out of memory, exiting");
                            app.handle_action(input::InputAction::Quit);
                            event_loop.exit();
                        }
                        Err(e) => log::warn!("render error: {e:?}"),
                    }
                }
            }

            _ => {}
        }
    }

    /// Drive continuous redraws; presentation is paced by the surface.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn run(args: RunArgs, settings: Settings, paths: &AppPaths) -> Result<()> {
    let stimulus = match &args.stimulus {
        Some(arg) => {
            let stim = commands::load_stimulus(arg, &settings, paths)?;
            Some(match stim.label() {
                Some(_) => stim,
                None => {
                    let name = arg.file_name().map(|n| n.to_string_lossy().into_owned());
                    stim.with_label(name.unwrap_or_else(|| "stimulus".to_owned()))
                }
            })
        }
        None => {
            log::warn!("No stimulus given; only the blank and white screens are available");
            None
        }
    };

    let log_dir = settings.paths.log_dir(paths);
    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut handler = Handler {
        settings,
        stimulus,
        log_dir,
        autoplay: args.autoplay,
        window: None,
        app: None,
        failure: None,
    };
    event_loop.run_app(&mut handler).context("event loop error")?;

    match handler.failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let Cli {
        config,
        log_level,
        command,
    } = cli::parse();
    init_logging(&log_level);

    let paths = AppPaths::discover()?;
    let loaded = Settings::load(config.as_deref(), &paths)?;

    match command {
        Command::Run(args) => run(args, loaded.settings, &paths),
        Command::Generate(args) => commands::generate(&args, &loaded.settings, &paths).map(|_| ()),
        Command::Snapshot(args) => commands::snapshot(&args, &loaded.settings, &paths),
        Command::Config(cmd) => commands::config(&cmd.action, &loaded, &paths),
    }
}
