use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use stim_core::pattern::Channels;
use stim_core::playback::{Playback, PlaybackPlan, Step};
use stim_core::stimulus::Stimulus;
use stim_core::DrawParams;
use stim_gpu::{GpuContext, GpuError, PatternTexture, QuadRenderer};
use winit::window::Window;

use crate::config::Settings;
use crate::input::{InputAction, InputState, Key};
use crate::session_log::SessionRecord;
use crate::trigger::TriggerLink;

// ---------------------------------------------------------------------------
// Presentation-rate counter: logs once per second while playing
// ---------------------------------------------------------------------------

struct RateCounter {
    frames: u32,
    last_report: Instant,
}

impl RateCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            last_report: Instant::now(),
        }
    }

    /// Count one new pattern. Returns the rate once a full second has elapsed
    /// since the last report.
    fn tick(&mut self) -> Option<f32> {
        self.frames += 1;
        let elapsed = self.last_report.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            let rate = self.frames as f32 / elapsed;
            self.frames = 0;
            self.last_report = Instant::now();
            Some(rate)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Screens
// ---------------------------------------------------------------------------

/// GPU-resident stimulus: one texture and bind group per frame.
struct LoadedStimulus {
    name: String,
    size: (u32, u32),
    channels: Channels,
    fps: f32,
    bind_groups: Vec<wgpu::BindGroup>,
    // Bind groups reference the views; keep the textures alive with them.
    _textures: Vec<PatternTexture>,
}

struct Session {
    playback: Playback,
    started: Instant,
    started_at: DateTime<Local>,
    /// Pattern currently on screen; `None` during the lead-in delay.
    current: Option<usize>,
    rate: RateCounter,
}

impl Session {
    fn new(plan: PlaybackPlan) -> Self {
        Self {
            playback: Playback::new(plan),
            started: Instant::now(),
            started_at: Local::now(),
            current: None,
            rate: RateCounter::new(),
        }
    }

    /// Advance playback to the current time. At most one new pattern is
    /// released per call, so every pattern reaches the screen. A colour cue
    /// is sent as soon as its pattern is released.
    fn advance(&mut self, trigger: &TriggerLink) -> Step {
        let step = self.playback.poll(self.started.elapsed());
        if let Step::Show(cue) = &step {
            if cue.late {
                log::warn!(
                    "Frame {} shown {:.1} ms late",
                    cue.position,
                    cue.lateness.as_secs_f64() * 1000.0
                );
            }
            if let Some(rate) = self.rate.tick() {
                log::debug!("Presenting at {rate:.1} patterns/s");
            }
            if let Some(code) = &cue.colour {
                trigger.colour(code);
            }
            self.current = Some(cue.pattern);
        }
        step
    }
}

enum Screen {
    Blank,
    White,
    Playing(Session),
}

/// What one redraw puts on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    Black,
    White,
    Pattern(usize),
}

#[derive(Debug, PartialEq, Eq)]
enum Redraw {
    Drawn,
    /// The last pattern has been held for its period; playback should stop.
    Finished,
}

/// One presentation step.
///
/// The target is acquired before playback is polled, so a failed acquire
/// neither consumes a pattern nor sends a trigger. The frame trigger goes
/// out only after a newly released pattern has been presented.
fn redraw<T, E>(
    screen: &mut Screen,
    trigger: &TriggerLink,
    acquire: impl FnOnce() -> Result<T, E>,
    present: impl FnOnce(T, Fill),
) -> Result<Redraw, E> {
    let target = acquire()?;

    let (fill, released, finished) = match screen {
        Screen::Blank => (Fill::Black, false, false),
        Screen::White => (Fill::White, false, false),
        Screen::Playing(session) => {
            let step = session.advance(trigger);
            let fill = session.current.map_or(Fill::Black, Fill::Pattern);
            (fill, matches!(step, Step::Show(_)), matches!(step, Step::Finished))
        }
    };

    present(target, fill);
    if released {
        trigger.trigger();
    }
    Ok(if finished { Redraw::Finished } else { Redraw::Drawn })
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct App {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,

    renderer: QuadRenderer,
    stimulus: Option<LoadedStimulus>,
    screen: Screen,

    settings: Settings,
    trigger: TriggerLink,
    log_dir: PathBuf,
    input: InputState,
}

impl App {
    /// Initialise wgpu for a given window and upload the stimulus frames.
    /// The window is wrapped in `Arc` so that the surface can hold a
    /// `'static` reference to it.
    pub fn new(window: Arc<Window>, settings: Settings, stimulus: Option<Stimulus>, log_dir: PathBuf) -> Result<Self> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        // ---- Instance & surface ---------------------------------------------
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .map_err(GpuError::from)
            .context("failed to create wgpu surface")?;

        // ---- Adapter, device & queue ----------------------------------------
        let ctx = pollster::block_on(GpuContext::for_surface(instance, &surface))?;

        // ---- Surface configuration ------------------------------------------
        let surface_caps = surface.get_capabilities(&ctx.adapter);

        // Linear formats keep 0/255 noise exactly 0/255 on screen.
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GpuError::NoSurfaceFormat)?;
        if format.is_srgb() {
            log::warn!("Only sRGB surface formats available; intensities will be gamma-encoded");
        }

        let present_mode = if settings.render.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&ctx.device, &surface_config);
        log::info!(
            "Surface configured: {}×{} {:?} {:?}",
            surface_config.width,
            surface_config.height,
            format,
            present_mode
        );

        // ---- Renderer & stimulus textures -----------------------------------
        let renderer = QuadRenderer::new(&ctx.device, format, settings.render.sampling());
        let stimulus = stimulus.map(|stim| upload(&ctx.device, &ctx.queue, &renderer, &stim));

        let trigger = TriggerLink::from_settings(&settings.trigger)?;

        Ok(Self {
            surface,
            device: ctx.device,
            queue: ctx.queue,
            surface_config,
            renderer,
            stimulus,
            screen: Screen::Blank,
            settings,
            trigger,
            log_dir,
            input: InputState::default(),
        })
    }

    // -------------------------------------------------------------------------
    // Resize
    // -------------------------------------------------------------------------

    /// Reconfigure the surface. Draw parameters follow on the next frame.
    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        if new_width == 0 || new_height == 0 {
            return;
        }
        self.surface_config.width = new_width;
        self.surface_config.height = new_height;
        self.surface.configure(&self.device, &self.surface_config);
        log::debug!("Surface resized to {}×{}", new_width, new_height);
    }

    // -------------------------------------------------------------------------
    // Input: called by main.rs window_event handler
    // -------------------------------------------------------------------------

    pub fn on_key_pressed(&self, key: Key) -> Option<InputAction> {
        self.input.on_key(key)
    }

    /// Apply an action to the app state.
    ///
    /// Returns `true` if the app should exit (i.e. action was `Quit`).
    pub fn handle_action(&mut self, action: InputAction) -> bool {
        match action {
            InputAction::Play => self.play(),
            InputAction::White => {
                self.stop();
                log::info!("White screen");
                self.screen = Screen::White;
            }
            InputAction::Stop => {
                self.stop();
                self.screen = Screen::Blank;
            }
            InputAction::Quit => {
                self.stop();
                return true;
            }
        }
        false
    }

    fn play(&mut self) {
        if self.stimulus.is_none() {
            log::warn!("No stimulus loaded; nothing to play");
            return;
        }
        self.stop();
        let Some(stim) = &self.stimulus else {
            return;
        };

        let plan = match PlaybackPlan::new(&self.settings.playback, stim.bind_groups.len(), stim.fps) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Cannot start playback: {e}");
                return;
            }
        };
        log::info!(
            "Playing {}: {} frame(s) × {} loop(s) at {} fps, first frame in {:.1} s",
            stim.name,
            stim.bind_groups.len(),
            self.settings.playback.loops,
            stim.fps,
            plan.due(0).as_secs_f64()
        );

        self.screen = Screen::Playing(Session::new(plan));
    }

    /// End playback if it is running: send the end trigger and write the
    /// session log. Leaves the screen blank.
    fn stop(&mut self) {
        let Screen::Playing(session) = std::mem::replace(&mut self.screen, Screen::Blank) else {
            return;
        };
        self.trigger.end();

        let playback = &session.playback;
        let finished = playback.shown() == playback.plan().len();
        log::info!(
            "Playback {} after {} of {} frame(s), {} late",
            if finished { "finished" } else { "stopped" },
            playback.shown(),
            playback.plan().len(),
            playback.late_frames()
        );

        let record = SessionRecord {
            stimulus: self.stimulus.as_ref().map_or_else(String::new, |s| s.name.clone()),
            loops: self.settings.playback.loops,
            colours: self.settings.playback.colours.clone(),
            change_logic: self.settings.playback.change_logic,
            started: session.started_at,
            frames_shown: playback.shown(),
            late_frames: playback.late_frames(),
        };
        match record.write(&self.log_dir) {
            Ok(path) => log::info!("Session log written to {}", path.display()),
            Err(e) => log::error!("{e:#}"),
        }
    }

    // -------------------------------------------------------------------------
    // Render
    // -------------------------------------------------------------------------

    /// Draw the current screen and present it.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let surface = &self.surface;
        let (device, queue, renderer) = (&self.device, &self.queue, &self.renderer);
        let (stimulus, settings, surface_config) = (&self.stimulus, &self.settings, &self.surface_config);

        let outcome = redraw(
            &mut self.screen,
            &self.trigger,
            || surface.get_current_texture(),
            |output, fill| {
                let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame-encoder"),
                });
                match (fill, stimulus) {
                    (Fill::White, _) => QuadRenderer::clear(&mut encoder, &view, wgpu::Color::WHITE),
                    (Fill::Pattern(pattern), Some(stim)) => {
                        let params = draw_params(settings, surface_config, stim);
                        renderer.draw(queue, &mut encoder, &view, &stim.bind_groups[pattern], &params);
                    }
                    // Blank screen, or the lead-in before the first pattern.
                    _ => QuadRenderer::clear(&mut encoder, &view, wgpu::Color::BLACK),
                }
                queue.submit(std::iter::once(encoder.finish()));
                output.present();
            },
        )?;

        if outcome == Redraw::Finished {
            self.stop();
        }
        Ok(())
    }
}

fn draw_params(settings: &Settings, surface_config: &wgpu::SurfaceConfiguration, stim: &LoadedStimulus) -> DrawParams {
    let window = (surface_config.width, surface_config.height);
    let mode = settings.render.mode.effective_for(stim.channels);
    settings.render.transform().resolve(window, stim.size, mode)
}

fn upload(device: &wgpu::Device, queue: &wgpu::Queue, renderer: &QuadRenderer, stim: &Stimulus) -> LoadedStimulus {
    let textures = PatternTexture::upload_all(device, queue, stim.frames());
    let bind_groups = textures.iter().map(|t| renderer.bind(device, t)).collect();
    let (w, h) = stim.size();
    log::info!(
        "Uploaded {} frame(s) of {}×{} {:?}",
        textures.len(),
        w,
        h,
        stim.channels()
    );
    LoadedStimulus {
        name: stim.label().unwrap_or("stimulus").to_owned(),
        size: stim.size(),
        channels: stim.channels(),
        fps: stim.fps(),
        bind_groups,
        _textures: textures,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stim_core::playback::PlaybackSettings;

    use super::*;
    use crate::trigger::Recorder;

    fn playing(frames: usize, fps: f32) -> Screen {
        let settings = PlaybackSettings {
            loops: 1,
            colours: vec!["R".into()],
            change_logic: frames as u32,
            delay_secs: 0.0,
        };
        Screen::Playing(Session::new(PlaybackPlan::new(&settings, frames, fps).unwrap()))
    }

    fn shown(screen: &Screen) -> usize {
        match screen {
            Screen::Playing(session) => session.playback.shown(),
            _ => panic!("not playing"),
        }
    }

    #[test]
    fn failed_acquire_releases_nothing() {
        let recorder = Recorder::default();
        let link = TriggerLink::spawn(Box::new(recorder.clone()), "T", "O").unwrap();
        let mut screen = playing(2, 1.0);

        let result = redraw(&mut screen, &link, || Err::<(), _>("timeout"), |_, _| panic!("nothing to present"));
        assert_eq!(result, Err("timeout"));
        assert_eq!(shown(&screen), 0);

        // The retry shows the first pattern with its colour and frame triggers.
        let mut fills = Vec::new();
        let result = redraw(&mut screen, &link, || Ok::<_, ()>(()), |(), fill| fills.push(fill));
        assert_eq!(result, Ok(Redraw::Drawn));
        assert_eq!(fills, vec![Fill::Pattern(0)]);
        assert_eq!(shown(&screen), 1);

        // Second pattern is not due for a second: redraw holds without a trigger.
        redraw(&mut screen, &link, || Ok::<_, ()>(()), |(), fill| fills.push(fill)).unwrap();
        assert_eq!(fills, vec![Fill::Pattern(0), Fill::Pattern(0)]);

        drop(link);
        assert_eq!(recorder.messages(), vec!["R", "T"]);
    }

    #[test]
    fn frame_trigger_follows_present() {
        let recorder = Recorder::default();
        let link = TriggerLink::spawn(Box::new(recorder.clone()), "T", "O").unwrap();
        let mut screen = playing(1, 1.0);

        let delivered = recorder.clone();
        let seen_at_present = std::cell::Cell::new(0);
        redraw(&mut screen, &link, || Ok::<_, ()>(()), |(), _| {
            // Give the worker time to deliver whatever was queued so far.
            std::thread::sleep(Duration::from_millis(50));
            seen_at_present.set(delivered.messages().len());
        })
        .unwrap();

        drop(link);
        assert_eq!(seen_at_present.get(), 1, "only the colour cue precedes present");
        assert_eq!(recorder.messages(), vec!["R", "T"]);
    }

    #[test]
    fn idle_screens_fill_without_triggers() {
        let recorder = Recorder::default();
        let link = TriggerLink::spawn(Box::new(recorder.clone()), "T", "O").unwrap();

        let mut fills = Vec::new();
        for mut screen in [Screen::Blank, Screen::White] {
            let result = redraw(&mut screen, &link, || Ok::<_, ()>(()), |(), fill| fills.push(fill));
            assert_eq!(result, Ok(Redraw::Drawn));
        }
        assert_eq!(fills, vec![Fill::Black, Fill::White]);

        drop(link);
        assert!(recorder.messages().is_empty());
    }

    #[test]
    fn playback_reports_finished_after_last_period() {
        let recorder = Recorder::default();
        let link = TriggerLink::spawn(Box::new(recorder.clone()), "T", "O").unwrap();
        let mut screen = playing(1, 100.0);

        let ok = || Ok::<_, ()>(());
        assert_eq!(redraw(&mut screen, &link, ok, |(), _| {}), Ok(Redraw::Drawn));
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(redraw(&mut screen, &link, ok, |(), _| {}), Ok(Redraw::Finished));
    }
}
