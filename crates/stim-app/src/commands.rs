use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stim_core::noise::NoiseSpec;
use stim_core::stimulus::Stimulus;
use stim_core::{reference, FilterMode};
use stim_gpu::{render_offscreen, GpuContext};

use crate::cli::{ConfigAction, GenerateArgs, SnapshotArgs};
use crate::config::{self, LoadedSettings, Settings};
use crate::paths::AppPaths;

/// A path as given when it exists, otherwise a stimulus of that name in
/// `stimulus_dir`.
pub fn resolve_stimulus(arg: &Path, stimulus_dir: &Path) -> PathBuf {
    if arg.exists() {
        return arg.to_path_buf();
    }
    let candidate = stimulus_dir.join(arg);
    if candidate.exists() {
        candidate
    } else {
        arg.to_path_buf()
    }
}

pub fn load_stimulus(arg: &Path, settings: &Settings, paths: &AppPaths) -> Result<Stimulus> {
    let dir = resolve_stimulus(arg, &settings.paths.stimulus_dir(paths));
    Stimulus::load(&dir).with_context(|| format!("failed to load stimulus {}", arg.display()))
}

// ---------------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------------

pub fn generate(args: &GenerateArgs, settings: &Settings, paths: &AppPaths) -> Result<PathBuf> {
    let spec = NoiseSpec {
        frames: args.frames,
        checker_size: args.checker_size,
        width: args.width,
        height: args.height,
        fps: args.fps,
        shuffle: args.shuffle,
        seed: args.seed,
    };
    let stimulus = spec.generate()?;
    let label = stimulus.label().unwrap_or("noise").to_owned();
    let out = args
        .output
        .clone()
        .unwrap_or_else(|| settings.paths.stimulus_dir(paths).join(&label));

    stimulus.save(&out)?;
    let (w, h) = stimulus.size();
    log::info!(
        "Generated {} frame(s) of {w}x{h} noise ({}px checkers) into {}",
        stimulus.frame_count(),
        args.checker_size,
        out.display()
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// snapshot
// ---------------------------------------------------------------------------

pub fn snapshot(args: &SnapshotArgs, settings: &Settings, paths: &AppPaths) -> Result<()> {
    let stimulus = load_stimulus(&args.stimulus, settings, paths)?;
    let Some(pattern) = stimulus.frames().get(args.frame) else {
        bail!(
            "frame {} out of range: stimulus has {} frame(s)",
            args.frame,
            stimulus.frame_count()
        );
    };

    let width = args.width.unwrap_or(settings.window.width);
    let height = args.height.unwrap_or(settings.window.height);
    if width == 0 || height == 0 {
        bail!("snapshot size must be non-zero, got {width}x{height}");
    }

    let mode = settings.render.mode.effective_for(pattern.channels());
    let params = settings.render.transform().resolve((width, height), pattern.size(), mode);

    let pixels = if args.cpu {
        if settings.render.filter == FilterMode::Linear {
            log::warn!("CPU reference renderer samples nearest; linear filtering ignored");
        }
        reference::render(pattern, &params, settings.render.edge, width, height).to_rgba8()
    } else {
        let ctx = pollster::block_on(GpuContext::new_headless())?;
        render_offscreen(&ctx, pattern, &params, settings.render.sampling(), width, height)?
    };

    image::save_buffer(&args.output, &pixels, width, height, image::ColorType::Rgba8)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    log::info!(
        "Frame {} rendered {}x{} ({}) to {}",
        args.frame,
        width,
        height,
        if args.cpu { "cpu" } else { "gpu" },
        args.output.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

pub fn config(action: &ConfigAction, loaded: &LoadedSettings, paths: &AppPaths) -> Result<()> {
    match action {
        ConfigAction::Show => {
            match &loaded.source {
                Some(path) => println!("# layered from {}", path.display()),
                None => println!("# bundled defaults (no {})", paths.settings_file().display()),
            }
            print!("{}", loaded.settings.to_toml()?);
        }
        ConfigAction::Init { force } => {
            let path = config::init_user_settings(paths, *force)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, AppPaths, Settings) {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_raw(dir.path().join("cfg"), dir.path().join("data"));
        (dir, paths, Settings::defaults().unwrap())
    }

    fn generate_args(output: Option<PathBuf>) -> GenerateArgs {
        GenerateArgs {
            frames: 3,
            checker_size: 4,
            width: 16,
            height: 8,
            fps: 30.0,
            shuffle: true,
            seed: Some(11),
            output,
        }
    }

    #[test]
    fn generate_writes_into_data_dir_by_label() {
        let (_dir, paths, settings) = setup();
        let out = generate(&generate_args(None), &settings, &paths).unwrap();
        assert_eq!(out, paths.stimulus_dir().join("checker_4px_16x8"));

        // Loadable by bare name.
        let stim = load_stimulus(Path::new("checker_4px_16x8"), &settings, &paths).unwrap();
        assert_eq!(stim.frame_count(), 3);
        assert_eq!(stim.size(), (16, 8));
        assert_eq!(stim.fps(), 30.0);
    }

    #[test]
    fn cpu_snapshot_writes_png() {
        let (dir, paths, settings) = setup();
        let stim_dir = generate(&generate_args(Some(dir.path().join("noise"))), &settings, &paths).unwrap();
        let output = dir.path().join("shot.png");
        let args = SnapshotArgs {
            stimulus: stim_dir,
            output: output.clone(),
            frame: 2,
            width: Some(32),
            height: Some(16),
            cpu: true,
        };
        snapshot(&args, &settings, &paths).unwrap();

        let img = image::open(&output).unwrap();
        assert_eq!((img.width(), img.height()), (32, 16));
    }

    #[test]
    fn snapshot_rejects_missing_frame() {
        let (dir, paths, settings) = setup();
        let stim_dir = generate(&generate_args(Some(dir.path().join("noise"))), &settings, &paths).unwrap();
        let args = SnapshotArgs {
            stimulus: stim_dir,
            output: dir.path().join("shot.png"),
            frame: 3,
            width: None,
            height: None,
            cpu: true,
        };
        assert!(snapshot(&args, &settings, &paths).is_err());
    }

    #[test]
    fn unknown_stimulus_keeps_given_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_stimulus(Path::new("nope"), dir.path()), PathBuf::from("nope"));
    }
}
