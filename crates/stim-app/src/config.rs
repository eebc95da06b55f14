use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stim_core::playback::PlaybackSettings;
use stim_core::transform::{AspectMode, ScaleMode, TransformSettings};
use stim_core::{ColorMode, EdgeMode, FilterMode};
use stim_gpu::Sampling;

use crate::paths::{self, AppPaths};

/// Complete default configuration, compiled into the binary.
pub const DEFAULT_SETTINGS: &str = include_str!("../default_settings.toml");
pub const SETTINGS_FILE: &str = "settings.toml";

// ---------------------------------------------------------------------------
// Settings tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub window: WindowSettings,
    pub render: RenderSettings,
    pub playback: PlaybackSettings,
    pub trigger: TriggerSettings,
    pub paths: PathSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub x_shift: i32,
    pub y_shift: i32,
    pub fullscreen: bool,
    pub decorations: bool,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub mode: ColorMode,
    pub edge: EdgeMode,
    pub filter: FilterMode,
    pub vsync: bool,
    pub scale: ScaleMode,
    pub aspect: AspectMode,
}

impl RenderSettings {
    pub fn transform(&self) -> TransformSettings {
        TransformSettings {
            scale: self.scale,
            aspect: self.aspect,
        }
    }

    pub fn sampling(&self) -> Sampling {
        Sampling {
            edge: self.edge,
            filter: self.filter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSettings {
    pub enabled: bool,
    /// Serial device, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    pub trigger_command: String,
    pub end_command: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    pub data_dir: String,
    pub log_dir: String,
}

impl PathSettings {
    pub fn stimulus_dir(&self, paths: &AppPaths) -> PathBuf {
        paths::or_default(&self.data_dir, paths.stimulus_dir())
    }

    pub fn log_dir(&self, paths: &AppPaths) -> PathBuf {
        paths::or_default(&self.log_dir, paths.log_dir())
    }
}

// ---------------------------------------------------------------------------
// Layered loading
// ---------------------------------------------------------------------------

/// Settings plus the file they were layered from, if any.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub settings: Settings,
    pub source: Option<PathBuf>,
}

impl Settings {
    pub fn defaults() -> Result<Self> {
        Self::layered(None)
    }

    /// Parse `overlay` (a possibly partial settings document) on top of the
    /// bundled defaults.
    pub fn layered(overlay: Option<&str>) -> Result<Self> {
        let mut merged = toml::Value::Table(
            toml::from_str::<toml::Table>(DEFAULT_SETTINGS).context("bundled default settings are invalid")?,
        );
        if let Some(text) = overlay {
            let table: toml::Table = toml::from_str(text).context("failed to parse settings")?;
            merge(&mut merged, toml::Value::Table(table));
        }
        merged.try_into().context("invalid settings")
    }

    /// `explicit` must exist; without it the user settings file is used when
    /// present, and the defaults alone otherwise.
    pub fn load(explicit: Option<&Path>, paths: &AppPaths) -> Result<LoadedSettings> {
        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Some(paths.settings_file()).filter(|p| p.is_file()),
        };

        let settings = match &source {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("failed to read settings from {}", path.display()))?;
                Self::layered(Some(&text)).with_context(|| format!("in {}", path.display()))?
            }
            None => Self::defaults()?,
        };

        match &source {
            Some(path) => log::info!("Settings loaded from {}", path.display()),
            None => log::debug!("No settings file, using defaults"),
        }
        Ok(LoadedSettings { settings, source })
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialise settings")
    }
}

/// Deep-merge `overlay` into `base`: tables merge key by key, anything else
/// (arrays included) is replaced.
pub fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Write the bundled defaults to the user settings file. Refuses to
/// overwrite an existing file unless `force` is set.
pub fn init_user_settings(paths: &AppPaths, force: bool) -> Result<PathBuf> {
    let target = paths.settings_file();
    if target.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", target.display());
    }
    fs::create_dir_all(paths.config_dir())
        .with_context(|| format!("failed to create {}", paths.config_dir().display()))?;
    fs::write(&target, DEFAULT_SETTINGS).with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_defaults_parse() {
        let s = Settings::defaults().unwrap();
        assert_eq!(s.window.width, 800);
        assert_eq!(s.render.mode, ColorMode::Grayscale);
        assert_eq!(s.render.edge, EdgeMode::Clamp);
        assert_eq!(s.render.scale, ScaleMode::Native);
        assert_eq!(s.render.aspect, AspectMode::Off);
        assert_eq!(s.playback, PlaybackSettings::default());
        assert!(!s.trigger.enabled);
        assert_eq!(s.trigger.trigger_command, "T");
        assert_eq!(s.trigger.end_command, "O");
        assert_eq!(s.trigger.baud_rate, 9600);
    }

    #[test]
    fn baud_rate_can_be_overridden() {
        let s = Settings::layered(Some("[trigger]\nbaud_rate = 115200\n")).unwrap();
        assert_eq!(s.trigger.baud_rate, 115200);
        assert_eq!(s.trigger.port, "/dev/ttyACM0");
    }

    #[test]
    fn overlay_changes_only_its_keys() {
        let s = Settings::layered(Some("[window]\nfullscreen = true\n[playback]\nloops = 3\n")).unwrap();
        assert!(s.window.fullscreen);
        assert_eq!(s.window.width, 800);
        assert_eq!(s.playback.loops, 3);
        assert_eq!(s.playback.delay_secs, 10.0);
    }

    #[test]
    fn overlay_selects_tagged_modes() {
        let s = Settings::layered(Some(
            "[render.scale]\nmode = \"fixed\"\nx = 0.5\ny = 0.25\n[render.aspect]\nmode = \"window\"\n",
        ))
        .unwrap();
        assert_eq!(s.render.scale, ScaleMode::Fixed { x: 0.5, y: 0.25 });
        assert_eq!(s.render.aspect, AspectMode::Window);
        assert_eq!(s.render.transform().scale, s.render.scale);
    }

    #[test]
    fn arrays_are_replaced_not_appended() {
        let mut base: toml::Value = toml::Value::Table(toml::from_str("a = [1, 2]\n[t]\nx = 1\ny = 2").unwrap());
        let overlay = toml::Value::Table(toml::from_str("a = [3]\n[t]\ny = 5").unwrap());
        merge(&mut base, overlay);
        assert_eq!(base["a"].as_array().unwrap().len(), 1);
        assert_eq!(base["t"]["x"].as_integer(), Some(1));
        assert_eq!(base["t"]["y"].as_integer(), Some(5));
    }

    #[test]
    fn wrong_types_are_rejected() {
        assert!(Settings::layered(Some("[window]\nwidth = \"wide\"\n")).is_err());
        assert!(Settings::layered(Some("[render]\nedge = \"mirror\"\n")).is_err());
    }

    #[test]
    fn serialised_settings_round_trip_through_layering() {
        let s = Settings::layered(Some("[playback]\ncolours = [\"R\", \"G\"]\n")).unwrap();
        let text = s.to_toml().unwrap();
        assert_eq!(Settings::layered(Some(&text)).unwrap(), s);
    }

    #[test]
    fn load_prefers_user_file_and_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_raw(dir.path().join("cfg"), dir.path().join("data"));

        let loaded = Settings::load(None, &paths).unwrap();
        assert!(loaded.source.is_none());

        let written = init_user_settings(&paths, false).unwrap();
        assert_eq!(written, paths.settings_file());
        assert!(init_user_settings(&paths, false).is_err());
        assert!(init_user_settings(&paths, true).is_ok());

        fs::write(&written, "[window]\ntitle = \"Rig A\"\n").unwrap();
        let loaded = Settings::load(None, &paths).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(written.as_path()));
        assert_eq!(loaded.settings.window.title, "Rig A");
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AppPaths::from_raw(dir.path().into(), dir.path().into());
        assert!(Settings::load(Some(&dir.path().join("missing.toml")), &paths).is_err());
    }

    #[test]
    fn empty_path_settings_use_platform_dirs() {
        let s = Settings::defaults().unwrap();
        let paths = AppPaths::from_raw("/cfg".into(), "/data".into());
        assert_eq!(s.paths.stimulus_dir(&paths), PathBuf::from("/data/stimuli"));
        assert_eq!(s.paths.log_dir(&paths), PathBuf::from("/data/logs"));
    }
}
