use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

pub const HEADER: &str = "stimulus,loops,colours,change_logic,time,frames_shown,late_frames";

/// One playback run, written as a single-row CSV next to earlier runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub stimulus: String,
    pub loops: u32,
    pub colours: Vec<String>,
    pub change_logic: u32,
    pub started: DateTime<Local>,
    pub frames_shown: usize,
    pub late_frames: usize,
}

impl SessionRecord {
    /// `<label>_<YYYY_MM_DD_HH_MM_SS>.csv`
    pub fn file_name(&self) -> String {
        format!("{}_{}.csv", sanitize(&self.stimulus), self.started.format("%Y_%m_%d_%H_%M_%S"))
    }

    pub fn csv_row(&self) -> String {
        [
            escape(&self.stimulus),
            self.loops.to_string(),
            escape(&self.colours.join(";")),
            self.change_logic.to_string(),
            self.started.format("%Y-%m-%d %H:%M:%S").to_string(),
            self.frames_shown.to_string(),
            self.late_frames.to_string(),
        ]
        .join(",")
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let path = dir.join(self.file_name());
        fs::write(&path, format!("{HEADER}\n{}\n", self.csv_row()))
            .with_context(|| format!("failed to write session log {}", path.display()))?;
        Ok(path)
    }
}

/// Keep file names portable: anything but alphanumerics, `-` and `_` becomes `_`.
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "stimulus".to_owned()
    } else {
        cleaned
    }
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> SessionRecord {
        SessionRecord {
            stimulus: "checker_20px_800x600".into(),
            loops: 2,
            colours: vec!["R".into(), "G".into()],
            change_logic: 5,
            started: Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap(),
            frames_shown: 120,
            late_frames: 1,
        }
    }

    #[test]
    fn file_name_carries_label_and_timestamp() {
        assert_eq!(record().file_name(), "checker_20px_800x600_2024_03_07_14_05_09.csv");
    }

    #[test]
    fn unsafe_labels_are_sanitised() {
        let mut r = record();
        r.stimulus = "run 1/a".into();
        assert!(r.file_name().starts_with("run_1_a_"));
        r.stimulus = String::new();
        assert!(r.file_name().starts_with("stimulus_"));
    }

    #[test]
    fn row_matches_header_columns() {
        let row = record().csv_row();
        assert_eq!(row, "checker_20px_800x600,2,R;G,5,2024-03-07 14:05:09,120,1");
        assert_eq!(row.split(',').count(), HEADER.split(',').count());
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\","), "\"say \"\"hi\"\",\"");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn write_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        let path = record().write(&logs).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(lines.next(), Some(record().csv_row().as_str()));
        assert_eq!(lines.next(), None);
    }
}
