use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::StimError;

// ---------------------------------------------------------------------------
// PlaybackSettings: user-facing knobs, read from the `[playback]` table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// How many times the whole frame sequence repeats.
    #[serde(default = "default_loops")]
    pub loops: u32,
    /// Colour codes sent to the trigger device, cycled in order.
    #[serde(default)]
    pub colours: Vec<String>,
    /// Number of patterns each colour is held for.
    #[serde(default = "default_change_logic")]
    pub change_logic: u32,
    /// Lead time between starting playback and the first frame.
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,
}

fn default_loops() -> u32 {
    1
}

fn default_change_logic() -> u32 {
    1
}

fn default_delay_secs() -> f64 {
    10.0
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            loops: default_loops(),
            colours: Vec::new(),
            change_logic: default_change_logic(),
            delay_secs: default_delay_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackPlan: the resolved schedule for one stimulus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    frame_count: usize,
    loops: u32,
    fps: f64,
    delay: f64,
    colours: Vec<String>,
    change_logic: u32,
}

impl PlaybackPlan {
    pub fn new(settings: &PlaybackSettings, frame_count: usize, fps: f32) -> Result<Self, StimError> {
        if frame_count == 0 {
            return Err(StimError::Empty);
        }
        if settings.loops == 0 {
            return Err(StimError::Playback("loops must be at least 1".into()));
        }
        if settings.change_logic == 0 {
            return Err(StimError::Playback("change_logic must be at least 1".into()));
        }
        if !(fps > 0.0) || !fps.is_finite() {
            return Err(StimError::Fps(fps));
        }
        if !settings.delay_secs.is_finite() || settings.delay_secs < 0.0 {
            return Err(StimError::Playback(format!(
                "delay must be a non-negative number of seconds, got {}",
                settings.delay_secs
            )));
        }
        let plan = Self {
            frame_count,
            loops: settings.loops,
            fps: fps as f64,
            delay: settings.delay_secs,
            colours: settings.colours.clone(),
            change_logic: settings.change_logic,
        };
        // `due` grows with position, so a representable end time and period
        // keep every conversion in range.
        let end = plan.delay + plan.len() as f64 / plan.fps;
        if Duration::try_from_secs_f64(end).is_err() || Duration::try_from_secs_f64(1.0 / plan.fps).is_err() {
            return Err(StimError::Playback(format!(
                "schedule too long: {} frame(s) at {fps} fps after {} s",
                plan.len(),
                plan.delay
            )));
        }
        Ok(plan)
    }

    /// Total number of frames presented, loops included.
    pub fn len(&self) -> usize {
        self.frame_count * self.loops as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Pattern shown at sequence `position`: patterns `0..n` tiled `loops` times.
    pub fn pattern_at(&self, position: usize) -> usize {
        position % self.frame_count
    }

    /// When sequence `position` is due, measured from playback start.
    pub fn due(&self, position: usize) -> Duration {
        Duration::from_secs_f64(self.delay + position as f64 / self.fps)
    }

    /// When the last frame has been held for a full period.
    pub fn end(&self) -> Duration {
        self.due(self.len())
    }

    /// Colour code to send when `position` is presented, if it starts a new
    /// colour block.
    pub fn colour_at(&self, position: usize) -> Option<&str> {
        if self.colours.is_empty() {
            return None;
        }
        let pattern = self.pattern_at(position);
        let change = self.change_logic as usize;
        if pattern % change != 0 {
            return None;
        }
        Some(self.colours[(pattern / change) % self.colours.len()].as_str())
    }
}

// ---------------------------------------------------------------------------
// Playback: walks a plan against the wall clock
// ---------------------------------------------------------------------------

/// A frame the caller should present now.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub position: usize,
    pub pattern: usize,
    pub colour: Option<String>,
    /// How far past its due time the frame is being shown.
    pub lateness: Duration,
    /// More than one frame period late.
    pub late: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing new is due; keep showing what is on screen.
    Wait,
    Show(Cue),
    Finished,
}

/// Frames are released strictly in order, never skipped: a slow frame makes
/// every following frame late rather than dropping any.
#[derive(Debug, Clone)]
pub struct Playback {
    plan: PlaybackPlan,
    next: usize,
    late_frames: usize,
}

impl Playback {
    pub fn new(plan: PlaybackPlan) -> Self {
        Self {
            plan,
            next: 0,
            late_frames: 0,
        }
    }

    pub fn plan(&self) -> &PlaybackPlan {
        &self.plan
    }

    /// Frames released so far.
    pub fn shown(&self) -> usize {
        self.next
    }

    pub fn late_frames(&self) -> usize {
        self.late_frames
    }

    pub fn poll(&mut self, elapsed: Duration) -> Step {
        if self.next >= self.plan.len() {
            return if elapsed >= self.plan.end() {
                Step::Finished
            } else {
                Step::Wait
            };
        }

        let due = self.plan.due(self.next);
        if elapsed < due {
            return Step::Wait;
        }

        let lateness = elapsed - due;
        let late = lateness > self.plan.period();
        if late {
            self.late_frames += 1;
        }
        let cue = Cue {
            position: self.next,
            pattern: self.plan.pattern_at(self.next),
            colour: self.plan.colour_at(self.next).map(str::to_owned),
            lateness,
            late,
        };
        self.next += 1;
        Step::Show(cue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(loops: u32, colours: &[&str], change_logic: u32) -> PlaybackSettings {
        PlaybackSettings {
            loops,
            colours: colours.iter().map(|c| c.to_string()).collect(),
            change_logic,
            delay_secs: 0.0,
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    // --- Plan -------------------------------------------------------------------

    #[test]
    fn patterns_tile_across_loops() {
        let plan = PlaybackPlan::new(&settings(3, &[], 1), 4, 10.0).unwrap();
        assert_eq!(plan.len(), 12);
        let order: Vec<_> = (0..plan.len()).map(|i| plan.pattern_at(i)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 0, 1, 2, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn schedule_is_delay_plus_index_over_fps() {
        let mut s = settings(1, &[], 1);
        s.delay_secs = 2.0;
        let plan = PlaybackPlan::new(&s, 10, 20.0).unwrap();
        assert_eq!(plan.due(0), Duration::from_secs(2));
        assert_eq!(plan.due(4), Duration::from_secs_f64(2.2));
        assert_eq!(plan.end(), Duration::from_secs_f64(2.5));
        assert_eq!(plan.period(), Duration::from_secs_f64(0.05));
    }

    #[test]
    fn colours_change_every_change_logic_patterns() {
        let plan = PlaybackPlan::new(&settings(1, &["R", "G", "B"], 2), 8, 10.0).unwrap();
        let cues: Vec<_> = (0..8).map(|i| plan.colour_at(i)).collect();
        assert_eq!(
            cues,
            vec![Some("R"), None, Some("G"), None, Some("B"), None, Some("R"), None]
        );
    }

    #[test]
    fn colours_restart_with_each_loop() {
        let plan = PlaybackPlan::new(&settings(2, &["R", "G"], 1), 3, 10.0).unwrap();
        let cues: Vec<_> = (0..6).map(|i| plan.colour_at(i)).collect();
        assert_eq!(
            cues,
            vec![Some("R"), Some("G"), Some("R"), Some("R"), Some("G"), Some("R")]
        );
    }

    #[test]
    fn no_colours_means_no_cues() {
        let plan = PlaybackPlan::new(&settings(1, &[], 1), 3, 10.0).unwrap();
        assert!((0..3).all(|i| plan.colour_at(i).is_none()));
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(matches!(PlaybackPlan::new(&settings(0, &[], 1), 3, 10.0), Err(StimError::Playback(_))));
        assert!(matches!(PlaybackPlan::new(&settings(1, &[], 0), 3, 10.0), Err(StimError::Playback(_))));
        assert!(matches!(PlaybackPlan::new(&settings(1, &[], 1), 0, 10.0), Err(StimError::Empty)));
        assert!(matches!(PlaybackPlan::new(&settings(1, &[], 1), 3, 0.0), Err(StimError::Fps(_))));

        let mut s = settings(1, &[], 1);
        s.delay_secs = -1.0;
        assert!(matches!(PlaybackPlan::new(&s, 3, 10.0), Err(StimError::Playback(_))));
    }

    #[test]
    fn rejects_schedules_beyond_duration_range() {
        assert!(matches!(PlaybackPlan::new(&settings(1, &[], 1), 1, 1e-38), Err(StimError::Playback(_))));
        assert!(matches!(PlaybackPlan::new(&settings(1, &[], 1), 1, f32::INFINITY), Err(StimError::Fps(_))));

        let mut s = settings(1, &[], 1);
        s.delay_secs = 1e20;
        assert!(matches!(PlaybackPlan::new(&s, 3, 10.0), Err(StimError::Playback(_))));

        // Slow but representable schedules are still fine.
        let plan = PlaybackPlan::new(&settings(1, &[], 1), 2, 0.5).unwrap();
        assert_eq!(plan.period(), Duration::from_secs(2));
        assert_eq!(plan.end(), Duration::from_secs(4));
    }

    // --- Playback -----------------------------------------------------------------

    #[test]
    fn waits_for_due_time() {
        let mut s = settings(1, &[], 1);
        s.delay_secs = 1.0;
        let mut pb = Playback::new(PlaybackPlan::new(&s, 2, 10.0).unwrap());
        assert_eq!(pb.poll(ms(500)), Step::Wait);
        assert!(matches!(pb.poll(ms(1000)), Step::Show(Cue { position: 0, .. })));
        assert_eq!(pb.poll(ms(1050)), Step::Wait);
        assert!(matches!(pb.poll(ms(1100)), Step::Show(Cue { position: 1, .. })));
    }

    #[test]
    fn holds_last_frame_for_a_full_period() {
        let mut pb = Playback::new(PlaybackPlan::new(&settings(1, &[], 1), 1, 10.0).unwrap());
        assert!(matches!(pb.poll(ms(0)), Step::Show(_)));
        assert_eq!(pb.poll(ms(50)), Step::Wait);
        assert_eq!(pb.poll(ms(100)), Step::Finished);
        assert_eq!(pb.shown(), 1);
    }

    #[test]
    fn never_skips_frames_and_counts_late_ones() {
        let mut pb = Playback::new(PlaybackPlan::new(&settings(1, &[], 1), 3, 10.0).unwrap());
        // A long stall: every frame is released one poll at a time anyway.
        let mut positions = Vec::new();
        while let Step::Show(cue) = pb.poll(ms(1000)) {
            positions.push(cue.position);
        }
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(pb.late_frames(), 3);
    }

    #[test]
    fn on_time_frames_are_not_late() {
        let mut pb = Playback::new(PlaybackPlan::new(&settings(1, &[], 1), 2, 10.0).unwrap());
        match pb.poll(ms(20)) {
            Step::Show(cue) => {
                assert!(!cue.late);
                assert_eq!(cue.lateness, ms(20));
            }
            other => panic!("expected a cue, got {other:?}"),
        }
        assert_eq!(pb.late_frames(), 0);
    }

    #[test]
    fn cues_carry_colour_codes() {
        let mut pb = Playback::new(PlaybackPlan::new(&settings(1, &["W", "B"], 1), 2, 10.0).unwrap());
        let Step::Show(first) = pb.poll(ms(0)) else { panic!("no first cue") };
        let Step::Show(second) = pb.poll(ms(100)) else { panic!("no second cue") };
        assert_eq!(first.colour.as_deref(), Some("W"));
        assert_eq!(second.colour.as_deref(), Some("B"));
    }

    #[test]
    fn settings_defaults_from_empty_table() {
        let s: PlaybackSettings = toml::from_str("").unwrap();
        assert_eq!(s, PlaybackSettings::default());
        assert_eq!(s.delay_secs, 10.0);
    }
}
