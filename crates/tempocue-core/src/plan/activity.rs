use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl Pace {
    /// Time-scale multiplier applied to cue timings.
    pub fn multiplier(self) -> f64 {
        match self {
            Pace::Slow => 1.5,
            Pace::Normal => 1.0,
            Pace::Fast => 0.75,
        }
    }
}

/// Cue density applied to a built plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceStyle {
    #[default]
    Full,
    Light,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Reps(u32),
    Timed(u32),
    /// Advanced by the user.
    Manual,
}

/// One exercise within a circuit-style activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub duration_secs: Option<u32>,
    #[serde(default)]
    pub rest_after_secs: Option<u32>,
    /// Spoken form/technique cue. A stock phrase is used when absent.
    #[serde(default)]
    pub instruction: Option<String>,
}

impl Step {
    pub fn reps(name: impl Into<String>, reps: u32) -> Self {
        Self {
            name: name.into(),
            reps: Some(reps),
            duration_secs: None,
            rest_after_secs: None,
            instruction: None,
        }
    }

    pub fn timed(name: impl Into<String>, secs: u32) -> Self {
        Self {
            name: name.into(),
            reps: None,
            duration_secs: Some(secs),
            rest_after_secs: None,
            instruction: None,
        }
    }

    pub fn manual(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reps: None,
            duration_secs: None,
            rest_after_secs: None,
            instruction: None,
        }
    }

    pub fn with_rest(mut self, secs: u32) -> Self {
        self.rest_after_secs = Some(secs);
        self
    }

    pub fn with_instruction(mut self, text: impl Into<String>) -> Self {
        self.instruction = Some(text.into());
        self
    }

    /// Reps win over duration when both are set; zero counts as unset.
    pub fn mode(&self) -> StepMode {
        match (self.reps, self.duration_secs) {
            (Some(r), _) if r > 0 => StepMode::Reps(r),
            (_, Some(d)) if d > 0 => StepMode::Timed(d),
            _ => StepMode::Manual,
        }
    }

    pub fn rest_secs(&self) -> u32 {
        self.rest_after_secs.unwrap_or(0)
    }
}

/// Inhale / hold / exhale / hold-empty lengths in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreathingPattern {
    pub name: String,
    pub inhale_secs: f64,
    #[serde(default)]
    pub hold_secs: f64,
    pub exhale_secs: f64,
    #[serde(default)]
    pub hold_empty_secs: f64,
    pub cycles: u32,
}

impl BreathingPattern {
    /// Segments in breathing order, skipping empty holds.
    pub fn segments(&self) -> Vec<(BreathPhase, f64)> {
        [
            (BreathPhase::Inhale, self.inhale_secs),
            (BreathPhase::Hold, self.hold_secs),
            (BreathPhase::Exhale, self.exhale_secs),
            (BreathPhase::HoldEmpty, self.hold_empty_secs),
        ]
        .into_iter()
        .filter(|(_, secs)| *secs > 0.0)
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreathPhase {
    Inhale,
    Hold,
    Exhale,
    HoldEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathingPreset {
    Box,
    /// 4-7-8
    Relaxing,
    Energizing,
    Calming,
    Focus,
}

impl BreathingPreset {
    pub const ALL: [BreathingPreset; 5] = [
        BreathingPreset::Box,
        BreathingPreset::Relaxing,
        BreathingPreset::Energizing,
        BreathingPreset::Calming,
        BreathingPreset::Focus,
    ];

    pub fn pattern(self) -> BreathingPattern {
        let (name, inhale, hold, exhale, hold_empty, cycles) = match self {
            BreathingPreset::Box => ("Box breathing", 4.0, 4.0, 4.0, 4.0, 6),
            BreathingPreset::Relaxing => ("4-7-8 relaxing breath", 4.0, 7.0, 8.0, 0.0, 4),
            BreathingPreset::Energizing => ("Energizing breath", 2.0, 0.0, 2.0, 0.0, 12),
            BreathingPreset::Calming => ("Calming breath", 4.0, 2.0, 6.0, 0.0, 6),
            BreathingPreset::Focus => ("Focus breath", 5.0, 2.0, 5.0, 0.0, 8),
        };
        BreathingPattern {
            name: name.into(),
            inhale_secs: inhale,
            hold_secs: hold,
            exhale_secs: exhale,
            hold_empty_secs: hold_empty,
            cycles,
        }
    }
}

/// A preset name or a fully specified pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternChoice {
    Preset(BreathingPreset),
    Custom(BreathingPattern),
}

impl PatternChoice {
    pub fn resolve(&self) -> BreathingPattern {
        match self {
            PatternChoice::Preset(p) => p.pattern(),
            PatternChoice::Custom(p) => p.clone(),
        }
    }
}

impl Default for PatternChoice {
    fn default() -> Self {
        PatternChoice::Preset(BreathingPreset::Box)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Circuit,
    Stretching,
    Breathing,
    Meditation,
    Countdown,
}

impl ActivityKind {
    /// Simple timed activities follow one shared external clock; circuits
    /// run their own per-step timers.
    pub fn is_tick_driven(self) -> bool {
        matches!(
            self,
            ActivityKind::Breathing | ActivityKind::Meditation | ActivityKind::Countdown
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Activity {
    Circuit {
        steps: Vec<Step>,
    },
    Stretching {
        steps: Vec<Step>,
    },
    Breathing {
        #[serde(default)]
        pattern: PatternChoice,
        #[serde(default)]
        target_duration_secs: Option<u32>,
    },
    Meditation {
        duration_secs: u32,
    },
    Countdown {
        duration_secs: u32,
    },
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Activity::Circuit { .. } => ActivityKind::Circuit,
            Activity::Stretching { .. } => ActivityKind::Stretching,
            Activity::Breathing { .. } => ActivityKind::Breathing,
            Activity::Meditation { .. } => ActivityKind::Meditation,
            Activity::Countdown { .. } => ActivityKind::Countdown,
        }
    }

    pub fn steps(&self) -> &[Step] {
        match self {
            Activity::Circuit { steps } | Activity::Stretching { steps } => steps,
            _ => &[],
        }
    }
}

/// Input to the plan builders. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub activity: Activity,
    #[serde(default)]
    pub pace: Pace,
    #[serde(default)]
    pub style: GuidanceStyle,
}

impl ActivityConfig {
    pub fn new(activity: Activity) -> Self {
        Self {
            title: None,
            activity,
            pace: Pace::Normal,
            style: GuidanceStyle::Full,
        }
    }

    pub fn circuit(steps: Vec<Step>) -> Self {
        Self::new(Activity::Circuit { steps })
    }

    pub fn breathing(preset: BreathingPreset, target_duration_secs: Option<u32>) -> Self {
        Self::new(Activity::Breathing {
            pattern: PatternChoice::Preset(preset),
            target_duration_secs,
        })
    }

    pub fn meditation(duration_secs: u32) -> Self {
        Self::new(Activity::Meditation { duration_secs })
    }

    pub fn countdown(duration_secs: u32) -> Self {
        Self::new(Activity::Countdown { duration_secs })
    }

    pub fn with_pace(mut self, pace: Pace) -> Self {
        self.pace = pace;
        self
    }

    pub fn with_style(mut self, style: GuidanceStyle) -> Self {
        self.style = style;
        self
    }

    pub fn kind(&self) -> ActivityKind {
        self.activity.kind()
    }
}
