use std::fmt;

/// Capture session state machine.
///
/// State transitions:
/// ```text
/// idle → attaching → active ↔ paused
///   ↑        │          │       │
///   └────────┘          ↓       ↓
///             attaching ← stopped
///
/// any state → destroyed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Idle,
    Attaching,
    Active,
    Paused,
    Stopped,
    Destroyed,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_attaching(&self) -> bool {
        matches!(self, Self::Attaching)
    }

    /// A backend is attached (emitting or paused).
    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Active | Self::Paused)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Destroyed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Attaching => "attaching",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
