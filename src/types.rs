use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Identity ───────────────────────────────────────────────────────────────

/// Opaque bubble identity. Unique per instance for the life of a pond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BubbleId(pub u64);

impl fmt::Display for BubbleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ─── Surface ────────────────────────────────────────────────────────────────

/// The pond surface, centered on the origin (x in [-w/2, w/2], y in [-h/2, h/2]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceBounds {
    pub width: f32,
    pub height: f32,
}

impl SurfaceBounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn shortest_dimension(&self) -> f32 {
        self.width.min(self.height)
    }

    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Half extents after pulling every edge in by `margin`. Never negative.
    pub fn inset_half_extents(&self, margin: f32) -> Vec2 {
        (self.half_extents() - Vec2::splat(margin)).max(Vec2::ZERO)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let h = self.half_extents();
        point.x.abs() <= h.x && point.y.abs() <= h.y
    }
}

impl fmt::Display for SurfaceBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}x{:.0}", self.width, self.height)
    }
}

// ─── Sound routing ──────────────────────────────────────────────────────────

/// The four voices of the pond. Arrival and departure are FM banks configured
/// from the score; the two collision voices are struck percussively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    ArrivalSynth,
    DepartureSynth,
    CollisionBells,
    CollisionRhodes,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::ArrivalSynth,
        Instrument::DepartureSynth,
        Instrument::CollisionBells,
        Instrument::CollisionRhodes,
    ];

    /// Short lowercase name, used in OSC addresses and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::ArrivalSynth => "arrival",
            Instrument::DepartureSynth => "departure",
            Instrument::CollisionBells => "bells",
            Instrument::CollisionRhodes => "rhodes",
        }
    }
}

/// Which body takes part in a collision sound. Each role has its own note
/// pool and amplitude range in the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionRole {
    First,
    Second,
}

impl CollisionRole {
    pub fn instrument(&self) -> Instrument {
        match self {
            CollisionRole::First => Instrument::CollisionBells,
            CollisionRole::Second => Instrument::CollisionRhodes,
        }
    }
}

/// A note pool that can be auditioned with a soundcheck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundSource {
    Arrival,
    Departure,
    Collision(CollisionRole),
}

impl SoundSource {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "arrival" | "in" => Some(SoundSource::Arrival),
            "departure" | "out" => Some(SoundSource::Departure),
            "collision1" | "bells" => Some(SoundSource::Collision(CollisionRole::First)),
            "collision2" | "rhodes" => Some(SoundSource::Collision(CollisionRole::Second)),
            _ => None,
        }
    }

    pub fn instrument(&self) -> Instrument {
        match self {
            SoundSource::Arrival => Instrument::ArrivalSynth,
            SoundSource::Departure => Instrument::DepartureSynth,
            SoundSource::Collision(role) => role.instrument(),
        }
    }
}

/// Foreground/background signal for the audio subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSignal {
    Background,
    Foreground,
}

// ─── Physics categories ─────────────────────────────────────────────────────

/// Category bit for bubble bodies.
pub const CATEGORY_BUBBLE: u32 = 1;
/// Category bit for the surface edge.
pub const CATEGORY_EDGE: u32 = 2;

// ─── Timing ─────────────────────────────────────────────────────────────────

/// Default presentation tick rate (ticks per second).
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Fade-in and fade-out length of a bubble, in seconds.
pub const FADE_SECONDS: f32 = 2.0;

/// Spacing between notes of a soundcheck, in microseconds.
pub const SOUNDCHECK_SPACING_US: u64 = 2_000_000;

/// Monotonic clock for a pond session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}
