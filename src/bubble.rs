use crate::types::BubbleId;
use glam::Vec2;
use log::debug;

/// Where a bubble is in its life.
///
/// `Spawned → Arriving → Alive → Departing → Removed`. The fades are counted
/// in ticks so they advance with the simulation, not the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Constructed but not yet on the surface.
    Spawned,
    /// Fading in.
    Arriving { ticks_left: u32 },
    Alive,
    /// Fading out. `silent` is set for bulk clears that play no departure sound.
    Departing { ticks_left: u32, silent: bool },
    Removed,
}

/// One bubble on the pond. Carries only data: the physics body and the
/// sounds it causes are owned elsewhere and refer to it by `id`.
#[derive(Debug, Clone)]
pub struct Bubble {
    pub id: BubbleId,
    /// Note for the first collision voice when this bubble collides.
    pub collision_note_a: String,
    /// Note for the second collision voice when this bubble collides.
    pub collision_note_b: String,
    /// Seconds left to live.
    pub remaining_lifespan: u32,
    pub mortal: bool,
    /// Seed position; the physics engine owns it once the body is attached.
    pub position: Vec2,
    /// Seed velocity.
    pub velocity: Vec2,
    /// Fixed for the bubble's life.
    pub diameter: f32,
    phase: Phase,
}

impl Bubble {
    pub fn new(
        id: BubbleId,
        collision_note_a: String,
        collision_note_b: String,
        diameter: f32,
        lifespan: u32,
    ) -> Self {
        debug!("Bubble {} will last {} seconds", id, lifespan);
        Self {
            id,
            collision_note_a,
            collision_note_b,
            remaining_lifespan: lifespan,
            mortal: true,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            diameter,
            phase: Phase::Spawned,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Arriving or alive: counted toward the population and aged.
    pub fn is_live(&self) -> bool {
        matches!(self.phase, Phase::Arriving { .. } | Phase::Alive)
    }

    pub fn is_removed(&self) -> bool {
        self.phase == Phase::Removed
    }

    /// Radius of the physics body: half the diameter, scaled.
    pub fn physics_radius(&self, multiplier: f32) -> f32 {
        self.diameter / 2.0 * multiplier
    }

    /// Start the fade-in. Only meaningful from `Spawned`.
    pub fn arrive(&mut self, fade_ticks: u32) {
        if self.phase == Phase::Spawned {
            self.phase = if fade_ticks == 0 {
                Phase::Alive
            } else {
                Phase::Arriving {
                    ticks_left: fade_ticks,
                }
            };
        }
    }

    /// Age by `seconds`. Returns true exactly once: on the call that moves
    /// the bubble from live to departing.
    pub fn age(&mut self, seconds: u32, fade_ticks: u32) -> bool {
        if !self.mortal || !self.is_live() {
            return false;
        }
        self.remaining_lifespan = self.remaining_lifespan.saturating_sub(seconds);
        if self.remaining_lifespan < 1 {
            self.depart(fade_ticks, false);
            true
        } else {
            false
        }
    }

    /// Begin the fade-out. Returns false if the bubble was already leaving.
    pub fn depart(&mut self, fade_ticks: u32, silent: bool) -> bool {
        match self.phase {
            Phase::Departing { .. } | Phase::Removed => false,
            _ => {
                self.phase = if fade_ticks == 0 {
                    Phase::Removed
                } else {
                    Phase::Departing {
                        ticks_left: fade_ticks,
                        silent,
                    }
                };
                true
            }
        }
    }

    /// Advance any running fade by one tick.
    pub fn advance_fade(&mut self) {
        self.phase = match self.phase {
            Phase::Arriving { ticks_left } if ticks_left <= 1 => Phase::Alive,
            Phase::Arriving { ticks_left } => Phase::Arriving {
                ticks_left: ticks_left - 1,
            },
            Phase::Departing { ticks_left, .. } if ticks_left <= 1 => Phase::Removed,
            Phase::Departing { ticks_left, silent } => Phase::Departing {
                ticks_left: ticks_left - 1,
                silent,
            },
            other => other,
        };
    }
}
