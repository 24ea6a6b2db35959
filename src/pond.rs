use crate::bubble::{Bubble, Phase};
use crate::events::{EventPublisher, PondEvent};
use crate::physics::PhysicsEngine;
use crate::placement::{find_empty_position, is_position_empty, DEFAULT_MAX_ATTEMPTS};
use crate::score::Score;
use crate::types::*;
use glam::Vec2;
use log::{debug, info};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fixed parameters of a pond that do not come from the score.
#[derive(Debug, Clone, Copy)]
pub struct PondConfig {
    pub bounds: SurfaceBounds,
    /// Presentation ticks per second.
    pub tick_rate: u32,
    /// Placement budget per spawn attempt.
    pub max_placement_attempts: u32,
}

impl PondConfig {
    pub fn new(bounds: SurfaceBounds) -> Self {
        Self {
            bounds,
            tick_rate: DEFAULT_TICK_RATE,
            max_placement_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Result of one spawn attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned(BubbleId),
    /// The live population is already at the score's upper bound.
    AtCapacity,
    /// No empty position was found (or the tapped point was not empty).
    NoRoom,
}

impl SpawnOutcome {
    pub fn bubble(&self) -> Option<BubbleId> {
        match self {
            SpawnOutcome::Spawned(id) => Some(*id),
            _ => None,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub spawned: Option<BubbleId>,
    pub departed: Vec<BubbleId>,
    pub removed: Vec<BubbleId>,
    pub placement_failed: bool,
}

/// Side effects of a score swap, for the caller to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreSwap {
    /// Live bubbles silently faded out.
    pub cleared: usize,
    pub frames_per_spawn: u32,
}

/// Ticks between spawn attempts: one attempt per beat.
pub fn frames_per_spawn(tempo: f64, tick_rate: u32) -> u32 {
    ((60.0 / tempo) * tick_rate as f64).round().max(1.0) as u32
}

/// The pond: owns the bubbles, drives their lives from the tick, and
/// publishes what happens to them.
///
/// Everything runs on the caller's thread, one tick at a time. Commands
/// that change the pond (`tap`, `adapt_to`) are meant to be applied between
/// ticks by the same thread that ticks.
pub struct PondSimulation<P: PhysicsEngine> {
    score: Arc<Score>,
    physics: P,
    publisher: EventPublisher,
    rng: Pcg32,
    config: PondConfig,
    bubbles: BTreeMap<BubbleId, Bubble>,
    frame_count: u64,
    frames_per_spawn: u32,
    next_id: u64,
}

impl<P: PhysicsEngine> PondSimulation<P> {
    pub fn new(
        score: Arc<Score>,
        physics: P,
        publisher: EventPublisher,
        config: PondConfig,
        seed: u64,
    ) -> Self {
        let frames_per_spawn = frames_per_spawn(score.tempo, config.tick_rate);
        info!(
            "Pond {} at {} Hz, score \"{}\" ({} bpm → spawn every {} ticks)",
            config.bounds, config.tick_rate, score.name, score.tempo, frames_per_spawn
        );
        Self {
            score,
            physics,
            publisher,
            rng: Pcg32::seed_from_u64(seed),
            config,
            bubbles: BTreeMap::new(),
            frame_count: 0,
            frames_per_spawn,
            next_id: 1,
        }
    }

    pub fn score(&self) -> &Arc<Score> {
        &self.score
    }

    pub fn config(&self) -> &PondConfig {
        &self.config
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn frames_per_spawn(&self) -> u32 {
        self.frames_per_spawn
    }

    /// Bubbles arriving or alive.
    pub fn live_count(&self) -> usize {
        self.bubbles.values().filter(|b| b.is_live()).count()
    }

    pub fn bubble(&self, id: BubbleId) -> Option<&Bubble> {
        self.bubbles.get(&id)
    }

    /// Every bubble still on the surface, fading ones included, by id.
    pub fn bubbles(&self) -> impl Iterator<Item = &Bubble> {
        self.bubbles.values()
    }

    /// The note pair a bubble plays when it collides.
    pub fn collision_notes(&self, id: BubbleId) -> Option<(&str, &str)> {
        self.bubbles
            .get(&id)
            .map(|b| (b.collision_note_a.as_str(), b.collision_note_b.as_str()))
    }

    /// Where a bubble is now: from the physics body if attached.
    pub fn position_of(&self, id: BubbleId) -> Option<Vec2> {
        let bubble = self.bubbles.get(&id)?;
        Some(self.physics.position(id).unwrap_or(bubble.position))
    }

    /// Largest diameter the current score can produce.
    pub fn max_diameter(&self) -> f32 {
        self.config.bounds.shortest_dimension() / self.score.screen_divisor_range.min
    }

    fn fade_ticks(&self) -> u32 {
        (FADE_SECONDS * self.config.tick_rate as f32).round() as u32
    }

    // ─── Tick ───────────────────────────────────────────────────────────────

    /// Advance one presentation tick.
    pub fn tick(&mut self) -> TickReport {
        self.frame_count += 1;
        let mut report = TickReport::default();

        for bubble in self.bubbles.values_mut() {
            bubble.advance_fade();
            if bubble.is_removed() {
                report.removed.push(bubble.id);
            }
        }
        self.bubbles.retain(|_, b| !b.is_removed());

        if self.frame_count % self.config.tick_rate.max(1) as u64 == 0 {
            report.departed = self.age_all();
        }

        if self.frame_count % self.frames_per_spawn as u64 == 0 {
            match self.try_spawn() {
                SpawnOutcome::Spawned(id) => report.spawned = Some(id),
                SpawnOutcome::NoRoom => report.placement_failed = true,
                SpawnOutcome::AtCapacity => {}
            }
        }

        if self.frame_count % 600 == 0 {
            debug!(
                "Pond: {} ticks, {} live, {} fading",
                self.frame_count,
                self.live_count(),
                self.bubbles.len() - self.live_count()
            );
        }

        report
    }

    /// Age every live bubble by one second. Bubbles whose lifespan runs out
    /// start departing: they leave the physics world and a `Departure` is
    /// published for each, once.
    pub fn age_all(&mut self) -> Vec<BubbleId> {
        let fade = self.fade_ticks();
        let mut departed = Vec::new();
        for bubble in self.bubbles.values_mut() {
            if bubble.age(1, fade) {
                departed.push(bubble.id);
            }
        }
        for &id in &departed {
            self.release_body(id);
            debug!("Bubble {} departing", id);
            self.publisher.publish(PondEvent::Departure { bubble: id });
        }
        departed
    }

    // ─── Spawning ───────────────────────────────────────────────────────────

    fn at_capacity(&self) -> bool {
        self.live_count() >= self.score.bubble_count_range.max as usize
    }

    fn occupied_positions(&self) -> Vec<Vec2> {
        self.bubbles
            .keys()
            .filter_map(|&id| self.position_of(id))
            .collect()
    }

    /// Timer-driven spawn: respects the population bound and finds an
    /// empty point. Placement failure only skips this attempt.
    pub fn try_spawn(&mut self) -> SpawnOutcome {
        if self.at_capacity() {
            return SpawnOutcome::AtCapacity;
        }
        let occupied = self.occupied_positions();
        match find_empty_position(
            &occupied,
            self.max_diameter(),
            &self.config.bounds,
            self.config.max_placement_attempts,
            &mut self.rng,
        ) {
            Ok(point) => SpawnOutcome::Spawned(self.spawn_at(point)),
            Err(e) => {
                debug!("{}; skipping spawn", e);
                SpawnOutcome::NoRoom
            }
        }
    }

    /// User-initiated spawn at `point`. Same population bound; the point
    /// itself must pass the placement test.
    pub fn tap(&mut self, point: Vec2) -> SpawnOutcome {
        if self.at_capacity() {
            debug!("Tap at ({:.0}, {:.0}) ignored: pond is full", point.x, point.y);
            return SpawnOutcome::AtCapacity;
        }
        let occupied = self.occupied_positions();
        if !self.config.bounds.contains(point)
            || !is_position_empty(&occupied, self.max_diameter(), point)
        {
            debug!("Tap at ({:.0}, {:.0}) ignored: no room", point.x, point.y);
            return SpawnOutcome::NoRoom;
        }
        SpawnOutcome::Spawned(self.spawn_at(point))
    }

    fn spawn_at(&mut self, point: Vec2) -> BubbleId {
        let id = BubbleId(self.next_id);
        self.next_id += 1;

        let score = Arc::clone(&self.score);
        let divisor = score.random_screen_divisor(&mut self.rng);
        let diameter = (self.config.bounds.shortest_dimension() / divisor).floor();
        let note_a = score
            .random_collision_note(CollisionRole::First, &mut self.rng)
            .to_string();
        let note_b = score
            .random_collision_note(CollisionRole::Second, &mut self.rng)
            .to_string();
        let lifespan = score.random_lifespan(&mut self.rng);

        let mut bubble = Bubble::new(id, note_a, note_b, diameter, lifespan);
        bubble.position = point;
        bubble.velocity = score.random_initial_velocity(&mut self.rng);

        let mask = CATEGORY_BUBBLE | CATEGORY_EDGE;
        self.physics.attach(
            id,
            bubble.physics_radius(score.physics_radius_multiplier),
            mask,
            mask,
        );
        self.physics.set_position(id, bubble.position);
        self.physics.set_velocity(id, bubble.velocity);

        bubble.arrive(self.fade_ticks());
        debug!(
            "Spawned {} at ({:.0}, {:.0}) d={:.0} notes {}/{}",
            id, point.x, point.y, diameter, bubble.collision_note_a, bubble.collision_note_b
        );
        self.bubbles.insert(id, bubble);
        self.publisher.publish(PondEvent::Arrival { bubble: id });
        id
    }

    /// Detach a bubble's body, keeping its last position for placement.
    fn release_body(&mut self, id: BubbleId) {
        if let Some(position) = self.physics.position(id) {
            if let Some(bubble) = self.bubbles.get_mut(&id) {
                bubble.position = position;
            }
        }
        self.physics.detach(id);
    }

    // ─── Score ──────────────────────────────────────────────────────────────

    /// Swap the active score. Live bubbles fade out silently (no departure
    /// events), the spawn interval follows the new tempo from the next tick,
    /// and `ScoreReplaced` tells the orchestra to reset.
    pub fn adapt_to(&mut self, score: Arc<Score>) -> ScoreSwap {
        let fade = self.fade_ticks();
        let live: Vec<BubbleId> = self
            .bubbles
            .values()
            .filter(|b| b.is_live())
            .map(|b| b.id)
            .collect();
        for &id in &live {
            self.release_body(id);
            if let Some(bubble) = self.bubbles.get_mut(&id) {
                bubble.depart(fade, true);
            }
        }
        self.bubbles.retain(|_, b| !b.is_removed());

        self.score = score;
        self.frames_per_spawn = frames_per_spawn(self.score.tempo, self.config.tick_rate);
        self.frame_count = 0;
        info!(
            "Score replaced with \"{}\" ({} bubbles cleared, spawn every {} ticks)",
            self.score.name,
            live.len(),
            self.frames_per_spawn
        );
        self.publisher.publish(PondEvent::ScoreReplaced {
            score: Arc::clone(&self.score),
        });

        ScoreSwap {
            cleared: live.len(),
            frames_per_spawn: self.frames_per_spawn,
        }
    }

    pub fn request_soundcheck(&self, source: SoundSource) {
        info!("Soundcheck requested: {:?}", source);
        self.publisher
            .publish(PondEvent::SoundcheckRequested { source });
    }

    /// Phase of a bubble, if it is still on the surface.
    pub fn phase_of(&self, id: BubbleId) -> Option<Phase> {
        self.bubbles.get(&id).map(|b| b.phase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use crate::physics::HeadlessWorld;
    use crate::score::ValueRange;
    use crate::themes::ThemeCatalog;
    use crossbeam_channel::Receiver;

    fn base_score() -> Score {
        ThemeCatalog::bundled()
            .get("Still Water")
            .expect("bundled theme")
            .clone()
    }

    fn pond_with(score: Score) -> (PondSimulation<HeadlessWorld>, Receiver<PondEvent>) {
        let bounds = SurfaceBounds::new(1024.0, 768.0);
        let (publisher, rx) = event_channel(4096);
        let pond = PondSimulation::new(
            Arc::new(score),
            HeadlessWorld::new(bounds),
            publisher,
            PondConfig::new(bounds),
            42,
        );
        (pond, rx)
    }

    fn drain(rx: &Receiver<PondEvent>) -> Vec<PondEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_frames_per_spawn() {
        assert_eq!(frames_per_spawn(60.0, 60), 60);
        assert_eq!(frames_per_spawn(30.0, 60), 120);
        assert_eq!(frames_per_spawn(72.0, 60), 50);
        assert_eq!(frames_per_spawn(100_000.0, 60), 1);
    }

    #[test]
    fn test_spawn_on_beat() {
        let mut s = base_score();
        s.tempo = 60.0;
        let (mut pond, rx) = pond_with(s);
        for _ in 0..59 {
            assert_eq!(pond.tick().spawned, None);
        }
        let report = pond.tick();
        assert!(report.spawned.is_some());
        assert_eq!(pond.live_count(), 1);
        let events = drain(&rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PondEvent::Arrival { .. }));
    }

    #[test]
    fn test_spawned_bubble_uses_score() {
        let s = base_score();
        let (mut pond, _rx) = pond_with(s.clone());
        let id = pond.try_spawn().bubble().unwrap();
        let b = pond.bubble(id).unwrap();
        assert!(s.collision.note1_names.contains(&b.collision_note_a));
        assert!(s.collision.note2_names.contains(&b.collision_note_b));
        assert!(s.bubble_age_range.contains(b.remaining_lifespan));
        assert!(s.initial_velocity_x_range.contains(b.velocity.x));
        let shortest = 768.0;
        assert!(b.diameter <= (shortest / s.screen_divisor_range.min).floor());
        assert!(b.diameter >= (shortest / s.screen_divisor_range.max).floor());
        assert!(matches!(b.phase(), Phase::Arriving { .. }));
        assert_eq!(pond.physics().position(id), Some(b.position));
    }

    #[test]
    fn test_population_bound_holds() {
        let mut s = base_score();
        s.tempo = 3600.0; // attempt every tick
        s.bubble_count_range = ValueRange::new(1, 4);
        s.bubble_age_range = ValueRange::new(1, 3);
        s.screen_divisor_range = ValueRange::new(20.0, 24.0);
        let (mut pond, _rx) = pond_with(s);
        for _ in 0..60 * 20 {
            pond.tick();
            assert!(pond.live_count() <= 4);
        }
        assert_eq!(pond.try_spawn(), SpawnOutcome::AtCapacity);
    }

    #[test]
    fn test_departure_after_exact_lifespan() {
        let mut s = base_score();
        s.bubble_count_range = ValueRange::new(1, 1);
        s.bubble_age_range = ValueRange::new(3, 3);
        let (mut pond, rx) = pond_with(s);
        let id = pond.tap(Vec2::ZERO).bubble().unwrap();
        drain(&rx);

        let departures_for = |events: &[PondEvent]| {
            events
                .iter()
                .filter(|e| matches!(e, PondEvent::Departure { bubble } if *bubble == id))
                .count()
        };

        for _ in 0..2 {
            pond.age_all();
        }
        assert_eq!(departures_for(&drain(&rx)), 0);
        assert_eq!(pond.age_all(), vec![id]);
        assert_eq!(departures_for(&drain(&rx)), 1);
        assert_eq!(pond.age_all(), Vec::<BubbleId>::new());
        assert_eq!(departures_for(&drain(&rx)), 0);
        assert!(pond.physics().position(id).is_none(), "body detached on departure");
    }

    #[test]
    fn test_departing_bubble_removed_after_fade() {
        let mut s = base_score();
        s.bubble_count_range = ValueRange::new(1, 1);
        s.bubble_age_range = ValueRange::new(1, 1);
        s.tempo = 1.0; // keep the timer out of the way
        let (mut pond, _rx) = pond_with(s);
        let id = pond.tap(Vec2::ZERO).bubble().unwrap();

        let mut departed_at = None;
        let mut removed_at = None;
        for t in 1..=400u32 {
            let report = pond.tick();
            if report.departed.contains(&id) {
                departed_at = Some(t);
            }
            if report.removed.contains(&id) {
                removed_at = Some(t);
                break;
            }
        }
        assert_eq!(departed_at, Some(60));
        assert_eq!(removed_at, Some(60 + 120));
        assert!(pond.bubble(id).is_none());
    }

    #[test]
    fn test_tap_rejects_occupied_point() {
        let (mut pond, _rx) = pond_with(base_score());
        assert!(pond.tap(Vec2::ZERO).bubble().is_some());
        assert_eq!(pond.tap(Vec2::new(10.0, 0.0)), SpawnOutcome::NoRoom);
        assert_eq!(pond.tap(Vec2::new(5000.0, 0.0)), SpawnOutcome::NoRoom);
        assert!(pond.tap(Vec2::new(400.0, 0.0)).bubble().is_some());
    }

    #[test]
    fn test_crowded_pond_skips_spawn() {
        let mut s = base_score();
        s.screen_divisor_range = ValueRange::new(0.5, 0.5);
        let (mut pond, _rx) = pond_with(s);
        assert!(pond.tap(Vec2::ZERO).bubble().is_some());
        assert_eq!(pond.try_spawn(), SpawnOutcome::NoRoom);
        assert_eq!(pond.live_count(), 1);
    }

    #[test]
    fn test_adapt_to_clears_silently() {
        let (mut pond, rx) = pond_with(base_score());
        let a = pond.tap(Vec2::new(-300.0, 0.0)).bubble().unwrap();
        let b = pond.tap(Vec2::new(300.0, 0.0)).bubble().unwrap();
        drain(&rx);

        let mut next = ThemeCatalog::bundled().get("Night Rain").unwrap().clone();
        next.tempo = 60.0;
        let swap = pond.adapt_to(Arc::new(next.clone()));
        assert_eq!(
            swap,
            ScoreSwap {
                cleared: 2,
                frames_per_spawn: 60
            }
        );
        assert_eq!(pond.live_count(), 0);
        for id in [a, b] {
            assert!(matches!(
                pond.phase_of(id),
                Some(Phase::Departing { silent: true, .. })
            ));
            assert!(pond.physics().position(id).is_none());
        }

        let events = drain(&rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PondEvent::ScoreReplaced { score } => assert_eq!(score.name, "Night Rain"),
            other => panic!("unexpected event {:?}", other),
        }

        // Ticking through the fades never produces a departure
        for _ in 0..200 {
            let report = pond.tick();
            assert!(report.departed.iter().all(|id| *id != a && *id != b));
        }
        assert!(pond.bubble(a).is_none() && pond.bubble(b).is_none());
        assert!(!drain(&rx)
            .iter()
            .any(|e| matches!(e, PondEvent::Departure { bubble } if *bubble == a || *bubble == b)));
    }
}
