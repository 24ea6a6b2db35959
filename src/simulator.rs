use crate::events::EventPublisher;
use crate::physics::{ContactAdapter, HeadlessWorld};
use crate::pond::{PondConfig, PondSimulation, SpawnOutcome, TickReport};
use crate::score::Score;
use crate::themes::ThemeCatalog;
use crate::types::*;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use glam::Vec2;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Requests for the pond, applied between ticks.
#[derive(Debug, Clone)]
pub enum SimCommand {
    Tap(Vec2),
    ReplaceScore(Score),
    Soundcheck(SoundSource),
    Signal(AudioSignal),
    Stop,
}

/// Drives a pond the way a presentation layer would: a fixed-rate tick,
/// a headless physics world stepped once per tick, and commands drained
/// from a channel between ticks so a score swap never lands mid-tick.
pub struct Simulator {
    pond: PondSimulation<HeadlessWorld>,
    contacts: ContactAdapter,
    commands: Receiver<SimCommand>,
    signals: Option<Sender<AudioSignal>>,
    themes: ThemeCatalog,
    realtime: bool,
    ticks: u64,
    collisions: u64,
}

impl Simulator {
    pub fn new(
        score: Arc<Score>,
        config: PondConfig,
        publisher: EventPublisher,
        commands: Receiver<SimCommand>,
        seed: u64,
    ) -> Self {
        let world = HeadlessWorld::new(config.bounds);
        Self {
            pond: PondSimulation::new(score, world, publisher.clone(), config, seed),
            contacts: ContactAdapter::new(publisher),
            commands,
            signals: None,
            themes: ThemeCatalog::bundled(),
            realtime: true,
            ticks: 0,
            collisions: 0,
        }
    }

    /// Forward foreground/background signals to the audio side.
    pub fn with_signals(mut self, tx: Sender<AudioSignal>) -> Self {
        self.signals = Some(tx);
        self
    }

    /// Themes the demo script may swap to.
    pub fn with_themes(mut self, themes: ThemeCatalog) -> Self {
        self.themes = themes;
        self
    }

    /// Sleep between ticks to hold the tick rate. Off for tests.
    pub fn realtime(mut self, enabled: bool) -> Self {
        self.realtime = enabled;
        self
    }

    pub fn pond(&self) -> &PondSimulation<HeadlessWorld> {
        &self.pond
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.pond.config().tick_rate.max(1)
    }

    /// Apply one command. Returns false for `Stop`.
    pub fn apply(&mut self, command: SimCommand) -> bool {
        match command {
            SimCommand::Tap(point) => {
                if let SpawnOutcome::Spawned(id) = self.pond.tap(point) {
                    info!("  tap ({:.0}, {:.0}) → bubble {}", point.x, point.y, id);
                }
            }
            SimCommand::ReplaceScore(score) => {
                self.pond.adapt_to(Arc::new(score));
            }
            SimCommand::Soundcheck(source) => self.pond.request_soundcheck(source),
            SimCommand::Signal(signal) => match &self.signals {
                Some(tx) => {
                    if tx.send(signal).is_err() {
                        warn!("Audio signal {:?} dropped: orchestra gone", signal);
                    }
                }
                None => debug!("No audio listener for {:?}", signal),
            },
            SimCommand::Stop => {
                info!("Simulator stop requested");
                return false;
            }
        }
        true
    }

    /// Apply every queued command. Returns false once a `Stop` was seen.
    pub fn drain_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    if !self.apply(command) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    /// One tick: pond first, then physics, then contacts.
    pub fn step(&mut self) -> TickReport {
        let report = self.pond.tick();
        let dt = self.tick_duration().as_secs_f32();
        let contacts = self.pond.physics_mut().step(dt);
        for contact in contacts {
            self.collisions += self.contacts.on_contact(&self.pond, contact) as u64;
        }
        self.ticks += 1;
        if self.ticks % 600 == 0 {
            debug!(
                "Simulator: {} ticks, {} live, {} collisions",
                self.ticks,
                self.pond.live_count(),
                self.collisions
            );
        }
        report
    }

    /// Run until `Stop`, or for `max_ticks` ticks if given. Blocks the
    /// calling thread. Returns false if stopped by command.
    pub fn run(&mut self, max_ticks: Option<u64>) -> bool {
        let tick = self.tick_duration();
        let mut next = Instant::now();
        let mut done = 0u64;
        loop {
            if max_ticks.is_some_and(|max| done >= max) {
                return true;
            }
            if !self.drain_commands() {
                return false;
            }
            self.step();
            done += 1;

            if self.realtime {
                next += tick;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    next = now;
                }
            }
        }
    }

    /// Play a gesture script. Returns false if stopped by command.
    pub fn run_demo(&mut self, gestures: &[Gesture]) -> bool {
        info!("Simulator starting demo sequence...");
        for gesture in gestures {
            if !self.execute(gesture) {
                return false;
            }
        }
        info!("Demo sequence complete");
        true
    }

    fn execute(&mut self, gesture: &Gesture) -> bool {
        match gesture {
            Gesture::Hold { ms } => {
                info!("  hold {}ms", ms);
                let ticks = *ms as u64 * self.pond.config().tick_rate as u64 / 1000;
                self.run(Some(ticks))
            }
            Gesture::Tap { x, y } => self.apply(SimCommand::Tap(Vec2::new(*x, *y))),
            Gesture::Soundcheck(source) => {
                info!("  soundcheck {}", source.instrument().as_str());
                self.apply(SimCommand::Soundcheck(*source))
            }
            Gesture::SwapTheme(name) => {
                let score = match self.themes.get(name) {
                    Ok(score) => score.clone(),
                    Err(e) => {
                        warn!("  swap theme skipped: {}", e);
                        return true;
                    }
                };
                info!("  swap theme → {}", score.name);
                self.apply(SimCommand::ReplaceScore(score))
            }
            Gesture::Background => {
                info!("  background");
                self.apply(SimCommand::Signal(AudioSignal::Background))
            }
            Gesture::Foreground => {
                info!("  foreground");
                self.apply(SimCommand::Signal(AudioSignal::Foreground))
            }
        }
    }
}

// ─── Gestures ───────────────────────────────────────────────────────────────

/// One step of a scripted demo.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Let the pond run.
    Hold { ms: u32 },
    Tap { x: f32, y: f32 },
    Soundcheck(SoundSource),
    SwapTheme(&'static str),
    Background,
    Foreground,
}

/// Names accepted by `demo_sequence`.
pub const DEMOS: [&str; 1] = ["basic"];

/// A named demo script.
pub fn demo_sequence(name: &str) -> Option<Vec<Gesture>> {
    match name {
        "basic" => Some(vec![
            Gesture::Hold { ms: 3000 },
            // A few taps around the middle
            Gesture::Tap { x: -250.0, y: 0.0 },
            Gesture::Tap { x: 250.0, y: 0.0 },
            Gesture::Tap { x: 0.0, y: 200.0 },
            Gesture::Hold { ms: 4000 },
            Gesture::Soundcheck(SoundSource::Arrival),
            Gesture::Hold { ms: 6000 },
            Gesture::SwapTheme("Night Rain"),
            Gesture::Hold { ms: 5000 },
            // Backgrounded: pond keeps running, audio stops
            Gesture::Background,
            Gesture::Hold { ms: 2000 },
            Gesture::Foreground,
            Gesture::Soundcheck(SoundSource::Collision(CollisionRole::First)),
            Gesture::Hold { ms: 4000 },
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{event_channel, PondEvent};
    use crate::score::ValueRange;
    use crossbeam_channel::unbounded;

    fn still_water() -> Score {
        ThemeCatalog::bundled()
            .get("Still Water")
            .expect("bundled theme")
            .clone()
    }

    fn simulator(score: Score) -> (Simulator, Sender<SimCommand>, Receiver<PondEvent>) {
        let bounds = SurfaceBounds::new(1024.0, 768.0);
        let (publisher, events) = event_channel(8192);
        let (cmd_tx, cmd_rx) = unbounded();
        let sim = Simulator::new(Arc::new(score), PondConfig::new(bounds), publisher, cmd_rx, 5)
            .realtime(false);
        (sim, cmd_tx, events)
    }

    #[test]
    fn test_commands_applied_between_ticks() {
        let (mut sim, tx, events) = simulator(still_water());
        tx.send(SimCommand::Tap(Vec2::ZERO)).unwrap();
        assert_eq!(sim.pond().live_count(), 0);
        assert!(sim.run(Some(1)));
        assert_eq!(sim.pond().live_count(), 1);
        assert!(matches!(events.try_recv(), Ok(PondEvent::Arrival { .. })));
    }

    #[test]
    fn test_stop_command_ends_run() {
        let (mut sim, tx, _events) = simulator(still_water());
        tx.send(SimCommand::Stop).unwrap();
        assert!(!sim.run(None));
        assert_eq!(sim.ticks(), 0);
    }

    #[test]
    fn test_run_for_tick_count() {
        let (mut sim, _tx, _events) = simulator(still_water());
        assert!(sim.run(Some(120)));
        assert_eq!(sim.ticks(), 120);
        assert_eq!(sim.pond().frame_count(), 120);
    }

    #[test]
    fn test_signal_forwarded() {
        let (sim, tx, _events) = simulator(still_water());
        let (sig_tx, sig_rx) = unbounded();
        let mut sim = sim.with_signals(sig_tx);
        tx.send(SimCommand::Signal(AudioSignal::Background)).unwrap();
        assert!(sim.drain_commands());
        assert_eq!(sig_rx.try_recv(), Ok(AudioSignal::Background));
    }

    #[test]
    fn test_edge_contact_publishes_bubble_notes() {
        let mut score = still_water();
        score.initial_velocity_x_range = ValueRange::new(300.0, 300.0);
        score.initial_velocity_y_range = ValueRange::new(0.0, 0.0);
        let (mut sim, _tx, events) = simulator(score);
        assert!(sim.apply(SimCommand::Tap(Vec2::ZERO)));
        let (a, b) = {
            let bubble = sim.pond().bubbles().next().unwrap();
            (bubble.collision_note_a.clone(), bubble.collision_note_b.clone())
        };
        sim.run(Some(180));
        let hit = events.try_iter().any(|e| {
            matches!(e, PondEvent::Collision { ref note_a, ref note_b } if *note_a == a && *note_b == b)
        });
        assert!(hit, "bubble should reach the edge and publish its notes");
    }

    #[test]
    fn test_replace_score_command() {
        let (mut sim, tx, events) = simulator(still_water());
        tx.send(SimCommand::Tap(Vec2::ZERO)).unwrap();
        let next = ThemeCatalog::bundled().get("Glass Garden").unwrap().clone();
        tx.send(SimCommand::ReplaceScore(next)).unwrap();
        sim.run(Some(1));
        assert_eq!(sim.pond().live_count(), 0);
        assert_eq!(sim.pond().score().name, "Glass Garden");
        let kinds: Vec<PondEvent> = events.try_iter().collect();
        assert!(matches!(kinds[0], PondEvent::Arrival { .. }));
        assert!(matches!(kinds[1], PondEvent::ScoreReplaced { .. }));
    }

    #[test]
    fn test_basic_demo_runs() {
        let (sim, _tx, events) = simulator(still_water());
        let (sig_tx, sig_rx) = unbounded();
        let mut sim = sim.with_signals(sig_tx);
        let demo = demo_sequence("basic").unwrap();
        assert!(sim.run_demo(&demo));
        assert_eq!(
            sig_rx.try_iter().collect::<Vec<_>>(),
            vec![AudioSignal::Background, AudioSignal::Foreground]
        );
        let all: Vec<PondEvent> = events.try_iter().collect();
        assert!(all.iter().any(|e| matches!(e, PondEvent::ScoreReplaced { .. })));
        assert!(all
            .iter()
            .any(|e| matches!(e, PondEvent::SoundcheckRequested { .. })));
        assert_eq!(sim.pond().score().name, "Night Rain");
        assert!(demo_sequence("nope").is_none());
    }
}
