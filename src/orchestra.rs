use crate::audio::AudioEngine;
use crate::events::PondEvent;
use crate::notes::{note_name_to_hz, parse_note_name};
use crate::score::Score;
use crate::types::*;
use crossbeam_channel::{never, select, Receiver};
use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::sync::Arc;
use std::time::Duration;

/// How long the run loop waits for an event when nothing is scheduled.
const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Round-robin position in a note pool. Wraps to the start past the end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoteCursor {
    index: usize,
}

impl NoteCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The note under the cursor, then advance. `None` only for an empty pool.
    pub fn next<'a>(&mut self, pool: &'a [String]) -> Option<&'a str> {
        if pool.is_empty() {
            return None;
        }
        if self.index >= pool.len() {
            self.index = 0;
        }
        let note = pool[self.index].as_str();
        self.index = (self.index + 1) % pool.len();
        Some(note)
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }
}

/// A soundcheck note waiting for its time.
#[derive(Debug, Clone)]
struct PendingNote {
    due_us: u64,
    source: SoundSource,
    note: String,
}

/// The orchestra receives `PondEvent`s and turns them into calls on the
/// audio engine.
///
/// Arrival and departure notes come round-robin from their pools, each with
/// its own cursor; velocity, duration and collision amplitudes are sampled
/// from the active score. Soundcheck notes are scheduled, not awaited:
/// `fire_due` plays whatever is due and the run loop wakes up in time for
/// the next one.
pub struct Orchestra {
    score: Arc<Score>,
    engine: Box<dyn AudioEngine>,
    events: Receiver<PondEvent>,
    rng: Pcg32,
    arrival_cursor: NoteCursor,
    departure_cursor: NoteCursor,
    pending: Vec<PendingNote>,
    handled: u64,
}

impl Orchestra {
    /// Configure the instruments from `score` and start the engine. A failed
    /// start is logged; the orchestra keeps routing either way.
    pub fn new(
        score: Arc<Score>,
        engine: Box<dyn AudioEngine>,
        events: Receiver<PondEvent>,
        seed: u64,
    ) -> Self {
        let mut orchestra = Self {
            score,
            engine,
            events,
            rng: Pcg32::seed_from_u64(seed),
            arrival_cursor: NoteCursor::new(),
            departure_cursor: NoteCursor::new(),
            pending: Vec::new(),
            handled: 0,
        };
        orchestra.configure_instruments();
        if let Err(e) = orchestra.engine.start() {
            warn!("Audio engine failed to start: {}", e);
        }
        orchestra
    }

    pub fn score(&self) -> &Arc<Score> {
        &self.score
    }

    /// Positions of the arrival and departure cursors.
    pub fn cursors(&self) -> (usize, usize) {
        (self.arrival_cursor.position(), self.departure_cursor.position())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Due time of the earliest scheduled soundcheck note.
    pub fn next_due_us(&self) -> Option<u64> {
        self.pending.iter().map(|p| p.due_us).min()
    }

    fn configure_instruments(&mut self) {
        let score = Arc::clone(&self.score);
        self.engine.configure(
            Instrument::ArrivalSynth,
            &score.arrival.synth,
            &score.arrival.envelope,
        );
        self.engine.configure(
            Instrument::DepartureSynth,
            &score.departure.synth,
            &score.departure.envelope,
        );
    }

    // ─── Dispatch ───────────────────────────────────────────────────────────

    pub fn handle(&mut self, event: PondEvent, now_us: u64) {
        trace!("Orchestra ← {:?}", event);
        match event {
            PondEvent::Arrival { .. } => self.on_arrival(),
            PondEvent::Departure { .. } => self.on_departure(),
            PondEvent::Collision { note_a, note_b } => self.on_collision(&note_a, &note_b),
            PondEvent::SoundcheckRequested { source } => self.request_soundcheck(source, now_us),
            PondEvent::ScoreReplaced { score } => self.on_score_replaced(score),
        }
        self.handled += 1;
        if self.handled % 500 == 0 {
            debug!("Orchestra: {} events handled", self.handled);
        }
    }

    pub fn on_arrival(&mut self) {
        let score = Arc::clone(&self.score);
        if let Some(note) = self.arrival_cursor.next(&score.arrival.note_names) {
            let velocity = score.random_arrival_velocity(&mut self.rng);
            let duration = score.random_arrival_duration(&mut self.rng);
            self.play_note(Instrument::ArrivalSynth, note, velocity, duration);
        }
    }

    pub fn on_departure(&mut self) {
        let score = Arc::clone(&self.score);
        if let Some(note) = self.departure_cursor.next(&score.departure.note_names) {
            let velocity = score.random_departure_velocity(&mut self.rng);
            let duration = score.random_departure_duration(&mut self.rng);
            self.play_note(Instrument::DepartureSynth, note, velocity, duration);
        }
    }

    /// Both collision voices fire on every collision, equal notes included.
    pub fn on_collision(&mut self, note_a: &str, note_b: &str) {
        let score = Arc::clone(&self.score);
        let amplitude1 = score.random_collision_amplitude(CollisionRole::First, &mut self.rng);
        let amplitude2 = score.random_collision_amplitude(CollisionRole::Second, &mut self.rng);
        self.strike(CollisionRole::First.instrument(), note_a, amplitude1);
        self.strike(CollisionRole::Second.instrument(), note_b, amplitude2);
    }

    /// Silence every instrument, rewind the cursors, reconfigure from the
    /// new score and drop soundcheck notes still waiting from the old one.
    pub fn on_score_replaced(&mut self, score: Arc<Score>) {
        for instrument in Instrument::ALL {
            self.engine.stop_all(instrument);
        }
        self.arrival_cursor.reset();
        self.departure_cursor.reset();
        if !self.pending.is_empty() {
            debug!("Dropping {} pending soundcheck notes", self.pending.len());
            self.pending.clear();
        }
        self.score = score;
        self.configure_instruments();
        info!("Orchestra now playing \"{}\"", self.score.name);
    }

    /// Schedule every note of the pool behind `source`, one every two
    /// seconds from `now_us`. The first note plays right away.
    pub fn request_soundcheck(&mut self, source: SoundSource, now_us: u64) {
        let score = Arc::clone(&self.score);
        let pool: &[String] = match source {
            SoundSource::Arrival => &score.arrival.note_names,
            SoundSource::Departure => &score.departure.note_names,
            SoundSource::Collision(role) => score.collision_notes(role),
        };
        info!(
            "Soundcheck {} ({} notes, {}s apart)",
            source.instrument().as_str(),
            pool.len(),
            SOUNDCHECK_SPACING_US / 1_000_000
        );
        for (i, note) in pool.iter().enumerate() {
            self.pending.push(PendingNote {
                due_us: now_us + i as u64 * SOUNDCHECK_SPACING_US,
                source,
                note: note.clone(),
            });
        }
        self.fire_due(now_us);
    }

    /// Play scheduled notes whose time has come. Returns how many fired.
    pub fn fire_due(&mut self, now_us: u64) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let (mut due, later): (Vec<PendingNote>, Vec<PendingNote>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.due_us <= now_us);
        self.pending = later;
        due.sort_by_key(|p| p.due_us);

        let score = Arc::clone(&self.score);
        for p in &due {
            match p.source {
                SoundSource::Arrival => {
                    let velocity = score.random_arrival_velocity(&mut self.rng);
                    let duration = score.random_arrival_duration(&mut self.rng);
                    self.play_note(Instrument::ArrivalSynth, &p.note, velocity, duration);
                }
                SoundSource::Departure => {
                    let velocity = score.random_departure_velocity(&mut self.rng);
                    let duration = score.random_departure_duration(&mut self.rng);
                    self.play_note(Instrument::DepartureSynth, &p.note, velocity, duration);
                }
                SoundSource::Collision(role) => {
                    let amplitude = score.random_collision_amplitude(role, &mut self.rng);
                    self.strike(role.instrument(), &p.note, amplitude);
                }
            }
        }
        due.len()
    }

    /// Foreground starts the engine, background stops it. Failures are
    /// logged and not retried.
    pub fn handle_signal(&mut self, signal: AudioSignal) {
        let result = match signal {
            AudioSignal::Background => self.engine.stop(),
            AudioSignal::Foreground => self.engine.start(),
        };
        match result {
            Ok(()) => info!("Audio {:?}", signal),
            Err(e) => warn!("Audio {:?} failed: {}", signal, e),
        }
    }

    fn play_note(&mut self, instrument: Instrument, note: &str, velocity: u8, seconds: f64) {
        match parse_note_name(note) {
            Some(midi) => match Duration::try_from_secs_f64(seconds.max(0.0)) {
                Ok(duration) => self.engine.play(instrument, midi, velocity, duration),
                Err(e) => warn!(
                    "{}: note {:?} skipped, {}s: {}",
                    instrument.as_str(),
                    note,
                    seconds,
                    e
                ),
            },
            None => warn!("{}: unknown note {:?}", instrument.as_str(), note),
        }
    }

    fn strike(&mut self, instrument: Instrument, note: &str, amplitude: f64) {
        match note_name_to_hz(note) {
            Some(hz) => self.engine.trigger(instrument, hz, amplitude),
            None => warn!("{}: unknown note {:?}", instrument.as_str(), note),
        }
    }

    // ─── Run loop ───────────────────────────────────────────────────────────

    /// Route events until every publisher is gone. Blocks the calling
    /// thread. Soundcheck notes fire on time between events; foreground and
    /// background signals are applied as they arrive.
    pub fn run(&mut self, clock: &SessionClock, signals: Option<Receiver<AudioSignal>>) {
        info!("Orchestra running with score \"{}\"", self.score.name);
        let events = self.events.clone();
        let mut signals = signals.unwrap_or_else(never);

        loop {
            let wait = match self.next_due_us() {
                Some(due) => Duration::from_micros(due.saturating_sub(clock.now_us())),
                None => IDLE_WAIT,
            };

            let mut events_closed = false;
            let mut signals_closed = false;
            select! {
                recv(events) -> msg => match msg {
                    Ok(event) => self.handle(event, clock.now_us()),
                    Err(_) => events_closed = true,
                },
                recv(signals) -> msg => match msg {
                    Ok(signal) => self.handle_signal(signal),
                    Err(_) => signals_closed = true,
                },
                default(wait) => {}
            }
            if events_closed {
                break;
            }
            if signals_closed {
                signals = never();
            }

            self.fire_due(clock.now_us());
        }

        // Signals sent before the last publisher left still apply
        for signal in signals.try_iter() {
            self.handle_signal(signal);
        }
        if !self.pending.is_empty() {
            debug!("Dropping {} pending soundcheck notes", self.pending.len());
            self.pending.clear();
        }
        if let Err(e) = self.engine.stop() {
            warn!("Audio engine failed to stop: {}", e);
        }
        info!("Orchestra shutting down after {} events", self.handled);
    }
}
