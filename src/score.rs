//! Score: the declarative configuration of a pond.
//!
//! A score is loaded and validated as a whole and is never mutated after
//! that. Replacing the active score means building a new one and handing it
//! to `PondSimulation::adapt_to`.
//!
//! All random draws take the random source as a parameter so callers (and
//! tests) decide where randomness comes from.

use crate::notes::parse_note_name;
use crate::types::CollisionRole;
use glam::Vec2;
use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// ─── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScoreError {
    /// Malformed document, missing field, wrong type or unknown field.
    #[error("score document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field}: range is inverted (min {min} > max {max})")]
    InvertedRange {
        field: &'static str,
        min: String,
        max: String,
    },
    #[error("{field}: note list is empty")]
    EmptyNoteList { field: &'static str },
    #[error("{field}: {note:?} is not a note name")]
    InvalidNote { field: &'static str, note: String },
    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },
    #[error("{field}: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: String,
    },
}

// ─── Building blocks ────────────────────────────────────────────────────────

/// Inclusive `[min, max]` range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: PartialOrd + Copy + fmt::Display> ValueRange<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Range element types that can be sampled uniformly.
trait Sampled: PartialOrd + Copy + fmt::Display {
    /// Whether `max - min` is a finite value of this type.
    fn finite_span(min: Self, max: Self) -> bool;
}

impl Sampled for u8 {
    fn finite_span(_: Self, _: Self) -> bool {
        true
    }
}

impl Sampled for u32 {
    fn finite_span(_: Self, _: Self) -> bool {
        true
    }
}

impl Sampled for f32 {
    fn finite_span(min: Self, max: Self) -> bool {
        (max - min).is_finite()
    }
}

impl Sampled for f64 {
    fn finite_span(min: Self, max: Self) -> bool {
        (max - min).is_finite()
    }
}

impl<T: Sampled> ValueRange<T> {
    fn check(&self, field: &'static str) -> Result<(), ScoreError> {
        // A NaN bound fails this comparison too.
        if !(self.min <= self.max) {
            return Err(ScoreError::InvertedRange {
                field,
                min: self.min.to_string(),
                max: self.max.to_string(),
            });
        }
        if !T::finite_span(self.min, self.max) {
            return Err(ScoreError::OutOfRange {
                field,
                detail: format!("span from {} to {} is not finite", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// FM oscillator bank settings for the arrival and departure voices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FmSynth {
    pub carrier_multiplier: f64,
    pub modulating_multiplier: f64,
    pub modulation_index: f64,
    pub vibrato_depth: f64,
    pub vibrato_rate: f64,
}

/// ADSR amplitude envelope. Durations in seconds, sustain as a 0–1 level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AmplitudeEnvelope {
    pub attack_duration: f64,
    pub decay_duration: f64,
    pub sustain_level: f64,
    pub release_duration: f64,
}

/// Sound parameters for a lifecycle voice (arrival or departure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoiceScore {
    pub synth: FmSynth,
    pub envelope: AmplitudeEnvelope,
    /// MIDI velocity, 0–127.
    pub velocity_range: ValueRange<u8>,
    /// Note length in seconds.
    pub duration_range: ValueRange<f64>,
    /// Played round-robin, in order.
    pub note_names: Vec<String>,
}

/// Sound parameters for collisions: one amplitude range and note pool per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollisionScore {
    pub amplitude1_range: ValueRange<f64>,
    pub amplitude2_range: ValueRange<f64>,
    pub note1_names: Vec<String>,
    pub note2_names: Vec<String>,
}

// ─── Score ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Score {
    pub name: String,
    pub arrival: VoiceScore,
    pub departure: VoiceScore,
    pub collision: CollisionScore,
    /// Beats per minute; one spawn attempt per beat.
    pub tempo: f64,
    /// Bounds on simultaneous live bubbles.
    pub bubble_count_range: ValueRange<u32>,
    /// Bubble lifespan in seconds.
    pub bubble_age_range: ValueRange<u32>,
    /// Bubble diameter = shortest surface dimension / divisor.
    pub screen_divisor_range: ValueRange<f32>,
    pub physics_radius_multiplier: f32,
    pub initial_velocity_x_range: ValueRange<f32>,
    pub initial_velocity_y_range: ValueRange<f32>,
}

impl Score {
    /// Build a score from an already-parsed document. Fails closed: any
    /// missing field, inverted range, empty or unparsable note list is an
    /// error and no score is produced.
    pub fn load(document: serde_json::Value) -> Result<Self, ScoreError> {
        let score: Score = serde_json::from_value(document)?;
        score.validate()?;
        info!("Loaded score \"{}\"", score.name);
        Ok(score)
    }

    /// Parse JSON text and load it.
    pub fn from_json_str(text: &str) -> Result<Self, ScoreError> {
        let document: serde_json::Value = serde_json::from_str(text)?;
        Self::load(document)
    }

    /// The document form of this score; `load(to_document())` yields an equal score.
    pub fn to_document(&self) -> Result<serde_json::Value, ScoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Pretty JSON, as shown to someone editing the score by hand.
    pub fn to_json_pretty(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every invariant of the score.
    pub fn validate(&self) -> Result<(), ScoreError> {
        validate_voice(&self.arrival, &ARRIVAL_FIELDS)?;
        validate_voice(&self.departure, &DEPARTURE_FIELDS)?;

        let c = &self.collision;
        c.amplitude1_range.check("collision.amplitude1Range")?;
        c.amplitude2_range.check("collision.amplitude2Range")?;
        if c.amplitude1_range.min < 0.0 || c.amplitude2_range.min < 0.0 {
            return Err(ScoreError::OutOfRange {
                field: "collision",
                detail: "amplitudes must not be negative".into(),
            });
        }
        check_notes(&c.note1_names, "collision.note1Names")?;
        check_notes(&c.note2_names, "collision.note2Names")?;

        if !(self.tempo > 0.0) || !self.tempo.is_finite() {
            return Err(ScoreError::NonPositive { field: "tempo" });
        }

        self.bubble_count_range.check("bubbleCountRange")?;
        if self.bubble_count_range.max == 0 {
            return Err(ScoreError::NonPositive {
                field: "bubbleCountRange.max",
            });
        }

        self.bubble_age_range.check("bubbleAgeRange")?;
        if self.bubble_age_range.min == 0 {
            return Err(ScoreError::NonPositive {
                field: "bubbleAgeRange.min",
            });
        }

        self.screen_divisor_range.check("screenDivisorRange")?;
        if !(self.screen_divisor_range.min > 0.0) {
            return Err(ScoreError::NonPositive {
                field: "screenDivisorRange.min",
            });
        }

        if !(self.physics_radius_multiplier > 0.0) {
            return Err(ScoreError::NonPositive {
                field: "physicsRadiusMultiplier",
            });
        }

        self.initial_velocity_x_range.check("initialVelocityXRange")?;
        self.initial_velocity_y_range.check("initialVelocityYRange")?;
        Ok(())
    }

    // ─── Random draws ───────────────────────────────────────────────────────

    /// Lifespan in whole seconds.
    pub fn random_lifespan<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let r = self.bubble_age_range;
        rng.random_range(r.min..=r.max)
    }

    pub fn random_initial_velocity<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let (x, y) = (self.initial_velocity_x_range, self.initial_velocity_y_range);
        Vec2::new(rng.random_range(x.min..=x.max), rng.random_range(y.min..=y.max))
    }

    pub fn random_screen_divisor<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let r = self.screen_divisor_range;
        rng.random_range(r.min..=r.max)
    }

    pub fn random_arrival_velocity<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        random_velocity(&self.arrival, rng)
    }

    pub fn random_arrival_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        random_duration(&self.arrival, rng)
    }

    pub fn random_departure_velocity<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        random_velocity(&self.departure, rng)
    }

    pub fn random_departure_duration<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        random_duration(&self.departure, rng)
    }

    pub fn random_collision_amplitude<R: Rng + ?Sized>(
        &self,
        role: CollisionRole,
        rng: &mut R,
    ) -> f64 {
        let r = match role {
            CollisionRole::First => self.collision.amplitude1_range,
            CollisionRole::Second => self.collision.amplitude2_range,
        };
        rng.random_range(r.min..=r.max)
    }

    /// Uniform pick from a collision note pool. Used when a bubble is born.
    pub fn random_collision_note<R: Rng + ?Sized>(&self, role: CollisionRole, rng: &mut R) -> &str {
        let pool = self.collision_notes(role);
        &pool[rng.random_range(0..pool.len())]
    }

    pub fn collision_notes(&self, role: CollisionRole) -> &[String] {
        match role {
            CollisionRole::First => &self.collision.note1_names,
            CollisionRole::Second => &self.collision.note2_names,
        }
    }
}

fn random_velocity<R: Rng + ?Sized>(voice: &VoiceScore, rng: &mut R) -> u8 {
    rng.random_range(voice.velocity_range.min..=voice.velocity_range.max)
}

fn random_duration<R: Rng + ?Sized>(voice: &VoiceScore, rng: &mut R) -> f64 {
    rng.random_range(voice.duration_range.min..=voice.duration_range.max)
}

/// Field names reported for one voice's errors.
struct VoiceFields {
    velocity: &'static str,
    duration: &'static str,
    notes: &'static str,
    envelope: &'static str,
}

const ARRIVAL_FIELDS: VoiceFields = VoiceFields {
    velocity: "arrival.velocityRange",
    duration: "arrival.durationRange",
    notes: "arrival.noteNames",
    envelope: "arrival.envelope",
};

const DEPARTURE_FIELDS: VoiceFields = VoiceFields {
    velocity: "departure.velocityRange",
    duration: "departure.durationRange",
    notes: "departure.noteNames",
    envelope: "departure.envelope",
};

fn validate_voice(voice: &VoiceScore, fields: &VoiceFields) -> Result<(), ScoreError> {
    let VoiceFields {
        velocity,
        duration,
        notes,
        envelope,
    } = *fields;

    voice.velocity_range.check(velocity)?;
    if voice.velocity_range.max > 127 {
        return Err(ScoreError::OutOfRange {
            field: velocity,
            detail: format!("MIDI velocity {} exceeds 127", voice.velocity_range.max),
        });
    }

    voice.duration_range.check(duration)?;
    if voice.duration_range.min < 0.0 {
        return Err(ScoreError::OutOfRange {
            field: duration,
            detail: "durations must not be negative".into(),
        });
    }
    if Duration::try_from_secs_f64(voice.duration_range.max).is_err() {
        return Err(ScoreError::OutOfRange {
            field: duration,
            detail: format!("{}s is too long for a note", voice.duration_range.max),
        });
    }

    let e = &voice.envelope;
    let times_ok = [e.attack_duration, e.decay_duration, e.release_duration]
        .iter()
        .all(|t| *t >= 0.0);
    if !times_ok || !(0.0..=1.0).contains(&e.sustain_level) {
        return Err(ScoreError::OutOfRange {
            field: envelope,
            detail: "durations must be >= 0 and sustain within 0..=1".into(),
        });
    }

    check_notes(&voice.note_names, notes)
}

fn check_notes(notes: &[String], field: &'static str) -> Result<(), ScoreError> {
    if notes.is_empty() {
        return Err(ScoreError::EmptyNoteList { field });
    }
    if let Some(bad) = notes.iter().find(|n| parse_note_name(n).is_none()) {
        return Err(ScoreError::InvalidNote {
            field,
            note: bad.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::ThemeCatalog;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn score() -> Score {
        ThemeCatalog::bundled()
            .default_score()
            .cloned()
            .expect("bundled theme")
    }

    fn doc() -> serde_json::Value {
        score().to_document().unwrap()
    }

    fn expect_err(value: serde_json::Value) -> ScoreError {
        match Score::load(value) {
            Ok(s) => panic!("expected an error, loaded {:?}", s.name),
            Err(e) => e,
        }
    }

    #[test]
    fn test_document_roundtrip() {
        let loaded = score();
        let reloaded = Score::load(loaded.to_document().unwrap()).unwrap();
        assert_eq!(reloaded, loaded);

        let text = loaded.to_json_pretty().unwrap();
        assert_eq!(Score::from_json_str(&text).unwrap(), loaded);
    }

    #[test]
    fn test_missing_field_fails() {
        let mut d = doc();
        d.as_object_mut().unwrap().remove("tempo");
        assert!(matches!(expect_err(d), ScoreError::Parse(_)));

        let mut d = doc();
        d["arrival"].as_object_mut().unwrap().remove("envelope");
        assert!(matches!(expect_err(d), ScoreError::Parse(_)));
    }

    #[test]
    fn test_unknown_field_fails() {
        let mut d = doc();
        d["imageNames"] = serde_json::json!(["dot-1"]);
        assert!(matches!(expect_err(d), ScoreError::Parse(_)));
    }

    #[test]
    fn test_inverted_ranges_fail() {
        let cases: [(&str, &str, serde_json::Value); 6] = [
            ("bubbleCountRange", "", serde_json::json!({"min": 9, "max": 3})),
            ("bubbleAgeRange", "", serde_json::json!({"min": 20, "max": 10})),
            ("screenDivisorRange", "", serde_json::json!({"min": 6.0, "max": 4.0})),
            ("initialVelocityXRange", "", serde_json::json!({"min": 1.0, "max": -1.0})),
            ("arrival", "durationRange", serde_json::json!({"min": 2.0, "max": 1.0})),
            ("collision", "amplitude2Range", serde_json::json!({"min": 0.6, "max": 0.2})),
        ];
        for (outer, inner, range) in cases {
            let mut d = doc();
            if inner.is_empty() {
                d[outer] = range;
            } else {
                d[outer][inner] = range;
            }
            let err = expect_err(d);
            assert!(
                matches!(err, ScoreError::InvertedRange { .. }),
                "{outer}.{inner}: got {err}"
            );
        }
    }

    #[test]
    fn test_empty_note_lists_fail() {
        for (outer, inner) in [
            ("arrival", "noteNames"),
            ("departure", "noteNames"),
            ("collision", "note1Names"),
            ("collision", "note2Names"),
        ] {
            let mut d = doc();
            d[outer][inner] = serde_json::json!([]);
            assert!(matches!(expect_err(d), ScoreError::EmptyNoteList { .. }));
        }
    }

    #[test]
    fn test_bad_note_name_fails() {
        let mut d = doc();
        d["departure"]["noteNames"] = serde_json::json!(["C4", "Q7"]);
        match expect_err(d) {
            ScoreError::InvalidNote { note, .. } => assert_eq!(note, "Q7"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_positive_values_fail() {
        let mut d = doc();
        d["tempo"] = serde_json::json!(0.0);
        assert!(matches!(expect_err(d), ScoreError::NonPositive { field: "tempo" }));

        let mut d = doc();
        d["bubbleAgeRange"] = serde_json::json!({"min": 0, "max": 4});
        assert!(matches!(expect_err(d), ScoreError::NonPositive { .. }));

        let mut d = doc();
        d["physicsRadiusMultiplier"] = serde_json::json!(-0.5);
        assert!(matches!(expect_err(d), ScoreError::NonPositive { .. }));
    }

    #[test]
    fn test_extreme_octave_is_an_invalid_note() {
        let mut d = doc();
        d["arrival"]["noteNames"] = serde_json::json!(["C4", "C200000000"]);
        match expect_err(d) {
            ScoreError::InvalidNote { field, note } => {
                assert_eq!(field, "arrival.noteNames");
                assert_eq!(note, "C200000000");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unrepresentable_duration_fails() {
        let mut d = doc();
        d["arrival"]["durationRange"] = serde_json::json!({"min": 1e20, "max": 1e20});
        assert!(matches!(
            expect_err(d),
            ScoreError::OutOfRange {
                field: "arrival.durationRange",
                ..
            }
        ));

        let mut d = doc();
        d["departure"]["durationRange"] = serde_json::json!({"min": 0.0, "max": 1.7e308});
        assert!(matches!(expect_err(d), ScoreError::OutOfRange { .. }));
    }

    #[test]
    fn test_range_with_infinite_span_fails() {
        let mut d = doc();
        d["initialVelocityXRange"] = serde_json::json!({"min": -3e38, "max": 3e38});
        assert!(matches!(
            expect_err(d),
            ScoreError::OutOfRange {
                field: "initialVelocityXRange",
                ..
            }
        ));

        let mut d = doc();
        d["collision"]["amplitude1Range"] = serde_json::json!({"min": -1.5e308, "max": 1.5e308});
        assert!(matches!(expect_err(d), ScoreError::OutOfRange { .. }));
    }

    #[test]
    fn test_velocity_above_midi_range_fails() {
        let mut d = doc();
        d["arrival"]["velocityRange"] = serde_json::json!({"min": 20, "max": 200});
        assert!(matches!(expect_err(d), ScoreError::OutOfRange { .. }));
    }

    #[test]
    fn test_random_draws_stay_in_range() {
        let s = score();
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..500 {
            assert!(s.bubble_age_range.contains(s.random_lifespan(&mut rng)));
            let v = s.random_initial_velocity(&mut rng);
            assert!(s.initial_velocity_x_range.contains(v.x));
            assert!(s.initial_velocity_y_range.contains(v.y));
            assert!(s.screen_divisor_range.contains(s.random_screen_divisor(&mut rng)));
            assert!(s.arrival.velocity_range.contains(s.random_arrival_velocity(&mut rng)));
            assert!(s.arrival.duration_range.contains(s.random_arrival_duration(&mut rng)));
            assert!(s.departure.velocity_range.contains(s.random_departure_velocity(&mut rng)));
            assert!(s.departure.duration_range.contains(s.random_departure_duration(&mut rng)));
            let a1 = s.random_collision_amplitude(CollisionRole::First, &mut rng);
            let a2 = s.random_collision_amplitude(CollisionRole::Second, &mut rng);
            assert!(s.collision.amplitude1_range.contains(a1));
            assert!(s.collision.amplitude2_range.contains(a2));
            let n = s.random_collision_note(CollisionRole::Second, &mut rng);
            assert!(s.collision.note2_names.iter().any(|x| x == n));
        }
    }

    #[test]
    fn test_degenerate_range_draws_its_value() {
        let mut s = score();
        s.bubble_age_range = ValueRange::new(5, 5);
        s.screen_divisor_range = ValueRange::new(4.0, 4.0);
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(s.random_lifespan(&mut rng), 5);
        assert_eq!(s.random_screen_divisor(&mut rng), 4.0);
    }

    #[test]
    fn test_draws_are_reproducible_from_seed() {
        let s = score();
        let mut a = Pcg32::seed_from_u64(99);
        let mut b = Pcg32::seed_from_u64(99);
        for _ in 0..20 {
            assert_eq!(s.random_lifespan(&mut a), s.random_lifespan(&mut b));
        }
    }

    // ─── Properties ─────────────────────────────────────────────────────────

    const RANGE_FIELDS: [&[&str]; 11] = [
        &["arrival", "velocityRange"],
        &["arrival", "durationRange"],
        &["departure", "velocityRange"],
        &["departure", "durationRange"],
        &["collision", "amplitude1Range"],
        &["collision", "amplitude2Range"],
        &["bubbleCountRange"],
        &["bubbleAgeRange"],
        &["screenDivisorRange"],
        &["initialVelocityXRange"],
        &["initialVelocityYRange"],
    ];

    const NOTE_FIELDS: [&[&str]; 4] = [
        &["arrival", "noteNames"],
        &["departure", "noteNames"],
        &["collision", "note1Names"],
        &["collision", "note2Names"],
    ];

    fn field<'a>(d: &'a mut serde_json::Value, path: &[&str]) -> &'a mut serde_json::Value {
        path.iter().fold(d, |v, key| &mut v[*key])
    }

    fn note() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["C3", "G3", "D4", "A4", "F#4", "Bb2", "E5", "C-1", "G9"])
            .prop_map(String::from)
    }

    prop_compose! {
        fn voice()(
            velocity in (0u8..100, 0u8..28),
            duration in (0u32..40, 0u32..40),
            notes in prop::collection::vec(note(), 1..8),
        ) -> VoiceScore {
            VoiceScore {
                velocity_range: ValueRange::new(velocity.0, velocity.0 + velocity.1),
                duration_range: ValueRange::new(
                    duration.0 as f64 * 0.25,
                    (duration.0 + duration.1) as f64 * 0.25,
                ),
                note_names: notes,
                ..score().arrival
            }
        }
    }

    prop_compose! {
        fn valid_score()(
            name in "[A-Za-z ]{1,16}",
            arrival in voice(),
            departure in voice(),
            notes in (
                prop::collection::vec(note(), 1..6),
                prop::collection::vec(note(), 1..6),
            ),
            amplitudes in (0u32..8, 0u32..8, 0u32..8, 0u32..8),
            tempo in 1u32..2000,
            counts in (0u32..10, 1u32..10, 1u32..30, 0u32..30),
            shape in (1u32..40, 0u32..40, -200i32..200, -200i32..200, 0i32..100),
        ) -> Score {
            let (a1, g1, a2, g2) = amplitudes;
            let (count_min, count_gap, age_min, age_gap) = counts;
            let (div, div_gap, vx, vy, spread) = shape;
            Score {
                name,
                arrival,
                departure,
                collision: CollisionScore {
                    amplitude1_range: ValueRange::new(a1 as f64 * 0.125, (a1 + g1) as f64 * 0.125),
                    amplitude2_range: ValueRange::new(a2 as f64 * 0.125, (a2 + g2) as f64 * 0.125),
                    note1_names: notes.0,
                    note2_names: notes.1,
                },
                tempo: tempo as f64 * 0.5,
                bubble_count_range: ValueRange::new(count_min, count_min + count_gap),
                bubble_age_range: ValueRange::new(age_min, age_min + age_gap),
                screen_divisor_range: ValueRange::new(div as f32 * 0.5, (div + div_gap) as f32 * 0.5),
                initial_velocity_x_range: ValueRange::new(vx as f32, (vx + spread) as f32),
                initial_velocity_y_range: ValueRange::new(vy as f32, (vy + spread) as f32),
                ..score()
            }
        }
    }

    proptest! {
        #[test]
        fn prop_any_inverted_range_fails(
            which in 0..RANGE_FIELDS.len(),
            low in 0u32..100,
            gap in 1u32..28,
        ) {
            let path = RANGE_FIELDS[which];
            let mut d = doc();
            *field(&mut d, path) = serde_json::json!({"min": low + gap, "max": low});
            let err = expect_err(d);
            prop_assert!(
                matches!(err, ScoreError::InvertedRange { .. }),
                "{}: got {}", path.join("."), err
            );
        }

        #[test]
        fn prop_any_empty_note_list_fails(which in 0..NOTE_FIELDS.len()) {
            let path = NOTE_FIELDS[which];
            let mut d = doc();
            *field(&mut d, path) = serde_json::json!([]);
            let err = expect_err(d);
            prop_assert!(
                matches!(err, ScoreError::EmptyNoteList { .. }),
                "{}: got {}", path.join("."), err
            );
        }

        #[test]
        fn prop_valid_scores_roundtrip(s in valid_score()) {
            prop_assert!(s.validate().is_ok());
            let reloaded = Score::load(s.to_document().unwrap()).unwrap();
            prop_assert_eq!(&reloaded, &s);
            let text = s.to_json_pretty().unwrap();
            prop_assert_eq!(&Score::from_json_str(&text).unwrap(), &s);
        }
    }
}
