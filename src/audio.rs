//! Audio engine seam.
//!
//! The orchestra talks to sound through `AudioEngine` only. Calls are
//! fire-and-forget: `play` carries its own duration and the engine is
//! responsible for the note-off. Only `start` and `stop` report failure,
//! and the caller just logs it.

use crate::notes::hz_to_midi;
use crate::score::{AmplitudeEnvelope, FmSynth};
use crate::types::Instrument;
use log::{debug, info};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio backend: {0}")]
    Backend(String),
    #[error("audio I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("audio encode: {0}")]
    Encode(String),
}

pub trait AudioEngine: Send {
    /// Bring the backend up (foreground).
    fn start(&mut self) -> Result<(), AudioError>;
    /// Shut the backend down (background).
    fn stop(&mut self) -> Result<(), AudioError>;
    /// Play a MIDI note that stops by itself after `duration`.
    fn play(&mut self, instrument: Instrument, midi_note: u8, velocity: u8, duration: Duration);
    /// Strike a percussive voice.
    fn trigger(&mut self, instrument: Instrument, frequency_hz: f64, amplitude: f64);
    /// Silence everything sounding on `instrument`.
    fn stop_all(&mut self, instrument: Instrument);
    fn configure(&mut self, instrument: Instrument, synth: &FmSynth, envelope: &AmplitudeEnvelope);
}

// ─── Log engine ─────────────────────────────────────────────────────────────

/// Headless engine: every call becomes a log line.
#[derive(Debug, Default)]
pub struct LogAudioEngine {
    running: bool,
}

impl LogAudioEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioEngine for LogAudioEngine {
    fn start(&mut self) -> Result<(), AudioError> {
        self.running = true;
        info!("Audio (log) started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running = false;
        info!("Audio (log) stopped");
        Ok(())
    }

    fn play(&mut self, instrument: Instrument, midi_note: u8, velocity: u8, duration: Duration) {
        info!(
            "♪ {:<9} note {:>3} vel {:>3} for {:.2}s{}",
            instrument.as_str(),
            midi_note,
            velocity,
            duration.as_secs_f64(),
            if self.running { "" } else { " (stopped)" }
        );
    }

    fn trigger(&mut self, instrument: Instrument, frequency_hz: f64, amplitude: f64) {
        info!(
            "♪ {:<9} {:>8.2} Hz (MIDI {:.1}) amp {:.2}{}",
            instrument.as_str(),
            frequency_hz,
            hz_to_midi(frequency_hz),
            amplitude,
            if self.running { "" } else { " (stopped)" }
        );
    }

    fn stop_all(&mut self, instrument: Instrument) {
        debug!("stop all on {}", instrument.as_str());
    }

    fn configure(&mut self, instrument: Instrument, synth: &FmSynth, envelope: &AmplitudeEnvelope) {
        debug!(
            "configure {}: carrier ×{} mod ×{} index {} / A{} D{} S{} R{}",
            instrument.as_str(),
            synth.carrier_multiplier,
            synth.modulating_multiplier,
            synth.modulation_index,
            envelope.attack_duration,
            envelope.decay_duration,
            envelope.sustain_level,
            envelope.release_duration
        );
    }
}

// ─── Recording engine ───────────────────────────────────────────────────────

/// One call made against a `RecordingAudioEngine`.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Start,
    Stop,
    Play {
        instrument: Instrument,
        midi_note: u8,
        velocity: u8,
        duration: Duration,
    },
    Trigger {
        instrument: Instrument,
        frequency_hz: f64,
        amplitude: f64,
    },
    StopAll(Instrument),
    Configure {
        instrument: Instrument,
        synth: FmSynth,
        envelope: AmplitudeEnvelope,
    },
}

/// Keeps every call in a shared log. Clone it before handing it to the
/// orchestra and read the log from the clone.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudioEngine {
    calls: Arc<Mutex<Vec<AudioCall>>>,
    /// Make `start` fail, to exercise the log-and-continue path.
    pub fail_start: bool,
}

impl RecordingAudioEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: AudioCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl AudioEngine for RecordingAudioEngine {
    fn start(&mut self) -> Result<(), AudioError> {
        self.record(AudioCall::Start);
        if self.fail_start {
            return Err(AudioError::Backend("session unavailable".into()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.record(AudioCall::Stop);
        Ok(())
    }

    fn play(&mut self, instrument: Instrument, midi_note: u8, velocity: u8, duration: Duration) {
        self.record(AudioCall::Play {
            instrument,
            midi_note,
            velocity,
            duration,
        });
    }

    fn trigger(&mut self, instrument: Instrument, frequency_hz: f64, amplitude: f64) {
        self.record(AudioCall::Trigger {
            instrument,
            frequency_hz,
            amplitude,
        });
    }

    fn stop_all(&mut self, instrument: Instrument) {
        self.record(AudioCall::StopAll(instrument));
    }

    fn configure(&mut self, instrument: Instrument, synth: &FmSynth, envelope: &AmplitudeEnvelope) {
        self.record(AudioCall::Configure {
            instrument,
            synth: *synth,
            envelope: *envelope,
        });
    }
}

// ─── OSC engine ─────────────────────────────────────────────────────────────

#[cfg(feature = "osc")]
pub use osc::OscAudioEngine;

#[cfg(feature = "osc")]
mod osc {
    use super::*;
    use log::warn;
    use rosc::{OscMessage, OscPacket, OscType};
    use std::net::UdpSocket;

    /// Sends every call to an external synth as OSC over UDP:
    ///
    /// - `/pond/<instrument>/play  i:note i:velocity f:seconds`
    /// - `/pond/<instrument>/trigger  f:hz f:amplitude`
    /// - `/pond/<instrument>/stop_all`
    /// - `/pond/<instrument>/configure  f×5 synth, f×4 envelope`
    /// - `/pond/start`, `/pond/stop`
    pub struct OscAudioEngine {
        target: String,
        socket: Option<UdpSocket>,
    }

    impl OscAudioEngine {
        pub fn new(target: impl Into<String>) -> Self {
            Self {
                target: target.into(),
                socket: None,
            }
        }

        pub fn target(&self) -> &str {
            &self.target
        }

        fn send(&self, addr: &str, args: Vec<OscType>) -> Result<(), AudioError> {
            let Some(socket) = &self.socket else {
                debug!("OSC {} dropped: engine stopped", addr);
                return Ok(());
            };
            let msg = OscPacket::Message(OscMessage {
                addr: addr.to_string(),
                args,
            });
            let buf = rosc::encoder::encode(&msg).map_err(|e| AudioError::Encode(e.to_string()))?;
            socket.send_to(&buf, &self.target)?;
            Ok(())
        }

        fn send_logged(&self, addr: &str, args: Vec<OscType>) {
            if let Err(e) = self.send(addr, args) {
                debug!("OSC send error on {}: {}", addr, e);
            }
        }
    }

    impl AudioEngine for OscAudioEngine {
        fn start(&mut self) -> Result<(), AudioError> {
            if self.socket.is_none() {
                self.socket = Some(UdpSocket::bind("0.0.0.0:0")?);
                info!("OSC audio → {}", self.target);
            }
            self.send("/pond/start", vec![])
        }

        fn stop(&mut self) -> Result<(), AudioError> {
            let result = self.send("/pond/stop", vec![]);
            if let Err(e) = &result {
                warn!("OSC stop message failed: {}", e);
            }
            self.socket = None;
            result
        }

        fn play(&mut self, instrument: Instrument, midi_note: u8, velocity: u8, duration: Duration) {
            self.send_logged(
                &format!("/pond/{}/play", instrument.as_str()),
                vec![
                    OscType::Int(midi_note as i32),
                    OscType::Int(velocity as i32),
                    OscType::Float(duration.as_secs_f32()),
                ],
            );
        }

        fn trigger(&mut self, instrument: Instrument, frequency_hz: f64, amplitude: f64) {
            self.send_logged(
                &format!("/pond/{}/trigger", instrument.as_str()),
                vec![
                    OscType::Float(frequency_hz as f32),
                    OscType::Float(amplitude as f32),
                ],
            );
        }

        fn stop_all(&mut self, instrument: Instrument) {
            self.send_logged(&format!("/pond/{}/stop_all", instrument.as_str()), vec![]);
        }

        fn configure(&mut self, instrument: Instrument, synth: &FmSynth, envelope: &AmplitudeEnvelope) {
            let values = [
                synth.carrier_multiplier,
                synth.modulating_multiplier,
                synth.modulation_index,
                synth.vibrato_depth,
                synth.vibrato_rate,
                envelope.attack_duration,
                envelope.decay_duration,
                envelope.sustain_level,
                envelope.release_duration,
            ];
            self.send_logged(
                &format!("/pond/{}/configure", instrument.as_str()),
                values.iter().map(|&v| OscType::Float(v as f32)).collect(),
            );
        }
    }

}
