//! Typed event channel between the pond and the orchestra.
//!
//! Publishers hold an `EventPublisher`; the orchestra holds the single
//! `Receiver`. The pond publishes `Arrival`, `Departure`,
//! `SoundcheckRequested` and `ScoreReplaced`; the contact adapter publishes
//! `Collision`.

use crate::score::Score;
use crate::types::{BubbleId, SoundSource};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{trace, warn};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum PondEvent {
    /// A bubble started fading in.
    Arrival { bubble: BubbleId },
    /// A bubble reached the end of its life and started fading out.
    Departure { bubble: BubbleId },
    /// A bubble touched something; carries that bubble's own note pair.
    Collision { note_a: String, note_b: String },
    /// Play every note of a pool, spaced out in time.
    SoundcheckRequested { source: SoundSource },
    /// The active score was swapped.
    ScoreReplaced { score: Arc<Score> },
}

/// Sending half of the event channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: Sender<PondEvent>,
}

impl EventPublisher {
    pub fn new(tx: Sender<PondEvent>) -> Self {
        Self { tx }
    }

    /// Publish without blocking the tick. A full or closed channel drops
    /// the event and logs it; the simulation keeps running.
    pub fn publish(&self, event: PondEvent) {
        trace!("publish {:?}", event);
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => warn!("Event queue full; dropping {:?}", ev),
            Err(TrySendError::Disconnected(ev)) => trace!("No subscriber for {:?}", ev),
        }
    }
}

/// Create the channel: one publisher (clone it for each publishing side)
/// and the receiver for the orchestra.
pub fn event_channel(capacity: usize) -> (EventPublisher, Receiver<PondEvent>) {
    let (tx, rx) = bounded(capacity);
    (EventPublisher::new(tx), rx)
}
