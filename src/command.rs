//! `Command` and `CommandQueue` (§4.E): the SPSC bridge between the control
//! thread and the audio thread.
//!
//! Both directions are modeled as `crossbeam_channel::bounded` channels
//! (grounded on the reference workspace's synth-engine sibling's equivalent
//! SPSC wiring), used strictly single-producer/single-consumer even though
//! the channel type itself is MPMC-capable. `try_send`/`try_recv` give the
//! non-blocking semantics the audio thread requires without a hand-rolled
//! ring buffer.

use crate::port::ParamId;
use crate::unit::UnitId;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Queue capacity (§4.E: "a compile-time constant, e.g. 1024").
pub const QUEUE_CAPACITY: usize = 1024;

/// Per-tick drain bound (§4.E: "e.g. 64") capping audio-thread worst case.
pub const DRAIN_BOUND: usize = 64;

/// The control→audio command taxonomy of §4.E.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ModifyParam { unit: UnitId, param: ParamId, value: f64 },
    ModifyParamNorm { unit: UnitId, param: ParamId, norm: f64 },
    Connect { src: UnitId, src_out: u32, dst: UnitId, dst_in: u32 },
    Disconnect { dst: UnitId, dst_in: u32 },
    AddUnit { class_id: u32 },
    DeleteUnit { unit: UnitId },
    SetMaxVoices { n: usize },
    NoteOn { note: u8, vel: u8 },
    NoteOff { note: u8, vel: u8 },
    SetTempo { bpm: f64 },
    SetFs { sample_rate: f64 },
    Cc { controller: u8, value: f64 },
    PitchBend { value: f64 },
}

/// A notification the audio thread pushes back to the control/GUI thread
/// (audio→control direction of §4.E), e.g. to report a voice steal or a
/// dropped command.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    VoiceStolen { unit: UnitId },
    CommandDropped,
}

/// Two independent SPSC channels: commands flow control→audio, notifications
/// flow audio→control. Bounded so a stalled consumer cannot grow unbounded
/// memory; the producer observes `QueueFull`/drops instead.
pub struct CommandQueue {
    cmd_tx: Sender<Command>,
    cmd_rx: Receiver<Command>,
    notif_tx: Sender<Notification>,
    notif_rx: Receiver<Notification>,
}

impl CommandQueue {
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = bounded(QUEUE_CAPACITY);
        let (notif_tx, notif_rx) = bounded(QUEUE_CAPACITY);
        Self { cmd_tx, cmd_rx, notif_tx, notif_rx }
    }

    /// Called from the control thread. Non-blocking; a full queue is
    /// reported synchronously to the caller (§5 "Cancellation & timeouts").
    pub fn submit(&self, cmd: Command) -> Result<(), Command> {
        match self.cmd_tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) | Err(TrySendError::Disconnected(cmd)) => Err(cmd),
        }
    }

    /// Drains up to [`DRAIN_BOUND`] queued commands, in enqueue order. Called
    /// once per buffer from the audio thread before the voice tick loop.
    pub fn drain(&self) -> alloc::vec::Vec<Command> {
        let mut out = alloc::vec::Vec::with_capacity(DRAIN_BOUND);
        for _ in 0..DRAIN_BOUND {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => out.push(cmd),
                Err(_) => break,
            }
        }
        out
    }

    /// Called from the audio thread to notify the GUI. Best-effort: a full
    /// notification queue silently drops the newest notification rather than
    /// blocking the real-time path.
    pub fn notify(&self, notif: Notification) {
        let _ = self.notif_tx.try_send(notif);
    }

    /// Called from the GUI/control thread to poll for notifications.
    pub fn poll_notifications(&self) -> alloc::vec::Vec<Notification> {
        let mut out = alloc::vec::Vec::new();
        while let Ok(n) = self.notif_rx.try_recv() {
            out.push(n);
        }
        out
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_drain_preserves_order() {
        let q = CommandQueue::new();
        q.submit(Command::SetTempo { bpm: 120.0 }).unwrap();
        q.submit(Command::SetTempo { bpm: 140.0 }).unwrap();
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], Command::SetTempo { bpm: 120.0 });
        assert_eq!(drained[1], Command::SetTempo { bpm: 140.0 });
    }

    #[test]
    fn drain_is_bounded_per_call() {
        let q = CommandQueue::new();
        for _ in 0..(DRAIN_BOUND + 10) {
            q.submit(Command::SetTempo { bpm: 100.0 }).unwrap();
        }
        let first = q.drain();
        assert_eq!(first.len(), DRAIN_BOUND);
        let second = q.drain();
        assert_eq!(second.len(), 10);
    }

    #[test]
    fn full_queue_returns_command_to_caller() {
        let q = CommandQueue::new();
        for _ in 0..QUEUE_CAPACITY {
            q.submit(Command::SetTempo { bpm: 100.0 }).unwrap();
        }
        let result = q.submit(Command::SetTempo { bpm: 200.0 });
        assert!(result.is_err());
    }

    #[test]
    fn notifications_round_trip() {
        let q = CommandQueue::new();
        let unit = crate::unit::UnitId::default();
        q.notify(Notification::VoiceStolen { unit });
        let polled = q.poll_notifications();
        assert_eq!(polled, alloc::vec![Notification::VoiceStolen { unit }]);
    }
}
