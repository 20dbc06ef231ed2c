//! Identification of the messages exchanged between participants

use std::fmt;

/// Participant that gathers and redistributes tile-diagonal results
pub const COORDINATOR: usize = 0;

/// Part of the per-tile-diagonal exchange that a message belongs to
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Phase {
    /// A worker sends the cells it computed to the coordinator
    Gather = 0,

    /// The coordinator sends every computed cell of a tile-diagonal to a worker
    Broadcast = 1,
}

/// Identifies one message of a run
///
/// Envelopes are ordered by step, then phase, then participant, which is the
/// order in which the messages of a run are produced. The integer [`tag()`]
/// encoding preserves this order and is injective as long as `participant`
/// is smaller than the number of participants.
///
/// [`tag()`]: Envelope::tag()
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Envelope {
    /// Tile-diagonal index
    pub step: usize,

    /// Gather or broadcast
    pub phase: Phase,

    /// Worker that sent the message (gather) or receives it (broadcast)
    pub participant: usize,
}
//
impl Envelope {
    /// Participant that must receive this message
    pub fn destination(&self) -> usize {
        match self.phase {
            Phase::Gather => COORDINATOR,
            Phase::Broadcast => self.participant,
        }
    }

    /// Participant that must send this message
    pub fn source(&self) -> usize {
        match self.phase {
            Phase::Gather => self.participant,
            Phase::Broadcast => COORDINATOR,
        }
    }

    /// Integer tag, `(2 * step + phase) * num_participants + participant`
    pub fn tag(&self, num_participants: usize) -> u64 {
        debug_assert!(self.participant < num_participants);
        let phase_idx = (2 * self.step + self.phase as usize) as u64;
        phase_idx * num_participants as u64 + self.participant as u64
    }

    /// Decode an integer tag
    pub fn from_tag(tag: u64, num_participants: usize) -> Self {
        let num_participants = num_participants as u64;
        let phase_idx = tag / num_participants;
        Self {
            step: (phase_idx / 2) as usize,
            phase: if phase_idx % 2 == 0 {
                Phase::Gather
            } else {
                Phase::Broadcast
            },
            participant: (tag % num_participants) as usize,
        }
    }
}
//
impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} #{} of participant {}",
            self.phase, self.step, self.participant
        )
    }
}
