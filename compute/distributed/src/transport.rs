//! Point-to-point message passing between participants

use crate::{
    envelope::{Envelope, COORDINATOR},
    Error,
};
use crossbeam_channel::{select, Receiver, Sender};
use data::Precision;
use log::{trace, warn};
use std::{collections::HashMap, mem, num::NonZeroUsize};

/// Tagged, fixed-length message passing between participants
///
/// Messages between two participants may arrive in any order, and receivers
/// pick them by envelope. The receiver always knows how many values a message
/// should contain, and a mismatch is reported as a protocol error.
pub trait Transport {
    /// Identifier of the local participant
    fn participant(&self) -> usize;

    /// Total number of participants
    fn num_participants(&self) -> usize;

    /// Send a message to [`Envelope::destination()`]
    fn send(&mut self, envelope: Envelope, payload: Vec<Precision>) -> Result<(), Error>;

    /// Wait for the message with a certain envelope
    fn recv(&mut self, envelope: Envelope, expected_len: usize) -> Result<Vec<Precision>, Error>;
}

/// Tagged payload, as it travels through a mailbox
#[derive(Debug)]
struct Message {
    tag: u64,
    payload: Vec<Precision>,
}

/// Channels towards one peer
#[derive(Debug)]
struct Peer {
    /// Mailbox of the peer, possibly bounded
    mailbox: Sender<Message>,

    /// Where to announce that we stopped before the end of the run
    ///
    /// This channel is unbounded, so that hanging up never blocks, even when
    /// the peer's mailbox is full and nobody is draining it.
    hangups: Sender<usize>,
}

/// In-process [`Transport`] built on crossbeam channels
///
/// Participants are connected in a star around the coordinator, which is the
/// only shape of communication that the wavefront protocol needs. Each
/// participant owns one mailbox. Messages that arrive before they are needed
/// are set aside until they are asked for.
///
/// A transport that is dropped without having been [closed](Self::close)
/// notifies its peers, so that nobody waits forever for a participant that
/// died or gave up.
#[derive(Debug)]
pub struct ChannelTransport {
    /// Identifier of the local participant
    participant: usize,

    /// Total number of participants
    num_participants: usize,

    /// Incoming messages
    mailbox: Receiver<Message>,

    /// Identifiers of the peers that gave up
    hangups: Receiver<usize>,

    /// Peers that this participant talks to
    peers: HashMap<usize, Peer>,

    /// Messages that arrived before they were needed, by tag
    early: HashMap<u64, Vec<Precision>>,

    /// Truth that this participant ran to completion
    closed: bool,
}
//
impl ChannelTransport {
    /// Connect a set of participants
    ///
    /// Each mailbox is bounded to `capacity` messages if specified, otherwise
    /// mailboxes are unbounded.
    pub fn network(num_participants: NonZeroUsize, capacity: Option<NonZeroUsize>) -> Vec<Self> {
        let num_participants = num_participants.get();
        let (mailbox_senders, mailboxes): (Vec<_>, Vec<_>) = (0..num_participants)
            .map(|_| match capacity {
                Some(capacity) => crossbeam_channel::bounded(capacity.get()),
                None => crossbeam_channel::unbounded(),
            })
            .unzip();
        let (hangup_senders, hangups): (Vec<_>, Vec<_>) = (0..num_participants)
            .map(|_| crossbeam_channel::unbounded())
            .unzip();
        let peer = |id: usize| Peer {
            mailbox: mailbox_senders[id].clone(),
            hangups: hangup_senders[id].clone(),
        };
        mailboxes
            .into_iter()
            .zip(hangups)
            .enumerate()
            .map(|(participant, (mailbox, hangups))| {
                let peers = if participant == COORDINATOR {
                    (1..num_participants).map(|id| (id, peer(id))).collect()
                } else {
                    HashMap::from([(COORDINATOR, peer(COORDINATOR))])
                };
                Self {
                    participant,
                    num_participants,
                    mailbox,
                    hangups,
                    peers,
                    early: HashMap::new(),
                    closed: false,
                }
            })
            .collect()
    }

    /// Mark the run as successfully completed and disconnect
    pub fn close(mut self) {
        self.closed = true;
        if !self.early.is_empty() {
            warn!(
                "Participant {} leaves with {} unclaimed message(s)",
                self.participant,
                self.early.len()
            );
        }
    }

    /// Wait for the next incoming message, or for a peer to hang up
    fn next_message(&mut self, source: usize) -> Result<Message, Error> {
        loop {
            let hangup = select! {
                recv(self.mailbox) -> message => {
                    return message.map_err(|_| Error::Disconnected { participant: source });
                }
                recv(self.hangups) -> hangup => hangup,
            };
            match hangup {
                Ok(participant) => return Err(Error::Disconnected { participant }),
                // All peers are gone, but they may have left messages behind
                Err(_) => self.hangups = crossbeam_channel::never(),
            }
        }
    }
}
//
impl Transport for ChannelTransport {
    fn participant(&self) -> usize {
        self.participant
    }

    fn num_participants(&self) -> usize {
        self.num_participants
    }

    fn send(&mut self, envelope: Envelope, payload: Vec<Precision>) -> Result<(), Error> {
        let destination = envelope.destination();
        let peer = self
            .peers
            .get(&destination)
            .ok_or(Error::Unroutable(envelope))?;
        trace!(
            "Participant {} sends {envelope} ({} values)",
            self.participant,
            payload.len()
        );
        let tag = envelope.tag(self.num_participants);
        peer.mailbox
            .send(Message { tag, payload })
            .map_err(|_| Error::Disconnected {
                participant: destination,
            })
    }

    fn recv(&mut self, envelope: Envelope, expected_len: usize) -> Result<Vec<Precision>, Error> {
        let expected_tag = envelope.tag(self.num_participants);
        let payload = match self.early.remove(&expected_tag) {
            Some(payload) => payload,
            None => loop {
                let Message { tag, payload } = self.next_message(envelope.source())?;
                if tag == expected_tag {
                    break payload;
                }
                trace!(
                    "Participant {} sets aside early {}",
                    self.participant,
                    Envelope::from_tag(tag, self.num_participants)
                );
                if self.early.insert(tag, payload).is_some() {
                    return Err(Error::Duplicate(Envelope::from_tag(
                        tag,
                        self.num_participants,
                    )));
                }
            },
        };
        trace!(
            "Participant {} received {envelope} ({} values)",
            self.participant,
            payload.len()
        );
        if payload.len() != expected_len {
            return Err(Error::Protocol {
                envelope,
                expected: expected_len,
                actual: payload.len(),
            });
        }
        Ok(payload)
    }
}
//
impl Drop for ChannelTransport {
    fn drop(&mut self) {
        // Peers that are blocked sending to us must not keep us from leaving
        drop(mem::replace(&mut self.mailbox, crossbeam_channel::never()));
        if !self.closed {
            for peer in self.peers.values() {
                // Peers that are already gone do not need to be told
                let _ = peer.hangups.send(self.participant);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Phase;

    fn network(num_participants: usize) -> Vec<ChannelTransport> {
        ChannelTransport::network(NonZeroUsize::new(num_participants).unwrap(), None)
    }

    fn bounded_network(num_participants: usize, capacity: usize) -> Vec<ChannelTransport> {
        ChannelTransport::network(
            NonZeroUsize::new(num_participants).unwrap(),
            NonZeroUsize::new(capacity),
        )
    }

    fn gather(step: usize, participant: usize) -> Envelope {
        Envelope {
            step,
            phase: Phase::Gather,
            participant,
        }
    }

    #[test]
    fn out_of_order_delivery() {
        let mut network = network(3);
        let mut second = network.pop().unwrap();
        let mut first = network.pop().unwrap();
        let mut coordinator = network.pop().unwrap();

        second.send(gather(0, 2), vec![2.0; 2]).unwrap();
        first.send(gather(1, 1), vec![1.5]).unwrap();
        first.send(gather(0, 1), vec![1.0; 3]).unwrap();

        assert_eq!(coordinator.recv(gather(0, 1), 3).unwrap(), vec![1.0; 3]);
        assert_eq!(coordinator.recv(gather(0, 2), 2).unwrap(), vec![2.0; 2]);
        assert_eq!(coordinator.recv(gather(1, 1), 1).unwrap(), vec![1.5]);
        for transport in [coordinator, first, second] {
            transport.close();
        }
    }

    #[test]
    fn size_mismatch() {
        let mut network = network(2);
        let mut worker = network.pop().unwrap();
        let mut coordinator = network.pop().unwrap();
        worker.send(gather(4, 1), vec![0.0; 5]).unwrap();
        match coordinator.recv(gather(4, 1), 6) {
            Err(Error::Protocol {
                envelope,
                expected: 6,
                actual: 5,
            }) => assert_eq!(envelope, gather(4, 1)),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn hangup_is_reported() {
        let mut network = network(3);
        let worker = network.pop().unwrap();
        let mut coordinator = network.remove(0);
        drop(worker);
        assert!(matches!(
            coordinator.recv(gather(0, 1), 1),
            Err(Error::Disconnected { participant: 2 })
        ));
    }

    #[test]
    fn workers_only_talk_to_coordinator() {
        let mut network = network(3);
        let broadcast = Envelope {
            step: 0,
            phase: Phase::Broadcast,
            participant: 2,
        };
        assert!(matches!(
            network[1].send(broadcast, vec![]),
            Err(Error::Unroutable(envelope)) if envelope == broadcast
        ));
        network[0].send(broadcast, vec![3.0]).unwrap();
        assert_eq!(network[2].recv(broadcast, 1).unwrap(), vec![3.0]);
    }

    #[test]
    fn hangups_do_not_wait_for_full_mailboxes() {
        let mut network = bounded_network(3, 1);
        let second = network.pop().unwrap();
        let mut first = network.pop().unwrap();
        let mut coordinator = network.pop().unwrap();

        // Fill the coordinator's mailbox, then give up without anyone draining it
        first.send(gather(0, 1), vec![1.0]).unwrap();
        let (done_sender, done) = crossbeam_channel::bounded(1);
        let dropper = std::thread::spawn(move || {
            drop(first);
            drop(second);
            done_sender.send(()).unwrap();
        });
        done.recv_timeout(std::time::Duration::from_secs(10))
            .expect("dropping transports should not block");
        dropper.join().unwrap();

        // The coordinator notices the failure instead of waiting forever
        assert!(matches!(
            coordinator.recv(gather(1, 2), 1),
            Err(Error::Disconnected { .. })
        ));
    }

    #[test]
    fn messages_outlive_closed_senders() {
        let mut network = bounded_network(2, 1);
        let mut worker = network.pop().unwrap();
        let mut coordinator = network.pop().unwrap();
        worker.send(gather(3, 1), vec![4.0; 2]).unwrap();
        worker.close();
        assert_eq!(coordinator.recv(gather(3, 1), 2).unwrap(), vec![4.0; 2]);
        assert!(matches!(
            coordinator.recv(gather(4, 1), 2),
            Err(Error::Disconnected { participant: 1 })
        ));
    }
}
