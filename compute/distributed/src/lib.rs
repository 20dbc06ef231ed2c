//! Distributed-memory implementation of the wavefront computation
//!
//! Participants share nothing. Each of them owns a full copy of the matrix,
//! computes the tiles that the distribution policy assigns to it, and learns
//! about the other tiles of each tile-diagonal through message passing.
//! Participant 0 is the coordinator: after computing its own tiles, it
//! gathers the results of every other participant, concatenates them in
//! participant order, and broadcasts the concatenation back to everyone.
//!
//! Participants are run as threads that only communicate through a
//! [`Transport`], here backed by crossbeam channels.

mod envelope;
mod layout;
mod participant;
mod transport;

pub use crate::{
    envelope::{Envelope, Phase, COORDINATOR},
    layout::DiagonalLayout,
    transport::{ChannelTransport, Transport},
};

use clap::Args;
use compute::{ConfigError, Parameters, Policy, Wavefront, WavefrontBase, WavefrontCreate};
use data::Matrix;
use log::{debug, warn};
use std::{io, num::NonZeroUsize, thread};
use thiserror::Error;

/// CLI parameters for the distributed implementation
#[derive(Args, Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct DistributedArgs {
    /// Maximal number of pending messages per participant
    ///
    /// By default, participant mailboxes are unbounded. With a bound, senders
    /// wait for the receiver to catch up, which limits memory usage when the
    /// coordinator falls behind.
    #[arg(long, env)]
    pub mailbox_capacity: Option<NonZeroUsize>,
}

/// Message-passing wavefront computation
#[derive(Debug)]
pub struct Engine {
    /// Computation parameters
    params: Parameters,

    /// Backend-specific parameters
    args: DistributedArgs,
}
//
impl WavefrontBase for Engine {
    type CliArgs = DistributedArgs;

    type Error = Error;
}
//
impl WavefrontCreate for Engine {
    fn new(params: Parameters, args: DistributedArgs) -> Result<Self, Error> {
        Ok(Self { params, args })
    }
}
//
impl Wavefront for Engine {
    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn compute(&self, matrix: &mut Matrix) -> Result<(), Error> {
        self.compute_replicas(matrix).map(drop)
    }
}
//
impl Engine {
    /// Run the computation, also returning the final local matrix of every
    /// participant other than the coordinator
    ///
    /// The coordinator works on `matrix` directly, and other participants
    /// start from a copy of it. At the end of a successful run, all copies
    /// are identical to `matrix`.
    pub fn compute_replicas(&self, matrix: &mut Matrix) -> Result<Vec<Matrix>, Error> {
        let tiling = self.params.tiling(matrix.size());
        let distribution = self.params.distribution();
        let num_participants = self.num_participants();
        debug!(
            "Running distributed {} wavefront on a {1}x{1} matrix with {num_participants} participants and tiles of size {2}",
            self.params.policy,
            matrix.size(),
            tiling.tile_size()
        );

        let mut transports =
            ChannelTransport::network(num_participants, self.args.mailbox_capacity);
        let mut coordinator = transports.remove(COORDINATOR);
        let replicas = transports.iter().map(|_| matrix.clone()).collect::<Vec<_>>();
        thread::scope(|s| {
            // Spawn the other participants
            let mut workers = Vec::with_capacity(transports.len());
            let mut spawn_error = None;
            for (mut transport, mut replica) in transports.into_iter().zip(replicas) {
                let id = transport.participant();
                let builder = thread::Builder::new().name(format!("participant-{id}"));
                match builder.spawn_scoped(s, move || -> Result<Matrix, Error> {
                    participant::run(
                        distribution,
                        tiling,
                        num_participants,
                        &mut replica,
                        &mut transport,
                    )?;
                    transport.close();
                    Ok(replica)
                }) {
                    Ok(handle) => workers.push((id, handle)),
                    Err(source) => {
                        // Not-yet-spawned participants hang up when dropped
                        spawn_error = Some(Error::Spawn {
                            participant: id,
                            source,
                        });
                        break;
                    }
                }
            }

            // Do the coordinator's share of the work. The coordinator must
            // hang up before joining if anything went wrong, otherwise the
            // other participants could wait for its broadcasts forever.
            let outcome = match spawn_error {
                Some(error) => Err(error),
                None => participant::run(
                    distribution,
                    tiling,
                    num_participants,
                    matrix,
                    &mut coordinator,
                ),
            };
            match outcome {
                Ok(()) => coordinator.close(),
                Err(_) => drop(coordinator),
            }

            // Collect the other participants' results
            let mut replicas = Vec::with_capacity(workers.len());
            let mut errors = outcome.err().into_iter().collect::<Vec<_>>();
            let mut panicked = None;
            for (id, handle) in workers {
                match handle.join() {
                    Ok(Ok(replica)) => replicas.push(replica),
                    Ok(Err(error)) => errors.push(error),
                    Err(_) => {
                        panicked.get_or_insert(id);
                    }
                }
            }
            if let Some(id) = panicked {
                return Err(Error::WorkerPanicked(id));
            }
            match root_cause(errors) {
                Some(error) => Err(error),
                None => Ok(replicas),
            }
        })
    }

    /// Number of participants to be used
    fn num_participants(&self) -> NonZeroUsize {
        if self.params.policy == Policy::Sequential {
            NonZeroUsize::MIN
        } else {
            self.params.num_workers
        }
    }
}

/// Pick the most relevant error of a failed run
///
/// When a participant fails, the others usually notice it as a disconnection,
/// so the first error that is not a disconnection is the interesting one.
fn root_cause(errors: Vec<Error>) -> Option<Error> {
    let mut first_disconnect = None;
    let mut cause = None;
    for error in errors {
        match error {
            Error::Disconnected { .. } if first_disconnect.is_none() => {
                first_disconnect = Some(error)
            }
            Error::Disconnected { .. } => {}
            _ if cause.is_none() => cause = Some(error),
            _ => warn!("Additional participant failure: {error}"),
        }
    }
    cause.or(first_disconnect)
}

/// Things that can go wrong when performing distributed computation
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid computation parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Failed to start a participant
    #[error("failed to spawn participant {participant}")]
    Spawn {
        /// Identifier of the participant that could not be spawned
        participant: usize,

        /// Underlying OS error
        source: io::Error,
    },

    /// A participant panicked
    #[error("participant {0} panicked")]
    WorkerPanicked(usize),

    /// A participant stopped communicating before the end of the run
    #[error("participant {participant} disconnected before the end of the run")]
    Disconnected {
        /// Identifier of the participant that went away
        participant: usize,
    },

    /// A message did not have the size that the receiver expected
    #[error("{envelope} carries {actual} values, but {expected} were expected")]
    Protocol {
        /// Message with the wrong size
        envelope: Envelope,

        /// Number of values that the receiver expected
        expected: usize,

        /// Number of values that the message actually carried
        actual: usize,
    },

    /// The same message was received twice
    #[error("received {0} twice")]
    Duplicate(Envelope),

    /// A participant tried to send a message that it has no route for
    #[error("no route for {0}")]
    Unroutable(Envelope),
}
