//! Work performed by each participant of a distributed run

use crate::{
    envelope::{Envelope, Phase, COORDINATOR},
    layout::DiagonalLayout,
    transport::Transport,
    Error,
};
use compute::{
    distribution::AnyDistribution,
    tiling::{self, Tiling},
};
use data::Matrix;
use log::trace;
use std::num::NonZeroUsize;

/// Process every tile-diagonal on a participant's local copy of the matrix
///
/// On each tile-diagonal, the participant computes the tiles it owns, then
/// either gathers everyone's results and sends them back out (coordinator),
/// or sends its own results to the coordinator and waits for the others'
/// (worker). Either way, every participant ends the tile-diagonal with all of
/// its cells in its local matrix.
///
/// Empty messages are never sent, and all participants agree on which
/// messages are empty since buffer sizes follow from the parameters.
pub(crate) fn run(
    distribution: AnyDistribution,
    tiling: Tiling,
    num_participants: NonZeroUsize,
    matrix: &mut Matrix,
    transport: &mut impl Transport,
) -> Result<(), Error> {
    let me = transport.participant();
    debug_assert_eq!(transport.num_participants(), num_participants.get());
    for diagonal in tiling.diagonals() {
        let step = diagonal.step();
        let layout = DiagonalLayout::new(diagonal, distribution, num_participants);

        let mut computed = Vec::with_capacity(layout.worker_len(me));
        for tile in layout.worker_tiles(me) {
            tiling::evaluate_tile(matrix, &tile, |value| computed.push(value));
        }

        let full = if me == COORDINATOR {
            let mut full = computed;
            full.reserve(layout.total_len() - full.len());
            for participant in 1..num_participants.get() {
                let len = layout.worker_len(participant);
                if len > 0 {
                    let envelope = Envelope {
                        step,
                        phase: Phase::Gather,
                        participant,
                    };
                    full.extend(transport.recv(envelope, len)?);
                }
            }
            if !full.is_empty() {
                for participant in 1..num_participants.get() {
                    let envelope = Envelope {
                        step,
                        phase: Phase::Broadcast,
                        participant,
                    };
                    transport.send(envelope, full.clone())?;
                }
            }
            full
        } else {
            if !computed.is_empty() {
                let envelope = Envelope {
                    step,
                    phase: Phase::Gather,
                    participant: me,
                };
                transport.send(envelope, computed)?;
            }
            if layout.total_len() == 0 {
                continue;
            }
            let envelope = Envelope {
                step,
                phase: Phase::Broadcast,
                participant: me,
            };
            transport.recv(envelope, layout.total_len())?
        };
        layout.unpack_others(matrix, me, &full);
        trace!("Participant {me} done with tile-diagonal K={}", diagonal.start());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use compute::{Parameters, Policy};
    use std::thread;

    #[test]
    fn oversized_gather_is_detected() {
        let params = Parameters::new(2, Policy::Block.id(), 1, 1).unwrap();
        let size = 6;
        let mut network = ChannelTransport::network(params.num_workers, None);
        let mut worker = network.pop().unwrap();
        let mut coordinator = network.pop().unwrap();

        // Tile-diagonal 0 has no live cell with unit tiles, so 1 is the first exchange
        let layout = DiagonalLayout::new(
            params.tiling(size).diagonal(1).unwrap(),
            params.distribution(),
            params.num_workers,
        );
        let expected = layout.worker_len(1);
        let bad_envelope = Envelope {
            step: 1,
            phase: Phase::Gather,
            participant: 1,
        };
        thread::scope(|s| {
            s.spawn(move || {
                worker
                    .send(bad_envelope, vec![0.0; expected + 1])
                    .unwrap();
            });
            let mut matrix = Matrix::new(size);
            match run(
                params.distribution(),
                params.tiling(size),
                params.num_workers,
                &mut matrix,
                &mut coordinator,
            ) {
                Err(Error::Protocol {
                    envelope,
                    expected: e,
                    actual,
                }) => {
                    assert_eq!(envelope, bad_envelope);
                    assert_eq!((e, actual), (expected, expected + 1));
                }
                other => panic!("unexpected result {other:?}"),
            }
        });
    }

    #[test]
    fn dead_worker_does_not_block_coordinator() {
        let params = Parameters::new(3, Policy::Cyclic.id(), 2, 1).unwrap();
        let size = 12;
        let mut network = ChannelTransport::network(params.num_workers, None);
        drop(network.pop());
        let mut coordinator = network.remove(0);
        let mut matrix = Matrix::new(size);
        let result = run(
            params.distribution(),
            params.tiling(size),
            params.num_workers,
            &mut matrix,
            &mut coordinator,
        );
        assert!(matches!(result, Err(Error::Disconnected { participant: 2 })));
    }
}
