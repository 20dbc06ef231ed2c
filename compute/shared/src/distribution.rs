//! Mapping of the tiles of a tile-diagonal to workers
//!
//! Every distribution partitions the tile indices `0..num_tiles` of a
//! tile-diagonal across workers `0..num_workers`: each tile is owned by
//! exactly one worker. Ownership can be queried in both directions, either by
//! asking who owns a tile or by enumerating the tiles that a worker owns.

use std::num::NonZeroUsize;

/// Tile-to-worker mapping for a single tile-diagonal
pub trait Distribution {
    /// Identifier of the worker that owns a certain tile
    ///
    /// `tile` must be smaller than `num_tiles`.
    fn owner(&self, tile: usize, num_tiles: usize, num_workers: NonZeroUsize) -> usize;

    /// Tiles owned by a certain worker, in increasing index order
    ///
    /// `worker` must be smaller than `num_workers`. Workers may own no tile
    /// at all when there are fewer tiles than workers.
    fn owned_tiles(&self, worker: usize, num_tiles: usize, num_workers: NonZeroUsize)
        -> OwnedTiles;
}

/// Contiguous ranges of tiles
///
/// With `base = max(1, num_tiles / num_workers)`, worker `w` owns tiles
/// `w * base..(w + 1) * base`, except for the last worker, which also takes
/// the remainder up to `num_tiles`. This minimizes coordination overhead when
/// tiles have roughly uniform cost.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Block;
//
impl Block {
    /// Number of tiles in a regular block
    fn base_size(num_tiles: usize, num_workers: NonZeroUsize) -> usize {
        (num_tiles / num_workers).max(1)
    }
}
//
impl Distribution for Block {
    fn owner(&self, tile: usize, num_tiles: usize, num_workers: NonZeroUsize) -> usize {
        debug_assert!(tile < num_tiles);
        (tile / Self::base_size(num_tiles, num_workers)).min(num_workers.get() - 1)
    }

    fn owned_tiles(
        &self,
        worker: usize,
        num_tiles: usize,
        num_workers: NonZeroUsize,
    ) -> OwnedTiles {
        debug_assert!(worker < num_workers.get());
        let base_size = Self::base_size(num_tiles, num_workers);
        let start = (worker * base_size).min(num_tiles);
        let end = if worker + 1 < num_workers.get() {
            ((worker + 1) * base_size).min(num_tiles)
        } else {
            num_tiles
        };
        OwnedTiles::contiguous(start..end)
    }
}

/// Round-robin dealing of individual tiles
///
/// Worker `w` owns tiles `w, w + num_workers, w + 2 * num_workers...`. This
/// evens out load when tile cost varies along the tile-diagonal, at the
/// expense of locality.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Cyclic;
//
impl Distribution for Cyclic {
    fn owner(&self, tile: usize, num_tiles: usize, num_workers: NonZeroUsize) -> usize {
        debug_assert!(tile < num_tiles);
        tile % num_workers
    }

    fn owned_tiles(
        &self,
        worker: usize,
        num_tiles: usize,
        num_workers: NonZeroUsize,
    ) -> OwnedTiles {
        debug_assert!(worker < num_workers.get());
        OwnedTiles {
            next_chunk: worker,
            chunk_len: 1,
            stride: num_workers.get(),
            end: num_tiles,
            current: 0..0,
        }
    }
}

/// Round-robin dealing of chunks of consecutive tiles
///
/// Tiles are grouped into chunks of `chunk_size` tiles, and chunk `c` is
/// owned by worker `c % num_workers`. This is a tunable middle ground between
/// [`Block`] (locality) and [`Cyclic`] (load balance).
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct BlockCyclic {
    /// Number of consecutive tiles per chunk
    pub chunk_size: NonZeroUsize,
}
//
impl Distribution for BlockCyclic {
    fn owner(&self, tile: usize, num_tiles: usize, num_workers: NonZeroUsize) -> usize {
        debug_assert!(tile < num_tiles);
        (tile / self.chunk_size) % num_workers
    }

    fn owned_tiles(
        &self,
        worker: usize,
        num_tiles: usize,
        num_workers: NonZeroUsize,
    ) -> OwnedTiles {
        debug_assert!(worker < num_workers.get());
        let chunk_size = self.chunk_size.get();
        OwnedTiles {
            next_chunk: worker.saturating_mul(chunk_size),
            chunk_len: chunk_size,
            stride: chunk_size.saturating_mul(num_workers.get()),
            end: num_tiles,
            current: 0..0,
        }
    }
}

/// Run-time selected distribution
///
/// Usually obtained from [`Parameters::distribution()`].
///
/// [`Parameters::distribution()`]: crate::Parameters::distribution()
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum AnyDistribution {
    /// Contiguous ranges of tiles
    Block(Block),

    /// Round-robin dealing of individual tiles
    Cyclic(Cyclic),

    /// Round-robin dealing of chunks of tiles
    BlockCyclic(BlockCyclic),
}
//
impl Distribution for AnyDistribution {
    #[inline]
    fn owner(&self, tile: usize, num_tiles: usize, num_workers: NonZeroUsize) -> usize {
        match self {
            Self::Block(d) => d.owner(tile, num_tiles, num_workers),
            Self::Cyclic(d) => d.owner(tile, num_tiles, num_workers),
            Self::BlockCyclic(d) => d.owner(tile, num_tiles, num_workers),
        }
    }

    #[inline]
    fn owned_tiles(
        &self,
        worker: usize,
        num_tiles: usize,
        num_workers: NonZeroUsize,
    ) -> OwnedTiles {
        match self {
            Self::Block(d) => d.owned_tiles(worker, num_tiles, num_workers),
            Self::Cyclic(d) => d.owned_tiles(worker, num_tiles, num_workers),
            Self::BlockCyclic(d) => d.owned_tiles(worker, num_tiles, num_workers),
        }
    }
}

/// Iterator over the tiles owned by one worker
///
/// All supported distributions hand out evenly spaced chunks of consecutive
/// tiles, clipped at the end of the tile-diagonal. A contiguous range is the
/// special case of a single chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OwnedTiles {
    /// First tile of the next chunk
    next_chunk: usize,

    /// Number of tiles per chunk
    chunk_len: usize,

    /// Distance between the first tiles of two consecutive chunks
    stride: usize,

    /// Number of tiles on the tile-diagonal
    end: usize,

    /// Remaining tiles of the current chunk
    current: std::ops::Range<usize>,
}
//
impl OwnedTiles {
    /// Single chunk of consecutive tiles
    fn contiguous(range: std::ops::Range<usize>) -> Self {
        Self {
            next_chunk: range.end,
            chunk_len: 0,
            stride: 0,
            end: range.end,
            current: range,
        }
    }
}
//
impl Iterator for OwnedTiles {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if let Some(tile) = self.current.next() {
                return Some(tile);
            }
            if self.next_chunk >= self.end || self.chunk_len == 0 {
                return None;
            }
            let start = self.next_chunk;
            self.current = start..start.saturating_add(self.chunk_len).min(self.end);
            self.next_chunk = start.saturating_add(self.stride);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_distributions() -> Vec<AnyDistribution> {
        let mut result = vec![
            AnyDistribution::Block(Block),
            AnyDistribution::Cyclic(Cyclic),
        ];
        for chunk_size in [1, 2, 3, 8, usize::MAX / 2, usize::MAX] {
            result.push(AnyDistribution::BlockCyclic(BlockCyclic {
                chunk_size: NonZeroUsize::new(chunk_size).unwrap(),
            }));
        }
        result
    }

    #[test]
    fn partition_is_exact() {
        for distribution in all_distributions() {
            for num_workers in (1..=9).map(|w| NonZeroUsize::new(w).unwrap()) {
                for num_tiles in 0..=40 {
                    let mut seen = vec![0usize; num_tiles];
                    for worker in 0..num_workers.get() {
                        let tiles = distribution
                            .owned_tiles(worker, num_tiles, num_workers)
                            .collect::<Vec<_>>();
                        assert!(tiles.windows(2).all(|w| w[0] < w[1]));
                        for tile in tiles {
                            assert_eq!(
                                distribution.owner(tile, num_tiles, num_workers),
                                worker,
                                "{distribution:?} with {num_tiles} tiles, {num_workers} workers"
                            );
                            seen[tile] += 1;
                        }
                    }
                    assert!(
                        seen.iter().all(|&count| count == 1),
                        "{distribution:?} with {num_tiles} tiles, {num_workers} workers: {seen:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn single_worker_takes_everything_in_order() {
        let one = NonZeroUsize::MIN;
        for distribution in all_distributions() {
            let tiles = distribution.owned_tiles(0, 13, one).collect::<Vec<_>>();
            assert_eq!(tiles, (0..13).collect::<Vec<_>>());
        }
    }

    #[test]
    fn block_remainder_goes_to_last_worker() {
        let workers = NonZeroUsize::new(3).unwrap();
        let owned = |w| Block.owned_tiles(w, 11, workers).collect::<Vec<_>>();
        assert_eq!(owned(0), vec![0, 1, 2]);
        assert_eq!(owned(1), vec![3, 4, 5]);
        assert_eq!(owned(2), vec![6, 7, 8, 9, 10]);

        // Fewer tiles than workers: one tile per worker, trailing workers idle
        let workers = NonZeroUsize::new(4).unwrap();
        let owned = |w| Block.owned_tiles(w, 2, workers).collect::<Vec<_>>();
        assert_eq!(owned(0), vec![0]);
        assert_eq!(owned(1), vec![1]);
        assert!(owned(2).is_empty());
        assert!(owned(3).is_empty());
    }

    #[test]
    fn cyclic_deals_round_robin() {
        let workers = NonZeroUsize::new(3).unwrap();
        let owned = Cyclic.owned_tiles(1, 8, workers).collect::<Vec<_>>();
        assert_eq!(owned, vec![1, 4, 7]);
    }

    #[test]
    fn block_cyclic_deals_chunks() {
        let workers = NonZeroUsize::new(2).unwrap();
        let distribution = BlockCyclic {
            chunk_size: NonZeroUsize::new(3).unwrap(),
        };
        let owned = |w| distribution.owned_tiles(w, 10, workers).collect::<Vec<_>>();
        assert_eq!(owned(0), vec![0, 1, 2, 6, 7, 8]);
        assert_eq!(owned(1), vec![3, 4, 5, 9]);
    }

    #[test]
    fn oversized_chunks_go_to_first_worker() {
        let workers = NonZeroUsize::new(3).unwrap();
        let distribution = BlockCyclic {
            chunk_size: NonZeroUsize::MAX,
        };
        let owned = |w| distribution.owned_tiles(w, 10, workers).collect::<Vec<_>>();
        assert_eq!(owned(0), (0..10).collect::<Vec<_>>());
        assert!(owned(1).is_empty());
        assert!(owned(2).is_empty());
        assert_eq!(distribution.owner(9, 10, workers), 0);
    }
}
