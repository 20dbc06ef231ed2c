//! Computation parameters

use crate::{
    distribution::{AnyDistribution, Block, BlockCyclic, Cyclic},
    tiling::Tiling,
};
use clap::ValueEnum;
use std::{fmt, num::NonZeroUsize, str::FromStr};
use thiserror::Error;

/// Work distribution policy
///
/// Decides which worker processes which tile of a tile-diagonal.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq, ValueEnum)]
pub enum Policy {
    /// Single-threaded reference computation, one cell at a time
    Sequential,

    /// Each worker gets one contiguous range of tiles
    #[default]
    Block,

    /// Tiles are dealt to workers in round-robin fashion
    Cyclic,

    /// Chunks of consecutive tiles are dealt to workers in round-robin fashion
    BlockCyclic,
}
//
impl Policy {
    /// All policies, in numerical identifier order
    pub const ALL: [Self; 4] = [Self::Sequential, Self::Block, Self::Cyclic, Self::BlockCyclic];

    /// Decode a numerical policy identifier
    ///
    /// 0 is sequential, 1 is block, 2 is cyclic and 3 is block-cyclic.
    pub fn from_id(id: u64) -> Result<Self, ConfigError> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(ConfigError::InvalidPolicy(id))
    }

    /// Numerical identifier of this policy
    pub fn id(self) -> u64 {
        match self {
            Self::Sequential => 0,
            Self::Block => 1,
            Self::Cyclic => 2,
            Self::BlockCyclic => 3,
        }
    }

    /// Truth that the chunk size parameter affects this policy
    pub fn uses_chunk_size(self) -> bool {
        self == Self::BlockCyclic
    }
}
//
impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sequential => "sequential",
            Self::Block => "block",
            Self::Cyclic => "cyclic",
            Self::BlockCyclic => "block-cyclic",
        };
        f.write_str(name)
    }
}
//
impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        if let Ok(id) = s.parse::<u64>() {
            return Self::from_id(id);
        }
        Self::ALL
            .into_iter()
            .find(|policy| policy.to_string() == s)
            .ok_or_else(|| ConfigError::UnknownPolicy(s.to_owned()))
    }
}

/// Computation parameters
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct Parameters {
    /// Number of workers (threads or isolated participants)
    pub num_workers: NonZeroUsize,

    /// Work distribution policy
    pub policy: Policy,

    /// Side length of the square tiles that workers process
    ///
    /// A tile size of 1 is the untiled wavefront, where each worker processes
    /// individual cells and workers synchronize after every diagonal.
    pub tile_size: NonZeroUsize,

    /// Number of consecutive tiles per chunk (block-cyclic policy only)
    pub chunk_size: NonZeroUsize,
}
//
impl Parameters {
    /// Validate raw parameters, as provided by an external driver
    pub fn new(
        num_workers: usize,
        policy_id: u64,
        tile_size: usize,
        chunk_size: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            num_workers: NonZeroUsize::new(num_workers).ok_or(ConfigError::NoWorkers)?,
            policy: Policy::from_id(policy_id)?,
            tile_size: NonZeroUsize::new(tile_size).ok_or(ConfigError::ZeroTileSize)?,
            chunk_size: NonZeroUsize::new(chunk_size).ok_or(ConfigError::ZeroChunkSize)?,
        })
    }

    /// Tile-to-worker mapping associated with the chosen policy
    ///
    /// The sequential policy is mapped to block distribution, which processes
    /// every tile in index order when there is a single worker.
    pub fn distribution(&self) -> AnyDistribution {
        match self.policy {
            Policy::Sequential | Policy::Block => AnyDistribution::Block(Block),
            Policy::Cyclic => AnyDistribution::Cyclic(Cyclic),
            Policy::BlockCyclic => AnyDistribution::BlockCyclic(BlockCyclic {
                chunk_size: self.chunk_size,
            }),
        }
    }

    /// Tiling of a matrix of a certain size
    pub fn tiling(&self, size: usize) -> Tiling {
        Tiling::new(size, self.tile_size)
    }
}
//
impl Default for Parameters {
    fn default() -> Self {
        Self {
            num_workers: std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            policy: Policy::default(),
            tile_size: NonZeroUsize::MIN,
            chunk_size: NonZeroUsize::new(8).expect("8 is not zero"),
        }
    }
}

/// Invalid computation parameters
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Numerical policy identifier is out of range
    #[error("invalid policy id {0} (expected 0 to 3)")]
    InvalidPolicy(u64),

    /// Policy name is not known
    #[error("unknown policy {0:?}")]
    UnknownPolicy(String),

    /// Asked for zero workers
    #[error("at least one worker is needed")]
    NoWorkers,

    /// Asked for empty tiles
    #[error("tile size must be at least 1")]
    ZeroTileSize,

    /// Asked for empty chunks
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_ids() {
        for policy in Policy::ALL {
            assert_eq!(Policy::from_id(policy.id()), Ok(policy));
            assert_eq!(policy.to_string().parse::<Policy>(), Ok(policy));
            assert_eq!(policy.id().to_string().parse::<Policy>(), Ok(policy));
        }
        assert_eq!(Policy::from_id(4), Err(ConfigError::InvalidPolicy(4)));
        assert_eq!(
            "diagonal".parse::<Policy>(),
            Err(ConfigError::UnknownPolicy("diagonal".to_owned()))
        );
    }

    #[test]
    fn validation() {
        let params = Parameters::new(4, 3, 16, 32).unwrap();
        assert_eq!(params.num_workers.get(), 4);
        assert_eq!(params.policy, Policy::BlockCyclic);
        assert_eq!(params.tile_size.get(), 16);
        assert_eq!(params.chunk_size.get(), 32);

        assert_eq!(Parameters::new(0, 1, 1, 1), Err(ConfigError::NoWorkers));
        assert_eq!(Parameters::new(1, 9, 1, 1), Err(ConfigError::InvalidPolicy(9)));
        assert_eq!(Parameters::new(1, 1, 0, 1), Err(ConfigError::ZeroTileSize));
        assert_eq!(Parameters::new(1, 3, 1, 0), Err(ConfigError::ZeroChunkSize));
    }

    #[test]
    fn distribution_follows_policy() {
        let mut params = Parameters::new(2, 0, 1, 5).unwrap();
        assert_eq!(params.distribution(), AnyDistribution::Block(Block));
        params.policy = Policy::Cyclic;
        assert_eq!(params.distribution(), AnyDistribution::Cyclic(Cyclic));
        params.policy = Policy::BlockCyclic;
        assert_eq!(
            params.distribution(),
            AnyDistribution::BlockCyclic(BlockCyclic {
                chunk_size: params.chunk_size
            })
        );
    }
}
