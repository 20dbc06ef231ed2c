//! Pick a compute backend at run time, from the execution mode and the
//! distribution policy
//!
//! The sequential policy always selects the sequential reference, whatever the
//! execution mode. Other policies are executed by the backend that implements
//! the chosen mode.

use clap::{Args, ValueEnum};
use compute::{ConfigError, Parameters, Policy, Wavefront, WavefrontBase, WavefrontCreate};
use compute_distributed::DistributedArgs;
use compute_forkjoin::ForkJoinArgs;
use compute_parallel::ParallelArgs;
use data::Matrix;
use std::fmt;
use thiserror::Error;

/// How workers execute and communicate
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq, ValueEnum)]
pub enum Mode {
    /// Threads sharing one matrix, synchronized by a barrier
    #[default]
    Shared,

    /// Data-parallel loop on a thread pool for each tile-diagonal
    ForkJoin,

    /// Isolated participants exchanging tile-diagonals as messages
    Distributed,
}
//
impl Mode {
    /// All execution modes
    pub const ALL: [Self; 3] = [Self::Shared, Self::ForkJoin, Self::Distributed];
}
//
impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shared => "shared",
            Self::ForkJoin => "fork-join",
            Self::Distributed => "distributed",
        };
        f.write_str(name)
    }
}

/// CLI parameters of the selector and of every backend it can pick
#[derive(Args, Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct SelectorArgs {
    /// Execution mode
    #[arg(short, long, env = "WAVEFRONT_MODE", value_enum, default_value_t)]
    pub mode: Mode,

    #[command(flatten)]
    pub backends: BackendArgs,
}

/// Tuning parameters of every backend
#[derive(Args, Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct BackendArgs {
    #[command(flatten)]
    pub parallel: ParallelArgs,

    #[command(flatten)]
    pub forkjoin: ForkJoinArgs,

    #[command(flatten)]
    pub distributed: DistributedArgs,
}

/// Backend picked at run time
#[derive(Debug)]
pub enum Engine {
    /// Sequential reference
    Sequential(compute_sequential::Engine),

    /// Shared-memory worker threads
    Shared(compute_parallel::Engine),

    /// Fork-join thread pool
    ForkJoin(compute_forkjoin::Engine),

    /// Message-passing participants
    Distributed(compute_distributed::Engine),
}
//
impl Engine {
    /// Execution mode of the selected backend, if any
    ///
    /// The sequential reference does not belong to any execution mode.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            Self::Sequential(_) => None,
            Self::Shared(_) => Some(Mode::Shared),
            Self::ForkJoin(_) => Some(Mode::ForkJoin),
            Self::Distributed(_) => Some(Mode::Distributed),
        }
    }
}
//
impl WavefrontBase for Engine {
    type CliArgs = SelectorArgs;

    type Error = Error;
}
//
impl WavefrontCreate for Engine {
    fn new(params: Parameters, args: SelectorArgs) -> Result<Self, Error> {
        if params.policy == Policy::Sequential {
            return Ok(Self::Sequential(compute_sequential::Engine::new(
                params,
                Default::default(),
            )?));
        }
        let backends = args.backends;
        Ok(match args.mode {
            Mode::Shared => Self::Shared(compute_parallel::Engine::new(params, backends.parallel)?),
            Mode::ForkJoin => {
                Self::ForkJoin(compute_forkjoin::Engine::new(params, backends.forkjoin)?)
            }
            Mode::Distributed => Self::Distributed(compute_distributed::Engine::new(
                params,
                backends.distributed,
            )?),
        })
    }
}
//
impl Wavefront for Engine {
    fn parameters(&self) -> &Parameters {
        match self {
            Self::Sequential(engine) => engine.parameters(),
            Self::Shared(engine) => engine.parameters(),
            Self::ForkJoin(engine) => engine.parameters(),
            Self::Distributed(engine) => engine.parameters(),
        }
    }

    fn compute(&self, matrix: &mut Matrix) -> Result<(), Error> {
        match self {
            Self::Sequential(engine) => engine.compute(matrix)?,
            Self::Shared(engine) => engine.compute(matrix)?,
            Self::ForkJoin(engine) => engine.compute(matrix)?,
            Self::Distributed(engine) => engine.compute(matrix)?,
        }
        Ok(())
    }
}

/// Set up a matrix of a certain size and fill it with the selected backend
pub fn run(size: usize, params: Parameters, args: SelectorArgs) -> Result<Matrix, Error> {
    let mut matrix = Matrix::new(size);
    Engine::new(params, args)?.compute(&mut matrix)?;
    Ok(matrix)
}

/// Things that can go wrong in any of the selectable backends
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid computation parameters
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared-memory backend failure
    #[error(transparent)]
    Shared(#[from] compute_parallel::Error),

    /// Fork-join backend failure
    #[error(transparent)]
    ForkJoin(#[from] compute_forkjoin::Error),

    /// Distributed backend failure
    #[error(transparent)]
    Distributed(#[from] compute_distributed::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_policy_ignores_mode() {
        for mode in Mode::ALL {
            let params = Parameters::new(4, Policy::Sequential.id(), 3, 1).unwrap();
            let args = SelectorArgs {
                mode,
                ..Default::default()
            };
            let engine = Engine::new(params, args).unwrap();
            assert_eq!(engine.mode(), None);
            assert_eq!(engine.parameters(), &params);
        }
    }

    #[test]
    fn mode_selects_backend() {
        let params = Parameters::new(2, Policy::Cyclic.id(), 1, 1).unwrap();
        for mode in Mode::ALL {
            let args = SelectorArgs {
                mode,
                ..Default::default()
            };
            assert_eq!(Engine::new(params, args).unwrap().mode(), Some(mode));
        }
    }

    #[test]
    fn mode_names() {
        for mode in Mode::ALL {
            let parsed = Mode::from_str(&mode.to_string(), false).unwrap();
            assert_eq!(parsed, mode);
        }
    }
}
