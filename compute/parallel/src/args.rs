//! CLI arguments

use clap::Args;
use std::num::NonZeroUsize;

/// CLI parameters for the multithreaded implementation
#[derive(Args, Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ParallelArgs {
    /// Stack size of worker threads in bytes
    ///
    /// Workers use very little stack, so this is only useful when running a
    /// very large number of threads on a memory-constrained system. By
    /// default, the standard library's default thread stack size is used.
    #[arg(long, env)]
    pub stack_size: Option<NonZeroUsize>,
}
