use std::fmt;
use std::str::FromStr;

use crate::error::BlockError;

/// Available local multiply backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KernelKind {
    /// Serial i/j/k triple loop.
    #[default]
    Sequential,
    /// Shared-memory parallel loop over output rows (rayon).
    Parallel,
    /// Accelerator-style offload: staged device buffers and a per-cell reduction.
    Offload,
}

impl KernelKind {
    /// All kinds, in the order they are listed in help output.
    pub const ALL: [KernelKind; 3] = [
        KernelKind::Sequential,
        KernelKind::Parallel,
        KernelKind::Offload,
    ];

    /// Returns the configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            KernelKind::Sequential => "sequential",
            KernelKind::Parallel => "parallel",
            KernelKind::Offload => "offload",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KernelKind {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" | "serial" => Ok(KernelKind::Sequential),
            "parallel" | "omp" => Ok(KernelKind::Parallel),
            "offload" | "acc" => Ok(KernelKind::Offload),
            other => Err(BlockError::UnknownKernel(other.to_string())),
        }
    }
}
