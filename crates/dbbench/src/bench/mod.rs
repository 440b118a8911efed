//! Workload definitions and execution.

mod recorder;
mod runner;
pub mod workloads;

pub use recorder::Recorder;
pub use runner::BenchmarkRunner;

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of every benchmark key (`%016d`).
pub const KEY_SIZE: usize = 16;

/// Value size used by `fill100K`.
pub const LARGE_VALUE_SIZE: usize = 100_000;

/// A name in the operation list that is neither a workload nor a directive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown benchmark '{0}'")]
pub struct UnknownWorkload(pub String);

/// A timed benchmark operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    FillSeq,
    FillRandom,
    Overwrite,
    FillSync,
    Fill100K,
    ReadSeq,
    ReadReverse,
    ReadRandom,
    Compact,
    HeapProfile,
}

impl Workload {
    pub const ALL: [Self; 10] = [
        Self::FillSeq,
        Self::FillRandom,
        Self::Overwrite,
        Self::FillSync,
        Self::Fill100K,
        Self::ReadSeq,
        Self::ReadReverse,
        Self::ReadRandom,
        Self::Compact,
        Self::HeapProfile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::FillSeq => "fillseq",
            Self::FillRandom => "fillrandom",
            Self::Overwrite => "overwrite",
            Self::FillSync => "fillsync",
            Self::Fill100K => "fill100K",
            Self::ReadSeq => "readseq",
            Self::ReadReverse => "readreverse",
            Self::ReadRandom => "readrandom",
            Self::Compact => "compact",
            Self::HeapProfile => "heapprofile",
        }
    }

    /// Whether this workload starts from an empty database.
    pub fn needs_fresh_db(self) -> bool {
        matches!(
            self,
            Self::FillSeq | Self::FillRandom | Self::FillSync | Self::Fill100K
        )
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workload {
    type Err = UnknownWorkload;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| UnknownWorkload(s.to_string()))
    }
}

/// An untimed modifier applied to the workloads that follow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Subsequent writes wait for stable storage.
    Sync,
    /// Subsequent writes return after an in-memory commit.
    NoSync,
    /// Divide the current entry count by ten.
    Tenth,
    /// Restore the configured entry count.
    Normal,
    /// Run the next workload against an empty database.
    Fresh,
}

impl FromStr for Directive {
    type Err = UnknownWorkload;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "nosync" => Ok(Self::NoSync),
            "tenth" => Ok(Self::Tenth),
            "normal" => Ok(Self::Normal),
            "fresh" => Ok(Self::Fresh),
            _ => Err(UnknownWorkload(s.to_string())),
        }
    }
}

/// One entry of the operation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Workload(Workload),
    Directive(Directive),
}

impl FromStr for Step {
    type Err = UnknownWorkload;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse()
            .map(Self::Workload)
            .or_else(|_| s.parse().map(Self::Directive))
    }
}
