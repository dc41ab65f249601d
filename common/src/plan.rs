//! Turns classified pairs into operations.

use crate::compare::{Comparison, SyncStrategy};
use crate::diff::JoinedPair;
use crate::enumerate::ObjectRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Transfer the source object to the destination; the record carries
    /// the size for byte accounting.
    Copy { src: ObjectRecord },
    Delete { key: String },
}

impl Operation {
    pub fn key(&self) -> &str {
        match self {
            Operation::Copy { src } => &src.key,
            Operation::Delete { key } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Run(Operation),
    /// Terminal: a debug line and nothing else.
    Skip {
        key: String,
        reason: &'static str,
    },
    /// Destination-only pair with deletes disabled; emits nothing at all.
    Ignore,
}

#[derive(Debug, Clone, Copy)]
pub struct Planner {
    delete: bool,
    strategy: SyncStrategy,
}

impl Planner {
    pub fn new(delete: bool, strategy: SyncStrategy) -> Self {
        Self { delete, strategy }
    }

    pub fn plan(&self, pair: JoinedPair) -> Decision {
        match pair {
            JoinedPair::SourceOnly(src) => Decision::Run(Operation::Copy { src }),
            JoinedPair::DestinationOnly(dst) => {
                if self.delete {
                    Decision::Run(Operation::Delete { key: dst.key })
                } else {
                    Decision::Ignore
                }
            }
            JoinedPair::Both { src, dst } => match self.strategy.compare(&src, &dst) {
                Comparison::NeedsCopy => Decision::Run(Operation::Copy { src }),
                Comparison::InSync(reason) => Decision::Skip {
                    key: src.key,
                    reason,
                },
            },
        }
    }
}
