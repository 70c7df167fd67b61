use serde::{Deserialize, Serialize};
use std::fmt;

/// Voting epoch: block height plus a retry counter within that height.
/// Ordered lexicographically by (height, counter).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Round {
    pub height: u64,
    pub counter: u64,
}

impl Round {
    pub fn new(height: u64, counter: u64) -> Self {
        Self { height, counter }
    }

    /// Round after a block (or an agreed empty round) at this height
    pub fn next_height(self) -> Self {
        Self { height: self.height + 1, counter: 0 }
    }

    /// Retry of the same height after a reject
    pub fn next_counter(self) -> Self {
        Self { height: self.height, counter: self.counter + 1 }
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.height, self.counter)
    }
}
