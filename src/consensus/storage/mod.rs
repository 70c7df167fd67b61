//! Vote storage: block (per hash) -> round -> all tracked rounds.

pub mod block_storage;
pub mod round_storage;
pub mod vote_storage;

pub use block_storage::BlockStorage;
pub use round_storage::{InsertReport, RoundStorage};
pub use vote_storage::VoteStorage;
