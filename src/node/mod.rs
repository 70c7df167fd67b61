pub mod config;
pub mod proposal;
pub mod node;
pub mod service_handle;
pub mod cli;

pub use config::NodeConfig;
pub use node::{next_round, Node, RunningNode};
pub use proposal::{DemoProposalSource, EmptyProposalSource, ProposalSource};
pub use service_handle::ServiceHandle;
pub use cli::run_cli;
