use crate::crypto::{Keypair, SignatureAlgorithm};
use crate::node::config::NodeConfig;
use crate::node::proposal::{DemoProposalSource, EmptyProposalSource, ProposalSource};
use crate::node::Node;
use crate::utils::init_logging;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for node control.
#[derive(Parser)]
#[clap(name = "yac-node", version)]
pub struct Cli {
    #[clap(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Generate a signing key and print its public key
    Keygen {
        /// where to write the hex seed
        #[clap(long)]
        out: PathBuf,

        /// ed25519-sha256 | ed25519-blake3
        #[clap(long, default_value = "ed25519-sha256")]
        algorithm: String,

        /// overwrite an existing key file
        #[clap(long)]
        force: bool,
    },
    /// Run the node
    Run {
        /// path to the TOML config
        #[clap(long, default_value = "yac.toml")]
        config: PathBuf,

        /// vote for a deterministic stand-in block every round instead of an empty one
        #[clap(long)]
        demo_blocks: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Keygen { out, algorithm, force } => {
            let algorithm: SignatureAlgorithm = algorithm.parse()?;
            if out.exists() && !force {
                anyhow::bail!("{} exists, pass --force to overwrite", out.display());
            }
            let kp = Keypair::generate(algorithm);
            kp.save(&out)?;
            println!("{}", kp.public());
            Ok(())
        }
        Cmd::Run { config, demo_blocks } => {
            let cfg = NodeConfig::load(&config)?;
            init_logging(&cfg.logging.filter);

            let proposals: Arc<dyn ProposalSource> = if demo_blocks {
                Arc::new(DemoProposalSource)
            } else {
                Arc::new(EmptyProposalSource)
            };
            let node = Node::new(cfg, proposals).start().await?;

            // Wait for Ctrl+C
            tokio::signal::ctrl_c().await?;
            println!("Shutting down node...");
            node.shutdown().await?;
            println!("Node stopped");
            Ok(())
        }
    }
}
