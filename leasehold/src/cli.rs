use std::path::PathBuf;

use anyhow::{Error, Result};
use clap::{Parser, Subcommand};
use leasehold_core::{DurationValue, LeaseId, LockClientConfig};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "leasehold")]
#[command(bin_name = "leasehold")]
#[command(about = "Hold named locks across processes with expiring, renewable leases")]
pub struct Cli {
    /// Directory holding lock records
    #[arg(long, env = "LEASEHOLD_STORE_DIR", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Annotation recorded with each lease, for diagnostics only
    #[arg(long, env = "LEASEHOLD_HOLDER", global = true)]
    pub holder: Option<String>,

    /// Extra time past expiry before taking over another holder's lease
    #[arg(long, env = "LEASEHOLD_SKEW_MARGIN", default_value = "0s", global = true)]
    pub skew_margin: DurationValue,

    #[command(subcommand)]
    pub commands: Commands,
}

impl Cli {
    pub fn store_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.store_dir {
            return Ok(dir.to_owned());
        }
        let data_dir = dirs::state_dir()
            .or(dirs::data_local_dir())
            .ok_or(Error::msg("cannot resolve state dir"))?;
        let store_dir = data_dir.join("leasehold");
        debug!(store_dir = %store_dir.display());
        Ok(store_dir)
    }

    pub fn holder(&self) -> String {
        if let Some(holder) = &self.holder {
            return holder.to_owned();
        }
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_owned());
        format!("{}@pid{}", user, std::process::id())
    }

    pub fn client_config(&self) -> LockClientConfig {
        LockClientConfig {
            holder: Some(self.holder()),
            skew_margin: self.skew_margin.into(),
            ..Default::default()
        }
    }

    pub fn version(&self) -> bool {
        matches!(self.commands, Commands::Version)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Acquire a lock and print the lease id
    Acquire {
        lock_id: String,

        /// How long the lease lasts without renewal
        #[arg(long, short = 'l', default_value = "15m")]
        lease: DurationValue,

        /// How long to keep polling a held lock; fail at once if unset
        #[arg(long, short = 'w')]
        wait: Option<DurationValue>,

        /// Fixed delay between polls instead of backing off
        #[arg(long)]
        poll: Option<DurationValue>,
    },

    /// Extend a held lease and print its new lease id
    Renew {
        lock_id: String,

        lease_id: LeaseId,

        #[arg(long, short = 'l', default_value = "15m")]
        lease: DurationValue,
    },

    /// Give up a held lease
    Release { lock_id: String, lease_id: LeaseId },

    /// Print the current record of a lock
    Show { lock_id: String },

    /// Run a command while holding a lock, renewing the lease until it exits
    Exec {
        lock_id: String,

        #[arg(long, short = 'l', default_value = "15m")]
        lease: DurationValue,

        #[arg(long, short = 'w')]
        wait: Option<DurationValue>,

        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    Version,
}
