//! # conquers - Bulk Network Device Configuration
//!
//! `conquers` pushes command sets to many switches and routers in parallel and
//! tracks per-host success or failure. Device passwords are stored encrypted
//! at rest and resolved per host, with exact or wildcard host matching.
//!
//! ## Features
//!
//! - **Configuration Cascade**: Settings flow from `defaults` to groups to hosts
//! - **Bounded Parallelism**: Each group runs in rounds of at most `forks` hosts
//! - **Isolated Workers**: A crashing host never takes down its siblings or the run
//! - **Interactive Commands**: Inline `#question:answer;` markers answer device prompts
//! - **Encrypted Credentials**: AES-256 EAX records with wildcard host patterns
//! - **Device Profiles**: Prompt and configuration-mode handling per device family
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conquers::{ConfigResolver, CredentialVault, MasterKey, Orchestrator, SshConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let groups = ConfigResolver::load("~/.conquers/conquers.yaml")?;
//!     let vault = CredentialVault::load("~/.conquers/credentials")?;
//!     let key = MasterKey::from_source("~/.conquers/masterkey")?;
//!
//!     let report = Orchestrator::new(SshConnector)
//!         .run_batch(groups, &vault, &key)
//!         .await?;
//!
//!     let summary = report.summary();
//!     println!("{} ok, {} failed, {} skipped", summary.ok, summary.failed, summary.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`config::ConfigResolver`] - Resolves the configuration cascade into groups
//! - [`credentials::CredentialVault`] - Encrypted credential storage and lookup
//! - [`commands::CommandSet`] - Ordinary batches and interactive exchanges
//! - [`scheduler::Orchestrator`] - Rounds, workers and result collection
//! - [`report::ResultAggregator`] - Results grouped for rendering
//! - [`session::DeviceSession`] - The device capability workers drive

pub mod commands;
pub mod config;
pub mod credentials;
pub mod device;
pub mod error;
pub mod ipc;
pub mod report;
pub mod scheduler;
pub mod session;
pub mod worker;

pub use commands::{CommandSet, Exchange, Phase, PhaseCommands, Segment};
pub use config::{ConfigResolver, DeviceSettings, GroupSpec, HostConfig, Settings};
pub use credentials::{
    CredentialRecord, CredentialVault, Credentials, EntryChange, MasterKey, ResolvedCredentials,
    Secret, decrypt_pass, encrypt_pass,
};
pub use error::{
    ConfigError, ConfigTransition, ConnectorError, CredentialsError, CryptoError, RunError,
};
pub use report::{ExecutionResult, Outcome, PhaseOutput, ResultAggregator, RunSummary};
pub use scheduler::{Orchestrator, RunOptions};
pub use session::{ConnectTarget, Connector, DeviceSession, SecurityLevel, SshConnector};
