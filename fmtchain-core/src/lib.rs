//! Embeddable core library for fmtchain.
//!
//! Runs chains of external formatters over content-addressed snapshots, with every
//! collaborator behind an async port trait.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`ToolMaterializer`](ports::ToolMaterializer): provide a runnable tool
//! - [`SourceSnapshotter`](ports::SourceSnapshotter): read sources into the store
//! - [`ConfigDiscovery`](ports::ConfigDiscovery): find tool config files
//! - [`ContentStore`](ports::ContentStore): merge and read digests
//! - [`ProcessRunner`](ports::ProcessRunner): execute a process spec
//! - [`WritePort`](ports::WritePort): write formatted files back
//!
//! The [`adapters`] and [`sandbox`] modules provide default local implementations.
//!
//! # Entry points
//!
//! - [`run_fmt`](pipeline::run_fmt): format every unit, returning diff and report
//! - [`run_chain`](chain::run_chain) / [`run_formatter`](chain::run_formatter): lower-level

pub mod acquire;
pub mod adapters;
pub mod chain;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod reporter;
pub mod request;
pub mod sandbox;
pub mod settings;

pub use error::{EngineError, StageError};
pub use request::{FormatRequest, StageInput};
pub use settings::{FmtConfig, FmtSettings, SettingsError};
