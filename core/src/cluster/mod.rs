//! Cluster topology and configuration.

pub mod config;

pub use config::{ClusterConfig, ConfigError, SshSettings};
