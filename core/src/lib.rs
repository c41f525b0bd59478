//! solrig-core — provisions a small ZooKeeper + SolrCloud cluster over SSH.
//!
//! The crate is split along a strict seam: everything below `orchestrator` is
//! pure — provisioning tasks build command strings and config-file contents,
//! the convergence poller decides when a cluster is ready — and all actual
//! execution flows through a single injected [`exec::CommandRunner`]
//! (`ShellRunner` in production, `MockRunner` in tests).

pub mod cluster;
pub mod convergence;
pub mod exec;
pub mod orchestrator;
pub mod tasks;
