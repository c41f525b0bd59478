//! Cluster configuration.
//!
//! `ClusterConfig` is the single immutable description of the cluster:
//! which hosts run ZooKeeper, which run Solr, where the tarballs come from,
//! and how to reach the machines over SSH. It is constructed once at startup
//! (usually from a YAML file) and passed by reference into every operation —
//! there is no ambient global state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// SshSettings
// ---------------------------------------------------------------------------

/// How to reach the cluster machines over SSH. One set of credentials is
/// shared by all hosts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SshSettings {
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Path to an SSH private key, if not using the default.
    #[serde(default)]
    pub identity_file: Option<String>,
}

impl Default for SshSettings {
    fn default() -> Self {
        SshSettings {
            user: default_user(),
            port: default_ssh_port(),
            identity_file: None,
        }
    }
}

impl SshSettings {
    /// Build the `user@host` string used in SSH/scp commands.
    pub fn user_at(&self, host: &str) -> String {
        format!("{}@{}", self.user, host)
    }

    /// Build base SSH arguments (port, key, options) without host or command.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ];
        if let Some(ref key) = self.identity_file {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args
    }
}

fn default_user() -> String {
    "ubuntu".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

// ---------------------------------------------------------------------------
// ClusterConfig
// ---------------------------------------------------------------------------

/// Immutable description of the whole cluster.
///
/// Host lists may overlap — a machine can run both ZooKeeper and Solr.
/// Everything except the host lists has a sensible default.
///
/// Invariant: both host lists are non-empty. [`ClusterConfig::new`],
/// [`ClusterConfig::load`], and [`ClusterConfig::from_yaml`] all enforce it;
/// `first_zookeeper` and `first_solr` rely on it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    /// Hosts forming the ZooKeeper ensemble, in `myid` order.
    pub zookeeper_hosts: Vec<String>,
    /// Hosts running Solr nodes.
    pub solr_hosts: Vec<String>,
    #[serde(default)]
    pub ssh: SshSettings,
    #[serde(default = "default_zookeeper_url")]
    pub zookeeper_url: String,
    #[serde(default = "default_solr_url")]
    pub solr_url: String,
    /// Directory under the remote user's home where everything is installed.
    #[serde(default = "default_install_dir")]
    pub install_dir: String,
    /// Service name for ZooKeeper. Prefixed so we never clobber a system package.
    #[serde(default = "default_zookeeper_service")]
    pub zookeeper_service: String,
    /// Service name for Solr.
    #[serde(default = "default_solr_service")]
    pub solr_service: String,
    #[serde(default = "default_num_shards")]
    pub num_shards: u32,
    #[serde(default = "default_zookeeper_port")]
    pub zookeeper_port: u16,
    #[serde(default = "default_solr_port")]
    pub solr_port: u16,
    /// ZooKeeper path where Solr nodes announce liveness.
    #[serde(default = "default_registration_path")]
    pub registration_path: String,
}

impl ClusterConfig {
    /// Build a config with the given host roles and defaults for everything
    /// else.
    pub fn new(
        zookeeper_hosts: Vec<String>,
        solr_hosts: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let config = ClusterConfig {
            zookeeper_hosts,
            solr_hosts,
            ssh: SshSettings::default(),
            zookeeper_url: default_zookeeper_url(),
            solr_url: default_solr_url(),
            install_dir: default_install_dir(),
            zookeeper_service: default_zookeeper_service(),
            solr_service: default_solr_service(),
            num_shards: default_num_shards(),
            zookeeper_port: default_zookeeper_port(),
            solr_port: default_solr_port(),
            registration_path: default_registration_path(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file and validate.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Parse from a YAML string and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.zookeeper_hosts.is_empty() {
            return Err(ConfigError::Invalid("zookeeper_hosts is empty".into()));
        }
        if self.solr_hosts.is_empty() {
            return Err(ConfigError::Invalid("solr_hosts is empty".into()));
        }
        Ok(())
    }

    /// All distinct hosts in the cluster, first-seen order.
    pub fn all_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for host in self.zookeeper_hosts.iter().chain(self.solr_hosts.iter()) {
            if !hosts.iter().any(|h| h == host) {
                hosts.push(host.clone());
            }
        }
        hosts
    }

    /// The ZooKeeper node used for zkCli inspection and bootstrap.
    pub fn first_zookeeper(&self) -> &str {
        &self.zookeeper_hosts[0]
    }

    /// The Solr node used for the SolrCloud bootstrap and the admin URL.
    pub fn first_solr(&self) -> &str {
        &self.solr_hosts[0]
    }

    /// Local file name of the ZooKeeper tarball (URL basename).
    pub fn zookeeper_tarball(&self) -> &str {
        basename(&self.zookeeper_url)
    }

    /// Local file name of the Solr tarball (URL basename).
    pub fn solr_tarball(&self) -> &str {
        basename(&self.solr_url)
    }

    /// Absolute install directory on the remote hosts.
    pub fn install_path(&self) -> String {
        format!("/home/{}/{}", self.ssh.user, self.install_dir)
    }

    /// Directory the ZooKeeper tarball extracts into, as an absolute path.
    pub fn zookeeper_dir(&self) -> String {
        format!(
            "{}/{}",
            self.install_path(),
            strip_archive_suffix(self.zookeeper_tarball())
        )
    }

    /// Directory the Solr tarball extracts into, as an absolute path.
    pub fn solr_dir(&self) -> String {
        format!(
            "{}/{}",
            self.install_path(),
            strip_archive_suffix(self.solr_tarball())
        )
    }

    /// Comma-separated `host:port` list of the whole ZooKeeper ensemble.
    pub fn zookeeper_hostports(&self) -> String {
        self.zookeeper_hosts
            .iter()
            .map(|h| format!("{}:{}", h, self.zookeeper_port))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// `host:port` of the first ZooKeeper node, used by the ZkCLI bootstrap.
    pub fn zookeeper_connect(&self) -> String {
        format!("{}:{}", self.first_zookeeper(), self.zookeeper_port)
    }

    /// URL for the Solr Admin cloud view.
    pub fn solr_admin_url(&self) -> String {
        format!(
            "http://{}:{}/solr/#/~cloud",
            self.first_solr(),
            self.solr_port
        )
    }
}

fn basename(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

fn strip_archive_suffix(name: &str) -> &str {
    name.strip_suffix(".tar.gz")
        .or_else(|| name.strip_suffix(".tgz"))
        .unwrap_or(name)
}

fn default_zookeeper_url() -> String {
    "https://archive.apache.org/dist/zookeeper/zookeeper-3.4.5/zookeeper-3.4.5.tar.gz".to_string()
}

fn default_solr_url() -> String {
    "https://archive.apache.org/dist/lucene/solr/4.3.0/solr-4.3.0.tgz".to_string()
}

fn default_install_dir() -> String {
    "solrig".to_string()
}

fn default_zookeeper_service() -> String {
    "solrig_zookeeper".to_string()
}

fn default_solr_service() -> String {
    "solrig_solr".to_string()
}

fn default_num_shards() -> u32 {
    2
}

fn default_zookeeper_port() -> u16 {
    2181
}

fn default_solr_port() -> u16 {
    8983
}

fn default_registration_path() -> String {
    "/live_nodes".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        "zookeeper_hosts: [vm110, vm111, vm112]\nsolr_hosts: [vm110, vm111, vm112, vm113]\n"
    }

    // -- Parsing and defaults --

    #[test]
    fn minimal_config_gets_defaults() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.ssh.user, "ubuntu");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.num_shards, 2);
        assert_eq!(config.zookeeper_port, 2181);
        assert_eq!(config.solr_port, 8983);
        assert_eq!(config.registration_path, "/live_nodes");
        assert_eq!(config.zookeeper_service, "solrig_zookeeper");
        assert_eq!(config.solr_service, "solrig_solr");
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let yaml = "zookeeper_hosts: [a]\nsolr_hosts: [b]\nssh:\n  user: deploy\n  port: 2222\n  identity_file: /keys/id_rsa\nnum_shards: 4\n";
        let config = ClusterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.ssh.user, "deploy");
        assert_eq!(config.ssh.port, 2222);
        assert_eq!(config.ssh.identity_file.as_deref(), Some("/keys/id_rsa"));
        assert_eq!(config.num_shards, 4);
    }

    #[test]
    fn new_fills_defaults_and_validates() {
        let config =
            ClusterConfig::new(vec!["vm110".into()], vec!["vm110".into(), "vm111".into()])
                .unwrap();
        assert_eq!(config.ssh.user, "ubuntu");
        assert_eq!(config.zookeeper_service, "solrig_zookeeper");
        assert_eq!(config.first_solr(), "vm110");

        let err = ClusterConfig::new(Vec::new(), vec!["vm110".into()]).unwrap_err();
        assert!(err.to_string().contains("zookeeper_hosts"));
        let err = ClusterConfig::new(vec!["vm110".into()], Vec::new()).unwrap_err();
        assert!(err.to_string().contains("solr_hosts"));
    }

    #[test]
    fn empty_zookeeper_hosts_rejected() {
        let err = ClusterConfig::from_yaml("zookeeper_hosts: []\nsolr_hosts: [a]\n").unwrap_err();
        assert!(err.to_string().contains("zookeeper_hosts"));
    }

    #[test]
    fn empty_solr_hosts_rejected() {
        let err = ClusterConfig::from_yaml("zookeeper_hosts: [a]\nsolr_hosts: []\n").unwrap_err();
        assert!(err.to_string().contains("solr_hosts"));
    }

    // -- Derived values --

    #[test]
    fn all_hosts_deduplicates_preserving_order() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.all_hosts(), vec!["vm110", "vm111", "vm112", "vm113"]);
    }

    #[test]
    fn first_nodes() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.first_zookeeper(), "vm110");
        assert_eq!(config.first_solr(), "vm110");
    }

    #[test]
    fn tarball_names_are_url_basenames() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.zookeeper_tarball(), "zookeeper-3.4.5.tar.gz");
        assert_eq!(config.solr_tarball(), "solr-4.3.0.tgz");
    }

    #[test]
    fn extracted_dirs_strip_archive_suffixes() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(
            config.zookeeper_dir(),
            "/home/ubuntu/solrig/zookeeper-3.4.5"
        );
        assert_eq!(config.solr_dir(), "/home/ubuntu/solrig/solr-4.3.0");
    }

    #[test]
    fn zookeeper_hostports_joins_ensemble() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(
            config.zookeeper_hostports(),
            "vm110:2181,vm111:2181,vm112:2181"
        );
        assert_eq!(config.zookeeper_connect(), "vm110:2181");
    }

    #[test]
    fn admin_url_points_at_first_solr() {
        let config = ClusterConfig::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.solr_admin_url(), "http://vm110:8983/solr/#/~cloud");
    }

    // -- SSH args --

    #[test]
    fn ssh_base_args_without_key() {
        let ssh = SshSettings::default();
        let args = ssh.base_args();
        assert!(args.contains(&"-p".to_string()));
        assert!(args.contains(&"22".to_string()));
        assert!(!args.contains(&"-i".to_string()));
    }

    #[test]
    fn ssh_base_args_with_key() {
        let ssh = SshSettings {
            user: "deploy".into(),
            port: 2222,
            identity_file: Some("/keys/id_rsa".into()),
        };
        let args = ssh.base_args();
        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"/keys/id_rsa".to_string()));
        assert!(args.contains(&"2222".to_string()));
        assert_eq!(ssh.user_at("vm110"), "deploy@vm110");
    }
}
