//! Cluster orchestrator — connects the pure task builders to a `CommandRunner`.
//!
//! `ClusterOrchestrator` is the integration layer: it owns the immutable
//! [`ClusterConfig`] and a [`RemoteShell`], and sequences the provisioning
//! operations host by host. It is the only component that causes side
//! effects (through the injected runner).

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::cluster::config::ClusterConfig;
use crate::convergence::poller::{Convergence, WaitError};
use crate::convergence::{status, waits};
use crate::exec::{CommandRunner, ExecError, RemoteShell};
use crate::tasks::{self, solr, system, zookeeper};

/// Collection created by the SolrCloud bootstrap.
pub const COLLECTION: &str = "collection1";
/// Name the collection config is uploaded under.
pub const CONF_SET: &str = "configuration1";

// ---------------------------------------------------------------------------
// TaskError
// ---------------------------------------------------------------------------

/// A provisioning operation failed.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Wait(#[from] WaitError),
    #[error("zookeeper on '{host}' is not ok: {output}")]
    HealthCheckFailed { host: String, output: String },
    #[error("service '{service}' on '{host}' is not running: {status}")]
    ServiceNotRunning {
        host: String,
        service: String,
        status: String,
    },
}

// ---------------------------------------------------------------------------
// HostStatus
// ---------------------------------------------------------------------------

/// Per-host service status summary.
#[derive(Debug, Clone, Serialize)]
pub struct HostStatus {
    pub host: String,
    /// Status line of the ZooKeeper service, if this host runs one.
    pub zookeeper: Option<String>,
    /// Status line of the Solr service, if this host runs one.
    pub solr: Option<String>,
}

// ---------------------------------------------------------------------------
// ClusterOrchestrator
// ---------------------------------------------------------------------------

pub struct ClusterOrchestrator {
    config: ClusterConfig,
    shell: RemoteShell,
}

impl ClusterOrchestrator {
    pub fn new(config: ClusterConfig, runner: Box<dyn CommandRunner>) -> Self {
        let shell = RemoteShell::new(config.ssh.clone(), runner);
        ClusterOrchestrator { config, shell }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn shell(&self) -> &RemoteShell {
        &self.shell
    }

    // -- Connectivity and host preparation --

    /// Run `hostname` on every host, to test ssh.
    pub fn check_ssh(&self) -> Result<Vec<String>, TaskError> {
        let mut lines = Vec::new();
        for host in self.config.all_hosts() {
            let out = self.shell.run(&host, &system::hostname_command())?;
            lines.push(format!("{}: {}", host, out.stdout.trim()));
        }
        Ok(lines)
    }

    /// Every host pings every host, to test hostname resolution cluster-wide.
    pub fn ping_hosts(&self) -> Result<(), TaskError> {
        let hosts = self.config.all_hosts();
        for host in &hosts {
            for peer in &hosts {
                self.shell.run(host, &system::ping_command(peer))?;
            }
        }
        Ok(())
    }

    /// Append a public key to `authorized_keys` on every host, for
    /// password-less ssh.
    pub fn copy_ssh_key(&self, local_key_path: &str) -> Result<(), TaskError> {
        for host in self.config.all_hosts() {
            self.shell.copy(local_key_path, &host, "~")?;
            let remote_key = local_key_path.rsplit('/').next().unwrap_or(local_key_path);
            for cmd in system::install_key_commands(remote_key) {
                self.shell.run(&host, &cmd)?;
            }
        }
        Ok(())
    }

    /// Grant the SSH user password-less sudo on every host.
    pub fn setup_sudoers(&self) -> Result<(), TaskError> {
        for host in self.config.all_hosts() {
            self.shell
                .sudo(&host, &system::append_sudoers_command(&self.config.ssh.user))?;
        }
        Ok(())
    }

    /// Create the install directory on every host.
    pub fn create_install_dirs(&self) -> Result<(), TaskError> {
        let install = self.config.install_path();
        for host in self.config.all_hosts() {
            self.shell.run(&host, &system::create_dir_command(&install))?;
        }
        Ok(())
    }

    /// Upload and run the Java install script on every host.
    pub fn install_java(&self, local_script_path: &str) -> Result<(), TaskError> {
        let install = self.config.install_path();
        let script = local_script_path
            .rsplit('/')
            .next()
            .unwrap_or(local_script_path);
        for host in self.config.all_hosts() {
            info!(host = %host, "installing java");
            self.shell.run(&host, &system::create_dir_command(&install))?;
            self.shell.copy(local_script_path, &host, &install)?;
            self.shell
                .sudo(&host, &system::java_install_command(&format!("{}/{}", install, script)))?;
        }
        Ok(())
    }

    /// Print the Java version on every host.
    pub fn java_version(&self) -> Result<Vec<String>, TaskError> {
        let mut lines = Vec::new();
        for host in self.config.all_hosts() {
            let out = self.shell.run(&host, &system::java_version_command())?;
            lines.push(format!("{}: {}", host, out.stdout.lines().next().unwrap_or("").trim()));
        }
        Ok(lines)
    }

    /// Download both tarballs to the local working directory. Skips files
    /// that already exist.
    pub fn download_tarballs(&self) -> Result<(), TaskError> {
        for (tarball, url) in [
            (self.config.zookeeper_tarball(), &self.config.zookeeper_url),
            (self.config.solr_tarball(), &self.config.solr_url),
        ] {
            if std::path::Path::new(tarball).exists() {
                info!(tarball, "already downloaded");
                continue;
            }
            self.shell.run_local(&system::download_command(url))?;
        }
        Ok(())
    }

    // -- ZooKeeper --

    /// Upload, extract, and configure ZooKeeper on every ensemble node:
    /// `myid` in host-list order, a shared `zoo.cfg`, and the upstart unit.
    pub fn install_zookeeper(&self) -> Result<(), TaskError> {
        let install = self.config.install_path();
        let zk_dir = self.config.zookeeper_dir();
        let tarball = self.config.zookeeper_tarball();
        for (i, host) in self.config.zookeeper_hosts.iter().enumerate() {
            info!(host = %host, id = i + 1, "installing zookeeper");
            self.shell.run(host, &system::create_dir_command(&install))?;
            self.shell.copy(tarball, host, &install)?;
            self.shell.run(host, &system::extract_command(&install, tarball))?;
            for cmd in zookeeper::myid_commands(&zk_dir, (i + 1) as u32) {
                self.shell.run(host, &cmd)?;
            }
            let cfg = zookeeper::render_zoo_cfg(
                &self.config.zookeeper_hosts,
                &zk_dir,
                self.config.zookeeper_port,
            );
            self.shell.run(
                host,
                &tasks::write_file_command(&zookeeper::zoo_cfg_path(&zk_dir), &cfg, false),
            )?;
            let unit = zookeeper::render_upstart_unit(
                &self.config.ssh.user,
                &self.config.ssh.user,
                &zk_dir,
            );
            self.shell.run(
                host,
                &tasks::write_file_command(
                    &zookeeper::upstart_path(&self.config.zookeeper_service),
                    &unit,
                    true,
                ),
            )?;
        }
        Ok(())
    }

    pub fn start_zookeeper(&self) -> Result<(), TaskError> {
        for host in &self.config.zookeeper_hosts {
            info!(host = %host, "starting zookeeper");
            self.shell
                .sudo(host, &system::service_start_command(&self.config.zookeeper_service))?;
        }
        Ok(())
    }

    pub fn stop_zookeeper(&self) -> Result<(), TaskError> {
        for host in &self.config.zookeeper_hosts {
            info!(host = %host, "stopping zookeeper");
            self.shell
                .sudo_tolerant(host, &system::service_stop_command(&self.config.zookeeper_service))?;
        }
        Ok(())
    }

    /// Wait for the ensemble to elect a leader and settle every node's role.
    /// Retries indefinitely unless `max_wait` is given.
    pub fn wait_for_quorum(&self, max_wait: Option<Duration>) -> Result<Convergence, TaskError> {
        info!("waiting for zookeeper quorum");
        waits::wait_for_quorum(
            &self.shell,
            &self.config.zookeeper_hosts,
            self.config.zookeeper_port,
            waits::quorum_policy().with_max_wait(max_wait),
        )
        .map_err(Into::into)
    }

    /// Ask every node `ruok` and report its mode. Fails unless every node
    /// answers `imok`.
    pub fn check_zookeeper(&self) -> Result<Vec<String>, TaskError> {
        let mut lines = Vec::new();
        for host in &self.config.zookeeper_hosts {
            let out = self
                .shell
                .run(host, &zookeeper::ruok_command(self.config.zookeeper_port))?;
            if !status::health_ok(&out.stdout) {
                return Err(TaskError::HealthCheckFailed {
                    host: host.clone(),
                    output: out.stdout,
                });
            }
            let mode = self
                .shell
                .run_tolerant(host, &zookeeper::mode_probe_command(self.config.zookeeper_port))?;
            lines.push(format!("{}: imok {}", host, mode.stdout.trim()));
        }
        Ok(lines)
    }

    /// Show ZooKeeper content: root, live nodes, and the overseer record.
    pub fn show_zookeeper(&self) -> Result<String, TaskError> {
        let zk_dir = self.config.zookeeper_dir();
        let host = self.config.first_zookeeper();
        let mut out = String::new();
        let ls_registrations = format!("ls {}", self.config.registration_path);
        for subcommand in ["ls /", ls_registrations.as_str(), "get /overseer"] {
            let result = self
                .shell
                .run_tolerant(host, &zookeeper::zkcli_command(&zk_dir, subcommand))?;
            out.push_str(&result.stdout);
        }
        Ok(out)
    }

    // -- Solr --

    /// Upload, extract, and configure Solr on every Solr node.
    pub fn install_solr(&self) -> Result<(), TaskError> {
        let install = self.config.install_path();
        let tarball = self.config.solr_tarball();
        for host in &self.config.solr_hosts {
            info!(host = %host, "installing solr");
            self.shell.run(host, &system::create_dir_command(&install))?;
            self.shell.copy(tarball, host, &install)?;
            self.shell.run(host, &system::extract_command(&install, tarball))?;
            let unit = solr::render_upstart_unit(
                &self.config.ssh.user,
                &self.config.ssh.user,
                &self.config.solr_dir(),
                host,
                self.config.num_shards,
                &self.config.zookeeper_hostports(),
            );
            self.shell.run(
                host,
                &tasks::write_file_command(
                    &zookeeper::upstart_path(&self.config.solr_service),
                    &unit,
                    true,
                ),
            )?;
        }
        Ok(())
    }

    /// Upload the collection config into ZooKeeper and bootstrap the solr
    /// home, from the first Solr node.
    pub fn bootstrap_solrcloud(&self) -> Result<(), TaskError> {
        let host = self.config.first_solr();
        info!(host = %host, "bootstrapping solrcloud");
        for cmd in solr::bootstrap_commands(
            &self.config.solr_dir(),
            &self.config.zookeeper_connect(),
            COLLECTION,
            CONF_SET,
        ) {
            self.shell.run(host, &cmd)?;
        }
        Ok(())
    }

    /// Start Solr on every node. Idempotent: nodes already reporting
    /// `running` are skipped.
    pub fn start_solr(&self) -> Result<(), TaskError> {
        for host in &self.config.solr_hosts {
            let st = self
                .shell
                .sudo_tolerant(host, &system::service_status_command(&self.config.solr_service))?;
            if st.stdout.contains("running") {
                info!(host = %host, "solr already running");
                continue;
            }
            info!(host = %host, "starting solr");
            self.shell
                .sudo(host, &system::service_start_command(&self.config.solr_service))?;
        }
        Ok(())
    }

    /// Query every Solr node's ping handler from the local machine. The
    /// JSON responses are passed through untouched.
    pub fn check_solr(&self) -> Result<Vec<String>, TaskError> {
        let mut lines = Vec::new();
        for host in &self.config.solr_hosts {
            let out = self.shell.run_local(&system::http_get_command(&solr::ping_url(
                host,
                self.config.solr_port,
            )))?;
            lines.push(format!("{}: {}", host, out.stdout.trim()));
        }
        Ok(lines)
    }

    pub fn stop_solr(&self) -> Result<(), TaskError> {
        for host in &self.config.solr_hosts {
            info!(host = %host, "stopping solr");
            self.shell
                .sudo_tolerant(host, &system::service_stop_command(&self.config.solr_service))?;
        }
        Ok(())
    }

    /// Wait for the Solr cluster to come up: the service must report
    /// `running` on every node, then every node's port must be listened on,
    /// then every node must appear under the registration path. Returns the
    /// cluster state record for display.
    pub fn wait_for_solr(&self) -> Result<String, TaskError> {
        for host in &self.config.solr_hosts {
            let st = self
                .shell
                .sudo_tolerant(host, &system::service_status_command(&self.config.solr_service))?;
            if !st.stdout.contains("running") {
                return Err(TaskError::ServiceNotRunning {
                    host: host.clone(),
                    service: self.config.solr_service.clone(),
                    status: st.stdout.trim().to_string(),
                });
            }
            waits::wait_for_port(&self.shell, host, self.config.solr_port, waits::port_policy())?;
        }
        waits::wait_for_registration(
            &self.shell,
            self.config.first_zookeeper(),
            &self.config.zookeeper_dir(),
            &self.config.registration_path,
            self.config.solr_hosts.len(),
            waits::registration_policy(),
        )?;
        let state = self.shell.run_tolerant(
            self.config.first_zookeeper(),
            &zookeeper::zkcli_command(&self.config.zookeeper_dir(), "get /clusterstate.json"),
        )?;
        Ok(state.stdout)
    }

    // -- Sample data --

    /// Post the shipped `books.json` sample into the collection, from the
    /// first Solr node.
    pub fn load_sample_data(&self) -> Result<(), TaskError> {
        let host = self.config.first_solr();
        info!(host = %host, "loading sample data");
        self.shell.run(
            host,
            &solr::load_sample_data_command(&self.config.solr_dir(), host, self.config.solr_port),
        )?;
        Ok(())
    }

    /// Query the collection from the local machine, against the first node.
    pub fn sample_query(&self, q: &str) -> Result<String, TaskError> {
        let out = self.shell.run_local(&solr::query_command(
            self.config.first_solr(),
            self.config.solr_port,
            q,
        ))?;
        Ok(out.stdout)
    }

    /// Query every node for its own documents only (`distrib=false`), to see
    /// how documents are spread across shards.
    pub fn sample_query_each_node(&self, q: &str) -> Result<Vec<String>, TaskError> {
        let mut chunks = Vec::new();
        for host in &self.config.solr_hosts {
            let out = self
                .shell
                .run(host, &solr::local_query_command(self.config.solr_port, q))?;
            chunks.push(format!("== {} ==\n{}", host, out.stdout));
        }
        Ok(chunks)
    }

    /// Core STATUS from every node's own admin handler.
    pub fn core_status(&self) -> Result<Vec<String>, TaskError> {
        let mut chunks = Vec::new();
        for host in &self.config.solr_hosts {
            let out = self
                .shell
                .run(host, &solr::core_status_command(self.config.solr_port))?;
            chunks.push(format!("== {} ==\n{}", host, out.stdout));
        }
        Ok(chunks)
    }

    // -- Teardown --

    /// Remove the ZooKeeper service definition from every ensemble node.
    pub fn uninstall_zookeeper_upstart(&self) -> Result<(), TaskError> {
        for host in &self.config.zookeeper_hosts {
            self.shell.sudo(
                host,
                &system::remove_file_command(&zookeeper::upstart_path(
                    &self.config.zookeeper_service,
                )),
            )?;
        }
        Ok(())
    }

    /// Remove the Solr service definition from every Solr node.
    pub fn uninstall_solr_upstart(&self) -> Result<(), TaskError> {
        for host in &self.config.solr_hosts {
            self.shell.sudo(
                host,
                &system::remove_file_command(&zookeeper::upstart_path(&self.config.solr_service)),
            )?;
        }
        Ok(())
    }

    /// Remove the install directory from every host.
    pub fn uninstall_install_dirs(&self) -> Result<(), TaskError> {
        for host in self.config.all_hosts() {
            self.shell
                .run(&host, &system::remove_dir_command(&self.config.install_path()))?;
        }
        Ok(())
    }

    /// Full teardown: service definitions first, then the install trees.
    pub fn uninstall(&self) -> Result<(), TaskError> {
        info!("uninstalling cluster");
        self.uninstall_solr_upstart()?;
        self.uninstall_zookeeper_upstart()?;
        self.uninstall_install_dirs()
    }

    // -- Composite flows --

    /// Download, install, and start the whole ZooKeeper ensemble.
    pub fn provision_zookeeper(&self) -> Result<(), TaskError> {
        self.download_tarballs()?;
        self.install_zookeeper()?;
        self.start_zookeeper()
    }

    /// Download, install, bootstrap, and start every Solr node.
    pub fn provision_solr(&self) -> Result<(), TaskError> {
        self.download_tarballs()?;
        self.install_solr()?;
        self.bootstrap_solrcloud()?;
        self.start_solr()
    }

    /// Bring up the whole cluster: ZooKeeper first, wait for quorum, then
    /// Solr, wait for readiness. Returns the cluster state record.
    pub fn install_all(&self) -> Result<String, TaskError> {
        self.create_install_dirs()?;
        self.provision_zookeeper()?;
        self.wait_for_quorum(None)?;
        self.provision_solr()?;
        self.wait_for_solr()
    }

    /// The whole story on fresh machines: connectivity, access, Java, the
    /// cluster, sample data, and a status sweep.
    pub fn everything(&self, key_path: &str, java_script_path: &str) -> Result<(), TaskError> {
        for line in self.check_ssh()? {
            info!("{}", line);
        }
        self.copy_ssh_key(key_path)?;
        self.setup_sudoers()?;
        self.create_install_dirs()?;
        self.install_java(java_script_path)?;
        for line in self.java_version()? {
            info!("{}", line);
        }
        self.install_all()?;
        self.load_sample_data()?;
        info!("{}", self.sample_query("name:monsters")?.trim());
        for chunk in self.core_status()? {
            info!("{}", chunk.trim());
        }
        Ok(())
    }

    // -- Status --

    /// Tail the upstart log of a service on every host that runs it.
    pub fn service_logs(&self, service: &str, hosts: &[String]) -> Result<Vec<String>, TaskError> {
        let mut lines = Vec::new();
        for host in hosts {
            let out = self
                .shell
                .sudo_tolerant(host, &system::service_log_command(service))?;
            lines.push(format!("== {} ==\n{}", host, out.stdout));
        }
        Ok(lines)
    }

    /// Service status for every host in the cluster.
    pub fn status(&self) -> Result<Vec<HostStatus>, TaskError> {
        let mut statuses = Vec::new();
        for host in self.config.all_hosts() {
            let zookeeper = if self.config.zookeeper_hosts.contains(&host) {
                let st = self
                    .shell
                    .sudo_tolerant(&host, &system::service_status_command(&self.config.zookeeper_service))?;
                Some(st.stdout.trim().to_string())
            } else {
                None
            };
            let solr = if self.config.solr_hosts.contains(&host) {
                let st = self
                    .shell
                    .sudo_tolerant(&host, &system::service_status_command(&self.config.solr_service))?;
                Some(st.stdout.trim().to_string())
            } else {
                None
            };
            statuses.push(HostStatus { host, zookeeper, solr });
        }
        Ok(statuses)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
