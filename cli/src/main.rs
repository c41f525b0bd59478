//! solrig CLI — the command-line entry point for the cluster provisioner.
//!
//! # Usage
//!
//! ```text
//! solrig check-ssh
//! solrig install zookeeper
//! solrig start zookeeper
//! solrig wait quorum
//! solrig install solr
//! solrig bootstrap
//! solrig start solr
//! solrig wait solr
//! solrig status --json
//! ```

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use solrig_core::cluster::config::ClusterConfig;
use solrig_core::convergence::poller::PollPolicy;
use solrig_core::convergence::waits;
use solrig_core::exec::ShellRunner;
use solrig_core::orchestrator::{ClusterOrchestrator, TaskError};

#[derive(Parser)]
#[command(name = "solrig", about = "Provision a ZooKeeper + SolrCloud cluster over SSH")]
struct Cli {
    /// Path to the cluster YAML config.
    #[arg(short, long, env = "SOLRIG_CONFIG", default_value = "cluster.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, ValueEnum)]
enum Service {
    Zookeeper,
    Solr,
}

#[derive(Subcommand)]
enum Command {
    /// Run `hostname` on every host over ssh.
    CheckSsh,
    /// Every host pings every host.
    Ping,
    /// Append a public key to authorized_keys on every host.
    CopyKey { key: String },
    /// Grant the ssh user password-less sudo on every host.
    Sudoers,
    /// Create the install directory on every host.
    CreateDirs,
    /// Upload and run a Java install script on every host.
    InstallJava { script: String },
    /// Print the Java version on every host.
    JavaVersion,
    /// Download the ZooKeeper and Solr tarballs locally.
    Download,
    /// Upload, extract, and configure a service on its hosts.
    Install { service: Service },
    /// Start a service on its hosts.
    Start { service: Service },
    /// Stop a service on its hosts.
    Stop { service: Service },
    /// Block until a readiness condition holds.
    #[command(subcommand)]
    Wait(WaitCommand),
    /// Health-check the ZooKeeper ensemble (ruok + mode per node).
    Check,
    /// Query every Solr node's ping handler and print the raw responses.
    CheckSolr,
    /// Show ZooKeeper content (root, live nodes, overseer).
    Show,
    /// Upload the collection config and bootstrap the solr home.
    Bootstrap,
    /// Remove service definitions and install directories from every host.
    Uninstall,
    /// Bring up the whole cluster: ZooKeeper, quorum, Solr, readiness.
    InstallAll,
    /// Full run on fresh machines: access, Java, cluster, sample data, status.
    Everything {
        /// Public key to install on every host.
        key: String,
        /// Java install script to upload and run.
        java_script: String,
    },
    /// Load the shipped `books.json` sample into the collection.
    SampleData,
    /// Query the collection (add --each-node for per-node distrib=false).
    Query {
        #[arg(default_value = "*:*")]
        q: String,
        #[arg(long)]
        each_node: bool,
    },
    /// Show core STATUS from every node's admin handler.
    CoreStatus,
    /// Tail a service's upstart log on its hosts.
    Logs { service: Service },
    /// Service status for every host.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Print the Solr Admin cloud-view URL.
    Url,
}

#[derive(Subcommand)]
enum WaitCommand {
    /// Wait until every ZooKeeper node settles into leader or follower.
    Quorum {
        /// Give up after this many seconds (retries forever by default).
        #[arg(long)]
        max_wait_secs: Option<u64>,
    },
    /// Wait until every Solr node is running, listening, and registered.
    Solr,
    /// Wait until a TCP port is listened on at a host.
    Port {
        host: String,
        port: u16,
        #[arg(long, default_value_t = 60)]
        max_wait_secs: u64,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match ClusterConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("solrig: {}", e);
            process::exit(1);
        }
    };

    let orch = ClusterOrchestrator::new(config, Box::new(ShellRunner));
    if let Err(e) = run(&orch, cli.command) {
        eprintln!("solrig: {}", e);
        process::exit(1);
    }
}

fn run(orch: &ClusterOrchestrator, command: Command) -> Result<(), TaskError> {
    match command {
        Command::CheckSsh => {
            for line in orch.check_ssh()? {
                println!("{}", line);
            }
        }
        Command::Ping => {
            orch.ping_hosts()?;
            println!("all hosts reachable from all hosts");
        }
        Command::CopyKey { key } => orch.copy_ssh_key(&key)?,
        Command::Sudoers => orch.setup_sudoers()?,
        Command::CreateDirs => orch.create_install_dirs()?,
        Command::InstallJava { script } => orch.install_java(&script)?,
        Command::JavaVersion => {
            for line in orch.java_version()? {
                println!("{}", line);
            }
        }
        Command::Download => orch.download_tarballs()?,
        Command::Install { service: Service::Zookeeper } => orch.install_zookeeper()?,
        Command::Install { service: Service::Solr } => orch.install_solr()?,
        Command::Start { service: Service::Zookeeper } => orch.start_zookeeper()?,
        Command::Start { service: Service::Solr } => orch.start_solr()?,
        Command::Stop { service: Service::Zookeeper } => orch.stop_zookeeper()?,
        Command::Stop { service: Service::Solr } => orch.stop_solr()?,
        Command::Wait(WaitCommand::Quorum { max_wait_secs }) => {
            let done = orch.wait_for_quorum(max_wait_secs.map(Duration::from_secs))?;
            println!("quorum formed after {} round(s)", done.rounds);
        }
        Command::Wait(WaitCommand::Solr) => {
            let state = orch.wait_for_solr()?;
            println!("{}", state.trim());
        }
        Command::Wait(WaitCommand::Port { host, port, max_wait_secs, interval_secs }) => {
            let policy = PollPolicy::bounded(
                Duration::from_secs(interval_secs),
                Duration::from_secs(max_wait_secs),
            );
            let done = waits::wait_for_port(orch.shell(), &host, port, policy)?;
            println!("port {} on {} up after {} round(s)", port, host, done.rounds);
        }
        Command::Check => {
            for line in orch.check_zookeeper()? {
                println!("{}", line);
            }
        }
        Command::CheckSolr => {
            for line in orch.check_solr()? {
                println!("{}", line);
            }
        }
        Command::Show => print!("{}", orch.show_zookeeper()?),
        Command::Bootstrap => orch.bootstrap_solrcloud()?,
        Command::Logs { service } => {
            let (name, hosts) = match service {
                Service::Zookeeper => (
                    orch.config().zookeeper_service.clone(),
                    orch.config().zookeeper_hosts.clone(),
                ),
                Service::Solr => (
                    orch.config().solr_service.clone(),
                    orch.config().solr_hosts.clone(),
                ),
            };
            for chunk in orch.service_logs(&name, &hosts)? {
                print!("{}", chunk);
            }
        }
        Command::Uninstall => orch.uninstall()?,
        Command::InstallAll => {
            let state = orch.install_all()?;
            println!("{}", state.trim());
            println!("{}", orch.config().solr_admin_url());
        }
        Command::Everything { key, java_script } => {
            orch.everything(&key, &java_script)?;
            println!("{}", orch.config().solr_admin_url());
        }
        Command::SampleData => orch.load_sample_data()?,
        Command::Query { q, each_node } => {
            if each_node {
                for chunk in orch.sample_query_each_node(&q)? {
                    print!("{}", chunk);
                }
            } else {
                print!("{}", orch.sample_query(&q)?);
            }
        }
        Command::CoreStatus => {
            for chunk in orch.core_status()? {
                print!("{}", chunk);
            }
        }
        Command::Status { json } => {
            let statuses = orch.status()?;
            if json {
                match serde_json::to_string_pretty(&statuses) {
                    Ok(out) => println!("{}", out),
                    Err(e) => {
                        eprintln!("solrig: {}", e);
                        process::exit(1);
                    }
                }
            } else {
                for st in statuses {
                    println!("{}:", st.host);
                    if let Some(zk) = st.zookeeper {
                        println!("  zookeeper: {}", zk);
                    }
                    if let Some(solr) = st.solr {
                        println!("  solr: {}", solr);
                    }
                }
            }
        }
        Command::Url => println!("{}", orch.config().solr_admin_url()),
    }
    Ok(())
}
