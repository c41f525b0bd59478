//! ZooKeeper tasks: ensemble config, node identity, service definition, and
//! the probe commands the convergence waits run against each node.

/// Commands that assign a node its ensemble id: `data/myid` must hold the
/// 1-based id matching its `server.N` line in `zoo.cfg`.
pub fn myid_commands(zookeeper_dir: &str, id: u32) -> Vec<String> {
    vec![
        format!("mkdir -p {}/data", zookeeper_dir),
        format!("echo {} > {}/data/myid", id, zookeeper_dir),
    ]
}

/// Render `zoo.cfg` for the ensemble. `hosts` must be in `myid` order.
pub fn render_zoo_cfg(hosts: &[String], zookeeper_dir: &str, client_port: u16) -> String {
    let mut cfg = String::new();
    cfg.push_str("tickTime=2000\n");
    cfg.push_str("initLimit=10\n");
    cfg.push_str("syncLimit=5\n");
    cfg.push_str(&format!("dataDir={}/data\n", zookeeper_dir));
    cfg.push_str(&format!("clientPort={}\n", client_port));
    for (i, host) in hosts.iter().enumerate() {
        cfg.push_str(&format!("server.{}={}:2888:3888\n", i + 1, host));
    }
    cfg
}

/// Remote path of the rendered `zoo.cfg`.
pub fn zoo_cfg_path(zookeeper_dir: &str) -> String {
    format!("{}/conf/zoo.cfg", zookeeper_dir)
}

/// Render the upstart unit that keeps ZooKeeper running in the foreground.
pub fn render_upstart_unit(user: &str, group: &str, zookeeper_dir: &str) -> String {
    format!(
        "description \"ZooKeeper ensemble member\"\n\
         start on runlevel [2345]\n\
         stop on runlevel [016]\n\
         respawn\n\
         setuid {user}\n\
         setgid {group}\n\
         chdir {dir}\n\
         exec bin/zkServer.sh start-foreground\n",
        user = user,
        group = group,
        dir = zookeeper_dir,
    )
}

/// Where upstart expects the unit for the given service name.
pub fn upstart_path(service: &str) -> String {
    format!("/etc/init/{}.conf", service)
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Four-letter-word health check; answers `imok` when the node is serving.
pub fn ruok_command(client_port: u16) -> String {
    format!("echo ruok | nc localhost {}", client_port)
}

/// Probe a node's ensemble role; prints the `Mode:` line of `stat` output.
/// Exits non-zero while the node is electing (grep finds nothing), so this
/// is always run tolerantly.
pub fn mode_probe_command(client_port: u16) -> String {
    format!("echo stat | nc localhost {} | grep Mode:", client_port)
}

/// Run a zkCli command (e.g. `ls /`, `get /live_nodes`) from inside the
/// ZooKeeper install directory.
pub fn zkcli_command(zookeeper_dir: &str, subcommand: &str) -> String {
    format!("cd {} && echo {} | ./bin/zkCli.sh", zookeeper_dir, subcommand)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
