//! Solr tasks: service definition and the SolrCloud bootstrap sequence.

/// The directory Solr actually runs from (jetty `start.jar` lives here).
pub fn example_dir(solr_dir: &str) -> String {
    format!("{}/example", solr_dir)
}

/// The sample documents shipped with the distribution.
pub fn exampledocs_dir(solr_dir: &str) -> String {
    format!("{}/example/exampledocs", solr_dir)
}

/// Post the shipped `books.json` sample data into the collection, with an
/// immediate commit. Runs on a Solr node, from the exampledocs directory.
pub fn load_sample_data_command(solr_dir: &str, host: &str, port: u16) -> String {
    format!(
        "cd {} && curl -sS 'http://{}:{}/solr/update/json?commit=true' \
         --data-binary @books.json -H 'Content-type:application/json'",
        exampledocs_dir(solr_dir),
        host,
        port
    )
}

/// Query the collection. The URL is quoted so the shell never sees the `&`s.
pub fn query_command(host: &str, port: u16, q: &str) -> String {
    format!(
        "curl -sS 'http://{}:{}/solr/select?q={}&wt=json&indent=true'",
        host, port, q
    )
}

/// Query one node for its own documents only (`distrib=false`), via
/// localhost. Run on each Solr node to see how documents are spread.
pub fn local_query_command(port: u16, q: &str) -> String {
    format!(
        "curl -sS 'http://localhost:{}/solr/select?q={}&wt=json&indent=true&distrib=false'",
        port, q
    )
}

/// Core STATUS from a node's own admin handler, via localhost.
pub fn core_status_command(port: u16) -> String {
    format!(
        "curl -sS 'http://localhost:{}/solr/admin/cores?action=STATUS&indent=true&wt=json'",
        port
    )
}

/// Health-ping URL of a node. The JSON response is opaque here; callers
/// pass it through untouched.
pub fn ping_url(host: &str, port: u16) -> String {
    format!("http://{}:{}/solr/admin/ping?wt=json", host, port)
}

/// Render the upstart unit for a Solr node. Every node gets the full
/// ZooKeeper connect string; `num_shards` only matters on the node that
/// creates the collection but is harmless elsewhere.
pub fn render_upstart_unit(
    user: &str,
    group: &str,
    solr_dir: &str,
    host: &str,
    num_shards: u32,
    zookeeper_hostports: &str,
) -> String {
    format!(
        "description \"SolrCloud node\"\n\
         start on runlevel [2345]\n\
         stop on runlevel [016]\n\
         respawn\n\
         setuid {user}\n\
         setgid {group}\n\
         chdir {dir}\n\
         exec java -Dhost={host} -DzkHost={zk} -DnumShards={shards} -jar start.jar\n",
        user = user,
        group = group,
        dir = example_dir(solr_dir),
        host = host,
        zk = zookeeper_hostports,
        shards = num_shards,
    )
}

/// The SolrCloud bootstrap: upload the collection config to ZooKeeper, link
/// it, and bootstrap the solr home. Jetty has not run yet at this point, so
/// the commands first extract the webapp to get at ZkCLI's classpath, and
/// clean the extraction up afterwards.
///
/// All commands run from the example directory of the first Solr node.
pub fn bootstrap_commands(
    solr_dir: &str,
    zookeeper_connect: &str,
    collection: &str,
    conf_set: &str,
) -> Vec<String> {
    let dir = example_dir(solr_dir);
    let zk_cli =
        "java -classpath solr-webapp-tmp/WEB-INF/lib/*:./lib/ext/* org.apache.solr.cloud.ZkCLI";
    let solr_home = "solr";
    let mut cmds = vec![format!(
        "cd {} && mkdir solr-webapp-tmp && (cd solr-webapp-tmp && jar xf ../webapps/solr.war)",
        dir
    )];
    cmds.push(format!(
        "cd {} && {} -cmd upconfig -zkhost {} -d solr/{}/conf/ -n {}",
        dir, zk_cli, zookeeper_connect, collection, conf_set
    ));
    cmds.push(format!(
        "cd {} && {} -cmd linkconfig -zkhost {} -collection {} -confname {} -solrhome {}",
        dir, zk_cli, zookeeper_connect, collection, conf_set, solr_home
    ));
    cmds.push(format!(
        "cd {} && {} -cmd bootstrap -zkhost {} -solrhome {}",
        dir, zk_cli, zookeeper_connect, solr_home
    ));
    // Re-upload after bootstrap: bootstrap overwrites the linked config with
    // the local solr home copy.
    cmds.push(format!(
        "cd {} && {} -cmd upconfig -zkhost {} -d solr/{}/conf/ -n {}",
        dir, zk_cli, zookeeper_connect, collection, conf_set
    ));
    cmds.push(format!("cd {} && rm -fr solr-webapp-tmp", dir));
    cmds
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SOLR_DIR: &str = "/home/ubuntu/solrig/solr-4.3.0";

    #[test]
    fn upstart_unit_embeds_topology() {
        let unit = render_upstart_unit(
            "ubuntu",
            "ubuntu",
            SOLR_DIR,
            "vm113",
            2,
            "vm110:2181,vm111:2181,vm112:2181",
        );
        assert!(unit.contains(&format!("chdir {}/example\n", SOLR_DIR)));
        assert!(unit.contains("-Dhost=vm113"));
        assert!(unit.contains("-DzkHost=vm110:2181,vm111:2181,vm112:2181"));
        assert!(unit.contains("-DnumShards=2"));
        assert!(unit.contains("-jar start.jar\n"));
    }

    #[test]
    fn bootstrap_extracts_webapp_first_and_cleans_up_last() {
        let cmds = bootstrap_commands(SOLR_DIR, "vm110:2181", "collection1", "configuration1");
        assert_eq!(cmds.len(), 6);
        assert!(cmds[0].contains("jar xf ../webapps/solr.war"));
        assert!(cmds[5].ends_with("rm -fr solr-webapp-tmp"));
    }

    #[test]
    fn bootstrap_runs_the_four_zkcli_steps_in_order() {
        let cmds = bootstrap_commands(SOLR_DIR, "vm110:2181", "collection1", "configuration1");
        assert!(cmds[1].contains("-cmd upconfig"));
        assert!(cmds[1].contains("-d solr/collection1/conf/ -n configuration1"));
        assert!(cmds[2].contains("-cmd linkconfig"));
        assert!(cmds[2].contains("-collection collection1 -confname configuration1 -solrhome solr"));
        assert!(cmds[3].contains("-cmd bootstrap"));
        assert!(cmds[4].contains("-cmd upconfig"));
        for cmd in &cmds[1..5] {
            assert!(cmd.contains("-zkhost vm110:2181"));
            assert!(cmd.contains("org.apache.solr.cloud.ZkCLI"));
        }
    }

    #[test]
    fn every_bootstrap_command_runs_from_example_dir() {
        for cmd in bootstrap_commands(SOLR_DIR, "vm110:2181", "c", "cs") {
            assert!(cmd.starts_with(&format!("cd {}/example && ", SOLR_DIR)));
        }
    }

    // -- Sample data and queries --

    #[test]
    fn sample_data_posts_books_from_exampledocs() {
        let cmd = load_sample_data_command(SOLR_DIR, "vm113", 8983);
        assert!(cmd.starts_with(&format!("cd {}/example/exampledocs && ", SOLR_DIR)));
        assert!(cmd.contains("'http://vm113:8983/solr/update/json?commit=true'"));
        assert!(cmd.contains("--data-binary @books.json"));
        assert!(cmd.contains("-H 'Content-type:application/json'"));
    }

    #[test]
    fn query_urls_are_shell_quoted() {
        assert_eq!(
            query_command("vm113", 8983, "name:monsters"),
            "curl -sS 'http://vm113:8983/solr/select?q=name:monsters&wt=json&indent=true'"
        );
        assert_eq!(
            local_query_command(8983, "*:*"),
            "curl -sS 'http://localhost:8983/solr/select?q=*:*&wt=json&indent=true&distrib=false'"
        );
    }

    #[test]
    fn core_status_hits_the_admin_handler() {
        let cmd = core_status_command(8983);
        assert!(cmd.contains("'http://localhost:8983/solr/admin/cores?action=STATUS&indent=true&wt=json'"));
    }
}
