//! Host-level tasks: connectivity smoke tests, SSH keys, sudoers, Java, and
//! generic service control.

/// Smoke test: prints the remote hostname.
pub fn hostname_command() -> String {
    "hostname".to_string()
}

/// One ping, to test hostname resolution from inside the cluster.
pub fn ping_command(host: &str) -> String {
    format!("ping -c 1 {}", host)
}

/// Append an uploaded public key to the remote `authorized_keys`, then
/// remove the upload. `remote_key_path` is where the key was copied to.
pub fn install_key_commands(remote_key_path: &str) -> Vec<String> {
    vec![
        "mkdir -p ~/.ssh".to_string(),
        format!("cat {} >> ~/.ssh/authorized_keys", remote_key_path),
        format!("rm {}", remote_key_path),
    ]
}

/// The sudoers line granting the user password-less sudo.
pub fn sudoers_line(user: &str) -> String {
    format!("{}  ALL=(ALL) NOPASSWD:ALL", user)
}

/// Append the password-less sudo line to /etc/sudoers, once. Run under sudo.
pub fn append_sudoers_command(user: &str) -> String {
    let line = sudoers_line(user);
    format!(
        "grep -qxF '{}' /etc/sudoers || echo '{}' >> /etc/sudoers",
        line, line
    )
}

/// Create the install directory that holds both distributions.
pub fn create_dir_command(path: &str) -> String {
    format!("mkdir -p {}", path)
}

/// Run an uploaded Java install script. Run under sudo.
pub fn java_install_command(script_path: &str) -> String {
    format!("bash -x {}", script_path)
}

/// Print the Java version (goes to stderr, so callers tolerate the output).
pub fn java_version_command() -> String {
    "java -version 2>&1".to_string()
}

/// Fetch a tarball to the local working directory.
pub fn download_command(url: &str) -> String {
    format!("wget {}", url)
}

/// Extract a tarball inside the install directory.
pub fn extract_command(install_dir: &str, tarball: &str) -> String {
    format!("cd {} && tar xf {}", install_dir, tarball)
}

/// Remove a single file, ignoring absence. Run under sudo for /etc paths.
pub fn remove_file_command(path: &str) -> String {
    format!("rm -f {}", path)
}

/// Remove a directory tree, ignoring absence.
pub fn remove_dir_command(path: &str) -> String {
    format!("rm -fr {}", path)
}

// ---------------------------------------------------------------------------
// Service control (upstart)
// ---------------------------------------------------------------------------

/// Start a service. Run under sudo.
pub fn service_start_command(service: &str) -> String {
    format!("service {} start", service)
}

/// Stop a service. Run under sudo.
pub fn service_stop_command(service: &str) -> String {
    format!("service {} stop", service)
}

/// Query a service's status. Run under sudo; callers match on "running".
pub fn service_status_command(service: &str) -> String {
    format!("service {} status", service)
}

/// Tail the upstart log for a service. Run under sudo.
pub fn service_log_command(service: &str) -> String {
    format!("tail /var/log/upstart/{}.log", service)
}

/// Fetch a URL quietly, for pass-through health responses.
pub fn http_get_command(url: &str) -> String {
    format!("curl --silent --show-error {}", url)
}

/// Probe whether a TCP port is in the listening state. Prints `no` when it
/// is not, so the command itself always exits zero.
pub fn port_probe_command(port: u16) -> String {
    format!(
        "netstat --listen --numeric | grep ':{} ' || echo no",
        port
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
