//! Provisioning tasks as pure command builders.
//!
//! Every task builds shell command strings or config-file contents; nothing
//! here touches the network or the filesystem. The orchestrator decides on
//! which hosts, with what tolerance, and under whose privileges each command
//! runs.

pub mod solr;
pub mod system;
pub mod zookeeper;

/// Command that writes `contents` to `path` on the remote host via a quoted
/// heredoc. `use_sudo` routes the write through `sudo tee` for paths the
/// login user cannot touch (service definitions under /etc).
pub fn write_file_command(path: &str, contents: &str, use_sudo: bool) -> String {
    if use_sudo {
        format!("sudo tee {} > /dev/null <<'EOF'\n{}\nEOF", path, contents.trim_end())
    } else {
        format!("cat > {} <<'EOF'\n{}\nEOF", path, contents.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_file_uses_quoted_heredoc() {
        let cmd = write_file_command("/tmp/x.cfg", "a=1\nb=2\n", false);
        assert!(cmd.starts_with("cat > /tmp/x.cfg <<'EOF'\n"));
        assert!(cmd.ends_with("a=1\nb=2\nEOF"));
    }

    #[test]
    fn write_file_sudo_routes_through_tee() {
        let cmd = write_file_command("/etc/init/zk.conf", "exec foo", true);
        assert!(cmd.starts_with("sudo tee /etc/init/zk.conf > /dev/null <<'EOF'"));
    }
}
