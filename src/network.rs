use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::StatusConfig;
use crate::types::Role;

/// Run an external query and return its stdout.
///
/// Spawn errors, non-zero exits, non-UTF-8 output and timeouts all yield
/// `None`. A child still running at the timeout is killed.
pub async fn run_query(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(c) => c,
        Err(e) => {
            log::debug!("{} {}: spawn failed: {}", program, args.join(" "), e);
            return None;
        }
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            log::debug!("{} {}: {}", program, args.join(" "), e);
            return None;
        }
        Err(_) => {
            log::debug!("{} {}: timed out after {:?}", program, args.join(" "), timeout);
            return None;
        }
    };

    // systemctl is-enabled / is-active exit non-zero for every negative answer
    if !output.status.success() {
        log::debug!("{} {}: exited with {}", program, args.join(" "), output.status);
        return None;
    }

    String::from_utf8(output.stdout).ok()
}

fn reports_state(stdout: &str, state: &str) -> bool {
    stdout.trim() == state
}

// `iw dev <if> link` prints "Not connected." when unassociated
fn reports_association(stdout: &str) -> bool {
    stdout.contains("Connected to")
}

/// External collaborators the daemon asks about role and connectivity.
#[derive(Debug, Clone)]
pub struct NetworkCheck {
    systemctl: String,
    iw: String,
    ap_service: String,
    interface: String,
    timeout: Duration,
}

impl NetworkCheck {
    pub fn from_config(config: &StatusConfig) -> Self {
        NetworkCheck {
            systemctl: config.systemctl.clone(),
            iw: config.iw.clone(),
            ap_service: config.ap_service.clone(),
            interface: config.interface.clone(),
            timeout: config.query_timeout(),
        }
    }

    /// Router if the access-point service is enabled, Client otherwise.
    pub async fn detect_role(&self) -> Role {
        let args = ["is-enabled", self.ap_service.as_str()];
        let stdout = run_query(&self.systemctl, &args, self.timeout).await;
        match stdout {
            Some(s) if reports_state(&s, "enabled") => Role::Router,
            _ => Role::Client,
        }
    }

    pub async fn is_connected(&self, role: Role) -> bool {
        match role {
            Role::Router => self.ap_active().await,
            Role::Client => self.wifi_associated().await,
        }
    }

    async fn ap_active(&self) -> bool {
        run_query(&self.systemctl, &["is-active", self.ap_service.as_str()], self.timeout)
            .await
            .map(|s| reports_state(&s, "active"))
            .unwrap_or(false)
    }

    async fn wifi_associated(&self) -> bool {
        run_query(&self.iw, &["dev", self.interface.as_str(), "link"], self.timeout)
            .await
            .map(|s| reports_association(&s))
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    /// Executable shell script standing in for systemctl or iw. Removed on drop.
    pub(crate) struct FakeCommand {
        path: PathBuf,
    }

    impl FakeCommand {
        pub(crate) fn path(&self) -> &Path {
            &self.path
        }

        pub(crate) fn program(&self) -> String {
            self.path.display().to_string()
        }
    }

    impl Drop for FakeCommand {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub(crate) fn fake_command(name: &str, body: &str) -> FakeCommand {
        let path = std::env::temp_dir().join(format!(
            "blinkt_status_{}_{}.sh",
            name,
            std::process::id()
        ));
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        FakeCommand { path }
    }

    fn checker(systemctl: &Path, iw: &Path, timeout: Duration) -> NetworkCheck {
        NetworkCheck {
            systemctl: systemctl.display().to_string(),
            iw: iw.display().to_string(),
            ap_service: "hostapd".to_string(),
            interface: "wlan0".to_string(),
            timeout,
        }
    }

    #[test]
    fn parses_supervisor_answers() {
        assert!(reports_state("enabled\n", "enabled"));
        assert!(!reports_state("disabled\n", "enabled"));
        assert!(!reports_state("enabled-runtime\n", "enabled"));
        assert!(reports_state("active\n", "active"));
        assert!(!reports_state("inactive\n", "active"));
    }

    #[test]
    fn parses_link_answers() {
        let up = "Connected to aa:bb:cc:dd:ee:ff (on wlan0)\n\tSSID: lab\n\tfreq: 2437\n";
        assert!(reports_association(up));
        assert!(!reports_association("Not connected.\n"));
        assert!(!reports_association(""));
    }

    #[tokio::test]
    async fn missing_binary_is_none() {
        let out = run_query(
            "/nonexistent/blinkt_status/systemctl",
            &["is-active", "x"],
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn nonzero_exit_is_none() {
        let cmd = fake_command("nonzero", "echo inactive; exit 3");
        let out = run_query(&cmd.program(), &[], Duration::from_secs(2)).await;
        assert_eq!(out, None);
    }

    #[tokio::test]
    async fn hung_query_is_bounded() {
        let cmd = fake_command("hang", "sleep 10");
        let started = Instant::now();
        let out = run_query(&cmd.program(), &[], Duration::from_millis(200)).await;
        assert_eq!(out, None);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn router_detected_when_service_enabled() {
        let systemctl = fake_command("enabled", "echo enabled");
        let iw = fake_command("iw_unused", "exit 1");
        let p = checker(systemctl.path(), iw.path(), Duration::from_secs(2));
        assert_eq!(p.detect_role().await, Role::Router);
    }

    #[tokio::test]
    async fn client_when_supervisor_missing() {
        let missing = Path::new("/nonexistent/blinkt_status/systemctl");
        let p = checker(missing, missing, Duration::from_secs(1));
        assert_eq!(p.detect_role().await, Role::Client);
        assert!(!p.is_connected(Role::Client).await);
    }

    #[tokio::test]
    async fn router_connectivity_follows_service_state() {
        let active = fake_command("active", "echo active");
        let iw = fake_command("iw_unused2", "exit 1");
        let p = checker(active.path(), iw.path(), Duration::from_secs(2));
        assert!(p.is_connected(Role::Router).await);

        let inactive = fake_command("inactive", "echo inactive; exit 3");
        let p = checker(inactive.path(), iw.path(), Duration::from_secs(2));
        assert!(!p.is_connected(Role::Router).await);
    }

    #[tokio::test]
    async fn router_query_timeout_reads_disconnected() {
        let hung = fake_command("ap_hang", "sleep 10");
        let iw = fake_command("iw_unused3", "exit 1");
        let p = checker(hung.path(), iw.path(), Duration::from_millis(200));
        let started = Instant::now();
        assert!(!p.is_connected(Role::Router).await);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn client_connectivity_follows_link() {
        let systemctl = fake_command("sc_unused", "exit 1");
        let linked = fake_command(
            "linked",
            "echo 'Connected to aa:bb:cc:dd:ee:ff (on wlan0)'",
        );
        let p = checker(systemctl.path(), linked.path(), Duration::from_secs(2));
        assert!(p.is_connected(Role::Client).await);

        let unlinked = fake_command("unlinked", "echo 'Not connected.'");
        let p = checker(systemctl.path(), unlinked.path(), Duration::from_secs(2));
        assert!(!p.is_connected(Role::Client).await);
    }

    #[test]
    fn fake_command_is_removed_on_drop() {
        let cmd = fake_command("cleanup", "exit 0");
        let path = cmd.path().to_path_buf();
        assert!(path.exists());
        drop(cmd);
        assert!(!path.exists());
    }
}
