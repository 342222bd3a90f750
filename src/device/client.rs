//! SSH configuration fetcher for network devices
//!
//! CLI platforms are driven prompt by prompt over the shell channel; exec
//! platforms (OpenWrt, Linux hosts) run a single remote command.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use super::dialect::{self, Dialect, SessionMode};
use super::session::{classify_exit, ReadError, SessionExit, SshSession};
use super::DeviceConnector;
use crate::config::SshConfig;
use crate::error::DeviceError;
use crate::models::{Credential, DeviceDescriptor};

/// Where a CLI exchange stopped
#[derive(Debug)]
enum CliError {
    /// Before the first prompt
    Login(ReadError),
    /// While waiting for the response to a command
    Command(&'static str, ReadError),
    Device(DeviceError),
}

pub struct SshDeviceConnector {
    config: SshConfig,
}

impl SshDeviceConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn ssh_command(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
        remote_command: Option<&str>,
    ) -> Command {
        let mut cmd = Command::new(&self.config.sshpass_program);
        cmd.arg("-e")
            .arg(&self.config.ssh_program)
            .arg("-T")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.connect_timeout_secs))
            .arg("-o")
            .arg(if self.config.strict_host_key_checking {
                "StrictHostKeyChecking=yes"
            } else {
                "StrictHostKeyChecking=no"
            });
        if !self.config.strict_host_key_checking {
            cmd.arg("-o").arg("UserKnownHostsFile=/dev/null");
        }
        cmd.arg("-o")
            .arg("LogLevel=ERROR")
            .arg("-o")
            .arg("NumberOfPasswordPrompts=1")
            .arg("-o")
            .arg("PreferredAuthentications=password,keyboard-interactive")
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(format!("{}@{}", credential.username, device.address()));
        if let Some(remote) = remote_command {
            cmd.arg(remote);
        }

        // sshpass -e reads the password from the environment, keeping it off argv
        cmd.env("SSHPASS", &credential.password)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    async fn fetch_cli(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
        dialect: Dialect,
    ) -> Result<String, DeviceError> {
        let mut session = SshSession::spawn(self.ssh_command(device, credential, None))?;

        let outcome = self.cli_exchange(&mut session, dialect, credential).await;
        let exit = session
            .close(dialect.exit_command(), self.config.close_timeout())
            .await;

        match outcome {
            Ok(text) => Ok(text),
            Err(e) => Err(self.cli_failure(e, &exit)),
        }
    }

    async fn cli_exchange(
        &self,
        session: &mut SshSession,
        dialect: Dialect,
        credential: &Credential,
    ) -> Result<String, CliError> {
        let command_timeout = self.config.command_timeout();

        // 1. Login banner up to the first prompt
        let (_, banner) = session
            .read_until(&[dialect::generic_prompt()], self.config.connect_timeout())
            .await
            .map_err(CliError::Login)?;
        let first_prompt = last_line(&banner);
        let prompt = dialect::device_prompt(first_prompt);
        tracing::debug!("Logged in, prompt '{}'", first_prompt);

        // 2. Privilege elevation
        if dialect.requires_enable() && !dialect::is_privileged(first_prompt) {
            self.enable(session, &prompt, credential, command_timeout)
                .await?;
        }

        // 3. Paging off
        if let Some(pager) = dialect.pager_command() {
            send(session, pager).await?;
            session
                .read_until(&[&prompt], command_timeout)
                .await
                .map_err(|e| CliError::Command(pager, e))?;
        }

        // 4. The configuration itself
        let show = dialect.show_config_command();
        send(session, show).await?;
        let (_, raw) = session
            .read_until(&[&prompt], command_timeout)
            .await
            .map_err(|e| CliError::Command(show, e))?;

        if let Some(marker) = dialect
            .error_markers()
            .iter()
            .find(|m| raw.contains(**m))
        {
            return Err(CliError::Device(DeviceError::Other(format!(
                "device rejected '{}': {}",
                show, marker
            ))));
        }

        Ok(clean_output(&raw, show))
    }

    async fn enable(
        &self,
        session: &mut SshSession,
        prompt: &Regex,
        credential: &Credential,
        timeout: Duration,
    ) -> Result<(), CliError> {
        let password_prompt = dialect::password_prompt();

        send(session, "enable").await?;
        let (matched, text) = session
            .read_until(&[prompt, password_prompt], timeout)
            .await
            .map_err(|e| CliError::Command("enable", e))?;

        let text = if matched == 1 {
            send(session, &credential.password).await?;
            let (matched, text) = session
                .read_until(&[prompt, password_prompt], timeout)
                .await
                .map_err(|e| CliError::Command("enable", e))?;
            if matched == 1 {
                return Err(CliError::Device(DeviceError::Auth(
                    "enable password rejected".to_string(),
                )));
            }
            text
        } else {
            text
        };

        if !dialect::is_privileged(last_line(&text)) {
            return Err(CliError::Device(DeviceError::Auth(
                "privilege elevation rejected".to_string(),
            )));
        }
        Ok(())
    }

    fn cli_failure(&self, error: CliError, exit: &SessionExit) -> DeviceError {
        match error {
            CliError::Login(ReadError::TimedOut) => DeviceError::Connect(format!(
                "no login prompt within {}s",
                self.config.connect_timeout_secs
            )),
            CliError::Login(ReadError::Closed) => classify_exit(exit),
            CliError::Login(ReadError::Io(e)) => DeviceError::Other(format!("SSH read failed: {}", e)),
            CliError::Command(cmd, ReadError::TimedOut) => DeviceError::Other(format!(
                "timed out after {}s waiting for '{}'",
                self.config.command_timeout_secs, cmd
            )),
            CliError::Command(cmd, ReadError::Closed) => DeviceError::Other(format!(
                "session closed during '{}': {}",
                cmd,
                classify_exit(exit)
            )),
            CliError::Command(cmd, ReadError::Io(e)) => {
                DeviceError::Other(format!("SSH read failed during '{}': {}", cmd, e))
            }
            CliError::Device(e) => e,
        }
    }

    async fn fetch_exec(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
        dialect: Dialect,
    ) -> Result<String, DeviceError> {
        let show = dialect.show_config_command();
        let mut session = SshSession::spawn(self.ssh_command(device, credential, Some(show)))?;

        let limit = self.config.connect_timeout() + self.config.command_timeout();
        let outcome = session.read_to_end(limit).await;
        let exit = session.close(None, self.config.close_timeout()).await;

        match outcome {
            Ok(text) if exit.success() => Ok(text.replace("\r\n", "\n")),
            Ok(_) | Err(ReadError::Closed) => Err(classify_exit(&exit)),
            Err(ReadError::TimedOut) => Err(DeviceError::Other(format!(
                "timed out after {}s waiting for '{}'",
                limit.as_secs(),
                show
            ))),
            Err(ReadError::Io(e)) => Err(DeviceError::Other(format!("SSH read failed: {}", e))),
        }
    }
}

#[async_trait]
impl DeviceConnector for SshDeviceConnector {
    async fn fetch_config(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
    ) -> Result<String, DeviceError> {
        let dialect = Dialect::from_device_type(&device.device_type).ok_or_else(|| {
            DeviceError::Other(format!("Unsupported device type: {}", device.device_type))
        })?;

        match dialect.mode() {
            SessionMode::Cli => self.fetch_cli(device, credential, dialect).await,
            SessionMode::Exec => self.fetch_exec(device, credential, dialect).await,
        }
    }
}

async fn send(session: &mut SshSession, line: &str) -> Result<(), CliError> {
    session
        .send_line(line)
        .await
        .map_err(|e| CliError::Command("write", e))
}

fn last_line(text: &str) -> &str {
    text.rsplit('\n').next().unwrap_or(text).trim()
}

/// Strip the echoed command and trailing prompt, normalize line endings
pub fn clean_output(raw: &str, command: &str) -> String {
    let text = raw.replace("\r\n", "\n").replace('\r', "");

    // Everything after the last newline is the prompt
    let body = match text.rfind('\n') {
        Some(pos) => &text[..=pos],
        None => "",
    };

    let body = match body.find('\n') {
        Some(end) if body[..end].trim_end().ends_with(command) => &body[end + 1..],
        _ => body,
    };

    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_clean_output_strips_prompt_and_echo() {
        let raw = "show running-config\r\nBuilding configuration...\r\n\r\nhostname r1\r\n!\r\nend\r\nr1#";
        assert_eq!(
            clean_output(raw, "show running-config"),
            "Building configuration...\n\nhostname r1\n!\nend\n"
        );
    }

    #[test]
    fn test_clean_output_without_echo() {
        assert_eq!(
            clean_output("hostname r1\n!\nr1#", "show running-config"),
            "hostname r1\n!\n"
        );
        assert_eq!(clean_output("r1#", "show running-config"), "");
    }

    /// Device emulator: run by `sh` in place of `sshpass`
    const FAKE_IOS: &str = r#"
prompt='r1>'
printf 'Welcome\n%s' "$prompt"
while IFS= read -r line; do
  case "$line" in
    enable)
      printf 'Password: '
      IFS= read -r secret
      if [ "$secret" = 'x' ]; then prompt='r1#'; else printf '%% Access denied\n'; fi
      printf '\n%s' "$prompt" ;;
    'terminal length 0')
      printf '\n%s' "$prompt" ;;
    'show running-config')
      if [ "$prompt" = 'r1#' ]; then
        printf 'Building configuration...\n\nhostname r1\n!\nend\n%s' "$prompt"
      else
        printf '%% Invalid input detected\n%s' "$prompt"
      fi ;;
    exit)
      exit 0 ;;
  esac
done
"#;

    fn connector_with_script(dir: &Path, script: &str, timeout_secs: u64) -> SshDeviceConnector {
        let path = dir.join("fake_device.sh");
        std::fs::write(&path, script).unwrap();
        SshDeviceConnector::new(SshConfig {
            port: 22,
            connect_timeout_secs: timeout_secs,
            command_timeout_secs: timeout_secs,
            close_timeout_secs: 1,
            strict_host_key_checking: false,
            // `sh -e <script> ...ssh args`
            sshpass_program: "sh".to_string(),
            ssh_program: path.display().to_string(),
        })
    }

    #[tokio::test]
    async fn test_cli_backup_with_enable() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(dir.path(), FAKE_IOS, 5);
        let device = DeviceDescriptor::new("r1", "10.0.0.1", "cisco_ios");

        let text = connector
            .fetch_config(&device, &Credential::new("admin", "x"))
            .await
            .unwrap();
        assert_eq!(text, "Building configuration...\n\nhostname r1\n!\nend\n");
    }

    #[tokio::test]
    async fn test_cli_enable_rejected_is_auth_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(dir.path(), FAKE_IOS, 5);
        let device = DeviceDescriptor::new("r1", "10.0.0.1", "cisco_ios");

        let err = connector
            .fetch_config(&device, &Credential::new("admin", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::Auth("privilege elevation rejected".to_string()));
    }

    #[tokio::test]
    async fn test_command_rejected_is_other_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(dir.path(), FAKE_IOS, 5);
        // NX-OS skips enable, so the fake answers from user mode
        let device = DeviceDescriptor::new("r1", "10.0.0.1", "cisco_nxos");

        let err = connector
            .fetch_config(&device, &Credential::new("admin", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Other(ref d) if d.contains("% Invalid input")));
    }

    #[tokio::test]
    async fn test_unreachable_is_connect_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(
            dir.path(),
            "echo 'ssh: connect to host 10.0.0.2 port 22: Connection refused' >&2\nexit 255\n",
            5,
        );
        let device = DeviceDescriptor::new("r2", "10.0.0.2", "cisco_ios");

        let err = connector
            .fetch_config(&device, &Credential::new("admin", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Connect(_)));
    }

    #[tokio::test]
    async fn test_silent_device_times_out_as_connect_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(dir.path(), "sleep 10\n", 1);
        let device = DeviceDescriptor::new("r2", "10.0.0.2", "cisco_ios");

        let err = connector
            .fetch_config(&device, &Credential::new("admin", "x"))
            .await
            .unwrap_err();
        assert_eq!(err, DeviceError::Connect("no login prompt within 1s".to_string()));
    }

    #[tokio::test]
    async fn test_bad_password_is_auth_failure() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(
            dir.path(),
            "echo 'admin@10.0.0.1: Permission denied (password).' >&2\nexit 5\n",
            5,
        );
        let device = DeviceDescriptor::new("r1", "10.0.0.1", "cisco_ios");

        let err = connector
            .fetch_config(&device, &Credential::new("admin", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeviceError::Auth(_)));
    }

    #[tokio::test]
    async fn test_exec_backup() {
        let dir = tempfile::TempDir::new().unwrap();
        // The remote command is the last argument
        let connector = connector_with_script(
            dir.path(),
            "for last; do :; done\n[ \"$last\" = 'uci export' ] || exit 1\nprintf 'package network\\n\\nconfig interface lan\\n'\n",
            5,
        );
        let device = DeviceDescriptor::new("gw", "192.168.1.1", "openwrt");

        let text = connector
            .fetch_config(&device, &Credential::new("root", "x"))
            .await
            .unwrap();
        assert_eq!(text, "package network\n\nconfig interface lan\n");
    }

    #[tokio::test]
    async fn test_linux_exec_backup() {
        let dir = tempfile::TempDir::new().unwrap();
        let connector = connector_with_script(
            dir.path(),
            "for last; do :; done\ncase \"$last\" in *'cat \"$f\"'*) ;; *) exit 1 ;; esac\nprintf '### /etc/hostname\\r\\nsrv1\\r\\n'\n",
            5,
        );
        let device = DeviceDescriptor::new("srv1", "10.0.0.20", "linux");

        let text = connector
            .fetch_config(&device, &Credential::new("root", "x"))
            .await
            .unwrap();
        assert_eq!(text, "### /etc/hostname\nsrv1\n");
    }

    #[tokio::test]
    async fn test_unsupported_device_type() {
        let connector = SshDeviceConnector::new(SshConfig::default());
        let device = DeviceDescriptor::new("sw", "10.0.0.9", "hp_procurve");

        let err = connector
            .fetch_config(&device, &Credential::new("admin", "x"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::Other("Unsupported device type: hp_procurve".to_string())
        );
    }
}
