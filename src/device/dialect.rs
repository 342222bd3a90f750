//! Per-platform command dialects
//!
//! Maps inventory `device_type` strings (netmiko-style names) to the commands
//! needed to pull a full running configuration.

use std::sync::OnceLock;

use regex::Regex;

/// How the session talks to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Interactive CLI over the SSH shell channel, prompt driven
    Cli,
    /// Single remote command, output read to EOF
    Exec,
}

/// Network and host configuration of a Linux box; missing files are skipped
const LINUX_SHOW_COMMAND: &str = "for f in /etc/hostname /etc/hosts /etc/resolv.conf \
/etc/network/interfaces /etc/netplan/*.yaml /etc/sysconfig/network-scripts/ifcfg-*; \
do [ -f \"$f\" ] && printf '### %s\\n' \"$f\" && cat \"$f\"; done; true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    CiscoIos,
    CiscoXe,
    CiscoXr,
    CiscoNxos,
    CiscoAsa,
    AristaEos,
    JuniperJunos,
    OpenWrt,
    /// Generic Linux host, configuration files dumped with `cat`
    Linux,
}

impl Dialect {
    pub fn from_device_type(device_type: &str) -> Option<Self> {
        let normalized = device_type.trim().to_lowercase();
        let base = normalized.strip_suffix("_ssh").unwrap_or(&normalized);
        match base {
            "cisco_ios" => Some(Dialect::CiscoIos),
            "cisco_xe" => Some(Dialect::CiscoXe),
            "cisco_xr" => Some(Dialect::CiscoXr),
            "cisco_nxos" => Some(Dialect::CiscoNxos),
            "cisco_asa" => Some(Dialect::CiscoAsa),
            "arista_eos" => Some(Dialect::AristaEos),
            "juniper" | "juniper_junos" => Some(Dialect::JuniperJunos),
            "openwrt" => Some(Dialect::OpenWrt),
            "linux" => Some(Dialect::Linux),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::CiscoIos => "cisco_ios",
            Dialect::CiscoXe => "cisco_xe",
            Dialect::CiscoXr => "cisco_xr",
            Dialect::CiscoNxos => "cisco_nxos",
            Dialect::CiscoAsa => "cisco_asa",
            Dialect::AristaEos => "arista_eos",
            Dialect::JuniperJunos => "juniper_junos",
            Dialect::OpenWrt => "openwrt",
            Dialect::Linux => "linux",
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self {
            Dialect::OpenWrt | Dialect::Linux => SessionMode::Exec,
            _ => SessionMode::Cli,
        }
    }

    /// Whether `show running-config` needs privileged exec (`enable`)
    pub fn requires_enable(&self) -> bool {
        matches!(
            self,
            Dialect::CiscoIos | Dialect::CiscoXe | Dialect::CiscoAsa | Dialect::AristaEos
        )
    }

    pub fn pager_command(&self) -> Option<&'static str> {
        match self {
            Dialect::CiscoIos
            | Dialect::CiscoXe
            | Dialect::CiscoXr
            | Dialect::CiscoNxos
            | Dialect::AristaEos => Some("terminal length 0"),
            Dialect::CiscoAsa => Some("terminal pager 0"),
            Dialect::JuniperJunos => Some("set cli screen-length 0"),
            Dialect::OpenWrt | Dialect::Linux => None,
        }
    }

    pub fn show_config_command(&self) -> &'static str {
        match self {
            Dialect::JuniperJunos => "show configuration | no-more",
            Dialect::OpenWrt => "uci export",
            Dialect::Linux => LINUX_SHOW_COMMAND,
            _ => "show running-config",
        }
    }

    pub fn exit_command(&self) -> Option<&'static str> {
        match self.mode() {
            SessionMode::Cli => Some("exit"),
            SessionMode::Exec => None,
        }
    }

    /// Output fragments meaning the device refused a command
    pub fn error_markers(&self) -> &'static [&'static str] {
        match self {
            Dialect::JuniperJunos => &["unknown command.", "syntax error"],
            Dialect::OpenWrt | Dialect::Linux => &[],
            _ => &[
                "% Invalid input",
                "% Invalid command",
                "% Unknown command",
                "% Incomplete command",
                "% Authorization failed",
                "ERROR: % Invalid",
            ],
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any CLI prompt: `r1>`, `r1#`, `admin@edge>`, `RP/0/RSP0/CPU0:xr1#`
pub fn generic_prompt() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.\-@/:()\[\]~]+[>#]\s*$").expect("valid prompt regex"))
}

pub fn password_prompt() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)password:\s*$").expect("valid password regex"))
}

/// Prompt of this particular device, in any mode
pub fn device_prompt(observed: &str) -> Regex {
    let base = observed.trim().trim_end_matches(['>', '#']);
    let base = base.split('(').next().unwrap_or(base);
    Regex::new(&format!(r"^{}(\([\w\-]+\))?[>#]\s*$", regex::escape(base)))
        .unwrap_or_else(|_| generic_prompt().clone())
}

/// `#` for privileged prompts, `>` otherwise
pub fn is_privileged(prompt: &str) -> bool {
    prompt.trim_end().ends_with('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_device_type() {
        assert_eq!(Dialect::from_device_type("cisco_ios"), Some(Dialect::CiscoIos));
        assert_eq!(Dialect::from_device_type("Cisco_IOS_SSH"), Some(Dialect::CiscoIos));
        assert_eq!(Dialect::from_device_type("juniper"), Some(Dialect::JuniperJunos));
        assert_eq!(Dialect::from_device_type("openwrt"), Some(Dialect::OpenWrt));
        assert_eq!(Dialect::from_device_type("Linux"), Some(Dialect::Linux));
        assert_eq!(Dialect::from_device_type("hp_procurve"), None);
        assert_eq!(Dialect::from_device_type(""), None);
    }

    #[test]
    fn test_commands() {
        assert_eq!(Dialect::CiscoIos.show_config_command(), "show running-config");
        assert!(Dialect::CiscoIos.requires_enable());
        assert!(!Dialect::CiscoNxos.requires_enable());
        assert_eq!(Dialect::CiscoAsa.pager_command(), Some("terminal pager 0"));
        assert_eq!(Dialect::OpenWrt.mode(), SessionMode::Exec);
        assert_eq!(Dialect::OpenWrt.exit_command(), None);
        assert_eq!(Dialect::JuniperJunos.exit_command(), Some("exit"));
        assert_eq!(Dialect::Linux.mode(), SessionMode::Exec);
        assert_eq!(Dialect::Linux.pager_command(), None);
        assert_eq!(Dialect::Linux.exit_command(), None);
        assert!(!Dialect::Linux.requires_enable());
        assert!(Dialect::Linux.show_config_command().contains("/etc/hostname"));
    }

    #[test]
    fn test_generic_prompt() {
        let re = generic_prompt();
        assert!(re.is_match("r1>"));
        assert!(re.is_match("r1# "));
        assert!(re.is_match("admin@edge-01>"));
        assert!(re.is_match("RP/0/RSP0/CPU0:xr1#"));
        assert!(!re.is_match("banner motd #"));
        assert!(!re.is_match("Password:"));
        assert!(!re.is_match("!"));
    }

    #[test]
    fn test_device_prompt() {
        let re = device_prompt("r1>");
        assert!(re.is_match("r1>"));
        assert!(re.is_match("r1#"));
        assert!(re.is_match("r1(config)#"));
        assert!(!re.is_match("r2#"));
        assert!(!re.is_match("interface r1#"));

        let re = device_prompt("RP/0/RSP0/CPU0:xr1#");
        assert!(re.is_match("RP/0/RSP0/CPU0:xr1#"));
    }

    #[test]
    fn test_privilege() {
        assert!(is_privileged("r1#"));
        assert!(!is_privileged("r1>"));
        assert!(password_prompt().is_match("Password: "));
    }
}
