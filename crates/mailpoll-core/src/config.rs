//! Process-wide settings.
//!
//! Settings are read from the environment once at startup and passed by
//! reference afterwards. Invalid values never abort startup: they fall back
//! to the default and produce a [`ConfigWarning`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

/// Default account list location.
pub const DEFAULT_ACCOUNTS_FILE: &str = "/app/accounts.list";
/// Default retention in days before getmail deletes fetched messages.
pub const DEFAULT_DELETE_AFTER_DAYS: u32 = 7;
/// Default seconds between cycles.
pub const DEFAULT_FETCH_INTERVAL: u64 = 300;
/// Default LMTP host.
pub const DEFAULT_LMTP_HOST: &str = "dovecot-mailcow";
/// Default envelope sender.
pub const DEFAULT_SENDER: &str = "getmail-fetcher@localhost";
/// Name of the local delivery agent binary.
pub const DELIVER_BIN_NAME: &str = "mailpoll-deliver";

/// How getmail hands fetched messages to the local mail system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// `mailpoll-deliver` over LMTP.
    #[default]
    Lmtp,
    /// `msmtp` to an SMTP relay.
    Relay,
}

impl DeliveryMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lmtp" => Some(Self::Lmtp),
            "relay" => Some(Self::Relay),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lmtp => "lmtp",
            Self::Relay => "relay",
        })
    }
}

/// An environment value that was ignored in favour of the default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Variable name.
    pub variable: &'static str,
    /// Rejected value.
    pub value: String,
    /// Why it was rejected.
    pub reason: &'static str,
    /// Value used instead.
    pub fallback: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {}={:?} ({}), using {}",
            self.variable, self.value, self.reason, self.fallback
        )
    }
}

/// Immutable process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Account list path.
    pub accounts_file: PathBuf,
    /// Live getmail state directory.
    pub state_dir: PathBuf,
    /// Shadow state directory used while dry delivery is on.
    pub dry_state_dir: PathBuf,
    /// getmail executable.
    pub getmail_bin: PathBuf,
    /// getmail message log; always a seekable regular file.
    pub message_log: PathBuf,
    /// Days before getmail deletes retrieved messages from the server.
    pub delete_after_days: u32,
    /// Completion webhook.
    pub success_hook_url: Option<String>,
    /// LMTP server host.
    pub lmtp_host: String,
    /// LMTP server port.
    pub lmtp_port: u16,
    /// Log deliveries instead of performing them.
    pub dry_deliver: bool,
    /// Pause between cycles.
    pub fetch_interval: Duration,
    /// Delivery sink variant.
    pub delivery_mode: DeliveryMode,
    /// Local delivery agent executable.
    pub deliver_bin: PathBuf,
    /// SMTP relay host.
    pub relay_host: String,
    /// SMTP relay port.
    pub relay_port: u16,
    /// Envelope sender for LMTP and relay.
    pub sender_address: String,
    /// msmtp executable.
    pub relay_bin: PathBuf,
    /// msmtp configuration written at startup.
    pub relay_config: PathBuf,
}

impl Settings {
    /// Reads settings from the process environment, logging each warning.
    #[must_use]
    pub fn from_env() -> Self {
        let (settings, warnings) = Self::from_lookup(|key| std::env::var(key).ok());
        for warning in &warnings {
            warn!(variable = warning.variable, "{warning}");
        }
        settings
    }

    /// Builds settings from an arbitrary variable lookup.
    ///
    /// `HOME` is consulted through the same lookup, falling back to the
    /// platform home directory.
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<ConfigWarning>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let home = get("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let state_dir = get("GETMAIL_DIR").map_or_else(|| home.join(".getmail"), PathBuf::from);
        let dry_state_dir =
            get("GETMAIL_DIR_DRY").map_or_else(|| home.join(".getmail-dry"), PathBuf::from);

        let dry_deliver = get("DRY_DELIVER").is_some_and(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        });

        let active_root = if dry_deliver { &dry_state_dir } else { &state_dir };
        let default_log = active_root.join("getmail.log");
        let message_log = match get("GETMAIL_MESSAGE_LOG") {
            Some(value) if is_stream_device(&value) => {
                warnings.push(ConfigWarning {
                    variable: "GETMAIL_MESSAGE_LOG",
                    value,
                    reason: "getmail needs a seekable file",
                    fallback: default_log.display().to_string(),
                });
                default_log
            }
            Some(value) => PathBuf::from(value),
            None => default_log,
        };

        let delete_after_days = parse_or_default(
            &mut warnings,
            "DELETE_AFTER_DAYS",
            get("DELETE_AFTER_DAYS"),
            DEFAULT_DELETE_AFTER_DAYS,
            "expected a non-negative integer",
        );
        let lmtp_port = parse_or_default(
            &mut warnings,
            "LMTP_PORT",
            get("LMTP_PORT"),
            mailpoll_lmtp::DEFAULT_PORT,
            "expected a port number",
        );
        let interval_secs = parse_or_default(
            &mut warnings,
            "FETCH_INTERVAL",
            get("FETCH_INTERVAL"),
            DEFAULT_FETCH_INTERVAL,
            "expected seconds",
        );
        let relay_port = parse_or_default(
            &mut warnings,
            "SMTP_RELAY_PORT",
            get("SMTP_RELAY_PORT"),
            25,
            "expected a port number",
        );

        let delivery_mode = match get("DELIVERY_MODE") {
            None => DeliveryMode::default(),
            Some(value) => DeliveryMode::parse(&value).unwrap_or_else(|| {
                warnings.push(ConfigWarning {
                    variable: "DELIVERY_MODE",
                    value,
                    reason: "expected lmtp or relay",
                    fallback: DeliveryMode::default().to_string(),
                });
                DeliveryMode::default()
            }),
        };

        let settings = Self {
            accounts_file: get("ACCOUNTS_FILE")
                .map_or_else(|| PathBuf::from(DEFAULT_ACCOUNTS_FILE), PathBuf::from),
            state_dir,
            dry_state_dir,
            getmail_bin: get("GETMAIL_BIN").map_or_else(|| PathBuf::from("getmail"), PathBuf::from),
            message_log,
            delete_after_days,
            success_hook_url: get("SUCCESS_HOOK_URL"),
            lmtp_host: get("LMTP_HOST").unwrap_or_else(|| DEFAULT_LMTP_HOST.to_string()),
            lmtp_port,
            dry_deliver,
            fetch_interval: Duration::from_secs(interval_secs),
            delivery_mode,
            deliver_bin: get("DELIVER_BIN").map_or_else(default_deliver_bin, PathBuf::from),
            relay_host: get("SMTP_RELAY_HOST").unwrap_or_else(|| "postfix-mailcow".to_string()),
            relay_port,
            sender_address: get("SENDER_ADDRESS").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            relay_bin: get("RELAY_BIN").map_or_else(|| PathBuf::from("/usr/bin/msmtp"), PathBuf::from),
            relay_config: get("RELAY_CONFIG").map_or_else(|| home.join(".msmtprc"), PathBuf::from),
        };

        (settings, warnings)
    }

    /// Overrides the account list path.
    #[must_use]
    pub fn with_accounts_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.accounts_file = path.into();
        self
    }

    /// Overrides the cycle interval.
    #[must_use]
    pub const fn with_fetch_interval(mut self, interval: Duration) -> Self {
        self.fetch_interval = interval;
        self
    }

    /// State directory in effect: the shadow root while dry delivery is on.
    #[must_use]
    pub fn active_state_dir(&self) -> &Path {
        if self.dry_deliver {
            &self.dry_state_dir
        } else {
            &self.state_dir
        }
    }
}

/// Startup configuration banner.
impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Configuration ---")?;
        writeln!(f, "ACCOUNTS_FILE: {}", self.accounts_file.display())?;
        writeln!(f, "STATE_DIR: {}", self.active_state_dir().display())?;
        writeln!(f, "DELIVERY_MODE: {}", self.delivery_mode)?;
        match self.delivery_mode {
            DeliveryMode::Lmtp => {
                writeln!(f, "LMTP_HOST: {}", self.lmtp_host)?;
                writeln!(f, "LMTP_PORT: {}", self.lmtp_port)?;
            }
            DeliveryMode::Relay => {
                writeln!(f, "SMTP_RELAY_HOST: {}", self.relay_host)?;
                writeln!(f, "SMTP_RELAY_PORT: {}", self.relay_port)?;
            }
        }
        writeln!(f, "DRY_DELIVER: {}", self.dry_deliver)?;
        writeln!(
            f,
            "SUCCESS_HOOK_URL: {}",
            if self.success_hook_url.is_some() { "Set" } else { "Not set" }
        )?;
        writeln!(f, "FETCH_INTERVAL: {}", self.fetch_interval.as_secs())?;
        writeln!(f, "DELETE_AFTER_DAYS: {}", self.delete_after_days)?;
        write!(f, "---------------------")
    }
}

fn parse_or_default<T>(
    warnings: &mut Vec<ConfigWarning>,
    variable: &'static str,
    value: Option<String>,
    default: T,
    reason: &'static str,
) -> T
where
    T: std::str::FromStr + fmt::Display,
{
    let Some(value) = value else {
        return default;
    };
    value.trim().parse().unwrap_or_else(|_| {
        warnings.push(ConfigWarning {
            variable,
            value,
            reason,
            fallback: default.to_string(),
        });
        default
    })
}

/// getmail seeks its message log, so stream devices cannot be used.
fn is_stream_device(value: &str) -> bool {
    let value = value.trim();
    matches!(value, "-" | "/dev/stdout" | "/dev/stderr" | "/dev/tty")
        || value.starts_with("/dev/fd/")
        || value.starts_with("/proc/self/fd/")
}

fn default_deliver_bin() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DELIVER_BIN_NAME)))
        .unwrap_or_else(|| PathBuf::from(DELIVER_BIN_NAME))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings_from(vars: &[(&str, &str)]) -> (Settings, Vec<ConfigWarning>) {
        let mut env: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        env.entry("HOME".to_string())
            .or_insert_with(|| "/home/getmail".to_string());
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let (settings, warnings) = settings_from(&[]);
        assert!(warnings.is_empty());
        assert_eq!(settings.accounts_file, PathBuf::from("/app/accounts.list"));
        assert_eq!(settings.state_dir, PathBuf::from("/home/getmail/.getmail"));
        assert_eq!(settings.dry_state_dir, PathBuf::from("/home/getmail/.getmail-dry"));
        assert_eq!(settings.message_log, PathBuf::from("/home/getmail/.getmail/getmail.log"));
        assert_eq!(settings.delete_after_days, 7);
        assert_eq!(settings.lmtp_host, "dovecot-mailcow");
        assert_eq!(settings.lmtp_port, 24);
        assert!(!settings.dry_deliver);
        assert_eq!(settings.fetch_interval, Duration::from_secs(300));
        assert_eq!(settings.delivery_mode, DeliveryMode::Lmtp);
        assert_eq!(settings.sender_address, "getmail-fetcher@localhost");
        assert_eq!(settings.relay_host, "postfix-mailcow");
        assert_eq!(settings.relay_port, 25);
        assert_eq!(settings.relay_config, PathBuf::from("/home/getmail/.msmtprc"));
        assert_eq!(settings.success_hook_url, None);
    }

    #[test]
    fn invalid_retention_warns_once_and_uses_default() {
        let (settings, warnings) = settings_from(&[("DELETE_AFTER_DAYS", "abc")]);
        assert_eq!(settings.delete_after_days, 7);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].variable, "DELETE_AFTER_DAYS");
        assert_eq!(warnings[0].fallback, "7");
    }

    #[test]
    fn negative_retention_is_rejected() {
        let (settings, warnings) = settings_from(&[("DELETE_AFTER_DAYS", "-1")]);
        assert_eq!(settings.delete_after_days, 7);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn invalid_numbers_and_mode_fall_back() {
        let (settings, warnings) = settings_from(&[
            ("LMTP_PORT", "99999"),
            ("FETCH_INTERVAL", "soon"),
            ("DELIVERY_MODE", "carrier-pigeon"),
        ]);
        assert_eq!(settings.lmtp_port, 24);
        assert_eq!(settings.fetch_interval, Duration::from_secs(300));
        assert_eq!(settings.delivery_mode, DeliveryMode::Lmtp);
        let vars: Vec<_> = warnings.iter().map(|w| w.variable).collect();
        assert_eq!(vars, vec!["LMTP_PORT", "FETCH_INTERVAL", "DELIVERY_MODE"]);
    }

    #[test]
    fn dry_deliver_values() {
        for value in ["1", "true", "YES", " Yes "] {
            assert!(settings_from(&[("DRY_DELIVER", value)]).0.dry_deliver, "{value}");
        }
        for value in ["0", "false", "no", "on", ""] {
            assert!(!settings_from(&[("DRY_DELIVER", value)]).0.dry_deliver, "{value}");
        }
    }

    #[test]
    fn dry_deliver_switches_state_dir() {
        let (settings, _) = settings_from(&[("DRY_DELIVER", "true")]);
        assert_eq!(settings.active_state_dir(), Path::new("/home/getmail/.getmail-dry"));
        let (settings, _) = settings_from(&[]);
        assert_eq!(settings.active_state_dir(), Path::new("/home/getmail/.getmail"));
    }

    #[test]
    fn dry_deliver_moves_default_message_log() {
        let (settings, _) = settings_from(&[("DRY_DELIVER", "1")]);
        assert_eq!(
            settings.message_log,
            PathBuf::from("/home/getmail/.getmail-dry/getmail.log")
        );
        let (settings, _) = settings_from(&[
            ("DRY_DELIVER", "1"),
            ("GETMAIL_MESSAGE_LOG", "/var/log/getmail.log"),
        ]);
        assert_eq!(settings.message_log, PathBuf::from("/var/log/getmail.log"));
    }

    #[test]
    fn stream_message_log_is_replaced() {
        for value in ["-", "/dev/stdout", "/dev/fd/1", "/proc/self/fd/2"] {
            let (settings, warnings) = settings_from(&[("GETMAIL_MESSAGE_LOG", value)]);
            assert_eq!(
                settings.message_log,
                PathBuf::from("/home/getmail/.getmail/getmail.log")
            );
            assert_eq!(warnings.len(), 1);
        }
        let (settings, warnings) = settings_from(&[("GETMAIL_MESSAGE_LOG", "/var/log/getmail.log")]);
        assert_eq!(settings.message_log, PathBuf::from("/var/log/getmail.log"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn overrides_and_relay_mode() {
        let (settings, warnings) = settings_from(&[
            ("ACCOUNTS_FILE", "/etc/mailpoll/accounts.list"),
            ("DELIVERY_MODE", "Relay"),
            ("SMTP_RELAY_PORT", "2525"),
            ("SUCCESS_HOOK_URL", "http://hook.local/ping"),
        ]);
        assert!(warnings.is_empty());
        assert_eq!(settings.delivery_mode, DeliveryMode::Relay);
        assert_eq!(settings.relay_port, 2525);
        assert_eq!(settings.success_hook_url.as_deref(), Some("http://hook.local/ping"));

        let settings = settings
            .with_accounts_file("/tmp/a.list")
            .with_fetch_interval(Duration::from_secs(60));
        assert_eq!(settings.accounts_file, PathBuf::from("/tmp/a.list"));
        assert_eq!(settings.fetch_interval, Duration::from_secs(60));
    }

    #[test]
    fn banner_hides_webhook_url() {
        let (settings, _) = settings_from(&[("SUCCESS_HOOK_URL", "http://secret-token@hook/")]);
        let banner = settings.to_string();
        assert!(banner.contains("SUCCESS_HOOK_URL: Set"));
        assert!(banner.contains("DELETE_AFTER_DAYS: 7"));
        assert!(banner.contains("LMTP_HOST: dovecot-mailcow"));
        assert!(!banner.contains("secret-token"));
    }
}
