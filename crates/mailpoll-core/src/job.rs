//! getmail job configuration.
//!
//! One rc file per account, regenerated before every fetch so edits to the
//! account list apply without a restart.

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::account::{Account, Protocol};
use crate::config::Settings;
use crate::delivery::DeliverySink;

const MASK: &str = "********";

/// Replaces every character outside `[A-Za-z0-9]` with `_`.
///
/// Distinct names that differ only in such characters collide
/// (`a.b` and `a-b` both become `a_b`) and share one rc file.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Deterministic rc file name for a `(user, server)` pair.
#[must_use]
pub fn config_name(user: &str, server: &str) -> String {
    format!("getmailrc_{}_{}", sanitize(user), sanitize(server))
}

/// A rendered getmail rc file.
#[derive(Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Retrieval protocol (selects the getmail retriever type).
    pub protocol: Protocol,
    /// Retrieval server.
    pub server: String,
    /// Login name.
    pub username: String,
    /// Password, embedded verbatim.
    pub password: String,
    /// External MDA executable.
    pub mda_path: PathBuf,
    /// Arguments passed to the MDA.
    pub mda_arguments: Vec<String>,
    /// Retention in days.
    pub delete_after: u32,
    /// getmail message log file.
    pub message_log: PathBuf,
}

impl std::fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobConfig")
            .field("protocol", &self.protocol)
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &MASK)
            .field("mda_path", &self.mda_path)
            .field("mda_arguments", &self.mda_arguments)
            .field("delete_after", &self.delete_after)
            .field("message_log", &self.message_log)
            .finish()
    }
}

/// Why a rendered rc file could not be read back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobParseError {
    /// A required key is absent.
    #[error("missing {section}.{key}")]
    Missing {
        /// Section name.
        section: &'static str,
        /// Key name.
        key: &'static str,
    },
    /// A key has a value that cannot be interpreted.
    #[error("invalid {key}: {value:?}")]
    Invalid {
        /// Key name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
}

impl JobConfig {
    /// Builds the job configuration for `account`.
    #[must_use]
    pub fn new(account: &Account, sink: &DeliverySink, settings: &Settings) -> Self {
        let (mda_path, mda_arguments) = sink.command(&account.target);
        Self {
            protocol: account.protocol(),
            server: account.server.clone(),
            username: account.user.clone(),
            password: account.password.clone(),
            mda_path,
            mda_arguments,
            delete_after: settings.delete_after_days,
            message_log: settings.message_log.clone(),
        }
    }

    /// Renders the rc file text.
    #[must_use]
    pub fn render(&self) -> String {
        self.render_with_password(&self.password)
    }

    /// Renders the rc file text with the password masked.
    #[must_use]
    pub fn masked(&self) -> String {
        self.render_with_password(MASK)
    }

    fn render_with_password(&self, password: &str) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "[retriever]\n\
             type = {}\n\
             server = {}\n\
             username = {}\n\
             password = {}\n\
             \n\
             [destination]\n\
             type = MDA_external\n\
             path = {}\n\
             arguments = {}\n\
             ignore_stderr = true\n\
             \n\
             [options]\n\
             read_all = false\n\
             delete = false\n\
             delete_after = {}\n\
             message_log = {}\n",
            self.protocol.retriever_type(),
            self.server,
            self.username,
            password,
            self.mda_path.display(),
            render_tuple(&self.mda_arguments),
            self.delete_after,
            self.message_log.display(),
        );
        out
    }

    /// Reads a rendered rc file back.
    ///
    /// # Errors
    ///
    /// Returns [`JobParseError`] when a retriever or destination key is
    /// missing or malformed.
    pub fn parse(text: &str) -> Result<Self, JobParseError> {
        let mut section = "";
        let mut entries: Vec<(&str, &str, &str)> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = name;
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = value.strip_prefix(' ').unwrap_or(value);
                entries.push((section, key.trim(), value));
            }
        }

        let get = |section: &'static str, key: &'static str| {
            entries
                .iter()
                .find(|(s, k, _)| *s == section && *k == key)
                .map(|(_, _, v)| *v)
                .ok_or(JobParseError::Missing { section, key })
        };

        let retriever = get("retriever", "type")?;
        let protocol =
            Protocol::from_retriever_type(retriever.trim()).ok_or_else(|| JobParseError::Invalid {
                key: "type",
                value: retriever.to_string(),
            })?;

        let arguments = get("destination", "arguments")?;
        let mda_arguments = parse_tuple(arguments.trim()).ok_or_else(|| JobParseError::Invalid {
            key: "arguments",
            value: arguments.to_string(),
        })?;

        let delete_after = get("options", "delete_after")?;
        let delete_after = delete_after
            .trim()
            .parse()
            .map_err(|_| JobParseError::Invalid {
                key: "delete_after",
                value: delete_after.to_string(),
            })?;

        Ok(Self {
            protocol,
            server: get("retriever", "server")?.trim().to_string(),
            username: get("retriever", "username")?.trim().to_string(),
            password: get("retriever", "password")?.to_string(),
            mda_path: PathBuf::from(get("destination", "path")?.trim()),
            mda_arguments,
            delete_after,
            message_log: PathBuf::from(get("options", "message_log")?.trim()),
        })
    }
}

/// Renders arguments as a Python tuple literal: `("a", "b")`, `("a",)`.
fn render_tuple(items: &[String]) -> String {
    let mut out = String::from("(");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('"');
        for c in item.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push('"');
    }
    if items.len() == 1 {
        out.push(',');
    }
    out.push(')');
    out
}

fn parse_tuple(text: &str) -> Option<Vec<String>> {
    let inner = text.strip_prefix('(')?.strip_suffix(')')?;
    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => return Some(items),
            Some('"') => {}
            Some(_) => return None,
        }

        let mut item = String::new();
        loop {
            match chars.next()? {
                '\\' => item.push(chars.next()?),
                '"' => break,
                c => item.push(c),
            }
        }
        items.push(item);

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => return Some(items),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

/// Writes the job configuration for `account` to `path`.
///
/// Parent directories are created, existing content is replaced and the
/// file is readable by its owner only.
///
/// # Errors
///
/// Returns the underlying filesystem error.
pub async fn generate(
    account: &Account,
    sink: &DeliverySink,
    settings: &Settings,
    path: &Path,
) -> io::Result<JobConfig> {
    let config = JobConfig::new(account, sink, settings);
    write_private(path, config.render().as_bytes()).await?;
    Ok(config)
}

/// Writes `contents` to `path` with owner-only permissions.
pub(crate) async fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .await?;
    }
    file.write_all(contents).await?;
    file.flush().await
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
    use super::*;
    use proptest::prelude::*;

    fn settings() -> Settings {
        Settings::from_lookup(|key| match key {
            "HOME" => Some("/home/getmail".to_string()),
            _ => None,
        })
        .0
    }

    fn lmtp_sink() -> DeliverySink {
        DeliverySink::Lmtp {
            agent: PathBuf::from("/usr/local/bin/mailpoll-deliver"),
        }
    }

    fn alice() -> Account {
        Account::new("alice", "p@ss:w0rd", "imap.example.com", "alice@local")
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize("alice@example.com"), "alice_example_com");
        assert_eq!(sanitize("Bob99"), "Bob99");
        assert_eq!(sanitize("jörg"), "j_rg");
        assert_eq!(
            config_name("alice@example.com", "imap.example.com"),
            "getmailrc_alice_example_com_imap_example_com"
        );
    }

    #[test]
    fn sanitize_collisions_are_accepted() {
        assert_eq!(config_name("a.b", "srv"), config_name("a-b", "srv"));
    }

    #[test]
    fn renders_expected_sections() {
        let config = JobConfig::new(&alice(), &lmtp_sink(), &settings());
        let text = config.render();
        assert_eq!(
            text,
            "[retriever]\n\
             type = SimpleIMAPSSLRetriever\n\
             server = imap.example.com\n\
             username = alice\n\
             password = p@ss:w0rd\n\
             \n\
             [destination]\n\
             type = MDA_external\n\
             path = /usr/local/bin/mailpoll-deliver\n\
             arguments = (\"alice@local\",)\n\
             ignore_stderr = true\n\
             \n\
             [options]\n\
             read_all = false\n\
             delete = false\n\
             delete_after = 7\n\
             message_log = /home/getmail/.getmail/getmail.log\n"
        );
    }

    #[test]
    fn masked_hides_password() {
        let config = JobConfig::new(&alice(), &lmtp_sink(), &settings());
        let masked = config.masked();
        assert!(!masked.contains("p@ss:w0rd"));
        assert!(masked.contains("password = ********"));
        assert!(!format!("{config:?}").contains("p@ss:w0rd"));
    }

    #[tokio::test]
    async fn generate_then_parse_recovers_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(config_name("alice", "imap.example.com"));
        let pop = Account::new("bob", " spaced \"pw\" ", "pop.example.com", "bob@local");

        let written = generate(&pop, &lmtp_sink(), &settings(), &path).await.unwrap();
        let parsed = JobConfig::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(parsed, written);
        assert_eq!(parsed.protocol, Protocol::Pop3Ssl);
        assert_eq!(parsed.server, "pop.example.com");
        assert_eq!(parsed.username, "bob");
        assert_eq!(parsed.password, " spaced \"pw\" ");
        assert_eq!(parsed.mda_arguments, vec!["bob@local".to_string()]);
    }

    #[tokio::test]
    async fn generate_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rc");
        std::fs::write(&path, "x".repeat(4096)).unwrap();

        generate(&alice(), &lmtp_sink(), &settings(), &path).await.unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("[retriever]"));
        assert!(!text.contains("xxxx"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn generated_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rc");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        generate(&alice(), &lmtp_sink(), &settings(), &path).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn generate_reports_filesystem_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("rc");
        assert!(generate(&alice(), &lmtp_sink(), &settings(), &path).await.is_err());
    }

    #[test]
    fn parse_reports_missing_and_invalid_keys() {
        assert_eq!(
            JobConfig::parse("[retriever]\ntype = SimpleIMAPSSLRetriever\n"),
            Err(JobParseError::Missing {
                section: "destination",
                key: "arguments"
            })
        );
        assert!(matches!(
            JobConfig::parse("[retriever]\ntype = Unknown\n"),
            Err(JobParseError::Invalid { key: "type", .. })
        ));
    }

    #[test]
    fn tuple_rendering() {
        assert_eq!(render_tuple(&[]), "()");
        assert_eq!(render_tuple(&["a".to_string()]), "(\"a\",)");
        assert_eq!(
            render_tuple(&["--file=/x".to_string(), "b\"c".to_string()]),
            "(\"--file=/x\", \"b\\\"c\")"
        );
        assert_eq!(parse_tuple("(\"a\", \"b\\\\c\")"), Some(vec!["a".into(), "b\\c".into()]));
        assert_eq!(parse_tuple("(\"a\" \"b\")"), None);
        assert_eq!(parse_tuple("\"a\""), None);
    }

    proptest! {
        #[test]
        fn sanitize_is_deterministic_and_safe(s in ".{0,40}") {
            let once = sanitize(&s);
            prop_assert_eq!(&once, &sanitize(&s));
            prop_assert!(once.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            prop_assert_eq!(once.chars().count(), s.chars().count());
        }

        #[test]
        fn tuple_survives(items in proptest::collection::vec("[ -~]{0,12}", 0..4)) {
            prop_assert_eq!(parse_tuple(&render_tuple(&items)), Some(items));
        }
    }
}
