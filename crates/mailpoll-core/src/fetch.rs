//! Fetch runner: one getmail invocation per account.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::account::Account;
use crate::config::Settings;
use crate::delivery::DeliverySink;
use crate::job::{config_name, generate};

/// Why a fetch did not complete.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The state directory or rc file could not be written.
    #[error("cannot prepare {}: {source}", .path.display())]
    Prepare {
        /// Path that failed.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: io::Error,
    },

    /// getmail could not be started.
    #[error("cannot start {}: {source}", .program.display())]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// getmail exited unsuccessfully.
    #[error("getmail exited with {}", describe_exit(.code.as_ref()))]
    Exit {
        /// Exit code, absent when the process was killed by a signal.
        code: Option<i32>,
    },
}

fn describe_exit(code: Option<&i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |code| format!("exit code {code}"))
}

/// A single getmail run.
#[derive(Debug, Clone, Copy)]
pub struct JobInvocation<'a> {
    /// getmail executable.
    pub program: &'a Path,
    /// State directory passed as `--getmaildir`.
    pub getmail_dir: &'a Path,
    /// rc file name, relative to the state directory.
    pub rcfile: &'a str,
}

impl JobInvocation<'_> {
    /// Command line arguments.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        vec![
            format!("--getmaildir={}", self.getmail_dir.display()),
            format!("--rcfile={}", self.rcfile),
        ]
    }
}

/// Starts the retrieval job and waits for it.
pub trait JobLauncher {
    /// Runs the job to completion and returns its exit code (`None` when
    /// terminated by a signal).
    fn launch(&self, job: &JobInvocation<'_>) -> impl Future<Output = io::Result<Option<i32>>>;
}

/// Runs getmail as a child process sharing our stdout and stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetmailLauncher;

impl JobLauncher for GetmailLauncher {
    async fn launch(&self, job: &JobInvocation<'_>) -> io::Result<Option<i32>> {
        let status = tokio::process::Command::new(job.program)
            .args(job.args())
            .status()
            .await?;
        Ok(status.code())
    }
}

/// Runs getmail for one account at a time.
#[derive(Debug)]
pub struct FetchRunner<'a, L> {
    settings: &'a Settings,
    sink: &'a DeliverySink,
    launcher: L,
}

impl<'a, L: JobLauncher> FetchRunner<'a, L> {
    /// Creates a runner.
    pub const fn new(settings: &'a Settings, sink: &'a DeliverySink, launcher: L) -> Self {
        Self {
            settings,
            sink,
            launcher,
        }
    }

    /// Regenerates the account's rc file and runs getmail once.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on preparation, spawn or exit failure. The
    /// error is meant to be recorded, not to stop the cycle.
    pub async fn run(&self, account: &Account) -> Result<(), FetchError> {
        let state_dir = self.settings.active_state_dir();
        let log_dir = self.settings.message_log.parent().filter(|p| !p.as_os_str().is_empty());
        for dir in std::iter::once(state_dir).chain(log_dir) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| FetchError::Prepare {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let name = config_name(&account.user, &account.server);
        let rc_path = state_dir.join(&name);
        let config = generate(account, self.sink, self.settings, &rc_path)
            .await
            .map_err(|source| FetchError::Prepare {
                path: rc_path.clone(),
                source,
            })?;
        debug!(account = %account, config = %config.masked(), "Generated getmail configuration");

        info!(account = %account, protocol = %account.protocol(), "Starting fetch");
        let job = JobInvocation {
            program: &self.settings.getmail_bin,
            getmail_dir: state_dir,
            rcfile: &name,
        };
        let code = self
            .launcher
            .launch(&job)
            .await
            .map_err(|source| FetchError::Spawn {
                program: self.settings.getmail_bin.clone(),
                source,
            })?;

        if code == Some(0) {
            info!(account = %account, "Fetch complete");
            Ok(())
        } else {
            let err = FetchError::Exit { code };
            error!(account = %account, error = %err, "Error running getmail");
            Err(err)
        }
    }
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
    use std::sync::Mutex;

    use super::*;
    use crate::job::JobConfig;

    /// Records invocations and answers with a fixed result.
    struct ScriptedLauncher {
        result: fn() -> io::Result<Option<i32>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedLauncher {
        fn new(result: fn() -> io::Result<Option<i32>>) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl JobLauncher for &ScriptedLauncher {
        async fn launch(&self, job: &JobInvocation<'_>) -> io::Result<Option<i32>> {
            let mut call = vec![job.program.display().to_string()];
            call.extend(job.args());
            self.calls.lock().unwrap().push(call);
            (self.result)()
        }
    }

    fn settings(state: &Path, extra: &[(&str, &str)]) -> Settings {
        let live = state.join("live").display().to_string();
        let dry = state.join("dry").display().to_string();
        let mut vars = vec![
            ("HOME".to_string(), "/home/getmail".to_string()),
            ("GETMAIL_DIR".to_string(), live),
            ("GETMAIL_DIR_DRY".to_string(), dry),
        ];
        vars.extend(extra.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
        Settings::from_lookup(|key| {
            vars.iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .0
    }

    fn sink() -> DeliverySink {
        DeliverySink::Lmtp {
            agent: PathBuf::from("/usr/local/bin/mailpoll-deliver"),
        }
    }

    fn alice() -> Account {
        Account::new("alice", "p@ss:w0rd", "imap.example.com", "alice@local")
    }

    #[tokio::test]
    async fn runs_getmail_with_generated_config() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &[]);
        let sink = sink();
        let launcher = ScriptedLauncher::new(|| Ok(Some(0)));

        FetchRunner::new(&settings, &sink, &launcher)
            .run(&alice())
            .await
            .unwrap();

        let live = dir.path().join("live");
        let calls = launcher.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![vec![
                "getmail".to_string(),
                format!("--getmaildir={}", live.display()),
                "--rcfile=getmailrc_alice_imap_example_com".to_string(),
            ]]
        );

        let text = std::fs::read_to_string(live.join("getmailrc_alice_imap_example_com")).unwrap();
        let config = JobConfig::parse(&text).unwrap();
        assert_eq!(config.password, "p@ss:w0rd");
        assert_eq!(config.server, "imap.example.com");
        assert_eq!(config.mda_arguments, vec!["alice@local".to_string()]);
    }

    #[tokio::test]
    async fn dry_delivery_uses_shadow_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &[("DRY_DELIVER", "1")]);
        let sink = sink();
        let launcher = ScriptedLauncher::new(|| Ok(Some(0)));

        FetchRunner::new(&settings, &sink, &launcher)
            .run(&alice())
            .await
            .unwrap();

        let rc = dir.path().join("dry").join("getmailrc_alice_imap_example_com");
        let config = JobConfig::parse(&std::fs::read_to_string(rc).unwrap()).unwrap();
        assert_eq!(config.message_log, dir.path().join("dry").join("getmail.log"));
        assert!(!dir.path().join("live").exists());
    }

    #[tokio::test]
    async fn message_log_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs").join("nested").join("getmail.log");
        let settings = settings(dir.path(), &[("GETMAIL_MESSAGE_LOG", log.to_str().unwrap())]);
        let sink = sink();
        let launcher = ScriptedLauncher::new(|| Ok(Some(0)));

        FetchRunner::new(&settings, &sink, &launcher)
            .run(&alice())
            .await
            .unwrap();

        assert!(log.parent().unwrap().is_dir());
        assert!(!log.exists());
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &[]);
        let sink = sink();
        let launcher = ScriptedLauncher::new(|| Ok(Some(1)));

        let err = FetchRunner::new(&settings, &sink, &launcher)
            .run(&alice())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Exit { code: Some(1) }));
        assert_eq!(err.to_string(), "getmail exited with exit code 1");
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &[]);
        let sink = sink();
        let launcher =
            ScriptedLauncher::new(|| Err(io::Error::new(io::ErrorKind::NotFound, "no getmail")));

        let err = FetchRunner::new(&settings, &sink, &launcher)
            .run(&alice())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Spawn { .. }));
    }

    #[tokio::test]
    async fn unwritable_state_dir_is_prepare_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let settings = settings(dir.path(), &[("GETMAIL_DIR", blocker.join("state").to_str().unwrap())]);
        let sink = sink();
        let launcher = ScriptedLauncher::new(|| Ok(Some(0)));

        let err = FetchRunner::new(&settings, &sink, &launcher)
            .run(&alice())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Prepare { .. }));
        assert!(launcher.calls.lock().unwrap().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn getmail_launcher_reports_exit_codes() {
        let job = |program: &'static str| JobInvocation {
            program: Path::new(program),
            getmail_dir: Path::new("/tmp"),
            rcfile: "rc",
        };

        assert_eq!(GetmailLauncher.launch(&job("true")).await.unwrap(), Some(0));
        assert_eq!(GetmailLauncher.launch(&job("false")).await.unwrap(), Some(1));
        assert!(
            GetmailLauncher
                .launch(&job("/nonexistent/getmail"))
                .await
                .is_err()
        );
    }
}
