//! End-to-end cycle tests: account file to generated rc files to getmail
//! invocations, with getmail replaced by a recording launcher.

#![allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::time::Duration;

use mailpoll_core::fetch::JobInvocation;
use mailpoll_core::{
    CompletionHook, DeliverySink, FetchError, FetchRunner, JobConfig, JobLauncher, Protocol,
    Scheduler, Settings,
};

/// Reads back every rc file getmail would have been given.
#[derive(Default)]
struct RecordingLauncher {
    fail_server: Option<&'static str>,
    jobs: RefCell<Vec<(String, JobConfig)>>,
}

impl JobLauncher for &RecordingLauncher {
    async fn launch(&self, job: &JobInvocation<'_>) -> io::Result<Option<i32>> {
        let text = std::fs::read_to_string(job.getmail_dir.join(job.rcfile))?;
        let config = JobConfig::parse(&text).map_err(io::Error::other)?;
        let failed = self.fail_server == Some(config.server.as_str());
        self.jobs.borrow_mut().push((job.rcfile.to_string(), config));
        Ok(Some(i32::from(failed)))
    }
}

#[derive(Default)]
struct CountingHook {
    calls: Cell<usize>,
}

impl CompletionHook for &CountingHook {
    async fn complete(&self) -> bool {
        self.calls.set(self.calls.get() + 1);
        true
    }
}

fn settings(dir: &Path, extra: &[(&str, &str)]) -> Settings {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("HOME".into(), dir.display().to_string());
    vars.insert(
        "ACCOUNTS_FILE".into(),
        dir.join("accounts.list").display().to_string(),
    );
    vars.insert("DELIVER_BIN".into(), "/usr/local/bin/mailpoll-deliver".into());
    for (k, v) in extra {
        vars.insert((*k).to_string(), (*v).to_string());
    }
    Settings::from_lookup(|key| vars.get(key).cloned()).0
}

#[tokio::test]
async fn alice_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path(), &[]);
    std::fs::write(
        &settings.accounts_file,
        "alice:\"p@ss:w0rd\":imap.example.com:alice@local\n",
    )
    .unwrap();

    let sink = DeliverySink::from_settings(&settings);
    let launcher = RecordingLauncher::default();
    let hook = CountingHook::default();
    let runner = FetchRunner::new(&settings, &sink, &launcher);
    let scheduler = Scheduler::new(
        &settings.accounts_file,
        Duration::from_secs(300),
        runner,
        &hook,
    );

    let report = scheduler.run_until(|_| false).await;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].account, "alice@imap.example.com");
    assert!(report.outcomes[0].result.is_ok());
    assert!(report.notified);

    let jobs = launcher.jobs.borrow();
    let (rcfile, config) = &jobs[0];
    assert_eq!(rcfile, "getmailrc_alice_imap_example_com");
    assert_eq!(config.protocol, Protocol::ImapSsl);
    assert_eq!(config.server, "imap.example.com");
    assert_eq!(config.username, "alice");
    assert_eq!(config.password, "p@ss:w0rd");
    assert_eq!(
        config.mda_path,
        Path::new("/usr/local/bin/mailpoll-deliver")
    );
    assert_eq!(config.mda_arguments, vec!["alice@local"]);
    assert_eq!(config.delete_after, 7);

    let rc_path = dir.path().join(".getmail").join(rcfile);
    assert!(rc_path.is_file());
}

#[tokio::test]
async fn one_failing_server_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path(), &[("DELETE_AFTER_DAYS", "30")]);
    std::fs::write(
        &settings.accounts_file,
        "# mailboxes\n\
         alice:\"a\":imap.example.com:alice@local\n\
         bob:\"b\":pop.example.net:bob@local\n\
         \n\
         carol:\"c\":mail.example.org:carol@local\n",
    )
    .unwrap();

    let sink = DeliverySink::from_settings(&settings);
    let launcher = RecordingLauncher {
        fail_server: Some("pop.example.net"),
        ..Default::default()
    };
    let hook = CountingHook::default();
    let runner = FetchRunner::new(&settings, &sink, &launcher);
    let scheduler = Scheduler::new(&settings.accounts_file, Duration::from_secs(1), runner, &hook);

    let report = scheduler.run_until(|_| false).await;

    let labels: Vec<_> = report.outcomes.iter().map(|o| o.account.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "alice@imap.example.com",
            "bob@pop.example.net",
            "carol@mail.example.org"
        ]
    );
    assert!(matches!(
        report.outcomes[1].result,
        Err(FetchError::Exit { code: Some(1) })
    ));
    assert_eq!(report.failures(), 1);
    assert_eq!(hook.calls.get(), 1);

    let jobs = launcher.jobs.borrow();
    assert_eq!(jobs[1].1.protocol, Protocol::Pop3Ssl);
    assert!(jobs.iter().all(|(_, c)| c.delete_after == 30));
}

#[tokio::test]
async fn relay_sink_points_getmail_at_msmtp() {
    let dir = tempfile::tempdir().unwrap();
    let relay_config = dir.path().join("msmtprc");
    let settings = settings(
        dir.path(),
        &[
            ("DELIVERY_MODE", "relay"),
            ("RELAY_CONFIG", relay_config.to_str().unwrap()),
            ("SMTP_RELAY_HOST", "relay.lan"),
        ],
    );
    std::fs::write(
        &settings.accounts_file,
        "dave:\"d\":imap.example.com:dave@example.org\n",
    )
    .unwrap();

    let sink = DeliverySink::from_settings(&settings);
    sink.prepare(&settings).await.unwrap();
    let written = std::fs::read_to_string(&relay_config).unwrap();
    assert!(written.contains("host relay.lan\n"));

    let launcher = RecordingLauncher::default();
    let hook = CountingHook::default();
    let runner = FetchRunner::new(&settings, &sink, &launcher);
    let scheduler = Scheduler::new(&settings.accounts_file, Duration::from_secs(1), runner, &hook);
    scheduler.run_until(|_| false).await;

    let jobs = launcher.jobs.borrow();
    let config = &jobs[0].1;
    assert_eq!(config.mda_path, Path::new("/usr/bin/msmtp"));
    assert_eq!(
        config.mda_arguments,
        vec![
            format!("--file={}", relay_config.display()),
            "dave@example.org".to_string()
        ]
    );
}
