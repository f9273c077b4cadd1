//! Account list reader.
//!
//! The account list is a flat text file with one account per line:
//!
//! ```text
//! # comment
//! user:"password":server:target
//! ```
//!
//! Blank lines and `#` comments are ignored. Malformed lines, including
//! lines that are not valid UTF-8, are skipped with a warning; they never
//! abort the load.

use std::path::Path;

use tracing::{debug, error, warn};

use super::model::Account;

/// Why an account line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The line does not have the `user:"password":server:target` shape.
    #[error("line does not match user:\"password\":server:target")]
    Malformed,
    /// A field is empty after trimming.
    #[error("empty {0} field")]
    EmptyField(&'static str),
}

/// Parses one account line.
///
/// The user ends at the first `:"`. The password ends at the first
/// following `":` after which a `:` still remains; that remainder splits on
/// its first `:` into server and target, so the target may contain colons.
/// User, server and target are trimmed; the password is kept verbatim.
///
/// # Errors
///
/// Returns [`ParseError`] if the line is malformed or has an empty field.
pub fn parse_line(line: &str) -> Result<Account, ParseError> {
    for (user_end, _) in line.match_indices(":\"") {
        let after_user = &line[user_end + 2..];
        for (password_end, _) in after_user.match_indices("\":") {
            let rest = &after_user[password_end + 2..];
            if let Some((server, target)) = rest.split_once(':') {
                return build(
                    &line[..user_end],
                    &after_user[..password_end],
                    server,
                    target,
                );
            }
        }
    }
    Err(ParseError::Malformed)
}

fn build(user: &str, password: &str, server: &str, target: &str) -> Result<Account, ParseError> {
    let user = user.trim();
    let server = server.trim();
    let target = target.trim();

    for (name, value) in [
        ("user", user),
        ("password", password),
        ("server", server),
        ("target", target),
    ] {
        if value.is_empty() {
            return Err(ParseError::EmptyField(name));
        }
    }

    Ok(Account::new(user, password, server, target))
}

/// Parses the whole account list, in file order.
///
/// Rejected lines are logged with their line number and the reason, never
/// with their content.
#[must_use]
pub fn parse_accounts(text: &str) -> Vec<Account> {
    let mut accounts = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(account) => accounts.push(account),
            Err(e) => warn!(line = index + 1, reason = %e, "Skipping account line"),
        }
    }

    accounts
}

/// Loads the account list from `path`.
///
/// A missing or unreadable file is logged and yields an empty list, so the
/// caller's cycle proceeds with zero accounts.
pub fn load_accounts(path: &Path) -> Vec<Account> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let accounts = parse_accounts(&decode_lines(&bytes));
            debug!(path = %path.display(), count = accounts.len(), "Loaded accounts");
            accounts
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Cannot read accounts file");
            Vec::new()
        }
    }
}

/// Decodes each line on its own, blanking the ones that are not UTF-8 so
/// later line numbers stay correct.
fn decode_lines(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for (index, raw) in bytes.split(|&b| b == b'\n').enumerate() {
        if index > 0 {
            text.push('\n');
        }
        match std::str::from_utf8(raw) {
            Ok(line) => text.push_str(line),
            Err(e) => warn!(line = index + 1, reason = %e, "Skipping account line"),
        }
    }
    text
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

    #[test]
    fn parses_simple_line() {
        let account = parse_line(r#"alice:"secret":imap.example.com:alice@local"#).unwrap();
        assert_eq!(
            account,
            Account::new("alice", "secret", "imap.example.com", "alice@local")
        );
    }

    #[test]
    fn password_keeps_colons_and_spaces() {
        let account = parse_line(r#"alice:" p@ss:w0rd ":imap.example.com:alice@local"#).unwrap();
        assert_eq!(account.password, " p@ss:w0rd ");
        assert_eq!(account.server, "imap.example.com");
    }

    #[test]
    fn password_may_contain_quote_colon() {
        let account = parse_line(r#"bob:"a":b":pop.example.com:bob@local"#).unwrap();
        assert_eq!(account.password, "a");
        assert_eq!(account.server, "b\"");
        assert_eq!(account.target, "pop.example.com:bob@local");
    }

    #[test]
    fn fields_are_trimmed_and_target_keeps_colons() {
        let account =
            parse_line(r#"  carol :"pw": mail.example.com : lmtp:carol@local "#).unwrap();
        assert_eq!(account.user, "carol");
        assert_eq!(account.server, "mail.example.com");
        assert_eq!(account.target, "lmtp:carol@local");
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_line("alice:secret:imap:alice"), Err(ParseError::Malformed));
        assert_eq!(parse_line(r#"alice:"secret":imap"#), Err(ParseError::Malformed));
        assert_eq!(parse_line(r#"alice:"secret"imap:x"#), Err(ParseError::Malformed));
    }

    #[test]
    fn rejects_empty_fields() {
        assert_eq!(
            parse_line(r#":"pw":imap.example.com:a@local"#),
            Err(ParseError::EmptyField("user"))
        );
        assert_eq!(
            parse_line(r#"a:"":imap.example.com:a@local"#),
            Err(ParseError::EmptyField("password"))
        );
        assert_eq!(
            parse_line(r#"a:"pw": :a@local"#),
            Err(ParseError::EmptyField("server"))
        );
        assert_eq!(
            parse_line(r#"a:"pw":imap.example.com:"#),
            Err(ParseError::EmptyField("target"))
        );
    }

    #[test]
    fn skips_comments_blanks_and_bad_lines() {
        let text = "\
# accounts
alice:\"one\":imap.example.com:alice@local

   # indented comment
garbage line
bob:\"two\":pop.example.com:bob@local
";
        let accounts = parse_accounts(text);
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].user, "alice");
        assert_eq!(accounts[1].user, "bob");
    }

    #[test]
    fn duplicate_lines_are_kept() {
        let line = "alice:\"one\":imap.example.com:alice@local\n";
        assert_eq!(parse_accounts(&line.repeat(2)).len(), 2);
    }

    #[test]
    fn missing_file_yields_no_accounts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_accounts(&dir.path().join("absent.list")).is_empty());
    }

    #[test]
    fn loads_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.list");
        std::fs::write(
            &path,
            "b:\"1\":imap.b.example:b@local\na:\"2\":imap.a.example:a@local\n",
        )
        .unwrap();
        let users: Vec<_> = load_accounts(&path).into_iter().map(|a| a.user).collect();
        assert_eq!(users, vec!["b", "a"]);
    }

    #[test]
    fn invalid_utf8_line_skips_only_that_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.list");
        let mut contents = b"a:\"1\":imap.a.example:a@local\n".to_vec();
        contents.extend_from_slice(b"b:\"\xff\xfe\":imap.b.example:b@local\n");
        contents.extend_from_slice(b"c:\"3\":pop.c.example:c@local\n");
        std::fs::write(&path, contents).unwrap();

        let users: Vec<_> = load_accounts(&path).into_iter().map(|a| a.user).collect();
        assert_eq!(users, vec!["a", "c"]);
    }

    #[test]
    fn decode_lines_keeps_numbering() {
        assert_eq!(decode_lines(b"one\n\xff\nthree"), "one\n\nthree");
        assert_eq!(decode_lines(b"x\r\n"), "x\r\n");
    }

    proptest! {
        #[test]
        fn well_formed_lines_round_trip(
            user in "[a-zA-Z0-9._@-]{1,20}",
            password in "[ -~]{1,30}",
            server in "[a-z0-9.-]{1,20}",
            target in "[a-zA-Z0-9._@-]{1,20}",
        ) {
            // A password containing `":` would end early; those are not well formed.
            prop_assume!(!password.contains("\":"));
            let line = format!("{user}:\"{password}\":{server}:{target}");
            let account = parse_line(&line).unwrap();
            prop_assert_eq!(account.user, user);
            prop_assert_eq!(account.password, password);
            prop_assert_eq!(account.server, server);
            prop_assert_eq!(account.target, target);
        }

        #[test]
        fn parse_never_panics(line in ".*") {
            let _ = parse_line(&line);
        }
    }
}
