//! Terminal implementations of the prompt and session hooks.

use std::io::BufRead;

use {
    anyhow::{Result, bail},
    portal_accounts::{Account, AccountContext, AccountPrompt, FailureNotice, SessionControl},
    portal_common::{SubscriberRef, subscriber_fn},
};

/// Account menu on stdout, progress and failures on stderr.
pub struct TerminalPrompt;

impl AccountPrompt for TerminalPrompt {
    fn show_loading(&self) {
        eprintln!("Loading accounts...");
    }

    fn present_accounts(&self, accounts: &[Account]) {
        println!("Select an account:");
        for (i, account) in accounts.iter().enumerate() {
            println!(
                "  {}) {}  [{}-{}]",
                i + 1,
                account.display_value,
                account.customer_number,
                account.account_id
            );
        }
    }

    fn show_failure(&self, notice: &FailureNotice) {
        eprintln!("{}", notice.message);
    }

    fn finish_loading(&self) {}

    fn hide(&self) {}
}

/// There is no page to reload or navigate; tell the user instead.
pub struct CliSession;

impl SessionControl for CliSession {
    fn force_reload(&self) {
        eprintln!("Session is no longer authorized. Sign in again and rerun the command.");
    }

    fn redirect(&self, url: &str) {
        println!("Continue at {url}");
    }
}

/// Subscriber printing each context as pretty JSON on stdout.
pub fn json_printer(name: &str) -> SubscriberRef<AccountContext> {
    subscriber_fn(name, |ctx: &AccountContext| {
        println!("{}", serde_json::to_string_pretty(ctx)?);
        Ok(())
    })
}

/// Read a 1-based menu choice, re-asking on invalid input.
pub fn read_choice(mut input: impl BufRead, count: usize) -> Result<usize> {
    let mut line = String::new();
    loop {
        eprint!("Account [1-{count}]: ");
        line.clear();
        if input.read_line(&mut line)? == 0 {
            bail!("no account selected");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => return Ok(n - 1),
            _ => eprintln!("Enter a number between 1 and {count}."),
        }
    }
}
