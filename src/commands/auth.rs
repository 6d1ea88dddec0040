//! `auth set-password` command handler.

use std::io::{self, Write as _};

use anyhow::{Result, bail};
use stackwatch_core::credentials::CredentialStore;

pub async fn run_auth_set_password(credential_store: &CredentialStore, username: &str) -> Result<()> {
    if credential_store.credentials_exist().await? {
        bail!("credentials already exist; this crate supports exactly one account");
    }

    print!("password: ");
    io::stdout().flush()?;
    let password = rpassword_or_stdin()?;

    credential_store.set_password(username, &password).await?;
    println!("credentials set for {username}");
    Ok(())
}

/// Reads a password line from stdin. A real deployment would use a
/// no-echo terminal read; kept to stdin here since terminal control is
/// plumbing outside this crate's scope (§1: "HTTP server,
/// authentication, ... — pure plumbing").
fn rpassword_or_stdin() -> Result<String> {
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
