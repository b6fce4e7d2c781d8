pub mod login;
pub mod new;
pub mod status;
pub mod submit;

use crate::modules::session::SessionStore;
use acmoj_libs::judge::client::{AcmojClient, ClientConfig, DEFAULT_BASE_URL};
use anyhow::{Context, Result};
use std::env;
use std::io::{self, BufRead, Write};

pub(crate) fn client_config(session: Option<String>) -> ClientConfig {
    ClientConfig {
        base_url: env::var("ACMOJ_URL").unwrap_or_else(|_| String::from(DEFAULT_BASE_URL)),
        session,
    }
}

/// Build a client from the stored login cookie, refusing to proceed when the
/// judge no longer accepts it.
pub(crate) async fn authenticated_client(store: &SessionStore) -> Result<AcmojClient> {
    let cookie = store
        .load_cookie()
        .context("no login cookie found, run `acmoj login` first")?;
    let client = AcmojClient::new(client_config(Some(cookie)))?;

    if !client.validate_session().await? {
        anyhow::bail!("login cookie is invalid, run `acmoj login` again");
    }

    Ok(client)
}

pub(crate) fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
