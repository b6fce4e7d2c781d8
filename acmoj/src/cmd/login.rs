use crate::cmd;
use crate::modules::session::SessionStore;
use acmoj_libs::judge::client::AcmojClient;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(short, long)]
    username: Option<String>,
}

pub async fn run(args: LoginArgs) -> Result<()> {
    let store = SessionStore::from_env()?;
    let cached = store.load_cookie().ok();
    let mut client = AcmojClient::new(cmd::client_config(cached))?;

    if client.validate_session().await? {
        println!("Login cookie is still valid.");
        return Ok(());
    }

    println!("Login cookie is invalid. Getting a new one...");
    let username = match args.username {
        Some(username) => username,
        None => cmd::prompt("Username: ")?,
    };
    let password = cmd::prompt("Password: ")?;

    let cookie = client.login(&username, &password).await?;
    client.set_session(cookie.clone());
    if !client.validate_session().await? {
        anyhow::bail!("login cookie is still invalid");
    }

    store
        .store_cookie(&cookie)
        .context("failed to store the login cookie")?;
    println!("Login successful.");

    Ok(())
}
