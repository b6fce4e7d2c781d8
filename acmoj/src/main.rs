mod cmd;
mod modules;

use crate::cmd::{
    login::{self, LoginArgs},
    new::{self, NewArgs},
    status::{self, StatusArgs},
    submit::{self, SubmitArgs},
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{env, str::FromStr};
use tokio::runtime::Builder;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, time::OffsetTime},
};

#[derive(Debug, Parser)]
#[command(name = "acmoj")]
#[command(about = "Command-line client for the ACM Online Judge")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Login(LoginArgs),
    Submit(SubmitArgs),
    Status(StatusArgs),
    New(NewArgs),
}

fn main() {
    dotenv().ok();

    let log_level = env::var("RUST_LOG").unwrap_or(String::from("info"));
    let filter = EnvFilter::builder()
        .with_default_directive(
            LevelFilter::from_str(&log_level)
                .expect("couldn't parse specified log level")
                .into(),
        )
        .from_env_lossy();
    let format = fmt::format()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_timer(OffsetTime::local_rfc_3339().unwrap());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(format)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let runtime = Builder::new_multi_thread().enable_all().build().unwrap();

    match Cli::parse().command {
        Commands::Login(args) => runtime.block_on(login::run(args)),
        Commands::Submit(args) => runtime.block_on(submit::run(args)),
        Commands::Status(args) => runtime.block_on(status::run(args)),
        Commands::New(args) => runtime.block_on(new::run(args)),
    }
    .expect("command failed");
}
