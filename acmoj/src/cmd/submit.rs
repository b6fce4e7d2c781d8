use crate::cmd;
use crate::modules::session::SessionStore;
use crate::modules::source;
use acmoj_libs::judge::status::StatusPageScraper;
use acmoj_libs::judge::track::{self, ConsoleSink, TrackOutcome, TrackSettings};
use anyhow::{Context, Result};
use clap::Args;
use std::{fs, path::PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct SubmitArgs {
    source_path: PathBuf,

    #[arg(short, long)]
    problem: Option<u64>,

    /// Track the submission status until it is judged.
    #[arg(short, long)]
    track: bool,

    /// Language of the source code.
    #[arg(short, long, default_value = "cpp")]
    language: String,
}

pub async fn run(args: SubmitArgs) -> Result<()> {
    let store = SessionStore::from_env()?;
    let client = cmd::authenticated_client(&store).await?;

    let code = fs::read_to_string(&args.source_path)
        .with_context(|| format!("failed to read {}", args.source_path.display()))?;

    let problem_id = match args.problem {
        Some(problem_id) => problem_id,
        None => {
            let problem_id = source::parse(&code)
                .header
                .submission_problem_id()
                .context("problem id not specified and not found in the source header")?;
            println!(
                "Problem ID not specified. Using the problem ID in the source file: {}",
                problem_id
            );
            problem_id
        }
    };

    let submission_id = client.submit(problem_id, &args.language, &code).await?;
    store
        .store_last_submission(submission_id)
        .context("failed to record the submission id")?;
    println!("Submission successful. Submission ID: {}", submission_id);
    println!(
        "See the submission status at {}",
        client.submission_url(submission_id)?
    );

    if args.track {
        let cancel = CancellationToken::new();
        let handle = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.cancel();
            }
        });

        let scraper = StatusPageScraper::default();
        let mut sink = ConsoleSink::new();
        let (_, outcome) = track::track(
            &client,
            submission_id,
            &scraper,
            &TrackSettings::default(),
            &mut sink,
            cancel,
        )
        .await?;

        match outcome {
            TrackOutcome::Completed => {}
            TrackOutcome::TimedOut => println!("\nTrack time limit exceeded. Stop tracking."),
            TrackOutcome::Cancelled => println!("\nJudging aborted."),
        }
    }

    Ok(())
}
