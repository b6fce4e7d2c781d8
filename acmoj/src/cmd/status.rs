use crate::cmd;
use crate::modules::session::SessionStore;
use acmoj_libs::judge::client::SubmissionGateway;
use acmoj_libs::judge::status::StatusPageScraper;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Args)]
pub struct StatusArgs {
    submission_id: Option<u64>,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let store = SessionStore::from_env()?;
    let client = cmd::authenticated_client(&store).await?;

    let submission_id = match args.submission_id {
        Some(submission_id) => submission_id,
        None => {
            let submission_id = store
                .load_last_submission()
                .context("submission id not specified and no previous submission recorded")?;
            println!(
                "Submission ID not specified. Using the last submission ID: {}",
                submission_id
            );
            submission_id
        }
    };

    let page = client.fetch_status_page(submission_id).await?;
    let record = StatusPageScraper::default().extract(&page)?;

    println!("{}", record.render_line());
    println!(
        "See the full submission status at {}",
        client.submission_url(submission_id)?
    );

    Ok(())
}
