use crate::modules::source::{self, SourceConfig};
use anyhow::{Context, Result};
use clap::Args;
use std::{fs, path::PathBuf, process::Command};

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Problem id, optionally with a suffix such as "1234-bf" or "1234 WA".
    problem_id: String,

    /// Use the given source code instead of the template.
    source_path: Option<PathBuf>,

    #[arg(short = 'a', long = "algorithm-tag", default_value = "")]
    tag: String,
}

pub async fn run(args: NewArgs) -> Result<()> {
    let config = SourceConfig::from_env()?;

    let target = PathBuf::from(format!("{}.cpp", args.problem_id));
    if target.exists() {
        anyhow::bail!("file already exists: {}", target.display());
    }

    let body = match &args.source_path {
        Some(path) => Some(
            fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => {
            println!("Source code not specified. Using the template.");
            None
        }
    };

    let code = source::generate(&config, &args.problem_id, &args.tag, body.as_deref())?;
    fs::write(&target, code)
        .with_context(|| format!("failed to write {}", target.display()))?;
    println!("New file created: {}", target.display());

    if let Err(e) = Command::new("code").arg(&target).spawn() {
        tracing::debug!("could not open an editor: {}", e);
    }

    Ok(())
}
