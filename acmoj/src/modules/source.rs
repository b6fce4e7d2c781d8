use anyhow::{Context, Result};
use chrono::Local;
use std::{env, fs, path::PathBuf};

pub const DEFAULT_AUTHOR: &str = "You (your_email@sjtu.edu.cn)";

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub author: String,
    pub template_path: PathBuf,
}

impl SourceConfig {
    /// Author from `ACMOJ_AUTHOR`, template from the platform config
    /// directory.
    pub fn from_env() -> Result<Self> {
        let author = env::var("ACMOJ_AUTHOR").unwrap_or_else(|_| String::from(DEFAULT_AUTHOR));
        let template_path = dirs::config_dir()
            .context("could not determine the user config directory")?
            .join("acmoj")
            .join("template.cpp");

        Ok(Self {
            author,
            template_path,
        })
    }
}

/// Metadata kept in the `//`-comment block at the top of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceHeader {
    pub date: Option<String>,
    pub author: Option<String>,
    pub problem_id: Option<String>,
    pub algorithm_tag: Option<String>,
}

impl SourceHeader {
    /// The problem id to submit under: the header value with any suffix
    /// introduced by a space or dash removed ("1234-bf" submits as 1234).
    pub fn submission_problem_id(&self) -> Option<u64> {
        self.problem_id
            .as_deref()?
            .split(['-', ' '])
            .next()?
            .parse()
            .ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSource {
    pub header: SourceHeader,
    pub body: String,
}

/// Split a source file into its leading `//`-comment header and the code
/// body. The header ends at the first non-comment line; comment lines after
/// that point belong to the body.
pub fn parse(source: &str) -> ParsedSource {
    let mut body = String::new();
    let mut comment_lines = Vec::new();
    let mut comment_end = false;
    for line in source.split('\n') {
        if !comment_end && line.starts_with("//") {
            comment_lines.push(line);
        } else {
            comment_end = true;
            body.push_str(line);
            body.push('\n');
        }
    }

    let mut header = SourceHeader::default();
    for line in comment_lines {
        if line.starts_with("// Date") {
            header.date = header_value(line);
        } else if line.starts_with("// Author") {
            header.author = header_value(line);
        } else if line.starts_with("// Problem ID") {
            header.problem_id = header_value(line);
        } else if line.starts_with("// Algorithm Tag") {
            header.algorithm_tag = header_value(line);
        }
    }

    ParsedSource {
        header,
        body: body.trim().to_string(),
    }
}

/// Produce the full contents of a new source file: a fresh header followed
/// by the body. A given body has its old header stripped and its author
/// carried over; without one the template file is used.
pub fn generate(
    config: &SourceConfig,
    problem_id: &str,
    algorithm_tag: &str,
    source: Option<&str>,
) -> Result<String> {
    let (author, body) = match source {
        Some(source) => {
            let parsed = parse(source);
            let author = parsed.header.author.unwrap_or_else(|| config.author.clone());
            (author, parsed.body)
        }
        None => {
            let template = fs::read_to_string(&config.template_path).with_context(|| {
                format!("template file not found: {}", config.template_path.display())
            })?;
            (config.author.clone(), template)
        }
    };

    Ok(format!(
        "{}{}",
        render_header(&author, problem_id, algorithm_tag),
        body
    ))
}

fn render_header(author: &str, problem_id: &str, algorithm_tag: &str) -> String {
    let date = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "// -*- coding: utf-8 -*-\n\
         // Date             : {date}\n\
         // Author           : {author}\n\
         // Problem ID       : {problem_id}\n\
         // Algorithm Tag    : {algorithm_tag}\n"
    )
}

fn header_value(line: &str) -> Option<String> {
    line.splitn(2, ':')
        .nth(1)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
