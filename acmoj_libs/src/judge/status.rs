use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) ms").unwrap());
static MEMORY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+) KiB").unwrap());

/// Statuses the judge reports while a submission is still being processed.
const IN_PROGRESS_STATUSES: [&str; 3] = ["Pending", "Compiling", "Judging"];

/// Header labels of the recognized status columns, as the judge renders them.
mod labels {
    pub const SUBMISSION_ID: &str = "编号";
    pub const USERNAME: &str = "昵称";
    pub const PROBLEM: &str = "题目";
    pub const STATUS: &str = "评测状态";
    pub const SCORE: &str = "分数";
    pub const TIME: &str = "运行时间";
    pub const MEMORY: &str = "内存";
    pub const LANGUAGE: &str = "语言";
    pub const SUBMIT_TIME: &str = "提交时间";
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("status table not found in the page")]
    TableNotFound,
    #[error("details container not found in the page")]
    DetailsNotFound,
    #[error("submission status not found in the page")]
    StatusNotFound,
}

/// One snapshot of a submission's judge state, as scraped from its status
/// page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionStatus {
    pub submission_id: Option<u64>,
    pub username: Option<String>,
    pub problem: Option<String>,
    pub status: Option<String>,
    pub score: Option<i64>,
    pub time_ms: Option<u64>,
    pub memory_kib: Option<u64>,
    pub language: Option<String>,
    pub submit_time: Option<String>,
    pub details: Vec<String>,
}

impl SubmissionStatus {
    /// Whether the submission has reached a terminal status.
    pub fn is_done(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => !IN_PROGRESS_STATUSES.contains(&status),
            None => false,
        }
    }

    /// Merge a freshly extracted snapshot into this record.
    ///
    /// Time, memory and details are sticky: the judge drops them from the
    /// page on some refreshes, so a snapshot that lacks them keeps the
    /// previously observed values.
    pub fn merge(&mut self, snapshot: SubmissionStatus) {
        let SubmissionStatus {
            submission_id,
            username,
            problem,
            status,
            score,
            time_ms,
            memory_kib,
            language,
            submit_time,
            details,
        } = snapshot;

        self.submission_id = submission_id;
        self.username = username;
        self.problem = problem;
        self.status = status;
        self.score = score;
        self.language = language;
        self.submit_time = submit_time;
        self.time_ms = time_ms.or(self.time_ms);
        self.memory_kib = memory_kib.or(self.memory_kib);
        if !details.is_empty() {
            self.details = details;
        }
    }

    /// Single-line text form of the record. Fields that have not been
    /// observed yet render as empty strings; the time/memory segment appears
    /// only once both are known.
    pub fn render_line(&self) -> String {
        let status = self.status.as_deref().unwrap_or("");
        let score = self.score.map(|score| score.to_string()).unwrap_or_default();
        let problem = self.problem.as_deref().unwrap_or("");
        let language = self.language.as_deref().unwrap_or("");
        let submit_time = self.submit_time.as_deref().unwrap_or("");

        let mut line = format!("{:<10} {:<3} {}, ", status, score, problem);
        if let (Some(time_ms), Some(memory_kib)) = (self.time_ms, self.memory_kib) {
            line.push_str(&format!("{}ms, {}KiB, ", time_ms, memory_kib));
        }
        line.push_str(&format!(
            "{}, {} Details: {}",
            language,
            submit_time,
            self.details.join(", ")
        ));

        line
    }
}

/// Where the scraper looks for header and data cells.
///
/// The live site occasionally renders status cells outside the table proper,
/// so the whole-document search is the compatible default; the table-scoped
/// search is the stricter strategy for well-formed pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CellScope {
    #[default]
    WholeDocument,
    StatusTable,
}

pub struct StatusPageScraper {
    scope: CellScope,
    table: Selector,
    th: Selector,
    td: Selector,
    details_div: Selector,
    detail_link: Selector,
}

impl StatusPageScraper {
    pub fn new(scope: CellScope) -> Self {
        let table =
            Selector::parse("table.table.table-striped.table-bordered.table-hover.status-list")
                .unwrap();
        let th = Selector::parse("th").unwrap();
        let td = Selector::parse("td").unwrap();
        let details_div = Selector::parse("div.m-auto").unwrap();
        let detail_link = Selector::parse("a").unwrap();

        Self {
            scope,
            table,
            th,
            td,
            details_div,
            detail_link,
        }
    }

    /// Extract a [`SubmissionStatus`] from a raw status page.
    pub fn extract(&self, html: &str) -> Result<SubmissionStatus, ExtractError> {
        let document = Html::parse_document(html);

        let table = document
            .select(&self.table)
            .next()
            .ok_or(ExtractError::TableNotFound)?;

        let (headers, cells) = match self.scope {
            CellScope::WholeDocument => (
                self.collect_texts(document.root_element(), &self.th, true),
                self.collect_texts(document.root_element(), &self.td, false),
            ),
            CellScope::StatusTable => (
                self.collect_texts(table, &self.th, true),
                self.collect_texts(table, &self.td, false),
            ),
        };

        let column = |label: &str| headers.iter().position(|header| header == label);
        let cell = |label: &str| {
            column(label)
                .and_then(|index| cells.get(index))
                .map(|text| text.to_string())
        };

        let details_div = document
            .select(&self.details_div)
            .next()
            .ok_or(ExtractError::DetailsNotFound)?;
        let details: Vec<String> = details_div
            .select(&self.detail_link)
            .map(|link| link.text().collect::<String>().trim().to_string())
            .collect();

        let record = SubmissionStatus {
            submission_id: cell(labels::SUBMISSION_ID).and_then(|text| text.parse().ok()),
            username: cell(labels::USERNAME),
            problem: cell(labels::PROBLEM),
            status: cell(labels::STATUS),
            score: cell(labels::SCORE).and_then(|text| text.parse().ok()),
            time_ms: cell(labels::TIME).as_deref().and_then(parse_time),
            memory_kib: cell(labels::MEMORY).as_deref().and_then(parse_memory),
            language: cell(labels::LANGUAGE),
            submit_time: cell(labels::SUBMIT_TIME),
            details,
        };

        if record.status.is_none() {
            return Err(ExtractError::StatusNotFound);
        }

        Ok(record)
    }

    fn collect_texts(
        &self,
        root: ElementRef<'_>,
        selector: &Selector,
        strip_question_mark: bool,
    ) -> Vec<String> {
        root.select(selector)
            .map(|element| {
                let text = element.text().collect::<String>();
                let text = text.trim();
                if strip_question_mark {
                    text.trim_end_matches('?').to_string()
                } else {
                    text.to_string()
                }
            })
            .collect()
    }
}

impl Default for StatusPageScraper {
    fn default() -> Self {
        Self::new(CellScope::default())
    }
}

fn parse_time(text: &str) -> Option<u64> {
    TIME_PATTERN
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

fn parse_memory(text: &str) -> Option<u64> {
    MEMORY_PATTERN
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}
