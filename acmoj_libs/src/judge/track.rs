use std::io::{self, Write};
use thiserror::Error;
use tokio::time::{self, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::judge::client::{JudgeClientError, SubmissionGateway};
use crate::judge::status::{ExtractError, StatusPageScraper, SubmissionStatus};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to fetch the status page")]
    Fetch(#[from] JudgeClientError),
    #[error("failed to extract the submission status")]
    Extract(#[from] ExtractError),
}

/// How a tracking session ended. All three are normal terminations, not
/// errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Completed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct TrackSettings {
    pub max_duration: Duration,
    pub interval: Duration,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(120),
            interval: Duration::from_secs(1),
        }
    }
}

/// Receives one render per polling iteration, plus a final one when the
/// submission reaches a terminal status.
pub trait StatusSink {
    fn update(&mut self, record: &SubmissionStatus);
    fn finish(&mut self, record: &SubmissionStatus);
}

/// Renders each update over the previous one with a carriage return, padded
/// to the widest line emitted so far so shorter lines fully erase longer
/// ones.
pub struct ConsoleSink {
    max_width: usize,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { max_width: 0 }
    }

    fn padded(&mut self, record: &SubmissionStatus) -> String {
        let line = format!(" {}", record.render_line());
        let width = line.chars().count();
        self.max_width = self.max_width.max(width);
        format!("{}{}", line, " ".repeat(self.max_width - width))
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSink for ConsoleSink {
    fn update(&mut self, record: &SubmissionStatus) {
        print!("{}\r", self.padded(record));
        let _ = io::stdout().flush();
    }

    fn finish(&mut self, record: &SubmissionStatus) {
        println!("{}", self.padded(record));
    }
}

/// Poll a submission until it reaches a terminal status, the tracking budget
/// runs out, or the token is cancelled.
///
/// One record is kept across iterations and snapshots are merged into it
/// with sticky semantics. Fetch and parse failures propagate: a page that
/// stops parsing means the judge changed, not a transient condition.
/// Cancellation fires one best-effort abort request before returning.
pub async fn track<G>(
    gateway: &G,
    submission_id: u64,
    scraper: &StatusPageScraper,
    settings: &TrackSettings,
    sink: &mut dyn StatusSink,
    cancel: CancellationToken,
) -> Result<(SubmissionStatus, TrackOutcome), TrackError>
where
    G: SubmissionGateway + Sync,
{
    let started = Instant::now();
    let mut record = SubmissionStatus::default();

    loop {
        let page = tokio::select! {
            page = gateway.fetch_status_page(submission_id) => page?,
            _ = cancel.cancelled() => {
                abort_best_effort(gateway, submission_id).await;
                return Ok((record, TrackOutcome::Cancelled));
            }
        };

        record.merge(scraper.extract(&page)?);
        sink.update(&record);

        if record.is_done() {
            sink.finish(&record);
            return Ok((record, TrackOutcome::Completed));
        }
        if started.elapsed() > settings.max_duration {
            return Ok((record, TrackOutcome::TimedOut));
        }

        tokio::select! {
            _ = time::sleep(settings.interval) => {}
            _ = cancel.cancelled() => {
                abort_best_effort(gateway, submission_id).await;
                return Ok((record, TrackOutcome::Cancelled));
            }
        }
    }
}

async fn abort_best_effort<G>(gateway: &G, submission_id: u64)
where
    G: SubmissionGateway + Sync,
{
    if let Err(e) = gateway.abort_judging(submission_id).await {
        tracing::warn!("failed to abort judging for submission {}: {}", submission_id, e);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status_page(status: &str) -> String {
        format!(
            r##"<html><body>
            <table class="table table-striped table-bordered table-hover status-list">
              <thead><tr><th>编号</th><th>评测状态</th><th>分数</th></tr></thead>
              <tbody><tr><td>42</td><td>{status}</td><td>100</td></tr></tbody>
            </table>
            <div class="m-auto"><a href="#">AC</a></div>
            </body></html>"##
        )
    }

    struct ScriptedGateway {
        pages: Vec<String>,
        fetches: AtomicUsize,
        aborts: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(pages: Vec<String>) -> Self {
            Self {
                pages,
                fetches: AtomicUsize::new(0),
                aborts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SubmissionGateway for ScriptedGateway {
        async fn fetch_status_page(
            &self,
            _submission_id: u64,
        ) -> Result<String, JudgeClientError> {
            let index = self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages[index.min(self.pages.len() - 1)].clone())
        }

        async fn abort_judging(&self, _submission_id: u64) -> Result<(), JudgeClientError> {
            self.aborts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NotFoundGateway;

    #[async_trait]
    impl SubmissionGateway for NotFoundGateway {
        async fn fetch_status_page(
            &self,
            submission_id: u64,
        ) -> Result<String, JudgeClientError> {
            Err(JudgeClientError::SubmissionNotFound(submission_id))
        }

        async fn abort_judging(&self, _submission_id: u64) -> Result<(), JudgeClientError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        updates: Vec<String>,
        finished: Vec<String>,
    }

    impl StatusSink for CollectingSink {
        fn update(&mut self, record: &SubmissionStatus) {
            self.updates.push(record.render_line());
        }

        fn finish(&mut self, record: &SubmissionStatus) {
            self.finished.push(record.render_line());
        }
    }

    fn immediate_settings() -> TrackSettings {
        TrackSettings {
            max_duration: Duration::from_secs(3600),
            interval: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn tracking_stops_once_the_submission_is_judged() {
        let gateway = ScriptedGateway::new(vec![
            status_page("Judging"),
            status_page("Judging"),
            status_page("Judging"),
            status_page("Accepted"),
        ]);
        let scraper = StatusPageScraper::default();
        let mut sink = CollectingSink::default();

        let (record, outcome) = track(
            &gateway,
            42,
            &scraper,
            &immediate_settings(),
            &mut sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 4);
        assert_eq!(record.status.as_deref(), Some("Accepted"));
        assert!(record.is_done());
        assert_eq!(sink.updates.len(), 4);
        assert_eq!(sink.finished.len(), 1);
        assert_eq!(gateway.aborts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tracking_times_out_when_the_judge_never_finishes() {
        let gateway = ScriptedGateway::new(vec![status_page("Judging")]);
        let scraper = StatusPageScraper::default();
        let settings = TrackSettings {
            max_duration: Duration::from_millis(50),
            interval: Duration::from_millis(30),
        };
        let mut sink = CollectingSink::default();

        let (record, outcome) = track(
            &gateway,
            42,
            &scraper,
            &settings,
            &mut sink,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome, TrackOutcome::TimedOut);
        assert_eq!(record.status.as_deref(), Some("Judging"));
        assert!(!record.is_done());
        assert!(sink.finished.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_judging_exactly_once() {
        let gateway = ScriptedGateway::new(vec![status_page("Judging")]);
        let scraper = StatusPageScraper::default();
        let settings = TrackSettings {
            max_duration: Duration::from_secs(120),
            interval: Duration::from_secs(1),
        };
        let mut sink = CollectingSink::default();

        let cancel = CancellationToken::new();
        let handle = cancel.clone();
        tokio::spawn(async move {
            // fires during the second wait
            time::sleep(Duration::from_millis(1500)).await;
            handle.cancel();
        });

        let (_, outcome) = track(&gateway, 42, &scraper, &settings, &mut sink, cancel)
            .await
            .unwrap();

        assert_eq!(outcome, TrackOutcome::Cancelled);
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(gateway.aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parse_failures_propagate_to_the_caller() {
        let gateway = ScriptedGateway::new(vec![String::from("<html></html>")]);
        let scraper = StatusPageScraper::default();
        let mut sink = CollectingSink::default();

        let result = track(
            &gateway,
            42,
            &scraper,
            &immediate_settings(),
            &mut sink,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(TrackError::Extract(ExtractError::TableNotFound))
        ));
    }

    #[tokio::test]
    async fn fetch_failures_propagate_to_the_caller() {
        let scraper = StatusPageScraper::default();
        let mut sink = CollectingSink::default();

        let result = track(
            &NotFoundGateway,
            42,
            &scraper,
            &immediate_settings(),
            &mut sink,
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(
            result,
            Err(TrackError::Fetch(JudgeClientError::SubmissionNotFound(42)))
        ));
    }

    #[test]
    fn console_sink_pads_every_line_to_the_widest_one() {
        let mut sink = ConsoleSink::new();
        let long = SubmissionStatus {
            status: Some(String::from("Judging")),
            problem: Some(String::from("1000. A rather long problem title")),
            ..SubmissionStatus::default()
        };
        let short = SubmissionStatus {
            status: Some(String::from("Accepted")),
            problem: Some(String::from("1000")),
            ..SubmissionStatus::default()
        };

        let first = sink.padded(&long);
        let second = sink.padded(&short);

        assert_eq!(first.chars().count(), second.chars().count());
        assert!(second.ends_with(' '));
    }
}
