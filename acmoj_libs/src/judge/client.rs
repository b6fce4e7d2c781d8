use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, redirect, Client, RequestBuilder, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

type Result<T> = std::result::Result<T, JudgeClientError>;

pub const DEFAULT_BASE_URL: &str = "https://acm.sjtu.edu.cn/OnlineJudge/";
pub const SESSION_COOKIE_NAME: &str = "acmoj-session";

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:74.0) Gecko/20100101 Firefox/74.0";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
/// Marker only present on the login page while a session is active.
const LOGOUT_MARKER: &str = "登出";

static SESSION_COOKIE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-f]{8}-([0-9a-f]{4}-){3}[0-9a-f]{12}").unwrap());
static SUBMISSION_REDIRECT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"code/(\d+)/").unwrap());

#[derive(Debug, Error)]
pub enum JudgeClientError {
    #[error("failed to request to the judge")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid judge url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("submission {0} not found")]
    SubmissionNotFound(u64),
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("submission was rejected by the judge: {0}")]
    SubmitRejected(String),
    #[error("abort request failed with status {0}")]
    AbortFailed(StatusCode),
}

/// The network operations the polling driver depends on.
#[async_trait]
pub trait SubmissionGateway {
    /// Fetch the raw status page of a submission. Fails with
    /// [`JudgeClientError::SubmissionNotFound`] when the judge has no such
    /// submission.
    async fn fetch_status_page(&self, submission_id: u64) -> Result<String>;

    /// Ask the judge to stop judging a submission. Best-effort.
    async fn abort_judging(&self, submission_id: u64) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub session: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            session: None,
        }
    }
}

/// HTTP client for the ACM Online Judge.
///
/// Redirects are never followed: the judge leans on them (submit answers
/// with a redirect to the new submission's page), so the interesting data is
/// in the `Location` and `Set-Cookie` headers of the first response.
pub struct AcmojClient {
    base_url: Url,
    login_url: Url,
    client: Client,
    session: Option<String>,
}

impl AcmojClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut base = config.base_url;
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let login_url = base_url.join("login")?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
        headers.insert(header::ACCEPT, header::HeaderValue::from_static(ACCEPT));
        headers.insert("x-acmoj-is-csrf", header::HeaderValue::from_static("no"));

        let client = Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(AcmojClient {
            base_url,
            login_url,
            client,
            session: config.session,
        })
    }

    pub fn set_session(&mut self, session: String) {
        self.session = Some(session);
    }

    /// The human-facing status page URL of a submission.
    pub fn submission_url(&self, submission_id: u64) -> Result<Url> {
        Ok(self.base_url.join(&format!("code/{}", submission_id))?)
    }

    /// Obtain a fresh session cookie from username/password credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let res = self
            .client
            .post(self.login_url.clone())
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let session = res
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(session_cookie_value)
            .next();

        match session {
            Some(cookie) if SESSION_COOKIE_PATTERN.is_match(&cookie) => Ok(cookie),
            other => Err(JudgeClientError::LoginFailed(format!(
                "got cookie: {:?}",
                other
            ))),
        }
    }

    /// Whether the current session cookie is still accepted by the judge.
    pub async fn validate_session(&self) -> Result<bool> {
        let session = match self.session.as_deref() {
            Some(session) if SESSION_COOKIE_PATTERN.is_match(session) => session,
            _ => return Ok(false),
        };
        tracing::debug!("validating session cookie {}...", &session[..8]);

        let res = self
            .with_session(self.client.get(self.login_url.clone()))
            .send()
            .await?;
        let body = res.text().await?;

        Ok(body.contains(LOGOUT_MARKER))
    }

    /// Submit source code for judging and return the new submission id.
    pub async fn submit(&self, problem_id: u64, language: &str, code: &str) -> Result<u64> {
        let submit_url = self
            .base_url
            .join(&format!("problem/{}/submit", problem_id))?;
        let problem_id_text = problem_id.to_string();

        let res = self
            .with_session(self.client.post(submit_url))
            .form(&[
                ("language", language),
                ("code", code),
                ("problem_id", problem_id_text.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        let location = res
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        SUBMISSION_REDIRECT_PATTERN
            .captures(location)
            .and_then(|caps| caps[1].parse().ok())
            .ok_or_else(|| {
                JudgeClientError::SubmitRejected(format!(
                    "judge answered {} without a submission redirect",
                    status
                ))
            })
    }

    fn with_session(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.as_deref() {
            Some(session) => builder.header(
                header::COOKIE,
                format!("{}={}", SESSION_COOKIE_NAME, session),
            ),
            None => builder,
        }
    }
}

#[async_trait]
impl SubmissionGateway for AcmojClient {
    async fn fetch_status_page(&self, submission_id: u64) -> Result<String> {
        let url = self.submission_url(submission_id)?;
        let res = self.with_session(self.client.get(url)).send().await?;

        if !res.status().is_success() {
            return Err(JudgeClientError::SubmissionNotFound(submission_id));
        }

        Ok(res.text().await?)
    }

    async fn abort_judging(&self, submission_id: u64) -> Result<()> {
        let url = self
            .base_url
            .join(&format!("code/{}/abort", submission_id))?;
        let res = self.with_session(self.client.post(url)).send().await?;

        let status = res.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(JudgeClientError::AbortFailed(status))
        }
    }
}

fn session_cookie_value(set_cookie: &str) -> Option<String> {
    let (name, rest) = set_cookie.split_once('=')?;
    if name.trim() != SESSION_COOKIE_NAME {
        return None;
    }
    let value = rest.split(';').next()?.trim();
    Some(value.to_string())
}
