//! HDU Online Judge backend.
//!
//! Drives the public web interface at acm.hdu.edu.cn: form login, form
//! submit, the per-user status table and the compile error page. Pages are
//! scraped with regular expressions.
//!
//! A new `reqwest::Client` with an empty cookie jar is created by every
//! `authenticate`, so a re-login always starts from a clean session.

use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, info};
use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use crate::config::{AccountSettings, JudgeSettings};
use crate::judge::{
    Backend, BackendError, BackendResult, COMPILE_ERROR, JudgerIdentity, PollSchedule,
    RemoteVerdict, Session,
};
use crate::protocol::SubmissionJob;

const LOG_TARGET: &str = "vjudger::backend::hdu";

pub const DEFAULT_BASE_URL: &str = "https://acm.hdu.edu.cn";

const USER_AGENT: &str = concat!("vjudger/", env!("CARGO_PKG_VERSION"));

/// Dispatcher language code -> HDU language id.
const LANGUAGES: &[(&str, &str)] = &[
    ("0", "0"), // G++
    ("1", "1"), // GCC
    ("2", "2"), // C++
    ("3", "3"), // C
    ("4", "4"), // Pascal
    ("5", "5"), // Java
    ("6", "6"), // C#
];

/// Status texts of a submission that is not judged yet.
const PENDING_STATUSES: &[&str] = &["Queuing", "Compiling", "Running", "Pending", "Rejudging"];

const LOGIN_FAILED_MARKER: &str = "No such user or wrong password";
const SUBMIT_ERROR_MARKER: &str = "One or more following ERROR(s) occurred";

// Columns: run id, submit time, status, problem, time, memory, ...
static STATUS_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<tr[^>]*>\s*<td[^>]*>(\d+)</td>\s*<td[^>]*>[^<]*</td>\s*<td[^>]*>(.*?)</td>\s*<td[^>]*>.*?</td>\s*<td[^>]*>(\d+)MS</td>\s*<td[^>]*>(\d+)K</td>",
    )
    .expect("status row pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

static PRE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<pre[^>]*>(.*?)</pre>").expect("pre pattern is valid"));

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<li>(.*?)</li>").expect("list item pattern is valid"));

static LOGIN_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"name\s*=\s*"?userpass"?"#).expect("login form pattern is valid")
});

/// HDU-private session state.
#[derive(Debug, Default)]
pub struct HduState {
    client: Option<Client>,
    /// Newest run id listed before the last submit.
    baseline: Option<u64>,
    /// Run id of the last submission, once seen in the status table.
    remote_runid: Option<String>,
}

pub struct HduBackend {
    identity: JudgerIdentity,
    username: String,
    password: String,
    base_url: String,
    poll_interval: Duration,
    poll_timeout: Duration,
    /// Per-request bound, applied to connect and to the whole exchange.
    request_timeout: Duration,
}

impl HduBackend {
    pub fn new(account: &AccountSettings, judge: &JudgeSettings) -> Self {
        let base_url = account
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Self {
            identity: JudgerIdentity::new("hdu", &account.username),
            username: account.username.clone(),
            password: account.password.clone(),
            base_url,
            poll_interval: judge.poll_interval(),
            poll_timeout: judge.poll_timeout(),
            request_timeout: judge.request_timeout(),
        }
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    fn status_url(&self) -> String {
        let user: String = url::form_urlencoded::byte_serialize(self.username.as_bytes()).collect();
        self.url(&format!(
            "/status.php?first=&pid=&user={}&lang=0&status=0",
            user
        ))
    }

    /// The logged-in client. Cloning is cheap and shares the cookie jar.
    fn client(state: &HduState) -> BackendResult<Client> {
        state
            .client
            .clone()
            .ok_or_else(|| BackendError::LoginFailed("not logged in".to_string()))
    }

    async fn status_rows(&self, client: &Client) -> BackendResult<Vec<StatusRow>> {
        let html = get_text(client, &self.status_url()).await?;
        Ok(parse_status_rows(&html))
    }
}

impl Backend for HduBackend {
    type State = HduState;

    fn identity(&self) -> &JudgerIdentity {
        &self.identity
    }

    fn translate_language(&self, code: &str) -> BackendResult<String> {
        LANGUAGES
            .iter()
            .find(|(dispatcher_code, _)| *dispatcher_code == code)
            .map(|(_, hdu_id)| hdu_id.to_string())
            .ok_or_else(|| BackendError::UnsupportedLanguage(code.to_string()))
    }

    async fn authenticate(&self, session: &mut Session<HduState>) -> BackendResult<()> {
        session.state = HduState::default();

        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .connect_timeout(self.request_timeout)
            .timeout(self.request_timeout)
            .build()
            .map_err(http_error)?;

        let page = post_form(
            &client,
            &self.url("/userloginex.php?action=login"),
            &[
                ("username", self.username.as_str()),
                ("userpass", self.password.as_str()),
                ("login", "Sign In"),
            ],
        )
        .await?;

        if !login_succeeded(&page) {
            return Err(BackendError::LoginFailed(format!(
                "credentials rejected for {}",
                self.username
            )));
        }

        info!(target: LOG_TARGET, "[{}] logged in", self.identity);
        session.state.client = Some(client);
        Ok(())
    }

    async fn submit(
        &self,
        session: &mut Session<HduState>,
        job: &SubmissionJob,
        language: &str,
    ) -> BackendResult<()> {
        let client = Self::client(&session.state)?;

        let baseline = self
            .status_rows(&client)
            .await?
            .first()
            .and_then(StatusRow::numeric_id)
            .unwrap_or(0);

        let page = post_form(
            &client,
            &self.url("/submit.php?action=submit"),
            &[
                ("check", "0"),
                ("problemid", job.vid.as_str()),
                ("language", language),
                ("usercode", job.source.as_str()),
            ],
        )
        .await?;
        classify_submit_response(&page)?;

        debug!(
            target: LOG_TARGET,
            "[{}] submitted run {} to problem {} (baseline run {})",
            self.identity,
            job.runid,
            job.vid,
            baseline
        );
        session.state.baseline = Some(baseline);
        session.state.remote_runid = None;
        Ok(())
    }

    async fn poll_verdict(&self, session: &mut Session<HduState>) -> BackendResult<RemoteVerdict> {
        let client = Self::client(&session.state)?;
        let baseline = session.state.baseline.unwrap_or(0);
        let mut schedule = PollSchedule::new(self.poll_interval, self.poll_timeout);

        loop {
            let rows = self.status_rows(&client).await?;
            let row = match session.state.remote_runid.as_deref() {
                Some(pinned) => rows.into_iter().find(|row| row.run_id == pinned),
                None => rows
                    .into_iter()
                    .find(|row| row.numeric_id().is_some_and(|id| id > baseline)),
            };

            match row {
                Some(row) => {
                    if session.state.remote_runid.is_none() {
                        session.state.remote_runid = Some(row.run_id.clone());
                    }
                    if !row.is_pending() {
                        return Ok(row.into_verdict());
                    }
                    debug!(
                        target: LOG_TARGET,
                        "[{}] run {} still {}",
                        self.identity,
                        row.run_id,
                        row.status
                    );
                }
                None => {
                    debug!(
                        target: LOG_TARGET,
                        "[{}] submission not listed yet",
                        self.identity
                    );
                }
            }

            schedule.wait().await?;
        }
    }

    async fn fetch_compile_diagnostics(
        &self,
        session: &mut Session<HduState>,
    ) -> BackendResult<String> {
        let client = Self::client(&session.state)?;
        let run_id = session
            .state
            .remote_runid
            .clone()
            .ok_or_else(|| BackendError::Parse("no judged submission".to_string()))?;

        let html = get_text(&client, &self.url(&format!("/viewerror.php?rid={}", run_id))).await?;
        extract_compile_info(&html)
            .ok_or_else(|| BackendError::Parse("compile error page has no <pre> block".to_string()))
    }
}

/// One row of the status table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusRow {
    run_id: String,
    status: String,
    time_ms: String,
    memory_kb: String,
}

impl StatusRow {
    fn numeric_id(&self) -> Option<u64> {
        self.run_id.parse().ok()
    }

    fn is_pending(&self) -> bool {
        PENDING_STATUSES
            .iter()
            .any(|pending| self.status.starts_with(pending))
    }

    fn into_verdict(self) -> RemoteVerdict {
        RemoteVerdict {
            memory_used: self.memory_kb,
            time_used: self.time_ms,
            result: normalize_status(&self.status),
            remote_runid: self.run_id,
        }
    }
}

/// Status rows, newest first as HDU lists them.
fn parse_status_rows(html: &str) -> Vec<StatusRow> {
    STATUS_ROW
        .captures_iter(html)
        .map(|caps| StatusRow {
            run_id: caps[1].to_string(),
            status: strip_tags(&caps[2]),
            time_ms: caps[3].to_string(),
            memory_kb: caps[4].to_string(),
        })
        .collect()
}

fn normalize_status(status: &str) -> String {
    if status == "Compilation Error" {
        COMPILE_ERROR.to_string()
    } else {
        status.to_string()
    }
}

fn strip_tags(fragment: &str) -> String {
    unescape_html(TAG.replace_all(fragment, "").trim())
}

fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn login_succeeded(page: &str) -> bool {
    !page.contains(LOGIN_FAILED_MARKER) && !LOGIN_FORM.is_match(page)
}

fn classify_submit_response(page: &str) -> BackendResult<()> {
    if page.to_ascii_lowercase().contains("same code") {
        return Err(BackendError::SameCode);
    }
    if LOGIN_FORM.is_match(page) {
        return Err(BackendError::LoginFailed("session expired".to_string()));
    }
    if page.contains(SUBMIT_ERROR_MARKER) {
        let reason = LIST_ITEM
            .captures(page)
            .map(|caps| strip_tags(&caps[1]))
            .unwrap_or_else(|| SUBMIT_ERROR_MARKER.to_string());
        return Err(BackendError::Rejected(reason));
    }
    Ok(())
}

fn extract_compile_info(html: &str) -> Option<String> {
    PRE_BLOCK
        .captures(html)
        .map(|caps| unescape_html(caps[1].trim()))
}

async fn get_text(client: &Client, url: &str) -> BackendResult<String> {
    let response = client.get(url).send().await.map_err(http_error)?;
    read_body(response).await
}

async fn post_form(client: &Client, url: &str, fields: &[(&str, &str)]) -> BackendResult<String> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .send()
        .await
        .map_err(http_error)?;
    read_body(response).await
}

async fn read_body(response: reqwest::Response) -> BackendResult<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Http(format!(
            "HTTP {} for {}",
            status,
            response.url()
        )));
    }
    response.text().await.map_err(http_error)
}

fn http_error(error: reqwest::Error) -> BackendError {
    BackendError::Http(error.to_string())
}
