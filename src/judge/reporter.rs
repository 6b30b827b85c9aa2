//! Turns pipeline outcomes into wire verdicts.

use super::pipeline::FailureReason;
use super::RemoteVerdict;
use crate::protocol::{RESULT_REPORT, RunId, SubmissionJob, Verdict};

/// Result text for a language code the backend cannot map.
pub const INVALID_LANGUAGE: &str = "Judge Error (Invalid Language)";

/// Result text when the backend refused a duplicate submission.
pub const SAME_CODE: &str = "Judge Error (Same Code)";

/// Result text for every other failure.
pub const JUDGE_ERROR: &str = "Judge Error";

/// Placeholder for numeric fields of a synthesized verdict.
const ZERO: &str = "0";

impl FailureReason {
    /// Verdict result text for this failure.
    pub fn result_text(&self) -> &'static str {
        match self {
            FailureReason::InvalidLanguage => INVALID_LANGUAGE,
            FailureReason::SameCode => SAME_CODE,
            FailureReason::LoginFailed(_) | FailureReason::Backend(_) => JUDGE_ERROR,
        }
    }
}

/// Verdict for a job the backend judged.
pub fn judged(job: &SubmissionJob, remote: RemoteVerdict, compile_info: String) -> Verdict {
    Verdict {
        kind: RESULT_REPORT,
        runid: job.runid.clone(),
        memory_used: remote.memory_used,
        time_used: remote.time_used,
        result: remote.result,
        remote_runid: remote.remote_runid,
        compile_info,
    }
}

/// Synthesized verdict for a job that failed anywhere in the pipeline.
pub fn failed(job: &SubmissionJob, reason: &FailureReason) -> Verdict {
    zeroed(&job.runid, reason.result_text())
}

/// Plain `Judge Error` for a run whose real verdict cannot be sent.
pub fn judge_error(runid: &RunId) -> Verdict {
    zeroed(runid, JUDGE_ERROR)
}

fn zeroed(runid: &RunId, result: &str) -> Verdict {
    Verdict {
        kind: RESULT_REPORT,
        runid: runid.clone(),
        memory_used: ZERO.to_string(),
        time_used: ZERO.to_string(),
        result: result.to_string(),
        remote_runid: ZERO.to_string(),
        compile_info: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::BackendError;
    use rstest::rstest;

    fn job() -> SubmissionJob {
        SubmissionJob {
            runid: RunId::new("7"),
            vid: "100A".to_string(),
            language: "1".to_string(),
            source: "...".to_string(),
        }
    }

    #[test]
    fn judged_copies_remote_fields() {
        let remote = RemoteVerdict {
            memory_used: "256".to_string(),
            time_used: "15".to_string(),
            result: "Accepted".to_string(),
            remote_runid: "999".to_string(),
        };

        let verdict = judged(&job(), remote, String::new());

        assert_eq!(
            verdict,
            Verdict {
                kind: RESULT_REPORT,
                runid: RunId::new("7"),
                memory_used: "256".to_string(),
                time_used: "15".to_string(),
                result: "Accepted".to_string(),
                remote_runid: "999".to_string(),
                compile_info: String::new(),
            }
        );
    }

    #[rstest]
    #[case::invalid_language(FailureReason::InvalidLanguage, INVALID_LANGUAGE)]
    #[case::same_code(FailureReason::SameCode, SAME_CODE)]
    #[case::login_failed(
        FailureReason::LoginFailed(BackendError::LoginFailed("bad password".to_string())),
        JUDGE_ERROR
    )]
    #[case::timeout(
        FailureReason::Backend(BackendError::Timeout(std::time::Duration::from_secs(1))),
        JUDGE_ERROR
    )]
    #[case::http(
        FailureReason::Backend(BackendError::Http("connection refused".to_string())),
        JUDGE_ERROR
    )]
    fn failed_verdict_is_zeroed_and_classified(
        #[case] reason: FailureReason,
        #[case] expected: &str,
    ) {
        let verdict = failed(&job(), &reason);

        assert_eq!(verdict.kind, RESULT_REPORT);
        assert_eq!(verdict.runid, RunId::new("7"));
        assert_eq!(verdict.memory_used, "0");
        assert_eq!(verdict.time_used, "0");
        assert_eq!(verdict.remote_runid, "0");
        assert_eq!(verdict.compile_info, "");
        assert_eq!(verdict.result, expected);
    }

    #[test]
    fn judge_error_keeps_only_runid() {
        let other = SubmissionJob {
            runid: RunId::new(12),
            ..job()
        };
        let reason = FailureReason::Backend(BackendError::Parse("x".to_string()));

        assert_eq!(judge_error(&RunId::new(12)), failed(&other, &reason));
    }
}
