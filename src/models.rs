use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A job listing found on the results page. Lives for one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub detail_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingDetail {
    pub title: String,
    pub company: String,
    pub description: String, // may be empty
    /// Set from the eligibility probe. Postings without the control end as
    /// `Skipped` before a detail is read, so a built detail always has it.
    pub has_quick_apply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverLetter {
    pub body: String,
    pub generation_succeeded: bool,
}

impl CoverLetter {
    pub fn generated(body: String) -> Self {
        Self {
            body,
            generation_succeeded: true,
        }
    }

    pub fn failed() -> Self {
        Self {
            body: String::new(),
            generation_succeeded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Submitted,
    Failed,
    Skipped,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 3] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::Failed,
        ApplicationStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::Failed => "Failed",
            ApplicationStatus::Skipped => "Skipped",
        }
    }

    /// Case-insensitive, so CLI filters like `--status failed` work.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit entry before the ledger assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplicationRecord {
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub status: ApplicationStatus,
    pub job_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: i64,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub status: ApplicationStatus,
    pub submitted_at: NaiveDateTime,
    pub job_link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NavigationTimeout,
    DetailExtractionError,
    SubmissionError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::NavigationTimeout => "navigation_timeout",
            FailureReason::DetailExtractionError => "detail_extraction_error",
            FailureReason::SubmissionError => "submission_error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotEligible,
    DryRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotEligible => "not_eligible",
            SkipReason::DryRun => "dry_run",
        })
    }
}

/// Terminal state of one application attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Submitted {
        detail: PostingDetail,
    },
    Failed {
        reason: FailureReason,
        detail: Option<PostingDetail>,
    },
    Skipped {
        reason: SkipReason,
        detail: Option<PostingDetail>,
    },
}

impl Outcome {
    pub fn status(&self) -> ApplicationStatus {
        match self {
            Outcome::Submitted { .. } => ApplicationStatus::Submitted,
            Outcome::Failed { .. } => ApplicationStatus::Failed,
            Outcome::Skipped { .. } => ApplicationStatus::Skipped,
        }
    }

    pub fn detail(&self) -> Option<&PostingDetail> {
        match self {
            Outcome::Submitted { detail } => Some(detail),
            Outcome::Failed { detail, .. } | Outcome::Skipped { detail, .. } => detail.as_ref(),
        }
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Outcome::Submitted { .. } => None,
            Outcome::Failed { reason, .. } => Some(reason.to_string()),
            Outcome::Skipped { reason, .. } => Some(reason.to_string()),
        }
    }

    pub fn to_record(&self, posting: &Posting) -> NewApplicationRecord {
        let detail = self.detail();
        NewApplicationRecord {
            job_title: detail.map(|d| d.title.clone()),
            company_name: detail.map(|d| d.company.clone()),
            status: self.status(),
            job_link: posting.detail_url.clone(),
        }
    }
}

/// Counts of terminal states for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub submitted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub ledger_errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: ApplicationStatus) {
        match status {
            ApplicationStatus::Submitted => self.submitted += 1,
            ApplicationStatus::Failed => self.failed += 1,
            ApplicationStatus::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.submitted + self.failed + self.skipped
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Submitted: {}, Failed: {}, Skipped: {}",
            self.submitted, self.failed, self.skipped
        )?;
        if self.ledger_errors > 0 {
            write!(f, " ({} not recorded)", self.ledger_errors)?;
        }
        Ok(())
    }
}
