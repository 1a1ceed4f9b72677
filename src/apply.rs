//! Drives one posting from its detail page to a terminal outcome.
//!
//! Stages run in order: navigating, eligibility check, detail extraction,
//! cover letter generation, submission. Every UI problem ends the attempt as
//! `Failed` or `Skipped`; only a dead browser session escapes as an error.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, info};

use crate::browser::{BrowsingSession, Locator};
use crate::config::{Selectors, Timeouts};
use crate::error::SessionError;
use crate::letter::LetterWriter;
use crate::models::{FailureReason, Outcome, Posting, PostingDetail, SkipReason};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Navigating,
    CheckingEligibility,
    ExtractingDetail,
    GeneratingLetter,
    Submitting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Navigating => "navigating",
            Stage::CheckingEligibility => "checking eligibility",
            Stage::ExtractingDetail => "extracting detail",
            Stage::GeneratingLetter => "generating letter",
            Stage::Submitting => "submitting",
        })
    }
}

/// The session died mid-attempt. The run cannot continue.
#[derive(Debug)]
pub struct SessionLost(pub SessionError);

pub struct ApplicationAttempt<'a, S: BrowsingSession> {
    pub session: &'a mut S,
    pub selectors: &'a Selectors,
    pub timeouts: &'a Timeouts,
    pub writer: &'a LetterWriter<'a>,
    pub resume_text: &'a str,
    pub dry_run: bool,
}

/// Splits a session result into "carry on", "this posting is done", or "stop everything".
enum Step<T> {
    Next(T),
    Done(Outcome),
}

macro_rules! step {
    ($e:expr) => {
        match $e? {
            Step::Next(v) => v,
            Step::Done(outcome) => return Ok(outcome),
        }
    };
}

fn or_done<T>(result: Result<T, SessionError>, outcome: impl FnOnce() -> Outcome) -> Result<Step<T>, SessionLost> {
    match result {
        Ok(value) => Ok(Step::Next(value)),
        Err(e) if e.is_fatal() => Err(SessionLost(e)),
        Err(e) => {
            debug!("{}", e);
            Ok(Step::Done(outcome()))
        }
    }
}

fn failed(reason: FailureReason, detail: Option<&PostingDetail>) -> Outcome {
    Outcome::Failed {
        reason,
        detail: detail.cloned(),
    }
}

impl<'a, S: BrowsingSession> ApplicationAttempt<'a, S> {
    pub fn run(self, posting: &Posting) -> Result<Outcome, SessionLost> {
        let Self {
            session,
            selectors,
            timeouts,
            writer,
            resume_text,
            dry_run,
        } = self;

        debug!(stage = %Stage::Navigating, "{}", posting.detail_url);
        step!(navigate(session, selectors, timeouts, &posting.detail_url));

        debug!(stage = %Stage::CheckingEligibility);
        let quick_apply = step!(or_done(
            session.find_clickable(&selectors.quick_apply, timeouts.eligibility()),
            || Outcome::Skipped {
                reason: SkipReason::NotEligible,
                detail: None,
            },
        ));

        debug!(stage = %Stage::ExtractingDetail);
        let detail = step!(extract_detail(session, selectors, timeouts));

        debug!(stage = %Stage::GeneratingLetter);
        let letter = writer.generate(&detail.title, &detail.company, &detail.description, resume_text);
        if !letter.generation_succeeded {
            info!("Proceeding without a cover letter for {} at {}", detail.title, detail.company);
        }

        debug!(stage = %Stage::Submitting);
        let submission_error = || failed(FailureReason::SubmissionError, Some(&detail));

        step!(or_done(session.click(&quick_apply), submission_error));
        step!(or_done(
            session.find(&selectors.application_form, timeouts.form()),
            submission_error,
        ));

        match session.find(&selectors.cover_letter_field, timeouts.field()) {
            Ok(field) if !letter.body.is_empty() => {
                step!(or_done(session.type_text(&field, &letter.body), submission_error));
            }
            Ok(_) => debug!("Leaving cover letter field blank"),
            Err(e) if e.is_fatal() => return Err(SessionLost(e)),
            Err(_) => debug!("Application form has no cover letter field"),
        }

        let submit = step!(or_done(
            session.find_clickable(&selectors.submit, timeouts.submit()),
            submission_error,
        ));

        if dry_run {
            info!("Dry run: not submitting {} at {}", detail.title, detail.company);
            return Ok(Outcome::Skipped {
                reason: SkipReason::DryRun,
                detail: Some(detail),
            });
        }

        step!(or_done(session.click(&submit), submission_error));
        Ok(Outcome::Submitted { detail })
    }
}

fn navigate<S: BrowsingSession>(
    session: &mut S,
    selectors: &Selectors,
    timeouts: &Timeouts,
    url: &str,
) -> Result<Step<()>, SessionLost> {
    let timed_out = || failed(FailureReason::NavigationTimeout, None);
    if let Step::Done(outcome) = or_done(session.navigate(url), timed_out)? {
        return Ok(Step::Done(outcome));
    }
    or_done(
        session
            .find(&selectors.detail_landmark, timeouts.navigation())
            .map(|_| ()),
        timed_out,
    )
}

fn extract_detail<S: BrowsingSession>(
    session: &mut S,
    selectors: &Selectors,
    timeouts: &Timeouts,
) -> Result<Step<PostingDetail>, SessionLost> {
    let title = match read_text(session, &selectors.job_title, timeouts) {
        Ok(Some(t)) => normalize_line(&t),
        Ok(None) => String::new(),
        Err(e) => return Err(SessionLost(e)),
    };
    let company = match read_text(session, &selectors.company_name, timeouts) {
        Ok(Some(c)) => normalize_line(&c),
        Ok(None) => String::new(),
        Err(e) => return Err(SessionLost(e)),
    };
    if title.is_empty() || company.is_empty() {
        debug!("Detail page missing title or company (title={:?}, company={:?})", title, company);
        return Ok(Step::Done(failed(FailureReason::DetailExtractionError, None)));
    }

    let description = match read_text(session, &selectors.description, timeouts) {
        Ok(Some(d)) => normalize_block(&d),
        Ok(None) => String::new(),
        Err(e) => return Err(SessionLost(e)),
    };

    Ok(Step::Next(PostingDetail {
        title,
        company,
        description,
        // Extraction only runs once the quick-apply control was found clickable.
        has_quick_apply: true,
    }))
}

/// `Ok(None)` when the element is absent or unreadable; `Err` only when the session is gone.
fn read_text<S: BrowsingSession>(
    session: &mut S,
    locator: &Locator,
    timeouts: &Timeouts,
) -> Result<Option<String>, SessionError> {
    let read = session
        .find(locator, timeouts.field())
        .and_then(|element| session.text(&element));
    match read {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.is_fatal() => Err(e),
        Err(_) => Ok(None),
    }
}

fn normalize_line(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn normalize_block(s: &str) -> String {
    BLANK_LINES.replace_all(s.trim(), "\n\n").into_owned()
}
