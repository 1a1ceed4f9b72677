use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::{error, info, info_span, warn};

use crate::apply::{ApplicationAttempt, SessionLost};
use crate::browser::BrowsingSession;
use crate::config::{Config, PipelineConfig};
use crate::db::AuditLedger;
use crate::error::PipelineError;
use crate::letter::LetterWriter;
use crate::models::{ApplicationStatus, Outcome, Posting, RunSummary, SkipReason};

/// Applies to postings one after another on a single session.
pub struct Pipeline<'a, S: BrowsingSession, L: AuditLedger> {
    session: &'a mut S,
    ledger: &'a L,
    writer: &'a LetterWriter<'a>,
    config: &'a Config,
    resume_text: &'a str,
}

impl<'a, S: BrowsingSession, L: AuditLedger> Pipeline<'a, S, L> {
    pub fn new(
        session: &'a mut S,
        ledger: &'a L,
        writer: &'a LetterWriter<'a>,
        config: &'a Config,
        resume_text: &'a str,
    ) -> Self {
        Self {
            session,
            ledger,
            writer,
            config,
            resume_text,
        }
    }

    /// Runs every posting to a terminal state. Stops early only if the
    /// browser session dies.
    pub fn run(&mut self, postings: impl IntoIterator<Item = Posting>) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        for (i, posting) in postings.into_iter().enumerate() {
            if i > 0 {
                pause(&self.config.pipeline);
            }

            let span = info_span!("attempt", n = i + 1, url = %posting.detail_url);
            let _guard = span.enter();

            let attempt = ApplicationAttempt {
                session: &mut *self.session,
                selectors: &self.config.selectors,
                timeouts: &self.config.timeouts,
                writer: self.writer,
                resume_text: self.resume_text,
                dry_run: self.config.pipeline.dry_run,
            };

            let outcome = match attempt.run(&posting) {
                Ok(outcome) => outcome,
                Err(SessionLost(e)) => {
                    error!("Browser session lost: {}", e);
                    return Err(PipelineError::SessionLost {
                        reason: e.to_string(),
                        summary,
                    });
                }
            };

            report(&outcome);
            summary.record(outcome.status());

            if self.should_record(&outcome) {
                match self.ledger.append(&outcome.to_record(&posting)) {
                    Ok(id) => info!("Recorded as application #{}", id),
                    Err(e) => {
                        warn!("{}; continuing with next posting", e);
                        summary.ledger_errors += 1;
                    }
                }
            }
        }

        info!("Run finished: {}", summary);
        Ok(summary)
    }

    fn should_record(&self, outcome: &Outcome) -> bool {
        match outcome {
            Outcome::Skipped {
                reason: SkipReason::DryRun,
                ..
            } => false,
            Outcome::Skipped { .. } => self.config.ledger.log_skipped,
            _ => true,
        }
    }
}

fn report(outcome: &Outcome) {
    let what = match outcome.detail() {
        Some(d) => format!("{} at {}", d.title, d.company),
        None => "posting".to_string(),
    };
    match (outcome.status(), outcome.reason()) {
        (ApplicationStatus::Submitted, _) => info!("Applied to {}", what),
        (ApplicationStatus::Failed, Some(reason)) => warn!("Failed to apply to {}: {}", what, reason),
        (status, reason) => info!("{} {} ({})", status, what, reason.unwrap_or_default()),
    }
}

fn pause(config: &PipelineConfig) {
    let (min, max) = (config.pause_min_ms, config.pause_max_ms.max(config.pause_min_ms));
    if max == 0 {
        return;
    }
    let ms = rand::thread_rng().gen_range(min..=max);
    thread::sleep(Duration::from_millis(ms));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, Selectors};
    use crate::db::Database;
    use crate::error::LedgerError;
    use crate::fake::{FakeElement, FakePage, FakeSession};
    use crate::letter::tests::ScriptedProvider;
    use crate::models::NewApplicationRecord;
    use std::cell::RefCell;

    const A: &str = "https://jobs.example/view/a";
    const B: &str = "https://jobs.example/view/b";
    const C: &str = "https://jobs.example/view/c";

    fn eligible_page(selectors: &Selectors, title: &str, company: &str) -> FakePage {
        FakePage::new()
            .with(&selectors.detail_landmark, FakeElement::new("top-card"))
            .with(&selectors.quick_apply, FakeElement::new("easy-apply"))
            .with(&selectors.job_title, FakeElement::new("title").with_text(title))
            .with(&selectors.company_name, FakeElement::new("company").with_text(company))
            .with(&selectors.description, FakeElement::new("desc").with_text("Do things."))
            .with(&selectors.application_form, FakeElement::new("form"))
            .with(&selectors.cover_letter_field, FakeElement::new("cover-letter"))
            .with(&selectors.submit, FakeElement::new("submit"))
    }

    fn ineligible_page(selectors: &Selectors) -> FakePage {
        FakePage::new()
            .with(&selectors.detail_landmark, FakeElement::new("top-card"))
            .with(&selectors.job_title, FakeElement::new("title").with_text("Analyst"))
    }

    /// A: no quick apply, B: applies cleanly, C: never renders.
    fn scenario() -> FakeSession {
        let selectors = Selectors::default();
        FakeSession::new()
            .page(A, ineligible_page(&selectors))
            .page(B, eligible_page(&selectors, "Data Scientist", "Acme"))
            .page(C, FakePage::new())
    }

    fn postings(urls: &[&str]) -> Vec<Posting> {
        urls.iter()
            .map(|u| Posting {
                detail_url: u.to_string(),
            })
            .collect()
    }

    fn run<L: AuditLedger>(
        session: &mut FakeSession,
        ledger: &L,
        provider: &ScriptedProvider,
        config: &Config,
        urls: &[&str],
    ) -> Result<RunSummary, PipelineError> {
        let writer = LetterWriter::new(provider, &LlmConfig::default());
        Pipeline::new(session, ledger, &writer, config, "resume").run(postings(urls))
    }

    struct FailingLedger {
        attempts: RefCell<usize>,
    }

    impl AuditLedger for FailingLedger {
        fn append(&self, _record: &NewApplicationRecord) -> Result<i64, LedgerError> {
            *self.attempts.borrow_mut() += 1;
            Err(LedgerError::Write(rusqlite::Error::InvalidQuery))
        }
    }

    #[test]
    fn test_three_posting_scenario() {
        let mut session = scenario();
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");

        let summary = run(&mut session, &db, &provider, &Config::default(), &[A, B, C]).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                submitted: 1,
                failed: 1,
                skipped: 1,
                ledger_errors: 0,
            }
        );

        let records = db.list(None, None).unwrap();
        assert_eq!(records.len(), 3);
        let b = db.list(Some(ApplicationStatus::Submitted), None).unwrap();
        assert_eq!(b[0].job_title.as_deref(), Some("Data Scientist"));
        assert_eq!(b[0].company_name.as_deref(), Some("Acme"));
        assert_eq!(b[0].job_link, B);
        let c = db.list(Some(ApplicationStatus::Failed), None).unwrap();
        assert_eq!(c[0].job_link, C);
        let a = db.list(Some(ApplicationStatus::Skipped), None).unwrap();
        assert_eq!(a[0].job_link, A);

        assert_eq!(session.visited, vec![A, B, C]);
    }

    #[test]
    fn test_skipped_not_recorded_when_disabled() {
        let mut session = scenario();
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");
        let mut config = Config::default();
        config.ledger.log_skipped = false;

        let summary = run(&mut session, &db, &provider, &config, &[A, B, C]).unwrap();
        assert_eq!(summary.skipped, 1);

        let links: Vec<_> = db.list(None, None).unwrap().into_iter().map(|r| r.job_link).collect();
        assert_eq!(links, vec![C, B]);
    }

    #[test]
    fn test_ids_increase_in_processing_order() {
        let mut session = scenario();
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");

        run(&mut session, &db, &provider, &Config::default(), &[A, B, C]).unwrap();

        let mut records = db.list(None, None).unwrap();
        records.reverse();
        let links: Vec<_> = records.iter().map(|r| r.job_link.as_str()).collect();
        assert_eq!(links, vec![A, B, C]);
        assert!(records.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_rerun_appends_new_records() {
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");

        run(&mut scenario(), &db, &provider, &Config::default(), &[B]).unwrap();
        run(&mut scenario(), &db, &provider, &Config::default(), &[B]).unwrap();

        let records = db.list(Some(ApplicationStatus::Submitted), None).unwrap();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn test_generator_always_failing_still_submits() {
        let selectors = Selectors::default();
        let mut session = FakeSession::new()
            .page(A, eligible_page(&selectors, "Engineer", "Initech"))
            .page(B, eligible_page(&selectors, "Analyst", "Globex"));
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::failing();

        let summary = run(&mut session, &db, &provider, &Config::default(), &[A, B]).unwrap();
        assert_eq!(summary.submitted, 2);
        assert!(session.typed.is_empty());
    }

    #[test]
    fn test_navigation_timeout_costs_only_its_budget() {
        let mut session = scenario();
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");
        let config = Config::default();

        let summary = run(&mut session, &db, &provider, &config, &[C, B]).unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.submitted, 1);
        // C waited for its landmark only; B found everything immediately.
        assert_eq!(session.waited, config.timeouts.navigation());
    }

    #[test]
    fn test_interaction_failures_move_on_to_next_posting() {
        let selectors = Selectors::default();
        let mut session = FakeSession::new()
            .page(A, eligible_page(&selectors, "Engineer", "Initech"))
            .page(B, eligible_page(&selectors, "Analyst", "Globex"));
        session.unreachable.insert(A.to_string());
        session.stale.insert("cover-letter".to_string());
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear team,");

        let summary = run(&mut session, &db, &provider, &Config::default(), &[A, B, A]).unwrap();
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.total(), 3);
        assert_eq!(session.visited, vec![B]);

        let failed = db.list(Some(ApplicationStatus::Failed), None).unwrap();
        let links: Vec<_> = failed.iter().rev().map(|r| r.job_link.as_str()).collect();
        assert_eq!(links, vec![A, B, A]);
        assert_eq!(failed[1].company_name.as_deref(), Some("Globex"));
    }

    #[test]
    fn test_ledger_failure_does_not_stop_run() {
        let mut session = scenario();
        let ledger = FailingLedger {
            attempts: RefCell::new(0),
        };
        let provider = ScriptedProvider::answering("Dear Acme,");

        let summary = run(&mut session, &ledger, &provider, &Config::default(), &[A, B, C]).unwrap();
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.ledger_errors, 3);
        assert_eq!(*ledger.attempts.borrow(), 3);
    }

    #[test]
    fn test_dead_session_halts_with_partial_summary() {
        let mut session = scenario();
        session.dies_on = Some(C.to_string());
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");

        let err = run(&mut session, &db, &provider, &Config::default(), &[B, C, A]).unwrap_err();
        let PipelineError::SessionLost { summary, .. } = err;
        assert_eq!(summary.submitted, 1);
        assert_eq!(summary.total(), 1);
        assert_eq!(db.list(None, None).unwrap().len(), 1);
        assert_eq!(session.visited, vec![B]);
    }

    #[test]
    fn test_dry_run_records_nothing() {
        let mut session = scenario();
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("Dear Acme,");
        let mut config = Config::default();
        config.pipeline.dry_run = true;
        config.ledger.log_skipped = true;

        let summary = run(&mut session, &db, &provider, &config, &[B]).unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(db.list(None, None).unwrap().is_empty());
        assert_eq!(session.clicked, vec!["easy-apply"]);
    }

    #[test]
    fn test_empty_input() {
        let mut session = FakeSession::new();
        let db = Database::open_in_memory().unwrap();
        let provider = ScriptedProvider::answering("unused");

        let summary = run(&mut session, &db, &provider, &Config::default(), &[]).unwrap();
        assert_eq!(summary, RunSummary::default());
    }
}
