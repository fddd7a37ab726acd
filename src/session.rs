//! One working session: the last outputs of each action and the rules that
//! keep concurrent actions from stepping on each other.
//!
//! ## Rules
//!
//! * **No overlap per action.** While an action runs, starting the same
//!   action again fails with [`ReqDocError::ActionInProgress`]. Different
//!   actions may run side by side.
//! * **Last success wins.** A failed action leaves the previous output in
//!   place. A new design document supersedes the plans derived from the old
//!   one.
//! * **Stale answers are dropped.** [`Session::reset`] bumps an epoch; an
//!   action that started before the reset finishes with
//!   [`ReqDocError::Stale`] and stores nothing.
//!
//! Nothing is persisted; dropping the session drops everything.

use crate::document::{GeneratedDesign, ImplementationPlan};
use crate::error::ReqDocError;
use crate::extract::{extract_text, ExtractedDocument};
use crate::pipeline::input::Upload;
use crate::pipeline::llm::GenerationClient;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// A user-triggered action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Extract,
    Analyze,
    Design,
    Plan,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Extract => "Text extraction",
            Action::Analyze => "Requirement analysis",
            Action::Design => "TDD generation",
            Action::Plan => "Implementation plan generation",
        }
    }

    fn index(self) -> usize {
        match self {
            Action::Extract => 0,
            Action::Analyze => 1,
            Action::Design => 2,
            Action::Plan => 3,
        }
    }
}

/// Last successful output of every action.
#[derive(Debug, Clone, Default)]
pub struct Outputs {
    pub extracted: Option<ExtractedDocument>,
    pub analysis: Option<String>,
    pub design: Option<GeneratedDesign>,
    pub plans: Option<Vec<ImplementationPlan>>,
}

/// Clears the in-flight flag of an action on drop, including on error and
/// cancellation.
struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct Session {
    client: Arc<dyn GenerationClient>,
    outputs: Mutex<Outputs>,
    in_flight: [AtomicBool; 4],
    epoch: AtomicU64,
}

impl Session {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            outputs: Mutex::new(Outputs::default()),
            in_flight: Default::default(),
            epoch: AtomicU64::new(0),
        }
    }

    // ── Bookkeeping ──────────────────────────────────────────────────────

    fn begin(&self, action: Action) -> Result<InFlight<'_>, ReqDocError> {
        let flag = &self.in_flight[action.index()];
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReqDocError::ActionInProgress {
                action: action.as_str(),
            })?;
        debug!("{} started", action.as_str());
        Ok(InFlight { flag })
    }

    fn outputs(&self) -> MutexGuard<'_, Outputs> {
        // Outputs are plain data; a panic while holding the lock cannot
        // leave them half-updated.
        self.outputs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a result if the session was not reset since `epoch`.
    fn commit(
        &self,
        action: Action,
        epoch: u64,
        store: impl FnOnce(&mut Outputs),
    ) -> Result<(), ReqDocError> {
        let mut outputs = self.outputs();
        if self.epoch.load(Ordering::Acquire) != epoch {
            warn!("{} finished after a reset; result dropped", action.as_str());
            return Err(ReqDocError::Stale {
                action: action.as_str(),
            });
        }
        store(&mut outputs);
        Ok(())
    }

    /// Whether `action` is currently running.
    pub fn is_running(&self, action: Action) -> bool {
        self.in_flight[action.index()].load(Ordering::Acquire)
    }

    /// Snapshot of all current outputs.
    pub fn snapshot(&self) -> Outputs {
        self.outputs().clone()
    }

    pub fn analysis(&self) -> Option<String> {
        self.outputs().analysis.clone()
    }

    pub fn design(&self) -> Option<GeneratedDesign> {
        self.outputs().design.clone()
    }

    pub fn plans(&self) -> Option<Vec<ImplementationPlan>> {
        self.outputs().plans.clone()
    }

    /// Drop all outputs; answers still in flight will be discarded.
    pub fn reset(&self) {
        let mut outputs = self.outputs();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        *outputs = Outputs::default();
        info!("Session reset");
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Extract the text of an uploaded document.
    pub async fn extract(&self, upload: &Upload) -> Result<ExtractedDocument, ReqDocError> {
        let _guard = self.begin(Action::Extract)?;
        let epoch = self.epoch.load(Ordering::Acquire);

        let doc = extract_text(upload).await?;
        self.commit(Action::Extract, epoch, |o| o.extracted = Some(doc.clone()))?;
        Ok(doc)
    }

    /// Analyse a raw requirement into Markdown.
    pub async fn analyze(&self, requirement: &str) -> Result<String, ReqDocError> {
        if requirement.trim().is_empty() {
            return Err(ReqDocError::MissingInput(
                "Enter a requirement to analyse.".into(),
            ));
        }
        let _guard = self.begin(Action::Analyze)?;
        let epoch = self.epoch.load(Ordering::Acquire);

        let markdown = self.client.analyze_requirement(requirement).await?;
        self.commit(Action::Analyze, epoch, |o| o.analysis = Some(markdown.clone()))?;
        Ok(markdown)
    }

    /// Generate and format a design document from requirement text.
    pub async fn generate_design(&self, requirement: &str) -> Result<GeneratedDesign, ReqDocError> {
        if requirement.trim().is_empty() {
            return Err(ReqDocError::MissingInput(
                "Provide requirement text or a document first.".into(),
            ));
        }
        let _guard = self.begin(Action::Design)?;
        let epoch = self.epoch.load(Ordering::Acquire);

        self.design_from_text(requirement, epoch).await
    }

    /// Extract an uploaded document, then generate a design document from
    /// its text. Runs as a single design action.
    pub async fn generate_design_from_upload(
        &self,
        upload: &Upload,
    ) -> Result<GeneratedDesign, ReqDocError> {
        let _guard = self.begin(Action::Design)?;
        let epoch = self.epoch.load(Ordering::Acquire);

        let doc = extract_text(upload).await?;
        self.commit(Action::Extract, epoch, |o| o.extracted = Some(doc.clone()))?;
        self.design_from_text(&doc.text, epoch).await
    }

    async fn design_from_text(
        &self,
        requirement: &str,
        epoch: u64,
    ) -> Result<GeneratedDesign, ReqDocError> {
        let doc = self.client.generate_design_document(requirement).await?;
        let generated = GeneratedDesign::from_document(&doc);
        info!(
            "Design '{}' with {} core feature(s)",
            generated.title,
            doc.core_features.len()
        );
        self.commit(Action::Design, epoch, |o| {
            o.design = Some(generated.clone());
            o.plans = None;
        })?;
        Ok(generated)
    }

    /// Generate implementation plans for the current design document.
    pub async fn generate_plan(&self) -> Result<Vec<ImplementationPlan>, ReqDocError> {
        let design = self
            .design()
            .ok_or_else(|| ReqDocError::MissingInput("Generate a TDD first.".into()))?;
        let _guard = self.begin(Action::Plan)?;
        let epoch = self.epoch.load(Ordering::Acquire);

        let plans = self.client.generate_plan(&design.content).await?;
        self.commit(Action::Plan, epoch, |o| o.plans = Some(plans.clone()))?;
        Ok(plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Appendix, CoreFeature, DesignDocument};
    use crate::error::GenerationError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Answers after `gate` is notified (when set); fails when `fail` is set.
    #[derive(Default)]
    struct StubClient {
        gate: Option<Notify>,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl StubClient {
        fn gated() -> Self {
            Self {
                gate: Some(Notify::new()),
                ..Default::default()
            }
        }

        async fn wait(&self) -> Result<(), GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(GenerationError::Request {
                    what: "stub",
                    message: "boom".into(),
                });
            }
            Ok(())
        }
    }

    fn design(title: &str) -> DesignDocument {
        DesignDocument {
            title: title.into(),
            general_overview: "Overview".into(),
            core_features: vec![CoreFeature {
                name: "Feature".into(),
                tech_solution: "- a".into(),
                tech_notes: "- b".into(),
                data_changes: "None".into(),
                diagram: "graph TD; A-->B".into(),
            }],
            appendix: Appendix {
                new_metrics: "-".into(),
                tools: "-".into(),
                compatibility: "-".into(),
            },
        }
    }

    #[async_trait]
    impl GenerationClient for StubClient {
        async fn analyze_requirement(&self, requirement: &str) -> Result<String, GenerationError> {
            self.wait().await?;
            Ok(format!("# 📌 Feature: {requirement}\n"))
        }

        async fn generate_design_document(
            &self,
            requirement: &str,
        ) -> Result<DesignDocument, GenerationError> {
            self.wait().await?;
            Ok(design(requirement))
        }

        async fn generate_plan(
            &self,
            design_markdown: &str,
        ) -> Result<Vec<ImplementationPlan>, GenerationError> {
            self.wait().await?;
            Ok(vec![ImplementationPlan {
                feature_name: design_markdown.lines().next().unwrap_or("").into(),
                features_to_implement: vec![],
                frontend_steps: vec![],
                backend_steps: vec![],
                integration_steps: vec![],
            }])
        }
    }

    #[tokio::test]
    async fn analyze_stores_result() {
        let session = Session::new(Arc::new(StubClient::default()));
        let md = session.analyze("Login").await.unwrap();
        assert_eq!(md, "# 📌 Feature: Login\n");
        assert_eq!(session.analysis().as_deref(), Some("# 📌 Feature: Login\n"));
    }

    #[tokio::test]
    async fn blank_requirement_is_rejected_without_a_call() {
        let client = Arc::new(StubClient::default());
        let session = Session::new(client.clone());
        assert!(matches!(
            session.analyze("  \n").await,
            Err(ReqDocError::MissingInput(_))
        ));
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn plan_needs_a_design() {
        let session = Session::new(Arc::new(StubClient::default()));
        assert!(matches!(
            session.generate_plan().await,
            Err(ReqDocError::MissingInput(_))
        ));
    }

    #[tokio::test]
    async fn plan_uses_design_markdown_and_new_design_clears_plans() {
        let session = Session::new(Arc::new(StubClient::default()));
        let generated = session.generate_design("Checkout Flow").await.unwrap();
        assert_eq!(generated.title, "Checkout_Flow");

        let plans = session.generate_plan().await.unwrap();
        assert_eq!(plans[0].feature_name, "# Checkout Flow");
        assert!(session.plans().is_some());

        session.generate_design("Other").await.unwrap();
        assert!(session.plans().is_none());
    }

    #[tokio::test]
    async fn overlapping_same_action_is_refused() {
        let client = Arc::new(StubClient::gated());
        let session = Arc::new(Session::new(client.clone()));

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.analyze("one").await }
        });
        while !session.is_running(Action::Analyze) {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            session.analyze("two").await,
            Err(ReqDocError::ActionInProgress { .. })
        ));

        // A different action is not blocked.
        let design = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.generate_design("three").await }
        });
        while !session.is_running(Action::Design) {
            tokio::task::yield_now().await;
        }

        while client.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        client.gate.as_ref().unwrap().notify_waiters();

        assert!(first.await.unwrap().is_ok());
        assert!(design.await.unwrap().is_ok());
        assert!(!session.is_running(Action::Analyze));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_keeps_previous_output_and_releases_guard() {
        let client = Arc::new(StubClient::default());
        let session = Session::new(client.clone());
        session.analyze("first").await.unwrap();

        client.fail.store(true, Ordering::SeqCst);
        let err = session.analyze("second").await.unwrap_err();
        assert!(matches!(err, ReqDocError::Generation(_)));
        assert_eq!(session.analysis().as_deref(), Some("# 📌 Feature: first\n"));
        assert!(!session.is_running(Action::Analyze));
    }

    #[tokio::test]
    async fn reset_discards_in_flight_answer() {
        let client = Arc::new(StubClient::gated());
        let session = Arc::new(Session::new(client.clone()));

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.analyze("late").await }
        });
        while client.calls.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        session.reset();
        client.gate.as_ref().unwrap().notify_waiters();

        let result = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ReqDocError::Stale { .. })));
        assert!(session.analysis().is_none());
    }
}
