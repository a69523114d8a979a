use crate::{AgentBackend, AgentError};
use harbor_core::{Draft, Email, Prompt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Cadence for the continuous background refresh and the bounded fast-poll
/// phase that follows a "process inbox" trigger.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub refresh_interval: Duration,
    pub process_poll_interval: Duration,
    pub process_poll_window: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(3),
            process_poll_interval: Duration::from_secs(2),
            process_poll_window: Duration::from_secs(60),
        }
    }
}

#[derive(Default)]
struct Collections {
    emails: Vec<Email>,
    prompts: Vec<Prompt>,
    drafts: Vec<Draft>,
}

struct Shared {
    collections: RwLock<Collections>,
    processing: AtomicBool,
}

/// Keeps local copies of the backend's email, prompt and draft collections
/// and owns every write to them. Views read snapshots; the backend stays
/// authoritative. Refreshes replace a collection wholesale, so overlapping
/// timers are harmless (last writer wins) and a failed refresh simply keeps
/// the previous snapshot.
#[derive(Clone)]
pub struct SyncService {
    backend: Arc<dyn AgentBackend>,
    shared: Arc<Shared>,
    settings: SyncSettings,
}

impl SyncService {
    pub fn new(backend: Arc<dyn AgentBackend>, settings: SyncSettings) -> Self {
        Self {
            backend,
            shared: Arc::new(Shared {
                collections: RwLock::new(Collections::default()),
                processing: AtomicBool::new(false),
            }),
            settings,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.shared
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.shared
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emails(&self) -> Vec<Email> {
        self.read().emails.clone()
    }

    pub fn email(&self, id: &str) -> Option<Email> {
        self.read().emails.iter().find(|email| email.id == id).cloned()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.read().prompts.clone()
    }

    pub fn drafts(&self) -> Vec<Draft> {
        self.read().drafts.clone()
    }

    /// True while a "process inbox" fast-poll window is open.
    pub fn is_processing(&self) -> bool {
        self.shared.processing.load(Ordering::Relaxed)
    }

    fn draft_exists(&self, id: &str) -> bool {
        self.read().drafts.iter().any(|draft| draft.id == id)
    }

    /// Replace the local email collection with the backend's. A failure is
    /// logged and the previous snapshot stays in place.
    pub async fn refresh_emails(&self) {
        match self.backend.list_emails().await {
            Ok(emails) => self.write().emails = emails,
            Err(err) => tracing::warn!("email refresh failed: {err}"),
        }
    }

    pub async fn refresh_prompts(&self) {
        match self.backend.list_prompts().await {
            Ok(prompts) => self.write().prompts = prompts,
            Err(err) => tracing::warn!("prompt refresh failed: {err}"),
        }
    }

    pub async fn refresh_drafts(&self) {
        match self.backend.list_drafts().await {
            Ok(drafts) => self.write().drafts = drafts,
            Err(err) => tracing::warn!("draft refresh failed: {err}"),
        }
    }

    pub async fn refresh_all(&self) {
        self.refresh_emails().await;
        self.refresh_prompts().await;
        self.refresh_drafts().await;
    }

    /// Persist a draft upstream. Ids already present in the local draft
    /// collection update in place; unknown ids create. The collection is
    /// refreshed afterwards so the saved draft becomes "known".
    pub async fn save_draft(&self, draft: &Draft) -> Result<(), AgentError> {
        if self.draft_exists(&draft.id) {
            self.backend.update_draft(draft).await?;
        } else {
            self.backend.create_draft(draft).await?;
        }
        self.refresh_drafts().await;
        Ok(())
    }

    pub async fn delete_draft(&self, id: &str) -> Result<(), AgentError> {
        self.backend.delete_draft(id).await?;
        self.refresh_drafts().await;
        Ok(())
    }

    pub async fn save_prompt(&self, prompt: &Prompt) -> Result<(), AgentError> {
        self.backend.update_prompt(prompt).await?;
        self.refresh_prompts().await;
        Ok(())
    }

    /// Reprocess a single email, then refresh the whole collection; the
    /// synchronizer stays the only writer of local email state.
    pub async fn process_email(&self, id: &str) -> Result<(), AgentError> {
        self.backend.trigger_process_email(id).await?;
        self.refresh_emails().await;
        Ok(())
    }

    pub async fn reload_inbox(&self) -> Result<(), AgentError> {
        self.backend.trigger_ingest().await?;
        self.refresh_emails().await;
        Ok(())
    }

    /// Refresh all three collections once, then keep refreshing emails on
    /// the slow cadence until the returned handle is stopped or dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_background_refresh(&self) -> RefreshTask {
        let service = self.clone();
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let task = tokio::spawn(async move {
            service.refresh_all().await;
            tracing::info!(
                interval_secs = service.settings.refresh_interval.as_secs(),
                "background refresh running"
            );
            loop {
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep(service.settings.refresh_interval) => {
                        service.refresh_emails().await;
                    }
                }
            }
            tracing::debug!("background refresh stopped");
        });

        RefreshTask {
            _cancel: token.drop_guard(),
            task,
        }
    }

    /// Fire the backend "process inbox" action, refresh emails once, then
    /// fast-poll the email collection until the window elapses. The
    /// processing flag reads true for the whole window. A failed trigger is
    /// logged, clears the flag and skips the poll phase entirely; there is
    /// no completion signal from the backend, only the elapsed-time bound.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger_process_and_poll(&self) -> ProcessTask {
        self.shared.processing.store(true, Ordering::Relaxed);

        let service = self.clone();
        let token = CancellationToken::new();
        let loop_token = token.clone();

        let task = tokio::spawn(async move {
            if let Err(err) = service.backend.trigger_process().await {
                tracing::warn!("process trigger failed: {err}");
                service.shared.processing.store(false, Ordering::Relaxed);
                return;
            }
            service.refresh_emails().await;

            let deadline = tokio::time::Instant::now() + service.settings.process_poll_window;
            loop {
                // Biased so cancellation and the window deadline win ties
                // against the next poll tick.
                tokio::select! {
                    biased;
                    _ = loop_token.cancelled() => break,
                    _ = tokio::time::sleep_until(deadline) => break,
                    _ = tokio::time::sleep(service.settings.process_poll_interval) => {
                        service.refresh_emails().await;
                    }
                }
            }
            service.shared.processing.store(false, Ordering::Relaxed);
            tracing::debug!("process poll window closed");
        });

        ProcessTask {
            _cancel: token.drop_guard(),
            task,
        }
    }
}

/// Owner handle for the continuous background refresh. Dropping it cancels
/// the task on its next wakeup; `stop` makes teardown explicit.
pub struct RefreshTask {
    _cancel: DropGuard,
    task: JoinHandle<()>,
}

impl RefreshTask {
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Owner handle for one fast-poll window. The window closes by itself once
/// the configured duration elapses; dropping the handle closes it early.
pub struct ProcessTask {
    _cancel: DropGuard,
    task: JoinHandle<()>,
}

impl ProcessTask {
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatReply, ChatRequest, GenerateDraftRequest, GeneratedDraft};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        emails: Mutex<Vec<Email>>,
        prompts: Mutex<Vec<Prompt>>,
        drafts: Mutex<Vec<Draft>>,
        email_fetches: AtomicUsize,
        prompt_fetches: AtomicUsize,
        draft_fetches: AtomicUsize,
        draft_creates: AtomicUsize,
        draft_updates: AtomicUsize,
        draft_deletes: AtomicUsize,
        prompt_updates: AtomicUsize,
        process_calls: AtomicUsize,
        single_process_calls: AtomicUsize,
        ingest_calls: AtomicUsize,
        fail_email_list: AtomicBool,
        fail_process: AtomicBool,
    }

    #[async_trait]
    impl AgentBackend for FakeBackend {
        async fn list_emails(&self) -> Result<Vec<Email>, AgentError> {
            self.email_fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_email_list.load(Ordering::SeqCst) {
                return Err(AgentError::Backend("connection refused".to_string()));
            }
            Ok(self.emails.lock().expect("emails lock").clone())
        }

        async fn list_prompts(&self) -> Result<Vec<Prompt>, AgentError> {
            self.prompt_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.prompts.lock().expect("prompts lock").clone())
        }

        async fn update_prompt(&self, prompt: &Prompt) -> Result<Prompt, AgentError> {
            self.prompt_updates.fetch_add(1, Ordering::SeqCst);
            let mut prompts = self.prompts.lock().expect("prompts lock");
            if let Some(existing) = prompts.iter_mut().find(|p| p.id == prompt.id) {
                *existing = prompt.clone();
            } else {
                prompts.push(prompt.clone());
            }
            Ok(prompt.clone())
        }

        async fn list_drafts(&self) -> Result<Vec<Draft>, AgentError> {
            self.draft_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.drafts.lock().expect("drafts lock").clone())
        }

        async fn create_draft(&self, draft: &Draft) -> Result<Draft, AgentError> {
            self.draft_creates.fetch_add(1, Ordering::SeqCst);
            self.drafts.lock().expect("drafts lock").push(draft.clone());
            Ok(draft.clone())
        }

        async fn update_draft(&self, draft: &Draft) -> Result<Draft, AgentError> {
            self.draft_updates.fetch_add(1, Ordering::SeqCst);
            let mut drafts = self.drafts.lock().expect("drafts lock");
            if let Some(existing) = drafts.iter_mut().find(|d| d.id == draft.id) {
                *existing = draft.clone();
            }
            Ok(draft.clone())
        }

        async fn delete_draft(&self, id: &str) -> Result<(), AgentError> {
            self.draft_deletes.fetch_add(1, Ordering::SeqCst);
            self.drafts.lock().expect("drafts lock").retain(|d| d.id != id);
            Ok(())
        }

        async fn generate_draft(
            &self,
            _request: &GenerateDraftRequest,
        ) -> Result<GeneratedDraft, AgentError> {
            Ok(GeneratedDraft {
                draft_body: "Generated reply".to_string(),
            })
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatReply, AgentError> {
            Ok(ChatReply {
                response: "ok".to_string(),
            })
        }

        async fn trigger_process(&self) -> Result<(), AgentError> {
            self.process_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_process.load(Ordering::SeqCst) {
                return Err(AgentError::Backend("processing unavailable".to_string()));
            }
            Ok(())
        }

        async fn trigger_process_email(&self, _id: &str) -> Result<(), AgentError> {
            self.single_process_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn trigger_ingest(&self) -> Result<(), AgentError> {
            self.ingest_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn sample_email(id: &str) -> Email {
        Email {
            id: id.to_string(),
            sender: "sender@acme.test".to_string(),
            subject: "Subject".to_string(),
            body: "Body".to_string(),
            timestamp: Utc::now(),
            read: false,
            category: None,
            action_items: None,
            summary: None,
        }
    }

    fn sample_draft(id: &str) -> Draft {
        Draft {
            id: id.to_string(),
            email_id: None,
            to: "to@acme.test".to_string(),
            subject: "Re: Subject".to_string(),
            body: "hello".to_string(),
            saved_at: Utc::now(),
        }
    }

    fn sample_prompt() -> Prompt {
        Prompt {
            id: "categorize".to_string(),
            name: "Categorization".to_string(),
            template: "Categorize: {email_body}".to_string(),
            description: "Assigns a category to each email".to_string(),
        }
    }

    fn service_with(backend: &Arc<FakeBackend>) -> SyncService {
        SyncService::new(backend.clone(), SyncSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn background_refresh_fetches_all_then_polls_emails() {
        let backend = Arc::new(FakeBackend::default());
        let service = service_with(&backend);

        let task = service.start_background_refresh();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(backend.prompt_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(backend.draft_fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            backend.email_fetches.load(Ordering::SeqCst),
            1,
            "no refresh before the slow period elapses"
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 3);
        assert_eq!(
            backend.prompt_fetches.load(Ordering::SeqCst),
            1,
            "prompts and drafts refresh only on startup"
        );

        task.stop();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            backend.email_fetches.load(Ordering::SeqCst),
            3,
            "no refresh after teardown"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn process_poll_runs_fast_window_then_stops() {
        let backend = Arc::new(FakeBackend::default());
        let service = service_with(&backend);

        let _task = service.trigger_process_and_poll();
        assert!(service.is_processing());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(backend.process_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            backend.email_fetches.load(Ordering::SeqCst),
            1,
            "one immediate refresh after the trigger"
        );

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 3);

        // Jump close to the end of the window; ticks keep firing until the
        // deadline wins the (biased) race at exactly 60s.
        tokio::time::sleep(Duration::from_secs(54)).await;
        assert!(service.is_processing());
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 30);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!service.is_processing(), "flag clears when the window ends");
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 30);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            backend.email_fetches.load(Ordering::SeqCst),
            30,
            "no fast refresh after the window"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_process_trigger_skips_poll_and_clears_flag() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_process.store(true, Ordering::SeqCst);
        let service = service_with(&backend);

        let _task = service.trigger_process_and_poll();
        assert!(service.is_processing());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!service.is_processing());
        assert_eq!(backend.process_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            backend.email_fetches.load(Ordering::SeqCst),
            0,
            "no poll phase after a failed trigger"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_process_handle_closes_the_window_early() {
        let backend = Arc::new(FakeBackend::default());
        let service = service_with(&backend);

        let task = service.trigger_process_and_poll();
        tokio::time::sleep(Duration::from_secs(4)).await;
        let fetched = backend.email_fetches.load(Ordering::SeqCst);
        assert!(fetched >= 2);

        drop(task);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), fetched);
        assert!(!service.is_processing(), "flag clears on early teardown");
    }

    #[tokio::test]
    async fn failed_email_refresh_keeps_previous_collection() {
        let backend = Arc::new(FakeBackend::default());
        backend
            .emails
            .lock()
            .expect("emails lock")
            .push(sample_email("1"));
        let service = service_with(&backend);

        service.refresh_emails().await;
        assert_eq!(service.emails().len(), 1);

        backend.fail_email_list.store(true, Ordering::SeqCst);
        service.refresh_emails().await;
        assert_eq!(
            service.emails().len(),
            1,
            "previous snapshot survives a failed refresh"
        );
        assert_eq!(service.email("1").expect("email kept").id, "1");
    }

    #[tokio::test]
    async fn saving_unknown_draft_creates_and_known_updates() {
        let backend = Arc::new(FakeBackend::default());
        let service = service_with(&backend);

        let draft = sample_draft("1700000000000");
        service.save_draft(&draft).await.expect("create succeeds");
        assert_eq!(backend.draft_creates.load(Ordering::SeqCst), 1);
        assert_eq!(backend.draft_updates.load(Ordering::SeqCst), 0);
        assert_eq!(service.drafts().len(), 1, "save refreshes the collection");

        let mut edited = draft.clone();
        edited.body = "updated body".to_string();
        service.save_draft(&edited).await.expect("update succeeds");
        assert_eq!(backend.draft_creates.load(Ordering::SeqCst), 1);
        assert_eq!(backend.draft_updates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deleting_a_draft_refreshes_the_collection() {
        let backend = Arc::new(FakeBackend::default());
        let service = service_with(&backend);

        let draft = sample_draft("1700000000001");
        service.save_draft(&draft).await.expect("create succeeds");
        assert_eq!(service.drafts().len(), 1);

        service.delete_draft(&draft.id).await.expect("delete succeeds");
        assert_eq!(backend.draft_deletes.load(Ordering::SeqCst), 1);
        assert!(service.drafts().is_empty());
    }

    #[tokio::test]
    async fn saving_a_prompt_pushes_upstream_and_refreshes() {
        let backend = Arc::new(FakeBackend::default());
        backend
            .prompts
            .lock()
            .expect("prompts lock")
            .push(sample_prompt());
        let service = service_with(&backend);
        service.refresh_prompts().await;

        let mut prompt = sample_prompt();
        prompt.template = "Sort this email: {email_body}".to_string();
        service.save_prompt(&prompt).await.expect("save succeeds");

        assert_eq!(backend.prompt_updates.load(Ordering::SeqCst), 1);
        let prompts = service.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].template, "Sort this email: {email_body}");
    }

    #[tokio::test]
    async fn single_email_reprocess_and_ingest_refresh_emails() {
        let backend = Arc::new(FakeBackend::default());
        let service = service_with(&backend);

        service.process_email("1").await.expect("reprocess succeeds");
        assert_eq!(backend.single_process_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 1);

        service.reload_inbox().await.expect("ingest succeeds");
        assert_eq!(backend.ingest_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.email_fetches.load(Ordering::SeqCst), 2);
    }
}
