use crate::AgentError;
use async_trait::async_trait;
use harbor_core::{Draft, Email, Prompt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    /// Scope of the question: a specific email, or `None` for the whole
    /// inbox. Serialized as an explicit null so the backend sees the
    /// inbox-wide case.
    pub email_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDraftRequest {
    pub email_id: String,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDraft {
    pub draft_body: String,
}

/// The agent service's REST surface. The production implementation is
/// [`HttpBackend`]; the synchronizer only ever sees this trait.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    async fn list_emails(&self) -> Result<Vec<Email>, AgentError>;

    async fn list_prompts(&self) -> Result<Vec<Prompt>, AgentError>;

    async fn update_prompt(&self, prompt: &Prompt) -> Result<Prompt, AgentError>;

    async fn list_drafts(&self) -> Result<Vec<Draft>, AgentError>;

    async fn create_draft(&self, draft: &Draft) -> Result<Draft, AgentError>;

    async fn update_draft(&self, draft: &Draft) -> Result<Draft, AgentError>;

    async fn delete_draft(&self, id: &str) -> Result<(), AgentError>;

    async fn generate_draft(
        &self,
        request: &GenerateDraftRequest,
    ) -> Result<GeneratedDraft, AgentError>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AgentError>;

    /// Kick off backend processing of the whole inbox. The response body is
    /// ignored; completion is only ever observed through later polls.
    async fn trigger_process(&self) -> Result<(), AgentError>;

    async fn trigger_process_email(&self, id: &str) -> Result<(), AgentError>;

    /// Ask the backend to reload its sample inbox.
    async fn trigger_ingest(&self) -> Result<(), AgentError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, AgentError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl AgentBackend for HttpBackend {
    async fn list_emails(&self) -> Result<Vec<Email>, AgentError> {
        let response = self
            .http
            .get(self.endpoint("emails"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn list_prompts(&self) -> Result<Vec<Prompt>, AgentError> {
        let response = self
            .http
            .get(self.endpoint("prompts"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn update_prompt(&self, prompt: &Prompt) -> Result<Prompt, AgentError> {
        let response = self
            .http
            .put(self.endpoint(&format!("prompts/{}", prompt.id)))
            .json(prompt)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn list_drafts(&self) -> Result<Vec<Draft>, AgentError> {
        let response = self
            .http
            .get(self.endpoint("drafts"))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn create_draft(&self, draft: &Draft) -> Result<Draft, AgentError> {
        let response = self
            .http
            .post(self.endpoint("drafts"))
            .json(draft)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn update_draft(&self, draft: &Draft) -> Result<Draft, AgentError> {
        let response = self
            .http
            .put(self.endpoint(&format!("drafts/{}", draft.id)))
            .json(draft)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn delete_draft(&self, id: &str) -> Result<(), AgentError> {
        self.http
            .delete(self.endpoint(&format!("drafts/{id}")))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn generate_draft(
        &self,
        request: &GenerateDraftRequest,
    ) -> Result<GeneratedDraft, AgentError> {
        let response = self
            .http
            .post(self.endpoint("drafts/generate"))
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, AgentError> {
        let response = self
            .http
            .post(self.endpoint("chat"))
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn trigger_process(&self) -> Result<(), AgentError> {
        self.http
            .post(self.endpoint("process"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn trigger_process_email(&self, id: &str) -> Result<(), AgentError> {
        self.http
            .post(self.endpoint(&format!("process/{id}")))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn trigger_ingest(&self) -> Result<(), AgentError> {
        self.http
            .post(self.endpoint("ingest"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
