use async_trait::async_trait;

use crate::error::OrchestratorError;

/// The four feedback buttons attached to every emitted answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FeedbackButtonRow;

/// Result of looking a chunk owner up on the chat platform by email.
#[derive(Clone, Debug)]
pub enum OwnerLookup {
    Found { user_id: String },
    NotFound,
}

/// Chat platform adapter port (§6). Event transport and modal rendering are
/// out of scope; this trait is the seam a concrete adapter implements.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    async fn post_answer(
        &self,
        channel: &str,
        thread_ref: &str,
        text: &str,
        chunk_ids: &[String],
    ) -> Result<String, OrchestratorError>;

    async fn post_ephemeral(&self, channel: &str, user_id: &str, text: &str) -> Result<(), OrchestratorError>;

    async fn lookup_owner_by_email(&self, email: &str) -> Result<OwnerLookup, OrchestratorError>;

    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<(), OrchestratorError>;

    async fn post_to_admin_channel(&self, channel: &str, text: &str) -> Result<(), OrchestratorError>;
}
