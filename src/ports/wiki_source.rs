use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::WikiSourceError;

/// One page row from a space listing (§6 wiki source contract).
#[derive(Clone, Debug)]
pub struct SpacePage {
    pub id: String,
    pub title: String,
    pub status: String,
    pub version_number: u64,
    pub version_created_at: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub webui_link: String,
}

/// Page-level summary used for the sync diff in §4.2 (the `Page` row fields
/// relevant to the decision, without fetching the full body).
#[derive(Clone, Debug)]
pub struct PageSummary {
    pub id: String,
    pub updated_at: DateTime<Utc>,
    pub status: String,
}

/// Full page fetch: body + labels + permissions + attachments.
#[derive(Clone, Debug)]
pub struct PageBody {
    pub id: String,
    pub title: String,
    pub space_key: String,
    pub storage_html: String,
    pub labels: Vec<String>,
    pub attachments: Vec<String>,
    pub author: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub webui_link: String,
}

#[async_trait]
pub trait WikiSource: Send + Sync {
    async fn list_pages(&self, space_key: &str) -> Result<Vec<SpacePage>, WikiSourceError>;

    async fn get_page(&self, page_id: &str) -> Result<PageBody, WikiSourceError>;
}
