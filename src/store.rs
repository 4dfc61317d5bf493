use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::Result;

/// Field map of one document.
pub type Document = Map<String, Value>;

/// Document store keyed by collection name and user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read one document, `None` when it does not exist.
    async fn get(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Document>>;

    /// Create the document or merge `fields` into it, leaving other fields
    /// untouched.
    async fn set_merge(
        &self,
        collection: &str,
        key: &str,
        fields: Document,
    ) -> Result<()>;

    /// Replace the given fields of an existing document. Fails with
    /// [`PrepmindError::NotFound`](crate::PrepmindError::NotFound) when the
    /// document is missing.
    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Document,
    ) -> Result<()>;
}
