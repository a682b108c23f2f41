/// Database operations for storing session documents
use async_trait::async_trait;
use time::OffsetDateTime;

use crate::config::DatabaseConfig;
use crate::database::connection::execute_with_retry;
use crate::upload::DocumentSink;

/// Create the document table if it does not exist yet
pub async fn ensure_schema(database: &DatabaseConfig) -> Result<(), String> {
    execute_with_retry(database, |client| async move {
        client
            .execute(
                "CREATE TABLE IF NOT EXISTS scan_documents(
                    collection TEXT NOT NULL,
                    document_id TEXT NOT NULL,
                    payload JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (collection, document_id)
                 )",
                &[],
            )
            .await
    })
    .await
}

/// Write a document, replacing any previous version with the same id
///
/// # Arguments
/// * `collection` - Session name the document belongs to
/// * `document_id` - Document name within the collection
/// * `payload` - JSON body stored as-is
pub async fn store_document(
    collection: &str,
    document_id: &str,
    payload: &serde_json::Value,
    database: &DatabaseConfig,
) -> Result<(), String> {
    // Clone data for move into async closure
    let collection = collection.to_string();
    let document_id = document_id.to_string();
    let payload = payload.clone();
    let updated_at = OffsetDateTime::now_utc();

    execute_with_retry(database, move |client| {
        let collection = collection.clone();
        let document_id = document_id.clone();
        let payload = payload.clone();
        async move {
            client
                .execute(
                    "INSERT INTO scan_documents(collection, document_id, payload, updated_at)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (collection, document_id)
                     DO UPDATE SET payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at",
                    &[&collection, &document_id, &payload, &updated_at],
                )
                .await
        }
    })
    .await
}

/// Document sink backed by the `scan_documents` table
pub struct PostgresDocumentSink {
    database: DatabaseConfig,
}

impl PostgresDocumentSink {
    pub fn new(database: DatabaseConfig) -> Self {
        Self { database }
    }

    pub async fn prepare(&self) -> Result<(), String> {
        ensure_schema(&self.database).await
    }
}

#[async_trait]
impl DocumentSink for PostgresDocumentSink {
    async fn write(
        &self,
        collection: &str,
        document_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), String> {
        store_document(collection, document_id, payload, &self.database).await
    }
}
