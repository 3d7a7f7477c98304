//! Result Store Adapter: read/update `Submission` documents. The worker is
//! the sole writer, so writes are full-document last-writer-wins updates —
//! no optimistic concurrency is needed.

use async_trait::async_trait;
use bson::doc;
use bson::oid::ObjectId;
use mongodb::{Client, Collection};

use crate::error::WorkerError;
use crate::model::Submission;

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn find_submission(&self, id: &ObjectId) -> Result<Option<Submission>, WorkerError>;
    async fn save(&self, submission: &Submission) -> Result<(), WorkerError>;
}

pub struct MongoResultStore {
    collection: Collection<Submission>,
}

impl MongoResultStore {
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, WorkerError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| WorkerError::Store(format!("failed to connect to {uri}: {e}")))?;
        let collection = client.database(db_name).collection("submissions");
        Ok(Self { collection })
    }
}

#[async_trait]
impl ResultStore for MongoResultStore {
    async fn find_submission(&self, id: &ObjectId) -> Result<Option<Submission>, WorkerError> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| WorkerError::Store(format!("find_submission({id}) failed: {e}")))
    }

    async fn save(&self, submission: &Submission) -> Result<(), WorkerError> {
        self.collection
            .replace_one(doc! { "_id": submission.id }, submission)
            .upsert(true)
            .await
            .map_err(|e| WorkerError::Store(format!("save({}) failed: {e}", submission.id)))?;
        Ok(())
    }
}
