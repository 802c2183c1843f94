use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, serde_helpers::chrono_datetime_as_bson_datetime};
use mongodb::options::FindOptions;
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::connection::{is_connection_fault, ConnectionCache};
use super::LeadStore;
use crate::errors::{LeadError, LeadResult};
use crate::lead::{Lead, NewLead, LEADS_COLLECTION};

/// Shape of a lead inside the `leads` collection.
#[derive(Debug, Serialize, Deserialize)]
struct LeadDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    name: String,
    phone: String,
    message: String,
    #[serde(rename = "createdAt", with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
}

impl From<NewLead> for LeadDocument {
    fn from(lead: NewLead) -> Self {
        Self {
            id: None,
            name: lead.name,
            phone: lead.phone,
            message: lead.message,
            created_at: lead.created_at,
        }
    }
}

impl From<LeadDocument> for Lead {
    fn from(doc: LeadDocument) -> Self {
        Lead {
            id: doc.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            name: doc.name,
            phone: doc.phone,
            message: doc.message,
            created_at: doc.created_at,
        }
    }
}

pub struct MongoLeadStore {
    cache: Arc<ConnectionCache>,
}

impl MongoLeadStore {
    pub fn new(cache: Arc<ConnectionCache>) -> Self {
        Self { cache }
    }

    async fn collection(&self) -> LeadResult<Collection<LeadDocument>> {
        let database = self.cache.handle().await?;
        Ok(database.collection::<LeadDocument>(LEADS_COLLECTION))
    }

    fn storage_error(&self, err: mongodb::error::Error) -> LeadError {
        if is_connection_fault(&err) {
            self.cache.invalidate();
        }
        LeadError::storage(err)
    }
}

#[async_trait]
impl LeadStore for MongoLeadStore {
    async fn insert(&self, lead: NewLead) -> LeadResult<String> {
        let collection = self.collection().await?;
        let result = match collection.insert_one(LeadDocument::from(lead), None).await {
            Ok(result) => result,
            Err(err) => return Err(self.storage_error(err)),
        };

        let inserted_id = match result.inserted_id.as_object_id() {
            Some(oid) => oid.to_hex(),
            None => result.inserted_id.to_string(),
        };
        debug!(%inserted_id, "lead inserted");
        Ok(inserted_id)
    }

    async fn list_newest_first(&self) -> LeadResult<Vec<Lead>> {
        let collection = self.collection().await?;
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();

        let cursor = match collection.find(doc! {}, options).await {
            Ok(cursor) => cursor,
            Err(err) => return Err(self.storage_error(err)),
        };
        let documents: Vec<LeadDocument> = match cursor.try_collect().await {
            Ok(documents) => documents,
            Err(err) => return Err(self.storage_error(err)),
        };

        Ok(documents.into_iter().map(Lead::from).collect())
    }
}
