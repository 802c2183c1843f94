use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::RwLock;

use super::LeadStore;
use crate::errors::LeadResult;
use crate::lead::{sort_newest_first, Lead, NewLead};

/// Process-local store with the same id format as MongoDB. Used for local
/// runs without a database and by the test suite.
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.leads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.read().is_empty()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn insert(&self, lead: NewLead) -> LeadResult<String> {
        let id = ObjectId::new().to_hex();
        self.leads.write().push(lead.into_lead(id.clone()));
        Ok(id)
    }

    async fn list_newest_first(&self) -> LeadResult<Vec<Lead>> {
        let mut leads = self.leads.read().clone();
        sort_newest_first(&mut leads);
        Ok(leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn new_lead(name: &str, offset_secs: i64) -> NewLead {
        NewLead {
            name: name.to_string(),
            phone: "9538752960".to_string(),
            message: "hi".to_string(),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_regardless_of_insert_order() {
        let store = InMemoryLeadStore::new();
        store.insert(new_lead("older", -60)).await.unwrap();
        let newest = store.insert(new_lead("newest", 0)).await.unwrap();
        store.insert(new_lead("oldest", -120)).await.unwrap();

        let leads = store.list_newest_first().await.unwrap();
        let names: Vec<_> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["newest", "older", "oldest"]);
        assert_eq!(leads[0].id, newest);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn ids_are_unique_object_ids() {
        let store = InMemoryLeadStore::new();
        let a = store.insert(new_lead("a", 0)).await.unwrap();
        let b = store.insert(new_lead("b", 0)).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 24);
        assert!(ObjectId::parse_str(&a).is_ok());
    }
}
