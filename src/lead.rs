//! Lead record
//!
//! `NewLead` is what the validator hands to a store; `Lead` is what a store
//! hands back, with the identifier it assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the collection leads are appended to.
pub const LEADS_COLLECTION: &str = "leads";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl NewLead {
    pub fn into_lead(self, id: String) -> Lead {
        Lead {
            id,
            name: self.name,
            phone: self.phone,
            message: self.message,
            created_at: self.created_at,
        }
    }
}

/// A persisted lead as the list endpoint renders it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub phone: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Newest first. Ties keep their relative order.
pub fn sort_newest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn lead(id: &str, at: DateTime<Utc>) -> Lead {
        Lead {
            id: id.to_string(),
            name: "Asha".to_string(),
            phone: "+91 9538752960".to_string(),
            message: "Interested in 3BHK".to_string(),
            created_at: at,
        }
    }

    #[test]
    fn renders_store_field_names() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let value = serde_json::to_value(lead("65f0c0ffee", at)).unwrap();
        assert_eq!(value["_id"], "65f0c0ffee");
        assert_eq!(value["createdAt"], "2025-03-01T09:30:00Z");
        assert!(value.get("created_at").is_none());
    }

    #[test]
    fn newest_first_is_stable() {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let mut leads = vec![
            lead("a", base),
            lead("b", base + Duration::minutes(5)),
            lead("c", base),
        ];
        sort_newest_first(&mut leads);
        let ids: Vec<_> = leads.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }
}
