use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient as seen by the ingestion pipeline: only what lookup needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(full_name: impl Into<String>, birth_date: Option<NaiveDate>) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_name: full_name.into(),
            birth_date,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_patient_gets_fresh_id() {
        let a = Patient::new("Ana Souza", None);
        let b = Patient::new("Ana Souza", NaiveDate::from_ymd_opt(1980, 5, 2));
        assert_ne!(a.id, b.id);
        assert_eq!(b.birth_date.unwrap().to_string(), "1980-05-02");
    }
}
