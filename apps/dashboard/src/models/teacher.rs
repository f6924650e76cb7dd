use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in operator, as returned by the backend's admin sign-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub auth_user_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub school_id: String,
    pub grade_id: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Teacher {
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().filter(|s| !s.is_empty()) {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_teacher() -> Teacher {
    serde_json::from_value(serde_json::json!({
        "id": "t-1",
        "auth_user_id": "auth-1",
        "email": "ops@example.com",
        "first_name": "Sam",
        "last_name": null,
        "school_id": "school-1",
        "grade_id": "grade-3",
        "is_active": true,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-02T00:00:00Z",
        "deleted_at": null
    }))
    .unwrap()
}
