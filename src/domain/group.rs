use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub subject: Option<String>,
    pub teacher_id: Option<Uuid>,
}

impl Group {
    pub fn is_taught_by(&self, user_id: Uuid) -> bool {
        self.teacher_id == Some(user_id)
    }
}
