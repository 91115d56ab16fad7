use uuid::Uuid;

/// Fresh opaque id for turns and conversations
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}
