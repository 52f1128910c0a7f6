use uuid::Uuid;

pub const APPROVE_LABEL: &str = "✅ 승인하기";
pub const REPLY_LABEL: &str = "✉️ 답장하기";

pub const APPROVE_PREFIX: &str = "approve:";
pub const REPLY_CHAT_PREFIX: &str = "reply_chat:";

pub fn approve_data(purchase_id: Uuid) -> String {
    format!("{}{}", APPROVE_PREFIX, purchase_id)
}

pub fn reply_chat_data(user_id: Uuid) -> String {
    format!("{}{}", REPLY_CHAT_PREFIX, user_id)
}
