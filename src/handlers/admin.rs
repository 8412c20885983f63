use teloxide::prelude::*;

/// Only the single configured administrator may drive broadcasts.
pub fn is_admin(msg: &Message, admin_id: i64) -> bool {
    msg.from
        .as_ref()
        .map(|user| matches_admin(user.id.0, admin_id))
        .unwrap_or(false)
}

fn matches_admin(user_id: u64, admin_id: i64) -> bool {
    i64::try_from(user_id).map(|id| id == admin_id).unwrap_or(false)
}
