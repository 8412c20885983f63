pub mod admin;
pub mod broadcast;
pub mod command;
pub mod logs;

pub use broadcast::{
    BroadcastState, handle_broadcast_confirmation, receive_broadcast_content,
    stale_callback_handler,
};
pub use command::{admin_command_handler, command_handler};
