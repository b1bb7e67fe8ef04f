mod contact;
mod message;

pub use contact::{Chat, Contact};
pub use message::{Message, MessageSender};
