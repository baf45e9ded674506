//! Canonical domain models shared by storage, sync and send paths

mod account;
mod label;
mod message;
mod thread;

pub use account::Account;
pub(crate) use account::redact;
pub use label::{EmailLabel, Sensitivity, labels};
pub use message::{Attachment, EmailAddress, EmailMessage, MessageBuilder, MessageId};
pub use thread::{Thread, ThreadId};
