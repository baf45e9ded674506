//! Query API for UI consumption
//!
//! Provides high-level query functions that return data formatted
//! for display in the UI. Every call is scoped to one account.

mod threads;

pub use threads::{
    MAX_SUGGESTIONS, ReplyDetails, ThreadDetail, ThreadSummary, count_threads, email_suggestions,
    get_email_details, get_reply_details, get_thread_detail, list_threads, set_done,
};
