//! Common test infrastructure
//!
//! Recording fakes for every collaborator of the approval engine, and a
//! [`TestBot`] wiring them to a real store, workflow and router.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestBot, APPROVER};
//!
//! #[tokio::test]
//! async fn test_generate() {
//!     let bot = TestBot::new();
//!     bot.command(APPROVER, "/generate").await;
//!     assert!(bot.store.get(APPROVER).await.is_some());
//! }
//! ```

mod constants;
mod fakes;
mod harness;

pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{
    ChannelPost, FakeGenerator, FakeImages, FakeTopics, RecordingApprover, RecordingChannel, Sent,
};
pub use harness::TestBot;
