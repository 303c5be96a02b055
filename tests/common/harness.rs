#![allow(dead_code)]

use super::constants::{APPROVER, IMAGE_PATH, TOPIC};
use super::fakes::{FakeGenerator, FakeImages, FakeTopics, RecordingApprover, RecordingChannel};
use postbot_server::approval::{ApprovalStateStore, ApprovalWorkflow, EventRouter};
use postbot_server::messaging::{InboundEvent, UserId};
use postbot_server::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// A fully wired approval engine over recording fakes.
pub struct TestBot {
    pub store: Arc<ApprovalStateStore>,
    pub workflow: Arc<ApprovalWorkflow>,
    pub router: EventRouter,
    pub approver: Arc<RecordingApprover>,
    pub channel: Arc<RecordingChannel>,
    pub generator: Arc<FakeGenerator>,
    pub images: Arc<FakeImages>,
    pub topics: Arc<FakeTopics>,
    callback_counter: std::sync::atomic::AtomicU32,
}

impl TestBot {
    pub fn new() -> Self {
        Self::build(
            FakeGenerator::new(),
            FakeImages::with_image(IMAGE_PATH),
            FakeTopics::new(TOPIC),
        )
    }

    pub fn with_generator(generator: FakeGenerator) -> Self {
        Self::build(
            generator,
            FakeImages::with_image(IMAGE_PATH),
            FakeTopics::new(TOPIC),
        )
    }

    pub fn with_images(images: FakeImages) -> Self {
        Self::build(FakeGenerator::new(), images, FakeTopics::new(TOPIC))
    }

    pub fn with_topics(topics: FakeTopics) -> Self {
        Self::build(FakeGenerator::new(), FakeImages::with_image(IMAGE_PATH), topics)
    }

    fn build(generator: FakeGenerator, images: FakeImages, topics: FakeTopics) -> Self {
        let store = Arc::new(ApprovalStateStore::new());
        let approver = Arc::new(RecordingApprover::new());
        let channel = Arc::new(RecordingChannel::new());
        let generator = Arc::new(generator);
        let images = Arc::new(images);
        let topics = Arc::new(topics);

        let workflow = Arc::new(
            ApprovalWorkflow::new(
                Arc::clone(&store),
                generator.clone(),
                images.clone(),
                topics.clone(),
                approver.clone(),
                channel.clone(),
            )
            .with_topic_policy(RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::topic_lookup()
            })
            .with_chunk_pause(Duration::ZERO),
        );
        let router = EventRouter::new(APPROVER, Arc::clone(&workflow));

        Self {
            store,
            workflow,
            router,
            approver,
            channel,
            generator,
            images,
            topics,
            callback_counter: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Send a chat message, classified the way the poller classifies it.
    pub async fn message(&self, sender: UserId, text: &str) {
        self.router
            .dispatch(InboundEvent::from_message(sender, text.to_string()))
            .await;
    }

    pub async fn command(&self, sender: UserId, text: &str) {
        self.message(sender, text).await;
    }

    /// Press a button. Returns the callback id used.
    pub async fn press(&self, sender: UserId, data: &str) -> String {
        let n = self
            .callback_counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let callback_id = format!("cb-{}", n);
        self.router
            .dispatch(InboundEvent::Callback {
                sender,
                callback_id: callback_id.clone(),
                data: data.to_string(),
            })
            .await;
        callback_id
    }

    /// `/generate` from the approver, leaving a session in text review.
    pub async fn start_session(&self) {
        self.command(APPROVER, "/generate").await;
        assert!(
            self.store.get(APPROVER).await.is_some(),
            "session should exist after /generate"
        );
    }
}
