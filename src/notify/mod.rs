//! Celebratory notifications for newly granted tags.
//!
//! `notify` is synchronous and never blocks the caller: it checks the per-(class,
//! member) cooldown, renders a message and enqueues it on a bounded channel. A
//! background task delivers queued posts one at a time with a per-post timeout.
//! Delivery failures are logged and dropped.

mod templates;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::effects::{PlatformEffect, PlatformInterpreter};
use crate::types::{ChannelId, MemberId};

pub use templates::{DEFAULT_TEMPLATES, render};

/// Default window within which a (class, member) pair is notified at most once.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3600);

/// Default capacity of the delivery queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default per-post delivery timeout.
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification dispatcher settings.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub channel: ChannelId,
    pub cooldown: Duration,
    pub queue_capacity: usize,
    pub post_timeout: Duration,
    /// Falls back to [`DEFAULT_TEMPLATES`] when empty.
    pub templates: Vec<String>,
}

impl NotifyConfig {
    pub fn new(channel: ChannelId) -> Self {
        NotifyConfig {
            channel,
            cooldown: DEFAULT_COOLDOWN,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            post_timeout: DEFAULT_POST_TIMEOUT,
            templates: Vec::new(),
        }
    }
}

/// What happened to one `notify` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Queued,
    CoolingDown,
    QueueFull,
}

#[derive(Debug)]
struct Outgoing {
    channel: ChannelId,
    content: String,
}

/// Deduplicating, non-blocking notification sender.
#[derive(Debug)]
pub struct NotificationDispatcher {
    channel: ChannelId,
    cooldown: Duration,
    templates: Vec<String>,
    next_template: AtomicUsize,
    last_sent: Mutex<HashMap<(String, MemberId), Instant>>,
    tx: mpsc::Sender<Outgoing>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher and spawns its delivery task.
    ///
    /// The task exits when `shutdown` is cancelled or the dispatcher is dropped.
    pub fn spawn<P: PlatformInterpreter>(
        platform: Arc<P>,
        config: NotifyConfig,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let task = tokio::spawn(deliver(platform, rx, config.post_timeout, shutdown));

        let templates = if config.templates.is_empty() {
            DEFAULT_TEMPLATES.iter().map(|t| t.to_string()).collect()
        } else {
            config.templates
        };

        let dispatcher = NotificationDispatcher {
            channel: config.channel,
            cooldown: config.cooldown,
            templates,
            next_template: AtomicUsize::new(0),
            last_sent: Mutex::new(HashMap::new()),
            tx,
        };
        (dispatcher, task)
    }

    /// Enqueues a celebration for `member` joining `class`, unless one was sent
    /// within the cooldown.
    pub fn notify(&self, class: &str, member: &MemberId, display_name: &str) -> NotifyOutcome {
        let key = (class.to_string(), member.clone());
        let now = Instant::now();

        // A poisoned lock only means another notify panicked mid-insert; the map
        // itself is still usable.
        let mut last_sent = self
            .last_sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(sent) = last_sent.get(&key)
            && now.duration_since(*sent) < self.cooldown
        {
            debug!(class, member = %member, "Notification suppressed by cooldown");
            return NotifyOutcome::CoolingDown;
        }

        let idx = self.next_template.fetch_add(1, Ordering::Relaxed) % self.templates.len();
        let content = render(&self.templates[idx], class, &member.mention(), display_name);

        match self.tx.try_send(Outgoing {
            channel: self.channel.clone(),
            content,
        }) {
            Ok(()) => {
                last_sent.insert(key, now);
                NotifyOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(class, member = %member, "Notification queue full, dropping");
                NotifyOutcome::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(class, member = %member, "Notification delivery stopped, dropping");
                NotifyOutcome::QueueFull
            }
        }
    }
}

async fn deliver<P: PlatformInterpreter>(
    platform: Arc<P>,
    mut rx: mpsc::Receiver<Outgoing>,
    post_timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let outgoing = tokio::select! {
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let effect = PlatformEffect::PostMessage {
            channel: outgoing.channel.clone(),
            content: outgoing.content,
        };
        match tokio::time::timeout(post_timeout, platform.interpret(effect)).await {
            Ok(Ok(_)) => debug!(channel = %outgoing.channel, "Notification delivered"),
            Ok(Err(e)) => warn!(channel = %outgoing.channel, error = %e, "Notification failed"),
            Err(_) => warn!(channel = %outgoing.channel, "Notification timed out"),
        }
    }
    info!("Notification delivery stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockPlatform;

    fn config() -> NotifyConfig {
        NotifyConfig {
            templates: vec!["a {mention}".into(), "b {name}".into()],
            ..NotifyConfig::new(ChannelId("chan".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_suppresses_repeat_within_window() {
        let platform = Arc::new(MockPlatform::new());
        let (notifier, _task) =
            NotificationDispatcher::spawn(platform, config(), CancellationToken::new());
        let member = MemberId::from("1");

        assert_eq!(notifier.notify("ambassador", &member, "Ann"), NotifyOutcome::Queued);
        assert_eq!(
            notifier.notify("ambassador", &member, "Ann"),
            NotifyOutcome::CoolingDown
        );
        // Different class, independent window.
        assert_eq!(notifier.notify("subscriber", &member, "Ann"), NotifyOutcome::Queued);

        tokio::time::advance(DEFAULT_COOLDOWN).await;
        assert_eq!(notifier.notify("ambassador", &member, "Ann"), NotifyOutcome::Queued);
    }

    #[tokio::test]
    async fn queued_posts_are_delivered_with_rotating_templates() {
        let platform = Arc::new(MockPlatform::new());
        let (notifier, task) = NotificationDispatcher::spawn(
            Arc::clone(&platform),
            config(),
            CancellationToken::new(),
        );

        notifier.notify("ambassador", &MemberId::from("1"), "Ann");
        notifier.notify("ambassador", &MemberId::from("2"), "Bob");
        drop(notifier);
        task.await.unwrap();

        assert_eq!(platform.posted_messages(), vec!["a <@1>", "b Bob"]);
    }

    #[tokio::test]
    async fn full_queue_drops_without_recording() {
        let platform = Arc::new(MockPlatform::new());
        let config = NotifyConfig {
            queue_capacity: 1,
            ..config()
        };
        let (notifier, _task) =
            NotificationDispatcher::spawn(platform, config, CancellationToken::new());

        // Nothing yields between the calls, so the delivery task cannot drain the slot.
        let first = notifier.notify("ambassador", &MemberId::from("1"), "Ann");
        let second = notifier.notify("ambassador", &MemberId::from("2"), "Bob");

        assert_eq!(first, NotifyOutcome::Queued);
        assert_eq!(second, NotifyOutcome::QueueFull);
        // Not recorded, so a retry is not suppressed by the cooldown.
        assert_eq!(
            notifier.notify("ambassador", &MemberId::from("2"), "Bob"),
            NotifyOutcome::QueueFull
        );
    }

    #[tokio::test]
    async fn delivery_failure_does_not_stop_the_worker() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_fail_post_message(true);
        let (notifier, task) = NotificationDispatcher::spawn(
            Arc::clone(&platform),
            config(),
            CancellationToken::new(),
        );

        notifier.notify("ambassador", &MemberId::from("1"), "Ann");
        notifier.notify("ambassador", &MemberId::from("2"), "Bob");
        drop(notifier);
        task.await.unwrap();

        assert_eq!(platform.posted_messages().len(), 2);
    }
}
