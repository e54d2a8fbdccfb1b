//! Status messages while the facts stage runs.
use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Receives progress messages. Delivery is best effort.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, message: &str);
}

/// Sink that writes messages to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

#[async_trait]
impl ProgressSink for LogProgressSink {
    async fn report(&self, message: &str) {
        info!(message, "digest progress");
    }
}

/// One scheduled step: wait `delay` after the previous step, then emit `messages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressStep {
    pub delay: Duration,
    pub messages: Vec<String>,
}

impl ProgressStep {
    fn new(delay_secs: u64, messages: &[&str]) -> Self {
        Self {
            delay: Duration::from_secs(delay_secs),
            messages: messages.iter().map(ToString::to_string).collect(),
        }
    }
}

/// 15s, +30s, +30s, +30s, +15s.
#[must_use]
pub fn default_schedule() -> Vec<ProgressStep> {
    vec![
        ProgressStep::new(
            15,
            &[
                "We dig into all of these sources one by one, to drag out what's interesting.",
                "Each keyword can have hundreds of sources, so it may take a while.",
            ],
        ),
        ProgressStep::new(30, &["You can check back here later."]),
        ProgressStep::new(30, &["We're almost there, remember go do something else."]),
        ProgressStep::new(
            30,
            &[
                "Since you're first we are digging for the first time today.",
                "The first run of the day is always slow for LLM concurrency limits.",
            ],
        ),
        ProgressStep::new(15, &["You can check back here later."]),
    ]
}

/// Background reporter bound to one pipeline run.
///
/// Holds only a completion flag and the sink; it never sees the dataset.
pub struct ProgressReporter {
    done: Arc<AtomicBool>,
    emitted: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(sink: Arc<dyn ProgressSink>) -> Self {
        Self::spawn_with_schedule(sink, default_schedule())
    }

    pub fn spawn_with_schedule(sink: Arc<dyn ProgressSink>, schedule: Vec<ProgressStep>) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let emitted = Arc::new(AtomicUsize::new(0));

        let handle = tokio::spawn({
            let done = Arc::clone(&done);
            let emitted = Arc::clone(&emitted);
            async move {
                for step in schedule {
                    tokio::time::sleep(step.delay).await;
                    if done.load(Ordering::Acquire) {
                        debug!("progress reporter stopped: stage finished");
                        return;
                    }
                    for message in &step.messages {
                        sink.report(message).await;
                        emitted.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        Self {
            done,
            emitted,
            handle,
        }
    }

    /// Mark the stage complete and stop the background task. Returns how many messages were sent.
    pub async fn finish(mut self) -> usize {
        self.done.store(true, Ordering::Release);
        self.handle.abort();
        // cancelled is the expected outcome here
        let _ = (&mut self.handle).await;
        self.emitted.load(Ordering::Relaxed)
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn report(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn default_schedule_spans_two_minutes() {
        let total: Duration = default_schedule().iter().map(|step| step.delay).sum();
        assert_eq!(total, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_sent_when_stage_finishes_early() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::spawn(Arc::clone(&sink) as Arc<dyn ProgressSink>);

        tokio::time::sleep(Duration::from_secs(10)).await;
        let sent = reporter.finish().await;

        assert_eq!(sent, 0);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn messages_follow_the_schedule_until_finished() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::spawn(Arc::clone(&sink) as Arc<dyn ProgressSink>);

        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(sink.messages.lock().unwrap().len(), 3);

        let sent = reporter.finish().await;
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(sent, 3);
        assert_eq!(sink.messages.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn full_schedule_runs_when_stage_is_slow() {
        let sink = Arc::new(RecordingSink::default());
        let reporter = ProgressReporter::spawn(Arc::clone(&sink) as Arc<dyn ProgressSink>);

        tokio::time::sleep(Duration::from_secs(125)).await;

        assert_eq!(reporter.finish().await, 7);
        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.last().map(String::as_str), Some("You can check back here later."));
    }
}
