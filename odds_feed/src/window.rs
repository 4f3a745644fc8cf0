use std::collections::VecDeque;
use std::sync::Arc;

use odds_types::FeedMessage;
use parking_lot::Mutex;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::handler::FeedHandler;

/// Control surface the heartbeat monitor uses to drive the window
pub trait RecoveryControl: Send + Sync {
    fn open_recovery_window(&self);

    /// Replays everything buffered and closes the window, returning the number of messages replayed
    fn close_recovery_window(&self) -> usize;
}

#[derive(Default)]
struct WindowState {
    open: bool,
    epoch: u64,
    queue: VecDeque<FeedMessage>,
}

/// FIFO buffer for live messages received while connectivity is being restored.
///
/// While open, every business message is queued instead of forwarded. Closing
/// drains the queue to the handler in arrival order. The open flag is only cleared
/// under the same lock that observed an empty queue, so a message arriving during
/// the flush is always buffered and replayed after those before it.
pub struct RecoveryWindow {
    state: Mutex<WindowState>,
    handler: Arc<dyn FeedHandler>,
}

impl RecoveryWindow {
    pub fn new(handler: Arc<dyn FeedHandler>) -> Self {
        Self { state: Mutex::new(WindowState::default()), handler }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn buffered(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Start buffering. Entries left over from an earlier window are discarded.
    pub fn open(&self) {
        let mut state = self.state.lock();
        let stale = state.queue.len();
        state.queue.clear();
        state.open = true;
        state.epoch = state.epoch.wrapping_add(1);
        drop(state);

        if stale > 0 {
            warn!(stale, "Discarded stale messages when opening recovery window");
        }
        info!("Recovery window opened");
    }

    /// Queue the message if the window is open, otherwise hand it back to the caller
    pub fn offer(&self, message: FeedMessage) -> Option<FeedMessage> {
        let mut state = self.state.lock();
        if !state.open {
            return Some(message);
        }

        debug!(message_type = %message.message_type, buffered = state.queue.len() + 1, "Buffered message during recovery");
        state.queue.push_back(message);
        None
    }

    /// Replay buffered messages in arrival order, then close.
    ///
    /// Handler errors are logged per message and do not stop the replay.
    pub fn close(&self) -> usize {
        let epoch = {
            let state = self.state.lock();
            if !state.open {
                return 0;
            }
            state.epoch
        };

        let mut replayed = 0;
        loop {
            let batch: Vec<FeedMessage> = {
                let mut state = self.state.lock();
                if state.epoch != epoch {
                    debug!(replayed, "Recovery window reopened during replay");
                    return replayed;
                }
                if state.queue.is_empty() {
                    state.open = false;
                    break;
                }
                state.queue.drain(..).collect()
            };

            for message in batch {
                match self.handler.on_message(&message) {
                    Ok(()) => replayed += 1,
                    Err(err) => {
                        error!(message_type = %message.message_type, routing_key = %message.routing_key, "Replay failed: {err:#}")
                    }
                }
            }
        }

        info!(replayed, "Recovery window closed");
        replayed
    }
}

impl RecoveryControl for RecoveryWindow {
    fn open_recovery_window(&self) {
        self.open();
    }

    fn close_recovery_window(&self) -> usize {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use anyhow::bail;
    use odds_types::MessageKind;
    use odds_types::Payload;
    use odds_types::RoutingMeta;
    use serde_json::json;

    use super::*;

    fn message(tag: &str) -> FeedMessage {
        FeedMessage {
            message_type: tag.to_string(),
            kind: MessageKind::Other,
            routing_key: format!("feed.{tag}"),
            meta: RoutingMeta::default(),
            payload: Payload::Raw(json!({ "type": tag })),
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        window: OnceLock<Arc<RecoveryWindow>>,
        inject: Mutex<Option<FeedMessage>>,
    }

    impl FeedHandler for Recorder {
        fn on_message(&self, message: &FeedMessage) -> anyhow::Result<()> {
            self.seen.lock().push(message.message_type.clone());
            // simulates a live delivery racing the replay
            if let (Some(window), Some(late)) = (self.window.get(), self.inject.lock().take()) {
                assert!(window.offer(late).is_none());
            }
            if self.fail_on == Some(message.message_type.as_str()) {
                bail!("sink rejected {}", message.message_type);
            }
            Ok(())
        }
    }

    #[test]
    fn test_closed_window_hands_message_back() {
        let window = RecoveryWindow::new(Arc::new(Recorder::default()));
        assert!(!window.is_open());
        assert!(window.offer(message("a")).is_some());
        assert_eq!(window.close(), 0);
    }

    #[test]
    fn test_replays_in_arrival_order() {
        let recorder = Arc::new(Recorder::default());
        let window = RecoveryWindow::new(recorder.clone());

        window.open();
        assert!(window.offer(message("first")).is_none());
        assert!(window.offer(message("second")).is_none());
        assert_eq!(window.buffered(), 2);
        assert!(recorder.seen.lock().is_empty());

        assert_eq!(window.close(), 2);
        assert!(!window.is_open());
        assert_eq!(*recorder.seen.lock(), vec!["first", "second"]);
        assert!(window.offer(message("third")).is_some());
    }

    #[test]
    fn test_message_arriving_during_replay_is_replayed_last() {
        let recorder = Arc::new(Recorder::default());
        let window = Arc::new(RecoveryWindow::new(recorder.clone()));
        let _ = recorder.window.set(window.clone());
        *recorder.inject.lock() = Some(message("late"));

        window.open();
        window.offer(message("first"));
        window.offer(message("second"));

        assert_eq!(window.close(), 3);
        assert_eq!(*recorder.seen.lock(), vec!["first", "second", "late"]);
        assert_eq!(window.buffered(), 0);
    }

    #[test]
    fn test_replay_failure_does_not_stop_flush() {
        let recorder = Arc::new(Recorder { fail_on: Some("bad"), ..Default::default() });
        let window = RecoveryWindow::new(recorder.clone());

        window.open();
        window.offer(message("ok-1"));
        window.offer(message("bad"));
        window.offer(message("ok-2"));

        assert_eq!(window.close(), 2);
        assert_eq!(*recorder.seen.lock(), vec!["ok-1", "bad", "ok-2"]);
    }

    #[test]
    fn test_reopen_discards_stale_entries() {
        let recorder = Arc::new(Recorder::default());
        let window = RecoveryWindow::new(recorder.clone());

        window.open();
        window.offer(message("stale"));
        window.open();
        assert_eq!(window.buffered(), 0);

        window.offer(message("fresh"));
        window.close();
        assert_eq!(*recorder.seen.lock(), vec!["fresh"]);
    }
}
