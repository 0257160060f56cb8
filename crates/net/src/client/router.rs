//! Client message router
//!
//! One background task owns the read half of the host connection. `StartGame` is consumed
//! on arrival and published as the shared seed; everything else lands in a FIFO queue that
//! callers search by message type. Taking one type never disturbs the relative order of
//! the others.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::AsyncRead;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::framing::read_frame;
use crate::log_context::SessionLog;
use crate::protocol::{Message, MessageKind};

#[derive(Debug)]
pub struct MessageRouter {
    queue: Mutex<VecDeque<Message>>,
    arrived: Notify,
    connected: AtomicBool,
    seed_tx: watch::Sender<Option<u32>>,
}

impl MessageRouter {
    pub fn new() -> Arc<Self> {
        let (seed_tx, _) = watch::channel(None);
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
            connected: AtomicBool::new(true),
            seed_tx,
        })
    }

    /// Start the receive task on `reader`.
    pub fn spawn<R>(self: &Arc<Self>, mut reader: R, log: SessionLog) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(msg)) => router.dispatch(msg, &log),
                    Ok(None) => {
                        log.debug(format_args!("host closed the connection"));
                        break;
                    }
                    Err(e) if e.is_recoverable() => {
                        log.warn(format_args!("dropping undecodable frame: {}", e));
                    }
                    Err(e) => {
                        log.debug(format_args!("receive loop ended: {}", e));
                        break;
                    }
                }
            }
            router.mark_disconnected();
        })
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Route one decoded message.
    pub fn dispatch(&self, msg: Message, log: &SessionLog) {
        if let Message::StartGame { seed } = msg {
            let first = self.seed_tx.send_if_modified(|current| {
                if current.is_none() {
                    *current = Some(seed);
                    true
                } else {
                    false
                }
            });
            if first {
                log.info(format_args!("game starting with seed {}", seed));
            } else {
                log.debug(format_args!("ignoring repeated StartGame"));
            }
            return;
        }

        self.lock().push_back(msg);
        self.arrived.notify_waiters();
    }

    pub fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.arrived.notify_waiters();
        // Wake seed waiters too.
        self.seed_tx.send_modify(|_| {});
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn seed(&self) -> Option<u32> {
        *self.seed_tx.borrow()
    }

    pub fn subscribe_seed(&self) -> watch::Receiver<Option<u32>> {
        self.seed_tx.subscribe()
    }

    /// Forget the seed so a fresh `StartGame` (after a rejoin) is accepted.
    pub fn clear_seed(&self) {
        self.seed_tx.send_replace(None);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return the oldest queued message of `kind`, without blocking.
    pub fn try_take(&self, kind: MessageKind) -> Option<Message> {
        let mut queue = self.lock();
        let index = queue.iter().position(|m| m.kind() == kind)?;
        queue.remove(index)
    }

    /// Oldest queued message of any of `kinds`.
    pub fn try_take_any(&self, kinds: &[MessageKind]) -> Option<Message> {
        let mut queue = self.lock();
        let index = queue.iter().position(|m| kinds.contains(&m.kind()))?;
        queue.remove(index)
    }

    /// Remove every queued message of `kind` and return the newest.
    pub fn drain_latest(&self, kind: MessageKind) -> Option<Message> {
        let mut queue = self.lock();
        let mut latest = None;
        queue.retain(|m| {
            if m.kind() == kind {
                latest = Some(m.clone());
                false
            } else {
                true
            }
        });
        latest
    }

    /// Wait up to `timeout` for a message of `kind`.
    ///
    /// Returns `None` on timeout, or once the connection is gone and nothing matches.
    pub async fn take_timeout(&self, kind: MessageKind, timeout: Duration) -> Option<Message> {
        self.take_any(&[kind], timeout).await
    }

    /// Wait up to `timeout` for a message of any of `kinds`.
    pub async fn take_any(&self, kinds: &[MessageKind], timeout: Duration) -> Option<Message> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register before scanning so an arrival between the scan and the wait is seen.
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(msg) = self.try_take_any(kinds) {
                return Some(msg);
            }
            if !self.is_connected() {
                return None;
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return self.try_take_any(kinds);
            }
        }
    }
}
