//! Scripted in-memory transports for exercising the Connection Manager without a backend.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::message::StatelessRequest;
use crate::core::GuardError;

use super::{ChannelConnector, ChannelEvent, ChannelWriter, StatelessTransport};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Connector whose open attempts succeed or fail according to a script.
///
/// When the script runs out every further attempt succeeds.
#[derive(Default)]
pub struct MockConnector {
    script: Mutex<VecDeque<bool>>,
    open_attempts: AtomicUsize,
    fail_writes: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<String>>>,
    live: Mutex<Option<(u64, mpsc::UnboundedSender<ChannelEvent>)>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector that refuses the first `failures` attempts.
    pub fn failing(failures: usize) -> Self {
        let connector = Self::new();
        lock(&connector.script).extend(std::iter::repeat(false).take(failures));
        connector
    }

    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Text written to the channel so far, oldest first.
    pub fn written(&self) -> Vec<String> {
        lock(&self.written).clone()
    }

    /// Deliver `text` as if the backend had sent it on the most recent channel.
    pub fn push_inbound(&self, text: impl Into<String>) -> bool {
        match lock(&self.live).as_ref() {
            Some((epoch, events)) => events
                .send(ChannelEvent::Inbound {
                    epoch: *epoch,
                    text: text.into(),
                })
                .is_ok(),
            None => false,
        }
    }

    /// Close the most recent channel from the backend side.
    pub fn drop_channel(&self, reason: impl Into<String>) -> bool {
        match lock(&self.live).take() {
            Some((epoch, events)) => events
                .send(ChannelEvent::Closed {
                    epoch,
                    reason: reason.into(),
                })
                .is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl ChannelConnector for MockConnector {
    async fn open(
        &self,
        epoch: u64,
        events: mpsc::UnboundedSender<ChannelEvent>,
    ) -> Result<Box<dyn ChannelWriter>, GuardError> {
        self.open_attempts.fetch_add(1, Ordering::SeqCst);
        let accept = lock(&self.script).pop_front().unwrap_or(true);
        if !accept {
            return Err(GuardError::Transport("connection refused".to_string()));
        }

        *lock(&self.live) = Some((epoch, events));
        Ok(Box::new(MockWriter {
            fail_writes: Arc::clone(&self.fail_writes),
            written: Arc::clone(&self.written),
        }))
    }
}

struct MockWriter {
    fail_writes: Arc<AtomicBool>,
    written: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChannelWriter for MockWriter {
    async fn write(&mut self, text: String) -> Result<(), GuardError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GuardError::Transport("write on broken channel".to_string()));
        }
        lock(&self.written).push(text);
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Stateless transport answering from a queue of scores (`Ok`) or HTTP statuses (`Err`).
///
/// An empty queue answers with score `0.0`.
#[derive(Default)]
pub struct MockStateless {
    responses: Mutex<VecDeque<Result<f64, u16>>>,
    requests: Mutex<Vec<StatelessRequest>>,
}

impl MockStateless {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, score: f64) {
        lock(&self.responses).push_back(Ok(score));
    }

    pub fn fail_with_status(&self, status: u16) {
        lock(&self.responses).push_back(Err(status));
    }

    pub fn requests(&self) -> Vec<StatelessRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl StatelessTransport for MockStateless {
    async fn submit(&self, request: &StatelessRequest) -> Result<f64, GuardError> {
        lock(&self.requests).push(request.clone());
        match lock(&self.responses).pop_front().unwrap_or(Ok(0.0)) {
            Ok(score) => Ok(score),
            Err(status) => Err(GuardError::RequestFailure(format!(
                "backend returned {}",
                status
            ))),
        }
    }
}
