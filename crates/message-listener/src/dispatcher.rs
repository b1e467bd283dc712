//! Per-chat FIFO workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bot_core::{InboundEvent, ReplySender};
use checklist_engine::ChecklistEngine;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

struct Worker {
    tx: mpsc::Sender<InboundEvent>,
    handle: JoinHandle<()>,
}

/// Routes events to one worker task per chat.
///
/// A worker handles its chat's events one at a time, in the order they were
/// dispatched, and exits after `idle` without events. Its queue is bounded;
/// dispatching to a full queue waits for room.
pub struct Dispatcher<S: ReplySender + 'static> {
    engine: Arc<ChecklistEngine<S>>,
    workers: HashMap<i64, Worker>,
    queue: usize,
    idle: Duration,
}

impl<S: ReplySender + 'static> Dispatcher<S> {
    pub fn new(engine: Arc<ChecklistEngine<S>>, queue: usize, idle: Duration) -> Self {
        Self {
            engine,
            workers: HashMap::new(),
            queue: queue.max(1),
            idle,
        }
    }

    /// Number of live workers.
    pub fn active_chats(&self) -> usize {
        self.workers.values().filter(|w| !w.handle.is_finished()).count()
    }

    /// Queue an event behind earlier events of the same chat.
    pub async fn dispatch(&mut self, event: InboundEvent) {
        let chat_id = event.chat_id;
        self.workers.retain(|_, w| !w.handle.is_finished());

        let event = match self.workers.remove(&chat_id) {
            Some(worker) => match worker.tx.send(event).await {
                Ok(()) => {
                    self.workers.insert(chat_id, worker);
                    return;
                }
                // Worker is retiring; let it finish what it drained first.
                Err(mpsc::error::SendError(event)) => {
                    if let Err(e) = worker.handle.await {
                        warn!(chat_id, "Worker panicked: {}", e);
                    }
                    event
                }
            },
            None => event,
        };

        let worker = self.spawn(chat_id);
        if worker.tx.send(event).await.is_err() {
            warn!(chat_id, "Worker exited before its first event");
        }
        self.workers.insert(chat_id, worker);
    }

    fn spawn(&self, chat_id: i64) -> Worker {
        let (tx, mut rx) = mpsc::channel::<InboundEvent>(self.queue);
        let engine = Arc::clone(&self.engine);
        let idle = self.idle;

        let handle = tokio::spawn(async move {
            debug!(chat_id, "Worker started");
            loop {
                match timeout(idle, rx.recv()).await {
                    Ok(Some(event)) => {
                        if let Err(e) = engine.process(&event).await {
                            warn!(chat_id, "Failed to deliver replies: {}", e);
                        }
                    }
                    Ok(None) => break,
                    Err(_) => {
                        // Refuse new events, then drain any that raced in.
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            if let Err(e) = engine.process(&event).await {
                                warn!(chat_id, "Failed to deliver replies: {}", e);
                            }
                        }
                        break;
                    }
                }
            }
            debug!(chat_id, "Worker stopped");
        });

        Worker { tx, handle }
    }

    /// Close every queue and wait for the queued events to be handled.
    pub async fn shutdown(self) {
        for (chat_id, worker) in self.workers {
            drop(worker.tx);
            if let Err(e) = worker.handle.await {
                warn!(chat_id, "Worker panicked: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bot_core::RecordingSender;
    use checklist_engine::{messages, ChecklistService, EngineConfig};
    use chrono::Utc;
    use database::Database;

    async fn engine() -> Arc<ChecklistEngine<RecordingSender>> {
        let db = Database::connect_in_memory().await.unwrap();
        Arc::new(ChecklistEngine::new(
            ChecklistService::new(db, EngineConfig::default()),
            RecordingSender::new(),
        ))
    }

    #[tokio::test]
    async fn test_events_of_a_chat_are_handled_in_order() {
        let engine = engine().await;
        let mut dispatcher = Dispatcher::new(Arc::clone(&engine), 4, Duration::from_secs(5));
        let now = Utc::now();

        dispatcher.dispatch(InboundEvent::text(1, "/help", now)).await;
        dispatcher.dispatch(InboundEvent::text(2, "hello", now)).await;
        dispatcher.dispatch(InboundEvent::text(1, "OP9999", now)).await;
        assert_eq!(dispatcher.active_chats(), 2);
        dispatcher.shutdown().await;

        let chat_one: Vec<_> = engine
            .sender()
            .sent()
            .await
            .into_iter()
            .filter(|r| r.chat_id() == 1)
            .map(|r| r.body().to_string())
            .collect();
        assert_eq!(
            chat_one,
            vec![messages::HELP_TEXT, messages::LOGIN_PROMPT, messages::LOGIN_REJECTED]
        );
    }

    #[tokio::test]
    async fn test_replacement_waits_for_retiring_worker() {
        let engine = engine().await;
        let mut dispatcher = Dispatcher::new(Arc::clone(&engine), 4, Duration::from_secs(5));
        let now = Utc::now();

        // A worker that has closed its queue but is still handling a drained event.
        let (tx, mut rx) = mpsc::channel::<InboundEvent>(1);
        rx.close();
        let draining = Arc::clone(&engine);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = draining.process(&InboundEvent::text(1, "/help", now)).await;
        });
        dispatcher.workers.insert(1, Worker { tx, handle });

        dispatcher.dispatch(InboundEvent::text(1, "OP9999", now)).await;
        dispatcher.shutdown().await;

        let chat_one: Vec<_> = engine
            .sender()
            .sent()
            .await
            .into_iter()
            .map(|r| r.body().to_string())
            .collect();
        assert_eq!(
            chat_one,
            vec![messages::HELP_TEXT, messages::LOGIN_PROMPT, messages::LOGIN_REJECTED]
        );
    }

    #[tokio::test]
    async fn test_idle_worker_is_replaced() {
        let engine = engine().await;
        let mut dispatcher = Dispatcher::new(Arc::clone(&engine), 1, Duration::from_millis(20));
        let now = Utc::now();

        dispatcher.dispatch(InboundEvent::text(1, "hello", now)).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(dispatcher.active_chats(), 0);

        dispatcher.dispatch(InboundEvent::text(1, "hello", now)).await;
        dispatcher.shutdown().await;
        assert_eq!(engine.sender().sent().await.len(), 2);
    }
}
