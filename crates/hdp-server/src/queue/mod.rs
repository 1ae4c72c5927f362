//! SQS notification consumer
//!
//! A background polling loop that turns storage-change notifications into
//! ingest jobs. The loop long-polls the queue, dispatches one job per
//! notification record, and deletes a message only after every record in it
//! was dispatched; anything left undeleted comes back via the queue's own
//! visibility timeout. A stop flag is checked once per poll cycle, so
//! shutdown waits at most one long-poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use apalis::prelude::Storage;
use apalis_postgres::PostgresStorage;
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::QueueConfig;
use crate::error::{AppError, AppResult};
use crate::jobs::IngestFileJob;

pub mod notification;

pub use notification::parse_notification;

#[derive(Clone)]
pub struct QueueConsumer {
    client: Client,
    config: QueueConfig,
    ingest_jobs: PostgresStorage<IngestFileJob>,
    running: Arc<AtomicBool>,
}

impl QueueConsumer {
    pub fn new(
        client: Client,
        config: QueueConfig,
        ingest_jobs: PostgresStorage<IngestFileJob>,
    ) -> Self {
        Self {
            client,
            config,
            ingest_jobs,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawn the polling loop and return immediately.
    ///
    /// Poll errors are logged and followed by a short fixed sleep; a single
    /// bad message or unreachable queue never exits the loop.
    pub fn start(&self) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let consumer = self.clone();
        tokio::spawn(async move {
            info!(queue_url = %consumer.config.queue_url, "Queue consumer started");

            while consumer.running.load(Ordering::SeqCst) {
                if let Err(e) = consumer.poll_once().await {
                    error!(error = %e, "Queue poll failed");
                    sleep(Duration::from_secs(consumer.config.error_backoff_secs)).await;
                }
            }

            info!("Queue consumer stopped");
        })
    }

    /// Ask the polling loop to exit after its current cycle.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One long-poll cycle: receive, dispatch, delete.
    async fn poll_once(&self) -> AppResult<()> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .wait_time_seconds(self.config.wait_time_secs)
            .max_number_of_messages(self.config.max_messages)
            .send()
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        let messages = response.messages.unwrap_or_default();
        if messages.is_empty() {
            return Ok(());
        }

        debug!(count = messages.len(), "Received queue messages");

        for message in messages {
            match self.dispatch_message(&message).await {
                Ok(dispatched) => {
                    self.delete_message(&message).await?;
                    debug!(dispatched, "Message handled and deleted");
                },
                Err(e) => {
                    // Leave the message for redelivery; log and move on.
                    warn!(
                        error = %e,
                        message_id = message.message_id.as_deref().unwrap_or("unknown"),
                        "Failed to handle queue message"
                    );
                },
            }
        }

        Ok(())
    }

    /// Dispatch one ingest job per notification record in the message.
    async fn dispatch_message(&self, message: &Message) -> AppResult<usize> {
        let body = message
            .body
            .as_deref()
            .ok_or_else(|| AppError::Queue("message has no body".to_string()))?;

        let targets = parse_notification(body).map_err(AppError::Queue)?;

        let mut ingest_jobs = self.ingest_jobs.clone();
        for (bucket, key) in &targets {
            info!(bucket, key, "Dispatching ingest job");
            ingest_jobs
                .push(IngestFileJob::new(bucket, key))
                .await
                .map_err(|e| AppError::Queue(format!("failed to dispatch ingest job: {}", e)))?;
        }

        Ok(targets.len())
    }

    async fn delete_message(&self, message: &Message) -> AppResult<()> {
        let receipt_handle = message
            .receipt_handle
            .as_deref()
            .ok_or_else(|| AppError::Queue("message has no receipt handle".to_string()))?;

        self.client
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::Queue(e.to_string()))?;

        Ok(())
    }
}
