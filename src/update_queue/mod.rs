//! UpdateQueue - serialized camera overlay writes
//!
//! ## Responsibilities
//!
//! - Strict FIFO execution of overlay writes, one in flight at a time
//! - Minimum spacing between consecutive operations (the firmware drops or
//!   corrupts rapid successive writes)
//! - Failure isolation: a failed write is logged and dropped, the queue
//!   moves on to the next entry
//!
//! Enqueuing is the only way any component mutates camera-side overlay state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::camera_client::CameraClient;
use crate::translator::OverlayCommand;

/// Default spacing between consecutive camera writes
pub const DEFAULT_MIN_SPACING: Duration = Duration::from_millis(300);

#[derive(Debug)]
enum QueueOp {
    Update { overlay_id: String, text: String },
    Disable { overlay_id: String },
}

impl QueueOp {
    fn overlay_id(&self) -> &str {
        match self {
            Self::Update { overlay_id, .. } | Self::Disable { overlay_id } => overlay_id,
        }
    }
}

/// Handle to the queue worker. Clones share the same worker; the worker
/// drains and exits once every handle is dropped.
#[derive(Clone)]
pub struct UpdateQueue {
    tx: mpsc::UnboundedSender<QueueOp>,
}

impl UpdateQueue {
    /// Spawn the worker that owns the camera client
    pub fn start(client: Arc<dyn CameraClient>, spacing: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueueOp>();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                let result = match &op {
                    QueueOp::Update { overlay_id, text } => {
                        client.set_overlay_text(overlay_id, text).await
                    }
                    QueueOp::Disable { overlay_id } => {
                        client.disable_overlay_text(overlay_id).await
                    }
                };

                if let Err(e) = result {
                    tracing::warn!(
                        overlay_id = %op.overlay_id(),
                        error = %e,
                        "Camera write failed, dropping operation"
                    );
                }

                tokio::time::sleep(spacing).await;
            }
            tracing::debug!("Update queue drained, worker exiting");
        });

        Self { tx }
    }

    /// Enqueue a text write. Blank text is routed to a disable because the
    /// camera does not reliably render blank overlays.
    pub fn enqueue_update(&self, overlay_id: &str, text: &str) {
        match OverlayCommand::from_text(text) {
            OverlayCommand::Update(text) => self.send(QueueOp::Update {
                overlay_id: overlay_id.to_string(),
                text,
            }),
            OverlayCommand::Disable => self.enqueue_disable(overlay_id),
        }
    }

    /// Enqueue a disable
    pub fn enqueue_disable(&self, overlay_id: &str) {
        self.send(QueueOp::Disable {
            overlay_id: overlay_id.to_string(),
        });
    }

    fn send(&self, op: QueueOp) {
        if self.tx.send(op).is_err() {
            tracing::debug!("Update queue worker gone, operation discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    use crate::error::{Error, Result};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Set(String, String),
        Disable(String),
    }

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(Call, Instant)>>,
        fail_overlay: Option<String>,
    }

    impl RecordingClient {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
        }

        fn instants(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }

        fn record(&self, call: Call) -> Result<()> {
            let overlay_id = match &call {
                Call::Set(id, _) | Call::Disable(id) => id.clone(),
            };
            self.calls.lock().unwrap().push((call, Instant::now()));
            if self.fail_overlay.as_deref() == Some(overlay_id.as_str()) {
                return Err(Error::Camera("simulated failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CameraClient for RecordingClient {
        async fn fetch_overlay_config(&self) -> Result<HashMap<String, String>> {
            Ok(HashMap::new())
        }

        async fn set_overlay_text(&self, overlay_id: &str, text: &str) -> Result<()> {
            self.record(Call::Set(overlay_id.to_string(), text.to_string()))
        }

        async fn disable_overlay_text(&self, overlay_id: &str) -> Result<()> {
            self.record(Call::Disable(overlay_id.to_string()))
        }
    }

    async fn wait_for_calls(client: &RecordingClient, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while client.calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue did not drain in time");
    }

    #[tokio::test]
    async fn operations_execute_in_submission_order() {
        let client = Arc::new(RecordingClient::default());
        let queue = UpdateQueue::start(client.clone(), Duration::from_millis(1));

        queue.enqueue_update("0", "first");
        queue.enqueue_disable("1");
        queue.enqueue_update("2", "third");

        wait_for_calls(&client, 3).await;
        assert_eq!(
            client.calls(),
            vec![
                Call::Set("0".to_string(), "first".to_string()),
                Call::Disable("1".to_string()),
                Call::Set("2".to_string(), "third".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn consecutive_calls_are_spaced() {
        let client = Arc::new(RecordingClient::default());
        let spacing = Duration::from_millis(50);
        let queue = UpdateQueue::start(client.clone(), spacing);

        queue.enqueue_update("0", "a");
        queue.enqueue_update("0", "b");
        queue.enqueue_update("0", "c");

        wait_for_calls(&client, 3).await;
        let instants = client.instants();
        for pair in instants.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= spacing);
        }
    }

    #[tokio::test]
    async fn failed_write_does_not_block_the_queue() {
        let client = Arc::new(RecordingClient {
            fail_overlay: Some("1".to_string()),
            ..Default::default()
        });
        let queue = UpdateQueue::start(client.clone(), Duration::from_millis(1));

        queue.enqueue_update("1", "will fail");
        queue.enqueue_update("2", "still runs");

        wait_for_calls(&client, 2).await;
        assert_eq!(
            client.calls()[1],
            Call::Set("2".to_string(), "still runs".to_string())
        );
    }

    #[tokio::test]
    async fn blank_text_is_written_as_disable() {
        let client = Arc::new(RecordingClient::default());
        let queue = UpdateQueue::start(client.clone(), Duration::from_millis(1));

        queue.enqueue_update("2", "   ");

        wait_for_calls(&client, 1).await;
        assert_eq!(client.calls(), vec![Call::Disable("2".to_string())]);
    }
}
