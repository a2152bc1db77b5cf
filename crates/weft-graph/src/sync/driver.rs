use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sync::reconciler::{FetchedContent, FileSyncReconciler};
use crate::workflow::Workflow;

/// Runs a [`FileSyncReconciler`] against a shared workflow.
///
/// Subscriptions are refreshed on every tick. Change events start fetches
/// on spawned tasks; their results come back to this loop, which is the only
/// place the workflow is mutated by file sync. The workflow lock is never
/// held across a fetch.
pub struct SyncDriver {
    workflow: Arc<Mutex<Workflow>>,
    reconciler: FileSyncReconciler,
    refresh_interval: Duration,
    cancel: CancellationToken,
}

impl SyncDriver {
    pub fn new(
        workflow: Arc<Mutex<Workflow>>,
        reconciler: FileSyncReconciler,
        refresh_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            workflow,
            reconciler,
            refresh_interval,
            cancel,
        }
    }

    /// Run the sync loop. Blocks until cancelled, then tears down every
    /// subscription.
    pub async fn run(mut self) {
        let Some(mut changes) = self.reconciler.take_receiver() else {
            warn!("File sync receiver already taken; driver not started");
            return;
        };
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FetchedContent>();
        let mut tick = tokio::time::interval(self.refresh_interval);
        let cancel = self.cancel.clone();

        info!(interval_ms = self.refresh_interval.as_millis() as u64, "File sync started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("File sync shutting down");
                    break;
                }
                _ = tick.tick() => {
                    let workflow = self.workflow.lock().await;
                    self.reconciler.refresh(&workflow);
                }
                Some(event) = changes.recv() => {
                    let pending = {
                        let workflow = self.workflow.lock().await;
                        self.reconciler.begin(&workflow, &event)
                    };
                    for fetch in pending {
                        let done = done_tx.clone();
                        tokio::spawn(async move {
                            let _ = done.send(fetch.fetch().await);
                        });
                    }
                }
                Some(fetched) = done_rx.recv() => {
                    let node_id = fetched.ticket.node_id.clone();
                    let mut workflow = self.workflow.lock().await;
                    let outcome = self.reconciler.complete(&mut workflow, fetched);
                    debug!(node_id = %node_id, ?outcome, "File sync completed");
                }
            }
        }

        self.reconciler.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::WorkflowDocument;
    use crate::node::Node;
    use serde_json::json;
    use std::path::PathBuf;
    use weft_core::config::EditorConfig;
    use weft_core::event::EventBus;
    use weft_core::schema::BuiltinSchemas;
    use weft_core::types::{ChangeType, EditorEvent, TabId};
    use weft_test_utils::MockFileService;

    #[tokio::test]
    async fn test_driver_applies_change_and_stops() {
        let files = MockFileService::new().with_file("/proj/prompts/sys.md", "You are helpful.");
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();

        let mut workflow = Workflow::open(
            EditorConfig::default(),
            Arc::new(BuiltinSchemas::with_builtins()),
            events,
            vec![(
                TabId::from("T1"),
                WorkflowDocument {
                    nodes: vec![Node::new("p", "prompt")
                        .with_field("file", json!("prompts/sys.md"))
                        .expanded()],
                    ..Default::default()
                },
            )],
        );
        workflow
            .set_project_path(&TabId::from("T1"), Some(PathBuf::from("/proj")))
            .unwrap();
        let workflow = Arc::new(Mutex::new(workflow));

        let cancel = CancellationToken::new();
        let driver = SyncDriver::new(
            workflow.clone(),
            FileSyncReconciler::new(Arc::new(files.clone())),
            Duration::from_millis(10),
            cancel.clone(),
        );
        let handle = tokio::spawn(driver.run());

        // Wait for the first refresh to subscribe.
        while files.subscriber_count("/proj/prompts/sys.md") == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        files.emit("/proj/prompts/sys.md", ChangeType::Modified);

        let synced = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(EditorEvent::FileSynced { node_id, .. }) = rx.recv().await {
                    break node_id;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(synced.as_str(), "p");

        {
            let workflow = workflow.lock().await;
            let node = workflow.active_tab().unwrap().store.node("p").unwrap();
            assert_eq!(node.field_str("template"), Some("You are helpful."));
        }

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(files.subscriber_count("/proj/prompts/sys.md"), 0);
    }
}
