//! Version-control operations that announce their effects on the bus.

use std::sync::Arc;

use thiserror::Error;
use tokio::{sync::Mutex, task::JoinError};
use tracing::{info, instrument};

use crate::events::{Event, EventBus, PublishError};

use super::vcs::{VcsError, VersionControl};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Vcs(#[from] VcsError),
    /// The working copy changed but a listener failed to catch up.
    #[error("working copy updated but reload failed: {0}")]
    Publish(#[from] PublishError),
    #[error("event delivery was interrupted: {0}")]
    Interrupted(#[from] JoinError),
}

/// Drives the working copy and publishes the matching event after each
/// successful mutation.
///
/// Operations are serialized: a second checkout waits for the first one,
/// including its event delivery, to finish.
pub struct ContentController {
    vcs: Arc<dyn VersionControl>,
    bus: Arc<EventBus>,
    serial: Mutex<()>,
}

impl ContentController {
    pub fn new(vcs: Arc<dyn VersionControl>, bus: Arc<EventBus>) -> Self {
        Self {
            vcs,
            bus,
            serial: Mutex::new(()),
        }
    }

    /// Check out `commit` and publish [`Event::Checkout`].
    #[instrument(skip(self), fields(op = "checkout"))]
    pub async fn checkout(&self, commit: &str) -> Result<(), ControllerError> {
        let _guard = self.serial.lock().await;
        self.checkout_locked(commit).await
    }

    /// Pull upstream changes, then check out `commit`.
    #[instrument(skip(self), fields(op = "update"))]
    pub async fn update(&self, commit: &str) -> Result<(), ControllerError> {
        let _guard = self.serial.lock().await;
        self.vcs.pull().await?;
        self.checkout_locked(commit).await
    }

    /// Push local commits and publish [`Event::Push`].
    #[instrument(skip(self), fields(op = "push"))]
    pub async fn push(&self) -> Result<(), ControllerError> {
        let _guard = self.serial.lock().await;
        self.push_locked().await
    }

    /// Commit all working-copy changes, then push.
    #[instrument(skip(self), fields(op = "save"))]
    pub async fn save(&self, message: &str) -> Result<(), ControllerError> {
        let _guard = self.serial.lock().await;
        self.vcs.commit(message).await?;
        self.push_locked().await
    }

    async fn checkout_locked(&self, commit: &str) -> Result<(), ControllerError> {
        self.vcs.checkout(commit).await?;
        info!(target = "verso::vcs", commit, "Working copy checked out");
        self.publish(Event::Checkout {
            commit: commit.to_string(),
        })
        .await
    }

    async fn push_locked(&self) -> Result<(), ControllerError> {
        self.vcs.push().await?;
        self.publish(Event::Push).await
    }

    // Listeners reload from disk, so delivery runs on the blocking pool.
    async fn publish(&self, event: Event) -> Result<(), ControllerError> {
        let bus = Arc::clone(&self.bus);
        tokio::task::spawn_blocking(move || bus.publish(&event)).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::events::{Listener, ListenerError};

    #[derive(Default)]
    struct ScriptedVcs {
        calls: StdMutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl ScriptedVcs {
        fn failing(op: &'static str) -> Self {
            Self {
                fail_on: Some(op),
                ..Self::default()
            }
        }

        fn record(&self, call: String, op: &str) -> Result<(), VcsError> {
            self.calls.lock().expect("calls").push(call.clone());
            if self.fail_on == Some(op) {
                return Err(VcsError::Exit {
                    command: call,
                    exit_code: Some(1),
                    stderr: "boom".to_string(),
                });
            }
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }
    }

    #[async_trait]
    impl VersionControl for ScriptedVcs {
        async fn pull(&self) -> Result<(), VcsError> {
            self.record("pull".to_string(), "pull")
        }

        async fn checkout(&self, revision: &str) -> Result<(), VcsError> {
            self.record(format!("checkout {revision}"), "checkout")
        }

        async fn commit(&self, message: &str) -> Result<(), VcsError> {
            self.record(format!("commit {message}"), "commit")
        }

        async fn push(&self) -> Result<(), VcsError> {
            self.record("push".to_string(), "push")
        }
    }

    #[derive(Default)]
    struct EventLog {
        events: StdMutex<Vec<Event>>,
    }

    impl Listener for EventLog {
        fn name(&self) -> &'static str {
            "event_log"
        }

        fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
            self.events.lock().expect("events").push(event.clone());
            Ok(())
        }
    }

    struct Failing;

    impl Listener for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn on_event(&self, _event: &Event) -> Result<(), ListenerError> {
            Err("database unreadable".into())
        }
    }

    fn controller(vcs: Arc<ScriptedVcs>, listeners: Vec<Arc<dyn Listener>>) -> ContentController {
        let mut bus = EventBus::new();
        for listener in listeners {
            bus.subscribe(listener);
        }
        ContentController::new(vcs, Arc::new(bus))
    }

    #[tokio::test]
    async fn update_pulls_checks_out_and_publishes() {
        let vcs = Arc::new(ScriptedVcs::default());
        let log = Arc::new(EventLog::default());
        let controller = controller(Arc::clone(&vcs), vec![log.clone() as Arc<dyn Listener>]);

        controller.update("abc123").await.expect("update");

        assert_eq!(vcs.calls(), vec!["pull", "checkout abc123"]);
        assert_eq!(
            *log.events.lock().expect("events"),
            vec![Event::Checkout {
                commit: "abc123".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn failed_pull_aborts_without_event() {
        let vcs = Arc::new(ScriptedVcs::failing("pull"));
        let log = Arc::new(EventLog::default());
        let controller = controller(Arc::clone(&vcs), vec![log.clone() as Arc<dyn Listener>]);

        let err = controller.update("abc123").await.expect_err("pull fails");

        assert!(matches!(err, ControllerError::Vcs(VcsError::Exit { .. })));
        assert_eq!(vcs.calls(), vec!["pull"]);
        assert!(log.events.lock().expect("events").is_empty());
    }

    #[tokio::test]
    async fn save_commits_pushes_and_publishes_push() {
        let vcs = Arc::new(ScriptedVcs::default());
        let log = Arc::new(EventLog::default());
        let controller = controller(Arc::clone(&vcs), vec![log.clone() as Arc<dyn Listener>]);

        controller.save("edit index").await.expect("save");

        assert_eq!(vcs.calls(), vec!["commit edit index", "push"]);
        assert_eq!(*log.events.lock().expect("events"), vec![Event::Push]);
    }

    #[tokio::test]
    async fn failed_commit_skips_push() {
        let vcs = Arc::new(ScriptedVcs::failing("commit"));
        let controller = controller(Arc::clone(&vcs), Vec::new());

        assert!(controller.save("edit").await.is_err());
        assert_eq!(vcs.calls(), vec!["commit edit"]);
    }

    #[tokio::test]
    async fn listener_failure_surfaces_after_checkout() {
        let vcs = Arc::new(ScriptedVcs::default());
        let log = Arc::new(EventLog::default());
        let listeners: Vec<Arc<dyn Listener>> = vec![Arc::new(Failing), log.clone()];
        let controller = controller(Arc::clone(&vcs), listeners);

        let err = controller.checkout("abc123").await.expect_err("listener fails");

        match err {
            ControllerError::Publish(publish) => {
                assert_eq!(publish.listener, "failing");
                assert_eq!(publish.delivered, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(vcs.calls(), vec!["checkout abc123"]);
        assert!(log.events.lock().expect("events").is_empty());
    }
}
