// ABOUTME: Idempotent "make sure the sandbox is up" operation
// ABOUTME: Serialises callers per resource name and treats a name collision on create as success

use crate::error::{LifecycleError, Result};
use crate::resource::{SandboxResource, SandboxState};
use crate::runtime::ContainerRuntime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsureOutcome {
    /// True only when this call created the resource
    pub created: bool,
}

/// Brings a sandbox to the running state before commands are sent to it.
///
/// State is re-queried from the runtime on every call. Within one process,
/// callers for the same name take turns; callers in other processes are
/// handled by accepting the runtime's "already exists" answer.
pub struct LifecycleManager {
    runtime: Arc<dyn ContainerRuntime>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    async fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Current state of the resource as reported by the runtime
    pub async fn state(&self, resource: &SandboxResource) -> Result<SandboxState> {
        self.runtime.state(&resource.name).await
    }

    /// Ensure the resource exists and is running.
    ///
    /// Absent resources are created, stopped ones are started in place,
    /// paused ones are unpaused and running ones are left alone. With `recreate`, any existing resource is
    /// removed first so the caller gets a clean filesystem.
    pub async fn ensure_ready(
        &self,
        resource: &SandboxResource,
        recreate: bool,
    ) -> Result<EnsureOutcome> {
        let lock = self.lock_for(&resource.name).await;
        let _guard = lock.lock().await;

        let mut state = self.runtime.state(&resource.name).await?;
        debug!(resource = %resource.name, %state, recreate, "Queried sandbox state");

        if recreate && state != SandboxState::Absent {
            info!(resource = %resource.name, "Recreating sandbox");
            self.runtime.remove(&resource.name).await?;
            state = SandboxState::Absent;
        }

        match state {
            SandboxState::Running => Ok(EnsureOutcome { created: false }),
            SandboxState::Stopped => {
                self.runtime.start(&resource.name).await?;
                Ok(EnsureOutcome { created: false })
            }
            SandboxState::Paused => {
                self.runtime.unpause(&resource.name).await?;
                Ok(EnsureOutcome { created: false })
            }
            SandboxState::Absent => match self.runtime.create_and_start(resource).await {
                Ok(()) => {
                    info!(resource = %resource.name, "Sandbox created");
                    Ok(EnsureOutcome { created: true })
                }
                Err(LifecycleError::AlreadyExists { .. }) => {
                    warn!(
                        resource = %resource.name,
                        "Sandbox was created concurrently by another caller"
                    );
                    self.adopt_existing(resource).await?;
                    Ok(EnsureOutcome { created: false })
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Someone else won the create race; make sure what they made is running
    async fn adopt_existing(&self, resource: &SandboxResource) -> Result<()> {
        match self.runtime.state(&resource.name).await? {
            SandboxState::Running => Ok(()),
            SandboxState::Stopped => self.runtime.start(&resource.name).await,
            SandboxState::Paused => self.runtime.unpause(&resource.name).await,
            SandboxState::Absent => Err(LifecycleError::AlreadyExists {
                resource: resource.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    mock! {
        Runtime {}

        #[async_trait]
        impl ContainerRuntime for Runtime {
            async fn state(&self, name: &str) -> Result<SandboxState>;
            async fn create_and_start(&self, resource: &SandboxResource) -> Result<()>;
            async fn start(&self, name: &str) -> Result<()>;
            async fn unpause(&self, name: &str) -> Result<()>;
            async fn remove(&self, name: &str) -> Result<()>;
        }
    }

    fn resource() -> SandboxResource {
        SandboxResource::new("sandbox", "sandbox-image")
    }

    #[tokio::test]
    async fn test_absent_then_present_creates_exactly_once() {
        let mut runtime = MockRuntime::new();
        let mut seq = Sequence::new();
        runtime
            .expect_state()
            .with(eq("sandbox"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SandboxState::Absent));
        runtime
            .expect_create_and_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime
            .expect_state()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SandboxState::Running));
        runtime.expect_start().never();
        runtime.expect_remove().never();

        let manager = LifecycleManager::new(Arc::new(runtime));

        let first = manager.ensure_ready(&resource(), false).await.unwrap();
        let second = manager.ensure_ready(&resource(), false).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
    }

    #[tokio::test]
    async fn test_stopped_resource_is_started_not_recreated() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_state()
            .returning(|_| Ok(SandboxState::Stopped));
        runtime
            .expect_start()
            .with(eq("sandbox"))
            .times(1)
            .returning(|_| Ok(()));
        runtime.expect_create_and_start().never();
        runtime.expect_remove().never();

        let manager = LifecycleManager::new(Arc::new(runtime));
        let outcome = manager.ensure_ready(&resource(), false).await.unwrap();

        assert!(!outcome.created);
    }

    #[tokio::test]
    async fn test_paused_resource_is_unpaused_not_started() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_state()
            .returning(|_| Ok(SandboxState::Paused));
        runtime
            .expect_unpause()
            .with(eq("sandbox"))
            .times(1)
            .returning(|_| Ok(()));
        runtime.expect_start().never();
        runtime.expect_create_and_start().never();
        runtime.expect_remove().never();

        let manager = LifecycleManager::new(Arc::new(runtime));
        let outcome = manager.ensure_ready(&resource(), false).await.unwrap();

        assert!(!outcome.created);
    }

    #[tokio::test]
    async fn test_recreate_of_paused_resource_removes_it() {
        let mut runtime = MockRuntime::new();
        let mut seq = Sequence::new();
        runtime
            .expect_state()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SandboxState::Paused));
        runtime
            .expect_remove()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime
            .expect_create_and_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime.expect_unpause().never();

        let manager = LifecycleManager::new(Arc::new(runtime));
        assert!(manager.ensure_ready(&resource(), true).await.unwrap().created);
    }

    #[tokio::test]
    async fn test_running_resource_is_left_alone() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_state()
            .returning(|_| Ok(SandboxState::Running));
        runtime.expect_start().never();
        runtime.expect_create_and_start().never();
        runtime.expect_remove().never();

        let manager = LifecycleManager::new(Arc::new(runtime));
        assert!(!manager.ensure_ready(&resource(), false).await.unwrap().created);
    }

    #[tokio::test]
    async fn test_recreate_removes_then_creates() {
        let mut runtime = MockRuntime::new();
        let mut seq = Sequence::new();
        runtime
            .expect_state()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SandboxState::Running));
        runtime
            .expect_remove()
            .with(eq("sandbox"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runtime
            .expect_create_and_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let manager = LifecycleManager::new(Arc::new(runtime));
        let outcome = manager.ensure_ready(&resource(), true).await.unwrap();

        assert!(outcome.created);
    }

    #[tokio::test]
    async fn test_recreate_of_absent_resource_skips_remove() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_state()
            .returning(|_| Ok(SandboxState::Absent));
        runtime.expect_remove().never();
        runtime
            .expect_create_and_start()
            .times(1)
            .returning(|_| Ok(()));

        let manager = LifecycleManager::new(Arc::new(runtime));
        assert!(manager.ensure_ready(&resource(), true).await.unwrap().created);
    }

    #[tokio::test]
    async fn test_already_exists_is_success_equivalent() {
        let mut runtime = MockRuntime::new();
        let mut seq = Sequence::new();
        runtime
            .expect_state()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SandboxState::Absent));
        runtime
            .expect_create_and_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|r| {
                Err(LifecycleError::AlreadyExists {
                    resource: r.name.clone(),
                })
            });
        runtime
            .expect_state()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(SandboxState::Stopped));
        runtime
            .expect_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let manager = LifecycleManager::new(Arc::new(runtime));
        let outcome = manager.ensure_ready(&resource(), false).await.unwrap();

        assert!(!outcome.created);
    }

    #[tokio::test]
    async fn test_create_failure_carries_stderr_and_is_not_retried() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_state()
            .times(1)
            .returning(|_| Ok(SandboxState::Absent));
        runtime.expect_create_and_start().times(1).returning(|r| {
            Err(LifecycleError::Runtime {
                operation: "create".to_string(),
                resource: r.name.clone(),
                stderr: "pull access denied for sandbox-image".to_string(),
            })
        });

        let manager = LifecycleManager::new(Arc::new(runtime));
        let err = manager.ensure_ready(&resource(), false).await.unwrap_err();

        assert_eq!(err.stderr(), Some("pull access denied for sandbox-image"));
    }

    #[tokio::test]
    async fn test_query_failure_is_reported() {
        let mut runtime = MockRuntime::new();
        runtime.expect_state().returning(|name| {
            Err(LifecycleError::Runtime {
                operation: "query".to_string(),
                resource: name.to_string(),
                stderr: "Cannot connect to the Docker daemon".to_string(),
            })
        });
        runtime.expect_create_and_start().never();

        let manager = LifecycleManager::new(Arc::new(runtime));
        let err = manager.ensure_ready(&resource(), false).await.unwrap_err();

        assert!(err.to_string().contains("Cannot connect"));
    }

    /// Runtime double with real state so concurrent callers see each other's work
    struct SlowRuntime {
        state: std::sync::Mutex<SandboxState>,
        creates: AtomicUsize,
    }

    #[async_trait]
    impl ContainerRuntime for SlowRuntime {
        async fn state(&self, _name: &str) -> Result<SandboxState> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(*self.state.lock().unwrap())
        }

        async fn create_and_start(&self, resource: &SandboxResource) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut state = self.state.lock().unwrap();
            if *state != SandboxState::Absent {
                return Err(LifecycleError::AlreadyExists {
                    resource: resource.name.clone(),
                });
            }
            self.creates.fetch_add(1, Ordering::SeqCst);
            *state = SandboxState::Running;
            Ok(())
        }

        async fn start(&self, _name: &str) -> Result<()> {
            *self.state.lock().unwrap() = SandboxState::Running;
            Ok(())
        }

        async fn unpause(&self, _name: &str) -> Result<()> {
            *self.state.lock().unwrap() = SandboxState::Running;
            Ok(())
        }

        async fn remove(&self, _name: &str) -> Result<()> {
            *self.state.lock().unwrap() = SandboxState::Absent;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_create_once() {
        let runtime = Arc::new(SlowRuntime {
            state: std::sync::Mutex::new(SandboxState::Absent),
            creates: AtomicUsize::new(0),
        });
        let manager = Arc::new(LifecycleManager::new(runtime.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.ensure_ready(&resource(), false).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(runtime.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_is_not_cached() {
        let runtime = Arc::new(SlowRuntime {
            state: std::sync::Mutex::new(SandboxState::Stopped),
            creates: AtomicUsize::new(0),
        });
        let manager = LifecycleManager::new(runtime.clone());

        assert_eq!(manager.state(&resource()).await.unwrap(), SandboxState::Stopped);
        *runtime.state.lock().unwrap() = SandboxState::Absent;
        assert_eq!(manager.state(&resource()).await.unwrap(), SandboxState::Absent);
    }
}
