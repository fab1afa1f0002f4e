//! Actor-based concurrency for the registry
//!
//! The registry is single-writer: one Tokio task owns it and drains a
//! bounded mailbox one command at a time, so async callers never interleave
//! a read-check-write sequence (two reservations on the same train cannot
//! both see the old capacity).
//!
//! ```text
//!   RegistryHandle (Clone) ──┐
//!   RegistryHandle (Clone) ──┼── mpsc::channel (bounded) ──► RegistryActor
//!   RegistryHandle (Clone) ──┘                                   │
//!                                  oneshot reply ◄───────────────┘
//! ```

use crate::{
    error::{Error, Result},
    registry::Registry,
    repository::Entity,
    types::{Cargo, Order, OrderRequest, Train, WayBill},
    waybill::Movement,
};
use tokio::sync::{mpsc, oneshot};

type Job = Box<dyn FnOnce(&Registry) + Send>;

/// Message sent to the registry actor
pub enum RegistryMessage {
    /// Run a command against the registry
    Execute(Job),

    /// Shutdown actor
    Shutdown,
}

/// Actor that owns the registry
pub struct RegistryActor {
    registry: Registry,
    mailbox: mpsc::Receiver<RegistryMessage>,
}

impl RegistryActor {
    /// Create new actor
    pub fn new(registry: Registry, mailbox: mpsc::Receiver<RegistryMessage>) -> Self {
        Self { registry, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let mut handled = 0u64;

        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                RegistryMessage::Execute(job) => {
                    job(&self.registry);
                    handled += 1;
                }
                RegistryMessage::Shutdown => break,
            }
        }

        tracing::info!(commands = handled, "Registry actor stopped");
    }
}

/// Handle for sending commands to the actor
#[derive(Clone)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
}

impl RegistryHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<RegistryMessage>) -> Self {
        Self { sender }
    }

    /// Run `command` on the actor and wait for its result
    pub async fn execute<T, F>(&self, command: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Registry) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |registry| {
            let _ = tx.send(command(registry));
        });

        self.sender
            .send(RegistryMessage::Execute(job))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Load a record
    pub async fn get<E: Entity>(&self, id: impl Into<String>) -> Result<E> {
        let id = id.into();
        self.execute(move |registry| registry.get::<E>(&id)).await
    }

    /// Reserve capacity on a train
    pub async fn reserve_capacity(
        &self,
        train_id: impl Into<String>,
        requested: u32,
    ) -> Result<Train> {
        let train_id = train_id.into();
        self.execute(move |registry| registry.reserve_capacity(&train_id, requested))
            .await
    }

    /// Place an order
    pub async fn create_order(&self, request: OrderRequest) -> Result<Order> {
        self.execute(move |registry| registry.create_order(request)).await
    }

    /// Record the inspection verdict on an order
    pub async fn update_order(
        &self,
        id: u32,
        approved: bool,
        note: impl Into<String>,
    ) -> Result<Order> {
        let note = note.into();
        self.execute(move |registry| registry.update_order(id, approved, note))
            .await
    }

    /// Derive a train's cargo manifest
    pub async fn create_cargo(&self, train_id: impl Into<String>) -> Result<Cargo> {
        let train_id = train_id.into();
        self.execute(move |registry| registry.create_cargo(&train_id)).await
    }

    /// Create a train's manifest and waybill
    pub async fn create_waybill(&self, train_id: impl Into<String>) -> Result<WayBill> {
        let train_id = train_id.into();
        self.execute(move |registry| registry.create_waybill(&train_id)).await
    }

    /// Record a position report
    pub async fn update_waybill(
        &self,
        train_id: impl Into<String>,
        movement: Movement,
    ) -> Result<WayBill> {
        let train_id = train_id.into();
        self.execute(move |registry| registry.update_waybill(&train_id, movement))
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(RegistryMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the registry actor with the configured mailbox size
pub fn spawn_registry_actor(registry: Registry) -> RegistryHandle {
    let capacity = registry.config().mailbox_capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let actor = RegistryActor::new(registry, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    RegistryHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageBackend};

    fn registry() -> Registry {
        let config = Config {
            storage: StorageBackend::Memory,
            mailbox_capacity: 8,
            ..Config::default()
        };
        Registry::open(config).unwrap()
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let handle = spawn_registry_actor(registry());
        handle.shutdown().await.unwrap();

        let err = handle
            .execute(|registry| registry.list_all::<Train>())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Concurrency(_)));
    }

    #[tokio::test]
    async fn test_actor_executes_commands() {
        let handle = spawn_registry_actor(registry());

        handle
            .execute(|registry| registry.create_train("G20210120007", 10))
            .await
            .unwrap();
        let train = handle.reserve_capacity("G20210120007", 4).await.unwrap();
        assert_eq!(train.remaining_capacity, 6);

        let stored: Train = handle.get("G20210120007").await.unwrap();
        assert_eq!(stored.remaining_capacity, 6);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_over_allocate() {
        let handle = spawn_registry_actor(registry());
        handle
            .execute(|registry| registry.create_train("G20210120007", 50))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..40 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle.reserve_capacity("G20210120007", 3).await
            }));
        }

        let mut successes = 0u32;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => successes += 1,
                Err(Error::InsufficientCapacity { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let train: Train = handle.get("G20210120007").await.unwrap();
        assert_eq!(successes, 16);
        assert_eq!(train.remaining_capacity, 50 - successes * 3);

        handle.shutdown().await.unwrap();
    }
}
