//! Capacity accountant
//!
//! A train's `remaining_capacity` only ever goes down. A reservation reads
//! the committed counter, rejects the request if it does not fit and
//! otherwise stages the decremented train into the caller's write set, so the
//! decrement commits together with whatever the reservation was for.

use crate::{
    error::{Error, Result},
    repository::Repository,
    storage::WriteSet,
    types::Train,
};

/// Reserves units of train capacity
#[derive(Clone)]
pub struct CapacityAccountant {
    trains: Repository<Train>,
}

impl CapacityAccountant {
    /// Create an accountant over the train repository
    pub fn new(trains: Repository<Train>) -> Self {
        Self { trains }
    }

    /// Stage a reservation of `requested` units on `train_id`
    ///
    /// Returns the train as it will be after commit.
    pub fn reserve(&self, writes: &mut WriteSet, train_id: &str, requested: u32) -> Result<Train> {
        let mut train = self.trains.get(train_id)?;

        if train.remaining_capacity < requested {
            tracing::debug!(
                train_id = %train_id,
                remaining = train.remaining_capacity,
                requested,
                "Reservation rejected"
            );
            return Err(Error::InsufficientCapacity {
                train_id: train_id.to_string(),
                remaining: train.remaining_capacity,
                requested,
            });
        }

        train.remaining_capacity -= requested;
        self.trains.stage_put(writes, &train)?;

        Ok(train)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::MemoryStorage, storage::Storage};
    use std::sync::Arc;

    fn setup(capacity: u32) -> (CapacityAccountant, Repository<Train>, Arc<dyn Storage>) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let trains = Repository::<Train>::new(storage.clone());
        let mut writes = WriteSet::new();
        trains
            .create(
                &mut writes,
                &Train {
                    id: "G1".to_string(),
                    remaining_capacity: capacity,
                },
            )
            .unwrap();
        storage.commit(writes).unwrap();
        (CapacityAccountant::new(trains.clone()), trains, storage)
    }

    #[test]
    fn test_reserve_decrements() {
        let (accountant, trains, storage) = setup(10);
        let mut writes = WriteSet::new();
        let after = accountant.reserve(&mut writes, "G1", 7).unwrap();
        assert_eq!(after.remaining_capacity, 3);

        storage.commit(writes).unwrap();
        assert_eq!(trains.get("G1").unwrap().remaining_capacity, 3);
    }

    #[test]
    fn test_over_allocation_rejected_without_writes() {
        let (accountant, trains, _storage) = setup(3);
        let mut writes = WriteSet::new();
        let err = accountant.reserve(&mut writes, "G1", 5).unwrap_err();

        match err {
            Error::InsufficientCapacity { remaining, requested, .. } => {
                assert_eq!(remaining, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(writes.is_empty());
        assert_eq!(trains.get("G1").unwrap().remaining_capacity, 3);
    }

    #[test]
    fn test_exact_fit_and_zero_request() {
        let (accountant, _trains, _storage) = setup(4);
        let mut writes = WriteSet::new();
        assert_eq!(accountant.reserve(&mut writes, "G1", 4).unwrap().remaining_capacity, 0);
        assert_eq!(accountant.reserve(&mut writes, "G1", 0).unwrap().remaining_capacity, 4);
    }

    #[test]
    fn test_unknown_train() {
        let (accountant, _trains, _storage) = setup(4);
        let mut writes = WriteSet::new();
        assert!(matches!(
            accountant.reserve(&mut writes, "G9", 1),
            Err(Error::NotFound { .. })
        ));
    }
}
