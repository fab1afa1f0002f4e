//! Manifest aggregator
//!
//! A [`Cargo`] is never authored directly. It is derived from the orders
//! indexed under its train:
//!
//! 1. Scan `train~order` with the train id as prefix
//! 2. Load each order; skip those not approved
//! 3. Concatenate the approved orders' items in scan order
//!
//! The result is a snapshot. Approving or rejecting an order later does not
//! change an existing cargo; only inspection results are appended afterwards.

use crate::{
    error::{Error, Result},
    index::IndexManager,
    key::{EntityKind, IndexKind},
    repository::Repository,
    types::{Cargo, Order},
};

/// Builds cargo manifests from approved orders
#[derive(Clone)]
pub struct ManifestAggregator {
    index: IndexManager,
    orders: Repository<Order>,
}

impl ManifestAggregator {
    /// Create an aggregator over the index manager and order repository
    pub fn new(index: IndexManager, orders: Repository<Order>) -> Self {
        Self { index, orders }
    }

    /// Derive the manifest of `train_id` from its currently approved orders
    pub fn aggregate(&self, train_id: &str) -> Result<Cargo> {
        let mut cargo = Cargo {
            train_id: train_id.to_string(),
            ..Default::default()
        };
        let mut skipped = 0usize;

        for entry in self.index.scan(IndexKind::TrainOrder, &[train_id])? {
            let entry = entry?;
            // The entry value is the order id; the trailing key part says the same
            let order_id = String::from_utf8(entry.value)
                .ok()
                .filter(|id| !id.is_empty())
                .or_else(|| entry.parts.last().cloned())
                .unwrap_or_default();

            let order = self.orders.find(&order_id)?.ok_or_else(|| Error::NotFound {
                kind: EntityKind::Order,
                id: order_id.clone(),
            })?;

            if !order.approved {
                skipped += 1;
                continue;
            }

            cargo.total_items += order.items.len() as u32;
            cargo.items.extend(order.items);
            cargo.order_ids.push(order.id);
        }

        tracing::debug!(
            train_id = %train_id,
            orders = cargo.order_ids.len(),
            skipped,
            items = cargo.total_items,
            "Manifest aggregated"
        );

        Ok(cargo)
    }

    /// Append one station inspection to a manifest
    pub fn record_inspection(cargo: &mut Cargo, passed: bool, note: impl Into<String>) {
        cargo.inspection_results.push(passed);
        cargo.inspection_notes.push(note.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        index::IndexEntry,
        memory::MemoryStorage,
        repository::Entity,
        storage::{Storage, WriteSet},
        types::CargoItem,
    };
    use std::sync::Arc;

    fn items(n: usize, tag: &str) -> Vec<CargoItem> {
        (0..n)
            .map(|i| CargoItem {
                cargo_type: "bulk".to_string(),
                quantity: 1,
                name: format!("{tag}-{i}"),
            })
            .collect()
    }

    fn setup(orders: &[(u32, &str, usize, bool)]) -> ManifestAggregator {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let index = IndexManager::new(storage.clone());
        let repo = Repository::<Order>::new(storage.clone());

        let mut writes = WriteSet::new();
        for (id, train, count, approved) in orders {
            let order = Order {
                id: *id,
                train_id: train.to_string(),
                items: items(*count, &id.to_string()),
                approved: *approved,
                ..Default::default()
            };
            repo.create(&mut writes, &order).unwrap();
            for entry in order.index_entries() {
                index.add_relation(&mut writes, &entry).unwrap();
            }
        }
        storage.commit(writes).unwrap();

        ManifestAggregator::new(index, repo)
    }

    #[test]
    fn test_only_approved_orders_are_aggregated() {
        let aggregator = setup(&[(1, "G1", 2, true), (2, "G1", 5, false), (3, "G1", 3, true)]);

        let cargo = aggregator.aggregate("G1").unwrap();
        assert_eq!(cargo.total_items, 5);
        assert_eq!(cargo.items.len(), 5);
        assert_eq!(cargo.order_ids, vec![1, 3]);
        assert_eq!(cargo.items[0].name, "1-0");
        assert_eq!(cargo.items[4].name, "3-2");
    }

    #[test]
    fn test_other_trains_are_ignored() {
        let aggregator = setup(&[(1, "G1", 2, true), (2, "G10", 4, true)]);

        let cargo = aggregator.aggregate("G1").unwrap();
        assert_eq!(cargo.order_ids, vec![1]);
        assert!(aggregator.aggregate("G2").unwrap().items.is_empty());
    }

    #[test]
    fn test_dangling_index_entry_is_not_found() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let index = IndexManager::new(storage.clone());
        let mut writes = WriteSet::new();
        index
            .add_relation(
                &mut writes,
                &IndexEntry::pair(IndexKind::TrainOrder, "G1", "9").with_value("9"),
            )
            .unwrap();
        storage.commit(writes).unwrap();

        let aggregator = ManifestAggregator::new(index, Repository::new(storage));
        assert!(matches!(
            aggregator.aggregate("G1"),
            Err(Error::NotFound { kind: EntityKind::Order, .. })
        ));
    }

    #[test]
    fn test_record_inspection_appends_pairs() {
        let mut cargo = Cargo::default();
        ManifestAggregator::record_inspection(&mut cargo, true, "sealed");
        ManifestAggregator::record_inspection(&mut cargo, false, "leak");
        assert_eq!(cargo.inspection_results, vec![true, false]);
        assert_eq!(cargo.inspection_notes, vec!["sealed", "leak"]);
    }
}
