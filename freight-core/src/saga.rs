//! Forward-only compensation for multi-step operations
//!
//! Steps that each commit on their own cannot be rolled back by the ledger.
//! A [`Saga`] records a compensating action after every forward step that
//! succeeds; on failure the recorded actions run newest first. If one of them
//! fails the saga stops and reports `CompensationFailed`, carrying both the
//! forward failure and the compensation failure, since the ledger is then
//! left holding records that should not exist.

use crate::error::{Error, Result};
use uuid::Uuid;

type Compensation<'a> = Box<dyn FnOnce() -> Result<()> + 'a>;

/// Ordered list of compensating actions for one multi-step operation
pub struct Saga<'a> {
    id: Uuid,
    name: &'static str,
    compensations: Vec<(String, Compensation<'a>)>,
}

impl<'a> Saga<'a> {
    /// Start a saga; `name` appears in logs
    pub fn new(name: &'static str) -> Self {
        Self {
            id: Uuid::now_v7(),
            name,
            compensations: Vec::new(),
        }
    }

    /// Correlation id used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of recorded compensations
    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Record how to undo a step that has just succeeded
    pub fn record<F>(&mut self, label: impl Into<String>, compensation: F)
    where
        F: FnOnce() -> Result<()> + 'a,
    {
        let label = label.into();
        tracing::debug!(
            saga = self.name,
            saga_id = %self.id,
            step = %label,
            "Compensation recorded"
        );
        self.compensations.push((label, Box::new(compensation)));
    }

    /// Finish successfully, dropping every compensation
    pub fn complete(self) {
        tracing::debug!(saga = self.name, saga_id = %self.id, "Saga completed");
    }

    /// Undo recorded steps newest first and return the error to surface
    ///
    /// Returns `failure` unchanged when every compensation succeeds.
    pub fn abort(self, failure: Error) -> Error {
        tracing::warn!(
            saga = self.name,
            saga_id = %self.id,
            steps = self.compensations.len(),
            error = %failure,
            "Saga aborted, compensating"
        );

        for (label, compensation) in self.compensations.into_iter().rev() {
            if let Err(err) = compensation() {
                tracing::error!(
                    saga = self.name,
                    saga_id = %self.id,
                    step = %label,
                    error = %err,
                    "Compensation failed; ledger left inconsistent"
                );
                return Error::CompensationFailed {
                    step: label,
                    source: Box::new(failure),
                    compensation: Box::new(err),
                };
            }
            tracing::info!(saga = self.name, saga_id = %self.id, step = %label, "Compensated");
        }

        failure
    }

    /// Run `step`; on error abort the saga, on success hand back the value
    /// together with the saga so more steps can be chained
    pub fn run<T, F>(self, step: F) -> std::result::Result<(T, Self), Error>
    where
        F: FnOnce() -> Result<T>,
    {
        match step() {
            Ok(value) => Ok((value, self)),
            Err(err) => Err(self.abort(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_compensations_run_newest_first() {
        let log = RefCell::new(Vec::new());
        let mut saga = Saga::new("test");
        saga.record("first", || {
            log.borrow_mut().push("first");
            Ok(())
        });
        saga.record("second", || {
            log.borrow_mut().push("second");
            Ok(())
        });

        let err = saga.abort(Error::InvalidRecord("boom".to_string()));
        assert!(matches!(err, Error::InvalidRecord(_)));
        assert_eq!(*log.borrow(), vec!["second", "first"]);
    }

    #[test]
    fn test_complete_runs_nothing() {
        let ran = RefCell::new(false);
        let mut saga = Saga::new("test");
        saga.record("undo", || {
            *ran.borrow_mut() = true;
            Ok(())
        });
        assert_eq!(saga.pending(), 1);
        saga.complete();
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_failed_compensation_stops_and_reports_both() {
        let ran_first = RefCell::new(false);
        let mut saga = Saga::new("test");
        saga.record("first", || {
            *ran_first.borrow_mut() = true;
            Ok(())
        });
        saga.record("second", || Err(Error::Storage("unavailable".to_string())));

        let err = saga.abort(Error::InvalidRecord("boom".to_string()));
        match err {
            Error::CompensationFailed { step, source, compensation } => {
                assert_eq!(step, "second");
                assert!(matches!(*source, Error::InvalidRecord(_)));
                assert!(matches!(*compensation, Error::Storage(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!*ran_first.borrow());
    }

    #[test]
    fn test_run_chains_and_aborts() {
        let undone = RefCell::new(false);
        let mut saga = Saga::new("test");
        saga.record("undo", || {
            *undone.borrow_mut() = true;
            Ok(())
        });

        let (value, saga) = saga.run(|| Ok(5)).unwrap();
        assert_eq!(value, 5);

        let err = saga
            .run(|| -> Result<()> { Err(Error::InvalidRecord("late".to_string())) })
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidRecord(_)));
        assert!(*undone.borrow());
    }
}
