//! Expected-behaviour models the scenarios compare engine results against.
//!
//! Every check returns `Ok(())` when the observation agrees with the model
//! and `OracleMismatch` otherwise. Checks run after the corresponding trace
//! record is emitted, so a mismatch never hides what was observed.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use kvs_engine::SnapshotId;
use kvs_error::{ErrorKind, KvsError, Result};
use kvs_types::{KvsValue, key_violation, value_violation};

use crate::trace::{render_path, render_unit};

/// `snapshot_count` after `flushes` flushes under ceiling `max_count`.
#[must_use]
pub fn expected_snapshot_count(flushes: usize, max_count: usize) -> usize {
    flushes.min(max_count)
}

/// What the model knows about one stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured<T> {
    /// Existed before the model started observing.
    Unknown,
    /// The store was empty.
    Empty,
    Value(T),
}

/// FIFO rotation model: id 1 is the newest history entry, `count` the
/// oldest retained one.
#[derive(Debug, Clone)]
pub struct RotationModel<T> {
    max_count: usize,
    live: Captured<T>,
    history: VecDeque<Captured<T>>,
    flushes: usize,
}

impl<T: Clone + PartialEq + fmt::Debug> RotationModel<T> {
    /// Model of a store that has never been flushed.
    #[must_use]
    pub fn new(max_count: usize) -> Self {
        Self {
            max_count,
            live: Captured::Empty,
            history: VecDeque::new(),
            flushes: 0,
        }
    }

    /// Model of a store already holding `observed_count` snapshots of
    /// unknown content.
    #[must_use]
    pub fn resume(max_count: usize, observed_count: usize) -> Self {
        if observed_count == 0 {
            return Self::new(max_count);
        }
        let retained = observed_count.min(max_count);
        Self {
            max_count,
            live: Captured::Unknown,
            history: std::iter::repeat_n(Captured::Unknown, retained).collect(),
            flushes: 0,
        }
    }

    /// A flush whose new live state holds `value`.
    pub fn record_flush(&mut self, value: T) {
        let previous = std::mem::replace(&mut self.live, Captured::Value(value));
        self.history.push_front(previous);
        self.history.truncate(self.max_count);
        self.flushes += 1;
    }

    #[must_use]
    pub fn expected_count(&self) -> usize {
        self.history.len()
    }

    /// Whether `restore(id)` must succeed.
    #[must_use]
    pub fn restore_allowed(&self, id: SnapshotId) -> bool {
        id != SnapshotId::LIVE && id.get() <= self.expected_count()
    }

    /// Whether path lookups for `id` must resolve. `None` when the model
    /// cannot tell.
    ///
    /// Ids `1..=count` always resolve. Id 0 is stricter than a plain
    /// `[0, snapshot_count]` window: the live artifact exists only after a
    /// flush has written it, so before the first flush (count 0) the lookup
    /// must report `Err(FileNotFound)` rather than a path.
    #[must_use]
    pub fn path_resolves(&self, id: SnapshotId) -> Option<bool> {
        if id != SnapshotId::LIVE {
            return Some(id.get() <= self.expected_count());
        }
        match self.live {
            Captured::Value(_) | Captured::Unknown => Some(true),
            // A ceiling of 0 keeps no history, so an empty chain says nothing
            // about earlier flushes.
            Captured::Empty if self.max_count == 0 => None,
            Captured::Empty => Some(false),
        }
    }

    /// Content the model expects snapshot `id` to hold.
    #[must_use]
    pub fn captured(&self, id: SnapshotId) -> &Captured<T> {
        if id == SnapshotId::LIVE {
            return &self.live;
        }
        self.history
            .get(id.get() - 1)
            .unwrap_or(&Captured::Unknown)
    }

    pub fn check_count(&self, observed: usize) -> Result<()> {
        let expected = self.expected_count();
        if observed != expected {
            return Err(KvsError::mismatch(
                format!("snapshot_count after {} flush(es)", self.flushes),
                expected,
                observed,
            ));
        }
        Ok(())
    }

    pub fn check_restore(&self, id: SnapshotId, observed: &Result<()>) -> Result<()> {
        let allowed = self.restore_allowed(id);
        let agrees = match observed {
            Ok(()) => allowed,
            Err(err) => !allowed && err.kind() == ErrorKind::InvalidSnapshotId,
        };
        if !agrees {
            let expected = if allowed {
                "Ok(())"
            } else {
                "Err(InvalidSnapshotId)"
            };
            return Err(KvsError::mismatch(
                format!("restore({id})"),
                expected,
                render_unit(observed),
            ));
        }
        Ok(())
    }

    /// `observed` is `None` when the tracked key is absent after restore.
    pub fn check_restored(&self, id: SnapshotId, observed: Option<&T>) -> Result<()> {
        let agrees = match self.captured(id) {
            Captured::Unknown => true,
            Captured::Empty => observed.is_none(),
            Captured::Value(expected) => observed == Some(expected),
        };
        if !agrees {
            return Err(KvsError::mismatch(
                format!("value after restore({id})"),
                self.captured(id),
                observed,
            ));
        }
        Ok(())
    }

    pub fn check_path(
        &self,
        lookup: &str,
        id: SnapshotId,
        observed: &Result<PathBuf>,
    ) -> Result<()> {
        let Some(resolves) = self.path_resolves(id) else {
            return Ok(());
        };
        let agrees = match observed {
            Ok(_) => resolves,
            Err(err) => !resolves && err.kind() == ErrorKind::FileNotFound,
        };
        if !agrees {
            let expected = if resolves {
                "Ok(<path>)"
            } else {
                "Err(FileNotFound)"
            };
            return Err(KvsError::mismatch(
                format!("{lookup}({id})"),
                expected,
                render_path(observed),
            ));
        }
        Ok(())
    }
}

/// Error kind `set(key, value)` must fail with, or `None` if it must succeed.
/// Key rules are checked before value rules.
#[must_use]
pub fn expected_set_rejection(key: &str, value: &KvsValue) -> Option<ErrorKind> {
    if key_violation(key).is_some() {
        Some(ErrorKind::KeyRejected)
    } else if value_violation(value).is_some() {
        Some(ErrorKind::ValueRejected)
    } else {
        None
    }
}

/// Compare a `set` outcome with the validation rules. An unexpected failure
/// of an acceptable write is left to the caller to propagate as-is.
pub fn check_set(key: &str, value: &KvsValue, observed: &Result<()>) -> Result<()> {
    let expected = expected_set_rejection(key, value);
    let observed_kind = observed.as_ref().err().map(KvsError::kind);
    match (expected, observed_kind) {
        (None, _) => Ok(()),
        (Some(want), Some(got)) if want == got => Ok(()),
        (Some(want), _) => Err(KvsError::mismatch(
            format!("set({key:?})"),
            format!("Err({want})"),
            render_unit(observed),
        )),
    }
}

/// Structural equality, numeric subtype included.
pub fn check_value(check: &str, expected: &KvsValue, observed: &KvsValue) -> Result<()> {
    if expected != observed {
        return Err(KvsError::mismatch(check, expected, observed));
    }
    Ok(())
}

pub fn check_flag(check: &str, expected: bool, observed: bool) -> Result<()> {
    if expected != observed {
        return Err(KvsError::mismatch(check, expected, observed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn trajectory_reaches_and_holds_ceiling() {
        let mut model = RotationModel::new(3);
        let mut seen = Vec::new();
        for i in 0..4_i64 {
            model.record_flush(i);
            seen.push(model.expected_count());
        }
        assert_eq!(seen, vec![1, 2, 3, 3]);
        assert_eq!(model.captured(SnapshotId(1)), &Captured::Value(2));
        assert_eq!(model.captured(SnapshotId(3)), &Captured::Value(0));
    }

    #[test]
    fn first_history_entry_is_empty_store() {
        let mut model = RotationModel::new(3);
        model.record_flush(7_i64);
        assert_eq!(model.captured(SnapshotId(1)), &Captured::Empty);
        assert!(model.check_restored(SnapshotId(1), None).is_ok());
        assert!(model.check_restored(SnapshotId(1), Some(&7)).is_err());
    }

    #[test]
    fn restore_window() {
        let mut model = RotationModel::new(3);
        model.record_flush(0_i64);
        model.record_flush(1);
        assert!(!model.restore_allowed(SnapshotId(0)));
        assert!(model.restore_allowed(SnapshotId(1)));
        assert!(model.restore_allowed(SnapshotId(2)));
        assert!(!model.restore_allowed(SnapshotId(3)));

        let rejected = Err(KvsError::InvalidSnapshotId { id: 0 });
        assert!(model.check_restore(SnapshotId(0), &rejected).is_ok());
        assert!(model.check_restore(SnapshotId(0), &Ok(())).is_err());
        assert!(model.check_restore(SnapshotId(2), &Ok(())).is_ok());
        let wrong_kind = Err(KvsError::operation("boom"));
        assert!(model.check_restore(SnapshotId(5), &wrong_kind).is_err());
    }

    #[test]
    fn path_expectations() {
        let mut model = RotationModel::<i64>::new(3);
        assert_eq!(model.path_resolves(SnapshotId(0)), Some(false));
        model.record_flush(0);
        assert_eq!(model.path_resolves(SnapshotId(0)), Some(true));
        assert_eq!(model.path_resolves(SnapshotId(1)), Some(true));
        assert_eq!(model.path_resolves(SnapshotId(2)), Some(false));

        let missing = Err(KvsError::FileNotFound {
            path: PathBuf::from("kvs_1_2.json"),
        });
        assert!(model.check_path("kvs_filename", SnapshotId(2), &missing).is_ok());
        let err = model
            .check_path("kvs_filename", SnapshotId(1), &missing)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OracleMismatch);
    }

    #[test]
    fn zero_ceiling_leaves_live_path_open() {
        let model = RotationModel::<i64>::new(0);
        assert_eq!(model.path_resolves(SnapshotId(0)), None);
        assert_eq!(model.path_resolves(SnapshotId(1)), Some(false));
    }

    #[test]
    fn resume_keeps_prior_history_unknown() {
        let mut model = RotationModel::resume(3, 2);
        assert_eq!(model.expected_count(), 2);
        assert_eq!(model.path_resolves(SnapshotId(0)), Some(true));
        model.record_flush(9_i64);
        assert_eq!(model.expected_count(), 3);
        assert_eq!(model.captured(SnapshotId(1)), &Captured::Unknown);
        assert!(model.check_restored(SnapshotId(1), Some(&42)).is_ok());
    }

    #[test]
    fn count_mismatch_names_the_step() {
        let mut model = RotationModel::new(3);
        model.record_flush(0_i64);
        let err = model.check_count(0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "snapshot_count after 1 flush(es): expected 1, observed 0"
        );
    }

    #[test]
    fn set_expectations() {
        let ok = KvsValue::Null;
        assert_eq!(expected_set_rejection("with-dash", &ok), None);
        assert_eq!(
            expected_set_rejection("has space", &ok),
            Some(ErrorKind::KeyRejected)
        );
        let big = KvsValue::String("y".repeat(1025));
        assert_eq!(
            expected_set_rejection("str_1025", &big),
            Some(ErrorKind::ValueRejected)
        );
        assert_eq!(
            expected_set_rejection("has space", &big),
            Some(ErrorKind::KeyRejected)
        );
    }

    #[test]
    fn set_outcome_checks() {
        let value = KvsValue::Null;
        assert!(check_set("fine", &value, &Ok(())).is_ok());
        let accepted_bad = check_set("has$pecial", &value, &Ok(())).unwrap_err();
        assert_eq!(accepted_bad.kind(), ErrorKind::OracleMismatch);
        let rejected = Err(KvsError::KeyRejected {
            key: "has$pecial".to_owned(),
        });
        assert!(check_set("has$pecial", &value, &rejected).is_ok());
        // An acceptable write failing is the caller's error to report.
        assert!(check_set("fine", &value, &Err(KvsError::operation("disk full"))).is_ok());
    }

    #[test]
    fn value_checks_keep_numeric_subtype() {
        assert!(check_value("rt", &KvsValue::I32(5), &KvsValue::I32(5)).is_ok());
        assert!(check_value("rt", &KvsValue::I32(5), &KvsValue::I64(5)).is_err());
        assert!(check_flag("has_default", false, true).is_err());
    }

    proptest! {
        #[test]
        fn model_count_is_min_of_flushes_and_ceiling(max in 0_usize..8, flushes in 0_usize..20) {
            let mut model = RotationModel::new(max);
            for k in 1..=flushes {
                model.record_flush(k);
                prop_assert_eq!(model.expected_count(), expected_snapshot_count(k, max));
            }
        }

        #[test]
        fn newest_history_entry_is_previous_flush(max in 1_usize..8, flushes in 2_usize..20) {
            let mut model = RotationModel::new(max);
            for k in 1..=flushes {
                model.record_flush(k);
            }
            prop_assert_eq!(model.captured(SnapshotId(1)), &Captured::Value(flushes - 1));
        }
    }
}
