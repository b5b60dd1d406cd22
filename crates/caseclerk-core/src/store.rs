//! # Store Module
//!
//! A [`Collection`] is an ordered map from id to record plus the counter that
//! hands out the next id. Ids are never reused, even after a delete, so a
//! stale id held by a client can only ever miss.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::{
    CalendarEvent, CallLog, CallLogId, Case, CaseId, Document, DocumentId, EventId, User, UserId,
};

/// A record that lives in a [`Collection`].
pub trait Record: Clone {
    type Id: Copy + Ord + std::fmt::Debug + From<u64> + Into<u64> + std::fmt::Display;

    /// Singular name used in error messages and logs.
    const KIND: &'static str;

    fn id(&self) -> Self::Id;

    fn set_id(&mut self, id: Self::Id);
}

macro_rules! impl_record {
    ($ty:ty, $id:ty, $kind:literal) => {
        impl Record for $ty {
            type Id = $id;
            const KIND: &'static str = $kind;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn set_id(&mut self, id: Self::Id) {
                self.id = id;
            }
        }
    };
}

impl_record!(Case, CaseId, "case");
impl_record!(Document, DocumentId, "document");
impl_record!(CallLog, CallLogId, "call log");
impl_record!(CalendarEvent, EventId, "calendar event");
impl_record!(User, UserId, "user");

/// Ordered storage for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection<T: Record> {
    records: BTreeMap<T::Id, T>,
    next_id: u64,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a collection from persisted parts.
    ///
    /// The counter is raised past the largest stored id so a corrupted
    /// counter cannot hand out an id that is already taken.
    pub fn from_parts(records: Vec<T>, next_id: u64) -> Self {
        let max_id = records
            .iter()
            .map(|r| Into::<u64>::into(r.id()))
            .max()
            .unwrap_or(0);
        Self {
            records: records.into_iter().map(|r| (r.id(), r)).collect(),
            next_id: next_id.max(max_id.saturating_add(1)),
        }
    }

    /// Assigns the next id and stores the record. Returns a copy.
    pub fn insert(&mut self, mut record: T) -> T {
        let id = T::Id::from(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        record.set_id(id);
        self.records.insert(id, record.clone());
        record
    }

    pub fn get(&self, id: T::Id) -> CoreResult<&T> {
        self.records
            .get(&id)
            .ok_or_else(|| CoreError::not_found(T::KIND, id))
    }

    pub fn get_mut(&mut self, id: T::Id) -> CoreResult<&mut T> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(T::KIND, id))
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.records.contains_key(&id)
    }

    pub fn remove(&mut self, id: T::Id) -> CoreResult<T> {
        self.records
            .remove(&id)
            .ok_or_else(|| CoreError::not_found(T::KIND, id))
    }

    /// Records in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.values_mut()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> Vec<T::Id> {
        let mut removed = Vec::new();
        self.records.retain(|id, record| {
            let kept = keep(record);
            if !kept {
                removed.push(*id);
            }
            kept
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewCase;
    use chrono::Utc;

    fn case(number: &str) -> Case {
        let form = NewCase {
            case_number: number.to_string(),
            title: "Title".to_string(),
            client_name: "Client".to_string(),
            ..NewCase::default()
        };
        Case::from_form(form, None, Utc::now())
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut cases = Collection::<Case>::new();
        let a = cases.insert(case("A"));
        let b = cases.insert(case("B"));
        assert_eq!((a.id, b.id), (CaseId(1), CaseId(2)));

        cases.remove(b.id).unwrap();
        let c = cases.insert(case("C"));
        assert_eq!(c.id, CaseId(3));
        assert_eq!(cases.len(), 2);
    }

    #[test]
    fn missing_record_is_not_found() {
        let cases = Collection::<Case>::new();
        assert_eq!(
            cases.get(CaseId(9)).unwrap_err(),
            CoreError::not_found("case", 9)
        );
    }

    #[test]
    fn from_parts_repairs_a_stale_counter() {
        let mut record = case("A");
        record.id = CaseId(10);
        let mut cases = Collection::from_parts(vec![record], 2);
        assert_eq!(cases.next_id(), 11);
        assert_eq!(cases.insert(case("B")).id, CaseId(11));
    }

    #[test]
    fn retain_reports_removed_ids() {
        let mut cases = Collection::<Case>::new();
        cases.insert(case("A"));
        cases.insert(case("B"));
        let removed = cases.retain(|c| c.case_number == "A");
        assert_eq!(removed, vec![CaseId(2)]);
    }
}
