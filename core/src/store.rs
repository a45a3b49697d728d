use std::collections::HashSet;

use uuid::Uuid;

use crate::models::{NewRecord, Record};

/// In-memory record collection, newest insertions first.
///
/// Mutations here never touch storage; `SugarService` persists the whole
/// collection after each one.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Mint an id and prepend the record.
    pub fn add(&mut self, new: NewRecord) -> Record {
        let record = new.with_id(self.fresh_id());
        self.records.insert(0, record.clone());
        record
    }

    /// Replace the record with the same id. Returns false (and changes
    /// nothing) when no record matches.
    pub fn update(&mut self, record: Record) -> bool {
        match self.records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    /// Remove every record whose id is listed. Returns how many went.
    pub fn delete_many<S: AsRef<str>>(&mut self, ids: &[S]) -> usize {
        let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let before = self.records.len();
        self.records.retain(|r| !wanted.contains(r.id.as_str()));
        before - self.records.len()
    }

    pub fn replace_all(&mut self, records: Vec<Record>) {
        self.records = records;
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}
