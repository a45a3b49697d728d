use std::path::Path;

use anyhow::Result;
use chrono::TimeZone;
use tracing::{debug, info};

use crate::backup::{self, ImportError};
use crate::db::Database;
use crate::insight;
use crate::models::{Category, NewRecord, Overview, Preferences, Record, Theme, Unit};
use crate::store::RecordStore;
use crate::views;

/// Application state: the record collection, the two preferences, and the
/// storage they are mirrored to.
///
/// Loaded once on open. Every mutating call writes the affected slot back
/// before returning, and only touches memory once that write succeeded.
pub struct SugarService {
    db: Database,
    store: RecordStore,
    prefs: Preferences,
}

impl SugarService {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_db(Database::open(path)?)
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::from_db(Database::open_in_memory()?)
    }

    pub fn from_db(db: Database) -> Result<Self> {
        let store = RecordStore::new(db.load_records()?);
        let prefs = Preferences {
            theme: db.load_theme()?,
            default_unit: db.load_default_unit()?,
        };
        debug!(records = store.len(), theme = %prefs.theme, unit = %prefs.default_unit, "state loaded");
        Ok(Self { db, store, prefs })
    }

    /// Apply `change` to a copy of the collection, save the copy, then swap it in.
    fn commit<T>(&mut self, change: impl FnOnce(&mut RecordStore) -> T) -> Result<T> {
        let mut next = self.store.clone();
        let out = change(&mut next);
        self.db.save_records(next.records())?;
        self.store = next;
        Ok(out)
    }

    // --- Records ---

    #[must_use]
    pub fn records(&self) -> &[Record] {
        self.store.records()
    }

    #[must_use]
    pub fn get_record(&self, id: &str) -> Option<&Record> {
        self.store.get(id)
    }

    pub fn add_record(&mut self, new: NewRecord) -> Result<Record> {
        let record = self.commit(|store| store.add(new))?;
        debug!(id = %record.id, "record added");
        Ok(record)
    }

    /// Full-record replace keyed by id. Unknown ids change nothing.
    pub fn update_record(&mut self, record: Record) -> Result<bool> {
        let id = record.id.clone();
        let updated = self.commit(|store| store.update(record))?;
        debug!(%id, updated, "record update");
        Ok(updated)
    }

    pub fn delete_record(&mut self, id: &str) -> Result<bool> {
        let deleted = self.commit(|store| store.delete(id))?;
        debug!(%id, deleted, "record delete");
        Ok(deleted)
    }

    pub fn delete_records<S: AsRef<str>>(&mut self, ids: &[S]) -> Result<usize> {
        let removed = self.commit(|store| store.delete_many(ids))?;
        debug!(requested = ids.len(), removed, "bulk delete");
        Ok(removed)
    }

    pub fn replace_all(&mut self, records: Vec<Record>) -> Result<()> {
        self.commit(|store| store.replace_all(records))
    }

    // --- Views ---

    pub fn search<Tz>(&self, query: &str, category: Option<Category>, tz: &Tz) -> Vec<Record>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        views::search(self.store.records(), query, category, tz)
    }

    pub fn overview<Tz>(&self, tz: &Tz) -> Overview
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        views::overview(self.store.records(), tz)
    }

    // --- Backup ---

    pub fn export_json(&self) -> Result<String> {
        backup::to_json(self.store.records())
    }

    /// Validate `text` and, only if it passes, overwrite the whole
    /// collection with it. Returns the number of records now held.
    ///
    /// On any error, including [`ImportError::Storage`], nothing changed.
    pub fn import_json(&mut self, text: &str) -> Result<usize, ImportError> {
        let records = backup::parse_backup(text).inspect_err(|e| {
            info!(error = %e, "import rejected");
        })?;
        let count = records.len();
        self.replace_all(records).map_err(ImportError::Storage)?;
        info!(count, "import replaced collection");
        Ok(count)
    }

    // --- Insight ---

    pub fn insight_prompt<Tz>(&self, tz: &Tz) -> Result<String, &'static str>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        insight::prepare(self.store.records(), tz)
    }

    // --- Preferences ---

    #[must_use]
    pub fn preferences(&self) -> Preferences {
        self.prefs
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.db.save_theme(theme)?;
        self.prefs.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let theme = self.prefs.theme.toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    pub fn set_default_unit(&mut self, unit: Unit) -> Result<()> {
        self.db.save_default_unit(unit)?;
        self.prefs.default_unit = unit;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_record(value: f64, unit: Unit, timestamp: i64) -> NewRecord {
        NewRecord {
            timestamp,
            category: Category::BeforeBreakfast,
            value,
            unit,
            notes: String::new(),
        }
    }

    #[test]
    fn test_mutations_persist_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sugartrack.db");

        let (kept, dropped) = {
            let mut svc = SugarService::open(&path).unwrap();
            let kept = svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();
            let dropped = svc.add_record(new_record(6.0, Unit::MmolL, 2)).unwrap();
            svc.delete_record(&dropped.id).unwrap();
            (kept, dropped)
        };

        let svc = SugarService::open(&path).unwrap();
        assert_eq!(svc.records().len(), 1);
        assert_eq!(svc.records()[0], kept);
        assert!(svc.get_record(&dropped.id).is_none());
    }

    #[test]
    fn test_update_persists_and_unknown_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sugartrack.db");

        let mut svc = SugarService::open(&path).unwrap();
        let rec = svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();

        let edited = Record {
            notes: "after run".to_string(),
            ..rec.clone()
        };
        assert!(svc.update_record(edited.clone()).unwrap());

        let stranger = new_record(1.0, Unit::MgDl, 1).with_id("ghost".to_string());
        assert!(!svc.update_record(stranger).unwrap());
        drop(svc);

        let svc = SugarService::open(&path).unwrap();
        assert_eq!(svc.records(), &[edited]);
    }

    #[test]
    fn test_bulk_delete() {
        let mut svc = SugarService::new_in_memory().unwrap();
        let a = svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();
        let b = svc.add_record(new_record(110.0, Unit::MgDl, 2)).unwrap();
        svc.add_record(new_record(120.0, Unit::MgDl, 3)).unwrap();

        let removed = svc.delete_records(&[a.id, b.id]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(svc.records().len(), 1);
    }

    #[test]
    fn test_import_invalid_leaves_collection() {
        let mut svc = SugarService::new_in_memory().unwrap();
        let rec = svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();

        let bad = r#"[{"id":"x","timestamp":1,"category":"Other","unit":"mg/dL"}]"#;
        let outcome = svc.import_json(bad);
        assert!(matches!(outcome, Err(ImportError::MissingField { .. })));
        assert_eq!(svc.records(), &[rec]);
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut svc = SugarService::new_in_memory().unwrap();
        svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();
        svc.add_record(new_record(7.0, Unit::MmolL, 2)).unwrap();
        let before = svc.records().to_vec();
        let json = svc.export_json().unwrap();

        let mut other = SugarService::new_in_memory().unwrap();
        other.add_record(new_record(55.0, Unit::MgDl, 9)).unwrap();
        assert_eq!(other.import_json(&json).unwrap(), 2);
        assert_eq!(other.records(), before.as_slice());
    }

    /// Break the backing table from a second connection so every save fails.
    fn open_with_broken_storage() -> (tempfile::TempDir, SugarService) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sugartrack.db");
        let svc = SugarService::open(&path).unwrap();
        let other = rusqlite::Connection::open(&path).unwrap();
        other.execute_batch("DROP TABLE kv_slots").unwrap();
        (dir, svc)
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let (_dir, mut svc) = open_with_broken_storage();

        assert!(svc.add_record(new_record(100.0, Unit::MgDl, 1)).is_err());
        assert!(svc.records().is_empty());

        assert!(svc.set_theme(Theme::Dark).is_err());
        assert!(svc.toggle_theme().is_err());
        assert!(svc.set_default_unit(Unit::MmolL).is_err());
        assert_eq!(svc.preferences(), Preferences::default());
    }

    #[test]
    fn test_import_storage_failure_is_reported() {
        let (_dir, mut svc) = open_with_broken_storage();
        let json = r#"[{"id":"a","timestamp":1,"category":"Other","value":100,"unit":"mg/dL"}]"#;

        let outcome = svc.import_json(json);
        assert!(matches!(outcome, Err(ImportError::Storage(_))));
        assert!(svc.records().is_empty());
    }

    #[test]
    fn test_overview_through_service() {
        let mut svc = SugarService::new_in_memory().unwrap();
        svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();
        svc.add_record(new_record(7.0, Unit::MmolL, 2)).unwrap();
        let o = svc.overview(&Utc);
        assert_eq!(o.stats.avg, 113);
        assert_eq!(o.chart.len(), 2);
        assert_eq!(o.chart[0].timestamp, 1);
    }

    #[test]
    fn test_insight_prompt_threshold() {
        let mut svc = SugarService::new_in_memory().unwrap();
        svc.add_record(new_record(100.0, Unit::MgDl, 1)).unwrap();
        assert_eq!(svc.insight_prompt(&Utc), Err(insight::NOT_ENOUGH_DATA));
    }

    #[test]
    fn test_preferences_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sugartrack.db");
        {
            let mut svc = SugarService::open(&path).unwrap();
            assert_eq!(svc.preferences(), Preferences::default());
            assert_eq!(svc.toggle_theme().unwrap(), Theme::Dark);
            svc.set_default_unit(Unit::MmolL).unwrap();
        }
        let svc = SugarService::open(&path).unwrap();
        assert_eq!(
            svc.preferences(),
            Preferences {
                theme: Theme::Dark,
                default_unit: Unit::MmolL
            }
        );
    }
}
