pub mod migrations;
pub mod queries;
pub mod store;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::StoreError;

pub use store::{OfferStore, ProfileStore, Store};

#[derive(Debug, Clone, PartialEq)]
enum Location {
    File(PathBuf),
    Memory,
}

pub struct Database {
    conn: Mutex<Connection>,
    location: Location,
}

impl Database {
    /// Open the database named by a `DATABASE_URL` value.
    ///
    /// Accepts a plain path, a `sqlite://` URL or `:memory:`.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let target = url.strip_prefix("sqlite://").unwrap_or(url);
        match target {
            ":memory:" | "sqlite::memory:" => Self::open_in_memory(),
            path => Self::open(Path::new(path)),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Self::open_connection(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::File(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::Memory,
        })
    }

    fn open_connection(path: &Path) -> Result<Connection, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        migrations::run_migrations(&conn)?;
        Ok(conn)
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Replace the current connection with a freshly opened one
    pub fn reopen(&self) -> Result<(), StoreError> {
        match &self.location {
            Location::File(path) => {
                let fresh = Self::open_connection(path)?;
                let mut conn = self.conn()?;
                *conn = fresh;
                tracing::info!("Reconnected to {}", path.display());
            }
            // An in-memory database cannot be reopened without losing it
            Location::Memory => tracing::warn!("In-memory database kept as is on reconnect"),
        }
        Ok(())
    }

    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, err)| StoreError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::models::{Enrichment, Profile, RawOffer, Source};

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn raw_offer(url: &str, rooms: Option<i32>) -> RawOffer {
        RawOffer {
            url: url.into(),
            rent: Some("450,00 €".into()),
            size: Some("52 m²".into()),
            rooms,
            ..Default::default()
        }
    }

    fn test_profile(name: &str, min_rooms: i32, max_rooms: i32, accepts_wbs: bool) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            gender: "Frau".into(),
            name: name.into(),
            surname: "Mustermann".into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "030123456".into(),
            street: "Musterstraße 1".into(),
            zip: "10115".into(),
            city: "Berlin".into(),
            min_rooms,
            max_rooms,
            accepts_wbs,
            enabled: true,
        }
    }

    #[test]
    fn test_migrations_run() {
        let db = test_db();
        let conn = db.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_create_offer_is_idempotent() {
        let db = test_db();
        let offer = raw_offer("https://example.com/flat/1", Some(2));

        let first = db.create_offer(Source::Degewo, &offer).unwrap();
        let second = db.create_offer(Source::Degewo, &offer).unwrap();
        assert_eq!(first, second);

        let conn = db.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM flats", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_created_offer_is_new_with_scraped_fields() {
        let db = test_db();
        let mut offer = raw_offer("https://example.com/flat/1", Some(3));
        offer.district = Some("Neukölln".into());
        offer.wbs = Some(true);
        let id = db.create_offer(Source::Howoge, &offer).unwrap();

        let new_offers = db.get_new_offers(Source::Howoge).unwrap();
        assert_eq!(new_offers.len(), 1);
        let stored = &new_offers[0];
        assert_eq!(stored.id, id);
        assert_eq!(stored.source, Source::Howoge);
        assert_eq!(stored.rooms, Some(3));
        assert_eq!(stored.wbs, Some(true));
        assert_eq!(stored.district.as_deref(), Some("Neukölln"));
        assert_eq!(stored.rent.as_deref(), Some("450,00 €"));
        assert!(stored.is_new);
        assert!(!stored.applied);
    }

    #[test]
    fn test_get_new_offers_filters_source_and_orders_oldest_first() {
        let db = test_db();
        let a = db
            .create_offer(Source::Degewo, &raw_offer("https://example.com/a", None))
            .unwrap();
        let b = db
            .create_offer(Source::Degewo, &raw_offer("https://example.com/b", None))
            .unwrap();
        db.create_offer(Source::Gewobag, &raw_offer("https://example.com/c", None))
            .unwrap();

        let ids: Vec<_> = db
            .get_new_offers(Source::Degewo)
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_mark_processed_excludes_offer_for_good() {
        let db = test_db();
        let id = db
            .create_offer(Source::Degewo, &raw_offer("https://example.com/a", Some(1)))
            .unwrap();
        assert_eq!(db.get_new_offers(Source::Degewo).unwrap().len(), 1);

        db.mark_processed(id).unwrap();
        assert!(db.get_new_offers(Source::Degewo).unwrap().is_empty());

        // Scraping the same listing again does not revive it
        db.create_offer(Source::Degewo, &raw_offer("https://example.com/a", Some(1)))
            .unwrap();
        assert!(db.get_new_offers(Source::Degewo).unwrap().is_empty());
    }

    #[test]
    fn test_update_offer_enrichment_is_sparse() {
        let db = test_db();
        let mut offer = raw_offer("https://example.com/a", Some(2));
        offer.zip = Some("12353".into());
        let id = db.create_offer(Source::Gewobag, &offer).unwrap();

        db.update_offer_enrichment(
            id,
            &Enrichment {
                wbs: Some(false),
                zip: None,
                expose_url: Some("https://example.com/a.pdf".into()),
            },
        )
        .unwrap();

        let stored = db.get_new_offers(Source::Gewobag).unwrap().remove(0);
        assert_eq!(stored.wbs, Some(false));
        assert_eq!(stored.zip.as_deref(), Some("12353"));
        assert_eq!(stored.expose_url.as_deref(), Some("https://example.com/a.pdf"));

        // Nothing observed, nothing changed
        db.update_offer_enrichment(id, &Enrichment::default()).unwrap();
        let stored = db.get_new_offers(Source::Gewobag).unwrap().remove(0);
        assert_eq!(stored.wbs, Some(false));
        assert_eq!(stored.expose_url.as_deref(), Some("https://example.com/a.pdf"));
    }

    #[test]
    fn test_mark_new_offers_processed_only_touches_source() {
        let db = test_db();
        db.create_offer(Source::Degewo, &raw_offer("https://example.com/a", None))
            .unwrap();
        db.create_offer(Source::Degewo, &raw_offer("https://example.com/b", None))
            .unwrap();
        db.create_offer(Source::Wbm, &raw_offer("https://example.com/c", None))
            .unwrap();

        assert_eq!(db.mark_new_offers_processed(Source::Degewo).unwrap(), 2);
        assert!(db.get_new_offers(Source::Degewo).unwrap().is_empty());
        assert_eq!(db.get_new_offers(Source::Wbm).unwrap().len(), 1);
    }

    #[test]
    fn test_record_application_at_most_once() {
        let db = test_db();
        let profile = test_profile("Erika", 1, 3, false);
        db.upsert_profile(&profile).unwrap();
        let offer_id = db
            .create_offer(Source::Howoge, &raw_offer("https://example.com/a", Some(2)))
            .unwrap();

        db.record_application(offer_id, profile.id).unwrap();
        db.record_application(offer_id, profile.id).unwrap();

        let applications = db.applications_for(offer_id).unwrap();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].profile_id, profile.id);

        let applied = db.offers_since(Utc::now() - Duration::hours(1)).unwrap();
        assert!(applied[0].applied);
    }

    #[test]
    fn test_record_application_requires_known_rows() {
        let db = test_db();
        let offer_id = db
            .create_offer(Source::Howoge, &raw_offer("https://example.com/a", Some(2)))
            .unwrap();
        assert!(db.record_application(offer_id, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_enabled_profiles() {
        let db = test_db();
        let enabled = test_profile("Erika", 1, 2, false);
        let mut disabled = test_profile("Max", 2, 4, true);
        disabled.enabled = false;
        db.upsert_profile(&enabled).unwrap();
        db.upsert_profile(&disabled).unwrap();

        let profiles = db.get_enabled_profiles().unwrap();
        assert_eq!(profiles, vec![enabled.clone()]);

        // Upsert updates in place
        let mut edited = enabled;
        edited.max_rooms = 5;
        edited.accepts_wbs = true;
        db.upsert_profile(&edited).unwrap();
        assert_eq!(db.get_enabled_profiles().unwrap(), vec![edited]);
    }

    #[test]
    fn test_offers_since_window() {
        let db = test_db();
        db.create_offer(Source::Degewo, &raw_offer("https://example.com/a", None))
            .unwrap();

        assert_eq!(db.offers_since(Utc::now() - Duration::hours(1)).unwrap().len(), 1);
        assert!(db.offers_since(Utc::now() + Duration::hours(1)).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_file_database_keeps_data() {
        let path = std::env::temp_dir().join(format!("flat-bot-{}.db", Uuid::new_v4()));
        let db = Database::connect(&format!("sqlite://{}", path.display())).unwrap();
        db.create_offer(Source::Wbm, &raw_offer("https://example.com/a", Some(2)))
            .unwrap();

        db.reconnect().unwrap();
        assert_eq!(db.get_new_offers(Source::Wbm).unwrap().len(), 1);

        db.close().unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
