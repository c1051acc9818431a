use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::store::{OfferStore, ProfileStore, Store};
use super::Database;
use crate::error::StoreError;
use crate::models::{Application, Enrichment, Offer, Profile, RawOffer, Source};

const OFFER_COLUMNS: &str = "id, company, url, rent, size, rooms, street, district, zip, wbs, \
                             expose_url, is_new, applied, created_at";

/// Fixed-width UTC timestamp so that text ordering matches time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn datetime_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn source_column(row: &Row, idx: usize) -> rusqlite::Result<Source> {
    let raw: String = row.get(idx)?;
    raw.parse::<Source>()
        .map_err(|e| conversion_error(idx, std::io::Error::other(e.to_string())))
}

impl Database {
    fn map_offer_row(row: &Row) -> rusqlite::Result<Offer> {
        Ok(Offer {
            id: uuid_column(row, 0)?,
            source: source_column(row, 1)?,
            url: row.get(2)?,
            rent: row.get(3)?,
            size: row.get(4)?,
            rooms: row.get(5)?,
            street: row.get(6)?,
            district: row.get(7)?,
            zip: row.get(8)?,
            wbs: row.get(9)?,
            expose_url: row.get(10)?,
            is_new: row.get(11)?,
            applied: row.get(12)?,
            created_at: datetime_column(row, 13)?,
        })
    }

    fn map_profile_row(row: &Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: uuid_column(row, 0)?,
            gender: row.get(1)?,
            name: row.get(2)?,
            surname: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            street: row.get(6)?,
            zip: row.get(7)?,
            city: row.get(8)?,
            min_rooms: row.get(9)?,
            max_rooms: row.get(10)?,
            accepts_wbs: row.get(11)?,
            enabled: row.get(12)?,
        })
    }
}

impl OfferStore for Database {
    fn create_offer(&self, source: Source, offer: &RawOffer) -> Result<Uuid, StoreError> {
        let conn = self.conn()?;
        let now = timestamp(Utc::now());
        conn.execute(
            "INSERT INTO flats (id, company, url, rent, size, rooms, street, district, zip, wbs, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             ON CONFLICT(url) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                source.as_str(),
                offer.url,
                offer.rent,
                offer.size,
                offer.rooms,
                offer.street,
                offer.district,
                offer.zip,
                offer.wbs,
                now,
            ],
        )?;

        let id = conn.query_row(
            "SELECT id FROM flats WHERE url = ?1",
            params![offer.url],
            |row| uuid_column(row, 0),
        )?;
        Ok(id)
    }

    fn get_new_offers(&self, source: Source) -> Result<Vec<Offer>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OFFER_COLUMNS} FROM flats
             WHERE company = ?1 AND is_new = 1
             ORDER BY created_at ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map(params![source.as_str()], Self::map_offer_row)?;

        let mut offers = Vec::new();
        for row in rows {
            offers.push(row?);
        }
        Ok(offers)
    }

    fn update_offer_enrichment(&self, id: Uuid, enrichment: &Enrichment) -> Result<(), StoreError> {
        if enrichment.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        conn.execute(
            "UPDATE flats SET
                wbs = COALESCE(?2, wbs),
                zip = COALESCE(?3, zip),
                expose_url = COALESCE(?4, expose_url),
                updated_at = ?5
             WHERE id = ?1",
            params![
                id.to_string(),
                enrichment.wbs,
                enrichment.zip,
                enrichment.expose_url,
                timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn mark_processed(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE flats SET is_new = 0, updated_at = ?2 WHERE id = ?1 AND is_new = 1",
            params![id.to_string(), timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn mark_new_offers_processed(&self, source: Source) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE flats SET is_new = 0, updated_at = ?2 WHERE company = ?1 AND is_new = 1",
            params![source.as_str(), timestamp(Utc::now())],
        )?;
        Ok(updated)
    }

    fn record_application(&self, offer_id: Uuid, profile_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let now = timestamp(Utc::now());
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO flats_profiles (flat_id, profile_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(flat_id, profile_id) DO NOTHING",
            params![offer_id.to_string(), profile_id.to_string(), now],
        )?;
        tx.execute(
            "UPDATE flats SET applied = 1, updated_at = ?2 WHERE id = ?1",
            params![offer_id.to_string(), now],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn offers_since(&self, since: DateTime<Utc>) -> Result<Vec<Offer>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OFFER_COLUMNS} FROM flats
             WHERE created_at >= ?1
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![timestamp(since)], Self::map_offer_row)?;

        let mut offers = Vec::new();
        for row in rows {
            offers.push(row?);
        }
        Ok(offers)
    }

    fn applications_for(&self, offer_id: Uuid) -> Result<Vec<Application>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT flat_id, profile_id, created_at FROM flats_profiles
             WHERE flat_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt.query_map(params![offer_id.to_string()], |row| {
            Ok(Application {
                offer_id: uuid_column(row, 0)?,
                profile_id: uuid_column(row, 1)?,
                created_at: datetime_column(row, 2)?,
            })
        })?;

        let mut applications = Vec::new();
        for row in rows {
            applications.push(row?);
        }
        Ok(applications)
    }
}

impl ProfileStore for Database {
    fn get_enabled_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, gender, name, surname, email, phone, street, zip, city, min_rooms, max_rooms, wbs, enabled
             FROM profiles WHERE enabled = 1 ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], Self::map_profile_row)?;

        let mut profiles = Vec::new();
        for row in rows {
            profiles.push(row?);
        }
        Ok(profiles)
    }

    fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profiles (id, gender, name, surname, email, phone, street, zip, city, min_rooms, max_rooms, wbs, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                gender = excluded.gender,
                name = excluded.name,
                surname = excluded.surname,
                email = excluded.email,
                phone = excluded.phone,
                street = excluded.street,
                zip = excluded.zip,
                city = excluded.city,
                min_rooms = excluded.min_rooms,
                max_rooms = excluded.max_rooms,
                wbs = excluded.wbs,
                enabled = excluded.enabled,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                profile.id.to_string(),
                profile.gender,
                profile.name,
                profile.surname,
                profile.email,
                profile.phone,
                profile.street,
                profile.zip,
                profile.city,
                profile.min_rooms,
                profile.max_rooms,
                profile.accepts_wbs,
                profile.enabled,
            ],
        )?;
        Ok(())
    }
}

impl Store for Database {
    fn reconnect(&self) -> Result<(), StoreError> {
        self.reopen()
    }
}
