use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use beacon_shared::types::{EmergencyInfo, Location, WalletAddress};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Persist a new location. Rows are append-only; there is no update path.
    pub fn insert_location(&self, location: &Location) -> Result<()> {
        let info_json = location
            .emergency_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn().execute(
            "INSERT INTO locations (id, wallet_address, lat, lng, emergency_info, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Uuid::new_v4().to_string(),
                location.wallet_address.as_str(),
                location.lat,
                location.lng,
                info_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// The full current set, oldest first.
    pub fn list_locations(&self) -> Result<Vec<Location>> {
        let mut stmt = self.conn().prepare(
            "SELECT wallet_address, lat, lng, emergency_info
             FROM locations
             ORDER BY created_at, id",
        )?;

        let rows = stmt.query_map([], row_to_location)?;

        let mut locations = Vec::new();
        for row in rows {
            locations.push(row?);
        }
        Ok(locations)
    }

    /// Delete every location owned by `address`, returning the row count.
    pub fn delete_locations_for(&self, address: &WalletAddress) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM locations WHERE wallet_address = ?1",
            params![address.as_str()],
        )?;
        Ok(affected)
    }
}

fn row_to_location(row: &rusqlite::Row<'_>) -> rusqlite::Result<Location> {
    let address_str: String = row.get(0)?;
    let lat: f64 = row.get(1)?;
    let lng: f64 = row.get(2)?;
    let info_json: Option<String> = row.get(3)?;

    let wallet_address = WalletAddress::parse(&address_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let emergency_info: Option<EmergencyInfo> = match info_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Location {
        wallet_address,
        lat,
        lng,
        emergency_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_shared::types::Severity;

    fn addr(seed: u8) -> WalletAddress {
        WalletAddress::from_pubkey(&[seed; 32])
    }

    fn fire_at(owner: &WalletAddress, lat: f64, lng: f64) -> Location {
        Location {
            wallet_address: owner.clone(),
            lat,
            lng,
            emergency_info: Some(EmergencyInfo {
                emergency_type: "Fire".into(),
                description: "Apartment fire".into(),
                severity: Severity::High,
                people_affected: "10".into(),
                contact_info: "555-0100".into(),
            }),
        }
    }

    #[test]
    fn insert_and_list_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let owner = addr(1);

        db.insert_location(&fire_at(&owner, 37.77, -122.41)).unwrap();

        let all = db.list_locations().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].wallet_address, owner);
        let info = all[0].emergency_info.as_ref().unwrap();
        assert_eq!(info.severity, Severity::High);
        assert_eq!(info.people_affected, "10");
    }

    #[test]
    fn location_without_info_is_allowed() {
        let db = Database::open_in_memory().unwrap();
        db.insert_location(&Location {
            wallet_address: addr(1),
            lat: 0.0,
            lng: 0.0,
            emergency_info: None,
        })
        .unwrap();

        assert!(db.list_locations().unwrap()[0].emergency_info.is_none());
    }

    #[test]
    fn delete_is_scoped_to_owner() {
        let db = Database::open_in_memory().unwrap();
        let mine = addr(1);
        let theirs = addr(2);

        db.insert_location(&fire_at(&mine, 1.0, 1.0)).unwrap();
        db.insert_location(&fire_at(&mine, 2.0, 2.0)).unwrap();
        db.insert_location(&fire_at(&theirs, 3.0, 3.0)).unwrap();

        assert_eq!(db.delete_locations_for(&mine).unwrap(), 2);

        let remaining = db.list_locations().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].wallet_address, theirs);
    }
}
