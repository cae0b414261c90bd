use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::Vehicle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueKey {
    VehicleNumber,
    LicenceNumber,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate {0:?}")]
    Duplicate(UniqueKey),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let key = match db_err.constraint() {
                    Some(c) if c.contains("licence") => UniqueKey::LicenceNumber,
                    _ => UniqueKey::VehicleNumber,
                };
                return StoreError::Duplicate(key);
            }
        }
        StoreError::Backend(anyhow::Error::new(err).context("database error"))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Vehicles keyed by canonical plate, plus each user's saved list keyed by
/// the user's email.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    async fn insert(&self, vehicle: Vehicle) -> StoreResult<Vehicle>;
    async fn find_by_number(&self, vehicle_number: &str) -> StoreResult<Option<Vehicle>>;
    async fn find_by_licence(&self, licence_number: &str) -> StoreResult<Option<Vehicle>>;

    /// Returns the updated vehicle, or `None` when the plate is unknown
    async fn renew(
        &self,
        vehicle_number: &str,
        new_expiry: NaiveDate,
        new_valid_from: Option<NaiveDate>,
    ) -> StoreResult<Option<Vehicle>>;

    /// `false` when the vehicle was already on the owner's list
    async fn save_for(&self, owner: &str, vehicle_number: &str) -> StoreResult<bool>;
    /// `false` when the vehicle was not on the owner's list
    async fn unsave_for(&self, owner: &str, vehicle_number: &str) -> StoreResult<bool>;
    /// Saved vehicles, in the order they were saved
    async fn saved_by(&self, owner: &str) -> StoreResult<Vec<Vehicle>>;
}

#[derive(Default)]
pub struct MemoryVehicleStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    vehicles: BTreeMap<String, Vehicle>,
    saved: HashMap<String, Vec<String>>,
}

impl MemoryVehicleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VehicleStore for MemoryVehicleStore {
    async fn insert(&self, vehicle: Vehicle) -> StoreResult<Vehicle> {
        let mut inner = self.inner.write().await;
        if inner.vehicles.contains_key(&vehicle.vehicle_number) {
            return Err(StoreError::Duplicate(UniqueKey::VehicleNumber));
        }
        if inner
            .vehicles
            .values()
            .any(|v| v.licence_number == vehicle.licence_number)
        {
            return Err(StoreError::Duplicate(UniqueKey::LicenceNumber));
        }
        inner
            .vehicles
            .insert(vehicle.vehicle_number.clone(), vehicle.clone());
        Ok(vehicle)
    }

    async fn find_by_number(&self, vehicle_number: &str) -> StoreResult<Option<Vehicle>> {
        Ok(self.inner.read().await.vehicles.get(vehicle_number).cloned())
    }

    async fn find_by_licence(&self, licence_number: &str) -> StoreResult<Option<Vehicle>> {
        Ok(self
            .inner
            .read()
            .await
            .vehicles
            .values()
            .find(|v| v.licence_number == licence_number)
            .cloned())
    }

    async fn renew(
        &self,
        vehicle_number: &str,
        new_expiry: NaiveDate,
        new_valid_from: Option<NaiveDate>,
    ) -> StoreResult<Option<Vehicle>> {
        let mut inner = self.inner.write().await;
        Ok(inner.vehicles.get_mut(vehicle_number).map(|vehicle| {
            vehicle.licence_expiry_date = new_expiry;
            if let Some(valid_from) = new_valid_from {
                vehicle.licence_valid_from = valid_from;
            }
            vehicle.clone()
        }))
    }

    async fn save_for(&self, owner: &str, vehicle_number: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let list = inner.saved.entry(owner.to_string()).or_default();
        if list.iter().any(|n| n == vehicle_number) {
            return Ok(false);
        }
        list.push(vehicle_number.to_string());
        Ok(true)
    }

    async fn unsave_for(&self, owner: &str, vehicle_number: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        let Some(list) = inner.saved.get_mut(owner) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|n| n != vehicle_number);
        Ok(list.len() != before)
    }

    async fn saved_by(&self, owner: &str) -> StoreResult<Vec<Vehicle>> {
        let inner = self.inner.read().await;
        Ok(inner
            .saved
            .get(owner)
            .map(|list| {
                list.iter()
                    .filter_map(|n| inner.vehicles.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub struct PgVehicleStore {
    pool: Pool<Postgres>,
}

impl PgVehicleStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const VEHICLE_COLUMNS: &str = "vehicle_number, licence_number, vehicle_class, fuel_type, owner_name, \
     owner_address, owner_nic, district, licence_valid_from, licence_expiry_date";

#[async_trait]
impl VehicleStore for PgVehicleStore {
    async fn insert(&self, vehicle: Vehicle) -> StoreResult<Vehicle> {
        let sql = format!(
            "INSERT INTO vehicles ({VEHICLE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {VEHICLE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(&vehicle.vehicle_number)
            .bind(&vehicle.licence_number)
            .bind(&vehicle.vehicle_class)
            .bind(&vehicle.fuel_type)
            .bind(&vehicle.owner_name)
            .bind(&vehicle.owner_address)
            .bind(&vehicle.owner_nic)
            .bind(&vehicle.district)
            .bind(vehicle.licence_valid_from)
            .bind(vehicle.licence_expiry_date)
            .fetch_one(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_number(&self, vehicle_number: &str) -> StoreResult<Option<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE vehicle_number = $1");
        let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(vehicle_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn find_by_licence(&self, licence_number: &str) -> StoreResult<Option<Vehicle>> {
        let sql = format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE licence_number = $1");
        let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(licence_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn renew(
        &self,
        vehicle_number: &str,
        new_expiry: NaiveDate,
        new_valid_from: Option<NaiveDate>,
    ) -> StoreResult<Option<Vehicle>> {
        let sql = format!(
            "UPDATE vehicles \
             SET licence_expiry_date = $2, licence_valid_from = COALESCE($3, licence_valid_from) \
             WHERE vehicle_number = $1 \
             RETURNING {VEHICLE_COLUMNS}"
        );
        let vehicle = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(vehicle_number)
            .bind(new_expiry)
            .bind(new_valid_from)
            .fetch_optional(&self.pool)
            .await?;

        Ok(vehicle)
    }

    async fn save_for(&self, owner: &str, vehicle_number: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO saved_vehicles (owner_email, vehicle_number) VALUES ($1, $2) \
             ON CONFLICT (owner_email, vehicle_number) DO NOTHING",
        )
        .bind(owner)
        .bind(vehicle_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unsave_for(&self, owner: &str, vehicle_number: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM saved_vehicles WHERE owner_email = $1 AND vehicle_number = $2",
        )
        .bind(owner)
        .bind(vehicle_number)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn saved_by(&self, owner: &str) -> StoreResult<Vec<Vehicle>> {
        let sql = format!(
            "SELECT {} FROM vehicles v \
             JOIN saved_vehicles s ON s.vehicle_number = v.vehicle_number \
             WHERE s.owner_email = $1 \
             ORDER BY s.id",
            VEHICLE_COLUMNS
                .split(", ")
                .map(|c| format!("v.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let vehicles = sqlx::query_as::<_, Vehicle>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;

        Ok(vehicles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vehicle(number: &str, licence: &str) -> Vehicle {
        Vehicle {
            vehicle_number: number.to_string(),
            licence_number: licence.to_string(),
            vehicle_class: "Motor Car".to_string(),
            fuel_type: "Petrol".to_string(),
            owner_name: "K. Silva".to_string(),
            owner_address: "4 Temple Rd, Kandy".to_string(),
            owner_nic: "851234567V".to_string(),
            district: "Kandy".to_string(),
            licence_valid_from: date(2025, 1, 1),
            licence_expiry_date: date(2025, 12, 31),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_keys() {
        let store = MemoryVehicleStore::new();
        store.insert(vehicle("CAB1234", "LIC-1")).await.unwrap();

        let err = store.insert(vehicle("CAB1234", "LIC-2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::VehicleNumber)));

        let err = store.insert(vehicle("KX9999", "LIC-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueKey::LicenceNumber)));
    }

    #[tokio::test]
    async fn lookups_by_number_and_licence() {
        let store = MemoryVehicleStore::new();
        store.insert(vehicle("CAB1234", "LIC-1")).await.unwrap();

        assert!(store.find_by_number("CAB1234").await.unwrap().is_some());
        assert!(store.find_by_number("CAB9999").await.unwrap().is_none());
        assert_eq!(
            store.find_by_licence("LIC-1").await.unwrap().unwrap().vehicle_number,
            "CAB1234"
        );
        assert!(store.find_by_licence("LIC-404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn renew_keeps_valid_from_unless_given() {
        let store = MemoryVehicleStore::new();
        store.insert(vehicle("CAB1234", "LIC-1")).await.unwrap();

        let renewed = store
            .renew("CAB1234", date(2026, 12, 31), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewed.licence_expiry_date, date(2026, 12, 31));
        assert_eq!(renewed.licence_valid_from, date(2025, 1, 1));

        let renewed = store
            .renew("CAB1234", date(2027, 12, 31), Some(date(2027, 1, 1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renewed.licence_valid_from, date(2027, 1, 1));

        assert!(store.renew("NOPE1", date(2027, 1, 1), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_lists_are_per_owner() {
        let store = MemoryVehicleStore::new();
        store.insert(vehicle("CAB1234", "LIC-1")).await.unwrap();
        store.insert(vehicle("KX9999", "LIC-2")).await.unwrap();

        assert!(store.save_for("a@gov.lk", "KX9999").await.unwrap());
        assert!(store.save_for("a@gov.lk", "CAB1234").await.unwrap());
        assert!(!store.save_for("a@gov.lk", "CAB1234").await.unwrap());

        let saved: Vec<String> = store
            .saved_by("a@gov.lk")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.vehicle_number)
            .collect();
        assert_eq!(saved, vec!["KX9999", "CAB1234"]);
        assert!(store.saved_by("b@gov.lk").await.unwrap().is_empty());

        assert!(store.unsave_for("a@gov.lk", "KX9999").await.unwrap());
        assert!(!store.unsave_for("a@gov.lk", "KX9999").await.unwrap());
        assert!(!store.unsave_for("b@gov.lk", "CAB1234").await.unwrap());
        assert_eq!(store.saved_by("a@gov.lk").await.unwrap().len(), 1);
    }
}
