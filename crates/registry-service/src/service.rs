use chrono::NaiveDate;
use common::plates::canonical;
use std::sync::Arc;
use telemetry::metrics::{REGISTRY_LOOKUPS, REGISTRY_MUTATIONS};
use tracing::info;

use crate::{
    error::ApiError,
    models::{MessageResponse, RenewLicenceRequest, Vehicle, VehicleResponse},
    store::VehicleStore,
};

pub const VEHICLE_NOT_FOUND: &str = "Vehicle not found";
pub const LICENCE_NOT_FOUND: &str = "Vehicle not found with this license number";
pub const ALREADY_SAVED: &str = "Vehicle already saved";
pub const NOT_IN_LIST: &str = "Vehicle not found in your list";

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct RegistryService {
    store: Arc<dyn VehicleStore>,
    today: Clock,
}

impl RegistryService {
    pub fn new(store: Arc<dyn VehicleStore>) -> Self {
        Self::with_clock(store, Arc::new(|| chrono::Local::now().date_naive()))
    }

    /// Use `today` to decide licence status instead of the local date
    pub fn with_clock(store: Arc<dyn VehicleStore>, today: Clock) -> Self {
        Self { store, today }
    }

    fn respond(&self, vehicle: Vehicle) -> VehicleResponse {
        VehicleResponse::new(vehicle, (self.today)())
    }

    /// Canonical plate from a path segment; rejects segments with no letters or digits
    fn plate_key(raw: &str) -> Result<String, ApiError> {
        let key = canonical(raw);
        if key.is_empty() {
            return Err(ApiError::bad_request("Vehicle number must contain letters or digits"));
        }
        Ok(key)
    }

    // ===== Lookups =====

    pub async fn get_by_plate(&self, plate: &str) -> Result<VehicleResponse, ApiError> {
        let key = Self::plate_key(plate)?;
        match self.store.find_by_number(&key).await? {
            Some(vehicle) => {
                REGISTRY_LOOKUPS.with_label_values(&["plate", "found"]).inc();
                Ok(self.respond(vehicle))
            }
            None => {
                REGISTRY_LOOKUPS.with_label_values(&["plate", "missing"]).inc();
                Err(ApiError::not_found(VEHICLE_NOT_FOUND))
            }
        }
    }

    pub async fn get_by_licence(&self, licence: &str) -> Result<VehicleResponse, ApiError> {
        match self.store.find_by_licence(licence.trim()).await? {
            Some(vehicle) => {
                REGISTRY_LOOKUPS.with_label_values(&["licence", "found"]).inc();
                Ok(self.respond(vehicle))
            }
            None => {
                REGISTRY_LOOKUPS.with_label_values(&["licence", "missing"]).inc();
                Err(ApiError::not_found(LICENCE_NOT_FOUND))
            }
        }
    }

    // ===== Mutations =====

    pub async fn register(&self, mut vehicle: Vehicle) -> Result<VehicleResponse, ApiError> {
        vehicle.vehicle_number = Self::plate_key(&vehicle.vehicle_number)?;
        vehicle.licence_number = vehicle.licence_number.trim().to_string();
        if vehicle.licence_number.is_empty() {
            return Err(ApiError::bad_request("Licence number must not be empty"));
        }
        vehicle.check_lengths().map_err(ApiError::bad_request)?;

        let created = self.store.insert(vehicle).await.inspect_err(|_| {
            REGISTRY_MUTATIONS.with_label_values(&["register", "rejected"]).inc();
        })?;

        REGISTRY_MUTATIONS.with_label_values(&["register", "success"]).inc();
        info!(vehicle_number = %created.vehicle_number, "vehicle registered");
        Ok(self.respond(created))
    }

    pub async fn renew(&self, plate: &str, req: RenewLicenceRequest) -> Result<VehicleResponse, ApiError> {
        let key = Self::plate_key(plate)?;
        let renewed = self
            .store
            .renew(&key, req.new_expiry_date, req.new_valid_from)
            .await?
            .ok_or_else(|| {
                REGISTRY_MUTATIONS.with_label_values(&["renew", "missing"]).inc();
                ApiError::not_found(VEHICLE_NOT_FOUND)
            })?;

        REGISTRY_MUTATIONS.with_label_values(&["renew", "success"]).inc();
        info!(
            vehicle_number = %renewed.vehicle_number,
            expiry = %renewed.licence_expiry_date,
            "licence renewed"
        );
        Ok(self.respond(renewed))
    }

    // ===== Saved Vehicles =====

    pub async fn save(&self, owner: &str, plate: &str) -> Result<MessageResponse, ApiError> {
        let key = Self::plate_key(plate)?;
        if self.store.find_by_number(&key).await?.is_none() {
            return Err(ApiError::not_found(VEHICLE_NOT_FOUND));
        }
        if !self.store.save_for(owner, &key).await? {
            return Err(ApiError::conflict(ALREADY_SAVED));
        }
        REGISTRY_MUTATIONS.with_label_values(&["save", "success"]).inc();
        Ok(MessageResponse::new("Vehicle saved successfully"))
    }

    pub async fn unsave(&self, owner: &str, plate: &str) -> Result<MessageResponse, ApiError> {
        let key = Self::plate_key(plate)?;
        if !self.store.unsave_for(owner, &key).await? {
            return Err(ApiError::not_found(NOT_IN_LIST));
        }
        REGISTRY_MUTATIONS.with_label_values(&["unsave", "success"]).inc();
        Ok(MessageResponse::new("Vehicle removed successfully"))
    }

    pub async fn saved(&self, owner: &str) -> Result<Vec<VehicleResponse>, ApiError> {
        let vehicles = self.store.saved_by(owner).await?;
        Ok(vehicles.into_iter().map(|v| self.respond(v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::LicenceStatus, store::MemoryVehicleStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> RegistryService {
        RegistryService::with_clock(
            Arc::new(MemoryVehicleStore::new()),
            Arc::new(|| NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default()),
        )
    }

    fn vehicle(number: &str, licence: &str, expiry: NaiveDate) -> Vehicle {
        Vehicle {
            vehicle_number: number.to_string(),
            licence_number: licence.to_string(),
            vehicle_class: "Dual Purpose".to_string(),
            fuel_type: "Diesel".to_string(),
            owner_name: "N. Fernando".to_string(),
            owner_address: "88 Main St, Negombo".to_string(),
            owner_nic: "199012345678".to_string(),
            district: "Gampaha".to_string(),
            licence_valid_from: date(2024, 6, 1),
            licence_expiry_date: expiry,
        }
    }

    #[tokio::test]
    async fn register_canonicalizes_and_lookup_tolerates_punctuation() {
        let svc = service();
        let created = svc
            .register(vehicle("wp cab-1234", " LIC-77 ", date(2025, 12, 31)))
            .await
            .unwrap();
        assert_eq!(created.vehicle.vehicle_number, "WPCAB1234");
        assert_eq!(created.vehicle.licence_number, "LIC-77");
        assert_eq!(created.status, LicenceStatus::Valid);

        let found = svc.get_by_plate("wp-cab 1234").await.unwrap();
        assert_eq!(found.vehicle.vehicle_number, "WPCAB1234");

        let by_licence = svc.get_by_licence("  LIC-77 ").await.unwrap();
        assert_eq!(by_licence.vehicle.vehicle_number, "WPCAB1234");
    }

    #[tokio::test]
    async fn duplicate_plate_is_bad_request() {
        let svc = service();
        svc.register(vehicle("CAB1234", "L1", date(2025, 12, 31))).await.unwrap();
        let err = svc
            .register(vehicle("cab 1234", "L2", date(2025, 12, 31)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Vehicle number already registered"));
    }

    #[tokio::test]
    async fn oversized_fields_are_bad_request() {
        let svc = service();
        let mut long_nic = vehicle("CAB1234", "L1", date(2025, 12, 31));
        long_nic.owner_nic = "2000123456789".to_string();
        assert!(matches!(
            svc.register(long_nic).await.unwrap_err(),
            ApiError::BadRequest(ref m) if m == "owner_nic must be at most 12 characters"
        ));

        // Punctuation is stripped before the plate is measured
        let spaced = vehicle("WP - CAB - 1234 - X - Y", "L2", date(2025, 12, 31));
        assert!(svc.register(spaced).await.is_ok());
        let long_plate = vehicle(&"A1".repeat(11), "L3", date(2025, 12, 31));
        assert!(matches!(
            svc.register(long_plate).await.unwrap_err(),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            svc.get_by_plate("CAB1234").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn missing_vehicles_are_not_found() {
        let svc = service();
        assert!(matches!(
            svc.get_by_plate("ZZ9999").await.unwrap_err(),
            ApiError::NotFound(ref m) if m == VEHICLE_NOT_FOUND
        ));
        assert!(matches!(
            svc.get_by_licence("NONE").await.unwrap_err(),
            ApiError::NotFound(ref m) if m == LICENCE_NOT_FOUND
        ));
        assert!(matches!(
            svc.get_by_plate("--").await.unwrap_err(),
            ApiError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn renew_turns_expired_into_valid() {
        let svc = service();
        let created = svc
            .register(vehicle("KX4455", "L9", date(2025, 5, 31)))
            .await
            .unwrap();
        assert_eq!(created.status, LicenceStatus::Expired);

        let renewed = svc
            .renew(
                "kx-4455",
                RenewLicenceRequest {
                    new_expiry_date: date(2026, 5, 31),
                    new_valid_from: Some(date(2025, 6, 1)),
                },
            )
            .await
            .unwrap();
        assert_eq!(renewed.status, LicenceStatus::Valid);
        assert_eq!(renewed.vehicle.licence_valid_from, date(2025, 6, 1));
    }

    #[tokio::test]
    async fn saved_vehicle_flow() {
        let svc = service();
        svc.register(vehicle("CAB1234", "L1", date(2025, 12, 31))).await.unwrap();

        assert!(matches!(
            svc.save("a@gov.lk", "NOPE1").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert_eq!(
            svc.save("a@gov.lk", "cab 1234").await.unwrap().message,
            "Vehicle saved successfully"
        );
        assert!(matches!(
            svc.save("a@gov.lk", "CAB1234").await.unwrap_err(),
            ApiError::Conflict(ref m) if m == ALREADY_SAVED
        ));

        let saved = svc.saved("a@gov.lk").await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].status, LicenceStatus::Valid);
        assert!(svc.saved("b@gov.lk").await.unwrap().is_empty());

        assert_eq!(
            svc.unsave("a@gov.lk", "CAB1234").await.unwrap().message,
            "Vehicle removed successfully"
        );
        assert!(matches!(
            svc.unsave("a@gov.lk", "CAB1234").await.unwrap_err(),
            ApiError::NotFound(ref m) if m == NOT_IN_LIST
        ));
    }
}
