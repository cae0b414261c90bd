use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ===== Vehicle Models =====

/// One registered vehicle and its revenue licence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    /// Canonical plate: ASCII letters and digits, upper case
    pub vehicle_number: String,
    pub licence_number: String,
    pub vehicle_class: String,
    pub fuel_type: String,
    pub owner_name: String,
    pub owner_address: String,
    pub owner_nic: String,
    pub district: String,
    pub licence_valid_from: NaiveDate,
    pub licence_expiry_date: NaiveDate,
}

impl Vehicle {
    /// Column widths of the `vehicles` table, in characters
    const FIELD_LIMITS: [(&'static str, usize); 8] = [
        ("vehicle_number", 20),
        ("licence_number", 50),
        ("vehicle_class", 100),
        ("fuel_type", 50),
        ("owner_name", 255),
        ("owner_address", 500),
        ("owner_nic", 12),
        ("district", 100),
    ];

    fn text_fields(&self) -> [&str; 8] {
        [
            &self.vehicle_number,
            &self.licence_number,
            &self.vehicle_class,
            &self.fuel_type,
            &self.owner_name,
            &self.owner_address,
            &self.owner_nic,
            &self.district,
        ]
    }

    /// Reject text that would not fit its column
    pub fn check_lengths(&self) -> Result<(), String> {
        for ((field, limit), value) in Self::FIELD_LIMITS.iter().zip(self.text_fields()) {
            if value.chars().count() > *limit {
                return Err(format!("{field} must be at most {limit} characters"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LicenceStatus {
    Valid,
    Expired,
}

impl LicenceStatus {
    /// Expired only once the expiry date is strictly in the past
    pub fn on(expiry: NaiveDate, today: NaiveDate) -> Self {
        if expiry < today {
            LicenceStatus::Expired
        } else {
            LicenceStatus::Valid
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleResponse {
    #[serde(flatten)]
    pub vehicle: Vehicle,
    pub status: LicenceStatus,
}

impl VehicleResponse {
    pub fn new(vehicle: Vehicle, today: NaiveDate) -> Self {
        let status = LicenceStatus::on(vehicle.licence_expiry_date, today);
        Self { vehicle, status }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenewLicenceRequest {
    pub new_expiry_date: NaiveDate,
    #[serde(default)]
    pub new_valid_from: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
