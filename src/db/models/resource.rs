// src/db/models/resource.rs
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Availability of an exclusive, time-bound resource (venue, vehicle,
/// borrowable item).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "resource_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    InUse,
    UnderMaintenance,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::InUse => "in_use",
            ResourceStatus::UnderMaintenance => "under_maintenance",
        }
    }
}

/// The kind of resource a reservation is held against; doubles as the
/// table discriminator for the conflict checker.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Venue,
    Vehicle,
    Item,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct Venue {
    pub id: i32,
    pub name: String,
    pub department_id: i32,
    pub capacity: Option<i32>,
    pub status: ResourceStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct Vehicle {
    pub id: i32,
    pub plate_number: String,
    pub model: Option<String>,
    pub status: ResourceStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct BorrowableItem {
    pub id: i32,
    pub name: String,
    pub status: ResourceStatus,
}
