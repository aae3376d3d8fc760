// src/db/models/request.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::borrow::{NewReturnableRequest, ReturnableRequestView};
use crate::db::models::job::{JobRequestView, NewJobRequest};
use crate::db::models::supply::{NewSupplyRequest, SupplyRequestView};
use crate::db::models::transport::{NewTransportRequest, TransportRequest};
use crate::db::models::venue::{NewVenueRequest, VenueRequest};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Job,
    Venue,
    Transport,
    Borrow,
    Supply,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Job => "job",
            RequestType::Venue => "venue",
            RequestType::Transport => "transport",
            RequestType::Borrow => "borrow",
            RequestType::Supply => "supply",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Reviewed,
    Approved,
    OnHold,
    Rejected,
    Cancelled,
    Completed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Reviewed => "reviewed",
            RequestStatus::Approved => "approved",
            RequestStatus::OnHold => "on_hold",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Completed => "completed",
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Rejected | RequestStatus::Cancelled | RequestStatus::Completed
        )
    }

    /// Statuses whose reservations block overlapping bookings. ON_HOLD
    /// releases the slot (see DESIGN.md).
    pub fn holds_reservation(&self) -> bool {
        matches!(
            self,
            RequestStatus::Pending | RequestStatus::Reviewed | RequestStatus::Approved
        )
    }
}

/// ✅ **Request envelope — one row per submission**
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct Request {
    pub id: i32,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub requested_by: i32,
    pub department_id: i32,
    pub reviewed_by: Option<i32>,
    pub rejection_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub on_hold_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

/// Type-specific creation payload, discriminated by `type`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPayload {
    Job(NewJobRequest),
    Venue(NewVenueRequest),
    Transport(NewTransportRequest),
    Borrow(NewReturnableRequest),
    Supply(NewSupplyRequest),
}

impl RequestPayload {
    pub fn request_type(&self) -> RequestType {
        match self {
            RequestPayload::Job(_) => RequestType::Job,
            RequestPayload::Venue(_) => RequestType::Venue,
            RequestPayload::Transport(_) => RequestType::Transport,
            RequestPayload::Borrow(_) => RequestType::Borrow,
            RequestPayload::Supply(_) => RequestType::Supply,
        }
    }
}

/// ✅ **New Request (Frontend Sends This)**
#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRequest {
    /// Defaults to the submitting actor's own department.
    pub department_id: Option<i32>,
    pub payload: RequestPayload,
}

/// Payload for the generic status-transition endpoint.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusUpdate {
    pub target: RequestStatus,
    pub reason: Option<String>,
}

/// Payload for a requester editing the reservation window of their own
/// still-pending request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleUpdate {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Type-specific detail joined onto the envelope for reads.
#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecializationView {
    Job(JobRequestView),
    Venue(VenueRequest),
    Transport(TransportRequest),
    Borrow(ReturnableRequestView),
    Supply(SupplyRequestView),
}

/// ✅ **Request Response (envelope + specialization detail)**
#[derive(Debug, Serialize, Clone, ToSchema)]
pub struct RequestWithDetail {
    pub request: Request,
    pub detail: SpecializationView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(RequestStatus::Rejected.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(RequestStatus::Completed.is_terminal());
        assert!(!RequestStatus::OnHold.is_terminal());
        assert!(!RequestStatus::Approved.is_terminal());
    }

    #[test]
    fn on_hold_releases_the_reservation() {
        assert!(RequestStatus::Pending.holds_reservation());
        assert!(RequestStatus::Reviewed.holds_reservation());
        assert!(RequestStatus::Approved.holds_reservation());
        assert!(!RequestStatus::OnHold.holds_reservation());
        assert!(!RequestStatus::Cancelled.holds_reservation());
    }

    #[test]
    fn payload_discriminator_is_parsed_from_tag() {
        let raw = serde_json::json!({
            "type": "venue",
            "venue_id": 3,
            "start_time": "2026-03-02T10:00:00",
            "end_time": "2026-03-02T12:00:00",
            "setup_requirements": ["projector"]
        });
        let payload: RequestPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.request_type(), RequestType::Venue);
    }
}
