use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::AppointmentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Professional {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub payment_type: PaymentType,
    pub payment_value: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Professional {
    pub fn arrangement(&self) -> PaymentArrangement {
        match self.payment_type {
            PaymentType::Percentage => PaymentArrangement::Percentage(self.payment_value),
            PaymentType::Fixed => PaymentArrangement::FixedFee(self.payment_value),
        }
    }

    pub fn attends(&self, specialty: &str) -> bool {
        self.specialty.trim().eq_ignore_ascii_case(specialty.trim())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Percentage,
    Fixed,
}

/// How the clinic pays a professional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaymentArrangement {
    /// Share of revenue, in percent.
    Percentage(f64),
    /// Flat amount per attended appointment.
    FixedFee(f64),
}

/// A bookable service from the clinic catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicService {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub price: f64,
    pub duration_minutes: i32,
    pub description: Option<String>,
    pub is_active: bool,
}

/// Recurring weekly availability of a professional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub day_of_week: i32, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: bool,
}

/// Ad hoc exclusion on a single date. No bounds means the whole day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedTime {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub blocked_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl BlockedTime {
    pub fn is_whole_day(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }

    /// Whether a slot starting at `time` falls inside `[start, end)`.
    /// A missing bound leaves that side open.
    pub fn covers(&self, time: NaiveTime) -> bool {
        if self.is_whole_day() {
            return true;
        }
        let after_start = self.start_time.map_or(true, |start| time >= start);
        let before_end = self.end_time.map_or(true, |end| time < end);
        after_start && before_end
    }
}

/// The slice of an appointment row needed to label slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAppointment {
    pub id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub patient_name: String,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    #[serde(flatten)]
    pub state: SlotState,
}

impl Slot {
    pub fn is_available(&self) -> bool {
        matches!(self.state, SlotState::Available)
    }

    /// Public view: who booked the slot is not disclosed.
    pub fn redacted(mut self) -> Self {
        if let SlotState::Booked { appointment_id, patient_name, .. } = &mut self.state {
            *appointment_id = None;
            *patient_name = None;
        }
        if let SlotState::Blocked { reason } = &mut self.state {
            *reason = None;
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    Available,
    Booked {
        appointment_id: Option<Uuid>,
        patient_name: Option<String>,
        status: AppointmentStatus,
    },
    Blocked {
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySlotsResponse {
    pub professional_id: Uuid,
    pub date: NaiveDate,
    /// False when the professional has no schedule on this weekday.
    pub offered: bool,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockedTimeRequest {
    pub blocked_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableDatesQuery {
    pub from: Option<NaiveDate>,
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalSearchQuery {
    pub specialty: Option<String>,
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProfessionalError {
    #[error("Professional not found")]
    NotFound,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Schedule not found")]
    ScheduleNotFound,

    #[error("Professional is not active")]
    Inactive,

    #[error("Schedule overlaps an existing schedule on the same weekday")]
    ScheduleOverlap,

    #[error("Validation error: {0}")]
    ValidationError(String),
}
