use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use shared_models::{AppointmentStatus, PaymentStatus};

// ==============================================================================
// APPOINTMENT
// ==============================================================================

/// Booked unit, keyed by (professional, date, time). Date and time are
/// clinic-local wall clock values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub service_id: Option<Uuid>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: Option<String>,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub payment_session_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.appointment_date.and_time(self.appointment_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientIdentity {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Final output of the booking wizard; also the body of `POST /book`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingRequest {
    pub service_id: Uuid,
    pub professional_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub patient: PatientIdentity,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub appointment: Appointment,
    pub checkout: Option<CheckoutSession>,
}

// ==============================================================================
// REQUESTS AND QUERIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RescheduleRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub professional_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub session_id: String,
}

// ==============================================================================
// PAYMENT AND MESSAGING
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    #[serde(alias = "sessionId")]
    pub session_id: String,
    pub url: String,
}

/// What the verify function reports for a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentVerification {
    pub status: String,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    Open,
}

impl PaymentOutcome {
    pub fn from_provider_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "paid" | "complete" | "completed" | "succeeded" => PaymentOutcome::Paid,
            "failed" | "expired" | "canceled" | "cancelled" => PaymentOutcome::Failed,
            _ => PaymentOutcome::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Confirmation,
    Reminder,
    Cancellation,
    Reschedule,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageLinkQuery {
    #[serde(default)]
    pub kind: MessageKind,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment slot not available")]
    SlotNotAvailable,

    #[error("Service not found")]
    ServiceNotFound,

    #[error("Service is not offered")]
    ServiceInactive,

    #[error("Professional not found")]
    ProfessionalNotFound,

    #[error("Professional is not accepting appointments")]
    ProfessionalInactive,

    #[error("Professional does not attend {specialty}")]
    SpecialtyMismatch { specialty: String },

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Cannot change appointment from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Cannot change payment from {from} to {to}")]
    InvalidPaymentTransition { from: PaymentStatus, to: PaymentStatus },

    #[error("Appointments can only be cancelled more than {hours} hours in advance")]
    CancellationWindowClosed { hours: i64 },

    #[error("Reschedule cannot be requested for a {0} appointment")]
    RescheduleNotAllowed(AppointmentStatus),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment session does not match this appointment")]
    PaymentSessionMismatch,

    #[error("Payments are not configured")]
    PaymentNotConfigured,

    #[error("Patient has no phone number")]
    MissingPhone,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),
}
