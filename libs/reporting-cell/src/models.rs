use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::{AppointmentStatus, PaymentStatus};

// ==============================================================================
// REVENUE
// ==============================================================================

/// The slice of an appointment row that revenue arithmetic needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueRecord {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub appointment_date: NaiveDate,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub amount: f64,
}

/// Which records count towards a sum. `None` fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct RevenueFilter {
    pub statuses: Option<Vec<AppointmentStatus>>,
    pub payment_status: Option<PaymentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl RevenueFilter {
    /// Money actually received in a date range.
    pub fn paid_between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            statuses: None,
            payment_status: Some(PaymentStatus::Paid),
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn matches(&self, record: &RevenueRecord) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&record.status) {
                return false;
            }
        }
        if let Some(payment_status) = self.payment_status {
            if record.payment_status != payment_status {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.appointment_date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.appointment_date > to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupTotal {
    pub key: String,
    pub revenue: f64,
    pub count: usize,
    pub average_ticket: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub revenue: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfessionalRevenue {
    pub professional_id: Uuid,
    pub professional_name: String,
    pub specialty: String,
    pub revenue: f64,
    pub count: usize,
    pub average_ticket: f64,
    /// What the clinic owes the professional under their arrangement.
    pub payout: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub confirmed: usize,
    pub rescheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub no_show: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_revenue: f64,
    pub paid_appointments: usize,
    pub average_ticket: f64,
    pub previous_period_revenue: f64,
    pub revenue_variation_pct: f64,
    pub status_counts: StatusCounts,
    pub by_professional: Vec<ProfessionalRevenue>,
    pub by_specialty: Vec<GroupTotal>,
    pub by_day: Vec<DayTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ==============================================================================
// GOALS AND NOTIFICATIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialGoal {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub target_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertGoalRequest {
    pub professional_id: Uuid,
    pub month: u32,
    pub year: i32,
    pub target_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProgress {
    pub goal: FinancialGoal,
    pub current_amount: f64,
    /// Capped at 100 for display; `achieved` carries the real comparison.
    pub percentage: f64,
    pub remaining: f64,
    pub achieved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GoalListQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    GoalAchieved,
    AppointmentBooked,
    AppointmentCancelled,
    RescheduleRequested,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::GoalAchieved => "goal_achieved",
            NotificationType::AppointmentBooked => "appointment_booked",
            NotificationType::AppointmentCancelled => "appointment_cancelled",
            NotificationType::RescheduleRequested => "reschedule_requested",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub professional_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub professional_id: Option<Uuid>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportingError {
    #[error("Goal not found")]
    GoalNotFound,

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
