use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus, PaymentStatus};

/// Legal moves between appointment and payment states.
#[derive(Debug, Default, Clone, Copy)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed at `now`.
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
        scheduled_at: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        // Attendance can only be recorded once the appointment time has passed
        if matches!(new_status, AppointmentStatus::Completed | AppointmentStatus::NoShow) && scheduled_at > now {
            return Err(AppointmentError::InvalidTime(format!(
                "Appointment cannot be marked {} before it takes place",
                new_status
            )));
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
                AppointmentStatus::Cancelled,
                AppointmentStatus::Rescheduled,
            ],
            AppointmentStatus::Rescheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::NoShow,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
            AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn validate_payment_transition(
        &self,
        current: PaymentStatus,
        new: PaymentStatus,
    ) -> Result<(), AppointmentError> {
        if !self.get_valid_payment_transitions(current).contains(&new) {
            warn!("Invalid payment transition attempted: {} -> {}", current, new);
            return Err(AppointmentError::InvalidPaymentTransition { from: current, to: new });
        }
        Ok(())
    }

    pub fn get_valid_payment_transitions(&self, current: PaymentStatus) -> Vec<PaymentStatus> {
        match current {
            PaymentStatus::Pending => vec![PaymentStatus::Paid, PaymentStatus::Failed],
            PaymentStatus::Failed => vec![PaymentStatus::Paid, PaymentStatus::Pending],
            PaymentStatus::Paid => vec![PaymentStatus::Refunded],
            PaymentStatus::Refunded => vec![],
        }
    }

    /// Status that a confirmed payment moves the appointment to, if any.
    pub fn status_after_payment(&self, current_status: AppointmentStatus) -> Option<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending | AppointmentStatus::Rescheduled => Some(AppointmentStatus::Confirmed),
            _ => None,
        }
    }
}
