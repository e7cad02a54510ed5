use chrono::{Duration, NaiveDateTime};
use tracing::warn;

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::lifecycle::AppointmentLifecycleService;

/// A patient may cancel while the appointment is neither cancelled nor
/// completed and starts strictly later than `now + notice`.
pub fn can_cancel(appointment: &Appointment, now: NaiveDateTime, notice: Duration) -> bool {
    !matches!(appointment.status, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
        && now + notice < appointment.scheduled_at()
}

pub fn can_request_reschedule(appointment: &Appointment) -> bool {
    matches!(appointment.status, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
}

/// Patient-initiated cancellation: lifecycle rules plus the notice window.
pub fn check_patient_cancellation(
    appointment: &Appointment,
    now: NaiveDateTime,
    notice: Duration,
) -> Result<(), AppointmentError> {
    check_staff_cancellation(appointment, now)?;

    if !can_cancel(appointment, now, notice) {
        warn!("Cancellation of {} refused inside the notice window", appointment.id);
        return Err(AppointmentError::CancellationWindowClosed { hours: notice.num_hours() });
    }
    Ok(())
}

/// Staff cancellation only needs a legal lifecycle transition.
pub fn check_staff_cancellation(appointment: &Appointment, now: NaiveDateTime) -> Result<(), AppointmentError> {
    AppointmentLifecycleService::new().validate_status_transition(
        appointment.status,
        AppointmentStatus::Cancelled,
        appointment.scheduled_at(),
        now,
    )
}

pub fn check_reschedule_request(appointment: &Appointment) -> Result<(), AppointmentError> {
    if !can_request_reschedule(appointment) {
        return Err(AppointmentError::RescheduleNotAllowed(appointment.status));
    }
    Ok(())
}
