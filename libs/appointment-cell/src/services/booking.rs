use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use professional_cell::models::ProfessionalError;
use professional_cell::services::{CatalogService, SlotService};
use reporting_cell::models::{NewNotification, NotificationType};
use reporting_cell::services::{GoalService, NotificationService};
use shared_config::{AppConfig, ClinicSettings};
use shared_database::supabase::{SupabaseClient, SupabaseError};
use shared_models::auth::User;

use crate::models::{
    AgendaQuery, Appointment, AppointmentError, AppointmentStatus, BookingRequest,
    CancelAppointmentRequest, PaymentOutcome, PaymentStatus, RescheduleRequest,
    UpdatePaymentStatusRequest, UpdateStatusRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy::{check_patient_cancellation, check_reschedule_request, check_staff_cancellation};
use crate::services::validation::validate_patient;

fn database_error(error: anyhow::Error) -> AppointmentError {
    if let Some(err) = SupabaseError::from_anyhow(&error) {
        if err.is_conflict() {
            // Unique (professional, date, time) index on active appointments
            return AppointmentError::SlotNotAvailable;
        }
        if err.is_auth() {
            return AppointmentError::Unauthorized;
        }
    }
    AppointmentError::DatabaseError(error.to_string())
}

fn catalog_error(error: anyhow::Error) -> AppointmentError {
    match error.downcast_ref::<ProfessionalError>() {
        Some(ProfessionalError::ServiceNotFound) => AppointmentError::ServiceNotFound,
        Some(ProfessionalError::NotFound) => AppointmentError::ProfessionalNotFound,
        Some(ProfessionalError::Inactive) => AppointmentError::ProfessionalInactive,
        _ => database_error(error),
    }
}

/// Patients may only touch appointments booked under their own email.
pub fn ensure_access(appointment: &Appointment, user: &User) -> Result<(), AppointmentError> {
    if user.is_staff() || user.has_email(&appointment.patient_email) {
        return Ok(());
    }
    warn!("User {} denied access to appointment {}", user.id, appointment.id);
    Err(AppointmentError::Unauthorized)
}

fn append_note(existing: Option<&str>, note: String) -> String {
    match existing.filter(|n| !n.trim().is_empty()) {
        Some(existing) => format!("{}\n{}", existing, note),
        None => note,
    }
}

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    catalog: CatalogService,
    slot_service: SlotService,
    notifications: NotificationService,
    goals: GoalService,
    lifecycle: AppointmentLifecycleService,
    settings: ClinicSettings,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.clinic.clone())
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, settings: ClinicSettings) -> Self {
        Self {
            catalog: CatalogService::with_client(Arc::clone(&supabase)),
            slot_service: SlotService::with_client(Arc::clone(&supabase)),
            notifications: NotificationService::with_client(Arc::clone(&supabase)),
            goals: GoalService::with_client(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            supabase,
            settings,
        }
    }

    pub fn settings(&self) -> &ClinicSettings {
        &self.settings
    }

    fn now(&self) -> NaiveDateTime {
        self.settings.now_local()
    }

    /// Commit a booking as `pending`/`pending`. Everything the wizard checked
    /// is checked again here against fresh data.
    pub async fn book_appointment(
        &self,
        request: BookingRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        info!("Booking appointment with professional {} on {} at {}",
              request.professional_id, request.appointment_date, request.appointment_time);

        validate_patient(&request.patient).map_err(AppointmentError::ValidationError)?;

        let scheduled_at = request.appointment_date.and_time(request.appointment_time);
        if scheduled_at <= self.now() {
            return Err(AppointmentError::InvalidTime("Appointment time must be in the future".to_string()));
        }

        let (service, professional) = futures::try_join!(
            self.catalog.get_service(request.service_id, auth_token),
            self.catalog.get_professional(request.professional_id, auth_token),
        )
        .map_err(catalog_error)?;

        if !service.is_active {
            return Err(AppointmentError::ServiceInactive);
        }
        if !professional.is_active {
            return Err(AppointmentError::ProfessionalInactive);
        }
        if !professional.attends(&service.specialty) {
            return Err(AppointmentError::SpecialtyMismatch { specialty: service.specialty.clone() });
        }

        let slots = self.slot_service
            .get_day_slots(request.professional_id, request.appointment_date, auth_token)
            .await
            .map_err(database_error)?;

        let slot = slots.iter()
            .find(|slot| slot.start_time == request.appointment_time)
            .ok_or_else(|| AppointmentError::InvalidTime(
                "Requested time is not a slot of the professional's schedule".to_string()
            ))?;

        if !slot.is_available() {
            warn!("Slot {} {} for professional {} is taken",
                  request.appointment_date, request.appointment_time, request.professional_id);
            return Err(AppointmentError::SlotNotAvailable);
        }

        let phone = request.patient.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "professional_id": request.professional_id,
            "service_id": request.service_id,
            "appointment_date": request.appointment_date,
            "appointment_time": request.appointment_time,
            "patient_name": request.patient.name.trim(),
            "patient_email": request.patient.email.trim().to_lowercase(),
            "patient_phone": phone,
            "status": AppointmentStatus::Pending,
            "payment_status": PaymentStatus::Pending,
            "amount": service.price,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        let result = self.supabase
            .write_returning(Method::POST, "/rest/v1/appointments", auth_token, body)
            .await
            .map_err(database_error)?;

        let row = result.into_iter().next()
            .ok_or_else(|| AppointmentError::DatabaseError("Appointment insert returned no rows".to_string()))?;
        let appointment: Appointment = serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        self.notify(
            &appointment,
            NotificationType::AppointmentBooked,
            "New appointment",
            format!("{} booked {} at {}", appointment.patient_name,
                    appointment.appointment_date, appointment.appointment_time.format("%H:%M")),
            auth_token,
        ).await;

        info!("Appointment {} booked with professional {}", appointment.id, appointment.professional_id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None)
            .await
            .map_err(database_error)?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointment: {}", e)))
    }

    /// Staff agenda for a date range, in chronological order.
    pub async fn list_agenda(&self, query: &AgendaQuery, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        if query.from > query.to {
            return Err(AppointmentError::ValidationError("'from' must not be after 'to'".to_string()));
        }

        let mut path = format!(
            "/rest/v1/appointments?appointment_date=gte.{}&appointment_date=lte.{}&order=appointment_date.asc,appointment_time.asc",
            query.from, query.to
        );
        if let Some(professional_id) = query.professional_id {
            path.push_str(&format!("&professional_id=eq.{}", professional_id));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(database_error)?;

        let appointments = result.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        debug!("Agenda {} to {}: {} appointments", query.from, query.to, appointments.len());
        Ok(appointments)
    }

    /// Patients are held to the notice window; staff are not.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, Some(auth_token)).await?;
        ensure_access(&appointment, user)?;

        let now = self.now();
        if user.is_staff() {
            check_staff_cancellation(&appointment, now)?;
        } else {
            check_patient_cancellation(&appointment, now, self.settings.cancellation_notice())?;
        }

        let by = if user.is_staff() { "clinic" } else { "patient" };
        let note = match request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => format!("Cancelled by {}: {}", by, reason),
            None => format!("Cancelled by {}", by),
        };

        let mut update = Map::new();
        update.insert("status".to_string(), json!(AppointmentStatus::Cancelled));
        update.insert("notes".to_string(), json!(append_note(appointment.notes.as_deref(), note)));
        let cancelled = self.update_record(appointment_id, update, Some(auth_token)).await?;

        self.notify(
            &cancelled,
            NotificationType::AppointmentCancelled,
            "Appointment cancelled",
            format!("{} on {} at {} was cancelled by the {}", cancelled.patient_name,
                    cancelled.appointment_date, cancelled.appointment_time.format("%H:%M"), by),
            Some(auth_token),
        ).await;

        info!("Appointment {} cancelled by {}", appointment_id, user.id);
        Ok(cancelled)
    }

    /// Flags the appointment for staff follow-up. No new slot is assigned.
    pub async fn request_reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, Some(auth_token)).await?;
        ensure_access(&appointment, user)?;
        check_reschedule_request(&appointment)?;

        let mut update = Map::new();
        update.insert("status".to_string(), json!(AppointmentStatus::Rescheduled));
        if let Some(reason) = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            update.insert(
                "notes".to_string(),
                json!(append_note(appointment.notes.as_deref(), format!("Reschedule requested: {}", reason))),
            );
        }
        let updated = self.update_record(appointment_id, update, Some(auth_token)).await?;

        self.notify(
            &updated,
            NotificationType::RescheduleRequested,
            "Reschedule requested",
            format!("{} asked to reschedule {} at {}", updated.patient_name,
                    updated.appointment_date, updated.appointment_time.format("%H:%M")),
            Some(auth_token),
        ).await;

        info!("Reschedule requested for appointment {}", appointment_id);
        Ok(updated)
    }

    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, Some(auth_token)).await?;

        self.lifecycle.validate_status_transition(
            appointment.status,
            request.status,
            appointment.scheduled_at(),
            self.now(),
        )?;

        let mut update = Map::new();
        update.insert("status".to_string(), json!(request.status));
        if let Some(notes) = request.notes {
            update.insert("notes".to_string(), json!(append_note(appointment.notes.as_deref(), notes)));
        }

        let updated = self.update_record(appointment_id, update, Some(auth_token)).await?;
        info!("Appointment {} moved from {} to {}", appointment_id, appointment.status, updated.status);
        Ok(updated)
    }

    pub async fn update_payment_status(
        &self,
        appointment_id: Uuid,
        request: UpdatePaymentStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, Some(auth_token)).await?;
        self.lifecycle.validate_payment_transition(appointment.payment_status, request.payment_status)?;

        if request.payment_status == PaymentStatus::Paid {
            return self.confirm_payment(&appointment, Some(auth_token)).await;
        }

        let mut update = Map::new();
        update.insert("payment_status".to_string(), json!(request.payment_status));
        let updated = self.update_record(appointment_id, update, Some(auth_token)).await?;

        info!("Appointment {} payment moved from {} to {}",
              appointment_id, appointment.payment_status, updated.payment_status);
        Ok(updated)
    }

    /// Apply what the payment provider reported for a checkout session.
    pub async fn apply_payment_outcome(
        &self,
        appointment: &Appointment,
        outcome: PaymentOutcome,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        match outcome {
            PaymentOutcome::Paid if appointment.payment_status == PaymentStatus::Paid => Ok(appointment.clone()),
            PaymentOutcome::Paid => {
                self.lifecycle.validate_payment_transition(appointment.payment_status, PaymentStatus::Paid)?;
                self.confirm_payment(appointment, auth_token).await
            }
            PaymentOutcome::Failed if appointment.payment_status == PaymentStatus::Pending => {
                let mut update = Map::new();
                update.insert("payment_status".to_string(), json!(PaymentStatus::Failed));
                warn!("Payment for appointment {} failed", appointment.id);
                self.update_record(appointment.id, update, auth_token).await
            }
            _ => Ok(appointment.clone()),
        }
    }

    pub async fn store_payment_session(
        &self,
        appointment_id: Uuid,
        session_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let mut update = Map::new();
        update.insert("payment_session_id".to_string(), json!(session_id));
        self.update_record(appointment_id, update, auth_token).await
    }

    /// Marks the appointment paid (and confirmed when still awaiting
    /// confirmation), then checks the professional's monthly goal.
    async fn confirm_payment(
        &self,
        appointment: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let mut update = Map::new();
        update.insert("payment_status".to_string(), json!(PaymentStatus::Paid));
        if let Some(status) = self.lifecycle.status_after_payment(appointment.status) {
            update.insert("status".to_string(), json!(status));
        }

        let updated = self.update_record(appointment.id, update, auth_token).await?;
        info!("Appointment {} paid ({})", updated.id, updated.status);

        // Goal tracking is advisory; a failure here must not undo the payment
        if let Err(e) = self.goals
            .check_goal_achievement(updated.professional_id, updated.appointment_date, auth_token)
            .await
        {
            warn!("Goal check for professional {} failed: {}", updated.professional_id, e);
        }

        Ok(updated)
    }

    async fn update_record(
        &self,
        appointment_id: Uuid,
        mut update: Map<String, Value>,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result = self.supabase
            .write_returning(Method::PATCH, &path, auth_token, Value::Object(update))
            .await
            .map_err(database_error)?;

        let row = result.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row)
            .map_err(|e| AppointmentError::DatabaseError(format!("Failed to parse updated appointment: {}", e)))
    }

    async fn notify(
        &self,
        appointment: &Appointment,
        notification_type: NotificationType,
        title: &str,
        message: String,
        auth_token: Option<&str>,
    ) {
        let notification = NewNotification {
            professional_id: Some(appointment.professional_id),
            notification_type,
            title: title.to_string(),
            message,
            reference_id: Some(appointment.id),
        };

        if let Err(e) = self.notifications.create(notification, auth_token).await {
            warn!("Failed to record {} notification for {}: {}", notification_type.as_str(), appointment.id, e);
        }
    }
}
