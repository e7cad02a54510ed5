use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::{AppConfig, ClinicSettings};
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, CheckoutSession, PaymentOutcome, PaymentStatus,
    PaymentVerification,
};
use crate::services::booking::AppointmentBookingService;

fn with_query(url: &str, query: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

/// Builds the body sent to the checkout function.
pub fn checkout_payload(appointment: &Appointment, settings: &ClinicSettings) -> Value {
    let query = format!("appointment_id={}", appointment.id);

    json!({
        "appointment_id": appointment.id,
        "amount": appointment.amount,
        "description": format!(
            "{} appointment on {} at {}",
            settings.clinic_name,
            appointment.appointment_date.format("%d/%m/%Y"),
            appointment.appointment_time.format("%H:%M")
        ),
        "customer_email": appointment.patient_email,
        "success_url": with_query(&settings.payment_success_url, &query),
        "cancel_url": with_query(&settings.payment_cancel_url, &query)
    })
}

/// Hand-off to the hosted payment gateway through serverless functions.
pub struct PaymentService {
    supabase: Arc<SupabaseClient>,
    booking: AppointmentBookingService,
    settings: ClinicSettings,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)), config.clinic.clone())
    }

    pub fn with_client(supabase: Arc<SupabaseClient>, settings: ClinicSettings) -> Self {
        Self {
            booking: AppointmentBookingService::with_client(Arc::clone(&supabase), settings.clone()),
            supabase,
            settings,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_payment_configured()
    }

    /// Opens a checkout session for an unpaid appointment and remembers its id.
    pub async fn create_checkout(
        &self,
        appointment: &Appointment,
        auth_token: Option<&str>,
    ) -> Result<CheckoutSession, AppointmentError> {
        if !self.is_configured() {
            return Err(AppointmentError::PaymentNotConfigured);
        }
        if !matches!(appointment.payment_status, PaymentStatus::Pending | PaymentStatus::Failed) {
            return Err(AppointmentError::InvalidPaymentTransition {
                from: appointment.payment_status,
                to: PaymentStatus::Paid,
            });
        }
        if appointment.status.is_terminal() {
            return Err(AppointmentError::ValidationError(
                format!("A {} appointment cannot be paid", appointment.status)
            ));
        }

        debug!("Creating checkout for appointment {}", appointment.id);
        let response: Value = self.supabase
            .invoke_function(
                &self.settings.checkout_function,
                auth_token,
                checkout_payload(appointment, &self.settings),
            )
            .await
            .map_err(|e| {
                error!("Checkout creation failed for {}: {}", appointment.id, e);
                AppointmentError::ExternalServiceError(e.to_string())
            })?;

        let session: CheckoutSession = serde_json::from_value(response)
            .map_err(|e| AppointmentError::ExternalServiceError(format!("Unexpected checkout response: {}", e)))?;

        self.booking.store_payment_session(appointment.id, &session.session_id, auth_token).await?;

        info!("Checkout session {} opened for appointment {}", session.session_id, appointment.id);
        Ok(session)
    }

    /// Asks the gateway how the session ended and applies the result.
    /// The session id must be the one stored on the appointment.
    pub async fn verify_payment(
        &self,
        appointment_id: Uuid,
        session_id: &str,
        auth_token: Option<&str>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.booking.get_appointment(appointment_id, auth_token).await?;

        if appointment.payment_session_id.as_deref() != Some(session_id) {
            return Err(AppointmentError::PaymentSessionMismatch);
        }
        if appointment.payment_status == PaymentStatus::Paid {
            debug!("Appointment {} already paid", appointment_id);
            return Ok(appointment);
        }

        let verification: PaymentVerification = self.supabase
            .invoke_function(
                &self.settings.verify_payment_function,
                auth_token,
                json!({ "session_id": session_id, "appointment_id": appointment_id }),
            )
            .await
            .map_err(|e| {
                error!("Payment verification failed for {}: {}", appointment_id, e);
                AppointmentError::ExternalServiceError(e.to_string())
            })?;

        let outcome = PaymentOutcome::from_provider_status(&verification.status);
        info!("Payment session {} for appointment {} is {:?}", session_id, appointment_id, outcome);

        self.booking.apply_payment_outcome(&appointment, outcome, auth_token).await
    }
}
