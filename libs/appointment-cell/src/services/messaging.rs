use shared_config::ClinicSettings;

use crate::models::{Appointment, AppointmentError, MessageKind};

const WHATSAPP_BASE_URL: &str = "https://wa.me";

/// Digits only, with the default country code prepended to local numbers
/// (10 or 11 digits: area code plus subscriber number).
pub fn normalize_phone(phone: &str, default_country_code: &str) -> Option<String> {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_start_matches('0').to_string();

    match digits.len() {
        0..=7 => None,
        10 | 11 => Some(format!("{}{}", default_country_code, digits)),
        _ => Some(digits),
    }
}

pub fn message_text(kind: MessageKind, appointment: &Appointment, clinic_name: &str) -> String {
    let date = appointment.appointment_date.format("%d/%m/%Y");
    let time = appointment.appointment_time.format("%H:%M");
    let name = appointment.patient_name.trim();

    match kind {
        MessageKind::Confirmation => format!(
            "Hello {}, your appointment at {} is confirmed for {} at {}.",
            name, clinic_name, date, time
        ),
        MessageKind::Reminder => format!(
            "Hello {}, this is a reminder of your appointment at {} on {} at {}.",
            name, clinic_name, date, time
        ),
        MessageKind::Cancellation => format!(
            "Hello {}, your appointment at {} on {} at {} has been cancelled.",
            name, clinic_name, date, time
        ),
        MessageKind::Reschedule => format!(
            "Hello {}, we received your request to reschedule the appointment at {} on {} at {}. We will contact you with new times.",
            name, clinic_name, date, time
        ),
    }
}

pub fn whatsapp_link(phone_digits: &str, text: &str) -> String {
    format!("{}/{}?text={}", WHATSAPP_BASE_URL, phone_digits, urlencoding::encode(text))
}

/// Pre-filled chat link to the patient. Nothing is sent from here.
pub fn patient_message_link(
    appointment: &Appointment,
    kind: MessageKind,
    settings: &ClinicSettings,
) -> Result<String, AppointmentError> {
    let phone = appointment.patient_phone.as_deref()
        .and_then(|phone| normalize_phone(phone, &settings.default_country_code))
        .ok_or(AppointmentError::MissingPhone)?;

    let text = message_text(kind, appointment, &settings.clinic_name);
    Ok(whatsapp_link(&phone, &text))
}
