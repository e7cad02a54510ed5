use regex::Regex;

use crate::models::PatientIdentity;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

pub fn validate_email(email: &str) -> bool {
    email.len() <= 254
        && Regex::new(EMAIL_PATTERN)
            .map(|re| re.is_match(email))
            .unwrap_or(false)
}

/// Accepts formatted numbers; 10 to 15 digits once punctuation is removed.
pub fn validate_phone(phone: &str) -> bool {
    let allowed = phone.chars().all(|c| c.is_ascii_digit() || " +-().".contains(c));
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    allowed && (10..=15).contains(&digits)
}

/// Name and email are required; phone is optional but must look like a
/// phone number when present.
pub fn validate_patient(patient: &PatientIdentity) -> Result<(), String> {
    if patient.name.trim().is_empty() {
        return Err("Patient name is required".to_string());
    }
    if patient.name.trim().len() > 200 {
        return Err("Patient name is too long".to_string());
    }
    if patient.email.trim().is_empty() {
        return Err("Patient email is required".to_string());
    }
    if !validate_email(patient.email.trim()) {
        return Err("Patient email is invalid".to_string());
    }
    if let Some(phone) = patient.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        if !validate_phone(phone) {
            return Err("Patient phone is invalid".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(name: &str, email: &str, phone: Option<&str>) -> PatientIdentity {
        PatientIdentity {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
        }
    }

    #[test]
    fn email_format() {
        assert!(validate_email("maria.souza@example.com"));
        assert!(!validate_email("maria.souza@"));
        assert!(!validate_email("not an email"));
    }

    #[test]
    fn phone_is_optional() {
        assert!(validate_patient(&patient("Maria", "maria@example.com", None)).is_ok());
        assert!(validate_patient(&patient("Maria", "maria@example.com", Some(""))).is_ok());
        assert!(validate_patient(&patient("Maria", "maria@example.com", Some("(11) 91234-5678"))).is_ok());
        assert!(validate_patient(&patient("Maria", "maria@example.com", Some("12ab"))).is_err());
    }

    #[test]
    fn name_and_email_are_required() {
        assert!(validate_patient(&patient("  ", "maria@example.com", None)).is_err());
        assert!(validate_patient(&patient("Maria", "", None)).is_err());
    }
}
