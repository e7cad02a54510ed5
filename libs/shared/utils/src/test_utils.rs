use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, ClinicSettings};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic: ClinicSettings,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic: ClinicSettings {
                payment_success_url: "https://clinic.test/payment/success".to_string(),
                payment_cancel_url: "https://clinic.test/payment/cancel".to_string(),
                ..ClinicSettings::default()
            },
        }
    }
}

impl TestConfig {
    /// Point the config at a mock backend (e.g. `MockServer::uri()`).
    pub fn with_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            server_port: 3000,
            clinic: self.clinic.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "patient@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": "authenticated",
            "app_metadata": { "role": user.role },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Row shapes as the hosted backend returns them.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn professional_response(professional_id: &str, full_name: &str, specialty: &str) -> serde_json::Value {
        json!({
            "id": professional_id,
            "full_name": full_name,
            "specialty": specialty,
            "email": "professional@clinic.test",
            "phone": "11987654321",
            "is_active": true,
            "payment_type": "percentage",
            "payment_value": 60.0,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn service_response(service_id: &str, name: &str, specialty: &str, price: f64) -> serde_json::Value {
        json!({
            "id": service_id,
            "name": name,
            "specialty": specialty,
            "price": price,
            "duration_minutes": 30,
            "description": null,
            "is_active": true
        })
    }

    pub fn schedule_response(
        professional_id: &str,
        day_of_week: i32,
        start_time: &str,
        end_time: &str,
        slot_duration_minutes: i32,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "professional_id": professional_id,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "slot_duration_minutes": slot_duration_minutes,
            "is_active": true
        })
    }

    pub fn blocked_time_response(
        professional_id: &str,
        blocked_date: &str,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "professional_id": professional_id,
            "blocked_date": blocked_date,
            "start_time": start_time,
            "end_time": end_time,
            "reason": "Unavailable"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        professional_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "professional_id": professional_id,
            "service_id": null,
            "appointment_date": date,
            "appointment_time": time,
            "patient_name": "Maria Souza",
            "patient_email": "patient@example.com",
            "patient_phone": "11912345678",
            "status": status,
            "payment_status": "pending",
            "amount": 150.0,
            "payment_session_id": null,
            "notes": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn goal_response(professional_id: &str, month: u32, year: i32, target_amount: f64) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "professional_id": professional_id,
            "month": month,
            "year": year,
            "target_amount": target_amount
        })
    }

    pub fn notification_response(professional_id: &str, notification_type: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "professional_id": professional_id,
            "notification_type": notification_type,
            "title": "Notification",
            "message": "Message",
            "reference_id": null,
            "is_read": false,
            "created_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
