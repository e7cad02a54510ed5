use std::env;
use std::str::FromStr;

use chrono::{Duration, FixedOffset, NaiveDateTime, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub server_port: u16,
    pub clinic: ClinicSettings,
}

/// Clinic-wide business settings. Every recognised environment key maps to
/// exactly one field here.
#[derive(Debug, Clone)]
pub struct ClinicSettings {
    pub clinic_name: String,
    /// Minimum lead time for a patient-initiated cancellation.
    pub cancellation_notice_hours: i64,
    /// Offset of the clinic's wall clock from UTC. Appointment dates and
    /// times are stored in clinic-local time.
    pub utc_offset_minutes: i32,
    /// Prepended to phone numbers that carry no country code.
    pub default_country_code: String,
    pub checkout_function: String,
    pub verify_payment_function: String,
    pub payment_success_url: String,
    pub payment_cancel_url: String,
    pub available_dates_window_days: i64,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            clinic_name: "Clinic".to_string(),
            cancellation_notice_hours: 24,
            utc_offset_minutes: 0,
            default_country_code: "55".to_string(),
            checkout_function: "create-checkout".to_string(),
            verify_payment_function: "verify-payment".to_string(),
            payment_success_url: String::new(),
            payment_cancel_url: String::new(),
            available_dates_window_days: 30,
        }
    }
}

impl ClinicSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            clinic_name: env::var("CLINIC_NAME").unwrap_or(defaults.clinic_name),
            cancellation_notice_hours: parse_or("CANCELLATION_NOTICE_HOURS", defaults.cancellation_notice_hours),
            utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE").unwrap_or(defaults.default_country_code),
            checkout_function: env::var("CHECKOUT_FUNCTION").unwrap_or(defaults.checkout_function),
            verify_payment_function: env::var("VERIFY_PAYMENT_FUNCTION")
                .unwrap_or(defaults.verify_payment_function),
            payment_success_url: env::var("PAYMENT_SUCCESS_URL").unwrap_or_else(|_| {
                warn!("PAYMENT_SUCCESS_URL not set, checkout sessions will have no return URL");
                String::new()
            }),
            payment_cancel_url: env::var("PAYMENT_CANCEL_URL").unwrap_or(defaults.payment_cancel_url),
            available_dates_window_days: parse_or("AVAILABLE_DATES_WINDOW_DAYS", defaults.available_dates_window_days),
        }
    }

    pub fn cancellation_notice(&self) -> Duration {
        Duration::hours(self.cancellation_notice_hours)
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Current wall-clock time at the clinic.
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset()).naive_local()
    }

    /// Checkout needs both return URLs.
    pub fn is_payment_configured(&self) -> bool {
        !self.payment_success_url.is_empty() && !self.payment_cancel_url.is_empty()
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            server_port: parse_or("PORT", 3000),
            clinic: ClinicSettings::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        self.is_configured() && self.clinic.is_payment_configured()
    }
}
