use std::sync::Arc;

use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{ClinicService, Professional, ProfessionalError};

/// Read side of the clinic catalog: services and the professionals who
/// attend them.
pub struct CatalogService {
    supabase: Arc<SupabaseClient>,
}

impl CatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn list_services(&self, specialty: Option<&str>, auth_token: Option<&str>) -> Result<Vec<ClinicService>> {
        let mut path = "/rest/v1/services?is_active=eq.true&order=name.asc".to_string();
        if let Some(specialty) = specialty {
            path.push_str(&format!("&specialty=eq.{}", urlencoding::encode(specialty)));
        }

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        let services = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<ClinicService>, _>>()?;

        debug!("Found {} active services", services.len());
        Ok(services)
    }

    pub async fn get_service(&self, service_id: Uuid, auth_token: Option<&str>) -> Result<ClinicService> {
        let path = format!("/rest/v1/services?id=eq.{}", service_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        let row = result.into_iter().next().ok_or(ProfessionalError::ServiceNotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Active professionals, optionally narrowed to one specialty.
    pub async fn list_professionals(&self, specialty: Option<&str>, auth_token: Option<&str>) -> Result<Vec<Professional>> {
        let mut path = "/rest/v1/professionals?is_active=eq.true&order=full_name.asc".to_string();
        if let Some(specialty) = specialty {
            path.push_str(&format!("&specialty=eq.{}", urlencoding::encode(specialty)));
        }

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        let professionals = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Professional>, _>>()?;

        debug!("Found {} active professionals", professionals.len());
        Ok(professionals)
    }

    /// Professional by id, active or not. Back-office reports still need
    /// deactivated professionals.
    pub async fn get_professional(&self, professional_id: Uuid, auth_token: Option<&str>) -> Result<Professional> {
        let path = format!("/rest/v1/professionals?id=eq.{}", professional_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;

        let row = result.into_iter().next().ok_or(ProfessionalError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Every professional, including deactivated ones.
    pub async fn list_all_professionals(&self, auth_token: &str) -> Result<Vec<Professional>> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/professionals?order=full_name.asc",
            Some(auth_token),
            None,
        ).await?;

        let professionals = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Professional>, _>>()?;
        Ok(professionals)
    }

    /// Active professionals qualified for a service (matching specialty).
    pub async fn professionals_for_service(&self, service_id: Uuid, auth_token: Option<&str>) -> Result<Vec<Professional>> {
        let service = self.get_service(service_id, auth_token).await?;
        self.list_professionals(Some(&service.specialty), auth_token).await
    }
}
