use std::sync::Arc;

use anyhow::{anyhow, Result};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{NewNotification, Notification, NotificationType};

pub struct NotificationService {
    supabase: Arc<SupabaseClient>,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn create(&self, notification: NewNotification, auth_token: Option<&str>) -> Result<Notification> {
        let body = json!({
            "professional_id": notification.professional_id,
            "notification_type": notification.notification_type,
            "title": notification.title,
            "message": notification.message,
            "reference_id": notification.reference_id,
            "is_read": false
        });

        let result = self.supabase
            .write_returning(Method::POST, "/rest/v1/notifications", auth_token, body)
            .await?;

        let row = result.into_iter().next()
            .ok_or_else(|| anyhow!("Notification insert returned no rows"))?;
        let created: Notification = serde_json::from_value(row)?;

        info!("Recorded {} notification {}", created.notification_type.as_str(), created.id);
        Ok(created)
    }

    /// Whether a notification of this type already exists for the
    /// professional and reference.
    pub async fn exists(
        &self,
        professional_id: Uuid,
        notification_type: NotificationType,
        reference_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<bool> {
        let path = format!(
            "/rest/v1/notifications?select=id&professional_id=eq.{}&notification_type=eq.{}&reference_id=eq.{}&limit=1",
            professional_id,
            notification_type.as_str(),
            reference_id
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        debug!("Existing {} notifications for {}: {}", notification_type.as_str(), professional_id, result.len());
        Ok(!result.is_empty())
    }

    pub async fn list_unread(&self, auth_token: &str) -> Result<Vec<Notification>> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/notifications?is_read=eq.false&order=created_at.desc",
            Some(auth_token),
            None,
        ).await?;

        let notifications = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Notification>, _>>()?;
        Ok(notifications)
    }

    pub async fn mark_read(&self, notification_id: Uuid, auth_token: &str) -> Result<()> {
        let path = format!("/rest/v1/notifications?id=eq.{}", notification_id);
        let _: Value = self.supabase
            .request(Method::PATCH, &path, Some(auth_token), Some(json!({ "is_read": true })))
            .await?;
        Ok(())
    }
}
