use std::sync::Arc;

use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BlockedTime, CreateBlockedTimeRequest, CreateScheduleRequest, ProfessionalError, Schedule,
    UpdateScheduleRequest,
};

/// Check the invariants of a weekly schedule window.
pub fn validate_schedule_window(
    day_of_week: i32,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_duration_minutes: i32,
) -> Result<(), ProfessionalError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(ProfessionalError::ValidationError(
            "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }

    if start_time >= end_time {
        return Err(ProfessionalError::ValidationError(
            "Start time must be before end time".to_string(),
        ));
    }

    if slot_duration_minutes <= 0 {
        return Err(ProfessionalError::ValidationError(
            "Slot duration must be greater than zero".to_string(),
        ));
    }

    let window_minutes = (end_time - start_time).num_minutes();
    if window_minutes < slot_duration_minutes as i64 {
        return Err(ProfessionalError::ValidationError(
            "Schedule window is shorter than one slot".to_string(),
        ));
    }

    if window_minutes % slot_duration_minutes as i64 != 0 {
        warn!(
            "Schedule window of {} minutes is not a multiple of {}; the trailing remainder is never offered",
            window_minutes, slot_duration_minutes
        );
    }

    Ok(())
}

pub fn validate_blocked_window(
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
) -> Result<(), ProfessionalError> {
    if let (Some(start), Some(end)) = (start_time, end_time) {
        if start >= end {
            return Err(ProfessionalError::ValidationError(
                "Blocked start time must be before end time".to_string(),
            ));
        }
    }
    Ok(())
}

fn windows_overlap(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && a_end > b_start
}

/// Reject a window that overlaps any active row of the same weekday.
pub fn check_schedule_overlap(
    existing: &[Schedule],
    day_of_week: i32,
    start_time: NaiveTime,
    end_time: NaiveTime,
    exclude_id: Option<Uuid>,
) -> Result<(), ProfessionalError> {
    let overlaps = existing.iter()
        .filter(|row| row.is_active && row.day_of_week == day_of_week)
        .filter(|row| Some(row.id) != exclude_id)
        .any(|row| windows_overlap(start_time, end_time, row.start_time, row.end_time));

    if overlaps {
        return Err(ProfessionalError::ScheduleOverlap);
    }
    Ok(())
}

pub struct ScheduleService {
    supabase: Arc<SupabaseClient>,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_schedules(
        &self,
        professional_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Vec<Schedule>> {
        debug!("Fetching schedules for professional: {}", professional_id);

        let path = format!(
            "/rest/v1/schedules?professional_id=eq.{}&order=day_of_week.asc,start_time.asc",
            professional_id
        );
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let schedules = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<Schedule>, _>>()?;

        Ok(schedules)
    }

    pub async fn create_schedule(
        &self,
        professional_id: Uuid,
        request: CreateScheduleRequest,
        auth_token: &str,
    ) -> Result<Schedule> {
        debug!("Creating schedule for professional {} on weekday {}", professional_id, request.day_of_week);

        validate_schedule_window(
            request.day_of_week,
            request.start_time,
            request.end_time,
            request.slot_duration_minutes,
        )?;

        let existing = self.get_schedules(professional_id, Some(auth_token)).await?;
        check_schedule_overlap(&existing, request.day_of_week, request.start_time, request.end_time, None)?;

        let schedule_data = json!({
            "professional_id": professional_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time.format("%H:%M:%S").to_string(),
            "end_time": request.end_time.format("%H:%M:%S").to_string(),
            "slot_duration_minutes": request.slot_duration_minutes,
            "is_active": request.is_active.unwrap_or(true),
        });

        let result = self.supabase.write_returning(
            Method::POST,
            "/rest/v1/schedules",
            Some(auth_token),
            schedule_data,
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| anyhow!("Failed to create schedule"))?;
        let schedule: Schedule = serde_json::from_value(row)?;

        info!("Schedule {} created for professional {}", schedule.id, professional_id);
        Ok(schedule)
    }

    pub async fn update_schedule(
        &self,
        professional_id: Uuid,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
        auth_token: &str,
    ) -> Result<Schedule> {
        debug!("Updating schedule: {}", schedule_id);

        let existing = self.get_schedules(professional_id, Some(auth_token)).await?;
        let current = existing.iter()
            .find(|row| row.id == schedule_id)
            .ok_or(ProfessionalError::ScheduleNotFound)?;

        let start_time = request.start_time.unwrap_or(current.start_time);
        let end_time = request.end_time.unwrap_or(current.end_time);
        let duration = request.slot_duration_minutes.unwrap_or(current.slot_duration_minutes);

        validate_schedule_window(current.day_of_week, start_time, end_time, duration)?;

        if request.is_active.unwrap_or(current.is_active) {
            check_schedule_overlap(&existing, current.day_of_week, start_time, end_time, Some(schedule_id))?;
        }

        let mut update_data = serde_json::Map::new();
        if let Some(start) = request.start_time {
            update_data.insert("start_time".to_string(), json!(start.format("%H:%M:%S").to_string()));
        }
        if let Some(end) = request.end_time {
            update_data.insert("end_time".to_string(), json!(end.format("%H:%M:%S").to_string()));
        }
        if let Some(duration) = request.slot_duration_minutes {
            update_data.insert("slot_duration_minutes".to_string(), json!(duration));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }

        let path = format!(
            "/rest/v1/schedules?id=eq.{}&professional_id=eq.{}",
            schedule_id, professional_id
        );
        let result = self.supabase.write_returning(
            Method::PATCH,
            &path,
            Some(auth_token),
            Value::Object(update_data),
        ).await?;

        let row = result.into_iter().next()
            .ok_or(ProfessionalError::ScheduleNotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete_schedule(
        &self,
        professional_id: Uuid,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<()> {
        debug!("Deleting schedule: {}", schedule_id);

        let path = format!(
            "/rest/v1/schedules?id=eq.{}&professional_id=eq.{}",
            schedule_id, professional_id
        );
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
        ).await?;

        info!("Schedule {} deleted", schedule_id);
        Ok(())
    }

    /// Blocked times of a professional between two dates, inclusive.
    pub async fn get_blocked_times(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<BlockedTime>> {
        let path = if from == to {
            format!(
                "/rest/v1/blocked_times?professional_id=eq.{}&blocked_date=eq.{}",
                professional_id, from
            )
        } else {
            format!(
                "/rest/v1/blocked_times?professional_id=eq.{}&blocked_date=gte.{}&blocked_date=lte.{}&order=blocked_date.asc",
                professional_id, from, to
            )
        };

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let blocked = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<BlockedTime>, _>>()?;

        Ok(blocked)
    }

    pub async fn create_blocked_time(
        &self,
        professional_id: Uuid,
        request: CreateBlockedTimeRequest,
        auth_token: &str,
    ) -> Result<BlockedTime> {
        debug!("Blocking {} for professional {}", request.blocked_date, professional_id);

        validate_blocked_window(request.start_time, request.end_time)?;

        let blocked_data = json!({
            "professional_id": professional_id,
            "blocked_date": request.blocked_date,
            "start_time": request.start_time.map(|t| t.format("%H:%M:%S").to_string()),
            "end_time": request.end_time.map(|t| t.format("%H:%M:%S").to_string()),
            "reason": request.reason,
        });

        let result = self.supabase.write_returning(
            Method::POST,
            "/rest/v1/blocked_times",
            Some(auth_token),
            blocked_data,
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| anyhow!("Failed to create blocked time"))?;
        let blocked: BlockedTime = serde_json::from_value(row)?;

        info!("Blocked time {} created on {}", blocked.id, blocked.blocked_date);
        Ok(blocked)
    }

    pub async fn delete_blocked_time(
        &self,
        professional_id: Uuid,
        blocked_id: Uuid,
        auth_token: &str,
    ) -> Result<()> {
        let path = format!(
            "/rest/v1/blocked_times?id=eq.{}&professional_id=eq.{}",
            blocked_id, professional_id
        );
        let _: Vec<Value> = self.supabase.request(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
        ).await?;

        info!("Blocked time {} removed", blocked_id);
        Ok(())
    }
}
