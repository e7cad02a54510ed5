use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{BlockedTime, ProfessionalError, Schedule, Slot, SlotAppointment, SlotState};
use crate::services::schedule::ScheduleService;

/// Weekday index used by the schedules table: 0 = Sunday … 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// Active schedule rows for the weekday of `date`, earliest first.
pub fn schedules_for_date(schedules: &[Schedule], date: NaiveDate) -> Vec<&Schedule> {
    let weekday = day_of_week(date);
    let mut rows: Vec<&Schedule> = schedules
        .iter()
        .filter(|schedule| schedule.is_active && schedule.day_of_week == weekday)
        .collect();
    rows.sort_by_key(|schedule| schedule.start_time);
    rows
}

pub fn is_offered_on(schedules: &[Schedule], date: NaiveDate) -> bool {
    !schedules_for_date(schedules, date).is_empty()
}

/// Start/end pairs of every full slot in a schedule window. A slot whose end
/// equals the window end is kept; nothing starts at the window end.
pub fn slot_times(schedule: &Schedule) -> Vec<(NaiveTime, NaiveTime)> {
    if schedule.slot_duration_minutes <= 0 || schedule.start_time >= schedule.end_time {
        return Vec::new();
    }
    // A slot longer than the window never fits
    if i64::from(schedule.slot_duration_minutes) > (schedule.end_time - schedule.start_time).num_minutes() {
        return Vec::new();
    }

    let step = schedule.slot_duration_minutes as u32 * 60;
    let window_end = schedule.end_time.num_seconds_from_midnight();
    let mut current = schedule.start_time.num_seconds_from_midnight();
    let mut times = Vec::new();

    while current + step <= window_end {
        let start = NaiveTime::from_num_seconds_from_midnight_opt(current, 0);
        let end = NaiveTime::from_num_seconds_from_midnight_opt(current + step, 0);
        if let (Some(start), Some(end)) = (start, end) {
            times.push((start, end));
        }
        current += step;
    }

    times
}

/// Label every slot of `date` as available, booked or blocked.
///
/// Blocks win over bookings. Only appointments that still occupy their slot
/// (anything but cancelled) mark a slot as booked. A date without an active
/// schedule row yields no slots.
pub fn generate_slots(
    date: NaiveDate,
    schedules: &[Schedule],
    blocked_times: &[BlockedTime],
    appointments: &[SlotAppointment],
) -> Vec<Slot> {
    let rows = schedules_for_date(schedules, date);
    if rows.is_empty() {
        return Vec::new();
    }

    let day_blocks: Vec<&BlockedTime> = blocked_times
        .iter()
        .filter(|block| block.blocked_date == date)
        .collect();

    let day_appointments: Vec<&SlotAppointment> = appointments
        .iter()
        .filter(|apt| apt.appointment_date == date && apt.status.occupies_slot())
        .collect();

    let mut seen = HashSet::new();
    let mut slots = Vec::new();

    for row in rows {
        for (start, end) in slot_times(row) {
            if !seen.insert(start) {
                continue;
            }

            let state = if let Some(block) = day_blocks.iter().find(|block| block.covers(start)) {
                SlotState::Blocked { reason: block.reason.clone() }
            } else {
                let mut matching = day_appointments
                    .iter()
                    .filter(|apt| apt.appointment_time == start);

                match matching.next() {
                    Some(apt) => {
                        if matching.next().is_some() {
                            warn!("More than one active appointment on {} at {}", date, start);
                        }
                        SlotState::Booked {
                            appointment_id: Some(apt.id),
                            patient_name: Some(apt.patient_name.clone()),
                            status: apt.status,
                        }
                    }
                    None => SlotState::Available,
                }
            };

            slots.push(Slot {
                start_time: start,
                end_time: end,
                duration_minutes: row.slot_duration_minutes,
                state,
            });
        }
    }

    slots.sort_by_key(|slot| slot.start_time);
    slots
}

pub struct SlotService {
    supabase: Arc<SupabaseClient>,
    schedule_service: ScheduleService,
}

impl SlotService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            schedule_service: ScheduleService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Labeled slots for one professional on one date.
    pub async fn get_day_slots(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<Slot>> {
        debug!("Calculating slots for professional {} on {}", professional_id, date);

        let (schedules, blocked, appointments) = futures::try_join!(
            self.schedule_service.get_schedules(professional_id, auth_token),
            self.schedule_service.get_blocked_times(professional_id, date, date, auth_token),
            self.get_slot_appointments(professional_id, date, date, auth_token),
        )?;

        let slots = generate_slots(date, &schedules, &blocked, &appointments);
        debug!("Generated {} slots for {}", slots.len(), date);

        Ok(slots)
    }

    /// Dates in `[from, from + days)` that still have at least one available slot.
    pub async fn available_dates(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        days: i64,
        auth_token: Option<&str>,
    ) -> Result<Vec<NaiveDate>> {
        if days <= 0 {
            return Ok(Vec::new());
        }
        let to = from
            .checked_add_signed(Duration::days(days - 1))
            .ok_or_else(|| ProfessionalError::ValidationError(format!("Date window starting {} is out of range", from)))?;
        debug!("Listing available dates for professional {} from {} to {}", professional_id, from, to);

        let (schedules, blocked, appointments) = futures::try_join!(
            self.schedule_service.get_schedules(professional_id, auth_token),
            self.schedule_service.get_blocked_times(professional_id, from, to, auth_token),
            self.get_slot_appointments(professional_id, from, to, auth_token),
        )?;

        let dates = from
            .iter_days()
            .take(days as usize)
            .filter(|date| {
                generate_slots(*date, &schedules, &blocked, &appointments)
                    .iter()
                    .any(Slot::is_available)
            })
            .collect();

        Ok(dates)
    }

    async fn get_slot_appointments(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<SlotAppointment>> {
        let path = format!(
            "/rest/v1/appointments?select=id,appointment_date,appointment_time,patient_name,status&professional_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&status=neq.cancelled&order=appointment_time.asc",
            professional_id, from, to
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            auth_token,
            None,
        ).await?;

        let appointments = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<SlotAppointment>, _>>()?;

        Ok(appointments)
    }
}
