use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    FinancialGoal, GoalProgress, NewNotification, Notification, NotificationType, ReportingError,
    RevenueFilter, RevenueRecord, UpsertGoalRequest,
};
use crate::services::aggregation::{round_cents, sum_revenue};
use crate::services::notifications::NotificationService;

pub const REVENUE_COLUMNS: &str = "id,professional_id,appointment_date,status,payment_status,amount";

/// First and last day of a calendar month.
pub fn month_range(month: u32, year: i32) -> Result<(NaiveDate, NaiveDate), ReportingError> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ReportingError::InvalidPeriod(format!("{:02}/{}", month, year)))?;

    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ReportingError::InvalidPeriod(format!("{:02}/{}", month, year)))?;

    let last = next_first.pred_opt()
        .ok_or_else(|| ReportingError::InvalidPeriod(format!("{:02}/{}", month, year)))?;

    Ok((first, last))
}

pub fn validate_goal(request: &UpsertGoalRequest) -> Result<(), ReportingError> {
    if !(1..=12).contains(&request.month) {
        return Err(ReportingError::ValidationError("month must be between 1 and 12".to_string()));
    }
    if !(2000..=2100).contains(&request.year) {
        return Err(ReportingError::ValidationError("year is out of range".to_string()));
    }
    if !request.target_amount.is_finite() || request.target_amount <= 0.0 {
        return Err(ReportingError::ValidationError("target_amount must be positive".to_string()));
    }
    Ok(())
}

pub fn compute_progress(goal: FinancialGoal, current_amount: f64) -> GoalProgress {
    let current_amount = round_cents(current_amount);
    let achieved = current_amount >= goal.target_amount;
    let percentage = if goal.target_amount > 0.0 {
        round_cents((current_amount / goal.target_amount * 100.0).min(100.0))
    } else {
        0.0
    };
    let remaining = round_cents((goal.target_amount - current_amount).max(0.0));

    GoalProgress { goal, current_amount, percentage, remaining, achieved }
}

/// Monthly revenue goals per professional.
pub struct GoalService {
    supabase: Arc<SupabaseClient>,
    notifications: NotificationService,
}

impl GoalService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            notifications: NotificationService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Creates the goal for a professional/month/year or replaces its target.
    pub async fn upsert_goal(&self, request: UpsertGoalRequest, auth_token: &str) -> Result<FinancialGoal> {
        validate_goal(&request)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let body = json!({
            "professional_id": request.professional_id,
            "month": request.month,
            "year": request.year,
            "target_amount": request.target_amount
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/financial_goals?on_conflict=professional_id,month,year",
            Some(auth_token),
            Some(body),
            Some(headers),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| anyhow!("Goal upsert returned no rows"))?;
        let goal: FinancialGoal = serde_json::from_value(row)?;

        info!("Goal for professional {} set to {:.2} ({:02}/{})",
              goal.professional_id, goal.target_amount, goal.month, goal.year);
        Ok(goal)
    }

    pub async fn list_goals(&self, month: Option<u32>, year: Option<i32>, auth_token: &str) -> Result<Vec<FinancialGoal>> {
        let mut path = "/rest/v1/financial_goals?order=year.desc,month.desc".to_string();
        if let Some(month) = month {
            path.push_str(&format!("&month=eq.{}", month));
        }
        if let Some(year) = year {
            path.push_str(&format!("&year=eq.{}", year));
        }

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let goals = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<FinancialGoal>, _>>()?;
        Ok(goals)
    }

    pub async fn get_goal(
        &self,
        professional_id: Uuid,
        month: u32,
        year: i32,
        auth_token: Option<&str>,
    ) -> Result<Option<FinancialGoal>> {
        let path = format!(
            "/rest/v1/financial_goals?professional_id=eq.{}&month=eq.{}&year=eq.{}",
            professional_id, month, year
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    /// Revenue actually received by a professional between two dates.
    pub async fn paid_revenue(
        &self,
        professional_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<f64> {
        let path = format!(
            "/rest/v1/appointments?select={}&professional_id=eq.{}&appointment_date=gte.{}&appointment_date=lte.{}&payment_status=eq.paid",
            REVENUE_COLUMNS, professional_id, from, to
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, auth_token, None).await?;
        let records = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<RevenueRecord>, _>>()?;

        let (sum, count) = sum_revenue(&records, &RevenueFilter::paid_between(from, to));
        debug!("Professional {} received {:.2} over {} appointments", professional_id, sum, count);
        Ok(sum)
    }

    pub async fn goal_progress(
        &self,
        professional_id: Uuid,
        month: u32,
        year: i32,
        auth_token: Option<&str>,
    ) -> Result<GoalProgress> {
        let (from, to) = month_range(month, year)?;

        let (goal, current) = futures::try_join!(
            self.get_goal(professional_id, month, year, auth_token),
            self.paid_revenue(professional_id, from, to, auth_token),
        )?;

        let goal = goal.ok_or(ReportingError::GoalNotFound)?;
        Ok(compute_progress(goal, current))
    }

    /// Records a one-time `goal_achieved` notification once the month's paid
    /// revenue reaches the target. Returns the notification when one was
    /// created by this call.
    pub async fn check_goal_achievement(
        &self,
        professional_id: Uuid,
        date: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Option<Notification>> {
        let progress = match self.goal_progress(professional_id, date.month(), date.year(), auth_token).await {
            Ok(progress) => progress,
            Err(e) if matches!(e.downcast_ref::<ReportingError>(), Some(ReportingError::GoalNotFound)) => {
                debug!("No goal for professional {} in {:02}/{}", professional_id, date.month(), date.year());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if !progress.achieved {
            return Ok(None);
        }

        let goal = &progress.goal;
        if self.notifications
            .exists(professional_id, NotificationType::GoalAchieved, goal.id, auth_token)
            .await?
        {
            debug!("Goal {} already notified", goal.id);
            return Ok(None);
        }

        let notification = self.notifications.create(NewNotification {
            professional_id: Some(professional_id),
            notification_type: NotificationType::GoalAchieved,
            title: "Monthly goal achieved".to_string(),
            message: format!(
                "Revenue of {:.2} reached the {:02}/{} goal of {:.2}",
                progress.current_amount, goal.month, goal.year, goal.target_amount
            ),
            reference_id: Some(goal.id),
        }, auth_token).await?;

        info!("Professional {} achieved goal {}", professional_id, goal.id);
        Ok(Some(notification))
    }
}
