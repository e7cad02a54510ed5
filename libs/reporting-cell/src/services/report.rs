use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use professional_cell::models::Professional;
use professional_cell::services::CatalogService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{FinancialReport, ReportingError, RevenueRecord};
use crate::services::aggregation::{build_financial_report, previous_period};
use crate::services::goals::REVENUE_COLUMNS;

const MAX_REPORT_DAYS: i64 = 366;

pub struct ReportService {
    supabase: Arc<SupabaseClient>,
    catalog: CatalogService,
}

impl ReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self {
            catalog: CatalogService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    /// Every appointment dated within `[from, to]`, any status.
    pub async fn revenue_records(&self, from: NaiveDate, to: NaiveDate, auth_token: &str) -> Result<Vec<RevenueRecord>> {
        let path = format!(
            "/rest/v1/appointments?select={}&appointment_date=gte.{}&appointment_date=lte.{}&order=appointment_date.asc",
            REVENUE_COLUMNS, from, to
        );

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        let records = result.into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<RevenueRecord>, _>>()?;

        debug!("Loaded {} appointment records between {} and {}", records.len(), from, to);
        Ok(records)
    }

    pub async fn financial_report(&self, from: NaiveDate, to: NaiveDate, auth_token: &str) -> Result<FinancialReport> {
        if from > to {
            return Err(ReportingError::ValidationError("'from' must not be after 'to'".to_string()).into());
        }
        if (to - from).num_days() >= MAX_REPORT_DAYS {
            return Err(ReportingError::ValidationError(
                format!("report range cannot exceed {} days", MAX_REPORT_DAYS)
            ).into());
        }

        let (prev_from, _) = previous_period(from, to);

        let (records, professionals) = futures::try_join!(
            self.revenue_records(prev_from, to, auth_token),
            self.catalog.list_all_professionals(auth_token),
        )?;

        let professionals: HashMap<Uuid, Professional> = professionals.into_iter()
            .map(|p| (p.id, p))
            .collect();

        let report = build_financial_report(&records, &professionals, from, to);
        info!("Financial report {} to {}: {:.2} over {} paid appointments",
              from, to, report.total_revenue, report.paid_appointments);
        Ok(report)
    }
}
