use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use professional_cell::models::{PaymentArrangement, Professional};
use shared_models::AppointmentStatus;

use crate::models::{
    DayTotal, FinancialReport, GroupTotal, ProfessionalRevenue, RevenueFilter, RevenueRecord,
    StatusCounts,
};

const UNKNOWN_SPECIALTY: &str = "Unknown";

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Sum and count of the records matching `filter`.
pub fn sum_revenue(records: &[RevenueRecord], filter: &RevenueFilter) -> (f64, usize) {
    let (sum, count) = records.iter()
        .filter(|record| filter.matches(record))
        .fold((0.0, 0), |(sum, count), record| (sum + record.amount, count + 1));

    (round_cents(sum), count)
}

pub fn average_ticket(sum: f64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round_cents(sum / count as f64)
}

/// Change from `prior` to `current` in percent. A zero prior reports 0%
/// when nothing was earned now either, 100% otherwise.
pub fn percentage_variation(current: f64, prior: f64) -> f64 {
    if prior == 0.0 {
        return if current == 0.0 { 0.0 } else { 100.0 };
    }
    round_cents((current - prior) / prior * 100.0)
}

/// The range of equal length ending the day before `from`.
pub fn previous_period(from: NaiveDate, to: NaiveDate) -> (NaiveDate, NaiveDate) {
    let length = (to - from).num_days().max(0) + 1;
    let prev_to = from - Duration::days(1);
    let prev_from = prev_to - Duration::days(length - 1);
    (prev_from, prev_to)
}

pub fn professional_payout(revenue: f64, count: usize, arrangement: PaymentArrangement) -> f64 {
    match arrangement {
        PaymentArrangement::Percentage(percent) => round_cents(revenue * percent / 100.0),
        PaymentArrangement::FixedFee(fee) => round_cents(fee * count as f64),
    }
}

pub fn count_statuses(records: &[RevenueRecord], from: NaiveDate, to: NaiveDate) -> StatusCounts {
    let mut counts = StatusCounts::default();

    for record in records.iter().filter(|r| r.appointment_date >= from && r.appointment_date <= to) {
        counts.total += 1;
        match record.status {
            AppointmentStatus::Pending => counts.pending += 1,
            AppointmentStatus::Confirmed => counts.confirmed += 1,
            AppointmentStatus::Rescheduled => counts.rescheduled += 1,
            AppointmentStatus::Completed => counts.completed += 1,
            AppointmentStatus::Cancelled => counts.cancelled += 1,
            AppointmentStatus::NoShow => counts.no_show += 1,
        }
    }

    counts
}

/// Revenue per professional, highest first. Professionals missing from
/// `professionals` are still reported under their id.
pub fn group_by_professional(
    records: &[RevenueRecord],
    filter: &RevenueFilter,
    professionals: &HashMap<Uuid, Professional>,
) -> Vec<ProfessionalRevenue> {
    let mut totals: HashMap<Uuid, (f64, usize)> = HashMap::new();
    for record in records.iter().filter(|record| filter.matches(record)) {
        let entry = totals.entry(record.professional_id).or_insert((0.0, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    let mut grouped: Vec<ProfessionalRevenue> = totals.into_iter()
        .map(|(professional_id, (sum, count))| {
            let revenue = round_cents(sum);
            let professional = professionals.get(&professional_id);

            ProfessionalRevenue {
                professional_id,
                professional_name: professional
                    .map(|p| p.full_name.clone())
                    .unwrap_or_else(|| professional_id.to_string()),
                specialty: professional
                    .map(|p| p.specialty.clone())
                    .unwrap_or_else(|| UNKNOWN_SPECIALTY.to_string()),
                revenue,
                count,
                average_ticket: average_ticket(revenue, count),
                payout: professional
                    .map(|p| professional_payout(revenue, count, p.arrangement()))
                    .unwrap_or(0.0),
            }
        })
        .collect();

    grouped.sort_by(|a, b| {
        b.revenue.total_cmp(&a.revenue)
            .then_with(|| a.professional_name.cmp(&b.professional_name))
    });
    grouped
}

/// Revenue per specialty, keyed through the professional who attended.
pub fn group_by_specialty(
    records: &[RevenueRecord],
    filter: &RevenueFilter,
    professionals: &HashMap<Uuid, Professional>,
) -> Vec<GroupTotal> {
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in records.iter().filter(|record| filter.matches(record)) {
        let specialty = professionals.get(&record.professional_id)
            .map(|p| p.specialty.clone())
            .unwrap_or_else(|| UNKNOWN_SPECIALTY.to_string());

        let entry = totals.entry(specialty).or_insert((0.0, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    let mut grouped: Vec<GroupTotal> = totals.into_iter()
        .map(|(key, (sum, count))| {
            let revenue = round_cents(sum);
            GroupTotal { key, revenue, count, average_ticket: average_ticket(revenue, count) }
        })
        .collect();

    grouped.sort_by(|a, b| b.revenue.total_cmp(&a.revenue).then_with(|| a.key.cmp(&b.key)));
    grouped
}

/// Revenue per calendar day, in date order.
pub fn group_by_day(records: &[RevenueRecord], filter: &RevenueFilter) -> Vec<DayTotal> {
    let mut totals: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for record in records.iter().filter(|record| filter.matches(record)) {
        let entry = totals.entry(record.appointment_date).or_insert((0.0, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    totals.into_iter()
        .map(|(date, (sum, count))| DayTotal { date, revenue: round_cents(sum), count })
        .collect()
}

/// Builds the report for `[from, to]`. `records` must cover the previous
/// period as well, so the variation can be computed.
pub fn build_financial_report(
    records: &[RevenueRecord],
    professionals: &HashMap<Uuid, Professional>,
    from: NaiveDate,
    to: NaiveDate,
) -> FinancialReport {
    let current = RevenueFilter::paid_between(from, to);
    let (prev_from, prev_to) = previous_period(from, to);
    let previous = RevenueFilter::paid_between(prev_from, prev_to);

    let (total_revenue, paid_appointments) = sum_revenue(records, &current);
    let (previous_period_revenue, _) = sum_revenue(records, &previous);

    FinancialReport {
        from,
        to,
        total_revenue,
        paid_appointments,
        average_ticket: average_ticket(total_revenue, paid_appointments),
        previous_period_revenue,
        revenue_variation_pct: percentage_variation(total_revenue, previous_period_revenue),
        status_counts: count_statuses(records, from, to),
        by_professional: group_by_professional(records, &current, professionals),
        by_specialty: group_by_specialty(records, &current, professionals),
        by_day: group_by_day(records, &current),
    }
}
