use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use professional_cell::models::{PaymentArrangement, PaymentType, Professional};
use reporting_cell::models::{FinancialGoal, RevenueFilter, RevenueRecord};
use reporting_cell::services::aggregation::{
    average_ticket, build_financial_report, group_by_day, group_by_specialty, percentage_variation,
    previous_period, professional_payout, sum_revenue,
};
use reporting_cell::services::goals::{compute_progress, month_range};
use shared_models::{AppointmentStatus, PaymentStatus};

fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, month, day).unwrap()
}

fn record(professional_id: Uuid, date: NaiveDate, status: AppointmentStatus, payment: PaymentStatus, amount: f64) -> RevenueRecord {
    RevenueRecord {
        id: Uuid::new_v4(),
        professional_id,
        appointment_date: date,
        status,
        payment_status: payment,
        amount,
    }
}

fn professional(id: Uuid, name: &str, specialty: &str, payment_type: PaymentType, value: f64) -> Professional {
    Professional {
        id,
        full_name: name.to_string(),
        specialty: specialty.to_string(),
        email: None,
        phone: None,
        is_active: true,
        payment_type,
        payment_value: value,
        created_at: None,
    }
}

#[test]
fn variation_zero_guard() {
    assert_eq!(percentage_variation(500.0, 0.0), 100.0);
    assert_eq!(percentage_variation(0.0, 0.0), 0.0);
    assert_eq!(percentage_variation(150.0, 100.0), 50.0);
    assert_eq!(percentage_variation(50.0, 200.0), -75.0);
}

#[test]
fn average_ticket_is_zero_guarded() {
    assert_eq!(average_ticket(0.0, 0), 0.0);
    assert_eq!(average_ticket(450.0, 3), 150.0);
    assert_eq!(average_ticket(100.0, 3), 33.33);
}

#[test]
fn previous_period_has_the_same_length() {
    assert_eq!(previous_period(d(6, 1), d(6, 30)), (d(5, 2), d(5, 31)));
    assert_eq!(previous_period(d(6, 10), d(6, 10)), (d(6, 9), d(6, 9)));
}

#[test]
fn filter_combines_status_payment_and_range() {
    let professional_id = Uuid::new_v4();
    let records = vec![
        record(professional_id, d(6, 1), AppointmentStatus::Completed, PaymentStatus::Paid, 200.0),
        record(professional_id, d(6, 2), AppointmentStatus::Confirmed, PaymentStatus::Paid, 150.0),
        record(professional_id, d(6, 3), AppointmentStatus::Pending, PaymentStatus::Pending, 150.0),
        record(professional_id, d(7, 1), AppointmentStatus::Completed, PaymentStatus::Paid, 300.0),
    ];

    assert_eq!(sum_revenue(&records, &RevenueFilter::paid_between(d(6, 1), d(6, 30))), (350.0, 2));

    let completed_only = RevenueFilter {
        statuses: Some(vec![AppointmentStatus::Completed]),
        ..RevenueFilter::default()
    };
    assert_eq!(sum_revenue(&records, &completed_only), (500.0, 2));
    assert_eq!(sum_revenue(&records, &RevenueFilter::default()), (800.0, 4));
}

#[test]
fn payout_follows_the_arrangement() {
    assert_eq!(professional_payout(1000.0, 4, PaymentArrangement::Percentage(60.0)), 600.0);
    assert_eq!(professional_payout(1000.0, 4, PaymentArrangement::FixedFee(80.0)), 320.0);
    assert_eq!(professional_payout(0.0, 0, PaymentArrangement::FixedFee(80.0)), 0.0);
}

#[test]
fn groups_by_specialty_and_day() {
    let cardio = Uuid::new_v4();
    let derma = Uuid::new_v4();
    let unknown = Uuid::new_v4();
    let professionals: HashMap<Uuid, Professional> = [
        professional(cardio, "Dr. Paulo", "Cardiologia", PaymentType::Percentage, 50.0),
        professional(derma, "Dra. Clara", "Dermatologia", PaymentType::Fixed, 100.0),
    ]
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

    let records = vec![
        record(cardio, d(6, 2), AppointmentStatus::Completed, PaymentStatus::Paid, 300.0),
        record(cardio, d(6, 3), AppointmentStatus::Completed, PaymentStatus::Paid, 300.0),
        record(derma, d(6, 2), AppointmentStatus::Confirmed, PaymentStatus::Paid, 200.0),
        record(unknown, d(6, 4), AppointmentStatus::Completed, PaymentStatus::Paid, 50.0),
    ];
    let filter = RevenueFilter::paid_between(d(6, 1), d(6, 30));

    let specialties = group_by_specialty(&records, &filter, &professionals);
    assert_eq!(specialties[0].key, "Cardiologia");
    assert_eq!(specialties[0].revenue, 600.0);
    assert_eq!(specialties[0].average_ticket, 300.0);
    assert!(specialties.iter().any(|g| g.key == "Unknown" && g.count == 1));

    let days = group_by_day(&records, &filter);
    assert_eq!(days.iter().map(|d| d.date).collect::<Vec<_>>(), vec![d(6, 2), d(6, 3), d(6, 4)]);
    assert_eq!(days[0].revenue, 500.0);
    assert_eq!(days[0].count, 2);
}

#[test]
fn financial_report_compares_with_previous_period() {
    let cardio = Uuid::new_v4();
    let professionals: HashMap<Uuid, Professional> = [
        professional(cardio, "Dr. Paulo", "Cardiologia", PaymentType::Percentage, 60.0),
    ]
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

    let records = vec![
        // previous period for June is 2..=31 May
        record(cardio, d(5, 20), AppointmentStatus::Completed, PaymentStatus::Paid, 200.0),
        record(cardio, d(6, 5), AppointmentStatus::Completed, PaymentStatus::Paid, 250.0),
        record(cardio, d(6, 6), AppointmentStatus::Completed, PaymentStatus::Paid, 250.0),
        record(cardio, d(6, 7), AppointmentStatus::Cancelled, PaymentStatus::Refunded, 250.0),
        record(cardio, d(6, 8), AppointmentStatus::NoShow, PaymentStatus::Pending, 250.0),
    ];

    let report = build_financial_report(&records, &professionals, d(6, 1), d(6, 30));

    assert_eq!(report.total_revenue, 500.0);
    assert_eq!(report.paid_appointments, 2);
    assert_eq!(report.average_ticket, 250.0);
    assert_eq!(report.previous_period_revenue, 200.0);
    assert_eq!(report.revenue_variation_pct, 150.0);
    assert_eq!(report.status_counts.total, 4);
    assert_eq!(report.status_counts.cancelled, 1);
    assert_eq!(report.status_counts.no_show, 1);
    assert_eq!(report.by_professional.len(), 1);
    assert_eq!(report.by_professional[0].payout, 300.0);
}

#[test]
fn empty_history_reports_zeroes() {
    let report = build_financial_report(&[], &HashMap::new(), d(6, 1), d(6, 30));

    assert_eq!(report.total_revenue, 0.0);
    assert_eq!(report.average_ticket, 0.0);
    assert_eq!(report.revenue_variation_pct, 0.0);
    assert!(report.by_professional.is_empty());
}

#[test]
fn goal_progress_caps_percentage_but_not_achievement() {
    let goal = FinancialGoal {
        id: Uuid::new_v4(),
        professional_id: Uuid::new_v4(),
        month: 6,
        year: 2025,
        target_amount: 1000.0,
    };

    let halfway = compute_progress(goal.clone(), 500.0);
    assert_eq!(halfway.percentage, 50.0);
    assert_eq!(halfway.remaining, 500.0);
    assert!(!halfway.achieved);

    let exact = compute_progress(goal.clone(), 1000.0);
    assert!(exact.achieved);

    let over = compute_progress(goal, 1500.0);
    assert_eq!(over.percentage, 100.0);
    assert_eq!(over.remaining, 0.0);
    assert!(over.achieved);
}

#[test]
fn month_range_handles_december_and_leap_years() {
    assert_eq!(month_range(12, 2025).unwrap(), (d(12, 1), d(12, 31)));
    assert_eq!(
        month_range(2, 2024).unwrap(),
        (NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );
    assert!(month_range(13, 2025).is_err());
}
