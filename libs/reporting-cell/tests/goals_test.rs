use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reporting_cell::models::{ReportingError, UpsertGoalRequest};
use reporting_cell::services::GoalService;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn client(server: &MockServer) -> Arc<SupabaseClient> {
    Arc::new(SupabaseClient::new(&TestConfig::with_url(&server.uri()).to_app_config()))
}

fn paid_record(professional_id: &str, date: &str, amount: f64) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "professional_id": professional_id,
        "appointment_date": date,
        "status": "confirmed",
        "payment_status": "paid",
        "amount": amount
    })
}

async fn mount_goal_and_revenue(server: &MockServer, professional_id: &str, goal: &serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/financial_goals"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("month", "eq.6"))
        .and(query_param("year", "eq.2025"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([goal])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("payment_status", "eq.paid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            paid_record(professional_id, "2025-06-03", 200.0),
            paid_record(professional_id, "2025-06-17", 150.0),
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn reaching_the_goal_creates_one_notification() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let id = professional_id.to_string();
    let goal = MockSupabaseResponses::goal_response(&id, 6, 2025, 300.0);
    mount_goal_and_revenue(&server, &id, &goal).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("notification_type", "eq.goal_achieved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_response(&id, "goal_achieved")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = GoalService::with_client(client(&server));
    let date = NaiveDate::from_ymd_opt(2025, 6, 17).unwrap();
    let created = service.check_goal_achievement(professional_id, date, None).await.unwrap();

    assert!(created.is_some());
}

#[tokio::test]
async fn goal_already_notified_is_not_notified_again() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let id = professional_id.to_string();
    let goal = MockSupabaseResponses::goal_response(&id, 6, 2025, 300.0);
    mount_goal_and_revenue(&server, &id, &goal).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = GoalService::with_client(client(&server));
    let date = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();

    assert!(service.check_goal_achievement(professional_id, date, None).await.unwrap().is_none());
}

#[tokio::test]
async fn goal_below_target_and_missing_goal_do_nothing() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let id = professional_id.to_string();
    let goal = MockSupabaseResponses::goal_response(&id, 6, 2025, 5000.0);
    mount_goal_and_revenue(&server, &id, &goal).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = GoalService::with_client(client(&server));
    let june = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
    assert!(service.check_goal_achievement(professional_id, june, None).await.unwrap().is_none());

    let progress = service.goal_progress(professional_id, 6, 2025, None).await.unwrap();
    assert_eq!(progress.current_amount, 350.0);
    assert_eq!(progress.percentage, 7.0);

    // No goal row for another professional
    Mock::given(method("GET"))
        .and(path("/rest/v1/financial_goals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let other = Uuid::new_v4();
    assert!(service.check_goal_achievement(other, june, None).await.unwrap().is_none());

    let err = service.goal_progress(other, 6, 2025, None).await.unwrap_err();
    assert_eq!(err.downcast_ref::<ReportingError>(), Some(&ReportingError::GoalNotFound));
}

#[tokio::test]
async fn upsert_goal_validates_before_writing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/financial_goals"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let service = GoalService::with_client(client(&server));
    let request = UpsertGoalRequest {
        professional_id: Uuid::new_v4(),
        month: 13,
        year: 2025,
        target_amount: 1000.0,
    };

    let err = service.upsert_goal(request, "token").await.unwrap_err();
    assert_matches!(err.downcast_ref::<ReportingError>(), Some(ReportingError::ValidationError(_)));
}

#[tokio::test]
async fn upsert_goal_merges_on_professional_month_year() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let id = professional_id.to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/financial_goals"))
        .and(query_param("on_conflict", "professional_id,month,year"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::goal_response(&id, 7, 2025, 8000.0)
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let service = GoalService::with_client(client(&server));
    let goal = service.upsert_goal(UpsertGoalRequest {
        professional_id,
        month: 7,
        year: 2025,
        target_amount: 8000.0,
    }, "token").await.unwrap();

    assert_eq!(goal.professional_id, professional_id);
    assert_eq!(goal.target_amount, 8000.0);
}
