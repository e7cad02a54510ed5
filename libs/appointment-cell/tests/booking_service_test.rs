use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentError, AppointmentStatus, BookingRequest, CancelAppointmentRequest, PatientIdentity,
    PaymentStatus, RescheduleRequest,
};
use appointment_cell::services::{AppointmentBookingService, PaymentService};
use professional_cell::services::slots::day_of_week;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn client(server: &MockServer) -> Arc<SupabaseClient> {
    Arc::new(SupabaseClient::new(&TestConfig::with_url(&server.uri()).to_app_config()))
}

fn booking_service(server: &MockServer) -> AppointmentBookingService {
    AppointmentBookingService::with_client(client(server), TestConfig::default().clinic)
}

fn payment_service(server: &MockServer) -> PaymentService {
    PaymentService::with_client(client(server), TestConfig::default().clinic)
}

fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// A week out, so the slot is always in the future.
fn booking_date() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(7)
}

fn booking_request(service_id: Uuid, professional_id: Uuid, date: NaiveDate) -> BookingRequest {
    BookingRequest {
        service_id,
        professional_id,
        appointment_date: date,
        appointment_time: t(9, 0),
        patient: PatientIdentity {
            name: "Maria Souza".to_string(),
            email: "Patient@Example.com".to_string(),
            phone: Some("(11) 91234-5678".to_string()),
        },
        notes: None,
    }
}

/// Catalog rows plus a 08:00-10:00 schedule on the weekday of `date`.
async fn mount_catalog(server: &MockServer, service_id: &str, professional_id: &str, specialty: &str, date: NaiveDate) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::service_response(service_id, "Consulta", "Cardiologia", 200.0)
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/professionals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::professional_response(professional_id, "Dra. Ana Lima", specialty)
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::schedule_response(professional_id, day_of_week(date), "08:00:00", "10:00:00", 30)
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_times"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn mount_day_appointments(server: &MockServer, rows: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

async fn mount_notification(server: &MockServer, professional_id: &str, kind: &str, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .and(body_partial_json(json!({ "notification_type": kind })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::notification_response(professional_id, kind)
        ])))
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_appointment(server: &MockServer, appointment_id: &str, row: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

async fn mount_patch(server: &MockServer, row: Value, expected: u64) {
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(expected)
        .mount(server)
        .await;
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[tokio::test]
async fn booking_free_slot_creates_pending_appointment() {
    let server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4().to_string();
    let date = booking_date();
    let pid = professional_id.to_string();

    mount_catalog(&server, &service_id.to_string(), &pid, "Cardiologia", date).await;
    mount_day_appointments(&server, json!([])).await;
    mount_notification(&server, &pid, "appointment_booked", 1).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "pending",
            "payment_status": "pending",
            "amount": 200.0,
            "patient_email": "patient@example.com"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id, &pid, &date.to_string(), "09:00:00", "pending"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = booking_service(&server)
        .book_appointment(booking_request(service_id, professional_id, date), None)
        .await
        .unwrap();

    assert_eq!(appointment.id.to_string(), appointment_id);
    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert_eq!(appointment.payment_status, PaymentStatus::Pending);
}

async fn book_with_phone(phone: &str, stored: Value) {
    let server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let date = booking_date();
    let pid = professional_id.to_string();

    mount_catalog(&server, &service_id.to_string(), &pid, "Cardiologia", date).await;
    mount_day_appointments(&server, json!([])).await;
    mount_notification(&server, &pid, "appointment_booked", 1).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "patient_phone": stored })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &Uuid::new_v4().to_string(), &pid, &date.to_string(), "09:00:00", "pending"
            )
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = booking_request(service_id, professional_id, date);
    request.patient.phone = Some(phone.to_string());

    booking_service(&server)
        .book_appointment(request, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn blank_phone_is_stored_as_null() {
    book_with_phone("   ", Value::Null).await;
}

#[tokio::test]
async fn phone_is_trimmed_before_insert() {
    book_with_phone("  (11) 91234-5678 ", json!("(11) 91234-5678")).await;
}

#[tokio::test]
async fn taken_slot_is_refused_before_insert() {
    let server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let date = booking_date();
    let pid = professional_id.to_string();

    mount_catalog(&server, &service_id.to_string(), &pid, "Cardiologia", date).await;
    mount_day_appointments(&server, json!([
        MockSupabaseResponses::appointment_response(
            &Uuid::new_v4().to_string(), &pid, &date.to_string(), "09:00:00", "confirmed"
        )
    ])).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let result = booking_service(&server)
        .book_appointment(booking_request(service_id, professional_id, date), None)
        .await;

    assert_eq!(result.unwrap_err(), AppointmentError::SlotNotAvailable);
}

#[tokio::test]
async fn concurrent_insert_conflict_maps_to_slot_not_available() {
    let server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let date = booking_date();
    let pid = professional_id.to_string();

    mount_catalog(&server, &service_id.to_string(), &pid, "Cardiologia", date).await;
    mount_day_appointments(&server, json!([])).await;
    mount_notification(&server, &pid, "appointment_booked", 0).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response("duplicate key value violates unique constraint", "23505")
        ))
        .expect(1)
        .mount(&server)
        .await;

    let result = booking_service(&server)
        .book_appointment(booking_request(service_id, professional_id, date), None)
        .await;

    assert_eq!(result.unwrap_err(), AppointmentError::SlotNotAvailable);
}

#[tokio::test]
async fn professional_outside_the_service_specialty_is_refused() {
    let server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let date = booking_date();

    mount_catalog(&server, &service_id.to_string(), &professional_id.to_string(), "Dermatologia", date).await;

    let result = booking_service(&server)
        .book_appointment(booking_request(service_id, professional_id, date), None)
        .await;

    assert_matches!(result, Err(AppointmentError::SpecialtyMismatch { specialty }) if specialty == "Cardiologia");
}

#[tokio::test]
async fn time_off_the_slot_grid_is_invalid() {
    let server = MockServer::start().await;
    let service_id = Uuid::new_v4();
    let professional_id = Uuid::new_v4();
    let date = booking_date();

    mount_catalog(&server, &service_id.to_string(), &professional_id.to_string(), "Cardiologia", date).await;
    mount_day_appointments(&server, json!([])).await;

    let mut request = booking_request(service_id, professional_id, date);
    request.appointment_time = t(9, 15);

    let result = booking_service(&server).book_appointment(request, None).await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
}

#[tokio::test]
async fn past_times_are_rejected_without_touching_the_backend() {
    let server = MockServer::start().await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);

    let result = booking_service(&server)
        .book_appointment(booking_request(Uuid::new_v4(), Uuid::new_v4(), yesterday), None)
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn invalid_patient_email_is_a_validation_error() {
    let server = MockServer::start().await;
    let mut request = booking_request(Uuid::new_v4(), Uuid::new_v4(), booking_date());
    request.patient.email = "maria.example.com".to_string();

    let result = booking_service(&server).book_appointment(request, None).await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
}

// ==============================================================================
// CANCELLATION AND RESCHEDULE
// ==============================================================================

#[tokio::test]
async fn patient_cannot_cancel_inside_the_notice_window() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let professional_id = Uuid::new_v4().to_string();
    let soon = Utc::now().naive_utc() + Duration::hours(2);

    mount_appointment(&server, &appointment_id, MockSupabaseResponses::appointment_response(
        &appointment_id,
        &professional_id,
        &soon.date().to_string(),
        &soon.time().format("%H:%M:%S").to_string(),
        "confirmed",
    )).await;
    mount_patch(&server, json!({}), 0).await;

    let patient = TestUser::patient("patient@example.com").to_user();
    let result = booking_service(&server)
        .cancel_appointment(appointment_id.parse().unwrap(), CancelAppointmentRequest::default(), &patient, "token")
        .await;

    assert_eq!(result.unwrap_err(), AppointmentError::CancellationWindowClosed { hours: 24 });
}

#[tokio::test]
async fn staff_can_cancel_inside_the_notice_window() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let professional_id = Uuid::new_v4().to_string();
    let soon = Utc::now().naive_utc() + Duration::hours(2);
    let date = soon.date().to_string();
    let time = soon.time().format("%H:%M:%S").to_string();

    mount_appointment(&server, &appointment_id, MockSupabaseResponses::appointment_response(
        &appointment_id, &professional_id, &date, &time, "confirmed",
    )).await;
    mount_patch(&server, MockSupabaseResponses::appointment_response(
        &appointment_id, &professional_id, &date, &time, "cancelled",
    ), 1).await;
    mount_notification(&server, &professional_id, "appointment_cancelled", 1).await;

    let staff = TestUser::staff("front@clinic.test").to_user();
    let cancelled = booking_service(&server)
        .cancel_appointment(
            appointment_id.parse().unwrap(),
            CancelAppointmentRequest { reason: Some("Professional unavailable".to_string()) },
            &staff,
            "token",
        )
        .await
        .unwrap();

    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn other_patients_cannot_cancel() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let date = booking_date().to_string();

    mount_appointment(&server, &appointment_id, MockSupabaseResponses::appointment_response(
        &appointment_id, &Uuid::new_v4().to_string(), &date, "09:00:00", "confirmed",
    )).await;
    mount_patch(&server, json!({}), 0).await;

    let stranger = TestUser::patient("someone.else@example.com").to_user();
    let result = booking_service(&server)
        .cancel_appointment(appointment_id.parse().unwrap(), CancelAppointmentRequest::default(), &stranger, "token")
        .await;

    assert_eq!(result.unwrap_err(), AppointmentError::Unauthorized);
}

#[tokio::test]
async fn reschedule_request_flags_the_appointment_and_notifies() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let professional_id = Uuid::new_v4().to_string();
    let date = booking_date().to_string();

    mount_appointment(&server, &appointment_id, MockSupabaseResponses::appointment_response(
        &appointment_id, &professional_id, &date, "09:00:00", "confirmed",
    )).await;
    mount_notification(&server, &professional_id, "reschedule_requested", 1).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "status": "rescheduled" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&appointment_id, &professional_id, &date, "09:00:00", "rescheduled")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let patient = TestUser::patient("patient@example.com").to_user();
    let updated = booking_service(&server)
        .request_reschedule(
            appointment_id.parse().unwrap(),
            RescheduleRequest { reason: Some("Travel".to_string()) },
            &patient,
            "token",
        )
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Rescheduled);
}

#[tokio::test]
async fn cancelled_appointment_cannot_be_rescheduled() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();

    mount_appointment(&server, &appointment_id, MockSupabaseResponses::appointment_response(
        &appointment_id, &Uuid::new_v4().to_string(), &booking_date().to_string(), "09:00:00", "cancelled",
    )).await;
    mount_patch(&server, json!({}), 0).await;

    let patient = TestUser::patient("patient@example.com").to_user();
    let result = booking_service(&server)
        .request_reschedule(appointment_id.parse().unwrap(), RescheduleRequest::default(), &patient, "token")
        .await;

    assert_eq!(result.unwrap_err(), AppointmentError::RescheduleNotAllowed(AppointmentStatus::Cancelled));
}

// ==============================================================================
// PAYMENT
// ==============================================================================

fn with_session(mut row: Value, session_id: &str) -> Value {
    row["payment_session_id"] = json!(session_id);
    row
}

#[tokio::test]
async fn checkout_session_is_opened_and_stored() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let professional_id = Uuid::new_v4().to_string();
    let row = MockSupabaseResponses::appointment_response(
        &appointment_id, &professional_id, &booking_date().to_string(), "09:00:00", "pending",
    );

    Mock::given(method("POST"))
        .and(path("/functions/v1/create-checkout"))
        .and(body_partial_json(json!({
            "amount": 150.0,
            "customer_email": "patient@example.com",
            "success_url": format!("https://clinic.test/payment/success?appointment_id={}", appointment_id)
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "cs_test_1",
            "url": "https://pay.test/cs_test_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "payment_session_id": "cs_test_1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_session(row.clone(), "cs_test_1")])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = serde_json::from_value(row).unwrap();
    let session = payment_service(&server).create_checkout(&appointment, None).await.unwrap();

    assert_eq!(session.session_id, "cs_test_1");
    assert_eq!(session.url, "https://pay.test/cs_test_1");
}

#[tokio::test]
async fn verified_payment_confirms_and_checks_the_goal() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let professional_id = Uuid::new_v4().to_string();
    let date = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
    let pending = with_session(
        MockSupabaseResponses::appointment_response(&appointment_id, &professional_id, "2025-06-10", "09:00:00", "pending"),
        "cs_test_1",
    );
    let mut paid = with_session(
        MockSupabaseResponses::appointment_response(&appointment_id, &professional_id, "2025-06-10", "09:00:00", "confirmed"),
        "cs_test_1",
    );
    paid["payment_status"] = json!("paid");

    // Goal lookups come first so they win over the by-id fetch
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("payment_status", "eq.paid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": appointment_id,
            "professional_id": professional_id,
            "appointment_date": "2025-06-10",
            "status": "confirmed",
            "payment_status": "paid",
            "amount": 150.0
        }])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/financial_goals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::goal_response(&professional_id, date.month(), date.year(), 100.0)
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    mount_notification(&server, &professional_id, "goal_achieved", 1).await;

    mount_appointment(&server, &appointment_id, pending).await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/verify-payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "complete",
            "session_id": "cs_test_1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "payment_status": "paid", "status": "confirmed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([paid])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = payment_service(&server)
        .verify_payment(appointment_id.parse().unwrap(), "cs_test_1", None)
        .await
        .unwrap();

    assert_eq!(appointment.payment_status, PaymentStatus::Paid);
    assert_eq!(appointment.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn failed_payment_is_recorded_and_appointment_stays_pending() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();
    let professional_id = Uuid::new_v4().to_string();
    let date = booking_date().to_string();
    let pending = with_session(
        MockSupabaseResponses::appointment_response(&appointment_id, &professional_id, &date, "09:00:00", "pending"),
        "cs_test_2",
    );
    let mut failed = pending.clone();
    failed["payment_status"] = json!("failed");

    mount_appointment(&server, &appointment_id, pending).await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/verify-payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "expired" })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "payment_status": "failed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([failed])))
        .expect(1)
        .mount(&server)
        .await;

    let appointment = payment_service(&server)
        .verify_payment(appointment_id.parse().unwrap(), "cs_test_2", None)
        .await
        .unwrap();

    assert_eq!(appointment.payment_status, PaymentStatus::Failed);
    assert_eq!(appointment.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn foreign_session_id_is_rejected() {
    let server = MockServer::start().await;
    let appointment_id = Uuid::new_v4().to_string();

    mount_appointment(&server, &appointment_id, with_session(
        MockSupabaseResponses::appointment_response(
            &appointment_id, &Uuid::new_v4().to_string(), "2025-06-10", "09:00:00", "pending",
        ),
        "cs_real",
    )).await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/verify-payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "complete" })))
        .expect(0)
        .mount(&server)
        .await;

    let result = payment_service(&server)
        .verify_payment(appointment_id.parse().unwrap(), "cs_forged", None)
        .await;

    assert_eq!(result.unwrap_err(), AppointmentError::PaymentSessionMismatch);
}
