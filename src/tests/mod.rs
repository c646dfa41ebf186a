use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::api::{
    ApiError, CounselorIdentity, PasswordChange, PdfPayload, PhotoUpload, ProfileUpdate,
    RecordApi, StudentProfile,
};
use crate::controller::{Display, RecordForm, RecordListController, SubmitOutcome};
use crate::diag::MemorySink;
use crate::export::ExportError;
use crate::record::{FieldValue, Record};
use crate::schema::{self, RecordType};
use crate::settings::{ProfileSettingsController, SettingsOutcome, MAX_PHOTO_BYTES, NOTICE_TTL};

#[derive(Default)]
struct MockState {
    calls: Mutex<Vec<String>>,
    records: Mutex<Vec<Record>>,
    fail_list: AtomicBool,
    fail_lookup: AtomicBool,
    fail_delete: AtomicBool,
    fail_submit: AtomicBool,
    fail_identity: AtomicBool,
    fail_profile: AtomicBool,
    pdf: Mutex<Option<PdfPayload>>,
}

#[derive(Clone, Default)]
struct MockApi {
    inner: Arc<MockState>,
}

impl MockApi {
    fn log(&self, entry: String) {
        self.inner.calls.lock().unwrap().push(entry);
    }

    fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().unwrap().clone()
    }

    fn seed(&self, record: Record) {
        self.inner.records.lock().unwrap().push(record);
    }
}

fn rejected() -> ApiError {
    ApiError::Rejected {
        status: 500,
        message: "boom".to_string(),
    }
}

impl RecordApi for MockApi {
    async fn list_records(&self, record_type: &RecordType) -> Result<Vec<Record>, ApiError> {
        self.log(format!("list {}", record_type.key));
        if self.inner.fail_list.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(self.inner.records.lock().unwrap().clone())
    }

    async fn create_record(
        &self,
        record_type: &RecordType,
        payload: Value,
    ) -> Result<Record, ApiError> {
        self.log(format!("create {}", record_type.key));
        if self.inner.fail_submit.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        let mut body = payload;
        body["id"] = serde_json::json!("101");
        let record = Record::from_json(record_type, &body);
        self.seed(record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        record_type: &RecordType,
        id: &str,
        payload: Value,
    ) -> Result<Record, ApiError> {
        self.log(format!("update {id}"));
        if self.inner.fail_submit.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        let mut body = payload;
        body["id"] = serde_json::json!(id);
        Ok(Record::from_json(record_type, &body))
    }

    async fn delete_record(&self, record_type: &RecordType, id: &str) -> Result<(), ApiError> {
        self.log(format!("delete {} {id}", record_type.key));
        if self.inner.fail_delete.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(())
    }

    async fn lookup_student(&self, id: &str) -> Result<StudentProfile, ApiError> {
        self.log(format!("lookup {id}"));
        if self.inner.fail_lookup.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(StudentProfile {
            id: id.to_string(),
            full_name: "Mock Student".to_string(),
            grade_level: "11".to_string(),
            section: "B".to_string(),
        })
    }

    async fn counselor_identity(&self) -> Result<CounselorIdentity, ApiError> {
        self.log("identity".to_string());
        if self.inner.fail_identity.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(CounselorIdentity {
            id: "C-1".to_string(),
            display_name: "Mock Counselor".to_string(),
            email: "counselor@example.test".to_string(),
            photo_url: None,
        })
    }

    async fn fetch_pdf(&self, record_type: &RecordType, id: &str) -> Result<PdfPayload, ApiError> {
        self.log(format!("pdf {} {id}", record_type.key));
        Ok(self
            .inner
            .pdf
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| PdfPayload {
                content_type: "application/pdf".to_string(),
                bytes: b"%PDF-1.4 mock".to_vec(),
            }))
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<CounselorIdentity, ApiError> {
        self.log(format!("profile {} {}", update.name, update.email));
        if self.inner.fail_profile.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(CounselorIdentity {
            id: "C-1".to_string(),
            display_name: update.name.clone(),
            email: update.email.clone(),
            photo_url: None,
        })
    }

    async fn change_password(&self, _change: &PasswordChange) -> Result<(), ApiError> {
        self.log("password".to_string());
        if self.inner.fail_profile.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(())
    }

    async fn upload_photo(&self, upload: PhotoUpload) -> Result<(), ApiError> {
        self.log(format!("upload {} {}", upload.mime, upload.bytes.len()));
        if self.inner.fail_profile.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(())
    }

    async fn delete_photo(&self) -> Result<(), ApiError> {
        self.log("delete-photo".to_string());
        if self.inner.fail_profile.load(Ordering::SeqCst) {
            return Err(rejected());
        }
        Ok(())
    }
}

fn seeded_record(record_type: &RecordType, id: &str, student_id: &str) -> Record {
    let mut record = Record::blank(record_type);
    record.id = Some(id.to_string());
    record.set("student_id", FieldValue::text(student_id));
    record.set("date", FieldValue::text("2024-05-01T00:00:00Z"));
    record
}

fn controller(record_type: RecordType, mock: &MockApi) -> RecordListController<MockApi> {
    RecordListController::new(record_type, mock.clone(), Arc::new(MemorySink::default()))
}

fn controller_with_sink(
    record_type: RecordType,
    mock: &MockApi,
    sink: Arc<MemorySink>,
) -> RecordListController<MockApi> {
    RecordListController::new(record_type, mock.clone(), sink)
}

#[tokio::test]
async fn load_failure_keeps_previous_list_and_clears_loading() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "1", "S-1"));
    let mut controller = controller(rt, &mock);

    assert!(controller.load().await);
    assert_eq!(controller.records().len(), 1);

    mock.inner.fail_list.store(true, Ordering::SeqCst);
    assert!(!controller.load().await);
    assert_eq!(controller.records().len(), 1, "previous list must survive");
    assert!(!controller.is_loading());
    assert!(controller.error().is_some());
}

#[tokio::test]
async fn exactly_one_display_state_and_back_always_returns_to_list() {
    let rt = schema::find("consent").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "1", "S-1"));
    let mut controller = controller(rt, &mock);
    controller.load().await;

    assert_eq!(controller.display(), Display::List);

    controller.start_create().await;
    assert_eq!(controller.display(), Display::Create);
    assert!(controller.form().is_some());
    assert!(controller.viewing().is_none());

    controller.back();
    assert_eq!(controller.display(), Display::List);
    assert!(controller.form().is_none());

    assert!(controller.start_edit("1"));
    assert_eq!(controller.display(), Display::Edit);
    assert!(controller.viewing().is_none());

    controller.back();
    assert!(controller.view("1"));
    assert_eq!(controller.display(), Display::View);
    assert!(controller.form().is_none());

    controller.back();
    assert_eq!(controller.display(), Display::List);
    assert!(controller.viewing().is_none());
}

#[tokio::test]
async fn start_create_seeds_author_from_fresh_identity() {
    let rt = schema::find("pass-slip").unwrap();
    let mock = MockApi::default();
    let mut controller = controller(rt, &mock);

    controller.start_create().await;
    let form = controller.form().unwrap();
    assert_eq!(
        form.record().field("counselor_name").unwrap().as_text(),
        "Mock Counselor"
    );
    assert_eq!(form.record().author_id.as_deref(), Some("C-1"));
    assert!(form.record().id.is_none());
    assert!(mock.calls().contains(&"identity".to_string()));
}

#[tokio::test]
async fn identity_fetch_failure_still_opens_the_form() {
    let rt = schema::find("pass-slip").unwrap();
    let mock = MockApi::default();
    mock.inner.fail_identity.store(true, Ordering::SeqCst);
    let sink = Arc::new(MemorySink::default());
    let mut controller = controller_with_sink(rt, &mock, Arc::clone(&sink));

    controller.start_create().await;
    assert_eq!(controller.display(), Display::Create);
    let form = controller.form().unwrap();
    assert_eq!(form.record().field("counselor_name").unwrap().as_text(), "");
    assert!(sink.entries().iter().any(|e| e.contains("identity")));
}

#[tokio::test]
async fn failed_student_lookup_leaves_derived_fields_unchanged() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    let sink = Arc::new(MemorySink::default());
    let mut controller = controller_with_sink(rt, &mock, Arc::clone(&sink));
    controller.start_create().await;

    controller
        .set_field("student_id", FieldValue::text("S-1"))
        .await;
    assert_eq!(
        controller
            .form()
            .unwrap()
            .record()
            .field("grade_level")
            .unwrap()
            .as_text(),
        "11"
    );

    mock.inner.fail_lookup.store(true, Ordering::SeqCst);
    controller
        .set_field("student_id", FieldValue::text("S-2"))
        .await;
    let form = controller.form().unwrap();
    assert_eq!(
        form.record().field("grade_level").unwrap().as_text(),
        "11",
        "derived fields keep their previous values on lookup failure"
    );
    assert_eq!(form.record().field("section").unwrap().as_text(), "B");
    // silent degradation: logged only, never surfaced
    assert!(form.error_banner().is_none());
    assert!(form.errors().is_empty());
    assert!(sink.entries().iter().any(|e| e.contains("lookup")));
}

#[tokio::test]
async fn clearing_the_student_selection_always_clears_derived_fields() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    let mut controller = controller(rt, &mock);
    controller.start_create().await;

    controller
        .set_field("student_id", FieldValue::text("S-1"))
        .await;
    mock.inner.fail_lookup.store(true, Ordering::SeqCst);
    controller.set_field("student_id", FieldValue::text("")).await;

    let form = controller.form().unwrap();
    assert_eq!(form.record().field("grade_level").unwrap().as_text(), "");
    assert_eq!(form.record().field("section").unwrap().as_text(), "");
}

#[tokio::test]
async fn setting_unrelated_fields_never_touches_identifier_or_neighbors() {
    let rt = schema::find("consent").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "7", "S-1"));
    let mut controller = controller(rt, &mock);
    controller.load().await;
    controller.start_edit("7");

    controller
        .set_field("remarks", FieldValue::text("updated remarks"))
        .await;

    let form = controller.form().unwrap();
    assert_eq!(form.record().id.as_deref(), Some("7"));
    assert_eq!(form.record().field("student_id").unwrap().as_text(), "S-1");
    assert_eq!(form.record().field("date").unwrap().as_text(), "2024-05-01");
}

#[tokio::test]
async fn invalid_submit_is_never_sent() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    let mut controller = controller(rt, &mock);
    controller.start_create().await;
    controller
        .set_field("date", FieldValue::text("2024-05-01"))
        .await;

    let outcome = controller.submit().await;
    assert_eq!(outcome, SubmitOutcome::Invalid);
    let errors = controller.form().unwrap().errors();
    assert_eq!(errors.get("student_id").map(String::as_str), Some("required"));
    assert!(
        !mock.calls().iter().any(|c| c.starts_with("create")),
        "no request may be issued for an invalid form"
    );
    assert_eq!(controller.display(), Display::Create, "form stays open");
}

#[tokio::test]
async fn successful_submit_returns_to_list_and_reloads() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    let mut controller = controller(rt, &mock);
    controller.start_create().await;
    controller
        .set_field("student_id", FieldValue::text("S-1"))
        .await;
    controller
        .set_field("date", FieldValue::text("2024-05-01"))
        .await;

    let outcome = controller.submit().await;
    match outcome {
        SubmitOutcome::Saved(record) => assert_eq!(record.id.as_deref(), Some("101")),
        other => panic!("expected Saved, got {other:?}"),
    }
    assert_eq!(controller.display(), Display::List);
    assert!(controller.form().is_none());
    assert_eq!(controller.records().len(), 1, "list reloaded after submit");

    let calls = mock.calls();
    let create = calls.iter().position(|c| c.starts_with("create")).unwrap();
    let list = calls.iter().position(|c| c.starts_with("list")).unwrap();
    assert!(list > create, "reload happens after the submit completes");
}

#[tokio::test]
async fn editing_submits_an_update_keyed_by_the_existing_id() {
    let rt = schema::find("consent").unwrap();
    let mock = MockApi::default();
    let mut record = seeded_record(&rt, "7", "S-1");
    record.set("party_name", FieldValue::text("Parent"));
    mock.seed(record);
    let mut controller = controller(rt, &mock);
    controller.load().await;
    assert!(controller.start_edit("7"));

    match controller.submit().await {
        SubmitOutcome::Saved(saved) => assert_eq!(saved.id.as_deref(), Some("7")),
        other => panic!("expected Saved, got {other:?}"),
    }
    let calls = mock.calls();
    assert!(calls.contains(&"update 7".to_string()));
    assert!(
        !calls.iter().any(|c| c.starts_with("create")),
        "an existing id must route to update, never create"
    );
}

#[tokio::test]
async fn an_open_form_is_not_discarded_by_direct_view_or_edit_jumps() {
    let rt = schema::find("consent").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "1", "S-1"));
    let mut controller = controller(rt, &mock);
    controller.load().await;
    assert!(controller.start_create().await);
    controller
        .set_field("remarks", FieldValue::text("draft"))
        .await;

    assert!(!controller.view("1"));
    assert!(!controller.start_edit("1"));
    assert!(!controller.start_create().await);
    assert_eq!(controller.display(), Display::Create);
    assert_eq!(
        controller
            .form()
            .unwrap()
            .record()
            .field("remarks")
            .unwrap()
            .as_text(),
        "draft"
    );

    controller.back();
    assert!(controller.view("1"));
}

#[tokio::test]
async fn failed_submit_keeps_the_form_populated_for_retry() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    mock.inner.fail_submit.store(true, Ordering::SeqCst);
    let mut controller = controller(rt, &mock);
    controller.start_create().await;
    controller
        .set_field("student_id", FieldValue::text("S-1"))
        .await;
    controller
        .set_field("date", FieldValue::text("2024-05-01"))
        .await;

    assert_eq!(controller.submit().await, SubmitOutcome::Failed);
    assert_eq!(controller.display(), Display::Create);
    let form = controller.form().unwrap();
    assert_eq!(form.record().field("student_id").unwrap().as_text(), "S-1");
    assert!(form.error_banner().is_some());
    assert!(!form.is_in_flight(), "in-flight guard released on failure");
}

#[tokio::test]
async fn in_flight_guard_rejects_reentrant_submit() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    let sink = MemorySink::default();
    let mut form = RecordForm::create(rt);
    form.set_field(&mock, &sink, "student_id", FieldValue::text("S-1"))
        .await;
    form.set_field(&mock, &sink, "date", FieldValue::text("2024-05-01"))
        .await;

    form.set_in_flight_for_tests(true);
    assert_eq!(form.submit(&mock, &sink).await, SubmitOutcome::Busy);
    assert!(
        !mock.calls().iter().any(|c| c.starts_with("create")),
        "a duplicate request would create a duplicate record"
    );
}

#[tokio::test]
async fn confirmed_delete_removes_the_row_without_a_reload() {
    let rt = schema::find("custody").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "1", "S-1"));
    mock.seed(seeded_record(&rt, "2", "S-2"));
    let mut controller = controller(rt, &mock);
    controller.load().await;

    assert!(controller.delete("1").await);
    assert_eq!(controller.records().len(), 1);
    assert_eq!(controller.records()[0].id.as_deref(), Some("2"));

    let calls = mock.calls();
    assert_eq!(
        calls.iter().filter(|c| c.starts_with("list")).count(),
        1,
        "a single-row delete needs no full reload"
    );
    assert!(calls.contains(&"delete custody 1".to_string()));
}

#[tokio::test]
async fn failed_delete_leaves_the_list_unchanged() {
    let rt = schema::find("custody").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "1", "S-1"));
    mock.inner.fail_delete.store(true, Ordering::SeqCst);
    let mut controller = controller(rt, &mock);
    controller.load().await;

    assert!(!controller.delete("1").await);
    assert_eq!(controller.records().len(), 1);
    assert!(controller.error().is_some());
    assert!(!controller.is_loading());
}

#[tokio::test]
async fn html_masquerading_as_a_pdf_is_rejected_and_not_saved() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    *mock.inner.pdf.lock().unwrap() = Some(PdfPayload {
        content_type: "text/html".to_string(),
        bytes: b"<html>Internal Server Error</html>".to_vec(),
    });
    mock.seed(seeded_record(&rt, "9", "S-1"));
    let mut controller = controller(rt, &mock);
    controller.load().await;
    controller.view("9");

    let dir = std::env::temp_dir().join("guidancedesk-tests-bad-pdf");
    std::fs::create_dir_all(&dir).unwrap();
    let result = controller
        .viewing()
        .unwrap()
        .export_pdf(controller.api(), &dir)
        .await;
    match result {
        Err(ExportError::InvalidPdf) => {}
        other => panic!("expected InvalidPdf, got {other:?}"),
    }
    assert_eq!(
        ExportError::InvalidPdf.to_string(),
        "Server did not return a valid PDF file"
    );
    assert!(!dir.join("career-plan-9.pdf").exists());
}

#[tokio::test]
async fn server_rendered_export_saves_a_named_download() {
    let rt = schema::find("career-plan").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "9", "S-1"));
    let mut controller = controller(rt, &mock);
    controller.load().await;
    controller.view("9");

    let dir = std::env::temp_dir().join("guidancedesk-tests-good-pdf");
    std::fs::create_dir_all(&dir).unwrap();
    let path = controller
        .viewing()
        .unwrap()
        .export_pdf(controller.api(), &dir)
        .await
        .unwrap();
    assert_eq!(path, dir.join("career-plan-9.pdf"));
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn client_composed_export_never_calls_the_server() {
    let rt = schema::find("pass-slip").unwrap();
    let mock = MockApi::default();
    mock.seed(seeded_record(&rt, "3", "S-1"));
    let mut controller = controller(rt, &mock);
    controller.load().await;
    controller.view("3");

    let dir = std::env::temp_dir().join("guidancedesk-tests-composed-pdf");
    std::fs::create_dir_all(&dir).unwrap();
    let path = controller
        .viewing()
        .unwrap()
        .export_pdf(controller.api(), &dir)
        .await
        .unwrap();
    assert!(!mock.calls().iter().any(|c| c.starts_with("pdf")));
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn settings_notice_expires_and_closes_the_modal() {
    let mock = MockApi::default();
    let mut controller =
        ProfileSettingsController::new(mock.clone(), Arc::new(MemorySink::default()));
    controller.open(&CounselorIdentity {
        id: "C-1".to_string(),
        display_name: "Mock Counselor".to_string(),
        email: "counselor@example.test".to_string(),
        photo_url: None,
    });

    assert_eq!(controller.submit_profile().await, SettingsOutcome::Saved);
    assert_eq!(controller.notice(), Some("Profile updated"));
    assert!(controller.is_open());

    let now = tokio::time::Instant::now();
    controller.poll(now);
    assert!(controller.is_open(), "notice still showing before 2s");
    controller.poll(now + NOTICE_TTL + Duration::from_millis(100));
    assert!(!controller.is_open(), "modal closes once the notice expires");
    assert!(controller.notice().is_none());
}

#[tokio::test]
async fn password_sub_form_validates_before_any_request() {
    let mock = MockApi::default();
    let mut controller =
        ProfileSettingsController::new(mock.clone(), Arc::new(MemorySink::default()));
    controller.set_password_field("current_password", "old-secret");
    controller.set_password_field("new_password", "abcdef");
    controller.set_password_field("confirm_password", "abcdeg");

    assert_eq!(controller.submit_password().await, SettingsOutcome::Invalid);
    assert_eq!(
        controller
            .password_errors()
            .get("confirm_password")
            .map(String::as_str),
        Some("does not match")
    );
    assert!(!mock.calls().contains(&"password".to_string()));

    controller.set_password_field("confirm_password", "abcdef");
    assert_eq!(controller.submit_password().await, SettingsOutcome::Saved);
    assert!(mock.calls().contains(&"password".to_string()));
}

#[tokio::test]
async fn oversized_or_non_image_photos_never_reach_the_api() {
    let mock = MockApi::default();
    let mut controller =
        ProfileSettingsController::new(mock.clone(), Arc::new(MemorySink::default()));

    assert!(!controller.choose_photo("a.bin", "application/octet-stream", vec![0u8; 16]));
    assert!(controller.photo_error().is_some());

    assert!(!controller.choose_photo("big.png", "image/png", vec![0u8; MAX_PHOTO_BYTES + 1]));
    assert_eq!(controller.submit_photo().await, SettingsOutcome::Invalid);
    assert!(!mock.calls().iter().any(|c| c.starts_with("upload")));

    assert!(controller.choose_photo("ok.png", "image/png", vec![0u8; 16]));
    assert_eq!(controller.submit_photo().await, SettingsOutcome::Saved);
    assert!(mock.calls().contains(&"upload image/png 16".to_string()));
}

#[tokio::test]
async fn profile_sub_forms_keep_independent_error_state() {
    let mock = MockApi::default();
    let mut controller =
        ProfileSettingsController::new(mock.clone(), Arc::new(MemorySink::default()));
    controller.open(&CounselorIdentity {
        id: "C-1".to_string(),
        display_name: "Mock Counselor".to_string(),
        email: "counselor@example.test".to_string(),
        photo_url: None,
    });

    controller.set_profile_field("email", "not-an-email");
    assert_eq!(controller.submit_profile().await, SettingsOutcome::Invalid);
    assert!(controller.profile_errors().contains_key("email"));
    assert!(controller.password_errors().is_empty());
    assert!(controller.photo_error().is_none());
}
