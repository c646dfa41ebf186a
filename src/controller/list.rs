use std::sync::Arc;

use crate::api::RecordApi;
use crate::controller::form::{RecordForm, SubmitOutcome};
use crate::controller::view::RecordView;
use crate::controller::Display;
use crate::diag::DiagnosticSink;
use crate::record::{FieldValue, Record};
use crate::schema::RecordType;

/// Owns the collection for one record type and the four-state display
/// machine around it. List ⇄ Form(create|edit) and List ⇄ View are the only
/// transitions; leaving a form or view always lands back on the list.
pub struct RecordListController<A: RecordApi> {
    record_type: RecordType,
    api: A,
    diag: Arc<dyn DiagnosticSink>,
    records: Vec<Record>,
    display: Display,
    form: Option<RecordForm>,
    viewing: Option<RecordView>,
    loading: bool,
    error: Option<String>,
}

impl<A: RecordApi> RecordListController<A> {
    pub fn new(record_type: RecordType, api: A, diag: Arc<dyn DiagnosticSink>) -> Self {
        RecordListController {
            record_type,
            api,
            diag,
            records: Vec::new(),
            display: Display::List,
            form: None,
            viewing: None,
            loading: false,
            error: None,
        }
    }

    pub fn display(&self) -> Display {
        self.display
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn form(&self) -> Option<&RecordForm> {
        self.form.as_ref()
    }

    pub fn viewing(&self) -> Option<&RecordView> {
        self.viewing.as_ref()
    }

    /// Fetches the collection. On failure the previous list stays intact and
    /// the error is surfaced; the loading flag is cleared on every path.
    pub async fn load(&mut self) -> bool {
        self.loading = true;
        let result = self.api.list_records(&self.record_type).await;
        self.loading = false;
        match result {
            Ok(records) => {
                self.records = records;
                self.error = None;
                true
            }
            Err(e) => {
                self.diag
                    .warn(&format!("list load failed for {}: {e}", self.record_type.key));
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Opens a blank create form. The counselor identity is fetched fresh so
    /// the author fields reflect the current session; if that fetch fails the
    /// form still opens with them blank and the failure is logged only.
    /// Only reachable from the list.
    pub async fn start_create(&mut self) -> bool {
        if self.display != Display::List {
            return false;
        }
        let mut form = RecordForm::create(self.record_type);
        match self.api.counselor_identity().await {
            Ok(identity) => form.seed_author(&identity),
            Err(e) => self
                .diag
                .warn(&format!("counselor identity fetch failed: {e}")),
        }
        self.form = Some(form);
        self.display = Display::Create;
        true
    }

    /// Only reachable from the list; an open form or view must `back()`
    /// first, so edits in progress are never silently discarded.
    pub fn start_edit(&mut self, id: &str) -> bool {
        if self.display != Display::List {
            return false;
        }
        let Some(record) = self
            .records
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned()
        else {
            return false;
        };
        self.form = Some(RecordForm::edit(self.record_type, record));
        self.display = Display::Edit;
        true
    }

    /// Only reachable from the list, same as `start_edit`.
    pub fn view(&mut self, id: &str) -> bool {
        if self.display != Display::List {
            return false;
        }
        let Some(record) = self
            .records
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned()
        else {
            return false;
        };
        self.viewing = Some(RecordView::new(self.record_type, record));
        self.display = Display::View;
        true
    }

    pub fn back(&mut self) {
        self.form = None;
        self.viewing = None;
        self.display = Display::List;
    }

    /// Deletes one record. Confirmation is the caller's responsibility; this
    /// is the post-confirmation action. Success removes the row in place, no
    /// reload needed; failure leaves the list untouched.
    pub async fn delete(&mut self, id: &str) -> bool {
        self.loading = true;
        let result = self.api.delete_record(&self.record_type, id).await;
        self.loading = false;
        match result {
            Ok(()) => {
                self.records.retain(|r| r.id.as_deref() != Some(id));
                self.error = None;
                true
            }
            Err(e) => {
                self.diag
                    .warn(&format!("delete failed for {} {id}: {e}", self.record_type.key));
                self.error = Some(e.to_string());
                false
            }
        }
    }

    pub async fn set_field(&mut self, name: &str, value: FieldValue) {
        let Some(form) = self.form.as_mut() else {
            return;
        };
        form.set_field(&self.api, self.diag.as_ref(), name, value)
            .await;
    }

    /// Submits the open form. On success the machine returns to the list and
    /// reloads it; on failure the form stays populated for retry.
    pub async fn submit(&mut self) -> SubmitOutcome {
        let Some(form) = self.form.as_mut() else {
            return SubmitOutcome::Invalid;
        };
        let outcome = form.submit(&self.api, self.diag.as_ref()).await;
        if let SubmitOutcome::Saved(_) = &outcome {
            self.back();
            self.load().await;
        }
        outcome
    }
}
