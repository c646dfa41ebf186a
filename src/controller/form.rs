use std::collections::BTreeMap;

use crate::api::{ApiError, CounselorIdentity, RecordApi};
use crate::diag::DiagnosticSink;
use crate::record::{normalize_date, FieldValue, Record};
use crate::schema::{FieldKind, FieldRole, RecordType};
use crate::validate;

/// Editable state for one record, seeded blank (create) or from an existing
/// record (edit). Create versus update is decided by identifier presence at
/// submit time; the identifier itself is never touched by edits.
pub struct RecordForm {
    record_type: RecordType,
    record: Record,
    errors: BTreeMap<String, String>,
    error_banner: Option<String>,
    in_flight: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmitOutcome {
    Saved(Record),
    Invalid,
    Busy,
    Failed,
}

impl RecordForm {
    pub fn create(record_type: RecordType) -> RecordForm {
        RecordForm {
            record: Record::blank(&record_type),
            record_type,
            errors: BTreeMap::new(),
            error_banner: None,
            in_flight: false,
        }
    }

    /// Copies an existing record into form state, normalizing date fields to
    /// their calendar day for editable date inputs.
    pub fn edit(record_type: RecordType, mut record: Record) -> RecordForm {
        for spec in record_type.fields {
            if spec.kind == FieldKind::Date {
                if let Some(value) = record.fields.get(spec.name) {
                    let day = normalize_date(value.as_text());
                    record.set(spec.name, FieldValue::Text(day));
                }
            }
        }
        RecordForm {
            record_type,
            record,
            errors: BTreeMap::new(),
            error_banner: None,
            in_flight: false,
        }
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn error_banner(&self) -> Option<&str> {
        self.error_banner.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Seeds the author display fields from a freshly fetched counselor
    /// identity.
    pub fn seed_author(&mut self, identity: &CounselorIdentity) {
        self.record.author_id = Some(identity.id.clone());
        for spec in self.record_type.fields {
            if spec.role == FieldRole::Author {
                self.record
                    .set(spec.name, FieldValue::text(identity.display_name.clone()));
            }
        }
    }

    /// Updates exactly one field. Changing the student selection triggers a
    /// lookup of that student's derived fields: on success they are
    /// overwritten, on failure they are left exactly as they were and the
    /// failure is logged only (deliberate silent degradation). Clearing the
    /// selection always clears them, independent of any lookup.
    pub async fn set_field<A: RecordApi>(
        &mut self,
        api: &A,
        diag: &dyn DiagnosticSink,
        name: &str,
        value: FieldValue,
    ) {
        self.record.set(name, value.clone());
        let Some(spec) = self.record_type.field(name) else {
            return;
        };
        if spec.role != FieldRole::StudentRef {
            return;
        }
        let student_id = value.as_text().trim().to_string();
        if student_id.is_empty() {
            self.clear_derived();
            return;
        }
        match api.lookup_student(&student_id).await {
            Ok(profile) => {
                for spec in self.record_type.fields {
                    match spec.role {
                        FieldRole::DerivedGrade => {
                            self.record
                                .set(spec.name, FieldValue::text(profile.grade_level.clone()));
                        }
                        FieldRole::DerivedSection => {
                            self.record
                                .set(spec.name, FieldValue::text(profile.section.clone()));
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => diag.warn(&format!("student lookup failed for '{student_id}': {e}")),
        }
    }

    fn clear_derived(&mut self) {
        for spec in self.record_type.fields {
            if matches!(
                spec.role,
                FieldRole::DerivedGrade | FieldRole::DerivedSection
            ) {
                self.record.set(spec.name, FieldValue::text(""));
            }
        }
    }

    pub fn validate(&mut self) -> &BTreeMap<String, String> {
        self.errors = validate::validate(self.record_type.fields, &self.record.fields);
        &self.errors
    }

    /// Validates and submits. While one submit is outstanding re-entry is
    /// rejected, since the API has no idempotency key and a duplicate request
    /// would create a duplicate record.
    pub async fn submit<A: RecordApi>(
        &mut self,
        api: &A,
        diag: &dyn DiagnosticSink,
    ) -> SubmitOutcome {
        if self.in_flight {
            return SubmitOutcome::Busy;
        }
        self.validate();
        if !self.errors.is_empty() {
            return SubmitOutcome::Invalid;
        }

        self.in_flight = true;
        let payload = self.record.payload(&self.record_type);
        let result = match self.record.id.as_deref() {
            Some(id) => api.update_record(&self.record_type, id, payload).await,
            None => api.create_record(&self.record_type, payload).await,
        };
        self.in_flight = false;

        match result {
            Ok(saved) => {
                self.error_banner = None;
                SubmitOutcome::Saved(saved)
            }
            Err(e) => {
                self.log_failure(diag, &e);
                self.error_banner = Some(e.to_string());
                SubmitOutcome::Failed
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_in_flight_for_tests(&mut self, in_flight: bool) {
        self.in_flight = in_flight;
    }

    fn log_failure(&self, diag: &dyn DiagnosticSink, error: &ApiError) {
        diag.warn(&format!(
            "submit failed for {}: {error}",
            self.record_type.key
        ));
    }
}
