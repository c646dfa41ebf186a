use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::api::{CounselorIdentity, PasswordChange, PhotoUpload, ProfileUpdate, RecordApi};
use crate::diag::DiagnosticSink;
use crate::record::FieldValue;
use crate::schema::{FieldKind, FieldRole, FieldSpec, Rule};
use crate::validate;

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const NOTICE_TTL: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsTab {
    Profile,
    Password,
    Photo,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SettingsOutcome {
    Saved,
    Invalid,
    Busy,
    Failed,
}

const PROFILE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        label: "Name",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required],
    },
    FieldSpec {
        name: "email",
        label: "Email",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required, Rule::Email],
    },
];

const PASSWORD_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "current_password",
        label: "Current Password",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required],
    },
    FieldSpec {
        name: "new_password",
        label: "New Password",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required, Rule::MinLen(6)],
    },
    FieldSpec {
        name: "confirm_password",
        label: "Confirm Password",
        kind: FieldKind::Text,
        role: FieldRole::Plain,
        rules: &[Rule::Required, Rule::Matches("new_password")],
    },
];

/// One sub-form of the settings modal: its own values, errors and in-flight
/// guard, independent of its siblings.
struct SubForm {
    specs: &'static [FieldSpec],
    values: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, String>,
    error_banner: Option<String>,
    in_flight: bool,
}

impl SubForm {
    fn new(specs: &'static [FieldSpec]) -> SubForm {
        SubForm {
            specs,
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
            error_banner: None,
            in_flight: false,
        }
    }

    fn set(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), FieldValue::text(value));
    }

    fn get(&self, name: &str) -> &str {
        self.values.get(name).map(|v| v.as_text()).unwrap_or("")
    }

    fn validate(&mut self) -> bool {
        self.errors = validate::validate(self.specs, &self.values);
        self.errors.is_empty()
    }
}

struct Notice {
    message: String,
    posted: Instant,
}

/// Profile/password/photo management for the authenticated counselor: three
/// independent sub-forms behind one modal with tabbed navigation. A
/// successful submit posts a transient notice; once it expires the modal
/// closes.
pub struct ProfileSettingsController<A: RecordApi> {
    api: A,
    diag: Arc<dyn DiagnosticSink>,
    open: bool,
    tab: SettingsTab,
    profile: SubForm,
    password: SubForm,
    pending_photo: Option<PhotoUpload>,
    photo_error: Option<String>,
    photo_in_flight: bool,
    notice: Option<Notice>,
}

impl<A: RecordApi> ProfileSettingsController<A> {
    pub fn new(api: A, diag: Arc<dyn DiagnosticSink>) -> Self {
        ProfileSettingsController {
            api,
            diag,
            open: false,
            tab: SettingsTab::Profile,
            profile: SubForm::new(PROFILE_FIELDS),
            password: SubForm::new(PASSWORD_FIELDS),
            pending_photo: None,
            photo_error: None,
            photo_in_flight: false,
            notice: None,
        }
    }

    pub fn open(&mut self, identity: &CounselorIdentity) {
        self.profile = SubForm::new(PROFILE_FIELDS);
        self.profile.set("name", &identity.display_name);
        self.profile.set("email", &identity.email);
        self.password = SubForm::new(PASSWORD_FIELDS);
        self.pending_photo = None;
        self.photo_error = None;
        self.notice = None;
        self.tab = SettingsTab::Profile;
        self.open = true;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn tab(&self) -> SettingsTab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: SettingsTab) {
        self.tab = tab;
    }

    pub fn set_profile_field(&mut self, name: &str, value: &str) {
        self.profile.set(name, value);
    }

    pub fn set_password_field(&mut self, name: &str, value: &str) {
        self.password.set(name, value);
    }

    pub fn profile_errors(&self) -> &BTreeMap<String, String> {
        &self.profile.errors
    }

    pub fn password_errors(&self) -> &BTreeMap<String, String> {
        &self.password.errors
    }

    pub fn photo_error(&self) -> Option<&str> {
        self.photo_error.as_deref()
    }

    pub fn profile_error_banner(&self) -> Option<&str> {
        self.profile.error_banner.as_deref()
    }

    pub fn password_error_banner(&self) -> Option<&str> {
        self.password.error_banner.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.message.as_str())
    }

    /// Expires the transient success notice; the modal closes with it.
    pub fn poll(&mut self, now: Instant) {
        let expired = self
            .notice
            .as_ref()
            .map(|n| now >= n.posted + NOTICE_TTL)
            .unwrap_or(false);
        if expired {
            self.notice = None;
            self.open = false;
        }
    }

    fn post_notice(&mut self, message: &str) {
        self.notice = Some(Notice {
            message: message.to_string(),
            posted: Instant::now(),
        });
    }

    pub async fn submit_profile(&mut self) -> SettingsOutcome {
        if self.profile.in_flight {
            return SettingsOutcome::Busy;
        }
        if !self.profile.validate() {
            return SettingsOutcome::Invalid;
        }
        let update = ProfileUpdate {
            name: self.profile.get("name").to_string(),
            email: self.profile.get("email").to_string(),
        };
        self.profile.in_flight = true;
        let result = self.api.update_profile(&update).await;
        self.profile.in_flight = false;
        match result {
            Ok(_) => {
                self.profile.error_banner = None;
                self.post_notice("Profile updated");
                SettingsOutcome::Saved
            }
            Err(e) => {
                self.diag.warn(&format!("profile update failed: {e}"));
                self.profile.error_banner = Some(e.to_string());
                SettingsOutcome::Failed
            }
        }
    }

    pub async fn submit_password(&mut self) -> SettingsOutcome {
        if self.password.in_flight {
            return SettingsOutcome::Busy;
        }
        if !self.password.validate() {
            return SettingsOutcome::Invalid;
        }
        let change = PasswordChange {
            current: self.password.get("current_password").to_string(),
            new: self.password.get("new_password").to_string(),
        };
        self.password.in_flight = true;
        let result = self.api.change_password(&change).await;
        self.password.in_flight = false;
        match result {
            Ok(()) => {
                self.password.error_banner = None;
                self.post_notice("Password changed");
                SettingsOutcome::Saved
            }
            Err(e) => {
                self.diag.warn(&format!("password change failed: {e}"));
                self.password.error_banner = Some(e.to_string());
                SettingsOutcome::Failed
            }
        }
    }

    /// Stages a photo for upload. Size and MIME type are gated locally so an
    /// oversized or non-image file never reaches the API.
    pub fn choose_photo(&mut self, file_name: &str, mime: &str, bytes: Vec<u8>) -> bool {
        if let Some(message) = check_photo(mime, bytes.len()) {
            self.photo_error = Some(message);
            self.pending_photo = None;
            return false;
        }
        self.photo_error = None;
        self.pending_photo = Some(PhotoUpload {
            file_name: file_name.to_string(),
            mime: mime.to_string(),
            bytes,
        });
        true
    }

    pub async fn submit_photo(&mut self) -> SettingsOutcome {
        if self.photo_in_flight {
            return SettingsOutcome::Busy;
        }
        let Some(upload) = self.pending_photo.take() else {
            self.photo_error = Some("no photo selected".to_string());
            return SettingsOutcome::Invalid;
        };
        self.photo_in_flight = true;
        let result = self.api.upload_photo(upload).await;
        self.photo_in_flight = false;
        match result {
            Ok(()) => {
                self.photo_error = None;
                self.post_notice("Photo updated");
                SettingsOutcome::Saved
            }
            Err(e) => {
                self.diag.warn(&format!("photo upload failed: {e}"));
                self.photo_error = Some(e.to_string());
                SettingsOutcome::Failed
            }
        }
    }

    pub async fn delete_photo(&mut self) -> SettingsOutcome {
        if self.photo_in_flight {
            return SettingsOutcome::Busy;
        }
        self.photo_in_flight = true;
        let result = self.api.delete_photo().await;
        self.photo_in_flight = false;
        match result {
            Ok(()) => {
                self.photo_error = None;
                self.post_notice("Photo removed");
                SettingsOutcome::Saved
            }
            Err(e) => {
                self.diag.warn(&format!("photo delete failed: {e}"));
                self.photo_error = Some(e.to_string());
                SettingsOutcome::Failed
            }
        }
    }
}

fn check_photo(mime: &str, len: usize) -> Option<String> {
    if !mime.trim().to_ascii_lowercase().starts_with("image/") {
        return Some("photo must be an image".to_string());
    }
    if len > MAX_PHOTO_BYTES {
        return Some("photo exceeds the 5 MiB limit".to_string());
    }
    None
}
