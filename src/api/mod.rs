use reqwest::{redirect, Method};
use serde_json::Value;
use thiserror::Error;

use crate::record::Record;
use crate::schema::RecordType;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("request failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("{message}")]
    MalformedResponse { message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct StudentProfile {
    pub id: String,
    pub full_name: String,
    pub grade_level: String,
    pub section: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CounselorIdentity {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub photo_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PdfPayload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct PasswordChange {
    pub current: String,
    pub new: String,
}

#[derive(Clone, Debug)]
pub struct PhotoUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Every remote operation the controllers perform, as a seam so tests can
/// substitute a scripted API.
#[allow(async_fn_in_trait)]
pub trait RecordApi {
    async fn list_records(&self, record_type: &RecordType) -> Result<Vec<Record>, ApiError>;
    async fn create_record(
        &self,
        record_type: &RecordType,
        payload: Value,
    ) -> Result<Record, ApiError>;
    async fn update_record(
        &self,
        record_type: &RecordType,
        id: &str,
        payload: Value,
    ) -> Result<Record, ApiError>;
    async fn delete_record(&self, record_type: &RecordType, id: &str) -> Result<(), ApiError>;
    async fn lookup_student(&self, id: &str) -> Result<StudentProfile, ApiError>;
    async fn counselor_identity(&self) -> Result<CounselorIdentity, ApiError>;
    async fn fetch_pdf(&self, record_type: &RecordType, id: &str) -> Result<PdfPayload, ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<CounselorIdentity, ApiError>;
    async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError>;
    async fn upload_photo(&self, upload: PhotoUpload) -> Result<(), ApiError>;
    async fn delete_photo(&self) -> Result<(), ApiError>;
}

pub struct ApiClient {
    session: Session,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(session: Session) -> Result<ApiClient, ApiError> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::limited(10))
            .timeout(session.timeout())
            .build()
            .map_err(|source| ApiError::ClientBuild { source })?;
        Ok(ApiClient { session, client })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.session.url(path));
        // read the token fresh on every request
        if let Some(token) = self.session.bearer() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|source| ApiError::Transport { source })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = truncate(&response.text().await.unwrap_or_default());
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json(&self, builder: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = self.send(builder).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::MalformedResponse {
                message: format!("invalid JSON in response: {e}"),
            })
    }
}

fn truncate(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.len() <= 300 {
        trimmed.to_string()
    } else {
        let mut end = 300;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

fn collection_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn string_of(value: &Value, name: &str) -> String {
    match value.get(name) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

impl RecordApi for ApiClient {
    async fn list_records(&self, record_type: &RecordType) -> Result<Vec<Record>, ApiError> {
        let body = self
            .send_json(self.request(Method::GET, record_type.endpoints.collection))
            .await?;
        Ok(collection_items(body)
            .iter()
            .map(|item| Record::from_json(record_type, item))
            .collect())
    }

    async fn create_record(
        &self,
        record_type: &RecordType,
        payload: Value,
    ) -> Result<Record, ApiError> {
        let body = self
            .send_json(
                self.request(Method::POST, record_type.endpoints.collection)
                    .json(&payload),
            )
            .await?;
        Ok(Record::from_json(record_type, &body))
    }

    async fn update_record(
        &self,
        record_type: &RecordType,
        id: &str,
        payload: Value,
    ) -> Result<Record, ApiError> {
        let body = self
            .send_json(
                self.request(Method::PUT, &record_type.endpoints.item(id))
                    .json(&payload),
            )
            .await?;
        Ok(Record::from_json(record_type, &body))
    }

    async fn delete_record(&self, record_type: &RecordType, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &record_type.endpoints.item(id)))
            .await?;
        Ok(())
    }

    async fn lookup_student(&self, id: &str) -> Result<StudentProfile, ApiError> {
        let body = self
            .send_json(self.request(Method::GET, &format!("/students/{id}")))
            .await?;
        Ok(StudentProfile {
            id: string_of(&body, "id"),
            full_name: string_of(&body, "full_name"),
            grade_level: string_of(&body, "grade_level"),
            section: string_of(&body, "section"),
        })
    }

    async fn counselor_identity(&self) -> Result<CounselorIdentity, ApiError> {
        let body = self
            .send_json(self.request(Method::GET, "/counselors/me"))
            .await?;
        Ok(CounselorIdentity {
            id: string_of(&body, "id"),
            display_name: string_of(&body, "display_name"),
            email: string_of(&body, "email"),
            photo_url: body
                .get("photo_url")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
        })
    }

    async fn fetch_pdf(&self, record_type: &RecordType, id: &str) -> Result<PdfPayload, ApiError> {
        let path = record_type
            .endpoints
            .pdf_for(id)
            .ok_or_else(|| ApiError::MalformedResponse {
                message: format!("record type '{}' has no PDF endpoint", record_type.key),
            })?;
        let response = self.send(self.request(Method::GET, &path)).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { source })?;
        Ok(PdfPayload {
            content_type,
            bytes: bytes.to_vec(),
        })
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<CounselorIdentity, ApiError> {
        let body = self
            .send_json(self.request(Method::PUT, "/counselors/me").json(
                &serde_json::json!({ "display_name": update.name, "email": update.email }),
            ))
            .await?;
        Ok(CounselorIdentity {
            id: string_of(&body, "id"),
            display_name: string_of(&body, "display_name"),
            email: string_of(&body, "email"),
            photo_url: body
                .get("photo_url")
                .and_then(|v| v.as_str())
                .map(|v| v.to_string()),
        })
    }

    async fn change_password(&self, change: &PasswordChange) -> Result<(), ApiError> {
        self.send(
            self.request(Method::PUT, "/counselors/me/password")
                .json(&serde_json::json!({
                    "current_password": change.current,
                    "new_password": change.new,
                })),
        )
        .await?;
        Ok(())
    }

    async fn upload_photo(&self, upload: PhotoUpload) -> Result<(), ApiError> {
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime)
            .map_err(|e| ApiError::MalformedResponse {
                message: format!("invalid photo mime type: {e}"),
            })?;
        let form = reqwest::multipart::Form::new().part("photo", part);
        self.send(
            self.request(Method::POST, "/counselors/me/photo")
                .multipart(form),
        )
        .await?;
        Ok(())
    }

    async fn delete_photo(&self) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, "/counselors/me/photo"))
            .await?;
        Ok(())
    }
}
