//! REST client for the record store.
//!
//! `POST {records_url}` takes a multipart form per closed session;
//! `GET {records_url}?owner={id}` returns the owner's history. Both carry the
//! caller's bearer token. There is no retry and no timeout beyond reqwest's
//! default.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    header::AUTHORIZATION,
    multipart::{Form, Part},
    Client, Response,
};
use serde_json::{Map, Value};

use super::RecordStore;
use crate::{
    auth::AuthContext,
    error::{TrackerError, TrackerResult, TransportError},
    log_info, log_warn,
    models::{
        record::{normalize_record, normalize_records},
        NewRecord, ServiceRecord,
    },
    settings::Settings,
};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: Client,
    records_url: String,
    owner_param: String,
}

impl HttpRecordStore {
    pub fn new(settings: &Settings) -> TrackerResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| TrackerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            records_url: settings.records_url(),
            owner_param: settings.owner_param.clone(),
        })
    }

    pub fn records_url(&self) -> &str {
        &self.records_url
    }

    fn build_form(record: &NewRecord) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .text("date", record.date.format("%Y-%m-%d").to_string())
            .text("entryTime", record.entry_time.clone())
            .text("exitTime", record.exit_time.clone())
            .text("hoursWorked", format_decimal(record.hours_worked))
            .text("title", record.title.clone())
            .text("description", record.description.clone())
            .text("observations", record.observations.clone());

        for upload in &record.evidence {
            let part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
            let part = match &upload.content_type {
                Some(content_type) => part.mime_str(content_type).map_err(|e| {
                    TransportError::new(
                        None,
                        format!("invalid content type for {}: {e}", upload.file_name),
                    )
                })?,
                None => part,
            };
            form = form.part("evidence", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create_record(
        &self,
        auth: &AuthContext,
        record: &NewRecord,
    ) -> Result<ServiceRecord, TransportError> {
        let form = Self::build_form(record)?;

        let response = self
            .client
            .post(&self.records_url)
            .header(AUTHORIZATION, auth.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::new(None, format!("failed to reach record store: {e}")))?;

        let body = read_success_body(response).await?;
        let value: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        match created_fields(value) {
            // An unreadable date in the echo falls back to the session's own.
            Some(fields) => Ok(normalize_record(&fields, record.date)),
            None => {
                log_warn!("Record store reply carried no record; using the submitted copy");
                Ok(ServiceRecord::from(record))
            }
        }
    }

    async fn list_records(
        &self,
        auth: &AuthContext,
        today: NaiveDate,
    ) -> Result<Vec<ServiceRecord>, TransportError> {
        let response = self
            .client
            .get(&self.records_url)
            .query(&[(self.owner_param.as_str(), auth.user_id())])
            .header(AUTHORIZATION, auth.bearer())
            .send()
            .await
            .map_err(|e| TransportError::new(None, format!("failed to reach record store: {e}")))?;

        let body = read_success_body(response).await?;
        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            TransportError::new(None, format!("record store returned invalid JSON: {e}"))
        })?;

        let records = normalize_records(payload, today);
        log_info!(
            "Fetched {} records for owner {}",
            records.len(),
            auth.user_id()
        );
        Ok(records)
    }
}

async fn read_success_body(response: Response) -> Result<String, TransportError> {
    let status = response.status();
    let body = response.text().await.map_err(|e| {
        TransportError::new(
            Some(status.as_u16()),
            format!("failed to read record store response: {e}"),
        )
    })?;

    if status.is_success() {
        return Ok(body);
    }

    log_warn!("Record store answered {}: {}", status, body);
    Err(match error_message(&body) {
        Some(message) => TransportError::new(Some(status.as_u16()), message),
        None => TransportError::fallback(Some(status.as_u16())),
    })
}

/// Pulls the human-readable message out of an error body: `message`,
/// `error`, or `error.message`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| match value.get(*key)? {
            Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
            Value::Object(inner) => inner
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty())
                .map(str::to_string),
            _ => None,
        })
}

/// The created record, either bare or wrapped under `record` / `data`.
fn created_fields(value: Value) -> Option<Map<String, Value>> {
    let Value::Object(mut fields) = value else {
        return None;
    };

    for key in ["record", "data"] {
        if let Some(Value::Object(inner)) = fields.remove(key) {
            return Some(inner);
        }
    }

    let looks_like_record = ["id", "_id", "date"].iter().any(|k| fields.contains_key(*k));
    looks_like_record.then_some(fields)
}

fn format_decimal(hours: f64) -> String {
    let rounded = format!("{hours:.4}");
    rounded
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
