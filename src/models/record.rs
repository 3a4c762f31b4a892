//! Service records: the append-only history of closed sessions.
//!
//! `ServiceRecord` is what the store hands back; `NewRecord` is what a closing
//! session submits. Records fetched from the store go through
//! [`normalize_records`], which never fails: a field that cannot be read is
//! replaced by its safe default so one bad entry does not hide the rest.

use chrono::{DateTime, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::activity::EvidenceUpload;
use crate::log_warn;

const ENABLE_LOGS: bool = true;

const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFile {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub id: Option<String>,
    pub date: NaiveDate,
    pub entry_time: String,
    pub exit_time: String,
    pub hours_worked: f64,
    pub activity_title: String,
    pub activity_description: String,
    pub observations: String,
    pub evidence_files: Vec<EvidenceFile>,
}

/// Record composed at session close, before the store has assigned an id or
/// evidence URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub date: NaiveDate,
    pub entry_time: String,
    pub exit_time: String,
    pub hours_worked: f64,
    pub title: String,
    pub description: String,
    pub observations: String,
    pub evidence: Vec<EvidenceUpload>,
}

impl From<&NewRecord> for ServiceRecord {
    /// Local echo of a submitted record, used when the store's reply carries
    /// no readable record. Evidence URLs are unknown at this point.
    fn from(record: &NewRecord) -> Self {
        Self {
            id: None,
            date: record.date,
            entry_time: record.entry_time.clone(),
            exit_time: record.exit_time.clone(),
            hours_worked: record.hours_worked,
            activity_title: record.title.clone(),
            activity_description: record.description.clone(),
            observations: record.observations.clone(),
            evidence_files: record
                .evidence
                .iter()
                .map(|upload| EvidenceFile {
                    name: upload.file_name.clone(),
                    url: String::new(),
                })
                .collect(),
        }
    }
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

/// Fractional hours from `entry` to `exit`, floored at zero.
pub fn hours_between(entry: NaiveTime, exit: NaiveTime) -> f64 {
    let minutes = (exit - entry).num_minutes();
    if minutes <= 0 {
        return 0.0;
    }
    minutes as f64 / 60.0
}

/// Same as [`hours_between`] for `HH:MM` strings; unreadable input yields zero.
pub fn hours_between_str(entry: &str, exit: &str) -> f64 {
    match (parse_time(entry), parse_time(exit)) {
        (Some(entry), Some(exit)) => hours_between(entry, exit),
        _ => 0.0,
    }
}

/// Turns a store payload into records. Accepts a bare array or an object
/// holding the array under `records`, `data` or `items`. `today` replaces
/// unreadable dates.
pub fn normalize_records(payload: Value, today: NaiveDate) -> Vec<ServiceRecord> {
    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(mut envelope) => {
            match ["records", "data", "items"]
                .iter()
                .find_map(|key| match envelope.remove(*key) {
                    Some(Value::Array(entries)) => Some(entries),
                    _ => None,
                }) {
                Some(entries) => entries,
                None => {
                    log_warn!("History payload has no record array; treating as empty");
                    Vec::new()
                }
            }
        }
        other => {
            log_warn!("Unexpected history payload type: {}", type_name(&other));
            Vec::new()
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(position, entry)| match entry {
            Value::Object(fields) => Some(normalize_record(&fields, today)),
            other => {
                log_warn!(
                    "Skipping history entry {} of type {}",
                    position,
                    type_name(&other)
                );
                None
            }
        })
        .collect()
}

/// Builds one record from its JSON fields, defaulting whatever is malformed.
pub fn normalize_record(fields: &Map<String, Value>, today: NaiveDate) -> ServiceRecord {
    let id = first_of(fields, &["id", "_id"]).and_then(|value| match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let date = match first_of(fields, &["date"]).and_then(parse_date) {
        Some(date) => date,
        None => {
            log_warn!(
                "Record {:?} has an unreadable date; using {}",
                id,
                today
            );
            today
        }
    };

    let entry_time = text(first_of(fields, &["entryTime"]));
    let exit_time = text(first_of(fields, &["exitTime"]));

    // Without a readable total, the entry and exit times decide.
    let hours_worked = match first_of(fields, &["hoursWorked", "hours"]).and_then(parse_hours) {
        Some(hours) => hours.max(0.0),
        None => {
            let derived = hours_between_str(&entry_time, &exit_time);
            log_warn!("Record {:?} has no readable hours; counting {}", id, derived);
            derived
        }
    };

    ServiceRecord {
        id,
        date,
        entry_time,
        exit_time,
        hours_worked,
        activity_title: text(first_of(fields, &["activityTitle", "title"])),
        activity_description: text(first_of(fields, &["activityDescription", "description"])),
        observations: text(first_of(fields, &["observations"])),
        evidence_files: first_of(fields, &["evidenceFiles", "evidence"])
            .map(parse_evidence)
            .unwrap_or_default(),
    }
}

fn first_of<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    let raw = value.as_str()?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|timestamp| timestamp.date_naive())
}

fn parse_hours(value: &Value) -> Option<f64> {
    let hours = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    hours.is_finite().then_some(hours)
}

fn parse_evidence(value: &Value) -> Vec<EvidenceFile> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(url) => Some(EvidenceFile {
                name: url.rsplit('/').next().unwrap_or(url).to_string(),
                url: url.clone(),
            }),
            Value::Object(fields) => {
                let url = text(first_of(fields, &["url", "path"]));
                let name = text(first_of(fields, &["name", "fileName", "originalName"]));
                if url.is_empty() && name.is_empty() {
                    None
                } else {
                    Some(EvidenceFile { name, url })
                }
            }
            _ => None,
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn two_and_a_half_hours() {
        assert_eq!(hours_between_str("08:00", "10:30"), 2.5);
        assert_eq!(hours_between_str("10:30", "08:00"), 0.0);
        assert_eq!(hours_between_str("garbage", "08:00"), 0.0);
    }

    #[test]
    fn formats_times_as_hh_mm() {
        let time = NaiveTime::from_hms_opt(7, 5, 59).unwrap();
        assert_eq!(format_time(time), "07:05");
        assert_eq!(parse_time(" 07:05 "), NaiveTime::from_hms_opt(7, 5, 0));
    }

    #[test]
    fn reads_bare_array_and_envelopes() {
        let record = json!({"date": "2024-01-05", "hoursWorked": 3});

        assert_eq!(normalize_records(json!([record.clone()]), today()).len(), 1);
        for key in ["records", "data", "items"] {
            let payload = json!({ key: [record.clone(), record.clone()] });
            assert_eq!(normalize_records(payload, today()).len(), 2, "key {key}");
        }
        assert!(normalize_records(json!({"message": "ok"}), today()).is_empty());
        assert!(normalize_records(json!("nope"), today()).is_empty());
    }

    #[test]
    fn malformed_fields_fall_back_to_safe_defaults() {
        let payload = json!([
            {"_id": "a", "date": "not a date", "hoursWorked": "4.5"},
            {"id": 7, "date": "2024-01-10T15:00:00-05:00"},
            {"id": "c", "date": "2024-01-11", "hoursWorked": -3},
            42,
        ]);

        let records = normalize_records(payload, today());
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].id.as_deref(), Some("a"));
        assert_eq!(records[0].date, today());
        assert_eq!(records[0].hours_worked, 4.5);

        assert_eq!(records[1].id.as_deref(), Some("7"));
        assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(records[1].hours_worked, 0.0);

        assert_eq!(records[2].hours_worked, 0.0);
    }

    #[test]
    fn missing_hours_are_taken_from_entry_and_exit() {
        let payload = json!([
            {"date": "2024-01-05", "entryTime": "08:00", "exitTime": "10:30"},
            {"date": "2024-01-06", "entryTime": "08:00", "hoursWorked": "n/a"},
        ]);

        let records = normalize_records(payload, today());
        assert_eq!(records[0].hours_worked, 2.5);
        assert_eq!(records[1].hours_worked, 0.0);
    }

    #[test]
    fn reads_alternate_field_names_and_evidence_shapes() {
        let fields = json!({
            "date": "2024-02-02",
            "entryTime": "08:00",
            "exitTime": "12:00",
            "hoursWorked": 4.0,
            "title": "Library",
            "description": "Shelving",
            "observations": null,
            "evidence": [
                {"fileName": "a.png", "url": "https://files/a.png"},
                "https://files/b.pdf",
                {"other": true},
            ],
        });
        let Value::Object(fields) = fields else {
            unreachable!()
        };

        let record = normalize_record(&fields, today());
        assert_eq!(record.activity_title, "Library");
        assert_eq!(record.activity_description, "Shelving");
        assert_eq!(record.observations, "");
        assert_eq!(record.entry_time, "08:00");
        assert_eq!(
            record.evidence_files,
            vec![
                EvidenceFile {
                    name: "a.png".into(),
                    url: "https://files/a.png".into()
                },
                EvidenceFile {
                    name: "b.pdf".into(),
                    url: "https://files/b.pdf".into()
                },
            ]
        );
    }
}
