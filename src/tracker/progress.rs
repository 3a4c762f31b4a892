//! Accrued service hours and the milestones derived from the record history.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::ServiceRecord;

/// Total hours of mandatory service.
pub const COMPLETION_THRESHOLD_HOURS: f64 = 500.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProgress {
    pub total_hours: f64,
    pub service_start_date: Option<NaiveDate>,
    /// Latest record date seen when the threshold was first reached. Fixed
    /// once set; later records never move it.
    pub service_completion_date: Option<NaiveDate>,
}

impl ServiceProgress {
    pub fn from_records(records: &[ServiceRecord]) -> Self {
        let mut progress = Self::default();
        progress.fold(records);
        progress
    }

    /// Recomputes totals from the full history. Returns `true` when this call
    /// set the completion milestone.
    pub fn fold(&mut self, records: &[ServiceRecord]) -> bool {
        self.total_hours = total_hours(records);
        self.service_start_date = records.iter().map(|r| r.date).min();

        if self.service_completion_date.is_none() && self.total_hours >= COMPLETION_THRESHOLD_HOURS
        {
            self.service_completion_date = records.iter().map(|r| r.date).max();
            return self.service_completion_date.is_some();
        }
        false
    }

    pub fn is_complete(&self) -> bool {
        self.total_hours >= COMPLETION_THRESHOLD_HOURS
    }

    pub fn remaining_hours(&self) -> f64 {
        (COMPLETION_THRESHOLD_HOURS - self.total_hours).max(0.0)
    }

    pub fn percent_complete(&self) -> f64 {
        (self.total_hours / COMPLETION_THRESHOLD_HOURS * 100.0).min(100.0)
    }

    pub fn describe_total(&self) -> String {
        format_hours(self.total_hours)
    }
}

/// Sum of `hours_worked`. Values are added in sorted order so the result does
/// not depend on the order the store returned them in.
pub fn total_hours(records: &[ServiceRecord]) -> f64 {
    let mut hours: Vec<f64> = records.iter().map(|r| r.hours_worked).collect();
    hours.sort_by(f64::total_cmp);
    hours.into_iter().sum()
}

/// Renders fractional hours as `"{h} horas y {m} minutos"`.
pub fn format_hours(total: f64) -> String {
    let total = if total.is_finite() { total.max(0.0) } else { 0.0 };
    let mut whole = total.trunc() as u64;
    let mut minutes = ((total - total.trunc()) * 60.0).round() as u64;
    if minutes == 60 {
        whole += 1;
        minutes = 0;
    }
    format!("{whole} horas y {minutes} minutos")
}

/// First record on the same calendar day as `day`; time of day is ignored.
pub fn record_for_day<'a, D: Datelike>(
    records: &'a [ServiceRecord],
    day: &D,
) -> Option<&'a ServiceRecord> {
    records.iter().find(|record| {
        record.date.day() == day.day()
            && record.date.month() == day.month()
            && record.date.year() == day.year()
    })
}

/// Records for display, latest date first; equal dates keep store order.
pub fn newest_first(records: &[ServiceRecord]) -> Vec<&ServiceRecord> {
    let mut ordered: Vec<&ServiceRecord> = records.iter().collect();
    ordered.sort_by(|a, b| b.date.cmp(&a.date));
    ordered
}
