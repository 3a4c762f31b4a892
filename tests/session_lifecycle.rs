use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use service_hours_lib::{
    console::run_console, models::record::normalize_records, tracker::ManualClock, Activity,
    AuthContext, EvidenceUpload, NewRecord, RecordStore, ServiceRecord, SessionAccrualTracker,
    SessionStatus, TrackerError, TransportError,
};

#[derive(Default)]
struct MemoryStore {
    records: Mutex<Vec<ServiceRecord>>,
}

impl MemoryStore {
    fn seeded(records: Vec<ServiceRecord>) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(records),
        })
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_record(
        &self,
        auth: &AuthContext,
        record: &NewRecord,
    ) -> Result<ServiceRecord, TransportError> {
        let mut records = self.records.lock().unwrap();
        let mut created = ServiceRecord::from(record);
        created.id = Some(format!("{}-{}", auth.user_id(), records.len()));
        records.push(created.clone());
        Ok(created)
    }

    async fn list_records(
        &self,
        _auth: &AuthContext,
        _today: NaiveDate,
    ) -> Result<Vec<ServiceRecord>, TransportError> {
        Ok(self.records.lock().unwrap().clone())
    }
}

/// Serves a fixed JSON payload through the same normalisation as the HTTP store.
struct RawStore(serde_json::Value);

#[async_trait]
impl RecordStore for RawStore {
    async fn create_record(
        &self,
        _auth: &AuthContext,
        record: &NewRecord,
    ) -> Result<ServiceRecord, TransportError> {
        Ok(ServiceRecord::from(record))
    }

    async fn list_records(
        &self,
        _auth: &AuthContext,
        today: NaiveDate,
    ) -> Result<Vec<ServiceRecord>, TransportError> {
        Ok(normalize_records(self.0.clone(), today))
    }
}

fn day(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, d).unwrap()
}

fn stored(id: &str, date: NaiveDate, hours: f64) -> ServiceRecord {
    ServiceRecord {
        id: Some(id.into()),
        date,
        entry_time: "08:00".into(),
        exit_time: "12:00".into(),
        hours_worked: hours,
        activity_title: format!("Activity {id}"),
        activity_description: String::new(),
        observations: String::new(),
        evidence_files: Vec::new(),
    }
}

fn tracker_at(
    store: Arc<dyn RecordStore>,
    month: u32,
    d: u32,
) -> (SessionAccrualTracker, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(day(month, d).and_hms_opt(8, 0, 0).unwrap()));
    let auth = AuthContext::new("student-7", "tok").unwrap();
    let tracker = SessionAccrualTracker::with_clock(store, Some(auth), clock.clone());
    (tracker, clock)
}

#[tokio::test]
async fn threshold_crossed_by_history_uses_latest_date() {
    let store = MemoryStore::seeded(vec![
        stored("a", day(1, 5), 300.0),
        stored("b", day(1, 10), 250.0),
    ]);
    let (tracker, _) = tracker_at(store, 1, 11);

    tracker.load_history().await.unwrap();
    let progress = tracker.progress().await;
    assert_eq!(progress.total_hours, 550.0);
    assert_eq!(progress.service_start_date, Some(day(1, 5)));
    assert_eq!(progress.service_completion_date, Some(day(1, 10)));

    let mut output = Vec::new();
    run_console(&tracker, "progress\n".as_bytes(), &mut output)
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(output).unwrap().trim_end(),
        "total: 550 horas y 0 minutos; started: 2024-01-05; completed: 2024-01-10; \
         service hours complete"
    );
}

#[tokio::test]
async fn completion_milestone_survives_later_sessions() {
    let store = MemoryStore::seeded(vec![stored("a", day(2, 1), 499.0)]);
    let (tracker, clock) = tracker_at(store, 2, 3);
    tracker.load_history().await.unwrap();
    assert_eq!(tracker.progress().await.service_completion_date, None);

    tracker.start().await.unwrap();
    tracker
        .add_activity(
            Activity::new("Clinic", "Front desk")
                .with_evidence(EvidenceUpload::new("sheet.pdf", vec![1])),
        )
        .await
        .unwrap();
    clock.advance(Duration::hours(2));
    tracker.close().await.unwrap();

    let progress = tracker.progress().await;
    assert_eq!(progress.total_hours, 501.0);
    assert_eq!(progress.service_completion_date, Some(day(2, 3)));

    // A later day must not move the milestone, even after a reload.
    clock.set(day(2, 4).and_hms_opt(9, 0, 0).unwrap());
    tracker.start().await.unwrap();
    tracker
        .add_activity(
            Activity::new("Clinic", "Filing").with_evidence(EvidenceUpload::new("b.pdf", vec![1])),
        )
        .await
        .unwrap();
    clock.advance(Duration::hours(1));
    tracker.close().await.unwrap();
    tracker.load_history().await.unwrap();

    let progress = tracker.progress().await;
    assert_eq!(progress.total_hours, 502.0);
    assert_eq!(progress.service_completion_date, Some(day(2, 3)));
}

#[tokio::test]
async fn totals_do_not_depend_on_store_order() {
    let records = vec![
        stored("a", day(3, 1), 1.1),
        stored("b", day(3, 2), 2.2),
        stored("c", day(3, 3), 3.3),
        stored("d", day(3, 4), 0.7),
    ];
    let mut reversed = records.clone();
    reversed.reverse();

    let (forward, _) = tracker_at(MemoryStore::seeded(records), 3, 5);
    let (backward, _) = tracker_at(MemoryStore::seeded(reversed), 3, 5);
    forward.load_history().await.unwrap();
    backward.load_history().await.unwrap();

    assert_eq!(
        forward.progress().await.total_hours,
        backward.progress().await.total_hours
    );
    assert_eq!(
        forward.history_newest_first().await[0].id.as_deref(),
        Some("d")
    );
}

#[tokio::test]
async fn signing_out_blocks_history_until_signed_in_again() {
    let store = MemoryStore::seeded(vec![stored("a", day(1, 5), 3.0)]);
    let (tracker, _) = tracker_at(store, 1, 6);
    tracker.load_history().await.unwrap();

    tracker.set_auth(None).await;
    assert!(tracker.history().await.is_empty());
    assert!(matches!(
        tracker.load_history().await,
        Err(TrackerError::MissingAuth)
    ));

    tracker
        .set_auth(Some(AuthContext::new("student-7", "fresh").unwrap()))
        .await;
    assert_eq!(tracker.load_history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_history_dates_fall_on_the_tracker_day() {
    let store = Arc::new(RawStore(serde_json::json!({
        "records": [
            {"_id": "a", "date": "2024-01-05", "hoursWorked": 2},
            {"_id": "b", "date": "someday", "hoursWorked": 1}
        ]
    })));
    let (tracker, _) = tracker_at(store, 4, 2);

    let records = tracker.load_history().await.unwrap();
    assert_eq!(records[1].date, day(4, 2));
    assert!(tracker.record_for_day(&day(4, 2)).await.is_some());
    assert_eq!(tracker.progress().await.total_hours, 3.0);
}

#[tokio::test]
async fn console_script_runs_a_whole_day() {
    let dir = tempfile::tempdir().unwrap();
    let evidence = dir.path().join("attendance.png");
    std::fs::write(&evidence, b"png").unwrap();

    let store = Arc::new(MemoryStore::default());
    let (tracker, clock) = tracker_at(store.clone(), 1, 5);

    // The clock only moves between commands, so run the session in two scripts.
    let first = format!(
        "start\nclose\nactivity Tutoring | Algebra review | {} | quiet group\nstatus\n",
        evidence.display()
    );
    let mut output = Vec::new();
    run_console(&tracker, first.as_bytes(), &mut output).await.unwrap();

    clock.advance(Duration::minutes(150));
    let second = "close\nday 2024-01-05\nday 2024-01-06\nprogress\nbogus\nquit\nstatus\n";
    run_console(&tracker, second.as_bytes(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "session open since 08:00");
    assert!(lines[1].starts_with("error: at least one activity"), "{}", lines[1]);
    assert_eq!(lines[2], "activity 1 registered (1 evidence file(s) so far)");
    assert_eq!(lines[3], "open since 08:00 with 1 activity");
    assert_eq!(
        lines[4],
        "record saved: 2024-01-05 08:00-10:30 2 horas y 30 minutos - Tutoring"
    );
    assert!(text.contains("observations: quiet group"));
    assert!(text.contains("evidence: attendance.png"));
    assert!(text.contains("no record for 2024-01-06"));
    assert!(text.contains(
        "total: 2 horas y 30 minutos; started: 2024-01-05; completed: -; \
         remaining: 497 horas y 30 minutos (0.5% done)"
    ));
    assert!(text.contains("error: unknown command \"bogus\""));
    // Nothing after `quit` runs.
    assert_eq!(lines.last().copied(), Some("error: unknown command \"bogus\"; try `help`"));

    assert_eq!(tracker.status().await, SessionStatus::Idle);
    assert_eq!(store.records.lock().unwrap().len(), 1);
}
