use std::sync::{Arc, Mutex as StdMutex};

use chrono::{Datelike, NaiveDate};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    error::{TrackerError, TrackerResult},
    log_info, log_warn,
    models::{Activity, ServiceRecord},
    store::RecordStore,
};

use super::{
    clock::{Clock, SystemClock},
    events::{EventSink, TrackerEvent},
    progress::{self, format_hours, ServiceProgress},
    state::{SessionSnapshot, SessionState, SessionStatus},
};

const ENABLE_LOGS: bool = true;

struct TrackerInner {
    session: SessionState,
    auth: Option<AuthContext>,
    /// Bumped on every identity change; responses fetched under an older
    /// generation are dropped.
    generation: u64,
    history: Vec<ServiceRecord>,
    progress: ServiceProgress,
}

/// Clears the in-flight flag when a close is dropped while waiting on the
/// store, so the session can be submitted again.
struct SubmissionGuard {
    inner: Option<Arc<Mutex<TrackerInner>>>,
    session_id: Option<String>,
}

impl SubmissionGuard {
    fn arm(inner: Arc<Mutex<TrackerInner>>, session_id: Option<String>) -> Self {
        Self {
            inner: Some(inner),
            session_id,
        }
    }

    fn disarm(mut self) {
        self.inner = None;
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };
        let session_id = self.session_id.take();
        let release = move |inner: &mut TrackerInner| {
            if inner.session.submitting && inner.session.session_id == session_id {
                log_warn!("Close abandoned while submitting; session left open");
                inner.session.submitting = false;
            }
        };

        if let Ok(mut locked) = inner.try_lock() {
            release(&mut *locked);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release(&mut *inner.lock().await);
                });
            }
            Err(_) => {
                log_warn!("No runtime to release an abandoned submission");
            }
        }
    }
}

/// Owns the Idle → Open → Closed session cycle and the accrued-hours view
/// derived from the owner's record history.
///
/// Cloning is cheap; clones share the same session.
#[derive(Clone)]
pub struct SessionAccrualTracker {
    inner: Arc<Mutex<TrackerInner>>,
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    sinks: Arc<StdMutex<Vec<Arc<dyn EventSink>>>>,
}

impl SessionAccrualTracker {
    pub fn new(store: Arc<dyn RecordStore>, auth: Option<AuthContext>) -> Self {
        Self::with_clock(store, auth, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        auth: Option<AuthContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TrackerInner {
                session: SessionState::new(),
                auth,
                generation: 0,
                history: Vec::new(),
                progress: ServiceProgress::default(),
            })),
            store,
            clock,
            sinks: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.lock_sinks().push(sink);
    }

    /// Swaps the signed-in identity. Cached history and milestones belong to
    /// the previous identity and are dropped. An open session stays open but
    /// only its owner can add to it or close it.
    pub async fn set_auth(&self, auth: Option<AuthContext>) {
        let progress = {
            let mut inner = self.inner.lock().await;
            inner.auth = auth;
            inner.generation = inner.generation.wrapping_add(1);
            inner.history.clear();
            inner.progress = ServiceProgress::default();
            inner.progress.clone()
        };
        self.emit(&[TrackerEvent::ProgressChanged(progress)]);
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.session.snapshot()
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.lock().await.session.status
    }

    /// Idle → Open. Captures the entry time; nothing is sent to the store.
    pub async fn start(&self) -> TrackerResult<SessionSnapshot> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if inner.session.status == SessionStatus::Open {
                return Err(TrackerError::SessionAlreadyOpen);
            }

            let session_id = Uuid::new_v4().to_string();
            let started_at = self.clock.now();
            let owner = inner.auth.as_ref().map(|auth| auth.user_id().to_string());
            inner
                .session
                .begin_session(session_id.clone(), owner, started_at);

            log_info!("Session {} opened at {}", session_id, started_at);
            inner.session.snapshot()
        };

        self.emit(&[TrackerEvent::SessionStateChanged(snapshot.clone())]);
        Ok(snapshot)
    }

    pub async fn add_activity(&self, activity: Activity) -> TrackerResult<SessionSnapshot> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            if inner.session.status != SessionStatus::Open {
                return Err(TrackerError::NoOpenSession);
            }
            if inner.session.submitting {
                return Err(TrackerError::SubmissionInFlight);
            }
            if let Some(auth) = &inner.auth {
                if !inner.session.is_owned_by(auth.user_id()) {
                    return Err(TrackerError::SessionOwnerMismatch);
                }
            }

            let position = inner.session.activities.len() + 1;
            activity.validate(position)?;

            log_info!(
                "Activity {} ({:?}) added with {} evidence file(s)",
                position,
                activity.title,
                activity.evidence.len()
            );
            inner.session.activities.append(activity);
            inner.session.snapshot()
        };

        self.emit(&[TrackerEvent::SessionStateChanged(snapshot.clone())]);
        Ok(snapshot)
    }

    /// Open → Closed → Idle. Submits the session's record and, once the
    /// store accepts it, folds it into the cached history.
    ///
    /// On a validation or transport failure the session stays open with its
    /// entry time and activities intact. So does a close whose future is
    /// dropped before the store answers.
    pub async fn close(&self) -> TrackerResult<ServiceRecord> {
        let (auth, draft, generation, session_id) = {
            let mut inner = self.inner.lock().await;
            if inner.session.status != SessionStatus::Open {
                return Err(TrackerError::NoOpenSession);
            }
            if inner.session.submitting {
                return Err(TrackerError::SubmissionInFlight);
            }

            let draft = match inner.session.compose_record(self.clock.now()) {
                Ok(draft) => draft,
                Err(err) => {
                    log_warn!("Close refused: {}", err);
                    return Err(err.into());
                }
            };
            let auth = inner.auth.clone().ok_or(TrackerError::MissingAuth)?;
            if !inner.session.is_owned_by(auth.user_id()) {
                log_warn!(
                    "Close refused: session was opened by {:?}, not {}",
                    inner.session.owner,
                    auth.user_id()
                );
                return Err(TrackerError::SessionOwnerMismatch);
            }

            inner.session.submitting = true;
            (auth, draft, inner.generation, inner.session.session_id.clone())
        };
        let guard = SubmissionGuard::arm(self.inner.clone(), session_id);

        self.emit(&[TrackerEvent::SessionStateChanged(self.snapshot().await)]);

        log_info!(
            "Submitting record for {}: {} -> {} ({} h)",
            draft.date,
            draft.entry_time,
            draft.exit_time,
            draft.hours_worked
        );
        let result = self.store.create_record(&auth, &draft).await;

        let mut events = Vec::new();
        let outcome = {
            let mut inner = self.inner.lock().await;
            guard.disarm();
            match result {
                Ok(record) => {
                    inner.session.mark_closed();
                    events.push(TrackerEvent::SessionStateChanged(inner.session.snapshot()));
                    events.push(TrackerEvent::RecordCreated(record.clone()));

                    if inner.generation == generation {
                        inner.history.push(record.clone());
                        let TrackerInner {
                            history, progress, ..
                        } = &mut *inner;
                        if progress.fold(history) {
                            log_info!(
                                "Service completed: {} reached on {:?}",
                                format_hours(progress.total_hours),
                                progress.service_completion_date
                            );
                        }
                        events.push(TrackerEvent::ProgressChanged(progress.clone()));
                    } else {
                        log_warn!("Signed-in user changed during submission; history not updated");
                    }

                    inner.session.reset();
                    events.push(TrackerEvent::SessionStateChanged(inner.session.snapshot()));
                    Ok(record)
                }
                Err(err) => {
                    log_warn!("Record submission failed: {}", err);
                    inner.session.submitting = false;
                    events.push(TrackerEvent::SessionStateChanged(inner.session.snapshot()));
                    Err(TrackerError::from(err))
                }
            }
        };

        self.emit(&events);
        outcome
    }

    /// Replaces the cached history with the store's copy and refolds progress.
    pub async fn load_history(&self) -> TrackerResult<Vec<ServiceRecord>> {
        let (auth, generation) = {
            let inner = self.inner.lock().await;
            let auth = inner.auth.clone().ok_or(TrackerError::MissingAuth)?;
            (auth, inner.generation)
        };

        let records = self
            .store
            .list_records(&auth, self.today())
            .await
            .map_err(|err| {
                log_warn!("History load failed: {}", err);
                TrackerError::from(err)
            })?;

        let progress = {
            let mut inner = self.inner.lock().await;
            if inner.generation != generation {
                log_info!("Discarding history fetched for {}", auth.user_id());
                return Err(TrackerError::StaleResponse);
            }

            inner.history = records.clone();
            let TrackerInner {
                history, progress, ..
            } = &mut *inner;
            progress.fold(history);
            log_info!(
                "Loaded {} records, {} accrued",
                history.len(),
                format_hours(progress.total_hours)
            );
            progress.clone()
        };

        self.emit(&[TrackerEvent::ProgressChanged(progress)]);
        Ok(records)
    }

    pub async fn history(&self) -> Vec<ServiceRecord> {
        self.inner.lock().await.history.clone()
    }

    pub async fn history_newest_first(&self) -> Vec<ServiceRecord> {
        let inner = self.inner.lock().await;
        progress::newest_first(&inner.history)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn progress(&self) -> ServiceProgress {
        self.inner.lock().await.progress.clone()
    }

    /// The first cached record on `day`, if any.
    pub async fn record_for_day<D: Datelike>(&self, day: &D) -> Option<ServiceRecord> {
        let inner = self.inner.lock().await;
        progress::record_for_day(&inner.history, day).cloned()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    fn emit(&self, events: &[TrackerEvent]) {
        let sinks = self.lock_sinks().clone();
        for event in events {
            for sink in &sinks {
                sink.emit(event);
            }
        }
    }

    fn lock_sinks(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn EventSink>>> {
        match self.sinks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
