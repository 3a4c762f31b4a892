pub mod clock;
pub mod controller;
pub mod events;
pub mod progress;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::SessionAccrualTracker;
pub use events::{EventSink, TrackerEvent};
pub use progress::{format_hours, record_for_day, ServiceProgress, COMPLETION_THRESHOLD_HOURS};
pub use state::{ActivityLog, SessionSnapshot, SessionState, SessionStatus};
