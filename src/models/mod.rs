pub mod activity;
pub mod record;

pub use activity::{Activity, EvidenceUpload};
pub use record::{EvidenceFile, NewRecord, ServiceRecord};
