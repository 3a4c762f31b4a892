//! Boundary to the remote record store.

mod http;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    auth::AuthContext,
    error::TransportError,
    models::{NewRecord, ServiceRecord},
};

pub use http::HttpRecordStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persists a closed session and returns the stored record.
    async fn create_record(
        &self,
        auth: &AuthContext,
        record: &NewRecord,
    ) -> Result<ServiceRecord, TransportError>;

    /// Every record owned by `auth`'s user, in store order. Records with an
    /// unreadable date are placed on `today`.
    async fn list_records(
        &self,
        auth: &AuthContext,
        today: NaiveDate,
    ) -> Result<Vec<ServiceRecord>, TransportError>;
}
