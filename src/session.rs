use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::warn;

use crate::aggregate::apply_filters;
use crate::catalog::ClassCatalog;
use crate::db::AttendanceStore;
use crate::error::Result;
use crate::models::{AttendanceRecord, ReportFilter};

/// Fetch orchestration for an interactive report view.
///
/// Every filter change triggers a fresh fetch, and nothing cancels an earlier
/// one still in flight, so each `refresh` takes a monotonically increasing
/// token; a response that is no longer the latest is discarded instead of
/// overwriting fresher state. Callers treat `Ok(None)` as "superseded, keep
/// whatever you are showing".
pub struct ReportSession {
    store: Arc<dyn AttendanceStore>,
    catalog: Arc<dyn ClassCatalog>,
    seq: AtomicU64,
    latest: Mutex<(u64, Option<Vec<AttendanceRecord>>)>,
}

impl ReportSession {
    pub fn new(store: Arc<dyn AttendanceStore>, catalog: Arc<dyn ClassCatalog>) -> Self {
        ReportSession {
            store,
            catalog,
            seq: AtomicU64::new(0),
            latest: Mutex::new((0, None)),
        }
    }

    /// Fetches the filter's date range, narrows it with the engine filters,
    /// and retains the result — unless a newer refresh started or finished in
    /// the meantime.
    pub async fn refresh(&self, filter: &ReportFilter) -> Result<Option<Vec<AttendanceRecord>>> {
        filter.validate(self.catalog.as_ref())?;

        let token = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let fetched = self
            .store
            .fetch_by_date_range(filter.start_date, filter.end_date)
            .await?;

        if self.seq.load(Ordering::SeqCst) != token {
            warn!("discarding stale fetch response (token {token})");
            return Ok(None);
        }

        let filtered = apply_filters(&fetched, filter, self.catalog.as_ref());

        let mut latest = self.latest.lock().expect("session lock poisoned");
        if token < latest.0 {
            warn!("discarding stale fetch response (token {token})");
            return Ok(None);
        }
        *latest = (token, Some(filtered.clone()));
        Ok(Some(filtered))
    }

    /// The latest retained snapshot, if any refresh has completed.
    pub fn snapshot(&self) -> Option<Vec<AttendanceRecord>> {
        self.latest
            .lock()
            .expect("session lock poisoned")
            .1
            .clone()
    }
}
