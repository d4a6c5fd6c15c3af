//! Turns pending edits into per-record updates and settles them.

use futures::future::join_all;
use std::fmt;
use tracing::{debug, warn};

use crate::domain::{DailySnapshot, DisplayHour, RecordId, Screen, TimeShifter};
use crate::overlay::{EditOverlay, OverlayBucket};
use crate::ports::{AnalyticsBackend, BackendError, RecordPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Clean,
    Dirty,
    Saving,
}

/// One update call for one hour bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub hour: DisplayHour,
    pub record_id: RecordId,
    pub patch: RecordPatch,
    /// Overlay entry the patch was built from.
    pub(crate) sent: OverlayBucket,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BucketFailure {
    /// No persisted row backs this hour, so nothing was sent.
    Local,
    Remote(BackendError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedBucket {
    pub hour: DisplayHour,
    pub reason: BucketFailure,
}

impl fmt::Display for FailedBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            BucketFailure::Local => write!(f, "{}:00 (no stored record)", self.hour),
            BucketFailure::Remote(err) => write!(f, "{}:00 ({})", self.hour, err),
        }
    }
}

/// Everything a save will do, computed before any request goes out.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub screen: Screen,
    pub requests: Vec<UpdateRequest>,
    /// Buckets whose every field was cleared; settled without a request.
    pub no_ops: Vec<(DisplayHour, OverlayBucket)>,
    pub local_failures: Vec<DisplayHour>,
}

impl SavePlan {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.no_ops.is_empty() && self.local_failures.is_empty()
    }
}

/// Diffs the overlay against the snapshot into minimal per-record patches.
///
/// A patch only carries fields present in that bucket's overlay entry that hold a number.
pub fn plan_save(
    snapshot: &DailySnapshot,
    overlay: &EditOverlay,
    shifter: &TimeShifter,
) -> SavePlan {
    let mut plan = SavePlan {
        screen: snapshot.screen(),
        requests: Vec::new(),
        no_ops: Vec::new(),
        local_failures: Vec::new(),
    };

    for (hour, bucket) in overlay.buckets() {
        let record_id = snapshot
            .record(shifter.to_storage(hour))
            .and_then(|r| r.editable_id);
        let Some(record_id) = record_id else {
            debug!(%hour, "no editable record behind bucket");
            plan.local_failures.push(hour);
            continue;
        };

        let patch: RecordPatch = bucket
            .iter()
            .filter_map(|(field, value)| value.as_number().map(|n| (*field, n)))
            .collect();

        if patch.is_empty() {
            plan.no_ops.push((hour, bucket.clone()));
        } else {
            plan.requests.push(UpdateRequest {
                hour,
                record_id,
                patch,
                sent: bucket.clone(),
            });
        }
    }

    plan
}

/// Outcome of dispatching a [`SavePlan`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SaveReport {
    /// Buckets that were written (or needed no write), with the overlay entry they settled.
    pub settled: Vec<(DisplayHour, OverlayBucket)>,
    pub failed: Vec<FailedBucket>,
}

impl SaveReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_hours(&self) -> Vec<DisplayHour> {
        self.failed.iter().map(|f| f.hour).collect()
    }

    pub fn settled_hours(&self) -> Vec<DisplayHour> {
        self.settled.iter().map(|(hour, _)| *hour).collect()
    }
}

/// Fires every update at once and waits for all of them to settle.
///
/// One bucket's failure never cancels or affects its siblings.
pub async fn dispatch<B>(backend: &B, plan: SavePlan) -> SaveReport
where
    B: AnalyticsBackend + ?Sized,
{
    let screen = plan.screen;
    let mut report = SaveReport {
        settled: plan.no_ops,
        failed: plan
            .local_failures
            .into_iter()
            .map(|hour| FailedBucket {
                hour,
                reason: BucketFailure::Local,
            })
            .collect(),
    };

    let updates = plan.requests.into_iter().map(|request| async move {
        let result = backend
            .update_record(screen, request.record_id, &request.patch)
            .await;
        (request, result)
    });

    for (request, result) in join_all(updates).await {
        match result {
            Ok(()) => report.settled.push((request.hour, request.sent)),
            Err(err) => {
                warn!(
                    %screen,
                    hour = %request.hour,
                    record_id = %request.record_id,
                    error = %err,
                    "hourly update failed"
                );
                report.failed.push(FailedBucket {
                    hour: request.hour,
                    reason: BucketFailure::Remote(err),
                });
            }
        }
    }

    report.settled.sort_by_key(|(hour, _)| *hour);
    report.failed.sort_by_key(|f| f.hour);
    report
}
