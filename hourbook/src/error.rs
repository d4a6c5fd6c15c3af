use thiserror::Error;

use crate::ports::BackendError;
use crate::sync::FailedBucket;

/// Errors surfaced by an editing session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("no daily summary is loaded")]
    NotLoaded,
    #[error("a save is already in progress")]
    SaveInProgress,
    #[error("no save is in progress")]
    NotSaving,
    #[error("there are no pending changes")]
    NothingToSave,
    /// `refetch` is set when the follow-up reload failed too; the snapshot is then gone
    /// and the session needs a `reload` before the remaining edits can be saved.
    #[error("could not update hours: {}{}", join_failed(.failed), refetch_note(.refetch))]
    PartialSaveFailure {
        failed: Vec<FailedBucket>,
        refetch: Option<BackendError>,
    },
    #[error("failed to load daily summary: {0}")]
    FetchFailure(#[from] BackendError),
}

fn join_failed(failed: &[FailedBucket]) -> String {
    failed
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn refetch_note(refetch: &Option<BackendError>) -> String {
    match refetch {
        Some(err) => format!("; reloading the day also failed: {err}"),
        None => String::new(),
    }
}
