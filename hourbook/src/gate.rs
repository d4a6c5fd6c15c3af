use thiserror::Error;

use crate::domain::{HourlyRecord, Role, ScopeFilter};

/// Why an hourly row cannot be edited right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NotEditable {
    #[error("only administrators can edit hourly data")]
    PermissionDenied,
    #[error("select a single entity to edit its data; aggregated rows cannot be changed")]
    AggregateScope,
    #[error("there is no stored record for this hour")]
    NoBackingRecord,
    #[error("a save is in progress")]
    SaveInProgress,
}

/// Edit permission policy. All three conditions must hold independently.
pub fn check(role: Role, scope: &ScopeFilter, record: &HourlyRecord) -> Result<(), NotEditable> {
    if !role.can_edit_metrics() {
        return Err(NotEditable::PermissionDenied);
    }
    if scope.is_aggregate() {
        return Err(NotEditable::AggregateScope);
    }
    if record.editable_id.is_none() {
        return Err(NotEditable::NoBackingRecord);
    }
    Ok(())
}

pub fn can_edit(role: Role, scope: &ScopeFilter, record: &HourlyRecord) -> bool {
    check(role, scope, record).is_ok()
}
