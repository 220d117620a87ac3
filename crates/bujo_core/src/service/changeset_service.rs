//! Applies a computed changeset through an entry repository.
//!
//! # Responsibility
//! - Map each `DiffOp` onto the matching repository call, in order.
//! - Stop at the first failure and hand back what was not applied.
//!
//! # Invariants
//! - The cancellation token is checked before every operation.
//! - Line errors carried by the changeset are returned, never applied.
//! - Nothing here spans a transaction across operations; each repository
//!   call commits on its own.

use crate::cancel::CancellationToken;
use crate::document::changeset::{Changeset, DiffOp};
use crate::document::ParseError;
use crate::model::entity_id::EntityId;
use crate::repo::{EntryRepository, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of a fully applied changeset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub inserted: usize,
    pub updated: usize,
    pub reparented: usize,
    pub migrated: usize,
    pub deleted: usize,
    /// `(source, continuation)` pairs produced by migrations.
    pub migrations: Vec<(EntityId, EntityId)>,
    /// Line errors found while diffing, passed through for display.
    pub errors: Vec<ParseError>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.inserted + self.updated + self.reparented + self.migrated + self.deleted
    }
}

/// First failure plus every operation that was not applied.
#[derive(Debug)]
pub struct ApplyError {
    pub error: RepoError,
    /// Starts with the failed operation.
    pub remaining: Vec<DiffOp>,
}

impl Display for ApplyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({} operation(s) not applied)",
            self.error,
            self.remaining.len()
        )
    }
}

impl Error for ApplyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Applies `changeset` operation by operation.
pub fn apply_changeset<R>(
    repo: &R,
    changeset: Changeset,
    cancel: &CancellationToken,
) -> Result<ApplyReport, ApplyError>
where
    R: EntryRepository + ?Sized,
{
    let Changeset { operations, errors } = changeset;
    let total = operations.len();
    let mut report = ApplyReport {
        errors,
        ..ApplyReport::default()
    };

    let mut pending = operations.into_iter();
    while let Some(op) = pending.next() {
        let outcome = if cancel.is_cancelled() {
            Err(RepoError::Cancelled)
        } else {
            apply_one(repo, &op, &mut report)
        };

        if let Err(error) = outcome {
            let mut remaining = vec![op];
            remaining.extend(pending);
            warn!(
                "event=changeset_apply module=service status=error applied={} remaining={} error_kind={}",
                report.applied(),
                remaining.len(),
                error_kind(&error)
            );
            return Err(ApplyError { error, remaining });
        }
    }

    info!(
        "event=changeset_apply module=service status=ok operations={} line_errors={}",
        total,
        report.errors.len()
    );
    Ok(report)
}

/// Stored depth below `parent`. Text depth can lag when an ancestor sits
/// outside the edited snapshot.
fn depth_under<R>(repo: &R, parent: Option<EntityId>, text_depth: u32) -> Result<u32, RepoError>
where
    R: EntryRepository + ?Sized,
{
    match parent {
        None => Ok(0),
        Some(id) => Ok(repo
            .get_by_entity_id(id)?
            .map_or(text_depth, |stored| stored.depth + 1)),
    }
}

fn apply_one<R>(repo: &R, op: &DiffOp, report: &mut ApplyReport) -> Result<(), RepoError>
where
    R: EntryRepository + ?Sized,
{
    match op {
        DiffOp::Insert { entry, .. } => {
            let mut entry = entry.clone();
            entry.depth = depth_under(repo, entry.parent_entity_id, entry.depth)?;
            repo.insert(&entry)?;
            report.inserted += 1;
        }
        DiffOp::Update { entry, .. } => {
            repo.update(entry)?;
            report.updated += 1;
        }
        DiffOp::Reparent {
            entity_id,
            new_parent,
            depth,
            ..
        } => {
            let mut entry = repo
                .get_by_entity_id(*entity_id)?
                .ok_or_else(|| RepoError::not_found("entry", entity_id))?;
            entry.parent_entity_id = *new_parent;
            entry.parent_id = None;
            entry.depth = depth_under(repo, *new_parent, *depth)?;
            repo.update(&entry)?;
            report.reparented += 1;
        }
        DiffOp::Migrate {
            entity_id, target, ..
        } => {
            let continuation = repo.migrate(*entity_id, *target)?;
            report.migrations.push((*entity_id, continuation));
            report.migrated += 1;
        }
        DiffOp::Delete { entity_id } => {
            repo.delete(*entity_id)?;
            report.deleted += 1;
        }
    }
    Ok(())
}

fn error_kind(error: &RepoError) -> &'static str {
    match error {
        RepoError::Validation(_) => "validation",
        RepoError::Db(_) => "io",
        RepoError::NotFound { .. } => "not_found",
        RepoError::Conflict(_) => "conflict",
        RepoError::Cancelled => "cancelled",
        RepoError::UninitializedConnection { .. } => "schema",
        RepoError::InvalidData(_) => "invalid_data",
    }
}
