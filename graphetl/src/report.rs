//! Per node type, per source summary of a build.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ErrorKind, EtlError};
use crate::types::CanonicalSchema;

/// What happened to one source of a node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// The whole stream was consumed.
    Ingested {
        appended: u64,
        discarded: u64,
        coerced: u64,
    },
    /// The source was dropped before streaming.
    Skipped { kind: ErrorKind, reason: String },
    /// Streaming stopped early. Rows appended before the stop are kept.
    Interrupted {
        appended: u64,
        discarded: u64,
        coerced: u64,
        kind: ErrorKind,
        reason: String,
    },
}

impl SourceOutcome {
    pub fn skipped(err: &EtlError) -> Self {
        SourceOutcome::Skipped {
            kind: err.kind(),
            reason: err.summary(),
        }
    }

    pub fn appended(&self) -> u64 {
        match self {
            SourceOutcome::Ingested { appended, .. }
            | SourceOutcome::Interrupted { appended, .. } => *appended,
            SourceOutcome::Skipped { .. } => 0,
        }
    }

    pub fn discarded(&self) -> u64 {
        match self {
            SourceOutcome::Ingested { discarded, .. }
            | SourceOutcome::Interrupted { discarded, .. } => *discarded,
            SourceOutcome::Skipped { .. } => 0,
        }
    }

    /// Returns the error kind that stopped or dropped the source.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SourceOutcome::Ingested { .. } => None,
            SourceOutcome::Skipped { kind, .. } | SourceOutcome::Interrupted { kind, .. } => {
                Some(*kind)
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SourceOutcome::Ingested { discarded: 0, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub table: String,
    pub outcome: SourceOutcome,
}

/// Overall result of one node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Every source was fully ingested without discarded rows.
    Succeeded,
    /// The table exists but some source was dropped, interrupted or had rows discarded.
    Partial,
    /// No source survived discovery, there is no table.
    Skipped,
    /// The table could not be created or written.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub label: String,
    pub status: EntityStatus,
    /// Failure of the node type as a whole, such as a table that could not be created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub columns: CanonicalSchema,
    pub sources: Vec<SourceReport>,
}

impl EntityReport {
    /// Derives the status of a node type from its source outcomes.
    pub fn new(
        label: impl Into<String>,
        columns: CanonicalSchema,
        sources: Vec<SourceReport>,
        failure: Option<&EtlError>,
    ) -> Self {
        let status = if failure.is_some() {
            EntityStatus::Failed
        } else if sources
            .iter()
            .all(|source| matches!(source.outcome, SourceOutcome::Skipped { .. }))
        {
            EntityStatus::Skipped
        } else if sources.iter().any(|source| {
            matches!(
                source.outcome.error_kind(),
                Some(
                    ErrorKind::DestinationWriteFailed
                        | ErrorKind::DestinationConnectionFailed
                        | ErrorKind::DestinationClosed
                        | ErrorKind::EntityAborted
                )
            )
        }) {
            EntityStatus::Failed
        } else if sources.iter().all(|source| source.outcome.is_complete()) {
            EntityStatus::Succeeded
        } else {
            EntityStatus::Partial
        };

        Self {
            label: label.into(),
            status,
            error: failure.map(EtlError::summary),
            columns,
            sources,
        }
    }

    pub fn appended(&self) -> u64 {
        self.sources.iter().map(|source| source.outcome.appended()).sum()
    }

    pub fn discarded(&self) -> u64 {
        self.sources.iter().map(|source| source.outcome.discarded()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipReport {
    pub label: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Summary of a whole build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub database_file: Option<PathBuf>,
    /// Whether the build was stopped by a shutdown request.
    pub canceled: bool,
    pub entities: Vec<EntityReport>,
    pub relationships: Vec<RelationshipReport>,
}

impl BuildReport {
    /// Returns whether every node type was fully ingested and the build was not canceled.
    pub fn is_complete(&self) -> bool {
        !self.canceled
            && self
                .entities
                .iter()
                .all(|entity| entity.status == EntityStatus::Succeeded)
    }

    pub fn entity(&self, label: &str) -> Option<&EntityReport> {
        self.entities.iter().find(|entity| entity.label == label)
    }

    pub fn total_appended(&self) -> u64 {
        self.entities.iter().map(EntityReport::appended).sum()
    }
}
