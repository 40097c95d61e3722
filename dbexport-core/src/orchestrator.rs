//! Export run sequencing.
//!
//! One run reads catalog metadata, builds the [`ExportPlan`], writes the user
//! script, renders every schema file and finally the import script. Any
//! failure aborts the run; files already written stay where they are.

use crate::Result;
use crate::artifacts::{ArtifactWriter, GzipCompressor, MysqldumpDelegate};
use crate::catalog::{CatalogSource, MetadataReader};
use crate::config::{ConnectionConfig, ExportOptions};
use crate::error::ExportError;
use crate::models::Principal;
use crate::plan::ExportPlan;
use crate::security::Credentials;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    /// Catalog reachable, nothing read yet
    Connected,
    /// Schemas, grants and credentials read
    MetadataLoaded,
    /// Plan reconciled
    PlanBuilt,
    /// Users script and every schema file written
    ArtifactsWritten,
    /// Import script written
    Done,
    /// The run aborted
    Failed,
}

impl std::fmt::Display for ExportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connected => "connected",
            Self::MetadataLoaded => "metadata loaded",
            Self::PlanBuilt => "plan built",
            Self::ArtifactsWritten => "artifacts written",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Number of schemas exported
    pub schemas: usize,
    /// Number of principals recreated by the users script
    pub principals: usize,
    /// Every file written, in write order
    pub files: Vec<PathBuf>,
}

/// Sequences one export run against a catalog source.
pub struct ExportOrchestrator<'a> {
    catalog: &'a dyn CatalogSource,
    excluded: BTreeSet<String>,
    jobs: usize,
    writer: ArtifactWriter,
    state: ExportState,
}

impl std::fmt::Debug for ExportOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportOrchestrator")
            .field("excluded", &self.excluded)
            .field("jobs", &self.jobs)
            .field("writer", &self.writer)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a> ExportOrchestrator<'a> {
    /// Creates an orchestrator writing through a preconfigured writer.
    ///
    /// A `jobs` value of zero is treated as one.
    pub fn new(
        catalog: &'a dyn CatalogSource,
        excluded: BTreeSet<String>,
        jobs: usize,
        writer: ArtifactWriter,
    ) -> Self {
        Self {
            catalog,
            excluded,
            jobs: jobs.max(1),
            writer,
            state: ExportState::Connected,
        }
    }

    /// Creates an orchestrator delegating to `mysqldump` and `gzip` as the
    /// options request.
    ///
    /// # Errors
    /// Returns a configuration error for invalid options and
    /// `OutputDirectoryMissing` if the output directory does not exist.
    pub fn for_server(
        catalog: &'a dyn CatalogSource,
        connection: &ConnectionConfig,
        credentials: Credentials,
        options: &ExportOptions,
    ) -> Result<Self> {
        options.validate()?;

        let mut writer = ArtifactWriter::new(&options.output_dir)?
            .with_client_args(options.import_client_args.clone());
        if options.export_content {
            writer = writer.with_dump_delegate(Arc::new(MysqldumpDelegate::new(
                connection,
                credentials,
                options,
            )));
        }
        if options.compress {
            writer = writer.with_compressor(Arc::new(GzipCompressor::new(
                options.compress_program.clone(),
            )));
        }

        Ok(Self::new(
            catalog,
            options.excluded.clone(),
            options.jobs,
            writer,
        ))
    }

    /// Current run state.
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Runs the export to completion.
    ///
    /// `cancel` is checked before metadata is read and before each schema
    /// is started, never in the middle of a schema.
    ///
    /// # Errors
    /// Returns the first error hit; the run ends in [`ExportState::Failed`].
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<ExportSummary> {
        match self.execute(cancel).await {
            Ok(summary) => {
                self.transition(ExportState::Done);
                Ok(summary)
            }
            Err(error) => {
                tracing::debug!("Export aborted while {}: {}", self.state, error);
                self.state = ExportState::Failed;
                Err(error)
            }
        }
    }

    async fn execute(&mut self, cancel: &CancellationToken) -> Result<ExportSummary> {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }

        let reader = MetadataReader::new(self.catalog);
        let schemas = reader.read_schemas(&self.excluded).await?;
        let grants = reader.read_principal_grants(&schemas).await?;
        let active: BTreeSet<Principal> = grants.values().flatten().cloned().collect();
        let credentials = reader.read_credentials(&active).await?;
        self.transition(ExportState::MetadataLoaded);

        let plan = ExportPlan::build(schemas, grants, credentials)?;
        self.transition(ExportState::PlanBuilt);
        tracing::info!(
            "Planned export of {} schemas and {} principals",
            plan.schema_count(),
            plan.principal_count()
        );
        warn_on_old_passwords(&plan);
        self.writer.warn_on_case_collisions(&plan);

        let mut files = vec![self.writer.write_users(&plan).await?];
        files.extend(self.write_schemas(&plan, cancel).await?);
        self.transition(ExportState::ArtifactsWritten);

        files.push(self.writer.write_import_script(&plan).await?);

        tracing::info!(
            "✓ Exported {} schemas to {}",
            plan.schema_count(),
            self.writer.output_dir().display()
        );
        Ok(ExportSummary {
            schemas: plan.schema_count(),
            principals: plan.principal_count(),
            files,
        })
    }

    /// Renders every schema file with at most `jobs` in flight.
    ///
    /// The first failure drops the remaining futures, which kills their
    /// subprocesses.
    async fn write_schemas(
        &self,
        plan: &ExportPlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>> {
        let writer = &self.writer;
        stream::iter(plan.schemas())
            .map(|schema| async move {
                if cancel.is_cancelled() {
                    tracing::warn!("Cancellation requested before schema {}", schema.name);
                    return Err(ExportError::Cancelled);
                }
                writer.write_schema(schema).await
            })
            .buffered(self.jobs)
            .try_collect()
            .await
    }

    fn transition(&mut self, next: ExportState) {
        tracing::debug!("Export state {} -> {}", self.state, next);
        self.state = next;
    }
}

fn warn_on_old_passwords(plan: &ExportPlan) {
    for (principal, credential) in plan.credentials() {
        if credential.scheme.is_legacy_old_format() {
            tracing::warn!(
                "{} uses the pre-4.1 password format, which MySQL 8.0 and later reject",
                principal
            );
        }
    }
}
