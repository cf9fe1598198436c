// eduhub-cli/src/lib.rs
//! EduHub learning-platform analytics on the embedded document store
//!
//! Module layout:
//! - config: fixed paths and the reference instant
//! - models: typed records per collection
//! - schemas: validators and idempotent collection setup
//! - seed: sample data, reset and export
//! - crud: create/update/delete walkthrough
//! - queries: filter reads, joins and aggregate reports
//! - indexes: duplicate cleanup, index creation, plan statistics
//! - validation: rejected writes and their classification
//! - report: SVG charts

pub mod config;
pub mod crud;
pub mod error;
pub mod indexes;
pub mod models;
pub mod queries;
pub mod report;
pub mod schemas;
pub mod seed;
pub mod validation;

use eduhub_core::{DatabaseCore, Storage};

pub use config::AppConfig;
pub use error::{AppError, Result};

/// Steps of a full run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Setup,
    Seed,
    Crud,
    Queries,
    Indexes,
    Validate,
    Report,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Setup,
        Step::Seed,
        Step::Crud,
        Step::Queries,
        Step::Indexes,
        Step::Validate,
        Step::Report,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::Setup => "setup",
            Step::Seed => "seed",
            Step::Crud => "crud",
            Step::Queries => "queries",
            Step::Indexes => "indexes",
            Step::Validate => "validate",
            Step::Report => "report",
        }
    }
}

/// Execute one step against an open database
pub fn run_step<S: Storage>(db: &DatabaseCore<S>, config: &AppConfig, step: Step) -> Result<()> {
    let _span = tracing::info_span!("step", name = step.name()).entered();
    let now = config.reference_time;

    match step {
        Step::Setup => {
            let report = schemas::define_collections(db)?;
            tracing::info!(created = ?report.created, existing = ?report.existing, "collections ready");
        }
        Step::Seed => {
            let summary = seed::seed(db, now)?;
            for (collection, count) in &summary.counts {
                tracing::info!(collection = %collection, count, "seeded");
            }
            for row in seed::user_role_counts(db)? {
                tracing::info!(role = %row.role, count = row.count, "users by role");
            }
            seed::export_sample(db, &config.sample_export_path)?;
        }
        Step::Crud => {
            let outcomes = crud::run_create(db, now)?
                .into_iter()
                .chain(crud::run_updates(db, now)?)
                .chain(crud::run_deletes(db)?);
            tracing::info!(writes = outcomes.count(), "crud walkthrough finished");
        }
        Step::Queries => queries::run_catalogue(db, now)?,
        Step::Indexes => {
            let report = indexes::optimize(db)?;
            let (before, after) = report.total_docs_examined();
            tracing::info!(before, after, "documents examined across probe queries");
        }
        Step::Validate => {
            let outcomes = validation::run_error_checks(db, now)?;
            let rejected = outcomes.iter().filter(|o| o.rejected_as.is_some()).count();
            tracing::info!(rejected, total = outcomes.len(), "error handling checks finished");
        }
        Step::Report => {
            let written = report::render_all(&config.images_dir, &report::ChartData::default())?;
            tracing::info!(charts = written.len(), dir = %config.images_dir.display(), "charts rendered");
        }
    }
    Ok(())
}

/// Execute steps in order, stopping at the first fatal error
pub fn run<S: Storage>(db: &DatabaseCore<S>, config: &AppConfig, steps: &[Step]) -> Result<()> {
    for step in steps {
        if let Err(e) = run_step(db, config, *step) {
            tracing::error!(step = step.name(), error = %e, "step failed");
            return Err(e);
        }
    }
    Ok(())
}
