//! End-to-end validation run
//!
//! transpile → load configuration → scan FSH → index output → select →
//! repair → validate in batches → aggregate → write summaries

use crate::alias::AliasTableBuilder;
use crate::batch::{BatchOptions, BatchValidator};
use crate::config::{
    ExclusionConfig, PackageDependency, ProjectLayout, SushiProject, ValidatorConfig,
};
use crate::exclusion::ExclusionPolicy;
use crate::fsh_source::FshSources;
use crate::index::ArtifactIndex;
use crate::logs::{run_basename, write_summary};
use crate::repair::repair_file;
use crate::report::Report;
use crate::result::Result;
use crate::selector::{InstanceSelector, Selected, SelectionFilter};
use crate::task::{ValidationResult, ValidationTask};
use crate::transpiler::Transpiler;
use tracing::{info, warn};

/// Everything read from a project before selection
#[derive(Debug, Clone)]
pub struct Project {
    pub layout: ProjectLayout,
    pub sushi: SushiProject,
    pub exclusions: ExclusionConfig,
    pub sources: FshSources,
    pub index: ArtifactIndex,
}

impl Project {
    /// Load configuration, scan FSH sources and index the generated output
    pub fn load(layout: &ProjectLayout) -> Result<Self> {
        let sushi = SushiProject::load(layout.base_path())?;
        let exclusions = ExclusionConfig::load(layout.base_path())?;
        let sources = FshSources::scan(&layout.input_dir())?;

        let mut aliases = AliasTableBuilder::new();
        sources.collect_aliases(&mut aliases)?;
        let index = ArtifactIndex::build(&layout.output_dir(), aliases)?;

        Ok(Self {
            layout: layout.clone(),
            sushi,
            exclusions,
            sources,
            index,
        })
    }

    /// Packages the validator must load
    ///
    /// The generated ImplementationGuide is authoritative; `sushi-config.yaml`
    /// is the fallback when the transpiler did not emit one.
    pub fn dependencies(&self) -> Vec<PackageDependency> {
        if self.index.dependencies().is_empty() {
            self.sushi.package_dependencies()
        } else {
            self.index.dependencies().to_vec()
        }
    }

    /// Select tasks and pre-validation results for `filter`
    ///
    /// Returns the tasks to run and the results already decided (skips and
    /// uncovered profiles), with dense sequence numbers across both.
    pub fn plan(
        &self,
        filter: &SelectionFilter,
    ) -> Result<(Vec<ValidationTask>, Vec<ValidationResult>)> {
        let policy = ExclusionPolicy::new(self.exclusions.clone());
        let selector = InstanceSelector::new(&self.index, &self.sources, &policy)
            .with_project_canonical(self.sushi.canonical.as_deref());

        let mut tasks = Vec::new();
        let mut decided = Vec::new();
        for item in selector.select(filter)? {
            match item? {
                Selected::Task(task) => tasks.push(task),
                Selected::Skipped(result) => decided.push(result),
            }
        }

        let mut seq = tasks.len() + decided.len();
        for uncovered in selector.uncovered_profiles(filter)? {
            warn!(
                "No instances defined for profile {} in {}",
                uncovered.profile,
                uncovered.source.display()
            );
            decided.push(ValidationResult::failed(
                seq,
                "",
                uncovered.url.or(Some(uncovered.profile.clone())),
                vec![format!("No instances defined for profile {}", uncovered.profile)],
            ));
            seq += 1;
        }

        Ok((tasks, decided))
    }
}

/// Orchestrates one validation run
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: ValidatorConfig,
}

impl Pipeline {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run the whole pipeline for `filter`
    ///
    /// Fatal problems are returned as errors; everything that went wrong for
    /// individual instances is part of the report.
    pub async fn run(&self, filter: &SelectionFilter) -> Result<Report> {
        let started = chrono::Local::now();
        let layout = &self.config.layout;

        if self.config.run_transpiler {
            Transpiler::new(&self.config.transpiler)
                .run(layout.base_path())
                .await?;
        }

        let project = Project::load(layout)?;
        let (tasks, decided) = project.plan(filter)?;
        info!(
            "{} instance(s) to validate, {} decided without validation",
            tasks.len(),
            decided.len()
        );

        if self.config.repair_duplicate_codings {
            self.repair(&project, &tasks)?;
        }

        let basename = run_basename(started);
        let mut options = BatchOptions::from_config(
            &self.config,
            project.sushi.primary_fhir_version(),
            project.dependencies(),
        );
        options.log_dir = self.config.log_dir.as_ref().map(|dir| dir.join(&basename));

        let validated = BatchValidator::new(options).run(tasks).await;
        let report = Report::aggregate(decided.into_iter().chain(validated));

        if let Some(log_dir) = &self.config.log_dir {
            write_summary(&report, log_dir, &basename)?;
        }

        info!(
            "{} passed, {} failed, {} skipped",
            report.passed, report.failed, report.skipped
        );
        Ok(report)
    }

    fn repair(&self, project: &Project, tasks: &[ValidationTask]) -> Result<()> {
        for task in tasks {
            let needs_repair = project
                .index
                .instance(&task.instance)
                .is_some_and(|a| a.had_duplicate_codings);
            if needs_repair {
                repair_file(&task.file)?;
            }
        }
        Ok(())
    }
}
