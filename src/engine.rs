//! The ProMis engine (spec.md §4.7): turns a StaR Map and a logic program
//! into a landscape by batching target queries, dispatching them to a
//! worker pool, and assembling the results back into a collection shaped
//! like the target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;
use tracing::instrument;

use crate::config::Settings;
use crate::geo::CartesianCollection;
use crate::relations::Relation;
use crate::solver::{ExternalProcessSolver, SolverBackend, SolverError};
use crate::star_map::{StarMap, StarMapError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    StarMap(#[from] StarMapError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("solve was cancelled")]
    Cancelled,
}

/// Orchestrates inference over a StaR Map: one call to [`ProMis::solve`]
/// per landscape.
pub struct ProMis {
    star_map: StarMap,
    logic: String,
    solver: Arc<dyn SolverBackend>,
    cancelled: Arc<AtomicBool>,
}

impl ProMis {
    /// Builds the default external-process solver from `settings.solver`.
    pub fn new(star_map: StarMap, logic: impl Into<String>, settings: &Settings) -> Self {
        Self::with_solver(
            star_map,
            logic,
            Arc::new(ExternalProcessSolver::new(settings.solver.clone())),
        )
    }

    pub fn with_solver(star_map: StarMap, logic: impl Into<String>, solver: Arc<dyn SolverBackend>) -> Self {
        Self { star_map, logic: logic.into(), solver, cancelled: Arc::new(AtomicBool::new(false)) }
    }

    /// Requests cooperative cancellation; a `solve` in progress observes
    /// this between batches and returns `EngineError::Cancelled`.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[instrument(skip(self), fields(n_jobs, batch_size))]
    pub fn solve(
        &self,
        n_jobs: usize,
        batch_size: usize,
        show_progress: bool,
        print_first: bool,
    ) -> Result<CartesianCollection, EngineError> {
        let target_len = self.star_map.target().collection().len();
        let relations = self.star_map.get_from_logic(&self.logic)?;

        let indices: Vec<usize> = (0..target_len).collect();
        let batches: Vec<&[usize]> = indices.chunks(batch_size.max(1)).collect();
        let programs: Vec<String> =
            batches.iter().map(|batch| build_program(&self.logic, &relations, batch)).collect();

        if print_first {
            if let Some(first) = programs.first() {
                println!("{first}");
            }
        }

        let progress = show_progress.then(|| {
            let bar = ProgressBar::new(programs.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} batches") {
                bar.set_style(style);
            }
            bar
        });

        // Chunk size hint per spec.md §5: coarser dispatch once there are
        // enough programs that per-item scheduling overhead matters.
        let chunk_hint = if programs.len() > 1000 { 10 } else { 1 };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(n_jobs.max(1)).build()?;

        let cancelled = self.cancelled.clone();
        let solver = self.solver.clone();
        let progress_handle = progress.clone();

        let batch_results: Vec<Result<Vec<f64>, EngineError>> = pool.install(|| {
            programs
                .par_iter()
                .with_min_len(chunk_hint)
                .map(|program| {
                    if cancelled.load(Ordering::Relaxed) {
                        return Err(EngineError::Cancelled);
                    }
                    let result = solver.inference(program).map_err(EngineError::from);
                    if let Some(bar) = &progress_handle {
                        bar.inc(1);
                    }
                    result
                })
                .collect()
        });

        let mut probabilities = Vec::with_capacity(target_len);
        for result in batch_results {
            probabilities.extend(result?);
        }

        if let Some(bar) = &progress {
            bar.finish_and_clear();
        }

        Ok(self.star_map.target().collection().with_values(vec![probabilities]))
    }
}

fn build_program(logic: &str, relations: &[Box<dyn Relation>], batch: &[usize]) -> String {
    let mut program = String::new();
    program.push_str(logic);
    program.push('\n');

    for &i in batch {
        program.push_str(&format!("query(landscape(x_{i})).\n"));
        for relation in relations {
            program.push_str(&relation.clause_at(i));
        }
    }
    program.push('\n');

    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approximate::Method;
    use crate::geo::{CartesianMap, CartesianRasterBand, PolarLocation};
    use crate::star_map::Target;
    use mockall::mock;

    mock! {
        Solver {}

        impl SolverBackend for Solver {
            fn inference(&self, program: &str) -> Result<Vec<f64>, SolverError>;
        }
    }

    fn fitted_star_map() -> StarMap {
        let origin = PolarLocation::new(49.0, 8.0);
        let uam = CartesianMap::new(origin, Vec::new());
        let target = Target::Raster(CartesianRasterBand::new(origin, (2, 2), 10.0, 10.0));
        let mut star_map = StarMap::new(target, uam, Method::Nearest, Settings::default()).unwrap();

        let support = star_map.target().collection().clone();
        star_map.initialize(&support, 5, "landscape(X) :- distance(X, operator) < 5.").unwrap();
        star_map
    }

    #[test]
    fn solve_preserves_target_ordering() {
        let star_map = fitted_star_map();
        let target_len = star_map.target().collection().len();

        let mut solver = MockSolver::new();
        solver.expect_inference().returning(|program| {
            let queries = program.matches("query(").count();
            Ok((0..queries).map(|i| i as f64 / 10.0).collect())
        });

        let engine = ProMis::with_solver(star_map, "landscape(X) :- distance(X, operator) < 5.", Arc::new(solver));
        let result = engine.solve(2, 2, false, false).unwrap();

        assert_eq!(result.len(), target_len);
    }

    #[test]
    fn solve_propagates_solver_errors() {
        let star_map = fitted_star_map();

        let mut solver = MockSolver::new();
        solver.expect_inference().returning(|program| {
            Err(SolverError::Process {
                status: "1".to_string(),
                stderr: "boom".to_string(),
                excerpt: program.chars().take(10).collect(),
            })
        });

        let engine = ProMis::with_solver(star_map, "landscape(X) :- distance(X, operator) < 5.", Arc::new(solver));
        assert!(matches!(engine.solve(1, 4, false, false), Err(EngineError::Solver(_))));
    }

    #[test]
    fn cancel_aborts_without_partial_results() {
        let star_map = fitted_star_map();

        let mut solver = MockSolver::new();
        solver.expect_inference().returning(|program| {
            let queries = program.matches("query(").count();
            Ok(vec![0.5; queries])
        });

        let engine = ProMis::with_solver(star_map, "landscape(X) :- distance(X, operator) < 5.", Arc::new(solver));
        engine.cancel();

        assert!(matches!(engine.solve(1, 1, false, false), Err(EngineError::Cancelled)));
    }
}
