//! The generational evolution loop
//!
//! The driver owns population lifecycle and nothing else: it asks the codec
//! for genomes, the render backend for artifacts, the evaluator for scores,
//! and the injected operators for offspring. All run state travels in an
//! explicit context per invocation; there is no long-lived engine object.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::ParameterSet;
use crate::error::{EvoResult, EvolutionError, ValidationError};
use crate::fitness::FitnessEvaluator;
use crate::genome::codec::GenomeCodec;
use crate::genome::Genome;
use crate::operators::{CrossoverOperator, MutationOperator, SelectionOperator};
use crate::ranking::{CandidateId, PreferenceRankingEngine};
use crate::render::session::RenderBackend;
use crate::storage::ArtifactStore;

/// One individual of one generation
#[derive(Clone, Debug)]
pub struct Candidate {
    /// Run-unique id, stable across the ranking engine and reports
    pub id: CandidateId,
    /// The evolved gene vector
    pub genome: Genome,
    /// Full parameter set materialized from the genome
    pub params: ParameterSet,
    /// Fitness, assigned exactly once per generation (lower is better)
    pub fitness: Option<f64>,
    /// Rendered artifact, if the batch produced one for this individual
    pub artifact: Option<PathBuf>,
}

/// Advisory convergence check: stop when the best fitness improved by less
/// than `epsilon` over the last `window` generations.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ConvergenceCheck {
    /// Number of trailing generations to inspect
    pub window: usize,
    /// Minimum improvement that still counts as progress
    pub epsilon: f64,
}

impl ConvergenceCheck {
    /// Create a new convergence check
    pub fn new(window: usize, epsilon: f64) -> Self {
        Self { window, epsilon }
    }

    /// Check a best-fitness-per-generation history (minimization)
    pub fn converged(&self, history: &[f64]) -> bool {
        if self.window < 2 || history.len() < self.window {
            return false;
        }
        let window = &history[history.len() - self.window..];
        let improvement = window[0] - window[window.len() - 1];
        improvement < self.epsilon
    }
}

/// Driver configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Individuals per generation
    pub population_size: usize,
    /// Generations to run (primary termination criterion)
    pub max_generations: usize,
    /// Whether the best individuals survive unchanged
    pub elitism: bool,
    /// Number of elites preserved per generation
    pub elite_count: usize,
    /// Probability that a parent pair undergoes crossover
    pub crossover_probability: f64,
    /// Size of the report's top-K shortlist
    pub top_k: usize,
    /// Optional advisory convergence check
    pub convergence: Option<ConvergenceCheck>,
    /// Generation-fatal render failures tolerated back-to-back before the
    /// run gives up
    pub max_consecutive_failures: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 16,
            max_generations: 20,
            elitism: true,
            elite_count: 1,
            crossover_probability: 0.9,
            top_k: 4,
            convergence: None,
            max_consecutive_failures: 3,
        }
    }
}

/// Statistics for one completed generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number
    pub generation: usize,
    /// Best (lowest) fitness in this generation
    pub best_fitness: f64,
    /// Worst (highest) fitness in this generation
    pub worst_fitness: f64,
    /// Mean fitness
    pub mean_fitness: f64,
    /// Whether the render batch failed wholesale
    pub failed: bool,
    /// Render status payload for diagnostics
    pub status: String,
}

impl GenerationStats {
    fn from_scores(generation: usize, scores: &[f64], failed: bool, status: String) -> Self {
        let best = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let worst = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        Self {
            generation,
            best_fitness: best,
            worst_fitness: worst,
            mean_fitness: mean,
            failed,
            status,
        }
    }
}

/// How a run ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The advisory convergence check fired
    Converged,
    /// The configured generation budget ran out
    ExhaustedGenerations,
    /// Too many consecutive generation-fatal failures
    Failed,
}

/// Result of an evolution run
///
/// `fitness_history` has one entry per generation actually completed; a run
/// cut short by failures reports fewer entries than requested, explicitly.
#[derive(Clone, Debug)]
pub struct EvolutionReport {
    /// Best candidate observed across the whole run
    pub best: Candidate,
    /// Best fitness per completed generation
    pub fitness_history: Vec<f64>,
    /// Full per-generation statistics
    pub generation_stats: Vec<GenerationStats>,
    /// Best `top_k` candidates of the run, for downstream preference ranking
    pub top_k: Vec<Candidate>,
    /// Generations actually completed
    pub generations_completed: usize,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Terminal state of the run
    pub outcome: RunOutcome,
}

impl EvolutionReport {
    /// Treat a failure-terminated run as an error
    ///
    /// For callers that prefer raise semantics over inspecting `outcome`;
    /// converging or exhausting the generation budget passes the report
    /// through unchanged.
    pub fn into_result(self) -> EvoResult<Self> {
        match self.outcome {
            RunOutcome::Failed => {
                let trailing_failures = self
                    .generation_stats
                    .iter()
                    .rev()
                    .take_while(|s| s.failed)
                    .count();
                Err(EvolutionError::ConsecutiveFailures(trailing_failures))
            }
            _ => Ok(self),
        }
    }

    /// Copy the shortlist's artifacts into `dest` through the artifact store
    ///
    /// Render directories belong to the run; archiving gives the top-K
    /// candidates stable audio for downstream preference ranking. Candidates
    /// whose artifact disappeared are skipped, and paths are rewritten to the
    /// archived copies.
    pub fn archive_shortlist(
        &mut self,
        store: &dyn ArtifactStore,
        dest: &Path,
    ) -> std::io::Result<()> {
        for (rank, candidate) in self.top_k.iter_mut().enumerate() {
            let Some(source) = candidate.artifact.clone() else {
                continue;
            };
            if !store.exists(&source) {
                warn!(candidate = %candidate.id, source = %source.display(), "shortlist artifact vanished");
                candidate.artifact = None;
                continue;
            }
            let extension = source
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("wav");
            let target = dest.join(format!("rank_{rank:02}.{extension}"));
            let bytes = store.read(&source)?;
            store.write(&target, &bytes)?;
            candidate.artifact = Some(target);
        }
        Ok(())
    }
}

/// Everything one run needs, passed explicitly per invocation
pub struct RunContext<'a, B: RenderBackend> {
    /// Shared read-only codec for this run's constraint set
    pub codec: &'a GenomeCodec,
    /// Render backend turning parameter sets into artifacts
    pub renderer: &'a mut B,
    /// Scoring strategy
    pub evaluator: &'a FitnessEvaluator,
    /// Preference state, required in preference mode
    pub ranking: Option<&'a mut PreferenceRankingEngine>,
}

/// Generational GA driver with injected variation operators
pub struct EvolutionDriver<S, C, M> {
    config: EvolutionConfig,
    selection: S,
    crossover: C,
    mutation: M,
}

impl<S, C, M> EvolutionDriver<S, C, M>
where
    S: SelectionOperator,
    C: CrossoverOperator,
    M: MutationOperator,
{
    /// Create a driver, validating the configuration
    pub fn new(
        config: EvolutionConfig,
        selection: S,
        crossover: C,
        mutation: M,
    ) -> EvoResult<Self> {
        if config.population_size < 2 {
            return Err(EvolutionError::Configuration(
                "population_size must be at least 2".to_string(),
            ));
        }
        if config.elitism && config.elite_count >= config.population_size {
            return Err(EvolutionError::Configuration(
                "elite_count must be smaller than population_size".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.crossover_probability) {
            return Err(EvolutionError::Configuration(
                "crossover_probability must be in [0, 1]".to_string(),
            ));
        }
        if config.max_consecutive_failures == 0 {
            return Err(EvolutionError::Configuration(
                "max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            config,
            selection,
            crossover,
            mutation,
        })
    }

    /// The driver configuration
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Sample the initial population uniformly within each gene's bounds
    pub fn initialize<R: Rng>(&self, codec: &GenomeCodec, rng: &mut R) -> EvoResult<Vec<Genome>> {
        if codec.genome_len() == 0 {
            return Err(ValidationError::EmptyConstraintSet.into());
        }
        Ok((0..self.config.population_size)
            .map(|_| Genome::random(codec.bounds(), rng))
            .collect())
    }

    /// Run the full generational loop
    pub fn run<B, R>(&self, mut ctx: RunContext<'_, B>, rng: &mut R) -> EvoResult<EvolutionReport>
    where
        B: RenderBackend,
        R: Rng,
    {
        let start = Instant::now();
        let mut genomes = self.initialize(ctx.codec, rng)?;

        let mut fitness_history: Vec<f64> = Vec::new();
        let mut generation_stats: Vec<GenerationStats> = Vec::new();
        let mut best: Option<Candidate> = None;
        let mut shortlist: Vec<Candidate> = Vec::new();
        let mut next_id = 0usize;
        let mut consecutive_failures = 0usize;
        let mut outcome = RunOutcome::ExhaustedGenerations;

        for generation in 0..self.config.max_generations {
            let (candidates, stats) =
                self.run_generation(&mut ctx, generation, &genomes, &mut next_id)?;

            if stats.failed {
                consecutive_failures += 1;
                warn!(
                    generation,
                    status = %stats.status,
                    consecutive_failures,
                    "generation render failed"
                );
            } else {
                consecutive_failures = 0;
            }

            fitness_history.push(stats.best_fitness);
            generation_stats.push(stats);

            self.update_shortlist(&mut shortlist, &candidates);
            for candidate in &candidates {
                let better = match &best {
                    Some(b) => candidate.fitness < b.fitness,
                    None => true,
                };
                if better {
                    best = Some(candidate.clone());
                }
            }

            if consecutive_failures >= self.config.max_consecutive_failures {
                outcome = RunOutcome::Failed;
                break;
            }

            if let Some(check) = &self.config.convergence {
                if check.converged(&fitness_history) {
                    outcome = RunOutcome::Converged;
                    break;
                }
            }

            // Vary, unless this was the final generation anyway
            if generation + 1 < self.config.max_generations {
                let scored: Vec<(Genome, f64)> = candidates
                    .iter()
                    .map(|c| (c.genome.clone(), c.fitness.unwrap_or(f64::INFINITY)))
                    .collect();
                genomes = self.vary(&scored, ctx.codec, rng)?;
            }
        }

        let best = best.ok_or(EvolutionError::EmptyPopulation)?;
        let generations_completed = fitness_history.len();
        info!(
            generations_completed,
            best = best.fitness.unwrap_or(f64::INFINITY),
            ?outcome,
            "run finished"
        );

        Ok(EvolutionReport {
            best,
            fitness_history,
            generation_stats,
            top_k: shortlist,
            generations_completed,
            elapsed: start.elapsed(),
            outcome,
        })
    }

    /// Evaluate one generation: decode, render the whole population in one
    /// host session, score every artifact, and queue preference pairs.
    fn run_generation<B: RenderBackend>(
        &self,
        ctx: &mut RunContext<'_, B>,
        generation: usize,
        genomes: &[Genome],
        next_id: &mut usize,
    ) -> EvoResult<(Vec<Candidate>, GenerationStats)> {
        let mut candidates = Vec::with_capacity(genomes.len());
        for genome in genomes {
            let params = ctx.codec.decode(genome)?;
            candidates.push(Candidate {
                id: CandidateId(*next_id),
                genome: genome.clone(),
                params,
                fitness: None,
                artifact: None,
            });
            *next_id += 1;
        }

        let param_sets: Vec<ParameterSet> = candidates.iter().map(|c| c.params.clone()).collect();
        let batch = ctx.renderer.render_generation(generation, &param_sets);

        for (candidate, artifact) in candidates.iter_mut().zip(batch.artifacts.iter()) {
            candidate.artifact = artifact.clone();
        }

        let ids: Vec<CandidateId> = candidates.iter().map(|c| c.id).collect();
        let scores = ctx.evaluator.score_generation(
            &ids,
            &batch.artifacts,
            ctx.ranking.as_ref().map(|r| &**r),
        );
        for (candidate, &score) in candidates.iter_mut().zip(scores.iter()) {
            candidate.fitness = Some(score);
        }

        let stats = GenerationStats::from_scores(generation, &scores, !batch.success, batch.status);
        info!(
            generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            failed = stats.failed,
            "generation evaluated"
        );

        // Preference runs queue every rendered pair of this generation for
        // human judgment.
        if ctx.evaluator.is_preference() {
            if let Some(engine) = ctx.ranking.as_deref_mut() {
                let rendered: Vec<CandidateId> = candidates
                    .iter()
                    .filter(|c| c.artifact.is_some())
                    .map(|c| c.id)
                    .collect();
                engine.generate_pairs(&rendered);
            }
        }

        Ok((candidates, stats))
    }

    /// Produce the next generation from a scored population
    ///
    /// Parents come from the injected selection operator; offspring pass
    /// through crossover and mutation and are re-clamped to bounds
    /// defensively, so a misbehaving operator cannot leak out-of-range genes.
    pub fn vary<R: Rng>(
        &self,
        scored: &[(Genome, f64)],
        codec: &GenomeCodec,
        rng: &mut R,
    ) -> EvoResult<Vec<Genome>> {
        if scored.is_empty() {
            return Err(EvolutionError::EmptyPopulation);
        }
        let bounds = codec.bounds();
        let mut next = Vec::with_capacity(self.config.population_size);

        if self.config.elitism {
            let mut order: Vec<usize> = (0..scored.len()).collect();
            order.sort_by(|&a, &b| {
                scored[a]
                    .1
                    .partial_cmp(&scored[b].1)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for &i in order.iter().take(self.config.elite_count) {
                next.push(scored[i].0.clone());
            }
        }

        while next.len() < self.config.population_size {
            let p1 = self.selection.select(scored, rng);
            let p2 = self.selection.select(scored, rng);

            let (mut child1, mut child2) = if rng.gen::<f64>() < self.config.crossover_probability {
                self.crossover
                    .crossover(&scored[p1].0, &scored[p2].0, bounds, rng)
            } else {
                (scored[p1].0.clone(), scored[p2].0.clone())
            };

            self.mutation.mutate(&mut child1, bounds, rng);
            self.mutation.mutate(&mut child2, bounds, rng);
            child1.clamp_to(bounds);
            child2.clamp_to(bounds);

            next.push(child1);
            if next.len() < self.config.population_size {
                next.push(child2);
            }
        }

        Ok(next)
    }

    /// Keep the run's best `top_k` candidates, fittest first
    fn update_shortlist(&self, shortlist: &mut Vec<Candidate>, candidates: &[Candidate]) {
        shortlist.extend(candidates.iter().cloned());
        shortlist.sort_by(|a, b| {
            a.fitness
                .partial_cmp(&b.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        shortlist.truncate(self.config.top_k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ParamId, ParamSpec, ParameterCatalog};
    use crate::features::{ExtractionError, FeatureExtractor, TargetProfile};
    use crate::genome::codec::{ConstraintSet, ParameterConstraint};
    use crate::operators::crossover::SbxCrossover;
    use crate::operators::mutation::GaussianMutation;
    use crate::operators::selection::TournamentSelection;
    use crate::render::session::BatchOutcome;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::{BTreeMap, HashSet};
    use std::path::Path;
    use std::sync::Arc;

    fn catalog() -> ParameterCatalog {
        ParameterCatalog::new(vec![
            (
                ParamId::new("cutoff"),
                ParamSpec {
                    min: 0.0,
                    max: 1.0,
                    default: 0.5,
                },
            ),
            (
                ParamId::new("detune"),
                ParamSpec {
                    min: -1.0,
                    max: 1.0,
                    default: 0.0,
                },
            ),
        ])
        .unwrap()
    }

    fn codec() -> GenomeCodec {
        let cat = catalog();
        let constraints = ConstraintSet::new(
            &cat,
            vec![
                ParameterConstraint::new("cutoff", 0.0, 1.0),
                ParameterConstraint::new("detune", -1.0, 1.0),
            ],
        )
        .unwrap();
        GenomeCodec::new(&cat, constraints)
    }

    /// Render stub: writes each candidate's cutoff value into a real file.
    struct FileRenderer {
        root: std::path::PathBuf,
        fail_generations: HashSet<usize>,
        skip_slot: Option<usize>,
        generations_rendered: usize,
    }

    impl FileRenderer {
        fn new(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                fail_generations: HashSet::new(),
                skip_slot: None,
                generations_rendered: 0,
            }
        }
    }

    impl RenderBackend for FileRenderer {
        fn render_generation(
            &mut self,
            generation: usize,
            population: &[ParameterSet],
        ) -> BatchOutcome {
            self.generations_rendered += 1;
            if self.fail_generations.contains(&generation) {
                return BatchOutcome::failed("host launch failed", population.len());
            }

            let artifacts = population
                .iter()
                .enumerate()
                .map(|(i, params)| {
                    if self.skip_slot == Some(i) {
                        return None;
                    }
                    let value = params.get(&ParamId::new("cutoff")).unwrap();
                    let path = self.root.join(format!("gen_{generation}_slot_{i}.txt"));
                    std::fs::write(&path, format!("{value}")).ok()?;
                    Some(path)
                })
                .collect();

            BatchOutcome {
                success: true,
                status: "ok".to_string(),
                artifacts,
            }
        }
    }

    /// Extractor stub: parses the artifact's content as the feature value.
    struct ParseExtractor;

    impl FeatureExtractor for ParseExtractor {
        fn extract(
            &self,
            artifact: &Path,
            features: &[String],
        ) -> Result<BTreeMap<String, f64>, ExtractionError> {
            let text = std::fs::read_to_string(artifact)
                .map_err(|e| ExtractionError::Unreadable(e.to_string()))?;
            let value: f64 = text
                .trim()
                .parse()
                .map_err(|_| ExtractionError::Empty(artifact.display().to_string()))?;
            Ok(features.iter().map(|f| (f.clone(), value)).collect())
        }
    }

    fn distance_evaluator() -> FitnessEvaluator {
        // Fitness = |cutoff - 0.25|
        let profile = TargetProfile::new(vec![("level", 1.0, 0.25)]);
        FitnessEvaluator::distance(Arc::new(ParseExtractor), profile).unwrap()
    }

    fn driver(
        config: EvolutionConfig,
    ) -> EvolutionDriver<TournamentSelection, SbxCrossover, GaussianMutation> {
        EvolutionDriver::new(
            config,
            TournamentSelection::new(3),
            SbxCrossover::new(15.0),
            GaussianMutation::new(0.1).with_probability(0.5),
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        let bad = EvolutionConfig {
            population_size: 1,
            ..Default::default()
        };
        assert!(EvolutionDriver::new(
            bad,
            TournamentSelection::binary(),
            SbxCrossover::new(15.0),
            GaussianMutation::new(0.1),
        )
        .is_err());

        let bad = EvolutionConfig {
            crossover_probability: 1.5,
            ..Default::default()
        };
        assert!(EvolutionDriver::new(
            bad,
            TournamentSelection::binary(),
            SbxCrossover::new(15.0),
            GaussianMutation::new(0.1),
        )
        .is_err());
    }

    #[test]
    fn test_initialize_within_bounds() {
        let codec = codec();
        let mut rng = StdRng::seed_from_u64(31);
        let driver = driver(EvolutionConfig::default());

        let genomes = driver.initialize(&codec, &mut rng).unwrap();
        assert_eq!(genomes.len(), 16);
        for g in &genomes {
            assert!(codec.bounds().contains_vec(g.genes()));
        }
    }

    #[test]
    fn test_run_improves_distance_fitness() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = distance_evaluator();
        let mut renderer = FileRenderer::new(dir.path());
        let mut rng = StdRng::seed_from_u64(32);

        let config = EvolutionConfig {
            population_size: 12,
            max_generations: 10,
            ..Default::default()
        };
        let driver = driver(config);

        let report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: None,
                },
                &mut rng,
            )
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::ExhaustedGenerations);
        assert_eq!(report.generations_completed, 10);
        assert_eq!(report.fitness_history.len(), 10);
        // Elitism keeps the per-generation best monotone non-increasing
        for pair in report.fitness_history.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-9);
        }
        let best_fitness = report.best.fitness.unwrap();
        assert!(best_fitness <= report.fitness_history[0]);
        assert!(best_fitness.is_finite());
        assert_eq!(report.top_k.len(), 4);
        // Shortlist is sorted fittest-first
        for pair in report.top_k.windows(2) {
            assert!(pair[0].fitness <= pair[1].fitness);
        }
    }

    #[test]
    fn test_missing_artifact_penalizes_only_that_individual() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = distance_evaluator();
        let mut renderer = FileRenderer::new(dir.path());
        renderer.skip_slot = Some(0);
        let mut rng = StdRng::seed_from_u64(33);

        let config = EvolutionConfig {
            population_size: 6,
            max_generations: 2,
            ..Default::default()
        };
        let driver = driver(config);

        let report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: None,
                },
                &mut rng,
            )
            .unwrap();

        // The run completed; failed slots never aborted a generation
        assert_eq!(report.generations_completed, 2);
        assert!(!report.generation_stats[0].failed);
        // The other five individuals got finite, artifact-derived scores
        assert!(report.generation_stats[0].best_fitness < crate::fitness::PENALTY_FITNESS);
        assert_eq!(
            report.generation_stats[0].worst_fitness,
            crate::fitness::PENALTY_FITNESS
        );
    }

    #[test]
    fn test_launch_failure_marks_generation_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = distance_evaluator();
        let mut renderer = FileRenderer::new(dir.path());
        renderer.fail_generations.insert(1);
        let mut rng = StdRng::seed_from_u64(34);

        let config = EvolutionConfig {
            population_size: 6,
            max_generations: 4,
            ..Default::default()
        };
        let driver = driver(config);

        let report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: None,
                },
                &mut rng,
            )
            .unwrap();

        // The failed generation scored everyone with the penalty but the run
        // went on to the configured end.
        assert_eq!(report.outcome, RunOutcome::ExhaustedGenerations);
        assert_eq!(report.generations_completed, 4);
        assert!(report.generation_stats[1].failed);
        assert_eq!(
            report.generation_stats[1].best_fitness,
            crate::fitness::PENALTY_FITNESS
        );
        assert!(!report.generation_stats[2].failed);
    }

    #[test]
    fn test_consecutive_failures_end_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = distance_evaluator();
        let mut renderer = FileRenderer::new(dir.path());
        for generation in 1..10 {
            renderer.fail_generations.insert(generation);
        }
        let mut rng = StdRng::seed_from_u64(35);

        let config = EvolutionConfig {
            population_size: 6,
            max_generations: 10,
            max_consecutive_failures: 2,
            ..Default::default()
        };
        let driver = driver(config);

        let report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: None,
                },
                &mut rng,
            )
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Failed);
        // Generations 0 (ok), 1 and 2 (failed) completed, then the run ended;
        // the history is explicitly shorter than requested.
        assert_eq!(report.generations_completed, 3);
        assert_eq!(report.fitness_history.len(), 3);

        assert!(matches!(
            report.into_result(),
            Err(EvolutionError::ConsecutiveFailures(2))
        ));
    }

    #[test]
    fn test_convergence_check_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = distance_evaluator();
        let mut renderer = FileRenderer::new(dir.path());
        let mut rng = StdRng::seed_from_u64(36);

        let config = EvolutionConfig {
            population_size: 8,
            max_generations: 50,
            convergence: Some(ConvergenceCheck::new(3, 1e-12)),
            ..Default::default()
        };
        let driver = driver(config);

        let report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: None,
                },
                &mut rng,
            )
            .unwrap();

        // Early stop keeps all per-generation data gathered so far
        if report.outcome == RunOutcome::Converged {
            assert!(report.generations_completed < 50);
            assert_eq!(
                report.fitness_history.len(),
                report.generations_completed
            );
            assert_eq!(
                report.generation_stats.len(),
                report.generations_completed
            );
        }
    }

    #[test]
    fn test_preference_run_queues_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = FitnessEvaluator::preference();
        let mut renderer = FileRenderer::new(dir.path());
        let mut engine = PreferenceRankingEngine::new();
        let mut rng = StdRng::seed_from_u64(37);

        let config = EvolutionConfig {
            population_size: 4,
            max_generations: 2,
            top_k: 2,
            ..Default::default()
        };
        let driver = driver(config);

        let report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: Some(&mut engine),
                },
                &mut rng,
            )
            .unwrap();

        // 4 candidates per generation -> 6 pairs, twice
        assert_eq!(engine.records().len(), 12);
        assert!(engine.next_pending_comparison().is_some());
        // Without judgments every candidate scored neutral
        assert_eq!(
            report.best.fitness,
            Some(crate::fitness::NEUTRAL_FITNESS)
        );
    }

    #[test]
    fn test_archive_shortlist_copies_artifacts() {
        use crate::storage::FsArtifactStore;

        let dir = tempfile::tempdir().unwrap();
        let codec = codec();
        let evaluator = distance_evaluator();
        let mut renderer = FileRenderer::new(dir.path());
        let mut rng = StdRng::seed_from_u64(40);

        let config = EvolutionConfig {
            population_size: 6,
            max_generations: 2,
            top_k: 3,
            ..Default::default()
        };
        let driver = driver(config);

        let mut report = driver
            .run(
                RunContext {
                    codec: &codec,
                    renderer: &mut renderer,
                    evaluator: &evaluator,
                    ranking: None,
                },
                &mut rng,
            )
            .unwrap();

        let archive = dir.path().join("shortlist");
        report
            .archive_shortlist(&FsArtifactStore::new(), &archive)
            .unwrap();

        for (rank, candidate) in report.top_k.iter().enumerate() {
            let path = candidate.artifact.as_ref().unwrap();
            assert!(path.starts_with(&archive));
            assert!(path
                .file_name()
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with(&format!("rank_{rank:02}")));
            assert!(path.is_file());
        }
    }

    #[test]
    fn test_vary_respects_bounds_invariant() {
        let codec = codec();
        let mut rng = StdRng::seed_from_u64(38);
        let driver = driver(EvolutionConfig {
            population_size: 10,
            ..Default::default()
        });

        let scored: Vec<(Genome, f64)> = (0..10)
            .map(|i| {
                (
                    Genome::random(codec.bounds(), &mut rng),
                    i as f64,
                )
            })
            .collect();

        for _ in 0..20 {
            let next = driver.vary(&scored, &codec, &mut rng).unwrap();
            assert_eq!(next.len(), 10);
            for genome in &next {
                assert!(codec.bounds().contains_vec(genome.genes()));
            }
        }
    }

    #[test]
    fn test_vary_keeps_elite() {
        let codec = codec();
        let mut rng = StdRng::seed_from_u64(39);
        let driver = driver(EvolutionConfig {
            population_size: 6,
            elite_count: 2,
            ..Default::default()
        });

        let elite_genome = Genome::new(vec![0.123, 0.456]);
        let mut scored: Vec<(Genome, f64)> = (0..5)
            .map(|i| (Genome::random(codec.bounds(), &mut rng), 10.0 + i as f64))
            .collect();
        scored.push((elite_genome.clone(), 0.5));

        let next = driver.vary(&scored, &codec, &mut rng).unwrap();
        // Fittest individual survives unchanged
        assert_eq!(next[0], elite_genome);
    }

    #[test]
    fn test_convergence_check_logic() {
        let check = ConvergenceCheck::new(3, 0.01);
        // Not enough history yet
        assert!(!check.converged(&[5.0, 4.0]));
        // Still improving
        assert!(!check.converged(&[5.0, 4.0, 3.0, 2.0]));
        // Flat tail
        assert!(check.converged(&[5.0, 1.0, 1.0, 1.0]));
    }
}
