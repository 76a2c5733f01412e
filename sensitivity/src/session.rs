use collective::Communicator;
use log::{info, warn};
use ndarray::Array2;
use tokio::task;

use crate::{
    BoundSide, EvalStats, Evaluator, Introspect, Layout, ProblemDescriptor, Result, RunConfig,
    SaltelliSampler, Sampler, SensitivityErr,
    dispatch::{collect, distribute, receive},
    evaluation::evaluate_chunk,
    persist::{self, Artifacts},
};

/// What the coordinator brings to a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub problem: ProblemDescriptor,
    /// One row per sample, one column per variable of `problem`.
    pub samples: Array2<f64>,
}

impl Plan {
    /// Builds the problem out of `model`'s inputs and samples it as `config` says.
    pub fn from_model<M>(model: &M, config: &RunConfig) -> Result<Self>
    where
        M: Introspect + ?Sized,
    {
        let summary = model.summary();
        let problem = ProblemDescriptor::from_model(model, &config.prefix, config.bounds)?;

        info!(
            genes = summary.genes,
            reactions = summary.reactions,
            metabolites = summary.metabolites,
            targets = problem.variable_count();
            "loaded model"
        );

        let mut sampler = SaltelliSampler::from_design(config.design, config.seed);
        let samples = sampler.sample(&problem, config.samples, config.second_order);
        info!(
            samples = samples.nrows(),
            second_order = config.second_order;
            "sampled problem with a {:?} design",
            config.design
        );

        Ok(Self { problem, samples })
    }
}

/// The coordinator's result of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub problem: ProblemDescriptor,
    /// One score per sample, in the same order as the sample matrix.
    pub results: Vec<f64>,
    /// The coordinator's own share of the evaluation.
    pub stats: EvalStats,
}

impl Outcome {
    /// Writes the problem and the scores to `artifacts`.
    ///
    /// Both writes are attempted even if the first one fails, the first error is the one
    /// returned. The outcome is left untouched so the caller can retry.
    pub async fn persist(&self, artifacts: &Artifacts) -> Result<()> {
        let problem = persist::write_problem(&artifacts.problem, &self.problem).await;
        let results = persist::write_results(&artifacts.results, &self.results).await;
        problem.and(results)
    }
}

/// A single partition / evaluate / gather run over a set of ranks.
pub struct Session<E> {
    evaluator: Option<E>,
    side: BoundSide,
}

impl<E> Session<E>
where
    E: Evaluator + Send + 'static,
{
    /// Creates a new `Session`.
    ///
    /// # Arguments
    /// * `evaluator` - This rank's model, every rank needs its own.
    /// * `side` - Which side of each input's range the samples override.
    pub fn new(evaluator: E, side: BoundSide) -> Self {
        Self {
            evaluator: Some(evaluator),
            side,
        }
    }

    /// The evaluator, with the overrides of the last row it scored.
    pub fn evaluator(&self) -> Option<&E> {
        self.evaluator.as_ref()
    }

    pub fn into_evaluator(self) -> Option<E> {
        self.evaluator
    }

    /// Runs the analysis on this rank.
    ///
    /// Every rank in `comm` must call this, only the coordinator brings a `plan`. The
    /// coordinator broadcasts the problem and the row layout, sends each member its
    /// block of samples, scores its own block, gathers every score in sample order and
    /// waits on a barrier with the rest.
    ///
    /// If a rank fails before the barrier it tells the others through `comm` so they
    /// don't wait on it forever.
    ///
    /// # Returns
    /// The outcome on the coordinator and `None` on members.
    pub async fn run<C>(&mut self, comm: &mut C, plan: Option<Plan>) -> Result<Option<Outcome>>
    where
        C: Communicator,
    {
        let rank = comm.rank();

        let plan = match (comm.is_coordinator(), plan) {
            (true, Some(plan)) => Some(plan),
            (false, None) => None,
            (true, None) => {
                let e = SensitivityErr::InvalidInput("the coordinator needs a plan".into());
                return Err(bail(comm, e).await);
            }
            (false, Some(_)) => {
                let e = SensitivityErr::InvalidInput(format!("rank {rank} can't bring a plan"));
                return Err(bail(comm, e).await);
            }
        };

        let (problem, layout, samples) = match plan {
            Some(Plan { problem, samples }) => match validate(&problem, &samples, comm.size()) {
                Ok(layout) => (Some(problem), Some(layout), Some(samples)),
                Err(e) => return Err(bail(comm, e).await),
            },
            None => (None, None, None),
        };

        let problem = comm.broadcast(problem).await?;
        let layout: Layout = comm.broadcast(layout).await?;

        if layout.workers() != comm.size() {
            let e = SensitivityErr::InvalidInput(format!(
                "the layout splits the rows among {} ranks but there are {}",
                layout.workers(),
                comm.size()
            ));
            return Err(bail(comm, e).await);
        }

        info!(
            rank = rank,
            vars = problem.variable_count(),
            rows = layout.count(rank);
            "joined run"
        );

        let chunk = match samples {
            Some(samples) => distribute(comm, samples, &layout).await?,
            None => match receive(comm, &layout, problem.variable_count()).await {
                Ok(chunk) => chunk,
                Err(e @ SensitivityErr::ChunkShape { .. }) => return Err(bail(comm, e).await),
                Err(e) => return Err(e),
            },
        };

        let (local, stats) = match self.evaluate(problem.names(), chunk).await {
            Ok(evaluated) => evaluated,
            Err(e) => return Err(bail(comm, e).await),
        };

        if stats.non_finite > 0 {
            warn!(rank = rank, non_finite = stats.non_finite; "some rows couldn't be evaluated");
        }
        info!(
            rank = rank,
            rows = stats.rows,
            secs = stats.elapsed.as_secs_f64();
            "evaluated chunk"
        );

        let results = match collect(comm, &local, &layout).await {
            Ok(results) => results,
            Err(e) => return Err(bail(comm, e).await),
        };
        comm.barrier().await?;

        Ok(results.map(|results| Outcome {
            problem,
            results,
            stats,
        }))
    }

    /// Scores `chunk` on the blocking pool.
    async fn evaluate(
        &mut self,
        names: &[String],
        chunk: Array2<f64>,
    ) -> Result<(Vec<f64>, EvalStats)> {
        let mut evaluator = self
            .evaluator
            .take()
            .ok_or_else(|| SensitivityErr::Evaluation("the evaluator was lost".into()))?;

        let names = names.to_vec();
        let side = self.side;

        let (evaluator, evaluated) = task::spawn_blocking(move || {
            let evaluated = evaluate_chunk(&mut evaluator, &names, side, chunk.view());
            (evaluator, evaluated)
        })
        .await
        .map_err(|e| SensitivityErr::Evaluation(e.to_string()))?;

        self.evaluator = Some(evaluator);
        evaluated
    }
}

/// Checks the coordinator's plan and splits its rows among `size` ranks.
fn validate(problem: &ProblemDescriptor, samples: &Array2<f64>, size: usize) -> Result<Layout> {
    if samples.ncols() != problem.variable_count() {
        return Err(SensitivityErr::InvalidInput(format!(
            "the samples have {} columns but the problem has {} variables",
            samples.ncols(),
            problem.variable_count()
        )));
    }

    Layout::new(samples.nrows(), size)
}

/// Tells the other ranks this one is giving up and hands back the reason.
async fn bail<C: Communicator>(comm: &mut C, e: SensitivityErr) -> SensitivityErr {
    if let Err(abort_err) = comm.abort(&e.to_string()).await {
        warn!(rank = comm.rank(); "failed to abort the run: {abort_err}");
    }

    e
}
