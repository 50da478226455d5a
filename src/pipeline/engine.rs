//! Pipeline: phase list + interceptor registry.
//!
//! # Responsibilities
//! - Register phases and interceptors (setup time, `&mut self`)
//! - Freeze the flattened interceptor order into snapshots
//! - Execute snapshots over a subject and call context
//! - Merge pipelines declared by independent features
//!
//! # Design Decisions
//! - Build-then-freeze: registration needs `&mut self`, execution `&self`,
//!   so mutation can never race a running execution
//! - The flattened order is cached in an `ArcSwapOption` and dropped on
//!   every mutation (copy-on-write, no locks on the hot path)

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;
use crate::pipeline::interceptor::{FnInterceptor, Interceptor, SharedInterceptor};
use crate::pipeline::phase::{Phase, PhaseRelation};
use crate::pipeline::phase_list::PhaseList;
use crate::pipeline::registry::InterceptorRegistry;
use crate::pipeline::settings::PipelineSettings;
use crate::pipeline::snapshot::PipelineSnapshot;

type FlatSequence<S, C> = Vec<(Phase, SharedInterceptor<S, C>)>;

/// Phase-ordered interceptor chain over a subject `S` and call context `C`.
pub struct Pipeline<S, C = ()> {
    phases: PhaseList,
    registry: InterceptorRegistry<S, C>,
    settings: PipelineSettings,
    flattened: ArcSwapOption<FlatSequence<S, C>>,
}

impl<S, C> Pipeline<S, C>
where
    S: Send + 'static,
    C: Send + 'static,
{
    /// Create an empty pipeline.
    pub fn new(settings: PipelineSettings) -> Self {
        Self {
            phases: PhaseList::new(),
            registry: InterceptorRegistry::new(),
            settings,
            flattened: ArcSwapOption::empty(),
        }
    }

    /// Create a pipeline with the given phases in order.
    pub fn with_phases<I>(settings: PipelineSettings, phases: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = Phase>,
    {
        let mut pipeline = Self::new(settings);
        pipeline.phases = PhaseList::from_phases(phases)?;
        Ok(pipeline)
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// Append a phase.
    pub fn add_phase(&mut self, phase: Phase) -> Result<(), PipelineError> {
        tracing::debug!(phase = %phase, "Adding phase");
        self.phases.add_phase(phase)?;
        self.invalidate();
        Ok(())
    }

    /// Insert `phase` immediately before `reference`.
    pub fn insert_phase_before(&mut self, reference: &Phase, phase: Phase) -> Result<(), PipelineError> {
        tracing::debug!(phase = %phase, before = %reference, "Inserting phase");
        self.phases.insert_before(reference, phase)?;
        self.invalidate();
        Ok(())
    }

    /// Insert `phase` after `reference` (after earlier phases inserted after it).
    pub fn insert_phase_after(&mut self, reference: &Phase, phase: Phase) -> Result<(), PipelineError> {
        tracing::debug!(phase = %phase, after = %reference, "Inserting phase");
        self.phases.insert_after(reference, phase)?;
        self.invalidate();
        Ok(())
    }

    pub fn has_phase(&self, phase: &Phase) -> bool {
        self.phases.contains(phase)
    }

    /// Phases in execution order.
    pub fn phases(&self) -> impl Iterator<Item = &Phase> + '_ {
        self.phases.phases()
    }

    pub fn interceptor_count(&self) -> usize {
        self.registry.total()
    }

    /// True when no interceptor is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.total() == 0
    }

    /// Register a closure interceptor for `phase`.
    ///
    /// ```ignore
    /// pipeline.intercept(&phase, |ctx| Box::pin(async move {
    ///     ctx.subject_mut().push('!');
    ///     ctx.proceed().await
    /// }))?;
    /// ```
    pub fn intercept<F>(&mut self, phase: &Phase, f: F) -> Result<(), PipelineError>
    where
        F: for<'a> Fn(&'a mut PipelineContext<S, C>) -> BoxFuture<'a, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.intercept_with(phase, FnInterceptor::new(f))
    }

    /// Register an [`Interceptor`] implementation for `phase`.
    pub fn intercept_with<I>(&mut self, phase: &Phase, interceptor: I) -> Result<(), PipelineError>
    where
        I: Interceptor<S, C> + 'static,
    {
        self.intercept_shared(phase, Arc::new(interceptor))
    }

    /// Register an already shared interceptor for `phase`.
    pub fn intercept_shared(
        &mut self,
        phase: &Phase,
        interceptor: SharedInterceptor<S, C>,
    ) -> Result<(), PipelineError> {
        if !self.phases.contains(phase) {
            return Err(PipelineError::PhaseNotFound {
                phase: phase.clone(),
            });
        }
        self.registry.push(phase, interceptor);
        self.invalidate();
        tracing::debug!(
            phase = %phase,
            count = self.registry.interceptors_for(phase).len(),
            "Interceptor registered"
        );
        Ok(())
    }

    /// Freeze the current interceptor order.
    pub fn snapshot(&self) -> PipelineSnapshot<S, C> {
        let flattened = match self.flattened.load_full() {
            Some(flat) => flat,
            None => {
                let flat = Arc::new(self.registry.flatten(&self.phases));
                self.flattened.store(Some(flat.clone()));
                flat
            }
        };
        PipelineSnapshot::new(flattened, self.settings)
    }

    /// Run the pipeline over `subject` and return the final subject.
    pub async fn execute(&self, context: C, subject: S) -> Result<S, PipelineError> {
        self.snapshot().execute(context, subject).await
    }

    /// Like [`execute`](Self::execute), also handing the call context back.
    pub async fn execute_with_context(&self, context: C, subject: S) -> Result<(S, C), PipelineError> {
        self.snapshot().execute_with_context(context, subject).await
    }

    /// Like [`execute`](Self::execute), aborting when `token` is cancelled.
    pub async fn execute_cancellable(
        &self,
        context: C,
        subject: S,
        token: CancellationToken,
    ) -> Result<S, PipelineError> {
        self.snapshot()
            .execute_cancellable(context, subject, token)
            .await
    }

    /// Merge the phases and interceptors of `other` into this pipeline.
    ///
    /// Shared phases must be ordered the same way in both pipelines. Missing
    /// phases are placed by the relation they were declared with; interceptors
    /// of `other` run after this pipeline's own within each phase. On error
    /// nothing is modified.
    pub fn merge(&mut self, other: &Pipeline<S, C>) -> Result<(), PipelineError> {
        let shared: Vec<&Phase> = other.phases().filter(|p| self.phases.contains(p)).collect();
        for pair in shared.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if self.phases.position(first) > self.phases.position(second) {
                return Err(PipelineError::IncompatibleMerge {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
        }

        let other_order: Vec<&Phase> = other.phases().collect();
        let mut phases = self.phases.clone();
        let mut pending: Vec<usize> = (0..other_order.len())
            .filter(|&i| !phases.contains(other_order[i]))
            .collect();

        while !pending.is_empty() {
            let before = pending.len();
            let mut still_pending = Vec::new();

            for i in pending {
                let phase = other_order[i];
                let placed = match other.phases.relation_of(phase) {
                    Some(PhaseRelation::Before(reference)) if phases.contains(reference) => {
                        phases.insert_before(reference, phase.clone())?;
                        true
                    }
                    Some(PhaseRelation::After(reference)) if phases.contains(reference) => {
                        phases.insert_after(reference, phase.clone())?;
                        true
                    }
                    Some(PhaseRelation::Before(_)) | Some(PhaseRelation::After(_)) => false,
                    _ => {
                        let anchor = other_order[i + 1..].iter().find(|p| phases.contains(p));
                        match anchor {
                            Some(anchor) => phases.insert_before(anchor, phase.clone())?,
                            None => phases.add_phase(phase.clone())?,
                        }
                        true
                    }
                };
                if !placed {
                    still_pending.push(i);
                }
            }

            if still_pending.len() == before {
                let phase = other_order[still_pending[0]].clone();
                return Err(PipelineError::PhaseNotFound { phase });
            }
            pending = still_pending;
        }

        let mut registry = self.registry.clone();
        for phase in other.phases() {
            for interceptor in other.registry.interceptors_for(phase) {
                registry.push(phase, interceptor.clone());
            }
        }

        tracing::debug!(
            phases = phases.len(),
            interceptors = registry.total(),
            "Pipelines merged"
        );
        self.phases = phases;
        self.registry = registry;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        self.flattened.store(None);
    }
}

// Manual impl: interceptors are shared handles, S and C need not be Clone.
impl<S, C> Clone for Pipeline<S, C> {
    fn clone(&self) -> Self {
        Self {
            phases: self.phases.clone(),
            registry: self.registry.clone(),
            settings: self.settings,
            flattened: ArcSwapOption::new(self.flattened.load_full()),
        }
    }
}

impl<S, C> fmt::Debug for Pipeline<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("phases", &self.phases.phases().map(Phase::name).collect::<Vec<_>>())
            .field("interceptors", &self.registry.total())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn names(pipeline: &Pipeline<String>) -> Vec<String> {
        pipeline.phases().map(|p| p.name().to_string()).collect()
    }

    fn record(pipeline: &mut Pipeline<String>, phase: &Phase, log: &Log, label: &'static str) {
        let log = log.clone();
        pipeline
            .intercept(phase, move |ctx| {
                let log = log.clone();
                Box::pin(async move {
                    log.lock().unwrap().push(label.to_string());
                    ctx.proceed().await
                })
            })
            .unwrap();
    }

    #[test]
    fn test_intercept_requires_registered_phase() {
        let mut pipeline: Pipeline<String> = Pipeline::new(PipelineSettings::default());
        let ghost = Phase::new("Ghost");
        let err = pipeline
            .intercept(&ghost, |ctx| Box::pin(async move { ctx.proceed().await }))
            .unwrap_err();
        assert!(matches!(err, PipelineError::PhaseNotFound { .. }));
        assert!(pipeline.is_empty());
    }

    #[test]
    fn test_snapshot_is_cached_and_invalidated() {
        let a = Phase::new("A");
        let mut pipeline: Pipeline<String> =
            Pipeline::with_phases(PipelineSettings::default(), [a.clone()]).unwrap();
        let log: Log = Arc::default();
        record(&mut pipeline, &a, &log, "a1");

        let first = pipeline.snapshot();
        let second = pipeline.snapshot();
        assert!(Arc::ptr_eq(&first.interceptors_arc(), &second.interceptors_arc()));

        record(&mut pipeline, &a, &log, "a2");
        let third = pipeline.snapshot();
        assert_eq!(first.len(), 1);
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_registration() {
        let a = Phase::new("A");
        let mut pipeline: Pipeline<String> =
            Pipeline::with_phases(PipelineSettings::default(), [a.clone()]).unwrap();
        let log: Log = Arc::default();
        record(&mut pipeline, &a, &log, "a1");

        let in_flight = pipeline.snapshot();
        record(&mut pipeline, &a, &log, "a2");

        in_flight.execute((), "x".into()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["a1"]);

        log.lock().unwrap().clear();
        pipeline.execute((), "x".into()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_later_phase_insert_moves_whole_phase() {
        let a = Phase::new("A");
        let b = Phase::new("B");
        let mut pipeline: Pipeline<String> =
            Pipeline::with_phases(PipelineSettings::default(), [a.clone(), b.clone()]).unwrap();
        let log: Log = Arc::default();
        record(&mut pipeline, &b, &log, "b1");
        record(&mut pipeline, &a, &log, "a1");

        let x = Phase::new("X");
        pipeline.insert_phase_before(&a, x.clone()).unwrap();
        record(&mut pipeline, &x, &log, "x1");
        record(&mut pipeline, &b, &log, "b2");

        pipeline.execute((), String::new()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), ["x1", "a1", "b1", "b2"]);
    }

    #[tokio::test]
    async fn test_merge_places_missing_phases_and_appends_interceptors() {
        let settings = PipelineSettings::default();
        let a = Phase::new("A");
        let b = Phase::new("B");
        let c = Phase::new("C");
        let log: Log = Arc::default();

        let mut base: Pipeline<String> = Pipeline::with_phases(settings, [a.clone(), c.clone()]).unwrap();
        record(&mut base, &a, &log, "base-a");

        let mut feature: Pipeline<String> = Pipeline::with_phases(settings, [a.clone(), c.clone()]).unwrap();
        feature.insert_phase_after(&a, b.clone()).unwrap();
        let tail = Phase::new("Tail");
        feature.add_phase(tail.clone()).unwrap();
        record(&mut feature, &a, &log, "feature-a");
        record(&mut feature, &b, &log, "feature-b");
        record(&mut feature, &tail, &log, "feature-tail");

        base.merge(&feature).unwrap();
        assert_eq!(names(&base), ["A", "B", "C", "Tail"]);
        assert_eq!(base.interceptor_count(), 4);

        base.execute((), String::new()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["base-a", "feature-a", "feature-b", "feature-tail"]
        );
    }

    #[test]
    fn test_merge_last_phase_keeps_other_ordering() {
        let settings = PipelineSettings::default();
        let a = Phase::new("A");
        let b = Phase::new("B");
        let c = Phase::new("C");
        let x = Phase::new("X");

        let mut base: Pipeline<String> =
            Pipeline::with_phases(settings, [a.clone(), b.clone(), c.clone()]).unwrap();
        let other: Pipeline<String> = Pipeline::with_phases(settings, [a, x, c]).unwrap();

        base.merge(&other).unwrap();
        assert_eq!(names(&base), ["A", "B", "X", "C"]);
    }

    #[test]
    fn test_merge_rejects_contradicting_order() {
        let settings = PipelineSettings::default();
        let a = Phase::new("A");
        let b = Phase::new("B");
        let mut base: Pipeline<String> = Pipeline::with_phases(settings, [a.clone(), b.clone()]).unwrap();
        let other: Pipeline<String> =
            Pipeline::with_phases(settings, [b.clone(), a.clone(), Phase::new("Z")]).unwrap();

        let err = base.merge(&other).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::IncompatibleMerge { ref first, ref second } if *first == b && *second == a
        ));
        assert_eq!(names(&base), ["A", "B"]);
    }

    #[test]
    fn test_merge_into_empty_pipeline() {
        let settings = PipelineSettings::default();
        let a = Phase::new("A");
        let b = Phase::new("B");
        let mut other: Pipeline<String> = Pipeline::with_phases(settings, [b.clone()]).unwrap();
        other.insert_phase_before(&b, a).unwrap();

        let mut base: Pipeline<String> = Pipeline::new(settings);
        base.merge(&other).unwrap();
        assert_eq!(names(&base), ["A", "B"]);
    }
}
