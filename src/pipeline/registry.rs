//! Per-phase interceptor storage.

use std::collections::HashMap;

use crate::pipeline::interceptor::SharedInterceptor;
use crate::pipeline::phase::Phase;
use crate::pipeline::phase_list::PhaseList;

/// Maps each phase to its interceptors in registration order.
pub struct InterceptorRegistry<S, C> {
    by_phase: HashMap<Phase, Vec<SharedInterceptor<S, C>>>,
}

impl<S, C> InterceptorRegistry<S, C> {
    pub fn new() -> Self {
        Self {
            by_phase: HashMap::new(),
        }
    }

    /// Append an interceptor to a phase. The caller checks phase membership.
    pub fn push(&mut self, phase: &Phase, interceptor: SharedInterceptor<S, C>) {
        self.by_phase.entry(phase.clone()).or_default().push(interceptor);
    }

    pub fn interceptors_for(&self, phase: &Phase) -> &[SharedInterceptor<S, C>] {
        self.by_phase.get(phase).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of registered interceptors.
    pub fn total(&self) -> usize {
        self.by_phase.values().map(Vec::len).sum()
    }

    /// Interceptors in execution order, paired with their phase.
    pub fn flatten(&self, phases: &PhaseList) -> Vec<(Phase, SharedInterceptor<S, C>)> {
        let mut flat = Vec::with_capacity(self.total());
        for phase in phases.phases() {
            for interceptor in self.interceptors_for(phase) {
                flat.push((phase.clone(), interceptor.clone()));
            }
        }
        flat
    }
}

impl<S, C> Default for InterceptorRegistry<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impl: interceptors are shared handles, S and C need not be Clone.
impl<S, C> Clone for InterceptorRegistry<S, C> {
    fn clone(&self) -> Self {
        Self {
            by_phase: self.by_phase.clone(),
        }
    }
}
