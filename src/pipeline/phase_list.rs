//! Ordered phase list.
//!
//! # Responsibilities
//! - Keep phases unique and in execution order
//! - Insert phases relative to already registered ones
//! - Remember how each phase was placed (used by merge)
//!
//! # Design Decisions
//! - `insert_before` places the phase immediately before its reference
//! - `insert_after` skips the run of phases already inserted after the same
//!   reference, so siblings keep their registration order
//! - Duplicates fail fast; callers wanting idempotency check `contains` first

use crate::pipeline::error::PipelineError;
use crate::pipeline::phase::{Phase, PhaseRelation};

#[derive(Debug, Clone)]
struct PhaseEntry {
    phase: Phase,
    relation: PhaseRelation,
}

/// Ordered sequence of unique phases.
#[derive(Debug, Clone, Default)]
pub struct PhaseList {
    entries: Vec<PhaseEntry>,
}

impl PhaseList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a list from phases in the given order.
    pub fn from_phases<I>(phases: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = Phase>,
    {
        let mut list = Self::new();
        for phase in phases {
            list.add_phase(phase)?;
        }
        Ok(list)
    }

    /// Append a phase at the end.
    pub fn add_phase(&mut self, phase: Phase) -> Result<(), PipelineError> {
        self.ensure_absent(&phase)?;
        self.entries.push(PhaseEntry {
            phase,
            relation: PhaseRelation::Last,
        });
        Ok(())
    }

    /// Insert `phase` immediately before `reference`.
    pub fn insert_before(&mut self, reference: &Phase, phase: Phase) -> Result<(), PipelineError> {
        self.ensure_absent(&phase)?;
        let index = self.require(reference)?;
        self.entries.insert(
            index,
            PhaseEntry {
                phase,
                relation: PhaseRelation::Before(reference.clone()),
            },
        );
        Ok(())
    }

    /// Insert `phase` after `reference` and after the phases previously
    /// inserted after it.
    pub fn insert_after(&mut self, reference: &Phase, phase: Phase) -> Result<(), PipelineError> {
        self.ensure_absent(&phase)?;
        let index = self.require(reference)?;

        let mut last_related = index;
        for (i, entry) in self.entries.iter().enumerate().skip(index + 1) {
            match &entry.relation {
                PhaseRelation::After(target) if target == reference => last_related = i,
                PhaseRelation::After(_) | PhaseRelation::Before(_) => continue,
                PhaseRelation::Last => break,
            }
        }

        self.entries.insert(
            last_related + 1,
            PhaseEntry {
                phase,
                relation: PhaseRelation::After(reference.clone()),
            },
        );
        Ok(())
    }

    pub fn contains(&self, phase: &Phase) -> bool {
        self.position(phase).is_some()
    }

    /// Index of `phase` in execution order.
    pub fn position(&self, phase: &Phase) -> Option<usize> {
        self.entries.iter().position(|e| &e.phase == phase)
    }

    pub fn relation_of(&self, phase: &Phase) -> Option<&PhaseRelation> {
        self.entries
            .iter()
            .find(|e| &e.phase == phase)
            .map(|e| &e.relation)
    }

    pub fn phases(&self) -> impl Iterator<Item = &Phase> + '_ {
        self.entries.iter().map(|e| &e.phase)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_absent(&self, phase: &Phase) -> Result<(), PipelineError> {
        if self.contains(phase) {
            return Err(PipelineError::DuplicatePhase {
                phase: phase.clone(),
            });
        }
        Ok(())
    }

    fn require(&self, reference: &Phase) -> Result<usize, PipelineError> {
        self.position(reference)
            .ok_or_else(|| PipelineError::PhaseNotFound {
                phase: reference.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &PhaseList) -> Vec<String> {
        list.phases().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_add_order_is_preserved() {
        let a = Phase::new("A");
        let b = Phase::new("B");
        let c = Phase::new("C");
        let list = PhaseList::from_phases([a, b, c]).unwrap();
        assert_eq!(names(&list), ["A", "B", "C"]);
    }

    #[test]
    fn test_insert_before() {
        let a = Phase::new("A");
        let b = Phase::new("B");
        let c = Phase::new("C");
        let mut list = PhaseList::from_phases([a, b.clone(), c]).unwrap();

        list.insert_before(&b, Phase::new("X")).unwrap();
        assert_eq!(names(&list), ["A", "X", "B", "C"]);

        // Always directly in front of the reference.
        list.insert_before(&b, Phase::new("Y")).unwrap();
        assert_eq!(names(&list), ["A", "X", "Y", "B", "C"]);
    }

    #[test]
    fn test_insert_after_keeps_sibling_order() {
        let a = Phase::new("A");
        let b = Phase::new("B");
        let mut list = PhaseList::from_phases([a.clone(), b]).unwrap();

        let x = Phase::new("X");
        list.insert_after(&a, x.clone()).unwrap();
        list.insert_after(&a, Phase::new("Y")).unwrap();
        assert_eq!(names(&list), ["A", "X", "Y", "B"]);

        // Nested insertion after X stays inside the run.
        list.insert_after(&x, Phase::new("X2")).unwrap();
        list.insert_after(&a, Phase::new("Z")).unwrap();
        assert_eq!(names(&list), ["A", "X", "X2", "Y", "Z", "B"]);
    }

    #[test]
    fn test_missing_reference() {
        let mut list = PhaseList::from_phases([Phase::new("A")]).unwrap();
        let ghost = Phase::new("Ghost");
        let err = list.insert_before(&ghost, Phase::new("X")).unwrap_err();
        assert!(matches!(err, PipelineError::PhaseNotFound { ref phase } if *phase == ghost));
        assert!(matches!(
            list.insert_after(&ghost, Phase::new("Y")),
            Err(PipelineError::PhaseNotFound { .. })
        ));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_duplicates_rejected() {
        let a = Phase::new("A");
        let b = Phase::new("B");
        let mut list = PhaseList::from_phases([a.clone(), b.clone()]).unwrap();

        assert!(matches!(list.add_phase(a.clone()), Err(PipelineError::DuplicatePhase { .. })));
        assert!(matches!(list.insert_before(&b, a.clone()), Err(PipelineError::DuplicatePhase { .. })));
        assert!(matches!(list.insert_after(&a, b), Err(PipelineError::DuplicatePhase { .. })));
        assert_eq!(names(&list), ["A", "B"]);
    }

    #[test]
    fn test_relations_recorded() {
        let a = Phase::new("A");
        let x = Phase::new("X");
        let mut list = PhaseList::from_phases([a.clone()]).unwrap();
        list.insert_before(&a, x.clone()).unwrap();
        assert_eq!(list.relation_of(&a), Some(&PhaseRelation::Last));
        assert_eq!(list.relation_of(&x), Some(&PhaseRelation::Before(a)));
    }
}
