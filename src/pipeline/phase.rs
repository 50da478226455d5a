//! Phase identity.
//!
//! # Design Decisions
//! - Identity is a process-unique discriminator, not the name; two phases
//!   named "Transform" in different pipelines never collide
//! - Cloning is cheap (shared name)

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PHASE_ID: AtomicU64 = AtomicU64::new(1);

/// A named stage of a pipeline.
#[derive(Clone)]
pub struct Phase {
    name: Arc<str>,
    id: u64,
}

impl Phase {
    /// Create a new phase with a fresh identity.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            id: NEXT_PHASE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process-unique discriminator.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl PartialEq for Phase {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Phase {}

impl Hash for Phase {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Phase({}#{})", self.name, self.id)
    }
}

/// How a phase was placed into a phase list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseRelation {
    /// Appended at the end.
    Last,
    /// Inserted before another phase.
    Before(Phase),
    /// Inserted after another phase.
    After(Phase),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_same_name_distinct_identity() {
        let a = Phase::new("Transform");
        let b = Phase::new("Transform");
        assert_ne!(a, b);
        assert_eq!(a.name(), b.name());
        assert_eq!(a, a.clone());

        let set: HashSet<Phase> = [a.clone(), b, a].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_uses_name() {
        let phase = Phase::new("Render");
        assert_eq!(phase.to_string(), "Render");
        assert!(format!("{:?}", phase).starts_with("Phase(Render#"));
    }
}
