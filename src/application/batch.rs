//! One neuron or many: fan a per-tree operation out over a collection.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{DomainError, DomainResult, TreeArena};

#[derive(Debug, Clone)]
pub enum Neurons {
    Single(TreeArena),
    Collection(Vec<TreeArena>),
}

/// An item that failed during a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub index: usize,
    pub skeleton_id: Option<i64>,
    pub error: DomainError,
}

/// Per-item outcome of a batch run. Successes keep their input index.
#[derive(Debug, Clone)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(usize, T)>,
    pub failed: Vec<BatchFailure>,
}

impl<T> BatchReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn collect(outcomes: Vec<(usize, Option<i64>, DomainResult<T>)>) -> Self {
        let mut report = Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        };
        for (index, skeleton_id, outcome) in outcomes {
            match outcome {
                Ok(value) => report.succeeded.push((index, value)),
                Err(error) => {
                    warn!("neuron {} ({:?}) failed: {}", index, skeleton_id, error);
                    report.failed.push(BatchFailure {
                        index,
                        skeleton_id,
                        error,
                    });
                }
            }
        }
        info!(
            "batch done: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}

impl From<TreeArena> for Neurons {
    fn from(tree: TreeArena) -> Self {
        Neurons::Single(tree)
    }
}

impl From<Vec<TreeArena>> for Neurons {
    fn from(trees: Vec<TreeArena>) -> Self {
        Neurons::Collection(trees)
    }
}

impl Neurons {
    pub fn len(&self) -> usize {
        match self {
            Neurons::Single(_) => 1,
            Neurons::Collection(trees) => trees.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn trees(&self) -> &[TreeArena] {
        match self {
            Neurons::Single(tree) => std::slice::from_ref(tree),
            Neurons::Collection(trees) => trees,
        }
    }

    fn trees_mut(&mut self) -> &mut [TreeArena] {
        match self {
            Neurons::Single(tree) => std::slice::from_mut(tree),
            Neurons::Collection(trees) => trees,
        }
    }

    pub fn into_vec(self) -> Vec<TreeArena> {
        match self {
            Neurons::Single(tree) => vec![tree],
            Neurons::Collection(trees) => trees,
        }
    }

    /// The one neuron, or `AmbiguousInput` for anything else.
    pub fn single(&self) -> DomainResult<&TreeArena> {
        match self.trees() {
            [tree] => Ok(tree),
            trees => Err(DomainError::AmbiguousInput(format!(
                "expected a single neuron, got {}",
                trees.len()
            ))),
        }
    }

    /// Apply `f` to a deep copy of every neuron; the copies are returned
    /// with the results and the input is left untouched.
    pub fn run<T, F>(&self, parallel: bool, f: F) -> BatchReport<(TreeArena, T)>
    where
        T: Send,
        F: Fn(&mut TreeArena) -> DomainResult<T> + Sync + Send,
    {
        let apply = |(index, tree): (usize, &TreeArena)| {
            let mut copy = tree.clone();
            let outcome = f(&mut copy).map(|value| (copy, value));
            (index, tree.skeleton_id, outcome)
        };
        let outcomes: Vec<_> = if parallel {
            self.trees().par_iter().enumerate().map(apply).collect()
        } else {
            self.trees().iter().enumerate().map(apply).collect()
        };
        BatchReport::collect(outcomes)
    }

    /// Apply `f` to every neuron in place.
    pub fn run_in_place<T, F>(&mut self, parallel: bool, f: F) -> BatchReport<T>
    where
        T: Send,
        F: Fn(&mut TreeArena) -> DomainResult<T> + Sync + Send,
    {
        let apply = |(index, tree): (usize, &mut TreeArena)| {
            let outcome = f(tree);
            (index, tree.skeleton_id, outcome)
        };
        let outcomes: Vec<_> = if parallel {
            self.trees_mut().par_iter_mut().enumerate().map(apply).collect()
        } else {
            self.trees_mut().iter_mut().enumerate().map(apply).collect()
        };
        BatchReport::collect(outcomes)
    }
}
