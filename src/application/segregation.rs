//! Segregation index: how cleanly inputs and outputs separate between the
//! fragments of a split neuron.

use std::collections::HashSet;

use tracing::{debug, instrument, warn, Span};

use crate::application::batch::Neurons;
use crate::application::cable::downsample;
use crate::application::split::{find_cut_point, split_at, SplitOptions};
use crate::domain::{DomainError, DomainResult, TreeArena};

#[derive(Debug, Clone, PartialEq)]
pub struct SegregationOptions {
    pub split: SplitOptions,
    /// Downsampling factor applied to the copy before splitting (1 = off)
    pub downsample: usize,
}

impl Default for SegregationOptions {
    fn default() -> Self {
        Self {
            split: SplitOptions::default(),
            downsample: 5,
        }
    }
}

/// Binary entropy of the postsynaptic fraction `p`, zero at 0 and 1.
pub fn entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -(p * p.ln() + (1.0 - p) * (1.0 - p).ln())
}

/// `H = 1 - S_avg / S_norm` over already split fragments.
///
/// Fragments without connectors do not contribute. The result is not
/// clamped; a value outside [0, 1] is logged as a warning.
#[instrument(level = "debug", skip_all, fields(n = tracing::field::Empty))]
pub fn segregation_index<'a>(fragments: impl IntoIterator<Item = &'a TreeArena>) -> DomainResult<f64> {
    let fragments: Vec<&TreeArena> = fragments.into_iter().collect();
    Span::current().record("n", fragments.len());
    if fragments.len() < 2 {
        return Err(DomainError::AmbiguousInput(format!(
            "segregation needs at least 2 fragments, got {}",
            fragments.len()
        )));
    }

    let mut weighted = 0.0;
    let mut total = 0usize;
    let mut total_post = 0usize;
    for fragment in fragments {
        let n = fragment.n_connectors();
        if n == 0 {
            warn!("fragment {:?} has no connectors, skipping", fragment.name);
            continue;
        }
        let post = fragment.n_postsynapses();
        weighted += entropy(post as f64 / n as f64) * n as f64;
        total += n;
        total_post += post;
    }
    if total == 0 {
        return Err(DomainError::MissingAnnotation(
            "no fragment carries connectors".to_string(),
        ));
    }

    let p_norm = total_post as f64 / total as f64;
    if p_norm == 0.0 || p_norm == 1.0 {
        debug!("connectors are all of one kind, index is 0");
        return Ok(0.0);
    }
    let s_avg = weighted / total as f64;
    let index = 1.0 - s_avg / entropy(p_norm);
    if !(0.0..=1.0).contains(&index) {
        warn!("segregation index {} outside [0, 1]", index);
    }
    Ok(index)
}

/// Split a copy of `tree` and compute the index of its two halves.
#[instrument(level = "debug", skip(tree, opts), fields(skeleton_id = ?tree.skeleton_id))]
pub fn tree_segregation(tree: &TreeArena, opts: &SegregationOptions) -> DomainResult<f64> {
    let mut copy = tree.clone();
    let cut = find_cut_point(&mut copy, &opts.split)?;
    downsample(&mut copy, opts.downsample, &HashSet::from([cut]))?;
    let split = split_at(&copy, cut, false)?;
    segregation_index([&split.axon, &split.dendrite])
}

/// Index of one neuron (split internally) or of a collection of fragments.
pub fn segregation(neurons: &Neurons, opts: &SegregationOptions) -> DomainResult<f64> {
    match neurons {
        Neurons::Single(tree) => tree_segregation(tree, opts),
        Neurons::Collection(fragments) => segregation_index(fragments),
    }
}
