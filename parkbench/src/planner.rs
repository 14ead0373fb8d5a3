//! Splits the expanded key stream into one batch per worker.
use rand::seq::SliceRandom;
use rand::Rng;
use std::num::NonZeroUsize;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, trace};

/// Ordered keys owned by a single worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBatch {
    worker: usize,
    keys: Vec<Arc<str>>,
}

impl KeyBatch {
    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn keys(&self) -> &[Arc<str>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl IntoIterator for KeyBatch {
    type Item = Arc<str>;
    type IntoIter = std::vec::IntoIter<Arc<str>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter()
    }
}

/// Plan `keys × repeat` requests over `concurrency` workers with a fresh shuffle per pass.
pub fn plan<S: AsRef<str>>(
    keys: &[S],
    repeat: NonZeroUsize,
    concurrency: NonZeroUsize,
) -> Vec<KeyBatch> {
    plan_with_rng(keys, repeat, concurrency, &mut rand::thread_rng())
}

pub fn plan_with_rng<S: AsRef<str>, R: Rng + ?Sized>(
    keys: &[S],
    repeat: NonZeroUsize,
    concurrency: NonZeroUsize,
    rng: &mut R,
) -> Vec<KeyBatch> {
    let mut pass: Vec<Arc<str>> = keys.iter().map(|k| Arc::from(k.as_ref())).collect();

    let mut stream = Vec::with_capacity(pass.len() * repeat.get());
    for _ in 0..repeat.get() {
        pass.shuffle(rng);
        stream.extend(pass.iter().cloned());
    }

    let sizes = batch_sizes(stream.len(), concurrency.get());
    debug!(
        "Planned {} requests over {} workers ({:?}..)",
        stream.len(),
        sizes.len(),
        sizes.first()
    );

    let mut stream = stream.into_iter();
    sizes
        .into_iter()
        .enumerate()
        .map(|(worker, size)| KeyBatch {
            worker,
            keys: stream.by_ref().take(size).collect(),
        })
        .collect()
}

/// ⌊total / workers⌋ per batch with the remainder on the last one. When there are fewer
/// requests than workers, each of the first `total` batches gets a single key.
fn batch_sizes(total: usize, workers: usize) -> Vec<usize> {
    let base = total / workers;
    if base == 0 {
        return (0..workers).map(|i| usize::from(i < total)).collect();
    }

    let mut sizes = vec![base; workers];
    if let Some(last) = sizes.last_mut() {
        *last += total % workers;
    }
    sizes
}
