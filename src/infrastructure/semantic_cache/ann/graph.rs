//! Cosine HNSW graph over caller-assigned ids

use hnsw_rs::filter::FilterT;
use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::*;

/// Layer cap used by hnsw_rs for its level sampling
const MAX_LAYER: usize = 16;

/// Expected population; sizes the level distribution, not a hard limit
const CAPACITY_HINT: usize = 100_000;

pub(super) struct CosineGraph {
    inner: Hnsw<'static, f32, DistCosine>,
}

impl CosineGraph {
    pub(super) fn new(max_connections: usize, ef_construction: usize) -> Self {
        let inner = Hnsw::<f32, DistCosine>::new(
            max_connections,
            CAPACITY_HINT,
            MAX_LAYER,
            ef_construction,
            DistCosine {},
        );

        Self { inner }
    }

    pub(super) fn insert(&self, embedding: &[f32], id: usize) {
        self.inner.insert_slice((embedding, id));
    }

    /// Ids of up to `k` approximate neighbours accepted by `keep`
    pub(super) fn search<F>(&self, query: &[f32], k: usize, ef_search: usize, keep: F) -> Vec<usize>
    where
        F: Fn(&usize) -> bool,
    {
        let filter: &dyn FilterT = &keep;

        self.inner
            .search_filter(query, k, ef_search.max(k), Some(filter))
            .into_iter()
            .map(|n| n.d_id)
            .collect()
    }

    /// Points held by the graph, retired ids included
    pub(super) fn len(&self) -> usize {
        self.inner.get_nb_point()
    }
}

impl std::fmt::Debug for CosineGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosineGraph")
            .field("points", &self.len())
            .finish()
    }
}
