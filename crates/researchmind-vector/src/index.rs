use researchmind_core::{Error, Result};

/// Exact nearest-neighbour index over row-major `f32` vectors.
///
/// Append-only; position `i` is the `i`-th vector ever added.
#[derive(Debug, Clone)]
pub struct DenseIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl DenseIndex {
    pub fn new(dimension: usize) -> Self { Self { dimension, data: Vec::new() } }

    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(Error::Persistence(format!("{} values do not form rows of width {}", data.len(), dimension)));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize { self.dimension }
    pub fn len(&self) -> usize { self.data.len() / self.dimension.max(1) }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
    pub(crate) fn raw(&self) -> &[f32] { &self.data }

    /// Rejects the whole batch if any vector has the wrong width.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::InvalidInput(format!("vector width {} != index dimension {}", bad.len(), self.dimension)));
        }
        self.data.reserve(vectors.len() * self.dimension);
        for v in vectors { self.data.extend_from_slice(v); }
        Ok(())
    }

    /// Up to `k` `(position, squared_l2_distance)` pairs, nearest first;
    /// equal distances keep position order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!("query width {} != index dimension {}", query.len(), self.dimension)));
        }
        if k == 0 || self.is_empty() { return Ok(Vec::new()); }
        let mut hits: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(pos, row)| (pos, squared_l2(row, query)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn clear(&mut self) { self.data.clear(); }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Maps a distance onto `(0, 1]`, decreasing as the distance grows.
pub fn similarity(distance: f32) -> f32 { 1.0 / (1.0 + distance.max(0.0)) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_orders_by_distance_then_position() {
        let mut idx = DenseIndex::new(2);
        idx.add(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0], vec![3.0, 3.0]]).unwrap();
        let hits = idx.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 2, 1]);
        assert_eq!(hits[0].1, 0.0);
        assert_eq!(hits[2].1, 2.0);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = DenseIndex::new(3);
        assert!(idx.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty());
    }

    #[test]
    fn wrong_width_batch_is_rejected_whole() {
        let mut idx = DenseIndex::new(2);
        assert!(idx.add(&[vec![1.0, 0.0], vec![1.0]]).is_err());
        assert!(idx.is_empty());
    }

    #[test]
    fn similarity_is_bounded() {
        assert_eq!(similarity(0.0), 1.0);
        assert!(similarity(3.0) > 0.0 && similarity(3.0) < similarity(1.0));
    }
}
