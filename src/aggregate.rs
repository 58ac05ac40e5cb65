//! Aggregate module: reassemble per-partition results in index order.

use crate::error::{PoolError, Result};
use crate::invariant_ppt::{assert_invariant, AGGREGATE_LENGTH, AGGREGATE_ORDER};
use crate::partition::Partition;
use crate::worker::WorkResult;

/// Collects [`WorkResult`]s in arrival order and emits them in partition order.
#[derive(Debug)]
pub struct ResultAggregator {
    expected: Vec<Partition>,
    slots: Vec<Option<Vec<f64>>>,
    received: usize,
}

impl ResultAggregator {
    /// Create an aggregator for one partition plan.
    pub fn new(partitions: &[Partition]) -> Self {
        Self {
            expected: partitions.to_vec(),
            slots: vec![None; partitions.len()],
            received: 0,
        }
    }

    /// Store one result. Rejects unknown indices, duplicates and results of
    /// the wrong length.
    pub fn accept(&mut self, result: WorkResult) -> Result<()> {
        let partition = self.expected.get(result.index).copied().ok_or_else(|| {
            PoolError::aggregation(format!("unknown partition index {}", result.index))
        })?;
        if result.product.len() != partition.len() {
            return Err(PoolError::aggregation(format!(
                "partition {} returned {} values, expected {}",
                result.index,
                result.product.len(),
                partition.len()
            )));
        }
        let slot = &mut self.slots[result.index];
        if slot.is_some() {
            return Err(PoolError::aggregation(format!(
                "duplicate result for partition {}",
                result.index
            )));
        }
        *slot = Some(result.product);
        self.received += 1;
        Ok(())
    }

    /// Number of results still outstanding.
    pub fn pending(&self) -> usize {
        self.slots.len() - self.received
    }

    /// Lowest partition index without a result.
    pub fn first_missing(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }

    /// Concatenate all results ordered by partition index.
    pub fn finish(self) -> Result<Vec<f64>> {
        if !self.is_complete() {
            return Err(PoolError::aggregation(format!(
                "{} partition results missing",
                self.pending()
            )));
        }
        let total: usize = self.expected.iter().map(Partition::len).sum();
        let mut out = Vec::with_capacity(total);
        let mut offsets = Vec::with_capacity(self.expected.len());
        for product in self.slots.into_iter().flatten() {
            offsets.push(out.len());
            out.extend(product);
        }

        assert_invariant(
            AGGREGATE_ORDER,
            offsets.iter().zip(&self.expected).all(|(&o, p)| o == p.start),
            "each partition must land at its own start offset",
            None,
        );
        assert_invariant(
            AGGREGATE_LENGTH,
            out.len() == total,
            "aggregated length must equal input length",
            None,
        );
        Ok(out)
    }
}
