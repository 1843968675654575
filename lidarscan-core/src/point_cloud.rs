//! Capacity-bounded point cloud accumulator
//!
//! The cloud never evicts: once `capacity` points have been accepted every
//! further append is rejected. Progress is measured against a separate soft
//! `target_count` so it saturates at 1.0 before the buffer is physically full.

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::sync::Arc;

/// Default hard cap on the number of stored points
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default number of points at which progress reaches 1.0
pub const DEFAULT_TARGET_COUNT: usize = 5_000;

/// Hard capacity and soft progress target of a [`PointCloud`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudLimits {
    pub capacity: usize,
    pub target_count: usize,
}

impl CloudLimits {
    /// Create validated limits
    pub fn new(capacity: usize, target_count: usize) -> Result<Self> {
        let limits = Self { capacity, target_count };
        limits.validate()?;
        Ok(limits)
    }

    /// Check that both values are positive and the target fits in the buffer
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::InvalidData("capacity must be positive".to_string()));
        }
        if self.target_count == 0 {
            return Err(Error::InvalidData("target_count must be positive".to_string()));
        }
        if self.target_count > self.capacity {
            return Err(Error::InvalidData(format!(
                "target_count {} exceeds capacity {}",
                self.target_count, self.capacity
            )));
        }
        Ok(())
    }
}

impl Default for CloudLimits {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            target_count: DEFAULT_TARGET_COUNT,
        }
    }
}

/// Outcome of [`PointCloud::append`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Accepted,
    /// The cloud is at capacity; the point was dropped
    Rejected,
}

impl AppendOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, AppendOutcome::Accepted)
    }
}

/// An ordered, append-only, capacity-bounded collection of [`ScanPoint`]s
#[derive(Debug, Clone)]
pub struct PointCloud {
    points: Vec<ScanPoint>,
    limits: CloudLimits,
}

impl PointCloud {
    /// Create an empty cloud with default limits
    pub fn new() -> Self {
        Self::with_limits(CloudLimits::default())
    }

    /// Create an empty cloud with the given limits.
    ///
    /// Limits are expected to be validated; zero values are bumped to 1 so the
    /// progress ratio stays defined.
    pub fn with_limits(limits: CloudLimits) -> Self {
        let limits = CloudLimits {
            capacity: limits.capacity.max(1),
            target_count: limits.target_count.max(1),
        };
        Self {
            points: Vec::with_capacity(limits.capacity.min(DEFAULT_CAPACITY)),
            limits,
        }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check if no further points will be accepted
    pub fn is_full(&self) -> bool {
        self.points.len() >= self.limits.capacity
    }

    pub fn capacity(&self) -> usize {
        self.limits.capacity
    }

    pub fn limits(&self) -> CloudLimits {
        self.limits
    }

    /// Append a point unless the cloud is at capacity
    pub fn append(&mut self, point: ScanPoint) -> AppendOutcome {
        if self.is_full() {
            return AppendOutcome::Rejected;
        }
        self.points.push(point);
        AppendOutcome::Accepted
    }

    /// Append points in order until the cloud fills up.
    ///
    /// Returns the number of accepted points. The iterator is not drained past
    /// the point where the cloud became full.
    pub fn append_all<I: IntoIterator<Item = ScanPoint>>(&mut self, points: I) -> usize {
        let mut accepted = 0;
        for point in points {
            if !self.append(point).is_accepted() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Fraction of the soft target reached, saturating at 1.0
    pub fn progress(&self) -> f32 {
        (self.points.len() as f32 / self.limits.target_count as f32).min(1.0)
    }

    /// Remove all points; limits are kept
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, ScanPoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[ScanPoint] {
        &self.points
    }

    /// Copy the current contents into an immutable, shareable view.
    ///
    /// The snapshot does not alias the cloud, so capture may continue while
    /// another thread reads it.
    pub fn snapshot(&self) -> CloudSnapshot {
        CloudSnapshot {
            points: Arc::from(self.points.as_slice()),
        }
    }

    /// Mean confidence of the stored points, 0 when empty
    pub fn mean_confidence(&self) -> f32 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|p| p.confidence).sum::<f32>() / self.points.len() as f32
    }
}

impl Default for PointCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for PointCloud {
    type Output = ScanPoint;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a ScanPoint;
    type IntoIter = std::slice::Iter<'a, ScanPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Immutable copy of a [`PointCloud`]'s points, cheap to clone and send
#[derive(Debug, Clone, PartialEq)]
pub struct CloudSnapshot {
    points: Arc<[ScanPoint]>,
}

impl CloudSnapshot {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScanPoint> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[ScanPoint] {
        &self.points
    }

    /// Positions only, in insertion order
    pub fn positions(&self) -> Vec<Point3f> {
        self.points.iter().map(|p| p.position).collect()
    }
}

impl Default for CloudSnapshot {
    fn default() -> Self {
        Self::from(Vec::new())
    }
}

impl From<Vec<ScanPoint>> for CloudSnapshot {
    fn from(points: Vec<ScanPoint>) -> Self {
        Self { points: Arc::from(points) }
    }
}

impl<'a> IntoIterator for &'a CloudSnapshot {
    type Item = &'a ScanPoint;
    type IntoIter = std::slice::Iter<'a, ScanPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
