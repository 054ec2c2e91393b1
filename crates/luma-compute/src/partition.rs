//! Work partitioning for 2D kernel launches.
//!
//! Picks a square work-group whose side divides both image dimensions and
//! whose area fits the device work-group limit.

use std::fmt;

use crate::image::ImageExtent;
use crate::{ComputeError, ComputeResult};

/// How the work-group side is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    /// Scan sides upward from 2 and stop at the first one that does not
    /// divide both dimensions. A 6x6 group for 1920x1080 even though 8x8
    /// would also fit.
    #[default]
    Greedy,
    /// Largest side up to the ceiling that divides both dimensions.
    Exhaustive,
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greedy => f.write_str("greedy"),
            Self::Exhaustive => f.write_str("exhaustive"),
        }
    }
}

/// Global and local sizes of a 2D launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkPartition {
    /// Work-items per dimension (image width, height).
    pub global: [usize; 2],
    /// Work-group extent per dimension.
    pub local: [usize; 2],
}

impl WorkPartition {
    /// Compute the partition for `extent` on a device whose work-group
    /// limit is `max_work_group_size`.
    pub fn compute(
        extent: ImageExtent,
        max_work_group_size: usize,
        strategy: PartitionStrategy,
    ) -> ComputeResult<Self> {
        if max_work_group_size == 0 {
            return Err(ComputeError::NoValidPartition {
                width: extent.width(),
                height: extent.height(),
                max_work_group_size,
            });
        }

        let width = extent.width() as usize;
        let height = extent.height() as usize;
        let ceiling = max_work_group_size.isqrt();
        let divides_both = |side: usize| width % side == 0 && height % side == 0;

        let side = match strategy {
            PartitionStrategy::Greedy => {
                let mut best = 1;
                for side in 2..=ceiling {
                    if divides_both(side) {
                        best = side;
                    } else {
                        break;
                    }
                }
                best
            }
            PartitionStrategy::Exhaustive => {
                (2..=ceiling).rev().find(|&s| divides_both(s)).unwrap_or(1)
            }
        };

        Ok(Self {
            global: [width, height],
            local: [side, side],
        })
    }

    /// Work-items per group.
    pub fn group_size(&self) -> usize {
        self.local[0] * self.local[1]
    }

    /// Number of work-groups per dimension.
    pub fn group_count(&self) -> [usize; 2] {
        [self.global[0] / self.local[0], self.global[1] / self.local[1]]
    }

    /// Both hard constraints: divisibility and the group-size limit.
    pub fn is_valid_for(&self, max_work_group_size: usize) -> bool {
        self.local.iter().all(|&l| l > 0)
            && self.global[0] % self.local[0] == 0
            && self.global[1] % self.local[1] == 0
            && self.group_size() <= max_work_group_size
    }
}

impl fmt::Display for WorkPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "global {{{}, {}}} local {{{}, {}}}",
            self.global[0], self.global[1], self.local[0], self.local[1]
        )
    }
}
