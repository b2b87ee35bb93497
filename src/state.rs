//! The "current pose" shared between the tracking side and the render loop.

use std::sync::{Arc, PoisonError, RwLock};

use crate::alignment::OverlayPose;

/// One published value of the cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    /// Number of publishes that led to this snapshot. Starts at 0 (nothing
    /// published yet).
    pub generation: u64,
    pub pose: Option<OverlayPose>,
}

/// Single-slot cell with publish-by-replacement semantics.
///
/// Writers swap in a whole new snapshot; readers clone the `Arc` they find.
/// A reader therefore sees either the previous snapshot or the new one, never
/// a mix of both. The lock is only held for the pointer swap.
#[derive(Debug)]
pub struct PoseCell {
    current: RwLock<Arc<PoseSnapshot>>,
}

impl PoseCell {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(PoseSnapshot {
                generation: 0,
                pose: None,
            })),
        }
    }

    /// Replace the current pose. `None` means no face is being tracked.
    pub fn publish(&self, pose: Option<OverlayPose>) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = PoseSnapshot {
            generation: current.generation + 1,
            pose,
        };
        *current = Arc::new(next);
    }

    pub fn latest(&self) -> Option<OverlayPose> {
        self.snapshot().pose
    }

    pub fn snapshot(&self) -> Arc<PoseSnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }
}

impl Default for PoseCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const POSE: OverlayPose = OverlayPose {
        x: 320.0,
        y: 240.0,
        width: 128.0,
    };

    #[test]
    fn starts_empty() {
        let cell = PoseCell::new();
        assert!(cell.latest().is_none());
        assert_eq!(cell.snapshot().generation, 0);
    }

    #[test]
    fn publish_replaces_and_counts() {
        let cell = PoseCell::new();
        cell.publish(Some(POSE));
        assert_eq!(cell.latest(), Some(POSE));
        assert_eq!(cell.snapshot().generation, 1);

        cell.publish(None);
        assert!(cell.latest().is_none());
        assert_eq!(cell.snapshot().generation, 2);
    }

    #[test]
    fn held_snapshot_is_not_mutated_by_later_publish() {
        let cell = PoseCell::new();
        cell.publish(Some(POSE));
        let held = cell.snapshot();

        cell.publish(None);
        assert_eq!(held.pose, Some(POSE));
        assert_eq!(held.generation, 1);
    }

    #[test]
    fn readers_never_see_partial_poses() {
        let cell = Arc::new(PoseCell::new());

        let writer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for i in 0..2_000 {
                    let v = i as f32;
                    let pose = (i % 3 != 0).then_some(OverlayPose {
                        x: v,
                        y: v,
                        width: v,
                    });
                    cell.publish(pose);
                }
            })
        };

        let mut last_generation = 0;
        for _ in 0..2_000 {
            let snapshot = cell.snapshot();
            assert!(snapshot.generation >= last_generation);
            last_generation = snapshot.generation;
            if let Some(pose) = snapshot.pose {
                assert_eq!(pose.x, pose.y);
                assert_eq!(pose.y, pose.width);
            }
        }

        writer.join().unwrap();
        assert_eq!(cell.snapshot().generation, 2_000);
    }
}
