use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Bounded count of committed frames the GPU has not finished.
///
/// Permits are taken on the render thread and returned from completion
/// handlers, which may run on any thread.
#[derive(Debug, Clone)]
pub struct InFlightGate {
    depth: usize,
    in_flight: Arc<AtomicUsize>,
}

/// One frame's slot in the gate. Returned to the gate on drop.
#[derive(Debug)]
pub struct FramePermit {
    in_flight: Arc<AtomicUsize>,
}

impl InFlightGate {
    /// `depth` is clamped to at least 1.
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Frames committed but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Takes a permit if fewer than `depth` frames are in flight.
    pub fn try_acquire(&self) -> Option<FramePermit> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.depth).then_some(n + 1)
            })
            .ok()
            .map(|_| FramePermit {
                in_flight: Arc::clone(&self.in_flight),
            })
    }
}

impl Drop for FramePermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_are_bounded_by_depth() {
        let gate = InFlightGate::new(2);
        let a = gate.try_acquire();
        let b = gate.try_acquire();
        assert!(a.is_some() && b.is_some());
        assert!(gate.try_acquire().is_none());
        assert_eq!(gate.in_flight(), 2);

        drop(a);
        assert_eq!(gate.in_flight(), 1);
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn zero_depth_still_admits_one_frame() {
        let gate = InFlightGate::new(0);
        assert_eq!(gate.depth(), 1);
        let permit = gate.try_acquire();
        assert!(permit.is_some());
        assert!(gate.try_acquire().is_none());
    }

    #[test]
    fn permit_released_from_another_thread() {
        let gate = InFlightGate::new(1);
        let permit = gate.try_acquire();
        assert!(!gate.is_idle());

        std::thread::spawn(move || drop(permit))
            .join()
            .unwrap();

        assert!(gate.is_idle());
    }
}
