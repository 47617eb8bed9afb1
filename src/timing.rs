use std::time::Duration;

/// Fixed-duration waits the machine depends on: bus settle times and the
/// inter-instruction tick. Behind a trait so tests can run without
/// wall-clock cost.
pub trait Delay {
    fn pause(&mut self, d: Duration);
}

/// busy-waits via spin_sleep; OS sleep granularity is far too coarse for
/// microsecond settle times
pub struct SpinDelay;

impl Delay for SpinDelay {
    fn pause(&mut self, d: Duration) {
        spin_sleep::sleep(d);
    }
}

/// dummy Delay implementation for testing
pub struct NoDelay;

impl Delay for NoDelay {
    fn pause(&mut self, _d: Duration) {}
}
