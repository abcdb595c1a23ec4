/// Scheduler time base, in ticks.
///
/// Ticks wrap around; all comparisons are done on the wrapping difference.
pub type Ticks = u32;

/// Source of the current tick count, typically a SysTick-driven counter.
///
/// Clocks are shared with the scheduler, which may live in a `static`.
pub trait Clock: Sync {
    fn now(&self) -> Ticks;
}

impl<F> Clock for F
where
    F: Fn() -> Ticks + Sync,
{
    fn now(&self) -> Ticks {
        self()
    }
}

/// Returns `true` once at least `delay` ticks have passed since `since`.
pub(crate) fn elapsed(now: Ticks, since: Ticks, delay: Ticks) -> bool {
    now.wrapping_sub(since) >= delay
}
