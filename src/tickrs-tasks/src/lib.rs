//! Tick-driven cooperative task scheduler.
//!
//! A [`Scheduler`] owns a fixed number of task slots. The main loop calls
//! [`Scheduler::tick`] over and over; every tick sweeps the used tasks from
//! the most recently created to the oldest and runs each one that is due:
//!
//! - [`Signal::Ok`] tasks run once their `delay` has elapsed since their last run,
//! - [`Signal::Pending`] tasks run on the next tick regardless of their delay,
//! - [`Signal::Sleep`] tasks do not run until woken,
//! - [`Signal::Stop`] tasks run so they can clean up and report [`Signal::Dead`].
//!
//! There is no preemption and no per-task stack. Interrupt handlers interact
//! with tasks only through [`TaskHandle::wake`].
//!
//! ```
//! use tickrs_tasks::{Scheduler, TaskContext, TickResult};
//!
//! let clock = || 0u32;
//! let scheduler: Scheduler<'_, 4> = Scheduler::new(&clock);
//!
//! let blink = |ctx: &mut TaskContext<'_>| {
//!     if ctx.is_stopping() {
//!         ctx.die();
//!     }
//! };
//! scheduler.create("blink", &blink, 10).unwrap();
//!
//! scheduler.finalize();
//! assert_eq!(scheduler.tick(), TickResult::Stopped);
//! ```

#![cfg_attr(not(test), no_std)]
// Task ids only ever come out of the slot list, which never hands out ids >= N.
#![allow(clippy::indexing_slicing)]

mod clock;
mod signal;
mod task;

pub use clock::{Clock, Ticks};
pub use signal::{GlobalSignal, Signal};
pub use task::{Task, TaskContext, TaskHandle};

use critical_section::CriticalSection;
use signal::SignalCell;
use slotlist::{ListId, SlotList};
use tickrs_debug::log::{debug, info, warn};
use tickrs_utils::Shared;

/// Index of a task slot.
pub type TaskId = slotlist::SlotId;

/// Default number of task slots, `TICKRS_TASKS_NUMOF` at build time.
pub const TASKS_NUMOF: usize = tickrs_utils::usize_from_env_or!("TICKRS_TASKS_NUMOF", 8, below 255);

const USED: ListId = 0;
const FREE: ListId = 1;

/// Outcome of one [`Scheduler::tick`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickResult {
    /// Normal operation.
    Working,
    /// Shutdown was requested and some tasks have not finished cleaning up.
    Destroying,
    /// Shutdown was requested and every task is gone.
    Stopped,
}

impl TickResult {
    fn from_state(global: GlobalSignal, used: usize) -> Self {
        match (global, used) {
            (GlobalSignal::Stop, 0) => Self::Stopped,
            (GlobalSignal::Stop, _) => Self::Destroying,
            (GlobalSignal::Ok, _) => Self::Working,
        }
    }
}

/// A scheduler error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Every task slot is in use.
    NoSlot,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoSlot => write!(f, "no free task slot"),
        }
    }
}

struct Slot<'a> {
    name: &'static str,
    task: Option<&'a dyn Task>,
    delay: Ticks,
    last_check: Ticks,
}

impl<'a> Slot<'a> {
    const EMPTY: Slot<'a> = Slot {
        name: "",
        task: None,
        delay: 0,
        last_check: 0,
    };
}

struct Tasks<'a, const N: usize> {
    slots: [Slot<'a>; N],
    /// `USED` and `FREE` partition all slots.
    lists: SlotList<2, N>,
    global: GlobalSignal,
    /// Set while a tick is sweeping, so a wakeup cannot start a nested sweep.
    ticking: bool,
}

enum Step<'a> {
    Skip,
    Run(&'a dyn Task, &'static str),
}

/// Fixed-capacity cooperative scheduler with `N` task slots.
///
/// The scheduler is `Sync` and [`Scheduler::new`] is `const`, so it can live
/// in a `static` shared with interrupt handlers.
pub struct Scheduler<'a, const N: usize = TASKS_NUMOF> {
    clock: &'a dyn Clock,
    /// Kept outside of `tasks` so interrupt handlers can wake tasks through a
    /// [`TaskHandle`] without touching the task table.
    signals: [SignalCell; N],
    tasks: Shared<Tasks<'a, N>>,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    pub const fn new(clock: &'a dyn Clock) -> Self {
        Self {
            clock,
            signals: [const { SignalCell::new() }; N],
            tasks: Shared::new(Tasks {
                slots: [const { Slot::EMPTY }; N],
                lists: SlotList::new_filled(FREE),
                global: GlobalSignal::Ok,
                ticking: false,
            }),
        }
    }

    /// Creates a task that first runs once `delay` ticks have passed.
    ///
    /// Fails with [`Error::NoSlot`] when all `N` slots are in use.
    pub fn create(
        &self,
        name: &'static str,
        task: &'a dyn Task,
        delay: Ticks,
    ) -> Result<TaskHandle<'_>, Error> {
        self.create_with_signal(name, task, delay, Signal::Ok)
    }

    /// Creates a task in [`Signal::Sleep`]: it only runs after being woken.
    pub fn create_sleeping(
        &self,
        name: &'static str,
        task: &'a dyn Task,
        delay: Ticks,
    ) -> Result<TaskHandle<'_>, Error> {
        self.create_with_signal(name, task, delay, Signal::Sleep)
    }

    fn create_with_signal(
        &self,
        name: &'static str,
        task: &'a dyn Task,
        delay: Ticks,
        signal: Signal,
    ) -> Result<TaskHandle<'_>, Error> {
        let now = self.clock.now();
        let id = critical_section::with(|cs| {
            self.tasks.with_mut_cs(cs, |mut tasks| {
                let id = tasks.lists.pop_front(FREE)?;
                tasks.slots[id as usize] = Slot {
                    name,
                    task: Some(task),
                    delay,
                    last_check: now,
                };
                tasks.lists.push_back(USED, id);
                self.signals[id as usize].set_cs(cs, signal);
                Some(id)
            })
        });

        match id {
            Some(id) => {
                debug!("tasks: created {} as {}", name, id);
                Ok(self.handle_unchecked(id))
            }
            None => {
                warn!("tasks: no free slot for {}", name);
                Err(Error::NoSlot)
            }
        }
    }

    /// Asks task `id` to terminate.
    ///
    /// The task is not removed here: it runs once more with [`Signal::Stop`]
    /// and is freed when it reports [`Signal::Dead`].
    /// That last run happens on the next tick, whatever the task's delay.
    pub fn destroy(&self, id: TaskId) {
        if let Some(handle) = self.handle(id) {
            handle.destroy();
        }
    }

    /// Makes task `id` run on the next tick. Returns `false` if there is no
    /// such task or it is stopping.
    pub fn wake(&self, id: TaskId) -> bool {
        self.handle(id)
            .map(|handle| matches!(handle.wake(), Signal::Ok | Signal::Sleep))
            .unwrap_or(false)
    }

    /// Runs every task that is due, most recently created first.
    ///
    /// Must not be called from within a task; such a nested call does nothing
    /// and reports [`TickResult::Working`].
    pub fn tick(&self) -> TickResult {
        let (global, tail, nested) = self.tasks.with_mut(|mut tasks| {
            let nested = core::mem::replace(&mut tasks.ticking, true);
            (tasks.global, tasks.lists.peek_back(USED), nested)
        });
        if nested {
            return TickResult::Working;
        }
        if tail.is_none() {
            self.tasks.with_mut(|mut tasks| tasks.ticking = false);
            return TickResult::from_state(global, 0);
        }

        let now = self.clock.now();
        let mut cursor = tail;
        while let Some(id) = cursor {
            // Look up the predecessor before running: the task may free its slot.
            let (prev, step) = self.prepare(id, now);
            if let Step::Run(task, name) = step {
                let mut ctx = TaskContext {
                    id,
                    name,
                    signal: &self.signals[id as usize],
                };
                task.wakeup(&mut ctx);
                self.finish(id, now);
            }
            cursor = prev;
        }

        let (global, used) = self.tasks.with_mut(|mut tasks| {
            tasks.ticking = false;
            (tasks.global, tasks.lists.len(USED))
        });
        TickResult::from_state(global, used)
    }

    fn prepare(&self, id: TaskId, now: Ticks) -> (Option<TaskId>, Step<'a>) {
        critical_section::with(|cs| {
            self.tasks.with_mut_cs(cs, |mut tasks| {
                let prev = tasks.lists.prev(id);
                let signal = &self.signals[id as usize];

                let run = if tasks.global == GlobalSignal::Stop {
                    signal.set_cs(cs, Signal::Stop);
                    true
                } else {
                    match signal.get_cs(cs) {
                        Signal::Pending => {
                            // consumed here, so a wake-up raised while the
                            // task runs is not lost
                            signal.set_cs(cs, Signal::Ok);
                            true
                        }
                        Signal::Stop => true,
                        Signal::Sleep => false,
                        Signal::Ok => {
                            let slot = &tasks.slots[id as usize];
                            clock::elapsed(now, slot.last_check, slot.delay)
                        }
                        Signal::Dead => {
                            Self::reclaim(&mut tasks, id);
                            false
                        }
                    }
                };

                let slot = &tasks.slots[id as usize];
                match slot.task {
                    Some(task) if run => (prev, Step::Run(task, slot.name)),
                    _ => (prev, Step::Skip),
                }
            })
        })
    }

    fn finish(&self, id: TaskId, now: Ticks) {
        let died = critical_section::with(|cs| {
            self.tasks.with_mut_cs(cs, |mut tasks| {
                if self.signals[id as usize].get_cs(cs) == Signal::Dead {
                    Self::reclaim(&mut tasks, id);
                    true
                } else {
                    tasks.slots[id as usize].last_check = now;
                    false
                }
            })
        });
        if died {
            debug!("tasks: {} is dead, slot freed", id);
        }
    }

    fn reclaim(tasks: &mut Tasks<'a, N>, id: TaskId) {
        tasks.lists.move_to_back(USED, FREE, id);
        tasks.slots[id as usize] = Slot::EMPTY;
    }

    /// Sets every used task to [`Signal::Stop`] without requesting a global
    /// shutdown.
    pub fn flush(&self) {
        critical_section::with(|cs| self.flush_cs(cs));
    }

    fn flush_cs(&self, cs: CriticalSection) {
        self.tasks.with_cs(cs, |tasks| {
            for id in tasks.lists.iter(USED) {
                let signal = &self.signals[id as usize];
                if signal.get_cs(cs) != Signal::Dead {
                    signal.set_cs(cs, Signal::Stop);
                }
            }
        })
    }

    /// Requests a global shutdown.
    ///
    /// Every task is stopped and gets to clean up on the following ticks;
    /// [`Scheduler::tick`] reports [`TickResult::Stopped`] once all are dead.
    pub fn finalize(&self) {
        info!("tasks: shutting down");
        critical_section::with(|cs| {
            self.tasks.with_mut_cs(cs, |mut tasks| tasks.global = GlobalSignal::Stop);
            self.flush_cs(cs);
        });
    }

    /// Returns a handle to task `id`, if that slot is in use.
    pub fn handle(&self, id: TaskId) -> Option<TaskHandle<'_>> {
        let used = self.tasks.with(|tasks| tasks.lists.contains(USED, id));
        used.then(|| self.handle_unchecked(id))
    }

    fn handle_unchecked(&self, id: TaskId) -> TaskHandle<'_> {
        TaskHandle {
            id,
            signal: &self.signals[id as usize],
        }
    }

    /// Returns the signal of task `id`, if that slot is in use.
    pub fn signal(&self, id: TaskId) -> Option<Signal> {
        self.handle(id).map(|handle| handle.signal())
    }

    /// Returns the name task `id` was created with.
    pub fn name(&self, id: TaskId) -> Option<&'static str> {
        self.tasks.with(|tasks| {
            tasks
                .lists
                .contains(USED, id)
                .then(|| tasks.slots[id as usize].name)
        })
    }

    pub fn used_count(&self) -> usize {
        self.tasks.with(|tasks| tasks.lists.len(USED))
    }

    pub fn free_count(&self) -> usize {
        self.tasks.with(|tasks| tasks.lists.len(FREE))
    }

    pub fn global_signal(&self) -> GlobalSignal {
        self.tasks.with(|tasks| tasks.global)
    }

    pub fn now(&self) -> Ticks {
        self.clock.now()
    }
}
