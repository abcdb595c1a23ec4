//! tickrs is a cooperative, tick-driven runtime for small microcontrollers.
//!
//! It consists of a [`Scheduler`](tasks::Scheduler) running fixed-slot tasks
//! from a main loop, and a [`RegMaster`](regmaster::RegMaster) engine that
//! shares one I2C or SPI bus between drivers with interrupt-driven,
//! strictly ordered transactions.
//!
//! A typical application keeps everything in statics:
//!
//! ```
//! use tickrs::tasks::{Scheduler, Task, TaskContext};
//! use tickrs::{StaticCell, TickCounter};
//!
//! struct App;
//!
//! impl Task for App {
//!     fn wakeup(&self, ctx: &mut TaskContext<'_>) {
//!         if ctx.is_stopping() {
//!             ctx.die();
//!         }
//!     }
//! }
//!
//! static UPTIME: TickCounter = TickCounter::new();
//! static SCHEDULER: StaticCell<Scheduler<'static, 4>> = StaticCell::new();
//! static APP: App = App;
//!
//! let scheduler: &'static Scheduler<'static, 4> = SCHEDULER.init(Scheduler::new(&UPTIME));
//! scheduler.create("app", &APP, 10).unwrap();
//!
//! // from the SysTick handler: UPTIME.increment();
//! scheduler.finalize();
//! tickrs::run_until_stopped(scheduler);
//! ```
//!
//! # Cargo features
#![doc = document_features::document_features!()]
#![cfg_attr(not(test), no_std)]

#[doc(inline)]
pub use tickrs_debug as debug;
#[doc(inline)]
pub use tickrs_regmaster as regmaster;
#[doc(inline)]
pub use tickrs_tasks as tasks;
#[doc(inline)]
pub use tickrs_utils as utils;

pub use static_cell::{ConstStaticCell, StaticCell};

use portable_atomic::{AtomicU32, Ordering};
use tickrs_debug::log::info;
use tickrs_tasks::{Clock, Scheduler, TickResult, Ticks};

/// Tick counter advanced from a periodic timer interrupt.
pub struct TickCounter {
    ticks: AtomicU32,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Advances the counter by one tick. Call from the timer interrupt.
    pub fn increment(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TickCounter {
    fn now(&self) -> Ticks {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Runs the main loop until every task has shut down after
/// [`Scheduler::finalize`].
pub fn run_until_stopped<const N: usize>(scheduler: &Scheduler<'_, N>) {
    while scheduler.tick() != TickResult::Stopped {}
    info!("tickrs: all tasks stopped");
}

/// Runs at most `ticks` scheduler ticks and returns the last result.
///
/// Stops early once the scheduler reports [`TickResult::Stopped`].
pub fn run_for<const N: usize>(scheduler: &Scheduler<'_, N>, ticks: usize) -> TickResult {
    let mut result = TickResult::Working;
    for _ in 0..ticks {
        result = scheduler.tick();
        if result == TickResult::Stopped {
            break;
        }
    }
    result
}
