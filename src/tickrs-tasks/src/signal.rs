use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

/// Per-task control signal.
///
/// ```text
///            create()              delay elapsed
///   free ──────────────► Ok ◄──────────────────┐
///                        │ │                    │ runs
///             sleep()    │ └────────────────────┘
///        ┌───────────────┘
///        ▼        wake()             runs once
///      Sleep ─────────────► Pending ───────────► Ok
///
///   any ── destroy()/finalize() ──► Stop ── task cleans up ──► Dead ──► free
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signal {
    /// Runs whenever its delay has elapsed.
    Ok,
    /// Never runs by timeout, only after being woken.
    Sleep,
    /// Runs on the very next tick regardless of its delay.
    Pending,
    /// Runs one more time so the task can clean up and report [`Signal::Dead`].
    Stop,
    /// Terminal. The slot is returned to the free pool after the wakeup returns.
    Dead,
}

/// Kernel-wide shutdown request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GlobalSignal {
    Ok,
    Stop,
}

/// A task's [`Signal`], readable and writable from task and interrupt context.
pub(crate) struct SignalCell {
    inner: Mutex<Cell<Signal>>,
}

impl SignalCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Signal::Dead)),
        }
    }

    pub fn get(&self) -> Signal {
        critical_section::with(|cs| self.get_cs(cs))
    }

    pub fn get_cs(&self, cs: CriticalSection) -> Signal {
        self.inner.borrow(cs).get()
    }

    pub fn set(&self, signal: Signal) {
        critical_section::with(|cs| self.set_cs(cs, signal))
    }

    pub fn set_cs(&self, cs: CriticalSection, signal: Signal) {
        self.inner.borrow(cs).set(signal)
    }

    /// Moves `Ok` or `Sleep` to `Pending`.
    ///
    /// A stopping or dead task is left alone. Returns the previous signal.
    pub fn wake(&self) -> Signal {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let old = cell.get();
            if matches!(old, Signal::Ok | Signal::Sleep) {
                cell.set(Signal::Pending);
            }
            old
        })
    }

    /// Requests termination, unless the task is already dead.
    pub fn stop(&self) {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            if cell.get() != Signal::Dead {
                cell.set(Signal::Stop);
            }
        })
    }
}
