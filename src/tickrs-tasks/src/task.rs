use crate::signal::{Signal, SignalCell};
use crate::TaskId;

/// Work run by the scheduler.
///
/// `wakeup` must return promptly: there is no preemption, a task that blocks
/// stalls every other task.
///
/// A task that is asked to stop (its signal reads [`Signal::Stop`]) is
/// expected to release its resources and call [`TaskContext::die`]. A task
/// that never does so keeps its slot forever.
///
/// Tasks are `Sync` so that a scheduler holding them can be placed in a
/// `static` and reached from interrupt handlers.
pub trait Task: Sync {
    fn wakeup(&self, ctx: &mut TaskContext<'_>);
}

impl<F> Task for F
where
    F: Fn(&mut TaskContext<'_>) + Sync,
{
    fn wakeup(&self, ctx: &mut TaskContext<'_>) {
        self(ctx)
    }
}

/// View of the running task handed to [`Task::wakeup`].
pub struct TaskContext<'s> {
    pub(crate) id: TaskId,
    pub(crate) name: &'static str,
    pub(crate) signal: &'s SignalCell,
}

impl TaskContext<'_> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn signal(&self) -> Signal {
        self.signal.get()
    }

    pub fn set_signal(&mut self, signal: Signal) {
        self.signal.set(signal)
    }

    /// Returns `true` if the task has been asked to terminate.
    pub fn is_stopping(&self) -> bool {
        self.signal() == Signal::Stop
    }

    /// Parks the task until it is woken.
    pub fn sleep(&mut self) {
        self.set_signal(Signal::Sleep)
    }

    /// Releases the task's slot once this wakeup returns.
    pub fn die(&mut self) {
        self.set_signal(Signal::Dead)
    }
}

/// Reference to a created task, usable from interrupt context.
#[derive(Copy, Clone)]
pub struct TaskHandle<'s> {
    pub(crate) id: TaskId,
    pub(crate) signal: &'s SignalCell,
}

impl TaskHandle<'_> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn signal(&self) -> Signal {
        self.signal.get()
    }

    /// Makes a sleeping or idle task run on the next tick.
    ///
    /// Returns the signal the task had before.
    pub fn wake(&self) -> Signal {
        self.signal.wake()
    }

    /// Asks the task to terminate, see [`crate::Scheduler::destroy`].
    pub fn destroy(&self) {
        self.signal.stop()
    }
}

impl core::fmt::Debug for TaskHandle<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("signal", &self.signal())
            .finish()
    }
}
