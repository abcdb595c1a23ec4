//! Interrupt-driven register transactions over a shared I2C or SPI bus.
//!
//! A [`RegMaster`] multiplexes one bus across any number of drivers. Each
//! [`write`](RegMaster::write) or [`read`](RegMaster::read) queues a
//! [`Transaction`]; transactions go on the wire strictly one at a time, in
//! submission order.
//!
//! Work is split between two contexts:
//!
//! - the bus interrupt handler calls [`RegMaster::interrupt`], which moves
//!   the transaction at the head of the queue forward by one byte,
//! - the engine's own scheduler task (the "after service routine") arms
//!   the bus for the next transaction and runs completion callbacks.
//!
//! Callbacks therefore never run in interrupt context.
//!
//! ```
//! use core::sync::atomic::{AtomicBool, Ordering};
//! use tickrs_regmaster::{BusEvent, NoBus, RegMaster, Transaction};
//! # use tickrs_regmaster::{Bus, Direction, I2cController, Mode, SevenBitAddress};
//! # struct Dummy;
//! # impl Bus for Dummy {
//! #     fn tx_byte(&mut self, _: u8) {}
//! #     fn rx_byte(&mut self) -> u8 { 0 }
//! #     fn enable_interrupt(&mut self, _: Direction) {}
//! #     fn disable_interrupt(&mut self, _: Direction) {}
//! #     fn close(&mut self) {}
//! # }
//! # impl I2cController for Dummy {
//! #     fn set_target_address(&mut self, _: SevenBitAddress) {}
//! #     fn set_mode(&mut self, _: Mode) {}
//! #     fn issue_start(&mut self) {}
//! #     fn issue_stop(&mut self) {}
//! #     fn wait_start(&mut self) {}
//! #     fn wait_stop(&mut self) {}
//! # }
//! use tickrs_tasks::Scheduler;
//!
//! let done = AtomicBool::new(false);
//! let on_done = |_txn: Transaction<'_>, terminated: bool| done.store(!terminated, Ordering::Relaxed);
//! let clock = || 0u32;
//! let scheduler: Scheduler<'_, 2> = Scheduler::new(&clock);
//! let regmaster: RegMaster<'_, Dummy, NoBus> = RegMaster::over_i2c(Dummy);
//! regmaster.start(&scheduler).unwrap();
//!
//! regmaster.write(0x50, &[0x03, 0x07], &on_done).unwrap();
//! scheduler.tick(); // arms the bus
//! regmaster.interrupt(BusEvent::TxReady);
//! regmaster.interrupt(BusEvent::TxReady);
//! scheduler.tick(); // runs the callback
//! assert!(done.load(Ordering::Relaxed));
//! ```

#![cfg_attr(not(test), no_std)]
// Pool indices come out of the slot list and are always < P.
#![allow(clippy::indexing_slicing)]

mod bus;
mod register_table;
mod transaction;

pub use bus::{
    Bus, BusEvent, BusHandle, Direction, I2cController, Mode, NoBus, SevenBitAddress,
    SpiController,
};
pub use register_table::{register_address, RegisterTable};
pub use transaction::{Callback, Transaction};

use slotlist::{ListId, SlotList};
use tickrs_debug::log::{debug, info, trace, warn};
use tickrs_tasks::{Scheduler, Signal, Task, TaskContext, TaskHandle};
use tickrs_utils::Shared;

/// Default transaction pool size, `TICKRS_REGMASTER_POOL_SIZE` at build time.
pub const TXN_POOL_SIZE: usize =
    tickrs_utils::usize_from_env_or!("TICKRS_REGMASTER_POOL_SIZE", 8, below 255);

const FREE: ListId = 0;
const PENDING: ListId = 1;
const EXECUTING: ListId = 2;

/// A register master error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The transaction pool is exhausted.
    OutOfMemory,
    /// Empty register phase, or empty receive buffer on a read.
    InvalidArgument,
    /// The engine task could not be created.
    TaskCreation(tickrs_tasks::Error),
    /// The engine is shutting down.
    Terminated,
}

impl From<tickrs_tasks::Error> for Error {
    fn from(err: tickrs_tasks::Error) -> Self {
        Self::TaskCreation(err)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "transaction pool exhausted"),
            Self::InvalidArgument => write!(f, "invalid transaction"),
            Self::TaskCreation(err) => write!(f, "cannot create engine task: {err}"),
            Self::Terminated => write!(f, "engine is shutting down"),
        }
    }
}

/// Position of the transaction currently on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Progress {
    pub state: Direction,
    pub reg_pos: usize,
    pub wait_pos: usize,
}

/// Engine I2C-bound, see [`RegMaster::over_i2c`].
pub type I2cRegMaster<'a, I, const P: usize = TXN_POOL_SIZE> = RegMaster<'a, I, NoBus, P>;
/// Engine SPI-bound, see [`RegMaster::over_spi`].
pub type SpiRegMaster<'a, S, const P: usize = TXN_POOL_SIZE> = RegMaster<'a, NoBus, S, P>;

struct Engine<'a, I, S, const P: usize> {
    bus: BusHandle<I, S>,
    pool: [Option<Transaction<'a>>; P],
    /// Every pool slot is in exactly one of `FREE`, `PENDING` or `EXECUTING`.
    lists: SlotList<3, P>,
    /// The head of `PENDING` is on the wire and its interrupt is enabled.
    armed: bool,
    asr: Option<TaskHandle<'a>>,
    /// No new transactions are accepted.
    stopping: bool,
    shut_down: bool,
}

impl<'a, I: I2cController, S: SpiController, const P: usize> Engine<'a, I, S, P> {
    fn push(&mut self, txn: Transaction<'a>) -> Result<Option<TaskHandle<'a>>, Error> {
        if self.stopping {
            return Err(Error::Terminated);
        }
        let id = self.lists.pop_front(FREE).ok_or(Error::OutOfMemory)?;
        self.pool[id as usize] = Some(txn);
        self.lists.push_back(PENDING, id);
        Ok(self.asr)
    }

    /// Unlinks the head of `list` and returns its slot to the pool.
    fn take(&mut self, list: ListId) -> Option<Transaction<'a>> {
        let id = self.lists.peek_front(list)?;
        self.lists.move_to_back(list, FREE, id);
        self.pool[id as usize].take()
    }

    /// Puts the head of `PENDING` on the wire, unless the bus is busy.
    fn arm(&mut self) {
        if self.armed || self.stopping {
            return;
        }
        let Some(id) = self.lists.peek_front(PENDING) else {
            return;
        };
        if let Some(txn) = self.pool[id as usize].as_ref() {
            self.bus.arm(txn);
            self.armed = true;
        }
    }

    /// Disables the bus interrupts and ends any transfer on the wire.
    fn halt(&mut self) {
        self.bus.disable_interrupts();
        if core::mem::replace(&mut self.armed, false) {
            self.bus.abort();
        }
    }

    /// Advances the head of `PENDING` by one bus event. Returns the task to
    /// wake, if any.
    ///
    /// Events are only acted on while the task has the bus armed.
    fn service(&mut self, event: BusEvent) -> Option<TaskHandle<'a>> {
        if !self.armed {
            trace!("regmaster: ignoring {:?}, bus not armed", event);
            return None;
        }
        let id = self.lists.peek_front(PENDING)?;
        let Self {
            bus, pool, lists, ..
        } = self;
        let txn = pool[id as usize].as_mut()?;

        let done = match (txn.state, event) {
            (Direction::Tx, BusEvent::TxReady) => {
                if let Some(&byte) = txn.reg.get(txn.reg_pos) {
                    bus.tx_byte(byte);
                    txn.reg_pos += 1;
                }
                if txn.reg_pos < txn.reg.len() {
                    return None;
                }
                if txn.is_read() {
                    txn.state = Direction::Rx;
                    bus.end_register_phase();
                    // reception is armed from the task
                    false
                } else {
                    bus.end_write();
                    true
                }
            }
            (Direction::Rx, BusEvent::RxReady) => {
                if txn.wait_pos >= txn.wait_len() {
                    return None;
                }
                if txn.remaining_after_next() == 1 && txn.wait_len() > 1 {
                    bus.before_last_byte();
                }
                let byte = bus.rx_byte();
                if !txn.store(byte) {
                    return None;
                }
                bus.end_read();
                true
            }
            (state, event) => {
                trace!("regmaster: ignoring {:?} in {:?}", event, state);
                return None;
            }
        };

        if done {
            lists.move_to_back(PENDING, EXECUTING, id);
        }
        self.armed = false;
        self.asr
    }
}

/// Register master engine over an I2C bus `I` or an SPI bus `S`, with a
/// pool of `P` transactions.
///
/// The unused bus parameter is [`NoBus`]; see [`I2cRegMaster`] and
/// [`SpiRegMaster`].
///
/// With a `Send` bus the engine is `Sync`, and the constructors are `const`,
/// so an engine can be a `static` shared with the bus interrupt handler.
pub struct RegMaster<'a, I, S, const P: usize = TXN_POOL_SIZE> {
    engine: Shared<Engine<'a, I, S, P>>,
}

impl<'a, I: I2cController, const P: usize> RegMaster<'a, I, NoBus, P> {
    /// Binds an engine to an open I2C bus.
    pub const fn over_i2c(bus: I) -> Self {
        Self::new(BusHandle::I2c(bus))
    }
}

impl<'a, S: SpiController, const P: usize> RegMaster<'a, NoBus, S, P> {
    /// Binds an engine to an open SPI bus.
    pub const fn over_spi(bus: S) -> Self {
        Self::new(BusHandle::Spi(bus))
    }
}

impl<'a, I: I2cController, S: SpiController, const P: usize> RegMaster<'a, I, S, P> {
    pub const fn new(bus: BusHandle<I, S>) -> Self {
        Self {
            engine: Shared::new(Engine {
                bus,
                pool: [const { None }; P],
                lists: SlotList::new_filled(FREE),
                armed: false,
                asr: None,
                stopping: false,
                shut_down: false,
            }),
        }
    }

    /// Creates the engine task on `scheduler` and opens the register table.
    ///
    /// Transactions submitted before this are kept and go out once the
    /// engine runs. Starting twice does nothing.
    pub fn start<const N: usize>(&'a self, scheduler: &'a Scheduler<'a, N>) -> Result<(), Error>
    where
        I: Send,
        S: Send,
    {
        match self.engine.with(|engine| (engine.stopping, engine.asr.is_some())) {
            (true, _) => return Err(Error::Terminated),
            (false, true) => return Ok(()),
            (false, false) => {}
        }

        let asr = scheduler.create_sleeping("regmaster", self, 0)?;
        RegisterTable::acquire();
        let backlog = self.engine.with_mut(|mut engine| {
            engine.asr = Some(asr);
            !engine.lists.is_empty(PENDING)
        });
        if backlog {
            asr.wake();
        }
        info!("regmaster: started as task {}", asr.id());
        Ok(())
    }

    /// Queues a write of `reg` to `address`.
    ///
    /// `address` is ignored on SPI.
    pub fn write(
        &self,
        address: SevenBitAddress,
        reg: &'a [u8],
        callback: Callback<'a>,
    ) -> Result<(), Error> {
        self.submit(Transaction::new(address, reg, None, false, callback))
    }

    /// Queues a write of `reg` followed by a read filling `wait` front to back.
    pub fn read(
        &self,
        address: SevenBitAddress,
        reg: &'a [u8],
        wait: &'a mut [u8],
        callback: Callback<'a>,
    ) -> Result<(), Error> {
        self.read_ext(address, reg, wait, callback, false)
    }

    /// Like [`RegMaster::read`]; with `swap` set, received bytes are stored
    /// back to front, flipping the byte order of multi-byte registers.
    pub fn read_ext(
        &self,
        address: SevenBitAddress,
        reg: &'a [u8],
        wait: &'a mut [u8],
        callback: Callback<'a>,
        swap: bool,
    ) -> Result<(), Error> {
        if wait.is_empty() {
            debug!("regmaster: rejected read without receive buffer");
            return Err(Error::InvalidArgument);
        }
        self.submit(Transaction::new(address, reg, Some(wait), swap, callback))
    }

    fn submit(&self, txn: Transaction<'a>) -> Result<(), Error> {
        if txn.reg.is_empty() {
            debug!("regmaster: rejected transaction without register bytes");
            return Err(Error::InvalidArgument);
        }
        let asr = self
            .engine
            .with_mut(|mut engine| engine.push(txn))
            .inspect_err(|err| warn!("regmaster: transaction refused: {}", err))?;
        if let Some(asr) = asr {
            asr.wake();
        }
        Ok(())
    }

    /// Bus interrupt entry point.
    ///
    /// Must be called from the bus interrupt handler for every enabled event.
    /// Events that arrive while no transaction is on the wire, or that do not
    /// match the state of the one that is, are ignored.
    pub fn interrupt(&self, event: BusEvent) {
        if let Some(asr) = self.engine.with_mut(|mut engine| engine.service(event)) {
            asr.wake();
        }
    }

    /// Shuts the engine down.
    ///
    /// Bus interrupts are disabled right away. The engine task then
    /// completes every queued transaction with `terminated == true`, closes
    /// the bus and exits on its next run.
    pub fn finalize(&self) {
        let asr = self.engine.with_mut(|mut engine| {
            engine.stopping = true;
            engine.halt();
            engine.asr
        });
        match asr {
            Some(asr) => asr.destroy(),
            // never started, nobody else will drain the queues
            None => self.shut_down(),
        }
    }

    fn shut_down(&self) {
        let first = self.engine.with_mut(|mut engine| {
            engine.stopping = true;
            engine.halt();
            !core::mem::replace(&mut engine.shut_down, true)
        });
        if !first {
            return;
        }

        let mut terminated = 0usize;
        // queued work first, then work waiting for its callback
        while let Some(txn) = self
            .engine
            .with_mut(|mut engine| engine.take(PENDING).or_else(|| engine.take(EXECUTING)))
        {
            txn.complete(true);
            terminated += 1;
        }

        let started = self.engine.with_mut(|mut engine| {
            engine.bus.close();
            engine.asr.take().is_some()
        });
        if started {
            RegisterTable::release();
        }
        info!("regmaster: closed, {} transactions terminated", terminated);
    }

    /// Handle of the engine task, once started.
    pub fn task(&self) -> Option<TaskHandle<'a>> {
        self.engine.with(|engine| engine.asr)
    }

    /// Returns the position of the transaction currently on the wire or
    /// next in line.
    pub fn progress(&self) -> Option<Progress> {
        self.engine.with(|engine| {
            let id = engine.lists.peek_front(PENDING)?;
            engine.pool[id as usize].as_ref().map(|txn| Progress {
                state: txn.state,
                reg_pos: txn.reg_pos,
                wait_pos: txn.wait_pos,
            })
        })
    }

    /// `true` if no transaction is queued or waiting for its callback.
    pub fn is_idle(&self) -> bool {
        self.engine
            .with(|engine| engine.lists.is_empty(PENDING) && engine.lists.is_empty(EXECUTING))
    }

    pub fn pending_len(&self) -> usize {
        self.engine.with(|engine| engine.lists.len(PENDING))
    }

    pub fn executing_len(&self) -> usize {
        self.engine.with(|engine| engine.lists.len(EXECUTING))
    }

    /// Number of pool slots currently in use.
    pub fn outstanding(&self) -> usize {
        self.engine.with(|engine| P - engine.lists.len(FREE))
    }
}

impl<I, S, const P: usize> Task for RegMaster<'_, I, S, P>
where
    I: I2cController + Send,
    S: SpiController + Send,
{
    /// Completes at most one transaction per run, then arms the bus for the
    /// next one and goes back to sleep.
    fn wakeup(&self, ctx: &mut TaskContext<'_>) {
        if ctx.is_stopping() {
            self.shut_down();
            ctx.die();
            return;
        }

        if let Some(txn) = self.engine.with_mut(|mut engine| engine.take(EXECUTING)) {
            txn.complete(false);
        }

        // Sleep before arming: a completion interrupt raised from here on
        // moves the task back to `Pending`.
        ctx.sleep();
        let backlog = self.engine.with_mut(|mut engine| {
            engine.arm();
            !engine.lists.is_empty(EXECUTING)
        });
        if backlog {
            ctx.set_signal(Signal::Pending);
        }
    }
}
