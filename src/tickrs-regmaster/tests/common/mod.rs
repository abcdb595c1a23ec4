#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tickrs_regmaster::{
    Bus, BusEvent, Direction, I2cController, Mode, SevenBitAddress, SpiController,
};

/// Everything a mock bus did, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Tx(u8),
    Rx(u8),
    Enable(Direction),
    Disable(Direction),
    Address(SevenBitAddress),
    Mode(Mode),
    Start,
    Stop,
    WaitStart,
    WaitStop,
    Select,
    Deselect,
    Close,
}

/// Shared state of a mock bus: the operation log, the bytes the target will
/// answer with and the interrupt enable flags.
///
/// `Sync`, so the engines driving it can be shared like real ones.
#[derive(Default)]
pub struct Wire {
    ops: Mutex<Vec<Op>>,
    incoming: Mutex<VecDeque<u8>>,
    tx_enabled: AtomicBool,
    rx_enabled: AtomicBool,
}

impl Wire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes the target sends back.
    pub fn answer(&self, bytes: &[u8]) {
        self.incoming.lock().unwrap().extend(bytes);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<u8> {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter_map(|op| match op {
                Op::Tx(byte) => Some(*byte),
                _ => None,
            })
            .collect()
    }

    pub fn tx_enabled(&self) -> bool {
        self.tx_enabled.load(Ordering::Relaxed)
    }

    pub fn rx_enabled(&self) -> bool {
        self.rx_enabled.load(Ordering::Relaxed)
    }

    /// The interrupt the hardware would raise next, if any is enabled.
    pub fn next_event(&self) -> Option<BusEvent> {
        if self.rx_enabled() {
            Some(BusEvent::RxReady)
        } else if self.tx_enabled() {
            Some(BusEvent::TxReady)
        } else {
            None
        }
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    fn set_enabled(&self, direction: Direction, enabled: bool) {
        let flag = match direction {
            Direction::Tx => &self.tx_enabled,
            Direction::Rx => &self.rx_enabled,
        };
        flag.store(enabled, Ordering::Relaxed);
    }
}

fn tx_byte(wire: &Wire, byte: u8) {
    wire.record(Op::Tx(byte));
}

fn rx_byte(wire: &Wire) -> u8 {
    let byte = wire.incoming.lock().unwrap().pop_front().unwrap_or(0xff);
    wire.record(Op::Rx(byte));
    byte
}

fn enable(wire: &Wire, direction: Direction) {
    wire.set_enabled(direction, true);
    wire.record(Op::Enable(direction));
}

fn disable(wire: &Wire, direction: Direction) {
    wire.set_enabled(direction, false);
    wire.record(Op::Disable(direction));
}

pub struct MockI2c<'w>(pub &'w Wire);

impl Bus for MockI2c<'_> {
    fn tx_byte(&mut self, byte: u8) {
        tx_byte(self.0, byte)
    }

    fn rx_byte(&mut self) -> u8 {
        rx_byte(self.0)
    }

    fn enable_interrupt(&mut self, direction: Direction) {
        enable(self.0, direction)
    }

    fn disable_interrupt(&mut self, direction: Direction) {
        disable(self.0, direction)
    }

    fn close(&mut self) {
        self.0.record(Op::Close)
    }
}

impl I2cController for MockI2c<'_> {
    fn set_target_address(&mut self, address: SevenBitAddress) {
        self.0.record(Op::Address(address))
    }

    fn set_mode(&mut self, mode: Mode) {
        self.0.record(Op::Mode(mode))
    }

    fn issue_start(&mut self) {
        self.0.record(Op::Start)
    }

    fn issue_stop(&mut self) {
        self.0.record(Op::Stop)
    }

    fn wait_start(&mut self) {
        self.0.record(Op::WaitStart)
    }

    fn wait_stop(&mut self) {
        self.0.record(Op::WaitStop)
    }
}

pub struct MockSpi<'w>(pub &'w Wire);

impl Bus for MockSpi<'_> {
    fn tx_byte(&mut self, byte: u8) {
        tx_byte(self.0, byte)
    }

    fn rx_byte(&mut self) -> u8 {
        rx_byte(self.0)
    }

    fn enable_interrupt(&mut self, direction: Direction) {
        enable(self.0, direction)
    }

    fn disable_interrupt(&mut self, direction: Direction) {
        disable(self.0, direction)
    }

    fn close(&mut self) {
        self.0.record(Op::Close)
    }
}

impl SpiController for MockSpi<'_> {
    fn select(&mut self) {
        self.0.record(Op::Select)
    }

    fn deselect(&mut self) {
        self.0.record(Op::Deselect)
    }
}

/// Raises every interrupt the bus currently has enabled until it goes
/// quiet, like hardware clocking bytes back to back.
pub fn run_bus(wire: &Wire, interrupt: impl Fn(BusEvent)) {
    while let Some(event) = wire.next_event() {
        interrupt(event);
    }
}
