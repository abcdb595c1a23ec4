//! Byte-level bus interface consumed by the engine.
//!
//! A HAL implements [`Bus`] plus [`I2cController`] or [`SpiController`] for
//! its peripheral and forwards the peripheral's interrupt to
//! [`RegMaster::interrupt`](crate::RegMaster::interrupt).

pub use embedded_hal::i2c::SevenBitAddress;

use crate::Transaction;

/// Transfer direction, of a transaction phase and of a bus interrupt.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Tx,
    Rx,
}

/// Bus interrupt cause, as reported to [`RegMaster::interrupt`](crate::RegMaster::interrupt).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent {
    /// The transmit register can take the next byte.
    TxReady,
    /// A received byte is waiting to be read.
    RxReady,
}

/// I2C controller direction for the next start condition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Transmit,
    Receive,
}

/// Ordered byte channel with per-direction interrupt control.
///
/// All methods are called from interrupt context or with interrupts masked
/// and must not block, except where noted.
pub trait Bus {
    fn tx_byte(&mut self, byte: u8);

    fn rx_byte(&mut self) -> u8;

    fn enable_interrupt(&mut self, direction: Direction);

    fn disable_interrupt(&mut self, direction: Direction);

    /// Releases the peripheral. Called once, when the engine shuts down.
    fn close(&mut self);
}

/// I2C framing on top of [`Bus`].
pub trait I2cController: Bus {
    fn set_target_address(&mut self, address: SevenBitAddress);

    fn set_mode(&mut self, mode: Mode);

    fn issue_start(&mut self);

    fn issue_stop(&mut self);

    /// Waits until the start condition is on the wire. May busy-wait.
    fn wait_start(&mut self);

    /// Waits until a previously issued stop condition has completed. May busy-wait.
    fn wait_stop(&mut self);
}

/// SPI framing on top of [`Bus`].
pub trait SpiController: Bus {
    /// Asserts chip select.
    fn select(&mut self);

    /// Releases chip select.
    fn deselect(&mut self);
}

/// Placeholder for the unused side of a [`BusHandle`]. Cannot be constructed.
#[derive(Debug)]
pub enum NoBus {}

impl Bus for NoBus {
    fn tx_byte(&mut self, _byte: u8) {
        match *self {}
    }

    fn rx_byte(&mut self) -> u8 {
        match *self {}
    }

    fn enable_interrupt(&mut self, _direction: Direction) {
        match *self {}
    }

    fn disable_interrupt(&mut self, _direction: Direction) {
        match *self {}
    }

    fn close(&mut self) {
        match *self {}
    }
}

impl I2cController for NoBus {
    fn set_target_address(&mut self, _address: SevenBitAddress) {
        match *self {}
    }

    fn set_mode(&mut self, _mode: Mode) {
        match *self {}
    }

    fn issue_start(&mut self) {
        match *self {}
    }

    fn issue_stop(&mut self) {
        match *self {}
    }

    fn wait_start(&mut self) {
        match *self {}
    }

    fn wait_stop(&mut self) {
        match *self {}
    }
}

impl SpiController for NoBus {
    fn select(&mut self) {
        match *self {}
    }

    fn deselect(&mut self) {
        match *self {}
    }
}

/// The bus an engine instance drives.
///
/// Bus-specific framing is decided here, once; the transaction state
/// machine itself only sees a byte channel.
pub enum BusHandle<I, S> {
    I2c(I),
    Spi(S),
}

impl<I: I2cController, S: SpiController> BusHandle<I, S> {
    fn bus(&mut self) -> &mut dyn Bus {
        match self {
            Self::I2c(i2c) => i2c,
            Self::Spi(spi) => spi,
        }
    }

    pub(crate) fn tx_byte(&mut self, byte: u8) {
        self.bus().tx_byte(byte)
    }

    pub(crate) fn rx_byte(&mut self) -> u8 {
        self.bus().rx_byte()
    }

    pub(crate) fn enable_interrupt(&mut self, direction: Direction) {
        self.bus().enable_interrupt(direction)
    }

    pub(crate) fn disable_interrupt(&mut self, direction: Direction) {
        self.bus().disable_interrupt(direction)
    }

    pub(crate) fn disable_interrupts(&mut self) {
        let bus = self.bus();
        bus.disable_interrupt(Direction::Rx);
        bus.disable_interrupt(Direction::Tx);
    }

    pub(crate) fn close(&mut self) {
        self.bus().close()
    }

    /// Prepares the bus for the current phase of `txn` and enables the
    /// interrupt that drives it.
    pub(crate) fn arm(&mut self, txn: &Transaction<'_>) {
        match (self, txn.state) {
            (Self::I2c(i2c), Direction::Tx) => {
                i2c.wait_stop();
                i2c.set_target_address(txn.address);
                i2c.set_mode(Mode::Transmit);
                i2c.issue_start();
                i2c.wait_start();
                i2c.enable_interrupt(Direction::Tx);
            }
            (Self::I2c(i2c), Direction::Rx) => {
                i2c.wait_stop();
                i2c.set_mode(Mode::Receive);
                i2c.issue_start();
                i2c.wait_start();
                // a single byte read has no earlier point to schedule the stop
                if txn.wait_len() == 1 {
                    i2c.issue_stop();
                }
                i2c.enable_interrupt(Direction::Rx);
            }
            (Self::Spi(spi), Direction::Tx) => {
                spi.select();
                spi.enable_interrupt(Direction::Tx);
            }
            (Self::Spi(spi), Direction::Rx) => {
                spi.enable_interrupt(Direction::Rx);
            }
        }
    }

    /// The register phase of a read is done, reception is armed separately.
    pub(crate) fn end_register_phase(&mut self) {
        if let Self::I2c(i2c) = self {
            i2c.issue_stop();
        }
        self.disable_interrupt(Direction::Tx);
    }

    /// One byte is left to receive.
    pub(crate) fn before_last_byte(&mut self) {
        if let Self::I2c(i2c) = self {
            i2c.issue_stop();
        }
    }

    /// The last byte of a write has been handed to the bus.
    pub(crate) fn end_write(&mut self) {
        match self {
            Self::I2c(i2c) => i2c.issue_stop(),
            Self::Spi(spi) => spi.deselect(),
        }
        self.disable_interrupt(Direction::Tx);
    }

    /// The last byte of a read has been received. On I2C the stop condition
    /// was already issued.
    pub(crate) fn end_read(&mut self) {
        if let Self::Spi(spi) = self {
            spi.deselect();
        }
        self.disable_interrupts();
    }

    /// Ends a transfer that is cut short by shutdown.
    pub(crate) fn abort(&mut self) {
        match self {
            Self::I2c(i2c) => i2c.issue_stop(),
            Self::Spi(spi) => spi.deselect(),
        }
    }
}
