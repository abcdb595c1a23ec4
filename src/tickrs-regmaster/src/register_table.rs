//! Process-wide register address table.
//!
//! `table[n] == n` for every byte value, so a driver can pass a one-byte
//! register address as a `'static` slice without keeping a buffer around:
//!
//! ```
//! # use tickrs_regmaster::register_address;
//! // only valid while an engine is running
//! assert!(register_address(0x0f).is_none());
//! ```
//!
//! The table is shared by all engine instances: the first started instance
//! opens it, the last one to shut down closes it.

use core::cell::Cell;

use critical_section::Mutex;

static TABLE: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut n = 0;
    while n < table.len() {
        table[n] = n as u8;
        n += 1;
    }
    table
};

static USERS: Mutex<Cell<usize>> = Mutex::new(Cell::new(0));

/// Lifecycle of the shared register table.
pub struct RegisterTable;

impl RegisterTable {
    /// Number of engine instances currently holding the table open.
    pub fn users() -> usize {
        critical_section::with(|cs| USERS.borrow(cs).get())
    }

    pub(crate) fn acquire() {
        critical_section::with(|cs| {
            let users = USERS.borrow(cs);
            users.set(users.get() + 1);
        })
    }

    pub(crate) fn release() {
        critical_section::with(|cs| {
            let users = USERS.borrow(cs);
            users.set(users.get().saturating_sub(1));
        })
    }
}

/// Returns a `'static` byte holding `n`, or `None` while no engine is running.
///
/// Use with [`core::slice::from_ref`] to build the register phase of a
/// transaction.
pub fn register_address(n: u8) -> Option<&'static u8> {
    if RegisterTable::users() == 0 {
        return None;
    }
    TABLE.get(usize::from(n))
}
