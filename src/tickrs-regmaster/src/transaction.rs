use crate::bus::{Direction, SevenBitAddress};

/// Completion callback of a [`Transaction`].
///
/// Runs exactly once per accepted transaction, always in task context. The
/// second argument is `true` when the engine shut down before the
/// transaction completed; the buffers are handed back either way.
pub type Callback<'a> = &'a (dyn Fn(Transaction<'a>, bool) + Sync);

/// One queued write, or write-then-read, against a bus peripheral.
pub struct Transaction<'a> {
    pub(crate) state: Direction,
    pub(crate) address: SevenBitAddress,
    pub(crate) reg: &'a [u8],
    pub(crate) reg_pos: usize,
    pub(crate) wait: Option<&'a mut [u8]>,
    pub(crate) wait_pos: usize,
    pub(crate) swap: bool,
    pub(crate) callback: Callback<'a>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        address: SevenBitAddress,
        reg: &'a [u8],
        wait: Option<&'a mut [u8]>,
        swap: bool,
        callback: Callback<'a>,
    ) -> Self {
        Self {
            state: Direction::Tx,
            address,
            reg,
            reg_pos: 0,
            wait,
            wait_pos: 0,
            swap,
            callback,
        }
    }

    /// Current phase: sending register bytes or receiving.
    pub fn state(&self) -> Direction {
        self.state
    }

    /// Target address. Unused on SPI.
    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// The register address and payload bytes.
    pub fn reg(&self) -> &'a [u8] {
        self.reg
    }

    /// Number of register bytes handed to the bus so far.
    pub fn reg_pos(&self) -> usize {
        self.reg_pos
    }

    pub fn is_read(&self) -> bool {
        self.wait.is_some()
    }

    /// Bytes received so far, in buffer order.
    pub fn wait(&self) -> Option<&[u8]> {
        self.wait.as_deref()
    }

    /// Hands the receive buffer back to its owner.
    pub fn into_wait(self) -> Option<&'a mut [u8]> {
        self.wait
    }

    /// Number of bytes received so far.
    pub fn wait_pos(&self) -> usize {
        self.wait_pos
    }

    pub(crate) fn wait_len(&self) -> usize {
        self.wait.as_deref().map_or(0, <[u8]>::len)
    }

    /// Whether received bytes are stored back to front.
    pub fn swap(&self) -> bool {
        self.swap
    }

    pub(crate) fn complete(self, terminated: bool) {
        let callback = self.callback;
        callback(self, terminated)
    }

    /// Stores one received byte, returns `true` if it was the last one.
    pub(crate) fn store(&mut self, byte: u8) -> bool {
        let Some(wait) = self.wait.as_deref_mut() else {
            return true;
        };
        let remaining = wait.len().saturating_sub(self.wait_pos + 1);
        let index = if self.swap { remaining } else { self.wait_pos };
        if let Some(slot) = wait.get_mut(index) {
            *slot = byte;
        }
        self.wait_pos += 1;
        remaining == 0
    }

    /// Number of bytes still to arrive after the one currently being received.
    pub(crate) fn remaining_after_next(&self) -> usize {
        self.wait_len().saturating_sub(self.wait_pos + 1)
    }
}

impl core::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("address", &self.address)
            .field("reg", &self.reg)
            .field("reg_pos", &self.reg_pos)
            .field("wait", &self.wait)
            .field("wait_pos", &self.wait_pos)
            .field("swap", &self.swap)
            .finish_non_exhaustive()
    }
}
