//! State shared between task context and interrupt handlers.
//!
//! [`Shared`] is a critical-section protected [`RefCell`]: every access runs
//! with interrupts masked, and the `RefCell` catches accidental re-entry (for
//! example a callback trying to borrow state that its caller still holds).
use core::cell::{Ref, RefCell, RefMut};
use critical_section::{with, CriticalSection, Mutex};

pub struct Shared<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(inner)),
        }
    }

    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Ref<T>) -> R,
    {
        with(|cs| self.with_cs(cs, f))
    }

    pub fn with_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(RefMut<T>) -> R,
    {
        with(|cs| self.with_mut_cs(cs, f))
    }

    pub fn with_cs<F, R>(&self, cs: CriticalSection, f: F) -> R
    where
        F: FnOnce(Ref<T>) -> R,
    {
        f(self.inner.borrow(cs).borrow())
    }

    pub fn with_mut_cs<F, R>(&self, cs: CriticalSection, f: F) -> R
    where
        F: FnOnce(RefMut<T>) -> R,
    {
        f(self.inner.borrow(cs).borrow_mut())
    }

    /// Like [`Shared::with_mut`], but returns `None` instead of panicking when
    /// the state is already borrowed further up the call stack.
    pub fn try_with_mut<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(RefMut<T>) -> R,
    {
        with(|cs| self.inner.borrow(cs).try_borrow_mut().ok().map(f))
    }
}
