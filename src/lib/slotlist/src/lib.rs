//! This crate implements `Q` doubly linked lists over an array of `N` slot indices.
//!
//! Every slot index owns exactly one link node, so a slot can be a member of at
//! most one of the lists at any time. The lists carry no payload: callers keep
//! their data in a parallel `[T; N]` array and use the slot index as key.
//!
//! operation                | runtime | description
//! -------------------------|---------|---------------
//! [`SlotList::push_back`]  | O(1)    | append as tail
//! [`SlotList::push_front`] | O(1)    | insert as head
//! [`SlotList::pop_front`]  | O(1)    | remove and return head
//! [`SlotList::remove`]     | O(1)    | unlink a slot from its list
//! [`SlotList::move_to_back`] | O(1)  | unlink from one list, append to another
//! [`SlotList::next`] / [`SlotList::prev`] | O(1) | walk neighbours
//!
//! Slot indices are `u8`; `0xFF` is used as sentinel, so `N` must be < 255.

#![cfg_attr(not(test), no_std)]
// Slot and list indices are checked against `N`/`Q` on entry, everything else
// is maintained internally.
#![allow(clippy::indexing_slicing)]

/// Index of one of the `Q` lists.
pub type ListId = u8;
/// Index of one of the `N` slots.
pub type SlotId = u8;

const SENTINEL: u8 = 0xFF;

#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Link {
    prev: SlotId,
    next: SlotId,
    list: ListId,
}

impl Link {
    const UNLINKED: Link = Link {
        prev: SENTINEL,
        next: SENTINEL,
        list: SENTINEL,
    };
}

#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotList<const Q: usize, const N: usize> {
    head: [SlotId; Q],
    tail: [SlotId; Q],
    len: [u8; Q],
    links: [Link; N],
}

impl<const Q: usize, const N: usize> SlotList<Q, N> {
    /// Creates `Q` empty lists.
    ///
    /// Both `Q` and `N` must be below 255, otherwise the build fails:
    ///
    /// ```compile_fail
    /// let lists: slotlist::SlotList<1, 255> = slotlist::SlotList::new();
    /// ```
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        const {
            assert!(N < SENTINEL as usize, "SlotList supports at most 254 slots");
            assert!(Q < SENTINEL as usize, "SlotList supports at most 254 lists");
        }
        Self {
            head: [SENTINEL; Q],
            tail: [SENTINEL; Q],
            len: [0; Q],
            links: [Link::UNLINKED; N],
        }
    }

    /// Creates `Q` lists where `list` holds every slot in ascending order and
    /// all other lists are empty.
    pub const fn new_filled(list: ListId) -> Self {
        let mut lists = Self::new();
        if (list as usize) >= Q || N == 0 {
            return lists;
        }
        let mut i = 0;
        while i < N {
            lists.links[i] = Link {
                prev: if i == 0 { SENTINEL } else { (i - 1) as SlotId },
                next: if i + 1 == N { SENTINEL } else { (i + 1) as SlotId },
                list,
            };
            i += 1;
        }
        lists.head[list as usize] = 0;
        lists.tail[list as usize] = (N - 1) as SlotId;
        lists.len[list as usize] = N as u8;
        lists
    }

    fn valid(&self, list: ListId, slot: SlotId) -> bool {
        (list as usize) < Q && (slot as usize) < N && slot != SENTINEL
    }

    /// Returns the list `slot` is currently linked into.
    pub fn list_of(&self, slot: SlotId) -> Option<ListId> {
        match self.links.get(slot as usize) {
            Some(link) if link.list != SENTINEL => Some(link.list),
            _ => None,
        }
    }

    pub fn contains(&self, list: ListId, slot: SlotId) -> bool {
        self.list_of(slot) == Some(list)
    }

    pub fn is_empty(&self, list: ListId) -> bool {
        self.len(list) == 0
    }

    pub fn len(&self, list: ListId) -> usize {
        self.len.get(list as usize).map_or(0, |len| *len as usize)
    }

    /// Appends `slot` as the new tail of `list`.
    ///
    /// Returns `false` (and does nothing) if `slot` is already linked.
    pub fn push_back(&mut self, list: ListId, slot: SlotId) -> bool {
        if !self.valid(list, slot) || self.list_of(slot).is_some() {
            debug_assert!(self.valid(list, slot), "slot or list out of range");
            return false;
        }
        let l = list as usize;
        let old_tail = self.tail[l];
        self.links[slot as usize] = Link {
            prev: old_tail,
            next: SENTINEL,
            list,
        };
        if old_tail == SENTINEL {
            self.head[l] = slot;
        } else {
            self.links[old_tail as usize].next = slot;
        }
        self.tail[l] = slot;
        self.len[l] += 1;
        true
    }

    /// Inserts `slot` as the new head of `list`.
    ///
    /// Returns `false` (and does nothing) if `slot` is already linked.
    pub fn push_front(&mut self, list: ListId, slot: SlotId) -> bool {
        if !self.valid(list, slot) || self.list_of(slot).is_some() {
            debug_assert!(self.valid(list, slot), "slot or list out of range");
            return false;
        }
        let l = list as usize;
        let old_head = self.head[l];
        self.links[slot as usize] = Link {
            prev: SENTINEL,
            next: old_head,
            list,
        };
        if old_head == SENTINEL {
            self.tail[l] = slot;
        } else {
            self.links[old_head as usize].prev = slot;
        }
        self.head[l] = slot;
        self.len[l] += 1;
        true
    }

    /// Unlinks `slot` from `list`.
    ///
    /// Returns `false` if `slot` is not a member of `list`.
    pub fn remove(&mut self, list: ListId, slot: SlotId) -> bool {
        if !self.contains(list, slot) {
            return false;
        }
        let l = list as usize;
        let Link { prev, next, .. } = self.links[slot as usize];
        if prev == SENTINEL {
            self.head[l] = next;
        } else {
            self.links[prev as usize].next = next;
        }
        if next == SENTINEL {
            self.tail[l] = prev;
        } else {
            self.links[next as usize].prev = prev;
        }
        self.links[slot as usize] = Link::UNLINKED;
        self.len[l] -= 1;
        true
    }

    pub fn pop_front(&mut self, list: ListId) -> Option<SlotId> {
        let head = self.peek_front(list)?;
        self.remove(list, head);
        Some(head)
    }

    pub fn peek_front(&self, list: ListId) -> Option<SlotId> {
        match self.head.get(list as usize) {
            Some(&head) if head != SENTINEL => Some(head),
            _ => None,
        }
    }

    pub fn peek_back(&self, list: ListId) -> Option<SlotId> {
        match self.tail.get(list as usize) {
            Some(&tail) if tail != SENTINEL => Some(tail),
            _ => None,
        }
    }

    /// Returns the slot following `slot` in its list.
    pub fn next(&self, slot: SlotId) -> Option<SlotId> {
        match self.links.get(slot as usize) {
            Some(link) if link.next != SENTINEL => Some(link.next),
            _ => None,
        }
    }

    /// Returns the slot preceding `slot` in its list.
    pub fn prev(&self, slot: SlotId) -> Option<SlotId> {
        match self.links.get(slot as usize) {
            Some(link) if link.prev != SENTINEL => Some(link.prev),
            _ => None,
        }
    }

    /// Moves `slot` from list `from` to the tail of list `to`.
    ///
    /// Returns `false` if `slot` was not a member of `from`.
    pub fn move_to_back(&mut self, from: ListId, to: ListId, slot: SlotId) -> bool {
        if (to as usize) >= Q || !self.remove(from, slot) {
            return false;
        }
        self.push_back(to, slot)
    }

    /// Iterates `list` from head to tail.
    pub fn iter(&self, list: ListId) -> Iter<'_, Q, N> {
        Iter {
            lists: self,
            pos: self.peek_front(list),
        }
    }
}

pub struct Iter<'a, const Q: usize, const N: usize> {
    lists: &'a SlotList<Q, N>,
    pos: Option<SlotId>,
}

impl<const Q: usize, const N: usize> Iterator for Iter<'_, Q, N> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let current = self.pos?;
        self.pos = self.lists.next(current);
        Some(current)
    }
}
