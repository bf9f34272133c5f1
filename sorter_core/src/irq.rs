//! Pending-interrupt latch, fixed-priority dispatch and the global mask.
//!
//! Sources (keypad, software timers) raise bits from their own threads; the
//! core latches them here and services them at its wait points. Dispatch
//! takes exactly one source per entry, highest priority first, and clears
//! its bit. Bits that belong to no known source are a fault.
use std::cell::Cell;
use std::rc::Rc;

use sorter_traits::IrqFlags;

use crate::error::Fault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    Keypad,
    Gate0Timer,
    Gate1Timer,
    OpTimeout,
}

impl IrqSource {
    pub const fn flag(self) -> IrqFlags {
        match self {
            IrqSource::Keypad => IrqFlags::KEYPAD,
            IrqSource::Gate0Timer => IrqFlags::GATE0_TIMER,
            IrqSource::Gate1Timer => IrqFlags::GATE1_TIMER,
            IrqSource::OpTimeout => IrqFlags::OP_TIMEOUT,
        }
    }
}

const PRIORITY: [IrqSource; 4] = [
    IrqSource::Keypad,
    IrqSource::Gate0Timer,
    IrqSource::Gate1Timer,
    IrqSource::OpTimeout,
];

/// Highest-priority pending source, or a fault for unknown bits.
pub fn next_source(pending: IrqFlags) -> Result<Option<IrqSource>, Fault> {
    let unknown = pending.unknown();
    if !unknown.is_empty() {
        return Err(Fault::UnexpectedInterrupt {
            bits: unknown.bits(),
        });
    }
    Ok(PRIORITY.into_iter().find(|s| pending.contains(s.flag())))
}

/// Global interrupt mask. Clones share the mask; nesting is counted.
#[derive(Debug, Clone, Default)]
pub struct IrqMask {
    depth: Rc<Cell<u32>>,
}

impl IrqMask {
    pub fn is_masked(&self) -> bool {
        self.depth.get() > 0
    }

    /// Mask dispatch until the returned guard drops.
    pub fn mask(&self) -> InterruptMask {
        self.depth.set(self.depth.get() + 1);
        InterruptMask {
            depth: Rc::clone(&self.depth),
        }
    }
}

/// Scope guard for a critical section. Pending bits keep latching while it
/// is held and are serviced at the next wait point after it drops.
#[must_use = "the mask is released as soon as the guard drops"]
pub struct InterruptMask {
    depth: Rc<Cell<u32>>,
}

impl Drop for InterruptMask {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Latched pending bits plus the mask that gates their dispatch.
#[derive(Debug, Default)]
pub struct IrqLatch {
    pending: IrqFlags,
    mask: IrqMask,
}

impl IrqLatch {
    pub fn raise(&mut self, flags: IrqFlags) {
        self.pending.insert(flags);
    }

    pub fn pending(&self) -> IrqFlags {
        self.pending
    }

    pub fn mask(&self) -> &IrqMask {
        &self.mask
    }

    /// Take the next source to service, clearing its bit. Returns `Ok(None)`
    /// when nothing is pending or dispatch is masked. On a fault every bit is
    /// cleared.
    pub fn take_next(&mut self) -> Result<Option<IrqSource>, Fault> {
        if self.mask.is_masked() || self.pending.is_empty() {
            return Ok(None);
        }
        match next_source(self.pending) {
            Ok(Some(src)) => {
                self.pending.remove(src.flag());
                Ok(Some(src))
            }
            Ok(None) => Ok(None),
            Err(f) => {
                self.pending = IrqFlags::empty();
                Err(f)
            }
        }
    }

    pub fn clear(&mut self) {
        self.pending = IrqFlags::empty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_follows_priority_one_per_entry() {
        let mut l = IrqLatch::default();
        l.raise(IrqFlags::OP_TIMEOUT | IrqFlags::GATE1_TIMER | IrqFlags::KEYPAD | IrqFlags::GATE0_TIMER);
        let order: Vec<_> = std::iter::from_fn(|| l.take_next().unwrap()).collect();
        assert_eq!(
            order,
            vec![
                IrqSource::Keypad,
                IrqSource::Gate0Timer,
                IrqSource::Gate1Timer,
                IrqSource::OpTimeout
            ]
        );
        assert!(l.pending().is_empty());
    }

    #[test]
    fn unknown_bit_is_a_fault_even_with_known_bits() {
        let mut l = IrqLatch::default();
        l.raise(IrqFlags::KEYPAD | IrqFlags::from_bits_retain(0x80));
        assert_eq!(
            l.take_next(),
            Err(Fault::UnexpectedInterrupt { bits: 0x80 })
        );
        assert!(l.pending().is_empty());
    }

    #[test]
    fn masked_bits_latch_until_guard_drops() {
        let mut l = IrqLatch::default();
        let mask = l.mask().clone();
        {
            let _g = mask.mask();
            l.raise(IrqFlags::KEYPAD);
            assert_eq!(l.take_next(), Ok(None));
            {
                let _nested = mask.mask();
            }
            assert!(mask.is_masked());
        }
        assert_eq!(l.take_next(), Ok(Some(IrqSource::Keypad)));
    }
}
