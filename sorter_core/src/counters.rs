//! Bin counters and their byte-store image.
//!
//! Layout: five little-endian `u16` counters (total first, then one per
//! category) at `COUNTERS_ADDR`, and the previous run's counters in the same
//! layout at `HISTORY_ADDR`. Writes are best-effort, byte by byte.
use sorter_traits::{BoxError, ByteStore};

use crate::classifier::Category;

pub const COUNTERS_ADDR: u16 = 0x00;
pub const HISTORY_ADDR: u16 = 0x10;
pub const BIN_COUNT: usize = 5;
const IMAGE_LEN: usize = BIN_COUNT * 2;

/// One counter slot; `Total` counts every committed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Total,
    Category(Category),
}

impl Bin {
    /// Slot order in storage and on the count screen.
    pub const ALL: [Bin; BIN_COUNT] = [
        Bin::Total,
        Bin::Category(Category::CapAbsentVariant),
        Bin::Category(Category::CapPresent),
        Bin::Category(Category::NoCap),
        Bin::Category(Category::Other),
    ];

    pub const fn slot(self) -> usize {
        match self {
            Bin::Total => 0,
            Bin::Category(Category::CapAbsentVariant) => 1,
            Bin::Category(Category::CapPresent) => 2,
            Bin::Category(Category::NoCap) => 3,
            Bin::Category(Category::Other) => 4,
        }
    }

    /// Count-screen label (fits one 16-column line).
    pub const fn label(self) -> &'static str {
        match self {
            Bin::Total => "Total",
            Bin::Category(Category::CapAbsentVariant) => "Cap absent var",
            Bin::Category(Category::CapPresent) => "Cap present",
            Bin::Category(Category::NoCap) => "No cap",
            Bin::Category(Category::Other) => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinCounters([u16; BIN_COUNT]);

impl BinCounters {
    pub const fn zero() -> Self {
        Self([0; BIN_COUNT])
    }

    pub fn get(&self, bin: Bin) -> u16 {
        self.0[bin.slot()]
    }

    pub fn total(&self) -> u16 {
        self.get(Bin::Total)
    }

    /// Count one committed pass: total plus exactly one category.
    pub fn record(&mut self, category: Category) {
        for bin in [Bin::Total, Bin::Category(category)] {
            let c = &mut self.0[bin.slot()];
            *c = c.saturating_add(1);
        }
    }

    pub fn to_bytes(&self) -> [u8; IMAGE_LEN] {
        let mut out = [0u8; IMAGE_LEN];
        for (i, v) in self.0.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decode a stored image. A fully erased image (all 0xFF) reads as zero.
    pub fn from_bytes(b: [u8; IMAGE_LEN]) -> Self {
        if b.iter().all(|&x| x == 0xFF) {
            return Self::zero();
        }
        let mut v = [0u16; BIN_COUNT];
        for (i, c) in v.iter_mut().enumerate() {
            *c = u16::from_le_bytes([b[i * 2], b[i * 2 + 1]]);
        }
        Self(v)
    }

    pub fn load(store: &mut dyn ByteStore, addr: u16) -> Result<Self, BoxError> {
        let mut b = [0u8; IMAGE_LEN];
        for (i, byte) in b.iter_mut().enumerate() {
            *byte = store.read(addr + i as u16)?;
        }
        Ok(Self::from_bytes(b))
    }

    /// Write the image byte by byte, then one `flush` for the whole record.
    pub fn save(&self, store: &mut dyn ByteStore, addr: u16) -> Result<(), BoxError> {
        for (i, byte) in self.to_bytes().into_iter().enumerate() {
            store.write(addr + i as u16, byte)?;
        }
        store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_hardware::MemoryStore;

    #[test]
    fn record_bumps_total_and_one_category() {
        let mut c = BinCounters::zero();
        c.record(Category::NoCap);
        c.record(Category::NoCap);
        c.record(Category::Other);
        assert_eq!(c.total(), 3);
        assert_eq!(c.get(Bin::Category(Category::NoCap)), 2);
        assert_eq!(c.get(Bin::Category(Category::Other)), 1);
        assert_eq!(c.get(Bin::Category(Category::CapPresent)), 0);
    }

    #[test]
    fn store_layout_is_little_endian_u16() {
        let mut store = MemoryStore::new(32);
        let mut c = BinCounters::zero();
        for _ in 0..0x0102 {
            c.record(Category::CapPresent);
        }
        c.save(&mut store, HISTORY_ADDR).unwrap();
        let img = store.snapshot();
        assert_eq!(&img[0x10..0x16], &[0x02, 0x01, 0x00, 0x00, 0x02, 0x01]);
        assert_eq!(BinCounters::load(&mut store, HISTORY_ADDR).unwrap(), c);
    }

    #[test]
    fn erased_store_loads_as_zero() {
        let mut store = MemoryStore::new(32);
        assert_eq!(
            BinCounters::load(&mut store, COUNTERS_ADDR).unwrap(),
            BinCounters::zero()
        );
    }

    #[test]
    fn save_flushes_once_per_record() {
        struct Counting {
            inner: MemoryStore,
            writes: usize,
            flushes: usize,
        }
        impl ByteStore for Counting {
            fn read(&mut self, addr: u16) -> Result<u8, BoxError> {
                self.inner.read(addr)
            }
            fn write(&mut self, addr: u16, value: u8) -> Result<(), BoxError> {
                self.writes += 1;
                self.inner.write(addr, value)
            }
            fn flush(&mut self) -> Result<(), BoxError> {
                self.flushes += 1;
                Ok(())
            }
        }

        let mut store = Counting {
            inner: MemoryStore::new(32),
            writes: 0,
            flushes: 0,
        };
        let mut c = BinCounters::zero();
        c.record(Category::Other);
        c.save(&mut store, COUNTERS_ADDR).unwrap();
        assert_eq!((store.writes, store.flushes), (IMAGE_LEN, 1));
    }
}
