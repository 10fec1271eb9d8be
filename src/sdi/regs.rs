//! SDI controller register block: typed access over the fixed layout, no
//! logic. Bit positions are part of the wire contract with the silicon and
//! must stay exact.

use bitflags::bitflags;

// Register offsets from the controller base.
pub const SDICON: usize = 0x00; // control
pub const SDIPRE: usize = 0x04; // baud rate prescaler
pub const SDICARG: usize = 0x08; // command argument
pub const SDICCON: usize = 0x0c; // command control
pub const SDICSTA: usize = 0x10; // command status
pub const SDIRSP0: usize = 0x14; // response 0
pub const SDIRSP1: usize = 0x18; // response 1
pub const SDIRSP2: usize = 0x1c; // response 2
pub const SDIRSP3: usize = 0x20; // response 3
pub const SDIDTIMER: usize = 0x24; // data/busy timer
pub const SDIBSIZE: usize = 0x28; // block size
pub const SDIDCON: usize = 0x2c; // data control
pub const SDIDCNT: usize = 0x30; // data remain counter
pub const SDIDSTA: usize = 0x34; // data status
pub const SDIFSTA: usize = 0x38; // FIFO status
pub const SDIIMSK: usize = 0x3c; // interrupt mask
pub const SDIDAT: usize = 0x40; // data FIFO

// SDICON bits.
pub const SDICON_SDRESET: u32 = 1 << 8;
pub const SDICON_FIFORESET: u32 = 1 << 1;
pub const SDICON_CLOCKTYPE: u32 = 1 << 0;

// SDICCON bits.
pub const SDICMDCON_LONGRSP: u32 = 1 << 10;
pub const SDICMDCON_WAITRSP: u32 = 1 << 9;
pub const SDICMDCON_CMDSTART: u32 = 1 << 8;
pub const SDICMDCON_SENDERHOST: u32 = 1 << 6;
pub const SDICMDCON_INDEX: u32 = 0x3f;

// SDICSTA bits.
pub const SDICMDSTAT_CRCFAIL: u32 = 1 << 12;
pub const SDICMDSTAT_CMDSENT: u32 = 1 << 11;
pub const SDICMDSTAT_CMDTIMEOUT: u32 = 1 << 10;
pub const SDICMDSTAT_RSPFIN: u32 = 1 << 9;

/// The four response-state bits, consumed after every command.
pub const SDICMDSTAT_RSP_GROUP: u32 = 0xf << 9;

// SDIDCON bits.
pub const SDIDCON_DS_WORD: u32 = 2 << 22;
pub const SDIDCON_TXAFTERRESP: u32 = 1 << 20;
pub const SDIDCON_RXAFTERCMD: u32 = 1 << 19;
pub const SDIDCON_BLOCKMODE: u32 = 1 << 17;
pub const SDIDCON_WIDEBUS: u32 = 1 << 16;
pub const SDIDCON_DATSTART: u32 = 1 << 14;
pub const SDIDCON_XFER_RXSTART: u32 = 2 << 12;
pub const SDIDCON_XFER_TXSTART: u32 = 3 << 12;
pub const SDIDCON_BLKNUM: u32 = 0x7ff;

// SDIFSTA bits.
pub const SDIFSTA_TFHALF: u32 = 1 << 11;
pub const SDIFSTA_COUNTMASK: u32 = 0x7f;

/// Residual data-status clear pattern written once a transfer finishes.
pub const SDIDSTA_CLEAR: u32 = 0x6f8;

bitflags! {
    /// Data-path status bits (SDIDSTA).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataStatus: u32 {
        const FIFO_FAIL = 1 << 8;
        const CRC_FAIL = 1 << 7;
        const RX_CRC_FAIL = 1 << 6;
        const DATA_TIMEOUT = 1 << 5;
        const XFER_FINISH = 1 << 4;

        /// Conditions that abort a transfer immediately.
        const ERROR_MASK = Self::FIFO_FAIL.bits()
            | Self::CRC_FAIL.bits()
            | Self::RX_CRC_FAIL.bits()
            | Self::DATA_TIMEOUT.bits();
    }
}

/// Typed read/write access to the SDI register block.
pub trait SdiRegs {
    fn read_reg(&self, offset: usize) -> u32;
    fn write_reg(&self, offset: usize, value: u32);
}

/// Memory-mapped register block at the controller base address.
#[derive(Debug)]
pub struct Mmio {
    base_addr: usize,
}

impl Mmio {
    pub const fn new(base_addr: usize) -> Self {
        Self { base_addr }
    }
}

impl SdiRegs for Mmio {
    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset) as *mut u32, value) }
    }
}
