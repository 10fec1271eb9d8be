//! S3C2440 clock unit.
//!
//! Derives FCLK/HCLK/PCLK/UCLK from the PLL and divider registers and gates
//! peripheral clocks through CLKCON. Rates are snapshotted once at probe
//! time; the boot path never reprograms the PLLs.

use fdt_parser::Node;
use log::debug;

use crate::{Peripheral, ProbeError, node_reg_base};

pub const LOCKTIME: usize = 0x00;
pub const MPLLCON: usize = 0x04;
pub const UPLLCON: usize = 0x08;
pub const CLKCON: usize = 0x0c;
pub const CLKSLOW: usize = 0x10;
pub const CLKDIVN: usize = 0x14;
pub const CAMDIVN: usize = 0x18;

/// Peripheral clock gates, numbered by their CLKCON bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockId {
    HclkNandFlash = 4,
    HclkLcdc = 5,
    HclkUsbHost = 6,
    PclkUsbDevice = 7,
    PclkPwmTimer = 8,
    PclkSdi = 9,
    PclkUart0 = 10,
    PclkUart1 = 11,
    PclkUart2 = 12,
    PclkGpio = 13,
    PclkRtc = 14,
    PclkAdc = 15,
    PclkIic = 16,
    PclkIis = 17,
    PclkSpi = 18,
    HclkCamera = 19,
    PclkAc97 = 20,
}

impl ClockId {
    fn is_hclk(self) -> bool {
        matches!(
            self,
            ClockId::HclkNandFlash | ClockId::HclkLcdc | ClockId::HclkUsbHost | ClockId::HclkCamera
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Pll {
    Mpll,
    Upll,
}

/// The clock controller block. Copyable so that `Clk` handles can carry a
/// snapshot of it, like the one-word clock handles the boot orchestrator
/// passes around.
#[derive(Debug, Clone, Copy)]
pub struct ClockUnit {
    base_addr: usize,
    xtal: u64,
    fclk: u64,
    hclk: u64,
    pclk: u64,
    uclk: u64,
}

impl ClockUnit {
    pub fn new(base_addr: usize, xtal: u64) -> Self {
        let mut unit = Self {
            base_addr,
            xtal,
            fclk: 0,
            hclk: 0,
            pclk: 0,
            uclk: 0,
        };

        unit.fclk = unit.pll_rate(Pll::Mpll);
        unit.hclk = unit.derive_hclk();
        unit.pclk = unit.derive_pclk();
        unit.uclk = unit.pll_rate(Pll::Upll);

        debug!(
            "clock unit @{:#x}: FCLK = {}, HCLK = {}, PCLK = {}, UCLK = {}",
            base_addr, unit.fclk, unit.hclk, unit.pclk, unit.uclk
        );

        unit
    }

    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset) as *mut u32, value) }
    }

    fn pll_rate(&self, pll: Pll) -> u64 {
        let r = match pll {
            Pll::Mpll => self.read_reg(MPLLCON),
            Pll::Upll => self.read_reg(UPLLCON),
        };

        let m = (((r & 0xff000) >> 12) + 8) as u64;
        let p = (((r & 0x003f0) >> 4) + 2) as u64;
        let s = (r & 0x3) as u64;

        match pll {
            // The 2440 MPLL carries an extra doubler stage.
            Pll::Mpll => 2 * m * (self.xtal / (p << s)),
            Pll::Upll => (self.xtal * m) / (p << s),
        }
    }

    fn derive_hclk(&self) -> u64 {
        match self.read_reg(CLKDIVN) & 0x6 {
            2 => self.fclk / 2,
            4 => {
                if self.read_reg(CAMDIVN) & (1 << 9) != 0 {
                    self.fclk / 8
                } else {
                    self.fclk / 4
                }
            }
            6 => {
                if self.read_reg(CAMDIVN) & (1 << 8) != 0 {
                    self.fclk / 6
                } else {
                    self.fclk / 3
                }
            }
            _ => self.fclk,
        }
    }

    fn derive_pclk(&self) -> u64 {
        if self.read_reg(CLKDIVN) & 1 != 0 {
            self.hclk / 2
        } else {
            self.hclk
        }
    }

    pub fn fclk(&self) -> u64 {
        self.fclk
    }

    pub fn hclk(&self) -> u64 {
        self.hclk
    }

    pub fn pclk(&self) -> u64 {
        self.pclk
    }

    pub fn uclk(&self) -> u64 {
        self.uclk
    }

    /// Hands out a gate/rate handle for one peripheral clock.
    pub fn claim(&self, id: ClockId) -> Clk {
        Clk { unit: *self, id }
    }

    fn set_gate(&self, id: ClockId, on: bool) {
        let value = self.read_reg(CLKCON);
        let bit = 1u32 << (id as u32);

        if on {
            self.write_reg(CLKCON, value | bit);
        } else {
            self.write_reg(CLKCON, value & !bit);
        }
    }
}

impl Peripheral for ClockUnit {
    const COMPATIBLE: &'static [&'static str] = &["samsung,s3c2440-clk"];

    /// Crystal frequency in Hz, from the board configuration.
    type Deps = u64;

    fn probe(node: &Node, xtal: Self::Deps) -> Result<Self, ProbeError> {
        let base_addr = node_reg_base(node)?;
        Ok(ClockUnit::new(base_addr, xtal))
    }
}

/// Handle to one peripheral clock: a rate query plus its CLKCON gate.
#[derive(Debug, Clone, Copy)]
pub struct Clk {
    unit: ClockUnit,
    id: ClockId,
}

impl Clk {
    pub fn rate(&self) -> u64 {
        if self.id.is_hclk() {
            self.unit.hclk
        } else {
            self.unit.pclk
        }
    }

    pub fn enable(&self) {
        debug!("clk enable: {:?}", self.id);
        self.unit.set_gate(self.id, true);
    }

    pub fn disable(&self) {
        debug!("clk disable: {:?}", self.id);
        self.unit.set_gate(self.id, false);
    }
}
