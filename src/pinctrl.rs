//! S3C2440 pin controller.
//!
//! Function select lives in the per-bank CON registers (2-bit fields), pull
//! configuration in the UP registers (one bit per pin, set = pull disabled).

use log::debug;

use crate::ProbeError;

pub const MAX_GPIO_BANKS: usize = 9;
/// One CON word carries sixteen 2-bit function fields.
pub const MUX_PINS_PER_BANK: u32 = 16;

/// CON register of each bank A..J.
const MUX_REG_BASE: [usize; MAX_GPIO_BANKS] = [
    0x5600_0000,
    0x5600_0010,
    0x5600_0020,
    0x5600_0030,
    0x5600_0040,
    0x5600_0050,
    0x5600_0060,
    0x5600_0070,
    0x5600_00d0,
];

/// UP register of each bank. Bank A has no pull-up option; its slot aliases
/// the CON register.
const CONF_REG_BASE: [usize; MAX_GPIO_BANKS] = [
    0x5600_0000,
    0x5600_0018,
    0x5600_0028,
    0x5600_0038,
    0x5600_0048,
    0x5600_0058,
    0x5600_0068,
    0x5600_0078,
    0x5600_00d8,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mux {
    Gpio,
    PeriphA,
    PeriphB,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
}

/// One entry of a pin group: bank index (0 = A .. 8 = J), pin, function,
/// pull configuration.
#[derive(Debug, Clone, Copy)]
pub struct PinState {
    pub bank: u32,
    pub pin: u32,
    pub mux: Mux,
    pub pull: Pull,
}

#[derive(Debug, Clone, Copy)]
pub struct Pinctrl {
    mux_reg_base: [usize; MAX_GPIO_BANKS],
    conf_reg_base: [usize; MAX_GPIO_BANKS],
    nbanks: u32,
}

impl Pinctrl {
    pub const fn new() -> Self {
        Self::with_tables(MUX_REG_BASE, CONF_REG_BASE)
    }

    /// Builds a controller over explicit register tables. The default tables
    /// are the fixed SoC addresses; tests point this at scratch memory.
    pub const fn with_tables(
        mux_reg_base: [usize; MAX_GPIO_BANKS],
        conf_reg_base: [usize; MAX_GPIO_BANKS],
    ) -> Self {
        Self {
            mux_reg_base,
            conf_reg_base,
            nbanks: MAX_GPIO_BANKS as u32,
        }
    }

    fn read_reg(addr: usize) -> u32 {
        unsafe { core::ptr::read_volatile(addr as *const u32) }
    }

    fn write_reg(addr: usize, value: u32) {
        unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
    }

    fn check_pin(&self, bank: u32, pin: u32) -> Result<(), ProbeError> {
        if bank >= self.nbanks || pin >= MUX_PINS_PER_BANK {
            debug!("pin conf out of range: bank {}, pin {}", bank, pin);
            return Err(ProbeError::InvalidPin);
        }
        Ok(())
    }

    pub fn set_mux(&self, bank: u32, pin: u32, mux: Mux) {
        let addr = self.mux_reg_base[bank as usize];
        let cleared = Self::read_reg(addr) & !(0x3 << (pin * 2));

        debug!("pinmux: bank {}, pin {}, {:?}", bank, pin, mux);

        match mux {
            Mux::Gpio => Self::write_reg(addr, cleared),
            Mux::PeriphA => Self::write_reg(addr, cleared | (0x2 << (pin * 2))),
            Mux::PeriphB => Self::write_reg(addr, cleared | (0x3 << (pin * 2))),
        }
    }

    pub fn set_pull(&self, bank: u32, pin: u32, pull: Pull) {
        let addr = self.conf_reg_base[bank as usize];
        let value = Self::read_reg(addr);

        match pull {
            // Setting the UP bit disables the internal pull-up.
            Pull::None => Self::write_reg(addr, value | (1 << pin)),
            Pull::Up => Self::write_reg(addr, value & !(1 << pin)),
        }
    }

    /// Applies a whole pin group, validating every entry first.
    pub fn apply(&self, states: &[PinState]) -> Result<(), ProbeError> {
        for state in states {
            self.check_pin(state.bank, state.pin)?;
        }

        for state in states {
            self.set_mux(state.bank, state.pin, state.mux);
            self.set_pull(state.bank, state.pin, state.pull);
        }

        Ok(())
    }
}

impl Default for Pinctrl {
    fn default() -> Self {
        Self::new()
    }
}
