//! JZ2440 board bring-up.
//!
//! Binds every peripheral to its device-tree node in dependency order:
//! clocks first, then the console, the timebase and finally the SDI
//! controller. Any probe failure aborts the whole bring-up; there is no
//! degraded mode.

use fdt_parser::Fdt;
use log::{LevelFilter, info};

use crate::clock::{ClockId, ClockUnit};
use crate::console;
use crate::gpio;
use crate::pinctrl::{Mux, PinState, Pinctrl, Pull};
use crate::sdi::{Mmio, SdiDeps, SdiHost};
use crate::timer::PwmTimer;
use crate::uart::Uart;
use crate::wdt::Watchdog;
use crate::{Peripheral, ProbeError};

pub const SDRAM_BASE: usize = 0x3000_0000;
pub const SDRAM_SIZE: usize = 0x0400_0000; /* 64 MB */
pub const WDT_BASE: usize = 0x5300_0000;

/// Compile-time board knowledge: crystal, console setup and the SDI
/// frequency floor. The SDI ceiling is derived from the live PCLK at
/// probe time.
#[derive(Debug, Clone, Copy)]
pub struct BoardConfig {
    pub xtal_hz: u64,
    pub console_baud: u32,
    pub log_level: LevelFilter,
    pub sdi_f_min: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            xtal_hz: 12_000_000,
            console_baud: 115_200,
            log_level: LevelFilter::Info,
            sdi_f_min: 400_000,
        }
    }
}

/// TXD0/RXD0 on GPH2/GPH3.
const UART0_PINS: [PinState; 2] = [
    PinState {
        bank: 7,
        pin: 2,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
    PinState {
        bank: 7,
        pin: 3,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
];

/// SDCLK, SDCMD and SDDAT0..3 on GPE5..GPE10.
const SDI_PINS: [PinState; 6] = [
    PinState {
        bank: 4,
        pin: 5,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
    PinState {
        bank: 4,
        pin: 6,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
    PinState {
        bank: 4,
        pin: 7,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
    PinState {
        bank: 4,
        pin: 8,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
    PinState {
        bank: 4,
        pin: 9,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
    PinState {
        bank: 4,
        pin: 10,
        mux: Mux::PeriphA,
        pull: Pull::None,
    },
];

/// Card detect on GPG8, active low.
const CARD_DETECT_PIN: u32 = 8;

pub struct Jz2440 {
    pub clocks: ClockUnit,
    pub pinctrl: Pinctrl,
    pub timer: PwmTimer,
    pub sdi: SdiHost<Mmio, PwmTimer>,
    wdt: Watchdog,
}

/// Binds one driver to the first node matching its compatible strings.
fn bind<P: Peripheral>(fdt: &Fdt, deps: P::Deps) -> Result<P, ProbeError> {
    let node = fdt
        .find_compatible(P::COMPATIBLE)
        .next()
        .ok_or(ProbeError::MissingNode(P::COMPATIBLE[0]))?;
    P::probe(&node, deps)
}

impl Jz2440 {
    pub fn bring_up(fdt: &Fdt, cfg: BoardConfig) -> Result<Self, ProbeError> {
        let clocks = bind::<ClockUnit>(fdt, cfg.xtal_hz)?;

        let pinctrl = Pinctrl::new();
        pinctrl.apply(&UART0_PINS)?;

        let uart = bind::<Uart>(fdt, clocks.claim(ClockId::PclkUart0))?;
        uart.set_baudrate(cfg.console_baud);
        console::init(uart, cfg.log_level);

        info!(
            "S3C2440: FCLK {} Hz, HCLK {} Hz, PCLK {} Hz",
            clocks.fclk(),
            clocks.hclk(),
            clocks.pclk()
        );

        let timer = bind::<PwmTimer>(fdt, clocks.claim(ClockId::PclkPwmTimer))?;

        pinctrl.apply(&SDI_PINS)?;
        let card_detect = gpio::BANK_G.input_line(CARD_DETECT_PIN, true);

        let sdi = bind::<SdiHost<Mmio, PwmTimer>>(
            fdt,
            SdiDeps {
                clk: clocks.claim(ClockId::PclkSdi),
                timebase: timer.clone(),
                card_detect: Some(card_detect),
                f_min: cfg.sdi_f_min,
            },
        )?;

        info!("JZ2440 bring-up complete");

        Ok(Self {
            clocks,
            pinctrl,
            timer,
            sdi,
            wdt: Watchdog::new(WDT_BASE),
        })
    }

    /// Resets the CPU by letting the watchdog time out.
    pub fn reset_cpu(&self) -> ! {
        self.wdt.force_reset()
    }
}
