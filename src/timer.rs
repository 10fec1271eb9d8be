//! PWM timer 4 as the boot-time monotonic timebase.
//!
//! Timer 4 has no output pin, so it is free for timekeeping: prescaler 16,
//! divider 2, auto-reload every 10 ms. The 16-bit down-counter is folded
//! into a monotonic tick count on every read, which means the counter must
//! be observed at least once per reload period or ticks are lost.

use core::cell::Cell;

use fdt_parser::Node;
use log::debug;

use crate::clock::Clk;
use crate::{Peripheral, ProbeError, node_reg_base};

pub const TCFG0: usize = 0x00;
pub const TCFG1: usize = 0x04;
pub const TCON: usize = 0x08;
pub const TCNTB4: usize = 0x3c;
pub const TCNTO4: usize = 0x40;

/// Monotonic microsecond clock. Every bounded wait in the SDI driver
/// measures this instead of counting loop iterations.
pub trait Timebase {
    fn now_us(&self) -> u64;

    fn delay_us(&self, us: u64) {
        let end = self.now_us() + us;
        while self.now_us() < end {}
    }
}

#[derive(Debug, Clone)]
pub struct PwmTimer {
    base_addr: usize,
    rate: u64,
    period: u32,
    last: Cell<u32>,
    total: Cell<u64>,
}

impl PwmTimer {
    pub fn new(base_addr: usize, clk: Clk) -> Result<Self, ProbeError> {
        // Prescaler for timer 4 is 16, on top of the fixed divider of 2.
        let rate = clk.rate() / (2 * 16);
        if rate == 0 {
            return Err(ProbeError::ClockUnavailable);
        }

        let period = (rate / 100) as u32;
        debug!("timer rate = {}, reload = {}", rate, period);

        let timer = Self {
            base_addr,
            rate,
            period,
            last: Cell::new(period),
            total: Cell::new(0),
        };

        timer.write_reg(TCFG0, 0x0f00);
        timer.write_reg(TCNTB4, period);

        // Auto reload, manual update of timer 4.
        let tmr = (timer.read_reg(TCON) & !0x70_0000) | 0x60_0000;
        timer.write_reg(TCON, tmr);

        // Auto reload, start timer 4.
        let tmr = (tmr & !0x70_0000) | 0x50_0000;
        timer.write_reg(TCON, tmr);

        Ok(timer)
    }

    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset) as *mut u32, value) }
    }

    /// Accumulated ticks since probe, folding down-counter wraparounds.
    pub fn counter(&self) -> u64 {
        let now = self.read_reg(TCNTO4) & 0xffff;
        let last = self.last.get();

        let delta = if last >= now {
            last - now
        } else {
            // The counter reloaded since the last observation.
            last + self.period - now
        };

        self.last.set(now);
        self.total.set(self.total.get() + delta as u64);
        self.total.get()
    }

    pub fn tick_rate(&self) -> u64 {
        self.rate
    }
}

impl Timebase for PwmTimer {
    fn now_us(&self) -> u64 {
        self.counter() * 1_000_000 / self.rate
    }
}

impl Peripheral for PwmTimer {
    const COMPATIBLE: &'static [&'static str] = &["samsung,s3c2440-timer"];

    type Deps = Clk;

    fn probe(node: &Node, clk: Self::Deps) -> Result<Self, ProbeError> {
        let base_addr = node_reg_base(node)?;
        clk.enable();
        PwmTimer::new(base_addr, clk)
    }
}
