//! S3C2440 UART, polled mode only.

use fdt_parser::Node;
use log::debug;

use crate::clock::Clk;
use crate::{Peripheral, ProbeError, node_reg_base};

pub const ULCON: usize = 0x00;
pub const UCON: usize = 0x04;
pub const UFCON: usize = 0x08;
pub const UMCON: usize = 0x0c;
pub const UTRSTAT: usize = 0x10;
pub const UERSTAT: usize = 0x14;
pub const UFSTAT: usize = 0x18;
pub const UMSTAT: usize = 0x1c;
pub const UTXH: usize = 0x20;
pub const URXH: usize = 0x24;
pub const UBRDIV: usize = 0x28;

const UTRSTAT_RX_READY: u32 = 1 << 0;
const UTRSTAT_TX_EMPTY: u32 = 1 << 2;

pub struct Uart {
    base_addr: usize,
    clk: Clk,
}

impl Uart {
    pub fn new(base_addr: usize, clk: Clk) -> Self {
        Self { base_addr, clk }
    }

    fn read_reg(&self, offset: usize) -> u32 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset) as *const u32) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset) as *mut u32, value) }
    }

    fn read_reg8(&self, offset: usize) -> u8 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset) as *const u8) }
    }

    fn write_reg8(&self, offset: usize, value: u8) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset) as *mut u8, value) }
    }

    /// 8N1, polled mode off PCLK, FIFO and flow control disabled.
    pub fn init(&self) {
        self.write_reg(ULCON, 0x03);
        self.write_reg(UCON, 0x05);
        self.write_reg(UFCON, 0x00);
        self.write_reg(UMCON, 0x00);
    }

    pub fn set_baudrate(&self, baudrate: u32) {
        let uart_clk = self.clk.rate();
        debug!("uart_clk = {}", uart_clk);

        let value = (uart_clk / baudrate as u64) as u32;
        self.write_reg(UBRDIV, value / 16 - 1);
    }

    /// Blocks until the transmit holding register drains.
    pub fn putchar(&self, byte: u8) {
        while self.read_reg(UTRSTAT) & UTRSTAT_TX_EMPTY == 0 {}
        self.write_reg8(UTXH, byte);
    }

    /// Returns the received byte, or [`None`] if no input is available.
    pub fn getchar(&self) -> Option<u8> {
        if self.read_reg(UTRSTAT) & UTRSTAT_RX_READY == 0 {
            return None;
        }
        Some(self.read_reg8(URXH))
    }

    pub fn pending(&self, input: bool) -> bool {
        let utrstat = self.read_reg(UTRSTAT);

        if input {
            utrstat & UTRSTAT_RX_READY != 0
        } else {
            utrstat & UTRSTAT_TX_EMPTY != 0
        }
    }
}

impl Peripheral for Uart {
    const COMPATIBLE: &'static [&'static str] = &["samsung,s3c2440-uart"];

    type Deps = Clk;

    fn probe(node: &Node, clk: Self::Deps) -> Result<Self, ProbeError> {
        let base_addr = node_reg_base(node)?;
        clk.enable();

        let uart = Uart::new(base_addr, clk);
        uart.init();
        Ok(uart)
    }
}
