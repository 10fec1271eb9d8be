//! Board console over UART0, plus the `log` backend every driver writes to.

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use crate::uart::Uart;

static CONSOLE: Mutex<Option<Uart>> = Mutex::new(None);

static LOGGER: SerialLogger = SerialLogger;

/// Installs the UART as the system console and log sink. Output written
/// before this point is dropped.
pub fn init(uart: Uart, level: LevelFilter) {
    *CONSOLE.lock() = Some(uart);

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Writes a byte to the console.
pub fn putchar(c: u8) {
    if let Some(uart) = CONSOLE.lock().as_ref() {
        match c {
            b'\n' => {
                uart.putchar(b'\r');
                uart.putchar(b'\n');
            }
            c => uart.putchar(c),
        }
    }
}

/// Reads a byte from the console, or returns [`None`] if no input is available.
pub fn getchar() -> Option<u8> {
    CONSOLE.lock().as_ref().and_then(|uart| uart.getchar())
}

/// Write a slice of bytes to the console.
pub fn write_bytes(bytes: &[u8]) {
    for c in bytes {
        putchar(*c);
    }
}

struct Stdout;

impl fmt::Write for Stdout {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        write_bytes(s.as_bytes());
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    let _ = Stdout.write_fmt(args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::console::_print(core::format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {{
        $crate::console::_print(core::format_args!($($arg)*));
        $crate::print!("\n");
    }};
}

struct SerialLogger;

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            crate::println!("[{:>5}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
