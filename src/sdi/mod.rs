//! S3C2440 SDI host controller.
//!
//! The controller is driven strictly by polling: no interrupts, no DMA.
//! One command executes at a time (command phase, optional data phase,
//! completion wait) and every failure returns the controller to idle.
//! Nothing is retried here; retry policy belongs to the caller.

mod cmd;
mod data;
#[cfg(test)]
mod mock;
pub mod regs;

use fdt_parser::Node;
use log::{debug, info};

use crate::clock::Clk;
use crate::gpio::InputLine;
use crate::timer::{PwmTimer, Timebase};
use crate::{Peripheral, ProbeError, SdiError, div_round_up, node_reg_base};

pub use cmd::{Command, Response, ResponseKind};
pub use data::{BusWidth, DataBuffer, DataDescriptor};
pub use regs::{DataStatus, Mmio, SdiRegs};

/// Command completion deadline, microseconds.
const CMD_TIMEOUT_US: u64 = 100_000;
/// Longest tolerated stretch without FIFO progress during a data phase.
const DATA_STALL_US: u64 = 250_000;
/// Iteration bound kept as a safety cap under the deadlines, in case the
/// timebase itself stops advancing.
const POLL_SPIN_CAP: u32 = 100_000;

/// Largest block length the controller is configured for at reset.
pub const MAX_BLOCK_LEN: u32 = 512;

/// Data/busy timer programmed at init, in card clock cycles.
const DATA_TIMER_VALUE: u32 = 0x7f_ffff;

/// Operating-frequency window for the card clock.
#[derive(Debug, Clone, Copy)]
pub struct SdiConfig {
    pub f_min: u64,
    pub f_max: u64,
}

/// Collaborators the SDI controller needs at bind time.
pub struct SdiDeps {
    pub clk: Clk,
    pub timebase: PwmTimer,
    pub card_detect: Option<InputLine>,
    pub f_min: u64,
}

/// One SDI controller instance. Exclusively owns its register block and
/// clock handle; a second controller would be an independent owner of a
/// disjoint block, never shared state.
pub struct SdiHost<R: SdiRegs, T: Timebase> {
    regs: R,
    clk: Clk,
    timebase: T,
    card_detect: Option<InputLine>,
    cfg: SdiConfig,
}

impl<R: SdiRegs, T: Timebase> SdiHost<R, T> {
    pub fn new(
        regs: R,
        clk: Clk,
        timebase: T,
        card_detect: Option<InputLine>,
        cfg: SdiConfig,
    ) -> Self {
        Self {
            regs,
            clk,
            timebase,
            card_detect,
            cfg,
        }
    }

    /// Full controller reset and baseline configuration: data timer, max
    /// block size, interrupts masked off (this driver never uses them),
    /// FIFO reset and the clock edge used for sampling.
    pub fn init(&mut self) {
        info!("init SDI controller");

        self.regs.write_reg(regs::SDICON, regs::SDICON_SDRESET);
        self.timebase.delay_us(10_000);

        self.regs.write_reg(regs::SDIDTIMER, DATA_TIMER_VALUE);
        self.regs.write_reg(regs::SDIBSIZE, MAX_BLOCK_LEN);
        self.regs.write_reg(regs::SDIIMSK, 0x0);

        self.regs.write_reg(
            regs::SDICON,
            regs::SDICON_FIFORESET | regs::SDICON_CLOCKTYPE,
        );
        self.timebase.delay_us(125_000);
    }

    /// Reprograms the prescaler for a new card clock. The divider is
    /// recomputed from the upstream rate on every request, never cached.
    pub fn set_rate(&mut self, target_hz: u64) -> Result<(), SdiError> {
        if target_hz == 0 {
            return Err(SdiError::InvalidConfig("target clock must be non-zero"));
        }

        let target = target_hz.min(self.cfg.f_max).max(self.cfg.f_min);
        let rate = self.clk.rate();

        let mut divider = div_round_up(rate, target);
        if divider > 0 {
            divider -= 1;
        }

        debug!(
            "set_rate: upstream {} Hz, target {} Hz, divider {}",
            rate, target, divider
        );

        self.regs.write_reg(regs::SDIPRE, divider as u32);
        self.timebase.delay_us(125_000);

        Ok(())
    }

    /// Polls the card-detect line. No debounce; a read racing a physical
    /// insert or eject is unspecified.
    pub fn card_present(&self) -> bool {
        match &self.card_detect {
            Some(line) => line.is_active(),
            None => true,
        }
    }

    /// The slot has no write-protect switch wired up.
    pub fn write_protected(&self) -> bool {
        false
    }

    /// Executes one command, with an optional block data phase. Returns the
    /// captured response on success; any failure aborts the whole command
    /// and leaves the controller idle.
    pub fn execute(
        &mut self,
        cmd: &Command,
        data: Option<DataDescriptor<'_>>,
    ) -> Result<Response, SdiError> {
        let mut data = data;

        if let Some(descriptor) = &data {
            descriptor.validate()?;
        }

        self.clear_status();

        if let Some(descriptor) = &data {
            self.arm_data(descriptor);
        }

        if let Err(err) = self.issue_command(cmd) {
            if data.is_some() {
                self.regs.write_reg(regs::SDIDCON, 0);
            }
            return Err(err);
        }

        let response = self.read_response(cmd.response);

        if let Some(descriptor) = data.as_mut() {
            self.run_data_phase(descriptor)?;
            self.wait_transfer_done()?;
        }

        Ok(response)
    }
}

impl Peripheral for SdiHost<Mmio, PwmTimer> {
    const COMPATIBLE: &'static [&'static str] = &["samsung,s3c2440-mmc"];

    type Deps = SdiDeps;

    fn probe(node: &Node, deps: Self::Deps) -> Result<Self, ProbeError> {
        let base_addr = node_reg_base(node)?;
        deps.clk.enable();

        let rate = deps.clk.rate();
        if rate == 0 {
            return Err(ProbeError::ClockUnavailable);
        }

        let cfg = SdiConfig {
            f_min: deps.f_min,
            f_max: rate / 2,
        };

        debug!("SDI @{:#x}: upstream clock {} Hz", base_addr, rate);

        let mut host = SdiHost::new(
            Mmio::new(base_addr),
            deps.clk,
            deps.timebase,
            deps.card_detect,
            cfg,
        );
        host.init();

        Ok(host)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{FakeClock, MockSdi};
    use super::regs::*;
    use super::*;
    use crate::clock::{CLKDIVN, ClockId, ClockUnit, MPLLCON};

    /// 400 MHz FCLK off the 12 MHz crystal, HCLK = FCLK/4, PCLK = HCLK/2:
    /// the SDI peripheral clock comes out at 50 MHz.
    fn test_clk() -> Clk {
        let mem = Box::leak(Box::new([0u32; 8]));
        mem[MPLLCON / 4] = 0x5c011;
        mem[CLKDIVN / 4] = 0x05;

        let unit = ClockUnit::new(mem.as_ptr() as usize, 12_000_000);
        assert_eq!(unit.pclk(), 50_000_000);
        unit.claim(ClockId::PclkSdi)
    }

    fn test_host(mock: &MockSdi) -> SdiHost<MockSdi, FakeClock> {
        SdiHost::new(
            mock.clone(),
            test_clk(),
            FakeClock::new(),
            None,
            SdiConfig {
                f_min: 400_000,
                f_max: 25_000_000,
            },
        )
    }

    #[test]
    fn init_programs_controller_baseline() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        host.init();

        assert_eq!(mock.reg(SDIDTIMER), DATA_TIMER_VALUE);
        assert_eq!(mock.reg(SDIBSIZE), MAX_BLOCK_LEN);
        assert_eq!(mock.reg(SDIIMSK), 0);
        assert_eq!(mock.reg(SDICON), SDICON_FIFORESET | SDICON_CLOCKTYPE);
    }

    #[test]
    fn short_response_touches_word_zero_only() {
        let mock = MockSdi::new();
        mock.state().response = [0xaabb_ccdd, 0x1111_1111, 0x2222_2222, 0x3333_3333];

        let mut host = test_host(&mock);
        let cmd = Command::new(13, 0x1234, ResponseKind::Short);
        let response = host.execute(&cmd, None).unwrap();

        assert_eq!(response.raw, [0xaabb_ccdd, 0, 0, 0]);
        assert_eq!(mock.state().rsp_order, vec![SDIRSP0]);
    }

    #[test]
    fn long_response_reads_all_four_words_in_order() {
        let mock = MockSdi::new();
        mock.state().response = [0x0102_0304, 0x0506_0708, 0x090a_0b0c, 0x0d0e_0f10];

        let mut host = test_host(&mock);
        let cmd = Command::new(2, 0, ResponseKind::Long);
        let response = host.execute(&cmd, None).unwrap();

        assert_eq!(
            response.raw,
            [0x0102_0304, 0x0506_0708, 0x090a_0b0c, 0x0d0e_0f10]
        );
        assert_eq!(
            mock.state().rsp_order,
            vec![SDIRSP0, SDIRSP1, SDIRSP2, SDIRSP3]
        );
    }

    #[test]
    fn command_without_response_reads_no_response_register() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        let cmd = Command::new(0, 0, ResponseKind::None);
        let response = host.execute(&cmd, None).unwrap();

        assert_eq!(response.raw, [0; 4]);
        assert_eq!(mock.state().rsp_reads, 0);
    }

    #[test]
    fn command_timeout_reads_no_response() {
        let mock = MockSdi::new();
        mock.state().respond = false;

        let mut host = test_host(&mock);
        let cmd = Command::new(1, 0, ResponseKind::Short);

        assert_eq!(host.execute(&cmd, None), Err(SdiError::CommandTimeout));
        assert_eq!(mock.state().rsp_reads, 0);
    }

    #[test]
    fn write_then_read_back_round_trip() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        let pattern: Vec<u8> = (0..64u32).map(|i| (i * 7 + 3) as u8).collect();

        let write = Command::new(24, 0, ResponseKind::Short);
        host.execute(
            &write,
            Some(DataDescriptor {
                block_size: 32,
                block_count: 2,
                width: BusWidth::Four,
                buffer: DataBuffer::Write(&pattern),
            }),
        )
        .unwrap();

        let mut readback = vec![0u8; 64];
        let read = Command::new(17, 0, ResponseKind::Short);
        host.execute(
            &read,
            Some(DataDescriptor {
                block_size: 32,
                block_count: 2,
                width: BusWidth::Four,
                buffer: DataBuffer::Read(&mut readback),
            }),
        )
        .unwrap();

        assert_eq!(readback, pattern);
        // Success path returns the controller to idle.
        assert_eq!(mock.reg(SDIDCON), 0);
    }

    #[test]
    fn status_clear_is_idempotent() {
        let mock = MockSdi::new();
        let host = test_host(&mock);

        mock.set_reg(SDICSTA, 0xffff_ffff);
        mock.set_reg(SDIDSTA, 0xffff_ffff);
        mock.set_reg(SDIFSTA, 0xffff_ffff);

        host.clear_status();
        let once = (mock.reg(SDICSTA), mock.reg(SDIDSTA), mock.reg(SDIFSTA));

        host.clear_status();
        let twice = (mock.reg(SDICSTA), mock.reg(SDIDSTA), mock.reg(SDIFSTA));

        assert_eq!(once, (0, 0, 0));
        assert_eq!(once, twice);
    }

    #[test]
    fn max_block_count_is_accepted() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        let mut buf = vec![0u8; 2047 * 4];
        let cmd = Command::new(18, 0, ResponseKind::Short);
        let outcome = host.execute(
            &cmd,
            Some(DataDescriptor {
                block_size: 4,
                block_count: 2047,
                width: BusWidth::Four,
                buffer: DataBuffer::Read(&mut buf),
            }),
        );

        assert!(outcome.is_ok());
    }

    #[test]
    fn oversized_block_count_rejected_before_any_register_write() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);
        let writes_before = mock.state().reg_writes;

        let mut buf = vec![0u8; 2048 * 4];
        let cmd = Command::new(18, 0, ResponseKind::Short);
        let outcome = host.execute(
            &cmd,
            Some(DataDescriptor {
                block_size: 4,
                block_count: 2048,
                width: BusWidth::Four,
                buffer: DataBuffer::Read(&mut buf),
            }),
        );

        assert!(matches!(outcome, Err(SdiError::InvalidConfig(_))));
        assert_eq!(mock.state().reg_writes, writes_before);
    }

    #[test]
    fn mismatched_buffer_geometry_is_rejected() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        let mut buf = vec![0u8; 4];
        let cmd = Command::new(17, 0, ResponseKind::Short);
        let outcome = host.execute(
            &cmd,
            Some(DataDescriptor {
                block_size: 8,
                block_count: 1,
                width: BusWidth::One,
                buffer: DataBuffer::Read(&mut buf),
            }),
        );

        assert!(matches!(outcome, Err(SdiError::InvalidConfig(_))));
    }

    #[test]
    fn crc_fail_mid_transfer_aborts_whole_command() {
        let mock = MockSdi::new();
        {
            let mut state = mock.state();
            state.storage = vec![0x5a; 32];
            // Flag a CRC failure once two of the eight words have moved.
            state.inject_after_words = Some((2, DataStatus::CRC_FAIL.bits()));
        }

        let mut host = test_host(&mock);
        let mut buf = vec![0u8; 32];
        let cmd = Command::new(17, 0, ResponseKind::Short);
        let outcome = host.execute(
            &cmd,
            Some(DataDescriptor {
                block_size: 32,
                block_count: 1,
                width: BusWidth::Four,
                buffer: DataBuffer::Read(&mut buf),
            }),
        );

        assert_eq!(
            outcome,
            Err(SdiError::DataFault {
                status: DataStatus::CRC_FAIL,
                bytes_remaining: 24,
            })
        );
        // The error path disarms the data controller as well.
        assert_eq!(mock.reg(SDIDCON), 0);
    }

    #[test]
    fn fifo_starvation_hits_the_data_deadline() {
        let mock = MockSdi::new();
        mock.state().starve_fifo = true;

        let mut host = test_host(&mock);
        let mut buf = vec![0u8; 16];
        let cmd = Command::new(17, 0, ResponseKind::Short);
        let outcome = host.execute(
            &cmd,
            Some(DataDescriptor {
                block_size: 16,
                block_count: 1,
                width: BusWidth::One,
                buffer: DataBuffer::Read(&mut buf),
            }),
        );

        assert_eq!(
            outcome,
            Err(SdiError::DataTimeout {
                bytes_remaining: 16
            })
        );
    }

    #[test]
    fn missing_transfer_finish_times_out() {
        let mock = MockSdi::new();
        {
            let mut state = mock.state();
            state.storage = vec![0x11; 16];
            state.finish_data = false;
        }

        let mut host = test_host(&mock);
        let mut buf = vec![0u8; 16];
        let cmd = Command::new(17, 0, ResponseKind::Short);
        let outcome = host.execute(
            &cmd,
            Some(DataDescriptor {
                block_size: 16,
                block_count: 1,
                width: BusWidth::One,
                buffer: DataBuffer::Read(&mut buf),
            }),
        );

        assert_eq!(outcome, Err(SdiError::DataTimeout { bytes_remaining: 0 }));
    }

    #[test]
    fn divider_follows_the_upstream_rate() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        // 50 MHz source, 25 MHz target: ceil(50/25) - 1 = 1.
        host.set_rate(25_000_000).unwrap();
        assert_eq!(mock.reg(SDIPRE), 1);

        // 400 kHz identification clock: ceil(50e6/4e5) - 1 = 124.
        host.set_rate(400_000).unwrap();
        assert_eq!(mock.reg(SDIPRE), 124);
    }

    #[test]
    fn zero_target_clock_is_rejected() {
        let mock = MockSdi::new();
        let mut host = test_host(&mock);

        assert!(matches!(
            host.set_rate(0),
            Err(SdiError::InvalidConfig(_))
        ));
    }
}
