//! Command issue and response capture.

use log::{debug, warn};

use crate::SdiError;
use crate::timer::Timebase;

use super::regs::*;
use super::SdiHost;

/// Response format a command expects on the CMD line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    None,
    /// 32 bits, delivered in response register 0.
    Short,
    /// 128 bits, delivered in response registers 0..3.
    Long,
}

/// One card command. Immutable once submitted.
#[derive(Debug, Clone, Copy)]
pub struct Command {
    /// 6-bit command opcode.
    pub index: u8,
    pub argument: u32,
    pub response: ResponseKind,
}

impl Command {
    pub const fn new(index: u8, argument: u32, response: ResponseKind) -> Self {
        Self {
            index,
            argument,
            response,
        }
    }
}

/// Captured response words. Only word 0 is meaningful for a short response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Response {
    pub raw: [u32; 4],
}

impl Response {
    pub fn as_short(&self) -> u32 {
        self.raw[0]
    }

    pub fn as_long(&self) -> [u32; 4] {
        self.raw
    }
}

impl<R: SdiRegs, T: Timebase> SdiHost<R, T> {
    /// Clears every pending command, data and FIFO status bit. Runs before
    /// each command, data or not, so a stale flag from the previous command
    /// cannot satisfy the next completion poll.
    pub(super) fn clear_status(&self) {
        self.regs.write_reg(SDICSTA, 0xffff_ffff);
        self.regs.write_reg(SDIDSTA, 0xffff_ffff);
        self.regs.write_reg(SDIFSTA, 0xffff_ffff);
    }

    /// Arms the command register and waits for the controller to report it
    /// sent (or answered). The wait is a monotonic deadline, with an
    /// iteration cap underneath in case the timebase stalls.
    pub(super) fn issue_command(&self, cmd: &Command) -> Result<(), SdiError> {
        let mut ccon = (cmd.index as u32) & SDICMDCON_INDEX;
        ccon |= SDICMDCON_SENDERHOST | SDICMDCON_CMDSTART;

        let mut wait_bit = SDICMDSTAT_CMDSENT;

        if cmd.response != ResponseKind::None {
            ccon |= SDICMDCON_WAITRSP;
            wait_bit = SDICMDSTAT_RSPFIN;
        }

        if cmd.response == ResponseKind::Long {
            ccon |= SDICMDCON_LONGRSP;
        }

        debug!(
            "issuing CMD{}: arg={:#010x}, ccon={:#x}",
            cmd.index, cmd.argument, ccon
        );

        self.regs.write_reg(SDICARG, cmd.argument);
        self.regs.write_reg(SDICCON, ccon);

        let deadline = self.timebase.now_us() + super::CMD_TIMEOUT_US;
        let mut spins = super::POLL_SPIN_CAP;
        let mut done = false;

        loop {
            let csta = self.regs.read_reg(SDICSTA);

            if csta & wait_bit != 0 {
                done = true;
                break;
            }

            if csta & SDICMDSTAT_CMDTIMEOUT != 0 {
                break;
            }

            spins -= 1;
            if spins == 0 || self.timebase.now_us() >= deadline {
                break;
            }
        }

        // Consume the response-state bits either way.
        let csta = self.regs.read_reg(SDICSTA);
        self.regs.write_reg(SDICSTA, csta | SDICMDSTAT_RSP_GROUP);

        if !done {
            warn!("CMD{} timed out", cmd.index);
            return Err(SdiError::CommandTimeout);
        }

        Ok(())
    }

    /// Reads back the response registers. Valid only after [`issue_command`]
    /// reported success; the registers hold stale values otherwise.
    ///
    /// [`issue_command`]: SdiHost::issue_command
    pub(super) fn read_response(&self, kind: ResponseKind) -> Response {
        let mut response = Response::default();

        match kind {
            ResponseKind::None => {}
            ResponseKind::Short => {
                response.raw[0] = self.regs.read_reg(SDIRSP0);
            }
            ResponseKind::Long => {
                response.raw[0] = self.regs.read_reg(SDIRSP0);
                response.raw[1] = self.regs.read_reg(SDIRSP1);
                response.raw[2] = self.regs.read_reg(SDIRSP2);
                response.raw[3] = self.regs.read_reg(SDIRSP3);
            }
        }

        response
    }
}
