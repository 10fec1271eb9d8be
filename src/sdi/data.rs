//! Polled data engine: one 32-bit word per FIFO-ready condition until the
//! byte count is exhausted, with the error mask checked on every turn.

use log::warn;

use crate::SdiError;
use crate::timer::Timebase;

use super::regs::*;
use super::SdiHost;

/// Data lines used for the transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWidth {
    One,
    Four,
}

/// Caller-owned transfer buffer; the variant fixes the direction.
pub enum DataBuffer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// Geometry and buffer of one block transfer, attached to a command. The
/// buffer is borrowed for the duration of that command only.
pub struct DataDescriptor<'a> {
    pub block_size: u32,
    pub block_count: u32,
    pub width: BusWidth,
    pub buffer: DataBuffer<'a>,
}

impl DataDescriptor<'_> {
    /// Rejects impossible geometry before anything touches the controller.
    pub(super) fn validate(&self) -> Result<(), SdiError> {
        if self.block_count == 0 || self.block_count > SDIDCON_BLKNUM {
            return Err(SdiError::InvalidConfig(
                "block count exceeds the 11-bit block counter",
            ));
        }

        if self.block_size == 0 {
            return Err(SdiError::InvalidConfig("block size must be non-zero"));
        }

        let total = self.block_size as u64 * self.block_count as u64;

        if total % 4 != 0 {
            return Err(SdiError::InvalidConfig(
                "transfers are word-sized; byte count must be a multiple of 4",
            ));
        }

        if self.len() as u64 != total {
            return Err(SdiError::InvalidConfig(
                "buffer length must equal block_size * block_count",
            ));
        }

        Ok(())
    }

    pub(super) fn is_read(&self) -> bool {
        matches!(self.buffer, DataBuffer::Read(_))
    }

    pub(super) fn len(&self) -> usize {
        match &self.buffer {
            DataBuffer::Read(buf) => buf.len(),
            DataBuffer::Write(buf) => buf.len(),
        }
    }
}

impl<R: SdiRegs, T: Timebase> SdiHost<R, T> {
    /// Programs block geometry and the data-control word. Must run before
    /// the command is armed: the controller starts the data phase on its own
    /// once the matching command completes.
    pub(super) fn arm_data(&self, descriptor: &DataDescriptor) {
        self.regs.write_reg(SDIBSIZE, descriptor.block_size);

        let mut dcon = descriptor.block_count & SDIDCON_BLKNUM;
        dcon |= SDIDCON_BLOCKMODE;
        dcon |= SDIDCON_DS_WORD | SDIDCON_DATSTART;

        if descriptor.width == BusWidth::Four {
            dcon |= SDIDCON_WIDEBUS;
        }

        if descriptor.is_read() {
            dcon |= SDIDCON_RXAFTERCMD;
            dcon |= SDIDCON_XFER_RXSTART;
        } else {
            dcon |= SDIDCON_TXAFTERRESP;
            dcon |= SDIDCON_XFER_TXSTART;
        }

        self.regs.write_reg(SDIDCON, dcon);
    }

    /// Pumps the FIFO one word at a time until the byte count is exhausted.
    /// A stall deadline bounds the wait for FIFO activity, so a dead
    /// controller that raises no error flag cannot hang the caller.
    pub(super) fn run_data_phase(&self, descriptor: &mut DataDescriptor) -> Result<(), SdiError> {
        let total = descriptor.len();
        let mut offset = 0usize;
        let mut stall_deadline = self.timebase.now_us() + super::DATA_STALL_US;

        while offset < total {
            let dsta = self.regs.read_reg(SDIDSTA);
            let fsta = self.regs.read_reg(SDIFSTA);

            let status = DataStatus::from_bits_truncate(dsta);
            if status.intersects(DataStatus::ERROR_MASK) {
                warn!("data error (sdidsta={:#010x})", dsta);
                self.regs.write_reg(SDIDCON, 0);
                return Err(SdiError::DataFault {
                    status: status & DataStatus::ERROR_MASK,
                    bytes_remaining: total - offset,
                });
            }

            match &mut descriptor.buffer {
                DataBuffer::Read(buf) => {
                    // Nothing to drain until a whole word is in the FIFO.
                    if fsta & SDIFSTA_COUNTMASK < 4 {
                        if self.timebase.now_us() >= stall_deadline {
                            self.regs.write_reg(SDIDCON, 0);
                            return Err(SdiError::DataTimeout {
                                bytes_remaining: total - offset,
                            });
                        }
                        continue;
                    }

                    let word = self.regs.read_reg(SDIDAT);
                    buf[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
                }
                DataBuffer::Write(buf) => {
                    // TX FIFO must be below half full before the next word.
                    if fsta & SDIFSTA_TFHALF == 0 {
                        if self.timebase.now_us() >= stall_deadline {
                            self.regs.write_reg(SDIDCON, 0);
                            return Err(SdiError::DataTimeout {
                                bytes_remaining: total - offset,
                            });
                        }
                        continue;
                    }

                    let mut word = [0u8; 4];
                    word.copy_from_slice(&buf[offset..offset + 4]);
                    self.regs.write_reg(SDIDAT, u32::from_le_bytes(word));
                }
            }

            offset += 4;
            stall_deadline = self.timebase.now_us() + super::DATA_STALL_US;
        }

        Ok(())
    }

    /// Bounded poll for the transfer-finished bit once the byte count hits
    /// zero, then returns the controller to idle.
    pub(super) fn wait_transfer_done(&self) -> Result<(), SdiError> {
        let deadline = self.timebase.now_us() + super::DATA_STALL_US;
        let mut spins = super::POLL_SPIN_CAP;

        loop {
            let status = DataStatus::from_bits_truncate(self.regs.read_reg(SDIDSTA));

            if status.contains(DataStatus::XFER_FINISH) {
                break;
            }

            if status.contains(DataStatus::DATA_TIMEOUT) {
                warn!("data timeout waiting for transfer finish");
                self.regs.write_reg(SDIDCON, 0);
                return Err(SdiError::DataTimeout { bytes_remaining: 0 });
            }

            spins -= 1;
            if spins == 0 || self.timebase.now_us() >= deadline {
                self.regs.write_reg(SDIDCON, 0);
                return Err(SdiError::DataTimeout { bytes_remaining: 0 });
            }
        }

        self.regs.write_reg(SDIDSTA, SDIDSTA_CLEAR);
        self.regs.write_reg(SDIDCON, 0);

        Ok(())
    }
}
