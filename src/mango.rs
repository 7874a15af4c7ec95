use core::convert::TryFrom;

use heapless::{consts::U16, Vec};
use log::{info, trace, warn};

use crate::builder::DEFAULT_CLOCK_HZ;
use crate::context::Context;
use crate::error::Error;
use crate::font;
use crate::frame::{Frame, HEIGHT, WIDTH};
use crate::opcode::OpCode;
use crate::quirks::Quirks;
use crate::timer::{Timer, TimerState};

/// Bytes of addressable memory
pub const MEM_SIZE: usize = 4096;
/// Address program images are copied to and executed from
pub const PROG_START: u16 = 0x200;
/// Frames per second; also the timer decrement rate
pub(crate) const FRAME_RATE: u32 = 60;

/// Whether the program is still running after a frame.
///
/// Walking off the end of addressable memory is the only normal
/// termination; there is no halt instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Progress {
    Running,
    Halted,
}

/// A chip-8 machine bound to its platform context.
///
/// Owns every piece of simulated state: memory pre-seeded with the font,
/// the register file, the bounded call stack, the display surface, the
/// timer pair and the per-frame input snapshot. The `ctx` field stays
/// public so a host can reach its own peripherals after construction.
pub struct Mango8<C: Context + Sized> {
    pub ctx: C,
    quirks: Quirks,
    v: [u8; 16],
    i: u16,
    pc: u16,
    stack: Vec<u16, U16>,
    memory: [u8; MEM_SIZE],
    frame: Frame,
    keys: [bool; 16],
    delay: Timer,
    sound: Timer,
    cycles: u64,
    cycles_per_frame: u16,
}

impl<C: Context + Sized> Mango8<C> {
    pub(crate) fn new(ctx: C, quirks: Quirks, cycles_per_frame: u16) -> Self {
        let mut memory = [0; MEM_SIZE];
        let glyphs = font::GLYPHS_BASE as usize..font::GLYPHS_BASE as usize + font::GLYPHS.len();
        memory[glyphs].copy_from_slice(&font::GLYPHS);
        Self {
            ctx,
            quirks,
            v: [0; 16],
            i: 0,
            pc: PROG_START,
            stack: Vec::new(),
            memory,
            frame: Frame::new(),
            keys: [false; 16],
            delay: Timer::new(),
            sound: Timer::new(),
            cycles: 0,
            cycles_per_frame,
        }
    }

    /// Build a machine with default quirks and clock; see [`crate::Builder`]
    /// for the configurable path
    pub fn load(ctx: C, prog: &[u8]) -> Self {
        let mut chip = Self::new(ctx, Quirks::default(), (DEFAULT_CLOCK_HZ / FRAME_RATE) as u16);
        chip.write_program(prog);
        chip
    }

    /// Copy a program image to memory from 0x200 (_start address)
    pub(crate) fn write_program(&mut self, prog: &[u8]) {
        self.memory[PROG_START as usize..]
            .iter_mut()
            .zip(prog)
            .for_each(|(mem, &prog)| *mem = prog);
    }

    /// Instructions executed since construction
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Instructions executed by each call to [`Self::tick_frame`]
    pub fn cycles_per_frame(&self) -> u16 {
        self.cycles_per_frame
    }

    fn fetch(&self) -> Result<u16, Error> {
        let pc = self.pc as usize;
        match (self.memory.get(pc), self.memory.get(pc + 1)) {
            (Some(&hi), Some(&lo)) => Ok(u16::from(hi) << 8 | u16::from(lo)),
            _ => Err(Error::OutOfBoundsFetch { pc: self.pc }),
        }
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// The program counter is advanced past the instruction before
    /// dispatch, so control-flow handlers may override it. An instruction
    /// word with no assigned meaning is reported and skipped.
    pub fn tick_chip(&mut self) -> Result<(), Error> {
        let raw = self.fetch()?;
        trace!("pc: {:#05X} opcode: {:#06X}", self.pc, raw);
        self.pc = self.pc.wrapping_add(2);
        self.cycles = self.cycles.wrapping_add(1);
        match OpCode::try_from(raw) {
            Ok(opcode) => self.execute(opcode),
            Err(_) => {
                warn!(
                    "unrecognized opcode {:#06X} at {:#05X}, treated as no-op",
                    raw,
                    self.pc.wrapping_sub(2),
                );
                Ok(())
            }
        }
    }

    /// Advance both timers by one 60 Hz step and drive the buzzer line.
    ///
    /// Runs once per frame regardless of the instruction rate; neither
    /// timer goes below zero.
    pub fn tick_timers(&mut self) {
        self.delay.decrement();
        match self.sound.decrement() {
            TimerState::On | TimerState::Finished => self.ctx.sound_on(),
            TimerState::Off => self.ctx.sound_off(),
        }
    }

    /// Run one 60 Hz frame: refresh the input snapshot, execute the
    /// configured instruction budget, decrement the timers, redraw if the
    /// display changed.
    ///
    /// The host paces calls against real time; tests call it back to back
    /// to simulate any number of frames deterministically.
    pub fn tick_frame(&mut self) -> Result<Progress, Error> {
        self.keys = self.ctx.scan_keys();
        let mut progress = Progress::Running;
        for _ in 0..self.cycles_per_frame {
            match self.tick_chip() {
                Ok(()) => (),
                Err(Error::OutOfBoundsFetch { pc }) => {
                    info!("program counter {:#05X} ran past memory, halting", pc);
                    progress = Progress::Halted;
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        self.tick_timers();
        if self.frame.take_dirty() {
            self.ctx.on_frame(self.frame.view());
        }
        Ok(progress)
    }

    fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// Effective address for memory-referencing instructions, masked to
    /// the 12-bit address space
    fn mem_index(&self, offset: u16) -> usize {
        (self.i.wrapping_add(offset) & 0x0FFF) as usize
    }
}

// OpCode handlers
impl<C: Context + Sized> Mango8<C> {
    #[rustfmt::skip]
    fn execute(&mut self, opcode: OpCode) -> Result<(), Error> {
        match opcode {
            OpCode::_00E0             => self.clear_screen(),
            OpCode::_00EE             => self.subroutine_return()?,
            OpCode::_1NNN { nnn }     => self.jump_to(nnn),
            OpCode::_2NNN { nnn }     => self.call_subroutine_at(nnn),
            OpCode::_3XNN { x, nn }   => self.skip_if_vx_eq_nn(x, nn),
            OpCode::_4XNN { x, nn }   => self.skip_if_vx_ne_nn(x, nn),
            OpCode::_5XY0 { x, y }    => self.skip_if_vx_eq_vy(x, y),
            OpCode::_6XNN { x, nn }   => self.assign_vx_nn(x, nn),
            OpCode::_7XNN { x, nn }   => self.assign_add_vx_nn(x, nn),
            OpCode::_8XY0 { x, y }    => self.assign_vx_vy(x, y),
            OpCode::_8XY1 { x, y }    => self.assign_or_vx_vy(x, y),
            OpCode::_8XY2 { x, y }    => self.assign_and_vx_vy(x, y),
            OpCode::_8XY3 { x, y }    => self.assign_xor_vx_vy(x, y),
            OpCode::_8XY4 { x, y }    => self.assign_add_vx_vy(x, y),
            OpCode::_8XY5 { x, y }    => self.assign_sub_vx_vy(x, y),
            OpCode::_8XY6 { x, y }    => self.assign_vx_shr(x, y),
            OpCode::_8XY7 { x, y }    => self.assign_vx_vy_sub_vx(x, y),
            OpCode::_8XYE { x, y }    => self.assign_vx_shl(x, y),
            OpCode::_9XY0 { x, y }    => self.skip_if_vx_ne_vy(x, y),
            OpCode::_ANNN { nnn }     => self.assign_i_nnn(nnn),
            OpCode::_BNNN { nnn }     => self.jump_with_offset(nnn),
            OpCode::_CXNN { x, nn }   => self.assign_vx_random_and_nn(x, nn),
            OpCode::_DXYN { x, y, n } => self.draw_n_at_vx_vy(x, y, n),
            OpCode::_EX9E { x }       => self.skip_if_vx_key(x),
            OpCode::_EXA1 { x }       => self.skip_if_vx_not_key(x),
            OpCode::_FX07 { x }       => self.assign_vx_delay_t(x),
            OpCode::_FX15 { x }       => self.assign_delay_t_vx(x),
            OpCode::_FX18 { x }       => self.assign_sound_t_vx(x),
            OpCode::_FX1E { x }       => self.assign_add_i_vx(x),
            OpCode::_FX29 { x }       => self.assign_i_glyph_vx(x),
            OpCode::_FX33 { x }       => self.assign_mem_at_i_bcd_of_vx(x),
            OpCode::_FX55 { x }       => self.assign_mem_at_i_v0_to_vx(x),
            OpCode::_FX65 { x }       => self.assign_v0_to_vx_mem_at_i(x),
        }
        Ok(())
    }

    /// Clear the screen
    /// 00E0
    fn clear_screen(&mut self) {
        self.frame.clear();
    }

    /// Return from a subroutine
    /// 00EE
    fn subroutine_return(&mut self) -> Result<(), Error> {
        let ret = self.stack.pop().ok_or(Error::StackUnderflow {
            pc: self.pc.wrapping_sub(2),
        })?;
        self.pc = ret;
        Ok(())
    }

    /// Jump to address NNN
    /// 1NNN
    fn jump_to(&mut self, nnn: u16) {
        self.pc = nnn;
    }

    /// Execute subroutine starting at address NNN
    ///
    /// With the stack already at capacity the call is reported and
    /// dropped whole: no push, no jump, execution continues past the
    /// call site.
    /// 2NNN
    fn call_subroutine_at(&mut self, nnn: u16) {
        if self.stack.push(self.pc).is_err() {
            warn!(
                "call stack exhausted at {:#05X}, dropping call to {:#05X}",
                self.pc.wrapping_sub(2),
                nnn,
            );
            return;
        }
        self.pc = nnn;
    }

    /// Skip the following instruction if the value of register VX equals NN
    /// 3XNN
    fn skip_if_vx_eq_nn(&mut self, x: u8, nn: u8) {
        if self.v[x as usize] == nn {
            self.skip();
        }
    }

    /// Skip the following instruction if the value of register VX is not equal to NN
    /// 4XNN
    fn skip_if_vx_ne_nn(&mut self, x: u8, nn: u8) {
        if self.v[x as usize] != nn {
            self.skip();
        }
    }

    /// Skip the following instruction if the value of register VX is equal to the value of register VY
    /// 5XY0
    fn skip_if_vx_eq_vy(&mut self, x: u8, y: u8) {
        if self.v[x as usize] == self.v[y as usize] {
            self.skip();
        }
    }

    /// Store number NN in register VX
    /// 6XNN
    fn assign_vx_nn(&mut self, x: u8, nn: u8) {
        self.v[x as usize] = nn;
    }

    /// Add the value NN to register VX, wrapping, without touching VF
    /// 7XNN
    fn assign_add_vx_nn(&mut self, x: u8, nn: u8) {
        self.v[x as usize] = self.v[x as usize].wrapping_add(nn);
    }

    /// Store the value of register VY in register VX
    /// 8XY0
    fn assign_vx_vy(&mut self, x: u8, y: u8) {
        self.v[x as usize] = self.v[y as usize];
    }

    /// Set VX to VX OR VY
    /// 8XY1
    fn assign_or_vx_vy(&mut self, x: u8, y: u8) {
        self.v[x as usize] |= self.v[y as usize];
    }

    /// Set VX to VX AND VY
    /// 8XY2
    fn assign_and_vx_vy(&mut self, x: u8, y: u8) {
        self.v[x as usize] &= self.v[y as usize];
    }

    /// Set VX to VX XOR VY
    /// 8XY3
    fn assign_xor_vx_vy(&mut self, x: u8, y: u8) {
        self.v[x as usize] ^= self.v[y as usize];
    }

    // The flag writes below come before the result writes, in that order,
    // so that VF as an operand register behaves like the reference
    // interpreter.

    /// Add VY to VX, with VF as the carry flag
    /// 8XY4
    fn assign_add_vx_vy(&mut self, x: u8, y: u8) {
        let (x, y) = (x as usize, y as usize);
        let sum = self.v[x] as u16 + self.v[y] as u16;
        self.v[0xF] = (sum > 0xFF) as u8;
        self.v[x] = sum as u8;
    }

    /// Subtract VY from VX, with VF cleared on borrow and set otherwise
    /// 8XY5
    fn assign_sub_vx_vy(&mut self, x: u8, y: u8) {
        let (x, y) = (x as usize, y as usize);
        self.v[0xF] = (self.v[x] > self.v[y]) as u8;
        self.v[x] = self.v[x].wrapping_sub(self.v[y]);
    }

    /// Shift VX right one bit, with VF holding the bit shifted out;
    /// legacy-shift mode loads VX from VY first
    /// 8XY6
    fn assign_vx_shr(&mut self, x: u8, y: u8) {
        let (x, y) = (x as usize, y as usize);
        if self.quirks.legacy_shift {
            self.v[x] = self.v[y];
        }
        self.v[0xF] = self.v[x] & 1;
        self.v[x] >>= 1;
    }

    /// Set register VX to VY minus VX, with VF cleared on borrow and set otherwise
    /// 8XY7
    fn assign_vx_vy_sub_vx(&mut self, x: u8, y: u8) {
        let (x, y) = (x as usize, y as usize);
        self.v[0xF] = (self.v[y] > self.v[x]) as u8;
        self.v[x] = self.v[y].wrapping_sub(self.v[x]);
    }

    /// Shift VX left one bit, with VF holding the bit shifted out;
    /// legacy-shift mode loads VX from VY first
    /// 8XYE
    fn assign_vx_shl(&mut self, x: u8, y: u8) {
        let (x, y) = (x as usize, y as usize);
        if self.quirks.legacy_shift {
            self.v[x] = self.v[y];
        }
        self.v[0xF] = self.v[x] >> 7;
        self.v[x] <<= 1;
    }

    /// Skip the following instruction if the value of register VX is not equal to the value of register VY
    /// 9XY0
    fn skip_if_vx_ne_vy(&mut self, x: u8, y: u8) {
        if self.v[x as usize] != self.v[y as usize] {
            self.skip();
        }
    }

    /// Store memory address NNN in register I
    /// ANNN
    fn assign_i_nnn(&mut self, nnn: u16) {
        self.i = nnn;
    }

    /// Jump with offset: to NNN plus V0 in legacy mode, to NN plus VX
    /// otherwise
    /// BNNN
    fn jump_with_offset(&mut self, nnn: u16) {
        self.pc = if self.quirks.legacy_jump_offset {
            nnn.wrapping_add(self.v[0] as u16)
        } else {
            let x = (nnn >> 8) as usize;
            (nnn & 0x0FF).wrapping_add(self.v[x] as u16)
        };
    }

    /// Set VX to a random number with a mask of NN
    /// CXNN
    fn assign_vx_random_and_nn(&mut self, x: u8, nn: u8) {
        self.v[x as usize] = self.ctx.gen_random() & nn;
    }

    /// Draw an N-row sprite from the address in I at (VX mod 64, VY mod 32),
    /// XOR-ing pixels with wraparound in both axes; VF reports whether any
    /// set pixel was turned off. Sprite rows past the end of memory read
    /// as zero.
    /// DXYN
    fn draw_n_at_vx_vy(&mut self, x: u8, y: u8, n: u8) {
        let x0 = self.v[x as usize] as usize % WIDTH;
        let y0 = self.v[y as usize] as usize % HEIGHT;
        self.v[0xF] = 0;
        for row in 0..n as usize {
            let sprite = *self.memory.get(self.i as usize + row).unwrap_or(&0);
            for col in 0..8 {
                if sprite >> (7 - col) & 1 == 1 {
                    let dx = (x0 + col) % WIDTH;
                    let dy = (y0 + row) % HEIGHT;
                    if self.frame.flip(dx, dy) {
                        self.v[0xF] = 1;
                    }
                }
            }
        }
        self.frame.mark_dirty();
    }

    /// Skip the following instruction if the key named by VX is pressed
    /// EX9E
    fn skip_if_vx_key(&mut self, x: u8) {
        if self.keys[(self.v[x as usize] & 0x0F) as usize] {
            self.skip();
        }
    }

    /// Skip the following instruction if the key named by VX is not pressed
    /// EXA1
    fn skip_if_vx_not_key(&mut self, x: u8) {
        if !self.keys[(self.v[x as usize] & 0x0F) as usize] {
            self.skip();
        }
    }

    /// Store the current value of the delay timer in register VX
    /// FX07
    fn assign_vx_delay_t(&mut self, x: u8) {
        self.v[x as usize] = self.delay.load();
    }

    /// Set the delay timer to the value of register VX
    /// FX15
    fn assign_delay_t_vx(&mut self, x: u8) {
        self.delay.store(self.v[x as usize]);
    }

    /// Set the sound timer to the value of register VX
    /// FX18
    fn assign_sound_t_vx(&mut self, x: u8) {
        self.sound.store(self.v[x as usize]);
    }

    /// Add the value stored in register VX to register I, with no carry flag
    /// FX1E
    fn assign_add_i_vx(&mut self, x: u8) {
        self.i = self.i.wrapping_add(self.v[x as usize] as u16);
    }

    /// Set I to the address of the font sprite for the hex digit in VX
    /// FX29
    fn assign_i_glyph_vx(&mut self, x: u8) {
        self.i = font::GLYPHS_BASE + self.v[x as usize] as u16 * font::GLYPH_HEIGHT;
    }

    /// Store the binary-coded decimal of VX at addresses I, I+1, and I+2
    /// FX33
    fn assign_mem_at_i_bcd_of_vx(&mut self, x: u8) {
        let value = self.v[x as usize];
        self.memory[self.mem_index(0)] = value / 100;
        self.memory[self.mem_index(1)] = value % 100 / 10;
        self.memory[self.mem_index(2)] = value % 10;
    }

    /// Store registers V0 to VX inclusive in memory starting at address I;
    /// legacy-store mode advances I by the count copied
    /// FX55
    fn assign_mem_at_i_v0_to_vx(&mut self, x: u8) {
        for off in 0..=x as u16 {
            self.memory[self.mem_index(off)] = self.v[off as usize];
        }
        if self.quirks.legacy_store {
            self.i = self.i.wrapping_add(x as u16 + 1);
        }
    }

    /// Fill registers V0 to VX inclusive from memory starting at address I
    /// FX65
    fn assign_v0_to_vx_mem_at_i(&mut self, x: u8) {
        for off in 0..=x as u16 {
            self.v[off as usize] = self.memory[self.mem_index(off)];
        }
    }
}
