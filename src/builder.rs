use crate::context::Context;
use crate::mango::{Mango8, FRAME_RATE};
use crate::quirks::Quirks;

/// Default simulated clock, in instructions per second
pub const DEFAULT_CLOCK_HZ: u32 = 500;

/// Assembles a machine from its context, program image and configuration.
///
/// Context and program are mandatory; quirks default to the modern
/// behaviors and the clock to [`DEFAULT_CLOCK_HZ`].
pub struct Builder<'a, C: Context> {
    context: Option<C>,
    program: Option<&'a [u8]>,
    quirks: Quirks,
    clock_hz: u32,
}

impl<'a, C: Context> Builder<'a, C> {
    pub fn new() -> Self {
        Self {
            context: None,
            program: None,
            quirks: Quirks::default(),
            clock_hz: DEFAULT_CLOCK_HZ,
        }
    }

    pub fn with_context(mut self, ctx: C) -> Self {
        self.context = Some(ctx);
        self
    }

    pub fn with_program(mut self, prog: &'a [u8]) -> Self {
        self.program = Some(prog);
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }

    /// Set the instruction rate; `clock_hz / 60` instructions run per frame,
    /// at least one
    pub fn with_clock_hz(mut self, clock_hz: u32) -> Self {
        self.clock_hz = clock_hz;
        self
    }

    pub fn build(self) -> Result<Mango8<C>, &'static str> {
        let context = self.context.ok_or("Context not provided")?;
        let program = self.program.ok_or("Program not provided")?;
        let cycles_per_frame = (self.clock_hz / FRAME_RATE).max(1) as u16;
        let mut chip = Mango8::new(context, self.quirks, cycles_per_frame);
        chip.write_program(program);
        Ok(chip)
    }
}
