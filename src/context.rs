//! Context for accessing functionalities of the platform the machine is
//! emulated on.
//!
//! The core never touches hardware: pin scanning, display blits and the
//! buzzer all live behind this trait, and the core only exchanges plain
//! values with it at frame boundaries.

use crate::frame::FrameView;

/// Trait aggregating platform functionalities
pub trait Context {
    /// Draw current frame to the screen
    ///
    /// Called by `tick_frame` once per frame, only when the display
    /// changed since the last call
    fn on_frame(&mut self, frame: FrameView<'_>);
    /// Turn sound on
    ///
    /// Asserted by `tick_timers` on every frame the sound timer is active;
    /// implementations should treat repeated calls as idempotent
    fn sound_on(&mut self);
    /// Turn sound off
    ///
    /// Asserted by `tick_timers` on every frame the sound timer is inactive
    fn sound_off(&mut self);
    /// Scan the state of each key on the 4x4 keypad
    ///
    /// Called by `tick_frame` once per frame; the result is the
    /// authoritative input snapshot until the next frame
    fn scan_keys(&mut self) -> [bool; 16];
    /// Generate random 8-bit number
    ///
    /// Called whenever requested by the executing program
    fn gen_random(&mut self) -> u8;
}

#[cfg(test)]
pub mod testing {
    use super::*;

    use nanorand::{rand::pcg64::Pcg64 as Rng, RNG};

    use crate::utils::testing::{ImageMask, ToMask};

    pub struct TestingContext {
        sound: bool,
        frame: Option<ImageMask>,
        keys: [bool; 16],
        rng: Rng,
        frames_drawn: usize,
        scans: usize,
    }

    impl TestingContext {
        pub fn new(seed: u128) -> Self {
            Self {
                sound: false,
                frame: None,
                keys: [false; 16],
                rng: Rng::new_seed(seed),
                frames_drawn: 0,
                scans: 0,
            }
        }

        pub fn is_sound_on(&self) -> bool {
            self.sound
        }

        pub fn get_frame(&self) -> Option<&ImageMask> {
            self.frame.as_ref()
        }

        pub fn frames_drawn(&self) -> usize {
            self.frames_drawn
        }

        pub fn scans(&self) -> usize {
            self.scans
        }

        pub fn set_key(&mut self, n: u8) {
            self.keys[n as usize] = true;
        }

        pub fn reset_key(&mut self, n: u8) {
            self.keys[n as usize] = false;
        }
    }

    impl Context for TestingContext {
        fn on_frame(&mut self, frame: FrameView<'_>) {
            self.frame = Some(frame.to_mask());
            self.frames_drawn += 1;
        }

        fn sound_on(&mut self) {
            self.sound = true;
        }

        fn sound_off(&mut self) {
            self.sound = false;
        }

        fn scan_keys(&mut self) -> [bool; 16] {
            self.scans += 1;
            self.keys
        }

        fn gen_random(&mut self) -> u8 {
            self.rng.generate::<u8>()
        }
    }

    #[test]
    fn testing_context() {
        let mut ctx = TestingContext::new(0);

        let mut frame = crate::frame::Frame::new();
        frame.flip(0, 0);
        ctx.on_frame(frame.view());
        assert!(ctx.frame.is_some());
        assert_eq!(ctx.get_frame().unwrap(), &"#".to_mask());
        assert_eq!(ctx.frames_drawn(), 1);

        ctx.sound_on();
        assert!(ctx.is_sound_on());

        ctx.sound_off();
        assert!(!ctx.is_sound_on());

        ctx.set_key(0x01u8);
        ctx.set_key(0x0Fu8);
        let keys = ctx.scan_keys();
        assert_eq!(keys.iter().filter(|&&k| k).count(), 2);
        assert_eq!((keys[0x01], keys[0x0F]), (true, true));

        ctx.reset_key(0x0Fu8);
        let keys = ctx.scan_keys();
        assert_eq!(keys.iter().filter(|&&k| k).count(), 1);
        assert_eq!((keys[0x01], keys[0x0F]), (true, false));
        assert_eq!(ctx.scans(), 2);
    }
}
