use mango8::{Builder, Context, FrameView, Progress};

use nanorand::{rand::pcg64::Pcg64 as Rng, RNG};

struct TestingContext {
    screen: Vec<String>,
    keys: [bool; 16],
    sound: bool,
    rng: Rng,
}

impl TestingContext {
    fn new() -> Self {
        let mut row = String::new();
        for _ in 0..64 {
            row.push('.');
        }
        let mut screen = vec![];
        screen.resize_with(32, || row.clone());
        Self {
            screen,
            keys: [false; 16],
            sound: false,
            rng: Rng::new_seed(0),
        }
    }

    fn formatted(&self) -> String {
        self.screen.join("\n") + "\n"
    }
}

impl Context for TestingContext {
    fn on_frame(&mut self, frame: FrameView<'_>) {
        self.screen = frame
            .iter_rows_as_bitslices()
            .map(|row| row.iter().map(|&px| if px { '#' } else { '.' }).collect())
            .collect();
    }

    fn sound_on(&mut self) {
        self.sound = true;
    }

    fn sound_off(&mut self) {
        self.sound = false;
    }

    fn scan_keys(&mut self) -> [bool; 16] {
        self.keys
    }

    fn gen_random(&mut self) -> u8 {
        self.rng.generate::<u8>()
    }
}

fn blank_screen() -> Vec<String> {
    TestingContext::new().screen
}

fn put_sprite(screen: &mut [String], x: usize, y: usize, rows: &[u8]) {
    for (dy, &bits) in rows.iter().enumerate() {
        for dx in 0..8 {
            if bits >> (7 - dx) & 1 == 1 {
                screen[y + dy].replace_range(x + dx..x + dx + 1, "#");
            }
        }
    }
}

fn formatted(screen: &[String]) -> String {
    screen.join("\n") + "\n"
}

/// Convert 214 to decimal digits, load them back and render each one with
/// its font sprite: the screen must read "2 1 4".
#[test]
fn bcd_digits_are_rendered_with_font_sprites() {
    let _ = env_logger::builder().is_test(true).try_init();

    let prog = [
        0x60, 0xD6, // V0 = 214
        0xA3, 0x00, // I = 0x300
        0xF0, 0x33, // bcd V0
        0xF2, 0x65, // V0..V2 = digits
        0x63, 0x00, // V3 = 0, x position
        0x64, 0x00, // V4 = 0, y position
        0xF0, 0x29, // I = glyph V0
        0xD3, 0x45, // draw at (V3, V4)
        0x73, 0x05, // V3 += 5
        0xF1, 0x29, // I = glyph V1
        0xD3, 0x45,
        0x73, 0x05,
        0xF2, 0x29, // I = glyph V2
        0xD3, 0x45,
        0x12, 0x1C, // spin
    ];
    let mut chip = Builder::new()
        .with_context(TestingContext::new())
        .with_program(&prog)
        .build()
        .unwrap();

    for _ in 0..3 {
        assert_eq!(chip.tick_frame(), Ok(Progress::Running));
    }

    let mut expected = blank_screen();
    put_sprite(&mut expected, 0, 0, &[0xF0, 0x10, 0xF0, 0x80, 0xF0]); // 2
    put_sprite(&mut expected, 5, 0, &[0x20, 0x60, 0x20, 0x20, 0x70]); // 1
    put_sprite(&mut expected, 10, 0, &[0x90, 0x90, 0xF0, 0x10, 0x10]); // 4
    let lhs = chip.ctx.formatted();
    let rhs = formatted(&expected);
    assert_eq!(&lhs, &rhs, "\nlhs:\n{}\n\nrhs:\n{}", lhs, rhs);
}

/// A program polling the keypad draws only once its key goes down.
#[test]
fn keypad_gates_the_draw_path() {
    let _ = env_logger::builder().is_test(true).try_init();

    let prog = [
        0x62, 0x05, // V2 = 5
        0xE2, 0x9E, // skip next if key 5 is down
        0x12, 0x02, // poll again
        0x60, 0x01, // V0 = 1
        0xF0, 0x29, // I = glyph V0
        0x61, 0x00, // V1 = 0
        0xD1, 0x15, // draw at (V1, V1)
        0x12, 0x0E, // spin
    ];
    let mut chip = Builder::new()
        .with_context(TestingContext::new())
        .with_program(&prog)
        .build()
        .unwrap();

    for _ in 0..4 {
        chip.tick_frame().unwrap();
    }
    assert_eq!(chip.ctx.formatted(), formatted(&blank_screen()));

    chip.ctx.keys[5] = true;
    chip.tick_frame().unwrap();

    let mut expected = blank_screen();
    put_sprite(&mut expected, 0, 0, &[0x20, 0x60, 0x20, 0x20, 0x70]); // 1
    let lhs = chip.ctx.formatted();
    let rhs = formatted(&expected);
    assert_eq!(&lhs, &rhs, "\nlhs:\n{}\n\nrhs:\n{}", lhs, rhs);
}

/// The sound timer holds the buzzer for exactly as many frames as its
/// stored value.
#[test]
fn sound_timer_buzzes_for_stored_frame_count() {
    let _ = env_logger::builder().is_test(true).try_init();

    let prog = [
        0x60, 0x03, // V0 = 3
        0xF0, 0x18, // sound timer = V0
        0x12, 0x04, // spin
    ];
    let mut chip = Builder::new()
        .with_context(TestingContext::new())
        .with_program(&prog)
        .build()
        .unwrap();

    let mut buzzing = vec![];
    for _ in 0..5 {
        chip.tick_frame().unwrap();
        buzzing.push(chip.ctx.sound);
    }
    assert_eq!(buzzing, [true, true, true, false, false]);
}

/// With nothing loaded the program counter walks through no-op words and
/// the machine halts cleanly at the end of memory.
#[test]
fn empty_memory_runs_to_a_clean_halt() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut chip = Builder::new()
        .with_context(TestingContext::new())
        .with_program(&[])
        .with_clock_hz(3840) // 64 instructions per frame
        .build()
        .unwrap();

    let mut frames = 0;
    let progress = loop {
        match chip.tick_frame().unwrap() {
            Progress::Running => frames += 1,
            halted => break halted,
        }
        assert!(frames < 100, "program never halted");
    };
    assert_eq!(progress, Progress::Halted);
    // every two-byte word from 0x200 up to the last fetchable address
    assert_eq!(chip.cycles(), 1792);
    assert_eq!(chip.ctx.formatted(), formatted(&blank_screen()));
}
