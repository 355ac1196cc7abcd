//! End-to-end scenarios driving programs through the dispatch layer.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use m6502_host::{Mpu, BRK_VECTOR};

fn load(mpu: &Mpu, origin: u32, program: &[u8]) {
    mpu.pokes(origin, program, true).unwrap();
    mpu.set_pc(origin as u16);
}

#[test]
fn default_brk_handler_stops_a_stray_program() {
    let mpu = Mpu::new();
    load(&mpu, 0x600, &[0xA9, 0x07, 0x00]); // LDA #$07; BRK
    mpu.run();
    assert_eq!(mpu.a(), 7);
    assert!(mpu.halted());
}

#[test]
fn jsr_hook_returning_zero_resumes_after_the_jsr() {
    // LDA #$41; JSR $FFEE; LDA #$2A; BRK -- the routine at $FFEE is pure
    // host code standing in for a character-out ROM entry.
    let mpu = Mpu::new();
    load(&mpu, 0x600, &[0xA9, 0x41, 0x20, 0xEE, 0xFF, 0xA9, 0x2A, 0x00]);
    let printed = Rc::new(RefCell::new(Vec::new()));
    {
        let printed = Rc::clone(&printed);
        mpu.on_call(0xFFEE, move |mpu, addr, inst| {
            assert_eq!(addr, 0xFFEE);
            assert_eq!(inst, 0x20);
            printed.borrow_mut().push(mpu.a());
            0
        })
        .unwrap();
    }
    mpu.run();
    assert_eq!(*printed.borrow(), vec![0x41]);
    assert_eq!(mpu.a(), 0x2A, "execution resumed after the JSR");
    assert_eq!(mpu.s(), 0xFC, "return address unwound, BRK frame remains");
}

#[test]
fn brk_dispatches_through_the_vector_target() {
    let mpu = Mpu::new();
    mpu.pokew(u32::from(BRK_VECTOR), 0x8000, true).unwrap();
    let seen = Rc::new(Cell::new((0u16, 0u8)));
    {
        let seen = Rc::clone(&seen);
        mpu.on_call(0x8000, move |mpu, addr, inst| {
            seen.set((addr, inst));
            mpu.halt();
            0
        })
        .unwrap();
    }
    load(&mpu, 0x600, &[0x00]);
    mpu.run();
    assert_eq!(seen.get(), (0x8000, 0x00));
}

#[test]
fn jmp_hook_redirects_the_program_counter() {
    // JMP $0700 gets redirected to $0610, where LDX #$99; BRK awaits.
    let mpu = Mpu::new();
    load(&mpu, 0x600, &[0x4C, 0x00, 0x07]);
    mpu.pokes(0x610, &[0xA2, 0x99, 0x00], true).unwrap();
    mpu.on_call(0x0700, |_, _, inst| {
        assert_eq!(inst, 0x4C);
        0x0610
    })
    .unwrap();
    mpu.run();
    assert_eq!(mpu.x(), 0x99);
}

#[test]
fn memory_mapped_output_device() {
    // A tight loop copying a string to a write-hooked "serial port":
    //   LDX #$00; loop: LDA $0700,X; BEQ done; STA $F001; INX; BNE loop;
    //   done: BRK
    let mpu = Mpu::new();
    load(
        &mpu,
        0x600,
        &[
            0xA2, 0x00, // LDX #$00
            0xBD, 0x00, 0x07, // LDA $0700,X
            0xF0, 0x06, // BEQ done
            0x8D, 0x01, 0xF0, // STA $F001
            0xE8, // INX
            0xD0, 0xF5, // BNE loop
            0x00, // BRK
        ],
    );
    mpu.pokes(0x700, b"hi!\0", true).unwrap();
    let out = Rc::new(RefCell::new(String::new()));
    {
        let out = Rc::clone(&out);
        mpu.on_write(0xF001, move |_, _, data| {
            out.borrow_mut().push(data as char);
        })
        .unwrap();
    }
    mpu.run();
    assert_eq!(*out.borrow(), "hi!");
    // The hook swallowed the writes; backing memory never changed.
    assert_eq!(mpu.peek(0xF001, true).unwrap(), 0);
}

#[test]
fn read_hook_feeds_the_cpu_a_synthetic_value() {
    // LDA $D010; BRK with a hook standing in for an input register.
    let mpu = Mpu::new();
    load(&mpu, 0x600, &[0xAD, 0x10, 0xD0, 0x00]);
    mpu.poke(0xD010, 0x11, true).unwrap();
    mpu.on_read(0xD010, |_, _| 0x77).unwrap();
    mpu.run();
    assert_eq!(mpu.a(), 0x77);
    // Direct view still shows the underlying byte.
    assert_eq!(mpu.peek(0xD010, true).unwrap(), 0x11);
}

#[test]
fn handler_reentry_through_routed_access() {
    // A read hook that itself performs a routed read of another hooked
    // address, exercising nested dispatch.
    let mpu = Mpu::new();
    mpu.on_read(0xA000, |mpu, _| {
        mpu.peek(0xA001, false).unwrap() as i32 + 1
    })
    .unwrap();
    mpu.on_read(0xA001, |_, _| 0x40).unwrap();
    assert_eq!(mpu.peek(0xA000, false).unwrap(), 0x41);
}

#[test]
fn handler_can_replace_itself_mid_run() {
    // First write arms the next stage; second write hits the new handler.
    let mpu = Mpu::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    {
        let log = Rc::clone(&log);
        mpu.on_write(0xC000, move |mpu, addr, data| {
            log.borrow_mut().push(("first", data));
            let log = Rc::clone(&log);
            mpu.on_write(u32::from(addr), move |_, _, data| {
                log.borrow_mut().push(("second", data));
            })
            .unwrap();
        })
        .unwrap();
    }
    mpu.poke(0xC000, 1, false).unwrap();
    mpu.poke(0xC000, 2, false).unwrap();
    assert_eq!(*log.borrow(), vec![("first", 1), ("second", 2)]);
}

#[test]
fn halt_from_a_hook_stops_run_after_the_current_instruction() {
    // An infinite loop with an escape hatch on a watched address.
    let mpu = Mpu::new();
    // loop: INC $10; JMP loop
    load(&mpu, 0x600, &[0xE6, 0x10, 0x4C, 0x00, 0x06]);
    let mpu_counted = Rc::new(Cell::new(0u32));
    {
        let counted = Rc::clone(&mpu_counted);
        mpu.on_write(0x0010, move |mpu, addr, data| {
            counted.set(counted.get() + 1);
            mpu.poke(u32::from(addr), data, true).unwrap();
            if counted.get() == 3 {
                mpu.halt();
            }
        })
        .unwrap();
    }
    mpu.run();
    assert_eq!(mpu_counted.get(), 3);
    assert_eq!(mpu.peek(0x10, true).unwrap(), 3);
}

#[test]
fn routed_word_access_is_two_independent_dispatches() {
    let mpu = Mpu::new();
    mpu.on_read(0x5000, |_, _| 0xCD).unwrap();
    // No hook at 0x5001; that half falls through to memory.
    mpu.poke(0x5001, 0xAB, true).unwrap();
    assert_eq!(mpu.peekw(0x5000, false).unwrap(), 0xABCD);
}

#[test]
fn randomized_direct_routed_equivalence_without_hooks() {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    // With no hooks installed, routed and direct access agree everywhere.
    let mpu = Mpu::new();
    let mut rng = StdRng::seed_from_u64(0x6502);
    for _ in 0..500 {
        let addr = rng.gen_range(0u32..0x10000);
        let value: u8 = rng.gen();
        let direct = rng.gen_bool(0.5);
        mpu.poke(addr, value, direct).unwrap();
        assert_eq!(mpu.peek(addr, true).unwrap(), value);
        assert_eq!(mpu.peek(addr, false).unwrap(), value);
    }
}

#[test]
fn dispatch_keeps_mpus_apart() {
    let a = Mpu::new();
    let b = Mpu::new();
    let a_hits = Rc::new(Cell::new(0u32));
    {
        let a_hits = Rc::clone(&a_hits);
        a.on_read(0x6000, move |_, _| {
            a_hits.set(a_hits.get() + 1);
            1
        })
        .unwrap();
    }
    b.on_read(0x6000, |_, _| 2).unwrap();
    assert_eq!(b.peek(0x6000, false).unwrap(), 2);
    assert_eq!(a_hits.get(), 0);
    assert_eq!(a.peek(0x6000, false).unwrap(), 1);
    assert_eq!(a_hits.get(), 1);
}
