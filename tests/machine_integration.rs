//! End-to-end scenarios spanning the CPU, bus, page map and devices
//! together through the public [`Machine`] surface, rather than any one
//! module in isolation.

use gs816_core::config::MachineConfig;
use gs816_core::devices::AccessFlags;
use gs816_core::error::StopReason;
use gs816_core::machine::Machine;

const ROM_SIZE: usize = 0x20000;

/// Builds a 128K (ROM01-sized) image with its emulation reset vector
/// pointing at `entry`, an address within bank 0's general RAM window so a
/// test can poke a short program there after construction.
fn rom_with_reset_vector(entry: u16) -> Vec<u8> {
    let mut rom = vec![0u8; ROM_SIZE];
    // Bank 0's $E000-$FFFF defaults to ROM bank 0 at offset (addr - $E000);
    // $FFFC - $E000 = $1FFC.
    rom[0x1FFC] = entry as u8;
    rom[0x1FFD] = (entry >> 8) as u8;
    rom
}

fn machine_at(entry: u16) -> Machine {
    let mut machine = Machine::new(MachineConfig::new().with_fpi_bank_count(4)).unwrap();
    machine.load_rom(&rom_with_reset_vector(entry)).unwrap();
    assert_eq!(machine.cpu.pc, entry);
    machine
}

#[test]
fn reset_vector_is_honored_end_to_end() {
    let machine = machine_at(0x0300);
    assert_eq!(machine.cpu.pc, 0x0300);
    assert!(machine.cpu.is_emulation());
    assert_eq!(machine.cpu.pbr, 0);
}

#[test]
fn xce_switches_the_whole_machine_into_native_mode() {
    let mut machine = machine_at(0x0200);
    machine.bus.poke_byte(0, 0x0200, 0x18); // CLC
    machine.bus.poke_byte(0, 0x0201, 0xFB); // XCE
    let reason = machine.run_cycles(20);
    assert_eq!(reason, StopReason::CyclesComplete);
    assert!(!machine.cpu.is_emulation());
}

#[test]
fn decimal_adc_end_to_end_through_the_bus() {
    let mut machine = machine_at(0x0200);
    // SED, CLC, LDA #$99, ADC #$01 -- 99 + 01 in decimal mode wraps to 00 with carry.
    let program = [0xF8u8, 0x18, 0xA9, 0x99, 0x69, 0x01];
    for (i, byte) in program.iter().enumerate() {
        machine.bus.poke_byte(0, 0x0200 + i as u16, *byte);
    }
    machine.run_cycles(40);
    assert_eq!(machine.cpu.c & 0xFF, 0x00);
    assert!(machine.cpu.p & gs816_core::cpu::flags::C != 0);
}

#[test]
fn mvn_block_move_copies_between_banks() {
    let mut machine = machine_at(0x0200);
    machine.cpu.emulation = false;
    machine.cpu.p &= !gs816_core::cpu::flags::M;
    machine.cpu.c = 0x0001; // two bytes to move
    machine.cpu.x = 0x1000;
    machine.cpu.y = 0x2000;
    machine.bus.poke_byte(0x01, 0x1000, 0xAA);
    machine.bus.poke_byte(0x01, 0x1001, 0xBB);
    machine.bus.poke_byte(0, 0x0200, 0x54); // MVN
    machine.bus.poke_byte(0, 0x0201, 0x02); // dest bank
    machine.bus.poke_byte(0, 0x0202, 0x01); // src bank

    machine.cpu.step(&mut machine.bus); // first byte, re-executes MVN
    machine.cpu.step(&mut machine.bus); // second byte, falls through

    assert_eq!(machine.cpu.c, 0xFFFF);
    assert_eq!(machine.bus.read_byte(0x02, 0x2000), 0xAA);
    assert_eq!(machine.bus.read_byte(0x02, 0x2001), 0xBB);
}

#[test]
fn language_card_toggle_redirects_d000_from_rom_to_ram() {
    let mut rom = vec![0u8; ROM_SIZE];
    rom[0xD050] = 0xAA;
    let mut machine = Machine::new(MachineConfig::new().with_fpi_bank_count(4)).unwrap();
    machine.load_rom(&rom).unwrap();

    assert_eq!(machine.bus.peek_byte(0, 0xD050), 0xAA);

    machine.bus.write_byte(0, 0xC080, 0); // enable LC RAM reads, bank 1
    assert_eq!(machine.bus.peek_byte(0, 0xD050), 0x00);

    machine.bus.poke_byte(0, 0xD050, 0xBB);
    assert_eq!(machine.bus.peek_byte(0, 0xD050), 0xBB);
}

#[test]
fn timer_irq_propagates_to_the_cpu_pin_on_the_next_sync() {
    let mut machine = machine_at(0x0200);
    machine.bus.mmio.write(0x40, 0x01); // enable the 1-second timer IRQ
    machine.bus.mmio.sync(1_000_000);
    assert_ne!(machine.bus.mmio.irq_line(), 0);

    machine.run_cycles(4);
    assert!(machine.cpu.irqb_in);
}

#[test]
fn posted_key_event_is_readable_through_adb_after_a_run() {
    let mut machine = machine_at(0x0200);
    machine.post_input(gs816_core::input::InputEvent::KeyDown(0x41));
    machine.run_cycles(4);
    let value = machine.bus.mmio.adb.read_switch(0x00, AccessFlags::PEEK);
    assert_eq!(value & 0x7F, 0x41);
}

#[test]
fn disk_insert_is_visible_to_the_drive_bay_the_machine_owns() {
    use gs816_core::disk::NibbleDisk;

    let mut machine = machine_at(0x0200);
    machine.insert_disk(false, 0, NibbleDisk::blank_525(35)).unwrap();
    assert!(machine.bus.mmio.drives.slot5_525[0].disk.is_some());
}
