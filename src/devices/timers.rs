//! 1-second and quarter-second RTC timers.
//!
//! Grounded directly on `clem_timer_sync` in the original `clem_timer.c`:
//! each timer accumulates elapsed microseconds independently and fires its
//! IRQ source every time its own period elapses, gated by its own enable
//! bit. The two periods are independent — enabling one does not affect the
//! other, unlike a naive single "timer enable" flag.

use super::{irq, AccessFlags, Device};

/// Microseconds between 1-second timer IRQs.
pub const ONE_SEC_PERIOD_US: u32 = 1_000_000;
/// Microseconds between quarter-second timer IRQs (the real rate is
/// 266_667us, four of which slightly overshoot one second — matching the
/// original's `CLEM_MEGA2_TIMER_QSEC_US`).
pub const QTR_SEC_PERIOD_US: u32 = 266_667;

mod ctrl {
    pub const ONE_SEC_ENABLED: u8 = 1 << 0;
    pub const QSEC_ENABLED: u8 = 1 << 1;
}

/// Register offset within the timer device's MMIO window (`$C023` VGC
/// int-flags style single control byte, matching the original's combined
/// `CLEM_MMIO_REG_*` timer enable bits).
const REG_CONTROL: u8 = 0x00;

#[derive(Debug, Clone, Default)]
pub struct Timers {
    irq_1sec_us: u32,
    irq_qtrsec_us: u32,
    control: u8,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    fn one_sec_enabled(&self) -> bool {
        self.control & ctrl::ONE_SEC_ENABLED != 0
    }

    fn qsec_enabled(&self) -> bool {
        self.control & ctrl::QSEC_ENABLED != 0
    }
}

impl Device for Timers {
    fn reset(&mut self) {
        self.irq_1sec_us = 0;
        self.irq_qtrsec_us = 0;
        self.control = 0;
    }

    fn read_switch(&mut self, ioreg: u8, _flags: AccessFlags) -> u8 {
        match ioreg {
            REG_CONTROL => self.control,
            _ => 0,
        }
    }

    fn write_switch(&mut self, ioreg: u8, value: u8) {
        if ioreg == REG_CONTROL {
            self.control = value;
        }
    }

    fn sync(&mut self, delta_us: u32) -> u32 {
        let mut fired = 0u32;
        self.irq_1sec_us += delta_us;
        self.irq_qtrsec_us += delta_us;

        while self.irq_1sec_us >= ONE_SEC_PERIOD_US {
            self.irq_1sec_us -= ONE_SEC_PERIOD_US;
            if self.one_sec_enabled() {
                fired |= irq::TIMER_RTC_1SEC;
            }
        }
        while self.irq_qtrsec_us >= QTR_SEC_PERIOD_US {
            self.irq_qtrsec_us -= QTR_SEC_PERIOD_US;
            if self.qsec_enabled() {
                fired |= irq::TIMER_QSEC;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_timers_never_fire() {
        let mut t = Timers::new();
        assert_eq!(t.sync(10_000_000), 0);
    }

    #[test]
    fn one_second_timer_fires_when_enabled() {
        let mut t = Timers::new();
        t.write_switch(REG_CONTROL, ctrl::ONE_SEC_ENABLED);
        assert_eq!(t.sync(999_999), 0);
        assert_eq!(t.sync(1), irq::TIMER_RTC_1SEC);
    }

    #[test]
    fn quarter_second_timer_independent_of_one_second() {
        let mut t = Timers::new();
        t.write_switch(REG_CONTROL, ctrl::QSEC_ENABLED);
        let fired = t.sync(QTR_SEC_PERIOD_US);
        assert_eq!(fired, irq::TIMER_QSEC);
    }

    #[test]
    fn both_timers_can_fire_in_one_sync() {
        let mut t = Timers::new();
        t.write_switch(REG_CONTROL, ctrl::ONE_SEC_ENABLED | ctrl::QSEC_ENABLED);
        let fired = t.sync(ONE_SEC_PERIOD_US);
        assert_eq!(fired & irq::TIMER_RTC_1SEC, irq::TIMER_RTC_1SEC);
        assert_eq!(fired & irq::TIMER_QSEC, irq::TIMER_QSEC);
    }

    #[test]
    fn reset_clears_accumulated_time() {
        let mut t = Timers::new();
        t.write_switch(REG_CONTROL, ctrl::ONE_SEC_ENABLED);
        t.sync(500_000);
        t.reset();
        assert_eq!(t.sync(999_999), 0);
    }
}
