//! Host-facing input events.
//!
//! The host never touches a device's MMIO registers directly; it posts
//! discrete events here and the machine loop routes them to the ADB GLU
//! (keyboard/mouse) or the gameport (paddles/buttons) ahead of the next
//! `sync`. Keeping this as its own small enum rather than reusing
//! [`crate::devices::adb::InputEvent`] lets the host side carry the extra
//! cases (key-toggle state, gamepad axes) that aren't ADB's concern.

use crate::devices::adb::InputEvent as AdbEvent;
use crate::mmio::Mmio;

/// A key-toggle indicator light, separate from the scan-code stream since
/// the real keyboard reports these as sticky state rather than key events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyToggle {
    CapsLock,
    NumLock,
}

/// One discrete event from the host, posted in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(u8),
    KeyUp(u8),
    KeyToggle { which: KeyToggle, on: bool },
    MouseMove { dx: i8, dy: i8 },
    MouseButton { down: bool },
    /// `index` selects one of the four gameport paddle axes; `value` is the
    /// raw 0-255 resistance reading the same as `Gameport::set_paddle`.
    GamepadAxis { index: usize, value: u8 },
    GamepadButton { index: usize, down: bool },
}

/// Caps/num lock state tracked on the host side; the ADB module has no
/// notion of these beyond what key codes get posted, so toggling state
/// lives here rather than inside [`crate::devices::adb::Adb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyToggleState {
    pub caps_lock: bool,
    pub num_lock: bool,
}

/// Posts one event into the appropriate device. Keyboard toggles are
/// recorded in `toggles` and also re-armed as keyboard scanning being
/// enabled/disabled isn't modeled beyond what `Adb::set_keyboard_enabled`
/// already covers, so only the sticky bits are tracked here.
pub fn post_event(mmio: &mut Mmio, toggles: &mut KeyToggleState, event: InputEvent) {
    match event {
        InputEvent::KeyDown(code) => mmio.adb.device_input(AdbEvent::KeyDown(code)),
        InputEvent::KeyUp(code) => mmio.adb.device_input(AdbEvent::KeyUp(code)),
        InputEvent::KeyToggle { which, on } => match which {
            KeyToggle::CapsLock => toggles.caps_lock = on,
            KeyToggle::NumLock => toggles.num_lock = on,
        },
        InputEvent::MouseMove { dx, dy } => mmio.adb.device_input(AdbEvent::MouseMove { dx, dy }),
        InputEvent::MouseButton { down } => mmio.adb.device_input(AdbEvent::MouseButton { down }),
        InputEvent::GamepadAxis { index, value } => mmio.gameport.set_paddle(index, value),
        InputEvent::GamepadButton { index, down } => mmio.gameport.set_button(index, down),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::AccessFlags;

    fn mmio() -> Mmio {
        Mmio::new(2, 16)
    }

    #[test]
    fn key_down_reaches_adb_queue() {
        let mut mmio = mmio();
        let mut toggles = KeyToggleState::default();
        post_event(&mut mmio, &mut toggles, InputEvent::KeyDown(0x41));
        mmio.adb.sync(0);
        assert_eq!(mmio.adb.read_switch(0x00, AccessFlags::NORMAL) & 0x80, 0x80);
    }

    #[test]
    fn caps_lock_toggle_is_tracked_not_forwarded() {
        let mut mmio = mmio();
        let mut toggles = KeyToggleState::default();
        post_event(&mut mmio, &mut toggles, InputEvent::KeyToggle { which: KeyToggle::CapsLock, on: true });
        assert!(toggles.caps_lock);
        assert!(!toggles.num_lock);
    }

    #[test]
    fn gamepad_axis_reaches_gameport() {
        let mut mmio = mmio();
        let mut toggles = KeyToggleState::default();
        post_event(&mut mmio, &mut toggles, InputEvent::GamepadAxis { index: 0, value: 200 });
        mmio.gameport.read_switch(0x70, AccessFlags::NORMAL);
        assert_eq!(mmio.gameport.read_switch(0x64, AccessFlags::NORMAL), 0x80);
    }

    #[test]
    fn gamepad_button_reaches_gameport() {
        let mut mmio = mmio();
        let mut toggles = KeyToggleState::default();
        post_event(&mut mmio, &mut toggles, InputEvent::GamepadButton { index: 1, down: true });
        assert_eq!(mmio.gameport.read_switch(0x62, AccessFlags::NORMAL), 0x80);
    }
}
