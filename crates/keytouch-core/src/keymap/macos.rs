//! Key name to macOS virtual key code table.
//!
//! Values are the `kVK_*` constants from HIToolbox `Events.h`.  macOS uses
//! ANSI key *positions*, so letters are not in alphabetical order.

/// `(name, kVK code)` pairs.  Names are matched case-insensitively.
const KEYCODES: &[(&str, u16)] = &[
    // Letters
    ("A", 0x00),
    ("S", 0x01),
    ("D", 0x02),
    ("F", 0x03),
    ("H", 0x04),
    ("G", 0x05),
    ("Z", 0x06),
    ("X", 0x07),
    ("C", 0x08),
    ("V", 0x09),
    ("B", 0x0B),
    ("Q", 0x0C),
    ("W", 0x0D),
    ("E", 0x0E),
    ("R", 0x0F),
    ("Y", 0x10),
    ("T", 0x11),
    ("O", 0x1F),
    ("U", 0x20),
    ("I", 0x22),
    ("P", 0x23),
    ("L", 0x25),
    ("J", 0x26),
    ("K", 0x28),
    ("N", 0x2D),
    ("M", 0x2E),
    // Number row
    ("1", 0x12),
    ("2", 0x13),
    ("3", 0x14),
    ("4", 0x15),
    ("6", 0x16),
    ("5", 0x17),
    ("9", 0x19),
    ("7", 0x1A),
    ("8", 0x1C),
    ("0", 0x1D),
    // Control keys
    ("Tab", 0x30),
    ("Space", 0x31),
    ("Escape", 0x35),
    ("Shift", 0x38),
    ("CapsLock", 0x39),
    ("Option", 0x3A),
    ("Control", 0x3B),
    // Arrows
    ("LeftArrow", 0x7B),
    ("RightArrow", 0x7C),
    ("DownArrow", 0x7D),
    ("UpArrow", 0x7E),
    // Function keys
    ("F1", 0x7A),
    ("F2", 0x78),
    ("F3", 0x63),
    ("F4", 0x76),
    ("F5", 0x60),
    ("F6", 0x61),
    ("F7", 0x62),
    ("F8", 0x64),
    ("F9", 0x65),
    ("F10", 0x6D),
    ("F11", 0x67),
    ("F12", 0x6F),
];

/// Looks up the key code for `name`.
pub fn keycode_for(name: &str) -> Option<u16> {
    KEYCODES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, code)| code)
}

/// Looks up the canonical name for `code`.
pub fn name_for(code: u16) -> Option<&'static str> {
    KEYCODES
        .iter()
        .find(|&&(_, c)| c == code)
        .map(|&(name, _)| name)
}
