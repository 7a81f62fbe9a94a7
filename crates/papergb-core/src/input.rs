use crate::interrupt::Interrupts;

/// Button state supplied by a frontend. `true` means held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoypadState {
    pub right: bool,
    pub left: bool,
    pub up: bool,
    pub down: bool,
    pub a: bool,
    pub b: bool,
    pub select: bool,
    pub start: bool,
}

impl JoypadState {
    fn directions(&self) -> u8 {
        (self.right as u8) | (self.left as u8) << 1 | (self.up as u8) << 2 | (self.down as u8) << 3
    }

    fn actions(&self) -> u8 {
        (self.a as u8) | (self.b as u8) << 1 | (self.select as u8) << 2 | (self.start as u8) << 3
    }
}

/// P1/JOYP register (0xFF00).
pub struct Input {
    /// Bits 4-5 as last written. A cleared bit selects that button group.
    select: u8,
    state: JoypadState,
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            state: JoypadState::default(),
        }
    }

    /// Active-low button lines visible through the current selection.
    fn lines(&self) -> u8 {
        let mut pressed = 0u8;
        if self.select & 0x10 == 0 {
            pressed |= self.state.directions();
        }
        if self.select & 0x20 == 0 {
            pressed |= self.state.actions();
        }
        !pressed & 0x0F
    }

    pub fn read(&self) -> u8 {
        0xC0 | self.select | self.lines()
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Replace the held buttons. A line falling from high to low requests
    /// the joypad interrupt.
    pub fn update_state(&mut self, state: JoypadState, ints: &mut Interrupts) {
        let before = self.lines();
        self.state = state;
        let after = self.lines();
        if before & !after != 0 {
            ints.request_joypad();
        }
    }

    pub fn state(&self) -> JoypadState {
        self.state
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}
