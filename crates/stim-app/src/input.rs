// ---------------------------------------------------------------------------
// Key: windowing-library-independent key representation
// ---------------------------------------------------------------------------

/// A keyboard key, independent of any windowing library.
///
/// `main.rs` maps `winit::keyboard::PhysicalKey` to `Key`; everything else
/// in the input pipeline works purely with this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    P,
    W,
    S,
    Q,
    Escape,
}

// ---------------------------------------------------------------------------
// InputAction: what the presenter does in response to input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Start the loaded stimulus from the beginning.
    Play,
    /// Full-field white, e.g. for focusing the projector.
    White,
    /// Back to the blank screen, ending any playback.
    Stop,
    Quit,
}

// ---------------------------------------------------------------------------
// InputState
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct InputState;

impl InputState {
    /// Translate a `Key` press into an `InputAction`, if the key is mapped.
    pub fn on_key(&self, key: Key) -> Option<InputAction> {
        match key {
            Key::Space | Key::P => Some(InputAction::Play),
            Key::W => Some(InputAction::White),
            Key::S => Some(InputAction::Stop),
            Key::Q | Key::Escape => Some(InputAction::Quit),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
