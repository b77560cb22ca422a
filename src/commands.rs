use crate::debounce::Level;

/// Requests for the detector loop. Pulses do not travel as commands; they go
/// straight to the `PulseCounter`.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum DetectorCommand {
    Reset,
    Button(Level),
}

/// One parsed line of the socket protocol.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SocketRequest {
    Pulse(u32),
    Status,
    Command(DetectorCommand),
}
