/// Single bidirectional data line, as used by bit-banged one-wire protocols

/// A GPIO line that can be switched between driving and listening.
///
/// Implementations must not block or perform system calls in `is_high`,
/// it is polled in tight timing loops.
pub trait DataLine {
    /// Switch the line to input (high impedance, pulled up externally)
    fn set_input(&mut self);

    /// Switch the line to push-pull output
    fn set_output(&mut self);

    /// Drive the line high. Only meaningful in output mode.
    fn set_high(&mut self);

    /// Drive the line low. Only meaningful in output mode.
    fn set_low(&mut self);

    /// Sample the current line level
    fn is_high(&mut self) -> bool;
}

impl<T: DataLine + ?Sized> DataLine for &mut T {
    fn set_input(&mut self) {
        (**self).set_input()
    }

    fn set_output(&mut self) {
        (**self).set_output()
    }

    fn set_high(&mut self) {
        (**self).set_high()
    }

    fn set_low(&mut self) {
        (**self).set_low()
    }

    fn is_high(&mut self) -> bool {
        (**self).is_high()
    }
}
