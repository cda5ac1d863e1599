//! SIO Port Abstraction
//!
//! The hardware seam for the channel: one UART transmit path, the COMMAND
//! line, and time. Hosts implement this over their serial driver and GPIO;
//! tests implement it over vectors and a fake clock.
//!
//! Received bytes do not come through this trait; the host feeds them to
//! [`crate::SioChannel::on_byte`] as they arrive.

/// Bus-side hardware services
pub trait SioPort {
    /// `true` while the host holds the COMMAND line asserted (active LOW)
    fn command_asserted(&mut self) -> bool;

    /// Queue one byte for transmission
    fn send(&mut self, byte: u8);

    /// Wait until every queued byte has left the UART
    fn flush(&mut self);

    /// Block for at least `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Block for at least `us` microseconds
    fn delay_us(&mut self, us: u32);

    /// Monotonic milliseconds since an arbitrary epoch
    fn now_ms(&mut self) -> u64;
}

impl<T: SioPort + ?Sized> SioPort for &mut T {
    fn command_asserted(&mut self) -> bool {
        (**self).command_asserted()
    }

    fn send(&mut self, byte: u8) {
        (**self).send(byte)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn now_ms(&mut self) -> u64 {
        (**self).now_ms()
    }
}
