//! Ephemeral port allocation.

use arena_env::HarnessError;
use std::net::TcpListener;

/// Returns a currently-unused loopback TCP port.
///
/// The probe listener is dropped before returning so the caller can rebind
/// the port. Another process could grab it in between; acceptable for a
/// single-machine test fixture.
pub fn free_port() -> Result<u16, HarnessError> {
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_port_is_bindable() {
        let port = free_port().unwrap();
        assert_ne!(port, 0);

        // The probe released it, so binding again succeeds
        TcpListener::bind(("127.0.0.1", port)).unwrap();
    }
}
