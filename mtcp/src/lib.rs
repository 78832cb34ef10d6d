/*!
The Minimal TCP Convergence-Layer Protocol.

Each frame on the wire is a CBOR byte string whose contents are one
CBOR-encoded bundle. A byte string of length zero is a keep-alive:
senders emit one every few seconds and after each bundle to probe
liveness, and receivers tolerate them at any point in the stream without
ever surfacing them as bundles.

The [`Listener`] accepts connections and registers a receiving CLA
instance per connection; the [`Client`] is a sending instance bound to
one remote, optionally with a known peer EID.
*/

mod client;
mod codec;
mod listener;

#[cfg(test)]
mod tests;

pub use client::Client;
pub use listener::Listener;

/// Frames larger than this are treated as a protocol violation and
/// close the connection.
const MAX_FRAME_SIZE: u64 = 64 * 1024 * 1024;

/// Interval between keep-alive frames on an idle client connection.
const KEEPALIVE_PERIOD: std::time::Duration = std::time::Duration::from_secs(5);
