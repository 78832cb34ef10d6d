/*!
A streaming CBOR encoder and decoder covering the subset of RFC 8949 used
by the Bundle Protocol: unsigned and negative integers, definite-length
byte and text strings, definite- and indefinite-length arrays, and the
simple values.

The encoder is write-only and infallible; the decoder borrows the input
buffer and parses through closures so callers can track the byte extents
of nested items, which the bundle codec needs for CRC coverage.
*/

pub mod decode;
pub mod encode;

#[cfg(test)]
mod decode_tests;

#[cfg(test)]
mod encode_tests;
