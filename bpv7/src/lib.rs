/*!
A Rust implementation of the Bundle Protocol Version 7 (BPv7), as defined
in [RFC 9171](https://www.rfc-editor.org/rfc/rfc9171.html).

This crate provides the building blocks for working with BPv7 bundles:
creation, CBOR encoding and decoding with per-block CRCs, validation, and
fragmentation/reassembly.

# Key modules

- [`bundle`]: the [`Bundle`](bundle::Bundle) struct, parsing and emission.
- [`builder`]: a fluent [`Builder`](builder::Builder) for new bundles.
- [`eid`]: Endpoint Identifiers for the `dtn` URI scheme.
- [`block`]: canonical (extension and payload) blocks.
- [`fragmentation`]: splitting a bundle over an MTU and reassembling it.
*/

use brant_cbor as cbor;

pub mod block;
pub mod block_flags;
pub mod block_type;
pub mod builder;
pub mod bundle;
pub mod bundle_flags;
pub mod bundle_id;
pub mod crc;
pub mod creation_timestamp;
pub mod dtn_time;
pub mod eid;
pub mod fragmentation;
pub mod primary_block;

mod error;
pub use error::Error;
