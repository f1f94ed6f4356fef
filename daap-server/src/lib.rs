//! The concrete HTTP/Zeroconf surface around `daap-core`: route table,
//! query decoding, Basic auth, byte-range streaming, the response
//! cache, the bundled filesystem media source, and the Zeroconf
//! advertiser. `daap-core` never imports this crate; this crate is the
//! only thing that knows how to turn a `daap_core::Error` into an HTTP
//! status code.

pub mod http;
pub mod library;
pub mod media;
pub mod zeroconf;

pub use media::LocalFileProvider;
