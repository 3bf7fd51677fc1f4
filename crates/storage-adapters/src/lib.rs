//! Document store adapters: a local JSON directory and, behind the `pinata`
//! feature, IPFS pinning with the local store as its credential-less fallback.

pub mod local;
#[cfg(feature = "pinata")]
pub mod pinata;

pub use local::LocalBlobStore;
#[cfg(feature = "pinata")]
pub use pinata::{PinataBlobStore, PinataConfig};
