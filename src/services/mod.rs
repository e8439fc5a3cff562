//! Service layer for the scanner.
//!
//! This module contains the building blocks every operation is made of:
//! - Single network calls (`Transport`)
//! - Status and payload classification (`classify`)
//! - Pacing, backoff and attempt caps (`Governor`)
//! - Ordered source chains (`SourceChain`)
//! - Payload-to-entity mapping (`normalizer`)
//! - Rendered-page extraction (`html`)
//! - Cursor walking (`paginate`)

pub mod classify;
pub mod fallback;
pub mod html;
pub mod normalizer;
pub mod paginate;
pub mod retry;
pub mod transport;

pub use classify::classify;
pub use fallback::{Hit, Source, SourceChain, Yield};
pub use normalizer::{EntityKind, Layout, Normalize};
pub use paginate::WalkError;
pub use retry::Governor;
pub use transport::{HttpTransport, Request, Response, Transport};
