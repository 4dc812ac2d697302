//! # ucam Core Library
//!
//! Core functionality for driving uCAM-III serial camera modules.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - The 6-byte command protocol with ACK/NAK classification and bounded retry
//! - Session setup: synchronization handshake, capture settings, baud-rate renegotiation
//! - Snapshot triggering and framed bulk image download
//! - Diagnostic lookup of device error codes
//!
//! ## Example
//!
//! ```rust,ignore
//! use ucam_core::{config::SessionConfig, protocol::{PictureKind, Session, SnapshotKind}};
//!
//! let config = SessionConfig::new("/dev/ttyUSB0");
//! let mut session = Session::open_serial(config);
//! session.connect()?;
//! session.set_package_size(512)?;
//! session.snapshot(SnapshotKind::Jpeg)?;
//! let image = session.get_picture(PictureKind::Snapshot)?;
//! ```

pub mod config;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::protocol::{
        Brightness, Contrast, Exposure, ImageFormat, JpegResolution, PictureKind, ProtocolError,
        RawResolution, Session, SessionState, SnapshotKind,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
