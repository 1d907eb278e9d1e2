//! Mock Toolchain Implementation
//!
//! In-process stand-in for the compiler toolchain, used by unit and
//! integration tests. Supports:
//!
//! - a fixed target listing and host target
//! - failure injection for the listing and for builds
//! - an optional build delay, to hold a build open while other callers run
//! - invocation recording and peak build concurrency tracking
//!
//! A successful build writes a small placeholder file at the invocation's
//! output path, the way a real compiler would.

mod toolchain;

pub use toolchain::MockToolchain;
