//! Tracing setup: structured JSON logs, plus OTLP span export when configured.
//!
//! # Telemetry invariants
//!
//! - **No plaintext, ciphertext tokens, or key material** may appear in any
//!   span attribute or log field. Field *names* and outcome counts are fine.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`) and can be
//!   overridden with `RUST_LOG`.

pub mod init;

pub use init::init_telemetry;
