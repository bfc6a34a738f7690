//! Content integrity for dataset versions
//!
//! Every snapshot carries a version hash computed from the canonical JSON
//! serialization of its rows. Two snapshots with identical rows in the same
//! order always have the same hash, so consumers (analytics caches, list
//! views) compare hashes rather than version numbers to detect staleness.
//!
//! ```
//! use insight_dataops::integrity::HashAlgorithm;
//!
//! let a = HashAlgorithm::Rolling32.fingerprint(r#"[{"x":1}]"#);
//! let b = HashAlgorithm::Rolling32.fingerprint(r#"[{"x":1}]"#);
//! assert_eq!(a, b);
//! ```

pub mod hasher;

pub use hasher::{HashAlgorithm, rolling_hash, sha256_fingerprint};
