//! Function-result memoization with an in-memory tier and optional on-disk
//! persistence.
//!
//! A wrapped function is called through [`Memoized::call`]. The cache key is
//! either configured explicitly or derived from the function name and the
//! call arguments. Lookups go to memory first, then (when persistent) to a
//! file named after the key in the storage folder. On a miss the function
//! runs, lazy arguments are evaluated first if enabled, and the result is
//! written back to both tiers.
//!
//! # Quick Start
//!
//! ```
//! use memoize_core::{Args, MemoizeResult, Memoized, Source};
//!
//! # fn main() -> MemoizeResult<()> {
//! let mut add = Memoized::new("add", |args: Args| {
//!     args.value::<i64>(0).unwrap_or(0) + args.value::<i64>(1).unwrap_or(0)
//! })?;
//!
//! assert_eq!(add.call(Args::new().push(1).push(2))?, 3); // computed
//! assert_eq!(add.call(Args::new().push(1).push(2))?, 3); // from memory
//! assert_eq!(add.last_source(), Some(Source::Memory));
//!
//! add.clear()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limits
//!
//! - Arguments are JSON-shaped values or lazy closures; return values must
//!   implement `Serialize` and `DeserializeOwned`.
//! - No eviction and no expiry: the cache grows until [`Memoized::clear`].
//! - No locking across processes sharing a storage folder.
//! - Two calls that map to the same key (an explicit key, or a digest
//!   collision) share one result. A lazy argument keys as its name, so it
//!   collides with a plain string argument of the same text.
//! - A result is decoded from its stored form before it is returned, so a
//!   miss and every later hit return the same value.

pub mod args;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod memoize;
pub mod store;

pub use args::{Arg, Args, LazyArg, NAMELESS};
pub use codec::{Codec, JsonCodec};
pub use config::{MemoizeConfig, DEFAULT_FOLDER};
pub use error::{MemoizeError, MemoizeResult};
pub use key::{derive_key, KeyDigest};
pub use memoize::{Memoize, Memoized, Source, Traced};
pub use store::DiskStore;
