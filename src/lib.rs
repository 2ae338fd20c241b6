#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A fixed-capacity key-value table using hopscotch hashing.
///
/// This module provides the `HopscotchTable` along with its configuration
/// struct, the key capability trait, and the insertion error type.
pub mod hash_table;

pub use hash_table::Config;
pub use hash_table::HashCode;
pub use hash_table::HopscotchTable;
pub use hash_table::InsertError;
