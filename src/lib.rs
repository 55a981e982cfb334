//! Ember-KV: an embedded key-value storage engine inspired by Bitcask.
//!
//! Ember-KV keeps every value in append-only data files and every live
//! key in an in-memory index pointing at the most recent record on disk,
//! giving it a single sequential write per mutation and a single random
//! read per lookup.
//!
//! # Features
//!
//! * Durable `put`/`get`/`delete` with configurable fsync behavior
//! * Crash recovery by replaying the data files on open
//! * Atomic write batches committed under one sequence number
//! * Ordered iteration with prefix filtering, forward and reverse
//! * Pluggable in-memory index implementations
//! * Memory-mapped reads to speed up the startup replay
//!
//! # Basic Usage
//!
//! ```
//! use bytes::Bytes;
//! use ember_kv::{db::Engine, option::Options};
//!
//! // Create a default engine instance
//! let opts = Options::default();
//! let engine = Engine::open(opts).expect("failed to open ember-kv engine");
//!
//! // Store a key-value pair
//! let key = Bytes::from(b"hello".to_vec());
//! let value = Bytes::from(b"world".to_vec());
//! engine.put(key.clone(), value.clone()).expect("failed to put");
//!
//! // Retrieve the value
//! let retrieved = engine.get(key.clone()).expect("failed to get");
//! assert_eq!(retrieved, value);
//!
//! // Delete the key
//! engine.delete(key).expect("failed to delete");
//! ```

mod data;

mod fio;
mod index;
mod iterator;

pub mod batch;
pub mod db;
pub mod errors;
pub mod option;
pub mod util;
