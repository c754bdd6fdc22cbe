//! Query dispatch and result normalization.
//!
//! The adapter fixes how the injected query function is called; the
//! normalizer turns whatever it returns into a table.

pub mod adapter;
pub mod normalize;

pub use adapter::{AdapterBinding, CallShape, CallingConvention, QueryAdapter};
pub use normalize::{count_rows, normalize, Table};
