//! Core type definitions for KeystoneDB.

mod ids;
mod refs;

pub use ids::{CollectionId, TxnId};
pub use refs::CollectionRef;
