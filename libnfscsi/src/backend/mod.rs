//! Storage backend implementations.
//!
//! Each backend module provides a concrete type that implements
//! [`CsiIdentity`](crate::CsiIdentity) and [`CsiController`](crate::CsiController).

pub mod nfs;
