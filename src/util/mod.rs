//! More-or-less general-purpose utility functions.

pub mod bits;
pub mod dedup;
pub mod uniq;
