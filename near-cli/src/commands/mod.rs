//! CLI command implementations.

pub mod identity;
pub mod listen;
pub mod pair;
pub mod paired;
pub mod run;
pub mod scan;
pub mod send;
