//! Wire-facing session machinery.

pub mod session;
