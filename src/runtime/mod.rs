//! Runtime support shared by every object kind

pub mod memory;
