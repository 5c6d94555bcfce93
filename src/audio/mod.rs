pub mod memory;
pub mod metadata;
pub mod stream;
