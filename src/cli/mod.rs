pub mod commands;
pub mod interrupt;
