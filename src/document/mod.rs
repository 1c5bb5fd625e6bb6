mod core;

pub use core::Document;
