pub mod image;
pub mod script;
pub mod zlib;
