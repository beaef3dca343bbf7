//! The `AMI` container: reader, extraction dispatch, and the packing
//! builder.
pub mod builder;
pub mod extractor;
pub mod reader;
