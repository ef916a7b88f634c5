//! Request body handling: parser settings and multipart uploads.

pub mod parser;
#[cfg(feature = "upload")]
pub mod upload;

pub use parser::{body_parser, BodyParserConfig};
#[cfg(feature = "upload")]
pub use upload::{StoredFile, UploadConfig, UploadHandler};
