//! Infrastructure layer: file-backed implementations of the domain
//! repository traits, plus photo metadata reading

pub mod exif_reader;
pub mod order_book;
pub mod persistence;

pub use exif_reader::PhotoMetadata;
pub use order_book::OrderBook;
pub use persistence::{FileBlobStorage, FileConditionRepository, FileOrderDirectory};
