//! File-based implementation of OrderDirectory

use std::path::PathBuf;

use parcel_domain::model::OrderSummary;
use parcel_domain::repository::OrderDirectory;
use parcel_types::Error;

use crate::order_book::OrderBook;

/// Order directory backed by a TOML order book
pub struct FileOrderDirectory {
    toml_path: Option<PathBuf>,
    book: OrderBook,
}

impl FileOrderDirectory {
    /// Load from a TOML file path
    pub fn new(toml_path: PathBuf) -> Result<Self, Error> {
        let book = OrderBook::load_from_file(&toml_path)?;
        Ok(Self {
            toml_path: Some(toml_path),
            book,
        })
    }

    /// Directory with no known orders; every lookup misses
    pub fn empty() -> Self {
        Self {
            toml_path: None,
            book: OrderBook::default(),
        }
    }

    pub fn from_book(book: OrderBook) -> Self {
        Self {
            toml_path: None,
            book,
        }
    }

    /// Reload data from TOML
    pub fn reload(&mut self) -> Result<(), Error> {
        if let Some(ref path) = self.toml_path {
            self.book = OrderBook::load_from_file(path)?;
        }
        Ok(())
    }
}

impl OrderDirectory for FileOrderDirectory {
    fn find_order(&self, order_id: &str) -> Result<Option<OrderSummary>, Error> {
        Ok(self.book.get(order_id).cloned())
    }
}
