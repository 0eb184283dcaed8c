pub use crate::acquire_book::{AcquireBook, Acquisition, Page};

mod acquire_book;
