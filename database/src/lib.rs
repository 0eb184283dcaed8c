pub use crate::{
    in_memory::{InMemorySink, Tables},
    sink::{RecordBatch, Selector, Sink},
};

mod in_memory;
mod sink;
