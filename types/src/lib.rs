pub mod combined;
pub mod consts;
pub mod containers;
pub mod nonstandard;
pub mod primitives;
pub mod records;
pub mod state;
