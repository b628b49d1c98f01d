// file: src/dataset/mod.rs
// description: tabular value model module exports
// reference: internal module structure

pub mod reader;
pub mod table;
pub mod value;

pub use reader::{DataFormat, DatasetReader};
pub use table::{Column, Dataset};
pub use value::{Cell, ColumnType};
