pub mod checkpoint;
pub mod table;

pub use checkpoint::CheckpointStore;
pub use table::{
    Cell, CellReader, Column, ColumnKind, TablePaths, Tabular, load_table, load_table_or_empty,
    require_table, save_table, write_atomic,
};
