//! Wholesale save/load of typed tables.
//!
//! Every table is persisted twice: a Parquet file, which is authoritative and
//! the only one read back, and a flat CSV for inspection. Both are written to a
//! temporary file next to the target and renamed into place, so a reader sees
//! either the previous table or the new one, never a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{Array, ArrayRef, ListArray, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tempfile::NamedTempFile;

use crate::error::{Result, RetractscopeError};

/// Separator used when a list cell is flattened into one CSV field.
pub const LIST_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Nullable UTF-8 string.
    Text,
    /// List of UTF-8 strings, never null (an absent list is empty).
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::List,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(Option<String>),
    List(Vec<String>),
}

impl Cell {
    fn empty(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Text => Cell::Text(None),
            ColumnKind::List => Cell::List(Vec::new()),
        }
    }

    fn to_csv_field(&self) -> String {
        match self {
            Cell::Text(value) => value.clone().unwrap_or_default(),
            Cell::List(items) => items.join(LIST_SEPARATOR),
        }
    }
}

/// Reads the cells of one row in column order.
pub struct CellReader {
    cells: std::vec::IntoIter<Cell>,
    columns: std::slice::Iter<'static, Column>,
}

impl CellReader {
    pub fn new(columns: &'static [Column], cells: Vec<Cell>) -> Self {
        Self {
            cells: cells.into_iter(),
            columns: columns.iter(),
        }
    }

    fn next_cell(&mut self) -> Result<(&'static Column, Cell)> {
        match (self.columns.next(), self.cells.next()) {
            (Some(column), Some(cell)) => Ok((column, cell)),
            _ => Err(RetractscopeError::Validation(
                "row has fewer cells than the table declares".to_string(),
            )),
        }
    }

    pub fn text(&mut self) -> Result<Option<String>> {
        match self.next_cell()? {
            (_, Cell::Text(value)) => Ok(value),
            (column, Cell::List(_)) => Err(RetractscopeError::Schema {
                column: column.name.to_string(),
                expected: "text",
            }),
        }
    }

    /// A text cell that must not be null.
    pub fn required(&mut self) -> Result<String> {
        match self.next_cell()? {
            (_, Cell::Text(Some(value))) => Ok(value),
            (column, Cell::Text(None)) => Err(RetractscopeError::Validation(format!(
                "column '{}' must not be null",
                column.name
            ))),
            (column, Cell::List(_)) => Err(RetractscopeError::Schema {
                column: column.name.to_string(),
                expected: "text",
            }),
        }
    }

    pub fn list(&mut self) -> Result<Vec<String>> {
        match self.next_cell()? {
            (_, Cell::List(items)) => Ok(items),
            (column, Cell::Text(_)) => Err(RetractscopeError::Schema {
                column: column.name.to_string(),
                expected: "list",
            }),
        }
    }
}

/// A row type with a fixed column layout.
pub trait Tabular: Sized {
    const COLUMNS: &'static [Column];

    /// One cell per entry of `COLUMNS`, in the same order.
    fn to_cells(&self) -> Vec<Cell>;

    fn from_cells(cells: CellReader) -> Result<Self>;
}

/// Locations of the two on-disk forms of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePaths {
    pub parquet: PathBuf,
    pub csv: PathBuf,
}

impl TablePaths {
    pub fn in_dir(dir: &Path, stem: &str) -> Self {
        Self {
            parquet: dir.join(format!("{stem}.parquet")),
            csv: dir.join(format!("{stem}.csv")),
        }
    }

    pub fn exists(&self) -> bool {
        self.parquet.exists()
    }
}

// ─── Save ───────────────────────────────────────────────────────────────────

/// Rewrite both forms of the table.
pub fn save_table<T: Tabular>(rows: &[T], paths: &TablePaths) -> Result<()> {
    let batch = build_batch(rows)?;
    write_parquet(&paths.parquet, &batch)?;
    write_csv(&paths.csv, T::COLUMNS, rows)?;
    Ok(())
}

fn build_batch<T: Tabular>(rows: &[T]) -> Result<RecordBatch> {
    let mut text_builders: Vec<Option<StringBuilder>> = Vec::new();
    let mut list_builders: Vec<Option<ListBuilder<StringBuilder>>> = Vec::new();
    for column in T::COLUMNS {
        match column.kind {
            ColumnKind::Text => {
                text_builders.push(Some(StringBuilder::new()));
                list_builders.push(None);
            }
            ColumnKind::List => {
                text_builders.push(None);
                list_builders.push(Some(ListBuilder::new(StringBuilder::new())));
            }
        }
    }

    for row in rows {
        let cells = row.to_cells();
        if cells.len() != T::COLUMNS.len() {
            return Err(RetractscopeError::Validation(format!(
                "row produced {} cells for {} columns",
                cells.len(),
                T::COLUMNS.len()
            )));
        }
        for (idx, cell) in cells.into_iter().enumerate() {
            match (cell, &mut text_builders[idx], &mut list_builders[idx]) {
                (Cell::Text(value), Some(builder), _) => builder.append_option(value),
                (Cell::List(items), _, Some(builder)) => {
                    for item in items {
                        builder.values().append_value(item);
                    }
                    builder.append(true);
                }
                (Cell::Text(_), ..) => {
                    return Err(RetractscopeError::Schema {
                        column: T::COLUMNS[idx].name.to_string(),
                        expected: "list",
                    });
                }
                (Cell::List(_), ..) => {
                    return Err(RetractscopeError::Schema {
                        column: T::COLUMNS[idx].name.to_string(),
                        expected: "text",
                    });
                }
            }
        }
    }

    let mut fields = Vec::with_capacity(T::COLUMNS.len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(T::COLUMNS.len());
    for (idx, column) in T::COLUMNS.iter().enumerate() {
        let array: ArrayRef = match (text_builders[idx].take(), list_builders[idx].take()) {
            (Some(mut builder), _) => Arc::new(builder.finish()),
            (_, Some(mut builder)) => Arc::new(builder.finish()),
            (None, None) => unreachable!("every column has a builder"),
        };
        fields.push(Field::new(column.name, array.data_type().clone(), true));
        arrays.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

fn temp_file_for(path: &Path) -> Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    Ok(NamedTempFile::new_in(dir)?)
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let mut tmp = temp_file_for(path)?;
    {
        let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), None)?;
        writer.write(batch)?;
        writer.close()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

fn write_csv<T: Tabular>(path: &Path, columns: &[Column], rows: &[T]) -> Result<()> {
    let mut tmp = temp_file_for(path)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(columns.iter().map(|column| column.name))?;
        for row in rows {
            writer.write_record(row.to_cells().iter().map(Cell::to_csv_field))?;
        }
        writer.flush()?;
    }
    tmp.as_file_mut().flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Write `bytes` to `path` through a temporary file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = temp_file_for(path)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

// ─── Load ───────────────────────────────────────────────────────────────────

/// Load the Parquet form of a table.
///
/// Columns missing from the file load as null / empty lists; columns with the
/// wrong Arrow type are rejected.
pub fn load_table<T: Tabular>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let columns = T::COLUMNS
            .iter()
            .map(|column| ColumnData::from_batch(&batch, column))
            .collect::<Result<Vec<_>>>()?;

        for idx in 0..batch.num_rows() {
            let cells = columns
                .iter()
                .zip(T::COLUMNS)
                .map(|(data, column)| data.cell(idx, column.kind))
                .collect::<Vec<_>>();
            rows.push(T::from_cells(CellReader::new(T::COLUMNS, cells))?);
        }
    }
    Ok(rows)
}

/// Load a table, treating a missing file as an empty table.
pub fn load_table_or_empty<T: Tabular>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    load_table(path)
}

/// Load a table that must already exist.
pub fn require_table<T: Tabular>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(RetractscopeError::InputMissing(path.to_path_buf()));
    }
    load_table(path)
}

enum ColumnData<'a> {
    Missing,
    Text(&'a StringArray),
    List(&'a ListArray),
}

impl<'a> ColumnData<'a> {
    fn from_batch(batch: &'a RecordBatch, column: &Column) -> Result<Self> {
        let Some(array) = batch.column_by_name(column.name) else {
            return Ok(ColumnData::Missing);
        };

        match column.kind {
            ColumnKind::Text => array
                .as_any()
                .downcast_ref::<StringArray>()
                .map(ColumnData::Text)
                .ok_or_else(|| schema_error(column, "text")),
            ColumnKind::List => {
                let list = array
                    .as_any()
                    .downcast_ref::<ListArray>()
                    .ok_or_else(|| schema_error(column, "list"))?;
                if list.value_type() != DataType::Utf8 {
                    return Err(schema_error(column, "list of text"));
                }
                Ok(ColumnData::List(list))
            }
        }
    }

    fn cell(&self, idx: usize, kind: ColumnKind) -> Cell {
        match self {
            ColumnData::Missing => Cell::empty(kind),
            ColumnData::Text(array) => {
                if array.is_null(idx) {
                    Cell::Text(None)
                } else {
                    Cell::Text(Some(array.value(idx).to_string()))
                }
            }
            ColumnData::List(array) => {
                if array.is_null(idx) {
                    return Cell::List(Vec::new());
                }
                let values = array.value(idx);
                let items = values
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .map(|strings| strings.iter().flatten().map(ToOwned::to_owned).collect())
                    .unwrap_or_default();
                Cell::List(items)
            }
        }
    }
}

fn schema_error(column: &Column, expected: &'static str) -> RetractscopeError {
    RetractscopeError::Schema {
        column: column.name.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    struct Sample {
        key: String,
        note: Option<String>,
        tags: Vec<String>,
    }

    impl Tabular for Sample {
        const COLUMNS: &'static [Column] = &[
            Column::text("key"),
            Column::text("note"),
            Column::list("tags"),
        ];

        fn to_cells(&self) -> Vec<Cell> {
            vec![
                Cell::Text(Some(self.key.clone())),
                Cell::Text(self.note.clone()),
                Cell::List(self.tags.clone()),
            ]
        }

        fn from_cells(mut cells: CellReader) -> Result<Self> {
            Ok(Self {
                key: cells.text()?.unwrap_or_default(),
                note: cells.text()?,
                tags: cells.list()?,
            })
        }
    }

    /// Same key column, plus a column `Sample` does not know about.
    #[derive(Debug, Clone, PartialEq)]
    struct Narrow {
        key: String,
        extra: Vec<String>,
    }

    impl Tabular for Narrow {
        const COLUMNS: &'static [Column] = &[Column::text("key"), Column::list("extra")];

        fn to_cells(&self) -> Vec<Cell> {
            vec![
                Cell::Text(Some(self.key.clone())),
                Cell::List(self.extra.clone()),
            ]
        }

        fn from_cells(mut cells: CellReader) -> Result<Self> {
            Ok(Self {
                key: cells.text()?.unwrap_or_default(),
                extra: cells.list()?,
            })
        }
    }

    fn sample_rows() -> Vec<Sample> {
        vec![
            Sample {
                key: "a".to_string(),
                note: None,
                tags: vec!["x".to_string(), "y".to_string()],
            },
            Sample {
                key: "b".to_string(),
                note: Some("with, comma".to_string()),
                tags: vec![],
            },
        ]
    }

    #[test]
    fn test_save_and_load_preserves_nulls_and_lists() {
        let dir = TempDir::new().unwrap();
        let paths = TablePaths::in_dir(dir.path(), "sample");

        save_table(&sample_rows(), &paths).unwrap();
        let loaded: Vec<Sample> = load_table(&paths.parquet).unwrap();

        assert_eq!(loaded, sample_rows());
    }

    #[test]
    fn test_csv_flattens_lists() {
        let dir = TempDir::new().unwrap();
        let paths = TablePaths::in_dir(dir.path(), "sample");

        save_table(&sample_rows(), &paths).unwrap();
        let csv = fs::read_to_string(&paths.csv).unwrap();
        let mut lines = csv.lines();

        assert_eq!(lines.next(), Some("key,note,tags"));
        assert_eq!(lines.next(), Some("a,,x; y"));
        assert_eq!(lines.next(), Some("b,\"with, comma\","));
    }

    #[test]
    fn test_empty_table_roundtrips() {
        let dir = TempDir::new().unwrap();
        let paths = TablePaths::in_dir(dir.path(), "empty");

        save_table::<Sample>(&[], &paths).unwrap();
        let loaded: Vec<Sample> = load_table(&paths.parquet).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_missing_columns_load_as_empty() {
        let dir = TempDir::new().unwrap();
        let paths = TablePaths::in_dir(dir.path(), "narrow");
        let narrow = vec![Narrow {
            key: "k".to_string(),
            extra: vec!["e".to_string()],
        }];
        save_table(&narrow, &paths).unwrap();

        let loaded: Vec<Sample> = load_table(&paths.parquet).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].key, "k");
        assert_eq!(loaded[0].note, None);
        assert!(loaded[0].tags.is_empty());
    }

    #[test]
    fn test_wrong_column_type_is_rejected() {
        let dir = TempDir::new().unwrap();
        let paths = TablePaths::in_dir(dir.path(), "sample");
        save_table(&sample_rows(), &paths).unwrap();

        // `note` is stored as text; reading it as a list must fail.
        struct Clash;
        impl Tabular for Clash {
            const COLUMNS: &'static [Column] = &[Column::list("note")];
            fn to_cells(&self) -> Vec<Cell> {
                vec![Cell::List(Vec::new())]
            }
            fn from_cells(mut cells: CellReader) -> Result<Self> {
                cells.list()?;
                Ok(Clash)
            }
        }

        let err = load_table::<Clash>(&paths.parquet).err().unwrap();
        assert!(matches!(err, RetractscopeError::Schema { ref column, .. } if column == "note"));
    }

    #[test]
    fn test_save_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let paths = TablePaths::in_dir(dir.path(), "sample");

        save_table(&sample_rows(), &paths).unwrap();
        save_table(&sample_rows()[..1], &paths).unwrap();

        let loaded: Vec<Sample> = load_table(&paths.parquet).unwrap();
        assert_eq!(loaded.len(), 1);
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 2, "temporary files must not be left behind");
    }

    #[test]
    fn test_require_table_reports_missing_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.parquet");

        let err = require_table::<Sample>(&path).err().unwrap();
        assert!(matches!(err, RetractscopeError::InputMissing(p) if p == path));
        assert!(load_table_or_empty::<Sample>(&path).unwrap().is_empty());
    }
}
