use serde::{Deserialize, Serialize};

use crate::error::{Result, RetractscopeError};
use crate::storage::table::{Cell, CellReader, Column, Tabular};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Found,
    /// The registry definitively does not know the DOI.
    NotFound,
}

impl std::fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Found => write!(f, "found"),
            Self::NotFound => write!(f, "not_found"),
        }
    }
}

impl std::str::FromStr for WorkStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "found" => Ok(Self::Found),
            "not_found" => Ok(Self::NotFound),
            _ => Err(format!("Invalid WorkStatus: {s}")),
        }
    }
}

/// CrossRef metadata for one DOI, or the marker that CrossRef has none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkMetadata {
    pub doi: String,
    pub status: WorkStatus,
    pub work_type: Option<String>,
    pub container: Option<String>,
    pub publisher: Option<String>,
    pub prefix: Option<String>,
}

impl WorkMetadata {
    pub fn not_found(doi: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            status: WorkStatus::NotFound,
            ..Default::default()
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == WorkStatus::Found
    }
}

impl Tabular for WorkMetadata {
    const COLUMNS: &'static [Column] = &[
        Column::text("doi"),
        Column::text("status"),
        Column::text("crtype"),
        Column::text("crcontainer"),
        Column::text("crpublisher"),
        Column::text("crprefix"),
    ];

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(Some(self.doi.clone())),
            Cell::Text(Some(self.status.to_string())),
            Cell::Text(self.work_type.clone()),
            Cell::Text(self.container.clone()),
            Cell::Text(self.publisher.clone()),
            Cell::Text(self.prefix.clone()),
        ]
    }

    fn from_cells(mut cells: CellReader) -> Result<Self> {
        let doi = cells.required()?;
        let status = match cells.text()? {
            Some(raw) => raw.parse().map_err(RetractscopeError::Validation)?,
            None => WorkStatus::Found,
        };
        Ok(Self {
            doi,
            status,
            work_type: cells.text()?,
            container: cells.text()?,
            publisher: cells.text()?,
            prefix: cells.text()?,
        })
    }
}
