use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::table::{Cell, CellReader, Column, Tabular};

/// A raw institution string resolved to its canonical ROR organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMatch {
    /// The institution string exactly as it appears in the records.
    pub raw: String,
    pub ror: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Tabular for OrganizationMatch {
    const COLUMNS: &'static [Column] = &[
        Column::text("raw"),
        Column::text("ror"),
        Column::text("name"),
        Column::text("country"),
        Column::text("region"),
    ];

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(Some(self.raw.clone())),
            Cell::Text(Some(self.ror.clone())),
            Cell::Text(Some(self.name.clone())),
            Cell::Text(self.country.clone()),
            Cell::Text(self.region.clone()),
        ]
    }

    fn from_cells(mut cells: CellReader) -> Result<Self> {
        Ok(Self {
            raw: cells.required()?,
            ror: cells.required()?,
            name: cells.text()?.unwrap_or_default(),
            country: cells.text()?,
            region: cells.text()?,
        })
    }
}
