use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::table::{Cell, CellReader, Column, Tabular};

/// One retracted publication after ETL normalisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub original_paper_doi: Option<String>,
    pub retraction_doi: Option<String>,
    pub original_paper_date: Option<String>,
    pub retraction_date: Option<String>,
    pub retraction_nature: Option<String>,
    pub notes: Option<String>,

    /// Raw institution strings in source order.
    #[serde(default)]
    pub institutions: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub article_types: Vec<String>,
    #[serde(default)]
    pub reasons: Vec<String>,

    // CrossRef
    pub work_type: Option<String>,
    pub container: Option<String>,
    pub publisher: Option<String>,
    pub prefix: Option<String>,

    // ROR; these only ever grow.
    #[serde(default)]
    pub ror_ids: BTreeSet<String>,
    #[serde(default)]
    pub ror_names: BTreeSet<String>,
    #[serde(default)]
    pub ror_countries: BTreeSet<String>,
    #[serde(default)]
    pub ror_regions: BTreeSet<String>,
}

impl Record {
    pub fn new(doi: impl Into<String>) -> Self {
        Self {
            original_paper_doi: Some(doi.into()),
            ..Default::default()
        }
    }

    pub fn with_institutions<I, S>(mut self, institutions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.institutions = institutions.into_iter().map(Into::into).collect();
        self
    }

    pub fn doi(&self) -> Option<&str> {
        self.original_paper_doi.as_deref()
    }

    pub fn has_ror_match(&self) -> bool {
        !self.ror_ids.is_empty()
    }
}

fn set_cell(set: &BTreeSet<String>) -> Cell {
    Cell::List(set.iter().cloned().collect())
}

impl Tabular for Record {
    const COLUMNS: &'static [Column] = &[
        Column::text("originalpaperdoi"),
        Column::text("retractiondoi"),
        Column::text("originalpaperdate"),
        Column::text("retractiondate"),
        Column::text("retractionnature"),
        Column::text("notes"),
        Column::list("institution"),
        Column::list("urls"),
        Column::list("articletype"),
        Column::list("reason"),
        Column::text("crtype"),
        Column::text("crcontainer"),
        Column::text("crpublisher"),
        Column::text("crprefix"),
        Column::list("rorids"),
        Column::list("rornames"),
        Column::list("rorcountries"),
        Column::list("rorregions"),
    ];

    fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::Text(self.original_paper_doi.clone()),
            Cell::Text(self.retraction_doi.clone()),
            Cell::Text(self.original_paper_date.clone()),
            Cell::Text(self.retraction_date.clone()),
            Cell::Text(self.retraction_nature.clone()),
            Cell::Text(self.notes.clone()),
            Cell::List(self.institutions.clone()),
            Cell::List(self.urls.clone()),
            Cell::List(self.article_types.clone()),
            Cell::List(self.reasons.clone()),
            Cell::Text(self.work_type.clone()),
            Cell::Text(self.container.clone()),
            Cell::Text(self.publisher.clone()),
            Cell::Text(self.prefix.clone()),
            set_cell(&self.ror_ids),
            set_cell(&self.ror_names),
            set_cell(&self.ror_countries),
            set_cell(&self.ror_regions),
        ]
    }

    fn from_cells(mut cells: CellReader) -> Result<Self> {
        Ok(Self {
            original_paper_doi: cells.text()?,
            retraction_doi: cells.text()?,
            original_paper_date: cells.text()?,
            retraction_date: cells.text()?,
            retraction_nature: cells.text()?,
            notes: cells.text()?,
            institutions: cells.list()?,
            urls: cells.list()?,
            article_types: cells.list()?,
            reasons: cells.list()?,
            work_type: cells.text()?,
            container: cells.text()?,
            publisher: cells.text()?,
            prefix: cells.text()?,
            ror_ids: cells.list()?.into_iter().collect(),
            ror_names: cells.list()?.into_iter().collect(),
            ror_countries: cells.list()?.into_iter().collect(),
            ror_regions: cells.list()?.into_iter().collect(),
        })
    }
}
