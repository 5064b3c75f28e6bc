use crate::error::{NemError, Result};

/// Column-major table slice returned by a store scan. Cells stay as text;
/// typing is the adapter's job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    table: String,
    columns: Vec<String>,
    data: Vec<Vec<String>>,
}

impl Frame {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Self {
        let data = vec![Vec::new(); columns.len()];
        Self {
            table: table.into(),
            columns,
            data,
        }
    }

    pub fn from_rows<R, S>(table: impl Into<String>, columns: &[&str], rows: R) -> Result<Self>
    where
        R: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        let mut frame = Self::new(table, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            frame.push_row(row.into_iter().map(Into::into).collect())?;
        }
        Ok(frame)
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(NemError::schema(
                &self.table,
                format!(
                    "row {} has {} cells, expected {}",
                    self.num_rows() + 1,
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        for (column, cell) in self.data.iter_mut().zip(row) {
            column.push(cell);
        }
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.data.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Position of a column, matched case-insensitively after trimming.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.column_index(name).map(|i| self.data[i].as_slice())
    }

    /// Copy of this frame keeping only rows for which `keep(row)` holds.
    pub fn filter_rows<F>(&self, keep: F) -> Frame
    where
        F: Fn(usize) -> bool,
    {
        let rows: Vec<usize> = (0..self.num_rows()).filter(|&i| keep(i)).collect();
        let data = self
            .data
            .iter()
            .map(|col| rows.iter().map(|&i| col[i].clone()).collect())
            .collect();
        Frame {
            table: self.table.clone(),
            columns: self.columns.clone(),
            data,
        }
    }
}
