use std::collections::BTreeMap;
use std::io::Read;

use crate::constants;
use crate::error::Result;

/// A headered CSV table held as strings
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a CSV with a header row. Short rows are padded, a leading BOM is dropped.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    pub fn column(&self, aliases: &[&str]) -> Option<usize> {
        constants::find_column(&self.headers, aliases)
    }

    /// Every cell of a row keyed by header, in header order
    pub fn row_map(&self, row: &[String]) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), v.clone()))
            .collect()
    }
}

/// A cell's trimmed text, or `None` when the column is missing or the cell is blank
pub fn cell(row: &[String], index: Option<usize>) -> Option<String> {
    let value = row.get(index?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_pads_short_rows_and_strips_bom() {
        let data = "\u{feff}SN,power,solution\nA1,350W\n";
        let table = Table::read(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["SN", "power", "solution"]);
        assert_eq!(table.rows[0], vec!["A1", "350W", ""]);
        assert_eq!(table.column(constants::columns::SERIAL_NUMBER), Some(0));
    }

    #[test]
    fn test_blank_cells_are_absent() {
        let row = vec!["  ".to_string(), " x ".to_string()];
        assert_eq!(cell(&row, Some(0)), None);
        assert_eq!(cell(&row, Some(1)).as_deref(), Some("x"));
        assert_eq!(cell(&row, None), None);
        assert_eq!(cell(&row, Some(5)), None);
    }
}
