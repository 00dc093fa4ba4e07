//! Client list import from spreadsheets (xlsx / xls / ods)

use crate::error::{Result, RoofDeskError};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// One data row, keyed by the recognised header columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientRow {
    /// 1-based spreadsheet row
    pub row: usize,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Phone,
    Email,
    Address,
    Notes,
}

fn column_for(header: &str) -> Option<Column> {
    match header.trim().to_lowercase().as_str() {
        "name" | "client" | "client name" | "customer" | "customer name" => Some(Column::Name),
        "phone" | "phone number" | "tel" | "telephone" | "mobile" => Some(Column::Phone),
        "email" | "e-mail" | "email address" => Some(Column::Email),
        "address" | "street" | "property" | "property address" => Some(Column::Address),
        "notes" | "note" | "comments" => Some(Column::Notes),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string().trim().to_string(),
    }
}

/// Read the first sheet. The first non-empty row is the header;
/// rows with an empty name are skipped.
pub fn read_clients(path: &Path) -> Result<Vec<ClientRow>> {
    if !path.is_file() {
        return Err(RoofDeskError::FileNotFound(path.display().to_string()));
    }
    let mut workbook = open_workbook_auto(path).map_err(|e| RoofDeskError::Import(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RoofDeskError::Import("workbook has no sheets".into()))?
        .map_err(|e| RoofDeskError::Import(e.to_string()))?;

    let mut rows = range
        .rows()
        .enumerate()
        .skip_while(|(_, cells)| cells.iter().all(|c| cell_text(c).is_empty()));

    let Some((_, header)) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<Option<Column>> = header.iter().map(|c| column_for(&cell_text(c))).collect();
    if !columns.contains(&Some(Column::Name)) {
        return Err(RoofDeskError::Import("no Name column in the header row".into()));
    }

    // range は先頭の空行を含まない場合があるので開始行を足す
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut clients = Vec::new();
    for (index, cells) in rows {
        let mut row = ClientRow { row: first_row + index + 1, ..Default::default() };
        for (cell, column) in cells.iter().zip(&columns) {
            let value = cell_text(cell);
            match column {
                Some(Column::Name) => row.name = value,
                Some(Column::Phone) => row.phone = value,
                Some(Column::Email) => row.email = value,
                Some(Column::Address) => row.address = value,
                Some(Column::Notes) => row.notes = value,
                None => {}
            }
        }
        if !row.name.is_empty() {
            clients.push(row);
        }
    }
    Ok(clients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    fn write_sheet(path: &Path, rows: &[&[&str]]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_column_aliases() {
        assert_eq!(column_for(" Client Name "), Some(Column::Name));
        assert_eq!(column_for("E-mail"), Some(Column::Email));
        assert_eq!(column_for("Tel"), Some(Column::Phone));
        assert_eq!(column_for("Budget"), None);
    }

    #[test]
    fn test_read_clients_skips_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clients.xlsx");
        write_sheet(
            &path,
            &[
                &["Name", "Phone", "Email", "Budget", "Address"],
                &["John Smith", "555-0100", "john@example.com", "9000", "1 Elm St"],
                &["", "555-0199", "", "", ""],
                &["Maria Lopez", "", "", "", "22 Oak Ave"],
            ],
        );

        let rows = read_clients(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "John Smith");
        assert_eq!(rows[0].phone, "555-0100");
        assert_eq!(rows[0].address, "1 Elm St");
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[1].name, "Maria Lopez");
        assert_eq!(rows[1].row, 4);
    }

    #[test]
    fn test_missing_name_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xlsx");
        write_sheet(&path, &[&["Phone", "Email"], &["555", "a@b.c"]]);
        assert!(matches!(read_clients(&path), Err(RoofDeskError::Import(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_clients(Path::new("/nonexistent/clients.xlsx")),
            Err(RoofDeskError::FileNotFound(_))
        ));
    }
}
