use crate::errors::{AppError, AppResult};
use crate::models::Row;
use csv::{QuoteStyle, Terminator, Writer, WriterBuilder};
use std::io::Write;

/// CSV writer whose columns are fixed by the first row of a dump.
///
/// Later rows are projected onto that header: unknown fields are dropped and
/// missing ones become empty cells, so every record has the header's width.
/// A first row without fields gives zero columns: every line is empty.
pub struct TableCsvWriter<W: Write> {
    writer: Writer<W>,
    header: Vec<String>,
    rows_written: u64,
}

impl<W: Write> TableCsvWriter<W> {
    /// Writes the header taken from `first_row`, followed by the row itself.
    pub fn from_first_row(inner: W, first_row: &Row) -> AppResult<Self> {
        let mut writer = WriterBuilder::new()
            .delimiter(b',')
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(inner);

        let header = first_row.field_names();
        if header.is_empty() {
            write_empty_line(&mut writer)?;
        } else {
            writer.write_record(&header)?;
        }

        let mut table_writer = Self {
            writer,
            header,
            rows_written: 0,
        };
        table_writer.write_row(first_row)?;
        Ok(table_writer)
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn write_row(&mut self, row: &Row) -> AppResult<()> {
        if self.header.is_empty() {
            write_empty_line(&mut self.writer)?;
            self.rows_written += 1;
            return Ok(());
        }

        let values = row.values();
        let record = self
            .header
            .iter()
            .map(|name| values.get(name.as_str()).copied().unwrap_or(""));
        self.writer.write_record(record)?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flushes buffered records and hands back the underlying writer.
    pub fn finish(self) -> AppResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| AppError::IoError(format!("Failed to flush CSV output: {}", e.error())))
    }
}

// The csv crate renders an empty record as `""`, which reads as one empty column.
fn write_empty_line<W: Write>(writer: &mut Writer<W>) -> AppResult<()> {
    writer.flush()?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    fn row(fields: &[(&str, Option<&str>)]) -> Row {
        let mut row = Row::new("incident".into());
        for (name, value) in fields {
            row.fields.push(Field {
                name: name.to_string(),
                value: value.map(str::to_string),
            });
        }
        row
    }

    fn render(rows: &[Row]) -> String {
        let mut out = Vec::new();
        let mut writer = TableCsvWriter::from_first_row(&mut out, &rows[0]).unwrap();
        for r in &rows[1..] {
            writer.write_row(r).unwrap();
        }
        writer.finish().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_header_and_rows() {
        let csv = render(&[
            row(&[("number", Some("INC001")), ("state", Some("Closed"))]),
            row(&[("number", Some("INC002")), ("state", Some("New"))]),
        ]);
        assert_eq!(csv, "number,state\nINC001,Closed\nINC002,New\n");
    }

    #[test]
    fn test_schema_frozen_after_first_row() {
        let csv = render(&[
            row(&[("number", Some("INC001")), ("state", Some("7"))]),
            row(&[("priority", Some("1")), ("number", Some("INC002"))]),
        ]);
        assert_eq!(csv, "number,state\nINC001,7\nINC002,\n");
    }

    #[test]
    fn test_absent_values_render_empty() {
        let csv = render(&[row(&[("a", None), ("b", Some("x"))])]);
        assert_eq!(csv, "a,b\n,x\n");
    }

    #[test]
    fn test_quoting() {
        let csv = render(&[row(&[
            ("short_description", Some("Disk full, \"urgent\"")),
            ("comments", Some("line1\nline2")),
        ])]);
        assert_eq!(
            csv,
            "short_description,comments\n\"Disk full, \"\"urgent\"\"\",\"line1\nline2\"\n"
        );
    }

    #[test]
    fn test_first_row_without_fields_gives_zero_columns() {
        let csv = render(&[row(&[]), row(&[("number", Some("INC002"))]), row(&[])]);
        assert_eq!(csv, "\n\n\n\n");
    }

    #[test]
    fn test_counts_rows() {
        let mut out = Vec::new();
        let first = row(&[("a", Some("1"))]);
        let mut writer = TableCsvWriter::from_first_row(&mut out, &first).unwrap();
        writer.write_row(&first).unwrap();
        assert_eq!(writer.rows_written(), 2);
        assert_eq!(writer.header(), ["a".to_string()]);
    }
}
