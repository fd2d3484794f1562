use crate::constants::{DISPLAY_VALUE_ATTR, ENVELOPE_TAG, UNLOAD_DATE_ATTR};
use crate::errors::{AppError, AppResult};
use crate::models::{Field, Row, ValueMode};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use quick_xml::encoding::{decode, detect_encoding};
use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read};

/// Field element whose closing tag has not been seen yet.
struct PendingField {
    name: String,
    display: Option<String>,
    text: Option<String>,
}

impl PendingField {
    fn push_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }

    fn resolve(self, mode: ValueMode) -> Field {
        Field {
            name: self.name,
            value: mode.select(self.display, self.text),
        }
    }
}

/// Bytes handed to the XML parser.
///
/// The parser only handles ASCII-compatible encodings, so UTF-16 documents
/// are transcoded to UTF-8 on the fly.
enum DumpInput<R: BufRead> {
    Native(R),
    Utf16(BufReader<DecodeReaderBytes<R, Vec<u8>>>),
}

impl<R: BufRead> DumpInput<R> {
    /// Sniffs the BOM or the first bytes of `input`.
    /// Returns the input and, when it was transcoded, the encoding it now has.
    fn open(mut input: R) -> (Self, Option<&'static Encoding>) {
        let detected = input
            .fill_buf()
            .ok()
            .and_then(|head| detect_encoding(head))
            .map(|(encoding, _)| encoding);

        match detected {
            Some(encoding) if encoding == UTF_16LE || encoding == UTF_16BE => {
                let transcoder = DecodeReaderBytesBuilder::new()
                    .encoding(Some(encoding))
                    .strip_bom(true)
                    .build(input);
                (Self::Utf16(BufReader::new(transcoder)), Some(UTF_8))
            }
            _ => (Self::Native(input), None),
        }
    }
}

impl<R: BufRead> Read for DumpInput<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Native(r) => r.read(buf),
            Self::Utf16(r) => r.read(buf),
        }
    }
}

impl<R: BufRead> BufRead for DumpInput<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Self::Native(r) => r.fill_buf(),
            Self::Utf16(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Self::Native(r) => r.consume(amt),
            Self::Utf16(r) => r.consume(amt),
        }
    }
}

/// Pull-based reader over an unload document.
///
/// Yields one [`Row`] per element directly under `<unload>`. Only the row
/// being assembled is kept in memory; the event buffer is reused for every
/// event, so memory use does not grow with the size of the dump.
///
/// Element depth drives the state: 1 is the envelope, 2 a row, 3 a field.
/// Anything nested below a field is skipped.
///
/// Text is decoded to UTF-8 using the BOM or the encoding declared in the
/// XML declaration; UTF-16 input is supported.
pub struct DumpReader<R: BufRead> {
    reader: Reader<DumpInput<R>>,
    // Set when the input was transcoded; the declaration no longer applies.
    transcoded_to: Option<&'static Encoding>,
    buf: Vec<u8>,
    mode: ValueMode,
    depth: usize,
    finished: bool,
    unload_date: Option<String>,
    rows_read: u64,
    row: Option<Row>,
    field: Option<PendingField>,
}

impl<R: BufRead> DumpReader<R> {
    pub fn new(input: R, mode: ValueMode) -> Self {
        let (input, transcoded_to) = DumpInput::open(input);
        Self {
            reader: Reader::from_reader(input),
            transcoded_to,
            buf: Vec::with_capacity(8192),
            mode,
            depth: 0,
            finished: false,
            unload_date: None,
            rows_read: 0,
            row: None,
            field: None,
        }
    }

    fn encoding(&self) -> &'static Encoding {
        self.transcoded_to.unwrap_or_else(|| self.reader.decoder().encoding())
    }

    /// Number of row elements opened so far, including a row cut short by an error.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// `unload_date` of the envelope, once the envelope has been read.
    pub fn unload_date(&self) -> Option<&str> {
        self.unload_date.as_deref()
    }

    /// Reads the next complete row.
    ///
    /// Returns `Ok(None)` once `</unload>` is reached; whatever follows the
    /// envelope is never read.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` for malformed XML, a root element other than
    /// `<unload>`, or input that ends before the envelope is closed, and
    /// `IoError` when the underlying stream fails.
    pub fn next_row(&mut self) -> AppResult<Option<Row>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            self.buf.clear();
            let encoding = self.encoding();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    let name = element_name(encoding, &e)?;
                    match self.depth {
                        0 => {
                            expect_envelope(&name)?;
                            self.unload_date = attribute(encoding, &e, UNLOAD_DATE_ATTR)?;
                        }
                        1 => {
                            self.rows_read += 1;
                            self.row = Some(Row::new(name));
                        }
                        2 => {
                            self.field = Some(PendingField {
                                name,
                                display: attribute(encoding, &e, DISPLAY_VALUE_ATTR)?,
                                text: None,
                            });
                        }
                        _ => {}
                    }
                    self.depth += 1;
                }
                Event::Empty(e) => {
                    let name = element_name(encoding, &e)?;
                    match self.depth {
                        0 => {
                            expect_envelope(&name)?;
                            self.unload_date = attribute(encoding, &e, UNLOAD_DATE_ATTR)?;
                            self.finished = true;
                            return Ok(None);
                        }
                        1 => {
                            self.rows_read += 1;
                            return Ok(Some(Row::new(name)));
                        }
                        2 => {
                            let display = attribute(encoding, &e, DISPLAY_VALUE_ATTR)?;
                            if let Some(row) = self.row.as_mut() {
                                row.fields.push(Field {
                                    name,
                                    value: self.mode.select(display, None),
                                });
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(_) => match self.depth {
                    0 => {
                        return Err(AppError::ParseError(
                            "Closing tag outside of the <unload> envelope".into(),
                        ));
                    }
                    1 => {
                        self.depth = 0;
                        self.finished = true;
                        return Ok(None);
                    }
                    2 => {
                        self.depth = 1;
                        return self
                            .row
                            .take()
                            .map(Some)
                            .ok_or_else(|| AppError::ParseError("Row closed twice".into()));
                    }
                    3 => {
                        self.depth = 2;
                        if let (Some(field), Some(row)) = (self.field.take(), self.row.as_mut()) {
                            row.fields.push(field.resolve(self.mode));
                        }
                    }
                    _ => self.depth -= 1,
                },
                Event::Text(e) if self.depth == 3 => {
                    let text = decode_bytes(&e, encoding, "XML text")?;
                    if let Some(field) = self.field.as_mut() {
                        field.push_text(&text);
                    }
                }
                Event::CData(e) if self.depth == 3 => {
                    let text = decode_bytes(&e, encoding, "CDATA section")?;
                    if let Some(field) = self.field.as_mut() {
                        field.push_text(&text);
                    }
                }
                Event::GeneralRef(e) if self.depth == 3 => {
                    let text = resolve_reference(&e, encoding)?;
                    if let Some(field) = self.field.as_mut() {
                        field.push_text(&text);
                    }
                }
                Event::Eof => {
                    let msg = if self.depth == 0 {
                        format!("No <{ENVELOPE_TAG}> element found")
                    } else {
                        format!("Unexpected end of input before </{ENVELOPE_TAG}>")
                    };
                    return Err(AppError::ParseError(msg));
                }
                _ => {}
            }
        }
    }
}

fn expect_envelope(name: &str) -> AppResult<()> {
    if name == ENVELOPE_TAG {
        Ok(())
    } else {
        Err(AppError::ParseError(format!(
            "Expected <{ENVELOPE_TAG}> root element, found <{name}>"
        )))
    }
}

fn decode_bytes<'b>(
    bytes: &'b [u8],
    encoding: &'static Encoding,
    what: &str,
) -> AppResult<Cow<'b, str>> {
    decode(bytes, encoding)
        .map_err(|err| AppError::ParseError(format!("Failed to decode {what}: {err}")))
}

fn element_name(encoding: &'static Encoding, e: &BytesStart) -> AppResult<String> {
    decode_bytes(e.name().as_ref(), encoding, "element name").map(Cow::into_owned)
}

fn attribute(
    encoding: &'static Encoding,
    e: &BytesStart,
    key: &str,
) -> AppResult<Option<String>> {
    let Some(attr) = e
        .try_get_attribute(key)
        .map_err(|err| AppError::ParseError(format!("Malformed attributes: {err}")))?
    else {
        return Ok(None);
    };

    let raw = decode_bytes(&attr.value, encoding, "attribute")?;
    unescape(&raw)
        .map(|value| Some(value.into_owned()))
        .map_err(|err| AppError::ParseError(format!("Failed to unescape attribute {key}: {err}")))
}

/// Expands `&amp;`-style and numeric references; unknown entities are kept verbatim.
fn resolve_reference(e: &BytesRef, encoding: &'static Encoding) -> AppResult<String> {
    let name = decode_bytes(e, encoding, "entity")?;
    if name.starts_with('#') {
        return unescape(&format!("&{name};"))
            .map(Cow::into_owned)
            .map_err(|err| AppError::ParseError(format!("Invalid character reference: {err}")));
    }

    Ok(match resolve_predefined_entity(&name) {
        Some(value) => value.to_string(),
        None => format!("&{name};"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(xml: &str, mode: ValueMode) -> AppResult<Vec<Row>> {
        let mut reader = DumpReader::new(xml.as_bytes(), mode);
        let mut rows = Vec::new();
        while let Some(row) = reader.next_row()? {
            rows.push(row);
        }
        Ok(rows)
    }

    fn values(row: &Row) -> Vec<(&str, Option<&str>)> {
        row.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_deref()))
            .collect()
    }

    const INCIDENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<unload unload_date="2024-03-01 10:00:00">
  <incident action="INSERT_OR_UPDATE">
    <number>INC001</number>
    <state display_value="Closed">7</state>
  </incident>
  <incident action="INSERT_OR_UPDATE">
    <number>INC002</number>
    <state display_value="New">1</state>
  </incident>
</unload>"#;

    #[test]
    fn test_reads_rows_in_document_order() {
        let rows = read_all(INCIDENTS, ValueMode::Raw).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].table, "incident");
        assert_eq!(
            values(&rows[0]),
            vec![("number", Some("INC001")), ("state", Some("7"))]
        );
        assert_eq!(
            values(&rows[1]),
            vec![("number", Some("INC002")), ("state", Some("1"))]
        );
    }

    #[test]
    fn test_display_mode_uses_display_value() {
        let rows = read_all(INCIDENTS, ValueMode::Display).unwrap();
        assert_eq!(
            values(&rows[0]),
            vec![("number", Some("INC001")), ("state", Some("Closed"))]
        );
    }

    #[test]
    fn test_unload_date_and_row_count() {
        let mut reader = DumpReader::new(INCIDENTS.as_bytes(), ValueMode::Raw);
        assert!(reader.next_row().unwrap().is_some());
        assert_eq!(reader.unload_date(), Some("2024-03-01 10:00:00"));
        assert!(reader.next_row().unwrap().is_some());
        assert!(reader.next_row().unwrap().is_none());
        assert!(reader.next_row().unwrap().is_none());
        assert_eq!(reader.rows_read(), 2);
    }

    #[test]
    fn test_empty_elements_and_missing_values() {
        let xml = r#"<unload unload_date="x">
  <sys_user>
    <name>Ada</name>
    <manager display_value="Grace"/>
    <email></email>
    <title/>
  </sys_user>
</unload>"#;
        let rows = read_all(xml, ValueMode::Display).unwrap();
        assert_eq!(
            values(&rows[0]),
            vec![
                ("name", Some("Ada")),
                ("manager", Some("Grace")),
                ("email", None),
                ("title", None),
            ]
        );
    }

    #[test]
    fn test_text_is_kept_raw_with_entities_decoded() {
        let xml = "<unload><task><short_description>  a &amp; b &lt;c&gt; &#65;\nline2 </short_description><notes><![CDATA[<b>x</b>]]></notes></task></unload>";
        let rows = read_all(xml, ValueMode::Raw).unwrap();
        assert_eq!(
            values(&rows[0]),
            vec![
                ("short_description", Some("  a & b <c> A\nline2 ")),
                ("notes", Some("<b>x</b>")),
            ]
        );
    }

    #[test]
    fn test_display_value_attribute_is_unescaped() {
        let xml = r#"<unload><task><assigned_to display_value="R&amp;D Team">abc</assigned_to></task></unload>"#;
        let rows = read_all(xml, ValueMode::Display).unwrap();
        assert_eq!(values(&rows[0]), vec![("assigned_to", Some("R&D Team"))]);
    }

    #[test]
    fn test_nested_elements_below_fields_are_skipped() {
        let xml = "<unload><task><a>x<inner>ignored</inner></a><b>y</b></task></unload>";
        let rows = read_all(xml, ValueMode::Raw).unwrap();
        assert_eq!(values(&rows[0]), vec![("a", Some("x")), ("b", Some("y"))]);
    }

    #[test]
    fn test_empty_row_element() {
        let xml = "<unload><incident/><incident><number>1</number></incident></unload>";
        let rows = read_all(xml, ValueMode::Raw).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].fields.is_empty());
    }

    #[test]
    fn test_zero_rows() {
        assert!(read_all(r#"<unload unload_date="x"></unload>"#, ValueMode::Raw)
            .unwrap()
            .is_empty());
        assert!(read_all(r#"<unload unload_date="x"/>"#, ValueMode::Raw)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_trailing_bytes_after_envelope_are_ignored() {
        let xml = "<unload><t><a>1</a></t></unload><<< not xml";
        let rows = read_all(xml, ValueMode::Raw).unwrap();
        assert_eq!(rows.len(), 1);
    }

    fn utf16(xml: &str, little_endian: bool, bom: bool) -> Vec<u8> {
        let mut bytes = Vec::new();
        for unit in std::iter::once(0xFEFF).filter(|_| bom).chain(xml.encode_utf16()) {
            if little_endian {
                bytes.extend_from_slice(&unit.to_le_bytes());
            } else {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
        }
        bytes
    }

    const UTF16_DUMP: &str = r#"<?xml version="1.0" encoding="UTF-16"?><unload unload_date="2024-03-01"><sys_user><name display_value="Zoë">Zoé &amp; co</name></sys_user></unload>"#;

    #[test]
    fn test_utf16le_with_bom() {
        let bytes = utf16(UTF16_DUMP, true, true);
        let mut reader = DumpReader::new(bytes.as_slice(), ValueMode::Raw);
        let row = reader.next_row().unwrap().unwrap();
        assert_eq!(row.table, "sys_user");
        assert_eq!(values(&row), vec![("name", Some("Zoé & co"))]);
        assert_eq!(reader.unload_date(), Some("2024-03-01"));
        assert!(reader.next_row().unwrap().is_none());
    }

    #[test]
    fn test_utf16be_without_bom() {
        let bytes = utf16(UTF16_DUMP, false, false);
        let mut reader = DumpReader::new(bytes.as_slice(), ValueMode::Display);
        let row = reader.next_row().unwrap().unwrap();
        assert_eq!(values(&row), vec![("name", Some("Zoë"))]);
    }

    #[test]
    fn test_declared_single_byte_encoding() {
        let mut bytes =
            b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><unload><t><a>caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"</a></t></unload>");
        let mut reader = DumpReader::new(bytes.as_slice(), ValueMode::Raw);
        let row = reader.next_row().unwrap().unwrap();
        assert_eq!(values(&row), vec![("a", Some("café"))]);
    }

    #[test]
    fn test_wrong_root_element() {
        let result = read_all("<feed><entry/></feed>", ValueMode::Raw);
        assert!(matches!(result, Err(AppError::ParseError(_))));
    }

    #[test]
    fn test_truncated_input() {
        let xml = "<unload><incident><number>INC001</number></incident><incident><num";
        let mut reader = DumpReader::new(xml.as_bytes(), ValueMode::Raw);
        assert!(reader.next_row().unwrap().is_some());
        assert!(reader.next_row().is_err());
        assert_eq!(reader.rows_read(), 2);
    }

    #[test]
    fn test_empty_input() {
        let result = read_all("", ValueMode::Raw);
        assert!(matches!(result, Err(AppError::ParseError(_))));
    }

    #[test]
    fn test_mismatched_tags() {
        let xml = "<unload><incident><number>1</state></incident></unload>";
        assert!(read_all(xml, ValueMode::Raw).is_err());
    }
}
