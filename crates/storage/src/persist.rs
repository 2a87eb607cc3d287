//! Flat-file persistence for Tessera tables.
//!
//! One file per table, comma separated:
//!
//! ```text
//! id,age,name
//! 1,30,Alice
//! 2,,"Smith, Bob"
//! ```
//!
//! The header lists the union of all row columns in name order. A column a
//! row does not have is written as an empty field; fields that are empty or
//! contain `,` `"` CR or LF are quoted with inner quotes doubled, so an
//! empty string (`""`) stays distinct from an absent column.
//!
//! Files are always rewritten in full, through a sibling temporary file that
//! is renamed over the target.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tessera_core::{Error, Result, Row, RowId, Value, ValueKind};

const ID_COLUMN: &str = "id";

/// One parsed field.
#[derive(Debug, PartialEq)]
enum Field {
    /// Unquoted empty field.
    Absent,
    Text(String),
}

fn needs_quoting(text: &str) -> bool {
    text.is_empty() || text.contains([',', '"', '\n', '\r'])
}

fn write_field(out: &mut String, text: &str) {
    if needs_quoting(text) {
        out.push('"');
        for c in text.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(text);
    }
}

/// Renders rows to the table file format.
pub fn encode_rows<'a, I>(rows: I) -> String
where
    I: Iterator<Item = &'a Row> + Clone,
{
    let columns: BTreeSet<&str> = rows.clone().flat_map(|r| r.columns()).collect();

    let mut out = String::from(ID_COLUMN);
    for column in &columns {
        out.push(',');
        write_field(&mut out, column);
    }
    out.push('\n');

    for row in rows {
        out.push_str(&row.id().to_string());
        for column in &columns {
            out.push(',');
            if let Some(value) = row.get(column) {
                write_field(&mut out, &value.to_string());
            }
        }
        out.push('\n');
    }
    out
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Rewrites the table file at `path` with the given rows.
pub fn write_rows<'a, I>(path: &Path, rows: I) -> Result<()>
where
    I: Iterator<Item = &'a Row> + Clone,
{
    let encoded = encode_rows(rows);
    let tmp = temp_path(path);

    let write = || -> io::Result<()> {
        let file = fs::File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(encoded.as_bytes())?;
        writer.flush()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::persistence(path, e)
    })
}

/// Splits file content into records of fields, tracking the line each
/// record starts on.
fn parse_records(path: &Path, text: &str) -> Result<Vec<(usize, Vec<Field>)>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;

    let finish_field = |fields: &mut Vec<Field>, cur: &mut String, quoted: &mut bool| {
        if *quoted || !cur.is_empty() {
            fields.push(Field::Text(core::mem::take(cur)));
        } else {
            fields.push(Field::Absent);
        }
        *quoted = false;
    };

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cur.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    cur.push(c);
                }
                _ => cur.push(c),
            }
            continue;
        }

        match c {
            ',' => finish_field(&mut fields, &mut cur, &mut quoted),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if fields.is_empty() && cur.is_empty() && !quoted {
                    // blank line
                } else {
                    finish_field(&mut fields, &mut cur, &mut quoted);
                    records.push((record_line, core::mem::take(&mut fields)));
                }
                line += 1;
                record_line = line;
            }
            '"' if cur.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            '"' => return Err(Error::malformed(path, line, "unexpected quote inside field")),
            _ if quoted => {
                return Err(Error::malformed(path, line, "characters after closing quote"))
            }
            _ => cur.push(c),
        }
    }

    if in_quotes {
        return Err(Error::malformed(path, record_line, "unterminated quoted field"));
    }
    if !fields.is_empty() || !cur.is_empty() || quoted {
        finish_field(&mut fields, &mut cur, &mut quoted);
        records.push((record_line, fields));
    }
    Ok(records)
}

/// Parses table file content into rows.
///
/// Columns with a declared kind are parsed with [`Value::parse_as`]; all
/// others load as `Value::Text`.
pub fn decode_rows(
    path: &Path,
    text: &str,
    kinds: &BTreeMap<String, ValueKind>,
) -> Result<BTreeMap<RowId, Row>> {
    let mut records = parse_records(path, text)?.into_iter();
    let mut rows = BTreeMap::new();

    let Some((header_line, header)) = records.next() else {
        return Ok(rows);
    };
    let mut columns = Vec::with_capacity(header.len());
    for field in header {
        match field {
            Field::Text(name) => columns.push(name),
            Field::Absent => return Err(Error::malformed(path, header_line, "empty column name")),
        }
    }
    if columns.first().map(String::as_str) != Some(ID_COLUMN) {
        return Err(Error::malformed(path, header_line, "header must start with id"));
    }

    for (line, fields) in records {
        if fields.len() != columns.len() {
            return Err(Error::malformed(
                path,
                line,
                format!("expected {} fields, found {}", columns.len(), fields.len()),
            ));
        }
        let mut fields = fields.into_iter();
        let id: RowId = match fields.next() {
            Some(Field::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| Error::malformed(path, line, format!("invalid id {:?}", text)))?,
            _ => return Err(Error::malformed(path, line, "missing id")),
        };

        let mut row = Row::new(id);
        for (column, field) in columns[1..].iter().zip(fields) {
            let Field::Text(text) = field else {
                continue;
            };
            let value = match kinds.get(column) {
                Some(kind) => Value::parse_as(*kind, &text)
                    .map_err(|e| Error::malformed(path, line, e.to_string()))?,
                None => Value::Text(text),
            };
            row.set(column.clone(), value);
        }

        if rows.insert(id, row).is_some() {
            return Err(Error::malformed(path, line, format!("duplicate id {}", id)));
        }
    }
    Ok(rows)
}

/// Reads a table file. Returns `None` if the file does not exist.
pub fn read_rows(
    path: &Path,
    kinds: &BTreeMap<String, ValueKind>,
) -> Result<Option<BTreeMap<RowId, Row>>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::persistence(path, e)),
    };
    decode_rows(path, &text, kinds).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> &'static Path {
        Path::new("t.csv")
    }

    fn no_kinds() -> BTreeMap<String, ValueKind> {
        BTreeMap::new()
    }

    #[test]
    fn test_encode_plain_rows() {
        let rows = vec![
            Row::new(1).with("name", "Alice").with("age", 30),
            Row::new(2).with("name", "Bob").with("age", 25),
        ];
        assert_eq!(encode_rows(rows.iter()), "id,age,name\n1,30,Alice\n2,25,Bob\n");
    }

    #[test]
    fn test_encode_empty_table() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(encode_rows(rows.iter()), "id\n");
    }

    #[test]
    fn test_encode_quotes_special_text() {
        let rows = vec![
            Row::new(1).with("note", "a,b").with("q", "say \"hi\""),
            Row::new(2).with("note", "").with("q", "line\nbreak"),
        ];
        let text = encode_rows(rows.iter());
        assert_eq!(
            text,
            "id,note,q\n1,\"a,b\",\"say \"\"hi\"\"\"\n2,\"\",\"line\nbreak\"\n"
        );
    }

    #[test]
    fn test_encode_union_of_columns() {
        let rows = vec![Row::new(1).with("a", 1), Row::new(2).with("b", 2)];
        assert_eq!(encode_rows(rows.iter()), "id,a,b\n1,1,\n2,,2\n");
    }

    #[test]
    fn test_decode_round_trip_as_text() {
        let rows = vec![
            Row::new(1).with("note", "a,b").with("q", "say \"hi\""),
            Row::new(2).with("note", "").with("q", "line\r\nbreak"),
            Row::new(3).with("other", "x"),
        ];
        let decoded = decode_rows(p(), &encode_rows(rows.iter()), &no_kinds()).unwrap();
        assert_eq!(decoded.len(), 3);
        for row in &rows {
            assert_eq!(&decoded[&row.id()], row);
        }
    }

    #[test]
    fn test_decode_typed_columns() {
        let mut kinds = BTreeMap::new();
        kinds.insert("age".to_string(), ValueKind::Int);
        kinds.insert("vip".to_string(), ValueKind::Bool);

        let rows = decode_rows(p(), "id,age,name,vip\n1,30,Alice,true\n", &kinds).unwrap();
        let row = &rows[&1];
        assert_eq!(row.get("age"), Some(&Value::Int(30)));
        assert_eq!(row.get("name"), Some(&Value::from("Alice")));
        assert_eq!(row.get("vip"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_decode_empty_and_header_only() {
        assert!(decode_rows(p(), "", &no_kinds()).unwrap().is_empty());
        assert!(decode_rows(p(), "id\n", &no_kinds()).unwrap().is_empty());
        assert!(decode_rows(p(), "id,name\n\n", &no_kinds()).unwrap().is_empty());
    }

    #[test]
    fn test_decode_without_trailing_newline() {
        let rows = decode_rows(p(), "id,name\n1,Alice", &no_kinds()).unwrap();
        assert_eq!(rows[&1].get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn test_decode_arity_mismatch() {
        let err = decode_rows(p(), "id,name,age\n1,Alice\n", &no_kinds()).unwrap_err();
        match err {
            Error::MalformedPersistedData { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_decode_bad_id() {
        let err = decode_rows(p(), "id,name\nx,Alice\n", &no_kinds()).unwrap_err();
        assert!(matches!(err, Error::MalformedPersistedData { .. }));
    }

    #[test]
    fn test_decode_bad_header() {
        let err = decode_rows(p(), "name,id\nAlice,1\n", &no_kinds()).unwrap_err();
        assert!(matches!(err, Error::MalformedPersistedData { line: 1, .. }));
    }

    #[test]
    fn test_decode_unterminated_quote() {
        let err = decode_rows(p(), "id,name\n1,\"Alice\n", &no_kinds()).unwrap_err();
        assert!(matches!(err, Error::MalformedPersistedData { .. }));
    }

    #[test]
    fn test_decode_duplicate_id() {
        let err = decode_rows(p(), "id,name\n1,a\n1,b\n", &no_kinds()).unwrap_err();
        assert!(matches!(err, Error::MalformedPersistedData { line: 3, .. }));
    }

    #[test]
    fn test_decode_bad_typed_value() {
        let mut kinds = BTreeMap::new();
        kinds.insert("age".to_string(), ValueKind::Int);
        let err = decode_rows(p(), "id,age\n1,old\n", &kinds).unwrap_err();
        assert!(matches!(err, Error::MalformedPersistedData { line: 2, .. }));
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        let rows = vec![Row::new(1).with("name", "Alice")];

        write_rows(&path, rows.iter()).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = read_rows(&path, &no_kinds()).unwrap().unwrap();
        assert_eq!(loaded[&1], rows[0]);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_rows(&dir.path().join("none.csv"), &no_kinds()).unwrap().is_none());
    }

    #[test]
    fn test_write_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("t.csv");
        let rows = vec![Row::new(1).with("name", "Alice")];
        let err = write_rows(&path, rows.iter()).unwrap_err();
        assert!(matches!(err, Error::PersistenceFailure { .. }));
    }
}
