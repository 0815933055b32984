use serde::ser::{Serialize, SerializeMap, Serializer};

/// Delimiter and field layout used to turn one line into a [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    delimiter: &'static str,
    fields: &'static [&'static str],
}

impl Dialect {
    /// `character | range | meaning`, used for detailed explanations
    pub const DETAILED: Dialect = Dialect::new(" | ", &["character", "range", "meaning"]);

    /// `value: description`, used for terse summaries
    pub const TERSE: Dialect = Dialect::new(": ", &["value", "description"]);

    pub const fn new(delimiter: &'static str, fields: &'static [&'static str]) -> Self {
        Self { delimiter, fields }
    }

    pub fn delimiter(&self) -> &'static str {
        self.delimiter
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        self.fields
    }

    /// Parse one complete line.
    ///
    /// The line is split on the delimiter and the first `N` segments are trimmed.
    /// A record is produced only when all `N` are non-empty. Extra segments are
    /// ignored.
    pub fn parse_line(&self, line: &str, line_no: usize) -> Option<Record> {
        if self.fields.is_empty() {
            return None;
        }

        let mut segments = line.split(self.delimiter).map(str::trim);
        let mut values = Vec::with_capacity(self.fields.len());
        for _ in self.fields {
            match segments.next() {
                Some(value) if !value.is_empty() => values.push(value.to_string()),
                _ => return None,
            }
        }

        Some(Record {
            names: self.fields,
            values,
            source: line.to_string(),
            line: line_no,
        })
    }
}

/// A structured row parsed from one complete line of streamed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    names: &'static [&'static str],
    values: Vec<String>,
    source: String,
    line: usize,
}

impl Record {
    /// Value of the named field, if the record's dialect has one.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i].as_str())
    }

    /// Field values in dialect order.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// `(name, value)` pairs in dialect order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        self.names
            .iter()
            .copied()
            .zip(self.values.iter().map(String::as_str))
    }

    /// The line this record was parsed from, without its newline.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-based line number within the session's text.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
