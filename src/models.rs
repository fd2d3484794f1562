use std::collections::HashMap;

/// Which representation of a field ends up in the CSV cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// Stored value (element text, e.g. a sys_id or choice number)
    #[default]
    Raw,
    /// `display_value` attribute when present and non-empty, text otherwise
    Display,
}

impl ValueMode {
    /// Returns a human-readable name for the value mode.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Raw => "raw values",
            Self::Display => "display values",
        }
    }

    /// Picks the value of one field element.
    ///
    /// An empty `display_value` counts as missing, so the element text is used.
    /// Returns `None` when the element has neither.
    pub fn select(&self, display: Option<String>, text: Option<String>) -> Option<String> {
        match (self, display) {
            (Self::Display, Some(display)) if !display.is_empty() => Some(display),
            _ => text,
        }
    }
}

impl From<bool> for ValueMode {
    fn from(use_display_value: bool) -> Self {
        if use_display_value {
            Self::Display
        } else {
            Self::Raw
        }
    }
}

/// One field element of a dumped row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: Option<String>,
}

/// One record of a table dump, fields in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Tag of the row element, which is the table name
    pub table: String,
    pub fields: Vec<Field>,
}

impl Row {
    pub fn new(table: String) -> Self {
        Self {
            table,
            fields: Vec::new(),
        }
    }

    /// Field names in document order, each listed once.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !names.contains(&field.name) {
                names.push(field.name.clone());
            }
        }
        names
    }

    /// Lookup of present values by field name. A repeated tag keeps its last value.
    pub fn values(&self) -> HashMap<&str, &str> {
        self.fields
            .iter()
            .filter_map(|f| f.value.as_deref().map(|v| (f.name.as_str(), v)))
            .collect()
    }
}
