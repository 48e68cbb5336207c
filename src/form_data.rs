//! Ordered collection of form entries.
//!
//! Entries keep insertion order and names may repeat, mirroring how browsers
//! build a form submission.

/// A file-shaped form value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    /// Filename as sent in `Content-Disposition`
    pub name: String,
    /// MIME type; empty when the sender did not specify one
    pub content_type: String,
    /// Raw file bytes
    pub content: Vec<u8>,
}

impl FormFile {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, content_type: T, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            content,
        }
    }

    /// Size of the file content in bytes
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Value of a single form entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FormFile),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FormFile> {
        match self {
            FormValue::File(file) => Some(file),
            FormValue::Text(_) => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FormValue::File(_))
    }
}

impl From<String> for FormValue {
    fn from(value: String) -> Self {
        FormValue::Text(value)
    }
}

impl From<&str> for FormValue {
    fn from(value: &str) -> Self {
        FormValue::Text(value.to_string())
    }
}

impl From<FormFile> for FormValue {
    fn from(value: FormFile) -> Self {
        FormValue::File(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping any existing entries with the same name
    pub fn append<N: Into<String>, V: Into<FormValue>>(&mut self, name: N, value: V) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn append_text<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.append(name, FormValue::Text(value.into()));
    }

    pub fn append_file<N: Into<String>>(&mut self, name: N, file: FormFile) {
        self.append(name, FormValue::File(file));
    }

    /// First value stored under `name`
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries
            .iter()
            .find(|(entry_name, _)| entry_name == name)
            .map(|(_, value)| value)
    }

    /// All values stored under `name`, in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.entries
            .iter()
            .filter(|(entry_name, _)| entry_name == name)
            .map(|(_, value)| value)
            .collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(entry_name, _)| entry_name == name)
    }

    /// Remove every entry named `name`
    pub fn delete(&mut self, name: &str) {
        self.entries.retain(|(entry_name, _)| entry_name != name);
    }

    /// Replace the first entry named `name` and drop the others, or append
    /// when there is none.
    pub fn set<N: Into<String>, V: Into<FormValue>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(entry_name, _)| *entry_name == name) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(entry_name, _)| {
                    let keep = index <= first || *entry_name != name;
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl IntoIterator for FormData {
    type Item = (String, FormValue);
    type IntoIter = std::vec::IntoIter<(String, FormValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a FormData {
    type Item = &'a (String, FormValue);
    type IntoIter = std::slice::Iter<'a, (String, FormValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<N: Into<String>, V: Into<FormValue>> FromIterator<(N, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
