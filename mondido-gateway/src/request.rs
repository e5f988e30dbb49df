//! Outgoing request parameters and their form encoding.
//!
//! An [`OutgoingRequest`] is an insertion-ordered list of named parameters.
//! It is built once per operation, rewritten in place by the
//! [`FieldEncryptor`](crate::encryption::FieldEncryptor) and finally encoded
//! as an `application/x-www-form-urlencoded` body.

/// Name of the parameter that declares which fields are encrypted.
pub const ENCRYPTED_FIELD: &str = "encrypted";

/// Value of a single request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Plain text value.
    Text(String),
    /// Boolean flag; `false` is blank and never sent.
    Flag(bool),
    /// Nested map, encoded as `key[sub]=value`.
    Map(Vec<(String, String)>),
    /// List, encoded as repeated `key[]=value`.
    List(Vec<String>),
}

impl FieldValue {
    /// Returns true if the value carries nothing worth sending.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => is_blank(text),
            Self::Flag(flag) => !flag,
            Self::Map(entries) => entries.iter().all(|(_, v)| is_blank(v)),
            Self::List(items) => items.iter().all(|v| is_blank(v)),
        }
    }

    /// Returns the text if this is a [`FieldValue::Text`].
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

/// Ordered request parameters.
///
/// # Examples
///
/// ```
/// use mondido_gateway::request::{FieldValue, OutgoingRequest};
///
/// let mut request = OutgoingRequest::new();
/// request.insert("amount", "10.00");
/// request.insert("test", false);
/// request.insert(
///     "metadata",
///     FieldValue::Map(vec![("color".to_owned(), "dark blue".to_owned())]),
/// );
///
/// assert_eq!(request.encode(), "amount=10.00&metadata[color]=dark+blue");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingRequest {
    fields: Vec<(String, FieldValue)>,
}

impl OutgoingRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter.
    ///
    /// Replacing an existing parameter keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Returns a parameter value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns a text parameter that is present and not blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text).filter(|t| !is_blank(t))
    }

    /// Removes a parameter, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Field names declared in the `encrypted` parameter.
    #[must_use]
    pub fn encrypted_fields(&self) -> Vec<String> {
        self.text(ENCRYPTED_FIELD)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterates over parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Number of parameters, blank ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encodes the request as a form body.
    ///
    /// Blank values are omitted, values are form-escaped with spaces as `+`,
    /// maps flatten to `key[sub]=value` and lists to repeated `key[]=value`.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut pairs = Vec::with_capacity(self.fields.len());

        for (name, value) in &self.fields {
            if value.is_blank() {
                continue;
            }
            match value {
                FieldValue::Text(text) => pairs.push(format!("{name}={}", form_escape(text))),
                FieldValue::Flag(_) => pairs.push(format!("{name}=true")),
                FieldValue::Map(entries) => pairs.extend(
                    entries
                        .iter()
                        .filter(|(_, v)| !is_blank(v))
                        .map(|(k, v)| format!("{name}[{k}]={}", form_escape(v))),
                ),
                FieldValue::List(items) => pairs.extend(
                    items
                        .iter()
                        .filter(|v| !is_blank(v))
                        .map(|v| format!("{name}[]={}", form_escape(v))),
                ),
            }
        }

        pairs.join("&")
    }
}

fn form_escape(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}
