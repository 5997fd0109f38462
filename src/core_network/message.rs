use crate::constants::{FIELD_DELIMITER, TAG_AUTH, TAG_ERR, TAG_KEY, TAG_OK};

/// A single control-plane line: a command tag followed by `@`-separated fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub tag: String,
    pub args: Vec<String>,
}

impl ControlMessage {
    pub fn new(tag: &str, args: Vec<String>) -> Self {
        Self {
            tag: tag.to_string(),
            args,
        }
    }

    pub fn ok(detail: impl Into<String>) -> Self {
        Self::new(TAG_OK, vec![detail.into()])
    }

    pub fn err(detail: impl Into<String>) -> Self {
        Self::new(TAG_ERR, vec![detail.into()])
    }

    pub fn auth(step: &str) -> Self {
        Self::new(TAG_AUTH, vec![step.to_string()])
    }

    pub fn key(hex_key: String) -> Self {
        Self::new(TAG_KEY, vec![hex_key])
    }

    /// Splits a received line on the field delimiter. The first field is the tag.
    ///
    /// Fields are taken verbatim: escaping applies to outgoing lines only, so
    /// a backslash in a client supplied name stays a backslash.
    pub fn parse(line: &str) -> Self {
        let mut fields = line.split(FIELD_DELIMITER).map(str::to_string);
        let tag = fields.next().unwrap_or_default();
        Self {
            tag,
            args: fields.collect(),
        }
    }

    /// Encodes the message without the line delimiter. Embedded newlines are
    /// escaped so the result is always exactly one control line.
    pub fn encode(&self) -> String {
        let mut line = escape_field(&self.tag);
        for arg in &self.args {
            line.push(FIELD_DELIMITER);
            line.push_str(&escape_field(arg));
        }
        line
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

fn escape_field(field: &str) -> String {
    let mut escaped = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}
