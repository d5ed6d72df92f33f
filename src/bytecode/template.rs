//! String literals with embedded variable references

/// One embedded reference: every occurrence of `search` in the template is
/// replaced by the display string of `name[keys[0]][keys[1]]...`.
///
/// A key starting with `$` names a variable whose display string is used
/// as the actual key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarReference {
    pub search: String,
    pub name: String,
    pub keys: Vec<String>,
}

impl VarReference {
    pub fn new(search: &str, name: &str, keys: Vec<String>) -> Self {
        Self {
            search: search.to_string(),
            name: name.to_string(),
            keys,
        }
    }
}

/// A string literal plus its references, in the order they were recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTemplate {
    text: String,
    references: Vec<VarReference>,
}

impl StringTemplate {
    /// Build a template with an explicit reference order
    pub fn new(text: &str, references: Vec<VarReference>) -> Self {
        Self {
            text: text.to_string(),
            references,
        }
    }

    /// A template with nothing to resolve
    pub fn literal(text: &str) -> Self {
        Self::new(text, Vec::new())
    }

    /// Scan `text` for `$name`, `$name[key]...` and `{$name[key]...}`
    /// references, recording each distinct search pattern once in scan order,
    /// except that a pattern is always recorded ahead of any pattern it contains.
    pub fn parse(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut references: Vec<VarReference> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            let braced = bytes[i] == b'{' && bytes.get(i + 1) == Some(&b'$');
            let dollar = if braced { i + 1 } else { i };

            if bytes[dollar] != b'$' || !bytes.get(dollar + 1).map_or(false, |b| is_ident_start(*b)) {
                i += 1;
                continue;
            }

            let name_start = dollar + 1;
            let name_end = scan_ident(bytes, name_start);
            let mut keys = Vec::new();
            let mut end = name_end;

            while bytes.get(end) == Some(&b'[') {
                let close = match bytes[end + 1..].iter().position(|b| *b == b']') {
                    Some(offset) => end + 1 + offset,
                    None => break,
                };
                let key = strip_quotes(&text[end + 1..close]);
                if key.is_empty() {
                    break;
                }
                keys.push(key.to_string());
                end = close + 1;
            }

            let start = if braced && bytes.get(end) == Some(&b'}') {
                end += 1;
                i
            } else {
                dollar
            };

            let search = &text[start..end];
            if !references.iter().any(|r| r.search == search) {
                // A pattern contained in this one must be substituted after it
                let at = references
                    .iter()
                    .position(|r| search.contains(r.search.as_str()))
                    .unwrap_or(references.len());
                references.insert(at, VarReference::new(search, &text[name_start..name_end], keys));
            }
            i = end;
        }

        Self::new(text, references)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn references(&self) -> &[VarReference] {
        &self.references
    }

    pub fn has_references(&self) -> bool {
        !self.references.is_empty()
    }
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn scan_ident(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    end
}

fn strip_quotes(key: &str) -> &str {
    for quote in ['\'', '"'] {
        if key.len() >= 2 && key.starts_with(quote) && key.ends_with(quote) {
            return &key[1..key.len() - 1];
        }
    }
    key
}
