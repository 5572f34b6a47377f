//! Interpolation extraction for template documents.
//!
//! A template is free-form host text in which `${ expr }` marks an embedded
//! CEL expression. `$${` is a literal `${` and starts nothing.

use std::ops::Range;

use thiserror::Error;

/// Maps offsets local to an embedded expression to host document offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetMapper {
    host_offset: usize,
}

impl OffsetMapper {
    pub fn new(host_offset: usize) -> Self {
        Self { host_offset }
    }

    pub fn to_host(&self, local: usize) -> usize {
        self.host_offset + local
    }

    pub fn span_to_host(&self, span: &Range<usize>) -> Range<usize> {
        self.to_host(span.start)..self.to_host(span.end)
    }

    pub fn host_offset(&self) -> usize {
        self.host_offset
    }
}

/// One embedded expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRegion {
    /// Expression text between the delimiters.
    pub source: String,
    pub mapper: OffsetMapper,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// `offset` is the byte offset of the opening `${`.
    #[error("unterminated interpolation: missing closing '}}'")]
    Unterminated { offset: usize },
}

/// Extract every interpolation from a template, in document order.
pub fn extract_regions(text: &str) -> Result<Vec<TemplateRegion>, TemplateError> {
    let bytes = text.as_bytes();
    let mut regions = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"$${") {
            i += 3;
            continue;
        }
        if bytes[i..].starts_with(b"${") {
            let start = i + 2;
            let end = find_closing_brace(bytes, start)
                .ok_or(TemplateError::Unterminated { offset: i })?;
            regions.push(TemplateRegion {
                source: text[start..end].to_string(),
                mapper: OffsetMapper::new(start),
            });
            i = end + 1;
        } else {
            i += 1;
        }
    }

    Ok(regions)
}

/// Find the `}` closing an interpolation body that starts at `start`.
///
/// Braces of map and message literals nest; braces inside string literals
/// are ignored.
fn find_closing_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut j = start;

    while j < bytes.len() {
        let b = bytes[j];
        match quote {
            Some(_) if b == b'\\' => j += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'{' => depth += 1,
                b'}' if depth == 0 => return Some(j),
                b'}' => depth -= 1,
                _ => {}
            },
        }
        j += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_regions_with_host_offsets() {
        let text = "Hello ${user.name}, you have ${size(items)} items";
        let regions = extract_regions(text).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].source, "user.name");
        assert_eq!(regions[0].mapper.host_offset(), 8);
        assert_eq!(&text[regions[0].mapper.span_to_host(&(0..4))], "user");
        assert_eq!(regions[1].source, "size(items)");
        assert_eq!(&text[regions[1].mapper.to_host(0)..][..4], "size");
    }

    #[test]
    fn nested_braces_and_strings() {
        let text = "${ {'a': 1}['a'] } and ${ '}' + \"{\" }";
        let regions = extract_regions(text).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].source, " {'a': 1}['a'] ");
        assert_eq!(regions[1].source, " '}' + \"{\" ");
    }

    #[test]
    fn escaped_interpolation_is_literal() {
        let regions = extract_regions("cost: $${price} vs ${price}").unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].source, "price");
    }

    #[test]
    fn plain_text_has_no_regions() {
        assert!(extract_regions("no expressions here, $ { nope }")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unterminated_reports_opening_offset() {
        let err = extract_regions("ok ${a} then ${b + 1").unwrap_err();
        assert_eq!(err, TemplateError::Unterminated { offset: 13 });
    }
}
