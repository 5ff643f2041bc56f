//! Response assembly for the multi-record query paths.
//!
//! Records are spliced in as raw text. The array builder does not re-parse
//! or re-encode them, so a record that is not itself JSON still lands in the
//! output verbatim.

/// Builds `[\n<r1>,\n<r2>\n]` from raw records.
#[derive(Debug)]
pub struct JsonArrayBuilder {
    buf: String,
    count: usize,
}

impl JsonArrayBuilder {
    pub fn new() -> Self {
        Self {
            buf: String::from("[\n"),
            count: 0,
        }
    }

    pub fn push(&mut self, record: &[u8]) {
        if self.count > 0 {
            self.buf.push_str(",\n");
        }
        self.buf.push_str(&String::from_utf8_lossy(record));
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(mut self) -> String {
        self.buf.push_str("\n]");
        self.buf
    }
}

impl Default for JsonArrayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the `'<key>' = <value>` listing of a range scan.
#[derive(Debug, Default)]
pub struct RangeListing {
    buf: String,
    count: usize,
}

impl RangeListing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: &str, value: &[u8]) {
        self.buf.push('\'');
        self.buf.push_str(key);
        self.buf.push_str("' = ");
        self.buf.push_str(&String::from_utf8_lossy(value));
        self.buf.push('\n');
        self.count += 1;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_array() {
        assert_eq!(JsonArrayBuilder::new().finish(), "[\n\n]");
    }

    #[test]
    fn records_are_comma_newline_separated() {
        let mut b = JsonArrayBuilder::new();
        b.push(br#"{"a":1}"#);
        b.push(br#"{"b":2}"#);
        assert_eq!(b.len(), 2);
        assert_eq!(b.finish(), "[\n{\"a\":1},\n{\"b\":2}\n]");
    }

    #[test]
    fn non_json_records_are_spliced_verbatim() {
        let mut b = JsonArrayBuilder::new();
        b.push(b"X");
        assert_eq!(b.finish(), "[\nX\n]");
    }

    #[test]
    fn range_listing_format() {
        let mut l = RangeListing::new();
        assert!(l.is_empty());
        l.push("a", b"1");
        l.push("b", br#"{"x":true}"#);
        assert_eq!(l.finish(), "'a' = 1\n'b' = {\"x\":true}\n");
    }
}
