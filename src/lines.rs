use memchr::memchr2;

/// Splits `text` into lines delimited by LF, CRLF, or lone CR.
///
/// `str::lines` treats a bare CR as line content; editors that still emit
/// classic Mac line endings would otherwise collapse a whole file into one
/// line. Terminators are not included in the yielded slices, and a trailing
/// terminator does not produce a final empty line.
pub(crate) fn split_lines(text: &str) -> LineIter<'_> {
    LineIter { rest: text }
}

pub(crate) struct LineIter<'t> {
    rest: &'t str,
}

impl<'t> Iterator for LineIter<'t> {
    type Item = &'t str;

    fn next(&mut self) -> Option<&'t str> {
        if self.rest.is_empty() {
            return None;
        }
        match memchr2(b'\n', b'\r', self.rest.as_bytes()) {
            Some(pos) => {
                let line = &self.rest[..pos];
                let bytes = self.rest.as_bytes();
                let terminator = if bytes[pos] == b'\r' && bytes.get(pos + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                self.rest = &self.rest[pos + terminator..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = "";
                Some(line)
            }
        }
    }
}
