//! Space-separated payload tokens with legacy quoting rules.
//!
//! Tokens are separated by spaces. A double quote toggles quoting, inside
//! which spaces are literal, and a backslash escapes the next byte. The
//! quoting side mirrors this: backslashes and quotes are escaped, and a quote
//! is opened at the first space and closed at the end of the value. An empty
//! value is written as `""`.

/// Iterator over the tokens of a payload.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Tokens<'a> {
    /// Starts tokenising `data` from the beginning.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes not yet consumed, with leading spaces removed.
    #[must_use]
    pub fn remainder(&self) -> &'a [u8] {
        let rest = self.data.get(self.offset..).unwrap_or_default();
        let skip = rest.iter().take_while(|byte| **byte == b' ').count();
        rest.get(skip..).unwrap_or_default()
    }
}

impl Iterator for Tokens<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.data.get(self.offset) == Some(&b' ') {
            self.offset += 1;
        }
        if self.offset >= self.data.len() {
            return None;
        }
        let mut token = Vec::new();
        let mut quoted = false;
        while let Some(&byte) = self.data.get(self.offset) {
            self.offset += 1;
            match byte {
                b'\\' => match self.data.get(self.offset) {
                    Some(&escaped) => {
                        self.offset += 1;
                        token.push(escaped);
                    }
                    None => break,
                },
                b' ' if !quoted => break,
                b'"' => quoted = !quoted,
                other => token.push(other),
            }
        }
        Some(token)
    }
}

/// Quotes a single value so that [`Tokens`] yields it back unchanged.
#[must_use]
pub fn quote_token(value: &[u8]) -> Vec<u8> {
    if value.is_empty() {
        return b"\"\"".to_vec();
    }
    let mut quoted = Vec::with_capacity(value.len() + 2);
    let mut open = false;
    for &byte in value {
        match byte {
            b'\\' | b'"' => quoted.push(b'\\'),
            b' ' if !open => {
                open = true;
                quoted.push(b'"');
            }
            _ => {}
        }
        quoted.push(byte);
    }
    if open {
        quoted.push(b'"');
    }
    quoted
}

/// Quotes each value and joins them with single spaces.
#[must_use]
pub fn quote_tokens<I, T>(values: I) -> Vec<u8>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut packed = Vec::new();
    for value in values {
        if !packed.is_empty() {
            packed.push(b' ');
        }
        packed.extend_from_slice(&quote_token(value.as_ref()));
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn collect(data: &[u8]) -> Vec<String> {
        Tokens::new(data)
            .map(|token| String::from_utf8(token).expect("utf8 token"))
            .collect()
    }

    #[test]
    fn splits_on_runs_of_spaces() {
        assert_eq!(collect(b"  5000   alice GUI "), vec!["5000", "alice", "GUI"]);
    }

    #[test]
    fn quotes_group_spaces_and_backslashes_escape() {
        assert_eq!(
            collect(br#"0 "mary ann" a\"b c\\d"#),
            vec!["0", "mary ann", "a\"b", "c\\d"]
        );
    }

    #[test]
    fn empty_payload_has_no_tokens() {
        assert!(collect(b"   ").is_empty());
    }

    #[test]
    fn remainder_skips_consumed_tokens() {
        let mut tokens = Tokens::new(b"secret   BUILD a b");
        assert_eq!(tokens.next().as_deref(), Some(b"secret".as_slice()));
        assert_eq!(tokens.remainder(), b"BUILD a b");
    }

    #[rstest]
    #[case(b"alice".as_slice(), b"alice".as_slice())]
    #[case(b"".as_slice(), b"\"\"".as_slice())]
    #[case(b"mary ann".as_slice(), b"mary\" ann\"".as_slice())]
    #[case(b"a\"b".as_slice(), b"a\\\"b".as_slice())]
    fn quoting_follows_legacy_layout(#[case] value: &[u8], #[case] expected: &[u8]) {
        assert_eq!(quote_token(value), expected);
    }

    #[test]
    fn packed_users_tokenise_back() {
        let packed = quote_tokens(["alice", "mary ann", ""]);
        assert_eq!(collect(&packed), vec!["alice", "mary ann", ""]);
    }
}
