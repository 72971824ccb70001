//! Search queries over a resource's indexed fields
//!
//! A query is whitespace-separated tokens, all of which must hold:
//!
//! - `field:value` matches when the named field starts with `value`
//! - `-field:value` matches when it does not
//! - a bare token matches when any indexed value contains it
//!
//! Comparison ignores ASCII case.

/// One term of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Field {
        field: String,
        value: String,
        negated: bool,
    },
    Text {
        value: String,
        negated: bool,
    },
}

impl Token {
    fn parse(raw: &str) -> Option<Token> {
        let (negated, body) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        if body.is_empty() {
            return None;
        }
        let token = match body.split_once(':') {
            Some((field, value)) if !field.is_empty() => Token::Field {
                field: field.to_ascii_lowercase(),
                value: value.to_ascii_lowercase(),
                negated,
            },
            _ => Token::Text {
                value: body.to_ascii_lowercase(),
                negated,
            },
        };
        Some(token)
    }

    fn matches(&self, fields: &[(String, String)]) -> bool {
        match self {
            Token::Field {
                field,
                value,
                negated,
            } => {
                let hit = fields.iter().any(|(name, v)| {
                    name.eq_ignore_ascii_case(field) && v.to_ascii_lowercase().starts_with(value.as_str())
                });
                hit != *negated
            }
            Token::Text { value, negated } => {
                let hit = fields
                    .iter()
                    .any(|(_, v)| v.to_ascii_lowercase().contains(value.as_str()));
                hit != *negated
            }
        }
    }
}

/// A compiled search query. The empty query matches everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    text: String,
    tokens: Vec<Token>,
}

impl Query {
    /// Parsing never fails; malformed tokens such as a lone `-` are ignored.
    pub fn parse(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tokens: text.split_whitespace().filter_map(Token::parse).collect(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn matches(&self, fields: &[(String, String)]) -> bool {
        self.tokens.iter().all(|t| t.matches(fields))
    }

    /// The token being typed: the last one, unless the text ends in
    /// whitespace.
    pub fn last_token(&self) -> Option<&str> {
        if self.text.ends_with(char::is_whitespace) {
            return None;
        }
        self.text.split_whitespace().last()
    }

    /// The query text with its last token replaced by `replacement`.
    pub fn with_last_token(&self, replacement: &str) -> String {
        let trimmed = self.text.trim_end();
        match trimmed.char_indices().rev().find(|(_, c)| c.is_whitespace()) {
            Some((i, c)) => format!("{}{}", &trimmed[..i + c.len_utf8()], replacement),
            None => replacement.to_string(),
        }
    }
}
