//! SQL placeholder tokenization.
//!
//! A statement's SQL is split once, at construction, into literal segments
//! and placeholder tokens. Quoted values and delimited identifiers are
//! blanked out first (quotes kept, contents dropped) so that `?` or `:x`
//! inside a literal never becomes a bind target.
//!
//! Each driver declares one quoting convention ([`QuoteDialect`]); only that
//! convention is recognized. `::` is treated as literal text so PostgreSQL
//! style casts (`id::text`) do not read as named placeholders.

use std::collections::HashSet;
use std::sync::OnceLock;

use dbal_core::{
    BindTarget, Driver, EscapeStyle, ParameterStyle, ParseError, ParseErrorKind, QuoteDialect,
    Result,
};
use regex::Regex;

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"::|\?|:[A-Za-z0-9_]+").expect("placeholder pattern is valid"))
}

/// One element of a tokenized statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlToken {
    /// SQL text between placeholders, with quoted contents removed
    Literal(String),
    /// `?`
    Positional,
    /// `:name`, stored with its colon
    Named(String),
}

impl SqlToken {
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, SqlToken::Literal(_))
    }
}

/// Immutable token list produced from a statement's SQL.
#[derive(Debug, Clone, Default)]
pub struct TokenSequence {
    tokens: Vec<SqlToken>,
    positional: usize,
    /// Distinct names in order of first appearance
    names: Vec<String>,
}

impl TokenSequence {
    pub fn tokens(&self) -> &[SqlToken] {
        &self.tokens
    }

    /// Placeholder tokens only, left to right, duplicates included.
    pub fn placeholders(&self) -> impl Iterator<Item = &SqlToken> {
        self.tokens.iter().filter(|t| t.is_placeholder())
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders().count()
    }

    /// Number of `?` placeholders.
    pub fn positional_count(&self) -> usize {
        self.positional
    }

    /// Distinct named placeholders in order of first appearance.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Style used by this statement, `None` when it has no placeholders.
    pub fn style(&self) -> Option<ParameterStyle> {
        if self.positional > 0 {
            Some(ParameterStyle::Positional)
        } else if self.names.is_empty() {
            None
        } else {
            Some(ParameterStyle::Named)
        }
    }

    /// The canonical bind-target list: positions `1..=N`, or each distinct
    /// name once in order of first appearance.
    pub fn bind_targets(&self) -> Vec<BindTarget> {
        if self.positional > 0 {
            (1..=self.positional).map(BindTarget::Position).collect()
        } else {
            self.names.iter().cloned().map(BindTarget::Name).collect()
        }
    }
}

/// Splits SQL into literal segments and placeholders.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderParser {
    dialect: QuoteDialect,
    positional_allowed: bool,
    named_allowed: bool,
}

impl PlaceholderParser {
    pub fn new(dialect: QuoteDialect, positional_allowed: bool, named_allowed: bool) -> Self {
        Self {
            dialect,
            positional_allowed,
            named_allowed,
        }
    }

    /// Parser configured from a driver's declared capabilities.
    pub fn for_driver<D: Driver>(driver: &D) -> Self {
        Self::new(
            driver.quote_dialect(),
            driver.supports_parameter_style(ParameterStyle::Positional),
            driver.supports_parameter_style(ParameterStyle::Named),
        )
    }

    pub fn allows(&self, style: ParameterStyle) -> bool {
        match style {
            ParameterStyle::Positional => self.positional_allowed,
            ParameterStyle::Named => self.named_allowed,
        }
    }

    /// Tokenize `sql`.
    pub fn parse(&self, sql: &str) -> Result<TokenSequence> {
        let stripped = strip_quoted(sql, &self.dialect)?;

        let mut seq = TokenSequence::default();
        let mut seen = HashSet::new();
        let mut literal = String::new();
        let mut last = 0;

        for m in placeholder_regex().find_iter(&stripped) {
            literal.push_str(&stripped[last..m.start()]);
            last = m.end();

            let text = m.as_str();
            if text == "::" {
                literal.push_str(text);
                continue;
            }

            let token = if text == "?" {
                self.check_style(ParameterStyle::Positional, text, sql)?;
                seq.positional += 1;
                SqlToken::Positional
            } else {
                self.check_style(ParameterStyle::Named, text, sql)?;
                if seen.insert(text.to_string()) {
                    seq.names.push(text.to_string());
                }
                SqlToken::Named(text.to_string())
            };

            if !literal.is_empty() {
                seq.tokens.push(SqlToken::Literal(std::mem::take(&mut literal)));
            }
            seq.tokens.push(token);
        }

        literal.push_str(&stripped[last..]);
        if !literal.is_empty() {
            seq.tokens.push(SqlToken::Literal(literal));
        }

        if seq.positional > 0 && !seq.names.is_empty() {
            return Err(ParseError {
                kind: ParseErrorKind::MixedPlaceholderStyles,
                placeholder: None,
                sql: sql.to_string(),
            }
            .into());
        }

        tracing::trace!(
            placeholders = seq.placeholder_count(),
            tokens = seq.tokens.len(),
            "Tokenized SQL"
        );
        Ok(seq)
    }

    fn check_style(&self, style: ParameterStyle, placeholder: &str, sql: &str) -> Result<()> {
        if self.allows(style) {
            Ok(())
        } else {
            Err(ParseError {
                kind: ParseErrorKind::UnsupportedPlaceholderStyle,
                placeholder: Some(placeholder.to_string()),
                sql: sql.to_string(),
            }
            .into())
        }
    }
}

/// Drop the contents of quoted values and delimited identifiers, keeping
/// the delimiters so token boundaries on either side stay separate.
fn strip_quoted(sql: &str, dialect: &QuoteDialect) -> Result<String> {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        let escape = if c == dialect.value_quote {
            dialect.value_escape
        } else if c == dialect.identifier_quote {
            dialect.identifier_escape
        } else {
            out.push(c);
            continue;
        };

        let quote = c;
        let mut closed = false;
        while let Some(inner) = chars.next() {
            if escape == EscapeStyle::Backslash && inner == '\\' {
                chars.next();
                continue;
            }
            if inner == quote {
                if escape == EscapeStyle::Doubled && chars.peek() == Some(&quote) {
                    chars.next();
                    continue;
                }
                closed = true;
                break;
            }
        }

        if !closed {
            return Err(ParseError {
                kind: ParseErrorKind::UnterminatedQuote,
                placeholder: None,
                sql: sql.to_string(),
            }
            .into());
        }
        out.push(quote);
        out.push(quote);
    }

    Ok(out)
}
