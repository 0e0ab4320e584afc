//! LESS validation for generated variable bundles.
//!
//! The SCSS-to-LESS conversion is a chain of textual rewrites, so its output
//! has to be checked by something that actually reads LESS. This module
//! tokenizes a LESS variables document and checks the declarations:
//!
//! - every statement is `@name: value;` (the final `;` may be omitted)
//! - parentheses balance inside each value
//! - no SCSS leftovers (`$` sigils, `#{...}` interpolation, `!default` flags)
//! - every referenced variable is declared somewhere in the document
//!   (LESS resolves variables lazily, so later declarations count)
//! - no variable is defined in terms of itself
//! - `fade()` receives exactly two arguments
//!
//! # Example
//!
//! ```
//! use stylebuild::less::validate;
//!
//! let summary = validate("@black: #000;\n@shadow: 0 0 0 1px fade(@black, 10%);\n").unwrap();
//! assert_eq!(summary.variables, vec!["black", "shadow"]);
//!
//! let err = validate("@shadow: fade(@black, 10%);").unwrap_err();
//! assert_eq!(err.to_string(), "1:15: variable @black is undefined");
//! ```

use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Functions whose argument count is checked.
const FUNCTION_ARITY: &[(&str, &[usize])] = &[
    ("fade", &[2]),
    ("fadein", &[2]),
    ("fadeout", &[2]),
    ("rgba", &[2, 4]),
];

/// A validation failure with its 1-indexed position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {kind}")]
pub struct LessError {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// What went wrong
    pub kind: LessErrorKind,
}

/// Kinds of LESS validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LessErrorKind {
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("'$' is not a LESS variable sigil")]
    ScssSigil,
    #[error("'#{{' interpolation is not valid LESS")]
    Interpolation,
    #[error("unmatched '{0}'")]
    Unbalanced(char),
    #[error("unsupported flag '!{0}'")]
    UnsupportedFlag(String),
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: &'static str,
        found: String,
    },
    #[error("empty value for @{0}")]
    EmptyValue(String),
    #[error("value is not a number")]
    NotANumber,
    #[error("{name}() expects {expected} arguments, found {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("variable @{0} is undefined")]
    UndefinedVariable(String),
    #[error("recursive variable definition for @{0}")]
    RecursiveVariable(String),
}

/// What a successfully validated document declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessSummary {
    /// Declared variable names in first-declaration order, without duplicates
    pub variables: Vec<String>,
    /// Number of declaration statements
    pub declarations: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Variable(String),
    Ident(String),
    Number(String),
    Hash(String),
    Str(String),
    Flag(String),
    Punct(char),
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Variable(name) => write!(f, "'@{}'", name),
            TokenKind::Ident(s) | TokenKind::Number(s) => write!(f, "'{}'", s),
            TokenKind::Hash(s) => write!(f, "'#{}'", s),
            TokenKind::Str(s) => write!(f, "string {:?}", s),
            TokenKind::Flag(s) => write!(f, "'!{}'", s),
            TokenKind::Punct(c) => write!(f, "'{}'", c),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    column: usize,
}

impl Token {
    fn error(&self, kind: LessErrorKind) -> LessError {
        LessError { line: self.line, column: self.column, kind }
    }

    fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Self { chars: input.chars().collect(), pos: 0, line: 1, column: 1 }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, kind: LessErrorKind) -> LessError {
        LessError { line, column, kind }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek(0) {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LessError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek(0) {
            let (line, column) = (self.line, self.column);

            if c.is_whitespace() {
                self.bump();
                continue;
            }

            if c == '/' && self.peek(1) == Some('*') {
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        Some('*') if self.peek(0) == Some('/') => {
                            self.bump();
                            break;
                        }
                        Some(_) => {}
                        None => {
                            return Err(self.error(line, column, LessErrorKind::UnterminatedComment))
                        }
                    }
                }
                continue;
            }

            if c == '/' && self.peek(1) == Some('/') {
                self.take_while(|c| c != '\n');
                continue;
            }

            let kind = match c {
                '$' => return Err(self.error(line, column, LessErrorKind::ScssSigil)),
                '"' | '\'' => {
                    self.bump();
                    let mut value = String::new();
                    loop {
                        match self.bump() {
                            Some('\\') => {
                                if let Some(escaped) = self.bump() {
                                    value.push('\\');
                                    value.push(escaped);
                                }
                            }
                            Some(q) if q == c => break,
                            Some('\n') | None => {
                                return Err(self.error(
                                    line,
                                    column,
                                    LessErrorKind::UnterminatedString,
                                ))
                            }
                            Some(other) => value.push(other),
                        }
                    }
                    TokenKind::Str(value)
                }
                '@' => {
                    self.bump();
                    let name = self.take_while(is_name_char);
                    if name.is_empty() {
                        return Err(self.error(line, column, LessErrorKind::UnexpectedChar('@')));
                    }
                    TokenKind::Variable(name)
                }
                '#' => {
                    self.bump();
                    if self.peek(0) == Some('{') {
                        return Err(self.error(line, column, LessErrorKind::Interpolation));
                    }
                    let name = self.take_while(is_name_char);
                    if name.is_empty() {
                        return Err(self.error(line, column, LessErrorKind::UnexpectedChar('#')));
                    }
                    TokenKind::Hash(name)
                }
                '!' => {
                    self.bump();
                    self.take_while(|c| c == ' ');
                    let flag = self.take_while(is_name_char);
                    TokenKind::Flag(flag)
                }
                c if c.is_ascii_digit() || (c == '.' && self.next_is_digit(1)) => {
                    TokenKind::Number(self.lex_number())
                }
                '-' if self.next_is_digit(1)
                    || (self.peek(1) == Some('.') && self.next_is_digit(2)) =>
                {
                    self.bump();
                    TokenKind::Number(format!("-{}", self.lex_number()))
                }
                c if c.is_alphabetic() || c == '_' || (c == '-' && self.next_is_name_start(1)) => {
                    TokenKind::Ident(self.take_while(is_name_char))
                }
                ':' | ';' | '(' | ')' | ',' | '+' | '-' | '*' | '/' | '%' | '=' | '~' | '>'
                | '<' | '.' | '[' | ']' | '{' | '}' => {
                    self.bump();
                    TokenKind::Punct(c)
                }
                other => return Err(self.error(line, column, LessErrorKind::UnexpectedChar(other))),
            };

            tokens.push(Token { kind, line, column });
        }

        Ok(tokens)
    }

    fn next_is_digit(&self, offset: usize) -> bool {
        self.peek(offset).is_some_and(|c| c.is_ascii_digit())
    }

    fn next_is_name_start(&self, offset: usize) -> bool {
        self.peek(offset).is_some_and(|c| c.is_alphabetic() || c == '_' || c == '-')
    }

    /// Digits with an optional fraction, followed by a unit or `%`.
    fn lex_number(&mut self) -> String {
        let mut out = self.take_while(|c| c.is_ascii_digit());
        if self.peek(0) == Some('.') && self.next_is_digit(1) {
            self.bump();
            out.push('.');
            out.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if self.peek(0) == Some('%') {
            self.bump();
            out.push('%');
        } else {
            out.push_str(&self.take_while(|c| c.is_ascii_alphabetic()));
        }
        out
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

/// A parsed `@name: value;` statement.
struct Declaration {
    name: String,
    name_token: Token,
    value: Vec<Token>,
}

impl Declaration {
    fn references(&self) -> impl Iterator<Item = (&str, &Token)> {
        self.value.iter().filter_map(|t| match &t.kind {
            TokenKind::Variable(name) => Some((name.as_str(), t)),
            _ => None,
        })
    }
}

fn parse_declarations(tokens: Vec<Token>) -> Result<Vec<Declaration>, LessError> {
    let mut declarations = Vec::new();
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        let name = match &token.kind {
            TokenKind::Variable(name) => name.clone(),
            other => {
                return Err(token.error(LessErrorKind::Expected {
                    expected: "variable declaration",
                    found: other.to_string(),
                }))
            }
        };

        match iter.next() {
            Some(t) if t.is_punct(':') => {}
            Some(t) => {
                let found = t.kind.to_string();
                return Err(t.error(LessErrorKind::Expected { expected: "':'", found }));
            }
            None => {
                return Err(token.error(LessErrorKind::Expected {
                    expected: "':'",
                    found: "end of input".to_string(),
                }))
            }
        }

        let mut value = Vec::new();
        let mut open_parens: Vec<Token> = Vec::new();
        while let Some(t) = iter.next_if(|t| !(t.is_punct(';') && open_parens.is_empty())) {
            if t.is_punct(';') {
                // A `;` inside parens is always a mistake in a variable value.
                let open = open_parens.pop().unwrap_or_else(|| t.clone());
                return Err(open.error(LessErrorKind::Unbalanced('(')));
            }
            if t.is_punct('(') {
                open_parens.push(t.clone());
            } else if t.is_punct(')') && open_parens.pop().is_none() {
                return Err(t.error(LessErrorKind::Unbalanced(')')));
            }
            value.push(t);
        }
        if let Some(open) = open_parens.pop() {
            return Err(open.error(LessErrorKind::Unbalanced('(')));
        }
        // consume the terminating `;`, if any
        iter.next();

        if value.is_empty() {
            return Err(token.error(LessErrorKind::EmptyValue(name)));
        }

        declarations.push(Declaration { name, name_token: token, value });
    }

    Ok(declarations)
}

fn check_value(decl: &Declaration) -> Result<(), LessError> {
    for (i, token) in decl.value.iter().enumerate() {
        match &token.kind {
            TokenKind::Flag(flag) if flag != "important" => {
                return Err(token.error(LessErrorKind::UnsupportedFlag(flag.clone())));
            }
            TokenKind::Ident(ident) if ident == "NaN" => {
                return Err(token.error(LessErrorKind::NotANumber));
            }
            TokenKind::Punct('{') | TokenKind::Punct('}') => {
                return Err(token.error(LessErrorKind::Expected {
                    expected: "value",
                    found: token.kind.to_string(),
                }));
            }
            TokenKind::Ident(ident) => {
                let arities = FUNCTION_ARITY
                    .iter()
                    .find(|(name, _)| *name == ident.as_str())
                    .map(|(_, arities)| *arities);
                let is_call = decl.value.get(i + 1).is_some_and(|t| t.is_punct('('));
                if let (Some(arities), true) = (arities, is_call) {
                    let found = count_arguments(&decl.value[i + 2..]);
                    if !arities.contains(&found) {
                        let expected =
                            arities.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" or ");
                        return Err(token.error(LessErrorKind::Arity {
                            name: ident.clone(),
                            expected,
                            found,
                        }));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Count top-level arguments up to the `)` that closes the call.
fn count_arguments(tokens: &[Token]) -> usize {
    let mut depth = 0usize;
    let mut commas = 0;
    let mut any = false;
    for token in tokens {
        match token.kind {
            TokenKind::Punct('(') => depth += 1,
            TokenKind::Punct(')') if depth == 0 => break,
            TokenKind::Punct(')') => depth -= 1,
            TokenKind::Punct(',') if depth == 0 => {
                commas += 1;
                continue;
            }
            _ => {}
        }
        any = true;
    }
    if any || commas > 0 {
        commas + 1
    } else {
        0
    }
}

/// Reject a variable whose effective (last) definition reaches itself.
fn check_recursion(declarations: &[Declaration]) -> Result<(), LessError> {
    let effective: HashMap<&str, &Declaration> =
        declarations.iter().map(|d| (d.name.as_str(), d)).collect();

    fn visit<'a>(
        name: &'a str,
        effective: &HashMap<&'a str, &'a Declaration>,
        visiting: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), LessError> {
        if done.contains(name) {
            return Ok(());
        }
        let Some(&decl) = effective.get(name) else {
            return Ok(());
        };
        if !visiting.insert(name) {
            return Err(decl
                .name_token
                .error(LessErrorKind::RecursiveVariable(name.to_string())));
        }
        for (reference, _) in decl.references() {
            visit(reference, effective, visiting, done)?;
        }
        visiting.remove(name);
        done.insert(name);
        Ok(())
    }

    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    for decl in declarations {
        visit(decl.name.as_str(), &effective, &mut visiting, &mut done)?;
    }
    Ok(())
}

/// Validate a LESS variables document.
pub fn validate(input: &str) -> Result<LessSummary, LessError> {
    let tokens = Lexer::new(input).tokenize()?;
    let declarations = parse_declarations(tokens)?;

    let defined: HashSet<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
    for decl in &declarations {
        check_value(decl)?;
        for (reference, token) in decl.references() {
            if !defined.contains(reference) {
                return Err(token.error(LessErrorKind::UndefinedVariable(reference.to_string())));
            }
        }
    }
    check_recursion(&declarations)?;

    let mut seen = HashSet::new();
    let variables = declarations
        .iter()
        .filter(|d| seen.insert(d.name.as_str()))
        .map(|d| d.name.clone())
        .collect();

    Ok(LessSummary { variables, declarations: declarations.len() })
}
