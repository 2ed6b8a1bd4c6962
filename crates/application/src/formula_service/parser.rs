use super::FormulaError;
use super::functions::is_known_function;

/// Maximum nesting of function calls in one formula.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Parsed formula.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    /// Numeric literal.
    Number(f64),
    /// Double-quoted text literal.
    Text(String),
    /// Attribute of the first reference evaluable of a condition.
    Attribute {
        /// Condition id.
        condition_id: String,
        /// Attribute plugin id.
        attribute: String,
    },
    /// Library function call.
    Call {
        /// Function name.
        function: String,
        /// Argument expressions.
        arguments: Vec<FormulaExpr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Text(String),
    Colon,
    Comma,
    LeftParen,
    RightParen,
    Eof,
}

/// Parses a formula; the text must start with `=`.
pub fn parse_formula(formula: &str) -> Result<FormulaExpr, FormulaError> {
    let body = formula
        .trim()
        .strip_prefix('=')
        .ok_or_else(|| FormulaError::Syntax("a formula must start with '='".to_owned()))?;
    let mut parser = Parser {
        tokens: tokenize(body)?,
        position: 0,
    };
    let expression = parser.parse_expression(0)?;
    match parser.current() {
        Token::Eof => Ok(expression),
        token => Err(FormulaError::Syntax(format!(
            "unexpected {token:?} after a complete expression"
        ))),
    }
}

fn is_word_char(character: char) -> bool {
    character.is_alphanumeric() || matches!(character, '_' | '.' | '-' | '+')
}

fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut characters = input.chars().peekable();

    while let Some(&character) = characters.peek() {
        match character {
            _ if character.is_whitespace() => {
                characters.next();
            }
            ':' | ',' | '(' | ')' => {
                characters.next();
                tokens.push(match character {
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    '(' => Token::LeftParen,
                    _ => Token::RightParen,
                });
            }
            '"' => {
                characters.next();
                let mut text = String::new();
                loop {
                    match characters.next() {
                        Some('"') => break,
                        Some(next) => text.push(next),
                        None => {
                            return Err(FormulaError::Syntax(
                                "unterminated string literal".to_owned(),
                            ));
                        }
                    }
                }
                tokens.push(Token::Text(text));
            }
            _ if is_word_char(character) => {
                let mut word = String::new();
                while let Some(&next) = characters.peek() {
                    if !is_word_char(next) {
                        break;
                    }
                    word.push(next);
                    characters.next();
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                return Err(FormulaError::Syntax(format!(
                    "unexpected character '{character}'"
                )));
            }
        }
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

static END: Token = Token::Eof;

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&END)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        self.position += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FormulaError> {
        let token = self.advance();
        if &token != expected {
            return Err(FormulaError::Syntax(format!(
                "expected {expected:?}, found {token:?}"
            )));
        }
        Ok(())
    }

    fn parse_expression(&mut self, depth: usize) -> Result<FormulaExpr, FormulaError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(FormulaError::Syntax(format!(
                "formula nests deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }
        match self.advance() {
            Token::Text(text) => Ok(FormulaExpr::Text(text)),
            Token::Word(word) => match self.current() {
                Token::LeftParen => self.parse_call(word, depth),
                Token::Colon => {
                    self.advance();
                    match self.advance() {
                        Token::Word(attribute) => Ok(FormulaExpr::Attribute {
                            condition_id: word,
                            attribute,
                        }),
                        token => Err(FormulaError::Syntax(format!(
                            "expected an attribute after '{word}:', found {token:?}"
                        ))),
                    }
                }
                _ => word.parse::<f64>().map(FormulaExpr::Number).map_err(|_| {
                    FormulaError::Syntax(format!(
                        "{word} is not a valid operand: only conditions, strings or numbers are supported"
                    ))
                }),
            },
            token => Err(FormulaError::Syntax(format!(
                "expected an operand, found {token:?}"
            ))),
        }
    }

    fn parse_call(&mut self, function: String, depth: usize) -> Result<FormulaExpr, FormulaError> {
        if !is_known_function(&function) {
            return Err(FormulaError::UnknownFunction(function));
        }
        self.expect(&Token::LeftParen)?;

        let mut arguments = Vec::new();
        if self.current() != &Token::RightParen {
            loop {
                arguments.push(self.parse_expression(depth + 1)?);
                if self.current() == &Token::Comma {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.expect(&Token::RightParen).map_err(|_| {
            FormulaError::Syntax(format!("missing closing parenthesis for {function}"))
        })?;

        Ok(FormulaExpr::Call {
            function,
            arguments,
        })
    }
}
