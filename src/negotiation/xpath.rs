//! XPath 1.0 syntax check.
//!
//! The expression is tokenized with the operator/name disambiguation rules
//! of XPath 1.0 (section 3.7) and then run through the expression grammar.
//! Nothing is evaluated.

/// Nesting limit for parenthesized expressions, predicates and arguments.
const MAX_DEPTH: usize = 64;

const AXES: &[&str] = &[
    "ancestor",
    "ancestor-or-self",
    "attribute",
    "child",
    "descendant",
    "descendant-or-self",
    "following",
    "following-sibling",
    "namespace",
    "parent",
    "preceding",
    "preceding-sibling",
    "self",
];

const NODE_TYPES: &[&str] = &["comment", "text", "processing-instruction", "node"];

const OPERATOR_NAMES: &[&str] = &["and", "or", "div", "mod"];

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Literal,
    Number,
    Variable,
    /// `*`, `prefix:*` or a QName in name-test position.
    NameTest,
    NodeType(String),
    FunctionName,
    AxisName,
    ColonColon,
    At,
    Dot,
    DotDot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Multiply,
    And,
    Or,
    Div,
    Mod,
    /// `=` or `!=`
    Equality,
    /// `<`, `<=`, `>` or `>=`
    Relational,
}

impl Token {
    fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Multiply
                | Token::And
                | Token::Or
                | Token::Div
                | Token::Mod
                | Token::Equality
                | Token::Relational
        )
    }

    /// After these tokens `*` is a name test and a bare name is not an
    /// operator.
    fn precedes_operand(&self) -> bool {
        self.is_operator()
            || matches!(
                self,
                Token::At | Token::ColonColon | Token::LParen | Token::LBracket | Token::Comma
            )
    }

    fn starts_step(&self) -> bool {
        matches!(
            self,
            Token::NameTest
                | Token::NodeType(_)
                | Token::AxisName
                | Token::At
                | Token::Dot
                | Token::DotDot
        )
    }

    fn describe(&self) -> &'static str {
        match self {
            Token::Literal => "string literal",
            Token::Number => "number",
            Token::Variable => "variable reference",
            Token::NameTest => "name test",
            Token::NodeType(_) => "node type test",
            Token::FunctionName => "function name",
            Token::AxisName => "axis name",
            Token::ColonColon => "'::'",
            Token::At => "'@'",
            Token::Dot => "'.'",
            Token::DotDot => "'..'",
            Token::LParen => "'('",
            Token::RParen => "')'",
            Token::LBracket => "'['",
            Token::RBracket => "']'",
            Token::Comma => "','",
            Token::Slash => "'/'",
            Token::DoubleSlash => "'//'",
            Token::Pipe => "'|'",
            Token::Plus => "'+'",
            Token::Minus => "'-'",
            Token::Multiply => "'*'",
            Token::And => "'and'",
            Token::Or => "'or'",
            Token::Div => "'div'",
            Token::Mod => "'mod'",
            Token::Equality => "equality operator",
            Token::Relational => "relational operator",
        }
    }
}

/// Check that `expression` parses as an XPath 1.0 expression. The error
/// names the first problem found.
pub(crate) fn check(expression: &str) -> Result<(), String> {
    let tokens = Lexer::new(expression).tokenize()?;
    if tokens.is_empty() {
        return Err("empty expression".into());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    parser.expr()?;

    match parser.peek() {
        None => Ok(()),
        Some(token) => Err(format!("unexpected {} after expression", token.describe())),
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(expression: &str) -> Self {
        Self {
            chars: expression.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn next_non_space(&self) -> (Option<char>, Option<char>) {
        let mut i = self.pos;
        while self.chars.get(i).is_some_and(|c| c.is_whitespace()) {
            i += 1;
        }
        (self.chars.get(i).copied(), self.chars.get(i + 1).copied())
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        while let Some(c) = self.peek_at(0) {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            let token = self.next_token(c)?;
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn operator_expected(&self) -> bool {
        self.tokens.last().is_some_and(|t| !t.precedes_operand())
    }

    fn next_token(&mut self, c: char) -> Result<Token, String> {
        let single = match c {
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ',' => Some(Token::Comma),
            '@' => Some(Token::At),
            '|' => Some(Token::Pipe),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '=' => Some(Token::Equality),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match c {
            '\'' | '"' => {
                let close = self.chars[self.pos + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or("unterminated string literal")?;
                self.pos += close + 2;
                Ok(Token::Literal)
            }
            '0'..='9' => {
                self.skip_number();
                Ok(Token::Number)
            }
            '.' => match self.peek_at(1) {
                Some('.') => {
                    self.pos += 2;
                    Ok(Token::DotDot)
                }
                Some(d) if d.is_ascii_digit() => {
                    self.skip_number();
                    Ok(Token::Number)
                }
                _ => {
                    self.pos += 1;
                    Ok(Token::Dot)
                }
            },
            '/' => {
                if self.peek_at(1) == Some('/') {
                    self.pos += 2;
                    Ok(Token::DoubleSlash)
                } else {
                    self.pos += 1;
                    Ok(Token::Slash)
                }
            }
            '!' => {
                if self.peek_at(1) != Some('=') {
                    return Err("expected '=' after '!'".into());
                }
                self.pos += 2;
                Ok(Token::Equality)
            }
            '<' | '>' => {
                self.pos += 1;
                if self.peek_at(0) == Some('=') {
                    self.pos += 1;
                }
                Ok(Token::Relational)
            }
            ':' => {
                if self.peek_at(1) != Some(':') {
                    return Err("unexpected ':'".into());
                }
                self.pos += 2;
                Ok(Token::ColonColon)
            }
            '*' => {
                self.pos += 1;
                if self.operator_expected() {
                    Ok(Token::Multiply)
                } else {
                    Ok(Token::NameTest)
                }
            }
            '$' => {
                self.pos += 1;
                if !self.peek_at(0).is_some_and(is_name_start) {
                    return Err("expected a variable name after '$'".into());
                }
                self.skip_ncname();
                if self.peek_at(0) == Some(':') && self.peek_at(1).is_some_and(is_name_start) {
                    self.pos += 1;
                    self.skip_ncname();
                }
                Ok(Token::Variable)
            }
            c if is_name_start(c) => self.name(),
            other => Err(format!("unexpected character '{other}'")),
        }
    }

    fn skip_number(&mut self) {
        while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek_at(0) == Some('.') {
            self.pos += 1;
            while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
    }

    fn skip_ncname(&mut self) -> String {
        let start = self.pos;
        while self.peek_at(0).is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn name(&mut self) -> Result<Token, String> {
        let name = self.skip_ncname();

        if self.operator_expected() {
            return match name.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "div" => Ok(Token::Div),
                "mod" => Ok(Token::Mod),
                _ => Err(format!("expected an operator before '{name}'")),
            };
        }

        let mut prefixed = false;
        if self.peek_at(0) == Some(':') && self.peek_at(1) != Some(':') {
            self.pos += 1;
            match self.peek_at(0) {
                Some('*') => {
                    self.pos += 1;
                    return Ok(Token::NameTest);
                }
                Some(c) if is_name_start(c) => {
                    self.skip_ncname();
                    prefixed = true;
                }
                _ => return Err(format!("incomplete qualified name '{name}:'")),
            }
        }

        match self.next_non_space() {
            (Some('('), _) if !prefixed && NODE_TYPES.contains(&name.as_str()) => {
                Ok(Token::NodeType(name))
            }
            (Some('('), _) => Ok(Token::FunctionName),
            (Some(':'), Some(':')) => {
                if prefixed || !AXES.contains(&name.as_str()) {
                    return Err(format!("unknown axis '{name}'"));
                }
                Ok(Token::AxisName)
            }
            _ => {
                // A bare operator word only names an element inside a path.
                let in_path = matches!(
                    self.tokens.last(),
                    Some(Token::Slash | Token::DoubleSlash | Token::At | Token::ColonColon)
                );
                if !prefixed && !in_path && OPERATOR_NAMES.contains(&name.as_str()) {
                    return Err(format!("operator '{name}' where an operand is expected"));
                }
                Ok(Token::NameTest)
            }
        }
    }
}

type Parsed = Result<(), String>;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Parsed {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(token.describe()))
        }
    }

    fn unexpected(&self, wanted: &str) -> String {
        match self.peek() {
            Some(found) => format!("expected {wanted}, found {}", found.describe()),
            None => format!("expected {wanted} at end of expression"),
        }
    }

    fn binary(&mut self, operand: fn(&mut Self) -> Parsed, is_op: fn(&Token) -> bool) -> Parsed {
        operand(self)?;
        while self.peek().is_some_and(is_op) {
            self.pos += 1;
            operand(self)?;
        }
        Ok(())
    }

    fn expr(&mut self) -> Parsed {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("expression nested too deeply".into());
        }
        let result = self.or_expr();
        self.depth -= 1;
        result
    }

    fn or_expr(&mut self) -> Parsed {
        self.binary(Self::and_expr, |t| *t == Token::Or)
    }

    fn and_expr(&mut self) -> Parsed {
        self.binary(Self::equality_expr, |t| *t == Token::And)
    }

    fn equality_expr(&mut self) -> Parsed {
        self.binary(Self::relational_expr, |t| *t == Token::Equality)
    }

    fn relational_expr(&mut self) -> Parsed {
        self.binary(Self::additive_expr, |t| *t == Token::Relational)
    }

    fn additive_expr(&mut self) -> Parsed {
        self.binary(Self::multiplicative_expr, |t| {
            matches!(t, Token::Plus | Token::Minus)
        })
    }

    fn multiplicative_expr(&mut self) -> Parsed {
        self.binary(Self::unary_expr, |t| {
            matches!(t, Token::Multiply | Token::Div | Token::Mod)
        })
    }

    fn unary_expr(&mut self) -> Parsed {
        while self.eat(&Token::Minus) {}
        self.union_expr()
    }

    fn union_expr(&mut self) -> Parsed {
        self.binary(Self::path_expr, |t| *t == Token::Pipe)
    }

    fn path_expr(&mut self) -> Parsed {
        match self.peek() {
            Some(
                Token::Variable
                | Token::LParen
                | Token::Literal
                | Token::Number
                | Token::FunctionName,
            ) => {
                self.primary_expr()?;
                self.predicates()?;
                if matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
                    self.pos += 1;
                    self.relative_location_path()?;
                }
                Ok(())
            }
            Some(Token::Slash) => {
                self.pos += 1;
                if self.peek().is_some_and(Token::starts_step) {
                    self.relative_location_path()?;
                }
                Ok(())
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                self.relative_location_path()
            }
            _ => self.relative_location_path(),
        }
    }

    fn primary_expr(&mut self) -> Parsed {
        match self.peek() {
            Some(Token::Variable | Token::Literal | Token::Number) => {
                self.pos += 1;
                Ok(())
            }
            Some(Token::LParen) => {
                self.pos += 1;
                self.expr()?;
                self.expect(&Token::RParen)
            }
            Some(Token::FunctionName) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                if self.eat(&Token::RParen) {
                    return Ok(());
                }
                self.expr()?;
                while self.eat(&Token::Comma) {
                    self.expr()?;
                }
                self.expect(&Token::RParen)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn predicates(&mut self) -> Parsed {
        while self.eat(&Token::LBracket) {
            self.expr()?;
            self.expect(&Token::RBracket)?;
        }
        Ok(())
    }

    fn relative_location_path(&mut self) -> Parsed {
        self.step()?;
        while matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
            self.pos += 1;
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Parsed {
        match self.peek() {
            Some(Token::Dot | Token::DotDot) => {
                self.pos += 1;
                return Ok(());
            }
            Some(Token::AxisName) => {
                self.pos += 1;
                self.expect(&Token::ColonColon)?;
            }
            Some(Token::At) => self.pos += 1,
            _ => {}
        }
        self.node_test()?;
        self.predicates()
    }

    fn node_test(&mut self) -> Parsed {
        let processing_instruction = match self.peek() {
            Some(Token::NameTest) => {
                self.pos += 1;
                return Ok(());
            }
            Some(Token::NodeType(name)) => name == "processing-instruction",
            _ => return Err(self.unexpected("a location step")),
        };
        self.pos += 1;
        self.expect(&Token::LParen)?;
        if processing_instruction {
            self.eat(&Token::Literal);
        }
        self.expect(&Token::RParen)
    }
}
