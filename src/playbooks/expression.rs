//! Condition expression grammar.
//!
//! Conditions are evaluated with read-only access to the context variables and
//! nothing else: no assignment, no access to the host environment, and only the
//! fixed set of pure functions in [`FUNCTIONS`].
//!
//! ```text
//! or         := and (("or" | "||") and)*
//! and        := not (("and" | "&&") not)*
//! not        := ("not" | "!") not | comparison
//! comparison := additive (compare_op additive)*
//! compare_op := "==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "not" "in"
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/" | "%") unary)*
//! unary      := "-" unary | postfix
//! postfix    := primary ("." IDENT | "[" or "]")*
//! primary    := NUMBER | STRING | "true" | "false" | "null" | IDENT
//!             | IDENT "(" args ")" | "(" or ")" | "[" args "]"
//! ```
//!
//! `True`/`False`/`None` are accepted as aliases. Comparisons chain like
//! `1 < x < 10`.

use crate::error::{AppError, Result};
use serde_json::{Map, Number, Value as JsonValue};

use super::template::display_value;

/// Functions callable from a condition
pub const FUNCTIONS: &[(&str, usize)] = &[
    ("len", 1),
    ("lower", 1),
    ("upper", 1),
    ("str", 1),
    ("int", 1),
    ("float", 1),
    ("starts_with", 2),
    ("ends_with", 2),
];

/// Parse and evaluate `source`, reducing the result by truthiness
pub fn evaluate_condition(source: &str, variables: &Map<String, JsonValue>) -> Result<bool> {
    Expression::parse(source)?.evaluate_bool(variables)
}

/// Truthiness: null, false, zero, and empty strings/lists/objects are false
pub fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// A parsed condition
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Expr,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(fail("empty expression"));
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(fail(format!("unexpected token {:?}", token)));
        }

        Ok(Self { root })
    }

    pub fn evaluate(&self, variables: &Map<String, JsonValue>) -> Result<JsonValue> {
        eval(&self.root, variables)
    }

    pub fn evaluate_bool(&self, variables: &Map<String, JsonValue>) -> Result<bool> {
        self.evaluate(variables).map(|value| is_truthy(&value))
    }
}

fn fail(message: impl Into<String>) -> AppError {
    AppError::ConditionEvaluation(message.into())
}

// ==================== Lexer ====================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(JsonValue),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let mut is_float = false;
                if i < chars.len() && chars[i] == '.' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) {
                    is_float = true;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(parse_number(&text, is_float)?));
                continue;
            }
            '"' | '\'' => {
                let (literal, end) = read_string(&chars, i)?;
                tokens.push(Token::Str(literal));
                i = end;
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "true" | "True" => Token::True,
                    "false" | "False" => Token::False,
                    "null" | "None" => Token::Null,
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                });
                continue;
            }
            _ => {}
        }

        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('!', _) => (Token::Not, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('=', _) => return Err(fail("assignment is not allowed in conditions")),
            _ => return Err(fail(format!("unexpected character '{}'", c))),
        };
        tokens.push(token);
        i += width;
    }

    Ok(tokens)
}

fn parse_number(text: &str, is_float: bool) -> Result<JsonValue> {
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(JsonValue::Number(i.into()));
        }
    }
    let f: f64 = text
        .parse()
        .map_err(|_| fail(format!("invalid number '{}'", text)))?;
    float_value(f)
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| fail("unterminated string literal"))?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(fail("unterminated string literal"))
}

// ==================== Parser ====================

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(JsonValue),
    Variable(String),
    List(Vec<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
    Negate(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Arithmetic(ArithOp, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CompareOp, Expr)>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// Maximum depth of the parsed tree, counting nesting and operator chains
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(fail(format!(
                "expected {:?}, found {:?}",
                expected,
                self.peek()
            )))
        }
    }

    /// Enter one more level of the tree; evaluation recurses once per level
    fn descend(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(fail("expression nested too deeply"));
        }
        Ok(())
    }

    fn ascend(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        let mut chain = 0;
        while self.eat(&Token::Or) {
            self.descend()?;
            chain += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        self.ascend(chain);
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        let mut chain = 0;
        while self.eat(&Token::And) {
            self.descend()?;
            chain += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        self.ascend(chain);
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat(&Token::Not) {
            self.descend()?;
            let operand = self.parse_not()?;
            self.ascend(1);
            return Ok(Expr::Not(Box::new(operand)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_additive()?;
        let mut rest = Vec::new();

        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::Ne) => CompareOp::Ne,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                Some(Token::In) => CompareOp::In,
                Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                    self.pos += 1;
                    CompareOp::NotIn
                }
                _ => break,
            };
            self.pos += 1;
            rest.push((op, self.parse_additive()?));
        }

        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        let mut chain = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            chain += 1;
            let right = self.parse_term()?;
            left = Expr::Arithmetic(op, Box::new(left), Box::new(right));
        }
        self.ascend(chain);
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        let mut chain = 0;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => ArithOp::Mul,
                Some(Token::Slash) => ArithOp::Div,
                Some(Token::Percent) => ArithOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.descend()?;
            chain += 1;
            let right = self.parse_unary()?;
            left = Expr::Arithmetic(op, Box::new(left), Box::new(right));
        }
        self.ascend(chain);
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            self.descend()?;
            let operand = self.parse_unary()?;
            self.ascend(1);
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        let mut chain = 0;
        loop {
            if self.eat(&Token::Dot) {
                self.descend()?;
                chain += 1;
                match self.advance() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    other => return Err(fail(format!("expected attribute name, found {:?}", other))),
                }
            } else if self.eat(&Token::LBracket) {
                self.descend()?;
                chain += 1;
                let index = self.parse_or()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.ascend(chain);
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(n)),
            Some(Token::Str(s)) => Ok(Expr::Literal(JsonValue::String(s))),
            Some(Token::True) => Ok(Expr::Literal(JsonValue::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(JsonValue::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(JsonValue::Null)),
            Some(Token::LParen) => {
                self.descend()?;
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                self.ascend(1);
                Ok(inner)
            }
            Some(Token::LBracket) => {
                self.descend()?;
                let items = self.parse_args(Token::RBracket)?;
                self.ascend(1);
                Ok(Expr::List(items))
            }
            Some(Token::Ident(name)) => {
                if self.eat(&Token::LParen) {
                    self.descend()?;
                    let args = self.parse_args(Token::RParen)?;
                    self.ascend(1);
                    check_function(&name, args.len())?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Variable(name))
                }
            }
            Some(token) => Err(fail(format!("unexpected token {:?}", token))),
            None => Err(fail("unexpected end of expression")),
        }
    }

    /// Comma-separated expressions up to `close`; the opening token is already consumed
    fn parse_args(&mut self, close: Token) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma)?;
        }
    }
}

fn check_function(name: &str, arity: usize) -> Result<()> {
    match FUNCTIONS.iter().find(|(candidate, _)| *candidate == name) {
        Some((_, expected)) if *expected == arity => Ok(()),
        Some((_, expected)) => Err(fail(format!(
            "{}() takes {} argument(s), {} given",
            name, expected, arity
        ))),
        None => Err(fail(format!("function '{}' is not allowed", name))),
    }
}

// ==================== Evaluator ====================

fn eval(expr: &Expr, vars: &Map<String, JsonValue>) -> Result<JsonValue> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| fail(format!("name '{}' is not defined", name))),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, vars))
            .collect::<Result<Vec<_>>>()
            .map(JsonValue::Array),
        Expr::Member(target, name) => {
            let target = eval(target, vars)?;
            match target {
                JsonValue::Object(map) => map
                    .get(name)
                    .cloned()
                    .ok_or_else(|| fail(format!("key '{}' not found", name))),
                other => Err(fail(format!(
                    "cannot read attribute '{}' of {}",
                    name,
                    type_name(&other)
                ))),
            }
        }
        Expr::Index(target, index) => {
            let target = eval(target, vars)?;
            let index = eval(index, vars)?;
            index_value(&target, &index)
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, vars))
                .collect::<Result<Vec<_>>>()?;
            call_function(name, &args)
        }
        Expr::Negate(operand) => match eval(operand, vars)? {
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => match i.checked_neg() {
                    Some(negated) => Ok(JsonValue::from(negated)),
                    None => float_value(-(i as f64)),
                },
                None => float_value(-n.as_f64().unwrap_or_default()),
            },
            other => Err(fail(format!("bad operand type for unary -: {}", type_name(&other)))),
        },
        Expr::Not(operand) => Ok(JsonValue::Bool(!is_truthy(&eval(operand, vars)?))),
        Expr::And(left, right) => {
            if !is_truthy(&eval(left, vars)?) {
                return Ok(JsonValue::Bool(false));
            }
            Ok(JsonValue::Bool(is_truthy(&eval(right, vars)?)))
        }
        Expr::Or(left, right) => {
            if is_truthy(&eval(left, vars)?) {
                return Ok(JsonValue::Bool(true));
            }
            Ok(JsonValue::Bool(is_truthy(&eval(right, vars)?)))
        }
        Expr::Arithmetic(op, left, right) => {
            let left = eval(left, vars)?;
            let right = eval(right, vars)?;
            arithmetic(*op, &left, &right)
        }
        Expr::Compare(first, rest) => {
            let mut left = eval(first, vars)?;
            for (op, rhs) in rest {
                let right = eval(rhs, vars)?;
                if !compare(*op, &left, &right)? {
                    return Ok(JsonValue::Bool(false));
                }
                left = right;
            }
            Ok(JsonValue::Bool(true))
        }
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

fn float_value(f: f64) -> Result<JsonValue> {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or_else(|| fail("result is not a finite number"))
}

fn index_value(target: &JsonValue, index: &JsonValue) -> Result<JsonValue> {
    match (target, index) {
        (JsonValue::Object(map), JsonValue::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| fail(format!("key '{}' not found", key))),
        (JsonValue::Array(items), JsonValue::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| fail("list indices must be integers"))?;
            let len = items.len() as i64;
            let position = if i < 0 { len + i } else { i };
            if (0..len).contains(&position) {
                Ok(items[position as usize].clone())
            } else {
                Err(fail("list index out of range"))
            }
        }
        (target, index) => Err(fail(format!(
            "cannot index {} with {}",
            type_name(target),
            type_name(index)
        ))),
    }
}

fn arithmetic(op: ArithOp, left: &JsonValue, right: &JsonValue) -> Result<JsonValue> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
                let exact = match op {
                    ArithOp::Add => a.checked_add(b),
                    ArithOp::Sub => a.checked_sub(b),
                    ArithOp::Mul => a.checked_mul(b),
                    ArithOp::Rem if b == 0 => return Err(fail("integer modulo by zero")),
                    ArithOp::Rem => a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r }),
                    ArithOp::Div => None,
                };
                if let Some(result) = exact {
                    return Ok(JsonValue::from(result));
                }
            }

            let (a, b) = (a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default());
            let result = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div | ArithOp::Rem if b == 0.0 => return Err(fail("division by zero")),
                ArithOp::Div => a / b,
                ArithOp::Rem => a - b * (a / b).floor(),
            };
            float_value(result)
        }
        (JsonValue::String(a), JsonValue::String(b)) if op == ArithOp::Add => {
            Ok(JsonValue::String(format!("{}{}", a, b)))
        }
        (JsonValue::Array(a), JsonValue::Array(b)) if op == ArithOp::Add => {
            Ok(JsonValue::Array(a.iter().chain(b).cloned().collect()))
        }
        _ => Err(fail(format!(
            "unsupported operand types for {:?}: {} and {}",
            op,
            type_name(left),
            type_name(right)
        ))),
    }
}

fn values_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a == b,
            _ => a.as_f64() == b.as_f64(),
        },
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (JsonValue::Object(a), JsonValue::Object(b)) => {
            a.len() == b.len()
                && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| values_equal(v, w)))
        }
        _ => left == right,
    }
}

fn compare(op: CompareOp, left: &JsonValue, right: &JsonValue) -> Result<bool> {
    use std::cmp::Ordering;

    let ordering = |left: &JsonValue, right: &JsonValue| -> Result<Ordering> {
        match (left, right) {
            (JsonValue::Number(a), JsonValue::Number(b)) => {
                let ordering = match (a.as_i64(), b.as_i64()) {
                    (Some(a), Some(b)) => Some(a.cmp(&b)),
                    _ => a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b)),
                };
                ordering.ok_or_else(|| fail("numbers are not comparable"))
            }
            (JsonValue::String(a), JsonValue::String(b)) => Ok(a.cmp(b)),
            _ => Err(fail(format!(
                "ordering not supported between {} and {}",
                type_name(left),
                type_name(right)
            ))),
        }
    };

    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::Ne => Ok(!values_equal(left, right)),
        CompareOp::Lt => Ok(ordering(left, right)? == Ordering::Less),
        CompareOp::Le => Ok(ordering(left, right)? != Ordering::Greater),
        CompareOp::Gt => Ok(ordering(left, right)? == Ordering::Greater),
        CompareOp::Ge => Ok(ordering(left, right)? != Ordering::Less),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
    }
}

fn contains(container: &JsonValue, item: &JsonValue) -> Result<bool> {
    match (container, item) {
        (JsonValue::String(haystack), JsonValue::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (JsonValue::Array(items), item) => Ok(items.iter().any(|candidate| values_equal(candidate, item))),
        (JsonValue::Object(map), JsonValue::String(key)) => Ok(map.contains_key(key)),
        _ => Err(fail(format!(
            "'in' not supported between {} and {}",
            type_name(item),
            type_name(container)
        ))),
    }
}

fn call_function(name: &str, args: &[JsonValue]) -> Result<JsonValue> {
    let string_arg = |i: usize| -> Result<&str> {
        args[i]
            .as_str()
            .ok_or_else(|| fail(format!("{}() expects a string, got {}", name, type_name(&args[i]))))
    };

    match name {
        "len" => match &args[0] {
            JsonValue::String(s) => Ok(JsonValue::from(s.chars().count())),
            JsonValue::Array(a) => Ok(JsonValue::from(a.len())),
            JsonValue::Object(o) => Ok(JsonValue::from(o.len())),
            other => Err(fail(format!("object of type {} has no len()", type_name(other)))),
        },
        "lower" => Ok(JsonValue::String(string_arg(0)?.to_lowercase())),
        "upper" => Ok(JsonValue::String(string_arg(0)?.to_uppercase())),
        "str" => Ok(JsonValue::String(display_value(&args[0]))),
        "int" => match &args[0] {
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(JsonValue::from(i)),
                None => Ok(JsonValue::from(n.as_f64().unwrap_or_default().trunc() as i64)),
            },
            JsonValue::Bool(b) => Ok(JsonValue::from(*b as i64)),
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|_| fail(format!("invalid literal for int(): '{}'", s))),
            other => Err(fail(format!("int() argument must be a string or number, not {}", type_name(other)))),
        },
        "float" => match &args[0] {
            JsonValue::Number(n) => float_value(n.as_f64().unwrap_or_default()),
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| fail(format!("could not convert string to float: '{}'", s)))
                .and_then(float_value),
            other => Err(fail(format!("float() argument must be a string or number, not {}", type_name(other)))),
        },
        "starts_with" => Ok(JsonValue::Bool(string_arg(0)?.starts_with(string_arg(1)?))),
        "ends_with" => Ok(JsonValue::Bool(string_arg(0)?.ends_with(string_arg(1)?))),
        _ => Err(fail(format!("function '{}' is not allowed", name))),
    }
}
