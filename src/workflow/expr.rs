//! Restricted expression interpreter.
//!
//! Condition, filter and transform nodes accept user-authored
//! expressions. Instead of handing those to a dynamic code evaluator,
//! a small closed grammar is parsed and interpreted here: literals,
//! dot-path references resolved against a JSON scope, unary `!`/`-`,
//! arithmetic, comparisons and logical `&&`/`||`. Anything outside the
//! grammar is a parse error, which callers treat as a false/passthrough
//! result rather than failing the run.

use serde_json::{Number, Value};

use crate::{NodeflowError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    // operators
    Not,
    Neg,
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Gt,
    Ge,
    Lt,
    Le,
    EqStrict,
    NeStrict,
    Eq,
    Ne,
    And,
    Or,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Mul);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Div);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Rem);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Add);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Sub);
                i += 1;
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'=') {
                    tokens.push(Token::EqStrict);
                    i += 3;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(NodeflowError::Expression("assignment is not allowed in expressions".to_string()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'=') {
                    tokens.push(Token::NeStrict);
                    i += 3;
                } else if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    tokens.push(Token::And);
                    i += 2;
                } else {
                    return Err(NodeflowError::Expression("unexpected '&'".to_string()));
                }
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    tokens.push(Token::Or);
                    i += 2;
                } else {
                    return Err(NodeflowError::Expression("unexpected '|'".to_string()));
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(NodeflowError::Expression("unterminated string literal".to_string()));
                }
                i += 1;
                tokens.push(Token::Str(s));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text.parse::<f64>().map_err(|_| NodeflowError::Expression(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            _ if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$' || chars[i] == '.') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                match ident.as_str() {
                    "true" => tokens.push(Token::True),
                    "false" => tokens.push(Token::False),
                    "null" => tokens.push(Token::Null),
                    _ => tokens.push(Token::Ident(ident)),
                }
            }
            _ => return Err(NodeflowError::Expression(format!("unexpected character '{}'", c))),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Path(String),
    Unary(Token, Box<Expr>),
    Binary(Token, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expr(
        &mut self,
        min_prec: u8,
    ) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;

        while let Some(op) = self.peek().cloned() {
            let prec = match op {
                Token::Mul | Token::Div | Token::Rem => 5,
                Token::Add | Token::Sub => 4,
                Token::Gt | Token::Ge | Token::Lt | Token::Le => 3,
                Token::Eq | Token::Ne | Token::EqStrict | Token::NeStrict => 2,
                Token::And => 1,
                Token::Or => 0,
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            self.next();
            let rhs = self.parse_expr(prec + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Not) => {
                self.next();
                Ok(Expr::Unary(Token::Not, Box::new(self.parse_unary()?)))
            }
            Some(Token::Sub) => {
                self.next();
                Ok(Expr::Unary(Token::Neg, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(path)) => Ok(Expr::Path(path)),
            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(NodeflowError::Expression("expected ')'".to_string())),
                }
            }
            other => Err(NodeflowError::Expression(format!("unexpected token {:?}", other))),
        }
    }
}

fn number_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// JS-style truthiness: null, false, 0, NaN and "" are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Loose equality: numbers and numeric strings compare by value.
fn loose_eq(
    a: &Value,
    b: &Value,
) -> bool {
    if a == b {
        return true;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn resolve_scope_path(
    scope: &Value,
    path: &str,
) -> Value {
    let mut current = scope;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            // Missing paths evaluate to null, like an absent field
            None => return Value::Null,
        }
    }
    current.clone()
}

fn eval_expr(
    expr: &Expr,
    scope: &Value,
) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(path) => Ok(resolve_scope_path(scope, path)),
        Expr::Unary(op, inner) => {
            let value = eval_expr(inner, scope)?;
            match op {
                Token::Not => Ok(Value::Bool(!is_truthy(&value))),
                Token::Neg => {
                    let n = as_number(&value).ok_or_else(|| NodeflowError::Expression("cannot negate a non-number".to_string()))?;
                    Ok(number_value(-n))
                }
                _ => unreachable!(),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            // Short-circuit logical operators before evaluating the right side
            match op {
                Token::And => {
                    let left = eval_expr(lhs, scope)?;
                    if !is_truthy(&left) {
                        return Ok(Value::Bool(false));
                    }
                    return Ok(Value::Bool(is_truthy(&eval_expr(rhs, scope)?)));
                }
                Token::Or => {
                    let left = eval_expr(lhs, scope)?;
                    if is_truthy(&left) {
                        return Ok(Value::Bool(true));
                    }
                    return Ok(Value::Bool(is_truthy(&eval_expr(rhs, scope)?)));
                }
                _ => {}
            }

            let left = eval_expr(lhs, scope)?;
            let right = eval_expr(rhs, scope)?;
            match op {
                Token::Add => {
                    // String concatenation when either side is a string
                    if left.is_string() || right.is_string() {
                        let mut s = match &left {
                            Value::String(s) => s.clone(),
                            v => v.to_string(),
                        };
                        s.push_str(&match &right {
                            Value::String(s) => s.clone(),
                            v => v.to_string(),
                        });
                        return Ok(Value::String(s));
                    }
                    arith(&left, &right, |a, b| a + b)
                }
                Token::Sub => arith(&left, &right, |a, b| a - b),
                Token::Mul => arith(&left, &right, |a, b| a * b),
                Token::Div => arith(&left, &right, |a, b| a / b),
                Token::Rem => arith(&left, &right, |a, b| a % b),
                Token::Gt => cmp(&left, &right, |o| o == std::cmp::Ordering::Greater),
                Token::Ge => cmp(&left, &right, |o| o != std::cmp::Ordering::Less),
                Token::Lt => cmp(&left, &right, |o| o == std::cmp::Ordering::Less),
                Token::Le => cmp(&left, &right, |o| o != std::cmp::Ordering::Greater),
                Token::Eq => Ok(Value::Bool(loose_eq(&left, &right))),
                Token::Ne => Ok(Value::Bool(!loose_eq(&left, &right))),
                Token::EqStrict => Ok(Value::Bool(left == right)),
                Token::NeStrict => Ok(Value::Bool(left != right)),
                _ => unreachable!(),
            }
        }
    }
}

fn arith<F>(
    left: &Value,
    right: &Value,
    f: F,
) -> Result<Value>
where
    F: Fn(f64, f64) -> f64,
{
    match (as_number(left), as_number(right)) {
        (Some(a), Some(b)) => Ok(number_value(f(a, b))),
        _ => Err(NodeflowError::Expression("arithmetic on non-numeric values".to_string())),
    }
}

fn cmp<F>(
    left: &Value,
    right: &Value,
    f: F,
) -> Result<Value>
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    // Numbers compare numerically, strings lexicographically
    if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
        let ordering = a.partial_cmp(&b).ok_or_else(|| NodeflowError::Expression("incomparable numbers".to_string()))?;
        return Ok(Value::Bool(f(ordering)));
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(f(a.cmp(b)))),
        _ => Err(NodeflowError::Expression("cannot order non-comparable values".to_string())),
    }
}

/// Evaluates an expression against a JSON scope.
///
/// The scope is an object whose keys are addressable as dot paths:
/// per-item bindings (`$item`, `$index`, `$first`, `$last`) plus the
/// execution context snapshot.
pub fn evaluate(
    expression: &str,
    scope: &Value,
) -> Result<Value> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(NodeflowError::Expression("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
    };
    let expr = parser.parse_expr(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(NodeflowError::Expression("trailing input after expression".to_string()));
    }
    eval_expr(&expr, scope)
}

fn coerce_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        v => v.to_string(),
    }
}

/// Applies a structured comparison operator, as used by condition
/// nodes authored as `value1 operator value2`.
///
/// Operators: `===`, `==`, `!==`, `!=`, `>`, `>=`, `<`, `<=`,
/// `contains`, `startsWith`, `endsWith`, `matches` (where `value2` is a
/// regular expression tested against `value1`).
pub fn compare(
    operator: &str,
    value1: &Value,
    value2: &Value,
) -> Result<bool> {
    match operator {
        "===" => Ok(value1 == value2),
        "!==" => Ok(value1 != value2),
        "==" => Ok(loose_eq(value1, value2)),
        "!=" => Ok(!loose_eq(value1, value2)),
        ">" => cmp(value1, value2, |o| o == std::cmp::Ordering::Greater).map(|v| is_truthy(&v)),
        ">=" => cmp(value1, value2, |o| o != std::cmp::Ordering::Less).map(|v| is_truthy(&v)),
        "<" => cmp(value1, value2, |o| o == std::cmp::Ordering::Less).map(|v| is_truthy(&v)),
        "<=" => cmp(value1, value2, |o| o != std::cmp::Ordering::Greater).map(|v| is_truthy(&v)),
        "contains" => match value1 {
            Value::Array(arr) => Ok(arr.iter().any(|v| v == value2 || loose_eq(v, value2))),
            v => Ok(coerce_str(v).contains(&coerce_str(value2))),
        },
        "startsWith" => Ok(coerce_str(value1).starts_with(&coerce_str(value2))),
        "endsWith" => Ok(coerce_str(value1).ends_with(&coerce_str(value2))),
        "matches" => {
            let pattern = regex::Regex::new(&coerce_str(value2)).map_err(|e| NodeflowError::Expression(format!("invalid regex: {}", e)))?;
            Ok(pattern.is_match(&coerce_str(value1)))
        }
        other => Err(NodeflowError::Expression(format!("unknown comparison operator '{}'", other))),
    }
}

/// Evaluates an expression to a boolean, per `is_truthy`.
pub fn evaluate_bool(
    expression: &str,
    scope: &Value,
) -> Result<bool> {
    Ok(is_truthy(&evaluate(expression, scope)?))
}
