//! Glass cutting formula evaluator
//!
//! Evaluates the small arithmetic language quotation templates use to derive
//! glass sizes from window sizes, e.g. `(W - 4.75) / 2`: numbers, variables,
//! `+ - * /` (also `×`, `÷` and `−`), unary minus and parentheses, with the
//! usual precedence and left associativity.
//!
//! `evalexpr` builds the operator tree. Its language is much wider than
//! ours, so the source is first checked character by character (which also
//! gives syntax errors a position) and the tree is then lowered into
//! our own `Expr`, refusing every operator and value outside the language. All
//! arithmetic is done in [`Decimal`] so that values such as `21.625` come
//! out exact.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use evalexpr::{Node, Operator, Value};
use rust_decimal::Decimal;

use crate::error::FormulaError;

/// Deepest parenthesis / unary nesting accepted before parsing gives up
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_operator(operator: &Operator) -> Option<Self> {
        match operator {
            Operator::Add => Some(BinaryOp::Add),
            Operator::Sub => Some(BinaryOp::Sub),
            Operator::Mul => Some(BinaryOp::Mul),
            Operator::Div => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(Decimal),
    Variable(String),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// A parsed formula, reusable across many evaluations
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    root: Expr,
}

impl Formula {
    /// Parse an expression, rejecting anything outside the formula language
    pub fn parse(expression: &str) -> Result<Self, FormulaError> {
        let normalized = normalize(expression)?;
        let tree = evalexpr::build_operator_tree(&normalized)
            .map_err(|err| syntax_error(expression, None, err.to_string()))?;
        let root = lower(expression, &tree, 0)?;

        Ok(Self {
            source: expression.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names the formula references, sorted
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        collect_variables(&self.root, &mut names);
        names
    }

    /// Evaluate with the given bindings.
    ///
    /// Every referenced variable must be bound; that is checked before any
    /// arithmetic runs, so an unbound name is reported even when a division
    /// by zero would also occur.
    pub fn evaluate(&self, bindings: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
        if let Some(name) = self.variables().into_iter().find(|n| !bindings.contains_key(n)) {
            return Err(FormulaError::UnknownVariable {
                expression: self.source.clone(),
                name,
            });
        }
        self.eval_node(&self.root, bindings)
    }

    fn eval_node(&self, node: &Expr, bindings: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
        match node {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => {
                bindings
                    .get(name)
                    .copied()
                    .ok_or_else(|| FormulaError::UnknownVariable {
                        expression: self.source.clone(),
                        name: name.clone(),
                    })
            }
            Expr::Neg(inner) => Ok(-self.eval_node(inner, bindings)?),
            Expr::Binary { op, lhs, rhs } => {
                let left = self.eval_node(lhs, bindings)?;
                let right = self.eval_node(rhs, bindings)?;
                let result = match op {
                    BinaryOp::Add => left.checked_add(right),
                    BinaryOp::Sub => left.checked_sub(right),
                    BinaryOp::Mul => left.checked_mul(right),
                    BinaryOp::Div => {
                        if right.is_zero() {
                            return Err(FormulaError::DivisionByZero {
                                expression: self.source.clone(),
                            });
                        }
                        left.checked_div(right)
                    }
                };
                result.ok_or_else(|| FormulaError::Overflow {
                    expression: self.source.clone(),
                })
            }
        }
    }
}

/// Parse and evaluate `expression` in one step
pub fn evaluate(expression: &str, bindings: &HashMap<String, Decimal>) -> Result<Decimal, FormulaError> {
    Formula::parse(expression)?.evaluate(bindings)
}

/// Check a formula before it is stored on a quotation template.
///
/// Parses the expression and confirms it only references `allowed` names.
pub fn validate_formula(expression: &str, allowed: &[&str]) -> Result<Formula, FormulaError> {
    let formula = Formula::parse(expression)?;
    if let Some(name) = formula
        .variables()
        .into_iter()
        .find(|n| !allowed.contains(&n.as_str()))
    {
        return Err(FormulaError::UnknownVariable {
            expression: expression.to_string(),
            name,
        });
    }
    Ok(formula)
}

fn collect_variables(node: &Expr, names: &mut BTreeSet<String>) {
    match node {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            names.insert(name.clone());
        }
        Expr::Neg(inner) => collect_variables(inner, names),
        Expr::Binary { lhs, rhs, .. } => {
            collect_variables(lhs, names);
            collect_variables(rhs, names);
        }
    }
}

fn syntax_error(expression: &str, position: Option<usize>, message: impl Into<String>) -> FormulaError {
    FormulaError::Syntax {
        expression: expression.to_string(),
        position,
        message: message.into(),
    }
}

/// Check the characters of `expression` and rewrite it for the tree builder.
///
/// Tokens come back separated by single spaces with typographic operators
/// replaced by ASCII ones, so `evalexpr` can neither glue two tokens into one
/// identifier nor read `//` as a comment.
fn normalize(expression: &str) -> Result<String, FormulaError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut tokens: Vec<String> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {}
            '+' | '-' | '*' | '/' => tokens.push(c.to_string()),
            '\u{2212}' => tokens.push("-".to_string()),
            '\u{00D7}' => tokens.push("*".to_string()),
            '\u{00F7}' => tokens.push("/".to_string()),
            '(' => {
                open.push(start);
                if open.len() > MAX_DEPTH {
                    return Err(syntax_error(expression, Some(start), "expression is nested too deeply"));
                }
                tokens.push("(".to_string());
            }
            ')' => {
                if open.pop().is_none() {
                    return Err(syntax_error(expression, Some(start), "unbalanced ')'"));
                }
                tokens.push(")".to_string());
            }
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let glued = chars.get(i).is_some_and(|next| next.is_alphanumeric() || *next == '_');
                if glued || Decimal::from_str(&literal).is_err() {
                    return Err(syntax_error(
                        expression,
                        Some(start),
                        format!("invalid number starting '{}'", literal),
                    ));
                }
                tokens.push(literal);
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(chars[start..i].iter().collect());
                continue;
            }
            other => {
                return Err(syntax_error(
                    expression,
                    Some(start),
                    format!("invalid character '{}'", other),
                ))
            }
        }
        i += 1;
    }

    if let Some(&position) = open.last() {
        return Err(syntax_error(expression, Some(position), "unbalanced '(' is never closed"));
    }
    if tokens.is_empty() {
        return Err(syntax_error(expression, Some(0), "expression is empty"));
    }
    Ok(tokens.join(" "))
}

/// Lower an `evalexpr` tree into `Expr`
fn lower(expression: &str, node: &Node, depth: usize) -> Result<Expr, FormulaError> {
    if depth > MAX_DEPTH {
        return Err(syntax_error(expression, None, "expression is nested too deeply"));
    }

    let operator = node.operator();
    let operands = node.children();

    if let Some(op) = BinaryOp::from_operator(operator) {
        let [lhs, rhs] = operands else {
            return Err(syntax_error(expression, None, format!("'{}' needs two operands", operator)));
        };
        return Ok(Expr::Binary {
            op,
            lhs: Box::new(lower(expression, lhs, depth + 1)?),
            rhs: Box::new(lower(expression, rhs, depth + 1)?),
        });
    }

    match operator {
        // The root of the tree, and every parenthesised group below it
        Operator::RootNode => match operands {
            [inner] => lower(expression, inner, depth + 1),
            [] if depth == 0 => Err(syntax_error(expression, Some(0), "expression is empty")),
            [] => Err(syntax_error(expression, None, "empty parentheses")),
            _ => Err(syntax_error(expression, None, "operands without an operator between them")),
        },
        Operator::Neg => match operands {
            [inner] => Ok(Expr::Neg(Box::new(lower(expression, inner, depth + 1)?))),
            _ => Err(syntax_error(expression, None, "'-' needs an operand")),
        },
        Operator::Const { value } => literal(expression, value).map(Expr::Number),
        Operator::VariableIdentifierRead { identifier } => Ok(Expr::Variable(identifier.clone())),
        Operator::FunctionIdentifier { identifier } => Err(syntax_error(
            expression,
            None,
            format!("'{}' is followed by a value without an operator", identifier),
        )),
        other => Err(syntax_error(expression, None, format!("unsupported operator '{}'", other))),
    }
}

/// Decimal value of a numeric literal, taken from its string form
fn literal(expression: &str, value: &Value) -> Result<Decimal, FormulaError> {
    match value {
        Value::Int(n) => Ok(Decimal::from(*n)),
        Value::Float(_) => Decimal::from_str(&value.to_string()).map_err(|_| FormulaError::Overflow {
            expression: expression.to_string(),
        }),
        other => Err(syntax_error(expression, None, format!("unsupported value {}", other))),
    }
}
