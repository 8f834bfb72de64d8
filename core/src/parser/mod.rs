//! PEST-based parser for procedure templates
//!
//! Produces the executor's AST, with span information for error reporting.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use serde::{Deserialize, Serialize};

use super::executor::types::ast::{BinaryOp, Expr, Span, Stmt, UnaryOp, VarKind};

pub mod semantic_validator;


/* ===================== Procedure Definition ===================== */

/// One `function* name(params) { ... }` template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureDef {
    pub name: String,
    pub params: Vec<String>,
    /// Procedure body (always a Block)
    pub body: Stmt,
    /// Source text of the whole definition
    pub source: String,
    /// Span of the definition within its file
    #[serde(default, skip_serializing_if = "is_default_span")]
    pub span: Span,
}

fn is_default_span(span: &Span) -> bool {
    *span == Span::default()
}

/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/procedure.pest"]
struct ProcedureParser;

/* ===================== Error Types ===================== */

#[derive(Debug)]
pub enum ParseError {
    PestError(String, Option<Span>),
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::PestError(msg, _) => write!(f, "{}", msg),
            ParseError::BuildError(msg, Some(span)) => write!(
                f,
                "{} at line {}, column {}",
                msg,
                span.start_line + 1,
                span.start_col + 1
            ),
            ParseError::BuildError(msg, None) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::PestError(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Line start offsets of a source text, computed once per parse
struct LineIndex<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> LineIndex<'s> {
    fn new(source: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, line_starts }
    }

    /// Convert byte offset to (line, column) - 0-indexed, column in chars
    fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let start = self.line_starts[line];
        let col = self.source.get(start..offset).map_or(0, |s| s.chars().count());
        (line, col)
    }
}

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, index: &LineIndex) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = index.line_col(start);
    let (end_line, end_col) = index.line_col(end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/* ===================== Pair Helpers ===================== */

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_function
            | Rule::kw_let
            | Rule::kw_const
            | Rule::kw_if
            | Rule::kw_else
            | Rule::kw_while
            | Rule::kw_for
            | Rule::kw_of
            | Rule::kw_try
            | Rule::kw_catch
            | Rule::kw_finally
            | Rule::kw_defer
            | Rule::kw_return
            | Rule::kw_throw
            | Rule::kw_break
            | Rule::kw_continue
            | Rule::kw_yield
            | Rule::kw_true
            | Rule::kw_false
            | Rule::kw_null
    )
}

/// Inner pairs of `pair`, without keyword tokens
fn significant<'a>(pair: Pair<'a, Rule>) -> impl Iterator<Item = Pair<'a, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

/// Next pair the grammar guarantees to be there
fn required<'a>(
    inner: &mut impl Iterator<Item = Pair<'a, Rule>>,
    what: &str,
    span: Span,
) -> ParseResult<Pair<'a, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Expected {}", what), Some(span)))
}

fn first_pair<'a>(mut pairs: Pairs<'a, Rule>, source: &str) -> ParseResult<Pair<'a, Rule>> {
    pairs.next().ok_or_else(|| {
        ParseError::BuildError(
            "Empty parse result".to_string(),
            Some(Span::new(0, source.len(), 0, 0, 0, 0)),
        )
    })
}

/* ===================== Public API ===================== */

/// Parse a template file into its procedure definitions
pub fn parse_procedures(source: &str) -> ParseResult<Vec<ProcedureDef>> {
    let program = first_pair(ProcedureParser::parse(Rule::program, source)?, source)?;
    let index = LineIndex::new(source);

    program
        .into_inner()
        .filter(|p| p.as_rule() == Rule::procedure)
        .map(|p| build_procedure(p, &index))
        .collect()
}

/// Parse bare statements into a Block (testing and tooling API)
pub fn parse(source: &str) -> ParseResult<Stmt> {
    let snippet = first_pair(ProcedureParser::parse(Rule::snippet, source)?, source)?;
    let index = LineIndex::new(source);
    let span = pair_to_span(&snippet, &index);

    let body = snippet
        .into_inner()
        .filter(|p| p.as_rule() == Rule::statement)
        .map(|p| build_statement(p, &index))
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(Stmt::Block { body, span })
}

/* ===================== AST Builder ===================== */

fn build_procedure(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<ProcedureDef> {
    let span = pair_to_span(&pair, source);
    let text = pair.as_str().to_string();
    let mut inner = significant(pair);

    let name = required(&mut inner, "procedure name", span)?.as_str().to_string();

    let mut params = Vec::new();
    let mut body = None;
    for p in inner {
        match p.as_rule() {
            Rule::param_list => {
                params = p.into_inner().map(|id| id.as_str().to_string()).collect();
            }
            Rule::block => body = Some(build_block(p, source)?),
            _ => {}
        }
    }

    let body = body.ok_or_else(|| {
        ParseError::BuildError(format!("Procedure '{}' has no body", name), Some(span))
    })?;

    for (i, param) in params.iter().enumerate() {
        if params[..i].contains(param) {
            return Err(ParseError::BuildError(
                format!("Duplicate parameter '{}' in procedure '{}'", param, name),
                Some(span),
            ));
        }
    }

    Ok(ProcedureDef {
        name,
        params,
        body,
        source: text,
        span,
    })
}

fn build_block(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let statements: Result<Vec<Stmt>, ParseError> = pair
        .into_inner()
        .map(|stmt_pair| build_statement(stmt_pair, source))
        .collect();

    Ok(Stmt::Block {
        body: statements?,
        span,
    })
}

fn build_var_kind(pair: &Pair<Rule>, source: &LineIndex) -> ParseResult<VarKind> {
    match pair.as_str() {
        "let" => Ok(VarKind::Let),
        "const" => Ok(VarKind::Const),
        other => Err(ParseError::BuildError(
            format!("Expected 'let' or 'const', got: {}", other),
            Some(pair_to_span(pair, source)),
        )),
    }
}

fn build_statement(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::statement => {
            let inner = required(&mut pair.into_inner(), "statement", span)?;
            build_statement(inner, source)
        }
        Rule::block => build_block(pair, source),
        Rule::declare_stmt => build_declare_stmt(pair, source),
        Rule::assign_stmt => {
            let mut inner = pair.into_inner();
            let name = required(&mut inner, "assignment target", span)?
                .as_str()
                .to_string();
            let value = build_expression(required(&mut inner, "assigned value", span)?, source)?;
            Ok(Stmt::Assign { name, value, span })
        }
        Rule::expr_stmt => {
            let expr = build_expression(required(&mut pair.into_inner(), "expression", span)?, source)?;
            Ok(Stmt::Expr { expr, span })
        }
        Rule::if_stmt => build_if_stmt(pair, source),
        Rule::while_stmt => {
            let mut inner = significant(pair);
            let test = build_expression(required(&mut inner, "loop condition", span)?, source)?;
            let body = build_statement(required(&mut inner, "loop body", span)?, source)?;
            Ok(Stmt::While {
                test,
                body: Box::new(body),
                span,
            })
        }
        Rule::for_of_stmt => build_for_of_stmt(pair, source),
        Rule::try_stmt => build_try_stmt(pair, source),
        Rule::defer_stmt => {
            let body = build_statement(required(&mut significant(pair), "deferred body", span)?, source)?;
            Ok(Stmt::Defer {
                body: Box::new(body),
                span,
            })
        }
        Rule::return_stmt => {
            let value = match significant(pair).next() {
                Some(expr_pair) => Some(build_expression(expr_pair, source)?),
                None => None,
            };
            Ok(Stmt::Return { value, span })
        }
        Rule::throw_stmt => {
            let value = build_expression(required(&mut significant(pair), "thrown value", span)?, source)?;
            Ok(Stmt::Throw { value, span })
        }
        Rule::break_stmt => Ok(Stmt::Break { span }),
        Rule::continue_stmt => Ok(Stmt::Continue { span }),
        _ => Err(ParseError::BuildError(
            format!("Unexpected statement rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_declare_stmt(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let var_kind = build_var_kind(&required(&mut inner, "'let' or 'const'", span)?, source)?;
    let name = required(&mut inner, "variable name", span)?.as_str().to_string();

    let init = match inner.next() {
        Some(expr_pair) => Some(build_expression(expr_pair, source)?),
        None => None,
    };

    if var_kind == VarKind::Const && init.is_none() {
        return Err(ParseError::BuildError(
            format!("Missing initializer in const declaration of '{}'", name),
            Some(span),
        ));
    }

    Ok(Stmt::Declare {
        var_kind,
        name,
        init,
        span,
    })
}

fn build_if_stmt(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let test = build_expression(required(&mut inner, "condition", span)?, source)?;
    let then_s = build_statement(required(&mut inner, "then branch", span)?, source)?;

    let else_s = match inner.next() {
        Some(else_clause) => {
            let else_inner = required(&mut significant(else_clause), "else branch", span)?;
            Some(Box::new(build_statement(else_inner, source)?))
        }
        None => None,
    };

    Ok(Stmt::If {
        test,
        then_s: Box::new(then_s),
        else_s,
        span,
    })
}

fn build_for_of_stmt(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let var_kind = build_var_kind(&required(&mut inner, "'let' or 'const'", span)?, source)?;
    let binding = required(&mut inner, "loop binding", span)?.as_str().to_string();
    let iterable = build_expression(required(&mut inner, "iterable", span)?, source)?;
    let body = build_statement(required(&mut inner, "loop body", span)?, source)?;

    Ok(Stmt::ForOf {
        var_kind,
        binding,
        iterable,
        body: Box::new(body),
        span,
    })
}

fn build_try_stmt(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Stmt> {
    let span = pair_to_span(&pair, source);
    let mut inner = significant(pair);

    let body = build_block(required(&mut inner, "try block", span)?, source)?;

    let mut catch_var = None;
    let mut catch_body = None;
    let mut finally_body = None;

    for clause in inner {
        match clause.as_rule() {
            Rule::catch_clause => {
                for p in significant(clause) {
                    match p.as_rule() {
                        Rule::identifier => catch_var = Some(p.as_str().to_string()),
                        Rule::block => catch_body = Some(Box::new(build_block(p, source)?)),
                        _ => {}
                    }
                }
            }
            Rule::finally_clause => {
                let block = required(&mut significant(clause), "finally block", span)?;
                finally_body = Some(Box::new(build_block(block, source)?));
            }
            _ => {}
        }
    }

    if catch_body.is_none() && finally_body.is_none() {
        return Err(ParseError::BuildError(
            "Missing catch or finally after try".to_string(),
            Some(span),
        ));
    }

    Ok(Stmt::Try {
        body: Box::new(body),
        catch_var,
        catch_body,
        finally_body,
        span,
    })
}

fn binary_op(rule: Rule) -> Option<BinaryOp> {
    Some(match rule {
        Rule::op_or => BinaryOp::Or,
        Rule::op_and => BinaryOp::And,
        Rule::op_eq => BinaryOp::Eq,
        Rule::op_ne => BinaryOp::Ne,
        Rule::op_lt => BinaryOp::Lt,
        Rule::op_lte => BinaryOp::Lte,
        Rule::op_gt => BinaryOp::Gt,
        Rule::op_gte => BinaryOp::Gte,
        Rule::op_add => BinaryOp::Add,
        Rule::op_sub => BinaryOp::Sub,
        Rule::op_mul => BinaryOp::Mul,
        Rule::op_div => BinaryOp::Div,
        Rule::op_mod => BinaryOp::Mod,
        _ => return None,
    })
}

/// Fold `operand (op operand)*` into a left-associative tree
fn build_binary_expr(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let mut left = build_expression(required(&mut inner, "operand", span)?, source)?;

    while let Some(op_pair) = inner.next() {
        let op = binary_op(op_pair.as_rule()).ok_or_else(|| {
            ParseError::BuildError(
                format!("Expected operator, got {:?}", op_pair.as_rule()),
                Some(pair_to_span(&op_pair, source)),
            )
        })?;

        let right_pair = inner.next().ok_or_else(|| {
            ParseError::BuildError("Missing right operand after operator".to_string(), Some(span))
        })?;
        let right = build_expression(right_pair, source)?;
        let new_span = left.span().merge(&right.span());

        left = Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: new_span,
        };
    }

    Ok(left)
}

fn build_expression(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression | Rule::primary | Rule::literal => {
            let inner = required(&mut pair.into_inner(), "expression", span)?;
            build_expression(inner, source)
        }
        Rule::yield_expr => {
            let value = match significant(pair).next() {
                Some(operand) => Some(Box::new(build_expression(operand, source)?)),
                None => None,
            };
            Ok(Expr::Yield { value, span })
        }
        Rule::logical_or
        | Rule::logical_and
        | Rule::equality
        | Rule::comparison
        | Rule::additive
        | Rule::multiplicative => build_binary_expr(pair, source),
        Rule::unary => {
            let mut inner = pair.into_inner();
            let first = required(&mut inner, "operand", span)?;
            let op = match first.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                _ => return build_expression(first, source),
            };
            let operand = build_expression(required(&mut inner, "operand", span)?, source)?;

            // Fold negative number literals
            if let (UnaryOp::Neg, Expr::LitNum { v, .. }) = (op, &operand) {
                return Ok(Expr::LitNum { v: -v, span });
            }

            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            })
        }
        Rule::postfix => {
            let mut inner = pair.into_inner();
            let mut expr = build_expression(required(&mut inner, "expression", span)?, source)?;

            for suffix in inner {
                let suffix_span = pair_to_span(&suffix, source);
                let new_span = expr.span().merge(&suffix_span);
                match suffix.as_rule() {
                    Rule::call_suffix => {
                        let args = match suffix.into_inner().next() {
                            Some(arg_list) => build_expression_list(arg_list, source)?,
                            None => vec![],
                        };
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            args,
                            span: new_span,
                        };
                    }
                    Rule::member_suffix => {
                        let property = required(&mut suffix.into_inner(), "property name", suffix_span)?
                            .as_str()
                            .to_string();
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property,
                            span: new_span,
                        };
                    }
                    other => {
                        return Err(ParseError::BuildError(
                            format!("Unexpected postfix rule: {:?}", other),
                            Some(suffix_span),
                        ))
                    }
                }
            }

            Ok(expr)
        }
        Rule::identifier => Ok(Expr::Ident {
            name: pair.as_str().to_string(),
            span,
        }),
        Rule::number => {
            let num_str = pair.as_str();
            let value = num_str.parse::<f64>().map_err(|e| {
                ParseError::BuildError(
                    format!("Failed to parse number '{}': {}", num_str, e),
                    Some(span),
                )
            })?;
            Ok(Expr::LitNum { v: value, span })
        }
        Rule::boolean => Ok(Expr::LitBool {
            v: pair.as_str() == "true",
            span,
        }),
        Rule::string => Ok(Expr::LitStr {
            v: build_string(pair, span)?,
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::array_lit => Ok(Expr::LitList {
            elements: build_expression_list(pair, source)?,
            span,
        }),
        Rule::object_lit => build_object_literal(pair, source),
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_expression_list(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(|expr_pair| build_expression(expr_pair, source))
        .collect()
}

fn build_object_literal(pair: Pair<Rule>, source: &LineIndex) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut properties = Vec::new();

    for property in pair.into_inner() {
        let property_span = pair_to_span(&property, source);
        let inner = required(&mut property.into_inner(), "property", property_span)?;

        match inner.as_rule() {
            Rule::property_pair => {
                let mut parts = inner.into_inner();
                let key_pair = required(&mut parts, "property key", property_span)?;
                let key = match key_pair.as_rule() {
                    Rule::string => build_string(key_pair, property_span)?,
                    _ => key_pair.as_str().to_string(),
                };
                let value = build_expression(required(&mut parts, "property value", property_span)?, source)?;
                properties.push((key, value));
            }
            Rule::property_shorthand => {
                let name = inner.as_str().to_string();
                properties.push((
                    name.clone(),
                    Expr::Ident {
                        name,
                        span: property_span,
                    },
                ));
            }
            other => {
                return Err(ParseError::BuildError(
                    format!("Unexpected property rule: {:?}", other),
                    Some(property_span),
                ))
            }
        }
    }

    Ok(Expr::LitObj { properties, span })
}

/// Decode the contents of a string literal
fn build_string(pair: Pair<Rule>, span: Span) -> ParseResult<String> {
    let raw = required(&mut pair.into_inner(), "string contents", span)?.as_str();

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {
                return Err(ParseError::BuildError(
                    "Unterminated escape sequence".to_string(),
                    Some(span),
                ))
            }
        }
    }

    Ok(out)
}
