use winnow::combinator::{alt, cut_err, fail, not, opt, preceded, separated, terminated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::Stateful;
use winnow::token::{any, literal, one_of, take_while};

use crate::types::{BinaryOp, Expr, Literal, LogicalOp, Program, Property, UnaryOp};

/// Source text plus the number of nested `assignment`/`unary` frames open.
pub(super) type Input<'i> = Stateful<&'i str, usize>;

type Step<O> = for<'a, 'i> fn(&'a mut Input<'i>) -> ModalResult<O>;

/// Open `assignment`/`unary` frames allowed at once.
const MAX_NESTING: usize = 128;

/// Height allowed for a single statement's tree.
const MAX_DEPTH: usize = 64;

// -- Nesting ------------------------------------------------------------------

fn too_deep<O>(input: &mut Input<'_>) -> ModalResult<O> {
    cut_err(fail)
        .context(StrContext::Label("nesting depth"))
        .parse_next(input)
}

fn within_depth(input: &mut Input<'_>, expr: Expr) -> ModalResult<Expr> {
    if expr.depth() > MAX_DEPTH {
        return too_deep(input);
    }
    Ok(expr)
}

/// Runs `parser` one frame deeper, then checks the height of what it built.
fn nested<'i>(
    input: &mut Input<'i>,
    parser: impl FnOnce(&mut Input<'i>) -> ModalResult<Expr>,
) -> ModalResult<Expr> {
    if input.state >= MAX_NESTING {
        return too_deep(input);
    }
    input.state += 1;
    let result = parser(input);
    input.state -= 1;
    within_depth(input, result?)
}

// -- Whitespace & tokens ----------------------------------------------------

fn ws(input: &mut Input<'_>) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace())
        .void()
        .parse_next(input)
}

fn punct<'i>(token: &'static str) -> impl Parser<Input<'i>, &'i str, ErrMode<ContextError>> {
    preceded(ws, literal(token))
}

fn ch<'i>(c: char) -> impl Parser<Input<'i>, char, ErrMode<ContextError>> {
    c
}

fn quote(input: &mut Input<'_>) -> ModalResult<char> {
    one_of(['"', '\'']).parse_next(input)
}

fn any_char(input: &mut Input<'_>) -> ModalResult<char> {
    any.parse_next(input)
}

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

// -- Identifiers ------------------------------------------------------------

fn ident<'i>(input: &mut Input<'i>) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '$'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '$'),
    )
        .take()
        .parse_next(input)
}

// -- Literals ---------------------------------------------------------------

fn number(input: &mut Input<'_>) -> ModalResult<f64> {
    (
        take_while(1.., |c: char| c.is_ascii_digit()),
        opt(('.', take_while(1.., |c: char| c.is_ascii_digit()))),
        opt((
            one_of(['e', 'E']),
            opt(one_of(['+', '-'])),
            take_while(1.., |c: char| c.is_ascii_digit()),
        )),
    )
        .take()
        .try_map(|s: &str| s.parse::<f64>())
        .parse_next(input)
}

fn string_literal(input: &mut Input<'_>) -> ModalResult<String> {
    let quote = quote(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any_char)
            .context(expected("closing quote"))
            .parse_next(input)?;
        match ch {
            c if c == quote => return Ok(s),
            '\\' => {
                let esc = cut_err(any_char).parse_next(input)?;
                match esc {
                    'n' => s.push('\n'),
                    't' => s.push('\t'),
                    'r' => s.push('\r'),
                    '0' => s.push('\0'),
                    other => s.push(other),
                }
            }
            c => s.push(c),
        }
    }
}

fn array_literal(input: &mut Input<'_>) -> ModalResult<Expr> {
    ch('[').parse_next(input)?;
    let items: Vec<Expr> = separated(0.., assignment, punct(",")).parse_next(input)?;
    opt(punct(",")).parse_next(input)?;
    cut_err(punct("]"))
        .context(expected("']'"))
        .parse_next(input)?;
    Ok(Expr::Array(items))
}

fn object_key(input: &mut Input<'_>) -> ModalResult<String> {
    ws.parse_next(input)?;
    alt((
        string_literal,
        ident.map(str::to_owned),
        take_while(1.., |c: char| c.is_ascii_digit()).map(str::to_owned),
    ))
    .parse_next(input)
}

fn object_entry(input: &mut Input<'_>) -> ModalResult<(String, Expr)> {
    let key = object_key(input)?;
    cut_err(punct(":"))
        .context(expected("':'"))
        .parse_next(input)?;
    let value = cut_err(assignment).parse_next(input)?;
    Ok((key, value))
}

fn object_literal(input: &mut Input<'_>) -> ModalResult<Expr> {
    ch('{').parse_next(input)?;
    let entries: Vec<(String, Expr)> =
        separated(0.., object_entry, punct(",")).parse_next(input)?;
    opt(punct(",")).parse_next(input)?;
    cut_err(punct("}"))
        .context(expected("'}'"))
        .parse_next(input)?;
    Ok(Expr::Object(entries))
}

// -- Primary expressions ----------------------------------------------------

fn arrow_params(input: &mut Input<'_>) -> ModalResult<Vec<String>> {
    ch('(').parse_next(input)?;
    let params: Vec<String> =
        separated(0.., preceded(ws, ident).map(str::to_owned), punct(",")).parse_next(input)?;
    punct(")").parse_next(input)?;
    punct("=>").parse_next(input)?;
    Ok(params)
}

fn arrow_body(params: Vec<String>, input: &mut Input<'_>) -> ModalResult<Expr> {
    let body = cut_err(assignment)
        .context(expected("arrow function body"))
        .parse_next(input)?;
    Ok(Expr::Arrow {
        params,
        body: Box::new(body),
    })
}

fn parenthesized(input: &mut Input<'_>) -> ModalResult<Expr> {
    let checkpoint = input.checkpoint();
    if let Ok(params) = arrow_params(input) {
        return arrow_body(params, input);
    }
    input.reset(&checkpoint);

    ch('(').parse_next(input)?;
    let inner = cut_err(assignment).parse_next(input)?;
    cut_err(punct(")"))
        .context(expected("')'"))
        .parse_next(input)?;
    Ok(inner)
}

fn word(input: &mut Input<'_>) -> ModalResult<Expr> {
    let name = ident.parse_next(input)?;
    let lit = match name {
        "true" => Some(Literal::Bool(true)),
        "false" => Some(Literal::Bool(false)),
        "null" => Some(Literal::Null),
        "undefined" => Some(Literal::Undefined),
        _ => None,
    };
    if let Some(lit) = lit {
        return Ok(Expr::Literal(lit));
    }

    let checkpoint = input.checkpoint();
    if punct("=>").parse_next(input).is_ok() {
        return arrow_body(vec![name.to_owned()], input);
    }
    input.reset(&checkpoint);
    Ok(Expr::Ident(name.to_owned()))
}

fn primary(input: &mut Input<'_>) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    alt((
        number.map(|n| Expr::Literal(Literal::Number(n))),
        string_literal.map(|s| Expr::Literal(Literal::String(s))),
        array_literal,
        object_literal,
        parenthesized,
        word,
    ))
    .context(expected("expression"))
    .parse_next(input)
}

// -- Member access and calls ------------------------------------------------

fn call_args(input: &mut Input<'_>) -> ModalResult<Vec<Expr>> {
    let args: Vec<Expr> = separated(0.., assignment, punct(",")).parse_next(input)?;
    cut_err(punct(")"))
        .context(expected("')'"))
        .parse_next(input)?;
    Ok(args)
}

fn computed_key(input: &mut Input<'_>) -> ModalResult<Property> {
    let key = cut_err(assignment).parse_next(input)?;
    cut_err(punct("]"))
        .context(expected("']'"))
        .parse_next(input)?;
    Ok(Property::Computed(Box::new(key)))
}

fn member(object: Expr, property: Property, optional: bool) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property,
        optional,
    }
}

fn postfix(input: &mut Input<'_>) -> ModalResult<Expr> {
    let mut expr = primary(input)?;
    loop {
        if opt(punct("?.")).parse_next(input)?.is_some() {
            let property = if opt(ch('[')).parse_next(input)?.is_some() {
                computed_key(input)?
            } else {
                let name = cut_err(ident)
                    .context(expected("property name"))
                    .parse_next(input)?;
                Property::Named(name.to_owned())
            };
            expr = member(expr, property, true);
        } else if opt(punct(".")).parse_next(input)?.is_some() {
            let name = cut_err(preceded(ws, ident))
                .context(expected("property name"))
                .parse_next(input)?;
            expr = member(expr, Property::Named(name.to_owned()), false);
        } else if opt(punct("[")).parse_next(input)?.is_some() {
            let property = computed_key(input)?;
            expr = member(expr, property, false);
        } else if opt(punct("(")).parse_next(input)?.is_some() {
            let args = call_args(input)?;
            expr = Expr::Call {
                callee: Box::new(expr),
                args,
            };
        } else {
            return Ok(expr);
        }
        expr = within_depth(input, expr)?;
    }
}

// -- Operators (precedence: assignment < ?: < || < && < equality <
//    relational < additive < multiplicative < unary < postfix) -------------

fn unary_op(input: &mut Input<'_>) -> ModalResult<UnaryOp> {
    alt((
        terminated(punct("!"), not('=')).value(UnaryOp::Not),
        punct("-").value(UnaryOp::Neg),
        punct("+").value(UnaryOp::Plus),
    ))
    .parse_next(input)
}

fn unary(input: &mut Input<'_>) -> ModalResult<Expr> {
    nested(input, unary_inner)
}

fn unary_inner(input: &mut Input<'_>) -> ModalResult<Expr> {
    ws.parse_next(input)?;
    let checkpoint = input.checkpoint();
    if let Ok(keyword) = ident.parse_next(input) {
        match keyword {
            "typeof" => {
                let operand = cut_err(unary).parse_next(input)?;
                return Ok(Expr::Unary {
                    op: UnaryOp::TypeOf,
                    operand: Box::new(operand),
                });
            }
            "delete" => {
                let target = cut_err(unary).parse_next(input)?;
                if !matches!(target, Expr::Member { .. }) {
                    return Err(ErrMode::from_input(input).cut());
                }
                return Ok(Expr::Delete(Box::new(target)));
            }
            _ => {}
        }
    }
    input.reset(&checkpoint);

    if let Some(op) = opt(unary_op).parse_next(input)? {
        let operand = cut_err(unary).parse_next(input)?;
        return Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        });
    }
    postfix(input)
}

fn binary_chain(
    input: &mut Input<'_>,
    operand: Step<Expr>,
    operator: Step<BinaryOp>,
) -> ModalResult<Expr> {
    let mut expr = operand(input)?;
    while let Some(op) = opt(operator).parse_next(input)? {
        let rhs = cut_err(operand).parse_next(input)?;
        let node = Expr::Binary {
            op,
            lhs: Box::new(expr),
            rhs: Box::new(rhs),
        };
        expr = within_depth(input, node)?;
    }
    Ok(expr)
}

fn logical_chain(
    input: &mut Input<'_>,
    operand: Step<Expr>,
    token: &'static str,
    op: LogicalOp,
) -> ModalResult<Expr> {
    let mut expr = operand(input)?;
    while opt(punct(token)).parse_next(input)?.is_some() {
        let rhs = cut_err(operand).parse_next(input)?;
        let node = Expr::Logical {
            op,
            lhs: Box::new(expr),
            rhs: Box::new(rhs),
        };
        expr = within_depth(input, node)?;
    }
    Ok(expr)
}

fn multiplicative_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        punct("*").value(BinaryOp::Mul),
        punct("/").value(BinaryOp::Div),
        punct("%").value(BinaryOp::Rem),
    ))
    .parse_next(input)
}

fn multiplicative(input: &mut Input<'_>) -> ModalResult<Expr> {
    binary_chain(input, unary, multiplicative_op)
}

fn additive_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        punct("+").value(BinaryOp::Add),
        punct("-").value(BinaryOp::Sub),
    ))
    .parse_next(input)
}

fn additive(input: &mut Input<'_>) -> ModalResult<Expr> {
    binary_chain(input, multiplicative, additive_op)
}

fn relational_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        punct("<=").value(BinaryOp::Lte),
        punct(">=").value(BinaryOp::Gte),
        punct("<").value(BinaryOp::Lt),
        punct(">").value(BinaryOp::Gt),
    ))
    .parse_next(input)
}

fn relational(input: &mut Input<'_>) -> ModalResult<Expr> {
    binary_chain(input, additive, relational_op)
}

fn equality_op(input: &mut Input<'_>) -> ModalResult<BinaryOp> {
    alt((
        punct("===").value(BinaryOp::StrictEq),
        punct("!==").value(BinaryOp::StrictNeq),
        punct("==").value(BinaryOp::Eq),
        punct("!=").value(BinaryOp::Neq),
    ))
    .parse_next(input)
}

fn equality(input: &mut Input<'_>) -> ModalResult<Expr> {
    binary_chain(input, relational, equality_op)
}

fn logical_and(input: &mut Input<'_>) -> ModalResult<Expr> {
    logical_chain(input, equality, "&&", LogicalOp::And)
}

fn logical_or(input: &mut Input<'_>) -> ModalResult<Expr> {
    logical_chain(input, logical_and, "||", LogicalOp::Or)
}

fn conditional(input: &mut Input<'_>) -> ModalResult<Expr> {
    let test = logical_or(input)?;
    if opt(terminated(punct("?"), not('.'))).parse_next(input)?.is_none() {
        return Ok(test);
    }
    let consequent = cut_err(assignment).parse_next(input)?;
    cut_err(punct(":"))
        .context(expected("':'"))
        .parse_next(input)?;
    let alternate = cut_err(assignment).parse_next(input)?;
    Ok(Expr::Conditional {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

fn assign_op(input: &mut Input<'_>) -> ModalResult<()> {
    terminated(punct("="), not(one_of(['=', '>'])))
        .void()
        .parse_next(input)
}

fn assignment(input: &mut Input<'_>) -> ModalResult<Expr> {
    nested(input, assignment_inner)
}

fn assignment_inner(input: &mut Input<'_>) -> ModalResult<Expr> {
    let target = conditional(input)?;
    if opt(assign_op).parse_next(input)?.is_none() {
        return Ok(target);
    }
    if !target.is_assignable() {
        return Err(ErrMode::from_input(input).cut());
    }
    let value = cut_err(assignment).parse_next(input)?;
    Ok(Expr::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

// -- Top-level parser -------------------------------------------------------

pub(super) fn program(input: &mut Input<'_>) -> ModalResult<Program> {
    let mut statements = Vec::new();
    loop {
        ws.parse_next(input)?;
        if input.is_empty() {
            break;
        }
        if opt(ch(';')).parse_next(input)?.is_some() {
            continue;
        }
        let statement = cut_err(assignment)
            .context(expected("statement"))
            .parse_next(input)?;
        statements.push(statement);
        ws.parse_next(input)?;
        if input.is_empty() {
            break;
        }
        cut_err(ch(';'))
            .context(expected("';'"))
            .parse_next(input)?;
    }
    Ok(Program::new(statements))
}
