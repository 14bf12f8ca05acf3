//! A compact XPath 1.0 evaluator over [`Dom`].
//!
//! Covers location paths with the common axes, predicates, unions, comparisons,
//! arithmetic and the string/node-set core function library. Namespaces, variables and
//! the `processing-instruction()`/`comment()` node tests are not supported.

use super::*;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    DoubleColon,
    Star,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Number(f64),
    Literal(String),
    Name(String),
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars = src.chars().collect::<Vec<_>>();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).copied();
        let token = match ch {
            '/' if next == Some('/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '|' => {
                i += 1;
                Token::Pipe
            }
            ':' if next == Some(':') => {
                i += 2;
                Token::DoubleColon
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '=' => {
                i += 1;
                Token::Eq
            }
            '!' if next == Some('=') => {
                i += 2;
                Token::NotEq
            }
            '<' if next == Some('=') => {
                i += 2;
                Token::Le
            }
            '<' => {
                i += 1;
                Token::Lt
            }
            '>' if next == Some('=') => {
                i += 2;
                Token::Ge
            }
            '>' => {
                i += 1;
                Token::Gt
            }
            '+' => {
                i += 1;
                Token::Plus
            }
            '-' => {
                i += 1;
                Token::Minus
            }
            '.' if next == Some('.') => {
                i += 2;
                Token::DotDot
            }
            '.' if !next.is_some_and(|c| c.is_ascii_digit()) => {
                i += 1;
                Token::Dot
            }
            '\'' | '"' => {
                let quote = ch;
                let start = i + 1;
                let Some(len) = chars[start..].iter().position(|c| *c == quote) else {
                    return Err(Error::XPath(format!("unterminated literal in {src}")));
                };
                i = start + len + 1;
                Token::Literal(chars[start..start + len].iter().collect())
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let raw = chars[start..i].iter().collect::<String>();
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| Error::XPath(format!("invalid number {raw}")))?;
                Token::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_alphanumeric()
                        || chars[i] == '_'
                        || chars[i] == '-'
                        || chars[i] == '.')
                {
                    i += 1;
                }
                Token::Name(chars[start..i].iter().collect())
            }
            other => {
                return Err(Error::XPath(format!(
                    "unexpected character '{other}' in {src}"
                )));
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "self" => Self::SelfAxis,
            "parent" => Self::Parent,
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "following-sibling" => Self::FollowingSibling,
            "preceding-sibling" => Self::PrecedingSibling,
            "following" => Self::Following,
            "preceding" => Self::Preceding,
            "attribute" => Self::Attribute,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Name(String),
    Any,
    Node,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path { absolute: bool, steps: Vec<Step> },
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
}

/// A parsed, reusable expression.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XPath {
    source: String,
    expr: Expr,
}

pub(crate) fn compile(source: &str) -> Result<XPath> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(Error::XPath("empty expression".into()));
    }
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("unexpected trailing tokens"));
    }
    Ok(XPath {
        source: source.to_string(),
        expr,
    })
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> Error {
        Error::XPath(format!("{message} at token {} in {}", self.pos, self.source))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {token:?}")))
        }
    }

    fn eat_operator_name(&mut self, name: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(found)) if found == name) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.parse_or())
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_operator_name("or") {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat_operator_name("and") {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_relational()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_operator_name("div") {
                BinaryOp::Div
            } else if self.eat_operator_name("mod") {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            let inner = stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.parse_unary())?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr> {
        let mut left = self.parse_path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_filter_expr(&self) -> bool {
        match self.peek() {
            Some(Token::LParen | Token::Literal(_) | Token::Number(_)) => true,
            Some(Token::Name(name)) => {
                self.peek_at(1) == Some(&Token::LParen) && !is_node_type_name(name)
            }
            _ => false,
        }
    }

    fn parse_path_expr(&mut self) -> Result<Expr> {
        if self.starts_filter_expr() {
            let primary = self.parse_primary()?;
            let predicates = self.parse_predicates()?;
            let mut steps = Vec::new();
            if matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
                self.parse_relative_steps(&mut steps, true)?;
            }
            if predicates.is_empty() && steps.is_empty() {
                return Ok(primary);
            }
            return Ok(Expr::Filter {
                primary: Box::new(primary),
                predicates,
                steps,
            });
        }

        let mut steps = Vec::new();
        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if self.starts_step() {
                    self.parse_relative_steps(&mut steps, false)?;
                }
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            Some(Token::DoubleSlash) => {
                self.parse_relative_steps(&mut steps, true)?;
                Ok(Expr::Path {
                    absolute: true,
                    steps,
                })
            }
            _ => {
                self.parse_relative_steps(&mut steps, false)?;
                Ok(Expr::Path {
                    absolute: false,
                    steps,
                })
            }
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    /// Parses `step (('/' | '//') step)*`. When `leading_separator` is set the cursor
    /// sits on a separator that precedes the first step.
    fn parse_relative_steps(&mut self, steps: &mut Vec<Step>, leading_separator: bool) -> Result<()> {
        let mut need_separator = leading_separator;
        loop {
            if need_separator {
                match self.peek() {
                    Some(Token::Slash) => self.pos += 1,
                    Some(Token::DoubleSlash) => {
                        self.pos += 1;
                        steps.push(Step {
                            axis: Axis::DescendantOrSelf,
                            test: NodeTest::Node,
                            predicates: Vec::new(),
                        });
                    }
                    _ => return Ok(()),
                }
            }
            steps.push(self.parse_step()?);
            need_separator = true;
            if !matches!(self.peek(), Some(Token::Slash | Token::DoubleSlash)) {
                return Ok(());
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let mut axis = Axis::Child;
        if self.eat(&Token::At) {
            axis = Axis::Attribute;
        } else if let (Some(Token::Name(name)), Some(Token::DoubleColon)) =
            (self.peek(), self.peek_at(1))
        {
            axis = Axis::from_name(name)
                .ok_or_else(|| self.error(&format!("unknown axis {name}")))?;
            self.pos += 2;
        }

        let test = match self.peek().cloned() {
            Some(Token::Star) => {
                self.pos += 1;
                NodeTest::Any
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if is_node_type_name(&name) && self.eat(&Token::LParen) {
                    self.expect(&Token::RParen)?;
                    match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::Node,
                        _ => return Err(self.error(&format!("unsupported node test {name}()"))),
                    }
                } else {
                    NodeTest::Name(name.to_ascii_lowercase())
                }
            }
            _ => return Err(self.error("expected node test")),
        };

        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(&Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Literal(value)) => {
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(Token::Number(value)) => {
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                check_function_arity(&name, args.len()).map_err(|msg| self.error(&msg))?;
                Ok(Expr::Function(name, args))
            }
            _ => Err(self.error("expected expression")),
        }
    }
}

fn is_node_type_name(name: &str) -> bool {
    matches!(name, "node" | "text" | "comment" | "processing-instruction")
}

fn check_function_arity(name: &str, count: usize) -> std::result::Result<(), String> {
    let (min, max) = match name {
        "true" | "false" | "position" | "last" => (0, 0),
        "not" | "boolean" | "count" => (1, 1),
        "string" | "string-length" | "normalize-space" | "number" | "name" | "local-name" => {
            (0, 1)
        }
        "contains" | "starts-with" | "ends-with" | "substring-before" | "substring-after" => {
            (2, 2)
        }
        "substring" => (2, 3),
        "translate" => (3, 3),
        "concat" => (2, usize::MAX),
        other => return Err(format!("unknown function {other}()")),
    };
    if count < min || count > max {
        return Err(format!("wrong number of arguments for {name}()"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum XNode {
    Node(NodeId),
    Attr(NodeId, String),
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<XNode>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Context {
    node: XNode,
    position: usize,
    size: usize,
}

struct Evaluator<'a> {
    dom: &'a Dom,
    scope: NodeId,
    order: HashMap<NodeId, usize>,
}

impl XPath {
    /// Evaluates against `context`. Absolute paths are anchored at `scope`, so a query run
    /// inside a narrowed context never escapes it. Only tree nodes are returned.
    pub(crate) fn select(&self, dom: &Dom, scope: NodeId, context: NodeId) -> Result<Vec<NodeId>> {
        let evaluator = Evaluator {
            dom,
            scope,
            order: dom.document_order(),
        };
        let value = evaluator.eval(
            &self.expr,
            &Context {
                node: XNode::Node(context),
                position: 1,
                size: 1,
            },
        )?;
        match value {
            Value::Nodes(nodes) => Ok(nodes
                .into_iter()
                .filter_map(|node| match node {
                    XNode::Node(id) if id != dom.root => Some(id),
                    _ => None,
                })
                .collect()),
            _ => Err(Error::XPath(format!(
                "{} does not select nodes",
                self.source
            ))),
        }
    }
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr, ctx: &Context) -> Result<Value> {
        stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.eval_inner(expr, ctx))
    }

    fn eval_inner(&self, expr: &Expr, ctx: &Context) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(Value::Str(value.clone())),
            Expr::Number(value) => Ok(Value::Num(*value)),
            Expr::Negate(inner) => Ok(Value::Num(-self.to_number(&self.eval(inner, ctx)?))),
            Expr::Binary(BinaryOp::Or, left, right) => {
                if self.to_bool(&self.eval(left, ctx)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.to_bool(&self.eval(right, ctx)?)))
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                if !self.to_bool(&self.eval(left, ctx)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.to_bool(&self.eval(right, ctx)?)))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, ctx)?;
                let right = self.eval(right, ctx)?;
                match op {
                    BinaryOp::Add => Ok(Value::Num(self.to_number(&left) + self.to_number(&right))),
                    BinaryOp::Sub => Ok(Value::Num(self.to_number(&left) - self.to_number(&right))),
                    BinaryOp::Div => Ok(Value::Num(self.to_number(&left) / self.to_number(&right))),
                    BinaryOp::Mod => Ok(Value::Num(self.to_number(&left) % self.to_number(&right))),
                    _ => Ok(Value::Bool(self.compare(*op, &left, &right))),
                }
            }
            Expr::Union(left, right) => {
                let (Value::Nodes(mut left), Value::Nodes(right)) =
                    (self.eval(left, ctx)?, self.eval(right, ctx)?)
                else {
                    return Err(Error::XPath("union operands must be node-sets".into()));
                };
                left.extend(right);
                Ok(Value::Nodes(self.sort_unique(left)))
            }
            Expr::Path { absolute, steps } => {
                if !*absolute {
                    return Ok(Value::Nodes(self.apply_steps(vec![ctx.node.clone()], steps)?));
                }
                let start = vec![XNode::Node(self.scope)];
                if self.scope == self.dom.root {
                    return Ok(Value::Nodes(self.apply_steps(start, steps)?));
                }
                Ok(Value::Nodes(self.apply_steps(start, &relativize(steps))?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let Value::Nodes(nodes) = self.eval(primary, ctx)? else {
                    return Err(Error::XPath("predicates require a node-set".into()));
                };
                let mut nodes = self.sort_unique(nodes);
                for predicate in predicates {
                    nodes = self.filter_by_predicate(nodes, predicate)?;
                }
                Ok(Value::Nodes(self.apply_steps(nodes, steps)?))
            }
            Expr::Function(name, args) => self.call(name, args, ctx),
        }
    }

    fn apply_steps(&self, start: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>> {
        let mut current = start;
        for step in steps {
            let mut next = Vec::new();
            for node in &current {
                let mut candidates = self
                    .axis_nodes(node, step.axis)
                    .into_iter()
                    .filter(|candidate| self.matches_test(candidate, step.axis, &step.test))
                    .collect::<Vec<_>>();
                for predicate in &step.predicates {
                    candidates = self.filter_by_predicate(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            current = self.sort_unique(next);
        }
        Ok(current)
    }

    fn filter_by_predicate(&self, nodes: Vec<XNode>, predicate: &Expr) -> Result<Vec<XNode>> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node: node.clone(),
                position: index + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Num(position) => position == (index + 1) as f64,
                other => self.to_bool(&other),
            };
            if keep {
                kept.push(node);
            }
        }
        Ok(kept)
    }

    /// Nodes along `axis` in axis order (reverse axes nearest-first).
    fn axis_nodes(&self, node: &XNode, axis: Axis) -> Vec<XNode> {
        let dom = self.dom;
        let id = match node {
            XNode::Node(id) => *id,
            XNode::Attr(owner, _) => {
                return match axis {
                    Axis::SelfAxis => vec![node.clone()],
                    Axis::Parent => vec![XNode::Node(*owner)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let mut out = Vec::new();
                        if axis == Axis::AncestorOrSelf {
                            out.push(node.clone());
                        }
                        out.push(XNode::Node(*owner));
                        out.extend(self.ancestors(*owner).into_iter().map(XNode::Node));
                        out
                    }
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => dom.children(id).iter().copied().map(XNode::Node).collect(),
            Axis::Descendant => {
                let mut out = Vec::new();
                dom.collect_descendants_dfs(id, &mut out);
                out.into_iter().map(XNode::Node).collect()
            }
            Axis::DescendantOrSelf => {
                let mut out = vec![id];
                dom.collect_descendants_dfs(id, &mut out);
                out.into_iter().map(XNode::Node).collect()
            }
            Axis::SelfAxis => vec![XNode::Node(id)],
            Axis::Parent => dom.parent(id).map(XNode::Node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(id).into_iter().map(XNode::Node).collect(),
            Axis::AncestorOrSelf => std::iter::once(id)
                .chain(self.ancestors(id))
                .map(XNode::Node)
                .collect(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = dom.parent(id) else {
                    return Vec::new();
                };
                let siblings = dom.children(parent);
                let Some(pos) = siblings.iter().position(|sibling| *sibling == id) else {
                    return Vec::new();
                };
                if axis == Axis::FollowingSibling {
                    siblings[pos + 1..].iter().copied().map(XNode::Node).collect()
                } else {
                    siblings[..pos].iter().rev().copied().map(XNode::Node).collect()
                }
            }
            Axis::Following | Axis::Preceding => {
                let own = self.order.get(&id).copied().unwrap_or(0);
                let ancestors = self.ancestors(id);
                let mut all = Vec::new();
                dom.collect_descendants_dfs(dom.root, &mut all);
                if axis == Axis::Following {
                    all.into_iter()
                        .filter(|candidate| {
                            self.order.get(candidate).copied().unwrap_or(0) > own
                                && !dom.is_descendant_of(*candidate, id)
                        })
                        .map(XNode::Node)
                        .collect()
                } else {
                    all.into_iter()
                        .rev()
                        .filter(|candidate| {
                            self.order.get(candidate).copied().unwrap_or(0) < own
                                && !ancestors.contains(candidate)
                        })
                        .map(XNode::Node)
                        .collect()
                }
            }
            Axis::Attribute => {
                let Some(element) = dom.element(id) else {
                    return Vec::new();
                };
                let mut names = element.attrs.keys().cloned().collect::<Vec<_>>();
                names.sort();
                names
                    .into_iter()
                    .map(|name| XNode::Attr(id, name))
                    .collect()
            }
        }
    }

    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.dom.parent(id);
        while let Some(parent) = cursor {
            out.push(parent);
            cursor = self.dom.parent(parent);
        }
        out
    }

    fn matches_test(&self, node: &XNode, axis: Axis, test: &NodeTest) -> bool {
        match node {
            XNode::Attr(_, name) => match test {
                NodeTest::Name(expected) => axis == Axis::Attribute && name == expected,
                NodeTest::Any | NodeTest::Node => true,
                NodeTest::Text => false,
            },
            XNode::Node(id) => match &self.dom.nodes[id.0].node_type {
                NodeType::Element(element) => match test {
                    NodeTest::Name(expected) => element.tag_name.eq_ignore_ascii_case(expected),
                    NodeTest::Any | NodeTest::Node => true,
                    NodeTest::Text => false,
                },
                NodeType::Text(_) => matches!(test, NodeTest::Node | NodeTest::Text),
                NodeType::Document => matches!(test, NodeTest::Node),
            },
        }
    }

    fn order_key(&self, node: &XNode) -> (usize, usize, String) {
        match node {
            XNode::Node(id) => (self.order.get(id).copied().unwrap_or(usize::MAX), 0, String::new()),
            XNode::Attr(id, name) => (
                self.order.get(id).copied().unwrap_or(usize::MAX),
                1,
                name.clone(),
            ),
        }
    }

    fn sort_unique(&self, mut nodes: Vec<XNode>) -> Vec<XNode> {
        nodes.sort_by_key(|node| self.order_key(node));
        nodes.dedup();
        nodes
    }

    fn string_value(&self, node: &XNode) -> String {
        match node {
            XNode::Node(id) => self.dom.text_content(*id),
            XNode::Attr(id, name) => self.dom.attr(*id, name).unwrap_or_default().to_string(),
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Str(value) => value.clone(),
            Value::Num(value) => format_number(*value),
            Value::Bool(value) => value.to_string(),
            Value::Nodes(nodes) => nodes
                .first()
                .map(|node| self.string_value(node))
                .unwrap_or_default(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(value) => *value,
            Value::Bool(value) => f64::from(u8::from(*value)),
            other => parse_number(&self.to_string(other)),
        }
    }

    fn to_bool(&self, value: &Value) -> bool {
        match value {
            Value::Bool(value) => *value,
            Value::Num(value) => *value != 0.0 && !value.is_nan(),
            Value::Str(value) => !value.is_empty(),
            Value::Nodes(nodes) => !nodes.is_empty(),
        }
    }

    fn compare(&self, op: BinaryOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(left), Value::Nodes(right)) => left.iter().any(|l| {
                let l = self.string_value(l);
                right
                    .iter()
                    .any(|r| compare_atoms(op, &Value::Str(l.clone()), &Value::Str(self.string_value(r))))
            }),
            (Value::Nodes(nodes), Value::Bool(_)) | (Value::Bool(_), Value::Nodes(nodes)) => {
                let as_bool = Value::Bool(!nodes.is_empty());
                if matches!(left, Value::Nodes(_)) {
                    compare_atoms(op, &as_bool, right)
                } else {
                    compare_atoms(op, left, &as_bool)
                }
            }
            (Value::Nodes(nodes), other) => nodes
                .iter()
                .any(|node| compare_atoms(op, &Value::Str(self.string_value(node)), other)),
            (other, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|node| compare_atoms(op, other, &Value::Str(self.string_value(node)))),
            _ => compare_atoms(op, left, right),
        }
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, ctx)?);
        }
        let context_string = || self.string_value(&ctx.node);
        let arg_string = |index: usize| {
            values
                .get(index)
                .map(|value| self.to_string(value))
                .unwrap_or_else(context_string)
        };

        Ok(match name {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "position" => Value::Num(ctx.position as f64),
            "last" => Value::Num(ctx.size as f64),
            "not" => Value::Bool(!self.to_bool(&values[0])),
            "boolean" => Value::Bool(self.to_bool(&values[0])),
            "count" => match &values[0] {
                Value::Nodes(nodes) => Value::Num(nodes.len() as f64),
                _ => return Err(Error::XPath("count() expects a node-set".into())),
            },
            "number" => Value::Num(match values.first() {
                Some(value) => self.to_number(value),
                None => parse_number(&context_string()),
            }),
            "string" => Value::Str(arg_string(0)),
            "string-length" => Value::Num(arg_string(0).chars().count() as f64),
            "normalize-space" => Value::Str(text::normalize_space(&arg_string(0))),
            "contains" => Value::Bool(arg_string(0).contains(&arg_string(1))),
            "starts-with" => Value::Bool(arg_string(0).starts_with(&arg_string(1))),
            "ends-with" => Value::Bool(arg_string(0).ends_with(&arg_string(1))),
            "substring-before" => {
                let haystack = arg_string(0);
                let needle = arg_string(1);
                Value::Str(
                    haystack
                        .find(&needle)
                        .map(|pos| haystack[..pos].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring-after" => {
                let haystack = arg_string(0);
                let needle = arg_string(1);
                Value::Str(
                    haystack
                        .find(&needle)
                        .map(|pos| haystack[pos + needle.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                let source = arg_string(0);
                let start = self.to_number(&values[1]);
                let length = values.get(2).map(|value| self.to_number(value));
                Value::Str(substring(&source, start, length))
            }
            "concat" => Value::Str((0..values.len()).map(arg_string).collect()),
            "translate" => {
                let from = arg_string(1).chars().collect::<Vec<_>>();
                let to = arg_string(2).chars().collect::<Vec<_>>();
                Value::Str(
                    arg_string(0)
                        .chars()
                        .filter_map(|ch| match from.iter().position(|c| *c == ch) {
                            Some(index) => to.get(index).copied(),
                            None => Some(ch),
                        })
                        .collect(),
                )
            }
            "name" | "local-name" => {
                let node = match values.first() {
                    Some(Value::Nodes(nodes)) => nodes.first().cloned(),
                    Some(_) => return Err(Error::XPath(format!("{name}() expects a node-set"))),
                    None => Some(ctx.node.clone()),
                };
                Value::Str(match node {
                    Some(XNode::Node(id)) => self.dom.tag_name(id).unwrap_or_default().to_string(),
                    Some(XNode::Attr(_, attr)) => attr,
                    None => String::new(),
                })
            }
            other => return Err(Error::XPath(format!("unknown function {other}()"))),
        })
    }
}

/// Rewrites an absolute path so it is anchored at a scope element that is itself a
/// candidate: `//x` becomes `descendant-or-self::x`, `/x` becomes `self::x`.
fn relativize(steps: &[Step]) -> Vec<Step> {
    let mut steps = steps.to_vec();
    let descendant_prefix = steps.len() > 1
        && steps[0].axis == Axis::DescendantOrSelf
        && steps[0].test == NodeTest::Node
        && steps[0].predicates.is_empty()
        && steps[1].axis == Axis::Child;
    if descendant_prefix {
        steps.remove(0);
        steps[0].axis = Axis::DescendantOrSelf;
    } else if let Some(first) = steps.first_mut().filter(|step| step.axis == Axis::Child) {
        first.axis = Axis::SelfAxis;
    }
    steps
}

fn compare_atoms(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let to_number = |value: &Value| match value {
        Value::Num(value) => *value,
        Value::Bool(value) => f64::from(u8::from(*value)),
        Value::Str(value) => parse_number(value),
        Value::Nodes(_) => f64::NAN,
    };
    let to_bool = |value: &Value| match value {
        Value::Bool(value) => *value,
        Value::Num(value) => *value != 0.0 && !value.is_nan(),
        Value::Str(value) => !value.is_empty(),
        Value::Nodes(nodes) => !nodes.is_empty(),
    };
    match op {
        BinaryOp::Eq | BinaryOp::NotEq => {
            let equal = match (left, right) {
                (Value::Bool(_), _) | (_, Value::Bool(_)) => to_bool(left) == to_bool(right),
                (Value::Num(_), _) | (_, Value::Num(_)) => to_number(left) == to_number(right),
                (Value::Str(left), Value::Str(right)) => left == right,
                _ => false,
            };
            if op == BinaryOp::Eq { equal } else { !equal }
        }
        _ => {
            let ordering = to_number(left).partial_cmp(&to_number(right));
            match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Lt, Some(ordering)) => ordering == Ordering::Less,
                (BinaryOp::Le, Some(ordering)) => ordering != Ordering::Greater,
                (BinaryOp::Gt, Some(ordering)) => ordering == Ordering::Greater,
                (BinaryOp::Ge, Some(ordering)) => ordering != Ordering::Less,
                _ => false,
            }
        }
    }
}

fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.fract() == 0.0 && value.is_finite() {
        return format!("{}", value as i64);
    }
    value.to_string()
}

/// XPath `substring()` with its 1-based, rounding position rules.
fn substring(source: &str, start: f64, length: Option<f64>) -> String {
    let first = start.round();
    let last = match length {
        Some(length) => first + length.round(),
        None => f64::INFINITY,
    };
    source
        .chars()
        .enumerate()
        .filter(|(index, _)| {
            let position = (*index + 1) as f64;
            position >= first && position < last
        })
        .map(|(_, ch)| ch)
        .collect()
}

/// Escapes `value` as an XPath string literal, falling back to `concat()` when it
/// contains both quote kinds.
pub(crate) fn literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect::<Vec<_>>()
        .join(", \"'\", ");
    format!("concat({parts})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(html: &str, expr: &str) -> Result<Vec<String>> {
        let dom = parse_html(html)?;
        let nodes = compile(expr)?.select(&dom, dom.root, dom.root)?;
        Ok(nodes.into_iter().map(|node| dom.dump_node(node)).collect())
    }

    #[test]
    fn descendant_paths_with_attribute_predicates() -> Result<()> {
        let found = select(
            r#"<form><input name="a"><input name="b" disabled><button type="submit" name="b">x</button></form>"#,
            r#"//*[not(@disabled) and @type="submit" and @name='b']"#,
        )?;
        assert_eq!(found, vec![r#"<button name="b" type="submit">x</button>"#]);
        Ok(())
    }

    #[test]
    fn link_by_text_or_title() -> Result<()> {
        let html = r#"<a href="/1">Home</a><a href="/2" title="Go Home now">x</a><a href="/3">Other</a>"#;
        let found = select(html, ".//a[.='Home' or contains(./@title, 'Home')]")?;
        assert_eq!(found.len(), 2);
        Ok(())
    }

    #[test]
    fn label_text_with_normalize_space() -> Result<()> {
        let html = "<label for=e>\n   Email  </label><label>Name <input name=n></label>";
        let found = select(
            html,
            ".//label[descendant-or-self::node()[text()[normalize-space()='Email']]]",
        )?;
        assert_eq!(found.len(), 1);
        let nested = select(
            html,
            ".//label[descendant-or-self::node()[text()[normalize-space()='Name']]]//input",
        )?;
        assert_eq!(nested, vec![r#"<input name="n">"#]);
        Ok(())
    }

    #[test]
    fn positional_predicates_unions_and_ends_with_idiom() -> Result<()> {
        let html = r#"<ul><li>a</li><li>b</li><li>c</li></ul><a href="/x/page.html">p</a>"#;
        assert_eq!(select(html, "//li[2]")?, vec!["<li>b</li>"]);
        assert_eq!(select(html, "//li[last()]")?, vec!["<li>c</li>"]);
        assert_eq!(select(html, "(//li)[1] | //a")?.len(), 2);
        let suffix = literal("page.html");
        let expr = format!(
            ".//a[substring(@href, string-length(@href) - string-length({suffix}) + 1)={suffix}]"
        );
        assert_eq!(select(html, &expr)?.len(), 1);
        Ok(())
    }

    #[test]
    fn rejects_free_text() {
        assert!(compile("Sign in!").is_err());
        assert!(compile("Click here please").is_err());
        assert!(compile("//a[").is_err());
        assert!(compile("").is_err());
    }

    #[test]
    fn literal_escapes_mixed_quotes() {
        assert_eq!(literal("it's"), "\"it's\"");
        assert_eq!(literal(r#"a'b"c"#), r#"concat('a', "'", 'b"c')"#);
    }
}
