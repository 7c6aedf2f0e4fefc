//! Read-only XPath 1.0 evaluation over `roxmltree` documents.
//!
//! Covers location paths on all axes except `namespace`, predicates, the
//! operator set of XPath 1.0 and the core function library. Prefixes resolve
//! through the caller's namespace map first and then through the namespace
//! declarations found in the document. `{uri}local` names address a namespace
//! directly.
//!
//! Unprefixed element names also match elements in the default namespace in
//! scope, so `/order/item` finds items of `<order xmlns="urn:shop">`.
//!
//! Expressions without `/` and `(` use dot notation: `order.item.name` selects
//! `/order/item/name`, falling back to the attribute `/order/item/@name`.

use crate::enums::XpathResultType;
use crate::error::ValidationError;
use roxmltree::{Document, Node, NodeType};
use std::collections::BTreeMap;
use std::fmt;

// ─── Nodes ──────────────────────────────────────────────────────────────────

/// A node in an XPath node-set: a tree node or an element attribute.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum XmlNode<'a, 'input> {
    Node(Node<'a, 'input>),
    Attribute { owner: Node<'a, 'input>, index: usize },
}

impl<'a, 'input> XmlNode<'a, 'input> {
    fn order_key(&self) -> (usize, usize) {
        match self {
            XmlNode::Node(node) => (node.id().get_usize(), 0),
            XmlNode::Attribute { owner, index } => (owner.id().get_usize(), index + 1),
        }
    }

    pub fn attribute(&self) -> Option<roxmltree::Attribute<'a, 'input>> {
        match self {
            XmlNode::Attribute { owner, index } => owner.attributes().nth(*index),
            XmlNode::Node(_) => None,
        }
    }

    /// The tree node, or the owning element of an attribute.
    pub fn node(&self) -> Node<'a, 'input> {
        match self {
            XmlNode::Node(node) => *node,
            XmlNode::Attribute { owner, .. } => *owner,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, XmlNode::Node(node) if node.is_element())
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, XmlNode::Attribute { .. })
    }

    /// XPath string-value.
    pub fn string_value(&self) -> String {
        match self {
            XmlNode::Attribute { .. } => self
                .attribute()
                .map(|a| a.value().to_string())
                .unwrap_or_default(),
            XmlNode::Node(node) => match node.node_type() {
                NodeType::Root | NodeType::Element => node
                    .descendants()
                    .filter(|n| n.is_text())
                    .filter_map(|n| n.text())
                    .collect(),
                NodeType::Text | NodeType::Comment => node.text().unwrap_or_default().to_string(),
                NodeType::PI => node
                    .pi()
                    .and_then(|pi| pi.value)
                    .unwrap_or_default()
                    .to_string(),
            },
        }
    }

    pub fn local_name(&self) -> String {
        match self {
            XmlNode::Attribute { .. } => self
                .attribute()
                .map(|a| a.name().to_string())
                .unwrap_or_default(),
            XmlNode::Node(node) => match node.node_type() {
                NodeType::Element => node.tag_name().name().to_string(),
                NodeType::PI => node.pi().map(|pi| pi.target.to_string()).unwrap_or_default(),
                _ => String::new(),
            },
        }
    }

    pub fn namespace(&self) -> Option<String> {
        match self {
            XmlNode::Attribute { .. } => self
                .attribute()
                .and_then(|a| a.namespace().map(str::to_string)),
            XmlNode::Node(node) if node.is_element() => {
                node.tag_name().namespace().map(str::to_string)
            }
            XmlNode::Node(_) => None,
        }
    }

    /// Prefixed name as written in the document, e.g. `ns0:item`.
    pub fn qualified_name(&self) -> String {
        let local = self.local_name();
        let prefix = self
            .namespace()
            .and_then(|uri| self.node().lookup_prefix(&uri).map(str::to_string));
        match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, local),
            _ => local,
        }
    }
}

// ─── Values ─────────────────────────────────────────────────────────────────

/// Result of evaluating an XPath expression.
#[derive(Clone, Debug, PartialEq)]
pub enum XPathValue<'a, 'input> {
    NodeSet(Vec<XmlNode<'a, 'input>>),
    String(String),
    Number(f64),
    Boolean(bool),
}

impl XPathValue<'_, '_> {
    pub fn to_boolean(&self) -> bool {
        match self {
            XPathValue::NodeSet(nodes) => !nodes.is_empty(),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::Number(n) => *n != 0.0 && !n.is_nan(),
            XPathValue::Boolean(b) => *b,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            other => string_to_number(&other.to_xpath_string()),
        }
    }

    /// XPath string conversion; a node-set converts through its first node.
    pub fn to_xpath_string(&self) -> String {
        match self {
            XPathValue::NodeSet(nodes) => nodes.first().map(XmlNode::string_value).unwrap_or_default(),
            XPathValue::String(s) => s.clone(),
            XPathValue::Number(n) => number_to_string(*n),
            XPathValue::Boolean(b) => b.to_string(),
        }
    }
}

fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .trim_start_matches('-')
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.');
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Typed result selected by an expression prefix such as `number:`.
#[derive(Clone, Debug, PartialEq)]
pub enum XPathResult {
    Node(String),
    NodeSet(Vec<String>),
    String(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
}

impl XPathResult {
    /// Node-sets format as `a,b`, or as `[a, b]` when `bracketed`.
    pub fn render(&self, bracketed: bool) -> String {
        match self {
            XPathResult::NodeSet(values) if bracketed => format!("[{}]", values.join(", ")),
            XPathResult::NodeSet(values) => values.join(","),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for XPathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XPathResult::Node(s) | XPathResult::String(s) => f.write_str(s),
            XPathResult::NodeSet(values) => f.write_str(&values.join(",")),
            XPathResult::Number(n) if n.is_finite() && *n == n.trunc() && n.abs() < 1e7 => {
                write!(f, "{:.1}", n)
            }
            XPathResult::Number(n) => f.write_str(&number_to_string(*n)),
            XPathResult::Integer(i) => write!(f, "{}", i),
            XPathResult::Boolean(b) => write!(f, "{}", b),
        }
    }
}

// ─── Syntax ─────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DoubleDot,
    At,
    Comma,
    DoubleColon,
    Pipe,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Star,
    Literal(String),
    Number(f64),
    Name { prefix: Option<String>, local: String },
    UriName { uri: String, local: String },
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let read_name = |i: &mut usize| -> String {
        let start = *i;
        while *i < chars.len() && is_name_char(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '/' if next == Some('/') => {
                tokens.push(Token::DoubleSlash);
                i += 2;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '@' => {
                tokens.push(Token::At);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            ':' if next == Some(':') => {
                tokens.push(Token::DoubleColon);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '.' if next == Some('.') => {
                tokens.push(Token::DoubleDot);
                i += 2;
            }
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == c)
                    .ok_or("unterminated string literal")?;
                tokens.push(Token::Literal(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '{' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&q| q == '}')
                    .ok_or("unterminated namespace URI")?;
                let uri: String = chars[i + 1..i + 1 + end].iter().collect();
                i += end + 2;
                if i < chars.len() && chars[i] == '*' {
                    i += 1;
                    tokens.push(Token::UriName {
                        uri,
                        local: "*".to_string(),
                    });
                } else if i < chars.len() && is_name_start(chars[i]) {
                    let local = read_name(&mut i);
                    tokens.push(Token::UriName { uri, local });
                } else {
                    return Err("expected local name after namespace URI".to_string());
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse()
                    .map_err(|_| format!("invalid number '{}'", text))?;
                tokens.push(Token::Number(value));
            }
            c if is_name_start(c) => {
                let first = read_name(&mut i);
                let qualified = i + 1 < chars.len()
                    && chars[i] == ':'
                    && (chars[i + 1] == '*' || is_name_start(chars[i + 1]));
                if qualified {
                    i += 1;
                    let local = if chars[i] == '*' {
                        i += 1;
                        "*".to_string()
                    } else {
                        read_name(&mut i)
                    };
                    tokens.push(Token::Name {
                        prefix: Some(first),
                        local,
                    });
                } else {
                    tokens.push(Token::Name {
                        prefix: None,
                        local: first,
                    });
                }
            }
            '$' => return Err("variable references are not supported".to_string()),
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
    SelfAxis,
}

impl Axis {
    fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
enum NameSpace {
    Unqualified,
    Prefix(String),
    Uri(String),
}

#[derive(Clone, Debug, PartialEq)]
enum NodeTest {
    /// `None` local name is `*`.
    Name {
        namespace: NameSpace,
        local: Option<String>,
    },
    Node,
    Text,
    Comment,
    Pi(Option<String>),
}

#[derive(Clone, Debug, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Clone, Debug, PartialEq)]
enum PathStart {
    Root,
    Context,
    Filter(Box<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq)]
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
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
    Filter(Box<Expr>, Vec<Expr>),
    Path(PathStart, Vec<Step>),
}

const FUNCTIONS: &[&str] = &[
    "last",
    "position",
    "count",
    "string",
    "name",
    "local-name",
    "namespace-uri",
    "boolean",
    "not",
    "true",
    "false",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
    "concat",
    "contains",
    "starts-with",
    "ends-with",
    "substring",
    "substring-before",
    "substring-after",
    "string-length",
    "normalize-space",
    "translate",
];

const NODE_TYPES: &[&str] = &["node", "text", "comment", "processing-instruction"];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
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

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), String> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(format!("expected {:?}, found {:?}", token, self.peek()))
        }
    }

    fn peek_operator_name(&self, name: &str) -> bool {
        matches!(self.peek(), Some(Token::Name { prefix: None, local }) if local == name)
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek_operator_name("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_equality()?;
        while self.peek_operator_name("and") {
            self.pos += 1;
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
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

    fn parse_relational(&mut self) -> Result<Expr, String> {
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

    fn parse_additive(&mut self) -> Result<Expr, String> {
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

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.peek() == Some(&Token::Star) {
                BinaryOp::Mul
            } else if self.peek_operator_name("div") {
                BinaryOp::Div
            } else if self.peek_operator_name("mod") {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.parse_unary()?)));
        }
        self.parse_union()
    }

    fn parse_union(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_path()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path()?;
            left = Expr::Binary(BinaryOp::Union, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn starts_primary(&self) -> bool {
        match self.peek() {
            Some(Token::Literal(_) | Token::Number(_) | Token::LParen) => true,
            Some(Token::Name {
                prefix: None,
                local,
            }) => {
                self.peek_at(1) == Some(&Token::LParen) && !NODE_TYPES.contains(&local.as_str())
            }
            _ => false,
        }
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DoubleDot
                    | Token::At
                    | Token::Star
                    | Token::Name { .. }
                    | Token::UriName { .. }
            )
        )
    }

    fn parse_path(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Slash) {
            let steps = if self.starts_step() {
                self.parse_relative_steps()?
            } else {
                Vec::new()
            };
            return Ok(Expr::Path(PathStart::Root, steps));
        }
        if self.eat(&Token::DoubleSlash) {
            let mut steps = vec![descendant_or_self()];
            steps.extend(self.parse_relative_steps()?);
            return Ok(Expr::Path(PathStart::Root, steps));
        }
        if self.starts_primary() {
            let primary = self.parse_primary()?;
            let predicates = self.parse_predicates()?;
            let filter = if predicates.is_empty() {
                primary
            } else {
                Expr::Filter(Box::new(primary), predicates)
            };
            let mut steps = Vec::new();
            loop {
                if self.eat(&Token::Slash) {
                    steps.push(self.parse_step()?);
                } else if self.eat(&Token::DoubleSlash) {
                    steps.push(descendant_or_self());
                    steps.push(self.parse_step()?);
                } else {
                    break;
                }
            }
            return Ok(if steps.is_empty() {
                filter
            } else {
                Expr::Path(PathStart::Filter(Box::new(filter)), steps)
            });
        }
        if self.starts_step() {
            return Ok(Expr::Path(PathStart::Context, self.parse_relative_steps()?));
        }
        Err(format!("unexpected token {:?}", self.peek()))
    }

    fn parse_relative_steps(&mut self) -> Result<Vec<Step>, String> {
        let mut steps = vec![self.parse_step()?];
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.parse_step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(descendant_or_self());
                steps.push(self.parse_step()?);
            } else {
                return Ok(steps);
            }
        }
    }

    fn parse_step(&mut self) -> Result<Step, String> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: self.parse_predicates()?,
            });
        }
        if self.eat(&Token::DoubleDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: self.parse_predicates()?,
            });
        }

        let axis = if self.eat(&Token::At) {
            Axis::Attribute
        } else if let (Some(Token::Name { prefix: None, local }), Some(Token::DoubleColon)) =
            (self.peek(), self.peek_at(1))
        {
            let axis = Axis::from_name(local).ok_or_else(|| format!("unsupported axis '{}'", local))?;
            self.pos += 2;
            axis
        } else {
            Axis::Child
        };

        let test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest, String> {
        match self.advance() {
            Some(Token::Star) => Ok(NodeTest::Name {
                namespace: NameSpace::Unqualified,
                local: None,
            }),
            Some(Token::UriName { uri, local }) => Ok(NodeTest::Name {
                namespace: NameSpace::Uri(uri),
                local: (local != "*").then_some(local),
            }),
            Some(Token::Name { prefix, local }) => {
                if prefix.is_none()
                    && NODE_TYPES.contains(&local.as_str())
                    && self.peek() == Some(&Token::LParen)
                {
                    self.pos += 1;
                    let test = match local.as_str() {
                        "node" => NodeTest::Node,
                        "text" => NodeTest::Text,
                        "comment" => NodeTest::Comment,
                        _ => {
                            let target = match self.peek() {
                                Some(Token::Literal(target)) => Some(target.clone()),
                                _ => None,
                            };
                            if target.is_some() {
                                self.pos += 1;
                            }
                            NodeTest::Pi(target)
                        }
                    };
                    self.expect(Token::RParen)?;
                    return Ok(test);
                }
                Ok(NodeTest::Name {
                    namespace: prefix.map_or(NameSpace::Unqualified, NameSpace::Prefix),
                    local: (local != "*").then_some(local),
                })
            }
            other => Err(format!("expected node test, found {:?}", other)),
        }
    }

    fn parse_predicates(&mut self) -> Result<Vec<Expr>, String> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(Token::RBracket)?;
        }
        Ok(predicates)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::Literal(s)) => Ok(Expr::Literal(s)),
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::Name {
                prefix: None,
                local,
            }) => {
                if !FUNCTIONS.contains(&local.as_str()) {
                    return Err(format!("unknown function '{}'", local));
                }
                self.expect(Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Expr::Function(local, args))
            }
            other => Err(format!("unexpected token {:?}", other)),
        }
    }
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

/// A compiled XPath expression.
#[derive(Clone, Debug, PartialEq)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Compiles an XPath expression (no dot notation, no result type prefix).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidExpression`] on syntax errors.
    pub fn compile(source: &str) -> Result<XPath, ValidationError> {
        let invalid = |reason: String| ValidationError::invalid_expression(source, reason);
        let tokens = tokenize(source).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("empty expression".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_expr().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected trailing token {:?}", token)));
        }
        Ok(XPath {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates against the document root.
    pub fn evaluate<'a, 'input>(
        &self,
        document: &'a Document<'input>,
        namespaces: &BTreeMap<String, String>,
    ) -> Result<XPathValue<'a, 'input>, ValidationError> {
        let evaluator = Evaluator::new(document, namespaces, &self.source);
        let root = XmlNode::Node(document.root());
        evaluator.eval(
            &self.expr,
            &Focus {
                node: root,
                position: 1,
                size: 1,
            },
        )
    }
}

// ─── Evaluation ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
struct Focus<'a, 'input> {
    node: XmlNode<'a, 'input>,
    position: usize,
    size: usize,
}

struct Evaluator<'s> {
    namespaces: BTreeMap<String, String>,
    source: &'s str,
}

impl<'s> Evaluator<'s> {
    fn new(document: &Document<'_>, explicit: &BTreeMap<String, String>, source: &'s str) -> Self {
        let mut namespaces = explicit.clone();
        for node in document.descendants().filter(|n| n.is_element()) {
            for ns in node.namespaces() {
                if let Some(prefix) = ns.name() {
                    namespaces
                        .entry(prefix.to_string())
                        .or_insert_with(|| ns.uri().to_string());
                }
            }
        }
        Self { namespaces, source }
    }

    fn error(&self, reason: impl Into<String>) -> ValidationError {
        ValidationError::invalid_expression(self.source, reason)
    }

    fn eval<'a, 'input>(
        &self,
        expr: &Expr,
        focus: &Focus<'a, 'input>,
    ) -> Result<XPathValue<'a, 'input>, ValidationError> {
        match expr {
            Expr::Literal(s) => Ok(XPathValue::String(s.clone())),
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::Negate(inner) => Ok(XPathValue::Number(-self.eval(inner, focus)?.to_number())),
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right, focus),
            Expr::Function(name, args) => self.eval_function(name, args, focus),
            Expr::Filter(primary, predicates) => {
                let nodes = self.node_set(primary, focus)?;
                Ok(XPathValue::NodeSet(self.apply_predicates(nodes, predicates)?))
            }
            Expr::Path(start, steps) => {
                let mut nodes = match start {
                    PathStart::Root => vec![XmlNode::Node(focus.node.node().document().root())],
                    PathStart::Context => vec![focus.node],
                    PathStart::Filter(filter) => self.node_set(filter, focus)?,
                };
                for step in steps {
                    nodes = self.eval_step(&nodes, step)?;
                }
                Ok(XPathValue::NodeSet(nodes))
            }
        }
    }

    fn node_set<'a, 'input>(
        &self,
        expr: &Expr,
        focus: &Focus<'a, 'input>,
    ) -> Result<Vec<XmlNode<'a, 'input>>, ValidationError> {
        match self.eval(expr, focus)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            _ => Err(self.error("expression does not select a node-set")),
        }
    }

    fn eval_step<'a, 'input>(
        &self,
        context: &[XmlNode<'a, 'input>],
        step: &Step,
    ) -> Result<Vec<XmlNode<'a, 'input>>, ValidationError> {
        let mut result = Vec::new();
        for node in context {
            let mut candidates = Vec::new();
            for candidate in axis_nodes(*node, step.axis) {
                if self.test_matches(&step.test, &candidate, step.axis)? {
                    candidates.push(candidate);
                }
            }
            result.extend(self.apply_predicates(candidates, &step.predicates)?);
        }
        Ok(document_order(result))
    }

    /// Filters in the given order; positions count from 1 in that order.
    fn apply_predicates<'a, 'input>(
        &self,
        mut nodes: Vec<XmlNode<'a, 'input>>,
        predicates: &[Expr],
    ) -> Result<Vec<XmlNode<'a, 'input>>, ValidationError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (i, node) in nodes.into_iter().enumerate() {
                let focus = Focus {
                    node,
                    position: i + 1,
                    size,
                };
                let keep = match self.eval(predicate, &focus)? {
                    XPathValue::Number(n) => n == (i + 1) as f64,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<&str, ValidationError> {
        self.namespaces
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| self.error(format!("unbound namespace prefix '{}'", prefix)))
    }

    fn test_matches(
        &self,
        test: &NodeTest,
        node: &XmlNode<'_, '_>,
        axis: Axis,
    ) -> Result<bool, ValidationError> {
        let tree_node = match node {
            XmlNode::Node(n) => Some(*n),
            XmlNode::Attribute { .. } => None,
        };
        match test {
            NodeTest::Node => Ok(true),
            NodeTest::Text => Ok(tree_node.is_some_and(|n| n.is_text())),
            NodeTest::Comment => Ok(tree_node.is_some_and(|n| n.is_comment())),
            NodeTest::Pi(target) => Ok(tree_node.is_some_and(|n| {
                n.pi()
                    .is_some_and(|pi| target.as_deref().is_none_or(|t| t == pi.target))
            })),
            NodeTest::Name { namespace, local } => {
                let principal = if axis == Axis::Attribute {
                    node.is_attribute()
                } else {
                    node.is_element()
                };
                if !principal {
                    return Ok(false);
                }
                if local.as_deref().is_some_and(|l| l != node.local_name()) {
                    return Ok(false);
                }
                let actual = node.namespace();
                Ok(match namespace {
                    NameSpace::Uri(uri) if uri.is_empty() => actual.is_none(),
                    NameSpace::Uri(uri) => actual.as_deref() == Some(uri.as_str()),
                    NameSpace::Prefix(prefix) => {
                        actual.as_deref() == Some(self.resolve_prefix(prefix)?)
                    }
                    NameSpace::Unqualified if node.is_attribute() => actual.is_none(),
                    NameSpace::Unqualified => match actual {
                        None => true,
                        Some(uri) => node.node().lookup_namespace_uri(None) == Some(uri.as_str()),
                    },
                })
            }
        }
    }

    fn eval_binary<'a, 'input>(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        focus: &Focus<'a, 'input>,
    ) -> Result<XPathValue<'a, 'input>, ValidationError> {
        match op {
            BinaryOp::Or => {
                let l = self.eval(left, focus)?.to_boolean();
                Ok(XPathValue::Boolean(l || self.eval(right, focus)?.to_boolean()))
            }
            BinaryOp::And => {
                let l = self.eval(left, focus)?.to_boolean();
                Ok(XPathValue::Boolean(l && self.eval(right, focus)?.to_boolean()))
            }
            BinaryOp::Union => {
                let mut nodes = self.node_set(left, focus)?;
                nodes.extend(self.node_set(right, focus)?);
                Ok(XPathValue::NodeSet(document_order(nodes)))
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let l = self.eval(left, focus)?.to_number();
                let r = self.eval(right, focus)?.to_number();
                Ok(XPathValue::Number(match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => l / r,
                    _ => l % r,
                }))
            }
            _ => {
                let l = self.eval(left, focus)?;
                let r = self.eval(right, focus)?;
                Ok(XPathValue::Boolean(compare(op, &l, &r)))
            }
        }
    }

    fn eval_function<'a, 'input>(
        &self,
        name: &str,
        args: &[Expr],
        focus: &Focus<'a, 'input>,
    ) -> Result<XPathValue<'a, 'input>, ValidationError> {
        let arity = |min: usize, max: usize| -> Result<(), ValidationError> {
            if args.len() < min || args.len() > max {
                Err(self.error(format!("wrong number of arguments for {}()", name)))
            } else {
                Ok(())
            }
        };
        let string_arg = |i: usize| -> Result<String, ValidationError> {
            match args.get(i) {
                Some(arg) => Ok(self.eval(arg, focus)?.to_xpath_string()),
                None => Ok(focus.node.string_value()),
            }
        };
        let number_arg = |i: usize| -> Result<f64, ValidationError> {
            match args.get(i) {
                Some(arg) => Ok(self.eval(arg, focus)?.to_number()),
                None => Ok(string_to_number(&focus.node.string_value())),
            }
        };
        let first_node = || -> Result<Option<XmlNode<'a, 'input>>, ValidationError> {
            match args.first() {
                Some(arg) => Ok(self.node_set(arg, focus)?.first().copied()),
                None => Ok(Some(focus.node)),
            }
        };

        let value = match name {
            "last" => {
                arity(0, 0)?;
                XPathValue::Number(focus.size as f64)
            }
            "position" => {
                arity(0, 0)?;
                XPathValue::Number(focus.position as f64)
            }
            "count" => {
                arity(1, 1)?;
                XPathValue::Number(self.node_set(&args[0], focus)?.len() as f64)
            }
            "string" => {
                arity(0, 1)?;
                XPathValue::String(string_arg(0)?)
            }
            "name" => {
                arity(0, 1)?;
                XPathValue::String(first_node()?.map(|n| n.qualified_name()).unwrap_or_default())
            }
            "local-name" => {
                arity(0, 1)?;
                XPathValue::String(first_node()?.map(|n| n.local_name()).unwrap_or_default())
            }
            "namespace-uri" => {
                arity(0, 1)?;
                XPathValue::String(first_node()?.and_then(|n| n.namespace()).unwrap_or_default())
            }
            "boolean" => {
                arity(1, 1)?;
                XPathValue::Boolean(self.eval(&args[0], focus)?.to_boolean())
            }
            "not" => {
                arity(1, 1)?;
                XPathValue::Boolean(!self.eval(&args[0], focus)?.to_boolean())
            }
            "true" => {
                arity(0, 0)?;
                XPathValue::Boolean(true)
            }
            "false" => {
                arity(0, 0)?;
                XPathValue::Boolean(false)
            }
            "number" => {
                arity(0, 1)?;
                XPathValue::Number(number_arg(0)?)
            }
            "sum" => {
                arity(1, 1)?;
                let nodes = self.node_set(&args[0], focus)?;
                XPathValue::Number(nodes.iter().map(|n| string_to_number(&n.string_value())).sum())
            }
            "floor" => {
                arity(1, 1)?;
                XPathValue::Number(number_arg(0)?.floor())
            }
            "ceiling" => {
                arity(1, 1)?;
                XPathValue::Number(number_arg(0)?.ceil())
            }
            "round" => {
                arity(1, 1)?;
                XPathValue::Number((number_arg(0)? + 0.5).floor())
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(self.error("concat() needs at least two arguments"));
                }
                let mut result = String::new();
                for i in 0..args.len() {
                    result.push_str(&string_arg(i)?);
                }
                XPathValue::String(result)
            }
            "contains" => {
                arity(2, 2)?;
                XPathValue::Boolean(string_arg(0)?.contains(&string_arg(1)?))
            }
            "starts-with" => {
                arity(2, 2)?;
                XPathValue::Boolean(string_arg(0)?.starts_with(&string_arg(1)?))
            }
            "ends-with" => {
                arity(2, 2)?;
                XPathValue::Boolean(string_arg(0)?.ends_with(&string_arg(1)?))
            }
            "substring-before" => {
                arity(2, 2)?;
                let haystack = string_arg(0)?;
                let needle = string_arg(1)?;
                XPathValue::String(
                    haystack
                        .find(&needle)
                        .map(|i| haystack[..i].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring-after" => {
                arity(2, 2)?;
                let haystack = string_arg(0)?;
                let needle = string_arg(1)?;
                XPathValue::String(
                    haystack
                        .find(&needle)
                        .map(|i| haystack[i + needle.len()..].to_string())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                arity(2, 3)?;
                let text = string_arg(0)?;
                let start = (number_arg(1)? + 0.5).floor();
                let end = if args.len() == 3 {
                    start + (number_arg(2)? + 0.5).floor()
                } else {
                    f64::INFINITY
                };
                XPathValue::String(
                    text.chars()
                        .enumerate()
                        .filter(|(i, _)| {
                            let p = (*i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "string-length" => {
                arity(0, 1)?;
                XPathValue::Number(string_arg(0)?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1)?;
                XPathValue::String(
                    string_arg(0)?
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            "translate" => {
                arity(3, 3)?;
                let from: Vec<char> = string_arg(1)?.chars().collect();
                let to: Vec<char> = string_arg(2)?.chars().collect();
                XPathValue::String(
                    string_arg(0)?
                        .chars()
                        .filter_map(|c| match from.iter().position(|&f| f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            other => return Err(self.error(format!("unknown function '{}'", other))),
        };
        Ok(value)
    }
}

fn document_order<'a, 'input>(mut nodes: Vec<XmlNode<'a, 'input>>) -> Vec<XmlNode<'a, 'input>> {
    nodes.sort_by_key(XmlNode::order_key);
    nodes.dedup_by_key(|n| n.order_key());
    nodes
}

fn axis_nodes<'a, 'input>(node: XmlNode<'a, 'input>, axis: Axis) -> Vec<XmlNode<'a, 'input>> {
    let wrap = |n: Node<'a, 'input>| XmlNode::Node(n);
    let tree = match node {
        XmlNode::Node(n) => n,
        XmlNode::Attribute { owner, .. } => {
            return match axis {
                Axis::SelfAxis | Axis::DescendantOrSelf => vec![node],
                Axis::Parent => vec![XmlNode::Node(owner)],
                Axis::Ancestor => owner.ancestors().map(wrap).collect(),
                Axis::AncestorOrSelf => std::iter::once(node)
                    .chain(owner.ancestors().map(wrap))
                    .collect(),
                _ => Vec::new(),
            };
        }
    };

    let mut nodes: Vec<XmlNode<'a, 'input>> = match axis {
        Axis::Child => tree.children().map(wrap).collect(),
        Axis::Descendant => tree.descendants().skip(1).map(wrap).collect(),
        Axis::DescendantOrSelf => tree.descendants().map(wrap).collect(),
        Axis::Parent => tree.parent().map(wrap).into_iter().collect(),
        Axis::Ancestor => tree.ancestors().skip(1).map(wrap).collect(),
        Axis::AncestorOrSelf => tree.ancestors().map(wrap).collect(),
        Axis::FollowingSibling => tree.next_siblings().skip(1).map(wrap).collect(),
        Axis::PrecedingSibling => tree.prev_siblings().skip(1).map(wrap).collect(),
        Axis::SelfAxis => vec![node],
        Axis::Attribute => {
            if tree.is_element() {
                (0..tree.attributes().len())
                    .map(|index| XmlNode::Attribute { owner: tree, index })
                    .collect()
            } else {
                Vec::new()
            }
        }
        Axis::Following => tree
            .ancestors()
            .flat_map(|a| a.next_siblings().skip(1))
            .flat_map(|s| s.descendants())
            .map(wrap)
            .collect(),
        Axis::Preceding => {
            let ancestors: Vec<Node<'a, 'input>> = tree.ancestors().collect();
            tree.document()
                .root()
                .descendants()
                .take_while(|n| *n != tree)
                .filter(|n| !ancestors.contains(n))
                .map(wrap)
                .collect()
        }
    };

    if axis == Axis::Following {
        nodes = document_order(nodes);
    }
    if axis == Axis::Preceding {
        nodes.reverse();
    }
    nodes
}

fn compare(op: BinaryOp, left: &XPathValue<'_, '_>, right: &XPathValue<'_, '_>) -> bool {
    use XPathValue::*;
    match (left, right) {
        (NodeSet(l), NodeSet(r)) => l.iter().any(|a| {
            let a = a.string_value();
            r.iter().any(|b| compare_strings(op, &a, &b.string_value()))
        }),
        (NodeSet(nodes), other) => nodes.iter().any(|n| {
            compare_atomic(op, &String(n.string_value()), other)
        }) || (matches!(other, Boolean(_)) && compare_atomic(op, &Boolean(!nodes.is_empty()), other)),
        (other, NodeSet(nodes)) => nodes.iter().any(|n| {
            compare_atomic(op, other, &String(n.string_value()))
        }) || (matches!(other, Boolean(_)) && compare_atomic(op, other, &Boolean(!nodes.is_empty()))),
        _ => compare_atomic(op, left, right),
    }
}

fn compare_strings(op: BinaryOp, a: &str, b: &str) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => compare_numbers(op, string_to_number(a), string_to_number(b)),
    }
}

fn compare_atomic(op: BinaryOp, left: &XPathValue<'_, '_>, right: &XPathValue<'_, '_>) -> bool {
    use XPathValue::*;
    match op {
        BinaryOp::Eq | BinaryOp::NotEq => {
            let equal = match (left, right) {
                (Boolean(_), _) | (_, Boolean(_)) => left.to_boolean() == right.to_boolean(),
                (Number(_), _) | (_, Number(_)) => left.to_number() == right.to_number(),
                _ => left.to_xpath_string() == right.to_xpath_string(),
            };
            (op == BinaryOp::Eq) == equal
        }
        _ => compare_numbers(op, left.to_number(), right.to_number()),
    }
}

fn compare_numbers(op: BinaryOp, a: f64, b: f64) -> bool {
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Le => a <= b,
        BinaryOp::Gt => a > b,
        BinaryOp::Ge => a >= b,
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        _ => false,
    }
}

// ─── Entry points ───────────────────────────────────────────────────────────

/// True when the expression uses XPath syntax rather than dot notation.
pub fn is_xpath_expression(expression: &str) -> bool {
    expression.contains('/') || expression.contains('(')
}

fn dot_notation_segments(expression: &str) -> Option<Vec<&str>> {
    let segments: Vec<&str> = expression.trim().split('.').collect();
    let valid = segments.iter().all(|s| {
        let mut chars = s.chars();
        chars.next().is_some_and(is_name_start) && chars.all(|c| is_name_char(c) || c == ':')
    });
    valid.then_some(segments)
}

/// Evaluates an XPath or dot notation expression against the document root.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidExpression`] on syntax errors and unbound prefixes.
pub fn evaluate<'a, 'input>(
    document: &'a Document<'input>,
    expression: &str,
    namespaces: &BTreeMap<String, String>,
) -> Result<XPathValue<'a, 'input>, ValidationError> {
    if !is_xpath_expression(expression)
        && let Some(segments) = dot_notation_segments(expression)
    {
        let element_path = format!("/{}", segments.join("/"));
        let value = XPath::compile(&element_path)?.evaluate(document, namespaces)?;
        if value.to_boolean() || segments.len() < 2 {
            return Ok(value);
        }
        let (last, parents) = segments.split_last().unwrap_or((&"", &[]));
        let attribute_path = format!("/{}/@{}", parents.join("/"), last);
        return XPath::compile(&attribute_path)?.evaluate(document, namespaces);
    }
    XPath::compile(expression)?.evaluate(document, namespaces)
}

/// Nodes selected by an expression; non node-set results select nothing.
pub fn select_nodes<'a, 'input>(
    document: &'a Document<'input>,
    expression: &str,
    namespaces: &BTreeMap<String, String>,
) -> Result<Vec<XmlNode<'a, 'input>>, ValidationError> {
    match evaluate(document, expression, namespaces)? {
        XPathValue::NodeSet(nodes) => Ok(nodes),
        _ => Ok(Vec::new()),
    }
}

/// Evaluates an expression that may carry a result type prefix (`string:`, `node-set:`, ...).
///
/// # Errors
///
/// Returns [`ValidationError::ExpressionNotFound`] when a node result selects nothing.
pub fn evaluate_typed(
    document: &Document<'_>,
    expression: &str,
    namespaces: &BTreeMap<String, String>,
) -> Result<XPathResult, ValidationError> {
    let (result_type, expression) = XpathResultType::from_expression(expression);
    let value = evaluate(document, expression, namespaces)?;

    Ok(match result_type {
        XpathResultType::Node => match value {
            XPathValue::NodeSet(nodes) => {
                let node = nodes.first().ok_or_else(|| ValidationError::ExpressionNotFound {
                    expression: expression.to_string(),
                })?;
                XPathResult::Node(node.string_value())
            }
            other => XPathResult::Node(other.to_xpath_string()),
        },
        XpathResultType::NodeSet => match value {
            XPathValue::NodeSet(nodes) => {
                XPathResult::NodeSet(nodes.iter().map(XmlNode::string_value).collect())
            }
            other => XPathResult::NodeSet(vec![other.to_xpath_string()]),
        },
        XpathResultType::String => XPathResult::String(value.to_xpath_string()),
        XpathResultType::Number => XPathResult::Number(value.to_number()),
        XpathResultType::Integer => XPathResult::Integer(value.to_number() as i64),
        XpathResultType::Boolean => XPathResult::Boolean(value.to_boolean()),
    })
}
