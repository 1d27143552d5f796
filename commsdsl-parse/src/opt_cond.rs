//! Condition expressions gating optional fields and messages.
//!
//! A condition is either a single comparison (`$len > 0`, `!$flags.b0`) or an
//! `and`/`or` list of nested conditions. Expressions are split into operands
//! here; resolving the operands against the surrounding fields happens in
//! [`CondData::verify`] once those fields are known.

use crate::arena::{Arena, FieldId, InterfaceId};
use crate::common::{INTERFACE_REF_PREFIX, SIBLING_REF_PREFIX, parse_int_literal};
use crate::error::ParseError;
use crate::field::{FieldRefType, RefInfo};
use crate::xml::XmlElement;

const ESCAPE: char = '\\';

/// Comparison operators, longest first so `>=` is not read as `>`.
const OPERATORS: [&str; 6] = ["!=", ">=", "<=", "=", ">", "<"];

/// Kind of a condition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptCondKind {
    /// Single comparison.
    Expr,
    /// Combination of nested conditions.
    List,
}

/// Combination operator of a condition list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondListType {
    /// All nested conditions must hold.
    And,
    /// At least one nested condition must hold.
    Or,
}

impl CondListType {
    /// Parses the list type from an element name.
    #[must_use]
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            _ => None,
        }
    }
}

/// What an operand of a comparison refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperandType {
    /// Empty operand.
    #[default]
    Invalid,
    /// Literal value.
    Value,
    /// Sibling field (`$name`).
    SiblingRef,
    /// Field of an interface (`%name`).
    InterfaceRef,
}

/// How a referenced field is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// The value itself.
    #[default]
    Itself,
    /// Serialised size (`$#name`).
    Size,
    /// Existence of an optional field (`$?name`).
    Exists,
}

/// Decoded operand of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperandInfo {
    /// Operand category.
    pub operand_type: OperandType,
    /// Access mode of a reference.
    pub mode: AccessMode,
    /// Literal value, or the reference path without prefixes.
    pub access: String,
}

impl OperandInfo {
    fn decode(operand: &str) -> Self {
        let mut chars = operand.chars();
        let operand_type = match chars.next() {
            None => return Self::default(),
            Some(SIBLING_REF_PREFIX) => OperandType::SiblingRef,
            Some(INTERFACE_REF_PREFIX) => OperandType::InterfaceRef,
            Some(_) => {
                return Self {
                    operand_type: OperandType::Value,
                    mode: AccessMode::Itself,
                    access: operand.to_string(),
                };
            }
        };

        let rest = chars.as_str();
        let (mode, access) = match rest.chars().next() {
            Some('#') => (AccessMode::Size, &rest[1..]),
            Some('?') => (AccessMode::Exists, &rest[1..]),
            _ => (AccessMode::Itself, rest),
        };

        Self {
            operand_type,
            mode,
            access: access.to_string(),
        }
    }
}

/// Single comparison of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CondExpr {
    left: String,
    op: String,
    right: String,
}

/// Combination of nested conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondList {
    list_type: CondListType,
    conds: Vec<CondData>,
}

/// Owned condition tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CondData {
    /// Single comparison.
    Expr(CondExpr),
    /// Combination of nested conditions.
    List(CondList),
}

fn is_ref(operand: &str) -> bool {
    operand.starts_with(SIBLING_REF_PREFIX) || operand.starts_with(INTERFACE_REF_PREFIX)
}

/// Finds the first unescaped occurrence of `op`.
fn find_operator(expr: &str, op: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = expr[from..].find(op) {
        let pos = from + found;
        if !expr[..pos].ends_with(ESCAPE) {
            return Some(pos);
        }
        from = pos + op.len();
    }
    None
}

impl CondExpr {
    /// Splits an expression string into its operands.
    ///
    /// # Errors
    /// Returns `ParseError::InvalidCondition` if the text is not a comparison
    /// or a single field check.
    pub fn parse(expr: &str) -> Result<Self, ParseError> {
        let text = expr.trim();
        if text.is_empty() {
            return Err(ParseError::condition(expr, "empty condition"));
        }

        for op in OPERATORS {
            let Some(pos) = find_operator(text, op) else {
                continue;
            };

            let left = text[..pos].trim_end();
            let right = text[pos + op.len()..].trim_start();
            if left.is_empty() || right.is_empty() {
                return Err(ParseError::condition(expr, "missing comparison operand"));
            }

            if !is_ref(left) {
                return Err(ParseError::condition(
                    expr,
                    "left side of comparison must dereference other field",
                ));
            }

            return Ok(Self {
                left: left.to_string(),
                op: op.to_string(),
                right: right.to_string(),
            });
        }

        if is_ref(text) {
            return Ok(Self {
                right: text.to_string(),
                ..Self::default()
            });
        }

        let Some(negated) = text.strip_prefix('!') else {
            return Err(ParseError::condition(expr, "not a valid condition expression"));
        };

        let negated = negated.trim_start();
        if !is_ref(negated) {
            return Err(ParseError::condition(
                expr,
                "the check must dereference other field",
            ));
        }

        Ok(Self {
            left: String::new(),
            op: "!".to_string(),
            right: negated.to_string(),
        })
    }

    /// Left operand; empty for single field checks.
    #[must_use]
    pub fn left(&self) -> &str {
        &self.left
    }

    /// Operator; empty or `!` for single field checks.
    #[must_use]
    pub fn op(&self) -> &str {
        &self.op
    }

    /// Right operand.
    #[must_use]
    pub fn right(&self) -> &str {
        &self.right
    }

    fn text(&self) -> String {
        if self.left.is_empty() {
            format!("{}{}", self.op, self.right)
        } else {
            format!("{} {} {}", self.left, self.op, self.right)
        }
    }
}

impl CondList {
    /// Parses an `<and>`/`<or>` element.
    ///
    /// # Errors
    /// Returns `ParseError` if the element contains anything but conditions
    /// or holds fewer than two of them.
    pub fn parse(elem: &XmlElement) -> Result<Self, ParseError> {
        let list_type = CondListType::from_element(&elem.name)
            .ok_or_else(|| ParseError::unknown_element(&elem.name, "condition"))?;

        let mut conds = Vec::with_capacity(elem.children.len());
        for child in &elem.children {
            if child.name == "cond" {
                let text = child.attr("value").unwrap_or(child.text.as_str());
                conds.push(CondData::Expr(CondExpr::parse(text)?));
                continue;
            }

            if CondListType::from_element(&child.name).is_none() {
                return Err(ParseError::unknown_element(&child.name, &elem.name));
            }
            conds.push(CondData::List(Self::parse(child)?));
        }

        if conds.len() < 2 {
            return Err(ParseError::structure(format!(
                "condition bundling element '{}' is expected to have at least 2 conditions",
                elem.name
            )));
        }

        Ok(Self { list_type, conds })
    }

    /// Combination operator.
    #[must_use]
    pub fn list_type(&self) -> CondListType {
        self.list_type
    }

    /// Nested conditions in document order.
    #[must_use]
    pub fn conds(&self) -> &[CondData] {
        &self.conds
    }
}

/// Fields visible to a condition while it is verified.
#[derive(Clone, Copy)]
pub(crate) struct CondContext<'a> {
    pub arena: &'a Arena,
    pub siblings: &'a [FieldId],
    pub interfaces: &'a [InterfaceId],
}

impl CondContext<'_> {
    fn interface_refs(&self, reference: &str) -> Vec<RefInfo> {
        self.interfaces
            .iter()
            .map(|id| {
                self.arena
                    .process_sibling_ref(&self.arena.interface(*id).fields, reference)
            })
            .filter(|info| info.field.is_some())
            .collect()
    }
}

impl CondData {
    /// Reads a condition property of `owner`.
    ///
    /// The condition may be an attribute, a child element with a value, or
    /// a child element wrapping a single `<and>`/`<or>` list.
    pub(crate) fn from_property(
        value: Option<&str>,
        complex: Option<&XmlElement>,
        prop: &str,
    ) -> Result<Option<Self>, ParseError> {
        if let Some(text) = value {
            return Ok(Some(Self::Expr(CondExpr::parse(text)?)));
        }

        let Some(elem) = complex else {
            return Ok(None);
        };

        match elem.children.as_slice() {
            [single] if CondListType::from_element(&single.name).is_some() => {
                Ok(Some(Self::List(CondList::parse(single)?)))
            }
            _ => Err(ParseError::structure(format!(
                "property '{prop}' must contain a single <and> or <or> element"
            ))),
        }
    }

    /// Returns the kind of the condition.
    #[must_use]
    pub fn kind(&self) -> OptCondKind {
        match self {
            Self::Expr(_) => OptCondKind::Expr,
            Self::List(_) => OptCondKind::List,
        }
    }

    /// Returns true if any operand refers to an interface field.
    #[must_use]
    pub fn has_interface_reference(&self) -> bool {
        match self {
            Self::Expr(e) => {
                e.left.starts_with(INTERFACE_REF_PREFIX) || e.right.starts_with(INTERFACE_REF_PREFIX)
            }
            Self::List(l) => l.conds.iter().any(Self::has_interface_reference),
        }
    }

    /// Checks that every operand resolves and every comparison is meaningful.
    pub(crate) fn verify(&self, ctx: &CondContext<'_>) -> Result<(), ParseError> {
        match self {
            Self::Expr(e) if e.left.is_empty() => verify_single_check(e, ctx),
            Self::Expr(e) => verify_comparison(e, ctx),
            Self::List(l) => l.conds.iter().try_for_each(|c| c.verify(ctx)),
        }
    }
}

fn verify_single_check(expr: &CondExpr, ctx: &CondContext<'_>) -> Result<(), ParseError> {
    let arena = ctx.arena;
    if let Some(reference) = expr.right.strip_prefix(SIBLING_REF_PREFIX) {
        let info = arena.process_sibling_ref(ctx.siblings, reference);
        return match info.ref_type {
            FieldRefType::InnerValue | FieldRefType::Exists if info.field.is_some() => Ok(()),
            _ => Err(ParseError::condition(
                expr.text(),
                format!("'{}' is invalid sibling reference", expr.right),
            )),
        };
    }

    let reference = expr
        .right
        .strip_prefix(INTERFACE_REF_PREFIX)
        .unwrap_or(&expr.right);
    let has_bit = ctx.interface_refs(reference).iter().any(|info| {
        info.ref_type == FieldRefType::InnerValue
            && info
                .field
                .is_some_and(|f| arena.field(f).kind() == crate::field::FieldKind::Set)
    });

    if has_bit {
        Ok(())
    } else {
        Err(ParseError::condition(
            expr.text(),
            format!(
                "'{}' is expected to dereference an existing bit of a set field in one of the interfaces",
                expr.right
            ),
        ))
    }
}

fn verify_size_value(expr: &CondExpr) -> Result<(), ParseError> {
    if parse_int_literal(&expr.right).is_some() {
        Ok(())
    } else {
        Err(ParseError::condition(
            expr.text(),
            "size comparison requires a numeric value",
        ))
    }
}

/// Resolves the right operand into candidate fields for a field comparison.
fn right_fields(expr: &CondExpr, ctx: &CondContext<'_>) -> Result<Option<Vec<FieldId>>, ParseError> {
    if let Some(reference) = expr.right.strip_prefix(SIBLING_REF_PREFIX) {
        let info = ctx.arena.process_sibling_ref(ctx.siblings, reference);
        return match (info.field, info.ref_type) {
            (Some(field), FieldRefType::Field) => Ok(Some(vec![field])),
            _ => Err(ParseError::condition(
                expr.text(),
                format!("'{}' is expected to dereference existing sibling field", expr.right),
            )),
        };
    }

    if let Some(reference) = expr.right.strip_prefix(INTERFACE_REF_PREFIX) {
        let fields: Vec<FieldId> = ctx
            .interface_refs(reference)
            .into_iter()
            .filter(|info| info.ref_type == FieldRefType::Field)
            .filter_map(|info| info.field)
            .collect();
        if fields.is_empty() {
            return Err(ParseError::condition(
                expr.text(),
                format!("'{}' is not valid field dereference expression", expr.right),
            ));
        }
        return Ok(Some(fields));
    }

    Ok(None)
}

fn verify_comparison(expr: &CondExpr, ctx: &CondContext<'_>) -> Result<(), ParseError> {
    let arena = ctx.arena;
    let left: Vec<RefInfo> = match expr.left.strip_prefix(SIBLING_REF_PREFIX) {
        Some(reference) => {
            let info = arena.process_sibling_ref(ctx.siblings, reference);
            if info.field.is_none() {
                return Err(ParseError::condition(
                    expr.text(),
                    format!("'{}' is expected to dereference existing sibling field", expr.left),
                ));
            }
            vec![info]
        }
        None => {
            let reference = expr
                .left
                .strip_prefix(INTERFACE_REF_PREFIX)
                .unwrap_or(&expr.left);
            ctx.interface_refs(reference)
        }
    };

    if left.iter().any(|info| info.ref_type == FieldRefType::Size) {
        return verify_size_value(expr);
    }

    let left_fields: Vec<FieldId> = left
        .iter()
        .filter(|info| info.ref_type == FieldRefType::Field)
        .filter_map(|info| info.field)
        .collect();
    if left_fields.is_empty() {
        return Err(ParseError::condition(
            expr.text(),
            format!("'{}' is not valid field dereference expression", expr.left),
        ));
    }

    let comparable = match right_fields(expr, ctx)? {
        Some(rights) => left_fields.iter().any(|l| {
            rights
                .iter()
                .any(|r| arena.is_comparable_to_field(*l, *r))
        }),
        None => left_fields
            .iter()
            .any(|l| arena.is_comparable_to_value(*l, &expr.right)),
    };

    if comparable {
        Ok(())
    } else {
        Err(ParseError::condition(
            expr.text(),
            format!("'{}' cannot be compared to '{}'", expr.left, expr.right),
        ))
    }
}

/// Borrowed view of a condition.
///
/// An invalid handle stands for an absent condition.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptCond<'a> {
    data: Option<&'a CondData>,
}

impl<'a> OptCond<'a> {
    pub(crate) fn new(data: Option<&'a CondData>) -> Self {
        Self { data }
    }

    /// Returns true if a condition is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the kind of the condition, `None` for an invalid handle.
    #[must_use]
    pub fn kind(&self) -> Option<OptCondKind> {
        self.data.map(CondData::kind)
    }

    /// Returns the comparison view if this is a single expression.
    #[must_use]
    pub fn as_expr(&self) -> Option<OptCondExpr<'a>> {
        match self.data {
            Some(CondData::Expr(e)) => Some(OptCondExpr { data: e }),
            _ => None,
        }
    }

    /// Returns the list view if this is a combination.
    #[must_use]
    pub fn as_list(&self) -> Option<OptCondList<'a>> {
        match self.data {
            Some(CondData::List(l)) => Some(OptCondList { data: l }),
            _ => None,
        }
    }

    /// Returns the underlying owned condition.
    #[must_use]
    pub fn data(&self) -> Option<&'a CondData> {
        self.data
    }
}

/// Borrowed view of a single comparison.
#[derive(Debug, Clone, Copy)]
pub struct OptCondExpr<'a> {
    data: &'a CondExpr,
}

impl<'a> OptCondExpr<'a> {
    /// Left operand.
    #[must_use]
    pub fn left(&self) -> &'a str {
        &self.data.left
    }

    /// Operator.
    #[must_use]
    pub fn op(&self) -> &'a str {
        &self.data.op
    }

    /// Right operand.
    #[must_use]
    pub fn right(&self) -> &'a str {
        &self.data.right
    }

    /// Decoded left operand.
    #[must_use]
    pub fn left_info(&self) -> OperandInfo {
        OperandInfo::decode(&self.data.left)
    }

    /// Decoded right operand.
    #[must_use]
    pub fn right_info(&self) -> OperandInfo {
        OperandInfo::decode(&self.data.right)
    }
}

/// Borrowed view of a condition list.
#[derive(Debug, Clone, Copy)]
pub struct OptCondList<'a> {
    data: &'a CondList,
}

impl<'a> OptCondList<'a> {
    /// Combination operator.
    #[must_use]
    pub fn list_type(&self) -> CondListType {
        self.data.list_type
    }

    /// Nested conditions in document order.
    #[must_use]
    pub fn conds(&self) -> Vec<OptCond<'a>> {
        self.data
            .conds
            .iter()
            .map(|c| OptCond::new(Some(c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;

    #[test]
    fn test_parse_comparisons() {
        let e = CondExpr::parse("$F1 >= 5").expect("valid");
        assert_eq!((e.left(), e.op(), e.right()), ("$F1", ">=", "5"));

        let e = CondExpr::parse("$F1 != $F2").expect("valid");
        assert_eq!(e.op(), "!=");

        let e = CondExpr::parse("%Version<3").expect("valid");
        assert_eq!((e.left(), e.op(), e.right()), ("%Version", "<", "3"));
    }

    #[test]
    fn test_parse_single_checks() {
        let e = CondExpr::parse("$Flags.B0").expect("valid");
        assert!(e.left().is_empty());
        assert!(e.op().is_empty());
        assert_eq!(e.right(), "$Flags.B0");

        let e = CondExpr::parse("! $Flags.B0").expect("valid");
        assert_eq!((e.op(), e.right()), ("!", "$Flags.B0"));
    }

    #[test]
    fn test_escaped_operator() {
        let e = CondExpr::parse(r"$S = a\=b").expect("valid");
        assert_eq!(e.right(), r"a\=b");
    }

    #[test]
    fn test_invalid_expressions() {
        assert!(CondExpr::parse("").is_err());
        assert!(CondExpr::parse("5 = $F1").is_err());
        assert!(CondExpr::parse("$F1 =").is_err());
        assert!(CondExpr::parse("F1").is_err());
        assert!(CondExpr::parse("!F1").is_err());
    }

    #[test]
    fn test_operand_info() {
        let e = CondExpr::parse("$#Data > 0").expect("valid");
        let handle = OptCondExpr { data: &e };
        let left = handle.left_info();
        assert_eq!(left.operand_type, OperandType::SiblingRef);
        assert_eq!(left.mode, AccessMode::Size);
        assert_eq!(left.access, "Data");
        assert_eq!(handle.right_info().operand_type, OperandType::Value);
    }

    #[test]
    fn test_parse_list() {
        let root = parse_document(
            r#"<or><cond value="$A = 1"/><and><cond>$B = 2</cond><cond>$C = 3</cond></and></or>"#,
        )
        .expect("doc");
        let list = CondList::parse(&root).expect("valid list");
        assert_eq!(list.list_type(), CondListType::Or);
        assert_eq!(list.conds().len(), 2);
        let data = CondData::List(list);
        let cond = OptCond::new(Some(&data));
        assert_eq!(cond.kind(), Some(OptCondKind::List));
        let nested = cond.as_list().expect("list").conds();
        assert_eq!(nested[1].kind(), Some(OptCondKind::List));
        assert_eq!(nested[0].as_expr().expect("expr").right(), "1");
    }

    #[test]
    fn test_list_needs_two_conditions() {
        let root = parse_document(r#"<and><cond value="$A = 1"/></and>"#).expect("doc");
        assert!(CondList::parse(&root).is_err());
        assert!(!OptCond::default().is_valid());
        assert_eq!(OptCond::default().kind(), None);
    }
}
