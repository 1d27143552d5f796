//! Message definitions.

use crate::alias::{Alias, AliasData};
use crate::arena::{Arena, FieldId, MessageId, NamespaceId, SchemaId};
use crate::common::NOT_YET_DEPRECATED;
use crate::field::Field;
use crate::opt_cond::{CondData, OptCond};
use crate::types::{Overrides, Sender};
use std::fmt;

/// Stored message definition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MessageData {
    pub name: String,
    pub id: u64,
    pub order: u32,
    pub display_name: String,
    pub description: String,
    pub fields: Vec<FieldId>,
    pub sender: Sender,
    pub since_version: u32,
    pub deprecated_since: u32,
    pub removed: bool,
    pub aliases: Vec<AliasData>,
    pub construct: Option<CondData>,
    pub read_cond: Option<CondData>,
    pub valid_cond: Option<CondData>,
    pub overrides: Overrides,
    pub platforms: Vec<String>,
    pub validate_min_length: Option<usize>,
    pub customizable: bool,
    pub fail_on_invalid: bool,
    pub copy_code_from: String,
    pub external_ref: String,
    pub schema: SchemaId,
    pub namespace: NamespaceId,
    pub location: String,
}

impl MessageData {
    pub fn new(name: impl Into<String>, schema: SchemaId, namespace: NamespaceId) -> Self {
        Self {
            name: name.into(),
            id: 0,
            order: 0,
            display_name: String::new(),
            description: String::new(),
            fields: Vec::new(),
            sender: Sender::Both,
            since_version: 0,
            deprecated_since: NOT_YET_DEPRECATED,
            removed: false,
            aliases: Vec::new(),
            construct: None,
            read_cond: None,
            valid_cond: None,
            overrides: Overrides::default(),
            platforms: Vec::new(),
            validate_min_length: None,
            customizable: false,
            fail_on_invalid: false,
            copy_code_from: String::new(),
            external_ref: String::new(),
            schema,
            namespace,
            location: String::new(),
        }
    }
}

/// Borrowed view of a message definition.
#[derive(Clone, Copy)]
pub struct Message<'a> {
    arena: &'a Arena,
    id: MessageId,
}

impl<'a> Message<'a> {
    pub(crate) fn new(arena: &'a Arena, id: MessageId) -> Self {
        Self { arena, id }
    }

    fn data(&self) -> &'a MessageData {
        self.arena.message(self.id)
    }

    /// Arena identifier of the message.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Message name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    /// Numeric message id.
    #[must_use]
    pub fn numeric_id(&self) -> u64 {
        self.data().id
    }

    /// Order among messages sharing the numeric id.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.data().order
    }

    /// Name shown to users, empty if not set.
    #[must_use]
    pub fn display_name(&self) -> &'a str {
        &self.data().display_name
    }

    /// Free text description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data().description
    }

    /// Fields in wire order.
    #[must_use]
    pub fn fields(&self) -> Vec<Field<'a>> {
        self.data()
            .fields
            .iter()
            .map(|id| Field::new(self.arena, *id))
            .collect()
    }

    /// Side sending the message.
    #[must_use]
    pub fn sender(&self) -> Sender {
        self.data().sender
    }

    /// Version the message was introduced in.
    #[must_use]
    pub fn since_version(&self) -> u32 {
        self.data().since_version
    }

    /// Version the message was deprecated in.
    #[must_use]
    pub fn deprecated_since(&self) -> u32 {
        self.data().deprecated_since
    }

    /// Message is removed once deprecated.
    #[must_use]
    pub fn is_deprecated_removed(&self) -> bool {
        self.data().removed
    }

    /// Aliases of message fields.
    #[must_use]
    pub fn aliases(&self) -> Vec<Alias<'a>> {
        self.data().aliases.iter().map(Alias::new).collect()
    }

    /// Condition the field values satisfy right after construction.
    #[must_use]
    pub fn construct(&self) -> OptCond<'a> {
        OptCond::new(self.data().construct.as_ref())
    }

    /// Condition to check before reading.
    #[must_use]
    pub fn read_cond(&self) -> OptCond<'a> {
        OptCond::new(self.data().read_cond.as_ref())
    }

    /// Condition checked for validity.
    #[must_use]
    pub fn valid_cond(&self) -> OptCond<'a> {
        OptCond::new(self.data().valid_cond.as_ref())
    }

    /// Override policies for custom code.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        self.data().overrides
    }

    /// Platforms the message is restricted to, empty for all.
    #[must_use]
    pub fn platforms(&self) -> &'a [String] {
        &self.data().platforms
    }

    /// Generated code may be customised.
    #[must_use]
    pub fn is_customizable(&self) -> bool {
        self.data().customizable
    }

    /// Reading fails on an invalid field value.
    #[must_use]
    pub fn is_fail_on_invalid(&self) -> bool {
        self.data().fail_on_invalid
    }

    /// External reference of the message custom code is copied from.
    #[must_use]
    pub fn copy_code_from(&self) -> &'a str {
        &self.data().copy_code_from
    }

    /// Globally unique dotted path.
    #[must_use]
    pub fn external_ref(&self) -> &'a str {
        &self.data().external_ref
    }

    /// Document location of the definition.
    #[must_use]
    pub fn location(&self) -> &'a str {
        &self.data().location
    }

    /// Schema defining the message.
    #[must_use]
    pub fn schema_id(&self) -> SchemaId {
        self.data().schema
    }

    /// Namespace declaring the message.
    #[must_use]
    pub fn namespace_id(&self) -> NamespaceId {
        self.data().namespace
    }

    /// Minimal serialisation length of all fields.
    #[must_use]
    pub fn min_length(&self) -> usize {
        self.data()
            .fields
            .iter()
            .fold(0usize, |acc, f| acc.saturating_add(self.arena.min_length(*f)))
    }

    /// Maximal serialisation length of all fields.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.data()
            .fields
            .iter()
            .fold(0usize, |acc, f| acc.saturating_add(self.arena.max_length(*f)))
    }
}

impl PartialEq for Message<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.arena, other.arena) && self.id == other.id
    }
}

impl Eq for Message<'_> {}

impl fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
