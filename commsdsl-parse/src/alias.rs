//! Aliases of member fields.

/// Owned alias definition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AliasData {
    /// Alias name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Dotted path of the aliased member, without the `$` prefix.
    pub field_name: String,
}

/// Borrowed view of an alias.
#[derive(Debug, Clone, Copy)]
pub struct Alias<'a> {
    data: &'a AliasData,
}

impl<'a> Alias<'a> {
    pub(crate) fn new(data: &'a AliasData) -> Self {
        Self { data }
    }

    /// Alias name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        &self.data.name
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> &'a str {
        &self.data.description
    }

    /// Dotted path of the aliased member.
    #[must_use]
    pub fn field_name(&self) -> &'a str {
        &self.data.field_name
    }
}

impl PartialEq for Alias<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.data, other.data)
    }
}

impl Eq for Alias<'_> {}
