//! # Display names for diagnostics.
//!
//! Scope names and probe output label components through a fixed registry
//! keyed by [`ComponentId`] instead of runtime type names.

/// Identifier of a runtime component that appears in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Supervisor,
    ReceiveEndpoint,
    Consumer,
    InspectFilter,
    MapFilter,
    WhereFilter,
    TeeFilter,
    HandlerFilter,
}

impl ComponentId {
    /// Returns the display name registered for this component.
    pub const fn display_name(self) -> &'static str {
        match self {
            ComponentId::Supervisor => "Supervisor",
            ComponentId::ReceiveEndpoint => "ReceiveEndpoint",
            ComponentId::Consumer => "ConsumerFilter",
            ComponentId::InspectFilter => "inspect",
            ComponentId::MapFilter => "map",
            ComponentId::WhereFilter => "where",
            ComponentId::TeeFilter => "tee",
            ComponentId::HandlerFilter => "handler",
        }
    }

    /// Builds a scope name of the form `"<display> - <subject>"`.
    pub fn scope_name(self, subject: impl std::fmt::Display) -> String {
        format!("{} - {subject}", self.display_name())
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
