//! Event storage and the rule engine behind the log table.
//!
//! [`EventContainer`] holds received events in a cyclic or unbounded buffer,
//! decides row visibility through a [`Rule`], sorts with a
//! [`ColumnComparator`] and reports changes through typed [`Listeners`].

mod buffer;
mod colorizer;
mod comparator;
mod container;
mod error;
mod listener;
pub mod rule;

pub use buffer::CyclicBuffer;
pub use colorizer::{ColorRule, DEFAULT_RULE_SET, Rgb, RuleColorizer, default_rules};
pub use comparator::{ColumnComparator, cmp_ignore_case};
pub use container::{ChangeReason, EventContainer, NewKey, RowCounts, StructureChange};
pub use error::{ContainerError, ContainerResult, RuleError};
pub use listener::{Callback, ListenerId, Listeners};
pub use rule::{
    ExpressionRule, LoggerRule, PatternSyntax, Rule, RuleChange, RuleMediator, RuleSlot, SharedRule,
};
