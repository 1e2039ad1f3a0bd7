//! Orders: the command schema and the per-turn order set.

pub mod command;
pub mod set;

pub use command::{
    Command, CommandKind, Field, InvalidCommandError, RawCommand, ALL_COMMAND_KINDS,
    COMMAND_KIND_COUNT,
};
pub use set::{
    load_order_set, CharacterOrders, DefaultOrderPolicy, IncompleteOrdersError, OrderSet, Orders,
    MAX_SLOTS,
};
