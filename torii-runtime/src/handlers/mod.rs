//! Message handlers registered with the dispatcher.

mod board;
mod child_order;

pub use board::BoardEventHandler;
pub use child_order::ChildOrderEventHandler;
