//! The editable object model: path-addressed values, change events and
//! undo.

pub mod document;
pub mod event;
pub mod path;
pub mod reflect;
pub mod undo;

pub use self::document::{Document, View};
pub use self::event::{Event, EventKind, Listener};
pub use self::path::Path;
pub use self::reflect::Value;
pub use self::undo::UndoStack;
