//! Undo history of value edits.

use super::document::Document;
use super::path::Path;
use super::reflect::Value;
use crate::errors::Result;

#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub path: Path,
    pub old: Value,
    pub new: Value,
    pub label: String,
}

impl Command {
    fn is_obsolete(&self) -> bool {
        self.old == self.new
    }
}

/// Commands before `index` are done; the rest can be redone.
///
/// While the current command is open, further commits to the same path
/// merge into it instead of pushing a new command. A merge that leaves
/// the command a no-op removes it.
#[derive(Default)]
pub struct UndoStack {
    commands: Vec<Command>,
    index: usize,
    open: bool,
}

impl UndoStack {
    pub fn new() -> UndoStack {
        UndoStack::default()
    }

    /// Number of commands that can be undone.
    pub fn len(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.index == 0
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.commands.len()
    }

    /// Label of the command `undo` would revert.
    pub fn undo_label(&self) -> Option<&str> {
        self.index.checked_sub(1).map(|i| &self.commands[i].label[..])
    }

    /// Sets `path` to `value` in the document and records it.
    pub fn commit(
        &mut self,
        document: &mut Document,
        path: Path,
        value: Value,
        label: &str,
    ) -> Result<()> {
        let old = document.set(&path, &value)?;

        if self.open && self.index == self.commands.len() && self.index > 0 {
            let top = &mut self.commands[self.index - 1];
            if top.path == path {
                top.new = value;
                if top.is_obsolete() {
                    debug!("undo: {:?} became a no-op", top.label);
                    self.commands.pop();
                    self.index -= 1;
                    self.open = false;
                }
                return Ok(());
            }
        }

        if old == value {
            return Ok(());
        }
        self.commands.truncate(self.index);
        self.commands.push(Command { path, old, new: value, label: label.to_string() });
        self.index += 1;
        self.open = true;
        Ok(())
    }

    /// Ends the current command; the next commit starts a new one.
    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn undo(&mut self, document: &mut Document) -> Result<bool> {
        self.close();
        if self.index == 0 {
            return Ok(false);
        }
        let command = &self.commands[self.index - 1];
        document.set(&command.path, &command.old)?;
        self.index -= 1;
        Ok(true)
    }

    pub fn redo(&mut self, document: &mut Document) -> Result<bool> {
        self.close();
        if !self.can_redo() {
            return Ok(false);
        }
        let command = &self.commands[self.index];
        document.set(&command.path, &command.new)?;
        self.index += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::model::tests::sample_model;

    fn dither() -> Path {
        Path::root().child("materials").index(0).child("dither")
    }

    #[test]
    fn merge_to_no_op() {
        let mut doc = Document::new(sample_model());
        let mut undo = UndoStack::new();
        undo.commit(&mut doc, dither(), Value::Bool(false), "dither").unwrap();
        assert_eq!(undo.len(), 1);
        undo.commit(&mut doc, dither(), Value::Bool(true), "dither").unwrap();
        assert_eq!(undo.len(), 0);
        assert!(!undo.can_redo());
        assert!(doc.model().materials[0].dither);
    }

    #[test]
    fn merge_keeps_first_old_value() {
        let mut doc = Document::new(sample_model());
        let mut undo = UndoStack::new();
        let r = Path::root().child("materials").index(0).child("alpha_test").child("reference0");
        for x in &[1, 2, 3] {
            undo.commit(&mut doc, r.clone(), Value::Int(*x), "alpha reference").unwrap();
        }
        assert_eq!(undo.len(), 1);
        assert_eq!(undo.undo_label(), Some("alpha reference"));
        assert!(undo.undo(&mut doc).unwrap());
        assert_eq!(doc.get(&r).unwrap(), Value::Int(0x80));
        assert!(undo.redo(&mut doc).unwrap());
        assert_eq!(doc.get(&r).unwrap(), Value::Int(3));
    }

    #[test]
    fn boundary_and_redo_tail() {
        let mut doc = Document::new(sample_model());
        let mut undo = UndoStack::new();
        undo.commit(&mut doc, dither(), Value::Bool(false), "dither").unwrap();
        undo.close();
        undo.commit(&mut doc, dither(), Value::Bool(true), "dither").unwrap();
        assert_eq!(undo.len(), 2);

        undo.undo(&mut doc).unwrap();
        assert!(!doc.model().materials[0].dither);
        assert!(undo.can_redo());

        // A new edit drops the redo tail.
        let name = Path::root().child("materials").index(0).child("name");
        undo.commit(&mut doc, name, Value::Str("renamed".into()), "rename").unwrap();
        assert!(!undo.can_redo());
        assert_eq!(undo.len(), 2);

        undo.undo(&mut doc).unwrap();
        undo.undo(&mut doc).unwrap();
        assert!(!undo.undo(&mut doc).unwrap());
        assert!(doc.model().materials[0].dither);
        assert_eq!(doc.model().materials[0].name, "quad");
    }

    #[test]
    fn failed_commit_records_nothing() {
        let mut doc = Document::new(sample_model());
        let mut undo = UndoStack::new();
        let bad = Path::root().child("materials").index(9).child("dither");
        assert!(undo.commit(&mut doc, bad, Value::Bool(false), "dither").is_err());
        assert!(undo.is_empty());
    }
}
