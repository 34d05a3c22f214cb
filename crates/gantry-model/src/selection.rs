//! Registry of live, addressable entities.
//!
//! Pipelines, blocks, and promotions register their uid at construction and
//! deregister at deletion. The registry also tracks which entity the user
//! currently has selected in the editor; "new block depends on the selected
//! block" is resolved through it.

use std::collections::HashSet;

use gantry_types::Uid;

#[derive(Debug, Default)]
pub struct SelectionRegister {
    live: HashSet<Uid>,
    selected: Option<Uid>,
}

impl SelectionRegister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, uid: Uid) {
        self.live.insert(uid);
    }

    /// Forget an entity. Clears the selection when it pointed here.
    pub fn deregister(&mut self, uid: Uid) {
        self.live.remove(&uid);
        if self.selected == Some(uid) {
            self.selected = None;
        }
    }

    pub fn is_registered(&self, uid: Uid) -> bool {
        self.live.contains(&uid)
    }

    /// Select a live entity. Selecting an unregistered uid is a no-op.
    pub fn select(&mut self, uid: Uid) -> bool {
        if self.live.contains(&uid) {
            self.selected = Some(uid);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<Uid> {
        self.selected
    }
}
