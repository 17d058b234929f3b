//! The menu tree: application-facing model and source of truth for the
//! native popup menus.
//!
//! Nodes live in an arena owned by [`MenuTree`]. Applications hold
//! [`MenuItem`] handles, which are just the item's id, so a reset can drop
//! every node without leaving anything dangling: old handles simply stop
//! resolving.
//!
//! Every mutation reconciles the single native entry it affects. If the
//! native call fails the node is left as it was, so positions computed from
//! the tree always match the native menus. Hidden items have no native
//! entry at all; their position among siblings is recomputed when they are
//! shown again.

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::error::{Result, TrayError};
use crate::handle::{BitmapHandle, MenuHandle};
use crate::native::{Native, NativeItem, NativeItemKind};
use crate::tray::Callback;

/// Handle to a menu item. Copyable; stays valid until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MenuItem(u16);

impl MenuItem {
    pub(crate) fn from_raw(raw: u16) -> Self {
        MenuItem(raw)
    }

    /// Map a menu command payload back to an item. Command ids occupy the
    /// low 16 bits; 0 is never allocated.
    pub(crate) fn from_command(wparam: usize) -> Option<Self> {
        match (wparam & 0xFFFF) as u16 {
            0 => None,
            raw => Some(MenuItem(raw)),
        }
    }

    /// The numeric id carried by native menu commands.
    pub fn id(self) -> u16 {
        self.0
    }
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "menu item #{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Normal,
    Separator,
    SubmenuParent,
}

/// Visual state flags of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemState {
    pub disabled: bool,
    pub checked: bool,
    pub hidden: bool,
}

struct Node {
    id: Option<MenuItem>,
    kind: ItemKind,
    title: String,
    state: ItemState,
    icon: Option<BitmapHandle>,
    parent: Option<usize>,
    children: Vec<usize>,
    submenu: Option<MenuHandle>,
    callback: Option<Callback>,
}

impl Node {
    fn item(id: MenuItem, title: &str, parent: Option<usize>) -> Self {
        Self {
            id: Some(id),
            kind: ItemKind::Normal,
            title: title.to_owned(),
            state: ItemState::default(),
            icon: None,
            parent,
            children: Vec::new(),
            submenu: None,
            callback: None,
        }
    }

    fn separator() -> Self {
        Self {
            id: None,
            kind: ItemKind::Separator,
            title: String::new(),
            state: ItemState::default(),
            icon: None,
            parent: None,
            children: Vec::new(),
            submenu: None,
            callback: None,
        }
    }
}

/// Hierarchical menu model with an id index for O(1) dispatch.
pub struct MenuTree {
    nodes: Vec<Node>,
    top: Vec<usize>,
    index: HashMap<MenuItem, usize>,
    /// Never rewinds, not even across resets.
    next_id: u32,
    root: Option<MenuHandle>,
}

impl Default for MenuTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            top: Vec::new(),
            index: HashMap::new(),
            next_id: 1,
            root: None,
        }
    }

    /// Create the root popup menu if it does not exist yet.
    pub fn init(&mut self, native: &mut dyn Native) -> Result<()> {
        if self.root.is_none() {
            self.root = Some(native.create_menu()?);
        }
        Ok(())
    }

    pub fn root_menu(&self) -> Option<MenuHandle> {
        self.root
    }

    // === Construction ===

    /// Append a normal item under `parent` (or at the top level).
    ///
    /// A normal parent becomes a submenu parent on its first child.
    pub fn add_item(
        &mut self,
        native: &mut dyn Native,
        parent: Option<MenuItem>,
        title: &str,
    ) -> Result<MenuItem> {
        let parent_slot = match parent {
            Some(id) => Some(self.slot(id).ok_or(TrayError::StaleReference(id))?),
            None => None,
        };
        let menu = match parent_slot {
            Some(slot) => self.ensure_submenu(native, slot)?,
            None => self.root_or_err()?,
        };

        let id = self.allocate()?;
        let slot = self.push(Node::item(id, title, parent_slot));
        let position = self.position_of(slot);
        if let Err(e) = native.insert_item(menu, position, &self.native_item(slot)) {
            self.unpush(slot);
            return Err(e);
        }
        self.index.insert(id, slot);
        debug!(item = %id, position, "menu item added");
        Ok(id)
    }

    /// Append a divider at the top level. Separators take no id.
    pub fn add_separator(&mut self, native: &mut dyn Native) -> Result<()> {
        let menu = self.root_or_err()?;
        let slot = self.push(Node::separator());
        let position = self.position_of(slot);
        if let Err(e) = native.insert_item(menu, position, &NativeItem::separator()) {
            self.unpush(slot);
            return Err(e);
        }
        Ok(())
    }

    // === Mutation ===

    pub fn set_title(&mut self, native: &mut dyn Native, id: MenuItem, title: &str) -> Result<()> {
        self.mutate(native, id, |node| node.title = title.to_owned())
    }

    pub fn set_disabled(&mut self, native: &mut dyn Native, id: MenuItem, disabled: bool) -> Result<()> {
        self.mutate(native, id, |node| node.state.disabled = disabled)
    }

    pub fn set_checked(&mut self, native: &mut dyn Native, id: MenuItem, checked: bool) -> Result<()> {
        self.mutate(native, id, |node| node.state.checked = checked)
    }

    /// Attach `bitmap` to the item. Returns the bitmap the tree no longer
    /// references (the previous one, or `bitmap` itself for a stale handle)
    /// so the caller can release it.
    pub fn replace_icon(
        &mut self,
        native: &mut dyn Native,
        id: MenuItem,
        bitmap: BitmapHandle,
    ) -> Result<Option<BitmapHandle>> {
        let Some(slot) = self.live(id) else {
            return Ok(Some(bitmap));
        };
        let previous = self.nodes[slot].icon.replace(bitmap);
        if let Err(e) = self.sync(native, slot) {
            self.nodes[slot].icon = previous;
            return Err(e);
        }
        Ok(previous)
    }

    /// Show or hide an item. Hidden items are removed from the native menu
    /// and re-inserted at their original relative position.
    pub fn set_visible(&mut self, native: &mut dyn Native, id: MenuItem, visible: bool) -> Result<()> {
        let Some(slot) = self.live(id) else {
            return Ok(());
        };
        if self.nodes[slot].state.hidden != visible {
            return Ok(());
        }

        let menu = self.container(slot)?;
        let position = self.position_of(slot);
        if visible {
            native.insert_item(menu, position, &self.native_item(slot))?;
        } else {
            native.remove_item(menu, position)?;
        }
        self.nodes[slot].state.hidden = !visible;
        Ok(())
    }

    pub fn set_callback(&mut self, id: MenuItem, callback: Callback) {
        if let Some(slot) = self.live(id) {
            self.nodes[slot].callback = Some(callback);
        }
    }

    /// Destroy every item and the native menus, then start over with an
    /// empty root menu. Returns the item bitmaps to release.
    pub fn reset(&mut self, native: &mut dyn Native) -> Result<Vec<BitmapHandle>> {
        let released = self.clear(native)?;
        self.root = Some(native.create_menu()?);
        debug!(next_id = self.next_id, "menu reset");
        Ok(released)
    }

    /// Destroy every item and native menu without creating a new root.
    pub fn clear(&mut self, native: &mut dyn Native) -> Result<Vec<BitmapHandle>> {
        let mut outcome = Ok(());

        // Submenus of hidden parents are detached from every menu, so the
        // recursive destroy of the root never reaches them.
        let detached: Vec<MenuHandle> = self
            .nodes
            .iter()
            .filter(|node| node.state.hidden)
            .filter_map(|node| node.submenu)
            .collect();
        for menu in detached {
            if let Err(e) = native.destroy_menu(menu) {
                outcome = outcome.and(Err(e));
            }
        }
        if let Some(root) = self.root.take() {
            if let Err(e) = native.destroy_menu(root) {
                outcome = outcome.and(Err(e));
            }
        }

        let released = self.nodes.iter().filter_map(|node| node.icon).collect();
        self.nodes.clear();
        self.top.clear();
        self.index.clear();
        outcome.map(|()| released)
    }

    // === Dispatch ===

    /// Take the callback of an activatable item out of the tree so it can be
    /// invoked with mutable access to the tray. Disabled, hidden, submenu
    /// and unknown items yield `None`.
    pub(crate) fn take_callback(&mut self, id: MenuItem) -> Option<Callback> {
        let slot = self.slot(id)?;
        let node = &mut self.nodes[slot];
        if node.kind != ItemKind::Normal || node.state.disabled || node.state.hidden {
            return None;
        }
        node.callback.take()
    }

    /// Put a callback back after it ran, unless the item is gone or the
    /// callback installed a replacement for itself.
    pub(crate) fn restore_callback(&mut self, id: MenuItem, callback: Callback) {
        if let Some(slot) = self.slot(id) {
            let node = &mut self.nodes[slot];
            if node.callback.is_none() {
                node.callback = Some(callback);
            }
        }
    }

    // === Queries ===

    pub fn contains(&self, id: MenuItem) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of live items (separators excluded).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn state(&self, id: MenuItem) -> Option<ItemState> {
        self.slot(id).map(|slot| self.nodes[slot].state)
    }

    pub fn checked(&self, id: MenuItem) -> bool {
        self.state(id).is_some_and(|state| state.checked)
    }

    pub fn disabled(&self, id: MenuItem) -> bool {
        self.state(id).is_some_and(|state| state.disabled)
    }

    pub fn visible(&self, id: MenuItem) -> bool {
        self.state(id).is_some_and(|state| !state.hidden)
    }

    pub fn title(&self, id: MenuItem) -> Option<&str> {
        self.slot(id).map(|slot| self.nodes[slot].title.as_str())
    }

    pub fn kind(&self, id: MenuItem) -> Option<ItemKind> {
        self.slot(id).map(|slot| self.nodes[slot].kind)
    }

    pub fn has_callback(&self, id: MenuItem) -> bool {
        self.slot(id).is_some_and(|slot| self.nodes[slot].callback.is_some())
    }

    pub fn submenu(&self, id: MenuItem) -> Option<MenuHandle> {
        self.slot(id).and_then(|slot| self.nodes[slot].submenu)
    }

    /// Children of `id` in display order (separators excluded).
    pub fn children(&self, id: MenuItem) -> Vec<MenuItem> {
        self.slot(id)
            .map(|slot| self.ids_of(&self.nodes[slot].children))
            .unwrap_or_default()
    }

    /// Deepest nesting level; 0 for an empty tree.
    pub fn depth(&self) -> usize {
        fn depth_of(tree: &MenuTree, slots: &[usize]) -> usize {
            slots
                .iter()
                .filter(|&&slot| tree.nodes[slot].id.is_some())
                .map(|&slot| 1 + depth_of(tree, &tree.nodes[slot].children))
                .max()
                .unwrap_or(0)
        }
        depth_of(self, &self.top)
    }

    // === Internals ===

    fn slot(&self, id: MenuItem) -> Option<usize> {
        self.index.get(&id).copied()
    }

    fn live(&self, id: MenuItem) -> Option<usize> {
        let slot = self.slot(id);
        if slot.is_none() {
            debug!(item = %id, "ignoring stale menu item");
        }
        slot
    }

    fn allocate(&mut self) -> Result<MenuItem> {
        let raw = u16::try_from(self.next_id)
            .map_err(|_| TrayError::ResourceCreation("menu item identifiers exhausted".into()))?;
        self.next_id += 1;
        Ok(MenuItem(raw))
    }

    fn push(&mut self, node: Node) -> usize {
        let slot = self.nodes.len();
        let parent = node.parent;
        self.nodes.push(node);
        match parent {
            Some(parent) => self.nodes[parent].children.push(slot),
            None => self.top.push(slot),
        }
        slot
    }

    /// Take back the node `push` just added.
    fn unpush(&mut self, slot: usize) {
        debug_assert_eq!(slot + 1, self.nodes.len());
        if let Some(node) = self.nodes.pop() {
            match node.parent {
                Some(parent) => self.nodes[parent].children.pop(),
                None => self.top.pop(),
            };
        }
    }

    fn ids_of(&self, slots: &[usize]) -> Vec<MenuItem> {
        slots.iter().filter_map(|&slot| self.nodes[slot].id).collect()
    }

    fn root_or_err(&self) -> Result<MenuHandle> {
        self.root
            .ok_or_else(|| TrayError::ResourceCreation("root menu not created".into()))
    }

    fn ensure_submenu(&mut self, native: &mut dyn Native, slot: usize) -> Result<MenuHandle> {
        if let Some(menu) = self.nodes[slot].submenu {
            return Ok(menu);
        }
        let menu = native.create_menu()?;
        let node = &mut self.nodes[slot];
        let kind = node.kind;
        node.submenu = Some(menu);
        node.kind = ItemKind::SubmenuParent;
        if let Err(e) = self.sync(native, slot) {
            let node = &mut self.nodes[slot];
            node.submenu = None;
            node.kind = kind;
            // Attached to no entry, so no other destroy reaches it
            if let Err(destroy) = native.destroy_menu(menu) {
                warn!(%menu, error = %destroy, "orphaned submenu not destroyed");
            }
            return Err(e);
        }
        Ok(menu)
    }

    fn siblings(&self, slot: usize) -> &[usize] {
        match self.nodes[slot].parent {
            Some(parent) => &self.nodes[parent].children,
            None => &self.top,
        }
    }

    /// Native position of `slot`: the number of visible siblings before it.
    fn position_of(&self, slot: usize) -> u32 {
        self.siblings(slot)
            .iter()
            .take_while(|&&sibling| sibling != slot)
            .filter(|&&sibling| !self.nodes[sibling].state.hidden)
            .count() as u32
    }

    fn container(&self, slot: usize) -> Result<MenuHandle> {
        match self.nodes[slot].parent {
            Some(parent) => self.nodes[parent]
                .submenu
                .ok_or_else(|| TrayError::ResourceCreation("submenu missing for parent".into())),
            None => self.root_or_err(),
        }
    }

    fn native_item(&self, slot: usize) -> NativeItem {
        let node = &self.nodes[slot];
        if node.kind == ItemKind::Separator {
            return NativeItem::separator();
        }
        NativeItem {
            id: node.id.map_or(0, |id| u32::from(id.0)),
            kind: NativeItemKind::String,
            title: node.title.clone(),
            disabled: node.state.disabled,
            checked: node.state.checked,
            submenu: node.submenu,
            bitmap: node.icon,
        }
    }

    fn mutate(&mut self, native: &mut dyn Native, id: MenuItem, f: impl FnOnce(&mut Node)) -> Result<()> {
        let Some(slot) = self.live(id) else {
            return Ok(());
        };
        let (title, state) = (self.nodes[slot].title.clone(), self.nodes[slot].state);
        f(&mut self.nodes[slot]);
        if let Err(e) = self.sync(native, slot) {
            let node = &mut self.nodes[slot];
            node.title = title;
            node.state = state;
            return Err(e);
        }
        Ok(())
    }

    /// Push the node's current state into its native entry, if it has one.
    fn sync(&self, native: &mut dyn Native, slot: usize) -> Result<()> {
        if self.nodes[slot].state.hidden {
            return Ok(());
        }
        let menu = self.container(slot)?;
        native.update_item(menu, self.position_of(slot), &self.native_item(slot))
    }

    #[cfg(test)]
    fn skip_ids_to(&mut self, next: u32) {
        self.next_id = next;
    }
}
