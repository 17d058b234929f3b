//! In-memory [`Native`] backend for headless tests.
//!
//! `MockNative` keeps native menus as ordered entry lists, records every
//! shell call and replays a scripted message queue. Clones share state, so a
//! test can keep one clone for scripting and inspection while the tray owns
//! another.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{Result, TrayError};
use crate::handle::{BitmapHandle, IconHandle, MenuHandle, WindowHandle};
use crate::menu::MenuItem;
use crate::native::{
    Native, NativeItem, NativeItemKind, NotifyData, NotifyOp, Point, Waker, WindowMessage,
    WM_CLOSE, WM_COMMAND, WM_LBUTTONUP, WM_RBUTTONUP, WM_TRAY_CALLBACK, WM_TRAY_WAKE,
};

/// A native call that should fail the next time it is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    RegisterClass,
    CreateWindow,
    CreateMenu,
    InsertItem,
    UpdateItem,
    RemoveItem,
    NotifyAdd,
    NotifyModify,
    NotifyDelete,
    LoadImage,
    ShowPopup,
}

#[derive(Default)]
struct MockState {
    next_handle: usize,
    class: Option<String>,
    window: Option<WindowHandle>,
    menus: HashMap<MenuHandle, Vec<NativeItem>>,
    icons: HashSet<IconHandle>,
    bitmaps: HashSet<BitmapHandle>,
    notify_log: Vec<(NotifyOp, NotifyData)>,
    shell_icon: Option<NotifyData>,
    cursor: Point,
    popups: Vec<(MenuHandle, Point)>,
    messages: VecDeque<WindowMessage>,
    quit: bool,
    quit_posts: usize,
    block_when_idle: bool,
    failures: Vec<MockFailure>,
}

impl MockState {
    fn allocate(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }

    fn take_failure(&mut self, failure: MockFailure) -> bool {
        match self.failures.iter().position(|&f| f == failure) {
            Some(pos) => {
                self.failures.remove(pos);
                true
            }
            None => false,
        }
    }

    fn menu_mut(&mut self, menu: MenuHandle) -> Result<&mut Vec<NativeItem>> {
        self.menus
            .get_mut(&menu)
            .ok_or_else(|| TrayError::ResourceCreation(format!("unknown menu {}", menu)))
    }

    fn destroy_menu(&mut self, menu: MenuHandle) -> Result<()> {
        let entries = self
            .menus
            .remove(&menu)
            .ok_or_else(|| TrayError::ResourceCreation(format!("unknown menu {}", menu)))?;
        for submenu in entries.into_iter().filter_map(|entry| entry.submenu) {
            self.destroy_menu(submenu)?;
        }
        Ok(())
    }
}

fn out_of_range(menu: MenuHandle, position: u32) -> TrayError {
    TrayError::ResourceCreation(format!("position {} out of range in {}", position, menu))
}

/// Shared-state fake of the native platform.
#[derive(Clone, Default)]
pub struct MockNative {
    shared: Arc<(Mutex<MockState>, Condvar)>,
}

impl MockNative {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, message: WindowMessage) {
        self.state().messages.push_back(message);
        self.shared.1.notify_all();
    }

    // === Scripting ===

    /// Make the next call of the given kind fail.
    pub fn fail(&self, failure: MockFailure) {
        self.state().failures.push(failure);
    }

    /// When set, `next_message` waits for new messages instead of ending the
    /// pump once the script is exhausted.
    pub fn block_when_idle(&self, block: bool) {
        self.state().block_when_idle = block;
        self.shared.1.notify_all();
    }

    pub fn set_cursor(&self, at: Point) {
        self.state().cursor = at;
    }

    pub fn push_message(&self, message: WindowMessage) {
        self.push(message);
    }

    pub fn left_click(&self) {
        self.push(WindowMessage::new(WM_TRAY_CALLBACK, 1, WM_LBUTTONUP as isize));
    }

    pub fn right_click(&self) {
        self.push(WindowMessage::new(WM_TRAY_CALLBACK, 1, WM_RBUTTONUP as isize));
    }

    /// Queue the command message a click on `item` produces.
    pub fn command(&self, item: MenuItem) {
        self.push(WindowMessage::new(WM_COMMAND, usize::from(item.id()), 0));
    }

    pub fn close(&self) {
        self.push(WindowMessage::new(WM_CLOSE, 0, 0));
    }

    // === Inspection ===

    /// Titles of the entries of `menu`, separators shown as `---`.
    pub fn titles(&self, menu: MenuHandle) -> Vec<String> {
        self.entries(menu)
            .into_iter()
            .map(|entry| match entry.kind {
                NativeItemKind::Separator => "---".to_string(),
                NativeItemKind::String => entry.title,
            })
            .collect()
    }

    pub fn entries(&self, menu: MenuHandle) -> Vec<NativeItem> {
        self.state().menus.get(&menu).cloned().unwrap_or_default()
    }

    pub fn live_menus(&self) -> usize {
        self.state().menus.len()
    }

    pub fn live_icons(&self) -> usize {
        self.state().icons.len()
    }

    pub fn live_bitmaps(&self) -> usize {
        self.state().bitmaps.len()
    }

    /// Every accepted shell call, in order.
    pub fn notify_log(&self) -> Vec<(NotifyOp, NotifyData)> {
        self.state().notify_log.clone()
    }

    /// What the notification area currently shows.
    pub fn shell_icon(&self) -> Option<NotifyData> {
        self.state().shell_icon.clone()
    }

    pub fn popups(&self) -> Vec<(MenuHandle, Point)> {
        self.state().popups.clone()
    }

    pub fn window_alive(&self) -> bool {
        self.state().window.is_some()
    }

    pub fn class_registered(&self) -> bool {
        self.state().class.is_some()
    }

    pub fn class_name(&self) -> Option<String> {
        self.state().class.clone()
    }

    pub fn quit_posts(&self) -> usize {
        self.state().quit_posts
    }
}

impl Native for MockNative {
    fn register_class(&mut self, class_name: &str) -> Result<()> {
        let mut state = self.state();
        if state.take_failure(MockFailure::RegisterClass) {
            return Err(TrayError::ResourceCreation("RegisterClassExW failed".into()));
        }
        state.class = Some(class_name.to_string());
        Ok(())
    }

    fn unregister_class(&mut self) -> Result<()> {
        self.state().class = None;
        Ok(())
    }

    fn create_window(&mut self) -> Result<WindowHandle> {
        let mut state = self.state();
        if state.take_failure(MockFailure::CreateWindow) {
            return Err(TrayError::ResourceCreation("CreateWindowExW failed".into()));
        }
        let window = WindowHandle(state.allocate());
        state.window = Some(window);
        Ok(window)
    }

    fn destroy_window(&mut self, window: WindowHandle) -> Result<()> {
        let mut state = self.state();
        if state.window != Some(window) {
            return Err(TrayError::ResourceCreation(format!("unknown window {}", window)));
        }
        state.window = None;
        Ok(())
    }

    fn create_menu(&mut self) -> Result<MenuHandle> {
        let mut state = self.state();
        if state.take_failure(MockFailure::CreateMenu) {
            return Err(TrayError::ResourceCreation("CreatePopupMenu failed".into()));
        }
        let menu = MenuHandle(state.allocate());
        state.menus.insert(menu, Vec::new());
        Ok(menu)
    }

    fn destroy_menu(&mut self, menu: MenuHandle) -> Result<()> {
        self.state().destroy_menu(menu)
    }

    fn insert_item(&mut self, menu: MenuHandle, position: u32, item: &NativeItem) -> Result<()> {
        let mut state = self.state();
        if state.take_failure(MockFailure::InsertItem) {
            return Err(TrayError::ResourceCreation("InsertMenuItemW failed".into()));
        }
        let entries = state.menu_mut(menu)?;
        let index = position as usize;
        if index > entries.len() {
            return Err(out_of_range(menu, position));
        }
        entries.insert(index, item.clone());
        Ok(())
    }

    fn update_item(&mut self, menu: MenuHandle, position: u32, item: &NativeItem) -> Result<()> {
        let mut state = self.state();
        if state.take_failure(MockFailure::UpdateItem) {
            return Err(TrayError::ResourceCreation("SetMenuItemInfoW failed".into()));
        }
        let entry = state
            .menu_mut(menu)?
            .get_mut(position as usize)
            .ok_or_else(|| out_of_range(menu, position))?;
        *entry = item.clone();
        Ok(())
    }

    fn remove_item(&mut self, menu: MenuHandle, position: u32) -> Result<()> {
        let mut state = self.state();
        if state.take_failure(MockFailure::RemoveItem) {
            return Err(TrayError::ResourceCreation("RemoveMenu failed".into()));
        }
        let entries = state.menu_mut(menu)?;
        let index = position as usize;
        if index >= entries.len() {
            return Err(out_of_range(menu, position));
        }
        entries.remove(index);
        Ok(())
    }

    fn notify_icon(&mut self, op: NotifyOp, data: &NotifyData) -> Result<()> {
        let mut state = self.state();
        let injected = match op {
            NotifyOp::Add => MockFailure::NotifyAdd,
            NotifyOp::Modify => MockFailure::NotifyModify,
            NotifyOp::Delete => MockFailure::NotifyDelete,
        };
        if state.take_failure(injected) {
            return Err(TrayError::ShellRegistration(format!("{:?} rejected", op)));
        }
        match op {
            NotifyOp::Add => state.shell_icon = Some(data.clone()),
            NotifyOp::Modify | NotifyOp::Delete if state.shell_icon.is_none() => {
                return Err(TrayError::ShellRegistration(format!("{:?} before add", op)));
            }
            NotifyOp::Modify => state.shell_icon = Some(data.clone()),
            NotifyOp::Delete => state.shell_icon = None,
        }
        state.notify_log.push((op, data.clone()));
        Ok(())
    }

    fn load_icon(&mut self, path: &Path) -> Result<IconHandle> {
        let mut state = self.state();
        if state.take_failure(MockFailure::LoadImage) {
            return Err(TrayError::ResourceLoad {
                path: path.to_path_buf(),
                reason: "injected failure".into(),
            });
        }
        let icon = IconHandle(state.allocate());
        state.icons.insert(icon);
        Ok(icon)
    }

    fn load_bitmap(&mut self, path: &Path) -> Result<BitmapHandle> {
        let mut state = self.state();
        if state.take_failure(MockFailure::LoadImage) {
            return Err(TrayError::ResourceLoad {
                path: path.to_path_buf(),
                reason: "injected failure".into(),
            });
        }
        let bitmap = BitmapHandle(state.allocate());
        state.bitmaps.insert(bitmap);
        Ok(bitmap)
    }

    fn destroy_icon(&mut self, icon: IconHandle) {
        self.state().icons.remove(&icon);
    }

    fn destroy_bitmap(&mut self, bitmap: BitmapHandle) {
        self.state().bitmaps.remove(&bitmap);
    }

    fn cursor_position(&mut self) -> Point {
        self.state().cursor
    }

    fn show_popup(&mut self, menu: MenuHandle, at: Point) -> Result<()> {
        let mut state = self.state();
        if state.take_failure(MockFailure::ShowPopup) {
            return Err(TrayError::ResourceCreation("TrackPopupMenu failed".into()));
        }
        if !state.menus.contains_key(&menu) {
            return Err(TrayError::ResourceCreation(format!("unknown menu {}", menu)));
        }
        state.popups.push((menu, at));
        Ok(())
    }

    /// Quit wins over queued messages. Without `block_when_idle`, an empty
    /// queue ends the pump as if quit had been posted.
    fn next_message(&mut self) -> Option<WindowMessage> {
        let (lock, ready) = &*self.shared;
        let mut state = lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if state.quit {
                return None;
            }
            if let Some(message) = state.messages.pop_front() {
                return Some(message);
            }
            if !state.block_when_idle {
                return None;
            }
            state = ready.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn post_quit(&mut self) {
        let mut state = self.state();
        state.quit = true;
        state.quit_posts += 1;
        self.shared.1.notify_all();
    }

    fn waker(&self) -> Waker {
        let mock = self.clone();
        Arc::new(move || mock.push(WindowMessage::new(WM_TRAY_WAKE, 0, 0)))
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn destroying_a_menu_destroys_its_submenus() {
        let mut native = MockNative::new();
        let root = native.create_menu().unwrap();
        let sub = native.create_menu().unwrap();
        let entry = NativeItem {
            id: 1,
            kind: NativeItemKind::String,
            title: "parent".into(),
            disabled: false,
            checked: false,
            submenu: Some(sub),
            bitmap: None,
        };
        native.insert_item(root, 0, &entry).unwrap();

        native.destroy_menu(root).unwrap();
        assert_eq!(native.live_menus(), 0);
        assert!(native.destroy_menu(root).is_err());
    }

    #[test]
    fn positions_are_checked() {
        let mut native = MockNative::new();
        let menu = native.create_menu().unwrap();
        assert!(native.insert_item(menu, 1, &NativeItem::separator()).is_err());
        assert!(native.remove_item(menu, 0).is_err());
        native.insert_item(menu, 0, &NativeItem::separator()).unwrap();
        assert_eq!(native.titles(menu), vec!["---"]);
    }

    #[test]
    fn failures_are_one_shot() {
        let mut native = MockNative::new();
        native.fail(MockFailure::CreateMenu);
        assert!(native.create_menu().is_err());
        assert!(native.create_menu().is_ok());
    }

    #[test]
    fn script_runs_out_without_blocking() {
        let mut native = MockNative::new();
        native.right_click();
        assert_eq!(native.next_message().map(|m| m.msg), Some(WM_TRAY_CALLBACK));
        assert_eq!(native.next_message(), None);
    }

    #[test]
    fn quit_overrides_queued_messages() {
        let mut native = MockNative::new();
        native.close();
        native.post_quit();
        assert_eq!(native.next_message(), None);
    }

    #[test]
    fn waker_unblocks_idle_pump() {
        let mut native = MockNative::new();
        native.block_when_idle(true);
        let waker = native.waker();

        let poster = thread::spawn(move || waker());
        let message = native.next_message();
        poster.join().unwrap();
        assert_eq!(message.map(|m| m.msg), Some(WM_TRAY_WAKE));
    }
}
