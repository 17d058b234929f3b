//! The UI-thread context handed to every callback.
//!
//! A [`Tray`] owns the menu tree, the notification icon, the native backend
//! and the command bus of one run. It is `!Send`: the native
//! handles behind it may only be touched from the thread that created the
//! window. Other threads go through [`Tray::handle`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::TrayConfig;
use crate::dispatch::{self, Flow};
use crate::error::Result;
use crate::events::{CommandBus, TrayCommand, TrayHandle};
use crate::handle::HandleRegistry;
use crate::menu::{MenuItem, MenuTree};
use crate::native::Native;
use crate::notify::NotifyIcon;

/// Action attached to a menu item or to the tray-opened hook.
///
/// Returning `Err` ends the run and the error is handed back by
/// [`crate::run`].
pub type Callback = Box<dyn FnMut(&mut Tray) -> Result<()>>;

pub struct Tray {
    native: Box<dyn Native>,
    registry: HandleRegistry,
    menu: MenuTree,
    icon: NotifyIcon,
    open_on_left_click: bool,
    open_on_right_click: bool,
    tray_opened: Option<Callback>,
    /// Bumped whenever the hook is replaced or cleared, so a hook that
    /// replaces itself is not overwritten when it returns.
    tray_opened_generation: u64,
    bus: CommandBus,
    quit_requested: bool,
    torn_down: bool,
}

impl Tray {
    pub(crate) fn new(native: Box<dyn Native>, config: &TrayConfig) -> Self {
        Self {
            native,
            registry: HandleRegistry::new(),
            menu: MenuTree::new(),
            icon: NotifyIcon::new(),
            open_on_left_click: config.open_on_left_click,
            open_on_right_click: config.open_on_right_click,
            tray_opened: None,
            tray_opened_generation: 0,
            bus: CommandBus::new(),
            quit_requested: false,
            torn_down: false,
        }
    }

    /// A tray that never registered a window; enough to run callbacks.
    #[cfg(test)]
    pub(crate) fn detached(native: crate::testing::MockNative) -> Self {
        Self::new(Box::new(native), &TrayConfig::default())
    }

    // === Lifecycle ===

    /// Register the window class, create the window and the root menu.
    pub(crate) fn startup(&mut self, class_name: &str) -> Result<()> {
        self.native.register_class(class_name)?;
        self.registry.mark_class_registered();

        let window = self.native.create_window()?;
        self.registry.set_window(window);

        self.menu.init(self.native.as_mut())?;
        info!(class = class_name, %window, "tray window created");
        Ok(())
    }

    pub(crate) fn install_icon(&mut self) -> Result<()> {
        self.icon.install(self.native.as_mut())
    }

    /// Pump native messages until quit, close or a failing callback.
    pub(crate) fn pump(&mut self) -> Result<()> {
        loop {
            self.drain_commands()?;
            let Some(message) = self.native.next_message() else {
                debug!("message pump stopped");
                return Ok(());
            };
            if dispatch::window_procedure(self, &message)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Release everything the run created, in reverse order of creation.
    /// Runs once; later calls return `Ok(())`.
    pub(crate) fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        let native = self.native.as_mut();
        let mut outcome = Ok(());
        let mut note = |step: &str, result: Result<()>| {
            if let Err(e) = result {
                warn!(step, error = %e, "teardown step failed");
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        };

        note("remove icon", self.icon.uninstall(native));
        match self.menu.clear(native) {
            Ok(released) => {
                for bitmap in released {
                    self.registry.release_bitmap(native, bitmap);
                }
            }
            Err(e) => note("destroy menu", Err(e)),
        }
        if let Some(window) = self.registry.take_window() {
            note("destroy window", native.destroy_window(window));
        }
        if self.registry.take_class() {
            note("unregister class", native.unregister_class());
        }
        self.registry.release_all(native);

        info!("tray torn down");
        outcome
    }

    // === Dispatch ===

    /// Run the callback of `item`, if it has one and can be activated.
    pub(crate) fn activate(&mut self, item: MenuItem) -> Result<()> {
        let Some(mut callback) = self.menu.take_callback(item) else {
            debug!(%item, "activation ignored");
            return Ok(());
        };
        debug!(%item, "running item callback");
        let outcome = callback(self);
        self.menu.restore_callback(item, callback);
        outcome
    }

    pub(crate) fn fire_tray_opened(&mut self) -> Result<()> {
        let Some(mut callback) = self.tray_opened.take() else {
            return Ok(());
        };
        let generation = self.tray_opened_generation;
        let outcome = callback(self);
        if self.tray_opened_generation == generation {
            self.tray_opened = Some(callback);
        }
        outcome
    }

    pub(crate) fn opens_on_left_click(&self) -> bool {
        self.open_on_left_click
    }

    pub(crate) fn opens_on_right_click(&self) -> bool {
        self.open_on_right_click
    }

    pub(crate) fn native_mut(&mut self) -> &mut dyn Native {
        self.native.as_mut()
    }

    pub(crate) fn forget_window(&mut self) {
        self.registry.forget_window();
    }

    /// Apply every command queued by other threads.
    pub(crate) fn drain_commands(&mut self) -> Result<()> {
        for command in self.bus.drain() {
            self.apply(command)?;
        }
        Ok(())
    }

    fn apply(&mut self, command: TrayCommand) -> Result<()> {
        let description = command.description();
        let outcome = match command {
            TrayCommand::SetTitle(item, title) => self.set_title(item, &title),
            TrayCommand::SetEnabled(item, true) => self.enable(item),
            TrayCommand::SetEnabled(item, false) => self.disable(item),
            TrayCommand::SetChecked(item, true) => self.check(item),
            TrayCommand::SetChecked(item, false) => self.uncheck(item),
            TrayCommand::SetVisible(item, true) => self.show(item),
            TrayCommand::SetVisible(item, false) => self.hide(item),
            TrayCommand::SetItemIcon(item, path) => self.set_item_icon_from_file_path(item, path),
            TrayCommand::SetIcon(path) => self.set_icon_from_file_path(path),
            TrayCommand::SetTooltip(text) => self.set_tooltip(&text),
            TrayCommand::SetOpenOnLeftClick(open) => {
                self.set_open_on_left_click(open);
                Ok(())
            }
            TrayCommand::SetOpenOnRightClick(open) => {
                self.set_open_on_right_click(open);
                Ok(())
            }
            TrayCommand::AddMenuItem { parent, title, reply } => {
                let created = match parent {
                    Some(parent) => self.add_sub_menu_item(parent, &title),
                    None => self.add_menu_item(&title),
                };
                // The requester may have given up waiting
                let _ = reply.send(created);
                Ok(())
            }
            TrayCommand::AddSeparator => self.add_separator(),
            TrayCommand::ResetMenu => self.reset_menu(),
            TrayCommand::Quit => {
                self.quit();
                Ok(())
            }
            TrayCommand::Invoke(job) => return job(self),
        };
        if let Err(e) = outcome {
            warn!(command = description, error = %e, "queued command failed");
        }
        Ok(())
    }

    // === Run control ===

    /// Stop the pump after the current callback returns. Idempotent.
    pub fn quit(&mut self) {
        if self.quit_requested {
            return;
        }
        self.quit_requested = true;
        self.native.post_quit();
        info!("quit requested");
    }

    /// A thread-safe handle for reaching this tray from other threads.
    pub fn handle(&self) -> TrayHandle {
        self.bus.handle(self.native.waker())
    }

    /// Drop every item and start over with an empty menu. Handles issued
    /// before the reset stop resolving.
    pub fn reset_menu(&mut self) -> Result<()> {
        let native = self.native.as_mut();
        let released = self.menu.reset(native)?;
        for bitmap in released {
            self.registry.release_bitmap(native, bitmap);
        }
        info!("menu reset");
        Ok(())
    }

    // === Notification icon ===

    pub fn set_icon_from_file_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let native = self.native.as_mut();
        let icon = native.load_icon(path.as_ref())?;
        self.registry.adopt_icon(icon);
        match self.icon.set_icon(native, icon) {
            Ok(Some(previous)) => self.registry.release_icon(native, previous),
            Ok(None) => {}
            Err(e) => {
                self.registry.release_icon(native, icon);
                return Err(e);
            }
        }
        debug!(path = %path.as_ref().display(), "tray icon set");
        Ok(())
    }

    /// Set the hover text. Anything beyond 127 UTF-16 units is cut off.
    pub fn set_tooltip(&mut self, text: &str) -> Result<()> {
        self.icon.set_tooltip(self.native.as_mut(), text)
    }

    pub fn tooltip(&self) -> &str {
        self.icon.tooltip()
    }

    pub fn set_open_on_left_click(&mut self, open: bool) {
        self.open_on_left_click = open;
    }

    pub fn set_open_on_right_click(&mut self, open: bool) {
        self.open_on_right_click = open;
    }

    /// Run `callback` every time the menu is opened from the tray, just
    /// before the popup is shown.
    pub fn on_tray_opened<F>(&mut self, callback: F)
    where
        F: FnMut(&mut Tray) -> Result<()> + 'static,
    {
        self.tray_opened = Some(Box::new(callback));
        self.tray_opened_generation += 1;
    }

    pub fn clear_tray_opened(&mut self) {
        self.tray_opened = None;
        self.tray_opened_generation += 1;
    }

    // === Menu construction ===

    pub fn add_menu_item(&mut self, title: &str) -> Result<MenuItem> {
        self.menu.add_item(self.native.as_mut(), None, title)
    }

    /// Add a child under `parent`, turning it into a submenu on first use.
    pub fn add_sub_menu_item(&mut self, parent: MenuItem, title: &str) -> Result<MenuItem> {
        self.menu.add_item(self.native.as_mut(), Some(parent), title)
    }

    pub fn add_separator(&mut self) -> Result<()> {
        self.menu.add_separator(self.native.as_mut())
    }

    // === Item mutation ===

    pub fn set_title(&mut self, item: MenuItem, title: &str) -> Result<()> {
        self.menu.set_title(self.native.as_mut(), item, title)
    }

    pub fn set_callback<F>(&mut self, item: MenuItem, callback: F)
    where
        F: FnMut(&mut Tray) -> Result<()> + 'static,
    {
        self.menu.set_callback(item, Box::new(callback));
    }

    pub fn enable(&mut self, item: MenuItem) -> Result<()> {
        self.menu.set_disabled(self.native.as_mut(), item, false)
    }

    pub fn disable(&mut self, item: MenuItem) -> Result<()> {
        self.menu.set_disabled(self.native.as_mut(), item, true)
    }

    pub fn check(&mut self, item: MenuItem) -> Result<()> {
        self.menu.set_checked(self.native.as_mut(), item, true)
    }

    pub fn uncheck(&mut self, item: MenuItem) -> Result<()> {
        self.menu.set_checked(self.native.as_mut(), item, false)
    }

    pub fn show(&mut self, item: MenuItem) -> Result<()> {
        self.menu.set_visible(self.native.as_mut(), item, true)
    }

    pub fn hide(&mut self, item: MenuItem) -> Result<()> {
        self.menu.set_visible(self.native.as_mut(), item, false)
    }

    /// Draw the image at `path` next to the item, releasing the previous one.
    pub fn set_item_icon_from_file_path(&mut self, item: MenuItem, path: impl AsRef<Path>) -> Result<()> {
        if !self.menu.contains(item) {
            debug!(%item, "ignoring icon for stale menu item");
            return Ok(());
        }
        let native = self.native.as_mut();
        let bitmap = native.load_bitmap(path.as_ref())?;
        self.registry.adopt_bitmap(bitmap);
        match self.menu.replace_icon(native, item, bitmap) {
            Ok(Some(unused)) => self.registry.release_bitmap(native, unused),
            Ok(None) => {}
            Err(e) => {
                self.registry.release_bitmap(native, bitmap);
                return Err(e);
            }
        }
        Ok(())
    }

    // === Item queries ===

    pub fn checked(&self, item: MenuItem) -> bool {
        self.menu.checked(item)
    }

    pub fn disabled(&self, item: MenuItem) -> bool {
        self.menu.disabled(item)
    }

    pub fn visible(&self, item: MenuItem) -> bool {
        self.menu.visible(item)
    }

    pub fn title(&self, item: MenuItem) -> Option<&str> {
        self.menu.title(item)
    }

    /// Read-only view of the whole menu tree.
    pub fn menu(&self) -> &MenuTree {
        &self.menu
    }
}

impl Drop for Tray {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!(error = %e, "teardown on drop failed");
        }
    }
}
