//! Command bus between application threads and the tray thread.
//!
//! - Any thread queues commands through a [`TrayHandle`]
//! - Each send also wakes the pump with a private window message
//! - The tray thread drains the bus between native messages
//!
//! No locks guard the tray state: the tray thread is its only writer.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, ThreadId};

use super::types::{TrayCommand, TrayJob};
use crate::error::{Result, TrayError};
use crate::menu::MenuItem;
use crate::native::Waker;
use crate::tray::Tray;

/// Receiving end of the bus, owned by the tray thread.
pub struct CommandBus {
    sender: Sender<TrayCommand>,
    receiver: Receiver<TrayCommand>,
}

impl CommandBus {
    /// Create a new command bus.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    /// Get a handle that other threads can use to reach the tray.
    ///
    /// Must be called on the tray thread; the handle remembers it so that
    /// blocking calls from that same thread fail instead of deadlocking.
    pub fn handle(&self, waker: Waker) -> TrayHandle {
        TrayHandle {
            sender: self.sender.clone(),
            waker,
            tray_thread: thread::current().id(),
        }
    }

    /// Try to receive the next command without blocking.
    pub fn try_recv(&self) -> Option<TrayCommand> {
        match self.receiver.try_recv() {
            Ok(command) => Some(command),
            // The bus keeps its own sender, so Disconnected cannot happen
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain all pending commands into a Vec.
    pub fn drain(&self) -> Vec<TrayCommand> {
        let mut commands = Vec::new();
        while let Some(command) = self.try_recv() {
            commands.push(command);
        }
        commands
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable, thread-safe handle to a running tray.
///
/// Every method queues a [`TrayCommand`] and returns immediately, except
/// `add_menu_item`/`add_sub_menu_item`, which wait for the tray thread to
/// allocate the item. Commands sent after the tray stopped are dropped.
#[derive(Clone)]
pub struct TrayHandle {
    sender: Sender<TrayCommand>,
    waker: Waker,
    tray_thread: ThreadId,
}

impl TrayHandle {
    /// Queue a command and wake the tray thread.
    pub fn send(&self, command: TrayCommand) {
        // Ignore send errors - receiver dropped means the tray has exited
        if self.sender.send(command).is_ok() {
            (self.waker)();
        }
    }

    pub fn set_title(&self, item: MenuItem, title: impl Into<String>) {
        self.send(TrayCommand::SetTitle(item, title.into()));
    }

    pub fn enable(&self, item: MenuItem) {
        self.send(TrayCommand::SetEnabled(item, true));
    }

    pub fn disable(&self, item: MenuItem) {
        self.send(TrayCommand::SetEnabled(item, false));
    }

    pub fn check(&self, item: MenuItem) {
        self.send(TrayCommand::SetChecked(item, true));
    }

    pub fn uncheck(&self, item: MenuItem) {
        self.send(TrayCommand::SetChecked(item, false));
    }

    pub fn show(&self, item: MenuItem) {
        self.send(TrayCommand::SetVisible(item, true));
    }

    pub fn hide(&self, item: MenuItem) {
        self.send(TrayCommand::SetVisible(item, false));
    }

    pub fn set_item_icon_from_file_path(&self, item: MenuItem, path: impl Into<PathBuf>) {
        self.send(TrayCommand::SetItemIcon(item, path.into()));
    }

    pub fn set_icon_from_file_path(&self, path: impl Into<PathBuf>) {
        self.send(TrayCommand::SetIcon(path.into()));
    }

    pub fn set_tooltip(&self, text: impl Into<String>) {
        self.send(TrayCommand::SetTooltip(text.into()));
    }

    pub fn set_open_on_left_click(&self, open: bool) {
        self.send(TrayCommand::SetOpenOnLeftClick(open));
    }

    pub fn set_open_on_right_click(&self, open: bool) {
        self.send(TrayCommand::SetOpenOnRightClick(open));
    }

    pub fn add_separator(&self) {
        self.send(TrayCommand::AddSeparator);
    }

    pub fn reset_menu(&self) {
        self.send(TrayCommand::ResetMenu);
    }

    /// Ask the pump to stop. Idempotent.
    pub fn quit(&self) {
        self.send(TrayCommand::Quit);
    }

    /// Run `job` on the tray thread. An `Err` from the job ends the run.
    pub fn invoke<F>(&self, job: F)
    where
        F: FnOnce(&mut Tray) -> Result<()> + Send + 'static,
    {
        let job: TrayJob = Box::new(job);
        self.send(TrayCommand::Invoke(job));
    }

    /// Add a top-level item, waiting for the tray thread to create it.
    pub fn add_menu_item(&self, title: impl Into<String>) -> Result<MenuItem> {
        self.request_item(None, title.into())
    }

    /// Add a child of `parent`, waiting for the tray thread to create it.
    pub fn add_sub_menu_item(&self, parent: MenuItem, title: impl Into<String>) -> Result<MenuItem> {
        self.request_item(Some(parent), title.into())
    }

    fn request_item(&self, parent: Option<MenuItem>, title: String) -> Result<MenuItem> {
        if thread::current().id() == self.tray_thread {
            return Err(TrayError::WrongThread);
        }
        let (reply, response) = mpsc::channel();
        self.sender
            .send(TrayCommand::AddMenuItem { parent, title, reply })
            .map_err(|_| TrayError::Disconnected)?;
        (self.waker)();
        response.recv().map_err(|_| TrayError::Disconnected)?
    }
}
