//! Native resource handles and the registry that pairs every create with a
//! destroy.
//!
//! Handles are opaque integers. The Windows backend stores the raw `HWND`,
//! `HMENU`, `HICON` and `HBITMAP` values in them; the mock backend hands out
//! counters.

use std::fmt;

use tracing::debug;

use crate::native::Native;

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }
    };
}

native_handle!(
    /// The message-only window owning the notification icon.
    WindowHandle
);
native_handle!(
    /// A popup menu (root or submenu).
    MenuHandle
);
native_handle!(
    /// An icon shown in the notification area.
    IconHandle
);
native_handle!(
    /// A bitmap drawn next to a menu item.
    BitmapHandle
);

/// Ownership record for the resources of one run.
///
/// Menus are owned by the menu tree; everything else lives here until it is
/// replaced or the run is torn down.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    class_registered: bool,
    window: Option<WindowHandle>,
    icons: Vec<IconHandle>,
    bitmaps: Vec<BitmapHandle>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_class_registered(&mut self) {
        self.class_registered = true;
    }

    /// Returns true exactly once after the class was registered.
    pub fn take_class(&mut self) -> bool {
        std::mem::take(&mut self.class_registered)
    }

    pub fn set_window(&mut self, window: WindowHandle) {
        self.window = Some(window);
    }

    pub fn take_window(&mut self) -> Option<WindowHandle> {
        self.window.take()
    }

    /// The OS destroyed the window on its own; nothing left to release.
    pub fn forget_window(&mut self) {
        if let Some(window) = self.window.take() {
            debug!(%window, "window destroyed externally");
        }
    }

    pub fn adopt_icon(&mut self, icon: IconHandle) {
        self.icons.push(icon);
    }

    pub fn adopt_bitmap(&mut self, bitmap: BitmapHandle) {
        self.bitmaps.push(bitmap);
    }

    /// Destroy an icon this registry owns. Unknown handles are ignored.
    pub fn release_icon(&mut self, native: &mut dyn Native, icon: IconHandle) {
        if let Some(pos) = self.icons.iter().position(|&h| h == icon) {
            self.icons.swap_remove(pos);
            native.destroy_icon(icon);
        }
    }

    /// Destroy a bitmap this registry owns. Unknown handles are ignored.
    pub fn release_bitmap(&mut self, native: &mut dyn Native, bitmap: BitmapHandle) {
        if let Some(pos) = self.bitmaps.iter().position(|&h| h == bitmap) {
            self.bitmaps.swap_remove(pos);
            native.destroy_bitmap(bitmap);
        }
    }

    /// Destroy every icon and bitmap still owned.
    pub fn release_all(&mut self, native: &mut dyn Native) {
        for icon in self.icons.drain(..) {
            native.destroy_icon(icon);
        }
        for bitmap in self.bitmaps.drain(..) {
            native.destroy_bitmap(bitmap);
        }
    }

    pub fn owned_icons(&self) -> usize {
        self.icons.len()
    }

    pub fn owned_bitmaps(&self) -> usize {
        self.bitmaps.len()
    }
}
