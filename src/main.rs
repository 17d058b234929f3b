//! Demo tray: a menu that exercises every item operation.
//!
//! Settings are read from `notify-tray.json` in the working directory when
//! it exists. Set `RUST_LOG=notify_tray=debug` to watch the menu being
//! reconciled.

#![cfg_attr(not(target_os = "windows"), allow(dead_code))]

use std::cell::Cell;
use std::rc::Rc;

use notify_tray::{Result, Tray, TrayConfig, TrayError};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "notify-tray.json";
const ICON_PATH: &str = "demo/app.ico";
const TOOLTIP: &str = "Unicode works here 棒棒嗒";

/// Sentinel stored in the opened counter once the menu was reset.
const STOP_COUNTING: i32 = -1;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn add_quit_item(tray: &mut Tray) -> Result<()> {
    let quit = tray.add_menu_item("Quit")?;
    tray.set_callback(quit, |tray| {
        tray.quit();
        Ok(())
    });
    Ok(())
}

fn on_ready(tray: &mut Tray) -> Result<()> {
    tray.set_open_on_left_click(false);
    tray.set_open_on_right_click(true);

    add_quit_item(tray)?;
    tray.add_separator()?;

    let opened_count = Rc::new(Cell::new(0));
    let opened_item = tray.add_menu_item("<this text will be replaced>")?;
    tray.disable(opened_item)?;

    let change = tray.add_menu_item("Click to change me")?;
    tray.set_callback(change, move |tray| tray.set_title(change, "I've Changed"));

    let checked = tray.add_menu_item("Checked")?;
    tray.check(checked)?;
    tray.set_callback(checked, move |tray| {
        if tray.checked(checked) {
            tray.uncheck(checked)?;
            tray.set_title(checked, "Unchecked")
        } else {
            tray.check(checked)?;
            tray.set_title(checked, "Checked")
        }
    });

    let enabled = tray.add_menu_item("Click to disable me")?;
    tray.set_callback(enabled, move |tray| {
        tray.set_title(enabled, "Disabled")?;
        tray.disable(enabled)
    });

    let idle = tray.add_menu_item("I do nothing")?;
    tray.set_item_icon_from_file_path(idle, ICON_PATH)?;

    let top = tray.add_menu_item("This is a submenu")?;
    let middle = tray.add_sub_menu_item(top, "This is a submenu of the submenu")?;
    let panic = tray.add_sub_menu_item(middle, "Panic!")?;
    tray.set_callback(panic, |_| Err(TrayError::abort("panic button pressed")));
    tray.add_sub_menu_item(middle, "This is a submenu of the submenu of the submenu")?;

    tray.add_separator()?;

    let toggle = tray.add_menu_item("Hide/show some menu items")?;
    let group = [enabled, change, checked];
    let mut shown = true;
    tray.set_callback(toggle, move |tray| {
        for item in group {
            if shown {
                tray.hide(item)?;
            } else {
                tray.show(item)?;
            }
        }
        shown = !shown;
        Ok(())
    });

    let reset = tray.add_menu_item("Reset all items")?;
    let counter = Rc::clone(&opened_count);
    tray.set_callback(reset, move |tray| {
        tray.reset_menu()?;
        add_quit_item(tray)?;
        counter.set(STOP_COUNTING);
        Ok(())
    });

    tray.on_tray_opened(move |tray| {
        if opened_count.get() == STOP_COUNTING {
            return Ok(());
        }
        opened_count.set(opened_count.get() + 1);
        tray.set_title(
            opened_item,
            &format!("The menu has been opened {} time(s)", opened_count.get()),
        )
    });
    Ok(())
}

#[cfg(target_os = "windows")]
fn main() -> Result<()> {
    use notify_tray::platform::windows::{show_message_box, Win32Shell};

    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting tray demo");

    let mut config = TrayConfig::load(CONFIG_FILE)?;
    config.icon_path.get_or_insert_with(|| ICON_PATH.into());
    config.tooltip.get_or_insert_with(|| TOOLTIP.to_string());

    let shell = Win32Shell::new()?;
    notify_tray::run_with_config(shell, &config, on_ready, |_| {
        show_message_box("Goodbye", "onExit called")
    })
}

#[cfg(not(target_os = "windows"))]
fn main() {
    init_logging();
    if let Err(e) = TrayConfig::load(CONFIG_FILE) {
        tracing::warn!(error = %e, "ignoring configuration");
    }
    tracing::error!("the demo tray needs the Windows notification area");
    std::process::exit(1);
}
