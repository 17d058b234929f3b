//! Run loop: startup, message pump and teardown of one tray run.
//!
//! Order of a run:
//! 1. register window class, create the message window and root menu
//! 2. apply the config icon and tooltip
//! 3. `on_ready`
//! 4. add the notification icon
//! 5. pump until quit, close or a callback error
//! 6. `on_exit` (skipped if steps 1-4 failed)
//! 7. remove icon, destroy menus and window, unregister class

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{error, info};

use crate::config::TrayConfig;
use crate::error::{Result, TrayError};
use crate::events::TrayHandle;
use crate::native::Native;
use crate::tray::Tray;

/// Run a tray with default settings on the calling thread.
pub fn run<N, R, E>(native: N, on_ready: R, on_exit: E) -> Result<()>
where
    N: Native + 'static,
    R: FnOnce(&mut Tray) -> Result<()>,
    E: FnOnce(&mut Tray),
{
    run_with_config(native, &TrayConfig::default(), on_ready, on_exit)
}

/// Run a tray on the calling thread. Returns once the pump has stopped and
/// every native resource is released.
pub fn run_with_config<N, R, E>(native: N, config: &TrayConfig, on_ready: R, on_exit: E) -> Result<()>
where
    N: Native + 'static,
    R: FnOnce(&mut Tray) -> Result<()>,
    E: FnOnce(&mut Tray),
{
    let mut tray = Tray::new(Box::new(native), config);
    drive(&mut tray, config, on_ready, on_exit)
}

fn drive<R, E>(tray: &mut Tray, config: &TrayConfig, on_ready: R, on_exit: E) -> Result<()>
where
    R: FnOnce(&mut Tray) -> Result<()>,
    E: FnOnce(&mut Tray),
{
    let result = start(tray, config, on_ready).and_then(|()| {
        let pumped = tray.pump();
        on_exit(tray);
        pumped
    });
    let torn_down = tray.teardown();

    if let Err(e) = &result {
        error!(error = %e, "tray run failed");
    } else {
        info!("tray run finished");
    }
    result.and(torn_down)
}

fn start<R>(tray: &mut Tray, config: &TrayConfig, on_ready: R) -> Result<()>
where
    R: FnOnce(&mut Tray) -> Result<()>,
{
    tray.startup(&config.window_class)?;
    if let Some(path) = &config.icon_path {
        tray.set_icon_from_file_path(path)?;
    }
    if let Some(tooltip) = &config.tooltip {
        tray.set_tooltip(tooltip)?;
    }
    on_ready(tray)?;
    tray.install_icon()?;
    info!("tray ready");
    Ok(())
}

/// Run the tray on a dedicated thread named `tray-ui`.
///
/// `make_native` runs on that thread, since native windows belong to the
/// thread that creates them. Returns a handle for driving the tray from the
/// caller's side and the join handle carrying the run's result.
pub fn spawn<M, N, R, E>(
    make_native: M,
    config: TrayConfig,
    on_ready: R,
    on_exit: E,
) -> Result<(TrayHandle, JoinHandle<Result<()>>)>
where
    M: FnOnce() -> Result<N> + Send + 'static,
    N: Native + 'static,
    R: FnOnce(&mut Tray) -> Result<()> + Send + 'static,
    E: FnOnce(&mut Tray) + Send + 'static,
{
    let (handle_tx, handle_rx) = mpsc::channel();
    let join = thread::Builder::new()
        .name("tray-ui".into())
        .spawn(move || {
            let native = make_native()?;
            let mut tray = Tray::new(Box::new(native), &config);
            // The caller may already be gone
            let _ = handle_tx.send(tray.handle());
            drive(&mut tray, &config, on_ready, on_exit)
        })
        .map_err(|e| TrayError::ResourceCreation(format!("tray thread: {}", e)))?;

    match handle_rx.recv() {
        Ok(handle) => Ok((handle, join)),
        // The thread ended before handing out a handle
        Err(_) => Err(match join.join() {
            Ok(Err(e)) => e,
            Ok(Ok(())) => TrayError::Disconnected,
            Err(_) => TrayError::ResourceCreation("tray thread panicked".into()),
        }),
    }
}
