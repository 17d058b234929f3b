//! Tests for the run loop: startup order, pump, callbacks and teardown,
//! driven end to end through the in-memory backend.

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc;

use notify_tray::native::NotifyOp;
use notify_tray::testing::{MockFailure, MockNative};
use notify_tray::{run, run_with_config, spawn, MenuItem, Tray, TrayConfig, TrayError};

fn counting_item(tray: &mut Tray, title: &str, hits: &Rc<Cell<u32>>) -> MenuItem {
    let item = tray.add_menu_item(title).unwrap();
    let hits = Rc::clone(hits);
    tray.set_callback(item, move |_| {
        hits.set(hits.get() + 1);
        Ok(())
    });
    item
}

fn assert_released(native: &MockNative) {
    assert!(native.shell_icon().is_none());
    assert_eq!(native.live_menus(), 0);
    assert_eq!(native.live_icons(), 0);
    assert_eq!(native.live_bitmaps(), 0);
    assert!(!native.window_alive());
    assert!(!native.class_registered());
}

// === Ordering ===

#[test]
fn hooks_run_in_order_around_the_pump() {
    let native = MockNative::new();
    let events = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&events);
    let script = native.clone();
    let on_ready = move |tray: &mut Tray| {
        log.borrow_mut().push("ready");
        assert!(script.window_alive());
        assert!(script.shell_icon().is_none(), "icon is added after on_ready");
        let log = Rc::clone(&log);
        tray.on_tray_opened(move |_| {
            log.borrow_mut().push("opened");
            Ok(())
        });
        script.right_click();
        Ok(())
    };

    let log = Rc::clone(&events);
    let observer = native.clone();
    let on_exit = move |tray: &mut Tray| {
        log.borrow_mut().push("exit");
        assert!(observer.shell_icon().is_some(), "on_exit runs before teardown");
        assert_eq!(tray.tooltip(), "");
    };

    run(native.clone(), on_ready, on_exit).unwrap();
    assert_eq!(*events.borrow(), vec!["ready", "opened", "exit"]);
    assert_released(&native);
}

#[test]
fn icon_is_added_once_and_removed_once() {
    let native = MockNative::new();
    run(native.clone(), |tray| tray.set_tooltip("hello"), |_| {}).unwrap();

    let ops: Vec<NotifyOp> = native.notify_log().into_iter().map(|(op, _)| op).collect();
    assert_eq!(ops, vec![NotifyOp::Add, NotifyOp::Delete]);
    assert_eq!(native.notify_log()[0].1.tooltip, "hello");
}

// === Failures ===

#[test]
fn class_registration_failure_aborts_before_on_ready() {
    let native = MockNative::new();
    native.fail(MockFailure::RegisterClass);
    let ready = Rc::new(Cell::new(false));
    let exited = Rc::new(Cell::new(false));

    let (r, e) = (Rc::clone(&ready), Rc::clone(&exited));
    let result = run(
        native.clone(),
        move |_| {
            r.set(true);
            Ok(())
        },
        move |_| e.set(true),
    );

    assert!(matches!(result, Err(TrayError::ResourceCreation(_))));
    assert!(!ready.get());
    assert!(!exited.get());
    assert_released(&native);
}

#[test]
fn window_failure_unregisters_class() {
    let native = MockNative::new();
    native.fail(MockFailure::CreateWindow);
    let result = run(native.clone(), |_| Ok(()), |_| {});
    assert!(matches!(result, Err(TrayError::ResourceCreation(_))));
    assert!(!native.class_registered());
}

#[test]
fn on_ready_error_skips_on_exit_and_cleans_up() {
    let native = MockNative::new();
    let exited = Rc::new(Cell::new(false));
    let e = Rc::clone(&exited);

    let result = run(
        native.clone(),
        |tray| {
            tray.add_menu_item("half built")?;
            Err(TrayError::abort("no menu today"))
        },
        move |_| e.set(true),
    );

    assert_eq!(result, Err(TrayError::abort("no menu today")));
    assert!(!exited.get());
    assert_released(&native);
}

#[test]
fn rejected_icon_fails_the_run() {
    let native = MockNative::new();
    native.fail(MockFailure::NotifyAdd);
    let result = run(native.clone(), |_| Ok(()), |_| {});
    assert!(matches!(result, Err(TrayError::ShellRegistration(_))));
    assert_released(&native);
}

#[test]
fn bad_icon_file_is_resource_load_error() {
    let native = MockNative::new();
    native.fail(MockFailure::LoadImage);
    let result = run(
        native.clone(),
        |tray| tray.set_icon_from_file_path("missing.ico"),
        |_| {},
    );
    match result {
        Err(TrayError::ResourceLoad { path, .. }) => assert_eq!(path, PathBuf::from("missing.ico")),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn aborting_callback_ends_run_with_its_error() {
    let native = MockNative::new();
    let later = Rc::new(Cell::new(0));
    let exited = Rc::new(Cell::new(false));

    let script = native.clone();
    let hits = Rc::clone(&later);
    let e = Rc::clone(&exited);
    let result = run(
        native.clone(),
        move |tray| {
            let top = tray.add_menu_item("This is a submenu")?;
            let middle = tray.add_sub_menu_item(top, "This is a submenu of the submenu")?;
            let panic = tray.add_sub_menu_item(middle, "Panic!")?;
            tray.set_callback(panic, |_| Err(TrayError::abort("panic button pressed")));
            let after = counting_item(tray, "after", &hits);

            script.command(panic);
            script.command(after);
            Ok(())
        },
        move |_| e.set(true),
    );

    assert_eq!(result, Err(TrayError::abort("panic button pressed")));
    assert_eq!(later.get(), 0, "no dispatch after the abort");
    assert!(exited.get(), "on_exit still runs");
    assert_released(&native);
}

// === Pump control ===

#[test]
fn quit_from_callback_stops_dispatch() {
    let native = MockNative::new();
    let hits = Rc::new(Cell::new(0));

    let script = native.clone();
    let counter = Rc::clone(&hits);
    run(
        native.clone(),
        move |tray| {
            let quit = tray.add_menu_item("Quit")?;
            tray.set_callback(quit, |tray| {
                tray.quit();
                tray.quit();
                Ok(())
            });
            let other = counting_item(tray, "other", &counter);
            script.command(quit);
            script.command(other);
            Ok(())
        },
        |_| {},
    )
    .unwrap();

    assert_eq!(hits.get(), 0);
    assert_eq!(native.quit_posts(), 1);
}

#[test]
fn close_message_ends_run() {
    let native = MockNative::new();
    let hits = Rc::new(Cell::new(0));

    let script = native.clone();
    let counter = Rc::clone(&hits);
    run(
        native.clone(),
        move |tray| {
            let item = counting_item(tray, "item", &counter);
            script.command(item);
            script.close();
            script.command(item);
            Ok(())
        },
        |_| {},
    )
    .unwrap();

    assert_eq!(hits.get(), 1);
    assert_released(&native);
}

// === Tray opened ===

#[test]
fn opened_counter_stops_after_reset() {
    let native = MockNative::new();
    let count = Rc::new(Cell::new(0));
    let seen = Rc::new(RefCell::new(None));

    let script = native.clone();
    let counter = Rc::clone(&count);
    let probe_seen = Rc::clone(&seen);
    run(
        native.clone(),
        move |tray| {
            let opened = tray.add_menu_item("<this text will be replaced>")?;
            tray.disable(opened)?;

            let probe = tray.add_menu_item("probe")?;
            let probe_counter = Rc::clone(&counter);
            tray.set_callback(probe, move |tray| {
                *probe_seen.borrow_mut() = Some((probe_counter.get(), tray.title(opened).map(String::from)));
                Ok(())
            });

            let reset = tray.add_menu_item("Reset all items")?;
            let reset_counter = Rc::clone(&counter);
            tray.set_callback(reset, move |tray| {
                tray.reset_menu()?;
                let quit = tray.add_menu_item("Quit")?;
                tray.set_callback(quit, |tray| {
                    tray.quit();
                    Ok(())
                });
                reset_counter.set(-1);
                Ok(())
            });

            let hook_counter = Rc::clone(&counter);
            tray.on_tray_opened(move |tray| {
                if hook_counter.get() == -1 {
                    return Ok(());
                }
                hook_counter.set(hook_counter.get() + 1);
                tray.set_title(opened, &format!("The menu has been opened {} time(s)", hook_counter.get()))
            });

            for _ in 0..3 {
                script.right_click();
            }
            script.command(probe);
            script.command(reset);
            script.right_click();
            script.right_click();
            Ok(())
        },
        |tray| assert_eq!(tray.menu().len(), 1),
    )
    .unwrap();

    assert_eq!(
        *seen.borrow(),
        Some((3, Some("The menu has been opened 3 time(s)".to_string())))
    );
    assert_eq!(count.get(), -1);
    assert_eq!(native.popups().len(), 5);
}

#[test]
fn left_click_opens_only_when_enabled() {
    let native = MockNative::new();
    let script = native.clone();
    run(
        native.clone(),
        move |tray| {
            tray.set_open_on_left_click(true);
            tray.set_open_on_right_click(false);
            script.left_click();
            script.right_click();
            script.left_click();
            Ok(())
        },
        |_| {},
    )
    .unwrap();
    assert_eq!(native.popups().len(), 2);
}

// === Configuration ===

#[test]
fn config_is_applied_before_on_ready() {
    let native = MockNative::new();
    let config = TrayConfig {
        window_class: "CustomTrayClass".into(),
        tooltip: Some("from config".into()),
        icon_path: Some("config.ico".into()),
        open_on_left_click: true,
        open_on_right_click: false,
    };

    let observer = native.clone();
    run_with_config(
        native.clone(),
        &config,
        move |tray| {
            assert_eq!(observer.class_name().as_deref(), Some("CustomTrayClass"));
            assert_eq!(tray.tooltip(), "from config");
            tray.set_tooltip("from on_ready")?;
            observer.left_click();
            Ok(())
        },
        |_| {},
    )
    .unwrap();

    let (op, added) = native.notify_log()[0].clone();
    assert_eq!(op, NotifyOp::Add);
    assert_eq!(added.tooltip, "from on_ready");
    assert!(added.icon.is_some());
    assert_eq!(native.popups().len(), 1);
}

// === Other threads ===

#[test]
fn spawned_tray_takes_commands_from_other_threads() {
    let native = MockNative::new();
    native.block_when_idle(true);
    let remote = native.clone();

    let (handle, join) = spawn(
        move || Ok(remote),
        TrayConfig::default(),
        |tray| tray.add_menu_item("Quit").map(|_| ()),
        |_| {},
    )
    .unwrap();

    let item = handle.add_menu_item("from worker").unwrap();
    let child = handle.add_sub_menu_item(item, "child").unwrap();
    assert!(child > item);
    handle.set_title(item, "renamed");
    handle.check(child);
    handle.set_tooltip("remote tooltip");

    let (report_tx, report_rx) = mpsc::channel();
    handle.invoke(move |tray| {
        let report = (
            tray.title(item).map(String::from),
            tray.checked(child),
            tray.tooltip().to_string(),
            tray.menu().len(),
        );
        let _ = report_tx.send(report);
        Ok(())
    });
    let report = report_rx.recv().unwrap();
    assert_eq!(
        report,
        (Some("renamed".to_string()), true, "remote tooltip".to_string(), 3)
    );

    handle.reset_menu();
    assert_eq!(
        handle.add_sub_menu_item(item, "orphan"),
        Err(TrayError::StaleReference(item))
    );

    handle.quit();
    assert_eq!(join.join().unwrap(), Ok(()));
    assert_released(&native);

    // Nothing is listening any more.
    handle.set_title(item, "too late");
    assert_eq!(handle.add_menu_item("too late"), Err(TrayError::Disconnected));
}

#[test]
fn failing_invoke_ends_spawned_run() {
    let native = MockNative::new();
    native.block_when_idle(true);
    let remote = native.clone();

    let (handle, join) = spawn(move || Ok(remote), TrayConfig::default(), |_| Ok(()), |_| {}).unwrap();
    handle.invoke(|_| Err(TrayError::abort("remote stop")));

    assert_eq!(join.join().unwrap(), Err(TrayError::abort("remote stop")));
    assert_released(&native);
}

#[test]
fn backend_failure_is_reported_by_spawn() {
    let result = spawn(
        || -> notify_tray::Result<MockNative> { Err(TrayError::ResourceCreation("no shell".into())) },
        TrayConfig::default(),
        |_| Ok(()),
        |_| {},
    );
    assert!(matches!(result, Err(TrayError::ResourceCreation(_))));
}
