//! Tests for the menu as the application sees it: nesting, item state,
//! visibility, resets and dispatch of clicks to callbacks.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use notify_tray::native::{WindowMessage, WM_COMMAND};
use notify_tray::testing::{MockFailure, MockNative};
use notify_tray::{run, ItemKind, ItemState, MenuItem, Tray, TrayError};

/// Build a menu in `on_ready`, let the scripted messages play out, then
/// inspect the tray in `on_exit`.
fn with_tray<B, C>(native: &MockNative, build: B, check: C)
where
    B: FnOnce(&mut Tray, &MockNative) -> notify_tray::Result<()>,
    C: FnOnce(&mut Tray, &MockNative),
{
    let script = native.clone();
    let observer = native.clone();
    run(
        native.clone(),
        move |tray| build(tray, &script),
        move |tray| check(tray, &observer),
    )
    .unwrap();
}

fn recorder(tray: &mut Tray, log: &Rc<RefCell<Vec<String>>>, title: &str) -> MenuItem {
    let item = tray.add_menu_item(title).unwrap();
    let log = Rc::clone(log);
    let name = title.to_string();
    tray.set_callback(item, move |_| {
        log.borrow_mut().push(name.clone());
        Ok(())
    });
    item
}

// === Nesting ===

#[test]
fn submenus_nest_three_levels() {
    let native = MockNative::new();
    let ids = Rc::new(Cell::new(None));
    let built = Rc::clone(&ids);

    with_tray(
        &native,
        move |tray, _| {
            let top = tray.add_menu_item("This is a submenu")?;
            let middle = tray.add_sub_menu_item(top, "This is a submenu of the submenu")?;
            let panic = tray.add_sub_menu_item(middle, "Panic!")?;
            let leaf = tray.add_sub_menu_item(middle, "This is a submenu of the submenu of the submenu")?;
            built.set(Some((top, middle, panic, leaf)));
            Ok(())
        },
        move |tray, native| {
            let (top, middle, panic, leaf) = ids.get().unwrap();
            let menu = tray.menu();

            assert_eq!(menu.depth(), 3);
            assert_eq!(menu.kind(top), Some(ItemKind::SubmenuParent));
            assert_eq!(menu.kind(middle), Some(ItemKind::SubmenuParent));
            assert_eq!(menu.kind(panic), Some(ItemKind::Normal));
            assert_eq!(menu.children(top), vec![middle]);
            assert_eq!(menu.children(middle), vec![panic, leaf]);

            let root = menu.root_menu().unwrap();
            assert_eq!(native.titles(root), vec!["This is a submenu"]);
            let inner = menu.submenu(middle).unwrap();
            assert_eq!(
                native.titles(inner),
                vec!["Panic!", "This is a submenu of the submenu of the submenu"]
            );
            assert_eq!(native.live_menus(), 3);
        },
    );
    assert_eq!(native.live_menus(), 0);
}

#[test]
fn separators_sit_between_items() {
    let native = MockNative::new();
    with_tray(
        &native,
        |tray, _| {
            tray.add_menu_item("Quit")?;
            tray.add_separator()?;
            tray.add_menu_item("after")?;
            Ok(())
        },
        |tray, native| {
            let root = tray.menu().root_menu().unwrap();
            assert_eq!(native.titles(root), vec!["Quit", "---", "after"]);
            assert_eq!(tray.menu().len(), 2);
        },
    );
}

// === Item state ===

#[test]
fn state_changes_reach_the_native_entry() {
    let native = MockNative::new();
    let slot = Rc::new(Cell::new(None));
    let built = Rc::clone(&slot);

    with_tray(
        &native,
        move |tray, _| {
            let item = tray.add_menu_item("Checked")?;
            tray.check(item)?;
            tray.disable(item)?;
            tray.set_title(item, "Renamed")?;
            built.set(Some(item));
            Ok(())
        },
        move |tray, native| {
            let item = slot.get().unwrap();
            assert_eq!(
                tray.menu().state(item),
                Some(ItemState {
                    disabled: true,
                    checked: true,
                    hidden: false,
                })
            );
            let entry = &native.entries(tray.menu().root_menu().unwrap())[0];
            assert_eq!(entry.id, u32::from(item.id()));
            assert_eq!(entry.title, "Renamed");
            assert!(entry.checked);
            assert!(entry.disabled);

            tray.uncheck(item).unwrap();
            tray.enable(item).unwrap();
            assert!(!tray.checked(item));
            assert!(!tray.disabled(item));
        },
    );
}

#[test]
fn hidden_item_comes_back_in_place() {
    let native = MockNative::new();
    with_tray(
        &native,
        |tray, _| {
            let first = tray.add_menu_item("first")?;
            let second = tray.add_menu_item("second")?;
            tray.add_menu_item("third")?;

            tray.hide(second)?;
            tray.hide(first)?;
            tray.hide(first)?;
            tray.show(second)?;
            tray.show(first)?;
            Ok(())
        },
        |tray, native| {
            let root = tray.menu().root_menu().unwrap();
            assert_eq!(native.titles(root), vec!["first", "second", "third"]);
        },
    );
}

#[test]
fn hiding_a_submenu_parent_hides_its_children() {
    let native = MockNative::new();
    with_tray(
        &native,
        |tray, _| {
            let parent = tray.add_menu_item("parent")?;
            tray.add_sub_menu_item(parent, "child")?;
            tray.add_menu_item("sibling")?;
            tray.hide(parent)?;
            Ok(())
        },
        |tray, native| {
            let root = tray.menu().root_menu().unwrap();
            assert_eq!(native.titles(root), vec!["sibling"]);
        },
    );
    assert_eq!(native.live_menus(), 0, "detached submenu is destroyed too");
}

#[test]
fn item_icons_are_released_at_teardown() {
    let native = MockNative::new();
    with_tray(
        &native,
        |tray, _| {
            let item = tray.add_menu_item("I do nothing")?;
            tray.set_item_icon_from_file_path(item, "app.ico")?;
            tray.set_item_icon_from_file_path(item, "other.ico")?;
            Ok(())
        },
        |_, native| assert_eq!(native.live_bitmaps(), 1),
    );
    assert_eq!(native.live_bitmaps(), 0);
}

#[test]
fn native_failures_leave_menu_usable() {
    let native = MockNative::new();
    with_tray(
        &native,
        |tray, native| {
            let a = tray.add_menu_item("a")?;
            native.fail(MockFailure::InsertItem);
            assert!(tray.add_menu_item("b").is_err());
            let c = tray.add_menu_item("c")?;

            native.fail(MockFailure::RemoveItem);
            assert!(tray.hide(a).is_err());
            assert!(tray.visible(a));
            tray.set_title(c, "C!")?;
            Ok(())
        },
        |tray, native| {
            let root = tray.menu().root_menu().unwrap();
            assert_eq!(native.titles(root), vec!["a", "C!"]);
            assert_eq!(tray.menu().len(), 2);
        },
    );
}

// === Resets ===

#[test]
fn reset_leaves_only_the_new_items() {
    let native = MockNative::new();
    let quit_ids = Rc::new(RefCell::new(Vec::new()));
    let first_ids = Rc::new(RefCell::new(Vec::new()));

    let (seen_quit, seen_first) = (Rc::clone(&quit_ids), Rc::clone(&first_ids));
    with_tray(
        &native,
        move |tray, script| {
            for title in ["a", "b", "c"] {
                seen_first.borrow_mut().push(tray.add_menu_item(title)?);
            }
            let reset = tray.add_menu_item("Reset all items")?;
            tray.set_callback(reset, move |tray| {
                tray.reset_menu()?;
                tray.reset_menu()?;
                let quit = tray.add_menu_item("Quit")?;
                seen_quit.borrow_mut().push(quit);
                Ok(())
            });
            script.command(reset);
            script.command(reset);
            Ok(())
        },
        |tray, native| {
            assert_eq!(tray.menu().len(), 1);
            let root = tray.menu().root_menu().unwrap();
            assert_eq!(native.titles(root), vec!["Quit"]);
            assert_eq!(native.live_menus(), 1);
        },
    );

    // The second command targets a handle that died in the first reset.
    let quit_ids = quit_ids.borrow();
    assert_eq!(quit_ids.len(), 1);
    assert!(first_ids.borrow().iter().all(|&old| old < quit_ids[0]));
}

#[test]
fn stale_handles_after_reset_are_inert() {
    let native = MockNative::new();
    with_tray(
        &native,
        |tray, _| {
            let old = tray.add_menu_item("old")?;
            tray.check(old)?;
            tray.reset_menu()?;

            tray.set_title(old, "ghost")?;
            tray.check(old)?;
            tray.hide(old)?;
            tray.set_item_icon_from_file_path(old, "app.ico")?;
            tray.set_callback(old, |_| Err(TrayError::abort("never runs")));

            assert!(!tray.checked(old));
            assert!(!tray.visible(old));
            assert_eq!(tray.title(old), None);
            assert_eq!(
                tray.add_sub_menu_item(old, "orphan"),
                Err(TrayError::StaleReference(old))
            );
            Ok(())
        },
        |tray, native| {
            assert!(tray.menu().is_empty());
            assert_eq!(native.live_bitmaps(), 0);
        },
    );
}

// === Dispatch ===

#[test]
fn each_click_runs_its_own_callback() {
    let native = MockNative::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let calls = Rc::clone(&log);

    with_tray(
        &native,
        move |tray, script| {
            let one = recorder(tray, &calls, "one");
            let two = recorder(tray, &calls, "two");
            let parent = tray.add_menu_item("parent")?;
            let nested = tray.add_sub_menu_item(parent, "nested")?;
            let nested_calls = Rc::clone(&calls);
            tray.set_callback(nested, move |_| {
                nested_calls.borrow_mut().push("nested".into());
                Ok(())
            });

            script.command(two);
            script.push_message(WindowMessage::new(WM_COMMAND, 999, 0));
            script.command(nested);
            script.command(parent);
            script.command(one);
            script.command(two);
            Ok(())
        },
        |_, _| {},
    );

    assert_eq!(*log.borrow(), vec!["two", "nested", "one", "two"]);
}

#[test]
fn disabled_items_ignore_clicks_until_enabled() {
    let native = MockNative::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let calls = Rc::clone(&log);

    with_tray(
        &native,
        move |tray, script| {
            let target = recorder(tray, &calls, "target");
            tray.disable(target)?;

            let toggle = tray.add_menu_item("enable target")?;
            tray.set_callback(toggle, move |tray| tray.enable(target));

            script.command(target);
            script.command(toggle);
            script.command(target);
            Ok(())
        },
        |_, _| {},
    );

    assert_eq!(*log.borrow(), vec!["target"]);
}

#[test]
fn callback_can_toggle_its_own_item() {
    let native = MockNative::new();
    let slot = Rc::new(Cell::new(None));
    let built = Rc::clone(&slot);

    with_tray(
        &native,
        move |tray, script| {
            let item = tray.add_menu_item("Checked")?;
            tray.check(item)?;
            tray.set_callback(item, move |tray| {
                if tray.checked(item) {
                    tray.uncheck(item)?;
                    tray.set_title(item, "Unchecked")
                } else {
                    tray.check(item)?;
                    tray.set_title(item, "Checked")
                }
            });
            built.set(Some(item));
            for _ in 0..3 {
                script.command(item);
            }
            Ok(())
        },
        move |tray, _| {
            let item = slot.get().unwrap();
            assert!(!tray.checked(item));
            assert_eq!(tray.title(item), Some("Unchecked"));
        },
    );
}

#[test]
fn long_tooltips_are_truncated() {
    let native = MockNative::new();
    let long = "x".repeat(200);
    with_tray(&native, move |tray, _| tray.set_tooltip(&long), |_, _| {});

    let (_, added) = native.notify_log()[0].clone();
    assert_eq!(added.tooltip.len(), 127);
}
