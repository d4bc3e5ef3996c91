// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listeners on a bubble-only node tree, with capture emulated by the event system.
//!
//! This example shows:
//! - registering capture and bubble listeners on native nodes,
//! - a capture listener vetoing the default action,
//! - a one-shot listener and an `EventHandler` that cleans up on drop,
//! - a `Listenable` chain dispatched in-process.
//!
//! Run:
//! - `RUST_LOG=trace cargo run -p understory_listener_demos --example listener_tree`

use std::cell::Cell;
use std::rc::Rc;

use understory_listener::adapters::tree::TreeSource;
use understory_listener::{
    Callback, Event, EventHandler, EventRecord, EventSystem, ListenOptions, Listenable, Outcome,
    Target,
};

fn main() {
    env_logger::Builder::from_default_env()
        .filter_module("understory_listener", log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    // window ─ form ─ submit
    let system = EventSystem::new(TreeSource::<Event<bool>>::new());
    let window = system.source().add_root();
    let form = system.source().add_child(window);
    let submit = system.source().add_child(form);
    println!("capture emulated: {}", system.emulates_capture());

    let trace = |name: &'static str| {
        Callback::new(move |ev: &mut Event<bool>| {
            println!("  {name} saw `{}`", ev.event_type());
            Outcome::Continue
        })
    };
    for (node, name, options) in [
        (window, "window (capture)", ListenOptions::capture()),
        (submit, "submit (bubble)", ListenOptions::bubble()),
        (window, "window (bubble)", ListenOptions::bubble()),
    ] {
        system.listen(Target::Native(node), "click", &trace(name), options);
    }

    // The form refuses clicks while its payload says it is invalid.
    let validate = Callback::new(|ev: &mut Event<bool>| {
        if ev.payload {
            Outcome::Continue
        } else {
            println!("  form vetoed the click");
            Outcome::PreventDefault
        }
    });
    system.listen(Target::Native(form), "click", &validate, ListenOptions::capture());

    println!("valid click:");
    let ok = system.source().fire(submit, &mut Event::with_payload("click", true));
    println!("  default allowed: {ok}");

    println!("invalid click:");
    let ok = system.source().fire(submit, &mut Event::with_payload("click", false));
    println!("  default allowed: {ok}");

    // One-shot listeners owned by a handler.
    let fired = Rc::new(Cell::new(0));
    {
        let mut handler = EventHandler::new(&system);
        let fired2 = fired.clone();
        handler.listen_once(
            Target::Native(submit),
            "focus",
            &Callback::new(move |_| {
                fired2.set(fired2.get() + 1);
                Outcome::Continue
            }),
            ListenOptions::bubble(),
        );
        for _ in 0..3 {
            system.source().fire(submit, &mut Event::with_payload("focus", true));
        }
        println!("one-shot focus listener fired {} time(s)", fired.get());
    }
    println!(
        "listeners: {}, physical subscriptions: {}",
        system.listener_count(),
        system.source().subscription_count()
    );

    for node in [window, form, submit] {
        system.remove_all(Target::Native(node), None);
    }
    println!(
        "after teardown: {} subscriptions",
        system.source().subscription_count()
    );

    // In-process targets.
    let dialog: Listenable<Event<bool>> = Listenable::new();
    let ok_button: Listenable<Event<bool>> = Listenable::new();
    ok_button.set_parent(Some(&dialog));
    dialog.listen(
        "action",
        &Callback::new(|ev: &mut Event<bool>| {
            println!("  dialog closes");
            ev.stop_propagation();
            Outcome::Continue
        }),
        ListenOptions::bubble(),
    );
    ok_button.listen("action", &trace("ok button"), ListenOptions::bubble());
    println!("dialog action:");
    system.dispatch_event(&ok_button, &mut Event::with_payload("action", true));
}
