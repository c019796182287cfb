//! Host simulation: engine profiles, handler dispatch, and timers working together.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use dom::{CachedStatus, Document, EngineQuirks, EventHandler, LoadEvent, NodeKey, Size};

#[test]
fn timer_task_can_finish_a_load_and_reach_handlers() {
    let _ = env_logger::builder().is_test(true).try_init();
    let doc = Document::new(EngineQuirks::LEGACY);
    let frame = doc.append_element(doc.root(), "iframe").expect("iframe");
    let seen: Rc<RefCell<Vec<(NodeKey, Option<String>)>>> = Rc::default();

    let sink = Rc::clone(&seen);
    let handler: EventHandler = Rc::new(move |owner: &Document, node: NodeKey| {
        sink.borrow_mut().push((node, owner.ready_state(node)));
    });
    doc.set_handler(frame, LoadEvent::ReadyStateChange, Some(Rc::clone(&handler)))
        .expect("handler");
    doc.set_handler(frame, LoadEvent::Load, Some(handler)).expect("handler");

    let owner = doc.clone();
    doc.event_loop().set_timeout(Duration::from_millis(40), move || {
        owner.finish_load(frame, Size::new(300, 150)).expect("finish");
    });
    assert_eq!(doc.event_loop().advance(Duration::from_millis(39)), 0);
    assert!(seen.borrow().is_empty());

    assert_eq!(doc.event_loop().advance(Duration::from_millis(1)), 1);
    assert_eq!(
        *seen.borrow(),
        vec![
            (frame, Some(String::from("complete"))),
            (frame, Some(String::from("complete"))),
        ]
    );
    assert_eq!(doc.event_loop().now(), Duration::from_millis(40));
}

#[test]
fn reset_returns_a_resource_to_its_initial_state() {
    let doc = Document::new(EngineQuirks::LEGACY);
    let img = doc.append_element(doc.root(), "img").expect("img");
    doc.finish_load(img, Size::new(12, 12)).expect("finish");
    doc.set_status(img, CachedStatus::Success).expect("status");
    doc.set_synthetic_natural_size(img, Size::new(12, 12)).expect("natural");

    doc.reset_resource(img).expect("reset");
    assert_eq!(doc.status(img), CachedStatus::Pending);
    assert_eq!(doc.ready_state(img).as_deref(), Some("loading"));
    assert!(!doc.is_complete(img));
    assert_eq!(doc.natural_size(img), None);
    assert_eq!(doc.rendered_size(img).expect("size"), Size::ZERO);
}

#[test]
fn quirk_profiles_resolve_by_name() {
    for (name, quirks) in [
        ("modern", EngineQuirks::MODERN),
        ("transitional", EngineQuirks::TRANSITIONAL),
        ("legacy", EngineQuirks::LEGACY),
    ] {
        assert_eq!(EngineQuirks::from_name(name), Some(quirks));
        let doc = Document::new(quirks);
        let script = doc.create_element("script");
        assert_eq!(doc.ready_state(script).is_some(), quirks.ready_state);
    }
    assert_eq!(EngineQuirks::from_name("quantum"), None);
}
