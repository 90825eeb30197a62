use std::cell::RefCell;
use std::rc::Rc;

use nh_model::common::observer::{any_event, kinds};
use nh_model::{Attribute, ElementFactory, ElementKind, EventKind, ModelError, ModelEvent, ModelSettings, Subscription, Value};

fn record_events(factory: &mut ElementFactory) -> (Rc<RefCell<Vec<ModelEvent>>>, Subscription) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let subscription = factory.subscribe(any_event, move |e, _| {
        sink.borrow_mut().push(e.clone());
        Ok(())
    });
    (events, subscription)
}

#[test]
fn test_create() {
    let mut ef = ElementFactory::new();
    let p = ef.create(ElementKind::Parameter).unwrap();
    assert_eq!(ef.size(), 1);
    assert!(ef.values().any(|e| e.uuid() == p));
}

#[test]
fn test_flush() {
    let mut ef = ElementFactory::new();
    let p = ef.create(ElementKind::Parameter).unwrap();
    assert_eq!(ef.values().count(), 1);

    ef.flush();
    assert_eq!(ef.size(), 0);
    assert!(ef.get(p).is_none());
    assert!(matches!(ef.unlink(p), Err(ModelError::DanglingReference(_))));
}

#[test]
fn test_unlink() {
    let mut ef = ElementFactory::new();
    let p = ef.create(ElementKind::Parameter).unwrap();
    assert_eq!(ef.size(), 1);
    ef.unlink(p).unwrap();
    assert_eq!(ef.size(), 0);

    let p = ef.create(ElementKind::Parameter).unwrap();
    let l = ef.create(ElementKind::LiteralString).unwrap();
    ef.set_reference(p, Attribute::DefaultValue, Some(l)).unwrap();
    assert_eq!(ef.size(), 2);
    assert_eq!(ef.get(l).unwrap().reference(Attribute::OwningElement), Some(p));

    // the default value is owned and goes with the parameter
    ef.unlink(p).unwrap();
    assert_eq!(ef.size(), 0);
}

#[test]
fn test_unlink_dependent_first() {
    let mut ef = ElementFactory::new();
    let p = ef.create(ElementKind::Parameter).unwrap();
    let l = ef.create(ElementKind::LiteralString).unwrap();
    ef.set_reference(p, Attribute::DefaultValue, Some(l)).unwrap();

    ef.unlink(l).unwrap();
    assert_eq!(ef.get(p).unwrap().reference(Attribute::DefaultValue), None);
    ef.unlink(p).unwrap();
    assert_eq!(ef.size(), 0);
}

#[test]
fn test_create_event() {
    let mut ef = ElementFactory::new();
    let (events, _s) = record_events(&mut ef);
    let p = ef.create(ElementKind::Parameter).unwrap();
    assert_eq!(
        events.borrow().last(),
        Some(&ModelEvent::ElementCreate { element: p, kind: ElementKind::Parameter })
    );
}

#[test]
fn test_remove_event() {
    let mut ef = ElementFactory::new();
    let (events, _s) = record_events(&mut ef);
    let p = ef.create(ElementKind::Parameter).unwrap();
    events.borrow_mut().clear();

    ef.unlink(p).unwrap();
    assert_eq!(
        events.borrow().last(),
        Some(&ModelEvent::ElementDelete { element: p, kind: ElementKind::Parameter })
    );
}

#[test]
fn test_model_event() {
    let mut ef = ElementFactory::new();
    let (events, _s) = record_events(&mut ef);
    ef.notify_model();
    assert_eq!(*events.borrow(), vec![ModelEvent::ModelFactory]);
    assert_eq!(ef.size(), 0);
}

#[test]
fn test_flush_event_is_single() {
    let mut ef = ElementFactory::new();
    for _ in 0..5 {
        ef.create(ElementKind::Class).unwrap();
    }
    let (events, _s) = record_events(&mut ef);
    ef.flush();
    assert_eq!(*events.borrow(), vec![ModelEvent::FlushFactory]);
}

#[test]
fn test_lifecycle_filter_ignores_attribute_changes() {
    let mut ef = ElementFactory::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _s = ef.subscribe(
        kinds(&[EventKind::ElementCreate, EventKind::ElementDelete, EventKind::ModelFactory, EventKind::FlushFactory]),
        move |e, _| {
            sink.borrow_mut().push(e.kind());
            Ok(())
        },
    );
    let c = ef.create(ElementKind::Class).unwrap();
    ef.set_value(c, Attribute::Name, Value::Text("Car".to_owned())).unwrap();
    ef.unlink(c).unwrap();
    assert_eq!(*seen.borrow(), vec![EventKind::ElementCreate, EventKind::ElementDelete]);
}

#[test]
fn test_dropped_subscription_is_silent() {
    let mut ef = ElementFactory::new();
    let (events, s) = record_events(&mut ef);
    drop(s);
    ef.create(ElementKind::Class).unwrap();
    assert!(events.borrow().is_empty());
}

#[test]
fn test_failing_subscriber_leaves_store_consistent() {
    let mut ef = ElementFactory::new();
    let _bad = ef.subscribe(any_event, |_, _| Err(ModelError::Subscriber("rejected".to_owned())));
    let (events, _s) = record_events(&mut ef);

    let p = ef.create(ElementKind::Parameter).unwrap();
    assert!(ef.contains(p));
    assert_eq!(events.borrow().len(), 1);
}

#[test]
fn test_undo() {
    let mut ef = ElementFactory::new();
    ef.begin_transaction().unwrap();
    let p = ef.create(ElementKind::Parameter).unwrap();
    assert!(ef.can_undo());

    ef.commit_transaction().unwrap();
    assert!(ef.can_undo());
    assert_eq!(ef.size(), 1);

    ef.undo_transaction().unwrap();
    assert!(!ef.can_undo());
    assert!(ef.can_redo());
    assert_eq!(ef.size(), 0);
    assert!(!ef.contains(p));

    ef.redo_transaction().unwrap();
    assert!(ef.can_undo());
    assert!(!ef.can_redo());
    assert_eq!(ef.size(), 1);
    assert_eq!(ef.lselect(|_| true)[0].uuid(), p);
}

#[test]
fn test_nested_transaction_is_rejected() {
    let mut ef = ElementFactory::new();
    ef.begin_transaction().unwrap();
    assert!(matches!(ef.begin_transaction(), Err(ModelError::InvalidState(_))));
    ef.commit_transaction().unwrap();
    assert!(matches!(ef.commit_transaction(), Err(ModelError::InvalidState(_))));
}

#[test]
fn test_new_transaction_clears_redo() {
    let mut ef = ElementFactory::new();
    ef.begin_transaction().unwrap();
    ef.create(ElementKind::Class).unwrap();
    ef.commit_transaction().unwrap();
    ef.undo_transaction().unwrap();
    assert!(ef.can_redo());

    ef.begin_transaction().unwrap();
    ef.create(ElementKind::Package).unwrap();
    ef.commit_transaction().unwrap();
    assert!(!ef.can_redo());
}

#[test]
fn test_undo_depth_from_settings() {
    let settings = ModelSettings::from_toml("undo_depth = 2").unwrap();
    let mut ef = ElementFactory::with_settings(settings);
    for _ in 0..4 {
        ef.begin_transaction().unwrap();
        ef.create(ElementKind::Class).unwrap();
        ef.commit_transaction().unwrap();
    }
    ef.undo_transaction().unwrap();
    ef.undo_transaction().unwrap();
    ef.undo_transaction().unwrap();
    assert_eq!(ef.size(), 2);
}

#[test]
fn test_undo_emits_lifecycle_events() {
    let mut ef = ElementFactory::new();
    ef.begin_transaction().unwrap();
    let p = ef.create(ElementKind::Parameter).unwrap();
    ef.commit_transaction().unwrap();

    let (events, _s) = record_events(&mut ef);
    ef.undo_transaction().unwrap();
    ef.redo_transaction().unwrap();
    assert_eq!(
        *events.borrow(),
        vec![
            ModelEvent::ElementDelete { element: p, kind: ElementKind::Parameter },
            ModelEvent::ElementCreate { element: p, kind: ElementKind::Parameter },
        ]
    );
}

#[test]
fn test_lselect_kind_includes_specializations() {
    let mut ef = ElementFactory::new();
    ef.create(ElementKind::Class).unwrap();
    ef.create(ElementKind::Component).unwrap();
    ef.create(ElementKind::Interface).unwrap();
    ef.create(ElementKind::Package).unwrap();
    assert_eq!(ef.lselect_kind(ElementKind::Class).len(), 2);
    assert_eq!(ef.lselect_kind(ElementKind::Classifier).len(), 3);
    assert_eq!(ef.lselect_kind(ElementKind::NamedElement).len(), 4);
}
