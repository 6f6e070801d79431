use mabs_core::{Container, Error, EventBus, EventPayload, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use std::sync::Arc;

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, EventBus) {
    (Arc::new(Mutex::new(Vec::new())), EventBus::new(Container::new()))
}

#[test]
fn test_priority_order() {
    let (log, bus) = recorder();
    for (label, priority) in [("low", -5), ("high", 100), ("mid", 0)] {
        let log = log.clone();
        bus.register("order", priority, move |_, _| {
            log.lock().push(label);
            Ok(())
        });
    }

    bus.dispatch("order", EventPayload::None).unwrap();
    assert_eq!(*log.lock(), vec!["high", "mid", "low"]);
}

#[test]
fn test_equal_priority_keeps_registration_order() {
    let (log, bus) = recorder();
    for label in ["first", "second", "third"] {
        let log = log.clone();
        bus.register("ties", 10, move |_, _| {
            log.lock().push(label);
            Ok(())
        });
    }

    bus.dispatch("ties", EventPayload::None).unwrap();
    assert_eq!(*log.lock(), vec!["first", "second", "third"]);
}

#[test]
fn test_listener_error_stops_dispatch() {
    let (log, bus) = recorder();
    let before = log.clone();
    let after = log.clone();
    bus.register("fail", 10, move |_, _| {
        before.lock().push("before");
        Ok(())
    })
    .register("fail", 5, |_, _| Err(Error::listener("fail", "broken")))
    .register("fail", 0, move |_, _| {
        after.lock().push("after");
        Ok(())
    });

    let result = bus.dispatch("fail", EventPayload::None);
    assert!(matches!(result, Err(Error::Listener { .. })));
    assert_eq!(*log.lock(), vec!["before"]);
}

#[test]
fn test_detach_removes_channel() {
    let (log, bus) = recorder();
    let sink = log.clone();
    bus.register("gone", 0, move |_, _| {
        sink.lock().push("called");
        Ok(())
    });

    bus.detach("gone");
    bus.dispatch("gone", EventPayload::None).unwrap();

    assert!(log.lock().is_empty());
    assert!(!bus.has_listeners("gone"));
    assert!(bus.listeners_by_event("gone").is_none());
}

#[test]
fn test_detach_unknown_event_is_noop() {
    let bus = EventBus::new(Container::new());
    bus.detach("never.registered");
    assert!(bus.listeners().is_empty());
}

#[test]
fn test_listener_introspection() {
    let bus = EventBus::new(Container::new());
    bus.register("a", 1, |_, _| Ok(()))
        .register("a", 9, |_, _| Ok(()))
        .register("b", 0, |_, _| Ok(()));

    let a = bus.listeners_by_event("a").unwrap();
    assert_eq!(
        a.iter().map(|info| info.priority).collect::<Vec<_>>(),
        vec![9, 1]
    );
    assert!(a[0].sequence > a[1].sequence);
    assert_eq!(bus.listeners().len(), 2);
}

#[test]
fn test_event_names_are_trimmed_everywhere() {
    let (log, bus) = recorder();
    let seen = log.clone();
    bus.register("x", 0, move |_, _| {
        seen.lock().push("x");
        Ok(())
    });

    assert!(bus.has_listeners(" x "));
    assert_eq!(bus.listeners_by_event(" x ").map(|infos| infos.len()), Some(1));

    bus.dispatch(" x ", EventPayload::None).unwrap();
    assert_eq!(*log.lock(), vec!["x"]);

    bus.detach(" x ");
    assert!(!bus.has_listeners("x"));
}

#[test]
fn test_exchange_payload_allows_response_changes() {
    let bus = EventBus::new(Container::new());
    bus.register("terminate", 0, |_, payload| {
        let path = payload.request().map(|r| r.path.clone()).unwrap_or_default();
        if let Some(response) = payload.response_mut() {
            response.headers.insert("X-Path".into(), path);
        }
        Ok(())
    });

    let request = HttpRequest::new("GET", "/seen");
    let mut response = HttpResponse::ok();
    bus.dispatch(
        "terminate",
        EventPayload::Exchange {
            request: &request,
            response: &mut response,
        },
    )
    .unwrap();

    assert_eq!(response.headers.get("X-Path").map(String::as_str), Some("/seen"));
}

#[test]
fn test_clones_share_channels() {
    let bus = EventBus::new(Container::new());
    let other = bus.clone();
    other.register("shared", 0, |_, _| Ok(()));
    assert!(bus.has_listeners("shared"));
}
