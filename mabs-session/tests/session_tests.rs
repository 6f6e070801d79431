use mabs_core::{Application, Container, Events, HttpRequest, HttpResponse};
use mabs_session::{
    COOKIE_NAME_SERVICE, MemorySessionStore, RequestSessionExt, STORE_SERVICE, SessionAdapter,
    SessionConfig, SessionStore,
};
use std::sync::Arc;

fn app_with(adapter: SessionAdapter) -> Application {
    let app = Application::builder().adapter(adapter).build().unwrap();
    app.get("/login/{user}", |req: &HttpRequest| {
        if let Some(session) = req.session() {
            session.set("user", req.param("user")).ok();
        }
        "logged in"
    })
    .unwrap();
    app.get("/whoami", |req: &HttpRequest| {
        req.session()
            .and_then(|session| session.get::<String>("user"))
            .unwrap_or_else(|| "anonymous".to_string())
    })
    .unwrap();
    app.get("/logout", |req: &HttpRequest| {
        if let Some(session) = req.session() {
            session.destroy();
        }
        "bye"
    })
    .unwrap();
    app
}

fn cookie_header(response: &HttpResponse, name: &str) -> String {
    let cookie = response.cookie(name).expect("session cookie set");
    format!("{}={}", cookie.name, cookie.value)
}

#[test]
fn test_load_registers_services() {
    let container = Container::new();
    let adapter = SessionAdapter::new();
    mabs_core::ServiceAdapter::load(&adapter, &container).unwrap();

    assert_eq!(
        *container.get_as::<String>(COOKIE_NAME_SERVICE).unwrap(),
        "MABS_SESSION"
    );
    assert!(container.has(STORE_SERVICE));
    assert!(!container.is_resolved(STORE_SERVICE));
}

#[test]
fn test_listeners_registered_at_priority_128() {
    let app = app_with(SessionAdapter::new());
    let request_listeners = app
        .events()
        .listeners_by_event(Events::HANDLE_REQUEST)
        .unwrap();
    let terminate_listeners = app.events().listeners_by_event(Events::ON_TERMINATE).unwrap();

    assert_eq!(request_listeners[0].priority, 128);
    assert_eq!(terminate_listeners[0].priority, 128);
}

#[test]
fn test_cookie_round_trip() {
    let app = app_with(SessionAdapter::new());

    let first = app
        .respond(HttpRequest::new("GET", "/login/ada"))
        .unwrap();
    assert_eq!(first.body_str(), "logged in");
    let cookie = cookie_header(&first, "MABS_SESSION");

    let second = app
        .respond(HttpRequest::new("GET", "/whoami").with_header("Cookie", cookie))
        .unwrap();
    assert_eq!(second.body_str(), "ada");
    // Nothing changed, nothing to resend.
    assert!(second.cookie("MABS_SESSION").is_none());
}

#[test]
fn test_untouched_session_is_not_stored() {
    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(SessionAdapter::new().with_store(store.clone()));

    let response = app.respond(HttpRequest::new("GET", "/whoami")).unwrap();
    assert_eq!(response.body_str(), "anonymous");
    assert!(response.cookie("MABS_SESSION").is_none());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_unknown_cookie_starts_fresh_session() {
    let app = app_with(SessionAdapter::new());
    let response = app
        .respond(HttpRequest::new("GET", "/whoami").with_header("Cookie", "MABS_SESSION=forged"))
        .unwrap();
    assert_eq!(response.body_str(), "anonymous");
}

#[test]
fn test_logout_destroys_session() {
    let store = Arc::new(MemorySessionStore::new());
    let app = app_with(SessionAdapter::new().with_store(store.clone()));

    let login = app.respond(HttpRequest::new("GET", "/login/ada")).unwrap();
    let cookie = cookie_header(&login, "MABS_SESSION");
    assert_eq!(store.count().unwrap(), 1);

    let logout = app
        .respond(HttpRequest::new("GET", "/logout").with_header("Cookie", cookie.clone()))
        .unwrap();
    let expired = logout.cookie("MABS_SESSION").unwrap();
    assert_eq!(expired.max_age, Some(0));
    assert_eq!(store.count().unwrap(), 0);

    let after = app
        .respond(HttpRequest::new("GET", "/whoami").with_header("Cookie", cookie))
        .unwrap();
    assert_eq!(after.body_str(), "anonymous");
}

#[test]
fn test_custom_cookie_name() {
    let app = app_with(SessionAdapter::with_config(
        SessionConfig::new().with_cookie_name("sid").with_secure(true),
    ));

    let response = app.respond(HttpRequest::new("GET", "/login/bob")).unwrap();
    let cookie = response.cookie("sid").unwrap();
    assert!(cookie.secure);
    assert_eq!(cookie.max_age, Some(3600));
}

#[test]
fn test_user_listener_sees_session() {
    let app = app_with(SessionAdapter::new());
    app.on(Events::HANDLE_REQUEST, 0, |_, payload| {
        let has_session = payload
            .request()
            .is_some_and(|request| request.session().is_some());
        assert!(has_session);
        Ok(())
    });

    app.respond(HttpRequest::new("GET", "/whoami")).unwrap();
}
