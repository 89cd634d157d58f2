//! Behavior tests for the `errors` directive: page serving, degraded
//! responses, and panic recovery, driven through the public compile →
//! assemble → handle path.

use std::net::SocketAddr;
use std::sync::Arc;

use http::Method;
use tempfile::tempdir;

use stanza::config::{compile, DirectiveRegistry};
use stanza::http::{Request, ResponseWriter};
use stanza::middleware::{assemble, Handler, HandlerError, HandlerResult};

/// Downstream that reports a fixed status without writing anything.
struct Fixed(u16);

impl Handler for Fixed {
    fn handle(&self, _req: &Request, _res: &mut ResponseWriter) -> HandlerResult {
        Ok(self.0)
    }
}

/// Downstream that writes its own response before reporting.
struct Writes(u16, &'static str);

impl Handler for Writes {
    fn handle(&self, _req: &Request, res: &mut ResponseWriter) -> HandlerResult {
        res.set_status(self.0);
        res.write(self.1.as_bytes());
        Ok(self.0)
    }
}

/// Downstream that dies mid-request.
struct Panics;

impl Handler for Panics {
    fn handle(&self, _req: &Request, _res: &mut ResponseWriter) -> HandlerResult {
        panic!("downstream exploded");
    }
}

/// Downstream that reports a handler error instead of a status.
struct Fails;

impl Handler for Fails {
    fn handle(&self, _req: &Request, _res: &mut ResponseWriter) -> HandlerResult {
        Err(HandlerError::Message("backend unreachable".to_string()))
    }
}

fn chain_for(source: &str, downstream: Arc<dyn Handler>) -> Arc<dyn Handler> {
    let registry = DirectiveRegistry::standard();
    let stack = compile(source, &registry).expect("config should compile");
    assemble(stack, downstream)
}

fn request(path: &str) -> Request {
    let addr: SocketAddr = "10.0.0.9:4711".parse().unwrap();
    Request::new(Method::GET, path.parse().unwrap(), addr)
}

#[test]
fn test_mapped_status_serves_page_contents() {
    let dir = tempdir().unwrap();
    let page = dir.path().join("404.html");
    std::fs::write(&page, "<h1>not here</h1>").unwrap();
    let log = dir.path().join("errors.log");

    let source = format!(
        "errors {{\n    log {}\n    404 {}\n}}\n",
        log.display(),
        page.display()
    );
    let chain = chain_for(&source, Arc::new(Fixed(404)));

    let mut res = ResponseWriter::new();
    let status = chain.handle(&request("/missing"), &mut res).unwrap();

    assert_eq!(status, 404);
    assert_eq!(res.status(), Some(404));
    assert_eq!(res.body(), b"<h1>not here</h1>");
    assert_eq!(
        res.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "text/html; charset=utf-8"
    );
}

#[test]
fn test_unreadable_page_degrades_to_bare_status() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("errors.log");
    let gone = dir.path().join("gone.html");

    let source = format!(
        "errors {{\n    log {}\n    404 {}\n}}\n",
        log.display(),
        gone.display()
    );
    let chain = chain_for(&source, Arc::new(Fixed(404)));

    let mut res = ResponseWriter::new();
    let status = chain.handle(&request("/missing"), &mut res).unwrap();

    assert_eq!(status, 404);
    assert_eq!(res.status(), Some(404));
    assert!(res.body().is_empty());
}

#[test]
fn test_unmapped_status_passes_response_through() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("errors.log");

    let source = format!("errors {}\n", log.display());
    let chain = chain_for(&source, Arc::new(Writes(418, "short and stout")));

    let mut res = ResponseWriter::new();
    let status = chain.handle(&request("/teapot"), &mut res).unwrap();

    assert_eq!(status, 418);
    assert_eq!(res.status(), Some(418));
    assert_eq!(res.body(), b"short and stout");
}

#[test]
fn test_panic_recovered_to_mapped_500_page() {
    let dir = tempdir().unwrap();
    let page = dir.path().join("500.html");
    std::fs::write(&page, "it broke").unwrap();
    let log = dir.path().join("errors.log");

    let source = format!(
        "errors {{\n    log {}\n    500 {}\n}}\n",
        log.display(),
        page.display()
    );
    let chain = chain_for(&source, Arc::new(Panics));

    let mut res = ResponseWriter::new();
    let status = chain.handle(&request("/fail"), &mut res).unwrap();

    assert_eq!(status, 500);
    assert_eq!(res.status(), Some(500));
    assert_eq!(res.body(), b"it broke");

    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(logged.contains("[PANIC /fail] downstream exploded"), "log was: {logged}");
    assert!(logged.contains("10.0.0.9:4711 GET /fail 500"), "log was: {logged}");

    // The chain keeps serving after recovery.
    let mut res = ResponseWriter::new();
    assert_eq!(chain.handle(&request("/fail"), &mut res).unwrap(), 500);
}

#[test]
fn test_handler_error_recovered_to_500_and_logged() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("errors.log");

    let source = format!("errors {}\n", log.display());
    let chain = chain_for(&source, Arc::new(Fails));

    let mut res = ResponseWriter::new();
    let status = chain.handle(&request("/backend"), &mut res).unwrap();

    assert_eq!(status, 500);
    assert_eq!(res.status(), Some(500));

    let logged = std::fs::read_to_string(&log).unwrap();
    assert!(logged.contains("[ERROR 500 /backend] backend unreachable"), "log was: {logged}");
    assert!(logged.contains("10.0.0.9:4711 GET /backend 500"), "log was: {logged}");
}

#[test]
fn test_panic_without_mapping_yields_bare_500() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("errors.log");

    let source = format!("errors {}\n", log.display());
    let chain = chain_for(&source, Arc::new(Panics));

    let mut res = ResponseWriter::new();
    let status = chain.handle(&request("/fail"), &mut res).unwrap();

    assert_eq!(status, 500);
    assert_eq!(res.status(), Some(500));
    assert!(res.body().is_empty());
}

#[test]
fn test_every_request_through_the_middleware_is_logged() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("errors.log");

    let source = format!("errors {}\n", log.display());
    let chain = chain_for(&source, Arc::new(Fixed(200)));

    for path in ["/one", "/two"] {
        let mut res = ResponseWriter::new();
        chain.handle(&request(path), &mut res).unwrap();
    }

    let logged = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = logged.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("10.0.0.9:4711 GET /one 200"));
    assert!(lines[1].contains("10.0.0.9:4711 GET /two 200"));
}
