//! Chain assembly.
//!
//! The compiled directive stack folds into a singly linked, acyclic
//! handler chain. Folding starts from the terminal handler and walks
//! the stack backwards, so the first directive in compiled order ends
//! up outermost: it executes first on every request and can
//! short-circuit everything declared after it.

use std::sync::Arc;

use crate::config::compiler::CompiledDirective;
use crate::http::{Request, ResponseWriter};
use crate::middleware::{Handler, HandlerResult};

/// Fold the compiled stack around `terminal`, producing the chain for
/// one configuration generation. Assembly has no side effects; all
/// effects happen at request time.
pub fn assemble(stack: Vec<CompiledDirective>, terminal: Arc<dyn Handler>) -> Arc<dyn Handler> {
    let mut next = terminal;
    for directive in stack.into_iter().rev() {
        next = (directive.middleware)(next);
    }
    next
}

/// Terminal handler: nothing matched, report 404 with no body.
pub struct NotFound;

impl Handler for NotFound {
    fn handle(&self, _req: &Request, _res: &mut ResponseWriter) -> HandlerResult {
        Ok(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use http::Method;

    use crate::middleware::Middleware;

    fn request() -> Request {
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        Request::new(Method::GET, "/".parse().unwrap(), addr)
    }

    struct Recording {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
        next: Arc<dyn Handler>,
    }

    impl Handler for Recording {
        fn handle(&self, req: &Request, res: &mut ResponseWriter) -> HandlerResult {
            self.calls.lock().unwrap().push(format!("{}:enter", self.name));
            if self.short_circuit {
                return Ok(403);
            }
            let status = self.next.handle(req, res)?;
            self.calls.lock().unwrap().push(format!("{}:exit", self.name));
            Ok(status)
        }
    }

    fn recording_middleware(
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
    ) -> Middleware {
        Box::new(move |next| {
            Arc::new(Recording {
                name,
                calls: calls.clone(),
                short_circuit,
                next,
            })
        })
    }

    #[test]
    fn test_first_compiled_directive_executes_first() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stack = vec![
            CompiledDirective {
                name: "alpha",
                middleware: recording_middleware("alpha", calls.clone(), false),
            },
            CompiledDirective {
                name: "beta",
                middleware: recording_middleware("beta", calls.clone(), false),
            },
        ];
        let chain = assemble(stack, Arc::new(NotFound));

        let mut res = ResponseWriter::new();
        let status = chain.handle(&request(), &mut res).unwrap();

        assert_eq!(status, 404);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["alpha:enter", "beta:enter", "beta:exit", "alpha:exit"]
        );
    }

    #[test]
    fn test_outer_handler_can_short_circuit() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let stack = vec![
            CompiledDirective {
                name: "guard",
                middleware: recording_middleware("guard", calls.clone(), true),
            },
            CompiledDirective {
                name: "inner",
                middleware: recording_middleware("inner", calls.clone(), false),
            },
        ];
        let chain = assemble(stack, Arc::new(NotFound));

        let mut res = ResponseWriter::new();
        let status = chain.handle(&request(), &mut res).unwrap();

        assert_eq!(status, 403);
        assert_eq!(*calls.lock().unwrap(), vec!["guard:enter"]);
    }

    #[test]
    fn test_empty_stack_is_just_the_terminal() {
        let chain = assemble(Vec::new(), Arc::new(NotFound));
        let mut res = ResponseWriter::new();
        assert_eq!(chain.handle(&request(), &mut res).unwrap(), 404);
    }
}
