//! Operation dispatch.
//!
//! Requests arrive as an operation name plus positional string arguments.
//! [`Dispatcher`] resolves the name through an explicit table, checks the
//! argument count, and runs the handler. [`Dispatcher::invoke`] additionally
//! wraps the call in a fresh [`Transaction`]: committed when the handler
//! succeeds, dropped (rolled back) when it fails.

use std::collections::BTreeMap;
use std::fmt;

use evr_store::{LedgerStub, Transaction, WorldState};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::registry::EventRegistry;
use crate::types::Operation;

/// The value an operation hands back to its caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Write paths return nothing.
    Empty,
    /// Existence checks.
    Bool(bool),
    /// Payloads, JSON arrays and range listings.
    Text(String),
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

type Handler = fn(&EventRegistry, &mut dyn LedgerStub, &[String]) -> Result<Response>;

struct Route {
    op: Operation,
    handler: Handler,
}

/// Name → handler table in front of an [`EventRegistry`].
pub struct Dispatcher {
    registry: EventRegistry,
    routes: BTreeMap<&'static str, Route>,
}

impl Dispatcher {
    /// Build the table with a handler for every [`Operation`].
    pub fn new(registry: EventRegistry) -> Self {
        let mut dispatcher = Self {
            registry,
            routes: BTreeMap::new(),
        };
        dispatcher.route(Operation::Init, |reg, _, _| {
            reg.init()?;
            Ok(Response::Empty)
        });
        dispatcher.route(Operation::Register, |reg, stub, args| {
            reg.register(stub, &args[0], &args[1])?;
            Ok(Response::Empty)
        });
        dispatcher.route(Operation::RegisterWithUpdate, |reg, stub, args| {
            reg.register_with_update(stub, &args[0], &args[1], &args[2])?;
            Ok(Response::Empty)
        });
        dispatcher.route(Operation::Exists, |reg, stub, args| {
            reg.exists(stub, &args[0]).map(Response::Bool)
        });
        dispatcher.route(Operation::Query, |reg, stub, args| {
            reg.query(stub, &args[0]).map(Response::Text)
        });
        dispatcher.route(Operation::QueryByKeys, |reg, stub, args| {
            reg.query_by_keys(stub, &args[0]).map(Response::Text)
        });
        dispatcher.route(Operation::QueryByPredicate, |reg, stub, args| {
            reg.query_by_predicate(stub, &args[0]).map(Response::Text)
        });
        dispatcher.route(Operation::QueryByRange, |reg, stub, args| {
            reg.query_by_range(stub, &args[0], &args[1]).map(Response::Text)
        });
        dispatcher
    }

    fn route(&mut self, op: Operation, handler: Handler) {
        self.routes.insert(op.as_str(), Route { op, handler });
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    /// Registered operations, sorted by name.
    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.routes.values().map(|r| r.op)
    }

    /// Resolve `name` and run its handler against an existing transaction.
    pub fn dispatch(
        &self,
        stub: &mut dyn LedgerStub,
        name: &str,
        args: &[String],
    ) -> Result<Response> {
        let route = self.resolve(name)?;
        self.run(route, stub, args)
    }

    /// Run one operation in its own transaction against `world`.
    ///
    /// The transaction commits only if the handler succeeds. A commit that
    /// fails read-set validation is reported as a store error.
    pub fn invoke<W: WorldState + ?Sized>(
        &self,
        world: &W,
        name: &str,
        args: &[String],
    ) -> Result<Response> {
        let route = self.resolve(name)?;
        let op = route.op.as_str();

        let mut tx = Transaction::begin(world);
        let tx_id = tx.id();
        let response = self.run(route, &mut tx, args)?;
        let version = tx
            .commit()
            .map_err(|e| RegistryError::store(op, "commit", format!("tx {tx_id}"), e))?;
        debug!(op, tx = tx_id, version, "invocation committed");
        Ok(response)
    }

    fn resolve(&self, name: &str) -> Result<&Route> {
        self.routes
            .get(name)
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_string()))
    }

    fn run(&self, route: &Route, stub: &mut dyn LedgerStub, args: &[String]) -> Result<Response> {
        let expected = route.op.params().len();
        if args.len() != expected {
            return Err(RegistryError::WrongArity {
                op: route.op.as_str(),
                expected,
                got: args.len(),
            });
        }
        (route.handler)(&self.registry, stub, args)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(EventRegistry::default())
    }
}

#[cfg(test)]
mod tests {
    use evr_store::MemoryWorldState;

    use super::*;
    use crate::testing::seed;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn table_covers_every_operation() {
        let d = Dispatcher::default();
        let mut ops: Vec<_> = d.operations().map(Operation::as_str).collect();
        let mut all: Vec<_> = Operation::ALL.iter().map(|op| op.as_str()).collect();
        ops.sort_unstable();
        all.sort_unstable();
        assert_eq!(ops, all);
    }

    #[test]
    fn invoke_commits_on_success() {
        let world = MemoryWorldState::new();
        let d = Dispatcher::default();
        let r = d.invoke(&world, "Register", &args(&["k", "v"])).unwrap();
        assert_eq!(r, Response::Empty);
        assert_eq!(
            d.invoke(&world, "Query", &args(&["k"])).unwrap(),
            Response::Text("v".into())
        );
        assert_eq!(
            d.invoke(&world, "Exists", &args(&["k"])).unwrap(),
            Response::Bool(true)
        );
    }

    #[test]
    fn invoke_rolls_back_failed_cascade() {
        let world = MemoryWorldState::new();
        seed(&world, &[("k1", "old")]);
        let d = Dispatcher::default();

        let err = d
            .invoke(
                &world,
                "RegisterWithUpdate",
                &args(&["new", "p", r#"{"k1":"v1","k2":"v2"}"#]),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { ref key, .. } if key == "k2"));

        assert_eq!(
            d.invoke(&world, "Exists", &args(&["new"])).unwrap(),
            Response::Bool(false)
        );
        assert_eq!(
            d.invoke(&world, "Query", &args(&["k1"])).unwrap(),
            Response::Text("old".into())
        );
    }

    #[test]
    fn unknown_operation_and_wrong_arity() {
        let world = MemoryWorldState::new();
        let d = Dispatcher::default();
        assert!(matches!(
            d.invoke(&world, "Delete", &args(&["k"])),
            Err(RegistryError::UnknownOperation(_))
        ));
        assert!(matches!(
            d.invoke(&world, "Register", &args(&["k"])),
            Err(RegistryError::WrongArity { op: "Register", expected: 2, got: 1 })
        ));
        assert!(world.is_empty().unwrap());
    }

    #[test]
    fn range_listing_through_dispatch() {
        let world = MemoryWorldState::new();
        seed(&world, &[("b", "2"), ("a", "1"), ("c", "3")]);
        let d = Dispatcher::default();
        let r = d.invoke(&world, "QueryByRange", &args(&["a", ""])).unwrap();
        assert_eq!(r.to_string(), "'a' = 1\n'b' = 2\n'c' = 3\n");
    }

    #[test]
    fn init_takes_no_arguments() {
        let world = MemoryWorldState::new();
        let d = Dispatcher::default();
        assert_eq!(d.invoke(&world, "Init", &[]).unwrap(), Response::Empty);
    }

    #[test]
    fn response_display() {
        assert_eq!(Response::Empty.to_string(), "");
        assert_eq!(Response::Bool(false).to_string(), "false");
        assert_eq!(Response::Text("x".into()).to_string(), "x");
    }
}
