//! # object-wiring - Declarative Object Wiring for Rust
//!
//! Build object graphs from declarative [`Descriptor`]s, or compile the same
//! graph into the ordered construction statements that would build it.
//!
//! ## Features
//!
//! - 🧩 **Descriptors** - id, type, constructor or static factory, parameters,
//!   properties and lifecycle in one recipe
//! - 🔗 **References** - descriptors refer to each other by id, inside
//!   arbitrarily nested lists and maps
//! - ♻️ **Lifecycles** - shared singletons (lazy or eager) and fresh prototypes
//! - 🛡️ **Cycle detection** - re-entrant lookups fail with a clear error
//! - 📝 **Compiler** - emit `let foo = Sample1();` style statements instead of
//!   building objects
//! - 📄 **JSON documents** - load descriptors from JSON (feature `json`)
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use object_wiring::{Arity, BindingTable, Context, Descriptor, FromResolved, Object, TypeBinding, Value};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let registry = BindingTable::new()
//!     .with(
//!         TypeBinding::of::<Database>("Database")
//!             .constructor(Arity::none(), |_| Ok(Object::new(Database::default())))
//!             .property("url", |db: &mut Database, value| {
//!                 db.url = String::from_resolved(value)?;
//!                 Ok(())
//!             }),
//!     )
//!     .with(
//!         TypeBinding::of::<UserService>("UserService")
//!             .constructor(Arity::exactly(1), |args| Ok(Object::new(UserService { db: args.get(0)? }))),
//!     );
//!
//! let mut ctx = Context::new(registry);
//! ctx.insert(Descriptor::new("db", "Database").with_property("url", "postgres://localhost")).unwrap();
//! ctx.insert(Descriptor::new("users", "UserService").with_param(Value::reference("db"))).unwrap();
//!
//! let users = ctx.get("users").unwrap().unwrap();
//! let users = users.downcast_ref::<UserService>().unwrap();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! ## Lifecycles
//!
//! ```rust
//! use object_wiring::{Arity, BindingTable, Context, Descriptor, Object, TypeBinding};
//!
//! struct Request;
//!
//! let registry = BindingTable::new()
//!     .with(TypeBinding::of::<Request>("Request").constructor(Arity::none(), |_| Ok(Object::new(Request))));
//!
//! let mut ctx = Context::new(registry);
//! // Singleton (default) - one instance, shared everywhere
//! ctx.insert(Descriptor::new("shared", "Request")).unwrap();
//! // Prototype - new instance every lookup
//! ctx.insert(Descriptor::new("fresh", "Request").prototype()).unwrap();
//! // Eager singleton - built by init_eager_singletons()
//! ctx.insert(Descriptor::new("early", "Request").eager()).unwrap();
//!
//! assert_eq!(ctx.init_eager_singletons().unwrap(), 1);
//! assert!(ctx.is_cached("early"));
//!
//! let a = ctx.get("fresh").unwrap().unwrap();
//! let b = ctx.get("fresh").unwrap().unwrap();
//! assert!(!a.ptr_eq(&b));
//! ```

mod compiler;
mod context;
mod descriptor;
#[cfg(feature = "json")]
pub mod document;
mod error;
mod factory;
mod instance;
#[cfg(feature = "logging")]
pub mod logging;
mod registry;
mod storage;
mod value;

#[cfg(test)]
mod test_support;

pub use compiler::*;
pub use context::{Context, Iter, DEFAULT_MAX_DEPTH};
pub use descriptor::*;
pub use error::*;
pub use factory::*;
pub use instance::*;
pub use registry::*;
pub use value::*;

#[cfg(feature = "derive")]
pub use object_wiring_derive::Wire;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, Arity, BindingTable, Context, Descriptor, FromResolved, GraphCompiler, Instance,
        Lifecycle, Object, Resolved, Result, TypeBinding, TypeRegistry, Value, Wire, WiringError,
    };
}
