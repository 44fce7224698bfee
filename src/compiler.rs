//! Descriptor graph compiler
//!
//! Walks a [`Context`] the same way lookups do, but instead of building
//! objects it emits the ordered statements that would build them:
//!
//! ```text
//! let foo = Sample1();
//! foo.bar = "foobar";
//! let bar = Sample2(foo);
//! ```
//!
//! Singletons are named by their id and emitted once, before their first
//! use. Prototypes are expanded inline at every use under a fresh
//! `id_N` name.

use crate::context::Resolution;
use crate::value::{walk, Literal, ValueSink};
use crate::{Context, Descriptor, Result, WiringError};
use ahash::RandomState;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

// =============================================================================
// Output model
// =============================================================================

/// A compiled value.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Name bound by an earlier `Create` statement
    Local(String),
    List(Vec<Expr>),
    Map(Vec<(String, Expr)>),
}

/// One construction step.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Bind `name` to a new object built by a constructor or static factory
    Create {
        name: String,
        type_name: String,
        factory_method: Option<String>,
        args: Vec<Expr>,
    },
    /// Assign a property on a bound object
    Assign {
        name: String,
        property: String,
        value: Expr,
    },
    /// Call a post-construction hook on a bound object
    Invoke { name: String, method: String },
}

impl Statement {
    /// Name of the local the statement creates or operates on.
    pub fn name(&self) -> &str {
        match self {
            Statement::Create { name, .. }
            | Statement::Assign { name, .. }
            | Statement::Invoke { name, .. } => name,
        }
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut item: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    for (i, value) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item(f, value)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Null => f.write_str("null"),
            Expr::Bool(b) => write!(f, "{}", b),
            Expr::Int(n) => write!(f, "{}", n),
            Expr::Float(n) => write!(f, "{:?}", n),
            Expr::Str(s) => write!(f, "{:?}", s),
            Expr::Local(name) => f.write_str(name),
            Expr::List(items) => {
                f.write_str("[")?;
                write_list(f, items, |f, item| write!(f, "{}", item))?;
                f.write_str("]")
            }
            Expr::Map(entries) => {
                f.write_str("{")?;
                write_list(f, entries, |f, (key, value)| write!(f, "{:?}: {}", key, value))?;
                f.write_str("}")
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Create {
                name,
                type_name,
                factory_method,
                args,
            } => {
                write!(f, "let {} = {}", name, type_name)?;
                if let Some(method) = factory_method {
                    write!(f, "::{}", method)?;
                }
                f.write_str("(")?;
                write_list(f, args, |f, arg| write!(f, "{}", arg))?;
                f.write_str(");")
            }
            Statement::Assign {
                name,
                property,
                value,
            } => write!(f, "{}.{} = {};", name, property, value),
            Statement::Invoke { name, method } => write!(f, "{}.{}();", name, method),
        }
    }
}

// =============================================================================
// Compiler
// =============================================================================

/// Translates a context's descriptor graph into construction statements.
///
/// # Examples
///
/// ```rust
/// use object_wiring::{Context, Descriptor, GraphCompiler, Value};
///
/// let mut ctx = Context::default();
/// ctx.insert(Descriptor::new("foo", "Sample1").with_property("bar", "foobar")).unwrap();
/// ctx.insert(Descriptor::new("bar", "Sample2").with_param(Value::reference("foo"))).unwrap();
///
/// let code = GraphCompiler::new(&ctx).compile_to_string().unwrap();
/// assert_eq!(code, "let foo = Sample1();\nfoo.bar = \"foobar\";\nlet bar = Sample2(foo);\n");
/// ```
pub struct GraphCompiler<'a> {
    context: &'a Context,
}

impl<'a> GraphCompiler<'a> {
    #[inline]
    pub fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// Compile every descriptor in registration order.
    ///
    /// Each call is an independent pass, so repeated calls produce the same
    /// statements.
    pub fn statements(&self) -> Result<Vec<Statement>> {
        #[cfg(feature = "logging")]
        debug!(
            target: "object_wiring",
            descriptors = self.context.len(),
            "Compiling descriptor graph"
        );

        let mut pass = Pass::new(self.context);
        for (id, descriptor) in self.context.iter() {
            if descriptor.is_singleton() && pass.emitted.contains(id) {
                continue;
            }
            pass.descriptor(descriptor)?;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "object_wiring",
            statements = pass.out.len(),
            "Compiled descriptor graph"
        );

        Ok(pass.out)
    }

    /// Write one statement per line.
    pub fn compile<W: io::Write + ?Sized>(&self, out: &mut W) -> Result<()> {
        for statement in self.statements()? {
            writeln!(out, "{}", statement)?;
        }
        Ok(())
    }

    pub fn compile_to_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.compile(&mut out)?;
        String::from_utf8(out).map_err(|e| WiringError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

/// State of a single compilation pass.
struct Pass<'a> {
    context: &'a Context,
    resolution: Resolution,
    /// Singletons whose statements are already in `out`
    emitted: HashSet<String, RandomState>,
    /// Next suffix per prototype id
    counters: HashMap<String, usize, RandomState>,
    out: Vec<Statement>,
}

impl<'a> Pass<'a> {
    fn new(context: &'a Context) -> Self {
        Self {
            context,
            resolution: context.resolution(),
            emitted: HashSet::default(),
            counters: HashMap::default(),
            out: Vec::new(),
        }
    }

    /// Next free `id_N` name. Suffixes that spell a registered id are
    /// skipped so a prototype never shadows a singleton's binding.
    fn mint(&mut self, id: &str) -> String {
        let counter = self.counters.entry(id.to_owned()).or_insert(0);
        loop {
            let name = format!("{}_{}", id, counter);
            *counter += 1;
            if !self.context.has(&name) {
                return name;
            }
        }
    }

    /// Emit the statements for one descriptor and return the local name
    /// bound to it.
    fn descriptor(&mut self, descriptor: &'a Descriptor) -> Result<String> {
        let id = descriptor.id();
        self.resolution.enter(id)?;

        let name = if descriptor.is_singleton() {
            id.to_owned()
        } else {
            self.mint(id)
        };

        let args = descriptor
            .params()
            .iter()
            .map(|param| walk(param, &mut *self))
            .collect::<Result<Vec<_>>>()?;
        self.out.push(Statement::Create {
            name: name.clone(),
            type_name: descriptor.construction_type().to_owned(),
            factory_method: descriptor.factory_method().map(str::to_owned),
            args,
        });

        for (property, value) in descriptor.properties() {
            let value = walk(value, &mut *self)?;
            self.out.push(Statement::Assign {
                name: name.clone(),
                property: property.clone(),
                value,
            });
        }

        if let Some(method) = descriptor.init_method() {
            self.out.push(Statement::Invoke {
                name: name.clone(),
                method: method.to_owned(),
            });
        }

        if descriptor.is_singleton() {
            self.emitted.insert(name.clone());
        }
        self.resolution.leave();
        Ok(name)
    }
}

impl ValueSink for Pass<'_> {
    type Output = Expr;

    fn literal(&mut self, literal: &Literal) -> Result<Expr> {
        match literal {
            Literal::Null => Ok(Expr::Null),
            Literal::Bool(b) => Ok(Expr::Bool(*b)),
            Literal::Int(n) => Ok(Expr::Int(*n)),
            Literal::Float(n) if n.is_finite() => Ok(Expr::Float(*n)),
            Literal::Float(_) => Err(WiringError::unsupported("non-finite float")),
            Literal::Str(s) => Ok(Expr::Str(s.clone())),
            Literal::Object(instance) => Err(WiringError::unsupported(instance.type_name())),
        }
    }

    fn reference(&mut self, id: &str) -> Result<Expr> {
        let context = self.context;
        let Some(descriptor) = context.descriptor(id) else {
            #[cfg(feature = "logging")]
            trace!(
                target: "object_wiring",
                reference = id,
                "Reference to unknown descriptor compiled to null"
            );
            return Ok(Expr::Null);
        };

        if descriptor.is_singleton() && self.emitted.contains(id) {
            return Ok(Expr::Local(id.to_owned()));
        }
        if self.resolution.contains(id) {
            return Err(self.resolution.cycle(id));
        }
        self.descriptor(descriptor).map(Expr::Local)
    }

    #[inline]
    fn list(&mut self, items: Vec<Expr>) -> Result<Expr> {
        Ok(Expr::List(items))
    }

    #[inline]
    fn map(&mut self, entries: Vec<(String, Expr)>) -> Result<Expr> {
        Ok(Expr::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample1_context, sample2_context};
    use crate::{Descriptor, Value};

    const SAMPLE1: &str = r#"let foo = Sample1();
foo.bar = "foobar";
let bar = Sample2(foo);
let baz = Sample1();
baz.bar = {"foo": "lorem", "bar": "ipsum"};
let nested = Sample1();
nested.bar = ["foobar", foo, ["lorem", "ipsum"], {"lorem": "ipsum", "foo": foo}];
let lorem = Sample3::factory();
let ipsum = Sample4::factory();
ipsum.bar = "foobar";
"#;

    #[test]
    fn test_compile_sample1() {
        let ctx = sample1_context();
        assert_eq!(GraphCompiler::new(&ctx).compile_to_string().unwrap(), SAMPLE1);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let ctx = sample2_context();
        let compiler = GraphCompiler::new(&ctx);
        assert_eq!(
            compiler.compile_to_string().unwrap(),
            compiler.compile_to_string().unwrap()
        );
    }

    #[test]
    fn test_prototype_naming() {
        let ctx = sample2_context();
        let statements = GraphCompiler::new(&ctx).statements().unwrap();
        let rendered: Vec<String> = statements.iter().map(ToString::to_string).collect();

        assert_eq!(
            rendered,
            vec![
                "let foo_0 = Sample1();",
                "foo_0.bar = \"foobar\";",
                "let foo_1 = Sample1();",
                "foo_1.bar = \"foobar\";",
                "let bar = Sample2(foo_1);",
                "let foo_2 = Sample1();",
                "foo_2.bar = \"foobar\";",
                "let foo_3 = Sample1();",
                "foo_3.bar = \"foobar\";",
                "let baz = Sample2([foo_2, \"bar\", foo_3]);",
            ]
        );
    }

    #[test]
    fn test_prototype_names_skip_registered_ids() {
        let mut ctx = Context::default();
        ctx.insert(Descriptor::new("foo", "Sample1").prototype()).unwrap();
        ctx.insert(Descriptor::new("foo_0", "Sample3").with_factory_method("factory"))
            .unwrap();
        ctx.insert(
            Descriptor::new("bar", "Sample1")
                .with_property("bar", Value::list([Value::reference("foo"), Value::reference("foo_0")])),
        )
        .unwrap();

        let code = GraphCompiler::new(&ctx).compile_to_string().unwrap();
        assert_eq!(
            code,
            concat!(
                "let foo_1 = Sample1();\n",
                "let foo_0 = Sample3::factory();\n",
                "let bar = Sample1();\n",
                "let foo_2 = Sample1();\n",
                "bar.bar = [foo_2, foo_0];\n",
            )
        );
    }

    #[test]
    fn test_singleton_dependency_emitted_first() {
        let mut ctx = Context::default();
        ctx.insert(Descriptor::new("bar", "Sample2").with_param(Value::reference("foo")))
            .unwrap();
        ctx.insert(
            Descriptor::new("foo", "Sample1")
                .with_property("bar", "x")
                .with_init_method("init"),
        )
        .unwrap();

        let code = GraphCompiler::new(&ctx).compile_to_string().unwrap();
        assert_eq!(
            code,
            "let foo = Sample1();\nfoo.bar = \"x\";\nfoo.init();\nlet bar = Sample2(foo);\n"
        );
    }

    #[test]
    fn test_scalars_and_missing_reference() {
        let mut ctx = Context::default();
        ctx.insert(
            Descriptor::new("foo", "Sample1")
                .with_param(Value::null())
                .with_param(true)
                .with_param(-3)
                .with_param(1.0)
                .with_param("quote \" and \\ backslash")
                .with_param(Value::reference("missing")),
        )
        .unwrap();

        let code = GraphCompiler::new(&ctx).compile_to_string().unwrap();
        assert_eq!(
            code,
            "let foo = Sample1(null, true, -3, 1.0, \"quote \\\" and \\\\ backslash\", null);\n"
        );
    }

    #[test]
    fn test_unsupported_literals() {
        let mut ctx = Context::default();
        ctx.insert(Descriptor::new("foo", "Sample1").with_param(Value::object(5u8)))
            .unwrap();
        assert!(matches!(
            GraphCompiler::new(&ctx).statements().unwrap_err(),
            WiringError::UnsupportedValueType { .. }
        ));

        let mut ctx = Context::default();
        ctx.insert(Descriptor::new("foo", "Sample1").with_param(f64::NAN))
            .unwrap();
        assert!(GraphCompiler::new(&ctx).statements().is_err());
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut ctx = Context::default();
        ctx.insert(Descriptor::new("foo", "Sample1").with_property("bar", Value::reference("foo")))
            .unwrap();
        assert!(matches!(
            GraphCompiler::new(&ctx).statements().unwrap_err(),
            WiringError::CircularDependency { .. }
        ));
    }
}
