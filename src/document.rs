//! JSON descriptor documents
//!
//! ```json
//! {
//!   "descriptors": [
//!     { "id": "foo", "type": "Sample1", "properties": { "bar": "foobar" } },
//!     { "id": "bar", "type": "Sample2", "params": [{ "ref": "foo" }] },
//!     { "id": "clock", "type": "Clock", "lazy": false },
//!     { "id": "req", "type": "Request", "lifecycle": "prototype" }
//!   ]
//! }
//! ```
//!
//! Values map onto [`Value`]: scalars become literals, arrays become lists,
//! `{"ref": "id"}` is a reference, `{"map": {...}}` is an explicit map (for
//! maps that would otherwise look like a reference) and any other object is
//! a map. Object key order is preserved.

use crate::{Context, Descriptor, Lifecycle, Result, TypeRegistry, Value, WiringError};
use ahash::RandomState;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::collections::HashSet;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
    descriptors: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Entry {
    id: Option<String>,
    #[serde(rename = "type")]
    target_type: String,
    #[serde(default)]
    lifecycle: Lifecycle,
    #[serde(default = "lazy_by_default")]
    lazy: bool,
    factory_type: Option<String>,
    factory_method: Option<String>,
    init_method: Option<String>,
    #[serde(default)]
    params: Vec<Json>,
    #[serde(default)]
    properties: Map<String, Json>,
}

fn lazy_by_default() -> bool {
    true
}

/// Parse a document into descriptors, in document order.
///
/// Entries without an `id` get the first free `anonymous_N` id, skipping
/// ids the document names explicitly.
pub fn parse(json: &str) -> Result<Vec<Descriptor>> {
    parse_with(json, |_| false)
}

/// `parse`, also treating every id for which `taken` holds as used.
fn parse_with(json: &str, taken: impl Fn(&str) -> bool) -> Result<Vec<Descriptor>> {
    let document: Document =
        serde_json::from_str(json).map_err(|e| WiringError::Parse(e.to_string()))?;

    let explicit: HashSet<String, RandomState> = document
        .descriptors
        .iter()
        .filter_map(|entry| entry.id.clone())
        .collect();
    let mut anonymous = Anonymous {
        next: 0,
        taken: |id: &str| explicit.contains(id) || taken(id),
    };

    document
        .descriptors
        .into_iter()
        .map(|mut entry| {
            let id = match entry.id.take() {
                Some(id) => id,
                None => anonymous.mint(),
            };
            descriptor(id, entry)
        })
        .collect()
}

/// Generator of `anonymous_N` ids that skips taken ones.
struct Anonymous<F> {
    next: usize,
    taken: F,
}

impl<F: Fn(&str) -> bool> Anonymous<F> {
    fn mint(&mut self) -> String {
        loop {
            let id = format!("anonymous_{}", self.next);
            self.next += 1;
            if !(self.taken)(&id) {
                return id;
            }
        }
    }
}

fn descriptor(id: String, entry: Entry) -> Result<Descriptor> {
    let mut descriptor = Descriptor::new(id, entry.target_type)
        .with_lifecycle(entry.lifecycle)
        .with_lazy(entry.lazy);
    if let Some(factory_type) = entry.factory_type {
        descriptor = descriptor.with_factory_type(factory_type);
    }
    if let Some(factory_method) = entry.factory_method {
        descriptor = descriptor.with_factory_method(factory_method);
    }
    if let Some(init_method) = entry.init_method {
        descriptor = descriptor.with_init_method(init_method);
    }
    for param in entry.params {
        descriptor.add_param(value(param)?);
    }
    for (name, property) in entry.properties {
        descriptor.set_property(name, value(property)?);
    }
    Ok(descriptor)
}

fn value(json: Json) -> Result<Value> {
    match json {
        Json::Null => Ok(Value::null()),
        Json::Bool(b) => Ok(Value::from(b)),
        Json::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::from(i)),
            (None, Some(f)) => Ok(Value::from(f)),
            (None, None) => Err(WiringError::Parse(format!("unrepresentable number {}", n))),
        },
        Json::String(s) => Ok(Value::from(s)),
        Json::Array(items) => items
            .into_iter()
            .map(value)
            .collect::<Result<Vec<_>>>()
            .map(Value::List),
        Json::Object(map) => {
            if map.len() == 1 {
                if let Some(target) = map.get("ref") {
                    return match target {
                        Json::String(id) => Ok(Value::reference(id.as_str())),
                        other => Err(WiringError::Parse(format!(
                            "\"ref\" must name a descriptor id, found {}",
                            other
                        ))),
                    };
                }
                if let Some(Json::Object(entries)) = map.get("map") {
                    return object(entries.clone());
                }
            }
            object(map)
        }
    }
}

fn object(map: Map<String, Json>) -> Result<Value> {
    map.into_iter()
        .map(|(key, item)| Ok((key, value(item)?)))
        .collect::<Result<Vec<_>>>()
        .map(Value::Map)
}

impl Context {
    /// Register every descriptor in a JSON document. Returns how many were
    /// read; eager singletons are not built.
    ///
    /// Anonymous entries never reuse an id already registered here. The
    /// whole document is checked before anything is registered, so a failed
    /// load leaves the context unchanged.
    pub fn load_json(&mut self, json: &str) -> Result<usize> {
        let descriptors = parse_with(json, |id| self.has(id))?;
        for descriptor in &descriptors {
            descriptor.validate()?;
        }

        let count = descriptors.len();
        for descriptor in descriptors {
            self.insert(descriptor)?;
        }

        #[cfg(feature = "logging")]
        tracing::debug!(
            target: "object_wiring",
            descriptors = count,
            "Loaded descriptor document"
        );

        Ok(count)
    }

    /// Build a context from a JSON document, then initialize its eager
    /// singletons.
    pub fn from_json<R: TypeRegistry + 'static>(json: &str, registry: R) -> Result<Context> {
        let mut context = Context::new(registry);
        context.load_json(json)?;
        context.init_eager_singletons()?;
        Ok(context)
    }
}
