//! Verb registry: name + runtime type -> implementation.
//!
//! A verb is declared once with a generic fallback body, then specialised
//! per concrete type. At call time the registry looks at the type of the
//! primary input and picks, in order:
//!
//! 1. the implementation registered for exactly that type,
//! 2. the implementation of the nearest declared ancestor
//!    (see [`VerbRegistry::declare_subtype`]),
//! 3. the generic fallback.
//!
//! Registrations are expected to happen during setup. Lookups take short
//! read locks and never hold them across a call into a verb body.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, trace};

use crate::args::Args;
use crate::error::{PipeError, PipeResult};
use crate::pipe::Pipe;
use crate::value::{Data, TypeTag};

/// A type-erased, type-specific verb body. Receives the input viewed as the
/// registered type.
pub type Implementation = Arc<dyn Fn(&dyn Any, &Args) -> PipeResult<Data> + Send + Sync>;

/// The generic body of a verb. Receives the input as-is.
pub type Fallback = Arc<dyn Fn(&Data, &Args) -> PipeResult<Data> + Send + Sync>;

type Upcast = fn(&dyn Any) -> Option<&dyn Any>;

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn upcast<C: AsRef<P> + Any, P: Any>(value: &dyn Any) -> Option<&dyn Any> {
    value
        .downcast_ref::<C>()
        .map(|child| AsRef::<P>::as_ref(child) as &dyn Any)
}

fn unsupported(verb: &str) -> Fallback {
    let verb = verb.to_string();
    Arc::new(move |input: &Data, _: &Args| {
        Err(PipeError::unsupported(&verb, input.type_name()))
    })
}

struct Generic {
    doc: Option<String>,
    body: Fallback,
}

struct Registered {
    tag: TypeTag,
    call: Implementation,
}

struct Ancestry {
    parent: TypeTag,
    upcast: Upcast,
}

/// Dispatch table of one verb.
struct VerbTable {
    name: String,
    generic: RwLock<Generic>,
    implementations: RwLock<HashMap<TypeId, Registered>>,
}

#[derive(Default)]
struct RegistryInner {
    verbs: RwLock<HashMap<String, Arc<VerbTable>>>,
    sources: RwLock<HashMap<TypeId, TypeTag>>,
    parents: RwLock<HashMap<TypeId, Ancestry>>,
}

impl RegistryInner {
    /// `tag` followed by its declared ancestors, nearest first.
    fn ancestors(&self, tag: &TypeTag) -> Vec<TypeTag> {
        let parents = read(&self.parents);
        let mut chain = vec![tag.clone()];
        let mut seen = HashSet::from([tag.id()]);
        let mut current = tag.id();
        while let Some(ancestry) = parents.get(&current) {
            if !seen.insert(ancestry.parent.id()) {
                break;
            }
            chain.push(ancestry.parent.clone());
            current = ancestry.parent.id();
        }
        chain
    }

    fn is_pipesource(&self, tag: &TypeTag) -> bool {
        let sources = read(&self.sources);
        self.ancestors(tag)
            .iter()
            .any(|t| sources.contains_key(&t.id()))
    }
}

/// A set of verbs and the types they can be piped from.
///
/// Cloning yields another handle onto the same registry. Independent
/// registries are created with [`VerbRegistry::new`].
#[derive(Clone, Default)]
pub struct VerbRegistry {
    inner: Arc<RegistryInner>,
}

impl VerbRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a verb with a generic body.
    ///
    /// The generic body runs for any input type without a more specific
    /// implementation. Redeclaring an existing verb swaps its generic body
    /// and documentation but keeps every registered implementation.
    pub fn declare<F>(&self, name: &str, doc: Option<&str>, generic: F) -> Verb
    where
        F: Fn(&Data, &Args) -> PipeResult<Data> + Send + Sync + 'static,
    {
        self.declare_fallback(name, doc, Arc::new(generic))
    }

    /// Declare a verb whose generic body fails with
    /// [`PipeError::UnsupportedInputType`].
    pub fn declare_unsupported(&self, name: &str, doc: Option<&str>) -> Verb {
        self.declare_fallback(name, doc, unsupported(name))
    }

    fn declare_fallback(&self, name: &str, doc: Option<&str>, body: Fallback) -> Verb {
        let generic = Generic {
            doc: doc.map(str::to_string),
            body,
        };

        let mut verbs = write(&self.inner.verbs);
        let table = match verbs.get(name).cloned() {
            Some(table) => {
                debug!("Redeclared verb '{}'", name);
                *write(&table.generic) = generic;
                table
            }
            None => {
                debug!("Declared verb '{}'", name);
                let table = Arc::new(VerbTable {
                    name: name.to_string(),
                    generic: RwLock::new(generic),
                    implementations: RwLock::new(HashMap::new()),
                });
                verbs.insert(name.to_string(), table.clone());
                table
            }
        };

        self.handle(table)
    }

    /// Register the implementation of `name` for inputs of type `T`.
    ///
    /// An undeclared verb is declared on the fly with the unsupported
    /// fallback. A second registration for the same type replaces the first.
    pub fn register<T, R, F>(&self, name: &str, implementation: F) -> Verb
    where
        T: Any,
        R: Any + Send + Sync,
        F: Fn(&T, &Args) -> PipeResult<R> + Send + Sync + 'static,
    {
        let verb = match self.verb(name) {
            Some(verb) => verb,
            None => self.declare_unsupported(name, None),
        };
        verb.register::<T, R, F>(implementation);
        verb
    }

    /// Look up a verb by name.
    pub fn verb(&self, name: &str) -> Option<Verb> {
        read(&self.inner.verbs)
            .get(name)
            .cloned()
            .map(|table| self.handle(table))
    }

    /// Like [`VerbRegistry::verb`], failing with [`PipeError::UnknownVerb`].
    pub fn lookup(&self, name: &str) -> PipeResult<Verb> {
        self.verb(name)
            .ok_or_else(|| PipeError::UnknownVerb(name.to_string()))
    }

    /// All declared verbs, sorted by name.
    pub fn verbs(&self) -> Vec<Verb> {
        let mut verbs: Vec<Verb> = read(&self.inner.verbs)
            .values()
            .cloned()
            .map(|table| self.handle(table))
            .collect();
        verbs.sort_by(|a, b| a.name().cmp(b.name()));
        verbs
    }

    /// Run `name` on `input`, dispatching on the input's runtime type.
    pub fn resolve_and_call(&self, name: &str, input: &Data, args: &Args) -> PipeResult<Data> {
        self.lookup(name)?.apply(input, args)
    }

    /// Allow values of type `T` (and of its declared subtypes) on the left of `>>`.
    pub fn make_pipesource<T: Any>(&self) -> &Self {
        let tag = TypeTag::of::<T>();
        let mut sources = write(&self.inner.sources);
        if !sources.contains_key(&tag.id()) {
            debug!("Enabled {} as pipe source", tag);
            sources.insert(tag.id(), tag);
        }
        self
    }

    pub fn is_pipesource(&self, tag: &TypeTag) -> bool {
        self.inner.is_pipesource(tag)
    }

    /// Types explicitly enabled as pipe sources, sorted by name.
    pub fn pipesources(&self) -> Vec<TypeTag> {
        let mut tags: Vec<TypeTag> = read(&self.inner.sources).values().cloned().collect();
        tags.sort_by(|a, b| a.name().cmp(b.name()));
        tags
    }

    /// Declare `C` a subtype of `P`.
    ///
    /// Dispatch on a `C` falls back to `P`'s implementation (which sees the
    /// `AsRef<P>` view) before the generic body, and `C` is a pipe source
    /// whenever `P` is. Each type has at most one parent; declaring again
    /// replaces it.
    pub fn declare_subtype<C, P>(&self) -> &Self
    where
        C: AsRef<P> + Any,
        P: Any,
    {
        let child = TypeTag::of::<C>();
        let parent = TypeTag::of::<P>();
        debug!("Declared {} as subtype of {}", child, parent);
        write(&self.inner.parents).insert(
            child.id(),
            Ancestry {
                parent,
                upcast: upcast::<C, P>,
            },
        );
        self
    }

    fn handle(&self, table: Arc<VerbTable>) -> Verb {
        Verb {
            table,
            registry: self.inner.clone(),
        }
    }
}

impl fmt::Debug for VerbRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verbs: Vec<String> = self.verbs().iter().map(|v| v.name().to_string()).collect();
        f.debug_struct("VerbRegistry")
            .field("verbs", &verbs)
            .field("pipesources", &self.pipesources())
            .finish()
    }
}

/// Handle onto one declared verb.
#[derive(Clone)]
pub struct Verb {
    table: Arc<VerbTable>,
    registry: Arc<RegistryInner>,
}

impl Verb {
    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Documentation given when the verb was declared.
    pub fn doc(&self) -> Option<String> {
        read(&self.table.generic).doc.clone()
    }

    /// Register the implementation for inputs of type `T`.
    pub fn register<T, R, F>(&self, implementation: F) -> &Self
    where
        T: Any,
        R: Any + Send + Sync,
        F: Fn(&T, &Args) -> PipeResult<R> + Send + Sync + 'static,
    {
        let verb = self.name().to_string();
        let tag = TypeTag::of::<T>();
        let expected = tag.name().to_string();
        let call: Implementation = Arc::new(move |input: &dyn Any, args: &Args| {
            let input = input
                .downcast_ref::<T>()
                .ok_or_else(|| PipeError::unsupported(&verb, &expected))?;
            implementation(input, args).map(Data::new)
        });
        self.register_dyn(tag, call)
    }

    /// Register an already type-erased implementation for `tag`.
    pub fn register_dyn(&self, tag: TypeTag, call: Implementation) -> &Self {
        let replaced = write(&self.table.implementations)
            .insert(tag.id(), Registered { tag: tag.clone(), call })
            .is_some();
        if replaced {
            debug!("Replaced {} implementation for {}", self.name(), tag);
        } else {
            debug!("Registered {} implementation for {}", self.name(), tag);
        }
        self
    }

    /// Names of the types with a specific implementation, sorted.
    pub fn implemented_for(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.table.implementations)
            .values()
            .map(|r| r.tag.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Capture `args` into a deferred call, to be applied with `>>`.
    pub fn call(&self, args: Args) -> Pipe {
        Pipe::new(self.clone(), args)
    }

    /// Apply the verb to `input` right away.
    ///
    /// This is the direct form: `verb.apply(&x, &args)` equals
    /// `x >> verb.call(args)` for any pipe source `x`. It does not require
    /// the input type to be a pipe source.
    pub fn apply(&self, input: &Data, args: &Args) -> PipeResult<Data> {
        let mut view = input.as_any();
        let chain = self.registry.ancestors(input.type_tag());

        for (depth, tag) in chain.iter().enumerate() {
            if depth > 0 {
                let parents = read(&self.registry.parents);
                let Some(ancestry) = parents.get(&chain[depth - 1].id()) else {
                    break;
                };
                let Some(next) = (ancestry.upcast)(view) else {
                    break;
                };
                trace!("{}: viewing {} as {}", self.name(), chain[depth - 1], tag);
                view = next;
            }

            let found = read(&self.table.implementations)
                .get(&tag.id())
                .map(|r| r.call.clone());
            if let Some(call) = found {
                debug!("{}: dispatching {} to {} implementation", self.name(), input.type_name(), tag);
                return call(view, args);
            }
        }

        debug!("{}: no implementation for {}, using generic", self.name(), input.type_name());
        let body = read(&self.table.generic).body.clone();
        body(input, args)
    }

    pub(crate) fn accepts_source(&self, tag: &TypeTag) -> bool {
        self.registry.is_pipesource(tag)
    }
}

impl fmt::Debug for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Verb")
            .field("name", &self.name())
            .field("implemented_for", &self.implemented_for())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Frame(Vec<i64>);

    #[derive(Debug, Clone, PartialEq)]
    struct Grouped {
        frame: Frame,
        key: String,
    }

    impl AsRef<Frame> for Grouped {
        fn as_ref(&self) -> &Frame {
            &self.frame
        }
    }

    fn sum_registry() -> (VerbRegistry, Verb) {
        let registry = VerbRegistry::new();
        let sum = registry.declare_unsupported("sum", Some("Sum all values."));
        sum.register::<Frame, i64, _>(|f, _| Ok(f.0.iter().sum()));
        (registry, sum)
    }

    #[test]
    fn test_generic_fallback_names_verb_and_type() {
        let registry = VerbRegistry::new();
        let verb = registry.declare_unsupported("sum", None);

        let err = verb.apply(&Data::new(1i64), &Args::new()).unwrap_err();
        match err {
            PipeError::UnsupportedInputType { verb, type_name } => {
                assert_eq!(verb, "sum");
                assert_eq!(type_name, "i64");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_type_wins_over_generic() {
        let (_, sum) = sum_registry();
        let out = sum.apply(&Data::new(Frame(vec![1, 2, 3])), &Args::new()).unwrap();
        assert_eq!(out.downcast::<i64>().unwrap(), 6);
    }

    #[test]
    fn test_custom_generic_body() {
        let registry = VerbRegistry::new();
        let describe = registry.declare("describe", None, |input, _| {
            Ok(Data::new(format!("a {}", input.type_name())))
        });
        describe.register::<Frame, String, _>(|f, _| Ok(format!("frame of {}", f.0.len())));

        let out = describe.apply(&Data::new(true), &Args::new()).unwrap();
        assert_eq!(out.downcast::<String>().unwrap(), "a bool");
        let out = describe.apply(&Data::new(Frame(vec![1])), &Args::new()).unwrap();
        assert_eq!(out.downcast::<String>().unwrap(), "frame of 1");
    }

    #[test]
    fn test_reregistration_replaces() {
        let (registry, sum) = sum_registry();
        registry.register::<Frame, i64, _>("sum", |f, _| Ok(f.0.len() as i64 * 100));

        let out = sum.apply(&Data::new(Frame(vec![1, 2])), &Args::new()).unwrap();
        assert_eq!(out.downcast::<i64>().unwrap(), 200);
        assert_eq!(sum.implemented_for(), vec!["Frame".to_string()]);
    }

    #[test]
    fn test_register_declares_missing_verb() {
        let registry = VerbRegistry::new();
        let verb = registry.register::<String, usize, _>("len", |s, _| Ok(s.len()));
        assert_eq!(verb.doc(), None);

        let err = verb.apply(&Data::new(3i64), &Args::new()).unwrap_err();
        assert!(matches!(err, PipeError::UnsupportedInputType { .. }));
    }

    #[test]
    fn test_redeclare_keeps_implementations() {
        let (registry, sum) = sum_registry();
        registry.declare("sum", Some("Sum, or zero."), |_, _| Ok(Data::new(0i64)));

        assert_eq!(sum.doc().as_deref(), Some("Sum, or zero."));
        let out = sum.apply(&Data::new(Frame(vec![4])), &Args::new()).unwrap();
        assert_eq!(out.downcast::<i64>().unwrap(), 4);
        let out = sum.apply(&Data::new("x".to_string()), &Args::new()).unwrap();
        assert_eq!(out.downcast::<i64>().unwrap(), 0);
    }

    #[test]
    fn test_subtype_uses_ancestor_implementation() {
        let (registry, sum) = sum_registry();
        let grouped = Data::new(Grouped {
            frame: Frame(vec![5, 5]),
            key: "k".into(),
        });

        assert!(sum.apply(&grouped, &Args::new()).is_err());

        registry.declare_subtype::<Grouped, Frame>();
        let out = sum.apply(&grouped, &Args::new()).unwrap();
        assert_eq!(out.downcast::<i64>().unwrap(), 10);

        sum.register::<Grouped, String, _>(|g, _| Ok(format!("per {}", g.key)));
        let out = sum.apply(&grouped, &Args::new()).unwrap();
        assert_eq!(out.downcast::<String>().unwrap(), "per k");
    }

    #[test]
    fn test_ancestry_cycle_terminates() {
        struct A;
        struct B;

        impl AsRef<B> for A {
            fn as_ref(&self) -> &B {
                unreachable!()
            }
        }
        impl AsRef<A> for B {
            fn as_ref(&self) -> &A {
                unreachable!()
            }
        }

        let registry = VerbRegistry::new();
        registry.declare_subtype::<A, B>().declare_subtype::<B, A>();
        let tags = registry.inner.ancestors(&TypeTag::of::<A>());
        assert_eq!(tags, vec![TypeTag::of::<A>(), TypeTag::of::<B>()]);
        assert!(!registry.is_pipesource(&TypeTag::of::<A>()));
    }

    #[test]
    fn test_pipesources() {
        let registry = VerbRegistry::new();
        assert!(!registry.is_pipesource(&TypeTag::of::<Frame>()));

        registry.make_pipesource::<Frame>().make_pipesource::<Frame>();
        assert!(registry.is_pipesource(&TypeTag::of::<Frame>()));
        assert_eq!(registry.pipesources(), vec![TypeTag::of::<Frame>()]);

        assert!(!registry.is_pipesource(&TypeTag::of::<Grouped>()));
        registry.declare_subtype::<Grouped, Frame>();
        assert!(registry.is_pipesource(&TypeTag::of::<Grouped>()));
    }

    #[test]
    fn test_lookup_and_listing() {
        let (registry, _) = sum_registry();
        registry.declare_unsupported("count", None);

        let names: Vec<String> = registry.verbs().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, vec!["count", "sum"]);

        let err = registry.lookup("mean").unwrap_err();
        assert_eq!(err.to_string(), "Unknown verb: 'mean'");

        let out = registry
            .resolve_and_call("sum", &Data::new(Frame(vec![2, 2])), &args![])
            .unwrap();
        assert_eq!(out.downcast::<i64>().unwrap(), 4);
    }

    #[test]
    fn test_registries_are_independent() {
        let (first, _) = sum_registry();
        let second = VerbRegistry::new();
        assert!(second.verb("sum").is_none());

        second.declare_unsupported("sum", None);
        let err = second
            .resolve_and_call("sum", &Data::new(Frame(vec![1])), &Args::new())
            .unwrap_err();
        assert!(matches!(err, PipeError::UnsupportedInputType { .. }));
        assert!(first
            .resolve_and_call("sum", &Data::new(Frame(vec![1])), &Args::new())
            .is_ok());
    }

    #[test]
    fn test_verb_errors_propagate_unchanged() {
        let registry = VerbRegistry::new();
        let verb = registry.register::<Frame, i64, _>("first", |f, _| {
            f.0.first()
                .copied()
                .ok_or_else(|| anyhow::anyhow!("frame is empty").into())
        });

        let err = verb.apply(&Data::new(Frame(vec![])), &Args::new()).unwrap_err();
        assert_eq!(err.to_string(), "frame is empty");
    }
}
