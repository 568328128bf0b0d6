//! Named extension points (C3).
//!
//! The source stores every event's callbacks in one dynamically-typed
//! slot and lets callers pass and return whatever they want. That isn't
//! expressible here, so the four reserved events each get their own
//! strongly-typed registration list; everything else (user `define`d
//! events) goes through a generic, type-erased slot keyed by name, kept
//! behind the same `define`/`connect`/`iter`/`emit`/`emit_ovr`
//! vocabulary so the two kinds of event are indistinguishable to a
//! caller who only ever uses that vocabulary.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::Context;
use crate::error::{DmltError, Result};
use crate::node::NodeBox;
use crate::rule::DirectiveRef;
use crate::token::TokenStream;

pub type RawDirectiveFactory = Rc<dyn Fn() -> DirectiveRef>;
pub type DocumentNodeFactory = Rc<dyn Fn() -> NodeBox>;
pub type StreamFilter = Rc<dyn Fn(TokenStream, &Context) -> TokenStream>;
pub type TreeFilter = Rc<dyn Fn(NodeBox, &Context) -> NodeBox>;

/// A user-defined event's callback, type-erased. Concrete call sites
/// downcast back to the signature they registered with; `emit`/`emit_ovr`
/// on a custom event require the caller to supply that signature via
/// turbofish so the erasure is invisible in practice.
type ErasedCallback = Rc<dyn Any>;

const DEFINE_RAW_DIRECTIVE: &str = "define-raw-directive";
const DEFINE_DOCUMENT_NODE: &str = "define-document-node";
const PROCESS_STREAM: &str = "process-stream";
const PROCESS_DOC_TREE: &str = "process-doc-tree";

/// Named extension-point registry. A fresh [`EventBus::new`] is a
/// machine-local bus; [`EventBus::global`] hands back the process-wide
/// default instance for code that wants shared, static registration
/// (mirroring the source's single process-global `events.manager`).
pub struct EventBus {
    raw_directive: Vec<RawDirectiveFactory>,
    document_node: Vec<DocumentNodeFactory>,
    process_stream: Vec<StreamFilter>,
    process_doc_tree: Vec<TreeFilter>,
    custom: HashMap<String, Vec<ErasedCallback>>,
    defined: Vec<String>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            raw_directive: Vec::new(),
            document_node: Vec::new(),
            process_stream: Vec::new(),
            process_doc_tree: Vec::new(),
            custom: HashMap::new(),
            defined: vec![
                DEFINE_RAW_DIRECTIVE.to_string(),
                DEFINE_DOCUMENT_NODE.to_string(),
                PROCESS_STREAM.to_string(),
                PROCESS_DOC_TREE.to_string(),
            ],
        }
    }

    /// Registers a new user-defined event name. Fails if already known,
    /// matching the source's `events.define`.
    pub fn define(&mut self, name: &str) -> Result<()> {
        if self.defined.iter().any(|n| n == name) {
            return Err(DmltError::Programming(format!(
                "event {name:?} is already registered"
            )));
        }
        self.defined.push(name.to_string());
        self.custom.insert(name.to_string(), Vec::new());
        Ok(())
    }

    fn require_defined(&self, name: &str) -> Result<()> {
        if self.defined.iter().any(|n| n == name) {
            Ok(())
        } else {
            Err(DmltError::EventNotFound(name.to_string()))
        }
    }

    pub fn connect_raw_directive(&mut self, cb: RawDirectiveFactory) {
        self.raw_directive.push(cb);
    }

    pub fn connect_document_node(&mut self, cb: DocumentNodeFactory) {
        self.document_node.push(cb);
    }

    pub fn connect_process_stream(&mut self, cb: StreamFilter) {
        self.process_stream.push(cb);
    }

    pub fn connect_process_doc_tree(&mut self, cb: TreeFilter) {
        self.process_doc_tree.push(cb);
    }

    /// Connects a callback to a user-defined event. `T` must match the
    /// type used at every `connect`/`iter_custom` call site for that
    /// event name, or the registration is simply invisible to callers
    /// asking for a different `T` (there is no cross-type visibility by
    /// design — the erasure exists only to let one bus hold many
    /// differently-shaped custom events, not to let them collide).
    pub fn connect<T: 'static>(&mut self, name: &str, cb: Rc<T>) -> Result<()> {
        self.require_defined(name)?;
        self.custom.entry(name.to_string()).or_default().push(cb);
        Ok(())
    }

    pub fn iter_custom<T: 'static>(&self, name: &str) -> impl Iterator<Item = Rc<T>> + '_ {
        self.custom
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|cb| cb.clone().downcast::<T>().ok())
    }

    /// Removes a user-defined callback by pointer identity from every
    /// custom event it was registered under, returning how many
    /// registrations were actually removed.
    ///
    /// The source's `EventManager.remove` iterates over the *event name*
    /// keys of its backing dict rather than the registered callback
    /// lists, so its `callable in event` check compares a callback
    /// object against a string and never matches; the `count` it returns
    /// is simply "number of event names seen minus one", regardless of
    /// whether anything was removed. That return value is explicitly
    /// called out as unreliable, so this removes a real count instead.
    pub fn remove<T: 'static>(&mut self, cb: &Rc<T>) -> usize {
        let mut removed = 0;
        for list in self.custom.values_mut() {
            let before = list.len();
            list.retain(|existing| {
                existing
                    .clone()
                    .downcast::<T>()
                    .map(|existing| !Rc::ptr_eq(&existing, cb))
                    .unwrap_or(true)
            });
            removed += before - list.len();
        }
        removed
    }

    pub fn raw_directive_factories(&self) -> &[RawDirectiveFactory] {
        &self.raw_directive
    }

    pub fn document_node_factories(&self) -> &[DocumentNodeFactory] {
        &self.document_node
    }

    pub fn process_stream_filters(&self) -> &[StreamFilter] {
        &self.process_stream
    }

    pub fn process_doc_tree_filters(&self) -> &[TreeFilter] {
        &self.process_doc_tree
    }

    /// `emit_ovr('define-raw-directive')`: builds a directive instance
    /// from the last-registered factory (last registration wins).
    pub fn resolve_raw_directive(&self) -> Option<DirectiveRef> {
        self.raw_directive.last().map(|factory| factory())
    }

    /// `emit_ovr('define-document-node')`: builds a fresh document root.
    pub fn resolve_document_node(&self) -> Option<NodeBox> {
        self.document_node.last().map(|factory| factory())
    }

    /// Runs the `process-stream` chain in registration order, folding
    /// each filter's output into the next's input.
    pub fn run_process_stream(&self, mut stream: TokenStream, ctx: &Context) -> TokenStream {
        for filter in &self.process_stream {
            stream = filter(stream, ctx);
        }
        stream
    }

    /// Runs the `process-doc-tree` chain in registration order.
    pub fn run_process_doc_tree(&self, mut tree: NodeBox, ctx: &Context) -> NodeBox {
        for filter in &self.process_doc_tree {
            tree = filter(tree, ctx);
        }
        tree
    }
}

thread_local! {
    static GLOBAL: std::cell::RefCell<EventBus> = std::cell::RefCell::new(EventBus::new());
}

/// Runs `f` with mutable access to the process-wide default bus
/// (thread-local, since the core is documented as single-threaded; see
/// the concurrency model).
pub fn with_global<R>(f: impl FnOnce(&mut EventBus) -> R) -> R {
    GLOBAL.with(|bus| f(&mut bus.borrow_mut()))
}

/// Runs `f` with shared access to the process-wide default bus.
pub fn with_global_ref<R>(f: impl FnOnce(&EventBus) -> R) -> R {
    GLOBAL.with(|bus| f(&bus.borrow()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn connect_to_unknown_event_fails() {
        let mut bus = EventBus::new();
        let result = bus.connect("nonexistent", Rc::new(|| ()));
        assert!(matches!(result, Err(DmltError::EventNotFound(_))));
    }

    #[test]
    fn define_then_connect_succeeds() {
        let mut bus = EventBus::new();
        bus.define("ping").unwrap();
        bus.connect("ping", Rc::new(7i32)).unwrap();
        let values: Vec<Rc<i32>> = bus.iter_custom::<i32>("ping").collect();
        assert_eq!(values.len(), 1);
        assert_eq!(*values[0], 7);
    }

    #[test]
    fn define_twice_fails() {
        let mut bus = EventBus::new();
        bus.define("dup").unwrap();
        assert!(bus.define("dup").is_err());
    }

    #[test]
    fn remove_reports_actual_count() {
        let mut bus = EventBus::new();
        bus.define("chatter").unwrap();
        let a = Rc::new(1i32);
        let b = Rc::new(2i32);
        let c = Rc::new(3i32);
        bus.connect("chatter", a.clone()).unwrap();
        bus.connect("chatter", b.clone()).unwrap();
        bus.connect("chatter", c.clone()).unwrap();

        let removed = bus.remove(&b);
        assert_eq!(removed, 1);

        let remaining: Vec<i32> = bus.iter_custom::<i32>("chatter").map(|v| *v).collect();
        assert_eq!(remaining, vec![1, 3]);
    }

    #[test]
    fn emit_ovr_resolves_to_last_registration() {
        let mut bus = EventBus::new();
        bus.connect_document_node(Rc::new(|| {
            Box::new(crate::node::Document::new()) as NodeBox
        }));
        bus.connect_document_node(Rc::new(|| {
            let mut doc = crate::node::Document::new();
            doc.children.push(Box::new(crate::node::Text::new("marker")));
            Box::new(doc) as NodeBox
        }));
        let resolved = bus.resolve_document_node().unwrap();
        assert_eq!(resolved.children().len(), 1);
    }
}
