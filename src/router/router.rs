//! The request router: the RPC operation surface built on the sync core.
//!
//! `GetObject` streams diffs out of per-id send queues; `Visit`, `Print`,
//! and `PrepareRecipe` are thin pass-throughs to language-specific
//! collaborators that materialize objects through the same fetch primitive
//! first; `GetCursor` rebuilds ancestor chains. Every operation owns state
//! keyed by its own object id, so a failure is fatal only to that in-flight
//! request and never corrupts concurrent requests on the same connection.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::codec::CodecRegistry;
use crate::core::{
    Cursor, DEFAULT_BATCH_SIZE, ProtocolError, Result, VISITOR_ID_PREFIX, Value,
};
use crate::sync::{ReceiveQueue, RpcObjectData, SendQueue};

use super::requests::{PrepareRecipeResponse, RpcRequest, RpcResponse, VisitResponse};
use super::session::SessionContext;

/// A transformation over trees, invoked remotely via `Visit`.
///
/// Out-of-scope collaborator: the core only cares that it returns a possibly
/// different tree; identity change is what `modified` reports.
pub trait TreeVisitor {
    /// Visit `tree` with optional parameter object, ancestor context, and
    /// opaque options.
    fn visit(
        &self,
        tree: Value,
        params: Option<Value>,
        cursor: Option<&Cursor>,
        options: Option<&JsonValue>,
    ) -> Result<Value>;
}

/// Prints a tree (with optional ancestor context) back to source text.
pub trait TreePrinter {
    /// Render `tree` to text.
    fn print(&self, tree: &Value, cursor: Option<&Cursor>) -> Result<String>;
}

/// A named, options-bound transformation factory prepared via
/// `PrepareRecipe`.
pub trait Recipe {
    /// The recipe's registered name.
    fn name(&self) -> &str;

    /// Self-description returned to the caller.
    fn descriptor(&self) -> JsonValue;

    /// Build the edit-phase visitor for the given options.
    fn edit_visitor(&self, options: Option<&JsonValue>) -> Result<Arc<dyn TreeVisitor>>;

    /// Build the scan-phase visitor, when the recipe has one.
    fn scan_visitor(&self, options: Option<&JsonValue>) -> Result<Option<Arc<dyn TreeVisitor>>> {
        let _ = options;
        Ok(None)
    }
}

/// The caller-side fetch primitive: pulls batches of one object's diff
/// stream from the peer that owns it.
pub trait ObjectSource {
    /// Pull the next batch for `id`. Repeated calls continue the same
    /// stream until its trailing `END_OF_OBJECT`.
    fn pull(&mut self, id: &str, batch_size: usize) -> Result<Vec<RpcObjectData>>;
}

/// Router tuning knobs.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Items per `GetObject` batch when the request names no size.
    pub default_batch_size: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// An outbound diff stream that has not reached its terminator yet.
struct InFlightFetch {
    queue: SendQueue,
    after: Value,
}

/// Serves the request surface for one connection.
pub struct RequestRouter {
    session: SessionContext,
    config: RouterConfig,
    visitors: HashMap<String, Arc<dyn TreeVisitor>>,
    recipes: HashMap<String, Arc<dyn Recipe>>,
    printer: Option<Arc<dyn TreePrinter>>,
    source: Option<Box<dyn ObjectSource>>,
    in_flight: HashMap<String, InFlightFetch>,
}

impl RequestRouter {
    /// Create a router over a session with default configuration.
    pub fn new(session: SessionContext) -> Self {
        Self::with_config(session, RouterConfig::default())
    }

    /// Create a router with explicit configuration.
    pub fn with_config(session: SessionContext, config: RouterConfig) -> Self {
        Self {
            session,
            config,
            visitors: HashMap::new(),
            recipes: HashMap::new(),
            printer: None,
            source: None,
            in_flight: HashMap::new(),
        }
    }

    /// The session this router serves.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Mutable access to the session, for registering objects.
    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Register a visitor under a kind name.
    pub fn register_visitor(&mut self, kind: impl Into<String>, visitor: Arc<dyn TreeVisitor>) {
        self.visitors.insert(kind.into(), visitor);
    }

    /// Register a recipe under its own name.
    pub fn register_recipe(&mut self, recipe: Arc<dyn Recipe>) {
        self.recipes.insert(recipe.name().to_owned(), recipe);
    }

    /// Install the printing collaborator.
    pub fn set_printer(&mut self, printer: Arc<dyn TreePrinter>) {
        self.printer = Some(printer);
    }

    /// Install the peer fetch primitive used to materialize objects this
    /// side does not hold.
    pub fn set_object_source(&mut self, source: Box<dyn ObjectSource>) {
        self.source = Some(source);
    }

    /// Dispatch one request.
    pub fn handle(&mut self, request: RpcRequest) -> Result<RpcResponse> {
        match request {
            RpcRequest::GetObject { id, batch_size } => {
                self.get_object(&id, batch_size).map(RpcResponse::Batch)
            }
            RpcRequest::Visit {
                visitor,
                options,
                tree_id,
                param_id,
                cursor_ids,
            } => self
                .visit(
                    &visitor,
                    options.as_ref(),
                    &tree_id,
                    param_id.as_deref(),
                    cursor_ids.as_deref(),
                )
                .map(RpcResponse::Visit),
            RpcRequest::Print {
                tree_id,
                cursor_ids,
            } => self
                .print(&tree_id, cursor_ids.as_deref())
                .map(RpcResponse::Print),
            RpcRequest::PrepareRecipe { name, options } => self
                .prepare_recipe(&name, options.as_ref())
                .map(RpcResponse::PrepareRecipe),
            RpcRequest::GetCursor { cursor_ids } => {
                self.get_cursor(&cursor_ids)?;
                Ok(RpcResponse::Cursor(cursor_ids))
            }
        }
    }

    /// Pull the next batch of `id`'s diff stream.
    ///
    /// An unknown id is not an error: it represents deletion and yields
    /// `[DELETE, END_OF_OBJECT]`. Repeated calls continue the same
    /// generator; once the terminator is pulled the generator is discarded
    /// and the shadow cache advances.
    pub fn get_object(
        &mut self,
        id: &str,
        batch_size: Option<usize>,
    ) -> Result<Vec<RpcObjectData>> {
        let batch_size = batch_size.unwrap_or(self.config.default_batch_size).max(1);
        let mut fetch = match self.in_flight.remove(id) {
            Some(fetch) => fetch,
            None => {
                let after = self.session.local_object(id).cloned().unwrap_or(Value::Null);
                let before = self
                    .session
                    .remote_object(id)
                    .cloned()
                    .unwrap_or(Value::Null);
                let queue = SendQueue::new(
                    Arc::clone(self.session.registry()),
                    self.session.source_file_type().map(str::to_owned),
                    after.clone(),
                    before,
                );
                InFlightFetch { queue, after }
            }
        };

        // A failed walk drops the generator; the shadow cache stays at the
        // last fully-consumed baseline.
        let batch = fetch.queue.take_batch(batch_size)?;
        debug!(id, items = batch.len(), "get_object batch");

        if fetch.queue.is_complete() {
            if fetch.after.is_null() {
                self.session.evict(id);
            } else {
                self.session.put_remote_object(id, fetch.after);
            }
        } else {
            self.in_flight.insert(id.to_owned(), fetch);
        }
        Ok(batch)
    }

    /// Discard the in-flight stream for `id`, if any, without advancing the
    /// shadow cache. The next fetch re-diffs from the last fully-consumed
    /// baseline.
    pub fn abandon_object(&mut self, id: &str) {
        if self.in_flight.remove(id).is_some() {
            debug!(id, "abandoned in-flight fetch");
        }
    }

    /// Run a registered visitor against a tree and report whether the
    /// tree's identity changed.
    pub fn visit(
        &mut self,
        visitor: &str,
        options: Option<&JsonValue>,
        tree_id: &str,
        param_id: Option<&str>,
        cursor_ids: Option<&[String]>,
    ) -> Result<VisitResponse> {
        let visitor_impl = self
            .visitors
            .get(visitor)
            .cloned()
            .ok_or_else(|| ProtocolError::Configuration(format!("unknown visitor `{visitor}`")))?;

        // Only one logical mutation stream per object id at a time: a
        // result the peer has not finished fetching must not be replaced
        // out from under its generator.
        if self.in_flight.contains_key(tree_id) {
            return Err(ProtocolError::violation(format!(
                "object `{tree_id}` has an unfetched result in flight"
            )));
        }

        let tree = self.materialize(tree_id)?;
        let params = match param_id {
            Some(id) => Some(self.materialize(id)?),
            None => None,
        };
        let cursor = match cursor_ids {
            Some(ids) => Some(self.get_cursor(ids)?),
            None => None,
        };

        let result = visitor_impl.visit(tree.clone(), params, cursor.as_ref(), options)?;
        let modified = !result.same_identity(&tree);
        debug!(visitor, tree_id, modified, "visit");
        self.session.put_local_object(tree_id, result);
        Ok(VisitResponse { modified })
    }

    /// Print a tree back to text.
    pub fn print(&mut self, tree_id: &str, cursor_ids: Option<&[String]>) -> Result<String> {
        let printer = self
            .printer
            .clone()
            .ok_or_else(|| ProtocolError::Configuration("no printer installed".into()))?;
        let tree = self.materialize(tree_id)?;
        let cursor = match cursor_ids {
            Some(ids) => Some(self.get_cursor(ids)?),
            None => None,
        };
        printer.print(&tree, cursor.as_ref())
    }

    /// Instantiate a named recipe bound to `options`, returning opaque ids
    /// the caller can later pass to `Visit`.
    pub fn prepare_recipe(
        &mut self,
        name: &str,
        options: Option<&JsonValue>,
    ) -> Result<PrepareRecipeResponse> {
        let recipe = self
            .recipes
            .get(name)
            .cloned()
            .ok_or_else(|| ProtocolError::Configuration(format!("unknown recipe `{name}`")))?;

        let edit_visitor = recipe.edit_visitor(options)?;
        let edit_visitor_id = self.session.issue_id(VISITOR_ID_PREFIX);
        self.visitors.insert(edit_visitor_id.clone(), edit_visitor);

        let scan_visitor_id = match recipe.scan_visitor(options)? {
            Some(scan_visitor) => {
                let id = self.session.issue_id(VISITOR_ID_PREFIX);
                self.visitors.insert(id.clone(), scan_visitor);
                Some(id)
            }
            None => None,
        };

        let id = self.session.issue_id("recipe");
        debug!(name, id, "prepared recipe");
        Ok(PrepareRecipeResponse {
            id,
            descriptor: recipe.descriptor(),
            edit_visitor_id,
            scan_visitor_id,
        })
    }

    /// Rebuild an ancestor chain from ids ordered root-most first,
    /// resolving each against local objects then the shadow cache.
    pub fn get_cursor(&self, cursor_ids: &[String]) -> Result<Cursor> {
        let mut values = Vec::with_capacity(cursor_ids.len());
        for id in cursor_ids {
            let value = self
                .session
                .resolve(id)
                .cloned()
                .ok_or_else(|| ProtocolError::UnknownObject(id.clone()))?;
            values.push(value);
        }
        Cursor::from_path(values)
            .ok_or_else(|| ProtocolError::violation("empty cursor id list".to_owned()))
    }

    /// Produce a live value for `id`: the authoritative local object, else
    /// a fresh fetch through the object source, else the shadow cache.
    fn materialize(&mut self, id: &str) -> Result<Value> {
        if let Some(value) = self.session.local_object(id) {
            return Ok(value.clone());
        }
        if let Some(source) = self.source.as_mut() {
            let baseline = self
                .session
                .remote_object(id)
                .cloned()
                .unwrap_or(Value::Null);
            let value = fetch_object(
                source.as_mut(),
                Arc::clone(self.session.registry()),
                self.session.source_file_type().map(str::to_owned),
                id,
                baseline,
                self.config.default_batch_size,
            )?;
            if value.is_null() {
                // The owner reported deletion.
                self.session.evict(id);
                return Err(ProtocolError::UnknownObject(id.to_owned()));
            }
            self.session.put_remote_object(id, value.clone());
            return Ok(value);
        }
        if let Some(value) = self.session.remote_object(id) {
            return Ok(value.clone());
        }
        Err(ProtocolError::UnknownObject(id.to_owned()))
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("visitors", &self.visitors.len())
            .field("recipes", &self.recipes.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

/// Drain one object's diff stream from `source` into a reconstruction
/// against `baseline`. Returns `Value::Null` when the stream reports
/// deletion.
pub fn fetch_object(
    source: &mut dyn ObjectSource,
    registry: Arc<CodecRegistry>,
    source_file_type: Option<String>,
    id: &str,
    baseline: Value,
    batch_size: usize,
) -> Result<Value> {
    let mut queue = ReceiveQueue::new(registry, source_file_type, baseline);
    loop {
        let batch = source.pull(id, batch_size)?;
        if batch.is_empty() && !queue.is_complete() {
            return Err(ProtocolError::violation(format!(
                "object source ran dry before `{id}` completed"
            )));
        }
        if let Some(value) = queue.apply(&batch)? {
            return Ok(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FieldCodec;
    use crate::core::TreeNode;
    use crate::sync::RpcObjectState;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn registry() -> Arc<CodecRegistry> {
        let mut registry = CodecRegistry::new();
        registry.register(FieldCodec::new("Pair", &["a", "b"]));
        registry.register(FieldCodec::new("Ident", &["text"]));
        Arc::new(registry)
    }

    fn pair(a: Value, b: Value) -> Value {
        Value::node(TreeNode::new(
            "Pair",
            vec![("a".into(), a), ("b".into(), b)],
        ))
    }

    fn ident(text: &str) -> Value {
        Value::node(TreeNode::with_id(
            format!("id-{text}"),
            "Ident",
            vec![("text".into(), Value::scalar(text))],
        ))
    }

    fn router() -> RequestRouter {
        RequestRouter::new(SessionContext::new(registry()))
    }

    /// Replaces the `text` of every `Ident` named in its options.
    struct RenameVisitor;

    impl TreeVisitor for RenameVisitor {
        fn visit(
            &self,
            tree: Value,
            _params: Option<Value>,
            _cursor: Option<&Cursor>,
            options: Option<&JsonValue>,
        ) -> Result<Value> {
            let (from, to) = match options {
                Some(opts) => (
                    opts["from"].as_str().unwrap_or_default().to_owned(),
                    opts["to"].as_str().unwrap_or_default().to_owned(),
                ),
                None => return Ok(tree),
            };
            Ok(rename(&tree, &from, &to))
        }
    }

    fn rename(value: &Value, from: &str, to: &str) -> Value {
        match value {
            Value::Node(node) if node.kind == "Ident" => {
                if node.field("text") == Value::scalar(from) {
                    Value::node(node.with_field("text", Value::scalar(to)))
                } else {
                    value.clone()
                }
            }
            Value::Node(node) => {
                let fields: Vec<(String, Value)> = node
                    .fields
                    .iter()
                    .map(|(n, v)| (n.clone(), rename(v, from, to)))
                    .collect();
                if fields
                    .iter()
                    .zip(&node.fields)
                    .all(|((_, a), (_, b))| a.same_identity(b))
                {
                    value.clone()
                } else {
                    Value::Node(Arc::new(TreeNode {
                        id: node.id.clone(),
                        kind: node.kind.clone(),
                        fields,
                    }))
                }
            }
            _ => value.clone(),
        }
    }

    struct TextPrinter;

    impl TreePrinter for TextPrinter {
        fn print(&self, tree: &Value, _cursor: Option<&Cursor>) -> Result<String> {
            fn walk(value: &Value, out: &mut String) {
                match value {
                    Value::Scalar(s) => out.push_str(&format!("{:?} ", s)),
                    Value::Node(node) => {
                        for (_, v) in &node.fields {
                            walk(v, out);
                        }
                    }
                    Value::List(items) => {
                        for v in items.iter() {
                            walk(v, out);
                        }
                    }
                    Value::Null => {}
                }
            }
            let mut out = String::new();
            walk(tree, &mut out);
            Ok(out.trim_end().to_owned())
        }
    }

    struct RenameRecipe;

    impl Recipe for RenameRecipe {
        fn name(&self) -> &str {
            "rename"
        }

        fn descriptor(&self) -> JsonValue {
            json!({"name": "rename", "description": "rename identifiers"})
        }

        fn edit_visitor(&self, _options: Option<&JsonValue>) -> Result<Arc<dyn TreeVisitor>> {
            Ok(Arc::new(RenameVisitor))
        }
    }

    #[test]
    fn test_unknown_id_fetch_is_deletion() {
        let mut router = router();
        let batch = router.get_object("missing", None).unwrap();
        assert_eq!(
            batch,
            vec![RpcObjectData::delete(), RpcObjectData::end_of_object()]
        );
    }

    #[test]
    fn test_get_object_advances_shadow_cache_on_completion() {
        let mut router = router();
        let tree = pair(Value::scalar(1i64), ident("x"));
        let id = router.session_mut().add_local_object(tree.clone());

        let batch = router.get_object(&id, Some(100)).unwrap();
        assert_eq!(batch[0].state, RpcObjectState::Add);
        assert!(router.session().remote_object(&id).unwrap().same_identity(&tree));

        // The peer is now up to date: a re-fetch is pure NO_CHANGE.
        let batch = router.get_object(&id, None).unwrap();
        assert_eq!(
            batch,
            vec![RpcObjectData::no_change(), RpcObjectData::end_of_object()]
        );
    }

    #[test]
    fn test_get_object_batches_continue_one_generator() {
        let mut router = router();
        let tree = pair(Value::scalar(1i64), ident("x"));
        let id = router.session_mut().add_local_object(tree);

        let mut items = Vec::new();
        loop {
            let batch = router.get_object(&id, Some(2)).unwrap();
            assert!(!batch.is_empty() && batch.len() <= 2);
            let done = router.session().remote_object(&id).is_some();
            items.extend(batch);
            if done {
                break;
            }
        }

        assert_eq!(items[0].state, RpcObjectState::Add);
        assert!(items.last().unwrap().is_end());
        let mut depth = 0usize;
        for item in &items[..items.len() - 1] {
            if item.value_type.is_some() || matches!(&item.value, Some(v) if v.is_array()) {
                depth += 1;
            } else if item.is_end() {
                depth -= 1;
            }
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_abandoned_fetch_keeps_baseline() {
        let mut router = router();
        let tree = pair(Value::scalar(1i64), ident("x"));
        let id = router.session_mut().add_local_object(tree);

        let partial = router.get_object(&id, Some(2)).unwrap();
        assert_eq!(partial.len(), 2);
        router.abandon_object(&id);
        assert!(router.session().remote_object(&id).is_none());

        // The next fetch restarts from the last fully-consumed baseline.
        let batch = router.get_object(&id, Some(100)).unwrap();
        assert_eq!(batch[0].state, RpcObjectState::Add);
        assert!(batch.last().unwrap().is_end());
    }

    #[test]
    fn test_deleted_object_is_evicted_after_fetch() {
        let mut router = router();
        let tree = pair(Value::scalar(1i64), Value::Null);
        let id = router.session_mut().add_local_object(tree.clone());
        router.get_object(&id, None).unwrap(); // peer now holds it

        router.session_mut().evict(&id);
        router.session_mut().put_remote_object(&id, tree);

        let batch = router.get_object(&id, None).unwrap();
        assert_eq!(
            batch,
            vec![RpcObjectData::delete(), RpcObjectData::end_of_object()]
        );
        assert!(router.session().remote_object(&id).is_none());
    }

    #[test]
    fn test_visit_modified() {
        let mut router = router();
        router.register_visitor("rename", Arc::new(RenameVisitor));
        let tree = pair(ident("old"), ident("other"));
        let id = router.session_mut().add_local_object(tree.clone());

        let response = router
            .visit(
                "rename",
                Some(&json!({"from": "old", "to": "new"})),
                &id,
                None,
                None,
            )
            .unwrap();
        assert!(response.modified);

        let updated = router.session().local_object(&id).unwrap();
        assert!(!updated.same_identity(&tree));
        // Untouched branch keeps its identity through the visit.
        let untouched_before = tree.as_node().unwrap().field("b");
        let untouched_after = updated.as_node().unwrap().field("b");
        assert!(untouched_after.same_identity(&untouched_before));
    }

    #[test]
    fn test_visit_unmodified() {
        let mut router = router();
        router.register_visitor("rename", Arc::new(RenameVisitor));
        let id = router
            .session_mut()
            .add_local_object(pair(ident("x"), Value::Null));

        let response = router
            .visit(
                "rename",
                Some(&json!({"from": "absent", "to": "n"})),
                &id,
                None,
                None,
            )
            .unwrap();
        assert!(!response.modified);
    }

    #[test]
    fn test_visit_unknown_visitor_is_configuration_error() {
        let mut router = router();
        let id = router.session_mut().add_local_object(ident("x"));
        let err = router.visit("nope", None, &id, None, None).unwrap_err();
        assert!(matches!(err, ProtocolError::Configuration(_)));
    }

    #[test]
    fn test_visit_unknown_tree_is_unknown_object() {
        let mut router = router();
        router.register_visitor("rename", Arc::new(RenameVisitor));
        let err = router
            .visit("rename", None, "missing", None, None)
            .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownObject("missing".into()));
    }

    #[test]
    fn test_visit_rejected_while_result_unfetched() {
        let mut router = router();
        router.register_visitor("rename", Arc::new(RenameVisitor));
        let id = router
            .session_mut()
            .add_local_object(pair(ident("x"), Value::Null));

        // A peer starts fetching but has not drained the stream.
        let partial = router.get_object(&id, Some(1)).unwrap();
        assert_eq!(partial.len(), 1);

        let err = router.visit("rename", None, &id, None, None).unwrap_err();
        assert!(matches!(err, ProtocolError::ProtocolViolation(_)));

        // Draining the stream clears the way.
        while router.session().remote_object(&id).is_none() {
            router.get_object(&id, Some(10)).unwrap();
        }
        router.visit("rename", None, &id, None, None).unwrap();
    }

    #[test]
    fn test_print() {
        let mut router = router();
        router.set_printer(Arc::new(TextPrinter));
        let id = router
            .session_mut()
            .add_local_object(pair(ident("hello"), ident("world")));

        let text = router.print(&id, None).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("world"));
    }

    #[test]
    fn test_print_without_printer_is_configuration_error() {
        let mut router = router();
        let id = router.session_mut().add_local_object(ident("x"));
        let err = router.print(&id, None).unwrap_err();
        assert!(matches!(err, ProtocolError::Configuration(_)));
    }

    #[test]
    fn test_prepare_recipe_then_visit_by_id() {
        let mut router = router();
        router.register_recipe(Arc::new(RenameRecipe));
        let id = router
            .session_mut()
            .add_local_object(pair(ident("old"), Value::Null));

        let prepared = router
            .prepare_recipe("rename", Some(&json!({"from": "old", "to": "new"})))
            .unwrap();
        assert_eq!(prepared.descriptor["name"], json!("rename"));
        assert!(prepared.scan_visitor_id.is_none());

        let response = router
            .visit(
                &prepared.edit_visitor_id,
                Some(&json!({"from": "old", "to": "new"})),
                &id,
                None,
                None,
            )
            .unwrap();
        assert!(response.modified);
    }

    #[test]
    fn test_prepare_unknown_recipe() {
        let mut router = router();
        let err = router.prepare_recipe("nope", None).unwrap_err();
        assert!(matches!(err, ProtocolError::Configuration(_)));
    }

    #[test]
    fn test_get_cursor_root_most_first() {
        let mut router = router();
        let root = router.session_mut().add_local_object(ident("root"));
        let inner = router.session_mut().add_local_object(ident("inner"));

        let cursor = router
            .get_cursor(&[root.clone(), inner.clone()])
            .unwrap();
        assert_eq!(cursor.depth(), 2);
        assert!(
            cursor
                .value()
                .same_identity(router.session().local_object(&inner).unwrap())
        );
        assert!(
            cursor
                .parent()
                .unwrap()
                .value()
                .same_identity(router.session().local_object(&root).unwrap())
        );
    }

    #[test]
    fn test_get_cursor_unknown_id() {
        let router = router();
        let err = router.get_cursor(&["missing".to_owned()]).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownObject("missing".into()));
    }

    #[test]
    fn test_handle_dispatch() {
        let mut router = router();
        let id = router.session_mut().add_local_object(ident("x"));

        let response = router
            .handle(RpcRequest::GetObject {
                id: id.clone(),
                batch_size: None,
            })
            .unwrap();
        let batch = match response {
            RpcResponse::Batch(batch) => batch,
            other => panic!("expected batch, got {other:?}"),
        };
        assert!(batch.last().unwrap().is_end());
    }

    /// The fetch primitive wired between two in-process routers.
    struct PeerSource {
        owner: Rc<RefCell<RequestRouter>>,
    }

    impl ObjectSource for PeerSource {
        fn pull(&mut self, id: &str, batch_size: usize) -> Result<Vec<RpcObjectData>> {
            self.owner.borrow_mut().get_object(id, Some(batch_size))
        }
    }

    #[test]
    fn test_visit_materializes_through_object_source() {
        let owner = Rc::new(RefCell::new(router()));
        let tree = pair(ident("old"), ident("keep"));
        let id = owner.borrow_mut().session_mut().add_local_object(tree);

        let mut worker = router();
        worker.register_visitor("rename", Arc::new(RenameVisitor));
        worker.set_object_source(Box::new(PeerSource {
            owner: Rc::clone(&owner),
        }));

        let response = worker
            .visit(
                "rename",
                Some(&json!({"from": "old", "to": "new"})),
                &id,
                None,
                None,
            )
            .unwrap();
        assert!(response.modified);

        // The worker fetched the owner's tree, transformed it, and now holds
        // the result as its own local object for the owner to fetch back.
        let result = worker.session().local_object(&id).unwrap();
        let renamed = result.as_node().unwrap().field("a");
        assert_eq!(
            renamed.as_node().unwrap().field("text"),
            Value::scalar("new")
        );

        // The owner's shadow of the worker advanced during the fetch.
        assert!(owner.borrow().session().remote_object(&id).is_some());
    }

    #[test]
    fn test_repeat_fetch_through_source_reuses_baseline() {
        let owner = Rc::new(RefCell::new(router()));
        let keep = ident("keep");
        let v1 = pair(keep.clone(), ident("old"));
        let id = owner.borrow_mut().session_mut().add_local_object(v1);

        let mut worker = router();
        worker.register_visitor("rename", Arc::new(RenameVisitor));
        worker.set_object_source(Box::new(PeerSource {
            owner: Rc::clone(&owner),
        }));

        // First materialization: full ADD stream.
        worker.visit("rename", None, &id, None, None).unwrap();
        let first = worker.session().remote_object(&id).unwrap().clone();

        // Owner edits one branch; the unchanged branch must come through as
        // the identical instance the worker already holds.
        let v2 = pair(keep, ident("newer"));
        owner.borrow_mut().session_mut().put_local_object(&id, v2);

        worker.visit("rename", None, &id, None, None).unwrap();
        let second = worker.session().remote_object(&id).unwrap().clone();

        let first_keep = first.as_node().unwrap().field("a");
        let second_keep = second.as_node().unwrap().field("a");
        assert!(first_keep.same_identity(&second_keep));
    }
}
