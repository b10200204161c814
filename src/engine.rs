//! Engine API surface
//!
//! The `Engine` is the embedding boundary: hosts register node types, load
//! graphs into sessions, push edits and time ticks, and either evaluate
//! synchronously or subscribe to debounced results. Each loaded graph is an
//! independent session with its own cache, clock, and debounce timer;
//! sessions share one registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::cache::{CacheStatistics, ResultCache};
use crate::descriptor::NodeTypeDescriptor;
use crate::error::{DescriptorError, GraphError};
use crate::evaluator::{has_time_consumer, EvaluationResult, Evaluator};
use crate::graph::{Graph, GraphData, GraphEdit, NodeId};
use crate::registry::NodeRegistry;
use crate::scheduler::{DebounceScheduler, SchedulerConfig};

/// Opaque identifier for a loaded graph session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphHandle(u64);

type ResultCallback = Box<dyn Fn(&EvaluationResult) + Send + 'static>;

struct SessionState {
    graph: Graph,
    cache: ResultCache,
    time: f64,
}

struct SessionShared {
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<ResultCallback>>,
}

impl SessionShared {
    /// Run one pass over the session's current state.
    fn evaluate(&self, registry: &NodeRegistry) -> EvaluationResult {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        Evaluator::new(&state.graph, registry, &mut state.cache, state.time).run()
    }

    fn notify(&self, result: &EvaluationResult) {
        for listener in self.listeners.lock().iter() {
            listener(result);
        }
    }
}

struct Session {
    shared: Arc<SessionShared>,
    scheduler: DebounceScheduler,
}

/// The node-graph engine.
pub struct Engine {
    registry: Arc<NodeRegistry>,
    config: SchedulerConfig,
    sessions: Mutex<HashMap<u64, Session>>,
    next_handle: AtomicU64,
}

impl Engine {
    /// An engine with the default settle windows and the built-in node
    /// catalog already registered.
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let registry = Arc::new(NodeRegistry::new());
        // The built-in catalog is statically known to validate.
        if let Err(err) = crate::builtins::register_all(&registry) {
            unreachable!("built-in catalog failed to register: {}", err);
        }
        Self {
            registry,
            config,
            sessions: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Register a dynamic node type. Re-registering a name hot-swaps the
    /// body; existing instances use it on their next pass.
    pub fn register_node_type(&self, descriptor: NodeTypeDescriptor) -> Result<(), DescriptorError> {
        self.registry.register(descriptor)
    }

    /// Register a dynamic node type from its JSON descriptor.
    pub fn register_node_type_json(&self, json: &str) -> Result<(), DescriptorError> {
        let descriptor: NodeTypeDescriptor = serde_json::from_str(json)
            .map_err(|e| DescriptorError::Malformed(e.to_string()))?;
        self.registry.register(descriptor)
    }

    /// Load a graph into a new session.
    pub fn load_graph(&self, data: GraphData) -> Result<GraphHandle, GraphError> {
        let graph = Graph::from_data(data, &self.registry)?;
        let handle = GraphHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState {
                graph,
                cache: ResultCache::new(),
                time: 0.0,
            }),
            listeners: Mutex::new(Vec::new()),
        });
        let scheduler = {
            let shared = shared.clone();
            let registry = self.registry.clone();
            DebounceScheduler::new(move || {
                let result = shared.evaluate(&registry);
                shared.notify(&result);
            })
        };

        info!("loaded graph session {:?}", handle);
        self.sessions
            .lock()
            .insert(handle.0, Session { shared, scheduler });
        Ok(handle)
    }

    /// Load a graph from its JSON persistence format.
    pub fn load_graph_json(&self, json: &str) -> Result<GraphHandle, GraphError> {
        let data: GraphData =
            serde_json::from_str(json).map_err(|e| GraphError::Malformed(e.to_string()))?;
        self.load_graph(data)
    }

    /// Drop a session, stopping its debounce timer.
    pub fn unload_graph(&self, handle: GraphHandle) -> Result<(), GraphError> {
        self.sessions
            .lock()
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(GraphError::UnknownHandle)
    }

    /// Apply one structural edit and arm the edit debounce. The edit is
    /// validated synchronously; a rejected edit changes nothing and does
    /// not schedule a pass.
    pub fn apply_edit(&self, handle: GraphHandle, edit: GraphEdit) -> Result<(), GraphError> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&handle.0).ok_or(GraphError::UnknownHandle)?;

        let removed: Option<NodeId> = match &edit {
            GraphEdit::RemoveNode { id } => Some(id.clone()),
            _ => None,
        };

        {
            let mut state = session.shared.state.lock();
            state.graph.apply_edit(edit, &self.registry)?;
            if let Some(id) = removed {
                state.cache.invalidate(&id);
            }
        }
        debug!("edit applied on {:?}, arming debounce", handle);
        session.scheduler.request(self.config.edit_settle);
        Ok(())
    }

    /// Advance the session clock. Only schedules a pass when the graph
    /// actually consumes time; a static graph ignores ticks entirely.
    pub fn tick(&self, handle: GraphHandle, time: f64) -> Result<(), GraphError> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&handle.0).ok_or(GraphError::UnknownHandle)?;

        let consumes_time = {
            let mut state = session.shared.state.lock();
            state.time = time;
            has_time_consumer(&state.graph)
        };
        if consumes_time {
            session.scheduler.request(self.config.time_settle);
        }
        Ok(())
    }

    /// Evaluate the session synchronously, bypassing the debounce.
    pub fn evaluate(&self, handle: GraphHandle) -> Result<EvaluationResult, GraphError> {
        let shared = {
            let sessions = self.sessions.lock();
            sessions
                .get(&handle.0)
                .ok_or(GraphError::UnknownHandle)?
                .shared
                .clone()
        };
        Ok(shared.evaluate(&self.registry))
    }

    /// Subscribe to results produced by debounced passes. Callbacks run on
    /// the session's timer thread.
    pub fn on_result<F>(&self, handle: GraphHandle, callback: F) -> Result<(), GraphError>
    where
        F: Fn(&EvaluationResult) + Send + 'static,
    {
        let sessions = self.sessions.lock();
        let session = sessions.get(&handle.0).ok_or(GraphError::UnknownHandle)?;
        session.shared.listeners.lock().push(Box::new(callback));
        Ok(())
    }

    /// Serialize a session's current graph.
    pub fn graph_data(&self, handle: GraphHandle) -> Result<GraphData, GraphError> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&handle.0).ok_or(GraphError::UnknownHandle)?;
        let state = session.shared.state.lock();
        Ok(state.graph.to_data())
    }

    pub fn cache_statistics(&self, handle: GraphHandle) -> Result<CacheStatistics, GraphError> {
        let sessions = self.sessions.lock();
        let session = sessions.get(&handle.0).ok_or(GraphError::UnknownHandle)?;
        let state = session.shared.state.lock();
        Ok(state.cache.statistics())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
