use pixeldoc_core::undo::Editable;

use crate::graph::{ObjectGraph, ObjectId, PixelFormat, Rect};
use crate::notify::{Change, DocId, NotificationBus};
use crate::suspend::SuspendedObjectStore;

/// Editing position kept next to the content. Changing it never takes the
/// document out of its saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocView {
    pub frame: u32,
    pub layer: ObjectId,
    pub selection: Option<Rect>,
}

/// Everything a document command touches.
///
/// The fields are public so commands can borrow them separately (detach
/// from the graph while the bus brackets the removal).
#[derive(Debug)]
pub struct DocContext {
    pub graph: ObjectGraph,
    pub bus: NotificationBus,
    pub store: SuspendedObjectStore,
    pub view: DocView,
}

impl Editable for DocContext {}

impl DocContext {
    pub fn new(doc: DocId, width: u32, height: u32, format: PixelFormat) -> Self {
        let graph = ObjectGraph::new(width, height, format);
        let view = DocView {
            frame: 0,
            layer: graph.layers().first().copied().unwrap_or(ObjectId::NULL),
            selection: None,
        };
        Self {
            graph,
            bus: NotificationBus::new(doc),
            store: SuspendedObjectStore::new(),
            view,
        }
    }

    /// Delivers `change` to the document's observers.
    pub fn notify(&mut self, change: Change) {
        self.bus.notify(&self.graph, change);
    }
}
