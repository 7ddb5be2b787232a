//! Collaborator traits implemented by the view layer.
//!
//! The reconciler never builds views itself. It tracks what each decorator
//! needs and hands the work to a `DecoratorHost` when the caller drives it.

use crate::decorator::ViewId;
use crate::node::{DecoratorNode, NodeKey};

/// View-layer operations for decorator nodes.
pub trait DecoratorHost {
    /// Build a view for a decorator that has none yet.
    fn create_view(&mut self, key: &NodeKey, decorator: &DecoratorNode) -> ViewId;

    /// Place (and attach) a view at a flat text position.
    fn reposition(&mut self, key: &NodeKey, view: ViewId, position: usize);

    /// Refresh a view after its decorator's content changed.
    fn redecorate(&mut self, key: &NodeKey, view: ViewId, decorator: &DecoratorNode);

    /// Tear down the view of a decorator that left the document.
    fn destroy(&mut self, key: &NodeKey, view: ViewId);
}

/// Host that records every call. Useful in tests and headless setups.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    next_view: u64,
    pub calls: Vec<HostCall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create(NodeKey, ViewId),
    Reposition(NodeKey, ViewId, usize),
    Redecorate(NodeKey, ViewId),
    Destroy(NodeKey, ViewId),
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&mut self) -> Vec<HostCall> {
        std::mem::take(&mut self.calls)
    }
}

impl DecoratorHost for RecordingHost {
    fn create_view(&mut self, key: &NodeKey, _decorator: &DecoratorNode) -> ViewId {
        self.next_view += 1;
        let view = ViewId(self.next_view);
        self.calls.push(HostCall::Create(key.clone(), view));
        view
    }

    fn reposition(&mut self, key: &NodeKey, view: ViewId, position: usize) {
        self.calls
            .push(HostCall::Reposition(key.clone(), view, position));
    }

    fn redecorate(&mut self, key: &NodeKey, view: ViewId, _decorator: &DecoratorNode) {
        self.calls.push(HostCall::Redecorate(key.clone(), view));
    }

    fn destroy(&mut self, key: &NodeKey, view: ViewId) {
        self.calls.push(HostCall::Destroy(key.clone(), view));
    }
}
