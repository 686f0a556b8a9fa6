mod bubbles;
mod fragments;
mod segment_graph;

pub use bubbles::{EventType, SpliceEvent};
pub use fragments::Fragment;
pub use segment_graph::{EdgeId, NodeId, SegmentEdge, SegmentGraph, SegmentNode};
