//! Typed media graph.
//!
//! The graph is built by [`build_graph`] and serialized separately by
//! [`emit`]. Nodes live in a vector in definition order and refer to earlier
//! nodes through [`StreamRef`] handles. A handle is only ever issued for a
//! node that has already been pushed, so every edge points backwards and the
//! vector order is a valid topological order.

mod builder;
pub mod emit;

pub use builder::{build_graph, per_photo_duration, GraphSpec};
pub use emit::{encode_command, escape_drawtext, to_filter_complex};

/// Handle to a node's output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamRef(usize);

impl StreamRef {
    /// Position of the node in definition order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What an encoder input carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Photo(usize),
    Voice,
    Music,
    Accent,
}

/// Where an encoder input comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    /// File path or URL
    Media(String),
    /// lavfi generator expression limited to a duration
    Lavfi { expr: String, duration_sec: f64 },
}

/// One encoder input, in `-i` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub role: InputRole,
    pub source: InputSource,
}

/// Single-stream transforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Fill-crop to the canvas then zoom from 1.0 toward the cap over `frames`
    KenBurns { frames: u32 },
    /// Fill-crop to the canvas only
    FillCrop,
}

/// Static text drawn over the final video. Empty text is a passthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextOverlay {
    pub text: String,
}

impl TextOverlay {
    pub fn is_passthrough(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An encoder input, referenced as `[n]`
    Source { input: usize },
    Transform(Transform),
    /// Time-weighted cross-fade of two video streams
    Blend,
    /// Hard concatenation of video streams
    Concat,
    Overlay(TextOverlay),
    /// Voice and music mixed, duration follows the voice
    AudioMix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    label: Option<String>,
    kind: NodeKind,
    inputs: Vec<StreamRef>,
}

impl Node {
    /// Output label; `None` for source nodes.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[StreamRef] {
        &self.inputs
    }
}

/// Output of the builder: inputs, nodes in topological order, and the two
/// terminal streams bound into the muxed file.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaGraph {
    inputs: Vec<Input>,
    nodes: Vec<Node>,
    video_out: StreamRef,
    audio_out: StreamRef,
    per_photo_duration: f64,
    duration_sec: u32,
}

impl MediaGraph {
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, stream: StreamRef) -> &Node {
        &self.nodes[stream.0]
    }

    pub fn video_output(&self) -> StreamRef {
        self.video_out
    }

    pub fn audio_output(&self) -> StreamRef {
        self.audio_out
    }

    /// Seconds each photo is on screen.
    pub fn per_photo_duration(&self) -> f64 {
        self.per_photo_duration
    }

    /// Target duration in seconds.
    pub fn duration_sec(&self) -> u32 {
        self.duration_sec
    }

    /// Number of nodes matching `pred`.
    pub fn count(&self, pred: impl Fn(&NodeKind) -> bool) -> usize {
        self.nodes.iter().filter(|n| pred(&n.kind)).count()
    }

    pub fn blend_count(&self) -> usize {
        self.count(|k| matches!(k, NodeKind::Blend))
    }

    pub fn concat_count(&self) -> usize {
        self.count(|k| matches!(k, NodeKind::Concat))
    }

    /// Node with the given output label.
    pub fn find(&self, label: &str) -> Option<StreamRef> {
        self.nodes
            .iter()
            .position(|n| n.label.as_deref() == Some(label))
            .map(StreamRef)
    }
}

/// Append-only node arena; the only place [`StreamRef`]s are created.
#[derive(Debug, Default)]
pub(crate) struct GraphArena {
    inputs: Vec<Input>,
    nodes: Vec<Node>,
}

impl GraphArena {
    /// Register an encoder input and its source node.
    pub(crate) fn source(&mut self, role: InputRole, source: InputSource) -> StreamRef {
        let input = self.inputs.len();
        self.inputs.push(Input { role, source });
        self.push(None, NodeKind::Source { input }, Vec::new())
    }

    pub(crate) fn filter(&mut self, label: impl Into<String>, kind: NodeKind, inputs: Vec<StreamRef>) -> StreamRef {
        self.push(Some(label.into()), kind, inputs)
    }

    fn push(&mut self, label: Option<String>, kind: NodeKind, inputs: Vec<StreamRef>) -> StreamRef {
        let id = StreamRef(self.nodes.len());
        debug_assert!(inputs.iter().all(|r| r.0 < id.0));
        self.nodes.push(Node { label, kind, inputs });
        id
    }

    pub(crate) fn finish(
        self,
        video_out: StreamRef,
        audio_out: StreamRef,
        per_photo_duration: f64,
        duration_sec: u32,
    ) -> MediaGraph {
        MediaGraph {
            inputs: self.inputs,
            nodes: self.nodes,
            video_out,
            audio_out,
            per_photo_duration,
            duration_sec,
        }
    }
}
