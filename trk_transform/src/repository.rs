use crate::error::{TransformError, TransformResult};
use crate::name::{FrameId, TransformName};
use crate::transform::Transform3D;
use log::{debug, warn};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, VisitMap, Visitable};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One named transform observation, as carried by a tracked frame.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedTransform {
    pub name: TransformName,
    pub matrix: Transform3D,
    pub valid: bool,
}

/// Anything that can feed the repository with a batch of named transforms.
pub trait NamedTransforms {
    fn named_transforms(&self) -> Vec<NamedTransform>;
}

impl NamedTransforms for [NamedTransform] {
    fn named_transforms(&self) -> Vec<NamedTransform> {
        self.to_vec()
    }
}

impl NamedTransforms for Vec<NamedTransform> {
    fn named_transforms(&self) -> Vec<NamedTransform> {
        self.clone()
    }
}

/// A persistent (calibration) transform as written in a configuration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateDefinition {
    pub from: FrameId,
    pub to: FrameId,
    pub matrix: Transform3D,
    #[serde(default)]
    pub error: Option<f64>,
}

impl CoordinateDefinition {
    pub fn name(&self) -> TransformName {
        TransformName::new(self.from.clone(), self.to.clone())
    }
}

/// Edge of the transform graph, stored by value.
#[derive(Clone, Copy, Debug, PartialEq)]
struct TransformEdge {
    /// Maps coordinates of the edge source frame into the edge target frame.
    matrix: Transform3D,
    valid: bool,
    persistent: bool,
    error: Option<f64>,
    /// Order of first insertion, used to break ties during path search.
    sequence: u64,
}

/// One step of a resolved path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathHop {
    /// Name of the stored edge.
    pub edge: TransformName,
    /// True when the edge is walked against its direction, ie its inverse is used.
    pub inverted: bool,
}

#[derive(Default)]
struct TransformGraph {
    graph: StableDiGraph<FrameId, TransformEdge>,
    frame_indices: HashMap<FrameId, NodeIndex>,
    next_sequence: u64,
}

impl TransformGraph {
    fn frame(&self, frame_id: &str) -> Option<NodeIndex> {
        self.frame_indices.get(frame_id).copied()
    }

    fn ensure_frame(&mut self, frame_id: &str) -> NodeIndex {
        if let Some(index) = self.frame(frame_id) {
            return index;
        }
        let frame_id = FrameId::from(frame_id);
        let index = self.graph.add_node(frame_id.clone());
        self.frame_indices.insert(frame_id, index);
        index
    }

    fn edge(&self, name: &TransformName) -> Option<EdgeIndex> {
        let from = self.frame(name.from_frame())?;
        let to = self.frame(name.to_frame())?;
        self.graph.find_edge(from, to)
    }

    fn edge_name(&self, edge: EdgeIndex) -> Option<TransformName> {
        let (source, target) = self.graph.edge_endpoints(edge)?;
        Some(TransformName::new(
            self.graph[source].clone(),
            self.graph[target].clone(),
        ))
    }

    /// Direct edge first, then the inverse one. The flag tells if the inverse edge was found.
    fn stored_edge(&self, name: &TransformName) -> Option<(EdgeIndex, bool)> {
        self.edge(name)
            .map(|edge| (edge, false))
            .or_else(|| self.edge(&name.inverse()).map(|edge| (edge, true)))
    }

    /// Neighbours of a frame reachable through any edge, in edge insertion order.
    fn neighbours(&self, node: NodeIndex) -> Vec<(NodeIndex, EdgeIndex, bool)> {
        let mut neighbours: Vec<(u64, NodeIndex, EdgeIndex, bool)> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.weight().sequence, edge.target(), edge.id(), false))
            .chain(
                self.graph
                    .edges_directed(node, Direction::Incoming)
                    .map(|edge| {
                        let neighbour = if edge.source() == node {
                            edge.target()
                        } else {
                            edge.source()
                        };
                        (edge.weight().sequence, neighbour, edge.id(), true)
                    }),
            )
            .collect();
        neighbours.sort_by_key(|(sequence, ..)| *sequence);
        neighbours
            .into_iter()
            .map(|(_, neighbour, edge, inverted)| (neighbour, edge, inverted))
            .collect()
    }

    /// Breadth first search over the graph seen as undirected.
    fn search(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<(EdgeIndex, bool)>> {
        let mut visited = self.graph.visit_map();
        let mut parents: HashMap<NodeIndex, (NodeIndex, EdgeIndex, bool)> = HashMap::new();
        let mut queue = VecDeque::from([from]);
        visited.visit(from);

        while let Some(node) = queue.pop_front() {
            if node == to {
                break;
            }
            for (neighbour, edge, inverted) in self.neighbours(node) {
                if visited.visit(neighbour) {
                    parents.insert(neighbour, (node, edge, inverted));
                    queue.push_back(neighbour);
                }
            }
        }

        if !visited.is_visited(&to) {
            return None;
        }

        let mut hops = Vec::new();
        let mut current = to;
        while current != from {
            let (parent, edge, inverted) = parents.get(&current)?;
            hops.push((*edge, *inverted));
            current = *parent;
        }
        hops.reverse();
        Some(hops)
    }

    fn connected(&self, from: NodeIndex, to: NodeIndex) -> bool {
        from == to || self.search(from, to).is_some()
    }

    fn upsert(
        &mut self,
        name: &TransformName,
        matrix: Transform3D,
        valid: bool,
        persistent: bool,
        error: Option<f64>,
    ) -> TransformResult<()> {
        if !name.is_valid() || name.is_identity() {
            return Err(TransformError::InvalidTransformName(name.to_string()));
        }

        if let Some((edge, inverted)) = self.stored_edge(name) {
            let weight = &mut self.graph[edge];
            if weight.persistent && !persistent {
                return Err(TransformError::PersistentTransformOverwrite(
                    name.to_string(),
                ));
            }
            let matrix = if inverted {
                matrix
                    .try_inverse()
                    .ok_or_else(|| TransformError::SingularMatrix(name.to_string()))?
            } else {
                matrix
            };
            weight.matrix = matrix;
            weight.valid = valid;
            weight.persistent = persistent;
            if persistent || error.is_some() {
                weight.error = error;
            }
            return Ok(());
        }

        if let (Some(from), Some(to)) = (self.frame(name.from_frame()), self.frame(name.to_frame()))
        {
            if self.connected(from, to) {
                return Err(TransformError::CyclicTransformGraph(name.to_string()));
            }
        }

        let from = self.ensure_frame(name.from_frame());
        let to = self.ensure_frame(name.to_frame());
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.graph.add_edge(
            from,
            to,
            TransformEdge {
                matrix,
                valid,
                persistent,
                error,
                sequence,
            },
        );
        Ok(())
    }

    fn resolve(&self, name: &TransformName) -> TransformResult<(Transform3D, bool)> {
        if name.is_identity() {
            return Ok((Transform3D::IDENTITY, true));
        }

        let no_path = || TransformError::NoPathFound {
            from: name.from_frame().to_string(),
            to: name.to_frame().to_string(),
        };

        if let Some(edge) = self.edge(name) {
            let weight = &self.graph[edge];
            return Ok((weight.matrix, weight.valid));
        }

        if let Some(edge) = self.edge(&name.inverse()) {
            let weight = &self.graph[edge];
            let inverse = weight
                .matrix
                .try_inverse()
                .ok_or_else(|| TransformError::SingularMatrix(name.inverse().to_string()))?;
            return Ok((inverse, weight.valid));
        }

        let from = self.frame(name.from_frame()).ok_or_else(no_path)?;
        let to = self.frame(name.to_frame()).ok_or_else(no_path)?;
        let hops = self.search(from, to).ok_or_else(no_path)?;

        let mut result = Transform3D::IDENTITY;
        let mut valid = true;
        for (edge, inverted) in hops {
            let weight = &self.graph[edge];
            // the right-most transform is applied first
            let step = if inverted {
                weight.matrix.try_inverse().ok_or_else(|| {
                    TransformError::SingularMatrix(
                        self.edge_name(edge)
                            .map(|n| n.to_string())
                            .unwrap_or_default(),
                    )
                })?
            } else {
                weight.matrix
            };
            result = step * result;
            valid &= weight.valid;
        }
        debug!("Computed {name} through the transform graph, valid: {valid}");
        Ok((result, valid))
    }

    fn edges_in_insertion_order(&self) -> Vec<(TransformName, TransformEdge)> {
        let mut edges: Vec<(TransformName, TransformEdge)> = self
            .graph
            .edge_indices()
            .filter_map(|edge| Some((self.edge_name(edge)?, self.graph[edge])))
            .collect();
        edges.sort_by_key(|(_, edge)| edge.sequence);
        edges
    }
}

/// Graph of named coordinate frames, resolving transforms between any two connected frames.
///
/// Each edge holds the latest observation of one transform: updates replace edges, they never
/// accumulate history. Queries walk the graph in both directions, inverting edges as needed.
/// The graph is kept free of cycles so a path between two frames is always unique.
///
/// Mutations take an exclusive lock, queries a shared one, so a query never sees a half
/// applied update.
#[derive(Default)]
pub struct TransformRepository {
    inner: RwLock<TransformGraph>,
}

impl TransformRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, TransformGraph> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TransformGraph> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Upserts every named transform of a tracked frame.
    ///
    /// All entries are attempted; if some were rejected the first rejection is returned once the
    /// others have been applied.
    pub fn set_transforms<F>(&self, frame: &F) -> TransformResult<()>
    where
        F: NamedTransforms + ?Sized,
    {
        let transforms = frame.named_transforms();
        let mut graph = self.write();
        let mut first_error = None;
        for transform in transforms {
            if let Err(e) = graph.upsert(
                &transform.name,
                transform.matrix,
                transform.valid,
                false,
                None,
            ) {
                warn!("Rejected transform {}: {e}", transform.name);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Upserts one transform. When only the inverse is stored, it is updated with the inverted
    /// matrix so there is a single edge per frame pair.
    pub fn set_transform(
        &self,
        name: &TransformName,
        matrix: Transform3D,
        valid: bool,
    ) -> TransformResult<()> {
        self.write().upsert(name, matrix, valid, false, None)
    }

    /// Sets a calibration transform: always valid and never overwritten by tracked frames.
    pub fn set_persistent_transform(
        &self,
        name: &TransformName,
        matrix: Transform3D,
        error: Option<f64>,
    ) -> TransformResult<()> {
        self.write().upsert(name, matrix, true, true, error)
    }

    /// Resolves `name.from -> name.to` and returns the matrix with its validity.
    ///
    /// A direct edge is returned as is, an inverse edge inverted; otherwise the matrices along
    /// the shortest path are composed and the validity is the conjunction over the path.
    pub fn get_transform(&self, name: &TransformName) -> TransformResult<(Transform3D, bool)> {
        self.read().resolve(name)
    }

    /// The hops used to compute `name`. Empty for an identity.
    pub fn find_path(&self, name: &TransformName) -> TransformResult<Vec<PathHop>> {
        if name.is_identity() {
            return Ok(Vec::new());
        }
        let graph = self.read();
        let no_path = || TransformError::NoPathFound {
            from: name.from_frame().to_string(),
            to: name.to_frame().to_string(),
        };
        let from = graph.frame(name.from_frame()).ok_or_else(no_path)?;
        let to = graph.frame(name.to_frame()).ok_or_else(no_path)?;
        let hops = graph.search(from, to).ok_or_else(no_path)?;
        hops.into_iter()
            .map(|(edge, inverted)| {
                let edge = graph
                    .edge_name(edge)
                    .ok_or_else(|| TransformError::TransformNotFound(name.to_string()))?;
                Ok(PathHop { edge, inverted })
            })
            .collect()
    }

    /// True if the transform is stored or can be computed.
    pub fn is_existing_transform(&self, name: &TransformName) -> bool {
        if name.is_identity() {
            return true;
        }
        let graph = self.read();
        match (graph.frame(name.from_frame()), graph.frame(name.to_frame())) {
            (Some(from), Some(to)) => graph.connected(from, to),
            _ => false,
        }
    }

    pub fn set_transform_valid(&self, name: &TransformName, valid: bool) -> TransformResult<()> {
        let mut graph = self.write();
        let (edge, _) = graph
            .stored_edge(name)
            .ok_or_else(|| TransformError::TransformNotFound(name.to_string()))?;
        graph.graph[edge].valid = valid;
        Ok(())
    }

    pub fn set_transform_error(&self, name: &TransformName, error: f64) -> TransformResult<()> {
        let mut graph = self.write();
        let (edge, _) = graph
            .stored_edge(name)
            .ok_or_else(|| TransformError::TransformNotFound(name.to_string()))?;
        graph.graph[edge].error = Some(error);
        Ok(())
    }

    pub fn get_transform_error(&self, name: &TransformName) -> TransformResult<Option<f64>> {
        let graph = self.read();
        let (edge, _) = graph
            .stored_edge(name)
            .ok_or_else(|| TransformError::TransformNotFound(name.to_string()))?;
        Ok(graph.graph[edge].error)
    }

    pub fn is_persistent(&self, name: &TransformName) -> TransformResult<bool> {
        let graph = self.read();
        let (edge, _) = graph
            .stored_edge(name)
            .ok_or_else(|| TransformError::TransformNotFound(name.to_string()))?;
        Ok(graph.graph[edge].persistent)
    }

    /// Removes a stored edge (or its inverse). Frames stay known.
    pub fn remove_transform(&self, name: &TransformName) -> TransformResult<()> {
        let mut graph = self.write();
        let (edge, _) = graph
            .stored_edge(name)
            .ok_or_else(|| TransformError::TransformNotFound(name.to_string()))?;
        graph.graph.remove_edge(edge);
        Ok(())
    }

    /// Names of the stored edges in insertion order.
    pub fn transform_names(&self) -> Vec<TransformName> {
        self.read()
            .edges_in_insertion_order()
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    pub fn clear(&self) {
        *self.write() = TransformGraph::default();
    }

    /// Loads calibration transforms.
    pub fn read_configuration(&self, definitions: &[CoordinateDefinition]) -> TransformResult<()> {
        let mut graph = self.write();
        for definition in definitions {
            graph.upsert(
                &definition.name(),
                definition.matrix,
                true,
                true,
                definition.error,
            )?;
        }
        Ok(())
    }

    /// The persistent transforms, ready to be written back to a configuration.
    pub fn coordinate_definitions(&self) -> Vec<CoordinateDefinition> {
        self.read()
            .edges_in_insertion_order()
            .into_iter()
            .filter(|(_, edge)| edge.persistent)
            .map(|(name, edge)| CoordinateDefinition {
                from: name.from_frame().into(),
                to: name.to_frame().into(),
                matrix: edge.matrix,
                error: edge.error,
            })
            .collect()
    }
}
