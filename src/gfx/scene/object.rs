//! Scene-graph nodes
//!
//! [`Object3D`] is a shared handle to one node of the scene tree. Cloning the
//! handle does not copy the node; two handles compare equal when they refer
//! to the same node. A parent owns its children through its child list, while
//! the child keeps only a weak back-reference used for detachment and for
//! composing world transforms.
//!
//! Tree shape is enforced on every mutation: a node has at most one parent
//! (re-parenting detaches it from the old one first) and a node can never be
//! added below itself.

use std::{
    cell::RefCell,
    fmt,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use cgmath::{InnerSpace, Matrix, Matrix4};

use crate::{
    error::{Result, TartanError},
    gfx::{camera::perspective::CameraState, geometry::Geometry, material::Material},
    math::{self, vec3, Vector3},
};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a scene node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Geometry and material carried by a drawable node
#[derive(Debug, Clone)]
pub struct Renderable {
    pub geometry: Geometry,
    pub material: Material,
}

/// What a node is, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Scene,
    Group,
    Points,
    Line,
    Mesh,
    PerspectiveCamera,
}

impl NodeType {
    /// Whether nodes of this type produce draw calls
    pub fn is_renderable(self) -> bool {
        matches!(self, NodeType::Points | NodeType::Line | NodeType::Mesh)
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Scene,
    Group,
    Points(Renderable),
    Line(Renderable),
    Mesh(Renderable),
    PerspectiveCamera(CameraState),
}

impl NodeKind {
    fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Scene => NodeType::Scene,
            NodeKind::Group => NodeType::Group,
            NodeKind::Points(_) => NodeType::Points,
            NodeKind::Line(_) => NodeType::Line,
            NodeKind::Mesh(_) => NodeType::Mesh,
            NodeKind::PerspectiveCamera(_) => NodeType::PerspectiveCamera,
        }
    }
}

pub(crate) struct Node {
    id: NodeId,
    name: String,
    kind: NodeKind,
    position: Vector3,
    rotation: Vector3,
    up: Vector3,
    visible: bool,
    children: Vec<Object3D>,
    parent: Weak<RefCell<Node>>,
}

/// Shared handle to a node in the scene tree
#[derive(Clone)]
pub struct Object3D(Rc<RefCell<Node>>);

impl Object3D {
    pub(crate) fn from_kind(kind: NodeKind) -> Self {
        let id = NodeId::next();
        log::trace!("Created {:?} node {:?}", kind.node_type(), id);
        Self(Rc::new(RefCell::new(Node {
            id,
            name: String::new(),
            kind,
            position: vec3(0.0, 0.0, 0.0),
            rotation: vec3(0.0, 0.0, 0.0),
            up: vec3(0.0, 1.0, 0.0),
            visible: true,
            children: Vec::new(),
            parent: Weak::new(),
        })))
    }

    pub(crate) fn with_kind<R>(&self, f: impl FnOnce(&NodeKind) -> R) -> R {
        f(&self.0.borrow().kind)
    }

    pub(crate) fn with_kind_mut<R>(&self, f: impl FnOnce(&mut NodeKind) -> R) -> R {
        f(&mut self.0.borrow_mut().kind)
    }

    pub fn id(&self) -> NodeId {
        self.0.borrow().id
    }

    pub fn node_type(&self) -> NodeType {
        self.0.borrow().kind.node_type()
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.0.borrow_mut().name = name.into();
    }

    pub fn is_visible(&self) -> bool {
        self.0.borrow().visible
    }

    /// Hidden nodes are skipped by the renderer together with their subtree
    pub fn set_visible(&self, visible: bool) {
        self.0.borrow_mut().visible = visible;
    }

    pub fn position(&self) -> Vector3 {
        self.0.borrow().position
    }

    /// XYZ Euler angles in radians
    pub fn rotation(&self) -> Vector3 {
        self.0.borrow().rotation
    }

    pub fn up(&self) -> Vector3 {
        self.0.borrow().up
    }

    /// Overwrites the local position
    pub fn set_position(&self, x: f32, y: f32, z: f32) {
        self.0.borrow_mut().position = vec3(x, y, z);
    }

    /// Overwrites the local rotation (XYZ Euler angles, radians)
    pub fn set_rotation(&self, x: f32, y: f32, z: f32) {
        self.0.borrow_mut().rotation = vec3(x, y, z);
    }

    /// Sets the up direction used by [`look_at`](Object3D::look_at)
    pub fn set_up(&self, x: f32, y: f32, z: f32) {
        self.0.borrow_mut().up = vec3(x, y, z);
    }

    /// Rotates the node so its forward axis points at a world-space target
    ///
    /// Cameras point their local -Z axis at the target; every other node
    /// points local +Z at it. The parent's world rotation is factored out so
    /// the result is correct for nested nodes. When the target coincides
    /// with the node's world position the rotation is left unchanged.
    pub fn look_at(&self, x: f32, y: f32, z: f32) {
        let target = vec3(x, y, z);
        let eye = self.world_position();

        if (target - eye).magnitude2() == 0.0 {
            log::debug!(
                "look_at target equals position of node {:?}; rotation unchanged",
                self.id()
            );
            return;
        }

        let up = self.up();
        let basis = if self.node_type() == NodeType::PerspectiveCamera {
            math::look_at_basis(eye, target, up)
        } else {
            math::look_at_basis(target, eye, up)
        };

        let local = match self.parent() {
            // Orthonormal, so the transpose is the inverse
            Some(parent) => math::rotation_part(&parent.world_matrix()).transpose() * basis,
            None => basis,
        };

        self.0.borrow_mut().rotation = math::euler_from_rotation(&local);
    }

    /// Appends `child` to this node's children
    ///
    /// A child that already has a parent is detached from it first. Adding a
    /// child that is already here moves it to the end of the list.
    ///
    /// # Errors
    /// `InvariantViolation` if `child` is this node or one of its ancestors;
    /// nothing is modified in that case.
    pub fn add_child(&self, child: &Object3D) -> Result<()> {
        if self == child {
            return Err(TartanError::InvariantViolation(format!(
                "node {:?} cannot be added to itself",
                self.id()
            )));
        }
        if child.is_ancestor_of(self) {
            return Err(TartanError::InvariantViolation(format!(
                "adding node {:?} below node {:?} would create a cycle",
                child.id(),
                self.id()
            )));
        }

        child.remove_from_parent();
        child.0.borrow_mut().parent = Rc::downgrade(&self.0);
        self.0.borrow_mut().children.push(child.clone());

        log::trace!("Attached node {:?} to {:?}", child.id(), self.id());
        Ok(())
    }

    /// Detaches `child` if it is a direct child of this node
    pub fn remove_child(&self, child: &Object3D) -> bool {
        let removed = {
            let mut node = self.0.borrow_mut();
            match node.children.iter().position(|c| c == child) {
                Some(index) => {
                    node.children.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            child.0.borrow_mut().parent = Weak::new();
        }
        removed
    }

    /// Detaches this node from its parent, if any
    pub fn remove_from_parent(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.remove_child(self),
            None => false,
        }
    }

    /// Detaches every child of this node
    pub fn clear_children(&self) {
        let children = std::mem::take(&mut self.0.borrow_mut().children);
        for child in children {
            child.0.borrow_mut().parent = Weak::new();
        }
    }

    /// Snapshot of the child list, in order
    pub fn children(&self) -> Vec<Object3D> {
        self.0.borrow().children.clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    pub fn parent(&self) -> Option<Object3D> {
        self.0.borrow().parent.upgrade().map(Object3D)
    }

    /// Whether this node is a strict ancestor of `other`
    pub fn is_ancestor_of(&self, other: &Object3D) -> bool {
        let mut current = other.parent();
        while let Some(node) = current {
            if node == *self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// `T(position) * R(rotation)`
    pub fn local_matrix(&self) -> Matrix4<f32> {
        let node = self.0.borrow();
        math::compose_transform(node.position, node.rotation)
    }

    /// Local matrix composed with every ancestor's
    pub fn world_matrix(&self) -> Matrix4<f32> {
        let local = self.local_matrix();
        match self.parent() {
            Some(parent) => parent.world_matrix() * local,
            None => local,
        }
    }

    pub fn world_position(&self) -> Vector3 {
        self.world_matrix().w.truncate()
    }

    /// Visits this node and its descendants depth-first, parents before children
    ///
    /// The child list is snapshotted per node, so `f` may restructure the tree.
    pub fn traverse(&self, f: &mut impl FnMut(&Object3D)) {
        f(self);
        for child in self.children() {
            child.traverse(f);
        }
    }

    /// First node in the subtree (this node included) with the given name
    pub fn find_by_name(&self, name: &str) -> Option<Object3D> {
        if self.0.borrow().name == name {
            return Some(self.clone());
        }
        self.children()
            .iter()
            .find_map(|child| child.find_by_name(name))
    }

    /// Geometry and material for Points, Line and Mesh nodes
    pub fn renderable(&self) -> Option<Renderable> {
        match &self.0.borrow().kind {
            NodeKind::Points(r) | NodeKind::Line(r) | NodeKind::Mesh(r) => Some(r.clone()),
            _ => None,
        }
    }
}

impl PartialEq for Object3D {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Object3D {}

impl AsRef<Object3D> for Object3D {
    fn as_ref(&self) -> &Object3D {
        self
    }
}

impl fmt::Debug for Object3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.0.borrow();
        f.debug_struct("Object3D")
            .field("id", &node.id)
            .field("type", &node.kind.node_type())
            .field("name", &node.name)
            .field("children", &node.children.len())
            .finish()
    }
}
