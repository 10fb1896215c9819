//! Buffer attributes and attribute-keyed geometry
//!
//! A [`BufferAttribute`] is a flat `f32` array read in strides of `item_size`.
//! Changing its data and asking for a re-upload are separate steps: call
//! [`BufferAttribute::set_array`] as often as needed, then
//! [`BufferAttribute::set_needs_update`] once. The renderer uploads an
//! attribute the first time it sees it and afterwards only while the flag is
//! set, clearing the flag after a successful upload.

use std::{
    cell::{Ref, RefCell},
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    error::{Result, TartanError},
    math::{vec3, Vector3},
};

static NEXT_ATTRIBUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a buffer attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeId(pub u64);

impl AttributeId {
    fn next() -> Self {
        AttributeId(NEXT_ATTRIBUTE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct AttributeData {
    id: AttributeId,
    array: Vec<f32>,
    item_size: usize,
    dynamic: bool,
    needs_update: bool,
    version: u64,
}

/// Shared handle to a strided `f32` vertex buffer
///
/// Clones refer to the same buffer, so an application can keep a handle and
/// rewrite the data after the attribute has been added to a geometry.
#[derive(Debug, Clone)]
pub struct BufferAttribute(Rc<RefCell<AttributeData>>);

impl BufferAttribute {
    /// Creates a 32-bit float attribute
    ///
    /// Every attribute created this way is marked `dynamic`, since the
    /// facade assumes its contents will be rewritten after creation.
    ///
    /// # Errors
    /// `InvalidArgument` if `item_size` is zero or the array length is not a
    /// multiple of it.
    pub fn float32(array: impl Into<Vec<f32>>, item_size: usize) -> Result<Self> {
        let array = array.into();
        validate_layout(array.len(), item_size)?;

        let id = AttributeId::next();
        log::trace!(
            "Created attribute {:?}: {} floats, item size {}",
            id,
            array.len(),
            item_size
        );

        Ok(Self(Rc::new(RefCell::new(AttributeData {
            id,
            array,
            item_size,
            dynamic: true,
            needs_update: false,
            version: 0,
        }))))
    }

    /// Replaces the whole backing array
    ///
    /// Does not request a re-upload; pair with [`set_needs_update`].
    ///
    /// [`set_needs_update`]: BufferAttribute::set_needs_update
    pub fn set_array(&self, array: impl Into<Vec<f32>>) -> Result<()> {
        let array = array.into();
        let mut data = self.0.borrow_mut();
        validate_layout(array.len(), data.item_size)?;
        data.array = array;
        Ok(())
    }

    /// Sets the dirty flag; setting it to `true` bumps the version
    pub fn set_needs_update(&self, flag: bool) {
        let mut data = self.0.borrow_mut();
        data.needs_update = flag;
        if flag {
            data.version += 1;
        }
    }

    pub(crate) fn clear_needs_update(&self) {
        self.0.borrow_mut().needs_update = false;
    }

    pub fn id(&self) -> AttributeId {
        self.0.borrow().id
    }

    /// Borrow of the current contents
    pub fn array(&self) -> Ref<'_, [f32]> {
        Ref::map(self.0.borrow(), |data| data.array.as_slice())
    }

    /// Components per vertex element
    pub fn item_size(&self) -> usize {
        self.0.borrow().item_size
    }

    /// Number of vertex elements (`array.len() / item_size`)
    pub fn count(&self) -> usize {
        let data = self.0.borrow();
        data.array.len() / data.item_size
    }

    pub fn is_dynamic(&self) -> bool {
        self.0.borrow().dynamic
    }

    pub fn needs_update(&self) -> bool {
        self.0.borrow().needs_update
    }

    /// Number of times a re-upload has been requested
    pub fn version(&self) -> u64 {
        self.0.borrow().version
    }

    /// First three components of element `index`, if the stride allows it
    pub fn get_xyz(&self, index: usize) -> Option<Vector3> {
        let data = self.0.borrow();
        if data.item_size < 3 {
            return None;
        }
        let start = index.checked_mul(data.item_size)?;
        let item = data.array.get(start..start + 3)?;
        Some(vec3(item[0], item[1], item[2]))
    }

    pub fn ptr_eq(&self, other: &BufferAttribute) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakAttribute {
        WeakAttribute(Rc::downgrade(&self.0))
    }
}

/// Non-owning reference used to notice when an attribute is dropped
#[derive(Debug, Clone)]
pub(crate) struct WeakAttribute(Weak<RefCell<AttributeData>>);

impl WeakAttribute {
    /// Whether any [`BufferAttribute`] handle still refers to the data
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

fn validate_layout(len: usize, item_size: usize) -> Result<()> {
    if item_size == 0 {
        return Err(TartanError::invalid("attribute item size must be positive"));
    }
    if len % item_size != 0 {
        return Err(TartanError::invalid(format!(
            "attribute length {} is not a multiple of item size {}",
            len, item_size
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct BufferGeometryData {
    attributes: Vec<(String, BufferAttribute)>,
}

/// Shared handle to a geometry described entirely by named attributes
///
/// Attribute names are unique and keep their insertion order.
#[derive(Debug, Clone, Default)]
pub struct BufferGeometry(Rc<RefCell<BufferGeometryData>>);

impl BufferGeometry {
    /// Creates a geometry with no attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `attribute` under `name`, replacing an existing entry in place
    pub fn add_attribute(&self, name: &str, attribute: BufferAttribute) {
        let mut data = self.0.borrow_mut();
        match data.attributes.iter().position(|(key, _)| key == name) {
            Some(index) => data.attributes[index].1 = attribute,
            None => data.attributes.push((name.to_string(), attribute)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<BufferAttribute> {
        self.0
            .borrow()
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, attribute)| attribute.clone())
    }

    pub fn remove_attribute(&self, name: &str) -> Option<BufferAttribute> {
        let mut data = self.0.borrow_mut();
        let index = data.attributes.iter().position(|(key, _)| key == name)?;
        Some(data.attributes.remove(index).1)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.0
            .borrow()
            .attributes
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Snapshot of all `(name, attribute)` pairs in insertion order
    pub fn attributes(&self) -> Vec<(String, BufferAttribute)> {
        self.0.borrow().attributes.clone()
    }

    /// Vertex count of the `position` attribute, or zero without one
    pub fn vertex_count(&self) -> usize {
        self.attribute("position").map_or(0, |position| position.count())
    }

    pub fn ptr_eq(&self, other: &BufferGeometry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
