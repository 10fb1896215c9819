//! Material parameter bags
//!
//! A [`Material`] is a variant tag plus a bag of named options. Nothing is
//! validated here: unknown names are kept and simply ignored by engines that
//! do not understand them. Materials are immutable once built and cheap to
//! clone, so one material can be shared by many nodes.

use std::{collections::BTreeMap, rc::Rc};

/// One material option value
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    /// Packed `0xRRGGBB` colour
    Color(u32),
    Number(f64),
    Bool(bool),
    Text(String),
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Number(value)
    }
}

impl From<f32> for ParameterValue {
    fn from(value: f32) -> Self {
        ParameterValue::Number(value as f64)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Text(value)
    }
}

/// Named material options, built with chained setters
///
/// ```rust
/// use tartan::gfx::material::MaterialParameters;
///
/// let params = MaterialParameters::new().color(0xff0000).opacity(0.5);
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialParameters {
    values: BTreeMap<String, ParameterValue>,
}

impl MaterialParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an arbitrary option
    pub fn set(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Builder pattern: Set base colour as `0xRRGGBB`
    pub fn color(mut self, hex: u32) -> Self {
        self.values
            .insert("color".to_string(), ParameterValue::Color(hex));
        self
    }

    /// Builder pattern: Set point size (points materials)
    pub fn size(self, size: f32) -> Self {
        self.set("size", size)
    }

    /// Builder pattern: Set opacity
    pub fn opacity(self, opacity: f32) -> Self {
        self.set("opacity", opacity)
    }

    /// Builder pattern: Take colours from the `color` attribute
    pub fn vertex_colors(self, enabled: bool) -> Self {
        self.set("vertexColors", enabled)
    }

    /// Builder pattern: Draw triangle edges only
    pub fn wireframe(self, enabled: bool) -> Self {
        self.set("wireframe", enabled)
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }

    fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name)? {
            ParameterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn flag(&self, name: &str) -> Option<bool> {
        match self.values.get(name)? {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for MaterialParameters
where
    K: Into<String>,
    V: Into<ParameterValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Which shading model a material describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Unlit surface colour for meshes and lines
    MeshBasic,
    /// Screen-space point sprites
    Points,
}

#[derive(Debug)]
struct MaterialData {
    kind: MaterialKind,
    parameters: MaterialParameters,
}

/// Immutable, shareable material
#[derive(Debug, Clone)]
pub struct Material(Rc<MaterialData>);

impl Material {
    /// Creates an unlit surface material
    pub fn mesh_basic(parameters: MaterialParameters) -> Self {
        Self::new(MaterialKind::MeshBasic, parameters)
    }

    /// Creates a point-sprite material
    pub fn points(parameters: MaterialParameters) -> Self {
        Self::new(MaterialKind::Points, parameters)
    }

    fn new(kind: MaterialKind, parameters: MaterialParameters) -> Self {
        log::trace!("Created {:?} material with {} option(s)", kind, parameters.len());
        Self(Rc::new(MaterialData { kind, parameters }))
    }

    pub fn kind(&self) -> MaterialKind {
        self.0.kind
    }

    pub fn parameters(&self) -> &MaterialParameters {
        &self.0.parameters
    }

    /// Base colour as `0xRRGGBB`, white when unset
    pub fn color(&self) -> u32 {
        match self.0.parameters.get("color") {
            Some(ParameterValue::Color(hex)) => *hex,
            Some(ParameterValue::Number(n)) if *n >= 0.0 => *n as u32,
            _ => 0xffffff,
        }
    }

    pub fn opacity(&self) -> f32 {
        self.0.parameters.number("opacity").unwrap_or(1.0) as f32
    }

    /// Point size; meaningful for points materials only
    pub fn size(&self) -> f32 {
        self.0.parameters.number("size").unwrap_or(1.0) as f32
    }

    pub fn vertex_colors(&self) -> bool {
        self.0.parameters.flag("vertexColors").unwrap_or(false)
    }

    pub fn wireframe(&self) -> bool {
        self.0.parameters.flag("wireframe").unwrap_or(false)
    }

    /// Linear RGBA for GPU uniforms, alpha taken from `opacity`
    pub fn rgba(&self) -> [f32; 4] {
        let [r, g, b] = hex_to_rgb(self.color());
        [r, g, b, self.opacity()]
    }

    pub fn ptr_eq(&self, other: &Material) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Splits `0xRRGGBB` into `[r, g, b]` in `0.0..=1.0`
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}
