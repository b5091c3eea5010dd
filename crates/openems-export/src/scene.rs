//! Scene snapshot types (the host application's serialized scene)

use crate::error::{AttributeError, SceneError};
use crate::geometry::{box_corners, Aabb, Axis};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level scene snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Tagged objects, in the host's collection order
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    /// Explicit grid line markers
    #[serde(default)]
    pub lines: Option<LineObject>,
    /// Optional compile settings stored with the scene
    #[serde(default)]
    pub settings: Option<crate::CompileConfig>,
}

impl Scene {
    pub fn object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }
}

/// Polygon mesh or point cloud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub vertices: Vec<[f64; 3]>,
    #[serde(default)]
    pub edges: Vec<[usize; 2]>,
    /// Faces as vertex index loops
    #[serde(default)]
    pub faces: Vec<Vec<usize>>,
}

impl Mesh {
    pub fn vertex(&self, index: usize) -> Option<Vector3<f64>> {
        self.vertices.get(index).map(|v| Vector3::from(*v))
    }

    /// Resolve the vertex loop of a face
    pub fn face_points(&self, face: usize) -> Result<Vec<Vector3<f64>>, SceneError> {
        let loop_ = self.faces.get(face).ok_or(SceneError::BadFace { face })?;
        loop_
            .iter()
            .map(|&i| {
                self.vertex(i).ok_or(SceneError::BadVertexIndex {
                    index: i,
                    count: self.vertices.len(),
                })
            })
            .collect()
    }

    /// Resolve both endpoints of an edge
    pub fn edge_points(&self, edge: usize) -> Result<[Vector3<f64>; 2], SceneError> {
        let [a, b] = *self.edges.get(edge).ok_or(SceneError::BadEdge { edge })?;
        let count = self.vertices.len();
        let pa = self.vertex(a).ok_or(SceneError::BadVertexIndex { index: a, count })?;
        let pb = self.vertex(b).ok_or(SceneError::BadVertexIndex { index: b, count })?;
        Ok([pa, pb])
    }

    /// Check that every edge and face references existing vertices
    pub fn validate(&self) -> Result<(), SceneError> {
        let count = self.vertices.len();
        let indices = self.edges.iter().flatten().chain(self.faces.iter().flatten());
        for &index in indices {
            if index >= count {
                return Err(SceneError::BadVertexIndex { index, count });
            }
        }
        Ok(())
    }

    /// Size of an attribute domain on this mesh
    pub fn domain_len(&self, domain: AttributeDomain) -> usize {
        match domain {
            AttributeDomain::Point => self.vertices.len(),
            AttributeDomain::Edge => self.edges.len(),
            AttributeDomain::Face => self.faces.len(),
        }
    }
}

/// Which mesh element an attribute value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeDomain {
    Point,
    Edge,
    Face,
}

/// Attribute values, one per domain element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum AttributeData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Float(Vec<f64>),
    Vector(Vec<[f64; 3]>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::Bool(v) => v.len(),
            AttributeData::Int(v) => v.len(),
            AttributeData::Float(v) => v.len(),
            AttributeData::Vector(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeData::Bool(_) => "bool",
            AttributeData::Int(_) => "int",
            AttributeData::Float(_) => "float",
            AttributeData::Vector(_) => "vector",
        }
    }
}

/// A named attribute channel produced by the host's procedural generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChannel {
    pub name: String,
    pub domain: AttributeDomain,
    pub data: AttributeData,
}

/// Mesh plus its attribute channels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub mesh: Mesh,
    #[serde(default)]
    pub attributes: Vec<AttributeChannel>,
}

impl Geometry {
    pub fn channel(&self, name: &str) -> Option<&AttributeChannel> {
        self.attributes.iter().find(|c| c.name == name)
    }

    /// Find a channel and check it covers its whole domain
    pub fn checked_channel(&self, name: &str) -> Result<Option<&AttributeChannel>, AttributeError> {
        let Some(channel) = self.channel(name) else {
            return Ok(None);
        };
        let expected = self.mesh.domain_len(channel.domain);
        if channel.data.len() != expected {
            return Err(AttributeError::Length {
                name: name.to_string(),
                expected,
                found: channel.data.len(),
            });
        }
        Ok(Some(channel))
    }
}

/// Per-vertex membership weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexGroup {
    pub name: String,
    pub weights: Vec<f64>,
}

/// Field dump recorded by a dump box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpKind {
    #[default]
    EField,
    HField,
    Current,
    CurrentDensity,
}

impl DumpKind {
    /// openEMS `dump_type` code (time domain)
    pub fn dump_type(self) -> u8 {
        match self {
            DumpKind::EField => 0,
            DumpKind::HField => 1,
            DumpKind::Current => 2,
            DumpKind::CurrentDensity => 3,
        }
    }
}

/// Port excitation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    #[default]
    Px,
    Py,
    Pz,
    Nx,
    Ny,
    Nz,
}

impl PortDirection {
    pub fn new(axis: Axis, reversed: bool) -> Self {
        match (axis, reversed) {
            (Axis::X, false) => PortDirection::Px,
            (Axis::Y, false) => PortDirection::Py,
            (Axis::Z, false) => PortDirection::Pz,
            (Axis::X, true) => PortDirection::Nx,
            (Axis::Y, true) => PortDirection::Ny,
            (Axis::Z, true) => PortDirection::Nz,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            PortDirection::Px | PortDirection::Nx => Axis::X,
            PortDirection::Py | PortDirection::Ny => Axis::Y,
            PortDirection::Pz | PortDirection::Nz => Axis::Z,
        }
    }

    pub fn is_reversed(self) -> bool {
        matches!(self, PortDirection::Nx | PortDirection::Ny | PortDirection::Nz)
    }
}

/// Dielectric parameters, checked when the scene is loaded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMaterial")]
pub struct MaterialParams {
    pub epsilon_r: f64,
    /// Conductivity (S/m); `None` when the material is lossless
    pub kappa: Option<f64>,
}

#[derive(Deserialize)]
struct RawMaterial {
    epsilon_r: f64,
    #[serde(default)]
    kappa: Option<f64>,
}

impl TryFrom<RawMaterial> for MaterialParams {
    type Error = String;

    fn try_from(raw: RawMaterial) -> Result<Self, Self::Error> {
        Self::new(raw.epsilon_r, raw.kappa)
    }
}

impl MaterialParams {
    pub fn new(epsilon_r: f64, kappa: Option<f64>) -> Result<Self, String> {
        if !epsilon_r.is_finite() || epsilon_r <= 0.0 {
            return Err(format!("epsilon_r must be positive, got {}", epsilon_r));
        }
        if let Some(k) = kappa {
            if !k.is_finite() || k < 0.0 {
                return Err(format!("kappa must be non-negative, got {}", k));
            }
        }
        Ok(Self { epsilon_r, kappa })
    }
}

/// Lumped port parameters, checked when the scene is loaded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPort")]
pub struct PortParams {
    pub number: u32,
    pub impedance: f64,
    pub direction: PortDirection,
    pub active: bool,
}

#[derive(Deserialize)]
struct RawPort {
    #[serde(default = "default_port_number")]
    number: u32,
    #[serde(default = "default_impedance")]
    impedance: f64,
    #[serde(default)]
    direction: PortDirection,
    #[serde(default)]
    active: bool,
}

fn default_port_number() -> u32 {
    1
}

fn default_impedance() -> f64 {
    50.0
}

impl TryFrom<RawPort> for PortParams {
    type Error = String;

    fn try_from(raw: RawPort) -> Result<Self, Self::Error> {
        Self::new(raw.number, raw.impedance, raw.direction, raw.active)
    }
}

impl PortParams {
    pub fn new(
        number: u32,
        impedance: f64,
        direction: PortDirection,
        active: bool,
    ) -> Result<Self, String> {
        if number == 0 {
            return Err("port number 0 is reserved for untagged points".to_string());
        }
        if !impedance.is_finite() || impedance <= 0.0 {
            return Err(format!("port impedance must be positive, got {}", impedance));
        }
        Ok(Self { number, impedance, direction, active })
    }
}

/// Dump box parameters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DumpParams {
    #[serde(default)]
    pub kind: DumpKind,
}

/// The simulation role of a scene object
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Role {
    #[default]
    None,
    MetalVolume,
    MetalAaFaces,
    MetalEdges,
    Material(MaterialParams),
    Dumpbox(DumpParams),
    Port(PortParams),
    Procedural,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::MetalVolume => "metal_volume",
            Role::MetalAaFaces => "metal_aa_faces",
            Role::MetalEdges => "metal_edges",
            Role::Material(_) => "material",
            Role::Dumpbox(_) => "dumpbox",
            Role::Port(_) => "port",
            Role::Procedural => "procedural",
        }
    }

    /// Whether vertex-group anchors on this object feed the grid
    pub fn contributes_anchors(&self) -> bool {
        !matches!(self, Role::None | Role::Dumpbox(_))
    }
}

/// One tagged entity of the scene
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(default)]
    pub vertex_groups: Vec<VertexGroup>,
    /// Host-provided bounding box corners (world space)
    #[serde(default)]
    pub bound_box: Option<Vec<[f64; 3]>>,
    /// Geometry after the host evaluated the object's generative modifiers
    #[serde(default)]
    pub evaluated: Option<Geometry>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, role: Role, mesh: Mesh) -> Self {
        Self {
            name: name.into(),
            role,
            geometry: Geometry { mesh, attributes: Vec::new() },
            ..Default::default()
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.geometry.mesh
    }

    /// Rounded bounding box, from the host corners or the mesh vertices
    pub fn aabb(&self) -> Option<Aabb> {
        match &self.bound_box {
            Some(corners) => Aabb::from_corners(corners),
            None => Aabb::from_corners(&self.geometry.mesh.vertices),
        }
    }

    pub fn vertex_group(&self, name: &str) -> Option<&VertexGroup> {
        self.vertex_groups.iter().find(|g| g.name == name)
    }
}

/// Dedicated object whose edges mark explicit grid lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineObject {
    #[serde(default = "default_lines_name")]
    pub name: String,
    pub mesh: Mesh,
}

fn default_lines_name() -> String {
    "lines".to_string()
}

impl LineObject {
    /// Starter line set for a frequency: one corner of a cube of one
    /// wavelength, with an edge along each axis. Returns the suggested
    /// smoothing resolution (λ/20) alongside.
    pub fn default_for(center_freq_mhz: f64, unit: crate::LengthUnit) -> (Self, f64) {
        let lambda = crate::wavelength(center_freq_mhz, unit);
        let h = lambda / 2.0;
        let corners = box_corners([-h; 3], [h; 3]);
        let mesh = Mesh {
            vertices: vec![corners[0], corners[1], corners[2], corners[4]],
            edges: vec![[0, 1], [0, 2], [0, 3]],
            faces: Vec::new(),
        };
        (Self { name: default_lines_name(), mesh }, lambda / 20.0)
    }
}

/// Source of scene snapshots (the host application)
pub trait SceneProvider {
    /// Read the whole scene once; compile never re-reads mid-pass
    fn snapshot(&self) -> Result<Scene, SceneError>;

    /// Evaluate the generative modifiers of a procedural object
    fn evaluate(&self, object: &SceneObject) -> Result<Geometry, SceneError>;
}

/// Scene provider backed by a JSON document exported by the host.
///
/// Modifier evaluation is done host-side; the evaluated geometry is read
/// from the object's `evaluated` field, falling back to the base geometry.
#[derive(Debug, Clone)]
pub struct JsonScene {
    scene: Scene,
}

impl JsonScene {
    pub fn from_json(json: &str) -> Result<Self, SceneError> {
        let scene: Scene = serde_json::from_str(json)?;
        Ok(Self { scene })
    }

    pub fn from_path(path: &Path) -> Result<Self, SceneError> {
        let json = std::fs::read_to_string(path).map_err(|source| SceneError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

impl From<Scene> for JsonScene {
    fn from(scene: Scene) -> Self {
        Self { scene }
    }
}

impl SceneProvider for JsonScene {
    fn snapshot(&self) -> Result<Scene, SceneError> {
        Ok(self.scene.clone())
    }

    fn evaluate(&self, object: &SceneObject) -> Result<Geometry, SceneError> {
        let geometry = object.evaluated.as_ref().unwrap_or(&object.geometry);
        geometry.mesh.validate()?;
        Ok(geometry.clone())
    }
}
