//! Two-pass scene compile.
//!
//! Pass 1 emits every non-port primitive in scene order and collects grid
//! lines. Pass 2 emits ports, so that port primitives always come last.
//! Object-level failures are collected into the [`CompileReport`]; only an
//! unreadable scene or an invalid configuration aborts a compile.

use crate::aggregate::{self, Aggregate, PortAggregate};
use crate::error::{CompileError, ObjectError};
use crate::geometry::{get_axis, round_point, Aabb, AxisPlane};
use crate::grid::{Grid, GridBuilder};
use crate::scene::{DumpKind, Mesh, PortDirection, Role, Scene, SceneObject, SceneProvider};
use crate::solid::{SolidPayload, SolidRef, SolidStore};
use crate::CompileConfig;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A solver-ready simulation primitive
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum Primitive {
    MetalSurface {
        object: String,
        plane: AxisPlane,
    },
    MetalVolume {
        object: String,
        solid: SolidRef,
    },
    MetalEdge {
        object: String,
        points: [[f64; 3]; 2],
    },
    Material {
        object: String,
        solid: SolidRef,
        epsilon_r: f64,
        kappa: Option<f64>,
    },
    Port {
        object: String,
        number: u32,
        bbox: Aabb,
        direction: PortDirection,
        impedance: f64,
        active: bool,
    },
    DumpBox {
        object: String,
        bbox: Aabb,
        kind: DumpKind,
    },
}

impl Primitive {
    /// Name of the scene object this primitive came from
    pub fn object(&self) -> &str {
        match self {
            Primitive::MetalSurface { object, .. }
            | Primitive::MetalVolume { object, .. }
            | Primitive::MetalEdge { object, .. }
            | Primitive::Material { object, .. }
            | Primitive::Port { object, .. }
            | Primitive::DumpBox { object, .. } => object,
        }
    }

    pub fn is_port(&self) -> bool {
        matches!(self, Primitive::Port { .. })
    }
}

/// Reference to an emitted port, kept across compiles
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortHandle {
    pub number: u32,
    /// Position in the primitive list of the compile that emitted it
    pub primitive_index: usize,
    pub bbox: Aabb,
    pub direction: PortDirection,
}

/// State that outlives a single compile: the port lookup by object name.
///
/// Passed into [`compile`] and handed back with the result. Entries of
/// every port-bearing object are replaced by each compile.
#[derive(Debug, Clone, Default)]
pub struct CompileSession {
    ports: HashMap<String, Vec<PortHandle>>,
}

impl CompileSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ports emitted for an object by the last compile
    pub fn ports(&self, object: &str) -> &[PortHandle] {
        self.ports.get(object).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Find a port handle by port number
    pub fn port_number(&self, number: u32) -> Option<(&str, &PortHandle)> {
        self.ports
            .iter()
            .flat_map(|(name, handles)| handles.iter().map(move |h| (name.as_str(), h)))
            .find(|(_, h)| h.number == number)
    }

    pub fn len(&self) -> usize {
        self.ports.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    fn replace(&mut self, object: &str, handles: Vec<PortHandle>) {
        if handles.is_empty() {
            self.ports.remove(object);
        } else {
            self.ports.insert(object.to_string(), handles);
        }
    }

    /// Drop objects that are no longer in the scene
    fn retain_scene(&mut self, scene: &Scene) {
        self.ports.retain(|name, _| scene.object(name).is_some());
    }
}

/// A message about one object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub object: String,
    pub message: String,
}

impl Issue {
    fn new(object: &str, message: impl ToString) -> Self {
        Self {
            object: object.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.object, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompileStatus {
    Success,
    /// Some objects were skipped
    Partial { skipped: usize },
    /// Objects were skipped and nothing was emitted
    Failed,
}

/// Outcome of a compile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileReport {
    /// Skipped objects, with the reason
    pub issues: Vec<Issue>,
    /// Dropped primitives and other non-fatal problems
    pub warnings: Vec<Issue>,
    pub status: CompileStatus,
}

impl CompileReport {
    fn new(issues: Vec<Issue>, warnings: Vec<Issue>, emitted: usize) -> Self {
        let status = match (issues.len(), emitted) {
            (0, _) => CompileStatus::Success,
            (_, 0) => CompileStatus::Failed,
            (skipped, _) => CompileStatus::Partial { skipped },
        };
        Self {
            issues,
            warnings,
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CompileStatus::Success
    }
}

/// Grid and primitives of one compile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compiled {
    pub grid: Grid,
    pub primitives: Vec<Primitive>,
    pub report: CompileReport,
}

/// What an object adds besides its primitives
#[derive(Debug, Default)]
struct Contribution {
    /// Points flagged by an `anchor` channel
    anchors: Vec<[f64; 3]>,
    /// Procedural objects keep their aggregate for pass 2
    aggregate: Option<Aggregate>,
}

/// Emission state of one compile
struct Emitter<'a, S: ?Sized> {
    store: &'a S,
    warnings: Vec<Issue>,
}

impl<S: SolidStore + ?Sized> Emitter<'_, S> {
    /// Round trip a solid; failure drops the primitive with a warning
    fn solid(&mut self, payload: &SolidPayload) -> Option<SolidRef> {
        match self.store.round_trip(payload) {
            Ok(solid) => Some(solid),
            Err(e) => {
                tracing::warn!("Dropping solid of '{}': {}", payload.object, e);
                self.warnings.push(Issue::new(&payload.object, e));
                None
            }
        }
    }

    /// Axis-aligned faces become metal surfaces; oblique ones are dropped
    fn surfaces(
        &mut self,
        name: &str,
        mesh: &Mesh,
        faces: &[usize],
        out: &mut Vec<Primitive>,
    ) -> Result<(), ObjectError> {
        for &face in faces {
            let points = mesh.face_points(face)?;
            match get_axis(&points) {
                Some(plane) => out.push(Primitive::MetalSurface {
                    object: name.to_string(),
                    plane,
                }),
                None => tracing::debug!("Skipping oblique face {} of '{}'", face, name),
            }
        }
        Ok(())
    }

    fn edges(
        &mut self,
        name: &str,
        mesh: &Mesh,
        edges: &[usize],
        out: &mut Vec<Primitive>,
    ) -> Result<(), ObjectError> {
        for &edge in edges {
            let [a, b] = mesh.edge_points(edge)?;
            out.push(Primitive::MetalEdge {
                object: name.to_string(),
                points: [round_point(&a).into(), round_point(&b).into()],
            });
        }
        Ok(())
    }

    /// Pass 1 for one object. Anchor channels are read from the evaluated
    /// geometry of procedural objects and from the base geometry otherwise.
    fn object<P: SceneProvider + ?Sized>(
        &mut self,
        provider: &P,
        object: &SceneObject,
        out: &mut Vec<Primitive>,
    ) -> Result<Contribution, ObjectError> {
        let name = object.name.as_str();
        let mesh = object.mesh();

        match object.role {
            Role::None => return Ok(Contribution::default()),
            Role::Port(_) => {}
            Role::MetalVolume => {
                mesh.validate()?;
                if mesh.faces.is_empty() {
                    return Err(ObjectError::NoFaces);
                }
                let payload = SolidPayload::from_faces(name, "volume", mesh, 0..mesh.faces.len())?;
                if let Some(solid) = self.solid(&payload) {
                    out.push(Primitive::MetalVolume {
                        object: name.to_string(),
                        solid,
                    });
                }
            }
            Role::MetalAaFaces => {
                let faces: Vec<usize> = (0..mesh.faces.len()).collect();
                self.surfaces(name, mesh, &faces, out)?;
            }
            Role::MetalEdges => {
                let edges: Vec<usize> = (0..mesh.edges.len()).collect();
                self.edges(name, mesh, &edges, out)?;
            }
            Role::Material(params) => {
                mesh.validate()?;
                if mesh.faces.is_empty() {
                    return Err(ObjectError::NoFaces);
                }
                let payload =
                    SolidPayload::from_faces(name, "material", mesh, 0..mesh.faces.len())?;
                if let Some(solid) = self.solid(&payload) {
                    out.push(Primitive::Material {
                        object: name.to_string(),
                        solid,
                        epsilon_r: params.epsilon_r,
                        kappa: params.kappa,
                    });
                }
            }
            Role::Dumpbox(params) => {
                let bbox = object.aabb().ok_or(ObjectError::NoBoundingBox)?;
                out.push(Primitive::DumpBox {
                    object: name.to_string(),
                    bbox,
                    kind: params.kind,
                });
            }
            Role::Procedural => {
                let geometry = provider.evaluate(object)?;
                let agg = aggregate::aggregate(&geometry)?;
                let mesh = &geometry.mesh;

                self.edges(name, mesh, &agg.pec_edges, out)?;
                self.surfaces(name, mesh, &agg.pec_aa_faces, out)?;
                if !agg.pec_volume_faces.is_empty() {
                    let faces = agg.pec_volume_faces.iter().copied();
                    let payload = SolidPayload::from_faces(name, "pec_volume", mesh, faces)?;
                    if let Some(solid) = self.solid(&payload) {
                        out.push(Primitive::MetalVolume {
                            object: name.to_string(),
                            solid,
                        });
                    }
                }
                for (i, group) in agg.materials.iter().enumerate() {
                    let tag = format!("material_{}", i);
                    let faces = group.faces.iter().copied();
                    let payload = SolidPayload::from_faces(name, &tag, mesh, faces)?;
                    if let Some(solid) = self.solid(&payload) {
                        out.push(Primitive::Material {
                            object: name.to_string(),
                            solid,
                            epsilon_r: group.epsilon_r,
                            kappa: group.kappa,
                        });
                    }
                }
                return Ok(Contribution {
                    anchors: agg.anchors.clone(),
                    aggregate: Some(agg),
                });
            }
        }
        Ok(Contribution {
            anchors: aggregate::anchors(&object.geometry)?,
            aggregate: None,
        })
    }
}

fn port_primitive(object: &str, port: &PortAggregate) -> Primitive {
    Primitive::Port {
        object: object.to_string(),
        number: port.number,
        bbox: port.bbox,
        direction: port.direction(),
        impedance: port.impedance,
        active: port.active,
    }
}

/// Compile a scene into a grid and an ordered primitive list.
///
/// The scene is read once through `provider`. Solids go through `store`.
/// The session's port lookup is updated and returned.
pub fn compile<P, S>(
    provider: &P,
    store: &S,
    config: &CompileConfig,
    mut session: CompileSession,
) -> Result<(Compiled, CompileSession), CompileError>
where
    P: SceneProvider + ?Sized,
    S: SolidStore + ?Sized,
{
    config.validate()?;
    let scene = provider.snapshot()?;
    tracing::info!("Compiling {} objects", scene.objects.len());

    let mut emitter = Emitter {
        store,
        warnings: Vec::new(),
    };
    let mut issues = Vec::new();
    let mut primitives = Vec::new();
    let mut grid = GridBuilder::new();

    if let Some(lines) = &scene.lines {
        if let Err(e) = grid.add_line_object(lines) {
            tracing::warn!("Skipping line object '{}': {}", lines.name, e);
            issues.push(Issue::new(&lines.name, e));
        }
    }

    // pass 1: everything but ports
    let mut procedural: BTreeMap<usize, Aggregate> = BTreeMap::new();
    let mut skipped: Vec<bool> = vec![false; scene.objects.len()];
    for (i, object) in scene.objects.iter().enumerate() {
        let mut out = Vec::new();
        match emitter.object(provider, object, &mut out) {
            Ok(contribution) => {
                if object.role.contributes_anchors() {
                    if let Err(e) = grid.add_vertex_group(object, &config.anchor_group) {
                        tracing::warn!("Ignoring anchors of '{}': {}", object.name, e);
                        emitter.warnings.push(Issue::new(&object.name, e));
                    }
                }
                grid.add_anchors(&contribution.anchors);
                if let Some(agg) = contribution.aggregate {
                    procedural.insert(i, agg);
                }
                tracing::debug!(
                    "'{}' ({}): {} primitives",
                    object.name,
                    object.role.name(),
                    out.len()
                );
                primitives.extend(out);
            }
            Err(e) => {
                tracing::warn!("Skipping '{}' ({}): {}", object.name, object.role.name(), e);
                issues.push(Issue::new(&object.name, e));
                skipped[i] = true;
            }
        }
    }

    // pass 2: ports, in scene order
    session.retain_scene(&scene);
    let mut numbers: HashMap<u32, String> = HashMap::new();
    for (i, object) in scene.objects.iter().enumerate() {
        let ports: Vec<Primitive> = match object.role {
            Role::Port(params) if !skipped[i] => match object.aabb() {
                Some(bbox) => vec![Primitive::Port {
                    object: object.name.clone(),
                    number: params.number,
                    bbox,
                    direction: params.direction,
                    impedance: params.impedance,
                    active: params.active,
                }],
                None => {
                    let e = ObjectError::NoBoundingBox;
                    tracing::warn!("Skipping port '{}': {}", object.name, e);
                    issues.push(Issue::new(&object.name, e));
                    Vec::new()
                }
            },
            Role::Procedural => procedural
                .get(&i)
                .map(|agg| agg.ports.iter().map(|p| port_primitive(&object.name, p)).collect())
                .unwrap_or_default(),
            _ => continue,
        };

        let mut handles = Vec::with_capacity(ports.len());
        for port in ports {
            if let Primitive::Port { number, bbox, direction, .. } = &port {
                if let Some(other) = numbers.insert(*number, object.name.clone()) {
                    let message = format!("port number {} is also used by '{}'", number, other);
                    tracing::warn!("'{}': {}", object.name, message);
                    emitter.warnings.push(Issue::new(&object.name, message));
                }
                handles.push(PortHandle {
                    number: *number,
                    primitive_index: primitives.len(),
                    bbox: *bbox,
                    direction: *direction,
                });
            }
            primitives.push(port);
        }
        session.replace(&object.name, handles);
    }

    let grid: Grid = grid.build(&config.smoothing, config.delta_unit());
    let report = CompileReport::new(issues, emitter.warnings, primitives.len());
    tracing::info!(
        "Compiled {} primitives, {} skipped objects, {} warnings",
        primitives.len(),
        report.issues.len(),
        report.warnings.len()
    );

    Ok((
        Compiled {
            grid,
            primitives,
            report,
        },
        session,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{
        ANCHOR, EPSILON_R, KAPPA, PEC_AA_FACE, PEC_EDGE, PEC_VOLUME, PORT_AXIS, PORT_IMPEDANCE,
        PORT_INDEX, USE_KAPPA,
    };
    use crate::error::{SceneError, SolidError};
    use crate::geometry::Axis;
    use crate::scene::{
        AttributeChannel, AttributeData, AttributeDomain, DumpParams, Geometry, JsonScene,
        LineObject, MaterialParams, PortParams, VertexGroup,
    };
    use crate::solid::tests::cube_mesh;
    use crate::solid::StlStore;
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};

    fn port_object(name: &str, number: u32) -> SceneObject {
        let params = PortParams::new(number, 50.0, PortDirection::Nz, true).unwrap();
        SceneObject::new(name, Role::Port(params), cube_mesh([0.0, 0.0, 0.0], [0.5, 0.5, 1.6]))
    }

    fn procedural_ports(name: &str, with_impedance: bool) -> SceneObject {
        let mut obj = SceneObject::new(name, Role::Procedural, Mesh::default());
        let mut attributes = vec![
            AttributeChannel {
                name: PORT_INDEX.into(),
                domain: AttributeDomain::Point,
                data: AttributeData::Int(vec![4, 4]),
            },
            AttributeChannel {
                name: PORT_AXIS.into(),
                domain: AttributeDomain::Point,
                data: AttributeData::Vector(vec![[0.0, 1.0, 0.0]; 2]),
            },
        ];
        if with_impedance {
            attributes.push(AttributeChannel {
                name: PORT_IMPEDANCE.into(),
                domain: AttributeDomain::Point,
                data: AttributeData::Float(vec![75.0; 2]),
            });
        }
        obj.evaluated = Some(Geometry {
            mesh: Mesh {
                vertices: vec![[10.0, 0.0, 0.0], [10.0, 2.0, 0.0]],
                ..Default::default()
            },
            attributes,
        });
        obj
    }

    fn sample_scene() -> Scene {
        let oblique = Mesh {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
            edges: Vec::new(),
            faces: vec![vec![0, 1, 2, 3]],
        };
        let wire = Mesh {
            vertices: vec![[0.0, 0.0, 0.0], [0.0, 0.0, 3.0], [0.0, 2.0, 3.0]],
            edges: vec![[0, 1], [1, 2]],
            faces: Vec::new(),
        };

        let mut ground = SceneObject::new(
            "ground",
            Role::MetalAaFaces,
            cube_mesh([-5.0, -5.0, 0.0], [5.0, 5.0, 0.0]),
        );
        ground.vertex_groups.push(VertexGroup {
            name: "anchor".into(),
            weights: vec![1.0; 8],
        });
        let mut probe = SceneObject::new(
            "probe",
            Role::Dumpbox(DumpParams { kind: DumpKind::HField }),
            cube_mesh([-7.0, -7.0, -7.0], [7.0, 7.0, 7.0]),
        );
        probe.vertex_groups.push(VertexGroup {
            name: "anchor".into(),
            weights: vec![1.0; 8],
        });

        Scene {
            objects: vec![
                port_object("feed", 1),
                ground,
                SceneObject::new("tilted", Role::MetalAaFaces, oblique),
                SceneObject::new("wire", Role::MetalEdges, wire),
                probe,
                procedural_ports("array", true),
                SceneObject::new(
                    "substrate",
                    Role::Material(MaterialParams::new(4.3, None).unwrap()),
                    cube_mesh([-5.0, -5.0, 0.0], [5.0, 5.0, 1.6]),
                ),
            ],
            lines: Some(LineObject {
                name: "lines".into(),
                mesh: Mesh {
                    vertices: vec![[-10.0, -10.0, -10.0], [10.0, 10.0, 10.0]],
                    edges: vec![[0, 1]],
                    faces: Vec::new(),
                },
            }),
            settings: None,
        }
    }

    fn run(scene: Scene, session: CompileSession) -> (Compiled, CompileSession) {
        let dir = tempfile::tempdir().unwrap();
        let store = StlStore::new(dir.path());
        compile(&JsonScene::from(scene), &store, &CompileConfig::default(), session).unwrap()
    }

    #[test]
    fn test_compile_orders_ports_last() {
        let (compiled, session) = run(sample_scene(), CompileSession::new());
        assert!(compiled.report.is_success(), "{:?}", compiled.report);

        let kinds: Vec<(&str, bool)> = compiled
            .primitives
            .iter()
            .map(|p| (p.object(), p.is_port()))
            .collect();
        let first_port = kinds.iter().position(|(_, port)| *port).unwrap();
        assert!(kinds[first_port..].iter().all(|(_, port)| *port));

        // ports follow scene order: the port object, then the procedural one
        assert_eq!(kinds[first_port].0, "feed");
        assert_eq!(kinds[first_port + 1].0, "array");
        assert_eq!(kinds.len(), first_port + 2);

        // the flat ground box has two axis-aligned z faces plus four
        // degenerate side faces that collapse onto lines
        let surfaces = compiled
            .primitives
            .iter()
            .filter(|p| matches!(p, Primitive::MetalSurface { object, .. } if object == "ground"))
            .count();
        assert_eq!(surfaces, 6);
        assert!(!kinds.iter().any(|(name, _)| *name == "tilted"));
        assert_eq!(kinds.iter().filter(|(name, _)| *name == "wire").count(), 2);
        assert_eq!(kinds.iter().filter(|(name, _)| *name == "substrate").count(), 1);

        assert_eq!(session.ports("feed").len(), 1);
        assert_eq!(session.ports("feed")[0].primitive_index, first_port);
        assert_eq!(session.ports("array")[0].direction, PortDirection::Py);
        assert_eq!(session.port_number(4).map(|(name, _)| name), Some("array"));
    }

    #[test]
    fn test_grid_sources() {
        let mut config = CompileConfig::default();
        config.smoothing.enabled = false;
        let dir = tempfile::tempdir().unwrap();
        let store = StlStore::new(dir.path());
        let provider = JsonScene::from(sample_scene());
        let (compiled, _) = compile(&provider, &store, &config, CompileSession::new()).unwrap();

        // explicit lines and the ground anchors; the dump box anchors are ignored
        assert_eq!(compiled.grid.axis(Axis::X).as_slice(), &[-10.0, -5.0, 5.0, 10.0]);
        assert_eq!(compiled.grid.axis(Axis::Z).as_slice(), &[-10.0, 0.0, 10.0]);
        assert_eq!(compiled.grid.delta_unit, 1e-3);
    }

    #[test]
    fn test_recompile_replaces_session_entries() {
        let (_, session) = run(sample_scene(), CompileSession::new());
        assert_eq!(session.len(), 2);

        let (_, session) = run(sample_scene(), session);
        assert_eq!(session.len(), 2);
        assert_eq!(session.ports("feed").len(), 1);

        let mut scene = sample_scene();
        scene.objects.retain(|o| o.name != "feed");
        let (_, session) = run(scene, session);
        assert!(session.ports("feed").is_empty());
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_missing_channel_skips_object() {
        let mut scene = sample_scene();
        scene.objects.push(procedural_ports("broken", false));
        let (compiled, session) = run(scene, CompileSession::new());

        assert_eq!(compiled.report.status, CompileStatus::Partial { skipped: 1 });
        assert_eq!(compiled.report.issues[0].object, "broken");
        assert!(compiled.primitives.iter().all(|p| p.object() != "broken"));
        assert!(session.ports("broken").is_empty());
        // everything else still compiles
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_all_skipped_is_failure() {
        let scene = Scene {
            objects: vec![procedural_ports("broken", false)],
            ..Default::default()
        };
        let (compiled, _) = run(scene, CompileSession::new());
        assert_eq!(compiled.report.status, CompileStatus::Failed);
        assert!(compiled.primitives.is_empty());
    }

    #[test]
    fn test_empty_scene_succeeds() {
        let (compiled, session) = run(Scene::default(), CompileSession::new());
        assert_eq!(compiled.report.status, CompileStatus::Success);
        assert!(compiled.grid.is_empty());
        assert!(session.is_empty());
    }

    struct BrokenStore;

    impl SolidStore for BrokenStore {
        fn path_for(&self, object: &str, tag: &str) -> PathBuf {
            PathBuf::from(format!("/nonexistent/{}_{}.stl", object, tag))
        }

        fn write_solid(&self, payload: &SolidPayload) -> Result<PathBuf, SolidError> {
            Err(SolidError::Write {
                path: self.path_for(&payload.object, &payload.tag),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn read_solid(&self, path: &Path) -> Result<SolidRef, SolidError> {
            Err(SolidError::Read {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            })
        }
    }

    #[test]
    fn test_solid_failure_is_a_warning() {
        let (compiled, _) = compile(
            &JsonScene::from(sample_scene()),
            &BrokenStore,
            &CompileConfig::default(),
            CompileSession::new(),
        )
        .unwrap();

        assert!(compiled.report.is_success());
        assert_eq!(compiled.report.warnings.len(), 1);
        assert_eq!(compiled.report.warnings[0].object, "substrate");
        assert!(compiled.primitives.iter().all(|p| p.object() != "substrate"));
    }

    struct Offline;

    impl SceneProvider for Offline {
        fn snapshot(&self) -> Result<Scene, SceneError> {
            Err(SceneError::Evaluation("host not running".into()))
        }

        fn evaluate(&self, _object: &SceneObject) -> Result<Geometry, SceneError> {
            Err(SceneError::Evaluation("host not running".into()))
        }
    }

    #[test]
    fn test_provider_failure_aborts() {
        let config = CompileConfig::default();
        let result = compile(&Offline, &BrokenStore, &config, CompileSession::new());
        assert!(matches!(result, Err(CompileError::Scene(_))));
    }

    #[test]
    fn test_invalid_config_aborts() {
        let mut config = CompileConfig::default();
        config.smoothing.ratio = 0.5;
        let provider = JsonScene::from(Scene::default());
        let result = compile(&provider, &BrokenStore, &config, CompileSession::new());
        assert!(matches!(result, Err(CompileError::Config(_))));
    }

    #[test]
    fn test_duplicate_port_numbers_warn() {
        let scene = Scene {
            objects: vec![port_object("a", 1), port_object("b", 1)],
            ..Default::default()
        };
        let (compiled, session) = run(scene, CompileSession::new());
        assert!(compiled.report.is_success());
        assert_eq!(compiled.report.warnings.len(), 1);
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn test_port_role_object() {
        let scene = Scene {
            objects: vec![port_object("feed", 3)],
            ..Default::default()
        };
        let (compiled, _) = run(scene, CompileSession::new());
        match &compiled.primitives[0] {
            Primitive::Port { number, bbox, direction, impedance, active, .. } => {
                assert_eq!(*number, 3);
                assert_eq!(bbox.max, [0.5, 0.5, 1.6]);
                assert_eq!(*direction, PortDirection::Nz);
                assert_eq!(*impedance, 50.0);
                assert!(*active);
            }
            other => panic!("Expected port, got {:?}", other),
        }
    }

    fn channel(name: &str, domain: AttributeDomain, data: AttributeData) -> AttributeChannel {
        AttributeChannel {
            name: name.into(),
            domain,
            data,
        }
    }

    fn raw_grid() -> CompileConfig {
        let mut config = CompileConfig::default();
        config.smoothing.enabled = false;
        config
    }

    #[test]
    fn test_compiled_serializes_to_json() {
        let (compiled, _) = run(sample_scene(), CompileSession::new());
        let value = serde_json::to_value(&compiled).unwrap();

        let primitives = value["primitives"].as_array().unwrap();
        let dump = primitives
            .iter()
            .find(|p| p["primitive"] == "dump_box")
            .unwrap();
        assert_eq!(dump["object"], "probe");
        assert_eq!(dump["kind"], "h_field");
        assert_eq!(primitives.last().unwrap()["primitive"], "port");
        assert_eq!(value["report"]["status"]["status"], "success");
    }

    #[test]
    fn test_anchor_channel_on_plain_object() {
        let mut wire = SceneObject::new(
            "wire",
            Role::MetalEdges,
            Mesh {
                vertices: vec![[1.25, 0.0, 0.0], [4.0, 0.0, 0.0]],
                edges: vec![[0, 1]],
                faces: Vec::new(),
            },
        );
        wire.geometry.attributes.push(channel(
            ANCHOR,
            AttributeDomain::Point,
            AttributeData::Bool(vec![true, true]),
        ));
        let scene = Scene {
            objects: vec![wire],
            ..Default::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let store = StlStore::new(dir.path());
        let (compiled, _) =
            compile(&JsonScene::from(scene), &store, &raw_grid(), CompileSession::new()).unwrap();
        assert_eq!(compiled.grid.axis(Axis::X).as_slice(), &[1.25, 4.0]);
        assert_eq!(compiled.grid.axis(Axis::Y).as_slice(), &[0.0]);
        assert_eq!(compiled.primitives.len(), 1);
    }

    #[test]
    fn test_bad_anchor_channel_skips_object() {
        let mut wire = SceneObject::new(
            "wire",
            Role::MetalEdges,
            Mesh {
                vertices: vec![[1.25, 0.0, 0.0], [4.0, 0.0, 0.0]],
                edges: vec![[0, 1]],
                faces: Vec::new(),
            },
        );
        wire.geometry.attributes.push(channel(
            ANCHOR,
            AttributeDomain::Point,
            AttributeData::Bool(vec![true]),
        ));
        let scene = Scene {
            objects: vec![wire],
            ..Default::default()
        };
        let (compiled, _) = run(scene, CompileSession::new());
        assert_eq!(compiled.report.status, CompileStatus::Failed);
        assert_eq!(compiled.report.issues[0].object, "wire");
    }

    #[test]
    fn test_short_vertex_group_warns() {
        let mut scene = sample_scene();
        let ground = scene.objects.iter_mut().find(|o| o.name == "ground").unwrap();
        ground.vertex_groups[0].weights.truncate(3);

        let dir = tempfile::tempdir().unwrap();
        let store = StlStore::new(dir.path());
        let (compiled, _) =
            compile(&JsonScene::from(scene), &store, &raw_grid(), CompileSession::new()).unwrap();

        assert!(compiled.report.is_success());
        let ground: Vec<&Issue> =
            compiled.report.warnings.iter().filter(|w| w.object == "ground").collect();
        assert_eq!(ground.len(), 1);
        assert!(ground[0].message.contains("3 weights for 8 vertices"));
        // only the explicit lines are left on x
        assert_eq!(compiled.grid.axis(Axis::X).as_slice(), &[-10.0, 10.0]);
    }

    #[test]
    fn test_procedural_emission() {
        let mut mesh = cube_mesh([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        mesh.edges = vec![[0, 1], [1, 3]];
        let face = AttributeDomain::Face;
        let mut gen = SceneObject::new("gen", Role::Procedural, Mesh::default());
        gen.evaluated = Some(Geometry {
            mesh,
            attributes: vec![
                channel(
                    EPSILON_R,
                    face,
                    AttributeData::Float(vec![4.3, 4.3, 1.0, 1.0, 1.0, 0.0]),
                ),
                channel(
                    USE_KAPPA,
                    face,
                    AttributeData::Bool(vec![false, false, true, true, true, false]),
                ),
                channel(
                    KAPPA,
                    face,
                    AttributeData::Float(vec![0.0, 0.0, 50.0, 50.0, 50.0, 0.0]),
                ),
                channel(PEC_VOLUME, face, AttributeData::Bool(vec![true; 6])),
                channel(
                    PEC_AA_FACE,
                    face,
                    AttributeData::Bool(vec![true, false, false, false, false, false]),
                ),
                channel(
                    PEC_EDGE,
                    AttributeDomain::Edge,
                    AttributeData::Bool(vec![false, true]),
                ),
            ],
        });
        let scene = Scene {
            objects: vec![gen],
            ..Default::default()
        };
        let (compiled, _) = run(scene, CompileSession::new());
        assert!(compiled.report.is_success(), "{:?}", compiled.report);

        let materials: Vec<(f64, Option<f64>, usize, String)> = compiled
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Material {
                    solid,
                    epsilon_r,
                    kappa,
                    ..
                } => Some((
                    *epsilon_r,
                    *kappa,
                    solid.triangle_count,
                    solid.path.file_name()?.to_string_lossy().into_owned(),
                )),
                _ => None,
            })
            .collect();
        assert_eq!(
            materials,
            vec![
                (4.3, None, 4, "gen_material_0.stl".to_string()),
                (1.0, Some(50.0), 6, "gen_material_1.stl".to_string()),
            ]
        );

        let volumes: Vec<usize> = compiled
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::MetalVolume { solid, .. } => Some(solid.triangle_count),
                _ => None,
            })
            .collect();
        assert_eq!(volumes, vec![12]);

        let edges: Vec<[[f64; 3]; 2]> = compiled
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::MetalEdge { points, .. } => Some(*points),
                _ => None,
            })
            .collect();
        assert_eq!(edges, vec![[[1.0, 0.0, 0.0], [1.0, 1.0, 0.0]]]);

        let surfaces: Vec<&AxisPlane> = compiled
            .primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::MetalSurface { plane, .. } => Some(plane),
                _ => None,
            })
            .collect();
        assert_eq!(surfaces.len(), 1);
        assert_eq!(surfaces[0].axis, Axis::Z);
        assert_eq!(surfaces[0].elevation, 0.0);
    }
}
