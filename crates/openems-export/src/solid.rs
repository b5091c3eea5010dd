//! Solid round trip: selected faces are written as binary STL and read back
//! through the same reader the solver uses (CSXCAD's polyhedron reader).

use crate::error::SolidError;
use crate::geometry::Aabb;
use crate::scene::Mesh;
use nalgebra::Vector3;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Source vertices plus the faces selected for one solid
#[derive(Debug, Clone, PartialEq)]
pub struct SolidPayload {
    /// Owning object name
    pub object: String,
    /// Distinguishes several solids of one object (`volume`, `material_0`...)
    pub tag: String,
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<Vec<usize>>,
}

impl SolidPayload {
    /// Take all vertices of `mesh` and the faces listed in `faces`.
    pub fn from_faces<I>(object: &str, tag: &str, mesh: &Mesh, faces: I) -> Result<Self, SolidError>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut selected = Vec::new();
        for face in faces {
            let loop_ = mesh
                .faces
                .get(face)
                .ok_or_else(|| SolidError::Mesh {
                    name: object.to_string(),
                    source: crate::error::SceneError::BadFace { face },
                })?;
            if let Some(&index) = loop_.iter().find(|&&i| i >= mesh.vertices.len()) {
                return Err(SolidError::Mesh {
                    name: object.to_string(),
                    source: crate::error::SceneError::BadVertexIndex {
                        index,
                        count: mesh.vertices.len(),
                    },
                });
            }
            selected.push(loop_.clone());
        }

        Ok(Self {
            object: object.to_string(),
            tag: tag.to_string(),
            vertices: mesh.vertices.clone(),
            faces: selected,
        })
    }

    /// Fan triangulation of every face with at least three vertices
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        self.faces
            .iter()
            .filter(|f| f.len() >= 3)
            .flat_map(|f| (1..f.len() - 1).map(move |i| [f[0], f[i], f[i + 1]]))
            .collect()
    }
}

/// A solid as the solver will see it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolidRef {
    pub path: PathBuf,
    pub bbox: Aabb,
    pub triangle_count: usize,
}

/// Round-trip service for solids
pub trait SolidStore {
    /// Deterministic file location of a solid
    fn path_for(&self, object: &str, tag: &str) -> PathBuf;

    fn write_solid(&self, payload: &SolidPayload) -> Result<PathBuf, SolidError>;

    fn read_solid(&self, path: &Path) -> Result<SolidRef, SolidError>;

    /// Write, then re-read. No retry on failure.
    fn round_trip(&self, payload: &SolidPayload) -> Result<SolidRef, SolidError> {
        let path = self.write_solid(payload)?;
        self.read_solid(&path)
    }
}

/// Replace anything but ASCII alphanumerics, `-` and `_` with `_`
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Binary STL files in one directory
#[derive(Debug, Clone)]
pub struct StlStore {
    dir: PathBuf,
}

impl StlStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SolidStore for StlStore {
    fn path_for(&self, object: &str, tag: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.stl", sanitize_name(object), sanitize_name(tag)))
    }

    fn write_solid(&self, payload: &SolidPayload) -> Result<PathBuf, SolidError> {
        let triangles = payload.triangles();
        if triangles.is_empty() {
            return Err(SolidError::Empty(payload.object.clone()));
        }

        let path = self.path_for(&payload.object, &payload.tag);
        let write_err = |source| SolidError::Write {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(write_err)?;

        let stl: Vec<stl_io::Triangle> = triangles
            .iter()
            .map(|t| {
                let p = t.map(|i| Vector3::from(payload.vertices[i]));
                let n = (p[1] - p[0])
                    .cross(&(p[2] - p[0]))
                    .try_normalize(1e-12)
                    .unwrap_or_else(Vector3::z);
                stl_io::Triangle {
                    normal: stl_io::Normal::new(to_f32(&n)),
                    vertices: p.map(|v| stl_io::Vertex::new(to_f32(&v))),
                }
            })
            .collect();

        let file = File::create(&path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);
        stl_io::write_stl(&mut writer, stl.iter()).map_err(write_err)?;

        tracing::debug!("Wrote {} triangles to {:?}", stl.len(), path);
        Ok(path)
    }

    fn read_solid(&self, path: &Path) -> Result<SolidRef, SolidError> {
        let read_err = |source| SolidError::Read {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(read_err)?;
        let mesh = stl_io::read_stl(&mut file).map_err(read_err)?;

        let corners: Vec<[f64; 3]> = mesh
            .vertices
            .iter()
            .map(|v| [v[0] as f64, v[1] as f64, v[2] as f64])
            .collect();
        let bbox = Aabb::from_corners(&corners).ok_or_else(|| {
            read_err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "solid has no vertices",
            ))
        })?;

        Ok(SolidRef {
            path: path.to_path_buf(),
            bbox,
            triangle_count: mesh.faces.len(),
        })
    }
}

fn to_f32(v: &Vector3<f64>) -> [f32; 3] {
    [v.x as f32, v.y as f32, v.z as f32]
}
