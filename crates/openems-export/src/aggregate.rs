//! Reduction of procedural attribute channels into solver-ready groups.
//!
//! Channels are produced by the host's procedural generator, one value per
//! point, edge or face. The aggregator only groups and reduces; emission of
//! primitives (and the solid round trip) is left to the compiler.

use crate::error::AttributeError;
use crate::geometry::{round_point, Aabb, Axis};
use crate::scene::{AttributeData, AttributeDomain, Geometry, PortDirection};
use nalgebra::Vector3;
use std::collections::BTreeMap;

pub const PORT_INDEX: &str = "port_index";
pub const PORT_IMPEDANCE: &str = "port_impedance";
pub const PORT_AXIS: &str = "port_axis";
pub const PORT_ACTIVE: &str = "port_active";
pub const PEC_EDGE: &str = "pec_edge";
pub const PEC_AA_FACE: &str = "pec_aa_face";
pub const PEC_VOLUME: &str = "pec_volume";
pub const EPSILON_R: &str = "epsilon_r";
pub const USE_KAPPA: &str = "use_kappa";
pub const KAPPA: &str = "kappa";
pub const ANCHOR: &str = "anchor";

fn domain_name(domain: AttributeDomain) -> &'static str {
    match domain {
        AttributeDomain::Point => "point",
        AttributeDomain::Edge => "edge",
        AttributeDomain::Face => "face",
    }
}

/// Look up a channel, checking its domain and length
fn channel<'a>(
    geometry: &'a Geometry,
    name: &str,
    domain: AttributeDomain,
) -> Result<Option<&'a AttributeData>, AttributeError> {
    let Some(channel) = geometry.checked_channel(name)? else {
        return Ok(None);
    };
    if channel.domain != domain {
        return Err(AttributeError::Domain {
            name: name.to_string(),
            expected: domain_name(domain),
            found: domain_name(channel.domain),
        });
    }
    Ok(Some(&channel.data))
}

fn type_error(name: &str, expected: &'static str, data: &AttributeData) -> AttributeError {
    AttributeError::Type {
        name: name.to_string(),
        expected,
        found: data.type_name(),
    }
}

/// Boolean channel; integer data reads as `!= 0`
pub fn read_bools(
    geometry: &Geometry,
    name: &str,
    domain: AttributeDomain,
) -> Result<Option<Vec<bool>>, AttributeError> {
    match channel(geometry, name, domain)? {
        None => Ok(None),
        Some(AttributeData::Bool(v)) => Ok(Some(v.clone())),
        Some(AttributeData::Int(v)) => Ok(Some(v.iter().map(|i| *i != 0).collect())),
        Some(other) => Err(type_error(name, "bool", other)),
    }
}

/// Float channel; integer data is widened
pub fn read_floats(
    geometry: &Geometry,
    name: &str,
    domain: AttributeDomain,
) -> Result<Option<Vec<f64>>, AttributeError> {
    match channel(geometry, name, domain)? {
        None => Ok(None),
        Some(AttributeData::Float(v)) => Ok(Some(v.clone())),
        Some(AttributeData::Int(v)) => Ok(Some(v.iter().map(|i| *i as f64).collect())),
        Some(other) => Err(type_error(name, "float", other)),
    }
}

pub fn read_ints(
    geometry: &Geometry,
    name: &str,
    domain: AttributeDomain,
) -> Result<Option<Vec<i64>>, AttributeError> {
    match channel(geometry, name, domain)? {
        None => Ok(None),
        Some(AttributeData::Int(v)) => Ok(Some(v.clone())),
        Some(other) => Err(type_error(name, "int", other)),
    }
}

pub fn read_vectors(
    geometry: &Geometry,
    name: &str,
    domain: AttributeDomain,
) -> Result<Option<Vec<[f64; 3]>>, AttributeError> {
    match channel(geometry, name, domain)? {
        None => Ok(None),
        Some(AttributeData::Vector(v)) => Ok(Some(v.clone())),
        Some(other) => Err(type_error(name, "vector", other)),
    }
}

fn companion<T>(value: Option<T>, name: &str, with: &str) -> Result<T, AttributeError> {
    value.ok_or_else(|| AttributeError::MissingCompanion {
        name: name.to_string(),
        with: with.to_string(),
    })
}

/// Indices whose flag is set; a missing channel selects nothing
fn selected(flags: Option<Vec<bool>>) -> Vec<usize> {
    flags
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(i, f)| f.then_some(i))
        .collect()
}

/// All points sharing one port index, reduced
#[derive(Debug, Clone, PartialEq)]
pub struct PortAggregate {
    pub number: u32,
    pub bbox: Aabb,
    /// Axis with the largest mean absolute `port_axis` component
    pub axis: Axis,
    /// Mean signed component on `axis` is negative
    pub reversed: bool,
    pub impedance: f64,
    pub active: bool,
    pub point_count: usize,
}

impl PortAggregate {
    pub fn direction(&self) -> PortDirection {
        PortDirection::new(self.axis, self.reversed)
    }
}

/// Group points with `port_index != 0` by index, in ascending index order.
///
/// `port_impedance` and `port_axis` must accompany `port_index`;
/// `port_active` defaults to inactive.
pub fn aggregate_ports(geometry: &Geometry) -> Result<Vec<PortAggregate>, AttributeError> {
    let point = AttributeDomain::Point;
    let Some(indices) = read_ints(geometry, PORT_INDEX, point)? else {
        return Ok(Vec::new());
    };
    let impedances = companion(
        read_floats(geometry, PORT_IMPEDANCE, point)?,
        PORT_IMPEDANCE,
        PORT_INDEX,
    )?;
    let axes = companion(read_vectors(geometry, PORT_AXIS, point)?, PORT_AXIS, PORT_INDEX)?;
    let active = read_bools(geometry, PORT_ACTIVE, point)?
        .unwrap_or_else(|| vec![false; indices.len()]);

    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, &index) in indices.iter().enumerate() {
        if index == 0 {
            continue;
        }
        let number = u32::try_from(index).map_err(|_| AttributeError::Value {
            name: PORT_INDEX.to_string(),
            index: i,
            reason: format!("{} is not a valid port number", index),
        })?;
        groups.entry(number).or_default().push(i);
    }

    let vertices = &geometry.mesh.vertices;
    let mut ports = Vec::with_capacity(groups.len());
    for (number, members) in groups {
        let n = members.len() as f64;

        let bbox = Aabb::from_corners(members.iter().map(|&i| &vertices[i]))
            .ok_or_else(|| AttributeError::Missing { name: PORT_INDEX.to_string() })?;

        let mut abs_sum = Vector3::zeros();
        let mut signed_sum = Vector3::zeros();
        for &i in &members {
            let a = Vector3::from(axes[i]);
            abs_sum += a.abs();
            signed_sum += a;
        }
        let mut axis = Axis::X;
        for candidate in [Axis::Y, Axis::Z] {
            if abs_sum[candidate.index()] > abs_sum[axis.index()] {
                axis = candidate;
            }
        }
        let reversed = signed_sum[axis.index()] / n < 0.0;

        let impedance = members.iter().map(|&i| impedances[i]).sum::<f64>() / n;
        if !impedance.is_finite() || impedance <= 0.0 {
            return Err(AttributeError::Value {
                name: PORT_IMPEDANCE.to_string(),
                index: members[0],
                reason: format!("port {} has mean impedance {}", number, impedance),
            });
        }

        let active_mean = members.iter().filter(|&&i| active[i]).count() as f64 / n;

        ports.push(PortAggregate {
            number,
            bbox,
            axis,
            reversed,
            impedance,
            active: active_mean > 0.0,
            point_count: members.len(),
        });
    }

    Ok(ports)
}

/// Edges flagged `pec_edge`
pub fn pec_edges(geometry: &Geometry) -> Result<Vec<usize>, AttributeError> {
    Ok(selected(read_bools(geometry, PEC_EDGE, AttributeDomain::Edge)?))
}

/// Faces flagged `pec_aa_face`
pub fn pec_aa_faces(geometry: &Geometry) -> Result<Vec<usize>, AttributeError> {
    Ok(selected(read_bools(geometry, PEC_AA_FACE, AttributeDomain::Face)?))
}

/// Faces flagged `pec_volume`
pub fn pec_volume_faces(geometry: &Geometry) -> Result<Vec<usize>, AttributeError> {
    Ok(selected(read_bools(geometry, PEC_VOLUME, AttributeDomain::Face)?))
}

/// Faces sharing one dielectric parameterisation
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGroup {
    pub epsilon_r: f64,
    /// `Some` only when `use_kappa` is set
    pub kappa: Option<f64>,
    pub faces: Vec<usize>,
}

/// Group faces with `epsilon_r != 0` by `(epsilon_r, use_kappa, kappa)`,
/// in first-seen order. `kappa` is ignored on faces without `use_kappa`.
pub fn material_groups(geometry: &Geometry) -> Result<Vec<MaterialGroup>, AttributeError> {
    let face = AttributeDomain::Face;
    let Some(epsilon) = read_floats(geometry, EPSILON_R, face)? else {
        return Ok(Vec::new());
    };
    let use_kappa = read_bools(geometry, USE_KAPPA, face)?;
    let kappa = read_floats(geometry, KAPPA, face)?;

    let mut groups: Vec<MaterialGroup> = Vec::new();
    for (i, &eps) in epsilon.iter().enumerate() {
        if eps == 0.0 {
            continue;
        }
        if !eps.is_finite() || eps < 0.0 {
            return Err(AttributeError::Value {
                name: EPSILON_R.to_string(),
                index: i,
                reason: format!("relative permittivity {} is not positive", eps),
            });
        }

        let k = match &use_kappa {
            Some(flags) if flags[i] => {
                let values = companion(kappa.as_ref(), KAPPA, USE_KAPPA)?;
                let k = values[i];
                if !k.is_finite() || k < 0.0 {
                    return Err(AttributeError::Value {
                        name: KAPPA.to_string(),
                        index: i,
                        reason: format!("conductivity {} is negative", k),
                    });
                }
                Some(k)
            }
            _ => None,
        };

        match groups.iter_mut().find(|g| g.epsilon_r == eps && g.kappa == k) {
            Some(group) => group.faces.push(i),
            None => groups.push(MaterialGroup {
                epsilon_r: eps,
                kappa: k,
                faces: vec![i],
            }),
        }
    }

    Ok(groups)
}

/// Rounded coordinates of points flagged `anchor`
pub fn anchors(geometry: &Geometry) -> Result<Vec<[f64; 3]>, AttributeError> {
    let flags = read_bools(geometry, ANCHOR, AttributeDomain::Point)?;
    Ok(selected(flags)
        .into_iter()
        .map(|i| round_point(&Vector3::from(geometry.mesh.vertices[i])).into())
        .collect())
}

/// Everything a procedural object contributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregate {
    pub ports: Vec<PortAggregate>,
    pub pec_edges: Vec<usize>,
    pub pec_aa_faces: Vec<usize>,
    pub pec_volume_faces: Vec<usize>,
    pub materials: Vec<MaterialGroup>,
    pub anchors: Vec<[f64; 3]>,
}

impl Aggregate {
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
            && self.pec_edges.is_empty()
            && self.pec_aa_faces.is_empty()
            && self.pec_volume_faces.is_empty()
            && self.materials.is_empty()
            && self.anchors.is_empty()
    }
}

/// Run every reduction; the first channel error fails the whole object
pub fn aggregate(geometry: &Geometry) -> Result<Aggregate, AttributeError> {
    Ok(Aggregate {
        ports: aggregate_ports(geometry)?,
        pec_edges: pec_edges(geometry)?,
        pec_aa_faces: pec_aa_faces(geometry)?,
        pec_volume_faces: pec_volume_faces(geometry)?,
        materials: material_groups(geometry)?,
        anchors: anchors(geometry)?,
    })
}
