//! Typed access to scene-description JSON values.
//!
//! Vectors may be written either as arrays or as a single number that is
//! splatted to every component. Transforms accept look-at frames, axis
//! frames, translate/scale/rotate commands, raw matrices, and arrays of
//! these composed in order.

use serde_json::{Map, Value};
use tern_math::{Mat4, Transform, Vec2, Vec3, Vec4};

use crate::error::{fragment, SceneError, SceneResult};

/// Look up a required field.
pub fn require<'a>(j: &'a Value, key: &str) -> SceneResult<&'a Value> {
    j.get(key).ok_or_else(|| SceneError::missing(key, j))
}

/// Read a required string field.
pub fn require_str<'a>(j: &'a Value, key: &str) -> SceneResult<&'a str> {
    let v = require(j, key)?;
    v.as_str()
        .ok_or_else(|| SceneError::invalid(key, "expected a string", j))
}

pub fn as_f32(v: &Value, field: &str) -> SceneResult<f32> {
    v.as_f64()
        .map(|x| x as f32)
        .ok_or_else(|| SceneError::invalid(field, "expected a number", v))
}

pub fn f32_or(j: &Value, key: &str, default: f32) -> SceneResult<f32> {
    j.get(key).map_or(Ok(default), |v| as_f32(v, key))
}

pub fn u32_or(j: &Value, key: &str, default: u32) -> SceneResult<u32> {
    match j.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_u64()
            .and_then(|x| u32::try_from(x).ok())
            .ok_or_else(|| SceneError::invalid(key, "expected a non-negative integer", v)),
    }
}

pub fn str_or<'a>(j: &'a Value, key: &str, default: &'a str) -> SceneResult<&'a str> {
    match j.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_str()
            .ok_or_else(|| SceneError::invalid(key, "expected a string", v)),
    }
}

/// Read `N` floats from an array of length `N`, or splat a single number.
pub fn to_floats<const N: usize>(v: &Value, field: &str) -> SceneResult<[f32; N]> {
    match v {
        Value::Number(_) => Ok([as_f32(v, field)?; N]),
        Value::Array(items) if items.len() == 1 => Ok([as_f32(&items[0], field)?; N]),
        Value::Array(items) if items.len() == N => {
            let mut out = [0.0; N];
            for (o, item) in out.iter_mut().zip(items) {
                *o = as_f32(item, field)?;
            }
            Ok(out)
        }
        _ => Err(SceneError::invalid(
            field,
            format!("expected a number or an array of {N} numbers"),
            v,
        )),
    }
}

pub fn to_vec2(v: &Value, field: &str) -> SceneResult<Vec2> {
    to_floats::<2>(v, field).map(Vec2::from_array)
}

pub fn to_vec3(v: &Value, field: &str) -> SceneResult<Vec3> {
    to_floats::<3>(v, field).map(Vec3::from_array)
}

pub fn vec2_or(j: &Value, key: &str, default: Vec2) -> SceneResult<Vec2> {
    j.get(key).map_or(Ok(default), |v| to_vec2(v, key))
}

pub fn vec3_or(j: &Value, key: &str, default: Vec3) -> SceneResult<Vec3> {
    j.get(key).map_or(Ok(default), |v| to_vec3(v, key))
}

/// Read an array of exactly `N` vectors (e.g. triangle corners).
pub fn vec3_array<const N: usize>(v: &Value, field: &str) -> SceneResult<[Vec3; N]> {
    let items = v
        .as_array()
        .filter(|items| items.len() == N)
        .ok_or_else(|| SceneError::invalid(field, format!("expected an array of {N} vectors"), v))?;
    let mut out = [Vec3::ZERO; N];
    for (o, item) in out.iter_mut().zip(items) {
        *o = to_vec3(item, field)?;
    }
    Ok(out)
}

pub fn vec2_array<const N: usize>(v: &Value, field: &str) -> SceneResult<[Vec2; N]> {
    let items = v
        .as_array()
        .filter(|items| items.len() == N)
        .ok_or_else(|| SceneError::invalid(field, format!("expected an array of {N} vectors"), v))?;
    let mut out = [Vec2::ZERO; N];
    for (o, item) in out.iter_mut().zip(items) {
        *o = to_vec2(item, field)?;
    }
    Ok(out)
}

/// The `key` transform of an object, or identity when absent.
pub fn transform_or_identity(j: &Value, key: &str) -> SceneResult<Transform> {
    j.get(key).map_or(Ok(Transform::IDENTITY), parse_transform)
}

/// Parse a transform description and check that it is invertible.
pub fn parse_transform(j: &Value) -> SceneResult<Transform> {
    let m = transform_matrix(j)?;
    Transform::new(m).ok_or_else(|| SceneError::SingularTransform {
        fragment: fragment(j),
    })
}

fn transform_matrix(j: &Value) -> SceneResult<Mat4> {
    match j {
        // Later commands apply on top of earlier ones.
        Value::Array(commands) => commands
            .iter()
            .try_fold(Mat4::IDENTITY, |m, cmd| -> SceneResult<Mat4> {
                Ok(transform_matrix(cmd)? * m)
            }),
        Value::Object(obj) => command_matrix(obj, j),
        _ => Err(SceneError::invalid(
            "transform",
            "expected an object or an array of objects",
            j,
        )),
    }
}

fn command_matrix(obj: &Map<String, Value>, j: &Value) -> SceneResult<Mat4> {
    let has_any = |keys: &[&str]| keys.iter().any(|k| obj.contains_key(*k));

    if has_any(&["from", "at", "to", "up"]) {
        let from = vec3_or(j, "from", Vec3::Z)?;
        let at = match obj.get("at").or_else(|| obj.get("to")) {
            Some(v) => to_vec3(v, "at")?,
            None => Vec3::ZERO,
        };
        let up = vec3_or(j, "up", Vec3::Y)?;

        let dir = (from - at).normalize();
        let left = up.cross(dir).normalize();
        let new_up = dir.cross(left);
        Ok(Mat4::from_cols(
            left.extend(0.0),
            new_up.extend(0.0),
            dir.extend(0.0),
            from.extend(1.0),
        ))
    } else if has_any(&["o", "x", "y", "z"]) {
        Ok(Mat4::from_cols(
            vec3_or(j, "x", Vec3::X)?.extend(0.0),
            vec3_or(j, "y", Vec3::Y)?.extend(0.0),
            vec3_or(j, "z", Vec3::Z)?.extend(0.0),
            vec3_or(j, "o", Vec3::ZERO)?.extend(1.0),
        ))
    } else if let Some(v) = obj.get("translate") {
        Ok(Mat4::from_translation(to_vec3(v, "translate")?))
    } else if let Some(v) = obj.get("scale") {
        Ok(Mat4::from_scale(to_vec3(v, "scale")?))
    } else if let Some(v) = obj.get("rotate") {
        let [degrees, ax, ay, az] = match v.as_array() {
            Some(items) if items.len() == 4 => to_floats::<4>(v, "rotate")?,
            _ => {
                return Err(SceneError::invalid(
                    "rotate",
                    "expected [angle_degrees, axis_x, axis_y, axis_z]",
                    v,
                ))
            }
        };
        let axis = Vec3::new(ax, ay, az)
            .try_normalize()
            .ok_or_else(|| SceneError::invalid("rotate", "rotation axis has zero length", v))?;
        Ok(Mat4::from_axis_angle(axis, degrees.to_radians()))
    } else if let Some(v) = obj.get("matrix") {
        matrix_value(v)
    } else {
        Err(SceneError::invalid(
            "transform",
            "unrecognized transform command",
            j,
        ))
    }
}

/// 16 numbers in row-major order, or one number `s` meaning `s * I`.
fn matrix_value(v: &Value) -> SceneResult<Mat4> {
    match v.as_array().map(Vec::len) {
        Some(16) => Ok(Mat4::from_cols_array(&to_floats::<16>(v, "matrix")?).transpose()),
        None | Some(1) => {
            let [s] = to_floats::<1>(v, "matrix")?;
            Ok(Mat4::from_diagonal(Vec4::splat(s)))
        }
        Some(_) => Err(SceneError::invalid(
            "matrix",
            "expected 16 numbers in row-major order or a single scalar",
            v,
        )),
    }
}
