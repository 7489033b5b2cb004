//! Self-checks described in JSON.
//!
//! A document with `"type": "tests"` holds a `tests` array instead of a
//! scene. Each entry is built through the [`Registry`] and run before any
//! rendering happens:
//!
//! ```json
//! {"type": "tests", "tests": [
//!     {"type": "intersection",
//!      "surface": {"type": "sphere", "material": {"type": "lambertian"}},
//!      "ray": {"origin": [0, 0, 4], "direction": [0, 0, -1]},
//!      "t": 3, "p": [0, 0, 1], "gn": [0, 0, 1], "sn": [0, 0, 1]}
//! ]}
//! ```

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tern_core::{json as jv, FileResolver, SceneError, SceneResult};
use tern_math::{Ray, Vec2, Vec3, RAY_EPSILON};
use thiserror::Error;

use crate::factory::{add_surfaces, BuildContext, Registry};
use crate::material::Material;
use crate::surface::{HitInfo, Surface};

const DEFAULT_THRESHOLD: f32 = 1e-5;
const DEFAULT_SCATTER_SAMPLES: u32 = 10_000;
const DEFAULT_SCATTER_SEED: u32 = 53;

/// Why a check did not pass.
#[derive(Error, Debug)]
pub enum TestFailure {
    #[error("could not build test: {0}")]
    Build(#[from] SceneError),

    #[error("ray should not hit the surface, but hit at t = {0}")]
    UnexpectedHit(f32),

    #[error("ray should hit the surface")]
    Missed,

    #[error("{field} incorrect: expected {expected}, got {actual}")]
    Mismatch {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("{count} of {samples} scattered directions were below the surface")]
    BelowHemisphere { count: u32, samples: u32 },
}

/// A check that runs against objects built from the scene registry.
pub trait SceneTest: Send + Sync {
    fn run(&self) -> Result<(), TestFailure>;
}

/// Outcome of a `tests` document.
#[derive(Debug, Default)]
pub struct TestReport {
    pub total: usize,
    /// Index into the `tests` array and the failure.
    pub failures: Vec<(usize, TestFailure)>,
}

impl TestReport {
    pub fn passed(&self) -> usize {
        self.total - self.failures.len()
    }

    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Whether `j` is a `tests` document rather than a scene.
pub fn is_test_document(j: &Value) -> bool {
    j.get("type").and_then(Value::as_str) == Some("tests")
}

/// Run every entry of a `tests` document. Returns `None` for ordinary scenes.
///
/// Only a malformed document is an error; individual failures, including
/// entries that cannot be built, are collected in the report.
pub fn run_tests(
    j: &Value,
    registry: &Registry,
    resolver: &FileResolver,
) -> SceneResult<Option<TestReport>> {
    if !is_test_document(j) {
        return Ok(None);
    }
    let tests = jv::require(j, "tests")?;
    let entries = tests
        .as_array()
        .ok_or_else(|| SceneError::invalid("tests", "expected an array of tests", tests))?;

    let mut report = TestReport {
        total: entries.len(),
        ..TestReport::default()
    };
    for (index, entry) in entries.iter().enumerate() {
        let mut ctx = BuildContext::new(resolver.clone());
        let outcome = registry
            .tests
            .create(entry, registry, &mut ctx)
            .map_err(TestFailure::from)
            .and_then(|test| test.run());

        if let Err(failure) = outcome {
            log::error!("Test {} failed: {}", index, failure);
            report.failures.push((index, failure));
        }
    }

    if report.all_passed() {
        log::info!("Passed all {}/{} tests", report.passed(), report.total);
    } else {
        log::error!("Failed {}/{} tests", report.failures.len(), report.total);
    }
    Ok(Some(report))
}

fn check_close<T: std::fmt::Debug>(
    field: &'static str,
    expected: T,
    actual: T,
    error: f32,
    threshold: f32,
) -> Result<(), TestFailure> {
    if error > threshold || error.is_nan() {
        return Err(TestFailure::Mismatch {
            field,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        });
    }
    Ok(())
}

fn max_abs_error(a: Vec3, b: Vec3) -> f32 {
    (a - b).abs().max_element()
}

/// Intersects one ray with a surface and compares the hit record.
pub struct IntersectionTest {
    surface: Arc<dyn Surface>,
    ray: Ray,
    t: f32,
    p: Vec3,
    gn: Vec3,
    sn: Vec3,
    should_hit: bool,
    threshold: f32,
}

impl IntersectionTest {
    /// Builds `surface`, or the accelerator described by `surfaces`.
    /// A plain `surfaces` array is collected into a group.
    pub fn from_json(j: &Value, registry: &Registry, ctx: &mut BuildContext) -> SceneResult<Self> {
        let surface = if let Some(s) = j.get("surface") {
            single_surface(registry.surfaces.create(s, registry, ctx)?, s)?
        } else if let Some(s) = j.get("surfaces") {
            if s.is_array() {
                let mut group = registry.accelerators.create(&json!({"type": "group"}), registry, ctx)?;
                add_surfaces(group.as_mut(), s, registry, ctx)?;
                group.build()
            } else {
                single_surface(registry.surfaces.create(s, registry, ctx)?, s)?
            }
        } else {
            return Err(SceneError::missing("surface", j));
        };

        let ray_json = jv::require(j, "ray")?;
        let ray = Ray::new(
            jv::to_vec3(jv::require(ray_json, "origin")?, "origin")?,
            jv::to_vec3(jv::require(ray_json, "direction")?, "direction")?,
        );

        Ok(Self {
            surface,
            ray,
            t: jv::as_f32(jv::require(j, "t")?, "t")?,
            p: jv::to_vec3(jv::require(j, "p")?, "p")?,
            gn: jv::to_vec3(jv::require(j, "gn")?, "gn")?,
            sn: jv::to_vec3(jv::require(j, "sn")?, "sn")?,
            should_hit: bool_or(j, "should_hit", true)?,
            threshold: jv::f32_or(j, "threshold", DEFAULT_THRESHOLD)?,
        })
    }
}

impl SceneTest for IntersectionTest {
    fn run(&self) -> Result<(), TestFailure> {
        let mut hit = HitInfo::default();
        let did_hit = self.surface.intersect(&self.ray, &mut hit);

        match (did_hit, self.should_hit) {
            (false, false) => Ok(()),
            (false, true) => Err(TestFailure::Missed),
            (true, false) => Err(TestFailure::UnexpectedHit(hit.t)),
            (true, true) => {
                check_close("t", self.t, hit.t, (self.t - hit.t).abs(), self.threshold)?;
                check_close("p", self.p, hit.p, max_abs_error(self.p, hit.p), self.threshold)?;
                check_close("gn", self.gn, hit.gn, max_abs_error(self.gn, hit.gn), self.threshold)?;
                check_close("sn", self.sn, hit.sn, max_abs_error(self.sn, hit.sn), self.threshold)
            }
        }
    }
}

/// Scatters many rays off a material and checks that opaque materials
/// never send light below the surface.
pub struct ScatterTest {
    material: Arc<dyn Material>,
    normal: Vec3,
    incoming: Vec3,
    samples: u32,
    seed: u64,
}

impl ScatterTest {
    pub fn from_json(j: &Value, registry: &Registry, ctx: &mut BuildContext) -> SceneResult<Self> {
        let normal = jv::to_vec3(jv::require(j, "normal")?, "normal")?;
        let incoming = jv::vec3_or(j, "incoming", Vec3::new(0.0, 0.25, -1.0))?;
        let (Some(normal), Some(incoming)) = (normal.try_normalize(), incoming.try_normalize()) else {
            return Err(SceneError::invalid("normal", "directions must be non-zero", j));
        };

        Ok(Self {
            material: ctx.find_material(registry, j)?,
            normal,
            incoming,
            samples: jv::u32_or(j, "samples", DEFAULT_SCATTER_SAMPLES)?.max(1),
            seed: u64::from(jv::u32_or(j, "seed", DEFAULT_SCATTER_SEED)?),
        })
    }
}

impl SceneTest for ScatterTest {
    fn run(&self) -> Result<(), TestFailure> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let ray = Ray::new(Vec3::ZERO, self.incoming);
        let hit = HitInfo {
            t: 1.0,
            p: Vec3::ZERO,
            gn: self.normal,
            sn: self.normal,
            uv: Vec2::splat(0.5),
            material: self.material.as_ref(),
        };

        let mut below = 0;
        for _ in 0..self.samples {
            if let Some(record) = self.material.scatter(&ray, &hit, &mut rng) {
                let dir = record.scattered.direction.normalize_or_zero();
                if dir.dot(hit.sn) < -RAY_EPSILON {
                    below += 1;
                }
            }
        }

        if below > 0 {
            return Err(TestFailure::BelowHemisphere {
                count: below,
                samples: self.samples,
            });
        }
        Ok(())
    }
}

fn single_surface(mut surfaces: Vec<Arc<dyn Surface>>, j: &Value) -> SceneResult<Arc<dyn Surface>> {
    match surfaces.len() {
        1 => surfaces.pop().ok_or_else(|| SceneError::invalid("surface", "expected one surface", j)),
        _ => Err(SceneError::invalid(
            "surface",
            "expected exactly one surface; use 'surfaces' for meshes",
            j,
        )),
    }
}

fn bool_or(j: &Value, key: &str, default: bool) -> SceneResult<bool> {
    match j.get(key) {
        None => Ok(default),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| SceneError::invalid(key, "expected true or false", v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    use crate::material::{Color, ScatterRecord};

    fn builtins() -> Registry {
        Registry::with_builtins().unwrap()
    }

    fn run(j: &Value) -> TestReport {
        run_tests(j, &builtins(), &FileResolver::new()).unwrap().unwrap()
    }

    fn sphere_test() -> Value {
        json!({
            "type": "intersection",
            "surface": {"type": "sphere", "radius": 1, "material": {"type": "lambertian"}},
            "ray": {"origin": [0, 0, 4], "direction": [0, 0, -1]},
            "t": 3, "p": [0, 0, 1], "gn": [0, 0, 1], "sn": [0, 0, 1]
        })
    }

    #[test]
    fn test_scene_is_not_a_test_document() {
        let scene = json!({"camera": {"resolution": 4}});
        assert!(!is_test_document(&scene));
        assert!(run_tests(&scene, &builtins(), &FileResolver::new()).unwrap().is_none());
    }

    #[test]
    fn test_passing_intersections() {
        let _ = env_logger::builder().is_test(true).try_init();
        let report = run(&json!({"type": "tests", "tests": [
            sphere_test(),
            {
                "type": "intersection",
                "surface": {"type": "quad", "size": 2, "material": {"type": "lambertian"},
                            "transform": {"translate": [0, 0, -1]}},
                "ray": {"origin": [5, 0, 0], "direction": [0, 0, -1]},
                "t": 0, "p": [0, 0, 0], "gn": [0, 0, 0], "sn": [0, 0, 0],
                "should_hit": false
            },
            {
                "type": "intersection",
                "surfaces": {"type": "bvh", "children": [
                    {"type": "sphere", "material": {"type": "lambertian"},
                     "transform": {"translate": [0, 0, -10]}},
                    {"type": "sphere", "material": {"type": "lambertian"},
                     "transform": {"translate": [0, 0, -5]}}
                ]},
                "ray": {"origin": [0, 0, 0], "direction": [0, 0, -1]},
                "t": 4, "p": [0, 0, -4], "gn": [0, 0, 1], "sn": [0, 0, 1]
            },
            {
                "type": "scatter material",
                "material": {"type": "metal", "roughness": 0.5},
                "normal": [0, 0, 1],
                "samples": 500
            }
        ]}));

        assert_eq!(report.total, 4);
        assert!(report.all_passed(), "{:?}", report.failures);
    }

    #[test]
    fn test_failures_are_reported_per_entry() {
        let mut wrong_t = sphere_test();
        wrong_t["t"] = json!(2.5);
        let mut should_miss = sphere_test();
        should_miss["should_hit"] = json!(false);
        let mut loose = sphere_test();
        loose["t"] = json!(3.05);
        loose["threshold"] = json!(0.1);

        let report = run(&json!({"type": "tests", "tests": [
            wrong_t,
            should_miss,
            loose,
            {"type": "intersection", "ray": {"origin": [0, 0, 0], "direction": [0, 0, 1]}},
            {"type": "photon map"}
        ]}));

        assert_eq!(report.total, 5);
        assert_eq!(report.passed(), 1);
        let failed: Vec<usize> = report.failures.iter().map(|(i, _)| *i).collect();
        assert_eq!(failed, vec![0, 1, 3, 4]);
        assert!(matches!(report.failures[0].1, TestFailure::Mismatch { field: "t", .. }));
        assert!(matches!(report.failures[1].1, TestFailure::UnexpectedHit(_)));
        assert!(matches!(report.failures[2].1, TestFailure::Build(SceneError::MissingField { .. })));
        assert!(matches!(
            report.failures[3].1,
            TestFailure::Build(SceneError::UnknownType { kind: "test", .. })
        ));
    }

    #[test]
    fn test_miss_when_hit_expected() {
        let mut j = sphere_test();
        j["ray"]["direction"] = json!([0, 1, 0]);
        let report = run(&json!({"type": "tests", "tests": [j]}));
        assert!(matches!(report.failures[0].1, TestFailure::Missed));
    }

    struct Downward;

    impl Material for Downward {
        fn scatter(&self, _ray: &Ray, hit: &HitInfo, _rng: &mut dyn RngCore) -> Option<ScatterRecord> {
            Some(ScatterRecord {
                attenuation: Color::ONE,
                scattered: Ray::new(hit.p, -hit.sn),
            })
        }
    }

    #[test]
    fn test_scatter_below_surface_fails() {
        let mut registry = builtins();
        registry
            .materials
            .register("downward", |_, _, _| Ok(Arc::new(Downward) as Arc<dyn Material>))
            .unwrap();

        let j = json!({"type": "tests", "tests": [
            {"type": "scatter material", "material": {"type": "downward"},
             "normal": [0, 1, 0], "samples": 10},
            {"type": "scatter material", "material": {"type": "lambertian"},
             "normal": [0, 1, 0], "samples": 1000}
        ]});
        let report = run_tests(&j, &registry, &FileResolver::new()).unwrap().unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0],
            (0, TestFailure::BelowHemisphere { count: 10, samples: 10 })
        ));
    }

    #[test]
    fn test_malformed_document() {
        let j = json!({"type": "tests", "tests": {"type": "intersection"}});
        assert!(matches!(
            run_tests(&j, &builtins(), &FileResolver::new()),
            Err(SceneError::InvalidValue { .. })
        ));
    }
}
