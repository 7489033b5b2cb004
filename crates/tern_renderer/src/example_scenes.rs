//! Built-in demo scenes, described in the same JSON format as scene files.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Number of built-in scenes.
pub const EXAMPLE_SCENE_COUNT: usize = 4;

const NAME_PREFIX: &str = "example_scene";

/// Look up a built-in scene by its name, `example_scene0` and up.
pub fn example_scene_by_name(name: &str) -> Option<Value> {
    let index = name.strip_prefix(NAME_PREFIX)?.parse().ok()?;
    example_scene(index)
}

pub fn example_scene(index: usize) -> Option<Value> {
    match index {
        0 => Some(single_sphere()),
        1 => Some(sphere_on_ground()),
        2 => Some(sphere_grid()),
        3 => Some(random_spheres(2024)),
        _ => None,
    }
}

fn single_sphere() -> Value {
    json!({
        "camera": {
            "transform": {"from": [0, 0, 4], "at": [0, 0, 0], "up": [0, 1, 0]},
            "vfov": 45,
            "resolution": [640, 480]
        },
        "sampler": {"samples": 16},
        "background": [1, 1, 1],
        "surfaces": [
            {"type": "sphere", "radius": 1, "material": {"type": "lambertian", "albedo": [0.6, 0.4, 0.4]}}
        ]
    })
}

fn sphere_on_ground() -> Value {
    json!({
        "camera": {
            "transform": {"from": [0, 1, 5], "at": [0, 0.25, 0], "up": [0, 1, 0]},
            "vfov": 40,
            "resolution": [640, 480]
        },
        "sampler": {"samples": 32},
        "background": {"type": "gradient", "bottom": [1, 1, 1], "top": [0.5, 0.7, 1.0]},
        "surfaces": [
            {
                "type": "quad",
                "size": 100,
                "transform": [{"rotate": [-90, 1, 0, 0]}, {"translate": [0, -1, 0]}],
                "material": {"type": "lambertian", "albedo": 0.5}
            },
            {"type": "sphere", "radius": 1, "material": {"type": "metal", "albedo": [0.8, 0.6, 0.2], "roughness": 0.2}}
        ]
    })
}

fn sphere_grid() -> Value {
    let mut surfaces = vec![json!({
        "type": "quad",
        "size": 40,
        "transform": [{"rotate": [-90, 1, 0, 0]}, {"translate": [0, -0.5, 0]}],
        "material": {"type": "lambertian", "albedo": [0.7, 0.7, 0.7]}
    })];

    for row in 0..4 {
        for col in 0..4 {
            let hue = (row * 4 + col) as f32 / 16.0;
            let albedo = [
                0.5 + 0.5 * (6.283 * hue).cos(),
                0.5 + 0.5 * (6.283 * (hue + 0.33)).cos(),
                0.5 + 0.5 * (6.283 * (hue + 0.67)).cos(),
            ];
            let material = if (row + col) % 3 == 0 {
                json!({"type": "metal", "albedo": albedo, "roughness": 0.05})
            } else {
                json!({"type": "lambertian", "albedo": albedo})
            };
            surfaces.push(json!({
                "type": "sphere",
                "radius": 0.45,
                "transform": {"translate": [col as f32 - 1.5, 0, row as f32 * -1.2]},
                "material": material
            }));
        }
    }

    json!({
        "camera": {
            "transform": {"from": [0, 3, 4], "at": [0, 0, -1.5], "up": [0, 1, 0]},
            "vfov": 45,
            "resolution": [640, 480]
        },
        "sampler": {"samples": 32},
        "background": {"type": "gradient", "bottom": [1, 1, 1], "top": [0.5, 0.7, 1.0]},
        "accelerator": {"type": "bvh", "split_method": "sah"},
        "surfaces": surfaces
    })
}

/// Field of small random spheres around three large ones.
fn random_spheres(seed: u64) -> Value {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut surfaces = vec![json!({
        "type": "sphere",
        "radius": 1000,
        "transform": {"translate": [0, -1000, 0]},
        "material": {"type": "lambertian", "albedo": 0.5}
    })];

    for a in -11..11 {
        for b in -11..11 {
            let choose_mat: f32 = rng.gen();
            let center = [
                a as f32 + 0.9 * rng.gen::<f32>(),
                0.2,
                b as f32 + 0.9 * rng.gen::<f32>(),
            ];
            let dx = center[0] - 4.0;
            let dz = center[2];
            if (dx * dx + dz * dz).sqrt() <= 0.9 {
                continue;
            }

            let material = if choose_mat < 0.8 {
                let albedo: [f32; 3] = std::array::from_fn(|_| rng.gen::<f32>() * rng.gen::<f32>());
                json!({"type": "lambertian", "albedo": albedo})
            } else if choose_mat < 0.95 {
                let albedo: [f32; 3] = std::array::from_fn(|_| rng.gen_range(0.5..1.0));
                json!({"type": "metal", "albedo": albedo, "roughness": rng.gen_range(0.0..0.5)})
            } else {
                json!({"type": "dielectric", "ior": 1.5})
            };

            surfaces.push(json!({
                "type": "sphere",
                "radius": 0.2,
                "transform": {"translate": center},
                "material": material
            }));
        }
    }

    surfaces.push(json!({
        "type": "sphere", "radius": 1.0,
        "transform": {"translate": [0, 1, 0]},
        "material": {"type": "dielectric", "ior": 1.5}
    }));
    surfaces.push(json!({
        "type": "sphere", "radius": 1.0,
        "transform": {"translate": [-4, 1, 0]},
        "material": {"type": "lambertian", "albedo": [0.4, 0.2, 0.1]}
    }));
    surfaces.push(json!({
        "type": "sphere", "radius": 1.0,
        "transform": {"translate": [4, 1, 0]},
        "material": {"type": "metal", "albedo": [0.7, 0.6, 0.5], "roughness": 0}
    }));

    json!({
        "camera": {
            "transform": {"from": [13, 2, 3], "at": [0, 0, 0], "up": [0, 1, 0]},
            "vfov": 20,
            "fdist": 10,
            "aperture": 0.1,
            "resolution": [600, 338]
        },
        "sampler": {"samples": 32},
        "integrator": {"max_depth": 50},
        "background": {"type": "gradient", "bottom": [1, 1, 1], "top": [0.5, 0.7, 1.0]},
        "accelerator": {"type": "bvh", "split_method": "sah"},
        "surfaces": surfaces
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::load_scene;
    use crate::renderer::CancelToken;

    #[test]
    fn test_all_example_scenes_parse() {
        for index in 0..EXAMPLE_SCENE_COUNT {
            let j = example_scene(index).unwrap();
            let scene = load_scene(&j);
            assert!(scene.is_ok(), "example_scene{}: {:?}", index, scene.err());
        }
        assert!(example_scene(EXAMPLE_SCENE_COUNT).is_none());
    }

    #[test]
    fn test_example_scene_names() {
        assert_eq!(example_scene_by_name("example_scene2"), example_scene(2));
        assert!(example_scene_by_name("example_scene").is_none());
        assert!(example_scene_by_name("example_scene9").is_none());
        assert!(example_scene_by_name("scene.json").is_none());
    }

    #[test]
    fn test_random_spheres_are_reproducible() {
        assert_eq!(random_spheres(7), random_spheres(7));
        assert_ne!(random_spheres(7), random_spheres(8));
        let count = random_spheres(7)["surfaces"].as_array().unwrap().len();
        assert!(count > 300);
    }

    #[test]
    fn test_small_render_of_example_scene() {
        let mut j = example_scene(1).unwrap();
        j["camera"]["resolution"] = json!([12, 9]);
        j["sampler"]["samples"] = json!(2);

        let image = load_scene(&j).unwrap().raytrace(&CancelToken::new()).unwrap();
        assert_eq!(image.pixels.len(), 12 * 9);
        assert!(image.pixels.iter().all(|c| c.is_finite()));
    }
}
