use crate::backend::{GpuBackend, UniformValue};
use crate::context::Rlgl;
use crate::math::Vec3;

/// Light types, in the order the standard shader's `type` field expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LightKind {
    Point,
    Directional,
    Spot,
}

impl LightKind {
    #[inline]
    fn shader_index(self) -> i32 {
        match self {
            LightKind::Point => 0,
            LightKind::Directional => 1,
            LightKind::Spot => 2,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Light {
    /// Slot in the pool; changes when an earlier light is destroyed.
    pub id: usize,
    pub enabled: bool,
    pub kind: LightKind,
    pub position: Vec3,
    /// Directional and spot lights point from `position` towards `target`.
    pub target: Vec3,
    pub radius: f32,
    pub diffuse: [u8; 4],
    pub intensity: f32,
    /// Degrees.
    pub cone_angle: f32,
}

/// Fixed-size pool kept dense: destroying a light shifts the later ones
/// down and renumbers them.
#[derive(Debug, Clone)]
pub struct LightPool {
    lights: Vec<Light>,
    capacity: usize,
}

impl LightPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            lights: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[inline]
    pub fn get_mut(&mut self, id: usize) -> Option<&mut Light> {
        self.lights.get_mut(id)
    }

    /// Takes the first free slot. `None` when the pool is full.
    pub fn create(&mut self, kind: LightKind, position: Vec3, diffuse: [u8; 4]) -> Option<usize> {
        if self.lights.len() >= self.capacity {
            log::error!("RLGL: light pool full ({} lights)", self.capacity);
            return None;
        }
        let id = self.lights.len();
        self.lights.push(Light {
            id,
            enabled: true,
            kind,
            position,
            target: Vec3::ZERO,
            radius: 10.0,
            diffuse,
            intensity: 1.0,
            cone_angle: 30.0,
        });
        Some(id)
    }

    /// Removes light `id` and renumbers the ones after it.
    pub fn destroy(&mut self, id: usize) -> bool {
        if id >= self.lights.len() {
            return false;
        }
        self.lights.remove(id);
        for (i, light) in self.lights.iter_mut().enumerate().skip(id) {
            light.id = i;
        }
        true
    }
}

/// Uniform locations of one `lights[i]` entry in the standard shader.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LightLocations {
    pub enabled: i32,
    pub kind: i32,
    pub position: i32,
    pub direction: i32,
    pub radius: i32,
    pub diffuse: i32,
    pub intensity: i32,
    pub cone_angle: i32,
}

impl<B: GpuBackend> Rlgl<B> {
    pub fn create_light(&mut self, kind: LightKind, position: Vec3, diffuse: [u8; 4]) -> Option<usize> {
        self.lights.create(kind, position, diffuse)
    }

    pub fn destroy_light(&mut self, id: usize) -> bool {
        self.lights.destroy(id)
    }

    #[inline]
    pub fn lights(&self) -> &[Light] {
        self.lights.lights()
    }

    #[inline]
    pub fn light_mut(&mut self, id: usize) -> Option<&mut Light> {
        self.lights.get_mut(id)
    }

    pub(crate) fn resolve_light_locations(&mut self, program: u32) -> Vec<LightLocations> {
        (0..self.lights.capacity())
            .map(|i| {
                let mut loc = |field: &str| self.backend.uniform_location(program, &format!("lights[{i}].{field}"));
                LightLocations {
                    enabled: loc("enabled"),
                    kind: loc("type"),
                    position: loc("position"),
                    direction: loc("direction"),
                    radius: loc("radius"),
                    diffuse: loc("diffuse"),
                    intensity: loc("intensity"),
                    cone_angle: loc("coneAngle"),
                }
            })
            .collect()
    }

    /// Writes the pool into the bound standard shader. Slots past the last
    /// light are disabled.
    pub(crate) fn upload_lights(&mut self) {
        for (i, locs) in self.light_locations.iter().enumerate() {
            let Some(light) = self.lights.lights().get(i) else {
                self.backend.set_uniform(locs.enabled, UniformValue::Int(0));
                continue;
            };
            self.backend.set_uniform(locs.enabled, UniformValue::Int(light.enabled as i32));
            self.backend.set_uniform(locs.kind, UniformValue::Int(light.kind.shader_index()));
            self.backend.set_uniform(locs.position, UniformValue::Vec3(light.position.to_array()));
            let direction = (light.target - light.position).normalize_or_zero();
            self.backend.set_uniform(locs.direction, UniformValue::Vec3(direction.to_array()));
            self.backend.set_uniform(locs.radius, UniformValue::Float(light.radius));
            let [r, g, b, a] = light.diffuse.map(|c| c as f32 / 255.0);
            self.backend.set_uniform(locs.diffuse, UniformValue::Vec4([r, g, b, a]));
            self.backend.set_uniform(locs.intensity, UniformValue::Float(light.intensity));
            self.backend.set_uniform(locs.cone_angle, UniformValue::Float(light.cone_angle));
        }
    }
}
