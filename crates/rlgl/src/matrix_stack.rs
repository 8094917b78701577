//! Fixed-function matrix emulation.
//!
//! Two tracked matrices (projection, modelview) and one bounded stack shared
//! by both. Operations compose the way `glTranslatef` and friends do:
//! `current = current * op`, so the operation issued last touches a vertex
//! first.

use crate::math::{self, Mat4, Vec3};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MatrixMode {
    Projection,
    ModelView,
}

#[derive(Debug, Clone)]
pub struct MatrixStack {
    projection: Mat4,
    modelview: Mat4,
    mode: MatrixMode,
    stack: Vec<Mat4>,
    capacity: usize,
}

impl MatrixStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
            mode: MatrixMode::ModelView,
            stack: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    #[inline]
    pub fn set_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
    }

    #[inline]
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    #[inline]
    pub fn modelview(&self) -> &Mat4 {
        &self.modelview
    }

    #[inline]
    pub fn set_projection(&mut self, m: Mat4) {
        self.projection = m;
    }

    #[inline]
    pub fn set_modelview(&mut self, m: Mat4) {
        self.modelview = m;
    }

    /// Matrix the next operation mutates.
    #[inline]
    pub fn current(&self) -> &Mat4 {
        match self.mode {
            MatrixMode::Projection => &self.projection,
            MatrixMode::ModelView => &self.modelview,
        }
    }

    #[inline]
    fn current_mut(&mut self) -> &mut Mat4 {
        match self.mode {
            MatrixMode::Projection => &mut self.projection,
            MatrixMode::ModelView => &mut self.modelview,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Saves the active matrix and resets it to identity.
    ///
    /// Returns `false` without touching anything when the stack is full.
    pub fn push(&mut self) -> bool {
        if self.stack.len() >= self.capacity {
            log::error!("RLGL: matrix stack overflow (capacity {})", self.capacity);
            return false;
        }
        let saved = *self.current();
        self.stack.push(saved);
        *self.current_mut() = Mat4::IDENTITY;
        true
    }

    /// Restores the last saved matrix into the active one. No-op when empty.
    pub fn pop(&mut self) -> bool {
        let Some(saved) = self.stack.pop() else {
            return false;
        };
        *self.current_mut() = saved;
        true
    }

    /// `current = current * m`.
    #[inline]
    pub fn multiply(&mut self, m: &Mat4) {
        let cur = self.current_mut();
        *cur = *cur * *m;
    }

    #[inline]
    pub fn load_identity(&mut self) {
        *self.current_mut() = Mat4::IDENTITY;
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.multiply(&Mat4::from_translation(Vec3::new(x, y, z)));
    }

    /// `angle` in degrees; the axis does not need to be unit length.
    pub fn rotate(&mut self, angle_deg: f32, x: f32, y: f32, z: f32) {
        self.multiply(&math::rotation(Vec3::new(x, y, z), angle_deg.to_radians()));
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.multiply(&Mat4::from_scale(Vec3::new(x, y, z)));
    }

    /// Matrix saved in stack slot `slot` by an earlier push.
    #[inline]
    pub fn saved(&self, slot: usize) -> Option<&Mat4> {
        self.stack.get(slot)
    }

    /// Modelview transform accumulated since the push that saved stack slot
    /// `base`: the frames saved above it, then the current modelview.
    pub fn local_transform(&self, base: usize) -> Mat4 {
        let above = self.stack.get(base + 1..).unwrap_or(&[]);
        above
            .iter()
            .fold(Mat4::IDENTITY, |acc, m| acc * *m)
            * self.modelview
    }
}
