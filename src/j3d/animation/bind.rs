//! Attaching animations to a model and driving its state.
//!
//! Binding checks an animation against the model once and resolves its
//! targets (joints, materials by name, shapes). Applying a binding at a
//! frame overwrites the animated fields of an [`AnimatedState`], which
//! starts as a copy of the model's rest state.

use super::{Animation, Curve};
use crate::errors::{incompatible, Result};
use crate::gx::{Color, ColorS16, MAX_TEXTURES, MAX_TEXTURE_MATRICES};
use crate::binary::fixed::Angle;
use crate::j3d::jnt1::Joint;
use crate::j3d::material::Material;
use crate::j3d::model::Model;
use std::rc::Rc;

/// The parts of a model animations may change.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimatedState {
    pub joints: Vec<Joint>,
    pub materials: Vec<Material>,
    pub shape_visibility: Vec<bool>,
}

impl AnimatedState {
    pub fn new(model: &Model) -> AnimatedState {
        AnimatedState {
            joints: model.joints.clone(),
            materials: model.materials.clone(),
            shape_visibility: vec![true; model.shapes.len()],
        }
    }

    /// Back to the rest pose.
    pub fn reset(&mut self, model: &Model) {
        *self = AnimatedState::new(model);
    }
}

/// An animation checked against a model.
#[derive(Clone, Debug)]
pub struct Binding {
    pub animation: Rc<Animation>,
    /// Material index for each track, for the material animations. For
    /// TRK1, register tracks come first, then konst tracks.
    targets: Vec<usize>,
}

fn find_material(model: &Model, name: &str) -> Result<usize> {
    model.materials.iter().position(|m| m.name == name).ok_or_else(|| {
        incompatible(format!("animation targets material {:?}, which the model doesn't have", name))
    })
}

impl Binding {
    pub fn new(animation: Rc<Animation>, model: &Model) -> Result<Binding> {
        let mut targets = vec![];
        match *animation {
            Animation::Joint(ref a) => {
                if a.joints.len() != model.joints.len() {
                    bail!(incompatible(format!(
                        "animation has {} joints, model has {}", a.joints.len(), model.joints.len(),
                    )));
                }
            }
            Animation::TextureMatrix(ref a) => {
                for t in &a.tracks {
                    if t.texture_matrix as usize >= MAX_TEXTURE_MATRICES {
                        bail!(incompatible(format!("texture matrix {} out of range", t.texture_matrix)));
                    }
                    targets.push(find_material(model, &t.material_name)?);
                }
            }
            Animation::TevRegister(ref a) => {
                for t in a.register_tracks.iter().chain(&a.konst_tracks) {
                    if t.register > 3 {
                        bail!(incompatible(format!("color register {} out of range", t.register)));
                    }
                    targets.push(find_material(model, &t.material_name)?);
                }
            }
            Animation::MaterialColor(ref a) => {
                for t in &a.tracks {
                    targets.push(find_material(model, &t.material_name)?);
                }
            }
            Animation::TexturePattern(ref a) => {
                for t in &a.tracks {
                    if t.texture_slot as usize >= MAX_TEXTURES {
                        bail!(incompatible(format!("texture slot {} out of range", t.texture_slot)));
                    }
                    if let Some(&i) = t.textures.iter().find(|&&i| i as usize >= model.textures.len()) {
                        bail!(incompatible(format!(
                            "animation uses texture {}, model has {}", i, model.textures.len(),
                        )));
                    }
                    targets.push(find_material(model, &t.material_name)?);
                }
            }
            Animation::Visibility(ref a) => {
                if a.shapes.len() != model.shapes.len() {
                    bail!(incompatible(format!(
                        "animation has {} shapes, model has {}", a.shapes.len(), model.shapes.len(),
                    )));
                }
            }
        }
        Ok(Binding { animation, targets })
    }

    /// Writes the animated values at playback frame `frame` into `state`.
    /// `state` must come from the model this was bound to.
    pub fn apply(&self, frame: f32, state: &mut AnimatedState) {
        let anim = &*self.animation;
        let t = anim.loop_mode().local_time(frame, anim.duration());
        match *anim {
            Animation::Joint(ref a) => {
                for (joint, curves) in state.joints.iter_mut().zip(&a.joints) {
                    for i in 0..3 {
                        joint.scale[i] = curves[i].scale.sample(t);
                        joint.rotation[i] = curves[i].rotation.sample(t);
                        joint.translation[i] = curves[i].translation.sample(t);
                    }
                }
            }
            Animation::TextureMatrix(ref a) => {
                for (track, &m) in a.tracks.iter().zip(&self.targets) {
                    let matrix = &mut state.materials[m].texture_matrices[track.texture_matrix as usize];
                    let c = &track.components;
                    matrix.center = track.center;
                    matrix.scale = [c[0].scale.sample(t), c[1].scale.sample(t)];
                    matrix.rotation = Angle(c[2].rotation.sample(t));
                    matrix.translation = [c[0].translation.sample(t), c[1].translation.sample(t)];
                }
            }
            Animation::TevRegister(ref a) => {
                let n = a.register_tracks.len();
                for (track, &m) in a.register_tracks.iter().zip(&self.targets[..n]) {
                    let material = &mut state.materials[m];
                    let color = sample_color_s16(&track.curves, t);
                    match track.register {
                        3 => material.tev_color_previous = color,
                        r => material.tev_colors[r as usize] = color,
                    }
                }
                for (track, &m) in a.konst_tracks.iter().zip(&self.targets[n..]) {
                    state.materials[m].kcolors[track.register as usize] = sample_color(&track.curves, t);
                }
            }
            Animation::MaterialColor(ref a) => {
                for (track, &m) in a.tracks.iter().zip(&self.targets) {
                    state.materials[m].channels[0].material_color = sample_color(&track.curves, t);
                }
            }
            Animation::TexturePattern(ref a) => {
                for (track, &m) in a.tracks.iter().zip(&self.targets) {
                    if let Some(texture) = track.sample(t) {
                        state.materials[m].texture_indices[track.texture_slot as usize] = Some(texture);
                    }
                }
            }
            Animation::Visibility(ref a) => {
                for (i, visible) in state.shape_visibility.iter_mut().enumerate() {
                    *visible = a.sample(i, t);
                }
            }
        }
    }
}

fn sample_color(curves: &[Curve; 4], t: f32) -> Color {
    let c = |i: usize| curves[i].sample(t).round().max(0.0).min(255.0) as u8;
    Color::new(c(0), c(1), c(2), c(3))
}

fn sample_color_s16(curves: &[Curve; 4], t: f32) -> ColorS16 {
    let c = |i: usize| curves[i].sample(t).round().max(-1024.0).min(1023.0) as i16;
    ColorS16::new(c(0), c(1), c(2), c(3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::animation::{ank1, tpt1, trk1, ttk1};
    use crate::j3d::model::tests::sample_model;

    #[test]
    fn joint_animation_needs_matching_joints() {
        let model = sample_model();
        let anim = Rc::new(Animation::Joint(ank1::tests::sample()));
        assert!(Binding::new(anim.clone(), &model).is_err());

        let mut model = model;
        model.joints.push(Joint::default());
        let binding = Binding::new(anim, &model).unwrap();
        let mut state = AnimatedState::new(&model);
        binding.apply(15.0, &mut state);
        assert_eq!(state.joints[1].rotation[1], 45.0);
        assert_eq!(state.joints[1].translation[2], 5.0);
        // Repeat: frame 45 samples time 15.
        binding.apply(45.0, &mut state);
        assert_eq!(state.joints[1].rotation[1], 45.0);
    }

    #[test]
    fn unknown_material_is_incompatible() {
        let model = sample_model();
        let anim = Rc::new(Animation::TevRegister(trk1::tests::sample("nope")));
        assert!(Binding::new(anim, &model).is_err());
    }

    #[test]
    fn material_animations() {
        let model = sample_model();
        let mut state = AnimatedState::new(&model);

        let regs = Binding::new(Rc::new(Animation::TevRegister(trk1::tests::sample("quad"))), &model).unwrap();
        regs.apply(10.0, &mut state);
        assert_eq!(state.materials[0].tev_colors[1], ColorS16::new(128, 0, -20, 255));

        let texmtx = Binding::new(Rc::new(Animation::TextureMatrix(ttk1::tests::sample("quad", 2))), &model).unwrap();
        texmtx.apply(10.0, &mut state);
        let m = &state.materials[0].texture_matrices[2];
        assert_eq!(m.rotation, Angle(45.0));
        // Repeat wraps frame 10 back to time 0.
        assert_eq!(m.translation, [0.0, 0.0]);

        let pattern = Binding::new(Rc::new(Animation::TexturePattern(tpt1::tests::sample("quad"))), &model).unwrap();
        pattern.apply(1.0, &mut state);
        assert_eq!(state.materials[0].texture_indices[0], Some(1));
        pattern.apply(3.0, &mut state);
        assert_eq!(state.materials[0].texture_indices[0], Some(0));

        state.reset(&model);
        assert_eq!(state, AnimatedState::new(&model));
    }
}
