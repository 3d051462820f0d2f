//! Keyframe animations: the six animation sections, keyframe curves and
//! their evaluation, and binding an animation to a model.
//!
//! All six sections share the same building blocks. A track is a
//! [`Selection`] of `count` keyframes starting at `first` in a flat pool
//! of scalars. A keyframe is `(time, value, tangent)` or, in piecewise
//! mode, `(time, value, in, out)`. A selection of one element is a
//! constant.

pub mod ank1;
pub mod bind;
pub mod pak1;
pub mod tpt1;
pub mod trk1;
pub mod ttk1;
pub mod vaf1;

use crate::binary::names::{pack_names, unpack_names};
use crate::binary::{Cur, Out, Pack, Padding, Unpack};
use crate::errors::{incompatible, Result};
use super::file::{self, FileType, Subversion};
use super::{SectionWriter, Tag};

gx_enum! {
    pub enum LoopMode: u8 = Once {
        Once = 0,
        OnceAndReset = 1,
        Repeat = 2,
        MirroredOnce = 3,
        MirroredRepeat = 4,
    }
}

impl Default for LoopMode {
    fn default() -> LoopMode { LoopMode::Once }
}

impl LoopMode {
    /// Maps a playback frame (counting up from 0 forever) to the time at
    /// which to sample the curves.
    pub fn local_time(self, frame: f32, duration: u16) -> f32 {
        let d = duration as f32;
        if d <= 0.0 {
            return 0.0;
        }
        let frame = frame.max(0.0);
        match self {
            LoopMode::Once => frame.min(d),
            LoopMode::OnceAndReset => if frame >= d { 0.0 } else { frame },
            LoopMode::Repeat => frame % d,
            LoopMode::MirroredOnce => {
                if frame < d {
                    frame
                } else if frame < 2.0 * d {
                    2.0 * d - frame
                } else {
                    0.0
                }
            }
            LoopMode::MirroredRepeat => {
                let t = frame % (2.0 * d);
                if t < d { t } else { 2.0 * d - t }
            }
        }
    }
}

gx_enum! {
    pub enum TangentMode: u16 {
        /// `(time, value, tangent)`
        Symmetric = 0,
        /// `(time, value, in, out)`
        Piecewise = 1,
    }
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct Selection {
        count: u16,
        first: u16,
        tangent_mode: TangentMode,
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub tangent_in: f32,
    pub tangent_out: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Curve {
    // The same value at all times.
    //
    //      |
    //      |-------------
    //      |_____________
    //
    Constant(f32),

    // Cubic Hermite segments between keyframes, holding the end values
    // outside of them.
    //
    //      |      ,-.
    //      |----,'   `.____
    //      |_______________
    //         k0  k1  k2
    //
    Keys {
        tangent_mode: TangentMode,
        keys: Vec<Keyframe>,
    },
}

impl Default for Curve {
    fn default() -> Curve { Curve::Constant(0.0) }
}

impl Curve {
    pub fn sample(&self, time: f32) -> f32 {
        let keys = match *self {
            Curve::Constant(v) => return v,
            Curve::Keys { ref keys, .. } => keys,
        };
        let (first, last) = match (keys.first(), keys.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => return 0.0,
        };
        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }
        let i = keys.iter().position(|k| k.time > time).unwrap_or(keys.len() - 1);
        hermite(&keys[i - 1], &keys[i], time)
    }

    fn values_per_key(tangent_mode: TangentMode) -> usize {
        match tangent_mode {
            TangentMode::Symmetric => 3,
            TangentMode::Piecewise => 4,
        }
    }

    /// Decodes the curve selected from `pool`. Values and tangents are
    /// multiplied by `scale`, times are not.
    pub fn read<T: PoolValue>(sel: &Selection, pool: &[T], scale: f32) -> Result<Curve> {
        let first = sel.first as usize;
        if sel.count == 0 {
            bail!("empty keyframe selection at {}", first);
        }
        if sel.count == 1 {
            let v = pool.get(first).ok_or_else(|| format!(
                "constant at {} past end of a pool of {}", first, pool.len(),
            ))?;
            return Ok(Curve::Constant(v.to_f32() * scale));
        }

        let n = Curve::values_per_key(sel.tangent_mode);
        let end = first + n * sel.count as usize;
        let values = pool.get(first..end).ok_or_else(|| format!(
            "{} keyframes at {} run past end of a pool of {}", sel.count, first, pool.len(),
        ))?;
        let keys = values.chunks(n).map(|k| {
            let tangent_in = k[2].to_f32() * scale;
            Keyframe {
                time: k[0].to_f32(),
                value: k[1].to_f32() * scale,
                tangent_in,
                tangent_out: if n == 4 { k[3].to_f32() * scale } else { tangent_in },
            }
        }).collect();
        Ok(Curve::Keys { tangent_mode: sel.tangent_mode, keys })
    }

    /// Encodes the curve into `pool`, reusing a matching run of values
    /// already there.
    pub fn write<T: PoolValue>(&self, pool: &mut Vec<T>, scale: f32) -> Result<Selection> {
        let (tangent_mode, values) = match *self {
            Curve::Constant(v) => (TangentMode::Symmetric, vec![T::from_f32(v / scale)?]),
            Curve::Keys { tangent_mode, ref keys } => {
                check!(keys.len() >= 2)?;
                let mut values = Vec::with_capacity(keys.len() * 4);
                for k in keys {
                    values.push(T::from_f32(k.time)?);
                    values.push(T::from_f32(k.value / scale)?);
                    values.push(T::from_f32(k.tangent_in / scale)?);
                    if tangent_mode == TangentMode::Piecewise {
                        values.push(T::from_f32(k.tangent_out / scale)?);
                    }
                }
                (tangent_mode, values)
            }
        };
        let count = match *self {
            Curve::Constant(_) => 1,
            Curve::Keys { ref keys, .. } => keys.len(),
        };
        check!(count <= 0xFFFF)?;
        let first = pool_insert(pool, &values)?;
        Ok(Selection { count: count as u16, first, tangent_mode })
    }

    /// Largest absolute value or tangent; sizes the rotation scale.
    pub fn max_abs(&self) -> f32 {
        match *self {
            Curve::Constant(v) => v.abs(),
            Curve::Keys { ref keys, .. } => keys.iter()
                .map(|k| k.value.abs().max(k.tangent_in.abs()).max(k.tangent_out.abs()))
                .fold(0.0, f32::max),
        }
    }
}

fn hermite(k0: &Keyframe, k1: &Keyframe, time: f32) -> f32 {
    let dt = k1.time - k0.time;
    if dt <= 0.0 {
        return k1.value;
    }
    let s = (time - k0.time) / dt;
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * k0.value + h10 * dt * k0.tangent_out + h01 * k1.value + h11 * dt * k1.tangent_in
}

/// Element type of a keyframe pool.
pub trait PoolValue: Copy + PartialEq + Unpack + Pack {
    fn to_f32(self) -> f32;
    fn from_f32(x: f32) -> Result<Self>;
}

impl PoolValue for f32 {
    fn to_f32(self) -> f32 { self }
    fn from_f32(x: f32) -> Result<f32> { Ok(x) }
}

impl PoolValue for i16 {
    fn to_f32(self) -> f32 { self as f32 }
    fn from_f32(x: f32) -> Result<i16> {
        let r = x.round();
        if !(r >= i16::MIN as f32 && r <= i16::MAX as f32) {
            bail!("keyframe value {} out of range", x);
        }
        Ok(r as i16)
    }
}

/// Appends `values` to `pool` unless they already occur as a run in it.
/// Returns the index of the run.
pub fn pool_insert<T: PartialEq + Copy>(pool: &mut Vec<T>, values: &[T]) -> Result<u16> {
    let found = if values.is_empty() || values.len() > pool.len() {
        None
    } else {
        pool.windows(values.len()).position(|w| w == values)
    };
    let first = match found {
        Some(i) => i,
        None => {
            pool.extend_from_slice(values);
            pool.len() - values.len()
        }
    };
    check!(pool.len() <= 0x10000)?;
    Ok(first as u16)
}

pub fn unpack_pool<T: Unpack>(cur: Cur, count: usize) -> Result<Vec<T>> {
    let mut c = cur;
    c.next_n(count)
}

/// Writes a pool at the current position. Returns its offset, or 0 when
/// the pool is empty.
pub fn pack_pool<T: Pack>(out: &mut Out, w: &SectionWriter, pool: &[T]) -> Result<u32> {
    if pool.is_empty() {
        return Ok(0);
    }
    out.align_from(w.base(), 4, Padding::Ff);
    let offset = w.offset(out)?;
    for x in pool {
        x.pack(out)?;
    }
    Ok(offset)
}

/// Degrees per raw rotation unit for a given scale exponent.
pub fn angle_scale(exponent: u8) -> f32 {
    180.0 / 32768.0 * (1u32 << exponent.min(15)) as f32
}

/// Smallest exponent (at least `current`) at which every curve fits in
/// an `i16` pool.
pub fn fit_angle_exponent<'a, I: Iterator<Item = &'a Curve>>(current: u8, curves: I) -> u8 {
    let max = curves.map(|c| c.max_abs()).fold(0.0, f32::max);
    let mut e = current;
    while e < 15 && (max / angle_scale(e)).round() > i16::MAX as f32 {
        e += 1;
    }
    e
}

/// Scale, rotation and translation curves for one axis.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComponentCurves {
    pub scale: Curve,
    pub rotation: Curve,
    pub translation: Curve,
}

record! {
    #[derive(Copy, Clone, Debug, PartialEq)]
    pub struct ComponentSelections {
        scale: Selection,
        rotation: Selection,
        translation: Selection,
    }
}

/// Shared writer for the scale/rotation/translation pools of ANK1 and
/// TTK1.
#[derive(Default)]
pub struct TransformPools {
    pub scales: Vec<f32>,
    pub rotations: Vec<i16>,
    pub translations: Vec<f32>,
}

impl TransformPools {
    pub fn write(&mut self, c: &ComponentCurves, angle_scale: f32) -> Result<ComponentSelections> {
        Ok(ComponentSelections {
            scale: c.scale.write(&mut self.scales, 1.0)?,
            rotation: c.rotation.write(&mut self.rotations, angle_scale)?,
            translation: c.translation.write(&mut self.translations, 1.0)?,
        })
    }

    pub fn read(&self, s: &ComponentSelections, angle_scale: f32) -> Result<ComponentCurves> {
        Ok(ComponentCurves {
            scale: Curve::read(&s.scale, &self.scales, 1.0)?,
            rotation: Curve::read(&s.rotation, &self.rotations, angle_scale)?,
            translation: Curve::read(&s.translation, &self.translations, 1.0)?,
        })
    }
}

/// Material names and the index array beside them. Tracks aimed at
/// materials are bound by name.
pub fn unpack_material_names(cur: Cur, index_offset: u32, name_offset: u32, count: usize) -> Result<(Vec<String>, Vec<u16>)> {
    let names = unpack_names(&mut (cur + name_offset))?;
    if names.len() != count {
        return Err(cur.error(format!("{} tracks but {} names", count, names.len())));
    }
    let indices = if index_offset == 0 {
        (0..count as u16).collect()
    } else {
        (cur + index_offset).next_n(count)?
    };
    Ok((names, indices))
}

/// Writes the index array then the names. Returns both offsets.
pub fn pack_material_names(out: &mut Out, w: &SectionWriter, names: &[String], indices: &[u16]) -> Result<(u32, u32)> {
    out.align_from(w.base(), 4, Padding::Ff);
    let index_offset = w.offset(out)?;
    for x in indices {
        x.pack(out)?;
    }
    out.align_from(w.base(), 4, Padding::Ff);
    let name_offset = w.offset(out)?;
    pack_names(out, names)?;
    Ok((index_offset, name_offset))
}

/// One loaded animation file.
#[derive(Clone, Debug, PartialEq)]
pub enum Animation {
    Joint(ank1::JointAnimation),
    TextureMatrix(ttk1::TextureMatrixAnimation),
    TevRegister(trk1::TevRegisterAnimation),
    MaterialColor(pak1::MaterialColorAnimation),
    TexturePattern(tpt1::TexturePatternAnimation),
    Visibility(vaf1::VisibilityAnimation),
}

impl Animation {
    pub fn file_type(&self) -> FileType {
        match *self {
            Animation::Joint(_) => FileType::Bck1,
            Animation::TextureMatrix(_) => FileType::Btk1,
            Animation::TevRegister(_) => FileType::Brk1,
            Animation::MaterialColor(_) => FileType::Bpk1,
            Animation::TexturePattern(_) => FileType::Btp1,
            Animation::Visibility(_) => FileType::Bva1,
        }
    }

    pub fn section_tag(&self) -> Tag {
        match *self {
            Animation::Joint(_) => *b"ANK1",
            Animation::TextureMatrix(_) => *b"TTK1",
            Animation::TevRegister(_) => *b"TRK1",
            Animation::MaterialColor(_) => *b"PAK1",
            Animation::TexturePattern(_) => *b"TPT1",
            Animation::Visibility(_) => *b"VAF1",
        }
    }

    pub fn loop_mode(&self) -> LoopMode {
        match *self {
            Animation::Joint(ref a) => a.loop_mode,
            Animation::TextureMatrix(ref a) => a.loop_mode,
            Animation::TevRegister(ref a) => a.loop_mode,
            Animation::MaterialColor(ref a) => a.loop_mode,
            Animation::TexturePattern(ref a) => a.loop_mode,
            Animation::Visibility(ref a) => a.loop_mode,
        }
    }

    pub fn duration(&self) -> u16 {
        match *self {
            Animation::Joint(ref a) => a.duration,
            Animation::TextureMatrix(ref a) => a.duration,
            Animation::TevRegister(ref a) => a.duration,
            Animation::MaterialColor(ref a) => a.duration,
            Animation::TexturePattern(ref a) => a.duration,
            Animation::Visibility(ref a) => a.duration,
        }
    }

    pub fn unpack(buf: &[u8]) -> Result<Animation> {
        let c = file::open(buf)?;
        Ok(match c.file_type {
            FileType::Bck1 => Animation::Joint(ank1::unpack(c.expect(0, b"ANK1")?)?),
            FileType::Btk1 => Animation::TextureMatrix(ttk1::unpack(c.expect(0, b"TTK1")?)?),
            FileType::Brk1 => Animation::TevRegister(trk1::unpack(c.expect(0, b"TRK1")?)?),
            FileType::Bpk1 => Animation::MaterialColor(pak1::unpack(c.expect(0, b"PAK1")?)?),
            FileType::Btp1 => Animation::TexturePattern(tpt1::unpack(c.expect(0, b"TPT1")?)?),
            FileType::Bva1 => Animation::Visibility(vaf1::unpack(c.expect(0, b"VAF1")?)?),
            ft => bail!(incompatible(format!("a {:?} file is not an animation", ft))),
        })
    }

    pub fn pack(&self) -> Result<Vec<u8>> {
        let mut out = Out::new();
        file::begin(&mut out);
        match *self {
            Animation::Joint(ref a) => ank1::pack(&mut out, a)?,
            Animation::TextureMatrix(ref a) => ttk1::pack(&mut out, a)?,
            Animation::TevRegister(ref a) => trk1::pack(&mut out, a)?,
            Animation::MaterialColor(ref a) => pak1::pack(&mut out, a)?,
            Animation::TexturePattern(ref a) => tpt1::pack(&mut out, a)?,
            Animation::Visibility(ref a) => vaf1::pack(&mut out, a)?,
        }
        file::finish(&mut out, self.file_type(), Subversion::Blank)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(time: f32, value: f32, tangent: f32) -> Keyframe {
        Keyframe { time, value, tangent_in: tangent, tangent_out: tangent }
    }

    #[test]
    fn loop_modes() {
        assert_eq!(LoopMode::Once.local_time(15.0, 10), 10.0);
        assert_eq!(LoopMode::OnceAndReset.local_time(15.0, 10), 0.0);
        assert_eq!(LoopMode::Repeat.local_time(15.0, 10), 5.0);
        assert_eq!(LoopMode::MirroredOnce.local_time(13.0, 10), 7.0);
        assert_eq!(LoopMode::MirroredOnce.local_time(25.0, 10), 0.0);
        assert_eq!(LoopMode::MirroredRepeat.local_time(33.0, 10), 7.0);
        assert_eq!(LoopMode::Repeat.local_time(3.0, 0), 0.0);
    }

    #[test]
    fn hermite_hits_keys_and_holds_ends() {
        let c = Curve::Keys {
            tangent_mode: TangentMode::Symmetric,
            keys: vec![key(0.0, 1.0, 0.0), key(10.0, 3.0, 0.0)],
        };
        assert_eq!(c.sample(-1.0), 1.0);
        assert_eq!(c.sample(0.0), 1.0);
        assert_eq!(c.sample(5.0), 2.0);
        assert_eq!(c.sample(10.0), 3.0);
        assert_eq!(c.sample(20.0), 3.0);

        // Slope 0.2 on both ends of a line from 1 to 3 reproduces the line.
        let line = Curve::Keys {
            tangent_mode: TangentMode::Symmetric,
            keys: vec![key(0.0, 1.0, 0.2), key(10.0, 3.0, 0.2)],
        };
        assert!((line.sample(2.5) - 1.5).abs() < 1e-5);
    }

    #[test]
    fn curves_share_pool_runs() {
        let a = Curve::Keys {
            tangent_mode: TangentMode::Piecewise,
            keys: vec![
                Keyframe { time: 0.0, value: 90.0, tangent_in: 0.0, tangent_out: 1.0 },
                Keyframe { time: 4.0, value: -90.0, tangent_in: 2.0, tangent_out: 0.0 },
            ],
        };
        let scale = angle_scale(0);
        let mut pool: Vec<i16> = vec![];
        let sa = a.write(&mut pool, scale).unwrap();
        let sb = a.write(&mut pool, scale).unwrap();
        assert_eq!(sa, sb);
        assert_eq!(pool.len(), 8);
        assert_eq!(pool[1], 16384);

        let c = Curve::Constant(-90.0);
        let sc = c.write(&mut pool, scale).unwrap();
        assert_eq!(sc.first, 5);
        assert_eq!(Curve::read(&sc, &pool, scale).unwrap(), c);

        let read = Curve::read(&sa, &pool, scale).unwrap();
        assert_eq!(read.sample(4.0), -90.0);
    }

    #[test]
    fn selections_are_checked() {
        let pool = [0.0f32; 6];
        let sel = Selection { count: 2, first: 0, tangent_mode: TangentMode::Symmetric };
        assert!(Curve::read(&sel, &pool, 1.0).is_ok());
        let sel = Selection { count: 2, first: 0, tangent_mode: TangentMode::Piecewise };
        assert!(Curve::read(&sel, &pool, 1.0).is_err());
        let sel = Selection { count: 0, first: 0, tangent_mode: TangentMode::Symmetric };
        assert!(Curve::read(&sel, &pool, 1.0).is_err());
    }

    #[test]
    fn angle_exponent_grows_to_fit() {
        let big = Curve::Constant(400.0);
        assert_eq!(fit_angle_exponent(0, vec![&big].into_iter()), 2);
        assert_eq!(fit_angle_exponent(3, vec![&big].into_iter()), 3);
    }
}
