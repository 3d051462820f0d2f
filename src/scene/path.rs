//! Paths address a value inside the object model, eg.
//! `.materials[3].tev_colors[1]`.

use super::reflect::{Reflect, Value};
use crate::errors::Result;
use std::fmt;
use std::ops::Add;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// A named field.
    Attr(&'static str),
    /// An element of a list.
    Key(usize),
    /// Matches any `Key`; only meaningful in patterns.
    AnyKey,
}

/// An immutable sequence of fragments. Build with the fluent methods:
///
/// ```ignore
/// Path::root().child("materials").index(3).child("name")
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    fragments: Vec<Fragment>,
}

impl Path {
    pub fn root() -> Path {
        Path { fragments: vec![] }
    }

    pub fn child(mut self, name: &'static str) -> Path {
        self.fragments.push(Fragment::Attr(name));
        self
    }

    pub fn index(mut self, key: usize) -> Path {
        self.fragments.push(Fragment::Key(key));
        self
    }

    pub fn any(mut self) -> Path {
        self.fragments.push(Fragment::AnyKey);
        self
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn is_pattern(&self) -> bool {
        self.fragments.contains(&Fragment::AnyKey)
    }

    /// Length of the leading run of fragments without wildcards.
    fn concrete_prefix_len(&self) -> usize {
        self.fragments.iter()
            .position(|f| *f == Fragment::AnyKey)
            .unwrap_or(self.fragments.len())
    }

    /// Whether `self`, as a pattern, matches a prefix of `path`.
    pub fn matches_prefix(&self, path: &Path) -> bool {
        self.fragments.len() <= path.fragments.len() &&
            self.fragments.iter().zip(&path.fragments).all(|(p, f)| match (p, f) {
                (Fragment::AnyKey, Fragment::Key(_)) => true,
                (p, f) => p == f,
            })
    }

    /// Whether `self`, as a pattern, matches all of `path`.
    pub fn matches(&self, path: &Path) -> bool {
        self.fragments.len() == path.fragments.len() && self.matches_prefix(path)
    }

    /// If `self` as a pattern matches a prefix of `path`, returns `path`
    /// relative to the concrete part of the pattern. A pattern
    /// `.materials[*]` sees `.materials[3].name` as `[3].name`.
    pub fn relative(&self, path: &Path) -> Option<Path> {
        if !self.matches_prefix(path) {
            return None;
        }
        let skip = self.concrete_prefix_len();
        Some(Path { fragments: path.fragments[skip..].to_vec() })
    }

    /// The path of the list containing the addressed element, and the
    /// element's key, if the path ends in a key.
    pub fn split_key(&self) -> Option<(Path, usize)> {
        match self.fragments.last() {
            Some(&Fragment::Key(k)) => {
                let parent = Path { fragments: self.fragments[..self.len() - 1].to_vec() };
                Some((parent, k))
            }
            _ => None,
        }
    }

    /// The first `n` fragments.
    pub fn truncated(&self, n: usize) -> Path {
        Path { fragments: self.fragments[..n.min(self.len())].to_vec() }
    }

    /// All but the first `n` fragments.
    pub fn tail(&self, n: usize) -> Path {
        Path { fragments: self.fragments[n.min(self.len())..].to_vec() }
    }

    pub fn resolve<'a>(&self, root: &'a dyn Reflect) -> Result<&'a dyn Reflect> {
        let mut node = root;
        for (i, fragment) in self.fragments.iter().enumerate() {
            node = node.field(fragment)
                .ok_or_else(|| format!("no {} in {}", fragment_str(fragment), self.truncated(i)))?;
        }
        Ok(node)
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut dyn Reflect) -> Result<&'a mut dyn Reflect> {
        let mut node = root;
        for (i, fragment) in self.fragments.iter().enumerate() {
            let at = self.truncated(i);
            node = node.field_mut(fragment)
                .ok_or_else(|| format!("no {} in {}", fragment_str(fragment), at))?;
        }
        Ok(node)
    }

    pub fn get_value(&self, root: &dyn Reflect) -> Result<Value> {
        let node = self.resolve(root)?;
        node.value().ok_or_else(|| format!("{} is not a value", self).into())
    }

    /// Assigns the addressed value and returns the value it replaced.
    pub fn set_value(&self, root: &mut dyn Reflect, value: &Value) -> Result<Value> {
        let node = self.resolve_mut(root)?;
        let old = node.value().ok_or_else(|| format!("{} is not a value", self))?;
        node.set_value(value).map_err(|e| format!("setting {}: {}", self, e))?;
        Ok(old)
    }
}

impl<'a> Add<&'a Path> for Path {
    type Output = Path;
    fn add(mut self, other: &'a Path) -> Path {
        self.fragments.extend_from_slice(&other.fragments);
        self
    }
}

impl Add<Path> for Path {
    type Output = Path;
    fn add(self, other: Path) -> Path {
        self + &other
    }
}

fn fragment_str(f: &Fragment) -> String {
    match *f {
        Fragment::Attr(name) => format!(".{}", name),
        Fragment::Key(k) => format!("[{}]", k),
        Fragment::AnyKey => "[*]".to_string(),
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.fragments.is_empty() {
            return write!(f, "<root>");
        }
        for fragment in &self.fragments {
            write!(f, "{}", fragment_str(fragment))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::j3d::model::tests::sample_model;

    #[test]
    fn display() {
        let p = Path::root().child("materials").index(3).child("name");
        assert_eq!(p.to_string(), ".materials[3].name");
        assert_eq!(Path::root().child("textures").any().to_string(), ".textures[*]");
    }

    #[test]
    fn algebra() {
        let model = sample_model();
        let p = Path::root().child("materials").index(0);
        let q = Path::root().child("tev_colors").index(2).child("g");
        let direct = (p.clone() + &q).get_value(&model).unwrap();
        let stepwise = q.get_value(p.resolve(&model).unwrap()).unwrap();
        assert_eq!(direct, stepwise);
        assert_eq!(direct, Value::Int(300));
    }

    #[test]
    fn set_returns_old_value() {
        let mut model = sample_model();
        let p = Path::root().child("materials").index(0).child("dither");
        let old = p.set_value(&mut model, &Value::Bool(false)).unwrap();
        assert_eq!(old, Value::Bool(true));
        assert!(!model.materials[0].dither);
        assert!(Path::root().child("materials").index(7).get_value(&model).is_err());
    }

    #[test]
    fn wildcard_relative() {
        let pattern = Path::root().child("materials").any();
        let event = Path::root().child("materials").index(3).child("name");
        let rel = pattern.relative(&event).unwrap();
        assert_eq!(rel, Path::root().index(3).child("name"));
        assert!(pattern.matches_prefix(&event));
        assert!(!pattern.matches(&event));
        assert!(pattern.relative(&Path::root().child("textures").index(0)).is_none());

        let fixed = Path::root().child("materials").index(2);
        assert_eq!(
            fixed.relative(&Path::root().child("materials").index(2).child("dither")),
            Some(Path::root().child("dither")),
        );
        assert!(fixed.relative(&event).is_none());
    }

    #[test]
    fn split_key() {
        let p = Path::root().child("textures").index(4);
        assert_eq!(p.split_key(), Some((Path::root().child("textures"), 4)));
        assert_eq!(Path::root().child("textures").split_key(), None);
    }
}
