/// A Vec that stores each distinct value once. Values are compared with
/// `PartialEq`, so floating point records work as keys.
#[derive(Debug, Clone)]
pub struct DedupVec<T: PartialEq> {
    vec: Vec<T>,
}

impl<T: PartialEq> DedupVec<T> {
    pub fn new() -> DedupVec<T> {
        DedupVec { vec: vec![] }
    }

    /// Starts with `items` already present (they are not deduplicated).
    pub fn seeded(items: Vec<T>) -> DedupVec<T> {
        DedupVec { vec: items }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    /// Push an element to the vec (if not already in it).
    /// Returns the index of the element.
    pub fn push(&mut self, x: T) -> usize {
        match self.position(&x) {
            Some(idx) => idx,
            None => {
                self.vec.push(x);
                self.vec.len() - 1
            }
        }
    }

    pub fn position(&self, x: &T) -> Option<usize> {
        self.vec.iter().position(|y| y == x)
    }

    pub fn iter(&self) -> std::slice::Iter<T> {
        self.vec.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.vec
    }
}

impl<T: PartialEq> std::ops::Index<usize> for DedupVec<T> {
    type Output = T;
    fn index(&self, idx: usize) -> &T {
        &self.vec[idx]
    }
}

#[test]
fn test() {
    let xs = [1.5f32, 0.0, 1.5, -2.0, 0.0];

    let mut v = DedupVec::new();
    let idxs: Vec<usize> = xs.iter().map(|&x| v.push(x)).collect();
    assert_eq!(idxs, vec![0, 1, 0, 2, 1]);
    assert_eq!(v.len(), 3);

    let mut seeded = DedupVec::seeded(vec![false, true]);
    assert_eq!(seeded.push(true), 1);
    assert_eq!(seeded.len(), 2);
}
