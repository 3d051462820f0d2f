use std::collections::HashSet;

/// Hands out file names that haven't been handed out before.
pub struct UniqueNamer {
    taken_names: HashSet<String>,
}

impl UniqueNamer {
    pub fn new() -> UniqueNamer {
        UniqueNamer { taken_names: HashSet::new() }
    }

    /// Picks the first name from
    ///
    /// * `"{desired_name}"`
    /// * `"{desired_name}.1"`
    /// * `"{desired_name}.2"`
    /// * ...
    ///
    /// which is not a taken name, marks it as taken, and returns it.
    pub fn name(&mut self, desired_name: &str) -> String {
        let mut chosen_name = desired_name.to_string();
        let mut i = 1;
        while self.taken_names.contains(&chosen_name) {
            chosen_name = format!("{}.{}", desired_name, i);
            i += 1;
        }
        self.taken_names.insert(chosen_name.clone());
        chosen_name
    }
}

/// Makes `name` safe to use as a file name.
pub fn sanitize(name: &str) -> String {
    let s: String = name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || "-_.".contains(c) { c } else { '_' })
        .collect();
    if s.is_empty() || s.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        s
    }
}

#[test]
fn test() {
    let mut namer = UniqueNamer::new();
    assert_eq!(namer.name("a"), "a");
    assert_eq!(namer.name("a"), "a.1");
    assert_eq!(namer.name("a"), "a.2");
    assert_eq!(namer.name("b"), "b");
    assert_eq!(sanitize("body/skin 01"), "body_skin_01");
    assert_eq!(sanitize(".."), "unnamed");
}
