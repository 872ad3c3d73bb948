//! Locations inside a JSON document, used in codec error messages.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Name(String),
    Index(usize),
}

/// A path such as `$.items[2].size`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValuePath {
    steps: Vec<Step>,
}

impl ValuePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn at_name(&self, name: &str) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::Name(name.to_string()));
        Self { steps }
    }

    pub fn at_index(&self, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step::Index(index));
        Self { steps }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for ValuePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for step in &self.steps {
            match step {
                Step::Name(name) if is_plain_name(name) => write!(f, ".{}", name)?,
                Step::Name(name) => write!(f, "[{:?}]", name)?,
                Step::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root() {
        assert_eq!(ValuePath::root().to_string(), "$");
    }

    #[test]
    fn test_nested() {
        let path = ValuePath::root().at_name("items").at_index(2).at_name("size");
        assert_eq!(path.to_string(), "$.items[2].size");
    }

    #[test]
    fn test_quoted_name() {
        let path = ValuePath::root().at_name("with space");
        assert_eq!(path.to_string(), r#"$["with space"]"#);
    }
}
