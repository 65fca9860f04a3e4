use std::collections::BTreeSet;
use std::fmt;

/// The set of tags describing what an operation touches, e.g. `{ai, generation}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category(BTreeSet<String>);

impl Category {
    pub fn of<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.tags().collect();
        write!(f, "{{{}}}", tags.join(", "))
    }
}
