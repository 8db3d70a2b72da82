//! Response header collection.
//!
//! Unlike `http::HeaderMap`, [`Headers`] keeps the exact order the application supplied and
//! accepts values containing newlines: a value such as `"a=1\nb=2"` is written as two header
//! lines sharing the same name.

use std::borrow::Cow;
use std::fmt;

/// An ordered list of response header fields.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(Cow<'static, str>, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Sets `name` to `value`, replacing the first entry with the same name (ASCII case-insensitive)
    /// in place, or appending a new entry at the end.
    pub fn insert<N, V>(&mut self, name: N, value: V)
    where
        N: Into<Cow<'static, str>>,
        V: Into<String>,
    {
        let name = name.into();
        match self.position(&name) {
            Some(index) => self.entries[index].1 = value.into(),
            None => self.entries.push((name, value.into())),
        }
    }

    /// Adds another value for `name`; multiple values are kept newline-joined in one entry.
    pub fn append<N, V>(&mut self, name: N, value: V)
    where
        N: Into<Cow<'static, str>>,
        V: Into<String>,
    {
        let name = name.into();
        match self.position(&name) {
            Some(index) => {
                let existing = &mut self.entries[index].1;
                existing.push('\n');
                existing.push_str(&value.into());
            }
            None => self.entries.push((name, value.into())),
        }
    }

    /// Appends a raw entry without looking for an existing one.
    pub fn push<N, V>(&mut self, name: N, value: V)
    where
        N: Into<Cow<'static, str>>,
        V: Into<String>,
    {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.entries[index].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes every entry named `name`, returning the first removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let mut removed = None;
        self.entries.retain_mut(|(key, value)| {
            if !key.eq_ignore_ascii_case(name) {
                return true;
            }
            if removed.is_none() {
                removed = Some(std::mem::take(value));
            }
            false
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_ref(), value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<Cow<'static, str>>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.push(name, value);
        }
        headers
    }
}

impl<N, V> Extend<(N, V)> for Headers
where
    N: Into<Cow<'static, str>>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.push(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        headers.insert("X-Id", "1");
        headers.insert("content-type", "text/html");

        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(collected, vec![("Content-Type", "text/html"), ("X-Id", "1")]);
    }

    #[test]
    fn append_joins_with_newline() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1");
        headers.append("set-cookie", "b=2");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("SET-COOKIE"), Some("a=1\nb=2"));
    }

    #[test]
    fn push_keeps_duplicates_and_remove_drops_all() {
        let mut headers: Headers = [("Content-Length", "1"), ("X-A", "a"), ("content-length", "2")].into_iter().collect();
        assert_eq!(headers.len(), 3);

        assert_eq!(headers.remove("Content-Length").as_deref(), Some("1"));
        assert_eq!(headers.len(), 1);
        assert!(!headers.contains("content-length"));
        assert!(headers.contains("x-a"));
    }
}
