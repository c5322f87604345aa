use std::fmt;
use std::str::FromStr;

use crate::error::ParameterError;
use crate::lexer::is_name_byte;
use crate::span::Span;

/// Ordered `name -> value` pairs used to resolve template tags.
///
/// Parsed from the `"A:3,B:6"` syntax. Keys and values are trimmed, an empty
/// (or all-whitespace) string is an empty map, and a repeated key replaces the
/// earlier value without changing its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ParameterMap {
    entries: Vec<(String, String)>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, ParameterError> {
        let mut map = Self::new();
        if input.trim().is_empty() {
            return Ok(map);
        }

        let mut offset = 0usize;
        for pair in input.split(',') {
            let span = Span::new(offset, offset + pair.len());
            offset += pair.len() + 1;

            if pair.trim().is_empty() {
                return Err(ParameterError::EmptyPair { span });
            }

            let Some((key, value)) = pair.split_once(':') else {
                return Err(ParameterError::MissingSeparator {
                    pair: pair.trim().to_string(),
                    span,
                });
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(ParameterError::EmptyKey {
                    pair: pair.trim().to_string(),
                    span,
                });
            }
            check_key(key, span)?;

            map.replace_or_push(key.to_string(), value.trim().to_string());
        }

        Ok(map)
    }

    /// Inserts or replaces a value, returning the previous one.
    ///
    /// Accepts exactly the pairs `parse` could have produced, so two maps
    /// are equal whenever their serialized forms are.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, ParameterError> {
        let name = name.into();
        let value = value.into();
        let span = Span::new(0, 0);
        if name.is_empty() {
            return Err(ParameterError::EmptyKey { pair: format!(":{value}"), span });
        }
        check_key(&name, span)?;
        if value.contains(',') || value.trim() != value {
            return Err(ParameterError::InvalidValue { key: name, value, span });
        }
        Ok(self.replace_or_push(name, value))
    }

    fn replace_or_push(&mut self, name: String, value: String) -> Option<String> {
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Canonical `k1:v1,k2:v2` form.
    pub fn serialize(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParameterMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}:{value}")?;
        }
        Ok(())
    }
}

impl FromStr for ParameterMap {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn check_key(key: &str, span: Span) -> Result<(), ParameterError> {
    match key.chars().find(|ch| !ch.is_ascii() || !is_name_byte(*ch as u8)) {
        Some(ch) => Err(ParameterError::InvalidKey {
            key: key.to_string(),
            ch,
            span,
        }),
        None => Ok(()),
    }
}
