use ahash::AHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use doping_template::ParameterMap;

/// Identifies one specialized version of one loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpecializationKey {
    pub loop_name: Option<String>,
    pub parameters: String,
    pub template_hash: u64,
}

impl SpecializationKey {
    pub fn new(loop_name: Option<&str>, parameters: &ParameterMap, template: &str) -> Self {
        let mut hasher = AHasher::default();
        template.hash(&mut hasher);
        let template_hash = hasher.finish();

        Self {
            loop_name: loop_name.map(str::to_owned),
            parameters: parameters.serialize(),
            template_hash,
        }
    }

    pub fn to_string_key(&self) -> String {
        format!(
            "{}_<{}>_{:x}",
            self.loop_name.as_deref().unwrap_or("<anonymous>"),
            self.parameters,
            self.template_hash
        )
    }
}

impl fmt::Display for SpecializationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_key())
    }
}
