// Device-name exclusion filter

use regex::Regex;

/// Suppresses every metric of devices whose name matches the configured pattern.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    pattern: Option<Regex>,
}

impl Blacklist {
    /// Compiles `pattern`; `None` or an empty string never suppresses anything.
    pub fn new(pattern: Option<&str>) -> Result<Self, regex::Error> {
        let pattern = match pattern {
            Some(p) if !p.is_empty() => Some(Regex::new(p)?),
            _ => None,
        };
        Ok(Self { pattern })
    }

    pub fn is_blacklisted(&self, device_name: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|re| re.is_match(device_name))
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }
}
