use crate::types::ProcessRecord;
use crate::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Case-insensitive pattern over process name and owner
#[derive(Debug, Clone)]
pub struct ProcessFilter {
    pattern: Regex,
}

impl ProcessFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::InvalidFilter(e.to_string()))?;

        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, record: &ProcessRecord) -> bool {
        self.pattern.is_match(&record.name)
            || record
                .username
                .as_deref()
                .is_some_and(|user| self.pattern.is_match(user))
    }

    /// Keep matching records, preserving their order
    pub fn apply(&self, records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessStatus;

    fn proc(pid: u32, name: &str, user: Option<&str>) -> ProcessRecord {
        ProcessRecord::new(
            pid,
            name,
            user.map(str::to_string),
            0.0,
            0.0,
            ProcessStatus::Running,
            0,
        )
    }

    #[test]
    fn test_matches_name_case_insensitive() {
        let filter = ProcessFilter::new("fire").unwrap();

        assert!(filter.matches(&proc(1, "Firefox", None)));
        assert!(!filter.matches(&proc(2, "chrome", None)));
    }

    #[test]
    fn test_matches_username() {
        let filter = ProcessFilter::new("^postgres$").unwrap();

        assert!(filter.matches(&proc(1, "postmaster", Some("postgres"))));
        assert!(!filter.matches(&proc(2, "postmaster", Some("root"))));
        assert!(!filter.matches(&proc(3, "postmaster", None)));
    }

    #[test]
    fn test_apply_preserves_order() {
        let filter = ProcessFilter::new("sh").unwrap();
        let sample = vec![
            proc(9, "zsh", None),
            proc(1, "nginx", None),
            proc(4, "bash", None),
        ];

        let kept: Vec<u32> = filter.apply(sample).iter().map(|r| r.pid).collect();
        assert_eq!(kept, vec![9, 4]);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = ProcessFilter::new("(unclosed");
        assert!(matches!(result, Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn test_as_str_round_trip() {
        assert_eq!(ProcessFilter::new("node|deno").unwrap().as_str(), "node|deno");
    }
}
