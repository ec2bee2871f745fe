//! Automatic variables generated once per resolution pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

pub const AUTO_DATETIME: &str = "__runner_datetime";
pub const AUTO_PID: &str = "__runner_pid";

const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S%.3f";

/// Variables visible from every scope under the reserved `__` prefix.
#[derive(Debug, Clone, Default)]
pub struct AutoVariables {
    vars: BTreeMap<String, String>,
}

impl AutoVariables {
    /// Generate from the current time and process id.
    pub fn generate() -> Self {
        Self::generate_at(Utc::now(), std::process::id())
    }

    pub fn generate_at(now: DateTime<Utc>, pid: u32) -> Self {
        let mut vars = BTreeMap::new();
        vars.insert(AUTO_DATETIME.to_string(), now.format(DATETIME_FORMAT).to_string());
        vars.insert(AUTO_PID.to_string(), pid.to_string());
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_at() {
        let now = Utc
            .with_ymd_and_hms(2025, 10, 5, 14, 30, 22)
            .unwrap()
            + chrono::Duration::milliseconds(123);
        let auto = AutoVariables::generate_at(now, 4242);
        assert_eq!(auto.get(AUTO_DATETIME), Some("20251005143022.123"));
        assert_eq!(auto.get(AUTO_PID), Some("4242"));
    }

    #[test]
    fn test_generate_uses_current_process() {
        let auto = AutoVariables::generate();
        assert_eq!(auto.get(AUTO_PID), Some(std::process::id().to_string().as_str()));
        assert_eq!(auto.get(AUTO_DATETIME).map(str::len), Some(18));
    }
}
