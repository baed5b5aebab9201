//! Verbatim engine parameter lines.
//!
//! Parameters are opaque to the bridge and reach the engine unmodified. The
//! one exception is `DIMENSION`, which the bridge reads to check point shape.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::BridgeResult;
use crate::invalid_config;

/// Ordered list of engine parameter lines, e.g. `"MAX_BB_EVAL 100"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    lines: Vec<String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a parameter file. Blank lines are dropped; everything else is
    /// kept as written.
    pub fn from_file<P: AsRef<Path>>(path: P) -> BridgeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_lines(
            text.lines().filter(|line| !line.trim().is_empty()),
        ))
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the value part of the last line whose keyword matches `keyword`
    /// (case-insensitive). Later lines override earlier ones.
    pub fn value_of(&self, keyword: &str) -> Option<&str> {
        self.lines.iter().rev().find_map(|line| {
            let line = line.trim();
            let mut split = line.splitn(2, char::is_whitespace);
            let key = split.next()?;
            if key.eq_ignore_ascii_case(keyword) {
                Some(split.next().unwrap_or("").trim())
            } else {
                None
            }
        })
    }

    /// The configured problem dimension.
    pub fn dimension(&self) -> BridgeResult<usize> {
        let value = self
            .value_of("DIMENSION")
            .ok_or_else(|| invalid_config!("missing DIMENSION parameter"))?;
        let dimension: usize = value
            .parse()
            .map_err(|_| invalid_config!("DIMENSION is not a positive integer: {value:?}"))?;
        if dimension == 0 {
            return Err(invalid_config!("DIMENSION must be at least 1"));
        }
        Ok(dimension)
    }
}

impl<S: Into<String>> FromIterator<S> for Parameters {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_lines(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BridgeError;
    use std::io::Write;

    #[test]
    fn reads_dimension_case_insensitively() {
        let params = Parameters::from_lines(["BB_OUTPUT_TYPE OBJ", "dimension   3"]);
        assert_eq!(params.dimension().unwrap(), 3);
    }

    #[test]
    fn later_lines_override() {
        let params = Parameters::from_lines(["DIMENSION 2", "DIMENSION 4"]);
        assert_eq!(params.dimension().unwrap(), 4);
    }

    #[test]
    fn missing_or_bad_dimension_is_invalid_config() {
        let missing = Parameters::from_lines(["MAX_BB_EVAL 10"]);
        assert!(matches!(
            missing.dimension(),
            Err(BridgeError::InvalidConfig { .. })
        ));

        let zero = Parameters::new().with_line("DIMENSION 0");
        assert!(zero.dimension().is_err());

        let junk = Parameters::new().with_line("DIMENSION two");
        assert!(junk.dimension().is_err());
    }

    #[test]
    fn lines_are_kept_verbatim() {
        let lines = ["X0          ( 2.0  2.0 )", "DISPLAY_DEGREE 0"];
        let params: Parameters = lines.iter().copied().collect();
        assert_eq!(params.lines(), &lines.map(String::from));
        assert_eq!(params.value_of("x0"), Some("( 2.0  2.0 )"));
    }

    #[test]
    fn loads_parameter_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DIMENSION 2").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "MAX_BB_EVAL 100").unwrap();

        let params = Parameters::from_file(file.path()).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.dimension().unwrap(), 2);
    }
}
