/// Parser options
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Turn single newlines inside a block into `<br />`.
    pub breaks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options { breaks: true }
    }
}

impl Options {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn without_breaks(self) -> Self {
        Options { breaks: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaks_default_on() {
        assert!(Options::default().breaks);
        assert!(Options::from_json("{}").unwrap().breaks);
    }

    #[test]
    fn reads_json() {
        let options = Options::from_json(r#"{"breaks": false}"#).unwrap();
        assert!(!options.breaks);
        assert!(Options::from_json("[").is_err());
    }
}
