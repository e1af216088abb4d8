use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A language tag of the form `lang[-AREA]`, e.g. `en-US` or `zh`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Lang {
    lang: String,
    area: Option<String>,
}

impl Lang {
    /// Parses a tag. `_` is accepted as separator and case is normalized,
    /// so `EN_us` becomes `en-US`.
    pub fn new(code: &str) -> Self {
        let mut parts = code.trim().splitn(2, ['-', '_']);
        let lang = parts.next().unwrap_or_default().to_ascii_lowercase();
        let area = parts
            .next()
            .filter(|area| !area.is_empty())
            .map(|area| area.to_ascii_uppercase());
        Self { lang, area }
    }

    /// Whether `other` names this language.
    ///
    /// Languages must be equal; areas only have to agree when both sides
    /// specify one, so `zh` matches `zh-CN`.
    pub fn matches(&self, other: &Lang) -> bool {
        if self.lang.is_empty() || self.lang != other.lang {
            return false;
        }
        match (&self.area, &other.area) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    pub fn matches_str(&self, other: &str) -> bool {
        self.matches(&Lang::new(other))
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.area {
            Some(area) => write!(f, "{}-{}", self.lang, area),
            None => f.write_str(&self.lang),
        }
    }
}

impl FromStr for Lang {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Lang::new(s))
    }
}

impl Serialize for Lang {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Lang {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Lang::new(&code))
    }
}
