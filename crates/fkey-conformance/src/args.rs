use std::collections::BTreeMap;
use std::str::FromStr;

/// `--key=value` / `--flag` pairs collected from a command line.
///
/// Arguments that do not start with `--` are ignored. A bare `--flag` maps to
/// an empty value, and a repeated key keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLineArgs {
    pairs: BTreeMap<String, String>,
}

impl CommandLineArgs {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pairs = BTreeMap::new();
        for arg in args {
            let Some(body) = arg.as_ref().strip_prefix("--") else {
                continue;
            };
            let (key, value) = body.split_once('=').unwrap_or((body, ""));
            pairs.insert(key.to_string(), value.to_string());
        }
        Self { pairs }
    }

    /// Reads the current process arguments, skipping the program name.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    #[must_use]
    pub fn check_flag(&self, name: &str) -> bool {
        self.pairs.contains_key(name)
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.pairs.get(name).map(String::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>, String> {
        self.get_parsed(name)
    }

    pub fn get_u64(&self, name: &str) -> Result<Option<u64>, String> {
        self.get_parsed(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }

    /// Fails on the first key not listed in `known`.
    pub fn reject_unknown(&self, known: &[&str]) -> Result<(), String> {
        match self.keys().find(|key| !known.contains(key)) {
            Some(key) => Err(format!("unknown argument: --{key}")),
            None => Ok(()),
        }
    }

    fn get_parsed<T>(&self, name: &str) -> Result<Option<T>, String>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.pairs.get(name) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| format!("--{name}={raw}: {err}"))
    }
}
