// -------------------------------------------------------------------------------------------------
// ---- LogLevel -----------------------------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ---- Durations ----------------------------------------------------------------------------------

/// Deserializes humantime strings such as `"30s"` or `"1m 30s"`.
pub(crate) fn de_duration<'de, D>(d: D) -> Result<std::time::Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    use serde::de::Error;

    let raw = String::deserialize(d)?;
    humantime::parse_duration(&raw).map_err(|e| D::Error::custom(format!("{raw:?}: {e}")))
}

// -------------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------
