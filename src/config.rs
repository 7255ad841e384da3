//! Writer configuration
//!
//! Options can be set in code or picked up from the environment, which is
//! handy for services where the deployment decides the compression trade-off.

/// Environment variable holding the deflate level (0-9) for metadata entries
pub const ENV_COMPRESSION_LEVEL: &str = "SHEETSTREAM_COMPRESSION_LEVEL";

/// Environment variable overriding the document creator
pub const ENV_CREATOR: &str = "SHEETSTREAM_CREATOR";

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
const DEFAULT_APPLICATION: &str = "sheetstream";

/// Options shared by the builder, the template and the ZIP writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOptions {
    /// Deflate level for entries written in one shot. Sheets are always stored.
    pub compression_level: u32,
    /// `Application` written to `docProps/app.xml`
    pub application: String,
    /// `dc:creator` written to `docProps/core.xml`
    pub creator: String,
    /// Initial capacity of the shared strings table
    pub shared_strings_capacity: usize,
}

impl StreamOptions {
    pub fn new() -> Self {
        StreamOptions {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            application: DEFAULT_APPLICATION.to_string(),
            creator: DEFAULT_APPLICATION.to_string(),
            shared_strings_capacity: 1024,
        }
    }

    /// Defaults overridden by `SHEETSTREAM_COMPRESSION_LEVEL` and
    /// `SHEETSTREAM_CREATOR` when set. Unparseable values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::new();

        if let Some(raw) = lookup(ENV_COMPRESSION_LEVEL) {
            match raw.trim().parse::<u32>() {
                Ok(level) => options = options.compression_level(level),
                Err(_) => log::warn!("ignoring {ENV_COMPRESSION_LEVEL}={raw:?}: not a number"),
            }
        }
        if let Some(creator) = lookup(ENV_CREATOR).filter(|c| !c.is_empty()) {
            options.creator = creator;
        }
        options
    }

    /// Set the deflate level, clamped to 0-9
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = application.into();
        self
    }

    pub fn creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = creator.into();
        self
    }

    pub fn shared_strings_capacity(mut self, capacity: usize) -> Self {
        self.shared_strings_capacity = capacity;
        self
    }
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self::new()
    }
}
