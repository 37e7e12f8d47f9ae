/// Operating modes for a restore run.
///
/// The flags-equivalent surface of the engine: everything here is
/// decided before the run starts and read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RestoreOptions {
    custom: bool,
    debug: bool,
    verbosity: u32,
    uuid: Option<String>,
}

impl RestoreOptions {
    /// Creates default options: signed restore, no persistence, default
    /// log level, first attached device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore with the component signatures found in the bundle.
    ///
    /// Only signature replacement is skipped; ticket acquisition and
    /// manifest parsing still happen, because the unsigned boot path
    /// still needs the ticket's `Path` fields.
    pub fn with_custom(mut self, custom: bool) -> Self {
        self.custom = custom;
        self
    }

    /// Persist each personalized component under its basename in the
    /// working directory.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Incremental verboseness, see
    /// [verbosity_filter](crate::logging::verbosity_filter).
    pub fn with_verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Restrict device discovery to a persistent device identifier.
    pub fn with_uuid<S>(mut self, uuid: S) -> Self
    where
        S: Into<String>,
    {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn custom(&self) -> bool {
        self.custom
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn verbosity(&self) -> u32 {
        self.verbosity
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
}
