use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

const ID_PREFIX: &str = "unique_";

/// Produces filenames and element ids for newly materialised chunk files.
pub trait ChunkFilenameGenerator: Send + Sync {
    fn generate_filename(&self, prefix: &str, extension: &str) -> String;

    fn generate_id(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    #[default]
    Random,
    Counter,
}

impl IdScheme {
    /// Anything other than `counter` selects the random scheme.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("counter") {
            Self::Counter
        } else {
            Self::Random
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Random names. Collisions are possible and surface later as naming
/// conflicts settled during reconciliation.
#[derive(Debug, Default)]
pub struct RandomFilenameGenerator;

impl RandomFilenameGenerator {
    fn next_value(&self) -> i32 {
        rand::rng().random_range(0..i32::MAX)
    }
}

impl ChunkFilenameGenerator for RandomFilenameGenerator {
    fn generate_filename(&self, prefix: &str, extension: &str) -> String {
        format!("{prefix}{}{extension}", self.next_value())
    }

    fn generate_id(&self) -> String {
        format!("{ID_PREFIX}{}", self.next_value())
    }
}

/// Sequential names; filenames and ids share one counter.
#[derive(Debug, Default)]
pub struct CounterFilenameGenerator {
    counter: AtomicU32,
}

impl CounterFilenameGenerator {
    fn next_value(&self) -> u32 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}

impl ChunkFilenameGenerator for CounterFilenameGenerator {
    fn generate_filename(&self, prefix: &str, extension: &str) -> String {
        format!("{prefix}{}{extension}", self.next_value())
    }

    fn generate_id(&self) -> String {
        format!("{ID_PREFIX}{}", self.next_value())
    }
}

pub fn new_generator(scheme: IdScheme) -> Box<dyn ChunkFilenameGenerator> {
    match scheme {
        IdScheme::Random => Box::new(RandomFilenameGenerator),
        IdScheme::Counter => Box::new(CounterFilenameGenerator::default()),
    }
}
