pub mod clock;
pub mod credential_store;
pub mod event_sink;
pub mod random_source;
pub mod session_scratch;

pub use clock::{ClockSource, SystemClock};
pub use credential_store::{CredentialStore, InMemoryCredentialStore};
pub use event_sink::EventSink;
pub use random_source::{OsRandom, RandomSource};
pub use session_scratch::{InMemorySessionScratch, SessionScratch};
