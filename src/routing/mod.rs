//! Message routing.
//!
//! Every inbound message flows through:
//! 1. `EntityExtractor`: job-number candidates and client hints, no I/O
//! 2. `Resolver::resolve()`: confirm candidates against the record store
//! 3. `IntentClassifier::classify()`: LLM judgment over the seven routes
//! 4. `combine()`: final route, confidence and reason
//!
//! `TrafficRouter::decide()` runs the four steps for one message.

pub mod clarify;
pub mod classifier;
pub mod combiner;
pub mod extractor;
pub mod pipeline;
pub mod resolver;
pub mod types;
pub mod vocabulary;

pub use classifier::IntentClassifier;
pub use combiner::combine;
pub use extractor::EntityExtractor;
pub use pipeline::{LookupFailurePolicy, TrafficRouter};
pub use resolver::Resolver;
pub use types::*;
pub use vocabulary::ClientVocabulary;
