//! Service-request intent pipeline: guest text in, reply text out, with
//! service requests filed or cancelled along the way.

pub mod classifier;
pub mod coordinator;
pub mod dispatcher;
pub mod parser;
pub mod rules;
pub mod types;

pub use classifier::HeuristicClassifier;
pub use coordinator::RequestCoordinator;
pub use dispatcher::Dispatcher;
pub use rules::{QuickAnswers, QuickReplies, Rulebook};
pub use types::{Classification, ParsedReply};
