pub mod batch;
pub mod consensus;
pub mod evaluator;
pub mod progress;
pub mod summary;

pub use batch::{BatchConfig, BatchError, BatchOrchestrator, BatchRun, PersistenceReport};
pub use consensus::{Consensus, ConsensusBand};
pub use evaluator::{Evaluator, StrategyOutcome, StrategyReport, SymbolReport};
pub use progress::{log_progress, ProgressCallback, ProgressThrottle, ProgressUpdate};
pub use summary::{consensus_ranking, top_signals, BatchSummary, RankedConsensus, SignalHit, StrategyStats};
