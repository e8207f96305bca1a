//! Engine: the per-symbol order state machine, execution models, and the
//! shared capital ledger.

pub mod commission;
pub mod ledger;
pub mod order_engine;
pub mod sizer;
pub mod slippage;

pub use commission::{CommissionEntry, CommissionModel, TradeSide};
pub use ledger::{CapitalLedger, EquityPoint, LedgerError};
pub use order_engine::{
    run_symbol, CandidateTransition, EngineOutcome, EngineRunConfig, TransitionKind,
};
pub use sizer::PositionSizer;
pub use slippage::{MidpointSlippage, SlippageModel};
