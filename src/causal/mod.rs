//! Pairwise causal inference between flight channels
//!
//! - `granger`: lag-regression Granger test with F-test p-values
//! - `ccm`: convergent cross mapping over Takens embeddings
//! - `selector`: picks Granger or CCM from the pair's linear correlation
//! - `flight`: labelled Granger relationships across a flight's channels
//!
//! These operate on prepared series and are independent of segmentation.

mod ccm;
mod flight;
mod granger;
mod selector;

pub use ccm::{CcmAnalyzer, Embedding};
pub use flight::FlightCausality;
pub use granger::{compute_causality, GrangerAnalyzer};
pub use selector::AutoCausalitySelector;
