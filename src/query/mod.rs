//! Query-time pipeline: intent classification, retrieval tuning, vector
//! search and answer synthesis.
pub mod answer;
pub mod intent;
pub mod retriever;
pub mod tuner;
