//! Search operators that run outside the graph.

mod exact_knn;

pub use exact_knn::exact_knn;
