//! Persisted context indexes for kubehop
//!
//! Every store gets a pair of files under the state directory: the index
//! holding the discovered context names, and a state file recording when the
//! index was last refreshed. Listing contexts from the index skips querying
//! the backing store entirely, which is what makes repeated invocations fast.

mod model;
mod search_index;

pub use model::{Index, IndexState};
pub use search_index::SearchIndex;
