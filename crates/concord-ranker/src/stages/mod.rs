//! Built-in stages.
//!
//! | Registry name       | Pool     | Strength                                   |
//! |---------------------|----------|--------------------------------------------|
//! | `exact_link`        | own      | 100 per candidate sharing an alternate id  |
//! | `original_name`     | own      | index relevance, original string, AND      |
//! | `preferred_name`    | own      | index relevance, name entry, AND           |
//! | `fuzzy_name`        | own      | index relevance, name entry, 75% match     |
//! | `entity_type`       | upstream | -50 on declared type mismatch              |
//! | `original_length`   | global   | ln(query length)                           |
//! | `length_difference` | upstream | -4 ln(length difference)                   |
//! | `degree`            | upstream | 5 ln(relation count)                       |
//! | `chain`             | chained  | output of the last sub-stage               |

pub mod exact_link;
pub mod index_search;
pub mod entity_type;
pub mod length;
pub mod degree;
pub mod chain;
pub mod fixed;

pub use chain::ChainStage;
pub use degree::DegreeStage;
pub use entity_type::EntityTypeFilter;
pub use exact_link::ExactLinkStage;
pub use fixed::FixedStage;
pub use index_search::IndexSearchStage;
pub use length::{LengthDifferenceStage, OriginalLengthStage};
